//! Step status decoding.

/// What a single step call reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Positive status: call the step entry point again.
    Continue(i32),
    /// Zero: the input has been fully scanned.
    Done,
    /// Negative status: the scanner gave up.
    Failed(i32),
}

impl StepStatus {
    /// Decode the raw integer returned by the guest.
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        if raw > 0 {
            Self::Continue(raw)
        } else if raw == 0 {
            Self::Done
        } else {
            Self::Failed(raw)
        }
    }

    /// The raw integer this status was decoded from.
    #[inline]
    pub const fn raw(self) -> i32 {
        match self {
            Self::Continue(raw) | Self::Failed(raw) => raw,
            Self::Done => 0,
        }
    }

    /// Whether the run loop stops after this status.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Continue(_))
    }
}

/// Negative status codes the reference scanner is known to return.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerCode {
    /// Input the grammar does not allow.
    Unexpected = -1,
    /// Brackets did not balance.
    Stack = -2,
    /// The scanner hit an inconsistent internal state.
    Internal = -3,
    /// A construct the scanner does not implement yet.
    Todo = -4,
}

impl ScannerCode {
    /// Look up a known code.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::Unexpected),
            -2 => Some(Self::Stack),
            -3 => Some(Self::Internal),
            -4 => Some(Self::Todo),
            _ => None,
        }
    }

    /// Short description for log and error messages.
    pub const fn description(self) -> &'static str {
        match self {
            Self::Unexpected => "unexpected input",
            Self::Stack => "unbalanced stack",
            Self::Internal => "internal error",
            Self::Todo => "unsupported construct",
        }
    }

    /// Parenthesized description suffix, empty for unknown codes.
    pub(crate) fn describe(code: &i32) -> String {
        match Self::from_code(*code) {
            Some(known) => format!(" ({})", known.description()),
            None => String::new(),
        }
    }
}
