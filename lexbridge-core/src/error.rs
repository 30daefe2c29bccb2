//! Error types for lexbridge.
//!
//! Every failure ends the current run and is surfaced to the caller of
//! [`Bridge::run`](crate::Bridge::run). Nothing is retried. Each variant
//! carries a stable code so hosts can match on failures without parsing
//! messages.

use crate::region::{RegionFault, RegionOp};
use crate::status::ScannerCode;
use thiserror::Error;

/// The main error type for lexbridge operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    // =========================================================================
    // Input Errors (E100-E199)
    // =========================================================================
    /// The requested input leaves no room for the terminator byte.
    #[error("E101: Input of {size} bytes does not fit the staging window (must be below {max})")]
    OversizeInput {
        /// Requested input size in bytes.
        size: usize,
        /// Exclusive upper bound on the input size.
        max: usize,
    },

    /// The prepare callback reported writing more bytes than it was given.
    #[error("E102: Prepare reported {written} bytes written into a {requested} byte window")]
    OverwriteViolation {
        /// Bytes the callback claimed to have written.
        written: usize,
        /// Size of the window handed to the callback.
        requested: usize,
    },

    // =========================================================================
    // Guest Faults (E200-E299)
    // =========================================================================
    /// The guest called the abort primitive.
    #[error("E201: Guest aborted with code {code}")]
    GuestFault {
        /// Value passed to `abort`.
        code: i32,
    },

    /// A bulk fill or copy reached outside the region.
    #[error("E202: Guest {op} out of bounds: offset {offset}, len {len}, capacity {capacity}")]
    MemoryFault {
        /// Which primitive faulted.
        op: RegionOp,
        /// Start offset requested by the guest.
        offset: u32,
        /// Byte count requested by the guest.
        len: u32,
        /// Region capacity in bytes.
        capacity: usize,
    },

    /// The guest emitted a token outside the written input.
    #[error("E203: Token at offset {offset} (len {len}) lies outside the {written} byte input")]
    TokenOutOfBounds {
        /// Staging-relative offset reported by the guest.
        offset: i64,
        /// Token length reported by the guest.
        len: u32,
        /// Bytes of input written for this run.
        written: usize,
    },

    /// The guest called the token trampoline while no step was running.
    #[error("E204: Token emitted outside of an active run")]
    StrayToken,

    // =========================================================================
    // Scanner Termination (E300-E399)
    // =========================================================================
    /// The step entry point returned a negative status.
    #[error("E301: Internal scanner error {code}{}", ScannerCode::describe(.code))]
    InternalScanner {
        /// The negative status returned by the scanner.
        code: i32,
    },

    /// The run exceeded its configured step budget.
    #[error("E302: Scanner did not finish within {steps} steps")]
    StepLimitExceeded {
        /// Number of steps executed before giving up.
        steps: u64,
    },

    /// The guest ran out of fuel.
    #[error("E303: Scanner exhausted its fuel")]
    FuelExhausted,

    /// The guest passed its epoch deadline.
    #[error("E304: Scanner interrupted at epoch deadline")]
    Interrupted,

    // =========================================================================
    // Configuration Errors (E400-E499)
    // =========================================================================
    /// Invalid bridge or region configuration.
    #[error("E401: Invalid configuration: {cause}")]
    InvalidConfig {
        /// Description of the configuration problem.
        cause: String,
    },

    // =========================================================================
    // Runtime Errors (E500-E599)
    // =========================================================================
    /// The execution engine could not be created.
    #[error("E501: Failed to create engine: {cause}")]
    Engine {
        /// Reason for the failure.
        cause: String,
    },

    /// A scanner module failed to compile or validate.
    #[error("E502: Failed to load scanner module '{module}': {cause}")]
    ModuleLoad {
        /// Name of the module.
        module: String,
        /// Reason for the failure.
        cause: String,
    },

    /// The scanner module could not be instantiated.
    #[error("E503: Failed to instantiate scanner: {cause}")]
    Instantiate {
        /// Reason for the failure.
        cause: String,
    },

    /// A required entry point is missing or has the wrong signature.
    #[error("E504: Scanner export '{name}' unavailable: {cause}")]
    MissingExport {
        /// Export name.
        name: String,
        /// Reason the export could not be used.
        cause: String,
    },

    /// The guest trapped for a reason other than the ones above.
    #[error("E505: Scanner trapped: {cause}")]
    Trap {
        /// Trap description.
        cause: String,
    },
}

impl BridgeError {
    /// Get the error code (e.g., "E101").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::OversizeInput { .. } => "E101",
            Self::OverwriteViolation { .. } => "E102",
            Self::GuestFault { .. } => "E201",
            Self::MemoryFault { .. } => "E202",
            Self::TokenOutOfBounds { .. } => "E203",
            Self::StrayToken => "E204",
            Self::InternalScanner { .. } => "E301",
            Self::StepLimitExceeded { .. } => "E302",
            Self::FuelExhausted => "E303",
            Self::Interrupted => "E304",
            Self::InvalidConfig { .. } => "E401",
            Self::Engine { .. } => "E501",
            Self::ModuleLoad { .. } => "E502",
            Self::Instantiate { .. } => "E503",
            Self::MissingExport { .. } => "E504",
            Self::Trap { .. } => "E505",
        }
    }

    /// Check if the caller broke the run contract before the guest ran.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::OversizeInput { .. } | Self::OverwriteViolation { .. }
        )
    }

    /// Check if the guest misbehaved while stepping.
    #[must_use]
    pub fn is_guest_fault(&self) -> bool {
        matches!(
            self,
            Self::GuestFault { .. }
                | Self::MemoryFault { .. }
                | Self::TokenOutOfBounds { .. }
                | Self::StrayToken
                | Self::Trap { .. }
        )
    }

    /// Check if the scanner stopped on its own terms or hit a run limit.
    #[must_use]
    pub fn is_scanner_termination(&self) -> bool {
        matches!(
            self,
            Self::InternalScanner { .. }
                | Self::StepLimitExceeded { .. }
                | Self::FuelExhausted
                | Self::Interrupted
        )
    }

    /// Check if the bridge can still be used for another run.
    ///
    /// Only failures to build the instance itself are final.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::Engine { .. }
                | Self::ModuleLoad { .. }
                | Self::Instantiate { .. }
                | Self::MissingExport { .. }
        )
    }
}

impl From<RegionFault> for BridgeError {
    fn from(fault: RegionFault) -> Self {
        Self::MemoryFault {
            op: fault.op,
            offset: fault.offset,
            len: fault.len,
            capacity: fault.capacity,
        }
    }
}

/// Result type alias using `BridgeError`.
pub type Result<T> = std::result::Result<T, BridgeError>;
