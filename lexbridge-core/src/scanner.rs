//! The scanner capability consumed by the run loop.

use crate::error::{BridgeError, Result};
use crate::token::TokenRecord;

/// Trampoline arguments exactly as the guest passed them.
///
/// `ptr` is an absolute region offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawToken {
    /// Absolute offset of the first byte.
    pub ptr: u32,
    /// Length in bytes.
    pub len: u32,
    /// Source line number.
    pub line_no: u32,
    /// Scanner-defined token type.
    pub type_tag: i32,
    /// Scanner-defined flags.
    pub special: u32,
}

impl RawToken {
    /// Translate to a staging-relative record, checking it lies inside the
    /// `written` bytes of input.
    pub fn relative_to(self, staging_start: u32, written: usize) -> Result<TokenRecord> {
        let offset = i64::from(self.ptr) - i64::from(staging_start);
        let end = offset + i64::from(self.len);
        if offset < 0 || end > written as i64 {
            return Err(BridgeError::TokenOutOfBounds {
                offset,
                len: self.len,
                written,
            });
        }

        Ok(TokenRecord {
            offset: offset as u32,
            len: self.len,
            line_no: self.line_no,
            type_tag: self.type_tag,
            special: self.special,
        })
    }
}

/// An opaque, single-threaded scanner that shares a region with the host.
///
/// Implementations differ in grammar and in how they execute (a compiled
/// guest module, an in-process script), never in protocol:
///
/// 1. the host writes null-terminated input into the region;
/// 2. [`setup`](Scanner::setup) resets the scanner for input at an offset;
/// 3. [`step`](Scanner::step) is called until it returns a status `<= 0`,
///    appending every token it emits, in order, to `emit`.
pub trait Scanner {
    /// Host view of the whole region.
    fn memory(&self) -> &[u8];

    /// Writable host view of the whole region.
    fn memory_mut(&mut self) -> &mut [u8];

    /// Reset internal state for input starting at `start`.
    fn setup(&mut self, start: u32) -> Result<()>;

    /// Advance by one step, appending emitted tokens to `emit`.
    ///
    /// On `Err` the contents of `emit` are discarded by the caller.
    fn step(&mut self, emit: &mut Vec<RawToken>) -> Result<i32>;
}

impl<S: Scanner + ?Sized> Scanner for Box<S> {
    fn memory(&self) -> &[u8] {
        (**self).memory()
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        (**self).memory_mut()
    }

    fn setup(&mut self, start: u32) -> Result<()> {
        (**self).setup(start)
    }

    fn step(&mut self, emit: &mut Vec<RawToken>) -> Result<i32> {
        (**self).step(emit)
    }
}
