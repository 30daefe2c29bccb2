//! Shared memory region layout and the primitives the guest imports.
//!
//! The region is one contiguous buffer of `pages * PAGE_SIZE` bytes. The
//! host only ever writes into the staging window (and the terminator byte
//! right after the input). The guest keeps its scanner state below the
//! staging window and its stack in the last page.
//!
//! ```text
//! 0            staging_start            memory_base        capacity
//! |-- guest state --|-- input \0 --- guest heap ---|-- stack --|
//! ```

use crate::error::{BridgeError, Result};
use std::fmt;
use std::ops::Range;
use thiserror::Error;

/// Size of one linear memory page (64 KiB).
pub const PAGE_SIZE: usize = 64 * 1024;

/// Default region size in pages (8 MiB).
pub const DEFAULT_PAGES: u32 = 128;

/// Largest region a 32-bit guest can address.
pub const MAX_PAGES: u32 = 65_536;

/// Default offset of the staging window.
pub const DEFAULT_STAGING_START: u32 = 1024;

/// Slots in the guest's indirect call table.
pub const TABLE_SIZE: u32 = 2;

/// First table slot handed to the guest.
pub const TABLE_BASE: u32 = 0;

/// Placement of the staging window inside a region of fixed capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionLayout {
    pages: u32,
    staging_start: u32,
}

impl RegionLayout {
    /// Create a layout, rejecting windows that cannot hold even an empty input.
    pub fn new(pages: u32, staging_start: u32) -> Result<Self> {
        if pages == 0 || pages > MAX_PAGES {
            return Err(BridgeError::InvalidConfig {
                cause: format!("region must span 1..={MAX_PAGES} pages, got {pages}"),
            });
        }
        if staging_start == 0 {
            return Err(BridgeError::InvalidConfig {
                cause: "staging window cannot start at offset 0".to_string(),
            });
        }

        let layout = Self {
            pages,
            staging_start,
        };
        if staging_start >= layout.memory_base() {
            return Err(BridgeError::InvalidConfig {
                cause: format!(
                    "staging start {staging_start} overlaps the guest stack at {}",
                    layout.memory_base()
                ),
            });
        }
        Ok(layout)
    }

    /// Number of pages in the region.
    pub const fn pages(&self) -> u32 {
        self.pages
    }

    /// Offset of the first input byte.
    pub const fn staging_start(&self) -> u32 {
        self.staging_start
    }

    /// Region size in bytes.
    pub const fn capacity(&self) -> usize {
        self.pages as usize * PAGE_SIZE
    }

    /// Base of the guest stack, which occupies the last page.
    pub const fn memory_base(&self) -> u32 {
        ((self.pages - 1) as usize * PAGE_SIZE) as u32
    }

    /// Exclusive upper bound on input size.
    ///
    /// One byte is held back for the terminator.
    pub const fn max_input(&self) -> usize {
        self.capacity() - self.staging_start as usize - 1
    }

    /// Reject inputs that would leave no room for the terminator.
    pub fn check_input(&self, size: usize) -> Result<()> {
        let max = self.max_input();
        if size >= max {
            return Err(BridgeError::OversizeInput { size, max });
        }
        Ok(())
    }

    /// Absolute byte range of an input of `len` bytes.
    pub fn staging_range(&self, len: usize) -> Range<usize> {
        let start = self.staging_start as usize;
        start..start + len
    }

    /// Absolute offset of the terminator after `written` input bytes.
    pub fn terminator_offset(&self, written: usize) -> usize {
        self.staging_start as usize + written
    }
}

impl Default for RegionLayout {
    fn default() -> Self {
        Self {
            pages: DEFAULT_PAGES,
            staging_start: DEFAULT_STAGING_START,
        }
    }
}

/// Which region primitive was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionOp {
    /// Bulk fill (`_memset`).
    Fill,
    /// Bulk copy (`_memcpy`).
    Copy,
}

impl fmt::Display for RegionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fill => f.write_str("fill"),
            Self::Copy => f.write_str("copy"),
        }
    }
}

/// A guest primitive reached past the end of the region.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{op} out of bounds: offset {offset}, len {len}, capacity {capacity}")]
pub struct RegionFault {
    /// Which primitive faulted.
    pub op: RegionOp,
    /// Start offset requested by the guest.
    pub offset: u32,
    /// Byte count requested by the guest.
    pub len: u32,
    /// Region capacity in bytes.
    pub capacity: usize,
}

fn checked_range(
    memory: &[u8],
    op: RegionOp,
    offset: u32,
    len: u32,
) -> std::result::Result<Range<usize>, RegionFault> {
    let start = offset as usize;
    start
        .checked_add(len as usize)
        .filter(|&end| end <= memory.len())
        .map(|end| start..end)
        .ok_or(RegionFault {
            op,
            offset,
            len,
            capacity: memory.len(),
        })
}

/// Fill `count` bytes at `start` with `value`. Returns `start`.
pub fn fill(
    memory: &mut [u8],
    start: u32,
    value: u8,
    count: u32,
) -> std::result::Result<u32, RegionFault> {
    let range = checked_range(memory, RegionOp::Fill, start, count)?;
    memory[range].fill(value);
    Ok(start)
}

/// Move `count` bytes from `src` to `dst`. Ranges may overlap. Returns `dst`.
pub fn copy(
    memory: &mut [u8],
    dst: u32,
    src: u32,
    count: u32,
) -> std::result::Result<u32, RegionFault> {
    let from = checked_range(memory, RegionOp::Copy, src, count)?;
    checked_range(memory, RegionOp::Copy, dst, count)?;
    memory.copy_within(from, dst as usize);
    Ok(dst)
}
