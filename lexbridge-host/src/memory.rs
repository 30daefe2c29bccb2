//! Host side of the shared region.
//!
//! The region is a linear memory the host creates with a fixed size
//! (`min = max = pages`) and hands to the guest as its `env.memory` import.
//! Host and guest then address the same bytes by offset.

use lexbridge_core::region::{self, RegionFault, RegionLayout, RegionOp};
use lexbridge_core::{BridgeError, Result};
use wasmtime::{AsContext, AsContextMut, Memory, MemoryType, StoreContext, StoreContextMut};

/// A fixed-size linear memory shared with a guest, plus its layout.
#[derive(Debug, Clone, Copy)]
pub struct SharedRegion {
    memory: Memory,
    layout: RegionLayout,
}

impl SharedRegion {
    /// Allocate the region in `store`.
    pub fn new(mut store: impl AsContextMut, layout: RegionLayout) -> Result<Self> {
        let ty = MemoryType::new(layout.pages(), Some(layout.pages()));
        let memory = Memory::new(&mut store, ty).map_err(|e| BridgeError::Instantiate {
            cause: format!("failed to allocate {} page region: {e}", layout.pages()),
        })?;

        let size = memory.data_size(&store);
        if size != layout.capacity() {
            return Err(BridgeError::Instantiate {
                cause: format!(
                    "region allocated {size} bytes, expected {}",
                    layout.capacity()
                ),
            });
        }

        Ok(Self { memory, layout })
    }

    /// The Wasmtime memory handle.
    pub fn memory(&self) -> Memory {
        self.memory
    }

    /// Region layout.
    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    /// Current size in bytes.
    ///
    /// The memory cannot grow, so this is always the layout capacity.
    pub fn size(&self, store: impl AsContext) -> usize {
        self.memory.data_size(store)
    }

    /// Current size in pages.
    pub fn pages(&self, store: impl AsContext) -> u64 {
        self.memory.size(store)
    }

    /// The whole region.
    pub fn data<'a, T: 'a>(&self, store: impl Into<StoreContext<'a, T>>) -> &'a [u8] {
        self.memory.data(store)
    }

    /// The whole region, writable.
    pub fn data_mut<'a, T: 'a>(&self, store: impl Into<StoreContextMut<'a, T>>) -> &'a mut [u8] {
        self.memory.data_mut(store)
    }

    /// Bounds-checked `_memset`.
    pub fn fill<'a, T: 'a>(
        &self,
        store: impl Into<StoreContextMut<'a, T>>,
        start: u32,
        value: u8,
        count: u32,
    ) -> std::result::Result<u32, RegionFault> {
        region::fill(self.data_mut(store), start, value, count)
    }

    /// Bounds-checked, overlap-safe `_memcpy`.
    pub fn copy<'a, T: 'a>(
        &self,
        store: impl Into<StoreContextMut<'a, T>>,
        dst: u32,
        src: u32,
        count: u32,
    ) -> std::result::Result<u32, RegionFault> {
        region::copy(self.data_mut(store), dst, src, count)
    }

    /// Copy `len` bytes out of the region.
    pub fn read_at<'a, T: 'a>(
        &self,
        store: impl Into<StoreContext<'a, T>>,
        offset: u32,
        len: u32,
    ) -> Result<Vec<u8>> {
        let data = self.data(store);
        let capacity = data.len();
        let start = offset as usize;
        data.get(start..start.saturating_add(len as usize))
            .map(<[u8]>::to_vec)
            .ok_or(BridgeError::MemoryFault {
                op: RegionOp::Copy,
                offset,
                len,
                capacity,
            })
    }

    /// Write bytes into the region at `offset`.
    pub fn write_at<'a, T: 'a>(
        &self,
        store: impl Into<StoreContextMut<'a, T>>,
        offset: u32,
        bytes: &[u8],
    ) -> Result<()> {
        let data = self.data_mut(store);
        let capacity = data.len();
        let start = offset as usize;
        let dest = data
            .get_mut(start..start.saturating_add(bytes.len()))
            .ok_or(BridgeError::MemoryFault {
                op: RegionOp::Copy,
                offset,
                len: bytes.len() as u32,
                capacity,
            })?;
        dest.copy_from_slice(bytes);
        Ok(())
    }
}
