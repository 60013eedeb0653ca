//! Host-side stand-in for physical memory.

use crate::phys_mapper::OffsetPhysMapper;
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K, VirtualAddress};
use std::alloc::{Layout, alloc_zeroed, dealloc};

/// A page-aligned heap buffer playing the role of a physical RAM range.
pub struct BackingMemory {
    base: *mut u8,
    layout: Layout,
}

impl BackingMemory {
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(pages: u64) -> Self {
        let layout = Layout::from_size_align((pages * Size4K::SIZE) as usize, Size4K::SIZE as usize)
            .expect("valid layout");
        let base = unsafe { alloc_zeroed(layout) };
        assert!(!base.is_null(), "allocation failed");
        Self { base, layout }
    }

    /// Kernel virtual address `offset` bytes into the buffer.
    pub fn virt(&self, offset: u64) -> VirtualAddress {
        VirtualAddress::from_ptr(self.base) + offset
    }

    /// Mapper that places `phys_base` at the start of the buffer.
    pub fn mapper_for(&self, phys_base: PhysicalAddress) -> OffsetPhysMapper {
        OffsetPhysMapper::mapping(phys_base, self.virt(0))
    }

    pub fn fill(&self, byte: u8) {
        unsafe { core::ptr::write_bytes(self.base, byte, self.layout.size()) };
    }
}

impl Drop for BackingMemory {
    fn drop(&mut self) {
        unsafe { dealloc(self.base, self.layout) };
    }
}
