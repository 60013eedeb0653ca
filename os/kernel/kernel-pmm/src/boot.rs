//! # Boot Sequence
//!
//! Glue between the loader hand-off and a ready [`PhysicalMemory`]:
//!
//! 1. register the usable RAM of the UEFI memory map,
//! 2. carve out ranges that are occupied (kernel image, boot data),
//! 3. bootstrap descriptors and the free list.

use crate::phys_mapper::PhysMapper;
use crate::physmem::PhysicalMemory;
use crate::registry::ZoneRegistry;
use crate::uefi_mmap::register_uefi_memory_map;
use core::fmt;
use kernel_info::boot::KernelBootInfo;
use kernel_info::memory::MAX_PHYS_ZONES;
use kernel_memory_addresses::PhysicalAddress;
use log::info;

/// A half-open physical range `[start, end)` that must never be handed out.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct PhysRange {
    pub start: PhysicalAddress,
    pub end: PhysicalAddress,
}

impl PhysRange {
    #[must_use]
    pub const fn new(start: PhysicalAddress, end: PhysicalAddress) -> Self {
        Self { start, end }
    }
}

impl fmt::Debug for PhysRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Remove every `reserved` range from the registry and bootstrap it.
///
/// # Panics
/// If no zone or no usable page remains.
///
/// # Safety
/// All memory left in usable zones after the removals must be mapped through
/// the registry's mapper, writable and otherwise unused.
pub unsafe fn init_physical_memory<M: PhysMapper, const N: usize>(
    mut registry: ZoneRegistry<M, N>,
    reserved: &[PhysRange],
) -> PhysicalMemory<M, N> {
    for range in reserved {
        info!("Reserving physical memory {range:?}");
        registry.remove(range.start, range.end);
    }

    let memory = unsafe { PhysicalMemory::bootstrap(registry) };
    memory.report();
    memory
}

/// Build physical memory management from the loader's boot information.
///
/// The kernel image is carved out; the memory map buffer is read before
/// bootstrap and may be overwritten afterwards.
///
/// # Panics
/// If the memory map is malformed or yields no usable page.
///
/// # Safety
/// - `info.mmap` must describe a readable memory map buffer.
/// - Every usable page of the map outside the kernel image, including the
///   map buffer itself, must be reachable through `mapper` and unused.
pub unsafe fn init_from_boot_info<M: PhysMapper>(
    info: &KernelBootInfo,
    mapper: M,
) -> PhysicalMemory<M, MAX_PHYS_ZONES> {
    let mut registry = ZoneRegistry::new(mapper);
    match unsafe { register_uefi_memory_map(&mut registry, &info.mmap) } {
        Ok(runs) => info!("Registered {runs} usable memory runs"),
        Err(e) => panic!("Invalid UEFI memory map: {e}"),
    }

    let kernel = PhysRange::new(
        PhysicalAddress::new(info.kernel_image.phys_start),
        PhysicalAddress::new(info.kernel_image.phys_end),
    );
    unsafe { init_physical_memory(registry, &[kernel]) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::BackingMemory;
    use crate::zone::ZoneFlags;
    use kernel_memory_addresses::{PageSize, Size4K};

    fn pa(v: u64) -> PhysicalAddress {
        PhysicalAddress::new(v)
    }

    #[test]
    fn reserved_ranges_are_excluded_before_bootstrap() {
        let memory = BackingMemory::new(32);
        let mut registry = ZoneRegistry::new(memory.mapper_for(pa(0x10_0000)));
        registry.register(pa(0x10_0000), pa(0x12_0000), ZoneFlags::USABLE);

        let reserved = [
            PhysRange::new(pa(0x10_0000), pa(0x10_4000)),
            PhysRange::new(pa(0x11_0000), pa(0x11_0800)),
        ];
        let pmm = unsafe { init_physical_memory(registry, &reserved) };

        // [0x104000, 0x110000) 12 pages and [0x111000, 0x120000) 15 pages,
        // each losing one page to descriptors
        assert_eq!(pmm.zones().len(), 2);
        assert_eq!(pmm.free_list().free_count(), 25);
        for range in &reserved {
            let mut page = range.start.align_down::<Size4K>();
            while page < range.end {
                let va = pmm.mapper().phys_to_virt(page);
                assert!(pmm.find(va).is_none(), "{page} still in a zone");
                page += Size4K::SIZE;
            }
        }
    }

    #[test]
    fn range_debug_output() {
        let range = PhysRange::new(pa(0x10_0000), pa(0x20_0000));
        assert_eq!(format!("{range:?}"), "0x0000000000100000-0x0000000000200000");
    }
}
