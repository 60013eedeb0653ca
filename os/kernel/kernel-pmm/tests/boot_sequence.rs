//! Full boot path: UEFI memory map → zones → carve kernel → bootstrap → allocate.

use kernel_info::boot::{KernelBootInfo, KernelImageInfo, MemoryMapInfo};
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K, VirtualAddress};
use kernel_pmm::phys_mapper::{OffsetPhysMapper, PhysMapper};
use kernel_pmm::{PhysicalMemory, PmmError, init_from_boot_info};
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::collections::HashSet;
use uefi::mem::memory_map::{MemoryAttribute, MemoryDescriptor, MemoryType};

const RAM_BASE: u64 = 0x10_0000;
const RAM_PAGES: u64 = 256;
const KERNEL_END: u64 = 0x14_0000;

/// Heap buffer standing in for `[RAM_BASE, RAM_BASE + RAM_PAGES * 4K)`.
struct Ram {
    base: *mut u8,
    layout: Layout,
}

impl Ram {
    fn new() -> Self {
        let layout = Layout::from_size_align((RAM_PAGES * Size4K::SIZE) as usize, 4096)
            .expect("valid layout");
        let base = unsafe { alloc_zeroed(layout) };
        assert!(!base.is_null());
        Self { base, layout }
    }

    fn mapper(&self) -> OffsetPhysMapper {
        OffsetPhysMapper::mapping(
            PhysicalAddress::new(RAM_BASE),
            VirtualAddress::from_ptr(self.base),
        )
    }
}

impl Drop for Ram {
    fn drop(&mut self) {
        unsafe { dealloc(self.base, self.layout) };
    }
}

fn desc(ty: MemoryType, phys_start: u64, page_count: u64) -> MemoryDescriptor {
    MemoryDescriptor {
        ty,
        phys_start,
        virt_start: 0,
        page_count,
        att: MemoryAttribute::WRITE_BACK,
    }
}

/// Firmware-style map with a descriptor stride larger than the struct.
fn memory_map() -> (Vec<u8>, usize) {
    let stride = size_of::<MemoryDescriptor>() + 8;
    let descs = [
        desc(MemoryType::CONVENTIONAL, 0x10_0000, 0x80),
        desc(MemoryType::BOOT_SERVICES_DATA, 0x18_0000, 0x40),
        desc(MemoryType::LOADER_DATA, 0x1c_0000, 0x8),
        desc(MemoryType::CONVENTIONAL, 0x1c_8000, 0x38),
        desc(MemoryType::RUNTIME_SERVICES_DATA, 0x30_0000, 0x10),
    ];
    let mut buffer = vec![0_u8; descs.len() * stride];
    for (i, d) in descs.iter().enumerate() {
        unsafe {
            core::ptr::write_unaligned(
                buffer[i * stride..].as_mut_ptr().cast::<MemoryDescriptor>(),
                *d,
            );
        }
    }
    (buffer, stride)
}

fn boot(ram: &Ram) -> PhysicalMemory<OffsetPhysMapper> {
    let (map, stride) = memory_map();
    let info = KernelBootInfo {
        mmap: MemoryMapInfo {
            mmap_ptr: map.as_ptr() as u64,
            mmap_len: map.len() as u64,
            mmap_desc_size: stride as u64,
            mmap_desc_version: 1,
        },
        kernel_image: KernelImageInfo {
            phys_start: RAM_BASE,
            phys_end: KERNEL_END - 0x800,
        },
    };
    unsafe { init_from_boot_info(&info, ram.mapper()) }
}

#[test]
fn boot_yields_every_usable_page_once() {
    let ram = Ram::new();
    let mut pmm = boot(&ram);

    // [0x140000, 0x1c0000) 128 pages and [0x1c8000, 0x200000) 56 pages,
    // one descriptor page each
    assert_eq!(pmm.zones().len(), 2);
    assert_eq!(pmm.usable_pages(), 182);
    assert_eq!(pmm.free_list().free_count(), 182);

    let mut taken = HashSet::new();
    while let Some(page) = pmm.free_list_mut().pop() {
        assert!(page.is_aligned::<Size4K>());
        assert_eq!(pmm.mark_used(page), Ok(()));
        assert!(taken.insert(page));
    }
    assert_eq!(taken.len(), 182);
    assert!(pmm.free_list().is_empty());
    assert!(
        pmm.zones()
            .iter()
            .flat_map(|zone| &zone.descriptors()[..usize::try_from(zone.page_count()).unwrap()])
            .all(|d| d.is_used())
    );
}

#[test]
fn reserved_memory_is_never_handed_out() {
    let ram = Ram::new();
    let pmm = boot(&ram);
    let mapper = *pmm.mapper();

    let kernel_page = mapper.phys_to_virt(PhysicalAddress::new(0x13_f000));
    assert_eq!(
        pmm.try_descriptor_for(kernel_page).unwrap_err(),
        PmmError::Unmapped(kernel_page)
    );

    let loader_page = mapper.phys_to_virt(PhysicalAddress::new(0x1c_4000));
    assert!(pmm.find(loader_page).is_none());

    let free: HashSet<_> = pmm.free_list().iter().collect();
    for zone in pmm.zones() {
        let table = zone.descriptor_base().expect("zone has descriptors");
        assert!(!free.contains(&table));
    }
    assert!(!free.contains(&kernel_page));
    assert!(!free.contains(&loader_page));
}

#[test]
fn freed_pages_return_to_the_list() {
    let ram = Ram::new();
    let mut pmm = boot(&ram);

    let page = pmm.free_list_mut().pop().expect("free page");
    pmm.increment_map_count(page);
    assert_eq!(pmm.descriptor_for(page).map_count(), 1);

    unsafe { pmm.free_list_mut().push(page) };
    assert_eq!(pmm.free_list().free_count(), 182);
    assert_eq!(pmm.free_list().iter().next(), Some(page));
}
