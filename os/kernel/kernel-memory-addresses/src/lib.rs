//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw memory addresses used by the physical
//! memory manager.
//!
//! ## Overview
//!
//! The physical memory manager constantly moves between two address spaces:
//! boot memory maps and reserved ranges arrive as **physical** addresses,
//! while zones, page descriptors and free-list nodes live at **kernel
//! virtual** addresses inside the direct map. Mixing the two up is the
//! classic off-by-`HHDM_BASE` bug, so both get their own type:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`MemoryAddress`] | A raw 64-bit address, either physical or virtual. |
//! | [`PhysicalAddress`] | Physical memory as reported by firmware. |
//! | [`VirtualAddress`] | Kernel virtual address that can be dereferenced. |
//!
//! ## Page Sizes
//!
//! Alignment is expressed through the [`PageSize`] marker trait. The memory
//! manager works at [`Size4K`] granularity; [`PageSize::SIZE`] and
//! [`PageSize::SHIFT`] replace the classic `PAGE_SIZE`/`PAGE_SHIFT` pair.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! // Zone bounds shrink inward when registered...
//! let start = PhysicalAddress::new(0x0010_0123).align_up::<Size4K>();
//! let end = PhysicalAddress::new(0x0020_0fff).align_down::<Size4K>();
//! assert_eq!(start.as_u64(), 0x0010_1000);
//! assert_eq!(end.as_u64(), 0x0020_0000);
//!
//! // ...and reserved ranges grow outward when carved.
//! let va = VirtualAddress::new(0xFFFF_8880_0010_0800);
//! assert_eq!(va.align_down::<Size4K>().as_u64(), 0xFFFF_8880_0010_0000);
//! assert!(va.align_up::<Size4K>().is_aligned::<Size4K>());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod memory_address;
mod page_size;
mod physical_address;
mod virtual_address;

pub use memory_address::MemoryAddress;
pub use page_size::{PageSize, Size4K};
pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        let a = MemoryAddress::new(0x12345);
        assert_eq!(a.align_down::<Size4K>().as_u64(), 0x12000);
        assert_eq!(a.align_up::<Size4K>().as_u64(), 0x13000);
        assert!(!a.is_aligned::<Size4K>());

        let aligned = MemoryAddress::new(0x12000);
        assert_eq!(aligned.align_up::<Size4K>(), aligned);
        assert_eq!(aligned.align_down::<Size4K>(), aligned);
        assert!(aligned.is_aligned::<Size4K>());
    }

    #[test]
    fn align_up_saturates_at_top_of_address_space() {
        let a = MemoryAddress::new(u64::MAX - 5);
        assert_eq!(a.align_up::<Size4K>().as_u64(), u64::MAX & !0xFFF);
    }

    #[test]
    fn pages_for_rounds_up() {
        assert_eq!(Size4K::pages_for(0), 0);
        assert_eq!(Size4K::pages_for(1), 1);
        assert_eq!(Size4K::pages_for(4096), 1);
        assert_eq!(Size4K::pages_for(4097), 2);
    }

    #[test]
    fn page_size_formats_by_name() {
        assert_eq!(Size4K::MASK, 0xFFF);
        assert_eq!(format!("{Size4K}"), "4K");
        assert_eq!(format!("{Size4K:?}"), "4K");
    }

    #[test]
    fn page_index_counts_from_base() {
        let base = VirtualAddress::new(0x10_0000);
        assert_eq!(
            VirtualAddress::new(0x10_0fff).page_index_from::<Size4K>(base),
            Some(0)
        );
        assert_eq!(
            VirtualAddress::new(0x10_3000).page_index_from::<Size4K>(base),
            Some(3)
        );
        assert_eq!(
            VirtualAddress::new(0xf_f000).page_index_from::<Size4K>(base),
            None
        );
    }

    #[test]
    fn wrapping_translation_round_trips() {
        let offset = 0xffff_8880_0000_0000;
        let pa = MemoryAddress::new(0x20_0000);
        let va = pa.wrapping_add(offset);
        assert_eq!(va.as_u64(), 0xffff_8880_0020_0000);
        assert_eq!(va.wrapping_sub(offset), pa);
    }

    #[test]
    fn pointer_conversion() {
        let value = 7_u64;
        let va = VirtualAddress::from_ptr(&raw const value);
        assert_eq!(va.as_mut_ptr::<u64>().cast_const(), &raw const value);
    }
}
