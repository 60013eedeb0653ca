//! # Physical ↔ Kernel Virtual Translation
//!
//! Zones, page descriptors and free-list nodes are all tracked at kernel
//! virtual addresses because the memory manager writes into the pages it
//! manages. Firmware memory maps and the kernel image range, however, are
//! reported as physical addresses. [`PhysMapper`] is the seam between the two.
//!
//! - With a higher-half direct map (HHDM), every physical address is mapped at
//!   `HHDM_BASE + pa`; see [`HhdmPhysMapper`].
//! - Early boot code (identity mapping) and host-side tests use an arbitrary
//!   fixed offset; see [`OffsetPhysMapper`].
//!
//! ## Example
//! ```rust
//! use kernel_memory_addresses::PhysicalAddress;
//! use kernel_pmm::phys_mapper::{HhdmPhysMapper, PhysMapper};
//!
//! let mapper = HhdmPhysMapper;
//! let va = mapper.phys_to_virt(PhysicalAddress::new(0x1234_0000));
//! assert_eq!(va.as_u64(), 0xffff_8880_1234_0000);
//! assert_eq!(mapper.virt_to_phys(va).as_u64(), 0x1234_0000);
//! ```

use kernel_info::memory::HHDM_BASE;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Fixed-offset translation between physical and kernel virtual addresses.
///
/// Implementations must be bijective over the managed range: translating a
/// physical range yields a virtual range of the same length and ordering.
pub trait PhysMapper {
    /// Kernel virtual address under which `pa` is reachable.
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress;

    /// Physical address backing the kernel virtual address `va`.
    fn virt_to_phys(&self, va: VirtualAddress) -> PhysicalAddress;
}

/// [`PhysMapper`] implementation for kernels with a higher-half direct map (HHDM).
///
/// # Safety
/// Translation itself is pure arithmetic. Dereferencing the result requires the
/// HHDM mapping to be present and to cover the referenced physical range.
#[derive(Debug, Copy, Clone, Default)]
pub struct HhdmPhysMapper;

impl PhysMapper for HhdmPhysMapper {
    #[inline]
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        VirtualAddress::new(pa.as_u64().wrapping_add(HHDM_BASE))
    }

    #[inline]
    fn virt_to_phys(&self, va: VirtualAddress) -> PhysicalAddress {
        PhysicalAddress::new(va.as_u64().wrapping_sub(HHDM_BASE))
    }
}

/// [`PhysMapper`] with an arbitrary fixed offset, applied modulo 2^64.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OffsetPhysMapper {
    offset: u64,
}

impl OffsetPhysMapper {
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    /// Physical and virtual addresses coincide.
    #[must_use]
    pub const fn identity() -> Self {
        Self::new(0)
    }

    /// The mapper that places physical address `pa` at virtual address `va`.
    #[must_use]
    pub const fn mapping(pa: PhysicalAddress, va: VirtualAddress) -> Self {
        Self::new(va.as_u64().wrapping_sub(pa.as_u64()))
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }
}

impl PhysMapper for OffsetPhysMapper {
    #[inline]
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        VirtualAddress::new(pa.as_u64().wrapping_add(self.offset))
    }

    #[inline]
    fn virt_to_phys(&self, va: VirtualAddress) -> PhysicalAddress {
        PhysicalAddress::new(va.as_u64().wrapping_sub(self.offset))
    }
}

impl<M: PhysMapper> PhysMapper for &M {
    #[inline]
    fn phys_to_virt(&self, pa: PhysicalAddress) -> VirtualAddress {
        (**self).phys_to_virt(pa)
    }

    #[inline]
    fn virt_to_phys(&self, va: VirtualAddress) -> PhysicalAddress {
        (**self).virt_to_phys(va)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_places_physical_base_at_virtual_base() {
        let mapper = OffsetPhysMapper::mapping(
            PhysicalAddress::new(0x10_0000),
            VirtualAddress::new(0x7f00_dead_0000),
        );
        assert_eq!(
            mapper.phys_to_virt(PhysicalAddress::new(0x10_2000)).as_u64(),
            0x7f00_dead_2000
        );
        assert_eq!(
            mapper
                .virt_to_phys(VirtualAddress::new(0x7f00_dead_2000))
                .as_u64(),
            0x10_2000
        );
    }

    #[test]
    fn mapping_below_physical_base_wraps() {
        let mapper =
            OffsetPhysMapper::mapping(PhysicalAddress::new(0x10_0000), VirtualAddress::new(0x1000));
        let va = mapper.phys_to_virt(PhysicalAddress::new(0x10_1000));
        assert_eq!(va.as_u64(), 0x2000);
        assert_eq!(mapper.virt_to_phys(va).as_u64(), 0x10_1000);
    }

    #[test]
    fn identity_is_a_no_op() {
        let mapper = OffsetPhysMapper::identity();
        assert_eq!(
            mapper.phys_to_virt(PhysicalAddress::new(0x1000)).as_u64(),
            0x1000
        );
    }
}
