//! # Memory Layout

use kernel_memory_addresses::{PageSize, Size4K};

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything mapped at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// Capacity of the physical zone registry.
///
/// Memory-map discovery happens once at boot and adjacent usable regions are
/// merged before registration, so a handful of slots is enough. Carving the
/// kernel image out of a zone consumes one extra slot.
pub const MAX_PHYS_ZONES: usize = 10;

const _: () = {
    assert!(MAX_PHYS_ZONES >= 2, "carving needs room for at least one split");
    assert!(HHDM_BASE.is_multiple_of(Size4K::SIZE));
};
