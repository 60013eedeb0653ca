//! # Zone Registry
//!
//! A fixed-capacity array of [`Zone`]s built once from the boot memory map.
//!
//! ## Boot sequence
//!
//! 1. [`ZoneRegistry::register`] every physical RAM region, in increasing
//!    address order and without overlaps (not checked).
//! 2. [`ZoneRegistry::remove`] every reserved range, e.g. the kernel image.
//!    Zones may end up unordered after this step.
//! 3. Hand the registry to [`PhysicalMemory::bootstrap`](crate::PhysicalMemory::bootstrap).
//!
//! ## Example
//! ```rust
//! use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
//! use kernel_pmm::phys_mapper::OffsetPhysMapper;
//! use kernel_pmm::{ZoneFlags, ZoneRegistry};
//!
//! let mut registry = ZoneRegistry::new(OffsetPhysMapper::identity());
//! registry.register(
//!     PhysicalAddress::new(0x10_0000),
//!     PhysicalAddress::new(0x80_0000),
//!     ZoneFlags::USABLE,
//! );
//! registry.remove(PhysicalAddress::new(0x20_0000), PhysicalAddress::new(0x30_0000));
//!
//! assert_eq!(registry.len(), 2);
//! assert_eq!(registry.zones()[0].end(), VirtualAddress::new(0x20_0000));
//! assert_eq!(registry.zones()[1].start(), VirtualAddress::new(0x30_0000));
//! ```

use crate::phys_mapper::PhysMapper;
use crate::zone::{self, Overlap, Zone, ZoneFlags};
use kernel_info::memory::MAX_PHYS_ZONES;
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K, VirtualAddress};
use log::{trace, warn};

/// Bounded collection of pairwise disjoint zones.
///
/// `N` is the fixed capacity; the registry never grows.
pub struct ZoneRegistry<M: PhysMapper, const N: usize = MAX_PHYS_ZONES> {
    mapper: M,
    zones: [Zone; N],
    len: usize,
}

impl<M: PhysMapper> ZoneRegistry<M> {
    /// An empty registry with the default capacity of [`MAX_PHYS_ZONES`].
    #[must_use]
    pub const fn new(mapper: M) -> Self {
        Self::with_mapper(mapper)
    }
}

impl<M: PhysMapper, const N: usize> ZoneRegistry<M, N> {
    /// An empty registry holding at most `N` zones.
    #[must_use]
    pub const fn with_mapper(mapper: M) -> Self {
        Self {
            mapper,
            zones: [const { Zone::EMPTY }; N],
            len: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    #[inline]
    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        &self.zones[..self.len]
    }

    #[inline]
    pub(crate) fn zones_mut(&mut self) -> &mut [Zone] {
        &mut self.zones[..self.len]
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline]
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.len >= N
    }

    /// Register the physical range `[start, end)` as a new zone.
    ///
    /// The range is translated to kernel virtual addresses and shrunk inward
    /// to page boundaries. Virtual page 0 is never part of a zone. Nothing is
    /// registered if the registry is full or no whole page remains.
    ///
    /// Calls must come in increasing address order and must not overlap.
    pub fn register(&mut self, start: PhysicalAddress, end: PhysicalAddress, flags: ZoneFlags) {
        if self.is_full() {
            warn!("Zone registry full, ignoring {start}-{end}");
            return;
        }

        let mut start = self.mapper.phys_to_virt(start).align_up::<Size4K>();
        let end = self.mapper.phys_to_virt(end).align_down::<Size4K>();

        if start.as_u64() == 0 {
            start += Size4K::SIZE;
        }

        if end <= start {
            trace!("Ignoring empty zone {start}-{end}");
            return;
        }

        self.zones[self.len] = Zone::new(start, end, flags);
        self.len += 1;
    }

    /// Exclude the physical range `[start, end)` from every zone it touches.
    ///
    /// The range is widened outward to page boundaries so that no partially
    /// covered page survives. Zones may be in any order. Zones that are fully
    /// covered are deleted, partially covered zones are trimmed, and a zone
    /// containing the range strictly inside is split in two.
    ///
    /// If a split is needed while the registry is full, the zone keeps only
    /// the part below the range and the part above it is dropped.
    pub fn remove(&mut self, start: PhysicalAddress, end: PhysicalAddress) {
        let start = self.mapper.phys_to_virt(start).align_down::<Size4K>();
        let end = self.mapper.phys_to_virt(end).align_up::<Size4K>();

        if end <= start {
            return;
        }

        let mut i = 0;
        while i < self.len {
            let zone = &mut self.zones[i];
            match zone.overlap(start, end) {
                Overlap::Covers => {
                    self.delete(i);
                    // slot `i` now holds the next zone
                    continue;
                }
                Overlap::Prefix => zone.set_start(end),
                Overlap::Suffix => zone.set_end(start),
                Overlap::Interior => {
                    let tail_end = zone.end();
                    let flags = zone.flags();
                    zone.set_end(start);

                    if self.is_full() {
                        warn!("Splitting zone at {start}-{end} but zone registry is full, dropping {end}-{tail_end}");
                    } else {
                        self.insert(i + 1, Zone::new(end, tail_end, flags));
                        // the new zone lies entirely above the range
                        i += 1;
                    }
                }
                Overlap::Disjoint => {}
            }
            i += 1;
        }
    }

    /// The first zone whose range contains `addr`.
    #[must_use]
    pub fn find(&self, addr: VirtualAddress) -> Option<&Zone> {
        self.zones().iter().find(|zone| zone.contains(addr))
    }

    pub(crate) fn find_mut(&mut self, addr: VirtualAddress) -> Option<&mut Zone> {
        self.zones_mut().iter_mut().find(|zone| zone.contains(addr))
    }

    /// Log all zones, returning the number of usable pages.
    pub fn report(&self) -> u64 {
        zone::report(self.zones())
    }

    /// Delete slot `i`, shifting later zones down by one.
    fn delete(&mut self, i: usize) {
        debug_assert!(i < self.len);
        self.zones[i..self.len].rotate_left(1);
        self.len -= 1;
        self.zones[self.len] = Zone::EMPTY;
    }

    /// Insert at slot `i`, shifting later zones up by one. Requires a free slot.
    fn insert(&mut self, i: usize, zone: Zone) {
        debug_assert!(i <= self.len && self.len < N);
        self.zones[self.len] = zone;
        self.zones[i..=self.len].rotate_right(1);
        self.len += 1;
    }
}
