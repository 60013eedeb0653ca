//! # Physical Memory Zones

use crate::descriptor::{DescriptorTable, PageDescriptor};
use bitfield_struct::bitfield;
use core::fmt;
use kernel_memory_addresses::{PageSize, Size4K, VirtualAddress};
use log::info;

/// Zone attribute bits.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct ZoneFlags {
    /// Pages of the zone may be handed out.
    pub usable: bool,
    #[bits(31)]
    __: u32,
}

impl ZoneFlags {
    /// RAM that can back the free-page pool.
    pub const USABLE: Self = Self::new().with_usable(true);

    /// Memory that is tracked but never handed out.
    pub const RESERVED: Self = Self::new();
}

/// A contiguous, page-aligned run of kernel virtual addresses `[start, end)`
/// with uniform usability.
pub struct Zone {
    start: VirtualAddress,
    end: VirtualAddress,
    flags: ZoneFlags,
    descriptors: Option<DescriptorTable>,
}

/// How a removal range `[start, end)` intersects a zone.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Overlap {
    /// No common page.
    Disjoint,
    /// The removal covers the whole zone.
    Covers,
    /// The removal covers the zone's start but not its end.
    Prefix,
    /// The removal covers the zone's end but not its start.
    Suffix,
    /// The removal lies strictly inside the zone.
    Interior,
}

impl Zone {
    /// An unused registry slot.
    pub(crate) const EMPTY: Self = Self {
        start: VirtualAddress::new(0),
        end: VirtualAddress::new(0),
        flags: ZoneFlags::RESERVED,
        descriptors: None,
    };

    /// Caller must pass page-aligned bounds with `start < end`.
    pub(crate) fn new(start: VirtualAddress, end: VirtualAddress, flags: ZoneFlags) -> Self {
        debug_assert!(start.is_aligned::<Size4K>() && end.is_aligned::<Size4K>());
        debug_assert!(start < end);
        Self {
            start,
            end,
            flags,
            descriptors: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> VirtualAddress {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn end(&self) -> VirtualAddress {
        self.end
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> ZoneFlags {
        self.flags
    }

    #[inline]
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.flags.usable()
    }

    /// Number of pages in `[start, end)`.
    #[inline]
    #[must_use]
    pub const fn page_count(&self) -> u64 {
        (self.end.as_u64() - self.start.as_u64()) >> Size4K::SHIFT
    }

    /// Whether `addr` lies in the half-open range `[start, end)`.
    #[inline]
    #[must_use]
    pub fn contains(&self, addr: VirtualAddress) -> bool {
        self.start <= addr && addr < self.end
    }

    /// The descriptor table placed at bootstrap, empty before that and for
    /// zones that turned out unusable.
    #[must_use]
    pub fn descriptors(&self) -> &[PageDescriptor] {
        match &self.descriptors {
            Some(table) => table.as_slice(),
            None => &[],
        }
    }

    /// Where the descriptor table lives, if the zone has one.
    #[must_use]
    pub fn descriptor_base(&self) -> Option<VirtualAddress> {
        self.descriptors.as_ref().map(DescriptorTable::base)
    }

    /// Descriptor of the page containing `addr`, counted from the current start.
    pub(crate) fn descriptor(&self, addr: VirtualAddress) -> Option<&PageDescriptor> {
        let index = self.descriptor_index(addr)?;
        self.descriptors.as_ref()?.as_slice().get(index)
    }

    pub(crate) fn descriptor_mut(&mut self, addr: VirtualAddress) -> Option<&mut PageDescriptor> {
        let index = self.descriptor_index(addr)?;
        self.descriptors.as_mut()?.as_mut_slice().get_mut(index)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn descriptor_index(&self, addr: VirtualAddress) -> Option<usize> {
        if !self.contains(addr) {
            return None;
        }
        addr.page_index_from::<Size4K>(self.start)
            .map(|index| index as usize)
    }

    pub(crate) const fn set_start(&mut self, start: VirtualAddress) {
        self.start = start;
    }

    pub(crate) const fn set_end(&mut self, end: VirtualAddress) {
        self.end = end;
    }

    pub(crate) const fn mark_unusable(&mut self) {
        self.flags.set_usable(false);
    }

    pub(crate) fn attach_descriptors(&mut self, table: DescriptorTable) {
        self.descriptors = Some(table);
    }

    /// Classify how `[start, end)` intersects this zone.
    ///
    /// The checks run in a fixed order so that exactly one case applies.
    pub(crate) fn overlap(&self, start: VirtualAddress, end: VirtualAddress) -> Overlap {
        if start <= self.start && self.end <= end {
            Overlap::Covers
        } else if start <= self.start && self.start < end {
            Overlap::Prefix
        } else if start < self.end && self.end <= end {
            Overlap::Suffix
        } else if self.start < start && end < self.end {
            Overlap::Interior
        } else {
            Overlap::Disjoint
        }
    }
}

impl fmt::Debug for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Zone")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("usable", &self.is_usable())
            .field("descriptors", &self.descriptors().len())
            .finish()
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_usable() { "" } else { " UNUSED" };
        write!(
            f,
            "{}-{}{status} {} pgs",
            self.start,
            self.end,
            self.page_count()
        )
    }
}

/// Log every zone and the number of usable pages across all of them.
pub(crate) fn report(zones: &[Zone]) -> u64 {
    let mut usable = 0;
    for (i, zone) in zones.iter().enumerate() {
        if zone.is_usable() {
            usable += zone.page_count();
        }
        info!("pz{i}: {zone}");
    }
    info!("{usable} usable pages across {} zones", zones.len());
    usable
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(start: u64, end: u64) -> Zone {
        Zone::new(
            VirtualAddress::new(start),
            VirtualAddress::new(end),
            ZoneFlags::USABLE,
        )
    }

    fn overlap(z: &Zone, start: u64, end: u64) -> Overlap {
        z.overlap(VirtualAddress::new(start), VirtualAddress::new(end))
    }

    #[test]
    fn overlap_cases() {
        let z = zone(0x4000, 0x8000);
        assert_eq!(overlap(&z, 0x4000, 0x8000), Overlap::Covers);
        assert_eq!(overlap(&z, 0x1000, 0x9000), Overlap::Covers);
        assert_eq!(overlap(&z, 0x1000, 0x5000), Overlap::Prefix);
        assert_eq!(overlap(&z, 0x4000, 0x5000), Overlap::Prefix);
        assert_eq!(overlap(&z, 0x7000, 0x9000), Overlap::Suffix);
        assert_eq!(overlap(&z, 0x7000, 0x8000), Overlap::Suffix);
        assert_eq!(overlap(&z, 0x5000, 0x6000), Overlap::Interior);
        assert_eq!(overlap(&z, 0x1000, 0x4000), Overlap::Disjoint);
        assert_eq!(overlap(&z, 0x8000, 0x9000), Overlap::Disjoint);
    }

    #[test]
    fn half_open_containment() {
        let z = zone(0x4000, 0x6000);
        assert!(!z.contains(VirtualAddress::new(0x3fff)));
        assert!(z.contains(VirtualAddress::new(0x4000)));
        assert!(z.contains(VirtualAddress::new(0x5fff)));
        assert!(!z.contains(VirtualAddress::new(0x6000)));
        assert_eq!(z.page_count(), 2);
    }

    #[test]
    fn flags_constants() {
        assert!(ZoneFlags::USABLE.usable());
        assert!(!ZoneFlags::RESERVED.usable());
    }

    #[test]
    fn no_descriptors_before_bootstrap() {
        let z = zone(0x4000, 0x6000);
        assert!(z.descriptors().is_empty());
        assert!(z.descriptor(VirtualAddress::new(0x4000)).is_none());
        assert!(z.descriptor_base().is_none());
    }

    #[test]
    fn display_marks_unusable_zones() {
        let mut z = zone(0x4000, 0x6000);
        assert!(!format!("{z}").contains("UNUSED"));
        z.mark_unusable();
        assert!(format!("{z}").contains("UNUSED"));
    }

    #[test]
    fn report_counts_only_usable_pages() {
        let mut reserved = zone(0x8000, 0xa000);
        reserved.mark_unusable();
        let zones = [zone(0x2000, 0x6000), reserved];
        assert_eq!(report(&zones), 4);
    }
}
