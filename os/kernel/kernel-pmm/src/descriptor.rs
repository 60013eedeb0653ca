//! # Page Descriptors
//!
//! One [`PageDescriptor`] exists per page of every usable zone. The array is
//! not allocated anywhere: bootstrap places it in the first pages of the zone
//! it describes (see [`DescriptorTable::place`]) and the zone's start is moved
//! past it.
//!
//! ```text
//! zone before bootstrap      [start ............................ end)
//! zone after bootstrap       [descriptors][start ............... end)
//!                             ^ old start  ^ descriptor index 0
//! ```
//!
//! The table keeps one entry per page the zone had *before* it shrank; only
//! the leading `page_count()` entries are reachable through lookups.

use bitfield_struct::bitfield;
use core::fmt;
use core::ptr::{self, NonNull};
use kernel_memory_addresses::VirtualAddress;

/// Per-page state bits.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageFlags {
    /// The page is handed out by the page allocator.
    pub used: bool,
    #[bits(31)]
    __: u32,
}

/// Metadata for one physical page.
///
/// The all-zero bit pattern is a valid, free, unmapped page; bootstrap relies
/// on that to initialize whole tables with a single fill.
#[repr(C)]
#[derive(Default)]
pub struct PageDescriptor {
    flags: PageFlags,
    map_count: u32,
}

impl PageDescriptor {
    #[inline]
    #[must_use]
    pub const fn is_used(&self) -> bool {
        self.flags.used()
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> PageFlags {
        self.flags
    }

    /// Number of address-space mappings referencing the page.
    #[inline]
    #[must_use]
    pub const fn map_count(&self) -> u32 {
        self.map_count
    }

    /// Set the used flag. Returns `false` if it was already set.
    #[inline]
    pub(crate) const fn try_mark_used(&mut self) -> bool {
        if self.flags.used() {
            return false;
        }
        self.flags.set_used(true);
        true
    }

    /// Saturates at `u32::MAX`.
    #[inline]
    pub(crate) const fn increment_map_count(&mut self) {
        self.map_count = self.map_count.saturating_add(1);
    }
}

impl fmt::Debug for PageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageDescriptor")
            .field("used", &self.is_used())
            .field("map_count", &self.map_count)
            .finish()
    }
}

/// Handle to a descriptor array living inside the zone it describes.
pub(crate) struct DescriptorTable {
    base: NonNull<PageDescriptor>,
    len: usize,
}

// Safety: the table exclusively owns the descriptors inside its zone; they
// are only reached through `&self`/`&mut self`.
unsafe impl Send for DescriptorTable {}

impl DescriptorTable {
    /// Bytes needed to describe `pages` pages.
    #[inline]
    pub(crate) const fn bytes_for(pages: u64) -> u64 {
        pages * size_of::<PageDescriptor>() as u64
    }

    /// Place a zeroed table of `len` descriptors at `at`.
    ///
    /// # Safety
    /// - `at` must be non-null and aligned for [`PageDescriptor`].
    /// - `[at, at + bytes_for(len))` must be mapped, writable and owned
    ///   exclusively by the returned table for as long as it exists.
    pub(crate) unsafe fn place(at: VirtualAddress, len: usize) -> Self {
        let base = at.as_mut_ptr::<PageDescriptor>();
        debug_assert!(base.is_aligned());
        unsafe {
            ptr::write_bytes(base, 0, len);
        }
        Self {
            // SAFETY: the caller guarantees `at` is non-null.
            base: unsafe { NonNull::new_unchecked(base) },
            len,
        }
    }

    #[inline]
    pub(crate) fn base(&self) -> VirtualAddress {
        VirtualAddress::from_ptr(self.base.as_ptr())
    }

    #[inline]
    pub(crate) const fn as_slice(&self) -> &[PageDescriptor] {
        // SAFETY: `place` initialized `len` descriptors that stay exclusively ours.
        unsafe { core::slice::from_raw_parts(self.base.as_ptr(), self.len) }
    }

    #[inline]
    pub(crate) const fn as_mut_slice(&mut self) -> &mut [PageDescriptor] {
        // SAFETY: as above; `&mut self` guarantees unique access.
        unsafe { core::slice::from_raw_parts_mut(self.base.as_ptr(), self.len) }
    }
}

const _: () = {
    assert!(size_of::<PageDescriptor>() == 8);
    assert!(align_of::<PageDescriptor>() <= 4096);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_descriptor_is_free() {
        let d = PageDescriptor::default();
        assert!(!d.is_used());
        assert_eq!(d.map_count(), 0);
        assert_eq!(d.flags().into_bits(), 0);
    }

    #[test]
    fn marking_twice_fails() {
        let mut d = PageDescriptor::default();
        assert!(d.try_mark_used());
        assert!(d.is_used());
        assert!(!d.try_mark_used());
        assert!(d.is_used());
    }

    #[test]
    fn map_count_increments() {
        let mut d = PageDescriptor::default();
        d.increment_map_count();
        d.increment_map_count();
        assert_eq!(d.map_count(), 2);
        assert!(!d.is_used());
    }

    #[test]
    fn map_count_saturates() {
        let mut d = PageDescriptor {
            flags: PageFlags::new(),
            map_count: u32::MAX - 1,
        };
        d.increment_map_count();
        d.increment_map_count();
        assert_eq!(d.map_count(), u32::MAX);
    }

    #[test]
    fn place_zeroes_previous_contents() {
        let mut storage = [0xA5A5_A5A5_u64; 4];
        let at = VirtualAddress::from_ptr(storage.as_mut_ptr());
        let table = unsafe { DescriptorTable::place(at, 4) };
        assert_eq!(table.as_slice().len(), 4);
        assert_eq!(table.base(), at);
        assert!(
            table
                .as_slice()
                .iter()
                .all(|d| !d.is_used() && d.map_count() == 0)
        );
    }

    #[test]
    fn bytes_for_scales_with_descriptor_size() {
        assert_eq!(DescriptorTable::bytes_for(0), 0);
        assert_eq!(DescriptorTable::bytes_for(512), 4096);
        assert_eq!(DescriptorTable::bytes_for(513), 4104);
    }
}
