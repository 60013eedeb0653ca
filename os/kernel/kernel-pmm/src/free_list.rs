//! # Free Page List
//!
//! An intrusive singly linked list threaded through the free pages
//! themselves: the first word of every free page points to the next one.
//!
//! ```text
//! head ─► [next|.........] ─► [next|.........] ─► ... ─► [null|.........]
//!          page 0 of zone 0    page 1 of zone 0           last page of last zone
//! ```
//!
//! Pages are linked zone by zone in registry order, ascending within a zone.

use crate::error::PmmError;
use crate::zone::Zone;
use core::marker::PhantomData;
use core::ptr::{self, null_mut};
use kernel_memory_addresses::{PageSize, Size4K, VirtualAddress};
use log::debug;

/// Link stored in the first bytes of every free page.
#[repr(C)]
struct FreePage {
    next: *mut FreePage,
}

/// The list of pages not handed out.
///
/// # Invariants
/// - Every node is a page-aligned page of a usable zone.
/// - No page appears twice and the list is null-terminated.
/// - `free_count` is the number of nodes.
pub struct FreeList {
    head: *mut FreePage,
    free_count: usize,
    max_free: usize,
}

// Safety: the list owns the pages it links; raw pointers are only followed
// through `&self`/`&mut self`.
unsafe impl Send for FreeList {}

impl FreeList {
    /// A list without pages.
    pub(crate) const fn empty() -> Self {
        Self {
            head: null_mut(),
            free_count: 0,
            max_free: 0,
        }
    }

    /// Link every page of every usable zone.
    ///
    /// Writes a link into the first word of each page. Fails if no usable
    /// zone holds a page.
    ///
    /// # Safety
    /// - Every page of every usable zone must be mapped, writable and not in
    ///   use by anything else, including descriptor tables.
    pub(crate) unsafe fn build(zones: &[Zone]) -> Result<Self, PmmError> {
        let mut list = Self::empty();
        // Points at the link to patch next; starts at the head itself.
        let mut tail: *mut *mut FreePage = &raw mut list.head;

        for zone in zones.iter().filter(|zone| zone.is_usable()) {
            let mut page = zone.start();
            while page < zone.end() {
                let node = page.as_mut_ptr::<FreePage>();
                unsafe {
                    ptr::write(node, FreePage { next: null_mut() });
                    *tail = node;
                    tail = &raw mut (*node).next;
                }
                list.free_count += 1;
                page += Size4K::SIZE;
            }
        }

        if list.free_count == 0 {
            return Err(PmmError::NoFreePages);
        }

        list.max_free = list.free_count;
        debug!(
            "Free page list at {:?} holding {} pages",
            list.head(),
            list.free_count
        );
        Ok(list)
    }

    /// The first free page, if any.
    #[inline]
    #[must_use]
    pub fn head(&self) -> Option<VirtualAddress> {
        (!self.head.is_null()).then(|| VirtualAddress::from_ptr(self.head))
    }

    #[inline]
    #[must_use]
    pub const fn free_count(&self) -> usize {
        self.free_count
    }

    /// Number of pages linked when the list was built.
    #[inline]
    #[must_use]
    pub const fn max_free(&self) -> usize {
        self.max_free
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    /// Walk the list from the head.
    #[must_use]
    pub const fn iter(&self) -> FreePages<'_> {
        FreePages {
            next: self.head,
            _list: PhantomData,
        }
    }

    /// Unlink and return the head page.
    pub fn pop(&mut self) -> Option<VirtualAddress> {
        if self.head.is_null() {
            return None;
        }
        let page = self.head;
        // SAFETY: non-null nodes are free pages linked by `build` or `push`.
        self.head = unsafe { (*page).next };
        self.free_count -= 1;
        Some(VirtualAddress::from_ptr(page))
    }

    /// Return `page` to the front of the list.
    ///
    /// # Safety
    /// - `page` must be a page-aligned page of a usable zone that was
    ///   previously taken from this list and is no longer in use.
    pub unsafe fn push(&mut self, page: VirtualAddress) {
        debug_assert!(page.is_aligned::<Size4K>());
        let node = page.as_mut_ptr::<FreePage>();
        unsafe {
            ptr::write(node, FreePage { next: self.head });
        }
        self.head = node;
        self.free_count += 1;
    }
}

impl core::fmt::Debug for FreeList {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FreeList")
            .field("head", &self.head())
            .field("free_count", &self.free_count)
            .field("max_free", &self.max_free)
            .finish()
    }
}

/// Iterator over the pages of a [`FreeList`].
pub struct FreePages<'a> {
    next: *mut FreePage,
    _list: PhantomData<&'a FreeList>,
}

impl Iterator for FreePages<'_> {
    type Item = VirtualAddress;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next.is_null() {
            return None;
        }
        let page = self.next;
        // SAFETY: the borrowed list keeps its nodes alive and unmodified.
        self.next = unsafe { (*page).next };
        Some(VirtualAddress::from_ptr(page))
    }
}

impl<'a> IntoIterator for &'a FreeList {
    type Item = VirtualAddress;
    type IntoIter = FreePages<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
