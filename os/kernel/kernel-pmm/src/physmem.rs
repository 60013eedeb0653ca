//! # Bootstrapped Physical Memory
//!
//! [`PhysicalMemory`] is what a [`ZoneRegistry`] turns into once descriptor
//! tables are placed and the free list is built. Bootstrap consumes the
//! registry, so zones can no longer be registered or carved afterwards and
//! bootstrap cannot run twice over the same zones.

use crate::bootstrap::place_descriptor_tables;
use crate::descriptor::PageDescriptor;
use crate::error::PmmError;
use crate::free_list::FreeList;
use crate::phys_mapper::PhysMapper;
use crate::registry::ZoneRegistry;
use crate::zone::{self, Zone};
use kernel_info::memory::MAX_PHYS_ZONES;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use log::{debug, info};

/// Zones with descriptor tables plus the free page list.
pub struct PhysicalMemory<M: PhysMapper, const N: usize = MAX_PHYS_ZONES> {
    registry: ZoneRegistry<M, N>,
    free_list: FreeList,
}

impl<M: PhysMapper, const N: usize> PhysicalMemory<M, N> {
    /// Place descriptor tables in every usable zone and link all remaining
    /// pages into the free list.
    ///
    /// Zones too small to describe themselves become unusable.
    ///
    /// # Errors
    /// - [`PmmError::NoZones`] if nothing was registered.
    /// - [`PmmError::NoFreePages`] if no usable page is left after placing
    ///   the descriptor tables.
    ///
    /// # Safety
    /// Every page of every usable zone must be mapped through the registry's
    /// mapper, writable, and not used by anything else: the kernel image,
    /// boot data and firmware tables must have been removed beforehand.
    pub unsafe fn try_bootstrap(mut registry: ZoneRegistry<M, N>) -> Result<Self, PmmError> {
        if registry.is_empty() {
            return Err(PmmError::NoZones);
        }

        debug!("Bootstrapping {} physical zones", registry.len());
        unsafe {
            place_descriptor_tables(registry.zones_mut());
        }
        let free_list = unsafe { FreeList::build(registry.zones())? };

        Ok(Self {
            registry,
            free_list,
        })
    }

    /// Like [`try_bootstrap`](Self::try_bootstrap), for the boot path.
    ///
    /// # Panics
    /// If there is no zone or no usable page; the kernel cannot continue
    /// without memory.
    ///
    /// # Safety
    /// See [`try_bootstrap`](Self::try_bootstrap).
    pub unsafe fn bootstrap(registry: ZoneRegistry<M, N>) -> Self {
        match unsafe { Self::try_bootstrap(registry) } {
            Ok(memory) => memory,
            Err(e) => panic!("Physical memory bootstrap failed: {e}"),
        }
    }

    #[inline]
    #[must_use]
    pub const fn mapper(&self) -> &M {
        self.registry.mapper()
    }

    #[inline]
    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        self.registry.zones()
    }

    #[inline]
    #[must_use]
    pub const fn free_list(&self) -> &FreeList {
        &self.free_list
    }

    #[inline]
    pub const fn free_list_mut(&mut self) -> &mut FreeList {
        &mut self.free_list
    }

    /// The first zone whose range contains `addr`.
    #[must_use]
    pub fn find(&self, addr: VirtualAddress) -> Option<&Zone> {
        self.registry.find(addr)
    }

    /// Descriptor of the page containing `addr`.
    ///
    /// # Errors
    /// - [`PmmError::Unmapped`] if no zone contains `addr`.
    /// - [`PmmError::NoDescriptor`] if the containing zone has no table.
    pub fn try_descriptor_for(&self, addr: VirtualAddress) -> Result<&PageDescriptor, PmmError> {
        let zone = self.find(addr).ok_or(PmmError::Unmapped(addr))?;
        zone.descriptor(addr).ok_or(PmmError::NoDescriptor(addr))
    }

    fn try_descriptor_mut(&mut self, addr: VirtualAddress) -> Result<&mut PageDescriptor, PmmError> {
        let zone = self
            .registry
            .find_mut(addr)
            .ok_or(PmmError::Unmapped(addr))?;
        zone.descriptor_mut(addr)
            .ok_or(PmmError::NoDescriptor(addr))
    }

    /// Descriptor of the page containing `addr`.
    ///
    /// # Panics
    /// If no zone with descriptors contains `addr`. Asking for memory the
    /// manager does not own is a kernel bug.
    #[must_use]
    pub fn descriptor_for(&self, addr: VirtualAddress) -> &PageDescriptor {
        match self.try_descriptor_for(addr) {
            Ok(descriptor) => descriptor,
            Err(e) => panic!("Page descriptor lookup failed: {e}"),
        }
    }

    /// Descriptor of the page containing the physical address `pa`.
    ///
    /// # Panics
    /// See [`descriptor_for`](Self::descriptor_for).
    #[must_use]
    pub fn descriptor_for_phys(&self, pa: PhysicalAddress) -> &PageDescriptor {
        self.descriptor_for(self.mapper().phys_to_virt(pa))
    }

    /// Flag the page containing `addr` as used.
    ///
    /// # Errors
    /// - [`PmmError::AlreadyUsed`] if the flag was already set.
    /// - [`PmmError::Unmapped`] / [`PmmError::NoDescriptor`] as for
    ///   [`try_descriptor_for`](Self::try_descriptor_for).
    pub fn mark_used(&mut self, addr: VirtualAddress) -> Result<(), PmmError> {
        if self.try_descriptor_mut(addr)?.try_mark_used() {
            Ok(())
        } else {
            Err(PmmError::AlreadyUsed(addr))
        }
    }

    /// Record one more mapping of the page containing `addr`.
    ///
    /// # Panics
    /// If no zone with descriptors contains `addr`.
    pub fn increment_map_count(&mut self, addr: VirtualAddress) {
        match self.try_descriptor_mut(addr) {
            Ok(descriptor) => descriptor.increment_map_count(),
            Err(e) => panic!("Page descriptor lookup failed: {e}"),
        }
    }

    /// [`increment_map_count`](Self::increment_map_count) for a physical address.
    ///
    /// # Panics
    /// If no zone with descriptors contains `pa`.
    pub fn increment_map_count_phys(&mut self, pa: PhysicalAddress) {
        let addr = self.mapper().phys_to_virt(pa);
        self.increment_map_count(addr);
    }

    /// Total pages in usable zones, free or not.
    #[must_use]
    pub fn usable_pages(&self) -> u64 {
        self.zones()
            .iter()
            .filter(|zone| zone.is_usable())
            .map(Zone::page_count)
            .sum()
    }

    /// Log all zones and the free list, returning the number of usable pages.
    pub fn report(&self) -> u64 {
        let usable = zone::report(self.zones());
        info!(
            "{} of {} pages free",
            self.free_list.free_count(),
            self.free_list.max_free()
        );
        usable
    }
}
