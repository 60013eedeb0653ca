//! # Kernel Physical Memory Manager
//!
//! Tracks which physical pages exist, which of them may be used, and hands
//! the usable ones to the page allocator. Everything happens before any heap
//! exists, so all bookkeeping lives in fixed-size arrays or inside the
//! managed pages themselves.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 UEFI memory map                     │
//! │    • usable runs merged before registration         │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ register / remove
//! ┌─────────────────▼───────────────────────────────────┐
//! │                 Zone Registry                       │
//! │    • bounded array of disjoint page-aligned zones   │
//! │    • carving splits zones around reserved ranges    │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ bootstrap (consumes the registry)
//! ┌─────────────────▼───────────────────────────────────┐
//! │                 Physical Memory                     │
//! │    • descriptor table at the front of each zone     │
//! │    • intrusive free list through all usable pages   │
//! │    • address → descriptor lookup, page accounting   │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Addresses
//!
//! Zones are kept at kernel virtual addresses, since bootstrap writes into
//! the pages it manages. Physical inputs are translated through a
//! [`PhysMapper`](phys_mapper::PhysMapper), typically the higher-half direct
//! map ([`HhdmPhysMapper`](phys_mapper::HhdmPhysMapper)).
//!
//! ## Usage
//! ```rust,no_run
//! use kernel_memory_addresses::PhysicalAddress;
//! use kernel_pmm::phys_mapper::HhdmPhysMapper;
//! use kernel_pmm::{PhysRange, PhysicalMemory, ZoneFlags, ZoneRegistry, init_physical_memory};
//!
//! let mut registry = ZoneRegistry::new(HhdmPhysMapper);
//! registry.register(
//!     PhysicalAddress::new(0x10_0000),
//!     PhysicalAddress::new(0x800_0000),
//!     ZoneFlags::USABLE,
//! );
//!
//! let kernel = PhysRange::new(PhysicalAddress::new(0x10_0000), PhysicalAddress::new(0x40_0000));
//! let mut pmm: PhysicalMemory<_> = unsafe { init_physical_memory(registry, &[kernel]) };
//!
//! let page = pmm.free_list_mut().pop().expect("free page");
//! pmm.mark_used(page).expect("page was free");
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod boot;
mod bootstrap;
mod descriptor;
mod error;
mod free_list;
pub mod phys_mapper;
mod physmem;
mod registry;
pub mod uefi_mmap;
mod zone;

#[cfg(test)]
mod test_support;

pub use boot::{PhysRange, init_from_boot_info, init_physical_memory};
pub use descriptor::{PageDescriptor, PageFlags};
pub use error::PmmError;
pub use free_list::{FreeList, FreePages};
pub use physmem::PhysicalMemory;
pub use registry::ZoneRegistry;
pub use zone::{Zone, ZoneFlags};
