//! # Kernel Configuration and Boot Interface
//!
//! Memory layout constants and the bootloader hand-off structures consumed by
//! the physical memory manager.
//!
//! ## Boot Information ([`boot`])
//! * **Memory Map**: where the firmware memory map lives and how to stride it
//! * **Kernel Image**: the physical range the loader placed the kernel in,
//!   which must never end up on the free list
//!
//! ## Memory Layout ([`memory`])
//! * **Direct Map**: physical memory is reachable at [`HHDM_BASE`](memory::HHDM_BASE) + `pa`
//! * **Zone Capacity**: the fixed size of the physical zone registry
//!
//! ```text
//! Physical Memory Layout:
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Low Memory (< 1MiB)         │
//!             ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │       Kernel Image              │  carved out of its zone
//!             ├─────────────────────────────────┤
//!             │ Page descriptors (per zone)     │  self-hosted at zone start
//!             │ Free pages                      │  threaded into the free list
//!             └─────────────────────────────────┘
//! ```
//!
//! All constants are validated at compile time.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
