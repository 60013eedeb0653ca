//! # UEFI Memory Map Ingestion
//!
//! Turns the memory map the loader copied out of `ExitBootServices` into
//! zones. Firmware maps easily hold a hundred descriptors while the registry
//! has room for a handful, so physically adjacent usable descriptors are
//! merged into one run before being registered, even when they are not
//! neighbours in the map.
//!
//! The buffer is walked with the stride the firmware reported
//! (`mmap_desc_size`), which may exceed `size_of::<MemoryDescriptor>()`.

use crate::error::PmmError;
use crate::phys_mapper::PhysMapper;
use crate::registry::ZoneRegistry;
use crate::zone::ZoneFlags;
use core::ptr;
use kernel_info::boot::MemoryMapInfo;
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K};
use log::{debug, trace, warn};
use uefi::mem::memory_map::{MemoryDescriptor, MemoryType};

/// Memory the kernel may take over once boot services are gone.
#[must_use]
pub fn is_usable(ty: MemoryType) -> bool {
    matches!(
        ty,
        MemoryType::CONVENTIONAL | MemoryType::BOOT_SERVICES_CODE | MemoryType::BOOT_SERVICES_DATA
    )
}

/// Usable physical runs `[start, end)` collected from a memory map.
///
/// Holds at most as many runs as the registry has slots; more could not be
/// registered anyway.
struct Runs<const N: usize> {
    runs: [(u64, u64); N],
    len: usize,
}

impl<const N: usize> Runs<N> {
    const fn new() -> Self {
        Self {
            runs: [(0, 0); N],
            len: 0,
        }
    }

    /// Extend a run that `[start, end)` touches, or start a new one.
    fn add(&mut self, start: u64, end: u64) {
        if let Some(run) = self.runs[..self.len]
            .iter_mut()
            .find(|(run_start, run_end)| *run_end == start || end == *run_start)
        {
            run.0 = run.0.min(start);
            run.1 = run.1.max(end);
            return;
        }

        if self.len == N {
            warn!("Too many usable memory runs, ignoring {start:#x}-{end:#x}");
            return;
        }
        self.runs[self.len] = (start, end);
        self.len += 1;
    }

    /// Sort the runs by address and join those that became adjacent.
    fn finish(&mut self) -> &[(u64, u64)] {
        self.runs[..self.len].sort_unstable_by_key(|&(start, _)| start);

        let mut merged = 0;
        for i in 0..self.len {
            let (start, end) = self.runs[i];
            if merged > 0 && self.runs[merged - 1].1 == start {
                self.runs[merged - 1].1 = end;
            } else {
                self.runs[merged] = (start, end);
                merged += 1;
            }
        }
        self.len = merged;
        &self.runs[..merged]
    }
}

/// Register every usable run of the memory map in `buffer`.
///
/// Firmware does not promise an ordered map. Usable descriptors are joined
/// with any physically adjacent run wherever they appear, and the runs are
/// registered in ascending address order.
///
/// Returns the number of runs handed to [`ZoneRegistry::register`].
///
/// # Errors
/// [`PmmError::DescriptorTooSmall`] if `desc_size` cannot hold a descriptor.
pub fn register_memory_map<M: PhysMapper, const N: usize>(
    registry: &mut ZoneRegistry<M, N>,
    buffer: &[u8],
    desc_size: usize,
) -> Result<usize, PmmError> {
    if desc_size < size_of::<MemoryDescriptor>() {
        return Err(PmmError::DescriptorTooSmall(desc_size as u64));
    }

    let mut runs = Runs::<N>::new();
    for chunk in buffer.chunks_exact(desc_size) {
        // SAFETY: the chunk holds at least one descriptor; firmware gives no
        // alignment guarantee for the copy.
        let desc = unsafe { ptr::read_unaligned(chunk.as_ptr().cast::<MemoryDescriptor>()) };
        let start = desc.phys_start;
        let end = start.saturating_add(desc.page_count.saturating_mul(Size4K::SIZE));

        if !is_usable(desc.ty) {
            trace!("Skipping {:?} at {start:#x}-{end:#x}", desc.ty);
            continue;
        }
        runs.add(start, end);
    }

    let runs = runs.finish();
    for &(start, end) in runs {
        register_run(registry, start, end);
    }
    Ok(runs.len())
}

fn register_run<M: PhysMapper, const N: usize>(
    registry: &mut ZoneRegistry<M, N>,
    start: u64,
    end: u64,
) {
    debug!("Usable RAM at {start:#x}-{end:#x}");
    registry.register(
        PhysicalAddress::new(start),
        PhysicalAddress::new(end),
        ZoneFlags::USABLE,
    );
}

/// Register the usable runs of the memory map described by `info`.
///
/// An absent map (`mmap_ptr` or `mmap_len` of zero) registers nothing.
///
/// # Errors
/// See [`register_memory_map`].
///
/// # Safety
/// A non-zero `info.mmap_ptr` must point to `info.mmap_len` readable bytes
/// that stay valid for the duration of the call.
#[allow(clippy::cast_possible_truncation)]
pub unsafe fn register_uefi_memory_map<M: PhysMapper, const N: usize>(
    registry: &mut ZoneRegistry<M, N>,
    info: &MemoryMapInfo,
) -> Result<usize, PmmError> {
    if info.mmap_ptr == 0 || info.mmap_len == 0 {
        return Ok(0);
    }
    let buffer = unsafe {
        core::slice::from_raw_parts(info.mmap_ptr as *const u8, info.mmap_len as usize)
    };
    register_memory_map(registry, buffer, info.mmap_desc_size as usize)
}
