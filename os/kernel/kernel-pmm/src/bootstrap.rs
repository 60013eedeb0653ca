//! # Page Descriptor Bootstrap
//!
//! Page descriptors cannot come from a heap: the heap sits on top of the page
//! pool they describe. Instead every usable zone donates its first pages to
//! hold its own descriptor table.

use crate::descriptor::DescriptorTable;
use crate::zone::Zone;
use kernel_memory_addresses::{PageSize, Size4K};
use log::debug;

/// Place a descriptor table at the front of every usable zone.
///
/// Zones too small to hold their own table and at least one page besides it
/// are marked unusable instead.
///
/// # Safety
/// - Every usable zone must be mapped, writable and exclusively owned by the
///   memory manager.
/// - Must run at most once over a set of zones; a second run would place new
///   tables on top of pages that are already handed out as descriptors.
pub(crate) unsafe fn place_descriptor_tables(zones: &mut [Zone]) {
    for (i, zone) in zones.iter_mut().enumerate() {
        if !zone.is_usable() {
            continue;
        }
        unsafe {
            place_descriptor_table(zone);
        }
        debug!("pz{i}: {zone}");
    }
}

/// # Safety
/// See [`place_descriptor_tables`].
#[allow(clippy::cast_possible_truncation)]
unsafe fn place_descriptor_table(zone: &mut Zone) {
    let total_pages = zone.page_count();
    let needed_bytes = DescriptorTable::bytes_for(total_pages);
    let needed_pages = Size4K::pages_for(needed_bytes);

    if needed_pages >= total_pages {
        // no page would be left over for the table to describe
        zone.mark_unusable();
        return;
    }

    let table = unsafe { DescriptorTable::place(zone.start(), total_pages as usize) };
    zone.set_start((zone.start() + needed_bytes).align_up::<Size4K>());
    zone.attach_descriptors(table);
}
