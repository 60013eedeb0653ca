use kernel_memory_addresses::VirtualAddress;

/// Failures reported by the physical memory manager.
///
/// Only conditions a caller may attempt speculatively are returned as values.
/// Violations of kernel invariants (looking up memory no zone covers, booting
/// without free memory) surface through the panicking wrappers instead.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PmmError {
    #[error("no physical zones registered")]
    NoZones,
    #[error("no usable physical pages")]
    NoFreePages,
    #[error("no physical zone covers {0}")]
    Unmapped(VirtualAddress),
    #[error("physical zone covering {0} has no page descriptors")]
    NoDescriptor(VirtualAddress),
    #[error("page {0} is already marked used")]
    AlreadyUsed(VirtualAddress),
    #[error("memory map descriptor size {0} is smaller than a descriptor")]
    DescriptorTooSmall(u64),
}
