//! # Kernel Boot Information

/// Information the kernel needs right after `ExitBootServices` to bring up
/// physical memory management.
/// Keep this `#[repr(C)]` and prefer fixed-size integers at the ABI boundary.
#[repr(C)]
#[derive(Clone)]
pub struct KernelBootInfo {
    /// Memory map information.
    pub mmap: MemoryMapInfo,

    /// Physical range occupied by the loaded kernel image.
    pub kernel_image: KernelImageInfo,
}

#[repr(C)]
#[derive(Clone)]
pub struct MemoryMapInfo {
    /// Pointer to the raw UEFI memory map buffer (array of `EFI_MEMORY_DESCRIPTOR` bytes).
    /// Pass 0 if no memory map is handed over.
    pub mmap_ptr: u64,

    /// Length of the memory map buffer in **bytes**.
    pub mmap_len: u64,

    /// Size of a single memory descriptor in bytes (`EFI_MEMORY_DESCRIPTOR_VERSION` dependent).
    /// May be larger than the descriptor structure the kernel was built against.
    pub mmap_desc_size: u64,

    /// Descriptor version (from UEFI). Kernel can check it matches expectations.
    pub mmap_desc_version: u32,
}

/// Physical placement of the kernel image (text, data and BSS).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KernelImageInfo {
    /// First physical byte of the image.
    pub phys_start: u64,

    /// First physical byte after the image.
    pub phys_end: u64,
}
