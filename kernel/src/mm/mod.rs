// Memory Management Module
// Address-space and user-copy seams consumed by exec

pub mod addrspace;
pub mod uaccess;

pub use x86_64::VirtAddr;

use core::fmt;

/// Errors reported by the address-space layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmError {
    /// No frames or page tables left
    OutOfMemory,
    /// Requested region overlaps an existing one or leaves user space
    InvalidRegion,
}

impl fmt::Display for MmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmError::OutOfMemory => write!(f, "Out of memory"),
            MmError::InvalidRegion => write!(f, "Invalid memory region"),
        }
    }
}
