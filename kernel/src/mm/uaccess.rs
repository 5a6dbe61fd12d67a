//! User Memory Access
//!
//! This module provides the validation helpers and copy primitives used to move
//! data between user space and kernel space.
//!
//! The copy primitives themselves belong to the VM layer (they have to survive
//! a page fault on a bad user address and report it instead of crashing the
//! kernel), so they are expressed as the [`UserMemory`] trait. Every copy works
//! on whichever address space is currently active.

use super::VirtAddr;
use crate::config::{POINTER_SIZE, USER_LIMIT};
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Error codes for user memory copies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyError {
    /// Address is not mapped, not in user space, or not accessible
    Fault,
    /// No terminator found within the allowed length
    NameTooLong,
    /// String bytes are not valid UTF-8
    InvalidEncoding,
    /// Kernel buffer for the copy could not be allocated
    OutOfMemory,
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyError::Fault => write!(f, "Bad address"),
            CopyError::NameTooLong => write!(f, "String too long"),
            CopyError::InvalidEncoding => write!(f, "Invalid string encoding"),
            CopyError::OutOfMemory => write!(f, "Out of memory"),
        }
    }
}

/// Validate that a pointer is in user space
///
/// # Returns
/// true if pointer is non-null and below USER_LIMIT
#[inline]
pub fn is_user_pointer(ptr: u64) -> bool {
    ptr != 0 && ptr < USER_LIMIT
}

/// Validate that a memory range is entirely in user space
///
/// # Arguments
/// * `ptr` - Start of memory range
/// * `len` - Length of memory range
///
/// # Returns
/// true if entire range is in valid user space, false otherwise
#[inline]
pub fn is_user_range(ptr: u64, len: u64) -> bool {
    if !is_user_pointer(ptr) {
        return false;
    }

    match ptr.checked_add(len) {
        Some(end) => end <= USER_LIMIT,
        None => false,
    }
}

/// Raw copy primitives between kernel buffers and the active user space
pub trait UserMemory {
    /// Copy `dest.len()` bytes from user address `src`
    fn copy_in(&mut self, src: VirtAddr, dest: &mut [u8]) -> Result<(), CopyError>;

    /// Copy `src` to user address `dest`
    fn copy_out(&mut self, src: &[u8], dest: VirtAddr) -> Result<(), CopyError>;

    /// Copy a null-terminated string from user space
    ///
    /// `max_len` bounds the string including its terminator. The returned
    /// string does not contain the terminator, so its length is exactly the
    /// number of characters copied.
    fn copy_in_string(&mut self, src: VirtAddr, max_len: usize) -> Result<String, CopyError> {
        let mut bytes = Vec::new();
        let mut addr = src.as_u64();

        loop {
            if bytes.len() >= max_len {
                return Err(CopyError::NameTooLong);
            }
            if !is_user_pointer(addr) {
                return Err(CopyError::Fault);
            }

            let mut byte = [0u8; 1];
            self.copy_in(VirtAddr::new(addr), &mut byte)?;
            if byte[0] == 0 {
                break;
            }

            bytes.try_reserve(1).map_err(|_| CopyError::OutOfMemory)?;
            bytes.push(byte[0]);
            addr += 1;
        }

        String::from_utf8(bytes).map_err(|_| CopyError::InvalidEncoding)
    }

    /// Copy `src` plus a terminator into the `len`-byte user buffer at `dest`
    fn copy_out_string(&mut self, src: &str, dest: VirtAddr, len: usize) -> Result<(), CopyError> {
        let bytes = src.as_bytes();
        if bytes.len() + 1 > len {
            return Err(CopyError::NameTooLong);
        }

        self.copy_out(bytes, dest)?;
        let terminator = dest
            .as_u64()
            .checked_add(bytes.len() as u64)
            .ok_or(CopyError::Fault)?;
        self.copy_out(&[0], VirtAddr::try_new(terminator).map_err(|_| CopyError::Fault)?)
    }
}

/// Check that `len` bytes at `ptr` are in user space and readable
///
/// The bytes are read into a scratch buffer and discarded; this is the same
/// probe a real access would trigger, so it catches unmapped pages too.
pub fn probe_user<M: UserMemory + ?Sized>(mem: &mut M, ptr: VirtAddr, len: usize) -> Result<(), CopyError> {
    let mut scratch = [0u8; POINTER_SIZE];
    if len > scratch.len() || !is_user_range(ptr.as_u64(), len as u64) {
        return Err(CopyError::Fault);
    }

    mem.copy_in(ptr, &mut scratch[..len])
}

/// Read one pointer-sized little-endian word from user space
pub fn read_user_word<M: UserMemory + ?Sized>(mem: &mut M, ptr: VirtAddr) -> Result<u64, CopyError> {
    if !is_user_range(ptr.as_u64(), POINTER_SIZE as u64) {
        return Err(CopyError::Fault);
    }

    let mut word = [0u8; POINTER_SIZE];
    mem.copy_in(ptr, &mut word)?;
    Ok(u64::from_le_bytes(word))
}
