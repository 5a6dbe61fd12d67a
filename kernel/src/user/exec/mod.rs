//! exec() system call implementation
//!
//! This module replaces the image of the calling process with a program loaded
//! from the filesystem: new address space, new stack, new argument vector.
//!
//! # Overview
//!
//! The work is tracked by one [`ExecTransaction`] record that moves through
//! these stages:
//! 1. Capture the path and argv from user memory into kernel strings
//! 2. Open the executable and build a new address space next to the old one
//! 3. Switch to the new address space and load the image into it
//! 4. Define the new stack and lay the arguments out on it
//! 5. Commit: discard the old address space and enter the new image
//!
//! Any failure before step 5 rolls the process back to its original image and
//! is returned to the caller. Once the old address space has been destroyed
//! there is nothing to return to, so a failure to enter the new image panics.
//!
//! All resource release goes through [`ExecTransaction::cleanup`], which reads
//! what the record currently owns instead of where execution stopped.

mod args;
mod provision;
mod stack;
mod transaction;

#[cfg(test)]
pub(crate) mod mock;

pub use stack::push_arguments;
pub use transaction::{ExecTransaction, FileStage, FileState, SpaceStage, SpaceState};

use crate::fs::{FsError, Vfs};
use crate::mm::addrspace::AddressSpaces;
use crate::mm::uaccess::{CopyError, UserMemory};
use crate::mm::{MmError, VirtAddr};
use crate::user::process::ExecProcess;
use core::convert::Infallible;
use core::fmt;

/// Errors that can occur during exec()
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    /// Bad user pointer (EFAULT)
    Fault,

    /// Invalid argument (EINVAL)
    InvalidArgument,

    /// Out of memory (ENOMEM)
    OutOfMemory,

    /// File not found (ENOENT)
    FileNotFound,

    /// Permission denied (EACCES)
    PermissionDenied,

    /// A path component is not a directory (ENOTDIR)
    NotADirectory,

    /// I/O error (EIO)
    IoError,

    /// Invalid executable format (ENOEXEC)
    InvalidFormat,

    /// Path too long (ENAMETOOLONG)
    NameTooLong,

    /// Argument list too long (E2BIG)
    ArgumentListTooLong,
}

impl ExecError {
    /// Convert ExecError to errno value
    ///
    /// Returns the negative errno value that should be returned to userspace.
    pub fn to_errno(self) -> isize {
        match self {
            ExecError::Fault => -14,              // EFAULT
            ExecError::InvalidArgument => -22,    // EINVAL
            ExecError::OutOfMemory => -12,        // ENOMEM
            ExecError::FileNotFound => -2,        // ENOENT
            ExecError::PermissionDenied => -13,   // EACCES
            ExecError::NotADirectory => -20,      // ENOTDIR
            ExecError::IoError => -5,             // EIO
            ExecError::InvalidFormat => -8,       // ENOEXEC
            ExecError::NameTooLong => -36,        // ENAMETOOLONG
            ExecError::ArgumentListTooLong => -7, // E2BIG
        }
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::Fault => write!(f, "Bad address"),
            ExecError::InvalidArgument => write!(f, "Invalid argument"),
            ExecError::OutOfMemory => write!(f, "Out of memory"),
            ExecError::FileNotFound => write!(f, "File not found"),
            ExecError::PermissionDenied => write!(f, "Permission denied"),
            ExecError::NotADirectory => write!(f, "Not a directory"),
            ExecError::IoError => write!(f, "I/O error"),
            ExecError::InvalidFormat => write!(f, "Invalid executable format"),
            ExecError::NameTooLong => write!(f, "File name too long"),
            ExecError::ArgumentListTooLong => write!(f, "Argument list too long"),
        }
    }
}

impl From<FsError> for ExecError {
    fn from(err: FsError) -> Self {
        match err {
            FsError::NotFound => ExecError::FileNotFound,
            FsError::PermissionDenied | FsError::IsADirectory => ExecError::PermissionDenied,
            FsError::NotADirectory => ExecError::NotADirectory,
            FsError::InvalidArgument => ExecError::InvalidArgument,
            FsError::OutOfMemory => ExecError::OutOfMemory,
            FsError::BadAddress => ExecError::Fault,
            FsError::NameTooLong => ExecError::NameTooLong,
            FsError::IoError | FsError::TooManyOpenFiles => ExecError::IoError,
        }
    }
}

impl From<MmError> for ExecError {
    fn from(err: MmError) -> Self {
        match err {
            MmError::OutOfMemory => ExecError::OutOfMemory,
            MmError::InvalidRegion => ExecError::InvalidArgument,
        }
    }
}

impl From<CopyError> for ExecError {
    fn from(err: CopyError) -> Self {
        match err {
            CopyError::Fault => ExecError::Fault,
            CopyError::NameTooLong => ExecError::NameTooLong,
            CopyError::InvalidEncoding => ExecError::InvalidArgument,
            CopyError::OutOfMemory => ExecError::OutOfMemory,
        }
    }
}

/// Loads an executable image into an address space
pub trait ImageLoader: Vfs + AddressSpaces {
    /// Map the program described by `file` into `space`
    ///
    /// `space` is the active address space when this is called. Returns the
    /// entry point of the image.
    fn load_image(
        &mut self,
        space: &mut Self::Space,
        file: &mut Self::File,
    ) -> Result<VirtAddr, ExecError>;
}

/// Everything exec needs from the rest of the kernel
pub trait ExecKernel: ImageLoader + UserMemory {}

impl<T: ImageLoader + UserMemory> ExecKernel for T {}

/// Replace the image of `process` with the program at `pathname`
///
/// `pathname` points to a null-terminated path in user memory and `argv` to a
/// null-terminated array of pointers to null-terminated strings.
///
/// # Returns
/// Never returns on success (execution continues at the new program).
/// Returns Err on failure, with the process still running its original image.
///
/// # Errors
/// * Fault - A user pointer is invalid or unreadable
/// * InvalidArgument - Empty path or empty argument
/// * NameTooLong - Path longer than PATH_MAX
/// * ArgumentListTooLong - Too many arguments or more than ARG_MAX bytes
/// * OutOfMemory - Kernel allocation failed or the arguments overflow the stack
/// * FileNotFound / PermissionDenied / NotADirectory / IoError / InvalidFormat -
///   Passed through from the filesystem and the image loader
///
/// # Panics
/// If the new image cannot be entered after the old address space is gone.
pub fn replace_image<K, P>(
    kernel: &mut K,
    process: &mut P,
    pathname: VirtAddr,
    argv: VirtAddr,
) -> Result<Infallible, ExecError>
where
    K: ExecKernel,
    P: ExecProcess<Space = K::Space>,
{
    let mut txn = ExecTransaction::new(kernel, process);

    match txn.prepare(pathname, argv) {
        Ok(()) => txn.commit(),
        Err(err) => Err(txn.abort(err)),
    }
}
