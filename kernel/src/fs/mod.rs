//! Filesystem seam
//!
//! The exec path only needs to open an executable by path and close it again
//! once the image has been loaded. The VFS itself lives outside this crate and
//! is reached through the [`Vfs`] trait.

use core::fmt;

bitflags::bitflags! {
    /// Access mode passed to [`Vfs::open`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const WRITE = 1 << 0;
        const READ_WRITE = 1 << 1;
    }
}

impl OpenFlags {
    /// O_RDONLY is the absence of every access bit
    pub const READ_ONLY: OpenFlags = OpenFlags::empty();
}

/// Filesystem error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// Invalid argument
    InvalidArgument,
    /// Not found
    NotFound,
    /// Permission denied
    PermissionDenied,
    /// Not a directory
    NotADirectory,
    /// Is a directory
    IsADirectory,
    /// I/O error
    IoError,
    /// Out of memory
    OutOfMemory,
    /// Bad address
    BadAddress,
    /// Name too long
    NameTooLong,
    /// Too many open files
    TooManyOpenFiles,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::InvalidArgument => write!(f, "Invalid argument"),
            FsError::NotFound => write!(f, "No such file or directory"),
            FsError::PermissionDenied => write!(f, "Permission denied"),
            FsError::NotADirectory => write!(f, "Not a directory"),
            FsError::IsADirectory => write!(f, "Is a directory"),
            FsError::IoError => write!(f, "I/O error"),
            FsError::OutOfMemory => write!(f, "Out of memory"),
            FsError::BadAddress => write!(f, "Bad address"),
            FsError::NameTooLong => write!(f, "File name too long"),
            FsError::TooManyOpenFiles => write!(f, "Too many open files"),
        }
    }
}

/// Virtual filesystem operations used by exec
pub trait Vfs {
    /// Handle to an open file
    type File;

    /// Open the file at `path`
    fn open(&mut self, path: &str, flags: OpenFlags) -> Result<Self::File, FsError>;

    /// Close a handle returned by [`Vfs::open`]
    ///
    /// The handle is consumed even when closing reports an error.
    fn close(&mut self, file: Self::File) -> Result<(), FsError>;
}
