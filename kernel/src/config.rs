//! Configuration constants for the MelloOS exec path

use crate::log::LogLevel;

/// First address above user space (exclusive upper bound for user pointers)
pub const USER_LIMIT: u64 = 0x0000_8000_0000_0000;

/// Top of the user stack in a freshly created address space
pub const USER_STACK_TOP: u64 = 0x0000_7FFF_FFFF_0000;

/// Default size of the user stack region (64KB)
pub const USER_STACK_SIZE: u64 = 64 * 1024;

/// Maximum length of a pathname, terminator included
pub const PATH_MAX: usize = 1024;

/// Maximum combined size of all argument strings, terminators included
pub const ARG_MAX: usize = 64 * 1024;

/// Maximum number of entries in an argv array
pub const MAX_ARG_COUNT: usize = 1024;

/// Alignment of every string block pushed onto the user stack
pub const STACK_ALIGN: u64 = 8;

/// Size of a user pointer slot (argv entries)
pub const POINTER_SIZE: usize = core::mem::size_of::<u64>();

/// Log level the kernel boots with
pub const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Info;
