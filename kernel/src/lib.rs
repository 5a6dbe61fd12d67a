//! MelloOS exec
//!
//! The image-replacement path of the MelloOS kernel: capture the caller's
//! arguments, build and load a new address space, lay out the new user stack,
//! then either commit to the new image or roll back to the old one.
//!
//! Everything the exec path needs from the rest of the kernel (VFS, address
//! spaces, user copies, the jump to user mode) is consumed through traits, so
//! the crate builds for the kernel target and runs its tests on the host.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
pub mod log;

pub mod config;
pub mod fs;
pub mod mm;
pub mod sys;
pub mod user;
