/// User-mode support module
///
/// This module provides the exec path and the process state it rewrites:
/// - Argument capture from user memory
/// - Address-space provisioning and image loading
/// - User stack setup and the commit/rollback transaction
pub mod exec;
pub mod process;
