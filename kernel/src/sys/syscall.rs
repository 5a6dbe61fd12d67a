//! System Call Interface
//!
//! Entry glue between the architecture's syscall trap and exec. The trap
//! handler passes the syscall number and raw argument registers in; the value
//! returned here goes back to user space in RAX.
//!
//! Register mapping (x86-64 System V ABI):
//! - RAX: Syscall number (input), return value (output)
//! - RDI: Argument 1
//! - RSI: Argument 2
//! - RDX: Argument 3

use super::METRICS;
use crate::mm::VirtAddr;
use crate::user::exec::{replace_image, ExecError, ExecKernel};
use crate::user::process::ExecProcess;

/// Syscall numbers
pub const SYS_EXECV: usize = 9;

/// Syscall dispatcher
///
/// Routes syscall ID to the matching handler.
///
/// # Returns
/// Handler result, or -1 for an unknown syscall ID
pub fn syscall_dispatcher<K, P>(
    kernel: &mut K,
    process: &mut P,
    syscall_id: usize,
    arg1: usize,
    arg2: usize,
    _arg3: usize,
) -> isize
where
    K: ExecKernel,
    P: ExecProcess<Space = K::Space>,
{
    let pid = process.process().pid;

    let result = match syscall_id {
        SYS_EXECV => sys_execv(kernel, process, arg1, arg2),
        _ => {
            METRICS.invalid_syscalls.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
            log_warn!("syscall", "invalid syscall ID {} from pid {}", syscall_id, pid);
            -1
        }
    };

    if result < 0 {
        log_debug!("syscall", "pid {} syscall {} failed with {}", pid, syscall_id, result);
    }
    result
}

/// sys_execv - Replace the calling process image
///
/// # Arguments
/// * `path_ptr` - Pointer to the null-terminated program path
/// * `argv_ptr` - Pointer to a null-terminated array of argument pointers
///
/// # Returns
/// Does not return on success. On failure returns a negative errno and the
/// caller keeps running its original image.
pub fn sys_execv<K, P>(kernel: &mut K, process: &mut P, path_ptr: usize, argv_ptr: usize) -> isize
where
    K: ExecKernel,
    P: ExecProcess<Space = K::Space>,
{
    METRICS.record_call();

    // Non-canonical addresses can never be user pointers
    let pathname = match VirtAddr::try_new(path_ptr as u64) {
        Ok(addr) => addr,
        Err(_) => return ExecError::Fault.to_errno(),
    };
    let argv = match VirtAddr::try_new(argv_ptr as u64) {
        Ok(addr) => addr,
        Err(_) => return ExecError::Fault.to_errno(),
    };

    match replace_image(kernel, process, pathname, argv) {
        Ok(never) => match never {},
        Err(err) => {
            log_info!("syscall", "SYS_EXECV failed: {}", err);
            err.to_errno()
        }
    }
}
