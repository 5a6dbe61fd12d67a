//! Argument marshalling onto the new user stack
//!
//! Layout after [`push_arguments`], from high to low addresses:
//!
//! ```text
//! +----------------------+ <- initial stack pointer
//! | argv[N-1] string     |
//! | ...                  |
//! | argv[0] string       |
//! +----------------------+
//! | NULL                 |
//! | argv[N-1] pointer    |
//! | ...                  |
//! | argv[0] pointer      | <- final stack pointer == argv
//! +----------------------+
//! ```
//!
//! Each string block is padded to `STACK_ALIGN`, so every pointer and the
//! final stack pointer stay aligned.

use super::transaction::ExecTransaction;
use super::{ExecError, ExecKernel};
use crate::config::{POINTER_SIZE, STACK_ALIGN};
use crate::mm::addrspace::UserStack;
use crate::mm::uaccess::{CopyError, UserMemory};
use crate::mm::VirtAddr;
use crate::user::process::ExecProcess;
use alloc::string::String;
use alloc::vec::Vec;
use x86_64::align_up;

/// Move the stack pointer down by `size` bytes
///
/// Fails with `OutOfMemory` rather than crossing the bottom of the region.
fn reserve(stack: &mut UserStack, size: u64) -> Result<VirtAddr, ExecError> {
    if size > stack.available() {
        return Err(ExecError::OutOfMemory);
    }

    stack.pointer -= size;
    Ok(stack.pointer)
}

/// Copy `arguments` and their pointer vector onto the user stack
///
/// `user_argv` receives the user address of each string followed by a null
/// sentinel. Returns the stack with its pointer at the start of the vector.
pub fn push_arguments<M: UserMemory + ?Sized>(
    mem: &mut M,
    arguments: &[String],
    stack: UserStack,
    user_argv: &mut Vec<VirtAddr>,
) -> Result<UserStack, ExecError> {
    let mut stack = stack;

    user_argv.clear();
    user_argv
        .try_reserve_exact(arguments.len() + 1)
        .map_err(|_| ExecError::OutOfMemory)?;
    user_argv.resize(arguments.len() + 1, VirtAddr::zero());

    for (index, arg) in arguments.iter().enumerate().rev() {
        let size = align_up(arg.len() as u64 + 1, STACK_ALIGN);
        let dest = reserve(&mut stack, size)?;

        mem.copy_out_string(arg, dest, size as usize).map_err(|err| match err {
            CopyError::NameTooLong => ExecError::OutOfMemory,
            other => other.into(),
        })?;
        user_argv[index] = dest;
    }

    let mut vector = Vec::new();
    vector
        .try_reserve_exact(user_argv.len() * POINTER_SIZE)
        .map_err(|_| ExecError::OutOfMemory)?;
    for ptr in user_argv.iter() {
        vector.extend_from_slice(&ptr.as_u64().to_le_bytes());
    }

    let dest = reserve(&mut stack, vector.len() as u64)?;
    mem.copy_out(&vector, dest)?;

    Ok(stack)
}

impl<'k, K, P> ExecTransaction<'k, K, P>
where
    K: ExecKernel,
    P: ExecProcess<Space = K::Space>,
{
    /// Lay the captured arguments out on the new stack
    pub(super) fn marshal_arguments(&mut self) -> Result<(), ExecError> {
        let stack = self.stack.ok_or(ExecError::InvalidArgument)?;
        let arguments = self.arguments.as_deref().unwrap_or(&[]);
        let user_argv = self.user_argv.get_or_insert_with(Vec::new);

        let stack = push_arguments(&mut *self.kernel, arguments, stack, user_argv)?;

        log_debug!(
            "exec",
            "stack ready: sp={:#x} ({} bytes of arguments)",
            stack.pointer.as_u64(),
            self.stack.map_or(0, |s| s.pointer.as_u64() - stack.pointer.as_u64())
        );
        self.stack = Some(stack);
        Ok(())
    }
}
