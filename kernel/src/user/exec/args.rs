//! Argument capture
//!
//! Copies the pathname and argv out of the caller's address space into kernel
//! strings owned by the transaction. Every user pointer is validated before it
//! is dereferenced, and nothing outside the transaction record is touched, so a
//! failure here leaves no file open and no address space created.

use super::transaction::ExecTransaction;
use super::{ExecError, ExecKernel};
use crate::config::{ARG_MAX, MAX_ARG_COUNT, PATH_MAX, POINTER_SIZE};
use crate::mm::uaccess::{probe_user, read_user_word, CopyError};
use crate::mm::VirtAddr;
use crate::user::process::ExecProcess;
use alloc::vec::Vec;

impl<'k, K, P> ExecTransaction<'k, K, P>
where
    K: ExecKernel,
    P: ExecProcess<Space = K::Space>,
{
    /// Copy `pathname` and the null-terminated `argv` array into the record
    pub(super) fn capture_arguments(&mut self, pathname: VirtAddr, argv: VirtAddr) -> Result<(), ExecError> {
        probe_user(&mut *self.kernel, pathname, 1)?;
        probe_user(&mut *self.kernel, argv, POINTER_SIZE)?;

        let pointers = self.scan_argv(argv)?;

        let path = self.kernel.copy_in_string(pathname, PATH_MAX)?;
        if path.is_empty() {
            return Err(ExecError::InvalidArgument);
        }
        self.path = Some(path);

        let mut arguments = Vec::new();
        arguments
            .try_reserve_exact(pointers.len())
            .map_err(|_| ExecError::OutOfMemory)?;
        let arguments = self.arguments.insert(arguments);

        // ARG_MAX covers every argument string including its terminator
        let mut budget = ARG_MAX;
        for ptr in pointers {
            let arg = self.kernel.copy_in_string(ptr, budget).map_err(|err| match err {
                CopyError::NameTooLong => ExecError::ArgumentListTooLong,
                other => other.into(),
            })?;
            if arg.is_empty() {
                return Err(ExecError::InvalidArgument);
            }

            budget -= arg.len() + 1;
            arguments.push(arg);
        }

        log_debug!(
            "exec",
            "captured {} with {} argument(s)",
            self.path.as_deref().unwrap_or(""),
            arguments.len()
        );
        Ok(())
    }

    /// Walk argv up to its null terminator, validating each element pointer
    fn scan_argv(&mut self, argv: VirtAddr) -> Result<Vec<VirtAddr>, ExecError> {
        let mut pointers = Vec::new();
        let mut slot = argv;

        loop {
            let word = read_user_word(&mut *self.kernel, slot)?;
            if word == 0 {
                return Ok(pointers);
            }
            if pointers.len() >= MAX_ARG_COUNT {
                return Err(ExecError::ArgumentListTooLong);
            }

            let ptr = VirtAddr::try_new(word).map_err(|_| ExecError::Fault)?;
            probe_user(&mut *self.kernel, ptr, 1)?;

            pointers.try_reserve(1).map_err(|_| ExecError::OutOfMemory)?;
            pointers.push(ptr);

            let next = slot
                .as_u64()
                .checked_add(POINTER_SIZE as u64)
                .ok_or(ExecError::Fault)?;
            slot = VirtAddr::try_new(next).map_err(|_| ExecError::Fault)?;
        }
    }
}
