//! The exec transaction record, commit and cleanup
//!
//! Every resource exec acquires is stored in [`ExecTransaction`] the moment
//! it is acquired, and the record's state fields say exactly what it owns.
//! [`ExecTransaction::cleanup`] releases whatever is there and clears each
//! field as it goes, so it can run any number of times from any point.

use super::{ExecError, ExecKernel};
use crate::log::set_log_pid;
use crate::mm::addrspace::UserStack;
use crate::mm::VirtAddr;
use crate::sys::METRICS;
use crate::user::process::{ExecProcess, UserEntry};
use alloc::string::String;
use alloc::vec::Vec;
use core::mem;

/// Executable file held by the transaction
#[derive(Debug)]
pub enum FileState<F> {
    Closed,
    Open(F),
}

impl<F> FileState<F> {
    pub fn stage(&self) -> FileStage {
        match self {
            FileState::Closed => FileStage::Closed,
            FileState::Open(_) => FileStage::Open,
        }
    }
}

/// Address spaces held by the transaction
///
/// Each variant carries the spaces the transaction is responsible for
/// releasing at that point.
#[derive(Debug)]
pub enum SpaceState<S> {
    /// Still running on the original space; nothing created
    OldFixed,
    /// New space created but not installed
    NewDefined(S),
    /// New space installed and active; `old` is kept for rollback
    NewSwitched { old: Option<S> },
    /// Committed; `old` is waiting to be destroyed
    NewFixed { old: Option<S> },
}

impl<S> SpaceState<S> {
    pub fn stage(&self) -> SpaceStage {
        match self {
            SpaceState::OldFixed => SpaceStage::OldFixed,
            SpaceState::NewDefined(_) => SpaceStage::NewDefined,
            SpaceState::NewSwitched { .. } => SpaceStage::NewSwitched,
            SpaceState::NewFixed { .. } => SpaceStage::NewFixed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStage {
    Closed,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceStage {
    OldFixed,
    NewDefined,
    NewSwitched,
    NewFixed,
}

/// One in-flight exec
///
/// Borrows the kernel services and the calling process for its whole
/// lifetime. Dropping the record without committing rolls the process back
/// to its original image.
pub struct ExecTransaction<'k, K, P>
where
    K: ExecKernel,
    P: ExecProcess<Space = K::Space>,
{
    pub(super) kernel: &'k mut K,
    pub(super) process: &'k mut P,

    /// Kernel copy of the pathname
    pub(super) path: Option<String>,

    /// Kernel copies of argv, in argv order
    pub(super) arguments: Option<Vec<String>>,

    pub(super) file: FileState<K::File>,
    pub(super) space: SpaceState<K::Space>,

    /// Entry point reported by the image loader
    pub(super) entry: Option<VirtAddr>,

    /// New user stack; `pointer` moves down as arguments are pushed
    pub(super) stack: Option<UserStack>,

    /// User-stack addresses of the copied argument strings
    pub(super) user_argv: Option<Vec<VirtAddr>>,

    /// First failure recorded, never overwritten
    pub(super) error: Option<ExecError>,
}

impl<'k, K, P> ExecTransaction<'k, K, P>
where
    K: ExecKernel,
    P: ExecProcess<Space = K::Space>,
{
    pub fn new(kernel: &'k mut K, process: &'k mut P) -> Self {
        set_log_pid(process.process().pid as u32);

        Self {
            kernel,
            process,
            path: None,
            arguments: None,
            file: FileState::Closed,
            space: SpaceState::OldFixed,
            entry: None,
            stack: None,
            user_argv: None,
            error: None,
        }
    }

    pub fn file_stage(&self) -> FileStage {
        self.file.stage()
    }

    pub fn space_stage(&self) -> SpaceStage {
        self.space.stage()
    }

    /// The root-cause error, if anything has failed
    pub fn error(&self) -> Option<ExecError> {
        self.error
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn arguments(&self) -> Option<&[String]> {
        self.arguments.as_deref()
    }

    pub fn entry_point(&self) -> Option<VirtAddr> {
        self.entry
    }

    pub fn stack(&self) -> Option<UserStack> {
        self.stack
    }

    pub fn user_argv(&self) -> Option<&[VirtAddr]> {
        self.user_argv.as_deref()
    }

    /// Record `err` unless an earlier failure is already recorded
    ///
    /// Returns the recorded root cause.
    pub(super) fn fail(&mut self, err: ExecError) -> ExecError {
        *self.error.get_or_insert(err)
    }

    /// Capture the arguments, build the new image and lay out its stack
    ///
    /// On error the transaction still owns whatever it had acquired; call
    /// [`abort`](Self::abort) or drop it to roll back.
    pub fn prepare(&mut self, pathname: VirtAddr, argv: VirtAddr) -> Result<(), ExecError> {
        log_debug!("exec", "prepare: pathname={:#x} argv={:#x}", pathname.as_u64(), argv.as_u64());

        self.run_stages(pathname, argv).map_err(|err| self.fail(err))
    }

    fn run_stages(&mut self, pathname: VirtAddr, argv: VirtAddr) -> Result<(), ExecError> {
        self.capture_arguments(pathname, argv)?;
        self.provision()?;
        self.marshal_arguments()
    }

    /// Roll back after `err` and return the error the caller should see
    pub fn abort(&mut self, err: ExecError) -> ExecError {
        let root = self.fail(err);
        log_warn!(
            "exec",
            "rolling back from {:?}/{:?}: {}",
            self.file.stage(),
            self.space.stage(),
            root
        );

        self.cleanup();
        METRICS.record_rollback();
        root
    }

    /// Release everything the transaction currently owns
    ///
    /// | field        | holds          | action                                  |
    /// |--------------|----------------|-----------------------------------------|
    /// | path, argv   | present        | free                                    |
    /// | file         | `Open`         | close                                   |
    /// | space        | `NewFixed`     | destroy old space                       |
    /// | space        | `NewSwitched`  | reinstall and activate old, destroy new |
    /// | space        | `NewDefined`   | destroy new space                       |
    /// | space        | `OldFixed`     | nothing                                 |
    pub fn cleanup(&mut self) {
        self.path = None;
        self.arguments = None;
        self.user_argv = None;

        if let FileState::Open(file) = mem::replace(&mut self.file, FileState::Closed) {
            if let Err(err) = self.kernel.close(file) {
                log_warn!("exec", "close during cleanup failed: {}", err);
                self.fail(err.into());
            }
        }

        match mem::replace(&mut self.space, SpaceState::OldFixed) {
            SpaceState::OldFixed => {}
            SpaceState::NewDefined(new) => {
                self.kernel.as_destroy(new);
            }
            SpaceState::NewSwitched { old } => {
                let new = self.process.process_mut().set_address_space(old);
                self.kernel.as_activate(self.process.process().address_space());
                if let Some(new) = new {
                    self.kernel.as_destroy(new);
                }
                log_debug!("exec", "original address space restored");
            }
            SpaceState::NewFixed { old } => {
                if let Some(old) = old {
                    self.kernel.as_destroy(old);
                }
                self.space = SpaceState::NewFixed { old: None };
            }
        }
    }

    /// Discard the old image and enter the new one
    ///
    /// # Panics
    /// If any stage failed or the arguments were never laid out. The unwind
    /// drops the record, which rolls back to the old image.
    ///
    /// Also panics if entering the new image returns. The old address space
    /// is gone by then, so there is no process left to return an error to.
    pub fn commit(mut self) -> ! {
        if let Some(err) = self.error {
            panic!("[EXEC] commit after a failed stage: {}", err);
        }
        let (entry, stack) = match (self.entry, self.stack, &self.user_argv) {
            (Some(entry), Some(stack), Some(_)) => (entry, stack),
            _ => panic!("[EXEC] commit before the new image was prepared"),
        };

        let old = match mem::replace(&mut self.space, SpaceState::OldFixed) {
            SpaceState::NewSwitched { old } => old,
            other => {
                let stage = other.stage();
                self.space = other;
                panic!("[EXEC] commit from address-space stage {:?}", stage);
            }
        };
        self.space = SpaceState::NewFixed { old };

        if let Some(path) = self.path.take() {
            self.process.process_mut().replace_name(path);
        }
        let argc = self.arguments.as_ref().map_or(0, Vec::len);

        self.cleanup();
        METRICS.record_commit();

        log_info!(
            "exec",
            "committed {}: entry={:#x} sp={:#x} argc={}",
            self.process.process().name(),
            entry.as_u64(),
            stack.pointer.as_u64(),
            argc
        );

        self.process.enter_new_process(UserEntry {
            argc,
            argv: stack.pointer,
            stack_pointer: stack.pointer,
            entry,
        });

        log_error!("exec", "enter_new_process returned after commit");
        panic!("[EXEC] enter_new_process returned");
    }
}

impl<'k, K, P> Drop for ExecTransaction<'k, K, P>
where
    K: ExecKernel,
    P: ExecProcess<Space = K::Space>,
{
    fn drop(&mut self) {
        self.cleanup();
    }
}
