//! Address-space provisioning
//!
//! Opens the executable, builds a fresh address space beside the running one,
//! switches the process onto it and loads the image. The old space stays
//! intact (and owned by the transaction) until commit.

use super::transaction::{ExecTransaction, FileState, SpaceState};
use super::{ExecError, ExecKernel};
use crate::fs::OpenFlags;
use crate::user::process::ExecProcess;
use core::mem;

impl<'k, K, P> ExecTransaction<'k, K, P>
where
    K: ExecKernel,
    P: ExecProcess<Space = K::Space>,
{
    pub(super) fn provision(&mut self) -> Result<(), ExecError> {
        self.open_executable()?;
        self.create_space()?;
        self.switch_to_new_space();
        self.load()?;
        self.define_stack()
    }

    fn open_executable(&mut self) -> Result<(), ExecError> {
        let path = self.path.as_deref().ok_or(ExecError::InvalidArgument)?;
        let file = self.kernel.open(path, OpenFlags::READ_ONLY)?;

        log_debug!("exec", "opened {}", path);
        self.file = FileState::Open(file);
        Ok(())
    }

    fn create_space(&mut self) -> Result<(), ExecError> {
        let space = self.kernel.as_create().ok_or(ExecError::OutOfMemory)?;
        self.space = SpaceState::NewDefined(space);
        Ok(())
    }

    /// Install the new space in the process and make it current
    fn switch_to_new_space(&mut self) {
        let new = match mem::replace(&mut self.space, SpaceState::OldFixed) {
            SpaceState::NewDefined(new) => new,
            other => {
                let stage = other.stage();
                self.space = other;
                panic!("[EXEC] switch from address-space stage {:?}", stage);
            }
        };

        let old = self.process.process_mut().set_address_space(Some(new));
        self.space = SpaceState::NewSwitched { old };
        self.kernel.as_activate(self.process.process().address_space());
    }

    /// Load the image into the active space, then close the file
    ///
    /// The file is closed whatever the load returned. A load failure is
    /// reported in preference to a close failure.
    fn load(&mut self) -> Result<(), ExecError> {
        let file = match &mut self.file {
            FileState::Open(file) => file,
            FileState::Closed => return Err(ExecError::InvalidArgument),
        };
        let Some(space) = self.process.process_mut().address_space_mut() else {
            panic!("[EXEC] process lost its address space after switch");
        };

        let loaded = self.kernel.load_image(space, file);
        let closed = self.close_executable();

        let entry = loaded?;
        closed?;

        log_debug!("exec", "image loaded, entry={:#x}", entry.as_u64());
        self.entry = Some(entry);
        Ok(())
    }

    fn close_executable(&mut self) -> Result<(), ExecError> {
        match mem::replace(&mut self.file, FileState::Closed) {
            FileState::Open(file) => self.kernel.close(file).map_err(|err| {
                log_warn!("exec", "closing executable failed: {}", err);
                ExecError::from(err)
            }),
            FileState::Closed => Ok(()),
        }
    }

    fn define_stack(&mut self) -> Result<(), ExecError> {
        let Some(space) = self.process.process_mut().address_space_mut() else {
            panic!("[EXEC] process lost its address space after switch");
        };

        let stack = self.kernel.as_define_stack(space)?;
        self.stack = Some(stack);
        Ok(())
    }
}
