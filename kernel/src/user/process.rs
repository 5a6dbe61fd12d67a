//! Process identity as seen by exec
//!
//! Exec touches exactly two pieces of per-process state: the display name and
//! the address-space slot. Both live in [`Process`]. The jump into user mode
//! is architecture glue and comes in through [`ExecProcess`].

use crate::mm::VirtAddr;
use alloc::string::String;
use core::mem;

/// Process identifier type
pub type ProcessId = usize;

/// The per-process state exec reads and rewrites
#[derive(Debug)]
pub struct Process<S> {
    /// Process ID
    pub pid: ProcessId,

    /// Display name (the path of the running image)
    name: String,

    /// Address space the process runs in, `None` for kernel-only processes
    addrspace: Option<S>,
}

impl<S> Process<S> {
    /// Create a process record
    pub fn new(pid: ProcessId, name: String, addrspace: Option<S>) -> Self {
        Self {
            pid,
            name,
            addrspace,
        }
    }

    /// Current display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Install a new display name, handing back the previous one
    pub fn replace_name(&mut self, name: String) -> String {
        mem::replace(&mut self.name, name)
    }

    /// Swap the address-space slot, returning what was installed before
    ///
    /// This only changes bookkeeping. The caller activates the result.
    pub fn set_address_space(&mut self, space: Option<S>) -> Option<S> {
        mem::replace(&mut self.addrspace, space)
    }

    pub fn address_space(&self) -> Option<&S> {
        self.addrspace.as_ref()
    }

    pub fn address_space_mut(&mut self) -> Option<&mut S> {
        self.addrspace.as_mut()
    }
}

/// Initial user-mode register state for a freshly loaded image
///
/// The startup code receives `argc` and `argv` in its first two argument
/// registers; `argv` points into the new stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserEntry {
    pub argc: usize,
    pub argv: VirtAddr,
    pub stack_pointer: VirtAddr,
    pub entry: VirtAddr,
}

/// The calling process, as handed to exec
pub trait ExecProcess {
    /// Address-space type stored in the process slot
    type Space;

    fn process(&self) -> &Process<Self::Space>;

    fn process_mut(&mut self) -> &mut Process<Self::Space>;

    /// Drop to user mode at `entry`
    ///
    /// Does not return when the transfer succeeds. Returning at all means the
    /// new image could not be entered.
    fn enter_new_process(&mut self, entry: UserEntry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_replace_name_returns_previous() {
        let mut process: Process<u32> = Process::new(7, "init".to_string(), None);
        let old = process.replace_name("/bin/sh".to_string());
        assert_eq!(old, "init");
        assert_eq!(process.name(), "/bin/sh");
    }

    #[test]
    fn test_set_address_space_swaps_slot() {
        let mut process = Process::new(1, "init".to_string(), Some(10u32));
        assert_eq!(process.set_address_space(Some(20)), Some(10));
        assert_eq!(process.address_space(), Some(&20));

        *process.address_space_mut().unwrap() = 21;
        assert_eq!(process.set_address_space(None), Some(21));
        assert!(process.address_space().is_none());
    }
}
