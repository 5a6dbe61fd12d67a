//! In-memory machine for exercising exec without hardware
//!
//! `MockKernel` keeps one byte map per address space and routes every user
//! copy through whichever space was last activated, so tests see exactly what
//! the transaction wrote into which space. Failures can be injected at every
//! collaborator call.

use super::{ExecError, ImageLoader};
use crate::config::{POINTER_SIZE, USER_STACK_TOP};
use crate::fs::{FsError, OpenFlags, Vfs};
use crate::mm::addrspace::{AddressSpaces, UserStack};
use crate::mm::uaccess::{CopyError, UserMemory};
use crate::mm::{MmError, VirtAddr};
use crate::user::process::{ExecProcess, Process, UserEntry};
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

/// Panic payload used by `MockProcess` to model a successful jump to user mode
pub const ENTERED_USER_MODE: &str = "mock: entered user mode";

/// Where `UserImage` places the caller's path and argv
pub const USER_DATA_BASE: u64 = 0x0060_0000;

const IMAGE_BASE: u64 = 0x0040_0000;

/// Address space handle; deliberately not `Clone`
#[derive(Debug, PartialEq, Eq)]
pub struct MockSpace {
    id: u32,
}

impl MockSpace {
    pub fn id(&self) -> u32 {
        self.id
    }
}

#[derive(Debug, Default)]
struct SpaceMemory {
    regions: Vec<(u64, Vec<u8>)>,
}

impl SpaceMemory {
    fn region(&mut self, addr: u64, len: usize) -> Option<&mut [u8]> {
        let end = addr.checked_add(len as u64)?;
        self.regions.iter_mut().find_map(|(base, bytes)| {
            if addr >= *base && end <= *base + bytes.len() as u64 {
                let start = (addr - *base) as usize;
                Some(&mut bytes[start..start + len])
            } else {
                None
            }
        })
    }
}

#[derive(Debug)]
pub struct MockFile {
    pub path: String,
}

pub struct MockKernel {
    spaces: BTreeMap<u32, SpaceMemory>,
    next_id: u32,
    /// Space the CPU currently translates through
    pub active: Option<u32>,
    pub activations: usize,
    pub created: usize,
    pub destroyed: Vec<u32>,
    pub executables: Vec<String>,
    pub opened: Vec<String>,
    pub open_files: usize,
    pub closes: usize,
    pub entry: VirtAddr,
    pub stack_size: u64,
    pub fail_open: Option<FsError>,
    pub fail_create: bool,
    pub fail_load: Option<ExecError>,
    pub fail_close: Option<FsError>,
    pub fail_stack: Option<MmError>,
    /// Refuse every write into user memory
    pub fault_writes: bool,
}

impl MockKernel {
    pub fn new() -> Self {
        Self {
            spaces: BTreeMap::new(),
            next_id: 1,
            active: None,
            activations: 0,
            created: 0,
            destroyed: Vec::new(),
            executables: ["/bin/true", "/bin/sh", "/bin/echo", "/testbin/argtest"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            opened: Vec::new(),
            open_files: 0,
            closes: 0,
            entry: VirtAddr::new(IMAGE_BASE + 0x120),
            stack_size: 16 * 1024,
            fail_open: None,
            fail_create: false,
            fail_load: None,
            fail_close: None,
            fail_stack: None,
            fault_writes: false,
        }
    }

    /// Create a space outside of any transaction (the caller's original image)
    pub fn new_space(&mut self) -> MockSpace {
        let id = self.next_id;
        self.next_id += 1;
        self.spaces.insert(id, SpaceMemory::default());
        MockSpace { id }
    }

    pub fn map(&mut self, space: u32, base: u64, bytes: Vec<u8>) {
        if let Some(memory) = self.spaces.get_mut(&space) {
            memory.regions.push((base, bytes));
        }
    }

    /// Overwrite bytes inside an existing mapping
    pub fn write(&mut self, space: u32, addr: u64, bytes: &[u8]) -> bool {
        let Some(memory) = self.spaces.get_mut(&space) else {
            return false;
        };
        match memory.region(addr, bytes.len()) {
            Some(dest) => {
                dest.copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }

    pub fn read(&mut self, space: u32, addr: u64, len: usize) -> Option<Vec<u8>> {
        let memory = self.spaces.get_mut(&space)?;
        memory.region(addr, len).map(|bytes| bytes.to_vec())
    }

    pub fn read_word(&mut self, space: u32, addr: u64) -> Option<u64> {
        let bytes = self.read(space, addr, POINTER_SIZE)?;
        let mut word = [0u8; POINTER_SIZE];
        word.copy_from_slice(&bytes);
        Some(u64::from_le_bytes(word))
    }

    pub fn read_string(&mut self, space: u32, addr: u64) -> Option<String> {
        let mut bytes = Vec::new();
        let mut cursor = addr;
        loop {
            let byte = self.read(space, cursor, 1)?[0];
            if byte == 0 {
                return String::from_utf8(bytes).ok();
            }
            bytes.push(byte);
            cursor += 1;
        }
    }

    pub fn live_spaces(&self) -> usize {
        self.spaces.len()
    }

    fn active_memory(&mut self) -> Result<&mut SpaceMemory, CopyError> {
        let id = self.active.ok_or(CopyError::Fault)?;
        self.spaces.get_mut(&id).ok_or(CopyError::Fault)
    }
}

impl Vfs for MockKernel {
    type File = MockFile;

    fn open(&mut self, path: &str, flags: OpenFlags) -> Result<MockFile, FsError> {
        assert_eq!(flags, OpenFlags::READ_ONLY, "exec must open images read-only");
        self.opened.push(path.to_string());
        if let Some(err) = self.fail_open {
            return Err(err);
        }
        if !self.executables.iter().any(|p| p == path) {
            return Err(FsError::NotFound);
        }
        self.open_files += 1;
        Ok(MockFile {
            path: path.to_string(),
        })
    }

    fn close(&mut self, _file: MockFile) -> Result<(), FsError> {
        self.open_files -= 1;
        self.closes += 1;
        match self.fail_close {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl AddressSpaces for MockKernel {
    type Space = MockSpace;

    fn as_create(&mut self) -> Option<MockSpace> {
        if self.fail_create {
            return None;
        }
        self.created += 1;
        Some(self.new_space())
    }

    fn as_activate(&mut self, space: Option<&MockSpace>) {
        self.activations += 1;
        self.active = space.map(|s| s.id);
    }

    fn as_define_stack(&mut self, space: &mut MockSpace) -> Result<UserStack, MmError> {
        if let Some(err) = self.fail_stack {
            return Err(err);
        }
        let stack = UserStack::with_size(VirtAddr::new(USER_STACK_TOP), self.stack_size)
            .ok_or(MmError::InvalidRegion)?;
        self.map(space.id, stack.base.as_u64(), vec![0u8; self.stack_size as usize]);
        Ok(stack)
    }

    fn as_destroy(&mut self, space: MockSpace) {
        assert!(
            self.spaces.remove(&space.id).is_some(),
            "address space {} destroyed twice",
            space.id
        );
        if self.active == Some(space.id) {
            self.active = None;
        }
        self.destroyed.push(space.id);
    }
}

impl ImageLoader for MockKernel {
    fn load_image(&mut self, space: &mut MockSpace, file: &mut MockFile) -> Result<VirtAddr, ExecError> {
        assert_eq!(self.active, Some(space.id), "image loaded into an inactive space");
        assert!(self.executables.contains(&file.path));
        if let Some(err) = self.fail_load {
            return Err(err);
        }
        self.map(space.id, IMAGE_BASE, vec![0x90; 0x1000]);
        Ok(self.entry)
    }
}

impl UserMemory for MockKernel {
    fn copy_in(&mut self, src: VirtAddr, dest: &mut [u8]) -> Result<(), CopyError> {
        let memory = self.active_memory()?;
        let bytes = memory.region(src.as_u64(), dest.len()).ok_or(CopyError::Fault)?;
        dest.copy_from_slice(bytes);
        Ok(())
    }

    fn copy_out(&mut self, src: &[u8], dest: VirtAddr) -> Result<(), CopyError> {
        if self.fault_writes {
            return Err(CopyError::Fault);
        }
        let memory = self.active_memory()?;
        let bytes = memory.region(dest.as_u64(), src.len()).ok_or(CopyError::Fault)?;
        bytes.copy_from_slice(src);
        Ok(())
    }
}

pub struct MockProcess {
    pub inner: Process<MockSpace>,
    pub entered: Option<UserEntry>,
    /// Model a jump to user mode that comes back
    pub enter_returns: bool,
}

impl MockProcess {
    pub fn new(space: Option<MockSpace>) -> Self {
        Self {
            inner: Process::new(1, "sh".to_string(), space),
            entered: None,
            enter_returns: false,
        }
    }

    pub fn space_id(&self) -> Option<u32> {
        self.inner.address_space().map(MockSpace::id)
    }
}

impl ExecProcess for MockProcess {
    type Space = MockSpace;

    fn process(&self) -> &Process<MockSpace> {
        &self.inner
    }

    fn process_mut(&mut self) -> &mut Process<MockSpace> {
        &mut self.inner
    }

    fn enter_new_process(&mut self, entry: UserEntry) {
        self.entered = Some(entry);
        if !self.enter_returns {
            panic!("{}", ENTERED_USER_MODE);
        }
    }
}

/// Path and argv as the calling program would have laid them out
pub struct UserImage {
    path: String,
    args: Vec<String>,
}

/// User addresses of an installed `UserImage`
#[derive(Debug, Clone, Copy)]
pub struct InstalledImage {
    pub path: VirtAddr,
    pub argv: VirtAddr,
    /// Address of argv[i] for each argument
    pub slots: [Option<VirtAddr>; 4],
}

impl UserImage {
    pub fn new(path: &str, args: &[&str]) -> Self {
        Self {
            path: path.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Serialize into one data region: strings first, then the argv array
    fn layout(&self) -> (Vec<u8>, u64, u64) {
        let mut bytes = Vec::new();
        let push_string = |bytes: &mut Vec<u8>, s: &str| {
            let at = USER_DATA_BASE + bytes.len() as u64;
            bytes.extend_from_slice(s.as_bytes());
            bytes.push(0);
            at
        };

        let path = push_string(&mut bytes, self.path.as_str());
        let arg_ptrs: Vec<u64> = self.args.iter().map(|a| push_string(&mut bytes, a.as_str())).collect();

        while bytes.len() % POINTER_SIZE != 0 {
            bytes.push(0);
        }
        let argv = USER_DATA_BASE + bytes.len() as u64;
        for ptr in arg_ptrs.iter().chain(core::iter::once(&0)) {
            bytes.extend_from_slice(&ptr.to_le_bytes());
        }
        (bytes, path, argv)
    }

    /// Build a machine whose current process has this image in its address space
    pub fn install(self) -> (MockKernel, MockProcess, InstalledImage) {
        let mut kernel = MockKernel::new();
        let (bytes, path, argv) = self.layout();

        let space = kernel.new_space();
        kernel.map(space.id, USER_DATA_BASE, bytes);
        kernel.as_activate(Some(&space));
        kernel.activations = 0;

        let mut slots = [None; 4];
        for (i, slot) in slots.iter_mut().enumerate().take(self.args.len()) {
            *slot = Some(VirtAddr::new(argv + (i * POINTER_SIZE) as u64));
        }

        let image = InstalledImage {
            path: VirtAddr::new(path),
            argv: VirtAddr::new(argv),
            slots,
        };
        (kernel, MockProcess::new(Some(space)), image)
    }
}

/// How a call that may enter user mode finished
pub enum EntryOutcome<R> {
    Returned(R),
    Entered,
}

impl<R> EntryOutcome<R> {
    pub fn entered(&self) -> bool {
        matches!(self, EntryOutcome::Entered)
    }
}

/// Run `f`, treating the mock's user-mode panic as a successful jump
///
/// Any other panic is propagated.
pub fn catch_entry<R>(f: impl FnOnce() -> R) -> EntryOutcome<R> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(value) => EntryOutcome::Returned(value),
        Err(payload) => {
            let message = payload
                .downcast_ref::<String>()
                .map(String::as_str)
                .or_else(|| payload.downcast_ref::<&str>().copied());
            if message == Some(ENTERED_USER_MODE) {
                EntryOutcome::Entered
            } else {
                std::panic::resume_unwind(payload)
            }
        }
    }
}
