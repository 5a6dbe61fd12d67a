//! Address-space seam
//!
//! Exec builds a brand new address space next to the running one and only
//! makes it current once it exists. Everything it needs from the VM layer is
//! expressed by [`AddressSpaces`].

use super::{MmError, VirtAddr};

/// User stack region handed back by [`AddressSpaces::as_define_stack`]
///
/// `pointer` is the initial stack pointer (top of the region) and `base` is
/// the lowest address the stack may grow down to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserStack {
    pub pointer: VirtAddr,
    pub base: VirtAddr,
}

impl UserStack {
    /// Stack of `size` bytes ending at `top`
    ///
    /// Returns `None` if the region would start below address zero.
    pub fn with_size(top: VirtAddr, size: u64) -> Option<Self> {
        let base = top.as_u64().checked_sub(size)?;
        Some(Self {
            pointer: top,
            base: VirtAddr::new(base),
        })
    }

    /// Bytes left between the stack pointer and the bottom of the region
    pub fn available(&self) -> u64 {
        self.pointer.as_u64().saturating_sub(self.base.as_u64())
    }
}

/// Address-space lifecycle operations
///
/// Spaces are owned values: creating one hands ownership to the caller and
/// destroying one consumes it, so a space can never be destroyed twice.
pub trait AddressSpaces {
    /// An address space (page-table root plus region list)
    type Space;

    /// Create an empty address space, `None` when memory is exhausted
    fn as_create(&mut self) -> Option<Self::Space>;

    /// Make `space` the one the CPU translates user addresses through
    ///
    /// `None` leaves the CPU with kernel mappings only.
    fn as_activate(&mut self, space: Option<&Self::Space>);

    /// Map the user stack region of `space`
    fn as_define_stack(&mut self, space: &mut Self::Space) -> Result<UserStack, MmError>;

    /// Tear down `space` and release every frame it maps
    fn as_destroy(&mut self, space: Self::Space);
}
