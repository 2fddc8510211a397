//! 32-bit register windows.
//!
//! A block is reached either through a direct MMIO mapping or, when the block
//! sits behind the secure world, through an SMC trampoline that performs the
//! access in EL3 on our behalf. Both look the same to drivers.

use core::ptr::NonNull;

use log::{debug, error};

use crate::error::RegError;

pub trait RegisterPort {
    fn read32(&self, offset: usize) -> Result<u32, RegError>;

    fn write32(&self, offset: usize, value: u32) -> Result<(), RegError>;

    /// Read-modify-write of the bits selected by `mask`.
    fn update_bits(&self, offset: usize, mask: u32, value: u32) -> Result<(), RegError> {
        let old = self.read32(offset)?;
        self.write32(offset, (old & !mask) | (value & mask))
    }
}

pub(crate) fn check_access(offset: usize, size: usize) -> Result<(), RegError> {
    if offset % 4 != 0 {
        return Err(RegError::Misaligned { offset });
    }
    match offset.checked_add(4) {
        Some(end) if end <= size => Ok(()),
        _ => Err(RegError::OutOfRange { offset, size }),
    }
}

/// Directly mapped register window.
pub struct MmioPort {
    base: NonNull<u8>,
    size: usize,
}

impl MmioPort {
    /// # Safety
    ///
    /// `base` must point to a device mapping of at least `size` bytes that
    /// stays valid for the lifetime of the port.
    pub unsafe fn new(base: NonNull<u8>, size: usize) -> Self {
        MmioPort { base, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

unsafe impl Send for MmioPort {}
unsafe impl Sync for MmioPort {}

impl RegisterPort for MmioPort {
    fn read32(&self, offset: usize) -> Result<u32, RegError> {
        check_access(offset, self.size)?;
        let reg = unsafe { self.base.add(offset).cast::<u32>() };
        Ok(unsafe { reg.read_volatile() })
    }

    fn write32(&self, offset: usize, value: u32) -> Result<(), RegError> {
        check_access(offset, self.size)?;
        let reg = unsafe { self.base.add(offset).cast::<u32>() };
        unsafe { reg.write_volatile(value) };
        Ok(())
    }
}

pub const NEXELL_SMC_FN_BASE: u32 = 0x8200_0000;
pub const NEXELL_SMC_FN_WRITE: u32 = NEXELL_SMC_FN_BASE;
pub const NEXELL_SMC_FN_READ: u32 = NEXELL_SMC_FN_BASE + 1;

/// A conduit into the secure monitor.
pub trait SecureMonitor {
    /// Issues `function_id` with two arguments and returns `x0`.
    fn call(&self, function_id: u32, arg0: u64, arg1: u64) -> u64;
}

/// SMC conduit following the SMC calling convention.
#[cfg(target_arch = "aarch64")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Smccc;

#[cfg(target_arch = "aarch64")]
impl SecureMonitor for Smccc {
    fn call(&self, function_id: u32, arg0: u64, arg1: u64) -> u64 {
        let mut x0 = function_id as u64;
        unsafe {
            core::arch::asm!(
                "smc #0",
                inout("x0") x0,
                inout("x1") arg0 => _,
                inout("x2") arg1 => _,
                inout("x3") 0u64 => _,
                out("x4") _, out("x5") _, out("x6") _, out("x7") _,
                out("x8") _, out("x9") _, out("x10") _, out("x11") _,
                out("x12") _, out("x13") _, out("x14") _, out("x15") _,
                out("x16") _, out("x17") _,
                options(nostack),
            );
        }
        x0
    }
}

/// Register window owned by the secure world, accessed by physical address.
pub struct SecurePort<M> {
    base: u64,
    size: usize,
    monitor: M,
}

impl<M: SecureMonitor> SecurePort<M> {
    pub fn new(base: u64, size: usize, monitor: M) -> Self {
        SecurePort {
            base,
            size,
            monitor,
        }
    }

    fn checked(&self, offset: usize) -> Result<u64, RegError> {
        check_access(offset, self.size).inspect_err(|_| {
            error!(
                "request {:#x} over to range {:#x}~{:#x}",
                self.base + offset as u64,
                self.base,
                self.base + self.size as u64
            );
        })?;
        Ok(self.base + offset as u64)
    }
}

impl<M: SecureMonitor> RegisterPort for SecurePort<M> {
    fn read32(&self, offset: usize) -> Result<u32, RegError> {
        let addr = self.checked(offset)?;
        let val = self.monitor.call(NEXELL_SMC_FN_READ, addr, 0) as u32;
        debug!("reg:{:#x}, val:{:#x}", addr, val);
        Ok(val)
    }

    fn write32(&self, offset: usize, value: u32) -> Result<(), RegError> {
        let addr = self.checked(offset)?;
        self.monitor.call(NEXELL_SMC_FN_WRITE, addr, value as u64);
        debug!("reg:{:#x}, val:{:#x}", addr, value);
        Ok(())
    }
}
