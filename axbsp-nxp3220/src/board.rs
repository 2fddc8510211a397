//! Board description of the NXP3220 CPU clock domain.
//!
//! The constants and the OPP table are generated by the build script from
//! `board/nxp3220.toml`.

use core::ptr::NonNull;

use bsp_nexell::cmu::CMU_CPU_REG_SIZE;
use bsp_nexell::pll::PLL_REG_SIZE;
use bsp_nexell::{
    ClkError, ClockProvider, CpuClock, CpuCmu, MmioPort, Pll, PollConfig, RegError, RegisterPort,
    SecureMonitor, SecurePort,
};

use crate::cpufreq::Dvfs;
use crate::opp::OppTable;
use crate::policy::CpufreqPolicy;
use crate::regulator::Regulator;

include!(concat!(env!("OUT_DIR"), "/board.rs"));

pub fn opp_table() -> OppTable {
    OppTable::from_slice(OPP_TABLE)
}

pub fn poll_config() -> PollConfig {
    PollConfig {
        max_polls: PLL_MAX_POLLS,
    }
}

/// A register window reached either directly or through the secure monitor.
pub enum SocPort<M> {
    Mmio(MmioPort),
    Secure(SecurePort<M>),
}

impl<M: SecureMonitor> SocPort<M> {
    /// # Safety
    ///
    /// `virt` must map `size` bytes of device memory at physical address
    /// `phys` for as long as the port is used.
    pub unsafe fn new(
        secure: bool,
        virt: NonNull<u8>,
        phys: u64,
        size: usize,
        monitor: M,
    ) -> Self {
        if secure {
            SocPort::Secure(SecurePort::new(phys, size, monitor))
        } else {
            SocPort::Mmio(unsafe { MmioPort::new(virt, size) })
        }
    }

    /// # Safety
    ///
    /// `virt` must map the CPU PLL block.
    pub unsafe fn pll_cpu(virt: NonNull<u8>, monitor: M) -> Self {
        unsafe { Self::new(SECURE_ACCESS, virt, PLL_CPU_BASE, PLL_REG_SIZE, monitor) }
    }

    /// # Safety
    ///
    /// `virt` must map the CMU-CPU block.
    pub unsafe fn cmu_cpu(virt: NonNull<u8>, monitor: M) -> Self {
        unsafe { Self::new(SECURE_ACCESS, virt, CMU_CPU_BASE, CMU_CPU_REG_SIZE, monitor) }
    }
}

impl<M: SecureMonitor> RegisterPort for SocPort<M> {
    fn read32(&self, offset: usize) -> Result<u32, RegError> {
        match self {
            SocPort::Mmio(port) => port.read32(offset),
            SocPort::Secure(port) => port.read32(offset),
        }
    }

    fn write32(&self, offset: usize, value: u32) -> Result<(), RegError> {
        match self {
            SocPort::Mmio(port) => port.write32(offset, value),
            SocPort::Secure(port) => port.write32(offset, value),
        }
    }
}

/// CPU clock of the board, fed from its reference oscillator.
pub fn cpu_clock<P: RegisterPort>(pll_regs: P) -> CpuClock<P> {
    let pll = Pll::new(pll_regs, PLL_VARIANT).with_poll(poll_config());
    CpuClock::new(pll).with_parent_rate(REF_CLK_HZ)
}

pub fn cpu_dvfs<P, C, R>(pll_regs: P, cmu_regs: C, regulator: Option<R>) -> Dvfs<CpuClock<P>, R, C>
where
    P: RegisterPort,
    C: RegisterPort,
    R: Regulator,
{
    Dvfs::new(
        cpu_clock(pll_regs),
        regulator,
        CpuCmu::new(cmu_regs),
        opp_table(),
    )
}

/// Brings up the CPU frequency policy and aligns the bus dividers with the
/// rate the boot loader left the PLL at.
pub fn cpufreq_init<P, C, R>(
    pll_regs: P,
    cmu_regs: C,
    regulator: Option<R>,
) -> Result<CpufreqPolicy<CpuClock<P>, R, C>, ClkError>
where
    P: RegisterPort,
    C: RegisterPort,
    R: Regulator,
{
    let clk = cpu_clock(pll_regs);
    let cmu = CpuCmu::new(cmu_regs);
    cmu.set_dividers(clk.get_rate()?)?;

    Ok(CpufreqPolicy::new(Dvfs::new(clk, regulator, cmu, opp_table())))
}
