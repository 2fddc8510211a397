use rdif_clk::{ClockId, Interface};
use rdrive::{DriverGeneric, KError};

use core::convert::Into;
use core::result::Result::{self, *};
use log::{debug, info, warn};

use crate::error::ClkError;
use crate::pll::{Pll, REF_CLK};
use crate::regs::RegisterPort;

/// Clock id of the CPU PLL in the NXP3220 clock bindings.
pub const PLL_CPU_CLK_ID: usize = 0x2;

/// Rate control of a single clock.
pub trait ClockProvider {
    /// Rate currently produced by the hardware.
    fn get_rate(&self) -> Result<u64, ClkError>;

    /// Rate the clock would run at if `rate` were requested.
    fn round_rate(&self, rate: u64) -> Result<u64, ClkError>;

    /// Programs `rate` and returns the rate actually reached.
    fn set_rate(&mut self, rate: u64) -> Result<u64, ClkError>;
}

/// The CPU cluster clock, fed by a PLL from the reference oscillator.
pub struct CpuClock<R> {
    pll: Pll<R>,
    parent_rate: u64,
}

impl<R: RegisterPort> CpuClock<R> {
    pub fn new(pll: Pll<R>) -> Self {
        CpuClock {
            pll,
            parent_rate: REF_CLK,
        }
    }

    pub fn with_parent_rate(mut self, parent_rate: u64) -> Self {
        self.parent_rate = parent_rate;
        self
    }

    pub fn pll(&self) -> &Pll<R> {
        &self.pll
    }
}

impl<R: RegisterPort> ClockProvider for CpuClock<R> {
    fn get_rate(&self) -> Result<u64, ClkError> {
        self.pll.recalc_rate(self.parent_rate)
    }

    fn round_rate(&self, rate: u64) -> Result<u64, ClkError> {
        self.pll.round_rate(rate)
    }

    fn set_rate(&mut self, rate: u64) -> Result<u64, ClkError> {
        if rate == 0 {
            return Err(ClkError::InvalidArgument { rate });
        }
        self.pll.set_rate(rate, self.parent_rate)?;
        self.get_rate()
    }
}

/// Maps `ClkError` values to generic driver errors.
fn deal_clk_err(err: ClkError) -> KError {
    let name = match err {
        ClkError::InvalidArgument { .. } | ClkError::Unsupported { .. } => "rate",
        ClkError::HardwareTimeout { .. } => "pll_lock",
        ClkError::Register(_) => "register",
    };
    KError::InvalidArg { name }
}

/// Clock driver exposing the CPU PLL to the driver framework.
pub struct ClkDriver<R>(CpuClock<R>);

impl<R: RegisterPort> ClkDriver<R> {
    pub fn new(clock: CpuClock<R>) -> Self {
        ClkDriver(clock)
    }
}

impl<R: RegisterPort + Send + Sync + 'static> DriverGeneric for ClkDriver<R> {
    fn open(&mut self) -> Result<(), KError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), KError> {
        Ok(())
    }
}

impl<R: RegisterPort + Send + Sync + 'static> Interface for ClkDriver<R> {
    fn perper_enable(&mut self) {
        debug!("perper_enable");
    }

    fn get_rate(&self, id: ClockId) -> Result<u64, KError> {
        match id.into() {
            PLL_CPU_CLK_ID => self.0.get_rate().map_err(deal_clk_err),
            _ => {
                warn!("Unsupported clock ID: {:?}", id);
                Err(KError::InvalidArg { name: "clock_id" })
            }
        }
    }

    fn set_rate(&mut self, id: ClockId, rate: u64) -> Result<(), KError> {
        match id.into() {
            PLL_CPU_CLK_ID => {
                info!("Setting CPU PLL to {} Hz", rate);
                let rate = self.0.set_rate(rate).map_err(deal_clk_err)?;
                debug!("CPU PLL now at {} Hz", rate);
            }
            _ => {
                warn!("Unsupported clock ID: {:?}", id);
                return Err(KError::InvalidArg { name: "clock_id" });
            }
        }
        Ok(())
    }
}
