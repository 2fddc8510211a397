//! Clock support for Nexell SoCs: PLL2555/PLL2651 rate programming, the
//! NXP3220 CMU-CPU bus dividers and the register windows they live behind.

#![cfg_attr(not(test), no_std)]

pub mod clk;
pub mod cmu;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod pll;
pub mod regs;

pub use clk::{ClkDriver, ClockProvider, CpuClock};
pub use cmu::{BusDividers, CpuCmu};
pub use error::{ClkError, RegError};
pub use pll::{Pll, PllPms, PllState, PllVariant, PollConfig};
pub use regs::{MmioPort, RegisterPort, SecureMonitor, SecurePort};
