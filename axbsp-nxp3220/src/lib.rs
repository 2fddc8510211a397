//! NXP3220 board support: CPU operating points and dynamic voltage and
//! frequency scaling on top of the Nexell clock layer.

#![cfg_attr(not(test), no_std)]

pub mod board;
pub mod cpufreq;
pub mod error;
pub mod opp;
pub mod policy;
pub mod regulator;
#[cfg(test)]
mod testing;

pub use cpufreq::{Dvfs, Transition};
pub use error::{DvfsError, Fault, Restore, RollbackStatus};
pub use opp::{OperatingPoint, OppTable, VoltageTriplet};
pub use policy::{CPUFREQ_ETERNAL, CpufreqPolicy};
pub use regulator::{Regulator, RegulatorError};
