//! NXP3220 CPU frequency and voltage scaling.
//!
//! A transition keeps two rules at every instant: the supply is never below
//! what the running frequency needs, and the CMU-CPU bus dividers never assume
//! a slower CPU clock than the one actually running. Voltage goes up before
//! the clock and down after it; dividers are rewritten before a speed-up and
//! after a slow-down.

use bsp_nexell::cmu::BusRates;
use bsp_nexell::{ClkError, ClockProvider, CpuCmu, RegisterPort};
use log::{debug, error, info, warn};
use spin::Mutex;

use crate::error::{DvfsError, Fault, Restore, RollbackStatus};
use crate::opp::{OperatingPoint, OppTable, VoltageTriplet};
use crate::regulator::{Regulator, RegulatorError};

/// One frequency change, alive for the duration of a `set_rate` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub old_freq: u64,
    pub new_freq: u64,
    pub old_opp: Option<OperatingPoint>,
    pub new_opp: OperatingPoint,
}

impl Transition {
    pub fn scaling_up(&self) -> bool {
        self.new_freq >= self.old_freq
    }
}

fn partial(cause: Fault, clock: Restore, voltage: Restore) -> DvfsError {
    DvfsError::PartialFailure {
        cause,
        rollback: RollbackStatus { clock, voltage },
    }
}

struct Domain<C, R, P> {
    clk: C,
    regulator: Option<R>,
    cmu: CpuCmu<P>,
}

impl<C: ClockProvider, R: Regulator, P: RegisterPort> Domain<C, R, P> {
    fn set_voltage(&mut self, supply: &VoltageTriplet) -> Result<(), RegulatorError> {
        let Some(reg) = self.regulator.as_mut() else {
            debug!("regulator not available");
            return Ok(());
        };

        debug!(
            "voltages (uV): {} {} {}",
            supply.min_uv, supply.target_uv, supply.max_uv
        );

        reg.set_voltage(supply.min_uv, supply.target_uv, supply.max_uv)
            .inspect_err(|err| {
                error!(
                    "failed to set voltage ({} {} {} uV): {}",
                    supply.min_uv, supply.target_uv, supply.max_uv, err
                )
            })
    }

    fn set_clk_only(&mut self, old_freq: u64, freq: u64) -> Result<(), ClkError> {
        if freq >= old_freq {
            self.cmu.set_dividers(freq)?;
        }

        self.clk
            .set_rate(freq)
            .inspect_err(|err| error!("failed to set clock rate: {}", err))?;

        // Only once the clock has actually dropped.
        if freq <= old_freq {
            self.cmu.set_dividers(freq)?;
        }

        Ok(())
    }

    fn restore_clock(&mut self, t: &Transition) -> Restore {
        match self.set_clk_only(t.new_freq, t.old_freq) {
            Ok(()) => Restore::Restored,
            Err(err) => {
                error!("failed to restore old-freq ({} Hz): {}", t.old_freq, err);
                Restore::Failed
            }
        }
    }

    fn restore_voltage(&mut self, t: &Transition) -> Restore {
        let Some(old_opp) = t.old_opp else {
            warn!("no OPP for {} Hz, leaving voltage as is", t.old_freq);
            return Restore::Skipped;
        };
        match self.set_voltage(&old_opp.voltage) {
            Ok(()) => Restore::Restored,
            Err(_) => Restore::Failed,
        }
    }

    fn transition_clk_only(&mut self, t: &Transition) -> Result<(), DvfsError> {
        self.set_clk_only(t.old_freq, t.new_freq).map_err(|err| {
            let clock = self.restore_clock(t);
            partial(Fault::Clock(err), clock, Restore::NotNeeded)
        })
    }

    fn transition_regulated(&mut self, t: &Transition) -> Result<(), DvfsError> {
        if t.scaling_up() {
            if let Err(err) = self.set_voltage(&t.new_opp.voltage) {
                // Clocks are untouched, just re-assert the old supply.
                self.restore_voltage(t);
                return Err(DvfsError::RegulatorFailure(err));
            }
            if let Err(err) = self.set_clk_only(t.old_freq, t.new_freq) {
                let clock = self.restore_clock(t);
                let voltage = self.restore_voltage(t);
                return Err(partial(Fault::Clock(err), clock, voltage));
            }
            return Ok(());
        }

        if let Err(err) = self.set_clk_only(t.old_freq, t.new_freq) {
            let clock = self.restore_clock(t);
            return Err(partial(Fault::Clock(err), clock, Restore::NotNeeded));
        }
        if let Err(err) = self.set_voltage(&t.new_opp.voltage) {
            let clock = self.restore_clock(t);
            let voltage = self.restore_voltage(t);
            return Err(partial(Fault::Regulator(err), clock, voltage));
        }
        Ok(())
    }
}

/// DVFS controller of one CPU clock domain.
///
/// Transitions on the same domain are serialized; separate domains are
/// independent.
pub struct Dvfs<C, R, P> {
    opps: OppTable,
    domain: Mutex<Domain<C, R, P>>,
}

impl<C: ClockProvider, R: Regulator, P: RegisterPort> Dvfs<C, R, P> {
    pub fn new(clk: C, regulator: Option<R>, cmu: CpuCmu<P>, opps: OppTable) -> Self {
        Dvfs {
            opps,
            domain: Mutex::new(Domain {
                clk,
                regulator,
                cmu,
            }),
        }
    }

    pub fn opp_table(&self) -> &OppTable {
        &self.opps
    }

    pub fn has_regulator(&self) -> bool {
        self.domain.lock().regulator.is_some()
    }

    pub fn get_rate(&self) -> Result<u64, DvfsError> {
        Ok(self.domain.lock().clk.get_rate()?)
    }

    /// Bus clock rates currently derived from the CPU clock.
    pub fn bus_rates(&self) -> Result<BusRates, DvfsError> {
        let domain = self.domain.lock();
        let rate = domain.clk.get_rate()?;
        Ok(domain.cmu.bus_rates(rate)?)
    }

    /// Moves the domain to the operating point serving `target_freq`.
    pub fn set_rate(&self, target_freq: u64) -> Result<(), DvfsError> {
        if target_freq == 0 {
            error!("Invalid target frequency {}", target_freq);
            return Err(DvfsError::InvalidArgument { freq: target_freq });
        }

        let mut domain = self.domain.lock();

        let freq = domain
            .clk
            .round_rate(target_freq)
            .inspect_err(|err| error!("cannot round {} Hz: {}", target_freq, err))?;
        let old_freq = domain.clk.get_rate()?;

        if old_freq == freq {
            debug!(
                "old/new frequencies ({} Hz) are same, nothing to do",
                freq
            );
            return Ok(());
        }

        let old_opp = self.opps.find_ceil(old_freq).copied();
        if old_opp.is_none() {
            warn!("failed to find current OPP for freq {}", old_freq);
        }

        let Some(&new_opp) = self.opps.find_ceil(freq) else {
            error!("failed to find OPP for freq {}", freq);
            return Err(DvfsError::NoOperatingPoint { freq });
        };

        let t = Transition {
            old_freq,
            new_freq: new_opp.freq_hz,
            old_opp,
            new_opp,
        };

        if t.new_freq == t.old_freq {
            debug!("already at OPP {} Hz", t.new_freq);
            return Ok(());
        }

        info!("switching OPP: {} Hz --> {} Hz", t.old_freq, t.new_freq);

        if domain.regulator.is_none() {
            domain.transition_clk_only(&t)?;
        } else {
            domain.transition_regulated(&t)?;
        }

        let actual = domain.clk.get_rate()?;
        if actual != t.new_freq {
            error!("clock settled at {} Hz instead of {} Hz", actual, t.new_freq);
            return Err(DvfsError::RateMismatch {
                expected: t.new_freq,
                actual,
            });
        }

        Ok(())
    }
}
