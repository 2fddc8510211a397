//! cpufreq-style policy over a DVFS domain.
//!
//! Frequencies at this surface are in kHz, the DVFS layer works in Hz.

extern crate alloc;

use alloc::vec::Vec;

use bsp_nexell::{ClockProvider, RegisterPort};
use log::{debug, info};

use crate::cpufreq::Dvfs;
use crate::error::DvfsError;
use crate::regulator::Regulator;

/// Transition latency reported when no OPP gives one.
pub const CPUFREQ_ETERNAL: u32 = u32::MAX;

pub struct CpufreqPolicy<C, R, P> {
    dvfs: Dvfs<C, R, P>,
    freq_table: Vec<u32>,
    boost: bool,
}

impl<C: ClockProvider, R: Regulator, P: RegisterPort> CpufreqPolicy<C, R, P> {
    pub fn new(dvfs: Dvfs<C, R, P>) -> Self {
        let mut policy = CpufreqPolicy {
            dvfs,
            freq_table: Vec::new(),
            boost: false,
        };
        policy.rebuild_table();
        info!(
            "cpufreq: {} frequencies, latency {} ns",
            policy.freq_table.len(),
            policy.transition_latency_ns()
        );
        policy
    }

    fn rebuild_table(&mut self) {
        let boost = self.boost;
        self.freq_table = self
            .dvfs
            .opp_table()
            .iter()
            .filter(|opp| boost || !opp.turbo)
            .map(|opp| (opp.freq_hz / 1000) as u32)
            .collect();
    }

    pub fn dvfs(&self) -> &Dvfs<C, R, P> {
        &self.dvfs
    }

    /// Selectable frequencies in kHz, ascending.
    pub fn freq_table(&self) -> &[u32] {
        &self.freq_table
    }

    pub fn has_boost_freq(&self) -> bool {
        self.dvfs.opp_table().iter().any(|opp| opp.turbo)
    }

    pub fn enable_boost(&mut self, enable: bool) {
        if self.boost != enable {
            self.boost = enable;
            self.rebuild_table();
        }
    }

    pub fn target_index(&self, index: usize) -> Result<(), DvfsError> {
        let Some(&khz) = self.freq_table.get(index) else {
            return Err(DvfsError::InvalidIndex { index });
        };
        self.dvfs.set_rate(khz as u64 * 1000)
    }

    /// Current CPU frequency in kHz.
    pub fn get(&self) -> Result<u32, DvfsError> {
        Ok((self.dvfs.get_rate()? / 1000) as u32)
    }

    /// Clamps `[min, max]` to the table and widens `max` to the next table
    /// frequency when no entry falls inside the range.
    pub fn verify(&self, min_khz: u32, max_khz: u32) -> (u32, u32) {
        let (Some(&lo), Some(&hi)) = (self.freq_table.first(), self.freq_table.last()) else {
            return (min_khz, max_khz);
        };

        let max = max_khz.clamp(lo, hi);
        let min = min_khz.clamp(lo, max);

        if self.freq_table.iter().any(|&f| f >= min && f <= max) {
            return (min, max);
        }
        let next = self
            .freq_table
            .iter()
            .copied()
            .find(|&f| f >= max)
            .unwrap_or(hi);
        (min, next)
    }

    /// Frequency in kHz to run at across system suspend.
    pub fn suspend_freq(&self) -> Option<u32> {
        self.dvfs
            .opp_table()
            .suspend_opp()
            .map(|opp| (opp.freq_hz / 1000) as u32)
    }

    pub fn suspend(&self) -> Result<(), DvfsError> {
        let Some(khz) = self.suspend_freq() else {
            debug!("cpufreq: suspend_freq not defined");
            return Ok(());
        };
        debug!("cpufreq: setting suspend-freq {} kHz", khz);
        self.dvfs.set_rate(khz as u64 * 1000)
    }

    pub fn transition_latency_ns(&self) -> u32 {
        match self.dvfs.opp_table().max_clock_latency_ns() {
            0 => CPUFREQ_ETERNAL,
            ns => ns,
        }
    }
}
