//! CPU operating points.

extern crate alloc;

use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoltageTriplet {
    pub min_uv: u32,
    pub target_uv: u32,
    pub max_uv: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingPoint {
    pub freq_hz: u64,
    pub voltage: VoltageTriplet,
    pub clock_latency_ns: u32,
    /// Frequency to park at across system suspend.
    pub suspend: bool,
    /// Only usable while boost is enabled.
    pub turbo: bool,
}

/// Operating points of one CPU domain, ascending by frequency.
#[derive(Debug, Clone, Default)]
pub struct OppTable {
    opps: Vec<OperatingPoint>,
}

impl OppTable {
    pub fn new(mut opps: Vec<OperatingPoint>) -> Self {
        opps.sort_by_key(|opp| opp.freq_hz);
        opps.dedup_by_key(|opp| opp.freq_hz);
        OppTable { opps }
    }

    pub fn from_slice(opps: &[OperatingPoint]) -> Self {
        Self::new(opps.to_vec())
    }

    pub fn len(&self) -> usize {
        self.opps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperatingPoint> {
        self.opps.iter()
    }

    /// Lowest operating point at or above `freq`.
    pub fn find_ceil(&self, freq: u64) -> Option<&OperatingPoint> {
        self.opps.iter().find(|opp| opp.freq_hz >= freq)
    }

    pub fn suspend_opp(&self) -> Option<&OperatingPoint> {
        self.opps.iter().find(|opp| opp.suspend)
    }

    /// Worst-case clock transition latency, zero when none is known.
    pub fn max_clock_latency_ns(&self) -> u32 {
        self.opps
            .iter()
            .map(|opp| opp.clock_latency_ns)
            .max()
            .unwrap_or(0)
    }
}
