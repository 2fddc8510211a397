//! NXP3220 CMU-CPU bus clock dividers.
//!
//! The AXI, trace, counter, timestamp and APB clocks of the CPU cluster are
//! divided down from the ARM clock. Every register holds `divisor - 1`, zero
//! meaning bypass.

use log::debug;

use crate::error::ClkError;
use crate::regs::RegisterPort;

/// 频率常量
const MHZ: u64 = 1_000_000;

pub const CMU_AXI_OFF: usize = 0x264;
pub const CMU_ATCLK_OFF: usize = 0x268;
pub const CMU_CNTCLK_OFF: usize = 0x26c;
pub const CMU_TSCLK_OFF: usize = 0x270;
pub const CMU_DBGAPB_OFF: usize = 0x274;
pub const CMU_CPUAPB_OFF: usize = 0x278;

/// Register window size of the CMU-CPU block.
pub const CMU_CPU_REG_SIZE: usize = 0x1000;

pub const AXI_MAX_RATE: u64 = 400 * MHZ;
pub const ATCLK_MAX_RATE: u64 = 200 * MHZ;
pub const APB_MAX_RATE: u64 = 100 * MHZ;

/// Register values of the six bus dividers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusDividers {
    pub axi: u32,
    pub atclk: u32,
    pub cntclk: u32,
    pub tsclk: u32,
    pub dbgapb: u32,
    pub cpuapb: u32,
}

/// Bus clock rates in Hz derived from a CPU rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusRates {
    pub axi: u64,
    pub atclk: u64,
    pub cntclk: u64,
    pub tsclk: u64,
    pub dbgapb: u64,
    pub cpuapb: u64,
}

fn capped_divider(freq: u64, max: u64) -> u32 {
    if freq <= max {
        return 0;
    }
    let mut div = freq / max;
    if freq / div <= max {
        div -= 1;
    }
    div as u32
}

impl BusDividers {
    /// Dividers keeping every bus clock within its limit at `freq`.
    pub fn for_rate(freq: u64) -> Self {
        let axi = capped_divider(freq, AXI_MAX_RATE);
        let at = capped_divider(freq, ATCLK_MAX_RATE);
        let apb = (freq / APB_MAX_RATE).saturating_sub(1) as u32;

        BusDividers {
            axi,
            atclk: at,
            cntclk: at,
            tsclk: at,
            dbgapb: apb,
            cpuapb: apb,
        }
    }

    pub fn bus_rates(&self, cpu_rate: u64) -> BusRates {
        let div = |d: u32| cpu_rate / (d as u64 + 1);
        BusRates {
            axi: div(self.axi),
            atclk: div(self.atclk),
            cntclk: div(self.cntclk),
            tsclk: div(self.tsclk),
            dbgapb: div(self.dbgapb),
            cpuapb: div(self.cpuapb),
        }
    }

    fn regs(&self) -> [(usize, u32); 6] {
        [
            (CMU_AXI_OFF, self.axi),
            (CMU_ATCLK_OFF, self.atclk),
            (CMU_CNTCLK_OFF, self.cntclk),
            (CMU_TSCLK_OFF, self.tsclk),
            (CMU_DBGAPB_OFF, self.dbgapb),
            (CMU_CPUAPB_OFF, self.cpuapb),
        ]
    }
}

pub struct CpuCmu<R> {
    regs: R,
}

impl<R: RegisterPort> CpuCmu<R> {
    pub fn new(regs: R) -> Self {
        CpuCmu { regs }
    }

    pub fn regs(&self) -> &R {
        &self.regs
    }

    /// Writes all six dividers, whether or not they changed.
    pub fn apply(&self, dividers: &BusDividers) -> Result<(), ClkError> {
        for (offset, value) in dividers.regs() {
            self.regs.write32(offset, value)?;
        }
        Ok(())
    }

    pub fn set_dividers(&self, freq: u64) -> Result<BusDividers, ClkError> {
        let dividers = BusDividers::for_rate(freq);
        debug!("cmu-cpu: dividers for {} Hz: {:?}", freq, dividers);
        self.apply(&dividers)?;
        Ok(dividers)
    }

    pub fn read_dividers(&self) -> Result<BusDividers, ClkError> {
        let mask = 0xff;
        Ok(BusDividers {
            axi: self.regs.read32(CMU_AXI_OFF)? & mask,
            atclk: self.regs.read32(CMU_ATCLK_OFF)? & mask,
            cntclk: self.regs.read32(CMU_CNTCLK_OFF)? & mask,
            tsclk: self.regs.read32(CMU_TSCLK_OFF)? & mask,
            dbgapb: self.regs.read32(CMU_DBGAPB_OFF)? & mask,
            cpuapb: self.regs.read32(CMU_CPUAPB_OFF)? & mask,
        })
    }

    /// Bus clock rates currently produced from `cpu_rate`.
    pub fn bus_rates(&self, cpu_rate: u64) -> Result<BusRates, ClkError> {
        Ok(self.read_dividers()?.bus_rates(cpu_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockRegs, Trace};

    #[test]
    fn dividers_bypass_at_low_rates() {
        let div = BusDividers::for_rate(200 * MHZ);
        assert_eq!(div.axi, 0);
        assert_eq!(div.atclk, 0);
        assert_eq!(div.dbgapb, 1);

        let div = BusDividers::for_rate(100 * MHZ);
        assert_eq!(div, BusDividers::default());
    }

    #[test]
    fn dividers_match_reference_values() {
        let div = BusDividers::for_rate(800 * MHZ);
        assert_eq!((div.axi, div.atclk, div.dbgapb), (1, 3, 7));

        let div = BusDividers::for_rate(1000 * MHZ);
        assert_eq!((div.axi, div.atclk, div.dbgapb), (2, 4, 9));

        let div = BusDividers::for_rate(1200 * MHZ);
        assert_eq!((div.axi, div.atclk, div.dbgapb), (2, 5, 11));
    }

    #[test]
    fn divided_clocks_stay_within_limits() {
        for mhz in (50..=2500).step_by(7) {
            let freq = mhz * MHZ;
            let rates = BusDividers::for_rate(freq).bus_rates(freq);
            assert!(rates.axi <= AXI_MAX_RATE, "axi at {mhz} MHz");
            assert!(rates.atclk <= ATCLK_MAX_RATE, "atclk at {mhz} MHz");
            assert_eq!(rates.atclk, rates.cntclk);
            assert_eq!(rates.atclk, rates.tsclk);
            assert_eq!(rates.dbgapb, rates.cpuapb);
        }
    }

    #[test]
    fn apply_writes_all_six_registers_in_order() {
        let trace = Trace::new();
        let cmu = CpuCmu::new(MockRegs::new("cmu", CMU_CPU_REG_SIZE, trace.clone()));

        cmu.set_dividers(1000 * MHZ).unwrap();
        cmu.set_dividers(1000 * MHZ).unwrap();

        let writes = trace.writes("cmu");
        assert_eq!(writes.len(), 12);
        assert_eq!(
            &writes[..6],
            &[
                (CMU_AXI_OFF, 2),
                (CMU_ATCLK_OFF, 4),
                (CMU_CNTCLK_OFF, 4),
                (CMU_TSCLK_OFF, 4),
                (CMU_DBGAPB_OFF, 9),
                (CMU_CPUAPB_OFF, 9),
            ]
        );
        assert_eq!(cmu.bus_rates(1000 * MHZ).unwrap().axi, 333_333_333);
    }
}
