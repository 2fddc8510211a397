//! Shared fixtures for the DVFS and policy tests.

use std::sync::Arc;

use bsp_nexell::cmu::{
    BusDividers, CMU_ATCLK_OFF, CMU_AXI_OFF, CMU_CNTCLK_OFF, CMU_CPU_REG_SIZE, CMU_CPUAPB_OFF,
    CMU_DBGAPB_OFF, CMU_TSCLK_OFF,
};
use bsp_nexell::mock::{MockRegs, Trace, TraceEvent};
use bsp_nexell::{CpuClock, CpuCmu, Pll, PllVariant, PollConfig};
use spin::Mutex;

use crate::cpufreq::Dvfs;
use crate::opp::{OperatingPoint, OppTable, VoltageTriplet};
use crate::regulator::{Regulator, RegulatorError};

pub const MAX_POLLS: u32 = 8;

const MHZ: u64 = 1_000_000;

const fn point(mhz: u64, uv: u32, suspend: bool, turbo: bool) -> OperatingPoint {
    OperatingPoint {
        freq_hz: mhz * MHZ,
        voltage: VoltageTriplet {
            min_uv: uv,
            target_uv: uv,
            max_uv: uv + 50_000,
        },
        clock_latency_ns: 200_000,
        suspend,
        turbo,
    }
}

pub const TEST_OPPS: &[OperatingPoint] = &[
    point(100, 900_000, false, false),
    point(200, 900_000, false, false),
    point(400, 950_000, false, false),
    point(600, 1_000_000, false, false),
    point(800, 1_050_000, true, false),
    point(1000, 1_100_000, false, false),
    point(1100, 1_150_000, false, true),
];

pub fn opp_at(freq: u64) -> OperatingPoint {
    *TEST_OPPS
        .iter()
        .find(|opp| opp.freq_hz == freq)
        .expect("no such test OPP")
}

#[derive(Default)]
struct RegState {
    current: Option<VoltageTriplet>,
    fail_next: u32,
}

/// A supply that records accepted requests into the register trace.
#[derive(Clone)]
pub struct TestRegulator {
    state: Arc<Mutex<RegState>>,
    trace: Trace,
}

impl TestRegulator {
    pub fn new(trace: Trace, current: Option<VoltageTriplet>) -> Self {
        TestRegulator {
            state: Arc::new(Mutex::new(RegState {
                current,
                fail_next: 0,
            })),
            trace,
        }
    }

    pub fn current(&self) -> Option<VoltageTriplet> {
        self.state.lock().current
    }

    /// Rejects the next `n` requests.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().fail_next = n;
    }
}

impl Regulator for TestRegulator {
    fn set_voltage(
        &mut self,
        min_uv: u32,
        target_uv: u32,
        max_uv: u32,
    ) -> Result<(), RegulatorError> {
        let mut state = self.state.lock();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(RegulatorError::Rejected { target_uv });
        }
        state.current = Some(VoltageTriplet {
            min_uv,
            target_uv,
            max_uv,
        });
        self.trace.push(TraceEvent::Voltage {
            min_uv,
            target_uv,
            max_uv,
        });
        Ok(())
    }
}

pub type TestDvfs = Dvfs<CpuClock<MockRegs>, TestRegulator, MockRegs>;

pub struct Fixture {
    pub dvfs: TestDvfs,
    pub trace: Trace,
    pub pll_regs: MockRegs,
    pub cmu_regs: MockRegs,
    pub regulator: TestRegulator,
}

pub fn fixture(variant: PllVariant, rate: u64, regulated: bool) -> Fixture {
    fixture_with(variant, rate, regulated, TEST_OPPS)
}

/// A domain running at `rate` with matching bus dividers and the supply at the
/// matching OPP voltage.
pub fn fixture_with(
    variant: PllVariant,
    rate: u64,
    regulated: bool,
    opps: &[OperatingPoint],
) -> Fixture {
    let trace = Trace::new();
    let table = OppTable::from_slice(opps);

    let pll_regs = MockRegs::pll(trace.clone(), variant.find_pms(rate).unwrap());
    let cmu_regs = MockRegs::new("cmu", CMU_CPU_REG_SIZE, trace.clone());
    let div = BusDividers::for_rate(rate);
    for (offset, value) in [
        (CMU_AXI_OFF, div.axi),
        (CMU_ATCLK_OFF, div.atclk),
        (CMU_CNTCLK_OFF, div.cntclk),
        (CMU_TSCLK_OFF, div.tsclk),
        (CMU_DBGAPB_OFF, div.dbgapb),
        (CMU_CPUAPB_OFF, div.cpuapb),
    ] {
        cmu_regs.poke(offset, value);
    }
    let regulator = TestRegulator::new(
        trace.clone(),
        table.find_ceil(rate).map(|opp| opp.voltage),
    );

    let pll = Pll::new(pll_regs.clone(), variant).with_poll(PollConfig {
        max_polls: MAX_POLLS,
    });
    let dvfs = Dvfs::new(
        CpuClock::new(pll),
        regulated.then(|| regulator.clone()),
        CpuCmu::new(cmu_regs.clone()),
        table,
    );

    Fixture {
        dvfs,
        trace,
        pll_regs,
        cmu_regs,
        regulator,
    }
}
