//! Nexell PLL2555 / PLL2651 rate programming.
//!
//! Only pre-characterized rates are reachable: a request is floored onto the
//! variant's PMS table. Hardware registers are the single source of truth,
//! the current rate is always recomputed from PLLCFG1/PLLCFG2.

use core::hint::spin_loop;

use log::{debug, error, info, trace, warn};

use crate::error::ClkError;
use crate::regs::RegisterPort;

/// Reference oscillator feeding every PLL.
pub const REF_CLK: u64 = 24_000_000;

pub const PLLCTRL: usize = 0x0;
pub const PLLCTRL_RUN_CHANGE: u32 = 1 << 0;
pub const PLLCTRL_DIRTYFLAG: u32 = 1 << 1;
pub const PLLCTRL_MUXSEL_SHIFT: u32 = 3;
pub const PLLCTRL_MUXSEL_MASK: u32 = 1 << PLLCTRL_MUXSEL_SHIFT;
pub const PLLCTRL_LOCK: u32 = 1 << 6;
pub const PLLCTRL_CURST_SHIFT: u32 = 8;
pub const PLLCTRL_CURST_MASK: u32 = 0x1f << PLLCTRL_CURST_SHIFT;

pub const PLLDBG0: usize = 0x4;

pub const PLLCFG1: usize = 0x30;
pub const PLLCFG1_M_SHIFT: u32 = 16;
pub const PLLCFG1_M_MASK: u32 = 0xffff << PLLCFG1_M_SHIFT;
pub const PLLCFG1_P_MASK: u32 = 0xffff;

pub const PLLCFG2: usize = 0x40;
pub const PLLCFG2_K_SHIFT: u32 = 16;
pub const PLLCFG2_K_MASK: u32 = 0xffff << PLLCFG2_K_SHIFT;
pub const PLLCFG2_S_MASK: u32 = 0xffff;

/// PLLDBG0 count after which a bypassed PLL is considered settled.
pub const PLL_LOCK_COUNT: u32 = 0x200;

/// Register window size of one PLL block.
pub const PLL_REG_SIZE: usize = 0x100;

pub const DEFAULT_MAX_POLLS: u32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxSel {
    OscClk = 0,
    PllFout = 1,
}

/// One characterized operating point of a PLL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PllPms {
    pub rate: u64,
    pub p: u32,
    pub m: u32,
    pub s: u32,
    /// Signed Q16 fractional part of M, PLL2651 only.
    pub k: i16,
}

const fn pms(rate: u64, p: u32, m: u32, s: u32, k: i16) -> PllPms {
    PllPms { rate, p, m, s, k }
}

pub static PLL2555_PMS_TABLE: &[PllPms] = &[
    pms(1_200_000_000, 4, 400, 1, 0),
    pms(1_100_000_000, 3, 275, 1, 0),
    pms(1_000_000_000, 3, 250, 1, 0),
    pms(900_000_000, 4, 300, 1, 0),
    pms(800_000_000, 3, 200, 1, 0),
    pms(700_000_000, 3, 175, 1, 0),
    pms(600_000_000, 4, 400, 2, 0),
    pms(500_000_000, 3, 250, 2, 0),
    pms(400_000_000, 3, 200, 2, 0),
    pms(300_000_000, 4, 400, 3, 0),
    pms(200_000_000, 3, 200, 3, 0),
    pms(100_000_000, 3, 200, 4, 0),
];

pub static PLL2651_PMS_TABLE: &[PllPms] = &[
    pms(2_500_000_000, 6, 625, 0, 0),
    pms(2_200_000_000, 3, 275, 0, 0),
    pms(2_000_000_000, 3, 250, 0, 0),
    pms(1_800_000_000, 2, 150, 0, 0),
    pms(1_600_000_000, 3, 200, 0, 0),
    pms(1_400_000_000, 3, 175, 0, 0),
    pms(1_354_752_000, 2, 113, 0, -6816),
    pms(1_277_952_000, 2, 106, 0, 32506),
    pms(1_264_434_000, 3, 158, 0, 3555),
    pms(1_228_800_000, 3, 154, 0, -26214),
    pms(1_200_000_000, 2, 100, 0, 0),
    // K = 0 here would give 1176 MHz.
    pms(1_179_648_000, 2, 98, 0, 19923),
    pms(1_000_000_000, 3, 250, 1, 0),
    pms(800_000_000, 3, 200, 1, 0),
    pms(600_000_000, 2, 100, 1, 0),
    pms(300_000_000, 2, 100, 2, 0),
    pms(200_000_000, 3, 200, 3, 0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PllVariant {
    /// Integer-only PLL.
    Pll2555,
    /// PLL with a fractional K term.
    Pll2651,
}

impl PllVariant {
    pub fn name(self) -> &'static str {
        match self {
            PllVariant::Pll2555 => "pll2555",
            PllVariant::Pll2651 => "pll2651",
        }
    }

    /// Rate-descending PMS table of this variant.
    pub fn pms_table(self) -> &'static [PllPms] {
        match self {
            PllVariant::Pll2555 => PLL2555_PMS_TABLE,
            PllVariant::Pll2651 => PLL2651_PMS_TABLE,
        }
    }

    /// Highest tabulated setting not above `rate`.
    pub fn find_pms(self, rate: u64) -> Result<&'static PllPms, ClkError> {
        self.pms_table()
            .iter()
            .find(|pms| rate >= pms.rate)
            .ok_or(ClkError::Unsupported { rate })
    }

    /// Output frequency for the given divider settings.
    pub fn fout(self, parent_rate: u64, p: u32, m: u32, s: u32, k: i16) -> u64 {
        let div = (p as u64).checked_shl(s).unwrap_or(0);
        if div == 0 {
            return 0;
        }
        match self {
            PllVariant::Pll2555 => parent_rate * m as u64 / div,
            PllVariant::Pll2651 => {
                let mk = ((m as i64) << 16) + k as i64;
                (parent_rate * mk.max(0) as u64 / div) >> 16
            }
        }
    }
}

/// Lock state decoded from PLLCTRL/PLLDBG0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PllState {
    Unstable,
    Locking,
    Ready,
}

impl PllState {
    pub fn decode(ctrl: u32, dbg0: u32) -> Self {
        let curst = (ctrl & PLLCTRL_CURST_MASK) >> PLLCTRL_CURST_SHIFT;
        if curst != 1 || ctrl & PLLCTRL_LOCK == 0 {
            return PllState::Unstable;
        }
        let muxsel = (ctrl & PLLCTRL_MUXSEL_MASK) >> PLLCTRL_MUXSEL_SHIFT;
        if muxsel == MuxSel::PllFout as u32 || dbg0 > PLL_LOCK_COUNT {
            PllState::Ready
        } else {
            PllState::Locking
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Ready checks before giving up with `HardwareTimeout`.
    pub max_polls: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

pub struct Pll<R> {
    regs: R,
    variant: PllVariant,
    poll: PollConfig,
}

impl<R: RegisterPort> Pll<R> {
    pub fn new(regs: R, variant: PllVariant) -> Self {
        Pll {
            regs,
            variant,
            poll: PollConfig::default(),
        }
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn variant(&self) -> PllVariant {
        self.variant
    }

    pub fn regs(&self) -> &R {
        &self.regs
    }

    pub fn round_rate(&self, rate: u64) -> Result<u64, ClkError> {
        self.variant.find_pms(rate).map(|pms| pms.rate)
    }

    /// Current P/M/S/K as programmed in hardware. `rate` is left at zero.
    pub fn read_pms(&self) -> Result<PllPms, ClkError> {
        let cfg1 = self.regs.read32(PLLCFG1)?;
        let cfg2 = self.regs.read32(PLLCFG2)?;

        Ok(PllPms {
            rate: 0,
            p: cfg1 & PLLCFG1_P_MASK,
            m: (cfg1 & PLLCFG1_M_MASK) >> PLLCFG1_M_SHIFT,
            s: cfg2 & PLLCFG2_S_MASK,
            k: ((cfg2 & PLLCFG2_K_MASK) >> PLLCFG2_K_SHIFT) as u16 as i16,
        })
    }

    pub fn recalc_rate(&self, parent_rate: u64) -> Result<u64, ClkError> {
        let parent_rate = parent_rate.min(REF_CLK);
        let cur = self.read_pms()?;

        if cur.p == 0 {
            warn!("{}: P is zero, PLL not configured", self.variant.name());
            return Ok(0);
        }

        let k = match self.variant {
            PllVariant::Pll2555 => 0,
            PllVariant::Pll2651 => cur.k,
        };
        Ok(self.variant.fout(parent_rate, cur.p, cur.m, cur.s, k))
    }

    pub fn state(&self) -> Result<PllState, ClkError> {
        let ctrl = self.regs.read32(PLLCTRL)?;
        let dbg0 = self.regs.read32(PLLDBG0)?;
        Ok(PllState::decode(ctrl, dbg0))
    }

    fn wait_ready(&self) -> Result<(), ClkError> {
        for _ in 0..self.poll.max_polls {
            if self.state()? == PllState::Ready {
                return Ok(());
            }
            spin_loop();
        }

        error!(
            "{}: not ready after {} polls",
            self.variant.name(),
            self.poll.max_polls
        );
        Err(ClkError::HardwareTimeout {
            polls: self.poll.max_polls,
        })
    }

    fn set_oscmux(&self, muxsel: MuxSel) -> Result<(), ClkError> {
        self.regs.update_bits(
            PLLCTRL,
            PLLCTRL_MUXSEL_MASK,
            (muxsel as u32) << PLLCTRL_MUXSEL_SHIFT,
        )?;
        Ok(())
    }

    pub fn set_rate(&mut self, rate: u64, parent_rate: u64) -> Result<(), ClkError> {
        let pms = self.variant.find_pms(rate)?;

        info!(
            "{}: set rate {} Hz (p={} m={} s={} k={}, parent {} Hz)",
            self.variant.name(),
            pms.rate,
            pms.p,
            pms.m,
            pms.s,
            pms.k,
            parent_rate
        );

        self.wait_ready()?;

        self.set_oscmux(MuxSel::PllFout)?;

        self.regs.update_bits(
            PLLCFG1,
            PLLCFG1_P_MASK | PLLCFG1_M_MASK,
            (pms.m << PLLCFG1_M_SHIFT) | pms.p,
        )?;
        self.regs.update_bits(
            PLLCFG2,
            PLLCFG2_S_MASK | PLLCFG2_K_MASK,
            ((pms.k as u16 as u32) << PLLCFG2_K_SHIFT) | pms.s,
        )?;
        trace!("{}: pms programmed", self.variant.name());

        self.regs.update_bits(
            PLLCTRL,
            PLLCTRL_DIRTYFLAG | PLLCTRL_RUN_CHANGE,
            PLLCTRL_DIRTYFLAG | PLLCTRL_RUN_CHANGE,
        )?;

        self.wait_ready()?;
        debug!("{}: relocked at {} Hz", self.variant.name(), pms.rate);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockRegs, Trace, TraceEvent};

    fn pll_at(variant: PllVariant, rate: u64) -> Pll<MockRegs> {
        let pms = variant.find_pms(rate).unwrap();
        Pll::new(MockRegs::pll(Trace::new(), pms), variant).with_poll(PollConfig { max_polls: 8 })
    }

    #[test]
    fn round_rate_floors_onto_table() {
        let pll = pll_at(PllVariant::Pll2555, 800_000_000);

        assert_eq!(pll.round_rate(1_000_000_000), Ok(1_000_000_000));
        assert_eq!(pll.round_rate(950_000_000), Ok(900_000_000));
        assert_eq!(pll.round_rate(5_000_000_000), Ok(1_200_000_000));
        assert_eq!(pll.round_rate(100_000_000), Ok(100_000_000));
        assert_eq!(
            pll.round_rate(99_999_999),
            Err(ClkError::Unsupported { rate: 99_999_999 })
        );
    }

    #[test]
    fn round_rate_is_monotonic() {
        for variant in [PllVariant::Pll2555, PllVariant::Pll2651] {
            let mut last = 0;
            for mhz in (variant.pms_table().last().unwrap().rate / 1_000_000)..=2600 {
                let rounded = variant.find_pms(mhz * 1_000_000).unwrap().rate;
                assert!(rounded >= last, "{variant:?} at {mhz} MHz");
                assert!(rounded <= mhz * 1_000_000);
                last = rounded;
            }
        }
    }

    #[test]
    fn tables_are_sorted_descending() {
        for variant in [PllVariant::Pll2555, PllVariant::Pll2651] {
            let table = variant.pms_table();
            assert!(table.windows(2).all(|w| w[0].rate > w[1].rate));
        }
    }

    #[test]
    fn recalc_matches_pll2555_table() {
        for pms in PLL2555_PMS_TABLE {
            let pll = pll_at(PllVariant::Pll2555, pms.rate);
            assert_eq!(pll.recalc_rate(REF_CLK), Ok(pms.rate));
        }

        let pll = pll_at(PllVariant::Pll2555, 800_000_000);
        assert_eq!(pll.recalc_rate(REF_CLK), Ok(24_000_000 * 200 / (3 << 1)));
    }

    #[test]
    fn recalc_matches_pll2651_table() {
        for pms in PLL2651_PMS_TABLE {
            let pll = pll_at(PllVariant::Pll2651, pms.rate);
            let rate = pll.recalc_rate(REF_CLK).unwrap();
            if pms.k == 0 {
                assert_eq!(rate, pms.rate);
            } else {
                assert!(rate.abs_diff(pms.rate) < 100, "{} vs {}", rate, pms.rate);
            }
        }
    }

    #[test]
    fn recalc_clamps_parent_to_reference() {
        let pll = pll_at(PllVariant::Pll2555, 1_000_000_000);
        assert_eq!(pll.recalc_rate(48_000_000), Ok(1_000_000_000));
        assert_eq!(pll.recalc_rate(12_000_000), Ok(500_000_000));
    }

    #[test]
    fn negative_k_round_trips_through_registers() {
        let pll = pll_at(PllVariant::Pll2651, 1_228_800_000);
        assert_eq!(pll.read_pms().unwrap().k, -26214);
    }

    #[test]
    fn ready_requires_curst_lock_and_mux_or_count() {
        let curst = 1 << PLLCTRL_CURST_SHIFT;
        let mux = PLLCTRL_MUXSEL_MASK;

        assert_eq!(PllState::decode(curst | PLLCTRL_LOCK | mux, 0), PllState::Ready);
        assert_eq!(
            PllState::decode(curst | PLLCTRL_LOCK, PLL_LOCK_COUNT + 1),
            PllState::Ready
        );
        assert_eq!(
            PllState::decode(curst | PLLCTRL_LOCK, PLL_LOCK_COUNT),
            PllState::Locking
        );
        assert_eq!(PllState::decode(curst | mux, 0), PllState::Unstable);
        assert_eq!(
            PllState::decode((2 << PLLCTRL_CURST_SHIFT) | PLLCTRL_LOCK | mux, 0),
            PllState::Unstable
        );
    }

    #[test]
    fn set_rate_programs_pms_then_latches() {
        let mut pll = pll_at(PllVariant::Pll2555, 800_000_000);
        let trace = pll.regs().trace().clone();

        pll.set_rate(1_000_000_000, REF_CLK).unwrap();

        let writes: Vec<_> = trace
            .events()
            .into_iter()
            .filter_map(|ev| match ev {
                TraceEvent::Write { offset, value, .. } => Some((offset, value)),
                _ => None,
            })
            .collect();
        assert_eq!(writes.len(), 4);
        assert_eq!(writes[0].0, PLLCTRL);
        assert_ne!(writes[0].1 & PLLCTRL_MUXSEL_MASK, 0);
        assert_eq!(writes[1], (PLLCFG1, (250 << 16) | 3));
        assert_eq!(writes[2], (PLLCFG2, 1));
        assert_eq!(writes[3].0, PLLCTRL);
        assert_eq!(
            writes[3].1 & (PLLCTRL_DIRTYFLAG | PLLCTRL_RUN_CHANGE),
            PLLCTRL_DIRTYFLAG | PLLCTRL_RUN_CHANGE
        );
        assert_eq!(pll.recalc_rate(REF_CLK), Ok(1_000_000_000));
    }

    #[test]
    fn set_rate_below_table_touches_nothing() {
        let mut pll = pll_at(PllVariant::Pll2555, 800_000_000);

        assert_eq!(
            pll.set_rate(50_000_000, REF_CLK),
            Err(ClkError::Unsupported { rate: 50_000_000 })
        );
        assert!(pll.regs().trace().is_empty());
    }

    #[test]
    fn set_rate_times_out_when_lock_never_comes() {
        let mut pll = pll_at(PllVariant::Pll2555, 800_000_000);
        pll.regs().drop_pll_lock(u32::MAX);

        assert_eq!(
            pll.set_rate(400_000_000, REF_CLK),
            Err(ClkError::HardwareTimeout { polls: 8 })
        );
        assert!(pll.regs().trace().is_empty());
    }

    #[test]
    fn bypassed_pll_is_ready_once_lock_count_elapses() {
        let trace = Trace::new();
        let pms = PllVariant::Pll2555.find_pms(800_000_000).unwrap();
        let regs = MockRegs::pll(trace, pms);
        regs.poke(PLLCTRL, (1 << PLLCTRL_CURST_SHIFT) | PLLCTRL_LOCK);
        regs.poke(PLLDBG0, PLL_LOCK_COUNT + 1);
        let pll = Pll::new(regs, PllVariant::Pll2555);

        assert_eq!(pll.state(), Ok(PllState::Ready));
    }
}
