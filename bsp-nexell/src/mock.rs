//! In-memory register blocks for exercising drivers off target.
//!
//! Every successful write is appended to a shared [`Trace`] so tests can check
//! the order in which blocks were touched.

extern crate alloc;

use alloc::{collections::BTreeMap, sync::Arc, vec::Vec};

use spin::Mutex;

use crate::error::RegError;
use crate::pll::{
    PLL_REG_SIZE, PLLCFG1, PLLCFG1_M_SHIFT, PLLCFG2, PLLCFG2_K_SHIFT, PLLCTRL,
    PLLCTRL_CURST_MASK, PLLCTRL_CURST_SHIFT, PLLCTRL_LOCK, PLLCTRL_MUXSEL_MASK, PllPms,
};
use crate::regs::{RegisterPort, check_access};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    Write {
        block: &'static str,
        offset: usize,
        value: u32,
    },
    Voltage {
        min_uv: u32,
        target_uv: u32,
        max_uv: u32,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<TraceEvent>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: TraceEvent) {
        self.0.lock().push(event);
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.0.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    /// Index of the first event matching `pred`.
    pub fn position(&self, pred: impl Fn(&TraceEvent) -> bool) -> Option<usize> {
        self.0.lock().iter().position(pred)
    }

    /// Index of the last event matching `pred`.
    pub fn rposition(&self, pred: impl Fn(&TraceEvent) -> bool) -> Option<usize> {
        self.0.lock().iter().rposition(pred)
    }

    /// `(offset, value)` of every write to `block`, in order.
    pub fn writes(&self, block: &str) -> Vec<(usize, u32)> {
        self.0
            .lock()
            .iter()
            .filter_map(|ev| match *ev {
                TraceEvent::Write {
                    block: b,
                    offset,
                    value,
                } if b == block => Some((offset, value)),
                _ => None,
            })
            .collect()
    }
}

/// A register block. Clones share the same registers.
#[derive(Clone)]
pub struct MockRegs {
    block: &'static str,
    pll: bool,
    size: usize,
    regs: Arc<Mutex<BTreeMap<usize, u32>>>,
    trace: Trace,
    unlocked_reads: Arc<Mutex<u32>>,
}

impl MockRegs {
    pub fn new(block: &'static str, size: usize, trace: Trace) -> Self {
        MockRegs {
            block,
            pll: false,
            size,
            regs: Arc::new(Mutex::new(BTreeMap::new())),
            trace,
            unlocked_reads: Arc::new(Mutex::new(0)),
        }
    }

    /// A locked PLL block driving its output, programmed with `pms`.
    pub fn pll(trace: Trace, pms: &PllPms) -> Self {
        let mut regs = Self::new("pll", PLL_REG_SIZE, trace);
        regs.pll = true;
        regs.poke(
            PLLCTRL,
            (1 << PLLCTRL_CURST_SHIFT) | PLLCTRL_LOCK | PLLCTRL_MUXSEL_MASK,
        );
        regs.poke(PLLCFG1, (pms.m << PLLCFG1_M_SHIFT) | pms.p);
        regs.poke(PLLCFG2, ((pms.k as u16 as u32) << PLLCFG2_K_SHIFT) | pms.s);
        regs
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Sets a register without recording a write.
    pub fn poke(&self, offset: usize, value: u32) {
        self.regs.lock().insert(offset, value);
    }

    pub fn peek(&self, offset: usize) -> u32 {
        self.regs.lock().get(&offset).copied().unwrap_or(0)
    }

    /// The next `reads` reads of PLLCTRL report the lock bit clear.
    pub fn drop_pll_lock(&self, reads: u32) {
        *self.unlocked_reads.lock() = reads;
    }
}

impl RegisterPort for MockRegs {
    fn read32(&self, offset: usize) -> Result<u32, RegError> {
        check_access(offset, self.size)?;
        let mut val = self.peek(offset);
        if self.pll && offset == PLLCTRL {
            let mut unlocked = self.unlocked_reads.lock();
            if *unlocked > 0 {
                *unlocked -= 1;
                val &= !PLLCTRL_LOCK;
            }
        }
        Ok(val)
    }

    fn write32(&self, offset: usize, value: u32) -> Result<(), RegError> {
        check_access(offset, self.size)?;
        let mut stored = value;
        if self.pll && offset == PLLCTRL {
            // LOCK and CURST are status bits owned by the PLL.
            let status = PLLCTRL_LOCK | PLLCTRL_CURST_MASK;
            stored = (value & !status) | (self.peek(offset) & status);
        }
        self.poke(offset, stored);
        self.trace.push(TraceEvent::Write {
            block: self.block,
            offset,
            value,
        });
        Ok(())
    }
}
