use core::fmt;

use bsp_nexell::{ClkError, RegError};

use crate::regulator::RegulatorError;

/// The step of a transition that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Clock(ClkError),
    Regulator(RegulatorError),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Clock(err) => write!(f, "clock: {err}"),
            Fault::Regulator(err) => write!(f, "regulator: {err}"),
        }
    }
}

/// Outcome of restoring one resource after a failed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restore {
    /// The resource was never changed.
    NotNeeded,
    Restored,
    Failed,
    /// The pre-transition setting is unknown.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollbackStatus {
    pub clock: Restore,
    pub voltage: Restore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DvfsError {
    InvalidArgument { freq: u64 },
    /// Frequency table index past the end of the table.
    InvalidIndex { index: usize },
    /// Below the lowest rate the PLL can produce.
    Unsupported { freq: u64 },
    /// No operating point at or above the frequency.
    NoOperatingPoint { freq: u64 },
    HardwareTimeout { polls: u32 },
    Register(RegError),
    RegulatorFailure(RegulatorError),
    /// A transition failed after it had started changing hardware.
    PartialFailure {
        cause: Fault,
        rollback: RollbackStatus,
    },
    /// The clock settled somewhere other than the operating point.
    RateMismatch { expected: u64, actual: u64 },
}

impl From<ClkError> for DvfsError {
    fn from(err: ClkError) -> Self {
        match err {
            ClkError::InvalidArgument { rate } => DvfsError::InvalidArgument { freq: rate },
            ClkError::Unsupported { rate } => DvfsError::Unsupported { freq: rate },
            ClkError::HardwareTimeout { polls } => DvfsError::HardwareTimeout { polls },
            ClkError::Register(err) => DvfsError::Register(err),
        }
    }
}

impl From<RegulatorError> for DvfsError {
    fn from(err: RegulatorError) -> Self {
        DvfsError::RegulatorFailure(err)
    }
}

impl fmt::Display for DvfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DvfsError::InvalidArgument { freq } => write!(f, "invalid target frequency {freq}"),
            DvfsError::InvalidIndex { index } => write!(f, "no frequency at index {index}"),
            DvfsError::Unsupported { freq } => write!(f, "{freq} Hz is not supported"),
            DvfsError::NoOperatingPoint { freq } => write!(f, "no OPP for {freq} Hz"),
            DvfsError::HardwareTimeout { polls } => {
                write!(f, "PLL not ready after {polls} polls")
            }
            DvfsError::Register(err) => write!(f, "{err}"),
            DvfsError::RegulatorFailure(err) => write!(f, "failed to set voltage: {err}"),
            DvfsError::PartialFailure { cause, rollback } => write!(
                f,
                "transition aborted ({cause}), clock {:?}, voltage {:?}",
                rollback.clock, rollback.voltage
            ),
            DvfsError::RateMismatch { expected, actual } => {
                write!(f, "clock at {actual} Hz, expected {expected} Hz")
            }
        }
    }
}
