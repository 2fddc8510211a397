use core::fmt;

/// Errors raised by a register window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegError {
    /// The access falls outside the mapped window.
    OutOfRange { offset: usize, size: usize },
    /// Registers are 32-bit wide and must be accessed on a 4-byte boundary.
    Misaligned { offset: usize },
}

impl fmt::Display for RegError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegError::OutOfRange { offset, size } => {
                write!(f, "register {offset:#x} outside window of {size:#x} bytes")
            }
            RegError::Misaligned { offset } => write!(f, "misaligned register {offset:#x}"),
        }
    }
}

/// Errors raised by the clock layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClkError {
    /// Zero or otherwise meaningless rate.
    InvalidArgument { rate: u64 },
    /// No tabulated PLL setting at or below the requested rate.
    Unsupported { rate: u64 },
    /// The PLL did not report ready within the poll budget.
    HardwareTimeout { polls: u32 },
    Register(RegError),
}

impl From<RegError> for ClkError {
    fn from(err: RegError) -> Self {
        ClkError::Register(err)
    }
}

impl fmt::Display for ClkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClkError::InvalidArgument { rate } => write!(f, "invalid rate {rate} Hz"),
            ClkError::Unsupported { rate } => write!(f, "no PLL setting for {rate} Hz"),
            ClkError::HardwareTimeout { polls } => {
                write!(f, "PLL not ready after {polls} polls")
            }
            ClkError::Register(err) => write!(f, "register access failed: {err}"),
        }
    }
}
