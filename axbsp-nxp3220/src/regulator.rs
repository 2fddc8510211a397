use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegulatorError {
    /// The supply cannot produce a voltage inside the window.
    OutOfRange { min_uv: u32, max_uv: u32 },
    /// The PMIC rejected or did not acknowledge the request.
    Rejected { target_uv: u32 },
}

impl fmt::Display for RegulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegulatorError::OutOfRange { min_uv, max_uv } => {
                write!(f, "no voltage within {min_uv}..={max_uv} uV")
            }
            RegulatorError::Rejected { target_uv } => write!(f, "{target_uv} uV rejected"),
        }
    }
}

/// CPU supply rail.
pub trait Regulator {
    fn set_voltage(&mut self, min_uv: u32, target_uv: u32, max_uv: u32)
    -> Result<(), RegulatorError>;
}
