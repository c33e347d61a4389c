//! Error taxonomy of the driver and its documented exit statuses.
//!
//! | Status | Condition                                            |
//! |--------|------------------------------------------------------|
//! | 0      | success                                              |
//! | 1      | invalid input (bad option or usage, malformed trace) |
//! | 2      | allocation failure while buffering plot data         |
//! | 3      | runtime failure (enter/leave violation, I/O)         |
//! | 4      | anything else                                        |
//!
//! `--help` and `--version` exit with 0.

use std::collections::TryReserveError;
use std::fmt;
use std::io;

use crate::stats::ProtocolViolation;

/// User-supplied input that cannot be used: an option value or a trace line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidInput {
    message: String,
}

impl InvalidInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for InvalidInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid input: {}", self.message)
    }
}

impl std::error::Error for InvalidInput {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    InvalidInput,
    AllocationFailure,
    Runtime,
    Unclassified,
}

impl ExitStatus {
    /// Classify a top-level error by the first recognized error in its chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if cause.is::<InvalidInput>() {
                return ExitStatus::InvalidInput;
            }
            if cause.is::<TryReserveError>() {
                return ExitStatus::AllocationFailure;
            }
            if cause.is::<ProtocolViolation>() || cause.is::<io::Error>() {
                return ExitStatus::Runtime;
            }
        }
        ExitStatus::Unclassified
    }

    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::InvalidInput => 1,
            ExitStatus::AllocationFailure => 2,
            ExitStatus::Runtime => 3,
            ExitStatus::Unclassified => 4,
        }
    }
}
