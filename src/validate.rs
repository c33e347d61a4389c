//! Post-ingestion consistency checks.
//!
//! Validation never stops a run. Findings are collected into a
//! [`ValidationResult`] that the driver logs next to the normal report, so the
//! analyst knows the statistics may be unreliable.
//!
//! # Example
//!
//! ```
//! use tracesonar::stats::TraceStats;
//! use tracesonar::validate::validate;
//!
//! let stats = TraceStats::new();
//! let result = validate(&stats);
//! if result.has_errors() {
//!     for error in &result.errors {
//!         eprintln!("Warning: {}", error);
//!     }
//! }
//! ```

use std::fmt;

use crate::stats::TraceStats;

/// Result of validating the aggregated state of a trace.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Failed consistency checks.
    pub errors: Vec<ValidationError>,
    /// Missing trace parameters that make time-based metrics meaningless.
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// Returns true if there are any validation errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns true if there are any validation warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Returns true if every consistency check passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No process definition was seen.
    NoProcesses,
    /// No function definition was seen.
    NoFunctions,
    /// Global send and receive counts differ.
    UnbalancedMessages { sent: u64, received: u64 },
    /// A function was entered but never left.
    UnmatchedEnter {
        process: u32,
        group: u32,
        function: u32,
        name: String,
        /// Tick of the dangling enter event.
        since: u64,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NoProcesses => write!(f, "no processes found"),
            ValidationError::NoFunctions => write!(f, "no functions found"),
            ValidationError::UnbalancedMessages { sent, received } => {
                write!(f, "sent/recv messages are unequal: {sent} vs {received}")
            }
            ValidationError::UnmatchedEnter {
                process,
                group,
                function,
                name,
                since,
            } => {
                write!(
                    f,
                    "unbalanced function entry/exit ratio: p={process} g={group} f_id={function} ({name}) entered at tick {since}"
                )
            }
        }
    }
}

/// Validation warning types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// Timer resolution was never defined; absolute times are all zero.
    MissingTimerResolution,
    /// Trace time range was never defined; rates and relative times are zero.
    MissingTimeRange,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::MissingTimerResolution => {
                write!(f, "no timer resolution defined, time values are zero")
            }
            ValidationWarning::MissingTimeRange => {
                write!(f, "no trace time range defined, rates are zero")
            }
        }
    }
}

/// Check the aggregated state of a fully ingested trace.
///
/// Checks, each reported independently:
/// - At least one process was defined
/// - At least one function was defined
/// - Global sent and received message counts match
/// - No function call is still open
pub fn validate(stats: &TraceStats) -> ValidationResult {
    let mut result = ValidationResult::default();

    if stats.num_processes() == 0 {
        result.add_error(ValidationError::NoProcesses);
    }

    if stats.num_functions() == 0 {
        result.add_error(ValidationError::NoFunctions);
    }

    let sent = stats.num_sent_global();
    let received = stats.num_recv_global();
    if sent != received {
        result.add_error(ValidationError::UnbalancedMessages { sent, received });
    }

    for (key, call) in stats.open_calls() {
        result.add_error(ValidationError::UnmatchedEnter {
            process: key.process,
            group: key.group,
            function: key.function,
            name: stats.definitions().function_name(key.function).to_string(),
            since: call.open_since().unwrap_or_default(),
        });
    }

    let clock = stats.clock();
    if clock.resolution == 0 {
        result.add_warning(ValidationWarning::MissingTimerResolution);
    }
    if clock.time_end == 0 {
        result.add_warning(ValidationWarning::MissingTimeRange);
    }

    result
}
