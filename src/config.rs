use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use regex::Regex;

use crate::error::InvalidInput;
use crate::stats::{FlopCounterPolicy, DEFAULT_COUNTER_PATTERN};

/// Options of one analysis run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Verbosity level (0 = warn, 1 = info, 2 = debug, 3+ = trace)
    pub verbosity: u8,
    /// Trace to analyze
    pub trace_file: PathBuf,
    /// Trace name used in file names and data file headers
    pub trace_name: String,
    /// Directory all results are written to
    pub output_dir: PathBuf,
    /// Echo every decoded event to stdout
    pub raw_events: bool,
    /// Print a progress line to stderr while reading
    pub progress: bool,
    /// Also print the statistics report to stdout
    pub stats_to_screen: bool,
    /// Do not truncate names in report tables
    pub full_names: bool,
    /// Run gnuplot on the generated scripts
    pub plot: bool,
    /// Counters holding the floating point operation count
    pub flop_policy: FlopCounterPolicy,
    /// Regex a counter name must match to be kept
    pub counter_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbosity: 0,
            trace_file: PathBuf::new(),
            trace_name: String::new(),
            output_dir: PathBuf::new(),
            raw_events: false,
            progress: false,
            stats_to_screen: false,
            full_names: false,
            plot: false,
            flop_policy: FlopCounterPolicy::default(),
            counter_prefix: DEFAULT_COUNTER_PATTERN.to_string(),
        }
    }
}

impl Config {
    /// Config for analyzing `trace_file` with a timestamped default output
    /// directory in the current working directory.
    pub fn for_trace(trace_file: impl Into<PathBuf>) -> Result<Self> {
        let trace_file = trace_file.into();
        let trace_name = trace_name_from_path(&trace_file)?;
        let output_dir = default_output_dir(&trace_name);
        Ok(Self {
            trace_file,
            trace_name,
            output_dir,
            ..Default::default()
        })
    }

    pub fn counter_filter(&self) -> Result<Regex> {
        Regex::new(&self.counter_prefix).map_err(|e| {
            InvalidInput::new(format!("counter pattern '{}': {e}", self.counter_prefix)).into()
        })
    }

    /// Path of the text statistics report.
    pub fn report_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("tracestats_{}.txt", self.trace_name))
    }

    /// Create the output directory, including missing parents.
    pub fn prepare_output_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Can not create directory {}",
                self.output_dir.display()
            )
        })
    }
}

/// Trace name: the file name without directory and extension.
pub fn trace_name_from_path(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            InvalidInput::new(format!("no trace name in path '{}'", path.display())).into()
        })
}

/// `<trace_name>_SonarResults_<YYYY-MM-DD_hh-mm-ss>` in local time.
pub fn default_output_dir(trace_name: &str) -> PathBuf {
    let now = Local::now().format("%Y-%m-%d_%H-%M-%S");
    PathBuf::from(format!("{trace_name}_SonarResults_{now}"))
}
