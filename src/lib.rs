//! tracesonar library - statistics and plot data from MPI/HPC execution traces.
//!
//! This library provides the aggregation engine used by the `tracesonar`
//! binary. A trace is a stream of definition and event records; the
//! [`events::Analyzer`] feeds every record to the statistics engine and the
//! visualizer, after which reports, CSV files and gnuplot scripts can be
//! written.
//!
//! # Modules
//!
//! - [`definitions`] - Definition registry and trace clock
//! - [`stats`] - Aggregation engine and derived metrics
//! - [`validate`] - Consistency checks over the aggregated state
//! - [`report`] - Text report and CSV exports
//! - [`visualize`] - Per-process data files and gnuplot scripts
//! - [`events`] / [`reader`] - Trace records and the JSON-lines reader
//!
//! # Example
//!
//! ```no_run
//! use tracesonar::events::Analyzer;
//! use tracesonar::reader::read_trace_file;
//! use tracesonar::{report, validate, Config};
//!
//! let config = Config::for_trace("ring.jsonl").unwrap();
//! let mut analyzer = Analyzer::new(&config).unwrap();
//! read_trace_file(&config.trace_file, &mut analyzer).unwrap();
//!
//! let stats = analyzer.stats();
//! let metrics = stats.metrics_summary(&config.flop_policy);
//! assert!(validate(stats).is_valid());
//! print!("{}", report::render(stats, &metrics, &config));
//! ```

pub mod config;
pub mod definitions;
pub mod error;
pub mod events;
pub mod reader;
pub mod report;
pub mod stats;
pub mod utils;
pub mod validate;
pub mod visualize;

// Re-export for convenience
pub use config::Config;
pub use error::{ExitStatus, InvalidInput};
pub use stats::TraceStats;
pub use validate::{validate, ValidationError, ValidationResult, ValidationWarning};
