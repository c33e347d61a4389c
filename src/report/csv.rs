//! Flat CSV exports of the derived metrics.
//!
//! The column order and header text are consumed by spreadsheet and plotting
//! tools and must not change.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::stats::MetricsSummary;
use crate::visualize::write_file;

pub const NODES_FILE: &str = "aggr_nodes.csv";
pub const AVERAGES_FILE: &str = "aggr_avg.csv";

pub const HEADER: &str = "Process,Verbosity,MessageRate,MPI_idle_min,MPI_idle_max,MPI_idle_avg,TX_Messages,RX_Messages,TX_Bytes,RX_Bytes";

/// Process id written in the averages row.
pub const AVERAGES_ROW_ID: i64 = -1;

/// One row per process.
pub fn render_nodes_csv(metrics: &MetricsSummary) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');
    for m in &metrics.processes {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{}",
            m.process,
            m.verbosity,
            m.message_rate,
            m.idle_min,
            m.idle_max,
            m.idle_avg,
            m.msgs_tx,
            m.msgs_rx,
            m.bytes_tx,
            m.bytes_rx
        )
        .unwrap();
    }
    out
}

/// A single row of averages over all processes.
pub fn render_avg_csv(metrics: &MetricsSummary) -> String {
    let avg = &metrics.average;
    format!(
        "{HEADER}\n{AVERAGES_ROW_ID},{},{},{},{},{},{},{},{},{}\n",
        avg.verbosity,
        avg.message_rate,
        avg.idle_min,
        avg.idle_max,
        avg.idle_avg,
        avg.msgs_tx,
        avg.msgs_rx,
        avg.bytes_tx,
        avg.bytes_rx
    )
}

/// Write both CSV files into `dir`.
pub fn write_csv(dir: &Path, metrics: &MetricsSummary) -> Result<Vec<PathBuf>> {
    let nodes = dir.join(NODES_FILE);
    write_file(&nodes, &render_nodes_csv(metrics))?;
    let averages = dir.join(AVERAGES_FILE);
    write_file(&averages, &render_avg_csv(metrics))?;
    Ok(vec![nodes, averages])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{FlopCounterPolicy, TraceStats};
    use tempfile::TempDir;

    fn metrics() -> MetricsSummary {
        let mut stats = TraceStats::new();
        stats.clock_mut().resolution = 1000;
        stats.clock_mut().time_end = 10_000;
        stats.definitions_mut().add_process(0, "p0", 0);
        stats.definitions_mut().add_process(1, "p1", 0);
        stats.definitions_mut().add_counter(1, "PAPI_FP_OPS", "#", 0);
        stats.record_counter_sample(0, 1, 64);
        stats.record_send(0, 32, 1000);
        stats.record_receive(1, 32, 2000);
        stats.metrics_summary(&FlopCounterPolicy::default())
    }

    #[test]
    fn test_nodes_csv() {
        let csv = render_nodes_csv(&metrics());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "0,0.5,0.1,1,1,1,1,0,32,0");
        assert_eq!(lines[2], "1,0,0,2,2,2,0,1,0,32");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_avg_csv() {
        let csv = render_avg_csv(&metrics());
        assert_eq!(csv, format!("{HEADER}\n-1,0.25,0.05,1.5,1.5,1.5,0.5,0.5,16,16\n"));
    }

    #[test]
    fn test_header_columns() {
        assert_eq!(HEADER.split(',').count(), 10);
        assert!(HEADER.starts_with("Process,Verbosity,MessageRate"));
    }

    #[test]
    fn test_write_csv_idempotent() {
        let tmp = TempDir::new().unwrap();
        let metrics = metrics();

        let paths = write_csv(tmp.path(), &metrics).unwrap();
        let first: Vec<String> = paths
            .iter()
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect();
        write_csv(tmp.path(), &metrics).unwrap();
        let second: Vec<String> = paths
            .iter()
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect();

        assert_eq!(first, second);
        assert!(tmp.path().join(NODES_FILE).is_file());
        assert!(tmp.path().join(AVERAGES_FILE).is_file());
    }
}
