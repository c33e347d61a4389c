//! End-to-end tests of the analysis pipeline on the `ring` fixture.

mod common;

use std::fs;

use tempfile::TempDir;
use tracesonar::events::Analyzer;
use tracesonar::reader::read_trace_file;
use tracesonar::report::{self, csv};
use tracesonar::visualize::{gnuplot, CDF_ALL_FILE};
use tracesonar::{validate, Config};

use common::{fixture, run_tracesonar};

fn ring_config(output_dir: &std::path::Path) -> Config {
    let mut config = Config::for_trace(fixture("ring.jsonl")).expect("Failed to build config");
    config.output_dir = output_dir.to_path_buf();
    config
}

#[test]
fn test_ring_statistics() {
    let tmp = TempDir::new().unwrap();
    let config = ring_config(tmp.path());
    assert_eq!(config.trace_name, "ring");

    let mut analyzer = Analyzer::new(&config).unwrap();
    let summary = read_trace_file(&config.trace_file, &mut analyzer).unwrap();
    assert_eq!(summary.definitions, 15);
    assert_eq!(summary.events, 30);

    let stats = analyzer.stats();
    let result = validate(stats);
    assert!(result.is_valid(), "unexpected errors: {:?}", result.errors);
    assert!(!result.has_warnings());

    assert_eq!(stats.num_sent_global(), 4);
    assert_eq!(stats.num_recv_global(), 4);
    assert_eq!(stats.bytes_sent(0), 4096 + 8);
    assert_eq!(stats.bytes_recv(1), 4096 + 8);
    assert_eq!(stats.function_calls(0, 4), 1);
    assert!((stats.function_time(0, 1) - 0.02).abs() < 1e-9);
    assert_eq!(stats.collective_stats(1, 1).unwrap().calls, 2);

    let metrics = stats.metrics_summary(&config.flop_policy);
    assert_eq!(metrics.processes.len(), 2);
    let p0 = &metrics.processes[0];
    assert_eq!(p0.flops, 4_000_000);
    assert_eq!(p0.flop_rate, 2_000_000.0);
    assert_eq!(p0.message_rate, 1.0);
    assert_eq!(metrics.average.total_flop_rate, 3_000_000.0);
}

#[test]
fn test_ring_report() {
    let tmp = TempDir::new().unwrap();
    let config = ring_config(tmp.path());

    let mut analyzer = Analyzer::new(&config).unwrap();
    read_trace_file(&config.trace_file, &mut analyzer).unwrap();
    let stats = analyzer.stats();
    let metrics = stats.metrics_summary(&config.flop_policy);

    let text = report::render(stats, &metrics, &config);
    assert!(text.contains("  Creator               : ring benchmark\n"));
    assert!(text.contains("/--- Application ---\\\n"));
    assert!(text.contains("MPI_Allreduce (type=4)\n  calls: 2\n"));
    assert!(text.contains("P0: 2000000 Flops/s\n"));

    let path = report::write_report(&config, &text).unwrap();
    assert_eq!(path, tmp.path().join("tracestats_ring.txt"));
    assert_eq!(fs::read_to_string(&path).unwrap(), text);
}

#[test]
fn test_binary_writes_all_outputs() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("results");
    let trace = fixture("ring.jsonl");

    let output = run_tracesonar(&[
        "-o",
        out.to_str().unwrap(),
        "--to-screen",
        trace.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "tracesonar failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    for name in [
        "tracestats_ring.txt",
        csv::NODES_FILE,
        csv::AVERAGES_FILE,
        "inj-p0000.csv",
        "inj-p0001.csv",
        "cdf-p0000.csv",
        "iahist-p0001.csv",
        CDF_ALL_FILE,
        gnuplot::INJECTION_SCRIPT,
        gnuplot::CDF_SCRIPT,
    ] {
        assert!(out.join(name).is_file(), "missing {name}");
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("~~~~~~~~~~~~~~~~~~~~~~ /Stats ~~~~~~~~~~~~~~~~~~~~~~"));
    assert!(stdout.contains("### trace stats file: "));

    let nodes = fs::read_to_string(out.join(csv::NODES_FILE)).unwrap();
    assert_eq!(nodes.lines().count(), 3);
    assert!(nodes.starts_with(csv::HEADER));
}

#[test]
fn test_binary_is_repeatable() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("results");
    let trace = fixture("ring.jsonl");
    let args = ["-o", out.to_str().unwrap(), trace.to_str().unwrap()];

    assert!(run_tracesonar(&args).status.success());
    let first = fs::read_to_string(out.join(csv::AVERAGES_FILE)).unwrap();
    assert!(run_tracesonar(&args).status.success());
    let second = fs::read_to_string(out.join(csv::AVERAGES_FILE)).unwrap();
    assert_eq!(first, second);
}
