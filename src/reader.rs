//! Newline-delimited JSON trace reader.
//!
//! One [`TraceEvent`] per line. Blank lines and lines starting with `#` are
//! skipped. Events are handed to the [`Analyzer`] in file order.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::error::InvalidInput;
use crate::events::{Analyzer, TraceEvent};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSummary {
    pub lines: usize,
    pub definitions: u64,
    pub events: u64,
}

/// Decode a single line, `None` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<TraceEvent>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

pub fn read_trace<R: BufRead>(input: R, analyzer: &mut Analyzer) -> Result<ReadSummary> {
    let mut summary = ReadSummary::default();

    for (idx, line) in input.lines().enumerate() {
        let lineno = idx + 1;
        let line = line.with_context(|| format!("Failed to read line {lineno}"))?;
        summary.lines = lineno;

        let event = parse_line(&line)
            .map_err(|e| InvalidInput::new(format!("line {lineno}: {e}")))?;
        let Some(event) = event else {
            continue;
        };

        if event.is_definition() {
            summary.definitions += 1;
        } else {
            summary.events += 1;
        }
        analyzer
            .handle(&event)
            .with_context(|| format!("line {lineno}"))?;
    }

    Ok(summary)
}

pub fn read_trace_file(path: &Path, analyzer: &mut Analyzer) -> Result<ReadSummary> {
    let file =
        File::open(path).with_context(|| format!("Failed to open trace {}", path.display()))?;
    let summary = read_trace(BufReader::new(file), analyzer)?;
    info!(
        "Read {} definitions and {} events from {}",
        summary.definitions,
        summary.events,
        path.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ExitStatus;
    use std::io::Cursor;

    const TRACE: &str = r#"# two processes exchanging one message
{"type":"def_timer_resolution","ticks_per_second":1000}
{"type":"def_time_range","begin":0,"end":4000}
{"type":"def_process","process":0,"name":"rank 0"}
{"type":"def_process","process":1,"name":"rank 1"}
{"type":"def_function","function":1,"name":"MPI_Send","group":1}

{"type":"enter","time":1000,"process":0,"function":1}
{"type":"send_message","time":1500,"sender":0,"receiver":1,"length":256}
{"type":"leave","time":3000,"process":0,"function":1}
{"type":"receive_message","time":1600,"receiver":1,"sender":0,"length":256}
"#;

    fn analyzer() -> Analyzer {
        Analyzer::new(&Config::default()).unwrap()
    }

    #[test]
    fn test_parse_line_skips() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("# comment").unwrap().is_none());
        assert!(parse_line("{").is_err());
    }

    #[test]
    fn test_read_trace() {
        let mut analyzer = analyzer();
        let summary = read_trace(Cursor::new(TRACE), &mut analyzer).unwrap();

        assert_eq!(summary.lines, 11);
        assert_eq!(summary.definitions, 5);
        assert_eq!(summary.events, 4);

        let stats = analyzer.stats();
        assert_eq!(stats.function_time(0, 1), 2.0);
        assert_eq!(stats.function_calls(0, 1), 1);
        assert_eq!(stats.num_sent_global(), stats.num_recv_global());
    }

    #[test]
    fn test_malformed_line() {
        let mut analyzer = analyzer();
        let input = "{\"type\":\"def_creator\",\"creator\":\"x\"}\n{\"type\":\"nope\"}\n";
        let err = read_trace(Cursor::new(input), &mut analyzer).unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert_eq!(ExitStatus::from_error(&err), ExitStatus::InvalidInput);
    }

    #[test]
    fn test_violation_has_line_context() {
        let mut analyzer = analyzer();
        let input = r#"{"type":"leave","time":5,"process":0,"function":9}"#;
        let err = read_trace(Cursor::new(input), &mut analyzer).unwrap_err();
        assert_eq!(err.to_string(), "line 1");
        assert_eq!(ExitStatus::from_error(&err), ExitStatus::Runtime);
    }

    #[test]
    fn test_missing_file() {
        let mut analyzer = analyzer();
        let err = read_trace_file(Path::new("/nonexistent/trace.jsonl"), &mut analyzer)
            .unwrap_err();
        assert_eq!(ExitStatus::from_error(&err), ExitStatus::Runtime);
    }
}
