//! Text statistics report.
//!
//! [`render`] is a pure function of the aggregated state: rendering twice
//! without ingesting in between yields the same text.

pub mod csv;

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;

use crate::config::Config;
use crate::stats::{DirectionStats, MetricsSummary, TraceStats};
use crate::utils::{iec_bytes, truncate_name};
use crate::visualize::write_file;

pub use csv::write_csv;

const DOUBLE_RULE: &str = "==================================================================";
const RULE: &str = "__________________________________________________________________";
const SECTION_RULE: &str = "===================================================";
const PROCESS_RULE: &str = "---------------------------------------------------";
const AVERAGE_RULE: &str = "--------------------------";

/// Longest name shown in definition tables.
const TABLE_NAME_WIDTH: usize = 30;
/// Longest name shown in function statistics.
const FUNCTION_NAME_WIDTH: usize = 25;

/// Render the complete statistics report.
pub fn render(stats: &TraceStats, metrics: &MetricsSummary, config: &Config) -> String {
    let mut out = String::new();

    out.push_str("~~~~~~~~~~~~~~~~~~~~~~ Stats ~~~~~~~~~~~~~~~~~~~~~~\n");
    render_header(&mut out, stats, config);

    render_process_groups(&mut out, stats, config);
    render_processes(&mut out, stats, config);
    out.push('\n');

    render_id_table(&mut out, "Counter Groups", stats.definitions().counter_groups());
    render_counters(&mut out, stats, config);
    out.push('\n');

    render_messages(&mut out, stats);
    out.push('\n');

    render_id_table(&mut out, "Function Groups", stats.definitions().function_groups());
    render_functions(&mut out, stats, config);
    out.push('\n');

    render_function_stats(&mut out, stats, config);
    out.push('\n');

    render_collectives(&mut out, stats);
    out.push('\n');

    render_counter_dump(&mut out, stats);
    render_metrics(&mut out, metrics);

    out.push_str(
        "Note: Metrics with respect to time may be inaccurate due to the tracing overhead!\n\n",
    );
    out.push_str("~~~~~~~~~~~~~~~~~~~~~~ /Stats ~~~~~~~~~~~~~~~~~~~~~~\n");
    out
}

/// Write the report to `tracestats_<trace name>.txt` in the output directory.
pub fn write_report(config: &Config, report: &str) -> Result<PathBuf> {
    let path = config.report_path();
    write_file(&path, report)?;
    Ok(path)
}

fn display_name(name: &str, max: usize, config: &Config) -> String {
    if config.full_names {
        name.to_string()
    } else {
        truncate_name(name, max)
    }
}

fn render_header(out: &mut String, stats: &TraceStats, config: &Config) {
    let clock = stats.clock();
    out.push_str("Trace Stats:\n");
    writeln!(out, "  Filename              : {}", config.trace_file.display()).unwrap();
    writeln!(out, "  Creator               : {}", clock.creator).unwrap();
    writeln!(out, "  Trace begin           : {} ticks", clock.time_begin).unwrap();
    writeln!(out, "  Trace end             : {} ticks", clock.time_end).unwrap();
    writeln!(
        out,
        "  Trace time resolution : {} ticks per second",
        clock.resolution
    )
    .unwrap();
    writeln!(
        out,
        "  Trace duration        : {} seconds",
        clock.application_time()
    )
    .unwrap();
    out.push('\n');
}

fn table_header(out: &mut String, title: &str, len: usize, columns: &str) {
    write!(out, "{title}: {len}\n{DOUBLE_RULE}\n{columns}\n{RULE}\n").unwrap();
}

fn render_id_table(out: &mut String, title: &str, table: &BTreeMap<u32, String>) {
    table_header(out, title, table.len(), "ID, Name");
    for (id, name) in table {
        writeln!(out, "{id:>3} | {name}").unwrap();
    }
    out.push('\n');
}

fn render_process_groups(out: &mut String, stats: &TraceStats, config: &Config) {
    let groups = stats.definitions().process_groups();
    table_header(
        out,
        "Process Groups",
        groups.len(),
        "ID, Name, Num. of Members, Group Members",
    );
    for (id, group) in groups {
        let members: Vec<String> = group.members.iter().map(u32::to_string).collect();
        writeln!(
            out,
            "{id} | {:>20} | {:>3} | {}",
            display_name(&group.name, TABLE_NAME_WIDTH, config),
            group.num_members,
            members.join(", ")
        )
        .unwrap();
    }
    out.push('\n');
}

fn render_processes(out: &mut String, stats: &TraceStats, config: &Config) {
    let processes = stats.definitions().processes();
    table_header(out, "Processes", processes.len(), "ID, Parent, Name");
    for (id, process) in processes {
        writeln!(
            out,
            "{id:>3} | {:>6} | {}",
            process.parent,
            display_name(&process.name, TABLE_NAME_WIDTH, config)
        )
        .unwrap();
    }
    out.push('\n');
}

fn render_counters(out: &mut String, stats: &TraceStats, config: &Config) {
    let counters = stats.definitions().counters();
    table_header(out, "Counters", counters.len(), "ID, Group, Unit, Name");
    for (id, counter) in counters {
        writeln!(
            out,
            "{id:>3} | {:>5} | {:>4} | {}",
            counter.group,
            counter.unit,
            display_name(&counter.name, TABLE_NAME_WIDTH, config)
        )
        .unwrap();
    }
    out.push('\n');
}

fn render_functions(out: &mut String, stats: &TraceStats, config: &Config) {
    let functions = stats.definitions().functions();
    table_header(out, "Functions", functions.len(), "ID, Group, Source, Name");
    for (id, function) in functions {
        writeln!(
            out,
            "{id:>3} | {:>5} | {:>6} | {}",
            function.group,
            function.source,
            display_name(&function.name, TABLE_NAME_WIDTH, config)
        )
        .unwrap();
    }
    out.push('\n');
}

fn render_direction(out: &mut String, title: &str, ds: &DirectionStats) {
    writeln!(out, "{title}").unwrap();
    if ds.is_empty() || ds.bytes == 0 {
        out.push_str("  No P2P messages recorded on this node.\n");
        return;
    }

    out.push_str("Details\n");
    for (size, count) in &ds.sizes {
        let share = *count as f64 / ds.msgs as f64 * 100.0;
        writeln!(out, "  {size:>9} Bytes: {count:>5}x ({share:.3}%)").unwrap();
    }
    out.push('\n');

    out.push_str("Summary\n");
    writeln!(out, "  Total : {} Bytes, {} Messages", ds.bytes, ds.msgs).unwrap();
    writeln!(out, "  Min   : {} Bytes", ds.min().unwrap_or_default()).unwrap();
    writeln!(out, "  Max   : {} Bytes", ds.max().unwrap_or_default()).unwrap();
}

fn render_messages(out: &mut String, stats: &TraceStats) {
    write!(out, "Message Statistics:\n{SECTION_RULE}\n").unwrap();
    for (process, msgs) in stats.all_message_stats() {
        write!(out, "{PROCESS_RULE}\nProcess {process}:\n{PROCESS_RULE}\n").unwrap();
        render_direction(out, "Send Statistics", &msgs.sent);
        out.push('\n');
        render_direction(out, "Recv Statistics", &msgs.recv);
        out.push('\n');
    }

    write!(out, "{PROCESS_RULE}\nAll Processes\n{PROCESS_RULE}\n").unwrap();
    writeln!(out, "  {} Messages sent", stats.num_sent_global()).unwrap();
    writeln!(out, "  {} Messages received", stats.num_recv_global()).unwrap();
    writeln!(out, "  {} sent", iec_bytes(stats.bytes_sent_global())).unwrap();
    writeln!(out, "  {} received", iec_bytes(stats.bytes_recv_global())).unwrap();
}

fn render_function_stats(out: &mut String, stats: &TraceStats, config: &Config) {
    let defs = stats.definitions();
    let clock = stats.clock();
    let app_time = stats.application_time();

    out.push_str("Function Statistics:\n");
    let mut current: Option<(u32, u32)> = None;
    for (key, fs) in stats.function_stats() {
        if current.map(|(p, _)| p) != Some(key.process) {
            if current.is_some() {
                out.push_str("\n\n");
            }
            write!(out, "{PROCESS_RULE}\nProcess {}\n{PROCESS_RULE}\n", key.process).unwrap();
            current = None;
        }
        if current != Some((key.process, key.group)) {
            if current.is_some() {
                out.push('\n');
            }
            let group = match defs.function_group_name(key.group) {
                "" => "unspecified group",
                name => name,
            };
            writeln!(out, "/--- {group} ---\\").unwrap();
            current = Some((key.process, key.group));
        }

        let secs = clock.absolute_time(fs.time);
        let percent = if app_time > 0.0 {
            secs / app_time * 100.0
        } else {
            0.0
        };
        writeln!(
            out,
            "|--> {:>30} : {:>10} calls, {:>10.3} seconds ({:.4}%)",
            display_name(defs.function_name(key.function), FUNCTION_NAME_WIDTH, config),
            fs.calls,
            secs,
            percent
        )
        .unwrap();
    }
    if current.is_some() {
        out.push_str("\n\n");
    }
}

fn render_collectives(out: &mut String, stats: &TraceStats) {
    let defs = stats.definitions();
    write!(out, "Collective Statistics:\n{SECTION_RULE}\n").unwrap();

    let mut communicator = None;
    for (key, coll) in stats.all_collective_stats() {
        if communicator != Some(key.communicator) {
            if communicator.is_some() {
                out.push('\n');
            }
            write!(
                out,
                "{}\n{PROCESS_RULE}\n",
                defs.communicator_name(key.communicator)
            )
            .unwrap();
            communicator = Some(key.communicator);
        }
        writeln!(
            out,
            "{} (type={})",
            defs.collective_name(key.operation),
            defs.collective_type(key.operation)
        )
        .unwrap();
        writeln!(out, "  calls: {}", coll.calls).unwrap();
        writeln!(out, "  sent : {} Bytes", coll.sent).unwrap();
        writeln!(out, "  recv : {} Bytes", coll.recv).unwrap();
        out.push('\n');
    }
    if communicator.is_some() {
        out.push('\n');
    }
    out.push('\n');
}

fn render_counter_dump(out: &mut String, stats: &TraceStats) {
    write!(out, "PAPI/Performance Counter Stats:\n{SECTION_RULE}\n").unwrap();

    let mut total: BTreeMap<&str, u64> = BTreeMap::new();
    for (process, counters) in stats.all_counters() {
        write!(out, "Process {process}:\n{PROCESS_RULE}\n").unwrap();
        for (name, value) in counters {
            writeln!(out, "{name:>16}   {:.3e}", *value as f64).unwrap();
            let sum = total.entry(name.as_str()).or_default();
            *sum = sum.saturating_add(*value);
        }
        out.push('\n');
    }

    write!(out, "All Processes:\n{PROCESS_RULE}\n").unwrap();
    for (name, value) in &total {
        writeln!(out, "{name:>16}   {:.3e}", *value as f64).unwrap();
    }
    out.push('\n');
}

fn render_metrics(out: &mut String, metrics: &MetricsSummary) {
    let avg = &metrics.average;
    write!(out, "Additional Metrics:\n{SECTION_RULE}\n").unwrap();

    write!(out, "Verbosity:\n{PROCESS_RULE}\n").unwrap();
    for m in &metrics.processes {
        let bytes = m.bytes_tx + m.bytes_rx;
        if m.flops == 0 || bytes == 0 {
            writeln!(
                out,
                "P{}: No flops or bytes recorded (f={}, b={bytes})",
                m.process, m.flops
            )
            .unwrap();
        } else {
            writeln!(out, "P{}: {} Bytes/Flop", m.process, m.verbosity).unwrap();
        }
    }
    write!(
        out,
        "{AVERAGE_RULE}\nGlobal Average: {} Bytes/Flop\n\n",
        avg.verbosity
    )
    .unwrap();

    write!(out, "Messages Rate:\n{PROCESS_RULE}\n").unwrap();
    for m in &metrics.processes {
        if m.msgs_tx > 0 {
            writeln!(out, "P{}: {} Msgs/s", m.process, m.message_rate).unwrap();
        } else {
            writeln!(out, "P{}: No messages recorded.", m.process).unwrap();
        }
    }
    write!(
        out,
        "{AVERAGE_RULE}\nGlobal Average: {} Messages/s\n\n",
        avg.message_rate
    )
    .unwrap();

    write!(out, "MPI Idle Time\n{PROCESS_RULE}\n").unwrap();
    out.push_str("# process min max avg tot percent\n");
    for m in &metrics.processes {
        writeln!(
            out,
            "P{}: {} {} {} {} {}",
            m.process,
            m.idle_min,
            m.idle_max,
            m.idle_avg,
            m.idle_total,
            m.idle_fraction * 100.0
        )
        .unwrap();
    }
    out.push_str(AVERAGE_RULE);
    out.push('\n');
    writeln!(out, "Global Average Min     : {} s idle", avg.idle_min).unwrap();
    writeln!(out, "Global Average Max     : {} s idle", avg.idle_max).unwrap();
    writeln!(out, "Global Average Average : {} s idle", avg.idle_avg).unwrap();
    writeln!(out, "Global Average Total   : {} s idle", avg.idle_total).unwrap();
    writeln!(
        out,
        "Global Average Percent : {} % idle",
        avg.idle_fraction * 100.0
    )
    .unwrap();
    out.push('\n');

    write!(out, "Performance:\n{PROCESS_RULE}\n").unwrap();
    for m in &metrics.processes {
        if m.flops > 0 {
            writeln!(out, "P{}: {} Flops/s", m.process, m.flop_rate).unwrap();
        } else {
            writeln!(out, "P{}: No flops recorded.", m.process).unwrap();
        }
    }
    write!(
        out,
        "{AVERAGE_RULE}\nGlobal Average: {} Flops/s\nGlobal Total  : {} Flops/s\n\n",
        avg.flop_rate, avg.total_flop_rate
    )
    .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::FlopCounterPolicy;
    use std::collections::BTreeSet;

    fn stats() -> TraceStats {
        let mut stats = TraceStats::new();
        let clock = stats.clock_mut();
        clock.creator = "unit test".to_string();
        clock.resolution = 1000;
        clock.time_end = 10_000;

        let defs = stats.definitions_mut();
        defs.add_process(0, "rank 0", 0);
        defs.add_process(1, "a process with a rather long descriptive name", 0);
        defs.add_process_group(1, "MPI_COMM_WORLD", 2, BTreeSet::from([0, 1]));
        defs.add_function_group(1, "MPI");
        defs.add_function(1, "MPI_Send", 1, 0);
        defs.add_function(2, "compute", 0, 0);
        defs.add_counter(1, "PAPI_FP_OPS", "#", 0);
        defs.add_collective(3, 2, "MPI_Bcast");

        stats.record_function_enter(0, 1, 1000).unwrap();
        stats.record_function_leave(0, 1, 3000).unwrap();
        stats.record_function_enter(0, 2, 3000).unwrap();
        stats.record_function_leave(0, 2, 4000).unwrap();
        stats.record_send(0, 2048, 1500);
        stats.record_receive(1, 2048, 1600);
        stats.record_collective(1, 1, 3, 100, 50, 5000);
        stats.record_counter_sample(0, 1, 1_000_000);
        stats
    }

    fn report(config: &Config) -> String {
        let stats = stats();
        let metrics = stats.metrics_summary(&FlopCounterPolicy::default());
        render(&stats, &metrics, config)
    }

    #[test]
    fn test_render_is_deterministic() {
        let stats = stats();
        let config = Config::default();
        let metrics = stats.metrics_summary(&FlopCounterPolicy::default());
        assert_eq!(
            render(&stats, &metrics, &config),
            render(&stats, &metrics, &config)
        );
    }

    #[test]
    fn test_header() {
        let report = report(&Config::default());
        assert!(report.starts_with("~~~~~~~~~~~~~~~~~~~~~~ Stats ~~~~~~~~~~~~~~~~~~~~~~\n"));
        assert!(report.contains("  Creator               : unit test\n"));
        assert!(report.contains("  Trace duration        : 10 seconds\n"));
        assert!(report.ends_with("~~~~~~~~~~~~~~~~~~~~~~ /Stats ~~~~~~~~~~~~~~~~~~~~~~\n"));
    }

    #[test]
    fn test_name_truncation() {
        let short = report(&Config::default());
        assert!(short.contains("  1 |      0 | a process with a rather lo ...\n"));

        let config = Config {
            full_names: true,
            ..Default::default()
        };
        let full = report(&config);
        assert!(full.contains("| a process with a rather long descriptive name\n"));
    }

    #[test]
    fn test_message_section() {
        let report = report(&Config::default());
        assert!(report.contains("       2048 Bytes:     1x (100.000%)\n"));
        assert!(report.contains("  Total : 2048 Bytes, 1 Messages\n"));
        // Collective traffic is folded into the global totals
        assert!(report.contains("  2 Messages sent\n"));
        assert!(report.contains("  2.097656 KiB sent\n"));
    }

    #[test]
    fn test_function_section() {
        let report = report(&Config::default());
        assert!(report.contains("/--- MPI ---\\\n"));
        assert!(report.contains("/--- unspecified group ---\\\n"));
        let row = format!(
            "|--> {:>30} : {:>10} calls, {:>10.3} seconds ({:.4}%)\n",
            "MPI_Send", 1, 2.0, 20.0
        );
        assert!(report.contains(&row));
    }

    #[test]
    fn test_collective_section() {
        let report = report(&Config::default());
        assert!(report.contains("MPI_COMM_WORLD\n"));
        assert!(report.contains("MPI_Bcast (type=2)\n  calls: 1\n  sent : 100 Bytes\n  recv : 50 Bytes\n"));
    }

    #[test]
    fn test_metrics_section() {
        let report = report(&Config::default());
        assert!(report.contains("     PAPI_FP_OPS   1.000e6\n"));
        assert!(report.contains("P1: No flops or bytes recorded (f=0, b=2198)\n"));
        assert!(report.contains("P0: 100000 Flops/s\n"));
        assert!(report.contains("Global Total  : 100000 Flops/s\n"));
        // The collective counts as a send of P1
        assert!(!report.contains("P1: No messages recorded."));
    }
}
