use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser};
use log::{info, warn};

use tracesonar::events::Analyzer;
use tracesonar::reader::read_trace_file;
use tracesonar::report;
use tracesonar::stats::{FlopCounterPolicy, DEFAULT_COUNTER_PATTERN};
use tracesonar::visualize::gnuplot;
use tracesonar::{validate, Config, ExitStatus};

#[derive(Debug, Parser)]
#[command(name = "tracesonar")]
#[command(about = "Aggregate statistics and plot data from MPI/HPC execution traces")]
#[command(version)]
struct Command {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Echo every trace record to stdout
    #[arg(long)]
    raw: bool,
    /// Print reading progress to stderr
    #[arg(long)]
    progress: bool,
    /// Also print the statistics report to stdout
    #[arg(short = 's', long)]
    to_screen: bool,
    /// Do not truncate names in report tables
    #[arg(long)]
    full_names: bool,
    /// Render the generated gnuplot scripts if gnuplot is installed
    #[arg(long)]
    plot: bool,
    /// Output directory [default: <trace>_SonarResults_<timestamp>]
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Counter holding the floating point operation count
    #[arg(long, default_value = "PAPI_FP_OPS")]
    flop_counter: String,
    /// Counter used when the flop counter was not sampled
    #[arg(long, default_value = "PAPI_FP_INS")]
    flop_fallback: String,
    /// Do not fall back to a second flop counter
    #[arg(long)]
    no_flop_fallback: bool,
    /// Regex a counter name must match to be recorded
    #[arg(long, default_value = DEFAULT_COUNTER_PATTERN)]
    counter_pattern: String,
    /// Trace file (JSON lines)
    trace: PathBuf,
}

impl Command {
    fn into_config(self) -> Result<Config> {
        let mut config = Config::for_trace(self.trace)?;
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        config.verbosity = self.verbose;
        config.raw_events = self.raw;
        config.progress = self.progress;
        config.stats_to_screen = self.to_screen;
        config.full_names = self.full_names;
        config.plot = self.plot;
        config.flop_policy = FlopCounterPolicy {
            primary: self.flop_counter,
            fallback: (!self.no_flop_fallback).then_some(self.flop_fallback),
        };
        config.counter_prefix = self.counter_pattern;
        Ok(config)
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(config: &Config) -> Result<()> {
    config.prepare_output_dir()?;

    let mut analyzer = Analyzer::new(config)?;
    read_trace_file(&config.trace_file, &mut analyzer)?;
    let (stats, viz) = analyzer.into_parts();

    let result = validate(&stats);
    for error in &result.errors {
        warn!("{error}");
    }
    for warning in &result.warnings {
        warn!("{warning}");
    }
    if result.has_errors() {
        warn!("Statistics may be unreliable, see the findings above");
    }

    let metrics = stats.metrics_summary(&config.flop_policy);
    let text = report::render(&stats, &metrics, config);
    let report_path = report::write_report(config, &text)?;
    if config.stats_to_screen {
        print!("{text}");
        println!("### trace stats file: {}", report_path.display());
    }
    info!("Statistics written to {}", report_path.display());

    report::write_csv(&config.output_dir, &metrics)?;
    let files = viz.export(&config.output_dir, stats.clock())?;
    info!(
        "{} data files written to {}",
        files.len(),
        config.output_dir.display()
    );

    let scripts = gnuplot::write_scripts(&config.output_dir, &config.trace_name)?;
    if config.plot {
        if gnuplot::gnuplot_available() {
            for script in &scripts {
                let Some(name) = script.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if let Err(e) = gnuplot::run_gnuplot(&config.output_dir, name) {
                    warn!("{e:#}");
                }
            }
        } else {
            warn!("gnuplot not found, skipping plots");
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let opts = match Command::try_parse() {
        Ok(opts) => opts,
        // --help and --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(ExitStatus::InvalidInput.code());
        }
    };
    init_logging(opts.verbose);

    let result = opts.into_config().and_then(|config| run(&config));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(ExitStatus::from_error(&e).code())
        }
    }
}
