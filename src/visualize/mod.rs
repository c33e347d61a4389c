//! Event bucketing for plots.
//!
//! [`TraceVisualizer`] sees the same event stream as the statistics engine
//! but keeps export-oriented shapes: per-process injection time series,
//! message size histograms for CDF plots and inactivity gaps. Nothing is
//! summarized; every observed event stays in memory until export.

pub mod gnuplot;

use std::collections::{BTreeMap, TryReserveError};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

use crate::definitions::TraceClock;

/// Width of the zero-padded process id in per-process file names.
pub const PROCESS_ID_WIDTH: usize = 4;

pub const SEPARATOR: char = ',';

pub const INJECTION_PREFIX: &str = "inj-p";
pub const CDF_PREFIX: &str = "cdf-p";
pub const INACTIVITY_PREFIX: &str = "iahist-p";
pub const CDF_ALL_FILE: &str = "cdf-all.csv";

/// Per-process data file name, e.g. `inj-p0007.csv`.
pub fn process_file_name(prefix: &str, process: u32) -> String {
    format!("{prefix}{process:0width$}.csv", width = PROCESS_ID_WIDTH)
}

/// Category of an injection record. Sections are written in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InjectionKind {
    P2pSend,
    P2pRecv,
    CollSend,
    CollRecv,
}

impl InjectionKind {
    pub const ALL: [InjectionKind; 4] = [
        InjectionKind::P2pSend,
        InjectionKind::P2pRecv,
        InjectionKind::CollSend,
        InjectionKind::CollRecv,
    ];

    pub fn title(self) -> &'static str {
        match self {
            InjectionKind::P2pSend => "P2P Send",
            InjectionKind::P2pRecv => "P2P Recv",
            InjectionKind::CollSend => "Coll. Send",
            InjectionKind::CollRecv => "Coll. Recv",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageClass {
    P2p,
    Collective,
}

impl MessageClass {
    pub const ALL: [MessageClass; 2] = [MessageClass::P2p, MessageClass::Collective];

    pub fn title(self) -> &'static str {
        match self {
            MessageClass::P2p => "P2P",
            MessageClass::Collective => "Collectives",
        }
    }
}

/// One message injection: when it happened and how large it was.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Injection {
    /// Seconds since trace start.
    pub time_absolute: f64,
    /// Fraction of the whole run.
    pub time_relative: f64,
    pub bytes: u64,
}

/// One point of an empirical CDF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CdfPoint {
    pub size: u64,
    pub occurrences: u64,
    /// Share of all messages with a size up to and including `size`.
    pub cumulative: f64,
}

/// Empirical CDF of a size histogram, in ascending size order.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use tracesonar::visualize::cdf;
///
/// let points = cdf(&BTreeMap::from([(100, 3), (200, 1)]));
/// assert_eq!(points[0].cumulative, 0.75);
/// assert_eq!(points[1].cumulative, 1.0);
/// ```
pub fn cdf(histogram: &BTreeMap<u64, u64>) -> Vec<CdfPoint> {
    let total: u64 = histogram.values().sum();
    if total == 0 {
        return Vec::new();
    }

    let mut running = 0;
    histogram
        .iter()
        .map(|(&size, &occurrences)| {
            running += occurrences;
            CdfPoint {
                size,
                occurrences,
                cumulative: running as f64 / total as f64,
            }
        })
        .collect()
}

/// Histogram written for a message class without any observation.
fn placeholder_histogram() -> BTreeMap<u64, u64> {
    BTreeMap::from([(1, 1)])
}

#[derive(Debug, Default)]
pub struct TraceVisualizer {
    trace_name: String,
    injections: BTreeMap<u32, BTreeMap<InjectionKind, Vec<Injection>>>,
    sizes: BTreeMap<u32, BTreeMap<MessageClass, BTreeMap<u64, u64>>>,
    sizes_all: BTreeMap<MessageClass, BTreeMap<u64, u64>>,
    last_activity: BTreeMap<u32, u64>,
    inactivity: BTreeMap<u32, Vec<u64>>,
}

impl TraceVisualizer {
    pub fn new(trace_name: impl Into<String>) -> Self {
        Self {
            trace_name: trace_name.into(),
            ..Default::default()
        }
    }

    /// Series grow with every event; a failed allocation is returned
    /// instead of aborting.
    pub fn add_send_p2p(
        &mut self,
        clock: &TraceClock,
        process: u32,
        time: u64,
        bytes: u64,
    ) -> Result<(), TryReserveError> {
        self.inject(clock, process, InjectionKind::P2pSend, time, bytes)?;
        self.update_inactivity(process, time)
    }

    pub fn add_recv_p2p(
        &mut self,
        clock: &TraceClock,
        process: u32,
        time: u64,
        bytes: u64,
    ) -> Result<(), TryReserveError> {
        self.inject(clock, process, InjectionKind::P2pRecv, time, bytes)?;
        self.update_inactivity(process, time)
    }

    pub fn add_collective(
        &mut self,
        clock: &TraceClock,
        process: u32,
        time: u64,
        sent: u64,
        recv: u64,
    ) -> Result<(), TryReserveError> {
        self.inject(clock, process, InjectionKind::CollSend, time, sent)?;
        self.inject(clock, process, InjectionKind::CollRecv, time, recv)?;
        self.update_inactivity(process, time)
    }

    pub fn add_size_p2p(&mut self, process: u32, len: u64) {
        self.add_size(process, MessageClass::P2p, len);
    }

    pub fn add_size_collective(&mut self, process: u32, len: u64) {
        self.add_size(process, MessageClass::Collective, len);
    }

    fn inject(
        &mut self,
        clock: &TraceClock,
        process: u32,
        kind: InjectionKind,
        time: u64,
        bytes: u64,
    ) -> Result<(), TryReserveError> {
        let series = self
            .injections
            .entry(process)
            .or_default()
            .entry(kind)
            .or_default();
        push_reserved(
            series,
            Injection {
                time_absolute: clock.absolute_time(time),
                time_relative: clock.relative_time(time),
                bytes,
            },
        )
    }

    fn add_size(&mut self, process: u32, class: MessageClass, len: u64) {
        *self
            .sizes
            .entry(process)
            .or_default()
            .entry(class)
            .or_default()
            .entry(len)
            .or_default() += 1;
        *self.sizes_all.entry(class).or_default().entry(len).or_default() += 1;
    }

    /// First gap of a process is measured from tick 0.
    fn update_inactivity(&mut self, process: u32, time: u64) -> Result<(), TryReserveError> {
        let last = self.last_activity.entry(process).or_insert(0);
        let gap = time.saturating_sub(*last);
        *last = time;
        push_reserved(self.inactivity.entry(process).or_default(), gap)
    }

    pub fn trace_name(&self) -> &str {
        &self.trace_name
    }

    pub fn injections(&self, process: u32, kind: InjectionKind) -> &[Injection] {
        self.injections
            .get(&process)
            .and_then(|m| m.get(&kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn size_histogram(&self, process: u32, class: MessageClass) -> Option<&BTreeMap<u64, u64>> {
        self.sizes.get(&process)?.get(&class)
    }

    pub fn global_size_histogram(&self, class: MessageClass) -> Option<&BTreeMap<u64, u64>> {
        self.sizes_all.get(&class)
    }

    /// Inactivity gaps of a process in ticks.
    pub fn inactivity(&self, process: u32) -> &[u64] {
        self.inactivity
            .get(&process)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn write_section_header(&self, out: &mut String, title: &str, node: &str, columns: &str) {
        write!(
            out,
            "\"{title}\"\n# trace={}, node={node}\n# {columns}\n",
            self.trace_name
        )
        .unwrap();
    }

    /// Injection data file of a process, `None` if it never communicated.
    pub fn render_injections(&self, process: u32) -> Option<String> {
        let series = self.injections.get(&process)?;
        let placeholder = [Injection::default()];
        let columns = format!("time_absolute{SEPARATOR}time_relative{SEPARATOR}bytes");

        let mut out = String::new();
        for kind in InjectionKind::ALL {
            let records: &[Injection] = match series.get(&kind) {
                Some(records) if !records.is_empty() => records.as_slice(),
                _ => &placeholder,
            };
            self.write_section_header(&mut out, kind.title(), &process.to_string(), &columns);
            for r in records {
                writeln!(
                    out,
                    "{}{SEPARATOR}{}{SEPARATOR}{}",
                    r.time_absolute, r.time_relative, r.bytes
                )
                .unwrap();
            }
            out.push_str("\n\n");
        }
        Some(out)
    }

    fn render_cdf_sections(
        &self,
        node: &str,
        classes: Option<&BTreeMap<MessageClass, BTreeMap<u64, u64>>>,
    ) -> String {
        let columns = format!("size{SEPARATOR}occurences{SEPARATOR}percentage");
        let placeholder = placeholder_histogram();

        let mut out = String::new();
        for class in MessageClass::ALL {
            let histogram = match classes.and_then(|c| c.get(&class)) {
                Some(h) if !h.is_empty() => h,
                _ => &placeholder,
            };
            self.write_section_header(&mut out, class.title(), node, &columns);
            for p in cdf(histogram) {
                writeln!(
                    out,
                    "{}{SEPARATOR}{}{SEPARATOR}{}",
                    p.size, p.occurrences, p.cumulative
                )
                .unwrap();
            }
            out.push_str("\n\n");
        }
        out
    }

    /// CDF data file of a process, `None` if it never sent a message.
    pub fn render_cdf(&self, process: u32) -> Option<String> {
        let classes = self.sizes.get(&process)?;
        Some(self.render_cdf_sections(&process.to_string(), Some(classes)))
    }

    /// CDF data file over all processes.
    pub fn render_cdf_all(&self) -> String {
        self.render_cdf_sections("all", Some(&self.sizes_all))
    }

    /// Inactivity gaps of a process in seconds, one per line.
    pub fn render_inactivity(&self, process: u32, clock: &TraceClock) -> Option<String> {
        let gaps = self.inactivity.get(&process)?;
        let mut out = String::new();
        for &gap in gaps {
            writeln!(out, "{}", clock.absolute_time(gap)).unwrap();
        }
        Some(out)
    }

    /// Write every data file into `dir` and return the written paths.
    pub fn export(&self, dir: &Path, clock: &TraceClock) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        for &process in self.injections.keys() {
            if let Some(data) = self.render_injections(process) {
                let path = dir.join(process_file_name(INJECTION_PREFIX, process));
                write_file(&path, &data)?;
                written.push(path);
            }
        }

        for &process in self.sizes.keys() {
            if let Some(data) = self.render_cdf(process) {
                let path = dir.join(process_file_name(CDF_PREFIX, process));
                write_file(&path, &data)?;
                written.push(path);
            }
        }

        let path = dir.join(CDF_ALL_FILE);
        write_file(&path, &self.render_cdf_all())?;
        written.push(path);

        for &process in self.inactivity.keys() {
            if let Some(data) = self.render_inactivity(process, clock) {
                let path = dir.join(process_file_name(INACTIVITY_PREFIX, process));
                write_file(&path, &data)?;
                written.push(path);
            }
        }

        Ok(written)
    }
}

fn push_reserved<T>(buf: &mut Vec<T>, value: T) -> Result<(), TryReserveError> {
    buf.try_reserve(1)?;
    buf.push(value);
    Ok(())
}

pub(crate) fn write_file(path: &Path, contents: &str) -> Result<()> {
    debug!("writing {}", path.display());
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}
