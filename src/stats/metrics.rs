//! Derived metrics.
//!
//! Everything here is a pure read of the [`TraceStats`] snapshot; calling
//! any of it twice without ingesting in between gives the same numbers.

use log::warn;

use super::TraceStats;
use crate::utils::mean;

/// Which performance counters hold the floating point operation count.
///
/// A counter only counts as present when its last sample is non-zero. The
/// primary counter wins; the fallback is consulted only when the primary is
/// absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlopCounterPolicy {
    pub primary: String,
    pub fallback: Option<String>,
}

impl Default for FlopCounterPolicy {
    fn default() -> Self {
        Self {
            primary: "PAPI_FP_OPS".to_string(),
            fallback: Some("PAPI_FP_INS".to_string()),
        }
    }
}

/// Derived metrics of a single process. Idle times are in seconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessMetrics {
    pub process: u32,
    /// Communicated bytes per floating point operation.
    pub verbosity: f64,
    /// Sent messages per second of application runtime.
    pub message_rate: f64,
    pub idle_min: f64,
    pub idle_max: f64,
    pub idle_avg: f64,
    pub idle_total: f64,
    /// Total idle time divided by application runtime.
    pub idle_fraction: f64,
    pub msgs_tx: u64,
    pub msgs_rx: u64,
    pub bytes_tx: u64,
    pub bytes_rx: u64,
    pub flops: u64,
    /// Floating point operations per second of application runtime.
    pub flop_rate: f64,
}

/// Arithmetic means over all processes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AverageMetrics {
    pub verbosity: f64,
    pub message_rate: f64,
    pub idle_min: f64,
    pub idle_max: f64,
    pub idle_avg: f64,
    pub idle_total: f64,
    pub idle_fraction: f64,
    pub msgs_tx: f64,
    pub msgs_rx: f64,
    pub bytes_tx: f64,
    pub bytes_rx: f64,
    pub flop_rate: f64,
    /// Sum of all per-process flop rates.
    pub total_flop_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSummary {
    pub processes: Vec<ProcessMetrics>,
    pub average: AverageMetrics,
}

impl AverageMetrics {
    fn from_processes(rows: &[ProcessMetrics]) -> Self {
        let avg = |f: fn(&ProcessMetrics) -> f64| mean(&rows.iter().map(f).collect::<Vec<_>>());
        Self {
            verbosity: avg(|m| m.verbosity),
            message_rate: avg(|m| m.message_rate),
            idle_min: avg(|m| m.idle_min),
            idle_max: avg(|m| m.idle_max),
            idle_avg: avg(|m| m.idle_avg),
            idle_total: avg(|m| m.idle_total),
            idle_fraction: avg(|m| m.idle_fraction),
            msgs_tx: avg(|m| m.msgs_tx as f64),
            msgs_rx: avg(|m| m.msgs_rx as f64),
            bytes_tx: avg(|m| m.bytes_tx as f64),
            bytes_rx: avg(|m| m.bytes_rx as f64),
            flop_rate: avg(|m| m.flop_rate),
            total_flop_rate: rows.iter().map(|m| m.flop_rate).sum(),
        }
    }
}

/// `value / seconds`, or 0 when the runtime is unknown.
fn per_second(value: f64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        value / seconds
    } else {
        0.0
    }
}

impl TraceStats {
    /// Floating point operation count of a process according to `policy`.
    ///
    /// Logs a warning and returns 0 when neither counter was sampled.
    pub fn flops(&self, process: u32, policy: &FlopCounterPolicy) -> u64 {
        let sampled = |name: &str| self.counter_value(process, name).filter(|&v| v > 0);

        if let Some(value) = sampled(&policy.primary) {
            return value;
        }
        if let Some(value) = policy.fallback.as_deref().and_then(sampled) {
            return value;
        }

        match &policy.fallback {
            Some(fallback) => warn!(
                "P{process}: no {} or {fallback} recorded",
                policy.primary
            ),
            None => warn!("P{process}: no {} recorded", policy.primary),
        }
        0
    }

    /// Communicated bytes (sent + received) per floating point operation.
    pub fn verbosity(&self, process: u32, policy: &FlopCounterPolicy) -> f64 {
        self.verbosity_from(process, self.flops(process, policy))
    }

    fn verbosity_from(&self, process: u32, flops: u64) -> f64 {
        if flops == 0 {
            return 0.0;
        }
        let bytes = self.bytes_sent(process) + self.bytes_recv(process);
        bytes as f64 / flops as f64
    }

    /// Sent messages per second of application runtime.
    pub fn message_rate(&self, process: u32) -> f64 {
        per_second(self.num_sent(process) as f64, self.application_time())
    }

    /// Total idle time as a fraction of application runtime.
    pub fn idle_fraction(&self, process: u32) -> f64 {
        let total = self.idle(process).map_or(0, |g| g.total());
        per_second(self.clock().absolute_time(total), self.application_time())
    }

    /// Floating point operations per second of application runtime.
    pub fn flop_rate(&self, process: u32, policy: &FlopCounterPolicy) -> f64 {
        per_second(self.flops(process, policy) as f64, self.application_time())
    }

    pub fn process_metrics(&self, process: u32, policy: &FlopCounterPolicy) -> ProcessMetrics {
        let clock = self.clock();
        let app_time = self.application_time();
        let flops = self.flops(process, policy);

        let (idle_min, idle_max, idle_avg, idle_total) = match self.idle(process) {
            Some(gaps) => (
                clock.absolute_time(gaps.min()),
                clock.absolute_time(gaps.max()),
                // avg is fractional ticks; scale instead of truncating
                if clock.resolution > 0 {
                    gaps.avg() / clock.resolution as f64
                } else {
                    0.0
                },
                clock.absolute_time(gaps.total()),
            ),
            None => (0.0, 0.0, 0.0, 0.0),
        };

        ProcessMetrics {
            process,
            verbosity: self.verbosity_from(process, flops),
            message_rate: self.message_rate(process),
            idle_min,
            idle_max,
            idle_avg,
            idle_total,
            idle_fraction: per_second(idle_total, app_time),
            msgs_tx: self.num_sent(process),
            msgs_rx: self.num_recv(process),
            bytes_tx: self.bytes_sent(process),
            bytes_rx: self.bytes_recv(process),
            flops,
            flop_rate: per_second(flops as f64, app_time),
        }
    }

    /// Metrics of every known process and their averages.
    ///
    /// Every process contributes to the averages, including those without
    /// messages or counters, which contribute zeros.
    pub fn metrics_summary(&self, policy: &FlopCounterPolicy) -> MetricsSummary {
        let processes: Vec<ProcessMetrics> = self
            .process_ids()
            .into_iter()
            .map(|p| self.process_metrics(p, policy))
            .collect();
        let average = AverageMetrics::from_processes(&processes);
        MetricsSummary { processes, average }
    }
}
