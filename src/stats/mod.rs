//! Statistics aggregation over a trace event stream.
//!
//! [`TraceStats`] owns the definition registry and every running aggregate.
//! All aggregates are created on first reference to their key and are only
//! read once the stream has been consumed.
//!
//! # Example
//!
//! ```
//! use tracesonar::stats::TraceStats;
//!
//! let mut stats = TraceStats::new();
//! stats.clock_mut().resolution = 1000;
//! stats.definitions_mut().add_function(7, "compute", 1, 0);
//!
//! stats.record_function_enter(0, 7, 1000).unwrap();
//! stats.record_function_leave(0, 7, 3000).unwrap();
//!
//! assert_eq!(stats.function_calls(0, 7), 1);
//! assert_eq!(stats.function_time(0, 7), 2.0);
//! ```

mod functions;
mod messages;
pub mod metrics;

pub use functions::{FunctionKey, FunctionStats, ProtocolViolation, ViolationKind};
pub use messages::{DirectionStats, GapTracker, MessageStats};
pub use metrics::{FlopCounterPolicy, MetricsSummary, ProcessMetrics};

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::definitions::{Definitions, TraceClock};

/// Pattern a counter name must match to be kept as a performance counter.
pub const DEFAULT_COUNTER_PATTERN: &str = "^PAPI";

/// Key of a collective operation statistics entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectiveKey {
    pub communicator: u32,
    pub operation: u32,
}

/// Accumulated statistics of one collective operation on one communicator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectiveStats {
    pub calls: u64,
    pub sent: u64,
    pub recv: u64,
}

pub struct TraceStats {
    definitions: Definitions,
    clock: TraceClock,
    counter_filter: Regex,
    messages: BTreeMap<u32, MessageStats>,
    idle: BTreeMap<u32, GapTracker>,
    functions: BTreeMap<FunctionKey, FunctionStats>,
    collectives: BTreeMap<CollectiveKey, CollectiveStats>,
    counters: BTreeMap<u32, BTreeMap<String, u64>>,
}

impl Default for TraceStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceStats {
    pub fn new() -> Self {
        let counter_filter =
            Regex::new(DEFAULT_COUNTER_PATTERN).expect("default counter pattern is valid");
        Self::with_counter_filter(counter_filter)
    }

    /// Create an engine keeping only counters whose name matches `filter`.
    pub fn with_counter_filter(counter_filter: Regex) -> Self {
        Self {
            definitions: Definitions::new(),
            clock: TraceClock::default(),
            counter_filter,
            messages: BTreeMap::new(),
            idle: BTreeMap::new(),
            functions: BTreeMap::new(),
            collectives: BTreeMap::new(),
            counters: BTreeMap::new(),
        }
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    pub fn definitions_mut(&mut self) -> &mut Definitions {
        &mut self.definitions
    }

    pub fn clock(&self) -> &TraceClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut TraceClock {
        &mut self.clock
    }

    // Events

    pub fn record_send(&mut self, process: u32, len: u64, time: u64) {
        self.messages.entry(process).or_default().sent.record(len);
        self.idle.entry(process).or_default().update(time);
    }

    pub fn record_receive(&mut self, process: u32, len: u64, time: u64) {
        self.messages.entry(process).or_default().recv.record(len);
        self.idle.entry(process).or_default().update(time);
    }

    /// Record a collective operation.
    ///
    /// Besides the per-communicator statistics, the sent and received bytes
    /// are booked as one send and one receive of the process, so global
    /// message totals include collective traffic.
    pub fn record_collective(
        &mut self,
        process: u32,
        communicator: u32,
        operation: u32,
        sent: u64,
        recv: u64,
        time: u64,
    ) {
        let coll = self
            .collectives
            .entry(CollectiveKey {
                communicator,
                operation,
            })
            .or_default();
        coll.calls += 1;
        coll.sent += sent;
        coll.recv += recv;

        let msgs = self.messages.entry(process).or_default();
        msgs.sent.record(sent);
        msgs.recv.record(recv);

        self.idle.entry(process).or_default().update(time);
    }

    pub fn record_function_enter(
        &mut self,
        process: u32,
        function: u32,
        time: u64,
    ) -> Result<(), ProtocolViolation> {
        let key = self.function_key(process, function);
        let result = self.functions.entry(key).or_default().enter(time);
        result.map_err(|kind| self.violation(kind, key, time))
    }

    pub fn record_function_leave(
        &mut self,
        process: u32,
        function: u32,
        time: u64,
    ) -> Result<(), ProtocolViolation> {
        let key = self.function_key(process, function);
        let result = self.functions.entry(key).or_default().leave(time);
        result.map_err(|kind| self.violation(kind, key, time))
    }

    /// Store the latest value of a performance counter. Counters whose name
    /// does not match the counter filter are dropped.
    pub fn record_counter_sample(&mut self, process: u32, counter: u32, value: u64) {
        let name = self.definitions.counter_name(counter);
        if name.is_empty() || !self.counter_filter.is_match(name) {
            return;
        }
        self.counters
            .entry(process)
            .or_default()
            .insert(name.to_string(), value);
    }

    fn function_key(&self, process: u32, function: u32) -> FunctionKey {
        FunctionKey {
            process,
            group: self.definitions.function_group(function),
            function,
        }
    }

    fn violation(&self, kind: ViolationKind, key: FunctionKey, time: u64) -> ProtocolViolation {
        ProtocolViolation {
            kind,
            key,
            function_name: self.definitions.function_name(key.function).to_string(),
            time,
        }
    }

    // Global queries

    pub fn num_processes(&self) -> usize {
        self.definitions.num_processes()
    }

    pub fn num_functions(&self) -> usize {
        self.definitions.num_functions()
    }

    pub fn num_sent_global(&self) -> u64 {
        self.messages.values().map(|m| m.sent.msgs).sum()
    }

    pub fn num_recv_global(&self) -> u64 {
        self.messages.values().map(|m| m.recv.msgs).sum()
    }

    pub fn bytes_sent_global(&self) -> u64 {
        self.messages.values().map(|m| m.sent.bytes).sum()
    }

    pub fn bytes_recv_global(&self) -> u64 {
        self.messages.values().map(|m| m.recv.bytes).sum()
    }

    /// Application runtime in seconds.
    pub fn application_time(&self) -> f64 {
        self.clock.application_time()
    }

    /// Every process id known to the trace: defined processes plus any
    /// process that produced events without a definition.
    pub fn process_ids(&self) -> BTreeSet<u32> {
        let mut ids: BTreeSet<u32> = self.definitions.processes().keys().copied().collect();
        ids.extend(self.messages.keys());
        ids.extend(self.idle.keys());
        ids.extend(self.counters.keys());
        ids.extend(self.functions.keys().map(|k| k.process));
        ids
    }

    /// Communicators used by at least one collective operation.
    pub fn collective_communicators(&self) -> BTreeSet<u32> {
        self.collectives.keys().map(|k| k.communicator).collect()
    }

    /// Dense renumbering (0, 1, 2, ...) of the communicators used by
    /// collectives, in ascending id order.
    pub fn collective_communicator_map(&self) -> BTreeMap<u32, u32> {
        self.collective_communicators()
            .into_iter()
            .zip(0..)
            .collect()
    }

    // Per-process queries

    pub fn message_stats(&self, process: u32) -> Option<&MessageStats> {
        self.messages.get(&process)
    }

    pub fn all_message_stats(&self) -> &BTreeMap<u32, MessageStats> {
        &self.messages
    }

    pub fn num_sent(&self, process: u32) -> u64 {
        self.messages.get(&process).map_or(0, |m| m.sent.msgs)
    }

    pub fn bytes_sent(&self, process: u32) -> u64 {
        self.messages.get(&process).map_or(0, |m| m.sent.bytes)
    }

    pub fn num_recv(&self, process: u32) -> u64 {
        self.messages.get(&process).map_or(0, |m| m.recv.msgs)
    }

    pub fn bytes_recv(&self, process: u32) -> u64 {
        self.messages.get(&process).map_or(0, |m| m.recv.bytes)
    }

    pub fn idle(&self, process: u32) -> Option<&GapTracker> {
        self.idle.get(&process)
    }

    pub fn all_idle(&self) -> &BTreeMap<u32, GapTracker> {
        &self.idle
    }

    pub fn function_stats(&self) -> &BTreeMap<FunctionKey, FunctionStats> {
        &self.functions
    }

    pub fn function_calls(&self, process: u32, function: u32) -> u64 {
        let key = self.function_key(process, function);
        self.functions.get(&key).map_or(0, |f| f.calls)
    }

    /// Time spent in completed calls of a function, in seconds.
    pub fn function_time(&self, process: u32, function: u32) -> f64 {
        let key = self.function_key(process, function);
        self.functions
            .get(&key)
            .map_or(0.0, |f| self.clock.absolute_time(f.time))
    }

    /// Functions entered but not left, in key order.
    pub fn open_calls(&self) -> impl Iterator<Item = (&FunctionKey, &FunctionStats)> {
        self.functions.iter().filter(|(_, f)| f.is_open())
    }

    pub fn collective_stats(&self, communicator: u32, operation: u32) -> Option<&CollectiveStats> {
        self.collectives.get(&CollectiveKey {
            communicator,
            operation,
        })
    }

    pub fn all_collective_stats(&self) -> &BTreeMap<CollectiveKey, CollectiveStats> {
        &self.collectives
    }

    pub fn counters(&self, process: u32) -> Option<&BTreeMap<String, u64>> {
        self.counters.get(&process)
    }

    pub fn all_counters(&self) -> &BTreeMap<u32, BTreeMap<String, u64>> {
        &self.counters
    }

    pub fn counter_value(&self, process: u32, name: &str) -> Option<u64> {
        self.counters.get(&process)?.get(name).copied()
    }
}
