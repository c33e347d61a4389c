//! Decoded trace events and their dispatch.
//!
//! A trace is a sequence of [`TraceEvent`]s: definition records describing
//! processes, functions, counters and communicators, and timestamped events
//! referencing them. [`Analyzer::handle`] routes each event to the
//! visualizer and the statistics engine.
//!
//! On the wire every event is one JSON object tagged by `"type"`:
//!
//! ```json
//! {"type":"def_timer_resolution","ticks_per_second":1000000}
//! {"type":"def_process","process":1,"name":"rank 0"}
//! {"type":"send_message","time":1200,"sender":1,"receiver":2,"length":4096}
//! ```

use std::io::{self, Write as _};

use anyhow::Result;
use log::info;
use serde::Deserialize;

use crate::config::Config;
use crate::definitions::TraceClock;
use crate::stats::TraceStats;
use crate::visualize::TraceVisualizer;

/// Number of events between two progress lines.
pub const PROGRESS_INTERVAL: u64 = 500_000;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum TraceEvent {
    DefCreator {
        creator: String,
    },
    DefTimeRange {
        begin: u64,
        end: u64,
    },
    DefTimerResolution {
        ticks_per_second: u64,
    },
    DefProcess {
        process: u32,
        name: String,
        #[serde(default)]
        parent: u32,
    },
    DefProcessGroup {
        group: u32,
        name: String,
        /// Declared member count, the length of `members` if absent.
        #[serde(default)]
        num_members: Option<u32>,
        members: Vec<u32>,
    },
    DefFunctionGroup {
        group: u32,
        name: String,
    },
    DefFunction {
        function: u32,
        name: String,
        group: u32,
        #[serde(default)]
        source: u32,
    },
    DefCounterGroup {
        group: u32,
        name: String,
    },
    DefCounter {
        counter: u32,
        name: String,
        #[serde(default)]
        unit: String,
        #[serde(default)]
        group: u32,
    },
    DefCollectiveOp {
        operation: u32,
        name: String,
        op_type: u32,
    },
    BeginProcess {
        time: u64,
        process: u32,
    },
    EndProcess {
        time: u64,
        process: u32,
    },
    Enter {
        time: u64,
        process: u32,
        function: u32,
    },
    Leave {
        time: u64,
        process: u32,
        function: u32,
    },
    SendMessage {
        time: u64,
        sender: u32,
        receiver: u32,
        #[serde(default)]
        communicator: u32,
        #[serde(default)]
        tag: u32,
        length: u64,
    },
    ReceiveMessage {
        time: u64,
        receiver: u32,
        sender: u32,
        #[serde(default)]
        communicator: u32,
        #[serde(default)]
        tag: u32,
        length: u64,
    },
    CounterSample {
        time: u64,
        process: u32,
        counter: u32,
        value: u64,
    },
    BeginCollectiveOp {
        time: u64,
        process: u32,
        operation: u32,
        communicator: u32,
        #[serde(default)]
        matching_id: u64,
        #[serde(default)]
        root: u32,
        sent: u64,
        received: u64,
    },
    EndCollectiveOp {
        time: u64,
        process: u32,
        #[serde(default)]
        matching_id: u64,
    },
}

impl TraceEvent {
    /// Definition records carry no timestamp.
    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            TraceEvent::DefCreator { .. }
                | TraceEvent::DefTimeRange { .. }
                | TraceEvent::DefTimerResolution { .. }
                | TraceEvent::DefProcess { .. }
                | TraceEvent::DefProcessGroup { .. }
                | TraceEvent::DefFunctionGroup { .. }
                | TraceEvent::DefFunction { .. }
                | TraceEvent::DefCounterGroup { .. }
                | TraceEvent::DefCounter { .. }
                | TraceEvent::DefCollectiveOp { .. }
        )
    }

    /// Tick of a timestamped event.
    pub fn time(&self) -> Option<u64> {
        match self {
            TraceEvent::BeginProcess { time, .. }
            | TraceEvent::EndProcess { time, .. }
            | TraceEvent::Enter { time, .. }
            | TraceEvent::Leave { time, .. }
            | TraceEvent::SendMessage { time, .. }
            | TraceEvent::ReceiveMessage { time, .. }
            | TraceEvent::CounterSample { time, .. }
            | TraceEvent::BeginCollectiveOp { time, .. }
            | TraceEvent::EndCollectiveOp { time, .. } => Some(*time),
            _ => None,
        }
    }

    /// One-line rendering of an event for raw mode, with names resolved
    /// against the definitions seen so far. `None` for definition records.
    pub fn raw_line(&self, stats: &TraceStats) -> Option<String> {
        let defs = stats.definitions();
        let clock = stats.clock();
        let secs = |t: &u64| clock.absolute_time(*t);

        let line = match self {
            TraceEvent::BeginProcess { time, process } => {
                format!("pb p={process} t={} ms", secs(time) * 1000.0)
            }
            TraceEvent::EndProcess { time, process } => {
                format!("pe p={process} t={} ms", secs(time) * 1000.0)
            }
            TraceEvent::Enter {
                time,
                process,
                function,
            } => format!(
                "ef p{process} f{function} --> {} @ {}",
                defs.function_name(*function),
                secs(time)
            ),
            TraceEvent::Leave {
                time,
                process,
                function,
            } => format!(
                "lf p{process} f{function} <-- {} @ {}",
                defs.function_name(*function),
                secs(time)
            ),
            TraceEvent::SendMessage {
                time,
                sender,
                receiver,
                length,
                ..
            } => format!("sm p{sender} --> {length} B --> p{receiver} @ {}", secs(time)),
            TraceEvent::ReceiveMessage {
                time,
                receiver,
                sender,
                length,
                ..
            } => format!("rm p{receiver} <-- {length} B <-- p{sender} @ {}", secs(time)),
            TraceEvent::CounterSample {
                time,
                process,
                counter,
                value,
            } => format!(
                "ct p{process} c{counter} \"{}\" v={value} {} @ {}",
                defs.counter_name(*counter),
                defs.counter_unit(*counter),
                secs(time)
            ),
            TraceEvent::BeginCollectiveOp {
                time,
                process,
                operation,
                communicator,
                matching_id,
                root,
                sent,
                received,
            } => format!(
                "cb m{matching_id} p{process} root={root} op={operation} ({}) c={communicator} ({}) s={sent} r={received} @ {}",
                defs.collective_name(*operation),
                defs.communicator_name(*communicator),
                secs(time)
            ),
            TraceEvent::EndCollectiveOp {
                time,
                process,
                matching_id,
            } => format!("ce m{matching_id} p{process} @ {}", secs(time)),
            _ => return None,
        };
        Some(line)
    }
}

/// Routes decoded events to the statistics engine and the visualizer.
pub struct Analyzer {
    stats: TraceStats,
    viz: TraceVisualizer,
    raw_events: bool,
    progress: bool,
    events_seen: u64,
}

impl Analyzer {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            stats: TraceStats::with_counter_filter(config.counter_filter()?),
            viz: TraceVisualizer::new(config.trace_name.clone()),
            raw_events: config.raw_events,
            progress: config.progress,
            events_seen: 0,
        })
    }

    pub fn stats(&self) -> &TraceStats {
        &self.stats
    }

    pub fn visualizer(&self) -> &TraceVisualizer {
        &self.viz
    }

    pub fn into_parts(self) -> (TraceStats, TraceVisualizer) {
        (self.stats, self.viz)
    }

    /// Timestamped events handled so far.
    pub fn events_seen(&self) -> u64 {
        self.events_seen
    }

    pub fn handle(&mut self, event: &TraceEvent) -> Result<()> {
        if event.is_definition() {
            self.define(event);
            return Ok(());
        }

        if self.raw_events {
            if let Some(line) = event.raw_line(&self.stats) {
                println!("{line}");
            }
        }

        match *event {
            TraceEvent::Enter {
                time,
                process,
                function,
            } => self.stats.record_function_enter(process, function, time)?,
            TraceEvent::Leave {
                time,
                process,
                function,
            } => self.stats.record_function_leave(process, function, time)?,
            TraceEvent::SendMessage {
                time,
                sender,
                length,
                ..
            } => {
                let clock = self.stats.clock();
                self.viz.add_send_p2p(clock, sender, time, length)?;
                self.viz.add_size_p2p(sender, length);
                self.stats.record_send(sender, length, time);
            }
            TraceEvent::ReceiveMessage {
                time,
                receiver,
                length,
                ..
            } => {
                self.viz
                    .add_recv_p2p(self.stats.clock(), receiver, time, length)?;
                self.stats.record_receive(receiver, length, time);
            }
            TraceEvent::CounterSample {
                process,
                counter,
                value,
                ..
            } => self.stats.record_counter_sample(process, counter, value),
            TraceEvent::BeginCollectiveOp {
                time,
                process,
                operation,
                communicator,
                sent,
                received,
                ..
            } => {
                self.viz
                    .add_collective(self.stats.clock(), process, time, sent, received)?;
                self.viz.add_size_collective(process, sent);
                self.stats
                    .record_collective(process, communicator, operation, sent, received, time);
            }
            // Only shown in raw mode
            TraceEvent::BeginProcess { .. }
            | TraceEvent::EndProcess { .. }
            | TraceEvent::EndCollectiveOp { .. } => {}
            // Consumed by define() above
            TraceEvent::DefCreator { .. }
            | TraceEvent::DefTimeRange { .. }
            | TraceEvent::DefTimerResolution { .. }
            | TraceEvent::DefProcess { .. }
            | TraceEvent::DefProcessGroup { .. }
            | TraceEvent::DefFunctionGroup { .. }
            | TraceEvent::DefFunction { .. }
            | TraceEvent::DefCounterGroup { .. }
            | TraceEvent::DefCounter { .. }
            | TraceEvent::DefCollectiveOp { .. } => {}
        }

        self.events_seen += 1;
        if self.progress && self.events_seen % PROGRESS_INTERVAL == 0 {
            if let Some(time) = event.time() {
                report_progress(self.stats.clock(), time);
            }
        }
        Ok(())
    }

    fn define(&mut self, event: &TraceEvent) {
        match event {
            TraceEvent::DefCreator { creator } => {
                info!("Trace creator: {creator}");
                self.stats.clock_mut().creator = creator.clone();
            }
            TraceEvent::DefTimeRange { begin, end } => {
                let clock = self.stats.clock_mut();
                clock.time_begin = *begin;
                clock.time_end = *end;
                info!(
                    "Trace time range: [{} ... {}] ticks, [{} ... {}] s",
                    begin,
                    end,
                    clock.absolute_time(*begin),
                    clock.absolute_time(*end)
                );
            }
            TraceEvent::DefTimerResolution { ticks_per_second } => {
                info!("Trace ticks per second: {ticks_per_second}");
                self.stats.clock_mut().resolution = *ticks_per_second;
            }
            TraceEvent::DefProcess {
                process,
                name,
                parent,
            } => self.stats.definitions_mut().add_process(*process, name.as_str(), *parent),
            TraceEvent::DefProcessGroup {
                group,
                name,
                num_members,
                members,
            } => self.stats.definitions_mut().add_process_group(
                *group,
                name.as_str(),
                num_members.unwrap_or(members.len() as u32),
                members.iter().copied().collect(),
            ),
            TraceEvent::DefFunctionGroup { group, name } => {
                self.stats.definitions_mut().add_function_group(*group, name.as_str())
            }
            TraceEvent::DefFunction {
                function,
                name,
                group,
                source,
            } => self.stats.definitions_mut().add_function(*function, name.as_str(), *group, *source),
            TraceEvent::DefCounterGroup { group, name } => {
                self.stats.definitions_mut().add_counter_group(*group, name.as_str())
            }
            TraceEvent::DefCounter {
                counter,
                name,
                unit,
                group,
            } => self.stats.definitions_mut().add_counter(*counter, name.as_str(), unit.as_str(), *group),
            TraceEvent::DefCollectiveOp {
                operation,
                name,
                op_type,
            } => self.stats.definitions_mut().add_collective(*operation, *op_type, name.as_str()),
            TraceEvent::BeginProcess { .. }
            | TraceEvent::EndProcess { .. }
            | TraceEvent::Enter { .. }
            | TraceEvent::Leave { .. }
            | TraceEvent::SendMessage { .. }
            | TraceEvent::ReceiveMessage { .. }
            | TraceEvent::CounterSample { .. }
            | TraceEvent::BeginCollectiveOp { .. }
            | TraceEvent::EndCollectiveOp { .. } => {}
        }
    }
}

fn report_progress(clock: &TraceClock, time: u64) {
    let mut stderr = io::stderr();
    let _ = write!(
        stderr,
        "Progress: {:.2} %\r",
        clock.relative_time(time) * 100.0
    );
    let _ = stderr.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> Analyzer {
        Analyzer::new(&Config::default()).unwrap()
    }

    fn feed(analyzer: &mut Analyzer, events: &[TraceEvent]) {
        for event in events {
            analyzer.handle(event).unwrap();
        }
    }

    #[test]
    fn test_parse_tagged_event() {
        let event: TraceEvent = serde_json::from_str(
            r#"{"type":"send_message","time":5,"sender":1,"receiver":2,"length":64}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            TraceEvent::SendMessage {
                time: 5,
                sender: 1,
                receiver: 2,
                communicator: 0,
                tag: 0,
                length: 64
            }
        );
        assert_eq!(event.time(), Some(5));
        assert!(!event.is_definition());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let parsed = serde_json::from_str::<TraceEvent>(
            r#"{"type":"def_creator","creator":"x","bogus":1}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_definitions_dispatch() {
        let mut analyzer = analyzer();
        feed(
            &mut analyzer,
            &[
                TraceEvent::DefCreator {
                    creator: "VampirTrace".to_string(),
                },
                TraceEvent::DefTimerResolution {
                    ticks_per_second: 1000,
                },
                TraceEvent::DefTimeRange { begin: 0, end: 8000 },
                TraceEvent::DefProcessGroup {
                    group: 4,
                    name: "MPI_COMM_WORLD".to_string(),
                    num_members: None,
                    members: vec![0, 1, 1],
                },
                TraceEvent::DefFunction {
                    function: 2,
                    name: "MPI_Init".to_string(),
                    group: 1,
                    source: 0,
                },
            ],
        );

        let stats = analyzer.stats();
        assert_eq!(stats.clock().creator, "VampirTrace");
        assert_eq!(stats.application_time(), 8.0);
        assert_eq!(stats.definitions().communicator_size(4), 2);
        assert_eq!(stats.definitions().function_name(2), "MPI_Init");
        assert_eq!(analyzer.events_seen(), 0);
    }

    #[test]
    fn test_process_group_member_count() {
        let mut analyzer = analyzer();
        for line in [
            r#"{"type":"def_process_group","group":1,"name":"world","num_members":2,"members":[0,1,1]}"#,
            r#"{"type":"def_process_group","group":2,"name":"pair","members":[3,4]}"#,
        ] {
            let event: TraceEvent = serde_json::from_str(line).unwrap();
            analyzer.handle(&event).unwrap();
        }

        let groups = analyzer.stats().definitions().process_groups();
        // Declared count wins over a duplicated member list
        assert_eq!(groups[&1].num_members, 2);
        assert_eq!(groups[&1].members.len(), 2);
        assert_eq!(groups[&2].num_members, 2);
    }

    #[test]
    fn test_send_fans_out() {
        let mut analyzer = analyzer();
        feed(
            &mut analyzer,
            &[
                TraceEvent::DefTimerResolution {
                    ticks_per_second: 100,
                },
                TraceEvent::SendMessage {
                    time: 50,
                    sender: 0,
                    receiver: 1,
                    communicator: 0,
                    tag: 0,
                    length: 32,
                },
                TraceEvent::ReceiveMessage {
                    time: 60,
                    receiver: 1,
                    sender: 0,
                    communicator: 0,
                    tag: 0,
                    length: 32,
                },
            ],
        );

        assert_eq!(analyzer.stats().bytes_sent(0), 32);
        assert_eq!(analyzer.stats().bytes_recv(1), 32);
        let viz = analyzer.visualizer();
        assert_eq!(
            viz.injections(0, crate::visualize::InjectionKind::P2pSend)[0].time_absolute,
            0.5
        );
        // Only sends feed the size histogram
        assert!(viz
            .size_histogram(1, crate::visualize::MessageClass::P2p)
            .is_none());
        assert_eq!(analyzer.events_seen(), 2);
    }

    #[test]
    fn test_collective_fans_out() {
        let mut analyzer = analyzer();
        analyzer
            .handle(&TraceEvent::BeginCollectiveOp {
                time: 10,
                process: 3,
                operation: 1,
                communicator: 7,
                matching_id: 99,
                root: 0,
                sent: 100,
                received: 50,
            })
            .unwrap();

        let (stats, viz) = analyzer.into_parts();
        let coll = stats.collective_stats(7, 1).unwrap();
        assert_eq!((coll.calls, coll.sent, coll.recv), (1, 100, 50));
        assert_eq!(stats.num_sent(3), 1);
        assert_eq!(stats.bytes_recv(3), 50);
        let sizes = viz
            .size_histogram(3, crate::visualize::MessageClass::Collective)
            .unwrap();
        assert_eq!(sizes.get(&100), Some(&1));
    }

    #[test]
    fn test_protocol_violation_propagates() {
        let mut analyzer = analyzer();
        let enter = TraceEvent::Enter {
            time: 1,
            process: 0,
            function: 5,
        };
        analyzer.handle(&enter).unwrap();
        let err = analyzer.handle(&enter).unwrap_err();
        assert!(err.to_string().starts_with("consecutive ENTER-events"));
    }

    #[test]
    fn test_counter_sample_filtered() {
        let mut analyzer = analyzer();
        feed(
            &mut analyzer,
            &[
                TraceEvent::DefCounter {
                    counter: 1,
                    name: "PAPI_TOT_CYC".to_string(),
                    unit: "#".to_string(),
                    group: 0,
                },
                TraceEvent::CounterSample {
                    time: 3,
                    process: 0,
                    counter: 1,
                    value: 1234,
                },
            ],
        );
        assert_eq!(
            analyzer.stats().counter_value(0, "PAPI_TOT_CYC"),
            Some(1234)
        );
    }

    #[test]
    fn test_raw_lines() {
        let mut stats = TraceStats::new();
        stats.clock_mut().resolution = 1000;
        stats.definitions_mut().add_function(3, "MPI_Barrier", 1, 0);

        let enter = TraceEvent::Enter {
            time: 500,
            process: 2,
            function: 3,
        };
        assert_eq!(
            enter.raw_line(&stats).unwrap(),
            "ef p2 f3 --> MPI_Barrier @ 0.5"
        );

        let send = TraceEvent::SendMessage {
            time: 2000,
            sender: 0,
            receiver: 1,
            communicator: 0,
            tag: 0,
            length: 8,
        };
        assert_eq!(send.raw_line(&stats).unwrap(), "sm p0 --> 8 B --> p1 @ 2");

        let begin = TraceEvent::BeginProcess {
            time: 1000,
            process: 4,
        };
        assert_eq!(begin.raw_line(&stats).unwrap(), "pb p=4 t=1000 ms");

        let def = TraceEvent::DefCreator {
            creator: String::new(),
        };
        assert!(def.raw_line(&stats).is_none());
    }
}
