//! Static trace metadata.
//!
//! Definitions arrive once per id, usually before the events that reference
//! them. Lookups never fail: an unknown id yields the same empty value a
//! fresh definition would have, so event handlers can resolve names without
//! caring whether the definition has been seen yet.

use std::collections::{BTreeMap, BTreeSet};

/// Process definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessDef {
    pub name: String,
    /// Parent process id, 0 for a root process.
    pub parent: u32,
}

/// Process group definition. Communicators are represented as process groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessGroupDef {
    pub name: String,
    /// Member count as declared by the trace.
    pub num_members: u32,
    pub members: BTreeSet<u32>,
}

impl Default for ProcessGroupDef {
    fn default() -> Self {
        Self {
            name: "noname".to_string(),
            num_members: 0,
            members: BTreeSet::new(),
        }
    }
}

/// Function definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub group: u32,
    /// Source code location token.
    pub source: u32,
}

/// Counter definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterDef {
    pub name: String,
    pub unit: String,
    pub group: u32,
}

/// Collective operation descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectiveDef {
    pub name: String,
    /// Numeric operation class (barrier, one-to-all, all-to-one, ...).
    pub op_type: u32,
}

/// Trace-level parameters used to turn raw ticks into physical time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceClock {
    pub creator: String,
    pub time_begin: u64,
    pub time_end: u64,
    /// Ticks per second.
    pub resolution: u64,
}

impl TraceClock {
    /// Seconds since trace start for a raw tick value.
    ///
    /// Returns 0.0 while no timer resolution has been defined.
    pub fn absolute_time(&self, ticks: u64) -> f64 {
        if self.resolution == 0 {
            return 0.0;
        }
        ticks as f64 / self.resolution as f64
    }

    /// Fraction of the whole run at which `ticks` lies.
    ///
    /// Only meaningful once the trace time range has been defined; returns
    /// 0.0 before that.
    pub fn relative_time(&self, ticks: u64) -> f64 {
        if self.time_end == 0 {
            return 0.0;
        }
        ticks as f64 / self.time_end as f64
    }

    pub fn to_nanos(&self, ticks: u64) -> u64 {
        (self.absolute_time(ticks) * 1e9) as u64
    }

    /// Application runtime in seconds.
    pub fn application_time(&self) -> f64 {
        self.absolute_time(self.time_end)
    }
}

/// Lookup tables for every definition record of a trace.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    processes: BTreeMap<u32, ProcessDef>,
    process_groups: BTreeMap<u32, ProcessGroupDef>,
    function_groups: BTreeMap<u32, String>,
    functions: BTreeMap<u32, FunctionDef>,
    counter_groups: BTreeMap<u32, String>,
    counters: BTreeMap<u32, CounterDef>,
    collectives: BTreeMap<u32, CollectiveDef>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_process(&mut self, id: u32, name: impl Into<String>, parent: u32) {
        self.processes.insert(
            id,
            ProcessDef {
                name: name.into(),
                parent,
            },
        );
    }

    pub fn add_process_group(
        &mut self,
        id: u32,
        name: impl Into<String>,
        num_members: u32,
        members: BTreeSet<u32>,
    ) {
        self.process_groups.insert(
            id,
            ProcessGroupDef {
                name: name.into(),
                num_members,
                members,
            },
        );
    }

    pub fn add_function_group(&mut self, id: u32, name: impl Into<String>) {
        self.function_groups.insert(id, name.into());
    }

    pub fn add_function(&mut self, id: u32, name: impl Into<String>, group: u32, source: u32) {
        self.functions.insert(
            id,
            FunctionDef {
                name: name.into(),
                group,
                source,
            },
        );
    }

    pub fn add_counter_group(&mut self, id: u32, name: impl Into<String>) {
        self.counter_groups.insert(id, name.into());
    }

    pub fn add_counter(
        &mut self,
        id: u32,
        name: impl Into<String>,
        unit: impl Into<String>,
        group: u32,
    ) {
        self.counters.insert(
            id,
            CounterDef {
                name: name.into(),
                unit: unit.into(),
                group,
            },
        );
    }

    pub fn add_collective(&mut self, id: u32, op_type: u32, name: impl Into<String>) {
        self.collectives.insert(
            id,
            CollectiveDef {
                name: name.into(),
                op_type,
            },
        );
    }

    pub fn num_processes(&self) -> usize {
        self.processes.len()
    }

    pub fn num_functions(&self) -> usize {
        self.functions.len()
    }

    pub fn processes(&self) -> &BTreeMap<u32, ProcessDef> {
        &self.processes
    }

    pub fn process_groups(&self) -> &BTreeMap<u32, ProcessGroupDef> {
        &self.process_groups
    }

    pub fn function_groups(&self) -> &BTreeMap<u32, String> {
        &self.function_groups
    }

    pub fn functions(&self) -> &BTreeMap<u32, FunctionDef> {
        &self.functions
    }

    pub fn counter_groups(&self) -> &BTreeMap<u32, String> {
        &self.counter_groups
    }

    pub fn counters(&self) -> &BTreeMap<u32, CounterDef> {
        &self.counters
    }

    pub fn collectives(&self) -> &BTreeMap<u32, CollectiveDef> {
        &self.collectives
    }

    pub fn process_name(&self, id: u32) -> &str {
        self.processes.get(&id).map_or("", |p| p.name.as_str())
    }

    pub fn function_name(&self, id: u32) -> &str {
        self.functions.get(&id).map_or("", |f| f.name.as_str())
    }

    /// Group of a function, 0 if the function is unknown.
    pub fn function_group(&self, id: u32) -> u32 {
        self.functions.get(&id).map_or(0, |f| f.group)
    }

    pub fn function_group_name(&self, id: u32) -> &str {
        self.function_groups.get(&id).map_or("", String::as_str)
    }

    pub fn counter_name(&self, id: u32) -> &str {
        self.counters.get(&id).map_or("", |c| c.name.as_str())
    }

    pub fn counter_unit(&self, id: u32) -> &str {
        self.counters.get(&id).map_or("", |c| c.unit.as_str())
    }

    pub fn communicator_name(&self, id: u32) -> &str {
        self.process_groups.get(&id).map_or("noname", |g| g.name.as_str())
    }

    /// Members of a communicator; empty for an unknown id.
    pub fn communicator_members(&self, id: u32) -> BTreeSet<u32> {
        self.process_groups
            .get(&id)
            .map(|g| g.members.clone())
            .unwrap_or_default()
    }

    pub fn communicator_size(&self, id: u32) -> usize {
        self.process_groups.get(&id).map_or(0, |g| g.members.len())
    }

    pub fn collective_name(&self, id: u32) -> &str {
        self.collectives.get(&id).map_or("", |c| c.name.as_str())
    }

    pub fn collective_type(&self, id: u32) -> u32 {
        self.collectives.get(&id).map_or(0, |c| c.op_type)
    }
}
