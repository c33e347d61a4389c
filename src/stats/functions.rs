use std::fmt;

/// Key of a function statistics entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionKey {
    pub process: u32,
    pub group: u32,
    pub function: u32,
}

/// Call statistics of one function on one process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionStats {
    /// Tick of the pending enter, `None` while no call is open.
    open: Option<u64>,
    /// Accumulated time spent in completed calls, in ticks.
    pub time: u64,
    pub calls: u64,
}

impl FunctionStats {
    pub(crate) fn enter(&mut self, time: u64) -> Result<(), ViolationKind> {
        if self.open.is_some() {
            return Err(ViolationKind::ConsecutiveEnter);
        }
        self.open = Some(time);
        Ok(())
    }

    pub(crate) fn leave(&mut self, time: u64) -> Result<(), ViolationKind> {
        let enter = self.open.take().ok_or(ViolationKind::UnmatchedLeave)?;
        self.time += time.saturating_sub(enter);
        self.calls += 1;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Tick of the enter event of the currently open call.
    pub fn open_since(&self) -> Option<u64> {
        self.open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// A second enter arrived while a call was still open.
    ConsecutiveEnter,
    /// A leave arrived without an open call.
    UnmatchedLeave,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::ConsecutiveEnter => write!(f, "consecutive ENTER-events"),
            ViolationKind::UnmatchedLeave => write!(f, "consecutive LEAVE-events"),
        }
    }
}

/// Broken enter/leave pairing, fatal to the ingestion pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolViolation {
    pub kind: ViolationKind,
    pub key: FunctionKey,
    pub function_name: String,
    pub time: u64,
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at tick {}: p={} g={} f={} ({})",
            self.kind,
            self.time,
            self.key.process,
            self.key.group,
            self.key.function,
            self.function_name
        )
    }
}

impl std::error::Error for ProtocolViolation {}
