use std::collections::BTreeMap;

/// Counters for one message direction of one process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectionStats {
    pub msgs: u64,
    pub bytes: u64,
    min: Option<u64>,
    max: Option<u64>,
    /// Message size -> number of messages of that size.
    pub sizes: BTreeMap<u64, u64>,
}

impl DirectionStats {
    pub fn record(&mut self, len: u64) {
        self.msgs += 1;
        self.bytes += len;
        *self.sizes.entry(len).or_default() += 1;
        self.min = Some(self.min.map_or(len, |m| m.min(len)));
        self.max = Some(self.max.map_or(len, |m| m.max(len)));
    }

    /// Smallest message size seen, `None` before the first message.
    pub fn min(&self) -> Option<u64> {
        self.min
    }

    /// Largest message size seen, `None` before the first message.
    pub fn max(&self) -> Option<u64> {
        self.max
    }

    pub fn is_empty(&self) -> bool {
        self.msgs == 0
    }
}

/// Send and receive statistics of a process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageStats {
    pub sent: DirectionStats,
    pub recv: DirectionStats,
}

/// Idle phases between communication events of a process.
///
/// The first gap is measured from tick 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GapTracker {
    last: u64,
    min: Option<u64>,
    max: Option<u64>,
    total: u64,
    gaps: Vec<u64>,
}

impl GapTracker {
    pub fn update(&mut self, time: u64) {
        let gap = time.saturating_sub(self.last);
        self.last = time;

        self.min = Some(self.min.map_or(gap, |m| m.min(gap)));
        self.max = Some(self.max.map_or(gap, |m| m.max(gap)));
        self.total += gap;
        self.gaps.push(gap);
    }

    /// Shortest gap in ticks, 0 before the first event.
    pub fn min(&self) -> u64 {
        self.min.unwrap_or(0)
    }

    /// Longest gap in ticks, 0 before the first event.
    pub fn max(&self) -> u64 {
        self.max.unwrap_or(0)
    }

    /// Mean gap in ticks, 0.0 before the first event.
    pub fn avg(&self) -> f64 {
        if self.gaps.is_empty() {
            return 0.0;
        }
        self.total as f64 / self.gaps.len() as f64
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn gaps(&self) -> &[u64] {
        &self.gaps
    }

    /// Tick of the most recent event.
    pub fn last(&self) -> u64 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_stats_record() {
        let mut ds = DirectionStats::default();
        assert!(ds.is_empty());
        assert_eq!(ds.min(), None);

        ds.record(100);
        ds.record(8);
        ds.record(100);

        assert_eq!(ds.msgs, 3);
        assert_eq!(ds.bytes, 208);
        assert_eq!(ds.min(), Some(8));
        assert_eq!(ds.max(), Some(100));
        assert_eq!(ds.sizes.get(&100), Some(&2));
        assert_eq!(ds.sizes.get(&8), Some(&1));
    }

    #[test]
    fn test_zero_length_message() {
        let mut ds = DirectionStats::default();
        ds.record(0);
        assert_eq!(ds.msgs, 1);
        assert_eq!(ds.bytes, 0);
        assert_eq!(ds.min(), Some(0));
        assert_eq!(ds.max(), Some(0));
    }

    #[test]
    fn test_gap_tracker() {
        let mut gaps = GapTracker::default();
        gaps.update(10);
        gaps.update(15);
        gaps.update(45);

        assert_eq!(gaps.gaps(), &[10, 5, 30]);
        assert_eq!(gaps.min(), 5);
        assert_eq!(gaps.max(), 30);
        assert_eq!(gaps.total(), 45);
        assert_eq!(gaps.avg(), 15.0);
        assert_eq!(gaps.last(), 45);
    }

    #[test]
    fn test_gap_tracker_empty() {
        let gaps = GapTracker::default();
        assert_eq!(gaps.min(), 0);
        assert_eq!(gaps.max(), 0);
        assert_eq!(gaps.avg(), 0.0);
        assert!(gaps.gaps().is_empty());
    }

    #[test]
    fn test_gap_tracker_out_of_order() {
        // Non-monotonic timestamps clamp to a zero gap
        let mut gaps = GapTracker::default();
        gaps.update(50);
        gaps.update(40);
        assert_eq!(gaps.gaps(), &[50, 0]);
    }
}
