//! One entity's sorted, immutable sample sequence plus its index.

use crate::core::interpolate::interpolate;
use crate::core::sample::{Position, Sample};
use crate::core::state::TimeRange;
use crate::core::temporal_index::TemporalIndex;

#[derive(Clone, Debug, Default)]
pub struct Trajectory {
    /// Sorted ascending by timestamp (stable)
    samples: Vec<Sample>,
    index: TemporalIndex,
}

impl Trajectory {
    /// Build from validated samples in arrival order.
    pub fn new(samples: Vec<Sample>) -> Self {
        let timestamps: Vec<i64> = samples.iter().map(|s| s.timestamp_ms).collect();
        let index = TemporalIndex::build(&timestamps);
        let sorted = index.order().iter().map(|&i| samples[i].clone()).collect();
        Self { samples: sorted, index }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn index(&self) -> &TemporalIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    /// `[first, last]` timestamps, `None` when empty
    pub fn range(&self) -> Option<TimeRange> {
        Some(TimeRange::new(self.index.first()?, self.index.last()?))
    }

    /// Bracketing samples for `target` (epoch ms)
    pub fn bracket(&self, target: f64) -> (Option<&Sample>, Option<&Sample>) {
        let b = self.index.bracket(target);
        (
            b.before.and_then(|i| self.samples.get(i)),
            b.after.and_then(|i| self.samples.get(i)),
        )
    }

    pub fn position_at(&self, target: f64) -> Option<Position> {
        let (before, after) = self.bracket(target);
        interpolate(before, after, target)
    }
}
