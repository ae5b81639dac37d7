//! Per-entity sorted timestamp index.
//!
//! Built once per `load_entities`, then queried every frame. Lookup is a
//! binary search over the sorted timestamp column; the parallel `order`
//! column maps sorted positions back to construction order.

use std::collections::HashMap;

/// Sample pair surrounding a target time (indices into sorted order).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Bracket {
    pub before: Option<usize>,
    pub after: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct TemporalIndex {
    /// Sorted ascending, ties in construction order
    timestamps: Vec<i64>,
    /// sorted position -> construction index
    order: Vec<usize>,
    /// timestamp -> last sorted position carrying it
    exact: HashMap<i64, usize>,
}

impl TemporalIndex {
    /// Build from timestamps in construction order. Stable sort.
    pub fn build(timestamps: &[i64]) -> Self {
        let mut order: Vec<usize> = (0..timestamps.len()).collect();
        order.sort_by_key(|&i| timestamps[i]);

        let sorted: Vec<i64> = order.iter().map(|&i| timestamps[i]).collect();
        let mut exact = HashMap::with_capacity(sorted.len());
        for (pos, &ts) in sorted.iter().enumerate() {
            // later duplicates overwrite earlier ones
            exact.insert(ts, pos);
        }

        Self {
            timestamps: sorted,
            order,
            exact,
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Sorted timestamp column
    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    /// Sorted permutation (`order()[sorted_pos] == construction index`)
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn first(&self) -> Option<i64> {
        self.timestamps.first().copied()
    }

    pub fn last(&self) -> Option<i64> {
        self.timestamps.last().copied()
    }

    /// Construction index of the sample at sorted position `pos`
    pub fn original_index(&self, pos: usize) -> Option<usize> {
        self.order.get(pos).copied()
    }

    /// Sorted position of the last sample at exactly `ts`
    pub fn exact(&self, ts: i64) -> Option<usize> {
        self.exact.get(&ts).copied()
    }

    /// Greatest timestamp <= `target`, or `None` if `target` precedes the first sample.
    pub fn lookup_floor(&self, target: i64) -> Option<usize> {
        let upper = self.timestamps.partition_point(|&ts| ts <= target);
        upper.checked_sub(1)
    }

    /// Bracketing samples for a fractional target time (epoch ms).
    ///
    /// An exact hit returns the same position as `before` and `after`.
    pub fn bracket(&self, target: f64) -> Bracket {
        if self.timestamps.is_empty() || target.is_nan() {
            return Bracket::default();
        }

        let floor_ms = target.floor() as i64;
        let is_whole = target == floor_ms as f64;
        if is_whole && let Some(pos) = self.exact(floor_ms) {
            return Bracket {
                before: Some(pos),
                after: Some(pos),
            };
        }

        match self.lookup_floor(floor_ms) {
            None => Bracket {
                before: None,
                after: Some(0),
            },
            Some(pos) => Bracket {
                before: Some(pos),
                after: (pos + 1 < self.timestamps.len()).then_some(pos + 1),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Linear-scan reference for `lookup_floor`
    fn floor_reference(sorted: &[i64], target: i64) -> Option<usize> {
        let mut found = None;
        for (i, &ts) in sorted.iter().enumerate() {
            if ts <= target {
                found = Some(i);
            }
        }
        found
    }

    /// Small deterministic LCG so the test needs no rand dependency
    fn lcg(seed: &mut u64) -> u64 {
        *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        *seed >> 33
    }

    #[test]
    fn test_lookup_matches_linear_scan() {
        let mut seed = 0xC0FFEE;
        for round in 0..50 {
            let n = (lcg(&mut seed) % 40) as usize + round % 3;
            let raw: Vec<i64> = (0..n).map(|_| (lcg(&mut seed) % 500) as i64 - 100).collect();
            let index = TemporalIndex::build(&raw);

            let mut sorted = raw.clone();
            sorted.sort();
            assert_eq!(index.timestamps(), sorted.as_slice());

            for target in -200..500 {
                assert_eq!(
                    index.lookup_floor(target),
                    floor_reference(index.timestamps(), target),
                    "round {} target {}",
                    round,
                    target
                );
            }
        }
    }

    #[test]
    fn test_duplicates_pick_later_construction_order() {
        let index = TemporalIndex::build(&[30, 10, 20, 10]);
        assert_eq!(index.timestamps(), &[10, 10, 20, 30]);
        assert_eq!(index.order(), &[1, 3, 2, 0]);

        let pos = index.lookup_floor(15).unwrap();
        assert_eq!(pos, 1);
        assert_eq!(index.original_index(pos), Some(3));
        assert_eq!(index.exact(10), Some(1));
    }

    #[test]
    fn test_bracket_edges() {
        let index = TemporalIndex::build(&[100, 200, 300]);

        assert_eq!(index.bracket(50.0), Bracket { before: None, after: Some(0) });
        assert_eq!(index.bracket(200.0), Bracket { before: Some(1), after: Some(1) });
        assert_eq!(index.bracket(250.5), Bracket { before: Some(1), after: Some(2) });
        assert_eq!(index.bracket(999.0), Bracket { before: Some(2), after: None });
        assert_eq!(index.bracket(99.5), Bracket { before: None, after: Some(0) });
    }

    #[test]
    fn test_empty_index() {
        let index = TemporalIndex::build(&[]);
        assert!(index.is_empty());
        assert_eq!(index.lookup_floor(0), None);
        assert_eq!(index.bracket(0.0), Bracket::default());
        assert_eq!(index.first(), None);
    }
}
