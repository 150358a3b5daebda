use std::collections::VecDeque;

use crate::types::{NodeId, SparseVector, StableMap};

/// Running sums at or below this are dropped when a vector leaves the window.
pub const EVICTION_EPSILON: f64 = 0.01;

/// Rolling moving average of sparse vectors over a fixed window.
///
/// The running sum is maintained incrementally: each update adds the incoming
/// vector and subtracts the evicted one, so the window length never shows up
/// in the cost of an update.
#[derive(Debug, Clone, Default)]
pub struct TemporalState {
    window: VecDeque<SparseVector>,
    sum: StableMap<NodeId, f64>,
    last_ops: usize,
}

impl TemporalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `input` into the window and return the scaled average of every key
    /// still present in the running sum.
    pub fn update(
        &mut self,
        input: &SparseVector,
        window_length: usize,
        multiplier: f64,
    ) -> SparseVector {
        let window_length = window_length.max(1);
        let mut ops = 0usize;

        for (&id, &value) in input {
            *self.sum.entry(id).or_insert(0.0) += value;
            ops += 1;
        }
        self.window.push_front(input.clone());

        if self.window.len() > window_length {
            if let Some(evicted) = self.window.pop_back() {
                for (id, value) in evicted {
                    if let Some(current) = self.sum.get_mut(&id) {
                        *current -= value;
                        if *current <= EVICTION_EPSILON {
                            self.sum.remove(&id);
                        }
                    }
                    ops += 1;
                }
            }
        }
        self.last_ops = ops;

        let steps = self.window.len() as f64;
        self.sum
            .iter()
            .filter(|&(_, &sum)| sum > 0.0)
            .map(|(&id, &sum)| (id, sum / steps * multiplier))
            .collect()
    }

    /// Current window occupancy.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Keys currently held in the running sum.
    pub fn tracked(&self) -> usize {
        self.sum.len()
    }

    /// Running-sum mutations performed by the last `update`.
    pub fn last_update_ops(&self) -> usize {
        self.last_ops
    }
}
