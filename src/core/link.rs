use crate::types::{Permanence, Timestep};

/// Outcome of rewarding a link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkReward {
    /// Permanence grew to the contained value.
    Grown(Permanence),
    /// The link was already past the maximum and is now permanent.
    Saturated,
}

/// A single connection from a source node into a pool.
///
/// Permanence decays linearly with the number of timesteps since the link was
/// last decayed and grows exponentially when the pool predicts correctly.
/// Decay is lazy: it only runs when the source node probes the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    permanence: Permanence,
    decayed_at: Timestep,
}

impl Link {
    pub fn new(permanence: Permanence, now: Timestep) -> Self {
        Self {
            permanence,
            decayed_at: now,
        }
    }

    #[inline]
    pub fn permanence(&self) -> Permanence {
        self.permanence
    }

    #[inline]
    pub fn decayed_at(&self) -> Timestep {
        self.decayed_at
    }

    #[inline]
    pub fn is_permanent(&self) -> bool {
        self.permanence.is_infinite()
    }

    pub fn reward(&mut self, maximum: Permanence, growth: f64) -> LinkReward {
        if self.permanence > maximum {
            self.permanence = Permanence::INFINITY;
            LinkReward::Saturated
        } else {
            self.permanence *= growth;
            LinkReward::Grown(self.permanence)
        }
    }

    /// Apply the decay accumulated since the last call. Returns `false` when
    /// the link is dead and must be removed by the caller.
    pub fn decay(&mut self, now: Timestep) -> bool {
        let elapsed = now.saturating_sub(self.decayed_at);
        self.permanence -= elapsed as Permanence;
        if self.permanence > 0.0 {
            self.decayed_at = now;
            true
        } else {
            false
        }
    }
}
