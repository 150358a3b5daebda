use crate::config::Params;
use crate::link::{Link, LinkReward};
use crate::types::{NodeRef, Permanence, PoolId, StableMap, StableSet, Timestep, Weight};

/// What a single activation probe did to a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The probing node has no link into this pool.
    Unlinked,
    /// The probing node's link decayed to nothing; the caller removes it.
    LinkDied,
    /// Some links are predicting, not enough to fire yet.
    Pending,
    /// The pool already fired this timestep.
    AlreadyActive,
    /// This probe made the pool fire.
    Fired,
}

/// Result of a reward pass over a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolReward {
    /// Every link is permanent: replace the pool with a [`PermanentPool`].
    pub promote: bool,
    /// Highest permanence reached by a link that grew during this pass.
    pub highest_permanence: Option<Permanence>,
}

/// A dynamic set of links, all feeding one output node.
///
/// There is no way to know in advance which links work well together. Over
/// time the pool settles on links that fire together; those reach the maximum
/// permanence and the pool gets promoted.
#[derive(Debug, Clone)]
pub struct Pool {
    output: NodeRef,
    inputs: StableMap<NodeRef, Link>,
    weight: Weight,
    // Sources whose links predicted during this timestep.
    predicting: StableSet<NodeRef>,
    // Sources whose links are permanent.
    permanent: StableSet<NodeRef>,
    activated: bool,
}

impl Pool {
    pub fn new(output: NodeRef, weight: Weight) -> Self {
        Self {
            output,
            inputs: StableMap::default(),
            weight,
            predicting: StableSet::default(),
            permanent: StableSet::default(),
            activated: false,
        }
    }

    pub(crate) fn insert_link(&mut self, source: NodeRef, link: Link) {
        self.inputs.insert(source, link);
    }

    #[inline]
    pub fn output(&self) -> NodeRef {
        self.output
    }

    #[inline]
    pub fn weight(&self) -> Weight {
        self.weight
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn link(&self, source: NodeRef) -> Option<&Link> {
        self.inputs.get(&source)
    }

    pub fn sources(&self) -> impl Iterator<Item = NodeRef> + '_ {
        self.inputs.keys().copied()
    }

    pub fn predicting(&self) -> usize {
        self.predicting.len()
    }

    pub fn permanent_links(&self) -> usize {
        self.permanent.len()
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// All links are permanent.
    pub fn is_saturated(&self) -> bool {
        !self.inputs.is_empty() && self.permanent.len() == self.inputs.len()
    }

    pub fn activate(&mut self, source: NodeRef, now: Timestep, min_links: usize) -> Activation {
        let Some(link) = self.inputs.get_mut(&source) else {
            return Activation::Unlinked;
        };
        if !link.decay(now) {
            return Activation::LinkDied;
        }
        // Keep collecting links for the reward even after firing.
        self.predicting.insert(source);
        if self.activated {
            return Activation::AlreadyActive;
        }
        if self.predicting.len() < min_links {
            return Activation::Pending;
        }
        self.activated = true;
        Activation::Fired
    }

    pub fn reward(&mut self, params: &Params) -> PoolReward {
        self.weight = params
            .clamp_weight(self.weight.saturating_add(params.pool_weight_change_rate));

        let mut highest: Option<Permanence> = None;
        for source in self.predicting.drain() {
            let Some(link) = self.inputs.get_mut(&source) else {
                continue;
            };
            match link.reward(params.maximum_link_permanence, params.exponential_growth) {
                LinkReward::Grown(p) => highest = Some(highest.map_or(p, |h| h.max(p))),
                LinkReward::Saturated => {
                    self.permanent.insert(source);
                }
            }
        }
        self.activated = false;

        PoolReward {
            promote: self.is_saturated(),
            highest_permanence: highest,
        }
    }

    pub fn punish(&mut self, params: &Params) {
        self.weight = params
            .clamp_weight(self.weight.saturating_sub(params.pool_weight_change_rate));
        self.predicting.clear();
        self.activated = false;
    }

    /// Drop the link from `source`. Returns the number of surviving links.
    pub fn remove_link(&mut self, source: NodeRef) -> usize {
        self.inputs.remove(&source);
        self.predicting.remove(&source);
        self.permanent.remove(&source);
        self.inputs.len()
    }

    pub fn clear(&mut self) {
        self.predicting.clear();
    }
}

/// Counter-based stand-in for a pool whose links are all permanent.
///
/// Linear decay is the only force that lowers permanence. With `n` nodes the
/// maximum permanence is `n^2`, which decays away only after `n^2` idle
/// timesteps, so a saturated pool is treated as permanent and the per-link
/// bookkeeping is dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct PermanentPool {
    output: NodeRef,
    weight: Weight,
    predicting: usize,
    activated: bool,
}

impl PermanentPool {
    pub fn new(output: NodeRef, weight: Weight) -> Self {
        Self {
            output,
            weight,
            predicting: 0,
            activated: false,
        }
    }

    #[inline]
    pub fn output(&self) -> NodeRef {
        self.output
    }

    #[inline]
    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn predicting(&self) -> usize {
        self.predicting
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn activate(&mut self, min_links: usize) -> Activation {
        if self.activated {
            return Activation::AlreadyActive;
        }
        self.predicting += 1;
        if self.predicting < min_links {
            return Activation::Pending;
        }
        self.activated = true;
        Activation::Fired
    }

    pub fn reward(&mut self, params: &Params) {
        self.weight = params
            .clamp_weight(self.weight.saturating_add(params.pool_weight_change_rate));
        self.predicting = 0;
        self.activated = false;
    }

    pub fn punish(&mut self, params: &Params) {
        self.weight = params
            .clamp_weight(self.weight.saturating_sub(params.pool_weight_change_rate));
        self.predicting = 0;
        self.activated = false;
    }

    pub fn clear(&mut self) {
        self.predicting = 0;
    }
}

impl From<&Pool> for PermanentPool {
    fn from(pool: &Pool) -> Self {
        PermanentPool::new(pool.output, pool.weight)
    }
}

/// Either kind of pool. Behaviour is dispatched here; only promotion looks at
/// which variant it is.
#[derive(Debug, Clone)]
pub enum AnyPool {
    Plastic(Pool),
    Permanent(PermanentPool),
}

impl AnyPool {
    pub fn output(&self) -> NodeRef {
        match self {
            AnyPool::Plastic(p) => p.output(),
            AnyPool::Permanent(p) => p.output(),
        }
    }

    pub fn weight(&self) -> Weight {
        match self {
            AnyPool::Plastic(p) => p.weight(),
            AnyPool::Permanent(p) => p.weight(),
        }
    }

    pub fn is_activated(&self) -> bool {
        match self {
            AnyPool::Plastic(p) => p.is_activated(),
            AnyPool::Permanent(p) => p.is_activated(),
        }
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, AnyPool::Permanent(_))
    }

    pub fn as_plastic(&self) -> Option<&Pool> {
        match self {
            AnyPool::Plastic(p) => Some(p),
            AnyPool::Permanent(_) => None,
        }
    }

    pub fn activate(&mut self, source: NodeRef, now: Timestep, min_links: usize) -> Activation {
        match self {
            AnyPool::Plastic(p) => p.activate(source, now, min_links),
            AnyPool::Permanent(p) => p.activate(min_links),
        }
    }

    pub fn reward(&mut self, params: &Params) -> PoolReward {
        match self {
            AnyPool::Plastic(p) => p.reward(params),
            AnyPool::Permanent(p) => {
                p.reward(params);
                PoolReward::default()
            }
        }
    }

    pub fn punish(&mut self, params: &Params) {
        match self {
            AnyPool::Plastic(p) => p.punish(params),
            AnyPool::Permanent(p) => p.punish(params),
        }
    }

    pub fn clear(&mut self) {
        match self {
            AnyPool::Plastic(p) => p.clear(),
            AnyPool::Permanent(p) => p.clear(),
        }
    }
}

/// Slot storage for every pool in the network. Freed slots are reused.
#[derive(Debug, Clone, Default)]
pub struct PoolArena {
    slots: Vec<Option<AnyPool>>,
    free: Vec<u32>,
    live: usize,
    permanent: usize,
}

impl PoolArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pool: AnyPool) -> PoolId {
        self.live += 1;
        if pool.is_permanent() {
            self.permanent += 1;
        }
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(pool);
                PoolId(index)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Some(pool));
                PoolId(index)
            }
        }
    }

    pub fn remove(&mut self, id: PoolId) -> Option<AnyPool> {
        let pool = self.slots.get_mut(id.index())?.take()?;
        self.live -= 1;
        if pool.is_permanent() {
            self.permanent -= 1;
        }
        self.free.push(id.0);
        Some(pool)
    }

    #[inline]
    pub fn get(&self, id: PoolId) -> Option<&AnyPool> {
        self.slots.get(id.index())?.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, id: PoolId) -> Option<&mut AnyPool> {
        self.slots.get_mut(id.index())?.as_mut()
    }

    pub fn contains(&self, id: PoolId) -> bool {
        self.get(id).is_some()
    }

    /// Live pools of both kinds.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn permanent_count(&self) -> usize {
        self.permanent
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoolId, &AnyPool)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|p| (PoolId(i as u32), p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;

    fn params(min_links: usize) -> Params {
        Params::resolve(
            &Tuning {
                minimum_links_in_pool: Some(min_links),
                initial_link_permanence: Some(2.0),
                maximum_link_permanence: Some(10.0),
                maximum_pool_weight: Some(3),
                minimum_pool_weight: Some(-1),
                initial_pool_weight: Some(1),
                ..Default::default()
            },
            64,
        )
        .unwrap()
    }

    fn pool_with(sources: &[u32], permanence: f64) -> Pool {
        let mut pool = Pool::new(NodeRef::new(0, 99), 1);
        for &id in sources {
            pool.insert_link(NodeRef::new(0, id), Link::new(permanence, 0));
        }
        pool
    }

    #[test]
    fn fires_once_min_links_predict() {
        let p = params(2);
        let mut pool = pool_with(&[1, 2, 3], 5.0);
        let a = |id| NodeRef::new(0, id);

        assert_eq!(pool.activate(a(1), 1, p.minimum_links_in_pool), Activation::Pending);
        assert_eq!(pool.activate(a(2), 1, p.minimum_links_in_pool), Activation::Fired);
        assert_eq!(pool.activate(a(3), 1, p.minimum_links_in_pool), Activation::AlreadyActive);
        assert_eq!(pool.activate(a(7), 1, p.minimum_links_in_pool), Activation::Unlinked);
        assert!(pool.is_activated());
        assert_eq!(pool.predicting(), 3);
    }

    #[test]
    fn partial_prediction_does_not_fire() {
        let mut pool = pool_with(&[1, 2, 3], 5.0);
        assert_eq!(pool.activate(NodeRef::new(0, 1), 1, 3), Activation::Pending);
        assert_eq!(pool.activate(NodeRef::new(0, 2), 1, 3), Activation::Pending);
        assert!(!pool.is_activated());
        pool.clear();
        assert_eq!(pool.predicting(), 0);
        assert_eq!(pool.weight(), 1);
    }

    #[test]
    fn dead_link_is_reported() {
        let mut pool = pool_with(&[1, 2], 2.0);
        assert_eq!(pool.activate(NodeRef::new(0, 1), 2, 1), Activation::LinkDied);
        assert_eq!(pool.remove_link(NodeRef::new(0, 1)), 1);
    }

    #[test]
    fn weight_saturates_at_bounds() {
        let p = params(1);
        let mut pool = pool_with(&[1], 5.0);
        for _ in 0..10 {
            pool.reward(&p);
        }
        assert_eq!(pool.weight(), p.maximum_pool_weight);
        for _ in 0..10 {
            pool.punish(&p);
        }
        assert_eq!(pool.weight(), p.minimum_pool_weight);
    }

    #[test]
    fn reward_grows_only_predicting_links() {
        let p = params(1);
        let mut pool = pool_with(&[1, 2], 2.0);
        pool.activate(NodeRef::new(0, 1), 0, 1);
        let r = pool.reward(&p);
        assert_eq!(r.highest_permanence, Some(4.0));
        assert!(!r.promote);
        assert_eq!(pool.link(NodeRef::new(0, 1)).unwrap().permanence(), 4.0);
        assert_eq!(pool.link(NodeRef::new(0, 2)).unwrap().permanence(), 2.0);
        assert_eq!(pool.predicting(), 0);
        assert!(!pool.is_activated());
    }

    #[test]
    fn promotes_only_when_every_link_is_permanent() {
        let p = params(1);
        let mut pool = pool_with(&[1, 2], 11.0);

        pool.activate(NodeRef::new(0, 1), 0, 1);
        let r = pool.reward(&p);
        assert!(!r.promote);
        assert_eq!(pool.permanent_links(), 1);

        pool.activate(NodeRef::new(0, 1), 0, 1);
        pool.activate(NodeRef::new(0, 2), 0, 1);
        let r = pool.reward(&p);
        assert!(r.promote);
        assert!(pool.is_saturated());
    }

    #[test]
    fn permanent_pool_counts_predictions() {
        let p = params(2);
        let mut pool = PermanentPool::new(NodeRef::new(0, 5), 2);
        assert_eq!(pool.activate(p.minimum_links_in_pool), Activation::Pending);
        assert_eq!(pool.activate(p.minimum_links_in_pool), Activation::Fired);
        assert_eq!(pool.activate(p.minimum_links_in_pool), Activation::AlreadyActive);
        assert_eq!(pool.predicting(), 2);
        pool.reward(&p);
        assert_eq!(pool.weight(), 3);
        assert_eq!(pool.predicting(), 0);
        assert!(!pool.is_activated());
        pool.activate(1);
        pool.clear();
        assert_eq!(pool.predicting(), 0);
    }

    #[test]
    fn permanent_pool_keeps_weight_of_source() {
        let pool = pool_with(&[1, 2], 5.0);
        let permanent = PermanentPool::from(&pool);
        assert_eq!(permanent.weight(), pool.weight());
        assert_eq!(permanent.output(), pool.output());
    }

    #[test]
    fn arena_reuses_freed_slots() {
        let mut arena = PoolArena::new();
        let a = arena.insert(AnyPool::Plastic(pool_with(&[1], 1.0)));
        let b = arena.insert(AnyPool::Permanent(PermanentPool::new(NodeRef::new(0, 1), 0)));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.permanent_count(), 1);

        assert!(arena.remove(a).is_some());
        assert!(arena.remove(a).is_none());
        assert!(!arena.contains(a));
        let c = arena.insert(AnyPool::Plastic(pool_with(&[2], 1.0)));
        assert_eq!(c, a);
        assert_ne!(c, b);
        assert_eq!(arena.iter().count(), 2);
    }
}
