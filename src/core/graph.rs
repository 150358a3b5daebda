use tracing::{debug, trace};

use crate::config::Params;
use crate::layer::Layer;
use crate::link::Link;
use crate::node::Node;
use crate::pool::{Activation, AnyPool, PermanentPool, Pool, PoolArena};
use crate::stats::StepCounters;
use crate::types::{
    Energy, LayerIndex, NodeRef, Permanence, PoolId, SparseVector, StableSet, Timestep,
};

/// Nodes, pools and links of every layer, plus the lifecycle rules that
/// connect them.
///
/// Layers only ever see pool ids. Anything that follows an id into the arena
/// (rewarding, punishing, probing, teardown, promotion) happens here.
#[derive(Debug, Clone)]
pub struct Graph {
    layers: Vec<Layer>,
    pools: PoolArena,
    // Pools with predicting links that have not fired yet this timestep.
    touched_pools: StableSet<PoolId>,
    params: Params,
    now: Timestep,
    step: StepCounters,
    highest_permanence: Permanence,
}

impl Graph {
    pub fn new(layers: Vec<Layer>, params: Params) -> Self {
        Self {
            layers,
            pools: PoolArena::new(),
            touched_pools: StableSet::default(),
            params,
            now: 0,
            step: StepCounters::default(),
            highest_permanence: 0.0,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Current timestep.
    pub fn now(&self) -> Timestep {
        self.now
    }

    pub(crate) fn advance(&mut self) -> Timestep {
        self.now += 1;
        self.now
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, index: LayerIndex) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn node(&self, node: NodeRef) -> Option<&Node> {
        self.layers.get(node.layer)?.node(node.id)
    }

    fn node_mut(&mut self, node: NodeRef) -> Option<&mut Node> {
        self.layers.get_mut(node.layer)?.node_mut(node.id)
    }

    pub fn pool(&self, id: PoolId) -> Option<&AnyPool> {
        self.pools.get(id)
    }

    pub fn pools(&self) -> &PoolArena {
        &self.pools
    }

    pub fn is_touched(&self, id: PoolId) -> bool {
        self.touched_pools.contains(&id)
    }

    pub fn touched_pools(&self) -> usize {
        self.touched_pools.len()
    }

    /// Highest permanence any link has grown to so far.
    pub fn highest_permanence(&self) -> Permanence {
        self.highest_permanence
    }

    pub fn step_counters(&self) -> &StepCounters {
        &self.step
    }

    pub(crate) fn take_step_counters(&mut self) -> StepCounters {
        std::mem::take(&mut self.step)
    }

    /// Run one layer on `input` and dispatch its rewards and punishments.
    pub fn run_layer(&mut self, index: LayerIndex, input: &SparseVector) {
        let Some(layer) = self.layers.get_mut(index) else {
            return;
        };
        let verdict = layer.run(input);
        for pool in verdict.rewarded {
            self.reward_pool(pool);
        }
        for pool in verdict.punished {
            self.punish_pool(pool);
        }
    }

    /// Move the layer's winners into its output set and send their
    /// activation probes. Returns the winners in area order.
    pub(crate) fn activate_layer(&mut self, index: LayerIndex) -> Vec<NodeRef> {
        let Some(layer) = self.layers.get_mut(index) else {
            return Vec::new();
        };
        let winners: Vec<NodeRef> = layer
            .take_winners()
            .into_iter()
            .map(|id| NodeRef::new(index, id))
            .collect();
        for &node in &winners {
            self.activate_node(node);
        }
        winners
    }

    /// Probe every pool `node` feeds as a source.
    pub fn activate_node(&mut self, node: NodeRef) {
        // Probes may tear pools down and edit the output map.
        let targets: Vec<PoolId> = match self.node(node) {
            Some(n) => n.outgoing().map(|(_, pool)| pool).collect(),
            None => return,
        };
        for pool in targets {
            self.activate_pool(pool, node);
        }
    }

    pub fn activate_pool(&mut self, id: PoolId, source: NodeRef) -> Activation {
        let min_links = self.params.minimum_links_in_pool;
        let Some(pool) = self.pools.get_mut(id) else {
            return Activation::Unlinked;
        };
        let activation = pool.activate(source, self.now, min_links);
        let (output, weight) = (pool.output(), pool.weight());

        match activation {
            Activation::LinkDied => self.decay_link(id, source),
            Activation::Pending => {
                self.touched_pools.insert(id);
            }
            Activation::Fired => {
                self.touched_pools.remove(&id);
                if let Some(layer) = self.layers.get_mut(output.layer) {
                    layer.touch(output.id, id, Energy::from(weight));
                }
            }
            Activation::AlreadyActive | Activation::Unlinked => {}
        }
        activation
    }

    pub fn reward_pool(&mut self, id: PoolId) {
        debug_assert!(self.pools.contains(id), "rewarding a pool that no longer exists");
        let Some(pool) = self.pools.get_mut(id) else {
            return;
        };
        let outcome = pool.reward(&self.params);
        if let Some(p) = outcome.highest_permanence {
            self.highest_permanence = self.highest_permanence.max(p);
        }
        if outcome.promote {
            self.replace_pool(id);
        }
    }

    pub fn punish_pool(&mut self, id: PoolId) {
        if let Some(pool) = self.pools.get_mut(id) {
            pool.punish(&self.params);
        }
    }

    /// Drop the dead link from `source` into pool `id`. A pool left with fewer
    /// than the minimum links is torn down and unreachable afterwards.
    pub fn decay_link(&mut self, id: PoolId, source: NodeRef) {
        let Some(AnyPool::Plastic(pool)) = self.pools.get_mut(id) else {
            return;
        };
        let remaining = pool.remove_link(source);
        let output = pool.output();
        self.step.deleted_links += 1;
        if let Some(node) = self.node_mut(source) {
            node.unlink(output, id);
        }
        if remaining >= self.params.minimum_links_in_pool {
            return;
        }

        let Some(AnyPool::Plastic(pool)) = self.pools.remove(id) else {
            return;
        };
        self.step.deleted_pools += 1;
        self.step.deleted_links += pool.len() as u64;
        for source in pool.sources() {
            if let Some(node) = self.node_mut(source) {
                node.unlink(output, id);
            }
        }
        if let Some(node) = self.node_mut(output) {
            node.forget_input(id);
        }
        self.touched_pools.remove(&id);
        trace!(pool = id.index(), %output, "pool torn down");
    }

    /// Promote a saturated pool. Every source is repointed at the new
    /// permanent pool before the old one leaves the arena.
    pub fn replace_pool(&mut self, id: PoolId) -> Option<PoolId> {
        let Some(AnyPool::Plastic(pool)) = self.pools.get(id) else {
            return None;
        };
        let (output, weight) = (pool.output(), pool.weight());
        let sources: Vec<NodeRef> = pool.sources().collect();
        let permanent = PermanentPool::from(pool);

        let promoted = self.pools.insert(AnyPool::Permanent(permanent));
        for source in sources {
            if let Some(node) = self.node_mut(source) {
                node.link(output, promoted);
            }
        }
        self.pools.remove(id);
        if let Some(node) = self.node_mut(output) {
            node.forget_input(id);
        }
        self.touched_pools.remove(&id);
        self.step.promoted_pools += 1;
        debug!(%output, weight, "pool promoted");
        Some(promoted)
    }

    /// Sources from `sample` allowed to link into `output`: not the node
    /// itself and not already linked to it.
    pub fn candidates(&self, output: NodeRef, sample: &[NodeRef]) -> Vec<NodeRef> {
        sample
            .iter()
            .copied()
            .filter(|&source| source != output)
            .filter(|&source| {
                self.node(source)
                    .is_some_and(|node| node.output_to(output).is_none())
            })
            .collect()
    }

    /// Create one pool feeding `output` with a link from every valid source
    /// in `sample`. Nothing is created when fewer than the minimum links
    /// remain.
    pub fn create_pool(&mut self, output: NodeRef, sample: &[NodeRef]) -> Option<PoolId> {
        if self.node(output).is_none() {
            return None;
        }
        let sources = self.candidates(output, sample);
        if sources.len() < self.params.minimum_links_in_pool {
            return None;
        }

        let mut pool = Pool::new(output, self.params.initial_pool_weight);
        for &source in &sources {
            pool.insert_link(source, Link::new(self.params.initial_link_permanence, self.now));
        }
        let id = self.pools.insert(AnyPool::Plastic(pool));
        for &source in &sources {
            if let Some(node) = self.node_mut(source) {
                let previous = node.link(output, id);
                debug_assert!(previous.is_none());
            }
        }

        self.step.created_pools += 1;
        self.step.created_links += sources.len() as u64;
        Some(id)
    }

    /// Drop the predicting state of every pool that never fired.
    pub fn clear_touched_pools(&mut self) {
        for id in self.touched_pools.drain() {
            if let Some(pool) = self.pools.get_mut(id) {
                pool.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExecutionTier, Inhibition, Tuning};
    use crate::types::sparse;

    fn graph(tuning: Tuning) -> Graph {
        let layer = Layer::new("L", 0, 4, Inhibition { row: 2, square: 2 }, ExecutionTier::Scalar)
            .unwrap();
        Graph::new(vec![layer], Params::resolve(&tuning, 4).unwrap())
    }

    fn tuning(min_links: usize) -> Tuning {
        Tuning {
            minimum_links_in_pool: Some(min_links),
            initial_link_permanence: Some(6.0),
            maximum_link_permanence: Some(10.0),
            initial_pool_weight: Some(5),
            ..Default::default()
        }
    }

    fn n(id: u32) -> NodeRef {
        NodeRef::new(0, id)
    }

    /// No two pools may share an ordered (source, output) pair, and every
    /// output entry must point at a pool that holds the matching link.
    fn assert_links_consistent(g: &Graph) {
        for layer in g.layers() {
            for node in layer.nodes() {
                for (target, id) in node.outgoing() {
                    let pool = g.pool(id).expect("dangling output entry");
                    assert_eq!(pool.output(), target);
                    if let Some(plastic) = pool.as_plastic() {
                        assert!(plastic.link(node.node_ref()).is_some());
                    }
                }
            }
        }
    }

    #[test]
    fn create_pool_links_every_candidate() {
        let mut g = graph(tuning(2));
        let id = g.create_pool(n(4), &[n(1), n(2), n(3)]).unwrap();

        for source in [n(1), n(2), n(3)] {
            assert_eq!(g.node(source).unwrap().output_to(n(4)), Some(id));
        }
        let pool = g.pool(id).unwrap().as_plastic().unwrap();
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.weight(), 5);
        assert_eq!(g.step_counters().created_pools, 1);
        assert_eq!(g.step_counters().created_links, 3);
        assert_links_consistent(&g);
    }

    #[test]
    fn create_pool_skips_self_and_existing_links() {
        let mut g = graph(tuning(2));
        g.create_pool(n(4), &[n(1), n(2)]).unwrap();

        assert_eq!(g.candidates(n(4), &[n(4), n(1), n(2), n(3)]), vec![n(3)]);
        assert!(g.create_pool(n(4), &[n(4), n(1), n(2), n(3)]).is_none());
        assert_eq!(g.pools().len(), 1);
        assert_links_consistent(&g);
    }

    #[test]
    fn partial_prediction_stays_touched_until_cleared() {
        let mut g = graph(tuning(3));
        let id = g.create_pool(n(4), &[n(1), n(2), n(3)]).unwrap();

        g.activate_node(n(1));
        g.activate_node(n(2));
        assert!(g.is_touched(id));
        let pool = g.pool(id).unwrap();
        assert!(!pool.is_activated());
        assert_eq!(pool.as_plastic().unwrap().predicting(), 2);
        assert_eq!(g.node(n(4)).unwrap().energy(), 0.0);

        g.clear_touched_pools();
        assert_eq!(g.touched_pools(), 0);
        let pool = g.pool(id).unwrap();
        assert_eq!(pool.as_plastic().unwrap().predicting(), 0);
        assert_eq!(pool.weight(), 5);
    }

    #[test]
    fn firing_pool_touches_its_output_once() {
        let mut g = graph(tuning(2));
        let id = g.create_pool(n(4), &[n(1), n(2), n(3)]).unwrap();

        assert_eq!(g.activate_pool(id, n(1)), Activation::Pending);
        assert_eq!(g.activate_pool(id, n(2)), Activation::Fired);
        assert_eq!(g.activate_pool(id, n(3)), Activation::AlreadyActive);
        assert!(!g.is_touched(id));

        let output = g.node(n(4)).unwrap();
        assert_eq!(output.energy(), 5.0);
        assert_eq!(output.predicting_pools(), &[id]);
        assert_eq!(g.layer(0).unwrap().touched_len(), 1);
    }

    #[test]
    fn predicted_winner_rewards_its_pool() {
        let mut g = graph(tuning(2));
        let id = g.create_pool(n(4), &[n(1), n(2)]).unwrap();
        g.activate_node(n(1));
        g.activate_node(n(2));

        g.run_layer(0, &SparseVector::default());
        assert_eq!(g.layer(0).unwrap().winners().collect::<Vec<_>>(), vec![4]);
        let pool = g.pool(id).unwrap().as_plastic().unwrap();
        assert_eq!(pool.weight(), 6);
        assert_eq!(pool.link(n(1)).unwrap().permanence(), 12.0);
        assert_eq!(g.highest_permanence(), 12.0);
    }

    #[test]
    fn losing_prediction_punishes_its_pool() {
        let mut g = graph(tuning(2));
        let id = g.create_pool(n(4), &[n(1), n(2)]).unwrap();
        g.activate_node(n(1));
        g.activate_node(n(2));

        // threshold = (100 + 5) / 2, node 4 only holds 5
        g.run_layer(0, &sparse([(1, 100.0)]));
        assert_eq!(g.layer(0).unwrap().unpredicted(), &[1]);
        assert_eq!(g.pool(id).unwrap().weight(), 4);
        assert!(!g.node(n(4)).unwrap().has_predictions());
    }

    #[test]
    fn saturated_pool_is_promoted() {
        let mut g = graph(tuning(2));
        let id = g.create_pool(n(4), &[n(1), n(2)]).unwrap();

        // 6 -> 12, then past the maximum of 10 -> permanent
        for _ in 0..2 {
            g.activate_node(n(1));
            g.activate_node(n(2));
            g.run_layer(0, &SparseVector::default());
        }

        assert!(g.pool(id).is_none());
        let promoted = g.node(n(1)).unwrap().output_to(n(4)).unwrap();
        assert_ne!(promoted, id);
        assert_eq!(g.node(n(2)).unwrap().output_to(n(4)), Some(promoted));
        let pool = g.pool(promoted).unwrap();
        assert!(pool.is_permanent());
        assert_eq!(pool.weight(), 7);
        assert_eq!(g.pools().len(), 1);
        assert_eq!(g.pools().permanent_count(), 1);
        assert_eq!(g.step_counters().promoted_pools, 1);
        assert!(!g.node(n(4)).unwrap().predicting_pools().contains(&id));
        assert_links_consistent(&g);

        // The permanent pool keeps firing from its sources.
        g.activate_node(n(1));
        assert!(g.is_touched(promoted));
        g.activate_node(n(2));
        assert!(g.pool(promoted).unwrap().is_activated());
    }

    #[test]
    fn dead_link_tears_down_an_undersized_pool() {
        let mut g = graph(Tuning {
            initial_link_permanence: Some(1.0),
            ..tuning(2)
        });
        let id = g.create_pool(n(4), &[n(1), n(2)]).unwrap();
        g.advance();
        g.advance();

        assert_eq!(g.activate_pool(id, n(1)), Activation::LinkDied);
        assert!(g.pool(id).is_none());
        assert!(g.pools().is_empty());
        assert_eq!(g.node(n(1)).unwrap().output_to(n(4)), None);
        assert_eq!(g.node(n(2)).unwrap().output_to(n(4)), None);
        assert_eq!(g.step_counters().deleted_links, 2);
        assert_eq!(g.step_counters().deleted_pools, 1);
        assert!(!g.is_touched(id));
        assert_links_consistent(&g);
    }

    #[test]
    fn dead_link_leaves_a_viable_pool_in_place() {
        let mut g = graph(Tuning {
            initial_link_permanence: Some(1.0),
            ..tuning(2)
        });
        let id = g.create_pool(n(4), &[n(1), n(2), n(3)]).unwrap();
        g.advance();

        g.activate_node(n(1));
        let pool = g.pool(id).unwrap().as_plastic().unwrap();
        assert_eq!(pool.len(), 2);
        assert!(pool.link(n(1)).is_none());
        assert_eq!(g.node(n(1)).unwrap().outgoing_len(), 0);
        assert_eq!(g.node(n(2)).unwrap().output_to(n(4)), Some(id));
        assert_eq!(g.step_counters().deleted_links, 1);
        assert_eq!(g.step_counters().deleted_pools, 0);
    }

    #[test]
    fn teardown_removes_fired_pool_from_output_input() {
        let mut g = graph(Tuning {
            initial_link_permanence: Some(2.0),
            ..tuning(2)
        });
        let id = g.create_pool(n(4), &[n(1), n(2)]).unwrap();
        g.advance();
        g.activate_node(n(1));
        g.activate_node(n(2));
        assert!(g.node(n(4)).unwrap().predicting_pools().contains(&id));

        g.advance();
        g.advance();
        g.activate_node(n(1));
        assert!(g.pool(id).is_none());
        assert!(g.node(n(4)).unwrap().predicting_pools().is_empty());

        // Node 4 keeps its energy but settles as an unpredicted driver.
        g.run_layer(0, &SparseVector::default());
        assert_eq!(g.layer(0).unwrap().unpredicted(), &[4]);
        assert_links_consistent(&g);
    }

    #[test]
    fn take_step_counters_resets() {
        let mut g = graph(tuning(2));
        g.create_pool(n(4), &[n(1), n(2)]);
        let step = g.take_step_counters();
        assert_eq!(step.created_pools, 1);
        assert_eq!(*g.step_counters(), StepCounters::default());
    }
}
