#[cfg(feature = "parallel")]
use rayon::prelude::*;

use tracing::trace;

use crate::config::{ExecutionTier, Inhibition};
use crate::error::ConfigError;
use crate::node::Node;
use crate::topology::Topology;
use crate::types::{Energy, LayerIndex, NodeId, PoolId, SparseVector};

/// Winner bookkeeping of one area for the current timestep.
#[derive(Debug, Clone, Default)]
struct AreaSlot {
    // Best node that has predicting pools.
    best: Option<(NodeId, Energy)>,
    // Unpredicted drivers until `resolve`, the final winners afterwards.
    winners: Vec<NodeId>,
}

impl AreaSlot {
    #[inline]
    fn offer(&mut self, id: NodeId, energy: Energy, predicted: bool) {
        if predicted {
            match self.best {
                Some((_, best)) if energy <= best => {}
                _ => self.best = Some((id, energy)),
            }
        } else {
            self.winners.push(id);
        }
    }

    /// A predicted winner takes the area alone; otherwise every driver wins.
    fn resolve(&mut self) {
        if let Some((id, _)) = self.best.take() {
            self.winners.clear();
            self.winners.push(id);
        }
    }

    fn clear(&mut self) {
        self.best = None;
        self.winners.clear();
    }
}

/// Pools a layer run wants rewarded and punished. The graph dispatches them,
/// since rewarding may rewire nodes in other layers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verdict {
    pub rewarded: Vec<PoolId>,
    pub punished: Vec<PoolId>,
}

/// A set of nodes and their competitive areas.
#[derive(Debug, Clone)]
pub struct Layer {
    id: String,
    index: LayerIndex,
    nodes: Vec<Node>,
    topology: Topology,
    tier: ExecutionTier,

    slots: Vec<AreaSlot>,
    // Nodes holding energy this timestep, in first-touch order.
    touched: Vec<NodeId>,
    touched_mask: Vec<bool>,
    // Running energy sum; becomes the threshold once divided.
    energy_sum: Energy,
    last_threshold: Option<Energy>,

    output: SparseVector,
    unpredicted: Vec<NodeId>,
    thinking: Vec<NodeId>,
}

impl Layer {
    pub fn new(
        id: impl Into<String>,
        index: LayerIndex,
        size: u32,
        inhibition: Inhibition,
        tier: ExecutionTier,
    ) -> Result<Self, ConfigError> {
        let topology = Topology::build(size, inhibition.row, inhibition.square)?;
        let nodes = (1..=size).map(|id| Node::new(id, index)).collect();
        let slots = vec![AreaSlot::default(); topology.len()];

        Ok(Self {
            id: id.into(),
            index,
            nodes,
            topology,
            tier,
            slots,
            touched: Vec::new(),
            touched_mask: vec![false; size as usize],
            energy_sum: 0.0,
            last_threshold: None,
            output: SparseVector::default(),
            unpredicted: Vec::new(),
            thinking: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn index(&self) -> LayerIndex {
        self.index
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn area_count(&self) -> usize {
        self.topology.len()
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get((id as usize).checked_sub(1)?)
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut((id as usize).checked_sub(1)?)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Output set of the last activation (node id -> 1.0).
    pub fn output(&self) -> &SparseVector {
        &self.output
    }

    /// Winners of the last run that had no predicting pools.
    pub fn unpredicted(&self) -> &[NodeId] {
        &self.unpredicted
    }

    /// Winners of the last run that were driven by pools only.
    pub fn thinking(&self) -> &[NodeId] {
        &self.thinking
    }

    pub fn touched_len(&self) -> usize {
        self.touched.len()
    }

    /// Threshold used by the last run, `None` if nothing was touched.
    pub fn last_threshold(&self) -> Option<Energy> {
        self.last_threshold
    }

    /// Winners selected by the last run and not yet activated.
    pub fn winners(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().flat_map(|s| s.winners.iter().copied())
    }

    /// A pool fired into node `id`.
    pub(crate) fn touch(&mut self, id: NodeId, pool: PoolId, weight: Energy) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        node.touch(pool, weight);
        self.energy_sum += weight;
        self.mark_touched(id);
    }

    #[inline]
    fn mark_touched(&mut self, id: NodeId) {
        let i = (id - 1) as usize;
        if !self.touched_mask[i] {
            self.touched_mask[i] = true;
            self.touched.push(id);
        }
    }

    /// Inject, threshold, select, classify and settle every touched node.
    pub fn run(&mut self, input: &SparseVector) -> Verdict {
        for slot in &mut self.slots {
            slot.clear();
        }

        // Inject
        for (&id, &energy) in input {
            let Some(node) = self.node_mut(id) else {
                trace!(layer = %self.id, id, "input id outside layer, ignored");
                continue;
            };
            node.energy += energy;
            self.energy_sum += energy;
            self.mark_touched(id);
        }

        self.unpredicted.clear();
        self.thinking.clear();
        let mut verdict = Verdict::default();

        if self.touched.is_empty() {
            self.energy_sum = 0.0;
            self.last_threshold = None;
            return verdict;
        }

        // Threshold
        let threshold = self.energy_sum / self.touched.len() as Energy;
        self.energy_sum = 0.0;
        self.last_threshold = Some(threshold);

        // Select
        match self.tier.effective() {
            #[cfg(feature = "parallel")]
            ExecutionTier::Parallel => self.select_parallel(threshold),
            _ => self.select_scalar(threshold),
        }
        for slot in &mut self.slots {
            slot.resolve();
        }

        // Classify and reward winners
        for slot in &self.slots {
            for &id in &slot.winners {
                let i = (id - 1) as usize;
                let node = &mut self.nodes[i];
                if node.has_predictions() {
                    if !input.contains_key(&id) {
                        self.thinking.push(id);
                    }
                } else {
                    self.unpredicted.push(id);
                }
                verdict.rewarded.extend(node.settle());
                self.touched_mask[i] = false;
            }
        }

        // Punish whatever gathered energy without winning
        for &id in &self.touched {
            let i = (id - 1) as usize;
            if !self.touched_mask[i] {
                continue;
            }
            self.touched_mask[i] = false;
            verdict.punished.extend(self.nodes[i].settle());
        }
        self.touched.clear();

        verdict
    }

    fn select_scalar(&mut self, threshold: Energy) {
        for &id in &self.touched {
            let node = &self.nodes[(id - 1) as usize];
            if node.energy < threshold {
                continue;
            }
            if let Some(area) = self.topology.area_of(id) {
                self.slots[area].offer(id, node.energy, node.has_predictions());
            }
        }
    }

    #[cfg(feature = "parallel")]
    fn select_parallel(&mut self, threshold: Energy) {
        let mut buckets: Vec<Vec<NodeId>> = vec![Vec::new(); self.slots.len()];
        for &id in &self.touched {
            if self.nodes[(id - 1) as usize].energy < threshold {
                continue;
            }
            if let Some(area) = self.topology.area_of(id) {
                buckets[area].push(id);
            }
        }

        let nodes = &self.nodes;
        self.slots
            .par_iter_mut()
            .zip(buckets.par_iter())
            .for_each(|(slot, ids)| {
                for &id in ids {
                    let node = &nodes[(id - 1) as usize];
                    slot.offer(id, node.energy, node.has_predictions());
                }
            });
    }

    /// Move this run's winners into the output set and return them in area
    /// order. Clears the area slots for the next timestep.
    pub(crate) fn take_winners(&mut self) -> Vec<NodeId> {
        self.output.clear();
        let mut winners = Vec::new();
        for slot in &mut self.slots {
            for &id in &slot.winners {
                self.output.insert(id, 1.0);
                winners.push(id);
            }
            slot.clear();
        }
        winners
    }
}
