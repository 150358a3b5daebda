use crate::types::{Energy, LayerIndex, NodeId, NodeRef, PoolId, StableMap};

/// Smallest addressable unit of the network.
///
/// A node never owns pools. `input` lists the pools that fired into it during
/// the previous timestep; `output` maps every target node this node links to
/// onto the pool holding that link, so there is at most one link per ordered
/// node pair.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    layer: LayerIndex,
    pub(crate) energy: Energy,
    pub(crate) input: Vec<PoolId>,
    pub(crate) output: StableMap<NodeRef, PoolId>,
}

impl Node {
    pub fn new(id: NodeId, layer: LayerIndex) -> Self {
        Self {
            id,
            layer,
            energy: 0.0,
            input: Vec::new(),
            output: StableMap::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.layer, self.id)
    }

    #[inline]
    pub fn energy(&self) -> Energy {
        self.energy
    }

    /// Some pool fired into this node since it was last settled.
    #[inline]
    pub fn has_predictions(&self) -> bool {
        !self.input.is_empty()
    }

    pub fn predicting_pools(&self) -> &[PoolId] {
        &self.input
    }

    /// Pool through which this node links to `target`, if any.
    pub fn output_to(&self, target: NodeRef) -> Option<PoolId> {
        self.output.get(&target).copied()
    }

    pub fn outgoing(&self) -> impl Iterator<Item = (NodeRef, PoolId)> + '_ {
        self.output.iter().map(|(&target, &pool)| (target, pool))
    }

    pub fn outgoing_len(&self) -> usize {
        self.output.len()
    }

    /// Record a pool firing into this node.
    pub(crate) fn touch(&mut self, pool: PoolId, weight: Energy) {
        self.input.push(pool);
        self.energy += weight;
    }

    /// Reset energy and hand back the pools that predicted this node so the
    /// caller can reward or punish them.
    pub(crate) fn settle(&mut self) -> Vec<PoolId> {
        self.energy = 0.0;
        std::mem::take(&mut self.input)
    }

    pub(crate) fn forget_input(&mut self, pool: PoolId) {
        self.input.retain(|&p| p != pool);
    }

    /// Point the output entry for `target` at `pool`, returning the previous one.
    pub(crate) fn link(&mut self, target: NodeRef, pool: PoolId) -> Option<PoolId> {
        self.output.insert(target, pool)
    }

    /// Remove the output entry for `target` if it still points at `pool`.
    pub(crate) fn unlink(&mut self, target: NodeRef, pool: PoolId) -> bool {
        if self.output.get(&target) == Some(&pool) {
            self.output.remove(&target);
            true
        } else {
            false
        }
    }
}
