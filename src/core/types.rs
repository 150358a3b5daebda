use std::collections::hash_map::DefaultHasher;
use std::hash::BuildHasherDefault;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Node identity inside a layer. Ids start at 1.
pub type NodeId = u32;

/// Position of a layer in the network's construction order.
pub type LayerIndex = usize;

/// Index of an area inside a layer's topology.
pub type AreaId = usize;

/// Type alias for node energy (drive plus fired pool weights).
pub type Energy = f64;

/// Type alias for link permanence. Saturated links hold `f64::INFINITY`.
pub type Permanence = f64;

/// Type alias for pool weights (bounded integer).
pub type Weight = i32;

/// Discrete time counter.
pub type Timestep = u64;

/// Fixed-key hasher: iteration order only depends on the insertion history,
/// so a seeded run is reproducible end to end.
pub type StableHasher = BuildHasherDefault<DefaultHasher>;

pub type StableMap<K, V> = hashbrown::HashMap<K, V, StableHasher>;
pub type StableSet<T> = hashbrown::HashSet<T, StableHasher>;

/// Sparse input/output vector: node id -> non-negative scalar.
pub type SparseVector = StableMap<NodeId, f64>;

/// Network-wide node address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeRef {
    pub layer: LayerIndex,
    pub id: NodeId,
}

impl NodeRef {
    #[inline]
    pub const fn new(layer: LayerIndex, id: NodeId) -> Self {
        Self { layer, id }
    }
}

impl core::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.layer, self.id)
    }
}

/// Arena slot of a pool (plastic or permanent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolId(pub(crate) u32);

impl PoolId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Build a sparse vector from `(id, value)` pairs, keeping the last value for
/// repeated ids.
pub fn sparse<I>(pairs: I) -> SparseVector
where
    I: IntoIterator<Item = (NodeId, f64)>,
{
    pairs.into_iter().collect()
}
