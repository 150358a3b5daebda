//! Unsupervised sparse distributed learning network.
//!
//! Nodes are grouped into competitive areas. Every timestep the winners of the
//! previous step are linked, through pools, onto nodes that activated without
//! being predicted. Pools that keep predicting correctly gain weight and their
//! links gain permanence until the pool becomes permanent; links that stop
//! being used decay and take their pool with them.
//!
//! ```no_run
//! use poolnet::prelude::*;
//!
//! let mut network = Network::new(NetworkConfig::single(784, "A2", 28, 2))?;
//! let output = network.timestep(&[sparse([(1, 0.5), (2, 1.0)])], Some("7"));
//! println!("{} winners", output.len());
//! # Ok::<(), poolnet::error::ConfigError>(())
//! ```

#[path = "core/types.rs"]
pub mod types;

#[path = "core/error.rs"]
pub mod error;

#[path = "core/config.rs"]
pub mod config;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/topology.rs"]
pub mod topology;

#[path = "core/temporal.rs"]
pub mod temporal;

#[path = "core/link.rs"]
pub mod link;

#[path = "core/pool.rs"]
pub mod pool;

#[path = "core/node.rs"]
pub mod node;

#[path = "core/layer.rs"]
pub mod layer;

#[path = "core/graph.rs"]
pub mod graph;

#[path = "core/stats.rs"]
pub mod stats;

#[path = "core/network.rs"]
pub mod network;

pub mod observer;

pub mod prelude {
    pub use crate::config::{
        ExecutionTier, Inhibition, LayerConfig, NetworkConfig, Params, RegionConfig, Tuning,
    };
    pub use crate::error::ConfigError;
    pub use crate::network::Network;
    pub use crate::observer::{render_grid, NetworkAdapter};
    pub use crate::prng::{Prng, RandomSource, Scripted};
    pub use crate::stats::NetworkStats;
    pub use crate::types::{sparse, NodeId, NodeRef, SparseVector};
}
