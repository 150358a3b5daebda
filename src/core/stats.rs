use core::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::config::Params;
use crate::types::{Permanence, Timestep};

/// Structural changes made by the graph during one timestep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct StepCounters {
    pub created_links: u64,
    pub deleted_links: u64,
    pub created_pools: u64,
    pub deleted_pools: u64,
    pub promoted_pools: u64,
}

/// Winner counts of one timestep, summed over every layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepActivity {
    pub output: usize,
    pub unpredicted: usize,
    pub thinking: usize,
}

/// Counters accumulated since the network was built.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub created_links: u64,
    pub deleted_links: u64,
    pub created_pools: u64,
    pub deleted_pools: u64,
    pub promoted_pools: u64,
    /// Timesteps in which no pool was created.
    pub not_created_pools: u64,
    /// Timesteps that left at least one unpredicted node without a new pool.
    pub unpredicted_not_created_pools: u64,
    output_sparsity: f64,
    unpredicted_sparsity: f64,
    thinking_sparsity: f64,
}

impl Totals {
    pub fn absorb(&mut self, step: &StepCounters, activity: &StepActivity, size: u64) {
        self.created_links += step.created_links;
        self.deleted_links += step.deleted_links;
        self.created_pools += step.created_pools;
        self.deleted_pools += step.deleted_pools;
        self.promoted_pools += step.promoted_pools;

        if step.created_pools == 0 {
            self.not_created_pools += 1;
        }
        if (step.created_pools as usize) < activity.unpredicted {
            self.unpredicted_not_created_pools += 1;
        }

        if size > 0 {
            self.output_sparsity += activity.output as f64 / size as f64;
        }
        if activity.output > 0 {
            let output = activity.output as f64;
            self.unpredicted_sparsity += activity.unpredicted as f64 / output;
            self.thinking_sparsity += activity.thinking as f64 / output;
        }
    }

    pub fn live_links(&self) -> u64 {
        self.created_links.saturating_sub(self.deleted_links)
    }

    /// Mean output, unpredicted and thinking ratios over `timesteps`.
    pub fn averages(&self, timesteps: Timestep) -> (f64, f64, f64) {
        if timesteps == 0 {
            return (0.0, 0.0, 0.0);
        }
        let t = timesteps as f64;
        (
            self.output_sparsity / t,
            self.unpredicted_sparsity / t,
            self.thinking_sparsity / t,
        )
    }
}

/// Shape of one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct LayerStats {
    pub id: String,
    pub nodes: usize,
    pub areas: usize,
}

/// Read-only dump of configuration and running counters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct NetworkStats {
    pub layers: Vec<LayerStats>,
    pub size: u64,
    pub params: Params,
    pub kwinner: usize,
    pub timestep: Timestep,

    pub live_links: u64,
    pub created_links: u64,
    pub deleted_links: u64,
    pub live_pools: u64,
    pub created_pools: u64,
    pub deleted_pools: u64,
    pub permanent_pools: u64,
    pub promoted_pools: u64,
    pub not_created_pools: u64,
    pub unpredicted_not_created_pools: u64,

    /// Mean share of all nodes active per timestep.
    pub output_sparsity: f64,
    /// Mean share of winners that had no predicting pool.
    pub unpredicted_sparsity: f64,
    /// Mean share of winners driven by pools alone.
    pub thinking_sparsity: f64,
    /// Live links over every possible link (`size^2 - size`).
    pub link_sparsity: f64,
    /// Live pools over every possible pool.
    pub pool_sparsity: f64,

    pub highest_permanence: Permanence,
    pub permanence_saturated: bool,

    /// Structural changes of the last timestep.
    pub last_step: StepCounters,
}

impl NetworkStats {
    pub fn possible_links(size: u64) -> u64 {
        size.saturating_mul(size).saturating_sub(size)
    }

    pub fn possible_pools(size: u64, minimum_links: usize) -> u64 {
        Self::possible_links(size) / (minimum_links.max(1) as u64)
    }

    pub fn links_per_pool(&self) -> f64 {
        ratio(self.live_links, self.live_pools)
    }

    pub fn links_per_node(&self) -> f64 {
        ratio(self.live_links, self.size)
    }

    pub fn pools_per_node(&self) -> f64 {
        ratio(self.live_pools, self.size)
    }
}

pub(crate) fn ratio(a: u64, b: u64) -> f64 {
    if b == 0 {
        0.0
    } else {
        a as f64 / b as f64
    }
}

fn percent(value: f64) -> f64 {
    (value * 10_000.0).round() / 100.0
}

impl fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.params;
        for layer in &self.layers {
            writeln!(
                f,
                "layer {:>8}  nodes {:>7}  areas {:>5}",
                layer.id, layer.nodes, layer.areas
            )?;
        }
        writeln!(f, "size                    {}", self.size)?;
        writeln!(f, "kwinner                 {}", self.kwinner)?;
        writeln!(
            f,
            "pool weight             {} [{}, {}] step {}",
            p.initial_pool_weight,
            p.minimum_pool_weight,
            p.maximum_pool_weight,
            p.pool_weight_change_rate
        )?;
        writeln!(
            f,
            "link permanence         {} .. {}",
            p.initial_link_permanence, p.maximum_link_permanence
        )?;
        writeln!(
            f,
            "links in pool           {} .. {}",
            p.minimum_links_in_pool, p.maximum_links_in_pool
        )?;
        writeln!(f, "growth / multiplier     {} / {}", p.exponential_growth, p.input_multiplier)?;
        writeln!(f, "temporal length         {}", p.temporal_length)?;
        writeln!(f, "timestep                {}", self.timestep)?;
        writeln!(f, "output/average          {}%", percent(self.output_sparsity))?;
        writeln!(f, "unpredicted/average     {}%", percent(self.unpredicted_sparsity))?;
        writeln!(f, "thinking/average        {}%", percent(self.thinking_sparsity))?;
        writeln!(
            f,
            "links created/deleted   +{} / -{} this step",
            self.last_step.created_links, self.last_step.deleted_links
        )?;
        writeln!(f, "links live/deleted      {} / {}", self.live_links, self.deleted_links)?;
        writeln!(f, "links sparsity          {}%", percent(self.link_sparsity))?;
        if self.permanence_saturated {
            writeln!(f, "highest permanence      maximum")?;
        } else {
            writeln!(f, "highest permanence      {}", self.highest_permanence.floor())?;
        }
        writeln!(
            f,
            "pools created/deleted   +{} / -{} this step",
            self.last_step.created_pools, self.last_step.deleted_pools
        )?;
        writeln!(f, "pools live/deleted      {} / {}", self.live_pools, self.deleted_pools)?;
        writeln!(
            f,
            "pools permanent         {} ({} promoted)",
            self.permanent_pools, self.promoted_pools
        )?;
        writeln!(f, "links/pool              {:.2}", self.links_per_pool())?;
        writeln!(f, "links/node              {:.2}", self.links_per_node())?;
        writeln!(f, "pools/node              {:.2}", self.pools_per_node())?;
        write!(f, "pools sparsity          {}%", percent(self.pool_sparsity))
    }
}
