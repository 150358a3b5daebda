use tracing::{debug, info, trace};

use crate::config::{ExecutionTier, LayerConfig, NetworkConfig, Params};
use crate::error::ConfigError;
use crate::graph::Graph;
use crate::layer::Layer;
use crate::prng::{Prng, RandomSource};
use crate::stats::{ratio, LayerStats, NetworkStats, StepActivity, StepCounters, Totals};
use crate::temporal::TemporalState;
use crate::types::{LayerIndex, NodeRef, SparseVector, Timestep};

/// Seed used when the config does not name one.
pub const DEFAULT_SEED: u64 = 1;

/// Timesteps are reported every step up to this count, then once per multiple
/// or whenever some winner was driven by pools alone.
pub const REPORT_INTERVAL: Timestep = 10_000;

/// Layers fed by one shared temporal average.
#[derive(Debug, Clone)]
struct Branch {
    temporal: TemporalState,
    layers: Vec<LayerNode>,
}

#[derive(Debug, Clone)]
struct LayerNode {
    index: LayerIndex,
    children: Option<Branch>,
}

/// Timestep driver.
///
/// Owns the graph, one layer tree per region, the random source used for pool
/// formation and the output record of the previous timestep.
#[derive(Debug, Clone)]
pub struct Network<R: RandomSource = Prng> {
    graph: Graph,
    regions: Vec<Branch>,
    random: R,
    size: u64,
    kwinner: usize,
    // Winners of the last timestep, in layer then area order.
    output: Vec<NodeRef>,
    totals: Totals,
    last_step: StepCounters,
    last_activity: StepActivity,
}

impl Network<Prng> {
    /// Build a network sampling from a [`Prng`] seeded with `config.seed`.
    pub fn new(config: NetworkConfig) -> Result<Self, ConfigError> {
        let seed = config.seed.unwrap_or(DEFAULT_SEED);
        Self::with_random(config, Prng::new(seed))
    }
}

impl<R: RandomSource> Network<R> {
    pub fn with_random(config: NetworkConfig, random: R) -> Result<Self, ConfigError> {
        let size = config.validate()?;
        let params = Params::resolve(&config.tuning, size)?;

        let mut layers = Vec::new();
        let mut regions = Vec::with_capacity(config.regions.len());
        for region in &config.regions {
            regions.push(Branch {
                temporal: TemporalState::new(),
                layers: build_layers(
                    &region.layers,
                    region.size,
                    config.execution_tier,
                    &mut layers,
                )?,
            });
        }
        let kwinner: usize = layers.iter().map(Layer::area_count).sum();

        info!(
            layers = layers.len(),
            size,
            kwinner,
            min_links = params.minimum_links_in_pool,
            max_links = params.maximum_links_in_pool,
            "network built"
        );

        Ok(Self {
            graph: Graph::new(layers, params),
            regions,
            random,
            size,
            kwinner,
            output: Vec::new(),
            totals: Totals::default(),
            last_step: StepCounters::default(),
            last_activity: StepActivity::default(),
        })
    }

    /// Run one timestep. `inputs` holds one sparse vector per region; missing
    /// regions get an empty vector. Returns this timestep's winners.
    pub fn timestep(&mut self, inputs: &[SparseVector], label: Option<&str>) -> &[NodeRef] {
        let now = self.graph.advance();
        let params = *self.graph.params();

        // 1. feedforward through every region's layer tree
        let empty = SparseVector::default();
        for (i, region) in self.regions.iter_mut().enumerate() {
            let input = inputs.get(i).unwrap_or(&empty);
            run_branch(&mut self.graph, region, input, &params);
        }

        // 2. partial predictions do not carry over
        self.graph.clear_touched_pools();

        // 3. link the previous output onto unpredicted winners
        let unpredicted = self.unpredicted();
        if !unpredicted.is_empty() {
            self.create_pools(&unpredicted, &params);
        }

        // 4. and 5.
        self.output.clear();
        for index in 0..self.graph.layers().len() {
            let winners = self.graph.activate_layer(index);
            self.output.extend(winners);
        }

        // 6.
        let activity = StepActivity {
            output: self.output.len(),
            unpredicted: unpredicted.len(),
            thinking: self.graph.layers().iter().map(|l| l.thinking().len()).sum(),
        };
        let step = self.graph.take_step_counters();
        self.totals.absorb(&step, &activity, self.size);
        self.last_step = step;
        self.last_activity = activity;

        debug!(
            timestep = now,
            label = label.unwrap_or(""),
            output = activity.output,
            unpredicted = activity.unpredicted,
            thinking = activity.thinking,
            created_pools = step.created_pools,
            deleted_pools = step.deleted_pools,
            "timestep"
        );
        if should_report(now, activity.thinking) {
            self.report(label);
        }

        &self.output
    }

    fn unpredicted(&self) -> Vec<NodeRef> {
        self.graph
            .layers()
            .iter()
            .flat_map(|layer| {
                let index = layer.index();
                layer.unpredicted().iter().map(move |&id| NodeRef::new(index, id))
            })
            .collect()
    }

    fn create_pools(&mut self, unpredicted: &[NodeRef], params: &Params) {
        if self.output.is_empty() {
            trace!("no previous output to link from");
            return;
        }

        // One sample per timestep, shared by every unpredicted node.
        let mut sample: Vec<NodeRef> = Vec::with_capacity(params.maximum_links_in_pool);
        for _ in 0..params.maximum_links_in_pool {
            let index = self.random.next_index(self.output.len());
            if let Some(&node) = self.output.get(index) {
                if !sample.contains(&node) {
                    sample.push(node);
                }
            }
        }
        if sample.len() < params.minimum_links_in_pool {
            trace!(sampled = sample.len(), "sample too small for a pool");
            return;
        }

        for &output in unpredicted {
            if self.graph.create_pool(output, &sample).is_none() {
                trace!(%output, "not enough candidates to create a pool");
            }
        }
    }

    fn report(&self, label: Option<&str>) {
        let stats = self.stats();
        info!(
            timestep = stats.timestep,
            label = label.unwrap_or(""),
            output_avg = stats.output_sparsity,
            unpredicted_avg = stats.unpredicted_sparsity,
            thinking_avg = stats.thinking_sparsity,
            not_created = stats.not_created_pools,
            unpredicted_not_created = stats.unpredicted_not_created_pools,
            created_links = stats.last_step.created_links,
            deleted_links = stats.last_step.deleted_links,
            live_links = stats.live_links,
            created_pools = stats.last_step.created_pools,
            deleted_pools = stats.last_step.deleted_pools,
            live_pools = stats.live_pools,
            permanent_pools = stats.permanent_pools,
            promoted_pools = stats.promoted_pools,
            links_per_pool = stats.links_per_pool(),
            links_per_node = stats.links_per_node(),
            pools_per_node = stats.pools_per_node(),
            highest_permanence = stats.highest_permanence,
            "network"
        );
        for layer in self.graph.layers() {
            debug!(
                layer = layer.id(),
                output = layer.output().len(),
                unpredicted = layer.unpredicted().len(),
                thinking = layer.thinking().len(),
                "layer"
            );
        }
    }

    pub fn stats(&self) -> NetworkStats {
        let params = *self.graph.params();
        let now = self.graph.now();
        let (output_sparsity, unpredicted_sparsity, thinking_sparsity) = self.totals.averages(now);
        let live_links = self.totals.live_links();
        let live_pools = self.graph.pools().len() as u64;
        let highest_permanence = self.graph.highest_permanence();

        NetworkStats {
            layers: self
                .graph
                .layers()
                .iter()
                .map(|l| LayerStats {
                    id: l.id().to_string(),
                    nodes: l.len(),
                    areas: l.area_count(),
                })
                .collect(),
            size: self.size,
            params,
            kwinner: self.kwinner,
            timestep: now,
            live_links,
            created_links: self.totals.created_links,
            deleted_links: self.totals.deleted_links,
            live_pools,
            created_pools: self.totals.created_pools,
            deleted_pools: self.totals.deleted_pools,
            permanent_pools: self.graph.pools().permanent_count() as u64,
            promoted_pools: self.totals.promoted_pools,
            not_created_pools: self.totals.not_created_pools,
            unpredicted_not_created_pools: self.totals.unpredicted_not_created_pools,
            output_sparsity,
            unpredicted_sparsity,
            thinking_sparsity,
            link_sparsity: ratio(live_links, NetworkStats::possible_links(self.size)),
            pool_sparsity: ratio(
                live_pools,
                NetworkStats::possible_pools(self.size, params.minimum_links_in_pool),
            ),
            highest_permanence,
            permanence_saturated: highest_permanence >= params.maximum_link_permanence,
            last_step: self.last_step,
        }
    }

    /// Total number of areas; the number of nodes a label representation keeps.
    pub fn kwinner(&self) -> usize {
        self.kwinner
    }

    /// Total node count over every layer.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn timestep_count(&self) -> Timestep {
        self.graph.now()
    }

    pub fn params(&self) -> &Params {
        self.graph.params()
    }

    pub fn layer_ids(&self) -> impl Iterator<Item = &str> {
        self.graph.layers().iter().map(Layer::id)
    }

    pub fn layer_index(&self, id: &str) -> Option<LayerIndex> {
        self.graph.layers().iter().position(|l| l.id() == id)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Winners of the last timestep.
    pub fn output(&self) -> &[NodeRef] {
        &self.output
    }

    pub fn last_step(&self) -> &StepCounters {
        &self.last_step
    }

    pub fn last_activity(&self) -> &StepActivity {
        &self.last_activity
    }

    pub fn random(&self) -> &R {
        &self.random
    }
}

fn build_layers(
    configs: &[LayerConfig],
    size: u32,
    tier: ExecutionTier,
    layers: &mut Vec<Layer>,
) -> Result<Vec<LayerNode>, ConfigError> {
    let mut nodes = Vec::with_capacity(configs.len());
    for config in configs {
        let index = layers.len();
        layers.push(Layer::new(config.id.clone(), index, size, config.inhibition, tier)?);
        let children = if config.layers.is_empty() {
            None
        } else {
            Some(Branch {
                temporal: TemporalState::new(),
                layers: build_layers(&config.layers, size, tier, layers)?,
            })
        };
        nodes.push(LayerNode { index, children });
    }
    Ok(nodes)
}

fn run_branch(graph: &mut Graph, branch: &mut Branch, input: &SparseVector, params: &Params) {
    let current = branch
        .temporal
        .update(input, params.temporal_length, params.input_multiplier);
    for node in &mut branch.layers {
        graph.run_layer(node.index, &current);
        if let Some(children) = &mut node.children {
            // Output of the parent's last activation, i.e. the previous timestep.
            let output = graph
                .layer(node.index)
                .map(|l| l.output().clone())
                .unwrap_or_default();
            run_branch(graph, children, &output, params);
        }
    }
}

#[inline]
fn should_report(now: Timestep, thinking: usize) -> bool {
    now < REPORT_INTERVAL || now % REPORT_INTERVAL == 0 || thinking > 0
}
