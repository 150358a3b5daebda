use crate::network::Network;
use crate::prng::RandomSource;
use crate::stats::NetworkStats;
use crate::types::{NodeId, NodeRef, Timestep};

/// A read-only snapshot of what the network is doing.
///
/// Design intent:
/// - Observers cannot mutate or steer the network.
/// - Snapshotting is on-demand and allocates; the timestep loop stays unchanged.
#[derive(Debug, Clone)]
pub struct NetworkSnapshot {
    pub timestep: Timestep,
    pub output: Vec<NodeRef>,
    pub layers: Vec<LayerSnapshot>,
    pub stats: NetworkStats,
}

/// Activity of one layer after the last timestep. Node ids are sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSnapshot {
    pub id: String,
    pub output: Vec<NodeId>,
    /// Winners that had no predicting pool.
    pub unpredicted: Vec<NodeId>,
    /// Winners driven by pools alone.
    pub thinking: Vec<NodeId>,
    /// Share of the layer's nodes in the output.
    pub output_ratio: f64,
}

pub struct NetworkAdapter<'a, R: RandomSource> {
    network: &'a Network<R>,
}

impl<'a, R: RandomSource> NetworkAdapter<'a, R> {
    pub fn new(network: &'a Network<R>) -> Self {
        Self { network }
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        let layers = self
            .network
            .graph()
            .layers()
            .iter()
            .map(|layer| {
                let output = sorted(layer.output().keys().copied());
                let output_ratio = if layer.is_empty() {
                    0.0
                } else {
                    output.len() as f64 / layer.len() as f64
                };
                LayerSnapshot {
                    id: layer.id().to_string(),
                    output,
                    unpredicted: sorted(layer.unpredicted().iter().copied()),
                    thinking: sorted(layer.thinking().iter().copied()),
                    output_ratio,
                }
            })
            .collect();

        NetworkSnapshot {
            timestep: self.network.timestep_count(),
            output: self.network.output().to_vec(),
            layers,
            stats: self.network.stats(),
        }
    }
}

fn sorted(ids: impl Iterator<Item = NodeId>) -> Vec<NodeId> {
    let mut ids: Vec<NodeId> = ids.collect();
    ids.sort_unstable();
    ids
}

/// Draw `size` nodes as rows of `row` cells, `0` for active and a space for
/// inactive, cells separated by one space. A trailing partial row is kept.
pub fn render_grid<I>(size: u32, row: u32, active: I) -> String
where
    I: IntoIterator<Item = NodeId>,
{
    if row == 0 {
        return String::new();
    }
    let mut on = vec![false; size as usize];
    for id in active {
        if let Some(cell) = (id as usize).checked_sub(1).and_then(|i| on.get_mut(i)) {
            *cell = true;
        }
    }

    on.chunks(row as usize)
        .map(|cells| {
            cells
                .iter()
                .map(|&lit| if lit { "0" } else { " " })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::types::sparse;

    #[test]
    fn grid_marks_active_cells() {
        let grid = render_grid(6, 3, [1, 5, 9]);
        assert_eq!(grid, "0    \n  0  ");
        assert_eq!(render_grid(5, 2, [5]).lines().last(), Some("0"));
        assert_eq!(render_grid(4, 0, [1]), "");
    }

    #[test]
    fn snapshot_reports_layer_activity() {
        let mut network = Network::new(NetworkConfig::single(4, "L", 2, 2)).unwrap();
        network.timestep(&[sparse([(2, 1.0), (1, 1.0), (3, 0.1)])], None);

        let snapshot = NetworkAdapter::new(&network).snapshot();
        assert_eq!(snapshot.timestep, 1);
        assert_eq!(snapshot.output.len(), 2);
        let layer = &snapshot.layers[0];
        assert_eq!(layer.id, "L");
        assert_eq!(layer.output, vec![1, 2]);
        assert_eq!(layer.unpredicted, vec![1, 2]);
        assert!(layer.thinking.is_empty());
        assert_eq!(layer.output_ratio, 0.5);
        assert_eq!(snapshot.stats.timestep, 1);
    }
}
