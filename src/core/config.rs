#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{Permanence, StableSet, Weight};

/// Execution tier for the winner selection phase.
///
/// `Parallel` partitions selection by area with rayon when the `parallel`
/// feature is enabled and falls back to `Scalar` otherwise. Both tiers select
/// the same winners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ExecutionTier {
    #[default]
    Scalar,
    Parallel,
}

impl ExecutionTier {
    /// Tier that will actually run given the compiled features.
    pub fn effective(self) -> Self {
        match self {
            #[cfg(feature = "parallel")]
            ExecutionTier::Parallel => ExecutionTier::Parallel,
            _ => ExecutionTier::Scalar,
        }
    }
}

/// Inhibition geometry of a layer: nodes per row and the side of the square
/// competitive area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Inhibition {
    pub row: u32,
    pub square: u32,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayerConfig {
    pub id: String,
    pub inhibition: Inhibition,
    /// Nested layers fed with the temporally averaged output of this layer.
    #[cfg_attr(feature = "serde", serde(default))]
    pub layers: Vec<LayerConfig>,
}

impl LayerConfig {
    pub fn new(id: impl Into<String>, row: u32, square: u32) -> Self {
        Self {
            id: id.into(),
            inhibition: Inhibition { row, square },
            layers: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: LayerConfig) -> Self {
        self.layers.push(child);
        self
    }
}

/// A region receives its own external input; every layer inside it has
/// `size` nodes.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionConfig {
    pub size: u32,
    pub layers: Vec<LayerConfig>,
}

/// Optional tuning parameters. Anything left `None` is derived from the total
/// node count by [`Params::resolve`].
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Tuning {
    pub temporal_length: Option<usize>,
    pub initial_link_permanence: Option<Permanence>,
    pub maximum_link_permanence: Option<Permanence>,
    pub minimum_links_in_pool: Option<usize>,
    pub maximum_links_in_pool: Option<usize>,
    pub pool_weight_change_rate: Option<Weight>,
    pub initial_pool_weight: Option<Weight>,
    pub minimum_pool_weight: Option<Weight>,
    pub maximum_pool_weight: Option<Weight>,
    pub exponential_growth: Option<f64>,
    pub input_multiplier: Option<f64>,
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkConfig {
    pub regions: Vec<RegionConfig>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub tuning: Tuning,
    /// Seed for pool-formation sampling. Defaults to 1.
    #[cfg_attr(feature = "serde", serde(default))]
    pub seed: Option<u64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub execution_tier: ExecutionTier,
}

impl NetworkConfig {
    /// One region with a single layer.
    pub fn single(size: u32, id: impl Into<String>, row: u32, square: u32) -> Self {
        Self {
            regions: vec![RegionConfig {
                size,
                layers: vec![LayerConfig::new(id, row, square)],
            }],
            ..Default::default()
        }
    }

    #[cfg(feature = "serde")]
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_execution_tier(mut self, tier: ExecutionTier) -> Self {
        self.execution_tier = tier;
        self
    }

    /// Check the region/layer structure and return the total node count
    /// (region size summed over every layer).
    pub fn validate(&self) -> Result<u64, ConfigError> {
        if self.regions.is_empty() {
            return Err(ConfigError::NoRegions);
        }

        let mut seen: StableSet<&str> = StableSet::default();
        let mut total = 0u64;
        for (index, region) in self.regions.iter().enumerate() {
            if region.size == 0 {
                return Err(ConfigError::InvalidRegionSize { region: index });
            }
            if region.layers.is_empty() {
                return Err(ConfigError::NoLayers { region: index });
            }
            total += validate_layers(&region.layers, region.size, &mut seen)?;
        }
        Ok(total)
    }
}

fn validate_layers<'a>(
    layers: &'a [LayerConfig],
    size: u32,
    seen: &mut StableSet<&'a str>,
) -> Result<u64, ConfigError> {
    let mut total = 0u64;
    for layer in layers {
        if layer.id.is_empty() {
            return Err(ConfigError::MissingLayerId);
        }
        if !seen.insert(layer.id.as_str()) {
            return Err(ConfigError::DuplicateLayerId(layer.id.clone()));
        }
        let Inhibition { row, square } = layer.inhibition;
        if row == 0 || square == 0 {
            return Err(ConfigError::InvalidGeometry { size, row, square });
        }
        total += u64::from(size);
        total += validate_layers(&layer.layers, size, seen)?;
    }
    Ok(total)
}

/// Resolved tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Params {
    /// How many timesteps of input are temporally averaged.
    pub temporal_length: usize,
    pub initial_link_permanence: Permanence,
    pub maximum_link_permanence: Permanence,
    /// As low as possible while keeping pools unique.
    pub minimum_links_in_pool: usize,
    pub maximum_links_in_pool: usize,
    pub pool_weight_change_rate: Weight,
    pub initial_pool_weight: Weight,
    pub minimum_pool_weight: Weight,
    pub maximum_pool_weight: Weight,
    pub exponential_growth: f64,
    /// How much stronger driver input is than pool input.
    pub input_multiplier: f64,
}

impl Params {
    pub const DEFAULT_TEMPORAL_LENGTH: usize = 10;
    pub const DEFAULT_MINIMUM_POOL_WEIGHT: Weight = -1;
    pub const DEFAULT_MAXIMUM_POOL_WEIGHT: Weight = 20;
    pub const DEFAULT_EXPONENTIAL_GROWTH: f64 = 2.0;
    pub const DEFAULT_INPUT_MULTIPLIER: f64 = 1000.0;

    /// Fill in defaults derived from the total node count `size` and validate
    /// the result.
    pub fn resolve(tuning: &Tuning, size: u64) -> Result<Self, ConfigError> {
        let n = size as f64;

        let minimum_links_in_pool = tuning
            .minimum_links_in_pool
            .unwrap_or_else(|| (n.powf(1.0 / 8.0).floor() as usize).max(1));
        let maximum_pool_weight = tuning
            .maximum_pool_weight
            .unwrap_or(Self::DEFAULT_MAXIMUM_POOL_WEIGHT);

        let params = Self {
            temporal_length: tuning
                .temporal_length
                .unwrap_or(Self::DEFAULT_TEMPORAL_LENGTH),
            initial_link_permanence: tuning
                .initial_link_permanence
                .unwrap_or_else(|| n.powf(1.0 / 4.0).floor()),
            maximum_link_permanence: tuning.maximum_link_permanence.unwrap_or(n * n),
            minimum_links_in_pool,
            maximum_links_in_pool: tuning
                .maximum_links_in_pool
                .unwrap_or(minimum_links_in_pool * 5),
            pool_weight_change_rate: tuning.pool_weight_change_rate.unwrap_or(1),
            initial_pool_weight: tuning.initial_pool_weight.unwrap_or(maximum_pool_weight),
            minimum_pool_weight: tuning
                .minimum_pool_weight
                .unwrap_or(Self::DEFAULT_MINIMUM_POOL_WEIGHT),
            maximum_pool_weight,
            exponential_growth: tuning
                .exponential_growth
                .unwrap_or(Self::DEFAULT_EXPONENTIAL_GROWTH),
            input_multiplier: tuning
                .input_multiplier
                .map(f64::abs)
                .unwrap_or(Self::DEFAULT_INPUT_MULTIPLIER),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |name: &'static str, reason: &'static str| -> Result<(), ConfigError> {
            Err(ConfigError::InvalidParameter { name, reason })
        };

        if self.temporal_length == 0 {
            return invalid("temporal_length", "must be >= 1");
        }
        if !self.initial_link_permanence.is_finite() || self.initial_link_permanence <= 0.0 {
            return invalid("initial_link_permanence", "must be finite and > 0");
        }
        if !self.maximum_link_permanence.is_finite()
            || self.maximum_link_permanence < self.initial_link_permanence
        {
            return invalid(
                "maximum_link_permanence",
                "must be finite and >= initial_link_permanence",
            );
        }
        if self.minimum_links_in_pool == 0 {
            return invalid("minimum_links_in_pool", "must be >= 1");
        }
        if self.maximum_links_in_pool < self.minimum_links_in_pool {
            return invalid("maximum_links_in_pool", "must be >= minimum_links_in_pool");
        }
        if self.pool_weight_change_rate < 1 {
            return invalid("pool_weight_change_rate", "must be >= 1");
        }
        if self.minimum_pool_weight > self.maximum_pool_weight {
            return invalid("minimum_pool_weight", "must be <= maximum_pool_weight");
        }
        if self.initial_pool_weight < self.minimum_pool_weight
            || self.initial_pool_weight > self.maximum_pool_weight
        {
            return invalid(
                "initial_pool_weight",
                "must be within [minimum_pool_weight, maximum_pool_weight]",
            );
        }
        if !self.exponential_growth.is_finite() || self.exponential_growth <= 1.0 {
            return invalid("exponential_growth", "must be finite and > 1");
        }
        if !self.input_multiplier.is_finite() || self.input_multiplier <= 0.0 {
            return invalid("input_multiplier", "must be finite and != 0");
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn clamp_weight(&self, weight: Weight) -> Weight {
        weight.clamp(self.minimum_pool_weight, self.maximum_pool_weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_derive_from_size() {
        let p = Params::resolve(&Tuning::default(), 784).unwrap();
        assert_eq!(p.temporal_length, 10);
        // 784^(1/4) = 5.29
        assert_eq!(p.initial_link_permanence, 5.0);
        assert_eq!(p.maximum_link_permanence, 784.0 * 784.0);
        // 784^(1/8) = 2.30
        assert_eq!(p.minimum_links_in_pool, 2);
        assert_eq!(p.maximum_links_in_pool, 10);
        assert_eq!(p.pool_weight_change_rate, 1);
        assert_eq!(p.minimum_pool_weight, -1);
        assert_eq!(p.maximum_pool_weight, 20);
        assert_eq!(p.initial_pool_weight, 20);
        assert_eq!(p.exponential_growth, 2.0);
        assert_eq!(p.input_multiplier, 1000.0);
    }

    #[test]
    fn explicit_tuning_overrides_defaults() {
        let tuning = Tuning {
            minimum_links_in_pool: Some(3),
            maximum_pool_weight: Some(8),
            input_multiplier: Some(-5.0),
            ..Default::default()
        };
        let p = Params::resolve(&tuning, 100).unwrap();
        assert_eq!(p.minimum_links_in_pool, 3);
        assert_eq!(p.maximum_links_in_pool, 15);
        assert_eq!(p.initial_pool_weight, 8);
        assert_eq!(p.input_multiplier, 5.0);
    }

    #[test]
    fn rejects_inverted_link_bounds() {
        let tuning = Tuning {
            minimum_links_in_pool: Some(4),
            maximum_links_in_pool: Some(2),
            ..Default::default()
        };
        let err = Params::resolve(&tuning, 100).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter {
                name: "maximum_links_in_pool",
                ..
            }
        ));
    }

    #[test]
    fn rejects_initial_weight_out_of_bounds() {
        let tuning = Tuning {
            initial_pool_weight: Some(50),
            ..Default::default()
        };
        assert!(Params::resolve(&tuning, 100).is_err());
    }

    #[test]
    fn validate_reports_structure_errors() {
        assert!(matches!(
            NetworkConfig::default().validate(),
            Err(ConfigError::NoRegions)
        ));

        let zero = NetworkConfig::single(0, "a", 2, 2);
        assert!(matches!(
            zero.validate(),
            Err(ConfigError::InvalidRegionSize { region: 0 })
        ));

        let unnamed = NetworkConfig::single(4, "", 2, 2);
        assert!(matches!(unnamed.validate(), Err(ConfigError::MissingLayerId)));

        let mut dup = NetworkConfig::single(4, "a", 2, 2);
        dup.regions[0].layers[0] =
            LayerConfig::new("a", 2, 2).with_child(LayerConfig::new("a", 2, 1));
        assert!(matches!(dup.validate(), Err(ConfigError::DuplicateLayerId(id)) if id == "a"));

        let flat = NetworkConfig::single(4, "a", 0, 2);
        assert!(matches!(flat.validate(), Err(ConfigError::InvalidGeometry { .. })));
    }

    #[test]
    fn total_size_counts_every_layer() {
        let mut cfg = NetworkConfig::single(16, "a", 4, 2);
        cfg.regions[0].layers[0] =
            LayerConfig::new("a", 4, 2).with_child(LayerConfig::new("b", 4, 4));
        cfg.regions.push(RegionConfig {
            size: 9,
            layers: vec![LayerConfig::new("c", 3, 3)],
        });
        assert_eq!(cfg.validate().unwrap(), 16 + 16 + 9);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn parses_json_config() {
        let text = r#"{
            "regions": [{
                "size": 784,
                "layers": [{
                    "id": "A2",
                    "inhibition": { "row": 28, "square": 2 },
                    "layers": [{ "id": "A3", "inhibition": { "row": 28, "square": 3 } }]
                }]
            }],
            "tuning": { "temporal_length": 4 },
            "seed": 7
        }"#;
        let cfg = NetworkConfig::from_json(text).unwrap();
        assert_eq!(cfg.regions[0].layers[0].layers[0].id, "A3");
        assert_eq!(cfg.tuning.temporal_length, Some(4));
        assert_eq!(cfg.tuning.minimum_links_in_pool, None);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.execution_tier, ExecutionTier::Scalar);

        assert!(matches!(
            NetworkConfig::from_json(r#"{ "regions": [{ "size": 1.5, "layers": [] }] }"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
