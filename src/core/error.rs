use thiserror::Error;

/// Malformed network configuration. Raised eagerly by `Network::new`; a
/// network is never built from a config that fails validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("\"regions\" are not defined")]
    NoRegions,

    #[error("region {region}: \"size\" must be a positive integer")]
    InvalidRegionSize { region: usize },

    #[error("region {region}: no layers defined")]
    NoLayers { region: usize },

    #[error("layer \"id\" is not defined")]
    MissingLayerId,

    #[error("layer id \"{0}\" is not unique")]
    DuplicateLayerId(String),

    #[error("invalid inhibition geometry: size={size} row={row} square={square}")]
    InvalidGeometry { size: u32, row: u32, square: u32 },

    #[error("parameter {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: &'static str,
    },

    #[cfg(feature = "serde")]
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
