//! poolnet lab - train a network on a labelled dataset and score it
//!
//! The network never sees the labels. Training winners are tallied per label,
//! each label keeps its `kwinner` strongest nodes, and test outputs are scored
//! against those representations.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

use poolnet::prelude::*;
use tracing::{debug, info, warn};

mod dataset;
mod error;
mod scorer;

use dataset::{read_examples, read_mapping, Mapping};
use error::{LabError, Result};
use scorer::{Evaluation, Scorer};

const USAGE: &str = "poolnet-lab <network.json> <train.csv> <test.csv> <mapping.txt>";

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 5 {
        return Err(LabError::Usage(USAGE.to_string()));
    }
    let (config_path, train_path, test_path, mapping_path) =
        (&args[1], &args[2], &args[3], &args[4]);

    let mut config = NetworkConfig::from_json(&fs::read_to_string(config_path)?)?;
    if let Ok(tier) = std::env::var("POOLNET_EXEC_TIER") {
        match tier.as_str() {
            "scalar" => config = config.with_execution_tier(ExecutionTier::Scalar),
            "parallel" => config = config.with_execution_tier(ExecutionTier::Parallel),
            other => warn!("Unknown POOLNET_EXEC_TIER {:?}; using config value", other),
        }
    }

    let mapping = read_mapping(BufReader::new(File::open(mapping_path)?))?;
    info!("Loaded {} labels from {}", mapping.len(), mapping_path);

    let mut network = Network::new(config)?;
    info!("\n{}", network.stats());

    let started = Instant::now();
    let scorer = train(&mut network, Path::new(train_path), &mapping)?;
    info!(
        "Training: {} labels in {:.2?}",
        scorer.label_count(),
        started.elapsed()
    );

    let classifier = scorer.classify(network.kwinner());
    for label in mapping.values() {
        if let Some(nodes) = classifier.representation(label) {
            debug!(label = %label, nodes = nodes.len(), "label representation");
        }
    }

    let testing = Instant::now();
    let file = BufReader::new(File::open(test_path)?);
    let mut evaluation = Evaluation::new();
    for example in read_examples(file, &mapping) {
        let example = example?;
        let output = network.timestep(&[example.input], Some(example.label.as_str()));
        evaluation.record(&example.label, &classifier.score(output));
    }
    info!("Testing: {:.2?}", testing.elapsed());

    info!("\n{}", network.stats());
    info!("Score per label:\n{}", evaluation.report());
    warn!("Unsupervised network: the score only hints at what the winners encode");
    info!("Total: {:.2?}", started.elapsed());
    Ok(())
}

fn train(network: &mut Network, path: &Path, mapping: &Mapping) -> Result<Scorer> {
    let file = BufReader::new(File::open(path)?);
    let mut scorer = Scorer::new();
    for example in read_examples(file, mapping) {
        let example = example?;
        let output = network.timestep(&[example.input], Some(example.label.as_str()));
        scorer.observe(&example.label, output);
    }
    Ok(scorer)
}
