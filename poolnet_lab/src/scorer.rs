//! Label scoring on top of the network's output stream.
//!
//! The network is unsupervised; labels are only used here, after the fact, to
//! see which winners a label tends to produce.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use poolnet::types::NodeRef;

#[derive(Debug, Default, Clone)]
struct LabelCounts {
    timesteps: u64,
    nodes: BTreeMap<NodeRef, u64>,
}

/// Accumulates how often each node wins while a label is shown.
#[derive(Debug, Default)]
pub struct Scorer {
    labels: BTreeMap<String, LabelCounts>,
}

impl Scorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, label: &str, output: &[NodeRef]) {
        let counts = self.labels.entry(label.to_string()).or_default();
        counts.timesteps += 1;
        for &node in output {
            *counts.nodes.entry(node).or_insert(0) += 1;
        }
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    /// Keep the `kwinner` strongest nodes of every label. Each raw count is
    /// divided by the label's summed per-timestep rate, so a label's weights
    /// add up to the number of timesteps it was shown.
    pub fn classify(&self, kwinner: usize) -> Classifier {
        let labels = self
            .labels
            .iter()
            .map(|(label, counts)| {
                let timesteps = counts.timesteps.max(1) as f64;
                let sum: f64 = counts.nodes.values().map(|&c| c as f64 / timesteps).sum();
                let mut weights: Vec<(NodeRef, f64)> = counts
                    .nodes
                    .iter()
                    .map(|(&node, &c)| (node, if sum > 0.0 { c as f64 / sum } else { 0.0 }))
                    .collect();
                weights.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(Ordering::Equal)
                        .then(a.0.cmp(&b.0))
                });
                weights.truncate(kwinner);
                (label.clone(), weights)
            })
            .collect();
        Classifier { labels }
    }
}

/// Per-label node weights, strongest first.
#[derive(Debug, Clone)]
pub struct Classifier {
    labels: BTreeMap<String, Vec<(NodeRef, f64)>>,
}

impl Classifier {
    pub fn representation(&self, label: &str) -> Option<&[(NodeRef, f64)]> {
        self.labels.get(label).map(Vec::as_slice)
    }

    /// Score every label against one output: `+weight` for each classified node
    /// that is active, `-weight` for each that is not. Labels in sorted order.
    pub fn score(&self, output: &[NodeRef]) -> Vec<(String, f64)> {
        let active: BTreeSet<NodeRef> = output.iter().copied().collect();
        self.labels
            .iter()
            .map(|(label, weights)| {
                let total = weights
                    .iter()
                    .map(|(node, w)| if active.contains(node) { *w } else { -*w })
                    .sum();
                (label.clone(), total)
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    correct: u64,
    total: u64,
}

/// Per-label hit counts over a test run.
#[derive(Debug, Default)]
pub struct Evaluation {
    tallies: BTreeMap<String, Tally>,
}

impl Evaluation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hit when `correct` holds the highest score. Ties go to the label that
    /// sorts first.
    pub fn record(&mut self, correct: &str, scores: &[(String, f64)]) {
        let mut top: Option<&(String, f64)> = None;
        for entry in scores {
            if top.map_or(true, |best| entry.1 > best.1) {
                top = Some(entry);
            }
        }
        let tally = self.tallies.entry(correct.to_string()).or_default();
        tally.total += 1;
        if top.is_some_and(|(label, _)| label == correct) {
            tally.correct += 1;
        }
    }

    pub fn report(&self) -> Report {
        let labels: Vec<(String, f64)> = self
            .tallies
            .iter()
            .map(|(label, t)| (label.clone(), percent(t.correct, t.total)))
            .collect();
        let overall = if labels.is_empty() {
            0.0
        } else {
            labels.iter().map(|(_, p)| p).sum::<f64>() / labels.len() as f64
        };
        Report { labels, overall }
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Accuracy per label and the mean across labels, in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub labels: Vec<(String, f64)>,
    pub overall: f64,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, accuracy) in &self.labels {
            writeln!(f, "{label:>12} {accuracy:6.2}%")?;
        }
        write!(f, "{:>12} {:6.2}%", "overall", self.overall)
    }
}
