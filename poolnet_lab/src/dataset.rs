//! Flat-file datasets: a label mapping and CSV rows of pixel intensities.

use std::collections::BTreeMap;
use std::io::{BufRead, Lines};

use poolnet::types::SparseVector;

use crate::error::{LabError, Result};

/// Label index -> printable label.
pub type Mapping = BTreeMap<u32, String>;

/// One dataset row.
#[derive(Debug, Clone)]
pub struct Example {
    pub label: String,
    /// Pixel column (1-based) -> intensity in `(0, 1]`.
    pub input: SparseVector,
}

/// Parse `index code` lines. A numeric code is a character code; anything
/// else is taken as the label itself.
pub fn read_mapping<R: BufRead>(reader: R) -> Result<Mapping> {
    let mut mapping = Mapping::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let Some(index) = parts.next() else {
            continue;
        };
        let index: u32 = index.parse().map_err(|_| LabError::Dataset {
            line: n + 1,
            reason: format!("invalid label index {index:?}"),
        })?;
        let Some(code) = parts.next() else {
            continue;
        };
        let decoded = code
            .parse::<u32>()
            .ok()
            .filter(|&c| c != 0)
            .and_then(char::from_u32);
        let label = match decoded {
            Some(c) => c.to_string(),
            None => code.to_string(),
        };
        mapping.insert(index, label);
    }
    Ok(mapping)
}

/// Stream the examples of a CSV dataset, skipping rows with unmapped labels.
pub fn read_examples<R: BufRead>(reader: R, mapping: &Mapping) -> Examples<'_, R> {
    Examples::new(reader, mapping)
}

/// Streaming reader over a CSV dataset with a header row. The first column is
/// the label index, the rest are pixel intensities `0..=255`.
pub struct Examples<'m, R> {
    lines: Lines<R>,
    mapping: &'m Mapping,
    line: usize,
}

impl<'m, R: BufRead> Examples<'m, R> {
    pub fn new(reader: R, mapping: &'m Mapping) -> Self {
        Self {
            lines: reader.lines(),
            mapping,
            line: 0,
        }
    }

    fn parse(&self, row: &str) -> Result<Option<Example>> {
        let mut columns = row.split(',');
        let index = columns.next().unwrap_or_default().trim();
        let index: u32 = index
            .parse()
            .map_err(|_| self.error(format!("invalid label {index:?}")))?;
        let Some(label) = self.mapping.get(&index) else {
            return Ok(None);
        };

        let mut input = SparseVector::default();
        for (column, pixel) in columns.enumerate() {
            let pixel = pixel.trim();
            let value: f64 = pixel.parse().map_err(|_| {
                self.error(format!("invalid pixel {pixel:?} in column {}", column + 1))
            })?;
            if value != 0.0 {
                input.insert(column as u32 + 1, value / 255.0);
            }
        }
        Ok(Some(Example {
            label: label.clone(),
            input,
        }))
    }

    fn error(&self, reason: String) -> LabError {
        LabError::Dataset {
            line: self.line,
            reason,
        }
    }
}

impl<R: BufRead> Iterator for Examples<'_, R> {
    type Item = Result<Example>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;
            if self.line == 1 || line.trim().is_empty() {
                continue;
            }
            match self.parse(&line) {
                Ok(Some(example)) => return Some(Ok(example)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
