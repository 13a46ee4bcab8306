//! Signature weights loaded from `name=weight` lines.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use tracing::info;

use crate::error::{CuckooError, Result};

/// Immutable mapping from signature name to risk weight.
///
/// Loaded once at start-up and shared read-only (typically behind an `Arc`)
/// by every running analysis.
#[derive(Debug, Clone, Default)]
pub struct RatingTable {
    rates: HashMap<String, f64>,
}

impl RatingTable {
    /// Load ratings from a file.
    pub fn load(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "loading signature ratings");
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Parse ratings from a reader.
    ///
    /// Blank lines and lines starting with `#` are skipped. Every other line
    /// must be `name=weight` with a finite numeric weight.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut rates = HashMap::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let (name, weight) = parse_line(trimmed).map_err(|reason| {
                CuckooError::MalformedRatings {
                    line: idx + 1,
                    reason,
                }
            })?;
            rates.insert(name.to_string(), weight);
        }
        Ok(Self { rates })
    }

    /// Parse ratings from an in-memory string.
    pub fn parse(source: &str) -> Result<Self> {
        Self::from_reader(source.as_bytes())
    }

    /// Weight of a signature.
    pub fn get(&self, name: &str) -> Result<f64> {
        self.rates
            .get(name)
            .copied()
            .ok_or_else(|| CuckooError::RatingNotFound {
                name: name.to_string(),
            })
    }

    /// Number of rated signatures
    #[must_use]
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Returns true if no signature is rated
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for RatingTable {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self {
            rates: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

fn parse_line(line: &str) -> std::result::Result<(&str, f64), String> {
    let (name, weight) = line
        .split_once('=')
        .ok_or_else(|| format!("expected name=weight, got {line:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("empty signature name".to_string());
    }
    let weight: f64 = weight
        .trim()
        .parse()
        .map_err(|e| format!("bad weight for {name}: {e}"))?;
    if !weight.is_finite() {
        return Err(format!("weight for {name} is not finite"));
    }
    Ok((name, weight))
}
