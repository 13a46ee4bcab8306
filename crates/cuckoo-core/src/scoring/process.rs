use std::collections::BTreeSet;

use tracing::warn;

use super::RatingTable;

/// Signatures matched by one analysed process and their summed weight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessScore {
    id: u64,
    names: Vec<String>,
    skipped: BTreeSet<String>,
    score: f64,
}

impl ProcessScore {
    /// Empty accumulator for a process
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self {
            id,
            names: Vec::new(),
            skipped: BTreeSet::new(),
            score: 0.0,
        }
    }

    /// Record a signature for this process.
    ///
    /// A name contributes its weight only the first time it is seen. Names
    /// without a rating go to the skipped set and add nothing.
    pub fn add_signature(&mut self, name: &str, ratings: &RatingTable) {
        if self.names.iter().any(|n| n == name) || self.skipped.contains(name) {
            return;
        }
        match ratings.get(name) {
            Ok(weight) => {
                self.names.push(name.to_string());
                self.score += weight;
            }
            Err(e) => {
                warn!(process_id = self.id, "{e}, added to skipped list");
                self.skipped.insert(name.to_string());
            }
        }
    }

    /// Process id
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Accumulated weight
    #[must_use]
    pub const fn score(&self) -> f64 {
        self.score
    }

    /// Distinct rated signature names, in the order they were first seen
    #[must_use]
    pub fn signature_names(&self) -> &[String] {
        &self.names
    }

    /// Names that were skipped for lack of a rating
    #[must_use]
    pub const fn skipped(&self) -> &BTreeSet<String> {
        &self.skipped
    }
}
