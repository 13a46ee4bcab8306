//! Single-pass scoring of a Cuckoo JSON report.
//!
//! Only the top-level `signatures` array is decoded, one element at a time;
//! every other field is skipped without being materialized.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Read;

use serde::de::{DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use tracing::{debug, warn};

use super::{Classification, ProcessScore, RatingTable};
use crate::error::{CuckooError, Result};
use crate::types::Signature;

/// Scores extracted from signatures that carry no process id
pub type UnattributedScores = BTreeMap<String, f64>;

/// Final verdict for a report
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSummary {
    /// Top process score plus every unattributed score
    pub score: f64,
    /// Signature names that produced the score
    pub reason: String,
    /// Verdict for the score
    pub classification: Classification,
}

/// Accumulates signature weights per process while a report streams through.
#[derive(Debug)]
pub struct SignatureScorer<'a> {
    ratings: &'a RatingTable,
    processes: HashMap<u64, ProcessScore>,
    additional: UnattributedScores,
}

impl<'a> SignatureScorer<'a> {
    /// Create a scorer backed by a rating table
    #[must_use]
    pub fn new(ratings: &'a RatingTable) -> Self {
        Self {
            ratings,
            processes: HashMap::new(),
            additional: UnattributedScores::new(),
        }
    }

    /// Consume a report document from a reader.
    pub fn process<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut de = serde_json::Deserializer::from_reader(reader);
        de.deserialize_map(ReportVisitor { scorer: self })
            .map_err(|e| CuckooError::MalformedReport(e.to_string()))?;
        de.end()
            .map_err(|e| CuckooError::MalformedReport(e.to_string()))
    }

    /// Fold one signature into the accumulators
    pub fn add_signature(&mut self, signature: &Signature) {
        debug!(signature = %signature.name, occurrences = signature.data.len(), "scoring signature");
        for pid in signature.occurrences() {
            match pid {
                Some(pid) => self
                    .processes
                    .entry(pid)
                    .or_insert_with(|| ProcessScore::new(pid))
                    .add_signature(&signature.name, self.ratings),
                None => self.add_unattributed(&signature.name),
            }
        }
    }

    fn add_unattributed(&mut self, name: &str) {
        if self.additional.contains_key(name) {
            return;
        }
        match self.ratings.get(name) {
            Ok(weight) => {
                self.additional.insert(name.to_string(), weight);
            }
            Err(e) => warn!("{e}, skipped"),
        }
    }

    /// Process with the strictly highest score.
    ///
    /// Among equal scores the first one met while iterating wins; that order
    /// is unspecified.
    #[must_use]
    pub fn max_rate_process(&self) -> Option<&ProcessScore> {
        self.processes.values().fold(None, |best, p| match best {
            Some(b) if b.score() >= p.score() => Some(b),
            _ => Some(p),
        })
    }

    /// Scores of signatures not tied to any process
    #[must_use]
    pub const fn additional_scores(&self) -> &UnattributedScores {
        &self.additional
    }

    /// Total score, reason and classification
    #[must_use]
    pub fn summary(&self) -> ScoreSummary {
        let mut score = 0.0;
        let mut parts = Vec::new();
        if let Some(top) = self.max_rate_process() {
            score += top.score();
            parts.extend(top.signature_names().iter().map(String::as_str));
        }
        for (name, weight) in &self.additional {
            score += weight;
            parts.push(name);
        }
        ScoreSummary {
            score,
            reason: parts.join(", "),
            classification: Classification::from_score(score),
        }
    }
}

/// Score a whole report in one call
pub fn score_report<R: Read>(reader: R, ratings: &RatingTable) -> Result<ScoreSummary> {
    let mut scorer = SignatureScorer::new(ratings);
    scorer.process(reader)?;
    Ok(scorer.summary())
}

struct ReportVisitor<'s, 'a> {
    scorer: &'s mut SignatureScorer<'a>,
}

impl<'de> Visitor<'de> for ReportVisitor<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a report object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<(), A::Error> {
        let scorer = self.scorer;
        while let Some(key) = map.next_key::<String>()? {
            if key == "signatures" {
                map.next_value_seed(SignaturesSeed {
                    scorer: &mut *scorer,
                })?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(())
    }
}

struct SignaturesSeed<'s, 'a> {
    scorer: &'s mut SignatureScorer<'a>,
}

impl<'de> DeserializeSeed<'de> for SignaturesSeed<'_, '_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for SignaturesSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of signatures")
    }

    fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<(), E> {
        Ok(())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<(), A::Error> {
        while let Some(signature) = seq.next_element::<Signature>()? {
            self.scorer.add_signature(&signature);
        }
        Ok(())
    }
}
