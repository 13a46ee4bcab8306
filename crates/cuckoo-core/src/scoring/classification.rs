use serde::{Deserialize, Serialize};

/// Score from which a report is at least suspicious
pub const SUSPICIOUS_THRESHOLD: f64 = 1.0;

/// Score from which a report is malicious
pub const MALICIOUS_THRESHOLD: f64 = 1.5;

/// Verdict derived from a report's total score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Score below 1.0
    Benign,
    /// Score in [1.0, 1.5)
    Suspicious,
    /// Score of 1.5 or more
    Malicious,
}

impl Classification {
    /// Classify a total score
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score < SUSPICIOUS_THRESHOLD {
            Self::Benign
        } else if score >= MALICIOUS_THRESHOLD {
            Self::Malicious
        } else {
            Self::Suspicious
        }
    }

    /// Lowercase name, as written to the job context
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Benign => "benign",
            Self::Suspicious => "suspicious",
            Self::Malicious => "malicious",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
