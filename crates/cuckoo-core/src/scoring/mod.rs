//! Signature rating and report classification.

mod classification;
mod process;
mod rating;
mod scorer;

pub use classification::{Classification, MALICIOUS_THRESHOLD, SUSPICIOUS_THRESHOLD};
pub use process::ProcessScore;
pub use rating::RatingTable;
pub use scorer::{score_report, ScoreSummary, SignatureScorer, UnattributedScores};
