//! `cuckoo score` - Classify a local report.

use std::fs::File;
use std::io::BufReader;

use anyhow::{Context as _, Result};
use cuckoo_core::score_report;

use super::Context;
use crate::cli::args::ScoreArgs;

pub fn execute(ctx: &Context, args: &ScoreArgs) -> Result<()> {
    let ratings = ctx.config.ratings()?;
    let report = File::open(&args.report)
        .with_context(|| format!("cannot open report {}", args.report.display()))?;
    let summary = score_report(BufReader::new(report), &ratings)?;

    if args.json {
        let verdict = serde_json::json!({
            "classification": summary.classification.as_str(),
            "score": summary.score,
            "reason": summary.reason,
        });
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        println!("Classification: {}", summary.classification);
        println!("Score:          {:.2}", summary.score);
        println!("Reason:         {}", summary.reason);
    }
    Ok(())
}
