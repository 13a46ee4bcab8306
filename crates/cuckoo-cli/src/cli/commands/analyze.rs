//! `cuckoo analyze` - Run one analysis against the sandbox.

use anyhow::{bail, Result};
use cuckoo_client::CuckooClientBuilder;
use cuckoo_core::{AnalysisParams, AnalysisRequest};
use cuckoo_worker::{keys, TaskOutcome, Wait, Worker};
use tracing::warn;

use super::Context;
use crate::cli::args::AnalyzeArgs;
use crate::store::DirContext;

pub async fn execute(ctx: Context, args: AnalyzeArgs) -> Result<()> {
    let config = ctx.config;
    config.validate()?;
    let ratings = config.ratings()?;
    let client = CuckooClientBuilder::from_config(&config.client()).build()?;

    let params = AnalysisParams::from_pairs(args.params.iter().map(|(k, v)| (k, v)))?;
    let mut store = DirContext::create(&args.out, args.job_id, args.req_id)?;
    let request = match (args.url, args.file) {
        (Some(url), _) => AnalysisRequest::url(url, params),
        (None, Some(file)) => {
            let content = store.add_input(file);
            AnalysisRequest::content(content, args.filename, params)
        }
        (None, None) => bail!("either --url or --file is required"),
    };
    let request = request.clean_job_data(args.clean_job_data);

    let (canceller, wait) = Wait::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling analysis");
            canceller.cancel();
        }
    });

    let worker = Worker::new(client, ratings, config.worker());
    let outcome = worker.process(request, &mut store, wait).await?;

    if let TaskOutcome::Cancelled { during } = outcome {
        println!("Analysis cancelled while {during}");
        return Ok(());
    }

    let result = store.finish()?;
    match store.attribute(keys::CLASSIFICATION) {
        Some(classification) => {
            let reason = store
                .attribute(keys::CLASSIFICATION_REASON)
                .unwrap_or_default();
            println!("Classification: {classification}");
            println!("Reason:         {reason}");
        }
        None => println!("Classification: unavailable"),
    }
    for reference in store.references() {
        println!("{:<22} {}", reference.key, reference.path.display());
    }
    for error in store.attributes().iter().filter(|a| a.key == keys::ERROR) {
        println!("Error:          {}", error.value);
    }
    println!("Results written to {}", result.display());

    if outcome == TaskOutcome::Abandoned {
        bail!("submission failed");
    }
    Ok(())
}
