//! Command-line argument definitions using clap.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

/// Run Cuckoo sandbox analyses and score their reports
///
/// Settings come from the config file, then CUCKOO_* environment variables,
/// then flags.
#[derive(Parser, Debug)]
#[command(name = "cuckoo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "CUCKOO_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Sandbox API address
    #[arg(long, env = "CUCKOO_ADDRESS", global = true)]
    pub address: Option<String>,

    /// Directory for files prepared before submission
    #[arg(long, env = "CUCKOO_PROC_PATH", global = true)]
    pub proc_path: Option<PathBuf>,

    /// Signature rating file
    #[arg(long, env = "CUCKOO_RATINGS", global = true)]
    pub ratings: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a file or URL and collect the results
    Analyze(AnalyzeArgs),

    /// Score a local JSON report
    Score(ScoreArgs),
}

// ============================================================================
// Analyze command
// ============================================================================

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["url", "file"])))]
pub struct AnalyzeArgs {
    /// URL for the sandbox to visit
    #[arg(long)]
    pub url: Option<String>,

    /// File to submit
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Name to submit the file under (default: MD5 of its content)
    #[arg(long, requires = "file")]
    pub filename: Option<String>,

    /// Analysis parameter, e.g. -p save_pcap=true -p vm_id=win7
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// Delete sandbox task data after collection
    #[arg(long)]
    pub clean_job_data: bool,

    /// Output directory for artifacts and result.json
    #[arg(short, long)]
    pub out: PathBuf,

    /// Job identifier used to name scratch files
    #[arg(long, default_value = "cli")]
    pub job_id: String,

    /// Request identifier used to name scratch files
    #[arg(long, default_value = "1")]
    pub req_id: String,
}

// ============================================================================
// Score command
// ============================================================================

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// JSON report produced by the sandbox
    pub report: PathBuf,

    /// Print the verdict as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))
}
