//! cuckoo - Cuckoo sandbox analysis runner

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    cuckoo_cli::run().await
}
