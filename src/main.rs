use std::error::Error;

use code_ledger::{IndexMode, Ledger, LedgerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from .env if present; config may reference
    // them via ${NAME}.
    dotenvy::dotenv().ok();
    code_ledger::telemetry::init("info");

    let config_path =
        std::env::var("CODE_LEDGER_CONFIG").unwrap_or_else(|_| "code-ledger.json".to_string());
    let config = LedgerConfig::load_from_path(std::path::Path::new(&config_path))?;
    let ledger = Ledger::open(config)?;

    for repo in ledger.config().repos.clone() {
        let stats = ledger
            .index_repo(&repo.repo_id, IndexMode::Incremental, None)
            .await?;
        info!(
            repo = %repo.repo_id,
            files = stats.files_processed,
            symbols = stats.symbols_indexed,
            edges = stats.edges_created,
            duration_ms = stats.duration_ms,
            engine = stats.engine,
            "indexed"
        );
    }

    ledger.sweep_expired_handles()?;
    Ok(())
}
