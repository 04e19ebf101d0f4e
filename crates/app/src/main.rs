//! `stakeledger`: replay newline-delimited JSON blocks through the indexer.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use stakeledger_app::{feed_blocks, open_blocks, AppBuilder, AppError, DEFAULT_SERVICE};
use tracing::error;

#[derive(Debug, Parser)]
#[command(name = "stakeledger", version, about = "Replay staking blocks into per-account aggregates")]
struct Cli {
    /// Settings file (defaults to the platform config directory).
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(long, short = 'v')]
    verbose: bool,

    /// NDJSON file with one block per line, or `-` for stdin.
    blocks: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let mut builder = AppBuilder::new(DEFAULT_SERVICE).verbose(cli.verbose);
    if let Some(path) = &cli.config {
        builder = builder.config_path(path);
    }
    let mut app = builder.build()?;

    let reader = open_blocks(&cli.blocks).await?;

    let (tx, rx) = app.indexer.channel();
    let feed = tokio::spawn(feed_blocks(reader, tx));
    app.indexer.run(rx).await;
    feed.await
        .map_err(|e| AppError::InitError(format!("block reader task failed: {e}")))??;

    let totals = app.indexer.totals();
    println!(
        "blocks={} events={} processed={} skipped={} malformed={} replayed={} failed_updates={} last_block={}",
        totals.blocks,
        totals.events,
        totals.processed,
        totals.skipped,
        totals.malformed,
        totals.replayed,
        totals.failed_updates,
        app.indexer
            .last_block()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_stdin_and_flags() {
        let cli = Cli::try_parse_from(["stakeledger", "-v", "--config", "/tmp/s.json", "-"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.json")));
        assert_eq!(cli.blocks, "-");

        assert!(Cli::try_parse_from(["stakeledger"]).is_err());
    }

    #[tokio::test]
    async fn test_run_replays_file_into_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("ledger.db");
        let config = dir.path().join("settings.json");
        std::fs::write(
            &config,
            format!(r#"{{"database": {{"kind": "sqlite", "path": {:?}}}}}"#, db.to_str().unwrap()),
        )
        .unwrap();
        let blocks = dir.path().join("blocks.ndjson");
        std::fs::write(
            &blocks,
            r#"{"number": 100, "timestamp": "2023-06-01T00:00:00Z", "events": [{"section": "staking", "method": "Rewarded", "phase": {"applyExtrinsic": 1}, "data": ["X", "1000"]}]}"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config),
            verbose: false,
            blocks: blocks.to_str().unwrap().to_string(),
        };
        run(cli).await.unwrap();

        let store = stakeledger_store::SqliteStore::open(&db).unwrap();
        assert_eq!(store.count(stakeledger_store::Entity::SumRewardDay).unwrap(), 1);
    }
}
