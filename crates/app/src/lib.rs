//! Stakeledger App
//!
//! Unified initialization for the indexer: settings, logging, the entity
//! store and the service, plus the NDJSON block feed used by the replay
//! binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stakeledger_aggregator::{IndexerConfig, IndexerService};
use stakeledger_core::Block;
use stakeledger_logging::LogLevel;
use stakeledger_settings::{Settings, SettingsError};
use stakeledger_store::{EntityStore, MemoryStore, SqliteStore, StoreError};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

pub const DEFAULT_SERVICE: &str = "stakeledger";
const DEFAULT_DB_FILE: &str = "ledger.db";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Initialization failed: {0}")]
    InitError(String),
    #[error("Settings error: {0}")]
    SettingsError(#[from] SettingsError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid block on line {line}: {source}")]
    InvalidBlock {
        line: u64,
        source: serde_json::Error,
    },
    #[error("Block channel closed before the feed finished")]
    ChannelClosed,
}

/// Where aggregates are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatabaseConfig {
    Memory,
    /// SQLite file; `None` means `ledger.db` in the service data directory.
    Sqlite {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::Sqlite { path: None }
    }
}

impl DatabaseConfig {
    /// Resolved SQLite path, or `None` for the in-memory store.
    pub fn sqlite_path(&self, service: &str) -> Option<PathBuf> {
        match self {
            Self::Memory => None,
            Self::Sqlite { path: Some(path) } => Some(path.clone()),
            Self::Sqlite { path: None } => {
                Some(stakeledger_settings::default_data_dir_for(service).join(DEFAULT_DB_FILE))
            }
        }
    }

    pub fn open(&self, service: &str) -> Result<Arc<dyn EntityStore>, StoreError> {
        match self.sqlite_path(service) {
            None => Ok(Arc::new(MemoryStore::new())),
            Some(path) => {
                info!("Opening SQLite store at {}", path.display());
                Ok(Arc::new(SqliteStore::open(&path)?))
            }
        }
    }
}

/// Contents of `settings.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(flatten)]
    pub indexer: IndexerConfig,
    pub database: DatabaseConfig,
    pub log_level: LogLevel,
}

/// Initialized application context
pub struct App {
    pub service: String,
    pub settings: Settings<AppConfig>,
    pub store: Arc<dyn EntityStore>,
    pub indexer: IndexerService,
}

/// Builder for constructing an App with configurable options.
pub struct AppBuilder {
    service: String,
    log_level: Option<LogLevel>,
    skip_logging: bool,
    skip_banner: bool,
    config_path: Option<PathBuf>,
    database: Option<DatabaseConfig>,
}

impl AppBuilder {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
            log_level: None,
            skip_logging: false,
            skip_banner: false,
            config_path: None,
            database: None,
        }
    }

    /// Overrides `log_level` from the settings file.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// `--verbose` forces debug; otherwise the settings file decides.
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.log_level = Some(LogLevel::from_verbose(true));
        }
        self
    }

    pub fn skip_logging(mut self) -> Self {
        self.skip_logging = true;
        self
    }

    pub fn skip_banner(mut self) -> Self {
        self.skip_banner = true;
        self
    }

    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Overrides `database` from the settings file without rewriting it.
    pub fn database(mut self, database: DatabaseConfig) -> Self {
        self.database = Some(database);
        self
    }

    pub fn build(self) -> Result<App, AppError> {
        if self.service.trim().is_empty() {
            return Err(AppError::InitError("service name is empty".into()));
        }

        let settings: Settings<AppConfig> =
            Settings::load_or_default(&self.service, self.config_path.as_deref())?;

        if !self.skip_logging {
            let level = self.log_level.unwrap_or(settings.config.log_level);
            let _ = stakeledger_logging::try_init(level);
        }

        let database = self
            .database
            .unwrap_or_else(|| settings.config.database.clone());
        let store = database.open(&self.service)?;
        let indexer = IndexerService::new(store.clone(), settings.config.indexer.clone());

        if !self.skip_banner {
            info!(
                "{} {} starting, settings {}, store {}",
                self.service,
                env!("CARGO_PKG_VERSION"),
                settings.path().display(),
                match database.sqlite_path(&self.service) {
                    Some(path) => path.display().to_string(),
                    None => "memory".to_string(),
                },
            );
        }

        Ok(App {
            service: self.service,
            settings,
            store,
            indexer,
        })
    }
}

/// Boxed line reader over a block source.
pub type BlockReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// Open a block source: `-` is stdin, anything else a file path.
pub async fn open_blocks(source: &str) -> Result<BlockReader, AppError> {
    if source == "-" {
        debug!("reading blocks from stdin");
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    debug!("reading blocks from {source}");
    let file = tokio::fs::File::open(source).await?;
    Ok(Box::new(BufReader::new(file)))
}

/// Read newline-delimited JSON blocks from `reader` and send them to `tx`
/// in order. Blank lines are ignored. Returns the number of blocks sent.
pub async fn feed_blocks<R>(reader: R, tx: mpsc::Sender<Block>) -> Result<u64, AppError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0u64;
    let mut sent = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let block: Block = serde_json::from_str(line).map_err(|source| AppError::InvalidBlock {
            line: line_no,
            source,
        })?;
        debug!(block = block.number, events = block.events.len(), "queued block");
        tx.send(block).await.map_err(|_| AppError::ChannelClosed)?;
        sent += 1;
    }

    Ok(sent)
}
