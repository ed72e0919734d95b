//! Draftstats Core - matchup statistics behind interchangeable backends
//!
//! This crate follows hexagonal architecture:
//!
//! - **domain**: Record types, aggregation rules and the error taxonomy
//! - **ports**: The DataSource contract every backend implements
//! - **adapters**: DuckDB (embedded), HTTP API (remote), PostgreSQL (distributed)
//! - **services**: Fallback orchestration, the draft cache and status reporting

pub mod adapters;
pub mod config;
pub mod domain;
pub mod migrations;
pub mod ports;
pub mod retry;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use config::Config;
use services::{DraftCache, FallbackDataSource, StatusService};

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{BanRecommendation, Champion, ChampionScore, DraftMatchup, Matchup, Synergy};
pub use ports::{DataSource, PairDeltaMap};

/// Main context for draftstats operations
///
/// Reads configuration once, builds the orchestrator for the configured
/// mode, and puts a draft cache in front of it.
pub struct DraftStatsContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub source: Arc<FallbackDataSource>,
    pub cache: DraftCache,
    pub status_service: StatusService,
}

impl DraftStatsContext {
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        Self::with_config(data_dir, config)
    }

    pub fn with_config(data_dir: &Path, config: Config) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let source = Arc::new(
            FallbackDataSource::from_config(&config, data_dir)
                .context("Failed to initialize data sources")?,
        );
        let cache = DraftCache::new(source.clone() as Arc<dyn DataSource>);
        let status_service = StatusService::new(Arc::clone(&source));

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            source,
            cache,
            status_service,
        })
    }
}
