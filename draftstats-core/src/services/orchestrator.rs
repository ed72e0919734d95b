//! Fallback orchestrator - composes a primary and a secondary data source
//!
//! | Mode           | Holds                 | Reads                                   |
//! |----------------|-----------------------|-----------------------------------------|
//! | primary-only   | primary               | primary errors propagate                |
//! | secondary-only | embedded store        | local only                              |
//! | hybrid         | primary and embedded  | primary, then embedded on any error     |
//!
//! Writes always target the secondary (embedded) store. The orchestrator
//! implements [`DataSource`] itself, so consumers cannot tell it apart from
//! a single backend.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::adapters::duckdb::DuckDbStore;
use crate::adapters::postgres::PostgresSource;
use crate::adapters::remote::RemoteApiSource;
use crate::config::{Config, DataSourceMode, PrimaryBackend};
use crate::domain::result::{Error, Result};
use crate::domain::{BanRecommendation, ChampionScore, DraftMatchup, Matchup, Synergy};
use crate::ports::{DataSource, PairDeltaMap};

/// Which backends an orchestrator holds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendSummary {
    pub mode: String,
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub fallback_enabled: bool,
}

pub struct FallbackDataSource {
    mode: DataSourceMode,
    primary: Option<Arc<dyn DataSource>>,
    secondary: Option<Arc<dyn DataSource>>,
}

impl FallbackDataSource {
    /// Compose the given adapters under `mode`
    ///
    /// Adapters the mode does not use are dropped: primary-only never falls
    /// back and secondary-only never touches the network.
    pub fn new(
        mode: DataSourceMode,
        primary: Option<Arc<dyn DataSource>>,
        secondary: Option<Arc<dyn DataSource>>,
    ) -> Result<Self> {
        let (primary, secondary) = match mode {
            DataSourceMode::PrimaryOnly => {
                if primary.is_none() {
                    return Err(Error::config(
                        "primary-only mode requires an enabled primary backend",
                    ));
                }
                (primary, None)
            }
            DataSourceMode::SecondaryOnly => {
                if secondary.is_none() {
                    return Err(Error::config(
                        "secondary-only mode requires an embedded store",
                    ));
                }
                (None, secondary)
            }
            DataSourceMode::Hybrid => {
                if primary.is_none() && secondary.is_none() {
                    return Err(Error::config("hybrid mode requires at least one backend"));
                }
                (primary, secondary)
            }
        };

        Ok(Self {
            mode,
            primary,
            secondary,
        })
    }

    /// Build adapters from configuration and connect them
    ///
    /// With the API feature flag off no primary is built. A primary that
    /// cannot be reached is kept in hybrid mode (every read still tries it
    /// first and falls back per call); in primary-only mode the failure is
    /// returned. Only a primary whose configuration is invalid is skipped.
    pub fn from_config(config: &Config, data_dir: &Path) -> Result<Self> {
        let wants_primary = config.mode != DataSourceMode::SecondaryOnly;
        let wants_secondary = config.mode != DataSourceMode::PrimaryOnly;

        let primary = if !wants_primary {
            None
        } else if !config.api_enabled {
            info!("primary backend disabled by configuration");
            None
        } else {
            match Self::build_primary(config) {
                Ok(source) => Some(source),
                Err(err) if config.mode == DataSourceMode::Hybrid => {
                    warn!(
                        "{} backend misconfigured, continuing with the embedded store: {}",
                        config.primary, err
                    );
                    None
                }
                Err(err) => return Err(err),
            }
        };

        let secondary = if wants_secondary {
            let store = DuckDbStore::open(&config.database_path(data_dir))?;
            Some(Arc::new(store) as Arc<dyn DataSource>)
        } else {
            None
        };

        let source = Self::new(config.mode, primary, secondary)?;
        source.connect()?;
        Ok(source)
    }

    fn build_primary(config: &Config) -> Result<Arc<dyn DataSource>> {
        let source = match config.primary {
            PrimaryBackend::Remote => {
                Arc::new(RemoteApiSource::new(&config.api)?) as Arc<dyn DataSource>
            }
            PrimaryBackend::Distributed => {
                Arc::new(PostgresSource::new(&config.distributed)?) as Arc<dyn DataSource>
            }
        };
        Ok(source)
    }

    pub fn mode(&self) -> DataSourceMode {
        self.mode
    }

    pub fn describe(&self) -> BackendSummary {
        BackendSummary {
            mode: self.mode.to_string(),
            primary: self.primary.as_ref().map(|s| s.name().to_string()),
            secondary: self.secondary.as_ref().map(|s| s.name().to_string()),
            fallback_enabled: self.primary.is_some() && self.secondary.is_some(),
        }
    }

    /// Primary first; with a secondary held, any primary error is logged and
    /// the same call is made on the secondary, whose result is final
    fn read<T>(&self, operation: &str, call: impl Fn(&dyn DataSource) -> Result<T>) -> Result<T> {
        match (&self.primary, &self.secondary) {
            (Some(primary), Some(secondary)) => match call(primary.as_ref()) {
                Ok(value) => Ok(value),
                Err(err) => {
                    warn!(
                        "{} failed on {}: {}. Falling back to {}",
                        operation,
                        primary.name(),
                        err,
                        secondary.name()
                    );
                    call(secondary.as_ref())
                }
            },
            (Some(only), None) | (None, Some(only)) => call(only.as_ref()),
            (None, None) => Err(Error::config("no data source configured")),
        }
    }

    fn write<T>(&self, operation: &str, call: impl FnOnce(&dyn DataSource) -> Result<T>) -> Result<T> {
        match &self.secondary {
            Some(store) => call(store.as_ref()),
            None => Err(Error::no_local_store(operation)),
        }
    }
}

impl DataSource for FallbackDataSource {
    fn name(&self) -> &str {
        "fallback"
    }

    fn is_read_only(&self) -> bool {
        self.secondary.as_ref().map_or(true, |s| s.is_read_only())
    }

    // === Lifecycle ===

    fn connect(&self) -> Result<()> {
        if let Some(primary) = &self.primary {
            if let Err(err) = primary.connect() {
                match &self.secondary {
                    Some(secondary) => warn!(
                        "connect failed on {}: {}. Continuing with {}",
                        primary.name(),
                        err,
                        secondary.name()
                    ),
                    None => return Err(err),
                }
            }
        }
        if let Some(secondary) = &self.secondary {
            secondary.connect()?;
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let primary = self.primary.as_ref().map_or(Ok(()), |s| s.close());
        let secondary = self.secondary.as_ref().map_or(Ok(()), |s| s.close());
        primary.and(secondary)
    }

    // === Champions ===

    fn get_champion_id(&self, name: &str) -> Result<Option<i64>> {
        self.read("get_champion_id", |s| s.get_champion_id(name))
    }

    fn get_champion_by_id(&self, id: i64) -> Result<Option<String>> {
        self.read("get_champion_by_id", |s| s.get_champion_by_id(id))
    }

    fn get_all_champion_names(&self) -> Result<HashMap<i64, String>> {
        self.read("get_all_champion_names", |s| s.get_all_champion_names())
    }

    fn build_champion_cache(&self) -> Result<HashMap<String, i64>> {
        self.read("build_champion_cache", |s| s.build_champion_cache())
    }

    // === Matchups ===

    fn get_champion_matchups(&self, name: &str) -> Result<Vec<Matchup>> {
        self.read("get_champion_matchups", |s| s.get_champion_matchups(name))
    }

    fn get_champion_matchups_for_draft(&self, name: &str) -> Result<Vec<DraftMatchup>> {
        self.read("get_champion_matchups_for_draft", |s| {
            s.get_champion_matchups_for_draft(name)
        })
    }

    fn get_reverse_matchups_for_draft(&self, name: &str) -> Result<Vec<DraftMatchup>> {
        self.read("get_reverse_matchups_for_draft", |s| {
            s.get_reverse_matchups_for_draft(name)
        })
    }

    fn get_matchup_delta2(&self, champion: &str, enemy: &str) -> Result<Option<f64>> {
        self.read("get_matchup_delta2", |s| s.get_matchup_delta2(champion, enemy))
    }

    fn get_all_matchups_bulk(&self) -> Result<PairDeltaMap> {
        self.read("get_all_matchups_bulk", |s| s.get_all_matchups_bulk())
    }

    fn get_champion_base_winrate(&self, name: &str) -> Result<f64> {
        self.read("get_champion_base_winrate", |s| s.get_champion_base_winrate(name))
    }

    // === Synergies ===

    fn get_champion_synergies(&self, name: &str) -> Result<Vec<Synergy>> {
        self.read("get_champion_synergies", |s| s.get_champion_synergies(name))
    }

    fn get_synergy_delta2(&self, champion: &str, ally: &str) -> Result<Option<f64>> {
        self.read("get_synergy_delta2", |s| s.get_synergy_delta2(champion, ally))
    }

    fn get_all_synergies_bulk(&self) -> Result<PairDeltaMap> {
        self.read("get_all_synergies_bulk", |s| s.get_all_synergies_bulk())
    }

    // === Champion scores ===

    fn get_champion_scores(&self, name: &str) -> Result<Option<ChampionScore>> {
        self.read("get_champion_scores", |s| s.get_champion_scores(name))
    }

    fn get_all_champion_scores(&self) -> Result<Vec<(String, ChampionScore)>> {
        self.read("get_all_champion_scores", |s| s.get_all_champion_scores())
    }

    fn champion_scores_available(&self) -> Result<bool> {
        self.read("champion_scores_available", |s| s.champion_scores_available())
    }

    fn save_champion_scores(&self, champion_id: i64, score: &ChampionScore) -> Result<()> {
        self.write("save_champion_scores", |s| {
            s.save_champion_scores(champion_id, score)
        })
    }

    // === Ban recommendations ===

    fn save_pool_ban_recommendations(
        &self,
        pool: &str,
        entries: &[BanRecommendation],
    ) -> Result<usize> {
        self.write("save_pool_ban_recommendations", |s| {
            s.save_pool_ban_recommendations(pool, entries)
        })
    }

    fn get_pool_ban_recommendations(
        &self,
        pool: &str,
        limit: usize,
    ) -> Result<Vec<BanRecommendation>> {
        self.read("get_pool_ban_recommendations", |s| {
            s.get_pool_ban_recommendations(pool, limit)
        })
    }

    fn pool_has_ban_recommendations(&self, pool: &str) -> Result<bool> {
        self.read("pool_has_ban_recommendations", |s| {
            s.pool_has_ban_recommendations(pool)
        })
    }
}
