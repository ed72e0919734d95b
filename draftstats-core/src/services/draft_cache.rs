//! Draft cache - bidirectional delta2 lookups for a draft session
//!
//! Warming loads each champion's direct and reverse draft lists once. A
//! lookup for (A, B) then checks A's direct list first and falls back to
//! B's reverse list, negating the value: matchups are treated as zero-sum,
//! so B's delta2 against A answers A against B without another query.
//!
//! Maps are built off to the side and published with a single swap, so
//! readers never observe a half-warmed cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::result::Result;
use crate::domain::{DraftMatchup, Matchup};
use crate::ports::DataSource;

/// Direct and reverse draft lists keyed by lower-cased champion name
#[derive(Default)]
struct CacheMaps {
    direct: HashMap<String, Vec<DraftMatchup>>,
    reverse: HashMap<String, Vec<DraftMatchup>>,
}

impl CacheMaps {
    fn find(lists: &HashMap<String, Vec<DraftMatchup>>, owner: &str, other: &str) -> Option<f64> {
        let other = other.to_lowercase();
        lists
            .get(&owner.to_lowercase())?
            .iter()
            .find(|m| m.enemy_name.to_lowercase() == other)
            .map(|m| m.delta2)
    }
}

/// Outcome of one warm pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct WarmReport {
    pub requested: usize,
    pub direct_loaded: usize,
    pub reverse_loaded: usize,
    /// (champion, error) for every query that failed
    pub failures: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub warmed: bool,
    pub hits: u64,
    pub misses: u64,
    pub direct_entries: usize,
    pub reverse_entries: usize,
}

impl CacheStats {
    /// Percentage of lookups answered from memory
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }
}

pub struct DraftCache {
    source: Arc<dyn DataSource>,
    maps: ArcSwap<CacheMaps>,
    warmed: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DraftCache {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            maps: ArcSwap::from_pointee(CacheMaps::default()),
            warmed: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Load direct and reverse draft lists for every champion
    ///
    /// Empty results are not stored. A failed query is logged and recorded
    /// in the report; the remaining champions are still loaded. The cache
    /// counts as warmed afterwards even if nothing was found, unless no
    /// champions were requested at all.
    pub fn warm_cache<S: AsRef<str>>(&self, champions: &[S]) -> WarmReport {
        if champions.is_empty() {
            debug!("no champions to warm, draft cache left as is");
            return WarmReport::default();
        }

        let mut maps = CacheMaps::default();
        let mut report = WarmReport {
            requested: champions.len(),
            ..WarmReport::default()
        };

        for champion in champions {
            let champion = champion.as_ref();
            let key = champion.to_lowercase();

            match self.source.get_champion_matchups_for_draft(champion) {
                Ok(rows) if !rows.is_empty() => {
                    maps.direct.insert(key.clone(), rows);
                    report.direct_loaded += 1;
                }
                Ok(_) => debug!("no draft matchups for {}", champion),
                Err(err) => {
                    warn!("failed to warm direct matchups for {}: {}", champion, err);
                    report.failures.push((champion.to_string(), err.to_string()));
                }
            }

            match self.source.get_reverse_matchups_for_draft(champion) {
                Ok(rows) if !rows.is_empty() => {
                    maps.reverse.insert(key, rows);
                    report.reverse_loaded += 1;
                }
                Ok(_) => debug!("no reverse matchups for {}", champion),
                Err(err) => {
                    warn!("failed to warm reverse matchups for {}: {}", champion, err);
                    report.failures.push((champion.to_string(), err.to_string()));
                }
            }
        }

        self.maps.store(Arc::new(maps));
        self.warmed.store(true, Ordering::Release);
        info!(
            "draft cache warmed: {}/{} direct, {}/{} reverse",
            report.direct_loaded, report.requested, report.reverse_loaded, report.requested
        );
        report
    }

    /// delta2 of `champion` against `enemy`
    ///
    /// 1. Not warmed: live query, counted as a miss
    /// 2. `champion`'s direct list names `enemy`: stored value, hit
    /// 3. `enemy`'s reverse list names `champion`: negated value, hit
    /// 4. Otherwise: live query, miss
    pub fn get_cached_delta2(&self, champion: &str, enemy: &str) -> Result<Option<f64>> {
        if self.warmed.load(Ordering::Acquire) {
            let maps = self.maps.load();
            if let Some(delta2) = CacheMaps::find(&maps.direct, champion, enemy) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(delta2));
            }
            if let Some(delta2) = CacheMaps::find(&maps.reverse, enemy, champion) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(-delta2));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.source.get_matchup_delta2(champion, enemy)
    }

    /// Draft list of `champion`, from memory when it was warmed
    pub fn get_cached_matchups(&self, champion: &str) -> Result<Vec<DraftMatchup>> {
        if self.warmed.load(Ordering::Acquire) {
            if let Some(rows) = self.maps.load().direct.get(&champion.to_lowercase()) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(rows.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.source.get_champion_matchups_for_draft(champion)
    }

    /// Same lookup as [`Self::get_cached_matchups`], widened to full
    /// matchup records with a neutral winrate and zero delta1
    pub fn get_matchups_for_draft(&self, champion: &str) -> Result<Vec<Matchup>> {
        Ok(self
            .get_cached_matchups(champion)?
            .into_iter()
            .map(|row| row.into_matchup(champion))
            .collect())
    }

    pub fn is_warmed(&self) -> bool {
        self.warmed.load(Ordering::Acquire)
    }

    /// Drop both maps, unset the warmed flag and reset counters
    pub fn clear_cache(&self) {
        let stats = self.stats();
        if stats.hits + stats.misses > 0 {
            debug!(
                "clearing draft cache: {} hits, {} misses ({:.1}% hit rate)",
                stats.hits,
                stats.misses,
                stats.hit_rate()
            );
        }
        self.warmed.store(false, Ordering::Release);
        self.maps.store(Arc::new(CacheMaps::default()));
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let maps = self.maps.load();
        CacheStats {
            warmed: self.is_warmed(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            direct_entries: maps.direct.len(),
            reverse_entries: maps.reverse.len(),
        }
    }
}
