//! Data source port
//!
//! The one contract shared by every storage backend and by the fallback
//! orchestrator, so consumers never need to know which backend answered.

use std::collections::HashMap;

use crate::domain::result::Result;
use crate::domain::{BanRecommendation, ChampionScore, DraftMatchup, Matchup, Synergy};

/// Bulk delta2 map keyed by lower-cased (champion, opponent) names
pub type PairDeltaMap = HashMap<(String, String), f64>;

/// Statistical data source
///
/// Lookups that find nothing return `None`, an empty collection or a neutral
/// default. `Err` is reserved for infrastructure failures and for writes a
/// backend cannot accept.
pub trait DataSource: Send + Sync {
    /// Backend name used in logs and status output
    fn name(&self) -> &str;

    /// Whether every write on this source fails with `Error::ReadOnly`
    fn is_read_only(&self) -> bool;

    // === Lifecycle ===

    /// Open connections and load warm caches. Idempotent.
    fn connect(&self) -> Result<()>;

    /// Release connections. Calling it twice is not an error.
    fn close(&self) -> Result<()>;

    // === Champions ===

    /// Case-insensitive name lookup
    fn get_champion_id(&self, name: &str) -> Result<Option<i64>>;

    fn get_champion_by_id(&self, id: i64) -> Result<Option<String>>;

    fn get_all_champion_names(&self) -> Result<HashMap<i64, String>>;

    /// Name to id, with a lower-cased alias for every canonical name
    fn build_champion_cache(&self) -> Result<HashMap<String, i64>>;

    // === Matchups ===

    /// Every stored row with `name` as the picking champion, unfiltered
    fn get_champion_matchups(&self, name: &str) -> Result<Vec<Matchup>>;

    /// Gated and folded to one entry per enemy
    fn get_champion_matchups_for_draft(&self, name: &str) -> Result<Vec<DraftMatchup>>;

    /// Gated rows where `name` is the enemy, one entry per picking champion
    fn get_reverse_matchups_for_draft(&self, name: &str) -> Result<Vec<DraftMatchup>>;

    /// Weighted delta2 of the gated rows for one pair
    fn get_matchup_delta2(&self, champion: &str, enemy: &str) -> Result<Option<f64>>;

    fn get_all_matchups_bulk(&self) -> Result<PairDeltaMap>;

    /// Games-weighted winrate across all rows, 50.0 without data
    fn get_champion_base_winrate(&self, name: &str) -> Result<f64>;

    // === Synergies ===

    fn get_champion_synergies(&self, name: &str) -> Result<Vec<Synergy>>;

    fn get_synergy_delta2(&self, champion: &str, ally: &str) -> Result<Option<f64>>;

    fn get_all_synergies_bulk(&self) -> Result<PairDeltaMap>;

    // === Champion scores ===

    fn get_champion_scores(&self, name: &str) -> Result<Option<ChampionScore>>;

    /// (champion name, scores) for every scored champion
    fn get_all_champion_scores(&self) -> Result<Vec<(String, ChampionScore)>>;

    fn champion_scores_available(&self) -> Result<bool> {
        Ok(!self.get_all_champion_scores()?.is_empty())
    }

    /// Insert or replace the scores for one champion
    fn save_champion_scores(&self, champion_id: i64, score: &ChampionScore) -> Result<()>;

    // === Ban recommendations ===

    /// Replace every entry of `pool`, returning how many were written
    fn save_pool_ban_recommendations(
        &self,
        pool: &str,
        entries: &[BanRecommendation],
    ) -> Result<usize>;

    /// Highest threat first
    fn get_pool_ban_recommendations(&self, pool: &str, limit: usize)
        -> Result<Vec<BanRecommendation>>;

    fn pool_has_ban_recommendations(&self, pool: &str) -> Result<bool> {
        Ok(!self.get_pool_ban_recommendations(pool, 1)?.is_empty())
    }
}
