//! Remote analytics API client
//!
//! Read-only adapter over the HTTP analytics service. Construction only
//! builds the client; `connect` warms a local snapshot (champion table, bulk
//! matchups, bulk synergies) so draft, reverse and delta2 queries are
//! answered without further requests. Until a warm-up succeeds, queries go to
//! the per-champion endpoints and a failing service fails per call. Bulk
//! rows arrive per lane; they are gated and folded here with the same
//! games-weighted rules the embedded store applies in SQL.
//!
//! Endpoints (relative to the configured base URL):
//! - `GET /champions` returns `{ champions: [...], count: N }`
//! - `GET /champions/{id}` returns `{ id, name }`
//! - `GET /champions/{id}/matchups` returns `{ matchups: [...], count: N }`
//! - `GET /matchups/bulk` returns `{ matchups: { "<id>": [...] }, count: N }`
//! - `GET /champions/{id}/synergies` and `GET /synergies/bulk` likewise
//! - `GET /champions/{id}/scores` returns one score object
//! - `GET /champion-scores` returns every score with its champion name
//! - `GET /pools/{pool}/ban-recommendations?limit=N`

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::domain::aggregate::{aggregate_by_opponent, pair_delta2, weighted_winrate, PairStat};
use crate::domain::matchup::NEUTRAL_WINRATE;
use crate::domain::result::{Error, Result};
use crate::domain::{BanRecommendation, ChampionScore, DraftMatchup, Matchup, Synergy};
use crate::ports::{DataSource, PairDeltaMap};
use crate::retry::{retry_transient, RetryPolicy};

const SOURCE_NAME: &str = "remote-api";

// =============================================================================
// API Response Models
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
struct ChampionRow {
    #[serde(deserialize_with = "deserialize_id")]
    id: i64,
    name: String,
}

/// `{ champions: [...], count: N }`
#[derive(Debug, Deserialize)]
struct ChampionsEnvelope {
    champions: Vec<ChampionRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct MatchupRow {
    enemy_name: String,
    winrate: f64,
    #[serde(default)]
    delta1: f64,
    delta2: f64,
    pickrate: f64,
    games: i64,
}

impl MatchupRow {
    fn into_matchup(self, champion: &str) -> Result<Matchup> {
        Matchup {
            champion: champion.to_string(),
            enemy: self.enemy_name,
            winrate: self.winrate,
            delta1: self.delta1,
            delta2: self.delta2,
            pickrate: self.pickrate,
            games: self.games,
        }
        .checked()
    }
}

/// Synergy rows may omit delta1
#[derive(Debug, Clone, Deserialize)]
struct SynergyRow {
    ally_name: String,
    winrate: f64,
    #[serde(default)]
    delta1: f64,
    delta2: f64,
    pickrate: f64,
    games: i64,
}

impl SynergyRow {
    fn into_synergy(self, champion: &str) -> Result<Synergy> {
        Synergy {
            champion: champion.to_string(),
            ally: self.ally_name,
            winrate: self.winrate,
            delta1: self.delta1,
            delta2: self.delta2,
            pickrate: self.pickrate,
            games: self.games,
        }
        .checked()
    }
}

#[derive(Debug, Deserialize)]
struct MatchupsEnvelope {
    matchups: Vec<MatchupRow>,
}

#[derive(Debug, Deserialize)]
struct SynergiesEnvelope {
    synergies: Vec<SynergyRow>,
}

/// `{ matchups: { "<champion id>": [...] }, count: N }`
#[derive(Debug, Deserialize)]
struct BulkMatchupsEnvelope {
    matchups: HashMap<String, Vec<MatchupRow>>,
}

#[derive(Debug, Deserialize)]
struct BulkSynergiesEnvelope {
    synergies: HashMap<String, Vec<SynergyRow>>,
}

#[derive(Debug, Deserialize)]
struct ScoreRow {
    champion_name: String,
    #[serde(flatten)]
    score: ChampionScore,
}

/// Score listings come bare or wrapped depending on the server version
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScoresPayload {
    Wrapped { scores: Vec<ScoreRow> },
    Bare(Vec<ScoreRow>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BansPayload {
    Wrapped {
        recommendations: Vec<BanRecommendation>,
    },
    Bare(Vec<BanRecommendation>),
}

/// Deserialize an id sent either as a number or as a numeric string
fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: JsonValue = Deserialize::deserialize(deserializer)?;
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .ok_or_else(|| D::Error::custom(format!("id {} is not an integer", n))),
        JsonValue::String(s) => s
            .parse()
            .map_err(|_| D::Error::custom(format!("id '{}' is not an integer", s))),
        _ => Err(D::Error::custom("expected number or string for id")),
    }
}

// =============================================================================
// Warm snapshot
// =============================================================================

/// Everything loaded by one warm-up, keyed by lower-cased champion name
#[derive(Debug, Default)]
struct WarmState {
    ids: HashMap<String, i64>,
    names: HashMap<i64, String>,
    matchups: HashMap<String, Vec<Matchup>>,
    synergies: HashMap<String, Vec<Synergy>>,
}

impl WarmState {
    fn rows_for<'a, T>(map: &'a HashMap<String, Vec<T>>, champion: &str) -> &'a [T] {
        map.get(&champion.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Gated rows naming `name` as the enemy, folded per picking champion
    fn reverse_for(&self, name: &str) -> Vec<DraftMatchup> {
        let target = name.to_lowercase();
        let mut pickers: Vec<&str> = self.matchups.keys().map(String::as_str).collect();
        pickers.sort_unstable();

        let rows: Vec<DraftMatchup> = pickers
            .into_iter()
            .flat_map(|picker| self.matchups[picker].iter())
            .filter(|m| m.enemy.to_lowercase() == target)
            .map(|m| DraftMatchup::new(m.champion.clone(), m.delta2, m.pickrate, m.games))
            .collect();
        aggregate_by_opponent(&rows)
    }

    fn bulk<T: PairStat>(map: &HashMap<String, Vec<T>>) -> PairDeltaMap {
        let mut bulk = PairDeltaMap::new();
        for (champion, rows) in map {
            for folded in aggregate_by_opponent(rows) {
                bulk.insert(
                    (champion.clone(), folded.enemy_name.to_lowercase()),
                    folded.delta2,
                );
            }
        }
        bulk
    }
}

// =============================================================================
// Remote API client
// =============================================================================

pub struct RemoteApiSource {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
    warm: RwLock<Option<Arc<WarmState>>>,
}

impl fmt::Debug for RemoteApiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteApiSource")
            .field("base_url", &self.base_url.as_str())
            .field("warmed", &self.snapshot().is_some())
            .finish()
    }
}

impl RemoteApiSource {
    /// Build the client without touching the network
    ///
    /// Only an invalid base URL or client setup fails here; reachability is
    /// checked by `connect` and by each query.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Self::with_options(&config.base_url, config.timeout, config.retry.clone())
    }

    pub fn with_options(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::config(format!("invalid API base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!("API base URL '{}' cannot be a base", base_url)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            retry,
            warm: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Reload the champion table and both bulk endpoints
    pub fn warm_up(&self) -> Result<()> {
        let champions = self.fetch_champions()?;
        let mut state = WarmState::default();
        for champion in champions {
            state.ids.insert(champion.name.to_lowercase(), champion.id);
            state.names.insert(champion.id, champion.name);
        }

        let bulk: BulkMatchupsEnvelope = self
            .get_json(&["matchups", "bulk"], None)?
            .unwrap_or(BulkMatchupsEnvelope {
                matchups: HashMap::new(),
            });
        for (id, rows) in bulk.matchups {
            let Some(name) = Self::resolve_bulk_id(&state.names, &id) else {
                continue;
            };
            let rows = rows
                .into_iter()
                .map(|row| row.into_matchup(&name))
                .collect::<Result<Vec<_>>>()?;
            state.matchups.insert(name.to_lowercase(), rows);
        }

        let bulk: BulkSynergiesEnvelope = self
            .get_json(&["synergies", "bulk"], None)?
            .unwrap_or(BulkSynergiesEnvelope {
                synergies: HashMap::new(),
            });
        for (id, rows) in bulk.synergies {
            let Some(name) = Self::resolve_bulk_id(&state.names, &id) else {
                continue;
            };
            let rows = rows
                .into_iter()
                .map(|row| row.into_synergy(&name))
                .collect::<Result<Vec<_>>>()?;
            state.synergies.insert(name.to_lowercase(), rows);
        }

        info!(
            "{} warmed: {} champions, {} with matchups, {} with synergies",
            SOURCE_NAME,
            state.names.len(),
            state.matchups.len(),
            state.synergies.len()
        );
        *self.warm.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(state));
        Ok(())
    }

    fn resolve_bulk_id(names: &HashMap<i64, String>, id: &str) -> Option<String> {
        let name = id.parse::<i64>().ok().and_then(|id| names.get(&id).cloned());
        if name.is_none() {
            warn!("{}: bulk entry for unknown champion id '{}'", SOURCE_NAME, id);
        }
        name
    }

    fn snapshot(&self) -> Option<Arc<WarmState>> {
        self.warm
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current snapshot, warming first if `close` dropped it
    fn warmed(&self) -> Result<Arc<WarmState>> {
        if let Some(state) = self.snapshot() {
            return Ok(state);
        }
        self.warm_up()?;
        self.snapshot()
            .ok_or_else(|| Error::transient(format!("{} snapshot unavailable", SOURCE_NAME)))
    }

    // -------------------------------------------------------------------------
    // HTTP plumbing
    // -------------------------------------------------------------------------

    fn endpoint(&self, segments: &[&str], query: Option<(&str, String)>) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config(format!("API base URL '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        if let Some((key, value)) = query {
            url.query_pairs_mut().append_pair(key, &value);
        }
        Ok(url)
    }

    /// GET with retries; 404 is `Ok(None)`
    fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: Option<(&str, String)>,
    ) -> Result<Option<T>> {
        let url = self.endpoint(segments, query)?;
        let operation = format!("GET {}", url.path());
        retry_transient(&operation, &self.retry, || self.get_once(&url))
    }

    fn get_once<T: DeserializeOwned>(&self, url: &Url) -> Result<Option<T>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| map_request_error(url, e))?;

        match response.status().as_u16() {
            200..=299 => {}
            404 => {
                debug!("{} returned 404", url.path());
                return Ok(None);
            }
            status @ (502 | 503 | 504) => {
                return Err(Error::transient(format!(
                    "{} returned HTTP {}",
                    url.path(),
                    status
                )))
            }
            status => {
                return Err(Error::http(format!(
                    "{} returned HTTP {}",
                    url.path(),
                    status
                )))
            }
        }

        let body = response.text().map_err(|e| map_request_error(url, e))?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| Error::malformed(format!("unexpected payload from {}: {}", url.path(), e)))
    }

    fn fetch_champions(&self) -> Result<Vec<ChampionRow>> {
        let envelope: Option<ChampionsEnvelope> = self.get_json(&["champions"], None)?;
        Ok(envelope.map(|e| e.champions).unwrap_or_default())
    }

    fn fetch_matchups(&self, name: &str) -> Result<Vec<Matchup>> {
        let Some(id) = self.get_champion_id(name)? else {
            return Ok(Vec::new());
        };
        let id = id.to_string();
        let envelope: Option<MatchupsEnvelope> =
            self.get_json(&["champions", id.as_str(), "matchups"], None)?;
        envelope
            .map(|e| e.matchups)
            .unwrap_or_default()
            .into_iter()
            .map(|row| row.into_matchup(name))
            .collect()
    }

    fn fetch_synergies(&self, name: &str) -> Result<Vec<Synergy>> {
        let Some(id) = self.get_champion_id(name)? else {
            return Ok(Vec::new());
        };
        let id = id.to_string();
        let envelope: Option<SynergiesEnvelope> =
            self.get_json(&["champions", id.as_str(), "synergies"], None)?;
        envelope
            .map(|e| e.synergies)
            .unwrap_or_default()
            .into_iter()
            .map(|row| row.into_synergy(name))
            .collect()
    }
}

fn map_request_error(url: &Url, error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::transient(format!("{} timed out", url.path()))
    } else if error.is_connect() {
        Error::transient(format!("unable to connect to {}", url.origin().ascii_serialization()))
    } else {
        Error::http(format!("request to {} failed: {}", url.path(), error))
    }
}

// =============================================================================
// DataSource implementation
// =============================================================================

impl DataSource for RemoteApiSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn connect(&self) -> Result<()> {
        if self.snapshot().is_none() {
            self.warm_up()?;
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        *self.warm.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    fn get_champion_id(&self, name: &str) -> Result<Option<i64>> {
        let lower = name.to_lowercase();
        if let Some(state) = self.snapshot() {
            return Ok(state.ids.get(&lower).copied());
        }
        Ok(self
            .fetch_champions()?
            .into_iter()
            .find(|c| c.name.to_lowercase() == lower)
            .map(|c| c.id))
    }

    fn get_champion_by_id(&self, id: i64) -> Result<Option<String>> {
        if let Some(state) = self.snapshot() {
            if let Some(name) = state.names.get(&id) {
                return Ok(Some(name.clone()));
            }
        }
        let id = id.to_string();
        let row: Option<ChampionRow> = self.get_json(&["champions", id.as_str()], None)?;
        Ok(row.map(|r| r.name))
    }

    fn get_all_champion_names(&self) -> Result<HashMap<i64, String>> {
        if let Some(state) = self.snapshot() {
            return Ok(state.names.clone());
        }
        Ok(self
            .fetch_champions()?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect())
    }

    fn build_champion_cache(&self) -> Result<HashMap<String, i64>> {
        let mut cache = HashMap::new();
        for (id, name) in self.get_all_champion_names()? {
            cache.insert(name.to_lowercase(), id);
            cache.insert(name, id);
        }
        Ok(cache)
    }

    fn get_champion_matchups(&self, name: &str) -> Result<Vec<Matchup>> {
        match self.snapshot() {
            Some(state) => Ok(WarmState::rows_for(&state.matchups, name).to_vec()),
            None => self.fetch_matchups(name),
        }
    }

    fn get_champion_matchups_for_draft(&self, name: &str) -> Result<Vec<DraftMatchup>> {
        Ok(aggregate_by_opponent(&self.get_champion_matchups(name)?))
    }

    fn get_reverse_matchups_for_draft(&self, name: &str) -> Result<Vec<DraftMatchup>> {
        Ok(self.warmed()?.reverse_for(name))
    }

    fn get_matchup_delta2(&self, champion: &str, enemy: &str) -> Result<Option<f64>> {
        Ok(pair_delta2(&self.get_champion_matchups(champion)?, enemy))
    }

    fn get_all_matchups_bulk(&self) -> Result<PairDeltaMap> {
        Ok(WarmState::bulk(&self.warmed()?.matchups))
    }

    fn get_champion_base_winrate(&self, name: &str) -> Result<f64> {
        let rows = self.get_champion_matchups(name)?;
        Ok(weighted_winrate(&rows).unwrap_or(NEUTRAL_WINRATE))
    }

    fn get_champion_synergies(&self, name: &str) -> Result<Vec<Synergy>> {
        match self.snapshot() {
            Some(state) => Ok(WarmState::rows_for(&state.synergies, name).to_vec()),
            None => self.fetch_synergies(name),
        }
    }

    fn get_synergy_delta2(&self, champion: &str, ally: &str) -> Result<Option<f64>> {
        Ok(pair_delta2(&self.get_champion_synergies(champion)?, ally))
    }

    fn get_all_synergies_bulk(&self) -> Result<PairDeltaMap> {
        Ok(WarmState::bulk(&self.warmed()?.synergies))
    }

    fn get_champion_scores(&self, name: &str) -> Result<Option<ChampionScore>> {
        let Some(id) = self.get_champion_id(name)? else {
            return Ok(None);
        };
        let id = id.to_string();
        self.get_json(&["champions", id.as_str(), "scores"], None)
    }

    fn get_all_champion_scores(&self) -> Result<Vec<(String, ChampionScore)>> {
        let payload: Option<ScoresPayload> = self.get_json(&["champion-scores"], None)?;
        let rows = match payload {
            Some(ScoresPayload::Wrapped { scores }) | Some(ScoresPayload::Bare(scores)) => scores,
            None => Vec::new(),
        };
        Ok(rows.into_iter().map(|r| (r.champion_name, r.score)).collect())
    }

    fn save_champion_scores(&self, _champion_id: i64, _score: &ChampionScore) -> Result<()> {
        Err(Error::read_only(SOURCE_NAME))
    }

    fn save_pool_ban_recommendations(
        &self,
        _pool: &str,
        _entries: &[BanRecommendation],
    ) -> Result<usize> {
        Err(Error::read_only(SOURCE_NAME))
    }

    fn get_pool_ban_recommendations(
        &self,
        pool: &str,
        limit: usize,
    ) -> Result<Vec<BanRecommendation>> {
        let payload: Option<BansPayload> = self.get_json(
            &["pools", pool, "ban-recommendations"],
            Some(("limit", limit.to_string())),
        )?;
        let mut entries = match payload {
            Some(BansPayload::Wrapped { recommendations }) => recommendations,
            Some(BansPayload::Bare(entries)) => entries,
            None => Vec::new(),
        };
        entries.truncate(limit);
        Ok(entries)
    }
}
