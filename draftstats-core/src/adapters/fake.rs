//! Scripted in-memory data source for orchestrator and cache tests
//!
//! Every contract call is counted per operation. A failing source answers
//! every call with a transient error, so fallback paths can be driven
//! without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::domain::aggregate::pair_delta2;
use crate::domain::matchup::NEUTRAL_WINRATE;
use crate::domain::result::{Error, Result};
use crate::domain::{BanRecommendation, ChampionScore, DraftMatchup, Matchup, Synergy};
use crate::ports::{DataSource, PairDeltaMap};

pub struct FakeSource {
    name: String,
    read_only: bool,
    failing: AtomicBool,
    champions: HashMap<i64, String>,
    direct: HashMap<String, Vec<DraftMatchup>>,
    reverse: HashMap<String, Vec<DraftMatchup>>,
    delta2: HashMap<(String, String), f64>,
    calls: Mutex<HashMap<&'static str, usize>>,
    scores: Mutex<HashMap<i64, ChampionScore>>,
    bans: Mutex<HashMap<String, Vec<BanRecommendation>>>,
}

impl FakeSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            read_only: false,
            failing: AtomicBool::new(false),
            champions: HashMap::new(),
            direct: HashMap::new(),
            reverse: HashMap::new(),
            delta2: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
            scores: Mutex::new(HashMap::new()),
            bans: Mutex::new(HashMap::new()),
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_champion(mut self, id: i64, name: &str) -> Self {
        self.champions.insert(id, name.to_string());
        self
    }

    pub fn with_direct(mut self, champion: &str, rows: Vec<DraftMatchup>) -> Self {
        self.direct.insert(champion.to_lowercase(), rows);
        self
    }

    pub fn with_reverse(mut self, champion: &str, rows: Vec<DraftMatchup>) -> Self {
        self.reverse.insert(champion.to_lowercase(), rows);
        self
    }

    pub fn with_delta2(mut self, champion: &str, enemy: &str, value: f64) -> Self {
        self.delta2
            .insert((champion.to_lowercase(), enemy.to_lowercase()), value);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Calls made to one contract operation
    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn saved_scores(&self, champion_id: i64) -> Option<ChampionScore> {
        self.scores.lock().unwrap().get(&champion_id).copied()
    }

    fn record(&self, operation: &'static str) -> Result<()> {
        *self.calls.lock().unwrap().entry(operation).or_insert(0) += 1;
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::transient(format!("{} unavailable", self.name)));
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::read_only(self.name.clone()));
        }
        Ok(())
    }
}

impl DataSource for FakeSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn connect(&self) -> Result<()> {
        self.record("connect")
    }

    fn close(&self) -> Result<()> {
        *self.calls.lock().unwrap().entry("close").or_insert(0) += 1;
        Ok(())
    }

    fn get_champion_id(&self, name: &str) -> Result<Option<i64>> {
        self.record("get_champion_id")?;
        let name = name.to_lowercase();
        Ok(self
            .champions
            .iter()
            .find(|(_, n)| n.to_lowercase() == name)
            .map(|(id, _)| *id))
    }

    fn get_champion_by_id(&self, id: i64) -> Result<Option<String>> {
        self.record("get_champion_by_id")?;
        Ok(self.champions.get(&id).cloned())
    }

    fn get_all_champion_names(&self) -> Result<HashMap<i64, String>> {
        self.record("get_all_champion_names")?;
        Ok(self.champions.clone())
    }

    fn build_champion_cache(&self) -> Result<HashMap<String, i64>> {
        self.record("build_champion_cache")?;
        let mut cache = HashMap::new();
        for (id, name) in &self.champions {
            cache.insert(name.clone(), *id);
            cache.insert(name.to_lowercase(), *id);
        }
        Ok(cache)
    }

    fn get_champion_matchups(&self, name: &str) -> Result<Vec<Matchup>> {
        self.record("get_champion_matchups")?;
        Ok(self
            .direct
            .get(&name.to_lowercase())
            .map(|rows| rows.iter().cloned().map(|r| r.into_matchup(name)).collect())
            .unwrap_or_default())
    }

    fn get_champion_matchups_for_draft(&self, name: &str) -> Result<Vec<DraftMatchup>> {
        self.record("get_champion_matchups_for_draft")?;
        Ok(self.direct.get(&name.to_lowercase()).cloned().unwrap_or_default())
    }

    fn get_reverse_matchups_for_draft(&self, name: &str) -> Result<Vec<DraftMatchup>> {
        self.record("get_reverse_matchups_for_draft")?;
        Ok(self.reverse.get(&name.to_lowercase()).cloned().unwrap_or_default())
    }

    fn get_matchup_delta2(&self, champion: &str, enemy: &str) -> Result<Option<f64>> {
        self.record("get_matchup_delta2")?;
        let key = (champion.to_lowercase(), enemy.to_lowercase());
        if let Some(value) = self.delta2.get(&key) {
            return Ok(Some(*value));
        }
        Ok(self
            .direct
            .get(&key.0)
            .and_then(|rows| pair_delta2(rows, enemy)))
    }

    fn get_all_matchups_bulk(&self) -> Result<PairDeltaMap> {
        self.record("get_all_matchups_bulk")?;
        Ok(self.delta2.clone())
    }

    fn get_champion_base_winrate(&self, _name: &str) -> Result<f64> {
        self.record("get_champion_base_winrate")?;
        Ok(NEUTRAL_WINRATE)
    }

    fn get_champion_synergies(&self, _name: &str) -> Result<Vec<Synergy>> {
        self.record("get_champion_synergies")?;
        Ok(Vec::new())
    }

    fn get_synergy_delta2(&self, _champion: &str, _ally: &str) -> Result<Option<f64>> {
        self.record("get_synergy_delta2")?;
        Ok(None)
    }

    fn get_all_synergies_bulk(&self) -> Result<PairDeltaMap> {
        self.record("get_all_synergies_bulk")?;
        Ok(PairDeltaMap::new())
    }

    fn get_champion_scores(&self, name: &str) -> Result<Option<ChampionScore>> {
        self.record("get_champion_scores")?;
        let name = name.to_lowercase();
        let id = self
            .champions
            .iter()
            .find(|(_, n)| n.to_lowercase() == name)
            .map(|(id, _)| *id);
        Ok(id.and_then(|id| self.scores.lock().unwrap().get(&id).copied()))
    }

    fn get_all_champion_scores(&self) -> Result<Vec<(String, ChampionScore)>> {
        self.record("get_all_champion_scores")?;
        let scores = self.scores.lock().unwrap();
        Ok(scores
            .iter()
            .filter_map(|(id, score)| self.champions.get(id).map(|n| (n.clone(), *score)))
            .collect())
    }

    fn save_champion_scores(&self, champion_id: i64, score: &ChampionScore) -> Result<()> {
        self.record("save_champion_scores")?;
        self.check_writable()?;
        self.scores.lock().unwrap().insert(champion_id, *score);
        Ok(())
    }

    fn save_pool_ban_recommendations(
        &self,
        pool: &str,
        entries: &[BanRecommendation],
    ) -> Result<usize> {
        self.record("save_pool_ban_recommendations")?;
        self.check_writable()?;
        self.bans
            .lock()
            .unwrap()
            .insert(pool.to_string(), entries.to_vec());
        Ok(entries.len())
    }

    fn get_pool_ban_recommendations(
        &self,
        pool: &str,
        limit: usize,
    ) -> Result<Vec<BanRecommendation>> {
        self.record("get_pool_ban_recommendations")?;
        Ok(self
            .bans
            .lock()
            .unwrap()
            .get(pool)
            .map(|entries| entries.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
