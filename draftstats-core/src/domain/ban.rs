//! Precomputed ban recommendations per champion pool

use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Threat entry for one enemy within a pool; unique per (pool, enemy)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanRecommendation {
    pub enemy_champion: String,
    pub threat_score: f64,
    pub best_response_delta2: f64,
    pub best_response_champion: String,
    pub matchups_count: i64,
}

impl BanRecommendation {
    /// Reject blank names, non-finite scores and negative counts
    pub fn checked(self) -> Result<Self> {
        if self.enemy_champion.trim().is_empty() {
            return Err(Error::malformed("ban recommendation without an enemy champion"));
        }
        let context = format!("ban recommendation vs {}", self.enemy_champion);
        if self.best_response_champion.trim().is_empty() {
            return Err(Error::malformed(format!("{}: no best response champion", context)));
        }
        if !self.threat_score.is_finite() || !self.best_response_delta2.is_finite() {
            return Err(Error::malformed(format!("{}: non-finite score", context)));
        }
        if self.matchups_count < 0 {
            return Err(Error::malformed(format!(
                "{}: negative matchups count {}",
                context, self.matchups_count
            )));
        }
        Ok(self)
    }
}
