//! Champion identity and derived per-champion scores

use serde::{Deserialize, Serialize};

/// A champion row: integer id plus canonical name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Champion {
    pub id: i64,
    pub name: String,
}

impl Champion {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Aggregate scores computed by the tier-list collaborator and persisted here
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChampionScore {
    pub avg_delta2: f64,
    pub variance: f64,
    pub coverage: f64,
    pub peak_impact: f64,
    pub volatility: f64,
    pub target_ratio: f64,
}
