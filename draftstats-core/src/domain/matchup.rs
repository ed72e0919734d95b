//! Pairwise performance records
//!
//! A [`Matchup`] measures a champion against an enemy, a [`Synergy`] measures
//! it alongside an ally. Neither pair is unique: one row exists per lane
//! context, so consumers must fold rows through [`crate::domain::aggregate`].

use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Winrate assumed for draft projections, which carry no winrate of their own
pub const NEUTRAL_WINRATE: f64 = 50.0;

/// Reject rows whose statistics are outside their documented ranges
fn validate_stats(context: &str, winrate: f64, pickrate: f64, games: i64) -> Result<()> {
    if !(0.0..=100.0).contains(&winrate) {
        return Err(Error::malformed(format!(
            "{}: winrate {} outside 0..=100",
            context, winrate
        )));
    }
    if !(0.0..=100.0).contains(&pickrate) {
        return Err(Error::malformed(format!(
            "{}: pickrate {} outside 0..=100",
            context, pickrate
        )));
    }
    if games < 0 {
        return Err(Error::malformed(format!("{}: negative games {}", context, games)));
    }
    Ok(())
}

/// One champion's measured performance against one enemy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    pub champion: String,
    pub enemy: String,
    pub winrate: f64,
    pub delta1: f64,
    pub delta2: f64,
    pub pickrate: f64,
    pub games: i64,
}

impl Matchup {
    /// Validate ranges, returning the record unchanged when they hold
    pub fn checked(self) -> Result<Self> {
        let context = format!("matchup {} vs {}", self.champion, self.enemy);
        validate_stats(&context, self.winrate, self.pickrate, self.games)?;
        Ok(self)
    }

    /// Narrow projection used by the draft cache
    pub fn to_draft(&self) -> DraftMatchup {
        DraftMatchup {
            enemy_name: self.enemy.clone(),
            delta2: self.delta2,
            pickrate: self.pickrate,
            games: self.games,
        }
    }
}

/// One champion's measured performance alongside one ally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synergy {
    pub champion: String,
    pub ally: String,
    pub winrate: f64,
    pub delta1: f64,
    pub delta2: f64,
    pub pickrate: f64,
    pub games: i64,
}

impl Synergy {
    pub fn checked(self) -> Result<Self> {
        let context = format!("synergy {} with {}", self.champion, self.ally);
        validate_stats(&context, self.winrate, self.pickrate, self.games)?;
        Ok(self)
    }
}

/// Draft-path projection: (opponent, delta2, pickrate, games)
///
/// In direct lists `enemy_name` is the opponent faced. In reverse lists it
/// holds the picking champion instead, the one whose matchup is against the
/// queried champion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftMatchup {
    pub enemy_name: String,
    pub delta2: f64,
    pub pickrate: f64,
    pub games: i64,
}

impl DraftMatchup {
    pub fn new(enemy_name: impl Into<String>, delta2: f64, pickrate: f64, games: i64) -> Self {
        Self {
            enemy_name: enemy_name.into(),
            delta2,
            pickrate,
            games,
        }
    }

    pub fn checked(self) -> Result<Self> {
        let context = format!("draft matchup vs {}", self.enemy_name);
        validate_stats(&context, NEUTRAL_WINRATE, self.pickrate, self.games)?;
        Ok(self)
    }

    /// Widen to a full [`Matchup`] with neutral winrate and zero delta1
    pub fn into_matchup(self, champion: impl Into<String>) -> Matchup {
        Matchup {
            champion: champion.into(),
            enemy: self.enemy_name,
            winrate: NEUTRAL_WINRATE,
            delta1: 0.0,
            delta2: self.delta2,
            pickrate: self.pickrate,
            games: self.games,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matchup(winrate: f64, pickrate: f64, games: i64) -> Matchup {
        Matchup {
            champion: "Ahri".to_string(),
            enemy: "Zed".to_string(),
            winrate,
            delta1: 1.0,
            delta2: 2.5,
            pickrate,
            games,
        }
    }

    #[test]
    fn test_valid_matchup_passes_through() {
        let m = matchup(51.2, 4.0, 1200).checked().unwrap();
        assert_eq!(m.games, 1200);
    }

    #[test]
    fn test_winrate_out_of_range_is_malformed() {
        let err = matchup(101.0, 4.0, 1200).checked().unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));
        assert!(err.to_string().contains("Ahri vs Zed"));
    }

    #[test]
    fn test_negative_games_is_malformed() {
        assert!(matchup(50.0, 4.0, -1).checked().is_err());
    }

    #[test]
    fn test_pickrate_out_of_range_is_malformed() {
        let err = DraftMatchup::new("Zed", 1.0, -0.1, 300).checked().unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));
    }

    #[test]
    fn test_draft_widens_with_neutral_defaults() {
        let full = DraftMatchup::new("Zed", -3.5, 6.1, 900).into_matchup("Ahri");
        assert_eq!(full.champion, "Ahri");
        assert_eq!(full.enemy, "Zed");
        assert_eq!(full.winrate, 50.0);
        assert_eq!(full.delta1, 0.0);
        assert_eq!(full.delta2, -3.5);
        assert_eq!(full.games, 900);
    }

    #[test]
    fn test_synergy_validation_names_pair() {
        let err = Synergy {
            champion: "Yuumi".to_string(),
            ally: "Ezreal".to_string(),
            winrate: 50.0,
            delta1: 0.0,
            delta2: 0.0,
            pickrate: 150.0,
            games: 10,
        }
        .checked()
        .unwrap_err();
        assert!(err.to_string().contains("Yuumi with Ezreal"));
    }
}
