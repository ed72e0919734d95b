//! Domain records shared by every backend
//!
//! All records are immutable values built from query results.

pub mod aggregate;
pub mod ban;
pub mod champion;
pub mod matchup;
pub mod result;

pub use ban::BanRecommendation;
pub use champion::{Champion, ChampionScore};
pub use matchup::{DraftMatchup, Matchup, Synergy};
