//! Folding multi-row pairwise statistics
//!
//! Several rows can describe the same (champion, opponent) pair, one per lane
//! context. They are always combined by a games-weighted average, never a
//! plain mean and never by picking one row.

use super::matchup::{DraftMatchup, Matchup, Synergy};

/// Minimum pickrate (percent) for a row to count towards aggregate scores
pub const MIN_PICKRATE: f64 = 0.5;

/// Minimum sample size for a row to count towards aggregate scores
pub const MIN_GAMES: i64 = 200;

/// Quality gate applied before any aggregate scoring
pub fn passes_quality_gate(pickrate: f64, games: i64) -> bool {
    pickrate >= MIN_PICKRATE && games >= MIN_GAMES
}

/// Common view over the pairwise record shapes
pub trait PairStat {
    fn opponent(&self) -> &str;
    fn delta2(&self) -> f64;
    fn pickrate(&self) -> f64;
    fn games(&self) -> i64;

    /// Draft projections have no measured winrate
    fn winrate(&self) -> f64 {
        super::matchup::NEUTRAL_WINRATE
    }

    fn is_valid(&self) -> bool {
        passes_quality_gate(self.pickrate(), self.games())
    }
}

impl PairStat for Matchup {
    fn opponent(&self) -> &str {
        &self.enemy
    }
    fn delta2(&self) -> f64 {
        self.delta2
    }
    fn pickrate(&self) -> f64 {
        self.pickrate
    }
    fn games(&self) -> i64 {
        self.games
    }
    fn winrate(&self) -> f64 {
        self.winrate
    }
}

impl PairStat for Synergy {
    fn opponent(&self) -> &str {
        &self.ally
    }
    fn delta2(&self) -> f64 {
        self.delta2
    }
    fn pickrate(&self) -> f64 {
        self.pickrate
    }
    fn games(&self) -> i64 {
        self.games
    }
    fn winrate(&self) -> f64 {
        self.winrate
    }
}

impl PairStat for DraftMatchup {
    fn opponent(&self) -> &str {
        &self.enemy_name
    }
    fn delta2(&self) -> f64 {
        self.delta2
    }
    fn pickrate(&self) -> f64 {
        self.pickrate
    }
    fn games(&self) -> i64 {
        self.games
    }
}

fn weighted<'a, T, I, F>(rows: I, value: F) -> Option<f64>
where
    T: PairStat + 'a,
    I: IntoIterator<Item = &'a T>,
    F: Fn(&T) -> f64,
{
    let (weighted_sum, total_games) = rows
        .into_iter()
        .fold((0.0_f64, 0_i64), |(sum, games), row| {
            (sum + value(row) * row.games() as f64, games + row.games())
        });

    if total_games > 0 {
        Some(weighted_sum / total_games as f64)
    } else {
        None
    }
}

/// `Σ(delta2·games) / Σ(games)`, or `None` when there are no games at all
pub fn weighted_delta2<'a, T, I>(rows: I) -> Option<f64>
where
    T: PairStat + 'a,
    I: IntoIterator<Item = &'a T>,
{
    weighted(rows, |row| row.delta2())
}

/// `Σ(winrate·games) / Σ(games)`, or `None` when there are no games at all
pub fn weighted_winrate<'a, T, I>(rows: I) -> Option<f64>
where
    T: PairStat + 'a,
    I: IntoIterator<Item = &'a T>,
{
    weighted(rows, |row| row.winrate())
}

/// Weighted delta2 of the gated rows facing `opponent` (case-insensitive)
pub fn pair_delta2<T: PairStat>(rows: &[T], opponent: &str) -> Option<f64> {
    let opponent = opponent.to_lowercase();
    weighted_delta2(
        rows.iter()
            .filter(|row| row.is_valid() && row.opponent().to_lowercase() == opponent),
    )
}

/// Fold gated rows into one [`DraftMatchup`] per opponent
///
/// delta2 and pickrate are games-weighted, games are summed. Opponents are
/// grouped case-insensitively and keep the spelling and order in which they
/// first appear.
pub fn aggregate_by_opponent<T: PairStat>(rows: &[T]) -> Vec<DraftMatchup> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<&T>> = std::collections::HashMap::new();

    for row in rows.iter().filter(|row| row.is_valid()) {
        let key = row.opponent().to_lowercase();
        if !groups.contains_key(&key) {
            order.push((key.clone(), row.opponent().to_string()));
        }
        groups.entry(key).or_default().push(row);
    }

    order
        .into_iter()
        .filter_map(|(key, opponent)| {
            let group = groups.remove(&key)?;
            let games: i64 = group.iter().map(|row| row.games()).sum();
            let delta2 = weighted(group.iter().copied(), |row| row.delta2())?;
            let pickrate = weighted(group.iter().copied(), |row| row.pickrate())?;
            Some(DraftMatchup::new(opponent, delta2, pickrate, games))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(enemy: &str, delta2: f64, pickrate: f64, games: i64) -> DraftMatchup {
        DraftMatchup::new(enemy, delta2, pickrate, games)
    }

    #[test]
    fn test_weighted_delta2_is_not_plain_mean() {
        let rows = vec![row("Jinx", 220.0, 5.0, 800), row("Jinx", 180.0, 5.0, 400)];
        let value = weighted_delta2(&rows).unwrap();
        assert!((value - 206.666_666).abs() < 1e-3, "got {}", value);
        assert!((value - 200.0).abs() > 1.0);
    }

    #[test]
    fn test_weighted_delta2_two_lanes() {
        // Ahri vs Zed: mid (5.0, 300 games) and top (3.0, 200 games)
        let rows = vec![row("Zed", 5.0, 2.0, 300), row("Zed", 3.0, 1.0, 200)];
        assert!((weighted_delta2(&rows).unwrap() - 4.2).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_delta2_without_games_is_none() {
        let rows = vec![row("Zed", 5.0, 2.0, 0)];
        assert_eq!(weighted_delta2(&rows), None);
        let empty: Vec<DraftMatchup> = Vec::new();
        assert_eq!(weighted_delta2(&empty), None);
    }

    #[test]
    fn test_quality_gate_boundaries() {
        assert!(passes_quality_gate(0.5, 200));
        assert!(!passes_quality_gate(0.49, 5000));
        assert!(!passes_quality_gate(10.0, 199));
    }

    #[test]
    fn test_pair_delta2_ignores_gated_rows_and_case() {
        let rows = vec![
            row("Zed", 10.0, 3.0, 1000),
            row("zed", -50.0, 0.1, 5000),
            row("Yasuo", 99.0, 3.0, 1000),
        ];
        assert_eq!(pair_delta2(&rows, "ZED"), Some(10.0));
        assert_eq!(pair_delta2(&rows, "Ahri"), None);
    }

    #[test]
    fn test_aggregate_by_opponent_folds_lanes() {
        let rows = vec![
            row("Zed", 5.0, 2.0, 300),
            row("Yasuo", 1.0, 4.0, 500),
            row("Zed", 3.0, 1.0, 200),
            row("Talon", 9.0, 0.2, 900),
        ];
        let folded = aggregate_by_opponent(&rows);

        assert_eq!(folded.len(), 2);
        assert_eq!(folded[0].enemy_name, "Zed");
        assert!((folded[0].delta2 - 4.2).abs() < 1e-9);
        assert!((folded[0].pickrate - 1.6).abs() < 1e-9);
        assert_eq!(folded[0].games, 500);
        assert_eq!(folded[1].enemy_name, "Yasuo");
    }

    #[test]
    fn test_aggregate_by_opponent_ignores_case() {
        let rows = vec![
            row("Zed", 4.0, 2.0, 300),
            row("Ahri", 1.0, 1.0, 500),
            row("zed", 1.0, 2.0, 300),
        ];
        let folded = aggregate_by_opponent(&rows);
        assert_eq!(folded.len(), 2);
        assert_eq!(folded[0].enemy_name, "Zed");
        assert_eq!(folded[0].games, 600);
        assert!((folded[0].delta2 - 2.5).abs() < 1e-9);
        assert_eq!(folded[1].enemy_name, "Ahri");
    }

    #[test]
    fn test_weighted_winrate_uses_measured_winrate() {
        let rows = vec![
            Matchup {
                champion: "Ahri".into(),
                enemy: "Zed".into(),
                winrate: 54.0,
                delta1: 0.0,
                delta2: 0.0,
                pickrate: 3.0,
                games: 300,
            },
            Matchup {
                champion: "Ahri".into(),
                enemy: "Lux".into(),
                winrate: 48.0,
                delta1: 0.0,
                delta2: 0.0,
                pickrate: 3.0,
                games: 100,
            },
        ];
        assert!((weighted_winrate(&rows).unwrap() - 52.5).abs() < 1e-9);
    }
}
