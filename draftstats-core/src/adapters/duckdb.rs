//! Embedded store backed by a local DuckDB file
//!
//! The only backend that accepts writes. Draft, delta2 and bulk queries fold
//! multi-lane rows in SQL with a games-weighted average over rows that pass
//! the quality gate; `get_champion_matchups` returns raw rows.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use duckdb::types::FromSql;
use duckdb::{params, Connection, Params};
use tracing::{debug, warn};

use crate::domain::aggregate::{MIN_GAMES, MIN_PICKRATE};
use crate::domain::matchup::NEUTRAL_WINRATE;
use crate::domain::result::{Error, Result};
use crate::domain::{BanRecommendation, Champion, ChampionScore, DraftMatchup, Matchup, Synergy};
use crate::ports::{DataSource, PairDeltaMap};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of attempts when the database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock on file")
}

/// Pair table selector shared by the matchup and synergy queries
#[derive(Clone, Copy)]
enum PairTable {
    Matchups,
    Synergies,
}

impl PairTable {
    fn table(self) -> &'static str {
        match self {
            Self::Matchups => "matchups",
            Self::Synergies => "synergies",
        }
    }

    fn other_column(self) -> &'static str {
        match self {
            Self::Matchups => "enemy_id",
            Self::Synergies => "ally_id",
        }
    }

    /// FROM clause joining picker `c` and opponent `o`
    fn from_clause(self) -> String {
        format!(
            "FROM {table} p
             JOIN champions c ON c.id = p.champion_id
             JOIN champions o ON o.id = p.{other}",
            table = self.table(),
            other = self.other_column()
        )
    }
}

/// Raw statistic columns of one pair row
type StatRow = (String, String, f64, f64, f64, f64, i64);

/// DuckDB-backed embedded store
pub struct DuckDbStore {
    conn: Mutex<Option<Connection>>,
    /// `None` for an in-memory store
    db_path: Option<PathBuf>,
}

impl DuckDbStore {
    /// Open (or create) the store at `db_path` and apply pending migrations
    ///
    /// Opening retries with exponential backoff on file locking errors, which
    /// happen when another process holds the file briefly.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Self::open_with_retry(Some(db_path))?;
        let store = Self {
            conn: Mutex::new(Some(conn)),
            db_path: Some(db_path.to_path_buf()),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Fresh in-memory store with the full schema
    pub fn open_in_memory() -> Result<Self> {
        let conn = Self::try_open_connection(None)?;
        let store = Self {
            conn: Mutex::new(Some(conn)),
            db_path: None,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn open_with_retry(db_path: Option<&Path>) -> Result<Connection> {
        let mut attempt = 0;
        loop {
            match Self::try_open_connection(db_path) {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    let err_msg = e.to_string();
                    attempt += 1;
                    if !is_retryable_error(&err_msg) || attempt >= MAX_RETRIES {
                        return Err(e);
                    }
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt - 1));
                    warn!(
                        "Embedded store busy, retrying in {}ms (attempt {}/{}): {}",
                        delay.as_millis(),
                        attempt,
                        MAX_RETRIES,
                        err_msg
                    );
                    thread::sleep(delay);
                }
            }
        }
    }

    fn try_open_connection(db_path: Option<&Path>) -> Result<Connection> {
        // Extension autoloading stays off: nothing here needs more than core SQL
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = match db_path {
            Some(path) => Connection::open_with_flags(path, config)?,
            None => Connection::open_in_memory_with_flags(config)?,
        };
        Ok(conn)
    }

    /// Apply pending migrations
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        self.with_conn(|conn| MigrationService::new(conn).run_pending())
    }

    pub fn ensure_schema(&self) -> Result<()> {
        let result = self.run_migrations()?;
        if !result.applied.is_empty() {
            debug!("applied migrations: {:?}", result.applied);
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| Error::database("embedded store connection lock poisoned"))
    }

    /// Run `f` on the open connection, reopening it if the store was closed
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        if guard.is_none() {
            let conn = Self::open_with_retry(self.db_path.as_deref())?;
            if self.db_path.is_none() {
                MigrationService::new(&conn).run_pending()?;
            }
            *guard = Some(conn);
        }
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(Error::database("embedded store is not open")),
        }
    }

    // === Collector-facing writes ===

    /// Insert champions or rename existing ids; returns rows touched
    ///
    /// Names are unique regardless of case: a champion whose name already
    /// belongs to another id rejects the whole batch.
    pub fn upsert_champions(&self, champions: &[Champion]) -> Result<usize> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let mut touched = 0;
            for champion in champions {
                let clash: Option<i64> = first_value(
                    &tx,
                    "SELECT id FROM champions WHERE lower(name) = lower(?) AND id <> ?
                     ORDER BY id LIMIT 1",
                    params![champion.name, champion.id],
                )?;
                if let Some(other) = clash {
                    return Err(Error::malformed(format!(
                        "champion name '{}' already belongs to id {}",
                        champion.name, other
                    )));
                }

                let existing: Option<String> = first_value(
                    &tx,
                    "SELECT name FROM champions WHERE id = ?",
                    params![champion.id],
                )?;
                match existing {
                    None => {
                        tx.execute(
                            "INSERT INTO champions (id, name) VALUES (?, ?)",
                            params![champion.id, champion.name],
                        )?;
                        touched += 1;
                    }
                    // Plain UPDATE of an unindexed column: DuckDB rejects
                    // upserts on rows other tables reference
                    Some(name) if name != champion.name => {
                        tx.execute(
                            "UPDATE champions SET name = ? WHERE id = ?",
                            params![champion.name, champion.id],
                        )?;
                        touched += 1;
                    }
                    Some(_) => {}
                }
            }
            tx.commit()?;
            Ok(touched)
        })
    }

    /// Append matchup rows; champions are resolved by name
    pub fn insert_matchups(&self, matchups: &[Matchup]) -> Result<usize> {
        let rows: Vec<StatRow> = matchups
            .iter()
            .map(|m| {
                let m = m.clone().checked()?;
                Ok((m.champion, m.enemy, m.winrate, m.delta1, m.delta2, m.pickrate, m.games))
            })
            .collect::<Result<_>>()?;
        self.insert_pairs(PairTable::Matchups, &rows)
    }

    /// Append synergy rows; champions are resolved by name
    pub fn insert_synergies(&self, synergies: &[Synergy]) -> Result<usize> {
        let rows: Vec<StatRow> = synergies
            .iter()
            .map(|s| {
                let s = s.clone().checked()?;
                Ok((s.champion, s.ally, s.winrate, s.delta1, s.delta2, s.pickrate, s.games))
            })
            .collect::<Result<_>>()?;
        self.insert_pairs(PairTable::Synergies, &rows)
    }

    /// All-or-nothing: every name is resolved before anything is written,
    /// and the inserts share one transaction
    fn insert_pairs(&self, kind: PairTable, rows: &[StatRow]) -> Result<usize> {
        let ids = self.build_champion_cache()?;
        let resolve = |name: &str| {
            ids.get(&name.to_lowercase())
                .copied()
                .ok_or_else(|| Error::malformed(format!("unknown champion '{}'", name)))
        };
        let resolved = rows
            .iter()
            .map(|(champion, other, winrate, delta1, delta2, pickrate, games)| {
                Ok((
                    resolve(champion)?,
                    resolve(other)?,
                    *winrate,
                    *delta1,
                    *delta2,
                    *pickrate,
                    *games,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        self.with_conn(|conn| {
            let sql = format!(
                "INSERT INTO {} (champion_id, {}, winrate, delta1, delta2, pickrate, games)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                kind.table(),
                kind.other_column()
            );
            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare(&sql)?;
                for (champion_id, other_id, winrate, delta1, delta2, pickrate, games) in &resolved {
                    stmt.execute(params![
                        champion_id,
                        other_id,
                        winrate,
                        delta1,
                        delta2,
                        pickrate,
                        games
                    ])?;
                }
            }
            tx.commit()?;
            Ok(resolved.len())
        })
    }

    /// Delete a champion and every row that references it
    ///
    /// DuckDB foreign keys do not cascade, so dependents go first. Each
    /// statement auto-commits; the order keeps the constraints satisfied.
    pub fn delete_champion(&self, champion_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM matchups WHERE champion_id = ? OR enemy_id = ?",
                params![champion_id, champion_id],
            )?;
            conn.execute(
                "DELETE FROM synergies WHERE champion_id = ? OR ally_id = ?",
                params![champion_id, champion_id],
            )?;
            conn.execute(
                "DELETE FROM champion_scores WHERE champion_id = ?",
                params![champion_id],
            )?;
            let deleted = conn.execute("DELETE FROM champions WHERE id = ?", params![champion_id])?;
            Ok(deleted > 0)
        })
    }

    // === Shared pair queries ===

    fn pair_rows(&self, kind: PairTable, name: &str) -> Result<Vec<StatRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT c.name, o.name, p.winrate, p.delta1, p.delta2, p.pickrate, p.games
                 {from}
                 WHERE lower(c.name) = lower(?)
                 ORDER BY o.name, p.id",
                from = kind.from_clause()
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([name], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                })?
                .collect::<duckdb::Result<Vec<StatRow>>>()?;
            Ok(rows)
        })
    }

    /// Gated, folded draft rows. `reverse` groups by picker instead of opponent.
    fn draft_rows(&self, name: &str, reverse: bool) -> Result<Vec<DraftMatchup>> {
        let (shown, filtered) = if reverse { ("c", "o") } else { ("o", "c") };
        let sql = format!(
            "SELECT {shown}.name,
                    CAST(SUM(p.delta2 * p.games) / SUM(p.games) AS DOUBLE),
                    CAST(SUM(p.pickrate * p.games) / SUM(p.games) AS DOUBLE),
                    CAST(SUM(p.games) AS BIGINT)
             {from}
             WHERE lower({filtered}.name) = lower(?)
               AND p.pickrate >= ? AND p.games >= ?
             GROUP BY {shown}.name
             ORDER BY {shown}.name",
            shown = shown,
            filtered = filtered,
            from = PairTable::Matchups.from_clause()
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![name, MIN_PICKRATE, MIN_GAMES], |row| {
                    Ok(DraftMatchup::new(
                        row.get::<_, String>(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                    ))
                })?
                .collect::<duckdb::Result<Vec<_>>>()?;
            rows.into_iter().map(DraftMatchup::checked).collect()
        })
    }

    fn pair_delta2(&self, kind: PairTable, champion: &str, other: &str) -> Result<Option<f64>> {
        let sql = format!(
            "SELECT CAST(SUM(p.delta2 * p.games) / SUM(p.games) AS DOUBLE)
             {from}
             WHERE lower(c.name) = lower(?) AND lower(o.name) = lower(?)
               AND p.pickrate >= ? AND p.games >= ?",
            from = kind.from_clause()
        );
        self.with_conn(|conn| {
            let value: Option<f64> = conn.query_row(
                &sql,
                params![champion, other, MIN_PICKRATE, MIN_GAMES],
                |row| row.get(0),
            )?;
            Ok(value)
        })
    }

    fn pair_bulk(&self, kind: PairTable) -> Result<PairDeltaMap> {
        let sql = format!(
            "SELECT lower(c.name), lower(o.name),
                    CAST(SUM(p.delta2 * p.games) / SUM(p.games) AS DOUBLE)
             {from}
             WHERE p.pickrate >= ? AND p.games >= ?
             GROUP BY lower(c.name), lower(o.name)",
            from = kind.from_clause()
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![MIN_PICKRATE, MIN_GAMES], |row| {
                    Ok((
                        (row.get::<_, String>(0)?, row.get::<_, String>(1)?),
                        row.get::<_, f64>(2)?,
                    ))
                })?
                .collect::<duckdb::Result<PairDeltaMap>>()?;
            Ok(rows)
        })
    }

    /// Validated ban entries, deduplicated by case-insensitive enemy name
    /// with the last entry winning
    fn dedup_bans(entries: &[BanRecommendation]) -> Result<Vec<BanRecommendation>> {
        let mut latest: HashMap<String, usize> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            latest.insert(entry.enemy_champion.to_lowercase(), idx);
        }
        let mut keep: Vec<usize> = latest.into_values().collect();
        keep.sort_unstable();
        keep.into_iter()
            .map(|idx| entries[idx].clone().checked())
            .collect()
    }
}

impl DataSource for DuckDbStore {
    fn name(&self) -> &str {
        "embedded"
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn connect(&self) -> Result<()> {
        self.with_conn(|_| Ok(()))
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.lock()?;
        // Dropping the connection closes it; a second close finds None
        guard.take();
        Ok(())
    }

    fn get_champion_id(&self, name: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            first_value(
                conn,
                "SELECT id FROM champions WHERE lower(name) = lower(?) ORDER BY id LIMIT 1",
                [name],
            )
        })
    }

    fn get_champion_by_id(&self, id: i64) -> Result<Option<String>> {
        self.with_conn(|conn| {
            first_value(conn, "SELECT name FROM champions WHERE id = ?", params![id])
        })
    }

    fn get_all_champion_names(&self) -> Result<HashMap<i64, String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM champions")?;
            let names = stmt
                .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
                .collect::<duckdb::Result<HashMap<i64, String>>>()?;
            Ok(names)
        })
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
        self.pair_rows(PairTable::Matchups, name)?
            .into_iter()
            .map(|(champion, enemy, winrate, delta1, delta2, pickrate, games)| {
                Matchup {
                    champion,
                    enemy,
                    winrate,
                    delta1,
                    delta2,
                    pickrate,
                    games,
                }
                .checked()
            })
            .collect()
    }

    fn get_champion_matchups_for_draft(&self, name: &str) -> Result<Vec<DraftMatchup>> {
        self.draft_rows(name, false)
    }

    fn get_reverse_matchups_for_draft(&self, name: &str) -> Result<Vec<DraftMatchup>> {
        self.draft_rows(name, true)
    }

    fn get_matchup_delta2(&self, champion: &str, enemy: &str) -> Result<Option<f64>> {
        self.pair_delta2(PairTable::Matchups, champion, enemy)
    }

    fn get_all_matchups_bulk(&self) -> Result<PairDeltaMap> {
        self.pair_bulk(PairTable::Matchups)
    }

    fn get_champion_base_winrate(&self, name: &str) -> Result<f64> {
        self.with_conn(|conn| {
            let (weighted, games): (Option<f64>, Option<i64>) = conn.query_row(
                "SELECT CAST(SUM(m.winrate * m.games) AS DOUBLE), CAST(SUM(m.games) AS BIGINT)
                 FROM matchups m JOIN champions c ON c.id = m.champion_id
                 WHERE lower(c.name) = lower(?)",
                [name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            match (weighted, games) {
                (Some(sum), Some(total)) if total > 0 => Ok(sum / total as f64),
                _ => Ok(NEUTRAL_WINRATE),
            }
        })
    }

    fn get_champion_synergies(&self, name: &str) -> Result<Vec<Synergy>> {
        self.pair_rows(PairTable::Synergies, name)?
            .into_iter()
            .map(|(champion, ally, winrate, delta1, delta2, pickrate, games)| {
                Synergy {
                    champion,
                    ally,
                    winrate,
                    delta1,
                    delta2,
                    pickrate,
                    games,
                }
                .checked()
            })
            .collect()
    }

    fn get_synergy_delta2(&self, champion: &str, ally: &str) -> Result<Option<f64>> {
        self.pair_delta2(PairTable::Synergies, champion, ally)
    }

    fn get_all_synergies_bulk(&self) -> Result<PairDeltaMap> {
        self.pair_bulk(PairTable::Synergies)
    }

    fn get_champion_scores(&self, name: &str) -> Result<Option<ChampionScore>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.avg_delta2, s.variance, s.coverage, s.peak_impact, s.volatility,
                        s.target_ratio
                 FROM champion_scores s JOIN champions c ON c.id = s.champion_id
                 WHERE lower(c.name) = lower(?)",
            )?;
            let mut rows = stmt.query([name])?;
            let score = match rows.next()? {
                Some(row) => Some(row_to_score(row, 0)?),
                None => None,
            };
            Ok(score)
        })
    }

    fn get_all_champion_scores(&self) -> Result<Vec<(String, ChampionScore)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.name, s.avg_delta2, s.variance, s.coverage, s.peak_impact,
                        s.volatility, s.target_ratio
                 FROM champion_scores s JOIN champions c ON c.id = s.champion_id
                 ORDER BY s.avg_delta2 DESC",
            )?;
            let scores = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row_to_score(row, 1)?)))?
                .collect::<duckdb::Result<Vec<_>>>()?;
            Ok(scores)
        })
    }

    fn champion_scores_available(&self) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM champion_scores", [], |row| row.get(0))?;
            Ok(count > 0)
        })
    }

    fn save_champion_scores(&self, champion_id: i64, score: &ChampionScore) -> Result<()> {
        self.with_conn(|conn| {
            // Delete + insert instead of ON CONFLICT: the row carries a foreign key
            conn.execute(
                "DELETE FROM champion_scores WHERE champion_id = ?",
                params![champion_id],
            )?;
            conn.execute(
                "INSERT INTO champion_scores
                     (champion_id, avg_delta2, variance, coverage, peak_impact, volatility, target_ratio)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    champion_id,
                    score.avg_delta2,
                    score.variance,
                    score.coverage,
                    score.peak_impact,
                    score.volatility,
                    score.target_ratio
                ],
            )?;
            Ok(())
        })
    }

    fn save_pool_ban_recommendations(
        &self,
        pool: &str,
        entries: &[BanRecommendation],
    ) -> Result<usize> {
        let entries = Self::dedup_bans(entries)?;
        self.with_conn(|conn| {
            // Delete and insert commit together: a failed batch keeps the
            // previous recommendations
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "DELETE FROM pool_ban_recommendations WHERE pool_name = ?",
                [pool],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO pool_ban_recommendations
                         (pool_name, enemy_champion, threat_score, best_response_delta2,
                          best_response_champion, matchups_count)
                     VALUES (?, ?, ?, ?, ?, ?)",
                )?;
                for entry in &entries {
                    stmt.execute(params![
                        pool,
                        entry.enemy_champion,
                        entry.threat_score,
                        entry.best_response_delta2,
                        entry.best_response_champion,
                        entry.matchups_count
                    ])?;
                }
            }
            tx.commit()?;
            Ok(entries.len())
        })
    }

    fn get_pool_ban_recommendations(
        &self,
        pool: &str,
        limit: usize,
    ) -> Result<Vec<BanRecommendation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT enemy_champion, threat_score, best_response_delta2,
                        best_response_champion, matchups_count
                 FROM pool_ban_recommendations
                 WHERE pool_name = ?
                 ORDER BY threat_score DESC, enemy_champion
                 LIMIT ?",
            )?;
            let bans = stmt
                .query_map(params![pool, limit as i64], |row| {
                    Ok(BanRecommendation {
                        enemy_champion: row.get(0)?,
                        threat_score: row.get(1)?,
                        best_response_delta2: row.get(2)?,
                        best_response_champion: row.get(3)?,
                        matchups_count: row.get(4)?,
                    })
                })?
                .collect::<duckdb::Result<Vec<_>>>()?;
            Ok(bans)
        })
    }

    fn pool_has_ban_recommendations(&self, pool: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM pool_ban_recommendations WHERE pool_name = ?",
                [pool],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }
}

/// First column of the first row, if there is one
fn first_value<T: FromSql>(conn: &Connection, sql: &str, params: impl Params) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let value = match rows.next()? {
        Some(row) => Some(row.get(0)?),
        None => None,
    };
    Ok(value)
}

fn row_to_score(row: &duckdb::Row, offset: usize) -> duckdb::Result<ChampionScore> {
    Ok(ChampionScore {
        avg_delta2: row.get(offset)?,
        variance: row.get(offset + 1)?,
        coverage: row.get(offset + 2)?,
        peak_impact: row.get(offset + 3)?,
        volatility: row.get(offset + 4)?,
        target_ratio: row.get(offset + 5)?,
    })
}
