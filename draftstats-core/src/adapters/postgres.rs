//! Distributed store backed by a read-only PostgreSQL replica
//!
//! Queries run on a private current-thread runtime, so callers stay fully
//! blocking. The session is opened with `default_transaction_read_only` and
//! a server-side statement timeout. The replica carries champions, matchups
//! and synergies only: it has no delta1 column, no score table and no ban
//! table, so those reads return zero, nothing or the neutral winrate.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, warn};

use crate::config::DistributedConfig;
use crate::domain::aggregate::{MIN_GAMES, MIN_PICKRATE};
use crate::domain::matchup::NEUTRAL_WINRATE;
use crate::domain::result::{Error, Result};
use crate::domain::{BanRecommendation, ChampionScore, DraftMatchup, Matchup, Synergy};
use crate::ports::{DataSource, PairDeltaMap};
use crate::retry::{retry_transient, RetryPolicy};

const SOURCE_NAME: &str = "distributed";

/// Replica ids and game counts are int4
const MIN_GAMES_PARAM: i32 = MIN_GAMES as i32;

#[derive(Clone, Copy)]
enum PairTable {
    Matchups,
    Synergies,
}

impl PairTable {
    /// Picker aliased `c`, opponent `o`, pair row `p`
    fn from_clause(self) -> &'static str {
        match self {
            Self::Matchups => {
                "matchups p JOIN champions c ON c.id = p.champion_id \
                 JOIN champions o ON o.id = p.enemy_id"
            }
            Self::Synergies => {
                "synergies p JOIN champions c ON c.id = p.champion_id \
                 JOIN champions o ON o.id = p.ally_id"
            }
        }
    }
}

/// (opponent, delta2, pickrate, games) folded over gated rows
const DRAFT_COLUMNS: &str = "(SUM(p.delta2 * p.games) / SUM(p.games))::float8, \
     (SUM(p.pickrate * p.games) / SUM(p.games))::float8, \
     SUM(p.games)::bigint";

pub struct PostgresSource {
    // Dropped before the runtime it was opened on
    client: Mutex<Option<Client>>,
    pg_config: tokio_postgres::Config,
    connect_timeout: Duration,
    query_timeout: Duration,
    retry: RetryPolicy,
    runtime: Runtime,
}

impl PostgresSource {
    /// Validate the connection string; the connection itself opens lazily
    pub fn new(config: &DistributedConfig) -> Result<Self> {
        let conn_str = config
            .connection_string
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::config("distributed backend requires a connection string"))?;

        let mut pg_config: tokio_postgres::Config = conn_str
            .parse()
            .map_err(|e| Error::config(format!("invalid connection string: {}", e)))?;
        pg_config.connect_timeout(config.connect_timeout);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            client: Mutex::new(None),
            pg_config,
            connect_timeout: config.connect_timeout,
            query_timeout: config.query_timeout,
            retry: config.retry.clone(),
            runtime,
        })
    }

    fn open(&self) -> Result<Client> {
        let statement_timeout_ms = self.query_timeout.as_millis();
        self.runtime.block_on(async {
            let (client, connection) =
                tokio::time::timeout(self.connect_timeout, self.pg_config.connect(NoTls))
                    .await
                    .map_err(|_| {
                        Error::transient(format!(
                            "{} connect timed out after {:?}",
                            SOURCE_NAME, self.connect_timeout
                        ))
                    })??;

            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    warn!("{} connection closed: {}", SOURCE_NAME, e);
                }
            });

            client
                .batch_execute(&format!(
                    "SET statement_timeout = {}; SET default_transaction_read_only = on",
                    statement_timeout_ms
                ))
                .await?;
            debug!("{} connection opened", SOURCE_NAME);
            Ok::<_, Error>(client)
        })
    }

    /// Run one statement, reconnecting and retrying on transient failures
    fn query<T>(
        &self,
        operation: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        map: impl Fn(&Row) -> Result<T>,
    ) -> Result<Vec<T>> {
        retry_transient(operation, &self.retry, || {
            let mut guard = self
                .client
                .lock()
                .map_err(|_| Error::database("distributed client lock poisoned"))?;

            let client = match guard.take() {
                Some(client) if !client.is_closed() => client,
                _ => self.open()?,
            };

            let outcome = self.runtime.block_on(async {
                tokio::time::timeout(self.query_timeout, client.query(sql, params)).await
            });

            match outcome {
                Ok(Ok(rows)) => {
                    *guard = Some(client);
                    rows.iter().map(&map).collect()
                }
                Ok(Err(e)) => {
                    let err = Error::from(e);
                    // A broken session is dropped so the retry reconnects
                    if !err.is_transient() {
                        *guard = Some(client);
                    }
                    Err(err)
                }
                Err(_) => Err(Error::transient(format!(
                    "{} timed out after {:?}",
                    operation, self.query_timeout
                ))),
            }
        })
    }

    fn draft_rows(&self, table: PairTable, name: &str, reverse: bool) -> Result<Vec<DraftMatchup>> {
        let (named, other) = if reverse { ("o", "c") } else { ("c", "o") };
        let sql = format!(
            "SELECT {other}.name, {columns} FROM {from} \
             WHERE LOWER({named}.name) = LOWER($1) AND p.pickrate >= $2 AND p.games >= $3 \
             GROUP BY {other}.name ORDER BY {other}.name",
            other = other,
            named = named,
            columns = DRAFT_COLUMNS,
            from = table.from_clause(),
        );
        self.query(
            "draft rows",
            &sql,
            &[&name, &MIN_PICKRATE, &MIN_GAMES_PARAM],
            |row| {
                DraftMatchup::new(
                    row.try_get::<_, String>(0)?,
                    row.try_get::<_, f64>(1)?,
                    row.try_get::<_, f64>(2)?,
                    row.try_get::<_, i64>(3)?,
                )
                .checked()
            },
        )
    }

    fn pair_delta2(&self, table: PairTable, champion: &str, opponent: &str) -> Result<Option<f64>> {
        let sql = format!(
            "SELECT (SUM(p.delta2 * p.games) / NULLIF(SUM(p.games), 0))::float8 FROM {} \
             WHERE LOWER(c.name) = LOWER($1) AND LOWER(o.name) = LOWER($2) \
             AND p.pickrate >= $3 AND p.games >= $4",
            table.from_clause()
        );
        let values = self.query(
            "pair delta2",
            &sql,
            &[&champion, &opponent, &MIN_PICKRATE, &MIN_GAMES_PARAM],
            |row| Ok(row.try_get::<_, Option<f64>>(0)?),
        )?;
        Ok(values.into_iter().next().flatten())
    }

    fn pair_bulk(&self, table: PairTable) -> Result<PairDeltaMap> {
        let sql = format!(
            "SELECT LOWER(c.name), LOWER(o.name), \
             (SUM(p.delta2 * p.games) / SUM(p.games))::float8 FROM {} \
             WHERE p.pickrate >= $1 AND p.games >= $2 \
             GROUP BY LOWER(c.name), LOWER(o.name)",
            table.from_clause()
        );
        let entries = self.query(
            "pair bulk",
            &sql,
            &[&MIN_PICKRATE, &MIN_GAMES_PARAM],
            |row| {
                Ok((
                    (row.try_get::<_, String>(0)?, row.try_get::<_, String>(1)?),
                    row.try_get::<_, f64>(2)?,
                ))
            },
        )?;
        Ok(entries.into_iter().collect())
    }

    fn all_champions(&self) -> Result<Vec<(i64, String)>> {
        self.query(
            "champions",
            "SELECT id, name FROM champions ORDER BY id",
            &[],
            |row| {
                Ok((
                    i64::from(row.try_get::<_, i32>(0)?),
                    row.try_get::<_, String>(1)?,
                ))
            },
        )
    }
}

impl DataSource for PostgresSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn connect(&self) -> Result<()> {
        retry_transient("connect", &self.retry, || {
            let mut guard = self
                .client
                .lock()
                .map_err(|_| Error::database("distributed client lock poisoned"))?;
            if guard.as_ref().map_or(true, Client::is_closed) {
                *guard = Some(self.open()?);
            }
            Ok(())
        })
    }

    fn close(&self) -> Result<()> {
        let mut guard = self
            .client
            .lock()
            .map_err(|_| Error::database("distributed client lock poisoned"))?;
        if guard.take().is_some() {
            debug!("{} connection closed", SOURCE_NAME);
        }
        Ok(())
    }

    // === Champions ===

    fn get_champion_id(&self, name: &str) -> Result<Option<i64>> {
        let ids = self.query(
            "champion id",
            "SELECT id FROM champions WHERE LOWER(name) = LOWER($1) LIMIT 1",
            &[&name],
            |row| Ok(i64::from(row.try_get::<_, i32>(0)?)),
        )?;
        Ok(ids.into_iter().next())
    }

    fn get_champion_by_id(&self, id: i64) -> Result<Option<String>> {
        let Ok(id) = i32::try_from(id) else {
            return Ok(None);
        };
        let names = self.query(
            "champion name",
            "SELECT name FROM champions WHERE id = $1",
            &[&id],
            |row| Ok(row.try_get::<_, String>(0)?),
        )?;
        Ok(names.into_iter().next())
    }

    fn get_all_champion_names(&self) -> Result<HashMap<i64, String>> {
        Ok(self.all_champions()?.into_iter().collect())
    }

    fn build_champion_cache(&self) -> Result<HashMap<String, i64>> {
        let mut cache = HashMap::new();
        for (id, name) in self.all_champions()? {
            cache.insert(name.to_lowercase(), id);
            cache.insert(name, id);
        }
        Ok(cache)
    }

    // === Matchups ===

    fn get_champion_matchups(&self, name: &str) -> Result<Vec<Matchup>> {
        let sql = format!(
            "SELECT c.name, o.name, p.winrate, p.delta2, p.pickrate, p.games FROM {} \
             WHERE LOWER(c.name) = LOWER($1) ORDER BY o.name",
            PairTable::Matchups.from_clause()
        );
        self.query("champion matchups", &sql, &[&name], |row| {
            Matchup {
                champion: row.try_get(0)?,
                enemy: row.try_get(1)?,
                winrate: row.try_get(2)?,
                delta1: 0.0,
                delta2: row.try_get(3)?,
                pickrate: row.try_get(4)?,
                games: i64::from(row.try_get::<_, i32>(5)?),
            }
            .checked()
        })
    }

    fn get_champion_matchups_for_draft(&self, name: &str) -> Result<Vec<DraftMatchup>> {
        self.draft_rows(PairTable::Matchups, name, false)
    }

    fn get_reverse_matchups_for_draft(&self, name: &str) -> Result<Vec<DraftMatchup>> {
        self.draft_rows(PairTable::Matchups, name, true)
    }

    fn get_matchup_delta2(&self, champion: &str, enemy: &str) -> Result<Option<f64>> {
        self.pair_delta2(PairTable::Matchups, champion, enemy)
    }

    fn get_all_matchups_bulk(&self) -> Result<PairDeltaMap> {
        self.pair_bulk(PairTable::Matchups)
    }

    /// The replica has no per-champion baseline
    fn get_champion_base_winrate(&self, _name: &str) -> Result<f64> {
        Ok(NEUTRAL_WINRATE)
    }

    // === Synergies ===

    fn get_champion_synergies(&self, name: &str) -> Result<Vec<Synergy>> {
        let sql = format!(
            "SELECT c.name, o.name, p.winrate, p.delta2, p.pickrate, p.games FROM {} \
             WHERE LOWER(c.name) = LOWER($1) ORDER BY o.name",
            PairTable::Synergies.from_clause()
        );
        self.query("champion synergies", &sql, &[&name], |row| {
            Synergy {
                champion: row.try_get(0)?,
                ally: row.try_get(1)?,
                winrate: row.try_get(2)?,
                delta1: 0.0,
                delta2: row.try_get(3)?,
                pickrate: row.try_get(4)?,
                games: i64::from(row.try_get::<_, i32>(5)?),
            }
            .checked()
        })
    }

    fn get_synergy_delta2(&self, champion: &str, ally: &str) -> Result<Option<f64>> {
        self.pair_delta2(PairTable::Synergies, champion, ally)
    }

    fn get_all_synergies_bulk(&self) -> Result<PairDeltaMap> {
        self.pair_bulk(PairTable::Synergies)
    }

    // === Champion scores ===

    fn get_champion_scores(&self, _name: &str) -> Result<Option<ChampionScore>> {
        Ok(None)
    }

    fn get_all_champion_scores(&self) -> Result<Vec<(String, ChampionScore)>> {
        Ok(Vec::new())
    }

    fn save_champion_scores(&self, _champion_id: i64, _score: &ChampionScore) -> Result<()> {
        Err(Error::read_only(SOURCE_NAME))
    }

    // === Ban recommendations ===

    fn save_pool_ban_recommendations(
        &self,
        _pool: &str,
        _entries: &[BanRecommendation],
    ) -> Result<usize> {
        Err(Error::read_only(SOURCE_NAME))
    }

    fn get_pool_ban_recommendations(
        &self,
        _pool: &str,
        _limit: usize,
    ) -> Result<Vec<BanRecommendation>> {
        Ok(Vec::new())
    }

    fn pool_has_ban_recommendations(&self, _pool: &str) -> Result<bool> {
        Ok(false)
    }
}
