//! End-to-end tests for the orchestrator and draft cache over real stores
//!
//! Run with: cargo test --test fallback_test

use std::path::Path;

use tempfile::TempDir;

use draftstats_core::adapters::duckdb::DuckDbStore;
use draftstats_core::config::{Config, DataSourceMode, DEFAULT_DATABASE_FILE};
use draftstats_core::retry::RetryPolicy;
use draftstats_core::services::FallbackDataSource;
use draftstats_core::{
    BanRecommendation, Champion, DataSource, DraftStatsContext, Error, Matchup,
};

fn matchup(champion: &str, enemy: &str, delta2: f64, games: i64) -> Matchup {
    Matchup {
        champion: champion.to_string(),
        enemy: enemy.to_string(),
        winrate: 50.0 + delta2,
        delta1: 0.0,
        delta2,
        pickrate: 3.0,
        games,
    }
}

/// Seed the embedded file, then close it so the orchestrator can open it
fn seed_embedded(data_dir: &Path) {
    let store = DuckDbStore::open(&data_dir.join(DEFAULT_DATABASE_FILE)).unwrap();
    store
        .upsert_champions(&[
            Champion::new(1, "Ahri"),
            Champion::new(2, "Zed"),
            Champion::new(3, "Lux"),
        ])
        .unwrap();
    store
        .insert_matchups(&[
            matchup("Ahri", "Zed", 2.0, 1000),
            matchup("Zed", "Lux", -1.5, 500),
        ])
        .unwrap();
    store.close().unwrap();
}

/// Hybrid config whose remote primary refuses connections immediately
fn unreachable_hybrid() -> Config {
    let mut config = Config::default();
    config.mode = DataSourceMode::Hybrid;
    config.api.base_url = "http://127.0.0.1:1/api".to_string();
    config.api.retry = RetryPolicy::immediate(1);
    config
}

#[test]
fn test_secondary_only_reads_and_writes_embedded_file() {
    let temp_dir = TempDir::new().unwrap();
    seed_embedded(temp_dir.path());

    let mut config = Config::default();
    config.mode = DataSourceMode::SecondaryOnly;
    let source = FallbackDataSource::from_config(&config, temp_dir.path()).unwrap();

    assert_eq!(source.get_champion_id("zed").unwrap(), Some(2));
    assert_eq!(source.get_matchup_delta2("Ahri", "Zed").unwrap(), Some(2.0));

    let bans = vec![BanRecommendation {
        enemy_champion: "Zed".to_string(),
        threat_score: 7.5,
        best_response_delta2: 2.0,
        best_response_champion: "Ahri".to_string(),
        matchups_count: 1,
    }];
    assert_eq!(source.save_pool_ban_recommendations("mid", &bans).unwrap(), 1);
    assert_eq!(source.get_pool_ban_recommendations("mid", 5).unwrap(), bans);
}

#[test]
fn test_hybrid_keeps_unreachable_remote_and_falls_back_per_call() {
    let temp_dir = TempDir::new().unwrap();
    seed_embedded(temp_dir.path());

    let source = FallbackDataSource::from_config(&unreachable_hybrid(), temp_dir.path()).unwrap();
    let summary = source.describe();
    assert_eq!(summary.primary.as_deref(), Some("remote-api"));
    assert_eq!(summary.secondary.as_deref(), Some("embedded"));
    assert!(summary.fallback_enabled);

    // Each read tries the remote again before answering from the embedded file
    assert_eq!(source.get_all_champion_names().unwrap().len(), 3);
    assert_eq!(source.get_matchup_delta2("Ahri", "Zed").unwrap(), Some(2.0));
    assert_eq!(source.get_reverse_matchups_for_draft("Zed").unwrap().len(), 1);
    assert!(!source.is_read_only());

    // Reconnecting is tolerated while the remote stays down
    source.connect().unwrap();
}

#[test]
fn test_primary_only_surfaces_remote_failure() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = unreachable_hybrid();
    config.mode = DataSourceMode::PrimaryOnly;

    let err = FallbackDataSource::from_config(&config, temp_dir.path()).err().unwrap();
    assert!(err.is_transient());
    assert!(!temp_dir.path().join(DEFAULT_DATABASE_FILE).exists());
}

#[test]
fn test_primary_only_without_api_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.mode = DataSourceMode::PrimaryOnly;
    config.api_enabled = false;

    let err = FallbackDataSource::from_config(&config, temp_dir.path()).err().unwrap();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_context_warms_cache_over_embedded_store() {
    let temp_dir = TempDir::new().unwrap();
    seed_embedded(temp_dir.path());

    let mut config = Config::default();
    config.mode = DataSourceMode::SecondaryOnly;
    let ctx = DraftStatsContext::with_config(temp_dir.path(), config).unwrap();

    // Ahri stays cold so its matchup is only reachable through Zed's reverse list
    let report = ctx.cache.warm_cache(&["Zed", "Lux"]);
    assert_eq!(report.requested, 2);
    assert_eq!(report.direct_loaded, 1);
    assert_eq!(report.reverse_loaded, 2);
    assert!(report.failures.is_empty());

    assert_eq!(ctx.cache.get_cached_delta2("Zed", "Lux").unwrap(), Some(-1.5));
    assert_eq!(ctx.cache.get_cached_delta2("Ahri", "Zed").unwrap(), Some(-2.0));
    // Neither list relates these two: live query
    assert_eq!(ctx.cache.get_cached_delta2("Lux", "Ahri").unwrap(), None);

    let stats = ctx.cache.stats();
    assert_eq!((stats.hits, stats.misses), (2, 1));

    let status = ctx.status_service.get_status().unwrap();
    assert_eq!(status.total_champions, 3);
    assert_eq!(status.backends.mode, DataSourceMode::SecondaryOnly.to_string());
}

#[test]
fn test_context_creates_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("nested").join("draftstats");

    let mut config = Config::default();
    config.mode = DataSourceMode::SecondaryOnly;
    let ctx = DraftStatsContext::with_config(&data_dir, config).unwrap();

    assert_eq!(ctx.data_dir, data_dir);
    assert!(data_dir.join(DEFAULT_DATABASE_FILE).exists());
}
