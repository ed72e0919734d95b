//! Warm command - preload the draft cache and resolve lookups through it

use anyhow::{bail, Result};
use colored::Colorize;
use comfy_table::Cell;
use serde::Serialize;

use draftstats_core::services::{CacheStats, WarmReport};

use super::get_context;
use crate::output;

#[derive(Serialize)]
struct Lookup {
    champion: String,
    enemy: String,
    delta2: Option<f64>,
}

#[derive(Serialize)]
struct WarmOutput {
    report: WarmReport,
    lookups: Vec<Lookup>,
    stats: CacheStats,
}

fn parse_pair(pair: &str) -> Result<(String, String)> {
    match pair.split_once(':') {
        Some((champion, enemy)) if !champion.trim().is_empty() && !enemy.trim().is_empty() => {
            Ok((champion.trim().to_string(), enemy.trim().to_string()))
        }
        _ => bail!("Invalid lookup '{}': expected champion:enemy", pair),
    }
}

pub fn run(names: &[String], lookups: &[String], json: bool) -> Result<()> {
    let pairs = lookups.iter().map(|p| parse_pair(p)).collect::<Result<Vec<_>>>()?;

    let ctx = get_context()?;
    let report = ctx.cache.warm_cache(names);

    let mut resolved = Vec::with_capacity(pairs.len());
    for (champion, enemy) in pairs {
        let delta2 = ctx.cache.get_cached_delta2(&champion, &enemy)?;
        resolved.push(Lookup { champion, enemy, delta2 });
    }
    let stats = ctx.cache.stats();

    if json {
        let payload = WarmOutput { report, lookups: resolved, stats };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("{}", "Draft Cache".bold());
    println!(
        "Loaded {}/{} direct and {}/{} reverse lists",
        report.direct_loaded, report.requested, report.reverse_loaded, report.requested
    );
    for (champion, err) in &report.failures {
        output::warning(&format!("  {}: {}", champion, err));
    }

    if !resolved.is_empty() {
        println!();
        let mut table = output::create_table();
        table.set_header(vec!["Champion", "Enemy", "Delta2"]);
        for lookup in &resolved {
            let delta2 = match lookup.delta2 {
                Some(value) => Cell::new(output::format_delta(value)),
                None => Cell::new("-"),
            };
            table.add_row(vec![Cell::new(&lookup.champion), Cell::new(&lookup.enemy), delta2]);
        }
        println!("{}", table);
        println!(
            "{} hits, {} misses ({:.1}% hit rate)",
            stats.hits,
            stats.misses,
            stats.hit_rate()
        );
    }

    Ok(())
}
