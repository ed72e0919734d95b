//! Bans command - precomputed ban recommendations for a champion pool

use anyhow::{Context, Result};
use comfy_table::Cell;
use draftstats_core::DataSource;

use super::get_context;
use crate::output;

pub fn run(pool: &str, limit: usize, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let bans = ctx
        .source
        .get_pool_ban_recommendations(pool, limit)
        .with_context(|| format!("Failed to load ban recommendations for {}", pool))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&bans)?);
        return Ok(());
    }

    if bans.is_empty() {
        output::info(&format!("No ban recommendations stored for pool {}", pool));
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["#", "Enemy", "Threat", "Best answer", "Answer delta2", "Matchups"]);
    for (rank, ban) in bans.iter().enumerate() {
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(&ban.enemy_champion),
            Cell::new(format!("{:.2}", ban.threat_score)),
            Cell::new(&ban.best_response_champion),
            Cell::new(output::format_delta(ban.best_response_delta2)),
            Cell::new(ban.matchups_count),
        ]);
    }
    println!("{}", table);

    Ok(())
}
