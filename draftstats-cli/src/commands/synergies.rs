//! Synergies command - a champion's measured performance alongside allies

use anyhow::{Context, Result};
use comfy_table::Cell;
use draftstats_core::DataSource;

use super::get_context;
use crate::output;

pub fn run(name: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let synergies = ctx
        .source
        .get_champion_synergies(name)
        .with_context(|| format!("Failed to load synergies for {}", name))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&synergies)?);
        return Ok(());
    }

    if synergies.is_empty() {
        output::info(&format!("No synergies found for {}", name));
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Ally", "Winrate", "Delta2", "Pickrate", "Games"]);
    for s in &synergies {
        table.add_row(vec![
            Cell::new(&s.ally),
            Cell::new(output::format_percent(s.winrate)),
            Cell::new(output::format_delta(s.delta2)),
            Cell::new(output::format_percent(s.pickrate)),
            Cell::new(s.games),
        ]);
    }
    println!("{}", table);

    Ok(())
}
