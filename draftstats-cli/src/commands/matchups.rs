//! Matchups and delta2 commands

use anyhow::{Context, Result};
use comfy_table::Cell;
use draftstats_core::{DataSource, DraftMatchup};
use serde_json::json;

use super::get_context;
use crate::output;

/// Which list to show for a champion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Every stored row
    Full,
    /// Gated and folded per opponent
    Draft,
    /// Who was picked into this champion
    Reverse,
}

pub fn run(name: &str, view: View, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let source = &ctx.source;

    match view {
        View::Full => {
            let matchups = source
                .get_champion_matchups(name)
                .with_context(|| format!("Failed to load matchups for {}", name))?;
            let base = source.get_champion_base_winrate(name)?;

            if json {
                let payload = json!({ "champion": name, "base_winrate": base, "matchups": matchups });
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }
            if matchups.is_empty() {
                output::info(&format!("No matchups found for {}", name));
                return Ok(());
            }

            println!("{} base winrate: {}", name, output::format_percent(base));
            let mut table = output::create_table();
            table.set_header(vec!["Enemy", "Winrate", "Delta1", "Delta2", "Pickrate", "Games"]);
            for m in &matchups {
                table.add_row(vec![
                    Cell::new(&m.enemy),
                    Cell::new(output::format_percent(m.winrate)),
                    Cell::new(output::format_delta(m.delta1)),
                    Cell::new(output::format_delta(m.delta2)),
                    Cell::new(output::format_percent(m.pickrate)),
                    Cell::new(m.games),
                ]);
            }
            println!("{}", table);
        }
        View::Draft | View::Reverse => {
            let rows = if view == View::Draft {
                source.get_champion_matchups_for_draft(name)
            } else {
                source.get_reverse_matchups_for_draft(name)
            }
            .with_context(|| format!("Failed to load draft matchups for {}", name))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }
            if rows.is_empty() {
                output::info(&format!("No draft matchups found for {}", name));
                return Ok(());
            }

            let header = if view == View::Draft { "Enemy" } else { "Picked by" };
            print_draft_table(header, &rows);
        }
    }

    Ok(())
}

fn print_draft_table(header: &str, rows: &[DraftMatchup]) {
    let mut table = output::create_table();
    table.set_header(vec![header, "Delta2", "Pickrate", "Games"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.enemy_name),
            Cell::new(output::format_delta(row.delta2)),
            Cell::new(output::format_percent(row.pickrate)),
            Cell::new(row.games),
        ]);
    }
    println!("{}", table);
}

pub fn run_delta2(champion: &str, other: &str, synergy: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let value = if synergy {
        ctx.source.get_synergy_delta2(champion, other)
    } else {
        ctx.source.get_matchup_delta2(champion, other)
    }
    .with_context(|| format!("Failed to look up {} / {}", champion, other))?;

    if json {
        let payload = json!({
            "champion": champion,
            "other": other,
            "kind": if synergy { "synergy" } else { "matchup" },
            "delta2": value,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let relation = if synergy { "with" } else { "vs" };
    match value {
        Some(delta2) => println!("{} {} {}: {}", champion, relation, other, output::format_delta(delta2)),
        None => output::info(&format!("No qualifying data for {} {} {}", champion, relation, other)),
    }
    Ok(())
}
