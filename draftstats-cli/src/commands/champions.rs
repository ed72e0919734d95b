//! Champions command - list every known champion

use anyhow::{Context, Result};
use comfy_table::Cell;
use draftstats_core::{Champion, DataSource};

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let mut champions: Vec<Champion> = ctx
        .source
        .get_all_champion_names()
        .context("Failed to list champions")?
        .into_iter()
        .map(|(id, name)| Champion::new(id, name))
        .collect();
    champions.sort_by_key(|c| c.id);

    if json {
        println!("{}", serde_json::to_string_pretty(&champions)?);
        return Ok(());
    }

    if champions.is_empty() {
        output::info("No champions found");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["ID", "Name"]);
    for champion in &champions {
        table.add_row(vec![Cell::new(champion.id), Cell::new(&champion.name)]);
    }
    println!("{}", table);
    println!("{} champions", champions.len());

    Ok(())
}
