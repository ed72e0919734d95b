//! Status command - show configured backends and what they hold

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Draftstats Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let backends = &status.backends;
    table.add_row(vec!["Mode", backends.mode.as_str()]);
    table.add_row(vec!["Primary", backends.primary.as_deref().unwrap_or("-")]);
    table.add_row(vec!["Secondary", backends.secondary.as_deref().unwrap_or("-")]);
    table.add_row(vec!["Fallback", if backends.fallback_enabled { "enabled" } else { "disabled" }]);
    table.add_row(vec!["Champions", &status.total_champions.to_string()]);
    table.add_row(vec!["Champion scores", if status.scores_available { "yes" } else { "no" }]);

    println!("{}", table);

    if status.read_only {
        println!();
        output::warning("No writable local store: writes will be rejected");
    }

    Ok(())
}
