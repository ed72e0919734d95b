//! Draftstats CLI - champion matchup statistics in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{bans, champions, matchups, status, synergies, warm};

/// Draftstats - matchup statistics behind interchangeable backends
#[derive(Parser)]
#[command(name = "ds", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show configured backends and what they hold
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every known champion
    Champions {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a champion's matchups
    Matchups {
        /// Champion name
        name: String,
        /// Gated draft view, one row per opponent
        #[arg(long, conflicts_with = "reverse")]
        draft: bool,
        /// Champions that were picked into this one
        #[arg(long)]
        reverse: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Look up the delta2 of one champion against another
    Delta2 {
        /// Champion name
        champion: String,
        /// Enemy (or ally with --synergy) name
        enemy: String,
        /// Treat the second champion as an ally
        #[arg(long)]
        synergy: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a champion's synergies
    Synergies {
        /// Champion name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show precomputed ban recommendations for a pool
    Bans {
        /// Pool name
        pool: String,
        /// Maximum number of recommendations
        #[arg(long, default_value_t = 5)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Warm the draft cache and optionally resolve lookups through it
    Warm {
        /// Champions to preload
        #[arg(required = true)]
        names: Vec<String>,
        /// Pairs to look up afterwards, as champion:enemy
        #[arg(long, value_delimiter = ',')]
        lookup: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("DRAFTSTATS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status { json } => status::run(json),
        Commands::Champions { json } => champions::run(json),
        Commands::Matchups { name, draft, reverse, json } => {
            let view = if reverse {
                matchups::View::Reverse
            } else if draft {
                matchups::View::Draft
            } else {
                matchups::View::Full
            };
            matchups::run(&name, view, json)
        }
        Commands::Delta2 { champion, enemy, synergy, json } => {
            matchups::run_delta2(&champion, &enemy, synergy, json)
        }
        Commands::Synergies { name, json } => synergies::run(&name, json),
        Commands::Bans { pool, limit, json } => bans::run(&pool, limit, json),
        Commands::Warm { names, lookup, json } => warm::run(&names, &lookup, json),
    }
}
