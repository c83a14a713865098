//! trawl command-line client.
//!
//! Runs one search session against the configured sources and prints the
//! lanes. Shares the cache database with the MCP server.

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use trawl_core::session::LaneState;
use trawl_core::{AppConfig, LoadMore, Session, SessionView};

/// Federated incremental search over the configured sources.
#[derive(Parser)]
#[command(name = "trawl", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, env = "TRAWL_CONFIG_FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search every source and print one lane per source.
    Search {
        query: String,

        /// Number of batches to reveal per lane (the search plus rounds - 1 load-mores).
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=20))]
        rounds: u32,

        /// Print the session view as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete cache entries older than the configured TTL.
    Sweep,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_with_file(cli.config)?;
    let session = trawl_client::open_session(&config).await?;

    let outcome = run(&session, cli.command).await;
    session.close().await;
    outcome
}

async fn run(session: &Session, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Search { query, rounds, json } => {
            let view = run_search(session, &query, rounds).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", render(&view));
            }
        }
        Command::Sweep => {
            let swept = session.sweep().await;
            println!("swept {} in-memory and {} persisted entries", swept.in_memory, swept.persisted);
        }
    }

    Ok(())
}

async fn run_search(session: &Session, query: &str, rounds: u32) -> anyhow::Result<SessionView> {
    let mut view = session.search(query).await?;

    for round in 1..rounds {
        let open: Vec<String> = view
            .lanes
            .iter()
            .filter(|l| l.can_load_more())
            .map(|l| l.source_id.clone())
            .collect();
        if open.is_empty() {
            break;
        }

        for source in open {
            match session.load_more(&source).await? {
                LoadMore::Failed { error } => tracing::warn!(%source, round, "load more failed: {}", error),
                outcome => tracing::debug!(%source, round, ?outcome, "load more"),
            }
        }
        view = session.view();
    }

    Ok(view)
}

fn render(view: &SessionView) -> String {
    let mut out = String::new();
    if let Some(query) = &view.query {
        let _ = writeln!(out, "results for \"{query}\"");
    }
    for lane in &view.lanes {
        render_lane(&mut out, lane);
    }
    out
}

fn render_lane(out: &mut String, lane: &LaneState) {
    let _ = writeln!(out);
    if lane.unavailable {
        let _ = writeln!(out, "[{}] not available for this search", lane.source_id);
        return;
    }

    let more = if lane.has_more { ", more available" } else { "" };
    let _ = writeln!(out, "[{}] {} results{more}", lane.source_id, lane.results.len());

    for (n, result) in lane.results.iter().enumerate() {
        let saved = if result.is_saved { " (saved)" } else { "" };
        let _ = writeln!(out, "{:>3}. {}{saved}", n + 1, result.item.title);
        let _ = writeln!(out, "     {}", result.item.canonical_url);
    }
    if let Some(error) = &lane.error {
        let _ = writeln!(out, "  ! {error}");
    }
}
