use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use squad_stats::aggregate::PlayerStats;
use squad_stats::cache::{Snapshot, StatsCache};
use squad_stats::config::AppConfig;
use squad_stats::error::StatsError;
use squad_stats::import::{InputKind, import_csv};

#[derive(Parser)]
#[command(name = "squad_stats")]
#[command(about = "Player results, goals and form from a match log", long_about = None)]
struct Cli {
    /// Data directory (overrides SQUAD_STATS_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether the cached stats reflect the current match log
    Status,

    /// Print the player stats table, recomputing first if it is stale
    Stats {
        /// Recompute even if the cached stats are valid
        #[arg(long, default_value = "false")]
        refresh: bool,

        #[arg(long, value_enum, default_value = "win-pct")]
        sort: SortKey,
    },

    /// Rebuild stats, form history and the match count marker
    Recompute,

    /// Print recent results for one or more players
    Form {
        /// Player id (repeatable)
        #[arg(long = "player", required = true)]
        players: Vec<u32>,

        /// Number of most recent matches (defaults to SQUAD_STATS_FORM_WINDOW)
        #[arg(long)]
        window: Option<usize>,
    },

    /// Validate a CSV and copy it into the data directory
    Import {
        /// match-data or player-keys
        kind: InputKind,

        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortKey {
    Name,
    Matches,
    WinPct,
    GoalDiff,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    if let Some(dir) = cli.data_dir.as_deref() {
        config = config.rebase(dir);
    }
    let cache = StatsCache::new(config);

    match cli.command {
        Commands::Status => {
            println!("Status: {}", cache.status());
            if let Some(marker) = cache.store().load_marker() {
                println!("Stats based on match id: {marker}");
            }
        }
        Commands::Stats { refresh, sort } => {
            let result = if refresh {
                cache.recompute()
            } else {
                cache.access()
            };
            let Some(snapshot) = served(result)? else {
                return Ok(());
            };
            print_table(&snapshot, sort, cache.config().form_window);
        }
        Commands::Recompute => {
            let Some(snapshot) = served(cache.recompute())? else {
                return Ok(());
            };
            println!(
                "Recomputed stats for {} players (through match {})",
                snapshot.stats.len(),
                snapshot.marker.unwrap_or_default()
            );
        }
        Commands::Form { players, window } => {
            let Some(snapshot) = served(cache.access())? else {
                return Ok(());
            };
            let window = window.unwrap_or(cache.config().form_window).max(1);
            print_form(&snapshot, &players, window);
        }
        Commands::Import { kind, file } => {
            let dest = kind.destination(&cache.config().inputs).to_path_buf();
            let summary = import_csv(kind, &file, &dest)
                .with_context(|| format!("import {kind} from {}", file.display()))?;
            cache.invalidate();
            println!("Imported {} rows into {}", summary.rows, summary.dest.display());
            if let Some(max_id) = summary.max_match_id {
                println!("Latest match id: {max_id}");
            }
            println!("Status: {}", cache.status());
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Turns "no data yet" into an upload prompt instead of an error exit.
fn served(result: Result<Arc<Snapshot>, StatsError>) -> Result<Option<Arc<Snapshot>>> {
    match result {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(err) if err.is_not_configured() => {
            println!("No data available: {err}");
            println!(
                "Upload inputs with `squad_stats import match-data <file>` \
                 and `squad_stats import player-keys <file>`."
            );
            Ok(None)
        }
        Err(err) => Err(err).context("player stats could not be loaded or computed"),
    }
}

fn print_table(snapshot: &Snapshot, sort: SortKey, form_window: usize) {
    let mut rows: Vec<&PlayerStats> = snapshot.stats.iter().collect();
    rows.sort_by(|a, b| compare(a, b, sort).then(a.player_id.cmp(&b.player_id)));

    println!(
        "{:<20} {:>4} {:>4} {:>4} {:>4} {:>5} {:>5} {:>5} {:>6} {:>6} {:>6}  Form",
        "Player", "P", "W", "D", "L", "GF", "GA", "GD", "W%", "D%", "L%"
    );
    for p in rows {
        println!(
            "{:<20} {:>4} {:>4} {:>4} {:>4} {:>5} {:>5} {:>+5} {:>6.1} {:>6.1} {:>6.1}  {}",
            p.display_name(),
            p.total_matches,
            p.total_wins,
            p.total_draws,
            p.total_losses,
            p.total_goals_for,
            p.total_goals_against,
            p.goal_difference(),
            p.win_pct,
            p.draw_pct,
            p.loss_pct,
            snapshot.form.form_string(p.player_id, form_window)
        );
    }
    println!(
        "{} players, computed through match {} ({})",
        snapshot.stats.len(),
        snapshot.marker.map_or_else(|| "?".to_string(), |m| m.to_string()),
        snapshot.loaded_at.format("%Y-%m-%d %H:%M UTC")
    );
}

fn compare(a: &PlayerStats, b: &PlayerStats, sort: SortKey) -> Ordering {
    match sort {
        SortKey::Name => a.display_name().cmp(&b.display_name()),
        SortKey::Matches => b.total_matches.cmp(&a.total_matches),
        SortKey::WinPct => b.win_pct.total_cmp(&a.win_pct),
        SortKey::GoalDiff => b.goal_difference().cmp(&a.goal_difference()),
    }
}

fn print_form(snapshot: &Snapshot, players: &[u32], window: usize) {
    println!("Form over last {window} matches (oldest -> recent)");
    for row in snapshot.form.window_table(players, window) {
        let name = snapshot
            .player(row.player_id)
            .map(PlayerStats::display_name)
            .unwrap_or_else(|| format!("#{}", row.player_id));
        if row.cells.iter().all(Option::is_none) {
            println!("{name:<20} no matches recorded");
            continue;
        }
        let cells = row
            .cells
            .iter()
            .map(|cell| match cell {
                Some((match_id, outcome)) => format!("{}({match_id})", outcome.letter()),
                None => "-".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        println!("{name:<20} {cells}");
    }
}
