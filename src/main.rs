mod api;
mod audio;
mod books;
mod catalog;
mod commands;
mod config;
mod error;
mod extract;
mod reconcile;
mod store;
mod week;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "mwb_audio", about = "Meeting workbook MP3 links to CSV")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append newly published workbook weeks to the workbook CSV
    Workbook,
    /// Scrape each week's page and write Bible reading and lesson MP3s
    Sections {
        /// Take the week list from the API instead of the workbook CSV
        #[arg(long)]
        from_api: bool,
        /// Year of the first listed week (default: inferred from the data)
        #[arg(long)]
        start_year: Option<i32>,
    },
    /// Write the sections CSV from the schedule file instead of scraping
    Schedule,
    /// Print label,page_url,mp3_url rows for arbitrary pages
    Extract {
        /// Page URLs to scan
        urls: Vec<String>,
        /// Text file with one URL per line
        #[arg(long)]
        from_file: Option<PathBuf>,
        /// HTTP timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
    /// Print both CSVs as JSON keyed by week start date
    Overrides {
        /// Year of the first listed week (default: inferred from the data)
        #[arg(long)]
        start_year: Option<i32>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    tracing::debug!(?settings, "loaded settings");

    // stdout carries data for these two
    let quiet = matches!(cli.command, Commands::Extract { .. } | Commands::Overrides { .. });

    let result = match cli.command {
        Commands::Workbook => {
            let stats = commands::workbook(&settings)?;
            if stats.added.is_empty() {
                println!(
                    "No new weeks ({} found across {} issues).",
                    stats.found, stats.issues
                );
            } else {
                println!(
                    "Added {} new weeks to {} ({} found across {} issues).",
                    stats.added.len(),
                    settings.workbook_csv.display(),
                    stats.found,
                    stats.issues
                );
            }
            Ok(())
        }
        Commands::Sections { from_api, start_year } => {
            let stats = commands::sections(&settings, from_api, start_year)?;
            println!(
                "Wrote {} rows for {}/{} weeks to {}.",
                stats.rows,
                stats.planned,
                stats.weeks,
                settings.sections_csv.display()
            );
            Ok(())
        }
        Commands::Schedule => {
            let stats = commands::schedule(&settings)?;
            println!(
                "Wrote {} rows for {} scheduled weeks to {}.",
                stats.rows,
                stats.weeks,
                settings.sections_csv.display()
            );
            Ok(())
        }
        Commands::Extract { urls, from_file, timeout } => {
            let stats = commands::extract(&settings, urls, from_file.as_deref(), timeout)?;
            eprintln!(
                "{} links from {} pages ({} failed).",
                stats.links, stats.pages, stats.failed
            );
            Ok(())
        }
        Commands::Overrides { start_year } => {
            let overrides = commands::overrides(&settings, start_year)?;
            println!("{}", serde_json::to_string_pretty(&overrides)?);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if !quiet && elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
