use std::collections::HashSet;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use breachfeed::config::{load_settings, Settings};
use breachfeed::models::{Agency, BreachRecord};
use breachfeed::pipeline::{Pipeline, PipelineEvent, SourceOutcome};
use breachfeed::view::{self, DisplayRow, COLUMN_LABELS};
use breachfeed::{server, sources};

#[derive(Parser)]
#[command(
    name = "breachfeed",
    version,
    about = "Recently reported data breaches from state and federal sources"
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web dashboard
    Serve {
        /// Address to bind (default from config, else 127.0.0.1)
        #[arg(long, env = "BREACHFEED_HOST")]
        host: Option<String>,
        /// Port to listen on (default from config, else 8501)
        #[arg(short, long, env = "BREACHFEED_PORT")]
        port: Option<u16>,
    },
    /// Run the pipeline once and print the feed
    Fetch {
        /// Look-back window in days
        #[arg(short, long)]
        days: Option<u32>,
        /// Print the whole feed instead of the recent window
        #[arg(long)]
        all: bool,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
        /// Only fetch these sources (agency codes, repeatable)
        #[arg(short, long = "source", value_name = "CODE")]
        sources: Vec<String>,
    },
    /// List configured sources
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "breachfeed=debug"
    } else {
        "breachfeed=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut settings = load_settings().await;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| settings.host.clone());
            let port = port.unwrap_or(settings.port);
            server::serve(&settings, &host, port).await
        }
        Commands::Fetch {
            days,
            all,
            json,
            sources,
        } => {
            if !sources.is_empty() {
                restrict_sources(&mut settings, &sources)?;
            }
            let days = days.unwrap_or(settings.window_days);
            cmd_fetch(&settings, days, all, json).await
        }
        Commands::Sources => {
            cmd_sources(&settings);
            Ok(())
        }
    }
}

/// Disable every source not named on the command line.
fn restrict_sources(settings: &mut Settings, codes: &[String]) -> anyhow::Result<()> {
    let wanted = codes
        .iter()
        .map(|code| code.parse::<Agency>().map_err(anyhow::Error::msg))
        .collect::<anyhow::Result<HashSet<Agency>>>()?;
    for agency in Agency::ALL {
        if !wanted.contains(&agency) {
            settings.disabled_sources.insert(agency);
        }
    }
    Ok(())
}

async fn cmd_fetch(settings: &Settings, days: u32, all: bool, json: bool) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_settings(settings).context("Failed to set up fetchers")?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));

    let progress = pb.clone();
    let result = pipeline
        .run_with_events(move |event| match event {
            PipelineEvent::SourceStarted(agency) => {
                progress.set_message(format!("Fetching {}...", agency.name()));
            }
            PipelineEvent::SourceFinished { agency, outcome } => match outcome {
                SourceOutcome::Loaded(count) => progress.println(format!(
                    "{} {} ({} records)",
                    style("✓").green(),
                    agency.name(),
                    count
                )),
                SourceOutcome::Failed(error) => progress.println(format!(
                    "{} {}: {}",
                    style("✗").red(),
                    agency.name(),
                    style(error).dim()
                )),
            },
        })
        .await;
    pb.finish_and_clear();

    let feed = result?;
    if feed.is_empty() && !json {
        println!(
            "{}",
            style("No data was collected. Please check your internet connection and try again.")
                .yellow()
        );
        return Ok(());
    }
    let since = view::window_start(Local::now().date_naive(), days);
    let records: Vec<&BreachRecord> = if all {
        feed.records.iter().collect()
    } else {
        view::recent(&feed.records, since)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No breaches reported in the last {} days.", days);
        return Ok(());
    }

    if all {
        println!("{}", style(format!("Showing all {} breaches", records.len())).bold());
    } else {
        println!(
            "{}",
            style(format!(
                "Showing {} breaches reported since {}",
                records.len(),
                since.format("%Y-%m-%d")
            ))
            .bold()
        );
    }
    let rows: Vec<DisplayRow> = records.into_iter().map(DisplayRow::from).collect();
    print_table(&rows);
    Ok(())
}

fn print_table(rows: &[DisplayRow]) {
    let mut widths = COLUMN_LABELS.map(|label| label.chars().count());
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row.cells()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: [&str; 6]| {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", style(line(COLUMN_LABELS)).bold());
    for row in rows {
        println!("{}", line(row.cells()).trim_end());
    }
}

fn cmd_sources(settings: &Settings) {
    let enabled: HashSet<Agency> = settings.sources().iter().map(|s| s.agency).collect();
    for spec in sources::all() {
        let url = settings
            .source_urls
            .get(&spec.agency)
            .cloned()
            .unwrap_or_else(|| spec.url.clone());
        let status = if enabled.contains(&spec.agency) {
            style("enabled").green()
        } else {
            style("disabled").yellow()
        };
        println!(
            "{:<4} {:<42} {:<22} {}",
            style(spec.agency.code()).bold(),
            spec.agency.name(),
            spec.fetch.label(),
            status
        );
        println!("     {}", style(url).dim());
    }
}
