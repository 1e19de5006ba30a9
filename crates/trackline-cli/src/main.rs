mod batch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use trackline_client::{TracklineConfig, build_tracker};
use trackline_core::{Mode, Tracker, TrackingRequest};

#[derive(Parser)]
#[command(
    name = "trackline",
    version,
    about = "Shipment tracking across the Cargoes Flow API and carrier websites"
)]
struct Cli {
    /// LLM model used to interpret tracking data
    #[arg(long, global = true, env = "TRACKLINE_MODEL")]
    model: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, global = true, env = "TRACKLINE_BASE_URL")]
    base_url: Option<String>,

    /// Show the browser window instead of running headless
    #[arg(long, global = true, default_value_t = false)]
    headed: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track one shipment and print the report as JSON
    Track {
        /// Container number, bill of lading or air waybill
        #[arg(short, long)]
        id: String,

        /// Transport mode: air or sea
        #[arg(short, long, default_value = "air")]
        mode: Mode,

        /// Carrier or airline name used to pick a website driver
        #[arg(short, long, default_value = "")]
        carrier: String,
    },

    /// Track every shipment in a CSV manifest
    Batch {
        /// Manifest with a tracking number column (header row optional)
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the results CSV (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trackline=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = TracklineConfig::from_env().context("Invalid configuration")?;
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(base_url) = cli.base_url {
        config.llm_base_url = base_url;
    }
    if cli.headed {
        config.headless = false;
    }

    if !config.fast_path_configured() {
        tracing::info!("Cargoes Flow credentials not set; tracking through carrier websites only");
    }

    let tracker = build_tracker(&config).context("Failed to build tracker")?;

    match cli.command {
        Commands::Track { id, mode, carrier } => cmd_track(&tracker, &id, mode, carrier).await?,
        Commands::Batch { input, output } => {
            cmd_batch(&tracker, &input, output.as_deref()).await?
        }
    }

    Ok(())
}

async fn cmd_track<T: Tracker>(tracker: &T, id: &str, mode: Mode, carrier: String) -> Result<()> {
    let request = TrackingRequest::new(id, mode, carrier)?;
    let report = tracker.track(request).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_batch<T: Tracker>(tracker: &T, input: &Path, output: Option<&Path>) -> Result<()> {
    let rows = batch::read_manifest_file(input)?;
    if rows.is_empty() {
        anyhow::bail!("No tracking numbers found in {}", input.display());
    }
    tracing::info!(rows = rows.len(), input = %input.display(), "Manifest loaded");

    let outcomes = batch::track_all(tracker, rows).await;
    let changed = outcomes.iter().filter(|o| o.eta_changed == "YES").count();

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            batch::write_outcomes(file, &outcomes)?;
            tracing::info!(output = %path.display(), "Results written");
        }
        None => batch::write_outcomes(std::io::stdout().lock(), &outcomes)?,
    }

    tracing::info!(total = outcomes.len(), eta_changed = changed, "Batch complete");
    Ok(())
}
