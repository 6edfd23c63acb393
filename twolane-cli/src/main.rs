use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use twolane_hcm::{AnalysisOptions, Facility, FacilityDescriptor, constraints_json};
use twolane_report::FacilityReport;

#[derive(Parser, Debug)]
#[command(name = "twolane", author, version, about, long_about = None)]
struct Cli {
    /// Path to a facility description (JSON)
    #[arg(long, env = "TWOLANE_FACILITY_FILE", global = true)]
    facility_file: Option<PathBuf>,

    /// Subcommand/tool to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyse the facility and print a report of every segment
    Analyze {
        /// Analyse segments one at a time rather than in parallel
        #[arg(long)]
        sequential: bool,
        /// Print the report on a single line
        #[arg(long)]
        compact: bool,
    },
    /// Print the valid input ranges and lookup tables
    Constraints,
}

fn load_facility(path: &Path) -> anyhow::Result<Facility> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read facility at {}", path.display()))?;
    let descriptor: FacilityDescriptor =
        serde_json::from_slice(&bytes).context("Invalid JSON in facility description")?;
    info!(
        path = path.to_str(),
        segments = descriptor.segments.len(),
        "Loaded facility"
    );
    Facility::from_descriptor(descriptor)
        .with_context(|| format!("Invalid facility at {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        // Standard logger, configured via the RUST_LOG env variable
        .with(tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            sequential,
            compact,
        } => {
            let path = cli.facility_file.ok_or_else(|| {
                anyhow!("No facility given. Pass --facility-file or set TWOLANE_FACILITY_FILE.")
            })?;
            let mut facility = load_facility(&path)?;
            let results = facility
                .analyze(&AnalysisOptions {
                    parallel: !sequential,
                })
                .context("Analysis failed")?;

            let report = FacilityReport::from_results(&facility, &results);
            let output = if compact {
                serde_json::to_string(&report)?
            } else {
                serde_json::to_string_pretty(&report)?
            };
            println!("{output}");
            Ok(())
        }
        Commands::Constraints => {
            println!("{}", constraints_json());
            Ok(())
        }
    }
}
