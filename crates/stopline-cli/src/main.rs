//! stopline - run a gated deployment pipeline from a definition file.
//!
//! Exit code 0 iff every gate passed; this exit code is the only contract
//! the surrounding CI system needs.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use stopline_pipeline::{summarize, PipelineSpec};

#[derive(Parser)]
#[command(name = "stopline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Staged pipeline orchestrator with gated promotion", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline and print its report
    Run {
        /// Path to the pipeline definition (JSON)
        #[arg(short, long)]
        spec: PathBuf,

        /// Optional path to write the serialized run (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a pipeline definition and print its identity digest
    Validate {
        /// Path to the pipeline definition (JSON)
        #[arg(short, long)]
        spec: PathBuf,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Run the pipeline defined at `spec`, print its report, and return
/// whether every gate passed.
async fn cmd_run(spec: &Path, output: Option<&Path>) -> Result<bool> {
    let definition = PipelineSpec::from_file(spec)
        .with_context(|| format!("loading pipeline definition {}", spec.display()))?;
    info!(
        pipeline = %definition.name,
        stages_digest = %definition.stages_digest(),
        "loaded pipeline definition"
    );

    let run = definition.into_pipeline()?.run().await;

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&run)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing run to {}", path.display()))?;
        info!(path = %path.display(), "wrote serialized run");
    }

    println!("{}", summarize(&run));
    Ok(run.passed())
}

/// Validate the definition at `spec` and render its summary.
fn cmd_validate(spec: &Path) -> Result<String> {
    let definition = PipelineSpec::from_file(spec)
        .with_context(|| format!("loading pipeline definition {}", spec.display()))?;
    Ok(format!(
        "pipeline:      {}\ngates:         {}\nstages:        {}\nstages_digest: {}",
        definition.name,
        definition.gates.len(),
        definition.stage_names().len(),
        definition.stages_digest()
    ))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    match cli.command {
        Commands::Run { spec, output } => {
            let passed = cmd_run(&spec, output.as_deref()).await?;
            if passed {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }

        Commands::Validate { spec } => {
            println!("{}", cmd_validate(&spec)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
