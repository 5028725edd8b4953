// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `profile` — runs a profiled synthetic training job
//   2. `inspect` — prints the component tree and weight table
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InspectArgs, ProfileArgs};

use crate::application::profile_use_case::ProfileConfig;
use crate::infra::config_store::ConfigStore;

/// The main CLI struct; clap generates the argument parsing
/// from its fields via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "layer-mem-profiler",
    version = "0.1.0",
    about = "Attribute accelerator memory to weights, activations and gradients per layer."
)]
pub struct Cli {
    /// The subcommand to run (profile or inspect)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Profile(args) => run_profile(args),
            Commands::Inspect(args) => run_inspect(args),
        }
    }
}

/// Handles the `profile` subcommand.
fn run_profile(args: ProfileArgs) -> Result<()> {
    use crate::application::profile_use_case::ProfileUseCase;

    let config = match args.config.clone() {
        Some(path) => ConfigStore::load(&path)?,
        None => ProfileConfig::try_from(args)?,
    };

    let summary = ProfileUseCase::new(config).execute()?;

    println!(
        "Profiled {} steps, {} reports.",
        summary.steps, summary.reports
    );
    if let Some(path) = &summary.log_path {
        println!("Memory stats written to {}", path.display());
    }
    Ok(())
}

/// Handles the `inspect` subcommand.
fn run_inspect(args: InspectArgs) -> Result<()> {
    use crate::application::inspect_use_case::InspectUseCase;

    let config = match args.config.clone() {
        Some(path) => ConfigStore::load(&path)?,
        None => ProfileConfig::try_from(args)?,
    };

    println!("{}", InspectUseCase::new(config).execute()?);
    Ok(())
}
