// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `profile` and `inspect`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::profile_use_case::{Engine, ProfileConfig};
use crate::profiler::lifecycle::ProfilerConfig;
use crate::profiler::units::MemoryUnit;
use crate::runtime::ModelSpec;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a synthetic training job with the memory profiler attached
    Profile(ProfileArgs),

    /// Print the component tree and parameter sizes of the model
    Inspect(InspectArgs),
}

/// Model shape, shared by both commands
#[derive(Args, Debug)]
pub struct ModelArgs {
    /// Runtime executing the model: sim or burn
    #[arg(long, default_value = "sim")]
    pub engine: String,

    /// Features per input row
    #[arg(long, default_value_t = 784)]
    pub input_features: usize,

    /// Hidden layer widths, comma separated
    #[arg(long, value_delimiter = ',', default_values_t = vec![1024, 1024])]
    pub hidden: Vec<usize>,

    /// Features per output row
    #[arg(long, default_value_t = 10)]
    pub output_features: usize,

    /// How often the shared block runs per forward (sim engine)
    #[arg(long, default_value_t = 2)]
    pub repeats: usize,

    /// Bytes per element, 4 = f32, 2 = f16 (sim engine)
    #[arg(long, default_value_t = 4)]
    pub element_size: u64,

    /// Build Linear layers without bias
    #[arg(long)]
    pub no_bias: bool,
}

impl ModelArgs {
    fn spec(&self) -> ModelSpec {
        ModelSpec {
            input_features:       self.input_features,
            hidden:               self.hidden.clone(),
            output_features:      self.output_features,
            shared_block_repeats: self.repeats,
            element_size:         self.element_size,
            bias:                 !self.no_bias,
        }
    }
}

/// All arguments for the `profile` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Number of epochs
    #[arg(long, default_value_t = 2)]
    pub epochs: usize,

    /// Training steps per epoch
    #[arg(long, default_value_t = 20)]
    pub iterations: usize,

    /// Rows per batch
    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Vary each batch by up to this many rows
    #[arg(long, default_value_t = 0)]
    pub batch_jitter: usize,

    /// Learning rate (burn engine)
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Seed for the batch-size jitter
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Report every N iterations
    #[arg(long, default_value_t = 10)]
    pub print_period: usize,

    /// Also append every report to a timestamped CSV file
    #[arg(long)]
    pub log: bool,

    /// Directory for the CSV log and the saved run config
    #[arg(long, default_value = "memory_logs")]
    pub output_dir: PathBuf,

    /// Unit of every reported figure: B, KB, MB or GB
    #[arg(long, default_value = "MB")]
    pub unit: String,

    /// Load the whole run configuration from a saved JSON file;
    /// all other flags are ignored
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Convert CLI ProfileArgs into the application-layer ProfileConfig.
/// This is the boundary between Layer 1 and Layer 2;
/// the application layer never sees clap types.
impl TryFrom<ProfileArgs> for ProfileConfig {
    type Error = anyhow::Error;

    fn try_from(a: ProfileArgs) -> Result<Self> {
        Ok(ProfileConfig {
            engine:       a.model.engine.parse::<Engine>()?,
            epochs:       a.epochs,
            iterations:   a.iterations,
            batch_size:   a.batch_size,
            batch_jitter: a.batch_jitter,
            lr:           a.lr,
            seed:         a.seed,
            model:        a.model.spec(),
            profiler: ProfilerConfig {
                print_period: a.print_period,
                log_to_file:  a.log,
                output_dir:   a.output_dir,
                unit:         a.unit.parse::<MemoryUnit>()?,
            },
        })
    }
}

/// All arguments for the `inspect` command
#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Unit of the parameter sizes: B, KB, MB or GB
    #[arg(long, default_value = "MB")]
    pub unit: String,

    /// Take the model from a saved run configuration instead
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl TryFrom<InspectArgs> for ProfileConfig {
    type Error = anyhow::Error;

    fn try_from(a: InspectArgs) -> Result<Self> {
        let mut cfg = ProfileConfig {
            engine: a.model.engine.parse::<Engine>()?,
            model:  a.model.spec(),
            ..ProfileConfig::default()
        };
        cfg.profiler.unit = a.unit.parse::<MemoryUnit>()?;
        Ok(cfg)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn profile_args(argv: &[&str]) -> ProfileArgs {
        let cli = Cli::try_parse_from(argv.iter().copied()).unwrap();
        match cli.command {
            Commands::Profile(args) => args,
            other => panic!("expected profile, got {other:?}"),
        }
    }

    #[test]
    fn test_profile_defaults_match_config_defaults() {
        let cfg = ProfileConfig::try_from(profile_args(&["layer-mem-profiler", "profile"])).unwrap();
        assert_eq!(cfg, ProfileConfig::default());
    }

    #[test]
    fn test_profile_flags() {
        let args = profile_args(&[
            "layer-mem-profiler", "profile",
            "--engine", "burn",
            "--hidden", "64,32,16",
            "--print-period", "5",
            "--log",
            "--unit", "kb",
            "--no-bias",
        ]);
        let cfg = ProfileConfig::try_from(args).unwrap();
        assert_eq!(cfg.engine, Engine::Burn);
        assert_eq!(cfg.model.hidden, vec![64, 32, 16]);
        assert!(!cfg.model.bias);
        assert_eq!(cfg.profiler.print_period, 5);
        assert!(cfg.profiler.log_to_file);
        assert_eq!(cfg.profiler.unit, MemoryUnit::Kilobytes);
    }

    #[test]
    fn test_unknown_unit_is_fatal() {
        let args = profile_args(&["layer-mem-profiler", "profile", "--unit", "parsecs"]);
        assert!(ProfileConfig::try_from(args).is_err());
    }

    #[test]
    fn test_inspect_args() {
        let cli = Cli::try_parse_from(["layer-mem-profiler", "inspect", "--unit", "B"]).unwrap();
        let Commands::Inspect(args) = cli.command else {
            panic!("expected inspect");
        };
        let cfg = ProfileConfig::try_from(args).unwrap();
        assert_eq!(cfg.profiler.unit, MemoryUnit::Bytes);
        assert_eq!(cfg.model, ModelSpec::default());
    }
}
