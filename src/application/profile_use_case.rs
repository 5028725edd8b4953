// ============================================================
// Layer 2 — ProfileUseCase
// ============================================================
// Runs a synthetic training job with the memory profiler
// attached and returns what it reported:
//
//   Step 1: Save config next to the CSV log   (Layer 6 - infra)
//   Step 2: Build the model                   (Layer 5 - runtime/ml)
//   Step 3: Attach the profiler               (Layer 4 - profiler)
//   Step 4: Epoch loop                        (Layer 5 - runtime/ml)
//             forward → backward → record_step → zero_grad
//           end_epoch() after each epoch
//
// Two engines execute the job:
//   sim  — the simulated device runtime (real allocator counters,
//          aliasing outputs, intermediate gradients)
//   burn — an MLP on burn's Autodiff<NdArray> backend
//
// Reference: Rust Book §13 (Iterators and Closures)

use anyhow::{Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr};

use crate::infra::config_store::ConfigStore;
use crate::profiler::lifecycle::{MemoryProfiler, MemoryReport, ProfilerConfig};
use crate::runtime::{build_model, ModelSpec};

// ─── Engine ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Sim,
    Burn,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Sim  => f.write_str("sim"),
            Engine::Burn => f.write_str("burn"),
        }
    }
}

impl FromStr for Engine {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sim"  => Ok(Engine::Sim),
            "burn" => Ok(Engine::Burn),
            other  => anyhow::bail!("unknown engine '{other}' (expected sim or burn)"),
        }
    }
}

// ─── ProfileConfig ────────────────────────────────────────────────────────────
// Serialize + Deserialize let ConfigStore write it next to the
// CSV log and `profile --config` read it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub engine:       Engine,
    pub epochs:       usize,
    /// Training steps per epoch
    pub iterations:   usize,
    pub batch_size:   usize,
    /// Each step's batch has batch_size ± up to this many rows
    pub batch_jitter: usize,
    /// Learning rate (burn engine only)
    pub lr:           f64,
    pub seed:         u64,
    pub model:        ModelSpec,
    pub profiler:     ProfilerConfig,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            engine:       Engine::Sim,
            epochs:       2,
            iterations:   20,
            batch_size:   64,
            batch_jitter: 0,
            lr:           1e-3,
            seed:         42,
            model:        ModelSpec::default(),
            profiler:     ProfilerConfig::default(),
        }
    }
}

/// What a profiled run produced.
#[derive(Debug, Clone, Default)]
pub struct ProfileSummary {
    pub steps:       usize,
    pub reports:     usize,
    pub last_report: Option<MemoryReport>,
    pub log_path:    Option<PathBuf>,
}

/// Rows in the next batch: uniform in
/// [batch_size - jitter, batch_size + jitter], never below 1.
pub fn batch_rows(rng: &mut impl Rng, batch_size: usize, jitter: usize) -> usize {
    if jitter == 0 {
        return batch_size.max(1);
    }
    let low = batch_size.saturating_sub(jitter).max(1);
    rng.gen_range(low..=batch_size + jitter)
}

// ─── ProfileUseCase ───────────────────────────────────────────────────────────
pub struct ProfileUseCase {
    config: ProfileConfig,
}

impl ProfileUseCase {
    pub fn new(config: ProfileConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<ProfileSummary> {
        let cfg = &self.config;

        // ── Step 1: Save config for this run ──────────────────────────────────
        if cfg.profiler.log_to_file {
            match ConfigStore::new(&cfg.profiler.output_dir).save(cfg) {
                Ok(path) => tracing::info!("Run config saved to '{}'", path.display()),
                Err(e) => tracing::warn!("Could not save run config: {:#}", e),
            }
        }

        tracing::info!(
            "Profiling {} epochs × {} iterations on the {} engine",
            cfg.epochs,
            cfg.iterations,
            cfg.engine
        );

        match cfg.engine {
            Engine::Sim  => self.run_sim(),
            Engine::Burn => crate::ml::trainer::run_profiled_training(cfg),
        }
    }

    fn run_sim(&self) -> Result<ProfileSummary> {
        let cfg = &self.config;

        // ── Step 2: Build the simulated model ─────────────────────────────────
        let mut model = build_model(&cfg.model).context("Cannot build the simulated model")?;

        // ── Step 3: Attach the profiler ───────────────────────────────────────
        let mut profiler = MemoryProfiler::new(&mut model, cfg.profiler.clone())?;

        // ── Step 4: Epoch loop ────────────────────────────────────────────────
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut summary = ProfileSummary::default();

        for epoch in 1..=cfg.epochs {
            for _ in 0..cfg.iterations {
                let rows = batch_rows(&mut rng, cfg.batch_size, cfg.batch_jitter);
                let x = model.input(&[rows, cfg.model.input_features]);

                model.forward(x, &mut profiler)?;
                model.backward(&mut profiler)?;

                summary.steps += 1;
                if let Some(report) = profiler.record_step(&model, &model)? {
                    summary.reports += 1;
                    summary.last_report = Some(report);
                }
                model.zero_grad();
            }
            tracing::debug!("Finished epoch {}/{}", epoch, cfg.epochs);
            profiler.end_epoch();
        }

        summary.log_path = profiler.log_path().map(|p| p.to_path_buf());
        Ok(summary)
    }
}
