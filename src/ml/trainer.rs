// ============================================================
// Layer 5 — Profiled Training Loop (burn)
// ============================================================
// A synthetic regression job on MlpModel<Autodiff<NdArray>>
// with the memory profiler attached through BurnHost.
//
// Per step:
//   forward_observed → loss = mean(out²) → backward
//   → BurnHost::observe_backward → Adam step → refresh → record_step
//
// Key burn insight:
//   - GradientsParams::from_grads consumes the gradients, so the
//     adapter must read them before the optimizer step
//   - the optimizer returns a new model; the snapshot is refreshed
//     from it before the profiler re-scans
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::Distribution,
};
use rand::{rngs::StdRng, SeedableRng};

use crate::application::profile_use_case::{batch_rows, ProfileConfig, ProfileSummary};
use crate::ml::adapter::BurnHost;
use crate::ml::model::{MlpConfig, MlpModel};
use crate::profiler::lifecycle::MemoryProfiler;
use crate::runtime::ModelSpec;

type MyBackend = burn::backend::Autodiff<burn::backend::NdArray>;

fn mlp_config(spec: &ModelSpec) -> MlpConfig {
    MlpConfig::new(spec.input_features, spec.hidden.clone(), spec.output_features).with_bias(spec.bias)
}

/// An untrained model's snapshot, for inspection.
pub fn build_host(spec: &ModelSpec) -> BurnHost {
    let device = burn::backend::ndarray::NdArrayDevice::default();
    let model: MlpModel<burn::backend::NdArray> = mlp_config(spec).init(&device);
    BurnHost::new(&model)
}

pub fn run_profiled_training(cfg: &ProfileConfig) -> Result<ProfileSummary> {
    let device = burn::backend::ndarray::NdArrayDevice::default();
    tracing::info!("Using NdArray device: {:?}", device);

    // ── Build model ───────────────────────────────────────────────────────────
    let mut model: MlpModel<MyBackend> = mlp_config(&cfg.model).init(&device);
    tracing::info!(
        "Model ready: {} hidden layers, {} → {}",
        cfg.model.hidden.len(),
        cfg.model.input_features,
        cfg.model.output_features,
    );

    // ── Instrument ────────────────────────────────────────────────────────────
    let mut host = BurnHost::new(&model);
    let mut profiler = MemoryProfiler::new(&mut host, cfg.profiler.clone())?;

    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut summary = ProfileSummary::default();

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        let mut loss_sum = 0.0f64;

        for _ in 0..cfg.iterations {
            let rows = batch_rows(&mut rng, cfg.batch_size, cfg.batch_jitter);
            let x = Tensor::<MyBackend, 2>::random(
                [rows, cfg.model.input_features],
                Distribution::Default,
                &device,
            );

            let out = model.forward_observed(x, |path, t| host.observe_forward(path, t, &mut profiler));
            let loss = out.powf_scalar(2.0).mean();
            loss_sum += loss.clone().into_scalar().elem::<f64>();

            let grads = loss.backward();
            host.observe_backward(&model, &grads, &mut profiler);
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
            host.refresh(&model);

            summary.steps += 1;
            if let Some(report) = profiler.record_step(&host, &host)? {
                summary.reports += 1;
                summary.last_report = Some(report);
            }
        }

        let avg_loss = if cfg.iterations > 0 { loss_sum / cfg.iterations as f64 } else { f64::NAN };
        println!("Epoch {:>3}/{} | loss={:.4}", epoch, cfg.epochs, avg_loss);
        profiler.end_epoch();
    }

    summary.log_path = profiler.log_path().map(|p| p.to_path_buf());
    tracing::info!("Profiled training complete ({} steps)", summary.steps);
    Ok(summary)
}
