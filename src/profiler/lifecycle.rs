// ============================================================
// Layer 4 — Memory Profiler (Reporting / Lifecycle Controller)
// ============================================================
// Owns the counters and decides when to report:
//
//   observe (callbacks) ──► Counting
//   record_step()       ──► iteration += 1
//                           every print_period-th step:
//                               Reporting → re-scan, render, log row
//                       ──► Idle
//   end_epoch()         ──► reset activations + gradients,
//                           iteration = 0, epoch += 1
//
// Reset policy: activation and gradient windows are cumulative
// over the whole epoch and are only cleared by end_epoch().
// record_step() never clears them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::error::{ProfilerError, ProfilerResult};
use crate::domain::parameter::TrackedParameter;
use crate::domain::tensor::TensorRecord;
use crate::domain::traits::{
    Component, DeviceMemory, DeviceMemorySnapshot, ExecutionObserver, HookHost, ParameterGradients,
};
use crate::infra::report::render_report;
use crate::infra::stats_log::StatsLog;
use crate::profiler::binder::{bind, Instrumentation};
use crate::profiler::ledger::MemoryLedger;
use crate::profiler::units::MemoryUnit;

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// Report every N recorded steps (N ≥ 1)
    pub print_period: usize,

    /// Append each report to a timestamped CSV in `output_dir`
    pub log_to_file: bool,

    /// Directory for the CSV log, created on demand
    pub output_dir: PathBuf,

    /// Unit for every reported figure
    pub unit: MemoryUnit,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            print_period: 10,
            log_to_file:  false,
            output_dir:   PathBuf::from("memory_logs"),
            unit:         MemoryUnit::Megabytes,
        }
    }
}

impl ProfilerConfig {
    pub fn validate(&self) -> ProfilerResult<()> {
        if self.print_period < 1 {
            return Err(ProfilerError::InvalidPrintPeriod(self.print_period));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfilerState {
    Idle,
    Counting,
    Reporting,
}

// ─── Report ───────────────────────────────────────────────────────────────────
/// Everything the profiler knows at one reported iteration, in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryReport {
    pub epoch:                       usize,
    pub iteration:                   usize,
    pub device:                      DeviceMemorySnapshot,
    pub activation_bytes:            u64,
    pub weight_bytes:                u64,
    pub weight_breakdown:            Vec<(String, u64)>,
    pub gradient_bytes:              u64,
    pub gradient_breakdown:          Vec<(String, u64)>,
    pub intermediate_gradient_bytes: u64,
}

impl MemoryReport {
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.weight_breakdown.iter().map(|(name, _)| name.as_str())
    }
}

// ─── MemoryProfiler ───────────────────────────────────────────────────────────
pub struct MemoryProfiler {
    config:          ProfilerConfig,
    iteration:       usize,
    epoch:           usize,
    state:           ProfilerState,
    ledger:          MemoryLedger,
    instrumentation: Instrumentation,
    stats_log:       Option<StatsLog>,
}

impl MemoryProfiler {
    /// Scans `model`'s parameters and registers hooks on every component.
    ///
    /// Fails with `InvalidPrintPeriod` before touching the model when
    /// `print_period < 1`. A log file that cannot be created only disables
    /// file logging.
    pub fn new<M: Component + HookHost>(model: &mut M, config: ProfilerConfig) -> ProfilerResult<Self> {
        config.validate()?;

        let mut ledger = MemoryLedger::new();
        ledger.rescan(&*model);
        let instrumentation = bind(model);

        let stats_log = if config.log_to_file {
            let names: Vec<String> = ledger.parameter_names().map(str::to_string).collect();
            match StatsLog::create(&config.output_dir, config.unit, names) {
                Ok(log) => Some(log),
                Err(e) => {
                    tracing::warn!("Memory stats logging disabled: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        tracing::info!(
            "Memory profiler ready: {} parameters, reporting every {} steps",
            ledger.tracked_parameters().len(),
            config.print_period
        );

        Ok(Self {
            config,
            iteration: 0,
            epoch: 1,
            state: ProfilerState::Idle,
            ledger,
            instrumentation,
            stats_log,
        })
    }

    /// Rebuilds the tracked parameter set from the current tree.
    pub fn gather_named_parameters(&mut self, root: &dyn Component) -> usize {
        self.ledger.rescan(root)
    }

    /// Marks the end of one training step. Returns the report when this
    /// step is a reporting step.
    pub fn record_step(
        &mut self,
        model:  &dyn Component,
        device: &dyn DeviceMemory,
    ) -> ProfilerResult<Option<MemoryReport>> {
        self.iteration += 1;

        if self.iteration % self.config.print_period != 0 {
            self.state = ProfilerState::Idle;
            return Ok(None);
        }

        self.state = ProfilerState::Reporting;
        self.ledger.rescan(model);
        let report = self.snapshot(device);
        self.state = ProfilerState::Idle;
        let report = report?;

        println!("{}", render_report(&report, self.config.unit));
        self.append_to_log(&report);
        Ok(Some(report))
    }

    /// Closes the current epoch: transient windows and gradient buckets are
    /// cleared, weights are kept.
    pub fn end_epoch(&mut self) {
        println!("Epoch {} complete ({} iterations)", self.epoch, self.iteration);
        tracing::info!(
            "Epoch {} closed: {} activation bytes, {} gradient bytes dropped",
            self.epoch,
            self.ledger.activation_bytes(),
            self.ledger.gradient_bytes()
        );

        self.ledger.reset_transient();
        self.iteration = 0;
        self.epoch += 1;
        self.state = ProfilerState::Idle;
    }

    /// Current figures without advancing any counter.
    pub fn snapshot(&self, device: &dyn DeviceMemory) -> ProfilerResult<MemoryReport> {
        let breakdown = |map: &indexmap::IndexMap<String, u64>| {
            map.iter().map(|(name, bytes)| (name.clone(), *bytes)).collect::<Vec<_>>()
        };

        Ok(MemoryReport {
            epoch:                       self.epoch,
            iteration:                   self.iteration,
            device:                      device.snapshot(),
            activation_bytes:            self.ledger.activation_bytes(),
            weight_bytes:                self.ledger.weight_bytes(),
            weight_breakdown:            breakdown(self.ledger.weight_breakdown()),
            gradient_bytes:              self.ledger.gradient_bytes(),
            gradient_breakdown:          breakdown(self.ledger.gradient_breakdown()),
            intermediate_gradient_bytes: self.ledger.intermediate_gradient_bytes()?,
        })
    }

    fn append_to_log(&mut self, report: &MemoryReport) {
        if let Some(log) = self.stats_log.as_mut() {
            if let Err(e) = log.append(report) {
                tracing::warn!("Memory stats logging disabled after write error: {:#}", e);
                self.stats_log = None;
            }
        }
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn state(&self) -> ProfilerState {
        self.state
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    pub fn instrumentation(&self) -> &Instrumentation {
        &self.instrumentation
    }

    pub fn tracked_parameters(&self) -> Vec<TrackedParameter> {
        self.ledger.tracked_parameters()
    }

    /// Path of the CSV log, if file logging is active
    pub fn log_path(&self) -> Option<&Path> {
        self.stats_log.as_ref().map(StatsLog::path)
    }
}

// ─── Callbacks ────────────────────────────────────────────────────────────────
impl ExecutionObserver for MemoryProfiler {
    fn post_forward(&mut self, component: &str, _inputs: &[TensorRecord], output: &TensorRecord) {
        self.state = ProfilerState::Counting;
        if self.ledger.on_forward(output) {
            tracing::trace!("activation {} from '{}': {} bytes", output.identity, component, output.size_bytes());
        }
    }

    fn post_backward(
        &mut self,
        component:    &str,
        grad_inputs:  &[Option<TensorRecord>],
        grad_outputs: &[Option<TensorRecord>],
        parameters:   &dyn ParameterGradients,
    ) {
        self.state = ProfilerState::Counting;
        self.ledger.on_backward(grad_inputs, grad_outputs, parameters);
        tracing::trace!("backward through '{}': {} gradient bytes so far", component, self.ledger.gradient_bytes());
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tensor::TensorIdentity;
    use crate::domain::traits::HookKind;
    use crate::domain::traits::HookHandle;
    use std::collections::HashMap;

    /// Two-layer model with fixed weights and settable gradients
    struct FakeLayer {
        name:   &'static str,
        weight: TensorRecord,
    }

    struct FakeModel {
        layers: Vec<FakeLayer>,
        grads:  HashMap<String, TensorRecord>,
        hooks:  Vec<HookHandle>,
    }

    impl Component for FakeLayer {
        fn kind(&self) -> &str {
            "Linear"
        }
        fn children(&self) -> Vec<(&str, &dyn Component)> {
            Vec::new()
        }
        fn parameters(&self) -> Vec<(&str, TensorRecord)> {
            vec![("weight", self.weight)]
        }
    }

    impl Component for FakeModel {
        fn kind(&self) -> &str {
            "Sequential"
        }
        fn children(&self) -> Vec<(&str, &dyn Component)> {
            self.layers.iter().map(|l| (l.name, l as &dyn Component)).collect()
        }
        fn parameters(&self) -> Vec<(&str, TensorRecord)> {
            Vec::new()
        }
    }

    impl HookHost for FakeModel {
        fn register_forward_hook(&mut self, path: &str) -> HookHandle {
            let handle = HookHandle { kind: HookKind::Forward, path: path.to_string(), id: self.hooks.len() as u64 };
            self.hooks.push(handle.clone());
            handle
        }
        fn register_backward_hook(&mut self, path: &str) -> HookHandle {
            let handle = HookHandle { kind: HookKind::Backward, path: path.to_string(), id: self.hooks.len() as u64 };
            self.hooks.push(handle.clone());
            handle
        }
    }

    impl ParameterGradients for FakeModel {
        fn gradient_of(&self, name: &str) -> Option<TensorRecord> {
            self.grads.get(name).copied()
        }
    }

    struct FixedCounters;

    impl DeviceMemory for FixedCounters {
        fn max_memory_allocated(&self) -> u64 { 9_000_000 }
        fn memory_allocated(&self) -> u64 { 8_000_000 }
        fn max_memory_reserved(&self) -> u64 { 12_000_000 }
        fn memory_reserved(&self) -> u64 { 10_000_000 }
    }

    fn tensor(slot: u64, bytes: u64) -> TensorRecord {
        TensorRecord::new(TensorIdentity::new(slot, 0), bytes / 4, 4)
    }

    fn two_layer(a_bytes: u64, b_bytes: u64) -> FakeModel {
        FakeModel {
            layers: vec![
                FakeLayer { name: "a", weight: tensor(1, a_bytes) },
                FakeLayer { name: "b", weight: tensor(2, b_bytes) },
            ],
            grads: HashMap::new(),
            hooks: Vec::new(),
        }
    }

    fn config(print_period: usize) -> ProfilerConfig {
        ProfilerConfig { print_period, ..ProfilerConfig::default() }
    }

    /// One forward + backward through both layers
    fn run_step(profiler: &mut MemoryProfiler, model: &mut FakeModel, base: u64) {
        let act_a = tensor(base, 1_000_000);
        let act_b = tensor(base + 1, 2_000_000);
        profiler.post_forward("a", &[], &act_a);
        profiler.post_forward("b", &[act_a], &act_b);

        let wa = model.layers[0].weight;
        let wb = model.layers[1].weight;
        model.grads.insert("a.weight".into(), tensor(base + 2, wa.size_bytes()));
        model.grads.insert("b.weight".into(), tensor(base + 3, wb.size_bytes()));

        let grad_b_in = tensor(base + 4, 1_000_000);
        profiler.post_backward("b", &[Some(grad_b_in)], &[None], &*model);
        profiler.post_backward("a", &[None], &[Some(grad_b_in)], &*model);
        profiler.post_backward("", &[None], &[None], &*model);
    }

    #[test]
    fn test_zero_print_period_fails_before_any_hook() {
        let mut model = two_layer(4, 4);
        let result = MemoryProfiler::new(&mut model, config(0));
        assert!(matches!(result, Err(ProfilerError::InvalidPrintPeriod(0))));
        assert!(model.hooks.is_empty());
    }

    #[test]
    fn test_binds_each_child_plus_model_backward() {
        let mut model = two_layer(4, 4);
        let profiler = MemoryProfiler::new(&mut model, config(1)).unwrap();
        assert_eq!(profiler.instrumentation().component_count(), 2);
        assert_eq!(model.hooks.len(), 5);
        assert_eq!(model.hooks.last().unwrap().path, "");
    }

    #[test]
    fn test_two_layer_scenario_in_whole_megabytes() {
        let mut model = two_layer(5_000_000, 3_000_000);
        let mut profiler = MemoryProfiler::new(&mut model, config(1)).unwrap();
        run_step(&mut profiler, &mut model, 100);

        let report = profiler.record_step(&model, &FixedCounters).unwrap().unwrap();
        assert_eq!(report.weight_bytes, 8_000_000);
        assert_eq!(
            report.weight_breakdown,
            vec![("a.weight".to_string(), 5_000_000), ("b.weight".to_string(), 3_000_000)]
        );
        assert_eq!(report.activation_bytes, 3_000_000);
        // Both parameter gradients plus the one intermediate gradient
        assert_eq!(report.gradient_bytes, 9_000_000);
        assert_eq!(report.intermediate_gradient_bytes, 1_000_000);
        assert_eq!(report.device.peak_allocated, 9_000_000);
    }

    #[test]
    fn test_small_layers_round_individually() {
        let mut model = two_layer(400_000, 200_000);
        let mut profiler = MemoryProfiler::new(&mut model, config(1)).unwrap();
        let report = profiler.record_step(&model, &FixedCounters).unwrap().unwrap();

        let unit = MemoryUnit::Megabytes;
        assert_eq!(unit.convert(report.weight_bytes), 1);
        assert!(report.weight_breakdown.iter().all(|(_, b)| unit.convert(*b) == 0));
    }

    #[test]
    fn test_weight_breakdown_sums_to_total() {
        let mut model = two_layer(123_456, 654_320);
        let mut profiler = MemoryProfiler::new(&mut model, config(1)).unwrap();
        let report = profiler.record_step(&model, &FixedCounters).unwrap().unwrap();
        let sum: u64 = report.weight_breakdown.iter().map(|(_, b)| b).sum();
        assert_eq!(sum, report.weight_bytes);
    }

    #[test]
    fn test_aliased_activation_counted_once() {
        let mut model = two_layer(4, 4);
        let mut profiler = MemoryProfiler::new(&mut model, config(1)).unwrap();
        let out = tensor(50, 4_000);
        profiler.post_forward("a", &[], &out);
        profiler.post_forward("b", &[out], &out);
        profiler.post_forward("a", &[], &out);
        assert_eq!(profiler.ledger().activation_bytes(), 4_000);
    }

    #[test]
    fn test_reports_only_on_period() {
        let mut model = two_layer(4, 4);
        let mut profiler = MemoryProfiler::new(&mut model, config(3)).unwrap();
        assert!(profiler.record_step(&model, &FixedCounters).unwrap().is_none());
        assert!(profiler.record_step(&model, &FixedCounters).unwrap().is_none());
        let report = profiler.record_step(&model, &FixedCounters).unwrap();
        assert_eq!(report.map(|r| r.iteration), Some(3));
        assert_eq!(profiler.state(), ProfilerState::Idle);
    }

    #[test]
    fn test_windows_accumulate_across_iterations() {
        let mut model = two_layer(4_000, 4_000);
        let mut profiler = MemoryProfiler::new(&mut model, config(1)).unwrap();
        run_step(&mut profiler, &mut model, 100);
        profiler.record_step(&model, &FixedCounters).unwrap();
        run_step(&mut profiler, &mut model, 200);
        let report = profiler.record_step(&model, &FixedCounters).unwrap().unwrap();
        assert_eq!(report.activation_bytes, 6_000_000);
    }

    #[test]
    fn test_end_epoch_resets_counters_and_transients() {
        let mut model = two_layer(4_000, 4_000);
        let mut profiler = MemoryProfiler::new(&mut model, config(2)).unwrap();
        run_step(&mut profiler, &mut model, 100);
        profiler.record_step(&model, &FixedCounters).unwrap();
        assert_eq!(profiler.state(), ProfilerState::Idle);

        profiler.end_epoch();
        assert_eq!(profiler.iteration(), 0);
        assert_eq!(profiler.epoch(), 2);
        assert_eq!(profiler.ledger().activation_bytes(), 0);
        assert_eq!(profiler.ledger().gradient_bytes(), 0);
        assert_eq!(profiler.ledger().weight_bytes(), 8_000);
        assert!(profiler.tracked_parameters().iter().all(|p| p.accumulated_grad_bytes == 0));
    }

    #[test]
    fn test_parameter_grad_in_lists_is_named_not_intermediate() {
        let mut model = two_layer(4_000, 4_000);
        let mut profiler = MemoryProfiler::new(&mut model, config(1)).unwrap();
        let grad = tensor(300, 4_000);
        model.grads.insert("a.weight".into(), grad);
        profiler.post_backward("a", &[Some(grad)], &[Some(grad)], &model);

        assert_eq!(profiler.ledger().gradient_bytes(), 4_000);
        assert_eq!(profiler.ledger().intermediate_gradient_bytes(), Ok(0));
        assert_eq!(profiler.tracked_parameters()[0].accumulated_grad_bytes, 4_000);
    }

    #[test]
    fn test_rescan_tracks_added_and_removed_parameters() {
        let mut model = two_layer(4_000, 4_000);
        let mut profiler = MemoryProfiler::new(&mut model, config(1)).unwrap();
        model.layers.pop();
        model.layers.push(FakeLayer { name: "c", weight: tensor(3, 8_000) });
        profiler.gather_named_parameters(&model);

        let names: Vec<String> = profiler.tracked_parameters().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["a.weight", "c.weight"]);
        assert_eq!(profiler.ledger().weight_bytes(), 12_000);
    }
}
