// ============================================================
// Layer 4 — Memory Ledger
// ============================================================
// The bookkeeping state behind the profiler:
//
//   parameters  — current named weights (rebuilt on every re-scan)
//   weights     — total + per-parameter weight bytes
//   activations — total forward-output bytes this window
//   gradients   — total + per-parameter gradient bytes this window
//
// The callback handlers (on_forward / on_backward) are the only
// code that feeds activations and gradients.

use indexmap::IndexMap;

use crate::domain::error::ProfilerResult;
use crate::domain::parameter::TrackedParameter;
use crate::domain::tensor::TensorRecord;
use crate::domain::traits::{Component, ParameterGradients};
use crate::profiler::accumulator::{CategoryAccumulator, NamedAccumulator};
use crate::profiler::walker::named_parameters;

#[derive(Debug, Clone)]
pub struct MemoryLedger {
    parameters:  IndexMap<String, TensorRecord>,
    weights:     NamedAccumulator,
    activations: CategoryAccumulator,
    gradients:   NamedAccumulator,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            parameters:  IndexMap::new(),
            weights:     NamedAccumulator::new("weight"),
            activations: CategoryAccumulator::new(),
            gradients:   NamedAccumulator::new("gradient"),
        }
    }

    /// Rebuilds the parameter set from the current component tree.
    ///
    /// Weight totals are recomputed from scratch. Gradient buckets follow
    /// the new parameter order; parameters that still exist keep their
    /// epoch totals, and buckets of parameters that disappeared are dropped
    /// (their bytes stay in the gradient total and show up as intermediate).
    pub fn rescan(&mut self, root: &dyn Component) -> usize {
        self.parameters = named_parameters(root).into_iter().collect();

        self.weights.clear();
        for (name, tensor) in &self.parameters {
            self.weights.add_named(name, tensor.identity, tensor.size_bytes());
        }

        // Same order as the weight buckets, so breakdowns line up by position
        self.gradients.rebuild_buckets(self.parameters.keys().map(String::as_str));

        tracing::debug!(
            "Re-scanned {} parameters, {} weight bytes",
            self.parameters.len(),
            self.weights.total_bytes()
        );
        self.parameters.len()
    }

    /// Post-forward handler: counts the output as an activation.
    pub fn on_forward(&mut self, output: &TensorRecord) -> bool {
        self.activations.add_if_new(output.identity, output.size_bytes())
    }

    /// Post-backward handler.
    ///
    /// Parameter gradients are attributed first so a tensor that is also
    /// present in the gradient lists is counted under its parameter name.
    pub fn on_backward(
        &mut self,
        grad_inputs:  &[Option<TensorRecord>],
        grad_outputs: &[Option<TensorRecord>],
        lookup:       &dyn ParameterGradients,
    ) {
        for name in self.parameters.keys() {
            // No gradient yet means the parameter has not been reached
            if let Some(grad) = lookup.gradient_of(name) {
                self.gradients.add_named(name, grad.identity, grad.size_bytes());
            }
        }

        for grad in grad_inputs.iter().chain(grad_outputs).flatten() {
            self.gradients.add_if_new(grad.identity, grad.size_bytes());
        }
    }

    /// Epoch boundary: forget activations and gradients, keep weights.
    pub fn reset_transient(&mut self) {
        self.activations.reset();
        self.gradients.reset();
    }

    pub fn weight_bytes(&self) -> u64 {
        self.weights.total_bytes()
    }

    pub fn activation_bytes(&self) -> u64 {
        self.activations.total_bytes()
    }

    pub fn gradient_bytes(&self) -> u64 {
        self.gradients.total_bytes()
    }

    pub fn intermediate_gradient_bytes(&self) -> ProfilerResult<u64> {
        self.gradients.intermediate_bytes()
    }

    pub fn weight_breakdown(&self) -> &IndexMap<String, u64> {
        self.weights.buckets()
    }

    pub fn gradient_breakdown(&self) -> &IndexMap<String, u64> {
        self.gradients.buckets()
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(String::as_str)
    }

    /// The current parameter set as fixed records, in discovery order.
    pub fn tracked_parameters(&self) -> Vec<TrackedParameter> {
        self.parameters
            .iter()
            .map(|(name, tensor)| {
                let mut param = TrackedParameter::new(name.clone(), tensor.identity, tensor.size_bytes());
                param.accumulated_grad_bytes = self.gradients.bucket(name);
                param
            })
            .collect()
    }
}
