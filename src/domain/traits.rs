// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// These traits are the boundary between the profiler and
// whatever tensor runtime executes the model. The profiler
// only ever talks to a runtime through them:
//
//   Component          — a named node of the model tree
//   ParameterGradients — "what is the .grad of parameter X right now?"
//   HookHost           — lets the profiler ask for callbacks on a path
//   ExecutionObserver  — the callbacks the runtime must invoke
//   DeviceMemory       — opaque allocator counters
//
// Implementations:
//   - runtime::SimModel      → the simulated device runtime
//   - ml::adapter::BurnHost  → a burn model on Autodiff<NdArray>
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)
//            Rust Book §17 (Trait Objects)

use serde::{Deserialize, Serialize};

use crate::domain::tensor::TensorRecord;

// ─── Component ────────────────────────────────────────────────────────────────
/// A node of the model's nested structure.
///
/// Paths are built by joining child names with '.', so child names
/// must not be empty and should not contain '.'.
pub trait Component {
    /// Short type name shown by `inspect` (e.g. "Linear", "Sequential")
    fn kind(&self) -> &str;

    /// Immediate children, in declaration order
    fn children(&self) -> Vec<(&str, &dyn Component)>;

    /// Parameters owned directly by this component (not by its children)
    fn parameters(&self) -> Vec<(&str, TensorRecord)>;
}

// ─── ParameterGradients ───────────────────────────────────────────────────────
/// Resolves the gradient currently attached to a named parameter.
/// Returns None when the runtime has not populated one yet.
pub trait ParameterGradients {
    fn gradient_of(&self, name: &str) -> Option<TensorRecord>;
}

// ─── Hooks ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookKind {
    Forward,
    Backward,
}

/// Receipt for one registered callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HookHandle {
    pub kind: HookKind,
    /// Component path the hook is bound to ("" = whole model)
    pub path: String,
    /// Host-assigned id, unique per host
    pub id:   u64,
}

/// A runtime that can invoke observer callbacks for chosen component paths.
///
/// The empty path "" addresses the whole model.
pub trait HookHost {
    fn register_forward_hook(&mut self, path: &str) -> HookHandle;
    fn register_backward_hook(&mut self, path: &str) -> HookHandle;
}

/// Callbacks a runtime invokes synchronously while it executes the model.
///
/// The only ordering guarantee required is that a component's forward
/// completes before its own backward.
pub trait ExecutionObserver {
    /// Called after `component` produced `output` from `inputs`
    fn post_forward(&mut self, component: &str, inputs: &[TensorRecord], output: &TensorRecord);

    /// Called after the backward pass through `component` finished.
    /// Gradient slots are None where the runtime produced no tensor.
    fn post_backward(
        &mut self,
        component:    &str,
        grad_inputs:  &[Option<TensorRecord>],
        grad_outputs: &[Option<TensorRecord>],
        parameters:   &dyn ParameterGradients,
    );
}

// ─── DeviceMemory ─────────────────────────────────────────────────────────────
/// Allocator counters reported by the runtime.
/// The profiler prints them as-is and never recomputes them.
pub trait DeviceMemory {
    fn max_memory_allocated(&self) -> u64;
    fn memory_allocated(&self) -> u64;
    fn max_memory_reserved(&self) -> u64;
    fn memory_reserved(&self) -> u64;

    fn snapshot(&self) -> DeviceMemorySnapshot {
        DeviceMemorySnapshot {
            peak_allocated:    self.max_memory_allocated(),
            current_allocated: self.memory_allocated(),
            peak_reserved:     self.max_memory_reserved(),
            current_reserved:  self.memory_reserved(),
        }
    }
}

/// One reading of the allocator counters, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMemorySnapshot {
    pub peak_allocated:    u64,
    pub current_allocated: u64,
    pub peak_reserved:     u64,
    pub current_reserved:  u64,
}
