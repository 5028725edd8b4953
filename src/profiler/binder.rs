// ============================================================
// Layer 4 — Instrumentation Binder
// ============================================================
// Asks the runtime for callbacks on every component the walker
// surfaces:
//
//   for each descendant path P:
//       forward hook  on P   → post_forward  → activations
//       backward hook on P   → post_backward → gradients
//   plus
//       backward hook on ""  (the whole model)
//
// The paths are collected first and the hooks registered
// afterwards, because walking borrows the model immutably and
// registering borrows it mutably.

use serde::{Deserialize, Serialize};

use crate::domain::traits::{Component, HookHandle, HookHost};
use crate::profiler::walker::for_each_component;

/// Receipts of every hook registered for one profiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrumentation {
    pub forward:        Vec<HookHandle>,
    pub backward:       Vec<HookHandle>,
    pub model_backward: Option<HookHandle>,
}

impl Instrumentation {
    /// Number of components with per-component hooks
    pub fn component_count(&self) -> usize {
        self.forward.len()
    }

    pub fn hook_count(&self) -> usize {
        self.forward.len() + self.backward.len() + usize::from(self.model_backward.is_some())
    }
}

/// Registers forward and backward hooks on every descendant of `model`
/// and one backward hook on the model itself.
pub fn bind<M: Component + HookHost>(model: &mut M) -> Instrumentation {
    let mut paths = Vec::new();
    for_each_component(&*model, |path, _| paths.push(path.to_string()));

    let mut instrumentation = Instrumentation::default();
    for path in &paths {
        instrumentation.forward.push(model.register_forward_hook(path));
        instrumentation.backward.push(model.register_backward_hook(path));
    }
    instrumentation.model_backward = Some(model.register_backward_hook(""));

    tracing::info!(
        "Instrumented {} components ({} hooks)",
        instrumentation.component_count(),
        instrumentation.hook_count()
    );
    instrumentation
}
