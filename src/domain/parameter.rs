// ============================================================
// Layer 3 — TrackedParameter Domain Type
// ============================================================
// One persistent weight of the model, as the profiler sees it:
//   - its dotted path name (e.g. "encoder.0.weight")
//   - the identity of its storage
//   - how many bytes the weight itself occupies
//   - how many gradient bytes have been attributed to it
//     since the start of the current epoch
//
// The profiler does NOT own the weight. The model does.
// The gradient is looked up through the runtime each time
// a backward callback fires.

use serde::{Deserialize, Serialize};

use crate::domain::tensor::TensorIdentity;

/// Weight and gradient accounting for a single named parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedParameter {
    /// Dotted path from the model root, e.g. "blocks.1.fc.weight"
    pub name: String,

    /// Identity of the weight's backing storage
    pub identity: TensorIdentity,

    /// Bytes occupied by the weight tensor
    pub size_bytes: u64,

    /// Gradient bytes attributed to this parameter in the current epoch.
    /// Only reset at epoch boundaries.
    pub accumulated_grad_bytes: u64,
}

impl TrackedParameter {
    pub fn new(name: impl Into<String>, identity: TensorIdentity, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            identity,
            size_bytes,
            accumulated_grad_bytes: 0,
        }
    }

    /// Returns true once a gradient has been attributed to this parameter
    pub fn has_gradient(&self) -> bool {
        self.accumulated_grad_bytes > 0
    }
}
