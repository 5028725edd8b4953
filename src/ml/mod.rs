// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn framework specific code.
// No other layer imports from burn directly, only this one.
//
// What's in this layer:
//
//   model.rs     — MlpModel: Linear layers with ReLU between
//                  them, plus a forward that reports each
//                  layer's output to a callback
//
//   adapter.rs   — BurnHost: exposes a burn model to the memory
//                  profiler (component tree, hooks, parameter
//                  gradients read from B::Gradients)
//
//   trainer.rs   — The profiled training loop on
//                  Autodiff<NdArray> with Adam
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// MLP architecture
pub mod model;

/// Profiler boundary for burn models
pub mod adapter;

/// Training loop with the memory profiler attached
pub mod trainer;
