// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (profiling a run or inspecting a model).
//
// Rules for this layer:
//   - No tensor runtime internals here
//   - No argument parsing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The profiled training workflow
pub mod profile_use_case;

// Model structure / parameter table
pub mod inspect_use_case;
