// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that define what the
// profiler talks about. No runtime code, no file I/O, no burn.
//
//   tensor.rs    — TensorIdentity (dedup key) and TensorRecord
//   parameter.rs — TrackedParameter, one named weight
//   traits.rs    — the runtime boundary: Component, HookHost,
//                  ExecutionObserver, ParameterGradients,
//                  DeviceMemory
//   error.rs     — ProfilerError
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

pub mod error;
pub mod parameter;
pub mod tensor;
pub mod traits;
