pub mod backend;
pub mod codegen;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod hash;
pub mod merged;
pub mod model;
pub mod rows;
pub mod span;
pub mod syntax;
pub mod typecheck;
pub mod types;

// Re-exports: the entry points most callers need
pub use backend::cuda::CudaBackend;
pub use backend::simt::GeneratedCode;
pub use backend::Backend;
pub use codegen::generate_model;
pub use codegen::pipeline::{compile_expression, compile_snippet};
pub use config::{BackendConfig, DeviceProps, Preferences};
pub use error::{Error, Result};
pub use model::ModelSpec;
pub use rows::RaggedRows;
