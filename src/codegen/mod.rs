//! Code generation: snippet compilation against substitution environments
//! and whole-model kernel generation.

pub mod code_stream;
pub mod environment;
pub mod pipeline;
pub mod printer;
pub mod stdlib;
pub mod templating;

use tracing::info;

use crate::backend::simt::{GeneratedCode, SimtCodegen};
use crate::backend::Backend;
use crate::error::Result;
use crate::model::ModelSpec;

/// Generate every kernel, merged struct and host push function of `model`.
pub fn generate_model<B: Backend + ?Sized>(model: &ModelSpec, backend: &B) -> Result<GeneratedCode> {
    info!(
        model = %model.name,
        custom_updates = model.custom_updates.len(),
        custom_connectivity_updates = model.custom_connectivity_updates.len(),
        "generating model"
    );
    SimtCodegen::new(backend, model).generate()
}
