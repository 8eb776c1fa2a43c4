//! Random number streams.
//!
//! Initialisation kernels draw from one global Philox state, skipped ahead
//! so every lane owns a disjoint subsequence. Connectivity updates that
//! draw random numbers keep one persistent state per row instead, seeded
//! during initialisation. Host update code draws from one host generator,
//! `hostRNG`, seeded with the model seed.

use std::rc::Rc;

use crate::codegen::code_stream::CodeStream;
use crate::codegen::environment::Environment;
use crate::error::Result;
use crate::types::{NumericType, ResolvedType};

use super::{Backend, FunctionBinding};

/// Host generator used by host update code.
pub const HOST_RNG: &str = "hostRNG";

/// Bits of subsequence index the skip-ahead accepts.
pub const INIT_RNG_SEQUENCE_BITS: u32 = 64;

/// Disjoint subsequences available to initialisation lanes.
pub fn num_initialisation_rng_streams() -> u128 {
    1u128 << INIT_RNG_SEQUENCE_BITS
}

/// Subsequence of lane `id` in a kernel whose lanes follow `offset` lanes
/// of earlier initialisation kernels.
pub fn init_sequence(id: &str, offset: u32) -> String {
    if offset == 0 {
        id.to_string()
    } else {
        format!("{} + {}", id, offset)
    }
}

/// Bind the random number functions against whatever `_rng` resolves to.
pub fn add_rng_functions<B: Backend + ?Sized>(
    env: &mut Environment<'_>,
    backend: &B,
    precision: NumericType,
) -> Result<()> {
    for function in backend.rng_functions(precision) {
        env.add(function.name, function.ty, &function.template)?;
    }
    Ok(())
}

/// Bind `_rng` to a one-shot stream for lane `sequence`. The skip-ahead is
/// only emitted if a random number function is actually called.
pub fn add_init_rng<B: Backend + ?Sized>(
    env: &mut Environment<'_>,
    backend: &B,
    precision: NumericType,
    sequence: &str,
) -> Result<()> {
    let init = env.add_initialiser(&backend.init_rng_skip_ahead(sequence));
    env.add_with_initialisers("_rng", backend.init_rng_type(), "initRNG", &[init])?;
    add_rng_functions(env, backend, precision)
}

/// Bind `_rng` to the persistent per-row state at `group->rng[index]`.
///
/// `states` names each member's device state array.
pub fn add_population_rng<B: Backend + ?Sized>(
    env: &mut Environment<'_>,
    backend: &B,
    precision: NumericType,
    index: &str,
    states: Vec<String>,
) -> Result<()> {
    let state = backend.population_rng_type();
    env.add_field(
        "_rng",
        state.clone(),
        &format!("group->rng[{}]", index),
        "rng",
        state.pointer(),
        Rc::new(move |g| states[g].clone()),
    )?;
    add_rng_functions(env, backend, precision)
}

/// Declare the host generator and the standard distributions drawn from it.
pub fn gen_host_rng(os: &mut CodeStream, precision: NumericType) {
    let scalar = precision.name();
    let zero = precision.write_literal(0.0);
    let one = precision.write_literal(1.0);
    os.line(&format!("std::mt19937 {};", HOST_RNG));
    os.line(&format!(
        "std::uniform_real_distribution<{}> standardUniformDistribution({}, {});",
        scalar, zero, one
    ));
    os.line(&format!(
        "std::normal_distribution<{}> standardNormalDistribution({}, {});",
        scalar, zero, one
    ));
    os.line(&format!(
        "std::exponential_distribution<{}> standardExponentialDistribution({});",
        scalar, one
    ));
}

/// Random number functions on the host, drawing from `$(_rng)`.
pub fn host_rng_functions(precision: NumericType) -> Vec<FunctionBinding> {
    let scalar = ResolvedType::value(precision);
    let draw = ResolvedType::function(scalar.clone(), Vec::new());
    vec![
        FunctionBinding {
            name: "gennrand_uniform",
            ty: draw.clone(),
            template: "standardUniformDistribution($(_rng))".to_string(),
        },
        FunctionBinding {
            name: "gennrand_normal",
            ty: draw.clone(),
            template: "standardNormalDistribution($(_rng))".to_string(),
        },
        FunctionBinding {
            name: "gennrand_exponential",
            ty: draw,
            template: "standardExponentialDistribution($(_rng))".to_string(),
        },
        FunctionBinding {
            name: "gennrand_log_normal",
            ty: ResolvedType::function(scalar.clone(), vec![scalar.clone(), scalar]),
            template: format!("std::lognormal_distribution<{}>($(0), $(1))($(_rng))", precision.name()),
        },
    ]
}

/// Bind `_rng` to the host generator.
pub fn add_host_rng(env: &mut Environment<'_>, precision: NumericType) -> Result<()> {
    env.add("_rng", ResolvedType::opaque("std::mt19937", 0), HOST_RNG)?;
    for function in host_rng_functions(precision) {
        env.add(function.name, function.ty, &function.template)?;
    }
    Ok(())
}
