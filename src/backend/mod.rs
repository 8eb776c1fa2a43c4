//! Device backends and SIMT kernel generation.
//!
//! A [`Backend`] answers device-specific questions (block sizes, memory
//! spaces, RNG and intrinsics spelling). [`simt::SimtCodegen`] drives kernel
//! generation over any backend; [`cuda::CudaBackend`] is the CUDA dialect.

pub mod block_size;
pub mod cuda;
pub mod dispatch;
pub mod memory;
pub mod rng;
pub mod row_update;
pub mod simt;

use crate::codegen::code_stream::CodeStream;
use crate::types::{NumericType, ResolvedType};

use memory::MemorySpace;

/// Kernels the SIMT generator emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kernel {
    CustomUpdate = 0,
    CustomConnectivityUpdate = 1,
    Initialize = 2,
    InitializeSparse = 3,
}

impl Kernel {
    pub const COUNT: usize = 4;

    pub const ALL: [Kernel; Kernel::COUNT] = [
        Kernel::CustomUpdate,
        Kernel::CustomConnectivityUpdate,
        Kernel::Initialize,
        Kernel::InitializeSparse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Kernel::CustomUpdate => "customUpdate",
            Kernel::CustomConnectivityUpdate => "customConnectivityUpdate",
            Kernel::Initialize => "initialize",
            Kernel::InitializeSparse => "initializeSparse",
        }
    }

    pub fn from_name(name: &str) -> Option<Kernel> {
        Kernel::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// A function the snippet language can call, with its target spelling.
#[derive(Clone, Debug)]
pub struct FunctionBinding {
    pub name: &'static str,
    pub ty: ResolvedType,
    pub template: String,
}

/// Device-specific capabilities kernel generation relies on.
pub trait Backend {
    fn name(&self) -> &str;

    fn block_size(&self, kernel: Kernel) -> u32;

    /// Text before a kernel's name, e.g. `extern "C" __global__ void `.
    fn kernel_prefix(&self) -> &'static str;
    fn thread_id(&self) -> &'static str;
    fn block_id(&self) -> &'static str;
    fn shared_prefix(&self) -> &'static str;
    fn barrier(&self) -> &'static str;

    /// Emit a device-side assertion.
    fn gen_assert(&self, os: &mut CodeStream, condition: &str);

    /// Memory spaces merged structs may live in, fastest first.
    fn merged_struct_spaces(&self) -> Vec<MemorySpace>;

    /// Declaration of a merged struct array placed in `space`.
    fn gen_merged_struct_array(&self, os: &mut CodeStream, space: &str, struct_name: &str, array: &str, count: usize) {
        os.line(&format!("{} {} {}[{}];", space, struct_name, array, count));
    }

    /// Host statement copying local `group` into slot `idx` of `array`.
    fn gen_merged_struct_push(&self, os: &mut CodeStream, struct_name: &str, array: &str);

    /// Constant device table of member start ids.
    fn gen_start_id_table(&self, os: &mut CodeStream, name: &str, ids: &[u32]);

    /// Host expression copying `count` elements from `host` to `device`.
    fn variable_push(&self, host: &str, device: &str, element: &ResolvedType, count: &str) -> String;

    /// Host expression copying `count` elements from `device` to `host`.
    fn variable_pull(&self, host: &str, device: &str, element: &ResolvedType, count: &str) -> String;

    /// Host statements launching `kernel` over `blocks` blocks.
    fn gen_kernel_launch(&self, os: &mut CodeStream, kernel: &str, blocks: u32, block_size: u32, args: &str);

    /// Declare and seed the global stream initialisation skips ahead from.
    /// Writes the declaration to `definitions` and a seeding kernel to
    /// `kernels`, returning that kernel's name.
    fn gen_global_rng(&self, definitions: &mut CodeStream, kernels: &mut CodeStream) -> String;

    /// Type of the one-shot initialisation stream.
    fn init_rng_type(&self) -> ResolvedType;

    /// Initialiser giving `initRNG` a one-shot stream skipped ahead to
    /// `sequence`.
    fn init_rng_skip_ahead(&self, sequence: &str) -> String;

    /// Element type of persistent per-row RNG streams.
    fn population_rng_type(&self) -> ResolvedType;

    /// Statement seeding the persistent stream at `state`.
    fn population_rng_init(&self, seed: &str, sequence: &str, state: &str) -> String;

    /// Random number functions, drawing from `$(_rng)`.
    fn rng_functions(&self, precision: NumericType) -> Vec<FunctionBinding>;
}
