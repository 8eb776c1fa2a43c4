//! CUDA dialect of the SIMT backend.

use tracing::info;

use crate::codegen::code_stream::CodeStream;
use crate::config::{BackendConfig, BlockSizeSelect, DeviceProps, KernelBlockSizes, Preferences};
use crate::types::{NumericType, ResolvedType};

use super::block_size::{select_all, BlockSizePolicy, ManualBlockSize, OccupancyBlockSize};
use super::memory::MemorySpace;
use super::{Backend, FunctionBinding, Kernel};

/// CUDA backend: device properties and preferences as data, block sizes
/// chosen once at construction.
#[derive(Clone, Debug)]
pub struct CudaBackend {
    device: DeviceProps,
    preferences: Preferences,
    block_sizes: KernelBlockSizes,
}

impl CudaBackend {
    pub fn new(device: DeviceProps, preferences: Preferences) -> Self {
        let policy: Box<dyn BlockSizePolicy> = match preferences.block_size_select {
            BlockSizeSelect::Manual => Box::new(ManualBlockSize {
                sizes: preferences.manual_block_sizes,
            }),
            BlockSizeSelect::Occupancy => Box::new(OccupancyBlockSize {
                tie_break: preferences.tie_break,
            }),
        };
        let block_sizes = select_all(policy.as_ref(), &device);
        for kernel in Kernel::ALL {
            info!(
                device = %device.name,
                kernel = kernel.name(),
                block_size = block_sizes.get(kernel),
                "kernel block size"
            );
        }
        Self {
            device,
            preferences,
            block_sizes,
        }
    }

    pub fn from_config(config: BackendConfig) -> Self {
        Self::new(config.device, config.preferences)
    }

    pub fn device(&self) -> &DeviceProps {
        &self.device
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }
}

impl Default for CudaBackend {
    fn default() -> Self {
        Self::new(DeviceProps::reference(), Preferences::default())
    }
}

fn scalar_fn(precision: NumericType, args: usize) -> ResolvedType {
    let scalar = ResolvedType::value(precision);
    ResolvedType::function(scalar.clone(), vec![scalar; args])
}

impl Backend for CudaBackend {
    fn name(&self) -> &str {
        "CUDA"
    }

    fn block_size(&self, kernel: Kernel) -> u32 {
        self.block_sizes.get(kernel)
    }

    fn kernel_prefix(&self) -> &'static str {
        "extern \"C\" __global__ void "
    }

    fn thread_id(&self) -> &'static str {
        "threadIdx.x"
    }

    fn block_id(&self) -> &'static str {
        "blockIdx.x"
    }

    fn shared_prefix(&self) -> &'static str {
        "__shared__ "
    }

    fn barrier(&self) -> &'static str {
        "__syncthreads()"
    }

    fn gen_assert(&self, os: &mut CodeStream, condition: &str) {
        os.line(&format!("assert({});", condition));
    }

    fn merged_struct_spaces(&self) -> Vec<MemorySpace> {
        let constant = self
            .device
            .total_const_mem
            .saturating_sub(self.preferences.constant_cache_overhead);
        vec![
            MemorySpace::new("__device__ __constant__", constant),
            MemorySpace::new("__device__", self.device.total_global_mem),
        ]
    }

    fn gen_merged_struct_push(&self, os: &mut CodeStream, struct_name: &str, array: &str) {
        os.line(&format!(
            "CHECK_CUDA_ERRORS(cudaMemcpyToSymbolAsync({}, &group, sizeof({}), idx * sizeof({})));",
            array, struct_name, struct_name
        ));
    }

    fn gen_start_id_table(&self, os: &mut CodeStream, name: &str, ids: &[u32]) {
        let ids: Vec<String> = ids.iter().map(u32::to_string).collect();
        os.line(&format!(
            "__device__ __constant__ unsigned int {}[] = {{{}}};",
            name,
            ids.join(", ")
        ));
    }

    fn variable_push(&self, host: &str, device: &str, element: &ResolvedType, count: &str) -> String {
        format!(
            "CHECK_CUDA_ERRORS(cudaMemcpy({}, {}, {} * sizeof({}), cudaMemcpyHostToDevice))",
            device,
            host,
            count,
            element.name()
        )
    }

    fn variable_pull(&self, host: &str, device: &str, element: &ResolvedType, count: &str) -> String {
        format!(
            "CHECK_CUDA_ERRORS(cudaMemcpy({}, {}, {} * sizeof({}), cudaMemcpyDeviceToHost))",
            host,
            device,
            count,
            element.name()
        )
    }

    fn gen_kernel_launch(&self, os: &mut CodeStream, kernel: &str, blocks: u32, block_size: u32, args: &str) {
        os.line("{");
        os.line(&format!("const dim3 threads({}, 1);", block_size));
        os.line(&format!("const dim3 grid({}, 1);", blocks));
        os.line(&format!("{}<<<grid, threads>>>({});", kernel, args));
        os.line("CHECK_CUDA_ERRORS(cudaPeekAtLastError());");
        os.line("}");
    }

    fn gen_global_rng(&self, definitions: &mut CodeStream, kernels: &mut CodeStream) -> String {
        let ty = self.init_rng_type().name();
        definitions.line(&format!("__device__ {} d_rng;", ty));
        kernels.line(&format!(
            "{}initializeRNGKernel(unsigned long long deviceRNGSeed)",
            self.kernel_prefix()
        ));
        kernels.line("{");
        kernels.line("if(threadIdx.x == 0)");
        kernels.line("{");
        kernels.line(&format!("{} rng;", ty));
        kernels.line("curand_init(deviceRNGSeed, 0, 0, &rng);");
        kernels.line("d_rng = rng;");
        kernels.line("}");
        kernels.line("}");
        "initializeRNGKernel".to_string()
    }

    fn init_rng_type(&self) -> ResolvedType {
        ResolvedType::opaque("curandStatePhilox4_32_10_t", 64)
    }

    fn init_rng_skip_ahead(&self, sequence: &str) -> String {
        format!(
            "curandStatePhilox4_32_10_t initRNG = d_rng;\nskipahead_sequence((unsigned long long)({}), &initRNG);",
            sequence
        )
    }

    fn population_rng_type(&self) -> ResolvedType {
        ResolvedType::opaque("curandState", 48)
    }

    fn population_rng_init(&self, seed: &str, sequence: &str, state: &str) -> String {
        format!("curand_init({}, {}, 0, &{});", seed, sequence, state)
    }

    fn rng_functions(&self, precision: NumericType) -> Vec<FunctionBinding> {
        let suffix = if precision == NumericType::Double { "_double" } else { "" };
        let log = if precision == NumericType::Double { "log" } else { "logf" };
        vec![
            FunctionBinding {
                name: "gennrand_uniform",
                ty: scalar_fn(precision, 0),
                template: format!("curand_uniform{}(&$(_rng))", suffix),
            },
            FunctionBinding {
                name: "gennrand_normal",
                ty: scalar_fn(precision, 0),
                template: format!("curand_normal{}(&$(_rng))", suffix),
            },
            FunctionBinding {
                name: "gennrand_exponential",
                ty: scalar_fn(precision, 0),
                template: format!("(-{}(curand_uniform{}(&$(_rng))))", log, suffix),
            },
            FunctionBinding {
                name: "gennrand_log_normal",
                ty: scalar_fn(precision, 2),
                template: format!("curand_log_normal{}(&$(_rng), $(0), $(1))", suffix),
            },
        ]
    }
}
