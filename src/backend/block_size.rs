//! Block size selection policies.

use tracing::{debug, warn};

use crate::config::{DeviceProps, KernelBlockSizes};

use super::Kernel;

/// Which block size wins among equally occupied candidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TieBreak {
    Smallest,
    Largest,
}

/// Per-thread resources a kernel needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelResources {
    pub registers_per_thread: u32,
    pub shared_mem_per_thread: u32,
}

impl KernelResources {
    /// Estimates for the kernels this crate generates.
    pub fn estimate(kernel: Kernel) -> Self {
        match kernel {
            Kernel::CustomUpdate => Self {
                registers_per_thread: 32,
                shared_mem_per_thread: 0,
            },
            Kernel::CustomConnectivityUpdate => Self {
                registers_per_thread: 40,
                shared_mem_per_thread: 0,
            },
            Kernel::Initialize => Self {
                registers_per_thread: 48,
                shared_mem_per_thread: 0,
            },
            // Row lengths are staged in shared memory.
            Kernel::InitializeSparse => Self {
                registers_per_thread: 48,
                shared_mem_per_thread: 4,
            },
        }
    }
}

/// Chooses a block size for a kernel.
pub trait BlockSizePolicy {
    fn select(&self, kernel: Kernel, resources: &KernelResources, device: &DeviceProps) -> u32;
}

/// Fixed, user-chosen sizes.
#[derive(Clone, Debug)]
pub struct ManualBlockSize {
    pub sizes: KernelBlockSizes,
}

impl BlockSizePolicy for ManualBlockSize {
    fn select(&self, kernel: Kernel, _: &KernelResources, _: &DeviceProps) -> u32 {
        self.sizes.get(kernel)
    }
}

/// Maximise resident warps per multiprocessor.
#[derive(Clone, Debug)]
pub struct OccupancyBlockSize {
    pub tie_break: TieBreak,
}

/// Warps resident on one multiprocessor at `block_size`.
pub fn occupancy(block_size: u32, resources: &KernelResources, device: &DeviceProps) -> u32 {
    if block_size == 0 || block_size > device.max_threads_per_block {
        return 0;
    }
    let mut blocks = device
        .max_blocks_per_multiprocessor
        .min(device.max_threads_per_multiprocessor / block_size);

    let registers = resources.registers_per_thread * block_size;
    if registers > 0 {
        blocks = blocks.min(device.registers_per_multiprocessor / registers);
    }
    let shared = resources.shared_mem_per_thread * block_size;
    if shared > 0 {
        if shared > device.shared_mem_per_block {
            return 0;
        }
        blocks = blocks.min(device.shared_mem_per_multiprocessor / shared);
    }
    blocks * block_size / device.warp_size
}

impl BlockSizePolicy for OccupancyBlockSize {
    fn select(&self, kernel: Kernel, resources: &KernelResources, device: &DeviceProps) -> u32 {
        let mut best: Option<(u32, u32)> = None;
        let candidates = (device.warp_size..=device.max_threads_per_block).step_by(device.warp_size as usize);
        for block_size in candidates {
            let warps = occupancy(block_size, resources, device);
            if warps == 0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, best_warps)) => {
                    warps > best_warps || (warps == best_warps && self.tie_break == TieBreak::Largest)
                }
            };
            if better {
                best = Some((block_size, warps));
            }
        }
        match best {
            Some((block_size, warps)) => {
                debug!(kernel = kernel.name(), block_size, warps, "occupancy block size");
                block_size
            }
            None => {
                warn!(
                    kernel = kernel.name(),
                    "no block size fits the device; falling back to one warp"
                );
                device.warp_size
            }
        }
    }
}

/// Block size of every kernel under `policy`.
pub fn select_all(policy: &dyn BlockSizePolicy, device: &DeviceProps) -> KernelBlockSizes {
    let mut sizes = KernelBlockSizes::default();
    for kernel in Kernel::ALL {
        let resources = KernelResources::estimate(kernel);
        sizes.set(kernel, policy.select(kernel, &resources, device));
    }
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources(registers: u32, shared: u32) -> KernelResources {
        KernelResources {
            registers_per_thread: registers,
            shared_mem_per_thread: shared,
        }
    }

    #[test]
    fn test_occupancy_limits() {
        let device = DeviceProps::reference();
        // Thread limited: 2048 threads resident.
        assert_eq!(occupancy(256, &resources(32, 0), &device), 64);
        // Register limited: 65536 / (64 * 256) = 4 blocks.
        assert_eq!(occupancy(256, &resources(64, 0), &device), 32);
        // Block count limited: 32 blocks of one warp.
        assert_eq!(occupancy(32, &resources(0, 0), &device), 32);
        assert_eq!(occupancy(2048, &resources(0, 0), &device), 0);
    }

    #[test]
    fn test_tie_break() {
        let device = DeviceProps::reference();
        let smallest = OccupancyBlockSize {
            tie_break: TieBreak::Smallest,
        };
        let largest = OccupancyBlockSize {
            tie_break: TieBreak::Largest,
        };
        let res = resources(32, 0);
        assert_eq!(smallest.select(Kernel::CustomUpdate, &res, &device), 64);
        assert_eq!(largest.select(Kernel::CustomUpdate, &res, &device), 1024);

        let heavy = resources(64, 0);
        assert_eq!(smallest.select(Kernel::CustomUpdate, &heavy, &device), 32);
    }

    #[test]
    fn test_shared_memory_limit() {
        let mut device = DeviceProps::reference();
        device.shared_mem_per_block = 1024;
        let policy = OccupancyBlockSize {
            tie_break: TieBreak::Largest,
        };
        // 4 bytes per thread: at most 256 threads per block.
        assert_eq!(policy.select(Kernel::InitializeSparse, &resources(0, 4), &device), 256);
    }

    #[test]
    fn test_unfittable_falls_back_to_warp() {
        let mut device = DeviceProps::reference();
        device.shared_mem_per_block = 16;
        let policy = OccupancyBlockSize {
            tie_break: TieBreak::Smallest,
        };
        assert_eq!(policy.select(Kernel::InitializeSparse, &resources(0, 4), &device), 32);
    }

    #[test]
    fn test_manual() {
        let mut sizes = KernelBlockSizes::uniform(64);
        sizes.set(Kernel::Initialize, 256);
        let manual = ManualBlockSize { sizes };
        let selected = select_all(&manual, &DeviceProps::reference());
        assert_eq!(selected.get(Kernel::Initialize), 256);
        assert_eq!(selected.get(Kernel::CustomUpdate), 64);
    }
}
