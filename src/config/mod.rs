//! Backend preferences and device properties.
//!
//! Everything has a built-in default; a small TOML file can override it:
//!
//! ```toml
//! [backend]
//! block_size_select = "occupancy"   # or "manual"
//! tie_break = "smallest"            # or "largest"
//! constant_cache_overhead = 360
//!
//! [block_sizes]
//! customUpdate = 64
//!
//! [device]
//! name = "A100"
//! warp_size = 32
//! ```


use std::path::Path;

use crate::backend::block_size::TieBreak;
use crate::backend::Kernel;
use crate::error::{Error, Result};

/// How kernel block sizes are chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockSizeSelect {
    /// Maximise multiprocessor occupancy.
    Occupancy,
    /// Use `manual_block_sizes` as given.
    Manual,
}

/// One block size per kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelBlockSizes([u32; Kernel::COUNT]);

impl KernelBlockSizes {
    pub fn uniform(size: u32) -> Self {
        Self([size; Kernel::COUNT])
    }

    pub fn get(&self, kernel: Kernel) -> u32 {
        self.0[kernel as usize]
    }

    pub fn set(&mut self, kernel: Kernel, size: u32) {
        self.0[kernel as usize] = size;
    }
}

impl Default for KernelBlockSizes {
    fn default() -> Self {
        Self::uniform(32)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Preferences {
    pub block_size_select: BlockSizeSelect,
    pub manual_block_sizes: KernelBlockSizes,
    /// Which block size wins when several reach the best occupancy.
    pub tie_break: TieBreak,
    /// Constant memory reserved for the toolchain, in bytes.
    pub constant_cache_overhead: usize,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            block_size_select: BlockSizeSelect::Occupancy,
            manual_block_sizes: KernelBlockSizes::default(),
            tie_break: TieBreak::Smallest,
            constant_cache_overhead: 72 * 5,
        }
    }
}

/// Device capabilities the backend plans against.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceProps {
    pub name: String,
    pub warp_size: u32,
    pub max_threads_per_block: u32,
    pub max_threads_per_multiprocessor: u32,
    pub max_blocks_per_multiprocessor: u32,
    pub registers_per_multiprocessor: u32,
    pub shared_mem_per_multiprocessor: u32,
    pub shared_mem_per_block: u32,
    pub total_const_mem: usize,
    pub total_global_mem: usize,
    pub multiprocessor_count: u32,
}

impl DeviceProps {
    /// Built-in reference device (compute capability 8.0 class).
    pub fn reference() -> Self {
        Self {
            name: "reference".to_string(),
            warp_size: 32,
            max_threads_per_block: 1024,
            max_threads_per_multiprocessor: 2048,
            max_blocks_per_multiprocessor: 32,
            registers_per_multiprocessor: 65536,
            shared_mem_per_multiprocessor: 167_936,
            shared_mem_per_block: 49_152,
            total_const_mem: 65_536,
            total_global_mem: 40 << 30,
            multiprocessor_count: 108,
        }
    }
}

/// Preferences and device read from one file.
#[derive(Clone, Debug, PartialEq)]
pub struct BackendConfig {
    pub preferences: Preferences,
    pub device: DeviceProps,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            preferences: Preferences::default(),
            device: DeviceProps::reference(),
        }
    }
}

impl BackendConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse config text; `origin` names it in errors.
    pub fn parse(content: &str, origin: &str) -> Result<Self> {
        let err = |message: String| Error::Config {
            path: origin.to_string(),
            message,
        };
        let mut config = Self::default();
        let mut section = String::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                section = trimmed[1..trimmed.len() - 1].trim().to_string();
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(err(format!("expected 'key = value', found '{}'", trimmed)));
            };
            let key = key.trim();
            // Trailing comments
            let value = value.split('#').next().unwrap_or("").trim();
            let unquoted = value.trim_matches('"');

            let preferences = &mut config.preferences;
            let device = &mut config.device;
            match (section.as_str(), key) {
                ("backend", "block_size_select") => {
                    preferences.block_size_select = match unquoted {
                        "occupancy" => BlockSizeSelect::Occupancy,
                        "manual" => BlockSizeSelect::Manual,
                        other => return Err(err(format!("invalid backend.block_size_select: {}", other))),
                    };
                }
                ("backend", "tie_break") => {
                    preferences.tie_break = match unquoted {
                        "smallest" => TieBreak::Smallest,
                        "largest" => TieBreak::Largest,
                        other => return Err(err(format!("invalid backend.tie_break: {}", other))),
                    };
                }
                ("backend", "constant_cache_overhead") => {
                    preferences.constant_cache_overhead = parse_number(value, "backend.constant_cache_overhead", &err)?;
                }
                ("block_sizes", kernel) => {
                    let kernel = Kernel::from_name(kernel)
                        .ok_or_else(|| err(format!("unknown kernel '{}' in [block_sizes]", kernel)))?;
                    let size: u32 = parse_number(value, kernel.name(), &err)?;
                    if size == 0 || size % 32 != 0 {
                        return Err(err(format!(
                            "block size for {} must be a non-zero multiple of 32, got {}",
                            kernel.name(),
                            size
                        )));
                    }
                    preferences.manual_block_sizes.set(kernel, size);
                }
                ("device", "name") => device.name = unquoted.to_string(),
                ("device", "warp_size") => device.warp_size = parse_number(value, "device.warp_size", &err)?,
                ("device", "max_threads_per_block") => {
                    device.max_threads_per_block = parse_number(value, "device.max_threads_per_block", &err)?;
                }
                ("device", "max_threads_per_multiprocessor") => {
                    device.max_threads_per_multiprocessor =
                        parse_number(value, "device.max_threads_per_multiprocessor", &err)?;
                }
                ("device", "max_blocks_per_multiprocessor") => {
                    device.max_blocks_per_multiprocessor =
                        parse_number(value, "device.max_blocks_per_multiprocessor", &err)?;
                }
                ("device", "registers_per_multiprocessor") => {
                    device.registers_per_multiprocessor =
                        parse_number(value, "device.registers_per_multiprocessor", &err)?;
                }
                ("device", "shared_mem_per_multiprocessor") => {
                    device.shared_mem_per_multiprocessor =
                        parse_number(value, "device.shared_mem_per_multiprocessor", &err)?;
                }
                ("device", "shared_mem_per_block") => {
                    device.shared_mem_per_block = parse_number(value, "device.shared_mem_per_block", &err)?;
                }
                ("device", "total_const_mem") => {
                    device.total_const_mem = parse_number(value, "device.total_const_mem", &err)?;
                }
                ("device", "total_global_mem") => {
                    device.total_global_mem = parse_number(value, "device.total_global_mem", &err)?;
                }
                ("device", "multiprocessor_count") => {
                    device.multiprocessor_count = parse_number(value, "device.multiprocessor_count", &err)?;
                }
                (section, key) => {
                    return Err(err(format!("unknown key '{}' in [{}]", key, section)));
                }
            }
        }

        if config.device.warp_size == 0 {
            return Err(err("device.warp_size must be > 0".to_string()));
        }
        if config.device.max_threads_per_block < config.device.warp_size {
            return Err(err("device.max_threads_per_block must be at least one warp".to_string()));
        }
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(
    value: &str,
    what: &str,
    err: &dyn Fn(String) -> Error,
) -> Result<T> {
    value
        .replace('_', "")
        .parse()
        .map_err(|_| err(format!("invalid {}: {}", what, value)))
}
