//! First-fit placement of merged struct arrays into memory spaces.

use tracing::debug;

use crate::error::{Error, Result};

/// A named memory space with a remaining byte budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemorySpace {
    pub name: String,
    pub remaining: usize,
}

impl MemorySpace {
    pub fn new(name: &str, bytes: usize) -> Self {
        Self {
            name: name.to_string(),
            remaining: bytes,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MemoryPlanner {
    spaces: Vec<MemorySpace>,
}

impl MemoryPlanner {
    /// Spaces are tried in the given order.
    pub fn new(spaces: Vec<MemorySpace>) -> Self {
        Self { spaces }
    }

    /// Place `bytes` of `struct_name` in the first space whose remaining
    /// budget exceeds it, and debit that space.
    pub fn place(&mut self, struct_name: &str, bytes: usize) -> Result<String> {
        let Some(space) = self.spaces.iter_mut().find(|s| s.remaining > bytes) else {
            return Err(Error::NoMemorySpace {
                name: struct_name.to_string(),
                bytes,
            });
        };
        space.remaining -= bytes;
        debug!(
            struct_name,
            bytes,
            space = %space.name,
            remaining = space.remaining,
            "placed merged struct"
        );
        Ok(space.name.clone())
    }

    pub fn spaces(&self) -> &[MemorySpace] {
        &self.spaces
    }
}
