//! Host-side ragged connectivity with the same mutation rules as the
//! generated `add_synapse` and `remove_synapse`.

use tracing::debug;

use crate::error::{Error, Result};

/// A per-synapse array stored alongside the connectivity.
#[derive(Clone, Debug, PartialEq)]
pub struct RowArray {
    pub name: String,
    /// One copy per batch, `num_rows * row_stride` elements apart.
    pub duplicated: bool,
    pub values: Vec<f64>,
}

/// Rows of at most `row_stride` synapses; row `i` owns slots
/// `i * row_stride ..` of `ind` and of every array.
#[derive(Clone, Debug, PartialEq)]
pub struct RaggedRows {
    row_stride: usize,
    batch_size: usize,
    row_length: Vec<usize>,
    ind: Vec<u32>,
    arrays: Vec<RowArray>,
}

impl RaggedRows {
    pub fn new(num_rows: usize, row_stride: usize, batch_size: usize) -> Self {
        Self {
            row_stride,
            batch_size: batch_size.max(1),
            row_length: vec![0; num_rows],
            ind: vec![0; num_rows * row_stride],
            arrays: Vec::new(),
        }
    }

    /// Attach a zeroed array; arrays take `add_synapse` values in the order
    /// they were added.
    pub fn with_array(mut self, name: &str, duplicated: bool) -> Self {
        let copies = if duplicated { self.batch_size } else { 1 };
        self.arrays.push(RowArray {
            name: name.to_string(),
            duplicated,
            values: vec![0.0; self.syn_stride() * copies],
        });
        self
    }

    pub fn num_rows(&self) -> usize {
        self.row_length.len()
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    fn syn_stride(&self) -> usize {
        self.row_length.len() * self.row_stride
    }

    pub fn row_length(&self, row: usize) -> usize {
        self.row_length[row]
    }

    /// Postsynaptic indices of the live synapses of `row`.
    pub fn row(&self, row: usize) -> &[u32] {
        let start = row * self.row_stride;
        &self.ind[start..start + self.row_length[row]]
    }

    pub fn array(&self, name: &str) -> Option<&RowArray> {
        self.arrays.iter().find(|a| a.name == name)
    }

    /// Value of synapse `slot` of `row` in batch copy `batch`.
    pub fn value(&self, name: &str, batch: usize, row: usize, slot: usize) -> Option<f64> {
        let array = self.array(name)?;
        let offset = if array.duplicated { batch * self.syn_stride() } else { 0 };
        array.values.get(offset + row * self.row_stride + slot).copied()
    }

    /// Append a synapse to `row`. `values` feed the arrays in order;
    /// arrays past the end of `values` are zeroed. Duplicated arrays get the
    /// value in every batch copy.
    pub fn add_synapse(&mut self, row: usize, post: u32, values: &[f64]) -> Result<usize> {
        if self.row_length[row] >= self.row_stride {
            return Err(Error::RowFull {
                row,
                stride: self.row_stride,
            });
        }
        let new_idx = row * self.row_stride + self.row_length[row];
        self.ind[new_idx] = post;
        let syn_stride = self.syn_stride();
        for (a, array) in self.arrays.iter_mut().enumerate() {
            let value = values.get(a).copied().unwrap_or_default();
            let copies = if array.duplicated { self.batch_size } else { 1 };
            for b in 0..copies {
                array.values[b * syn_stride + new_idx] = value;
            }
        }
        self.row_length[row] += 1;
        debug!(row, post, length = self.row_length[row], "added synapse");
        Ok(new_idx)
    }

    /// Remove synapse `slot` of `row` by moving the row's last synapse into
    /// it. Slot order within a row is not preserved.
    pub fn remove_synapse(&mut self, row: usize, slot: usize) {
        debug_assert!(slot < self.row_length[row]);
        let start = row * self.row_stride;
        let idx = start + slot;
        let last_idx = start + self.row_length[row] - 1;
        self.ind[idx] = self.ind[last_idx];
        let syn_stride = self.syn_stride();
        for array in &mut self.arrays {
            let copies = if array.duplicated { self.batch_size } else { 1 };
            for b in 0..copies {
                let offset = b * syn_stride;
                array.values[offset + idx] = array.values[offset + last_idx];
            }
        }
        self.row_length[row] -= 1;
    }

    /// Walk `row` as the generated row loop does, removing every synapse
    /// `remove(post, slot)` selects. A removed slot is revisited, since it
    /// now holds the former last synapse.
    pub fn remove_where(&mut self, row: usize, mut remove: impl FnMut(u32, usize) -> bool) -> usize {
        let mut removed = 0;
        let mut j = 0;
        while j < self.row_length[row] {
            let post = self.ind[row * self.row_stride + j];
            if remove(post, j) {
                self.remove_synapse(row, j);
                removed += 1;
            } else {
                j += 1;
            }
        }
        removed
    }
}
