//! Accelerated index backend: contiguous row-major storage with ndarray
//! matrix-vector products for scoring.
//!
//! Row norms are cached on mutation so a query costs one GEMV plus a
//! normalization pass.

use super::{sort_and_truncate, VectorIndex};
use ndarray::{ArrayView1, ArrayView2};

pub struct DenseIndex {
    /// Row-major arena: `data[row * dims .. (row + 1) * dims]`.
    data: Vec<f32>,
    dims: usize,
    norms: Vec<f32>,
}

impl DenseIndex {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            dims: 0,
            norms: Vec::new(),
        }
    }

    fn norm(vector: &[f32]) -> f32 {
        vector.iter().map(|x| x * x).sum::<f32>().sqrt()
    }
}

impl Default for DenseIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorIndex for DenseIndex {
    fn len(&self) -> usize {
        self.norms.len()
    }

    fn dims(&self) -> Option<usize> {
        if self.norms.is_empty() {
            None
        } else {
            Some(self.dims)
        }
    }

    fn push(&mut self, vector: Vec<f32>) {
        if self.norms.is_empty() {
            self.dims = vector.len();
        }
        self.norms.push(Self::norm(&vector));
        self.data.extend_from_slice(&vector);
    }

    fn replace(&mut self, row: usize, vector: Vec<f32>) {
        let start = row * self.dims;
        self.norms[row] = Self::norm(&vector);
        self.data[start..start + self.dims].copy_from_slice(&vector);
    }

    fn remove(&mut self, rows: &[usize]) {
        for &row in rows.iter().rev() {
            let start = row * self.dims;
            self.data.drain(start..start + self.dims);
            self.norms.remove(row);
        }
    }

    fn vector(&self, row: usize) -> Vec<f32> {
        let start = row * self.dims;
        self.data[start..start + self.dims].to_vec()
    }

    fn top_k(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let n = self.len();
        if n == 0 || query.len() != self.dims {
            return Vec::new();
        }

        let matrix = ArrayView2::from_shape((n, self.dims), &self.data)
            .expect("arena length is always n * dims");
        let q = ArrayView1::from(query);
        let dots = matrix.dot(&q);

        let q_norm = Self::norm(query);
        let scored: Vec<(usize, f32)> = dots
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(row, (dot, v_norm))| (row, dot / (v_norm * q_norm + 1e-8)))
            .collect();
        sort_and_truncate(scored, k)
    }
}
