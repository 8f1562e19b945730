//! Naive index backend: one `Vec<f32>` per row, scalar cosine loops.
//!
//! Exists so the engine runs anywhere without a numeric stack; the dense
//! backend is the default.

use super::{sort_and_truncate, VectorIndex};

pub struct FlatIndex {
    rows: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }
}

impl Default for FlatIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorIndex for FlatIndex {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn dims(&self) -> Option<usize> {
        self.rows.first().map(Vec::len)
    }

    fn push(&mut self, vector: Vec<f32>) {
        self.rows.push(vector);
    }

    fn replace(&mut self, row: usize, vector: Vec<f32>) {
        self.rows[row] = vector;
    }

    fn remove(&mut self, rows: &[usize]) {
        // Descending order keeps earlier indices valid while removing.
        for &row in rows.iter().rev() {
            self.rows.remove(row);
        }
    }

    fn vector(&self, row: usize) -> Vec<f32> {
        self.rows[row].clone()
    }

    fn top_k(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let q_norm: f32 = query.iter().map(|x| x * x).sum::<f32>().sqrt();
        let scored: Vec<(usize, f32)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(row, v)| {
                let dot: f32 = v.iter().zip(query).map(|(a, b)| a * b).sum();
                let v_norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                (row, dot / (v_norm * q_norm + 1e-8))
            })
            .collect();
        sort_and_truncate(scored, k)
    }
}
