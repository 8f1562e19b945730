//! In-memory vector index backends.
//!
//! [`VectorIndex`] is the capability seam between the engine and its ANN
//! primitive. Two implementations exist and are selected at construction time
//! via [`IndexBackend`]: [`flat::FlatIndex`] (plain scalar loops, no extra
//! dependencies) and [`dense::DenseIndex`] (ndarray matrix products). Both
//! compute cosine similarity; the dense backend is simply faster on wide
//! stores.

pub mod dense;
pub mod flat;

use serde::{Deserialize, Serialize};

/// Which index implementation a shard should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    Flat,
    #[default]
    Dense,
}

impl IndexBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Dense => "dense",
        }
    }

    /// Construct an empty index of this kind.
    pub fn build(&self) -> Box<dyn VectorIndex> {
        match self {
            Self::Flat => Box::new(flat::FlatIndex::new()),
            Self::Dense => Box::new(dense::DenseIndex::new()),
        }
    }
}

impl std::str::FromStr for IndexBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(Self::Flat),
            "dense" => Ok(Self::Dense),
            _ => Err(format!("unknown index backend: {s}")),
        }
    }
}

/// Row-oriented vector index. Rows are dense and parallel to the shard's id
/// list; removal compacts rows and shifts everything after down.
pub trait VectorIndex: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensionality, or `None` while empty.
    fn dims(&self) -> Option<usize>;

    /// Append a vector as the last row.
    fn push(&mut self, vector: Vec<f32>);

    /// Replace the vector at `row` in place.
    fn replace(&mut self, row: usize, vector: Vec<f32>);

    /// Remove the given rows. `rows` must be sorted ascending and unique.
    fn remove(&mut self, rows: &[usize]);

    /// Copy of the vector at `row`.
    fn vector(&self, row: usize) -> Vec<f32>;

    /// Top-k rows by cosine similarity to `query`, descending, ties broken by
    /// ascending row.
    fn top_k(&self, query: &[f32], k: usize) -> Vec<(usize, f32)>;
}

/// Shared result ordering: similarity descending, row ascending on ties.
pub(crate) fn sort_and_truncate(mut scored: Vec<(usize, f32)>, k: usize) -> Vec<(usize, f32)> {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(index: &mut dyn VectorIndex) {
        index.push(vec![1.0, 0.0]);
        index.push(vec![0.0, 1.0]);
        index.push(vec![0.7, 0.7]);
        index.push(vec![-1.0, 0.0]);
    }

    fn backends() -> Vec<Box<dyn VectorIndex>> {
        vec![IndexBackend::Flat.build(), IndexBackend::Dense.build()]
    }

    #[test]
    fn top_k_orders_by_cosine() {
        for mut index in backends() {
            fill(index.as_mut());
            let hits = index.top_k(&[1.0, 0.0], 2);
            assert_eq!(hits.len(), 2);
            assert_eq!(hits[0].0, 0);
            assert!((hits[0].1 - 1.0).abs() < 1e-5);
            assert_eq!(hits[1].0, 2);
        }
    }

    #[test]
    fn backends_agree() {
        let mut flat = IndexBackend::Flat.build();
        let mut dense = IndexBackend::Dense.build();
        fill(flat.as_mut());
        fill(dense.as_mut());

        let a = flat.top_k(&[0.3, 0.9], 4);
        let b = dense.top_k(&[0.3, 0.9], 4);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.0, y.0);
            assert!((x.1 - y.1).abs() < 1e-5);
        }
    }

    #[test]
    fn remove_compacts_rows() {
        for mut index in backends() {
            fill(index.as_mut());
            index.remove(&[0, 2]);
            assert_eq!(index.len(), 2);
            assert_eq!(index.vector(0), vec![0.0, 1.0]);
            assert_eq!(index.vector(1), vec![-1.0, 0.0]);
        }
    }

    #[test]
    fn replace_updates_search() {
        for mut index in backends() {
            fill(index.as_mut());
            index.replace(3, vec![2.0, 0.0]);
            let hits = index.top_k(&[1.0, 0.0], 2);
            // Rows 0 and 3 are both exact-direction matches; row order breaks the tie.
            assert_eq!(hits[0].0, 0);
            assert_eq!(hits[1].0, 3);
        }
    }

    #[test]
    fn empty_index_returns_nothing() {
        for index in backends() {
            assert!(index.is_empty());
            assert!(index.dims().is_none());
            assert!(index.top_k(&[1.0], 5).is_empty());
        }
    }
}
