//! K-means partitioning of stored vectors.
//!
//! K-means++ initialization followed by a fixed number of Lloyd iterations.
//! Seeding uses a small deterministic xorshift generator so repeated runs on
//! the same data produce the same partition.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const KMEANS_ITERATIONS: usize = 25;

/// One cluster of stored vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub centroid: Vec<f32>,
    /// Ids of the member entries.
    pub members: Vec<String>,
    pub count: usize,
}

/// Partition `entries` into `k` clusters.
///
/// Requires at least `k` distinct vectors; otherwise returns
/// [`EngineError::InsufficientData`] rather than a misleading partial result.
/// Empty clusters (possible when points coincide) are dropped, so
/// `sum(count) == entries.len()` always holds.
pub fn cluster_vectors(entries: &[(String, Vec<f32>)], k: usize) -> Result<Vec<Cluster>> {
    if k == 0 {
        return Err(EngineError::Config("cluster count must be at least 1".into()));
    }
    let distinct: HashSet<Vec<u32>> = entries
        .iter()
        .map(|(_, v)| v.iter().map(|x| x.to_bits()).collect())
        .collect();
    if distinct.len() < k {
        return Err(EngineError::InsufficientData {
            needed: k,
            available: distinct.len(),
        });
    }

    let dims = entries[0].1.len();
    let n = entries.len();
    let mut centroids = init_centroids(entries, k, dims);

    let mut assignments = vec![0usize; n];
    for _ in 0..KMEANS_ITERATIONS {
        let mut changed = false;
        for (i, (_, vector)) in entries.iter().enumerate() {
            let nearest = nearest_centroid(vector, &centroids, dims);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }
        update_centroids(entries, &assignments, &mut centroids, k, dims);
        if !changed {
            break;
        }
    }

    let mut clusters: Vec<Cluster> = (0..k)
        .map(|ci| Cluster {
            centroid: centroids[ci * dims..(ci + 1) * dims].to_vec(),
            members: Vec::new(),
            count: 0,
        })
        .collect();
    for (i, (id, _)) in entries.iter().enumerate() {
        let cluster = &mut clusters[assignments[i]];
        cluster.members.push(id.clone());
        cluster.count += 1;
    }
    clusters.retain(|c| c.count > 0);
    Ok(clusters)
}

/// K-means++ seeding: first centroid from the generator, then points chosen
/// with probability proportional to squared distance from the nearest seed.
fn init_centroids(entries: &[(String, Vec<f32>)], k: usize, dims: usize) -> Vec<f32> {
    let n = entries.len();
    let mut rng = Xorshift::new();
    let mut centroids = vec![0.0f32; k * dims];

    let first = rng.next_usize() % n;
    centroids[..dims].copy_from_slice(&entries[first].1);

    let mut min_dists = vec![f32::MAX; n];
    for ci in 1..k {
        let last = &centroids[(ci - 1) * dims..ci * dims];
        let mut total = 0.0f64;
        for (i, (_, vector)) in entries.iter().enumerate() {
            let d = sq_dist(vector, last);
            if d < min_dists[i] {
                min_dists[i] = d;
            }
            total += min_dists[i] as f64;
        }

        let chosen = if total < 1e-30 {
            // Every point coincides with an existing seed.
            rng.next_usize() % n
        } else {
            let threshold = rng.next_f64() * total;
            let mut cumulative = 0.0f64;
            let mut pick = n - 1;
            for (i, &d) in min_dists.iter().enumerate() {
                cumulative += d as f64;
                if cumulative >= threshold {
                    pick = i;
                    break;
                }
            }
            pick
        };
        centroids[ci * dims..(ci + 1) * dims].copy_from_slice(&entries[chosen].1);
    }
    centroids
}

fn nearest_centroid(vector: &[f32], centroids: &[f32], dims: usize) -> usize {
    let k = centroids.len() / dims;
    let mut best = 0;
    let mut best_dist = f32::MAX;
    for ci in 0..k {
        let d = sq_dist(vector, &centroids[ci * dims..(ci + 1) * dims]);
        if d < best_dist {
            best_dist = d;
            best = ci;
        }
    }
    best
}

fn update_centroids(
    entries: &[(String, Vec<f32>)],
    assignments: &[usize],
    centroids: &mut [f32],
    k: usize,
    dims: usize,
) {
    let mut counts = vec![0u32; k];
    let mut sums = vec![0.0f32; k * dims];
    for (i, (_, vector)) in entries.iter().enumerate() {
        let ci = assignments[i];
        counts[ci] += 1;
        let c = &mut sums[ci * dims..(ci + 1) * dims];
        for (acc, x) in c.iter_mut().zip(vector) {
            *acc += x;
        }
    }
    for ci in 0..k {
        // Centroids with no members keep their previous position.
        if counts[ci] > 0 {
            let inv = 1.0 / counts[ci] as f32;
            let dst = &mut centroids[ci * dims..(ci + 1) * dims];
            let src = &sums[ci * dims..(ci + 1) * dims];
            for (d, s) in dst.iter_mut().zip(src) {
                *d = s * inv;
            }
        }
    }
}

#[inline]
fn sq_dist(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Fixed-seed xorshift64 — clustering must be reproducible, not random.
struct Xorshift {
    state: u64,
}

impl Xorshift {
    fn new() -> Self {
        Self {
            state: 0x9E3779B97F4A7C15,
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn next_usize(&mut self) -> usize {
        self.next_u64() as usize
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}
