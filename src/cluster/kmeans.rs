//! K-means: k-means++ seeding followed by Lloyd iterations.
//!
//! # The Algorithm (Lloyd, 1982; Arthur & Vassilvitskii, 2007)
//!
//! 1. **Seeding (k-means++)**: pick the first center uniformly at random, then
//!    pick each further center with probability proportional to its squared
//!    distance from the nearest center chosen so far.
//! 2. **Assignment**: label every point with its nearest center.
//! 3. **Update**: move each center to the mean of the points labeled with it.
//! 4. Repeat 2-3 until the centers move less than `tol` (scaled by the mean
//!    per-dimension variance of the data) or `max_iter` is reached.
//!
//! Lloyd's algorithm only finds a local optimum, so the whole procedure is
//! restarted `n_init` times and the run with the lowest inertia (within-cluster
//! sum of squares) is kept.
//!
//! ## Reproducibility
//!
//! With a seed set, restart `i` draws from `StdRng::seed_from_u64(seed + i)`, so
//! the same input and parameters always produce the same labels.
//!
//! ## Label density
//!
//! Degenerate inputs (duplicate points, k close to n) can leave a center with no
//! members. Empty clusters are dropped and the remaining labels compacted, so the
//! labels returned are always exactly `0..m` for some `m <= k`.

use rand::prelude::*;

use super::traits::Clustering;
use super::util;
use crate::error::{Error, Result};

/// K-means clustering.
#[derive(Debug, Clone)]
pub struct Kmeans {
    k: usize,
    max_iter: usize,
    tol: f32,
    n_init: usize,
    seed: Option<u64>,
}

/// Result of a k-means fit.
#[derive(Debug, Clone)]
pub struct KmeansFit {
    /// One center per non-empty cluster, indexed by label.
    pub centroids: Vec<Vec<f32>>,
    /// Dense label per input point.
    pub labels: Vec<usize>,
    /// Within-cluster sum of squared distances.
    pub inertia: f64,
    /// Lloyd iterations used by the winning restart.
    pub n_iter: usize,
}

impl Kmeans {
    /// Create a k-means clusterer for `k` clusters.
    ///
    /// Defaults: `max_iter = 300`, `tol = 1e-4`, `n_init = 10`, unseeded.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 300,
            tol: 1e-4,
            n_init: 10,
            seed: None,
        }
    }

    /// Set the maximum number of Lloyd iterations per restart.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the relative convergence tolerance.
    pub fn with_tol(mut self, tol: f32) -> Self {
        self.tol = tol;
        self
    }

    /// Set the number of restarts.
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Fix the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Fit the model and return centers, labels and inertia.
    pub fn fit(&self, data: &[Vec<f32>]) -> Result<KmeansFit> {
        self.validate(data)?;

        let tol = self.tol * mean_variance(data);
        let base_seed = self.seed.unwrap_or_else(|| rand::rng().random());

        let mut best: Option<KmeansFit> = None;
        for run in 0..self.n_init {
            let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(run as u64));
            let fit = self.run_once(data, tol, &mut rng);
            // Strict comparison: the earliest restart wins ties.
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }

        let fit = best.ok_or(Error::InvalidParameter {
            name: "n_init",
            message: "must be at least 1",
        })?;
        Ok(compact(fit))
    }

    fn validate(&self, data: &[Vec<f32>]) -> Result<()> {
        let n = data.len();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if self.k == 0 || self.k > n {
            return Err(Error::InvalidClusterCount {
                requested: self.k,
                n_items: n,
            });
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iter",
                message: "must be at least 1",
            });
        }
        if self.n_init == 0 {
            return Err(Error::InvalidParameter {
                name: "n_init",
                message: "must be at least 1",
            });
        }
        if !self.tol.is_finite() || self.tol < 0.0 {
            return Err(Error::InvalidParameter {
                name: "tol",
                message: "must be finite and non-negative",
            });
        }

        let d = data[0].len();
        if d == 0 {
            return Err(Error::InvalidParameter {
                name: "dimension",
                message: "must be at least 1",
            });
        }
        for (row, point) in data.iter().enumerate() {
            if point.len() != d {
                return Err(Error::DimensionMismatch {
                    expected: d,
                    found: point.len(),
                });
            }
            if let Some(column) = point.iter().position(|x| !x.is_finite()) {
                return Err(Error::NonFinite { row, column });
            }
        }
        Ok(())
    }

    fn run_once(&self, data: &[Vec<f32>], tol: f32, rng: &mut StdRng) -> KmeansFit {
        let mut centroids = seed_plus_plus(data, self.k, rng);
        let mut labels = vec![0usize; data.len()];
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;
            assign(data, &centroids, &mut labels);

            let updated = update_centroids(data, &labels, &centroids);
            let shift: f32 = centroids
                .iter()
                .zip(updated.iter())
                .map(|(old, new)| util::squared_euclidean(old, new))
                .sum();
            centroids = updated;

            if shift <= tol {
                break;
            }
        }

        let inertia = assign(data, &centroids, &mut labels);
        KmeansFit {
            centroids,
            labels,
            inertia,
            n_iter,
        }
    }
}

impl Default for Kmeans {
    fn default() -> Self {
        Self::new(8)
    }
}

impl Clustering for Kmeans {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        self.fit(data).map(|fit| fit.labels)
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}

/// k-means++ seeding.
fn seed_plus_plus(data: &[Vec<f32>], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let n = data.len();
    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);
    centroids.push(data[rng.random_range(0..n)].clone());

    let mut nearest: Vec<f64> = data
        .iter()
        .map(|p| util::squared_euclidean(p, &centroids[0]) as f64)
        .collect();

    while centroids.len() < k {
        let total: f64 = nearest.iter().sum();
        let next = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut acc = 0.0;
            let mut chosen = n - 1;
            for (i, &w) in nearest.iter().enumerate() {
                acc += w;
                if acc > target {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            // Every point coincides with a center already.
            rng.random_range(0..n)
        };

        let center = data[next].clone();
        for (w, p) in nearest.iter_mut().zip(data.iter()) {
            let d = util::squared_euclidean(p, &center) as f64;
            if d < *w {
                *w = d;
            }
        }
        centroids.push(center);
    }

    centroids
}

/// Label each point with its nearest center (lowest index on ties) and return the inertia.
fn assign(data: &[Vec<f32>], centroids: &[Vec<f32>], labels: &mut [usize]) -> f64 {
    let mut inertia = 0.0f64;
    for (point, label) in data.iter().zip(labels.iter_mut()) {
        let mut best = 0;
        let mut best_d = f32::INFINITY;
        for (c, center) in centroids.iter().enumerate() {
            let d = util::squared_euclidean(point, center);
            if d < best_d {
                best_d = d;
                best = c;
            }
        }
        *label = best;
        inertia += best_d as f64;
    }
    inertia
}

/// Mean of each cluster's members. Empty clusters keep their previous center.
fn update_centroids(data: &[Vec<f32>], labels: &[usize], previous: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let d = data[0].len();
    let mut sums = vec![vec![0.0f64; d]; previous.len()];
    let mut counts = vec![0usize; previous.len()];

    for (point, &label) in data.iter().zip(labels.iter()) {
        counts[label] += 1;
        for (s, &x) in sums[label].iter_mut().zip(point.iter()) {
            *s += x as f64;
        }
    }

    sums.into_iter()
        .zip(counts)
        .zip(previous.iter())
        .map(|((sum, count), prev)| {
            if count == 0 {
                prev.clone()
            } else {
                sum.into_iter().map(|s| (s / count as f64) as f32).collect()
            }
        })
        .collect()
}

fn mean_variance(data: &[Vec<f32>]) -> f32 {
    let n = data.len() as f64;
    let d = data[0].len();
    let mut total = 0.0f64;
    for j in 0..d {
        let mean = data.iter().map(|p| p[j] as f64).sum::<f64>() / n;
        total += data
            .iter()
            .map(|p| {
                let diff = p[j] as f64 - mean;
                diff * diff
            })
            .sum::<f64>()
            / n;
    }
    (total / d as f64) as f32
}

/// Drop empty clusters and renumber labels to `0..m`, preserving center order.
fn compact(mut fit: KmeansFit) -> KmeansFit {
    let k = fit.centroids.len();
    let mut used = vec![false; k];
    for &l in &fit.labels {
        used[l] = true;
    }
    if used.iter().all(|&u| u) {
        return fit;
    }

    let mut remap = vec![usize::MAX; k];
    let mut next = 0;
    for (old, &u) in used.iter().enumerate() {
        if u {
            remap[old] = next;
            next += 1;
        }
    }

    for l in fit.labels.iter_mut() {
        *l = remap[*l];
    }
    fit.centroids = fit
        .centroids
        .into_iter()
        .zip(used)
        .filter_map(|(c, u)| u.then_some(c))
        .collect();
    fit
}
