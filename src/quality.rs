//! Partition quality scoring.
//!
//! The engine ranks candidate group counts with a [`QualityScorer`]. The shipped
//! scorer is the mean silhouette coefficient (Rousseeuw, 1987):
//!
//! ```text
//! a(i) = mean distance from i to the other members of its cluster
//! b(i) = min over other clusters C of the mean distance from i to C
//! s(i) = (b(i) - a(i)) / max(a(i), b(i))
//! ```
//!
//! A point alone in its cluster scores 0. The overall score is the mean of
//! `s(i)`, in `[-1, 1]`, higher meaning tighter and better-separated groups.
//! It is undefined for fewer than two distinct labels.

use std::collections::BTreeMap;

use crate::cluster::util;
use crate::error::{Error, Result};

/// Scores a labeling of `data`; higher is better.
pub trait QualityScorer {
    /// Score `labels` (one per row of `data`).
    ///
    /// Returns [`Error::ScoringUndefined`] when fewer than two distinct labels exist.
    fn score(&self, data: &[Vec<f32>], labels: &[usize]) -> Result<f32>;
}

/// Mean silhouette coefficient over Euclidean distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silhouette;

impl QualityScorer for Silhouette {
    fn score(&self, data: &[Vec<f32>], labels: &[usize]) -> Result<f32> {
        silhouette_score(data, labels)
    }
}

/// Number of distinct labels in a labeling.
pub fn distinct_labels(labels: &[usize]) -> usize {
    let mut seen: Vec<usize> = labels.to_vec();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

/// Mean silhouette coefficient of `labels` over `data`.
pub fn silhouette_score(data: &[Vec<f32>], labels: &[usize]) -> Result<f32> {
    let n = data.len();
    if n == 0 {
        return Err(Error::EmptyInput);
    }
    if labels.len() != n {
        return Err(Error::InvalidParameter {
            name: "labels",
            message: "must have one label per row",
        });
    }

    // Cluster sizes, keyed by label.
    let mut sizes: BTreeMap<usize, usize> = BTreeMap::new();
    for &l in labels {
        *sizes.entry(l).or_default() += 1;
    }
    if sizes.len() < 2 {
        return Err(Error::ScoringUndefined {
            distinct: sizes.len(),
        });
    }
    let slot: BTreeMap<usize, usize> = sizes.keys().enumerate().map(|(i, &l)| (l, i)).collect();
    let counts: Vec<usize> = sizes.values().copied().collect();

    let mut total = 0.0f64;
    let mut dist_sums = vec![0.0f64; counts.len()];
    for i in 0..n {
        dist_sums.iter_mut().for_each(|s| *s = 0.0);
        for j in 0..n {
            if i == j {
                continue;
            }
            let d = (util::squared_euclidean(&data[i], &data[j]) as f64).sqrt();
            dist_sums[slot[&labels[j]]] += d;
        }

        let own = slot[&labels[i]];
        if counts[own] <= 1 {
            continue;
        }
        let a = dist_sums[own] / (counts[own] - 1) as f64;
        let b = dist_sums
            .iter()
            .zip(counts.iter())
            .enumerate()
            .filter(|&(c, _)| c != own)
            .map(|(_, (&sum, &count))| sum / count as f64)
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    Ok(((total / n as f64) as f32).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silhouette_well_separated() {
        let data = vec![
            vec![0.0, 0.0],
            vec![0.0, 0.1],
            vec![10.0, 10.0],
            vec![10.0, 10.1],
        ];
        let s = silhouette_score(&data, &[0, 0, 1, 1]).unwrap();
        assert!(s > 0.95, "got {s}");
    }

    #[test]
    fn test_silhouette_bad_labeling_is_negative() {
        let data = vec![
            vec![0.0, 0.0],
            vec![0.0, 0.1],
            vec![10.0, 10.0],
            vec![10.0, 10.1],
        ];
        let s = silhouette_score(&data, &[0, 1, 0, 1]).unwrap();
        assert!(s < 0.0, "got {s}");
    }

    #[test]
    fn test_silhouette_known_value() {
        // 1-D: {0, 1} vs {4}. Singleton scores 0.
        // s(0) = (4 - 1) / 4, s(1) = (3 - 1) / 3.
        let data = vec![vec![0.0], vec![1.0], vec![4.0]];
        let s = silhouette_score(&data, &[0, 0, 1]).unwrap();
        let expected = (0.75 + 2.0 / 3.0) / 3.0;
        assert!((s as f64 - expected).abs() < 1e-6);
    }

    #[test]
    fn test_silhouette_label_values_need_not_be_dense() {
        let data = vec![vec![0.0], vec![1.0], vec![4.0]];
        let dense = silhouette_score(&data, &[0, 0, 1]).unwrap();
        let sparse = silhouette_score(&data, &[3, 3, 9]).unwrap();
        assert_eq!(dense, sparse);
    }

    #[test]
    fn test_silhouette_undefined_for_one_label() {
        let data = vec![vec![0.0], vec![1.0]];
        assert!(matches!(
            silhouette_score(&data, &[0, 0]),
            Err(Error::ScoringUndefined { distinct: 1 })
        ));
        assert!(Silhouette.score(&data, &[0]).is_err());
    }

    #[test]
    fn test_silhouette_identical_points_is_zero() {
        let data = vec![vec![1.0]; 4];
        let s = silhouette_score(&data, &[0, 0, 1, 1]).unwrap();
        assert_eq!(s, 0.0);
    }

    #[test]
    fn test_distinct_labels() {
        assert_eq!(distinct_labels(&[]), 0);
        assert_eq!(distinct_labels(&[2, 2, 0, 2]), 2);
    }
}
