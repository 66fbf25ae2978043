//! Per-dimension standardization.
//!
//! Each call fits mean and standard deviation on the batch it is given and
//! returns `(x - mean) / std` for every value. Nothing is carried between calls:
//! embedding distributions differ from one invocation to the next.
//!
//! A dimension with zero variance maps to `0.0` everywhere instead of dividing
//! by zero.

use crate::error::{Error, Result};

/// Fitted per-dimension parameters.
///
/// Kept in `f64` so the rounding of a large mean doesn't shift the output.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    /// Mean of each dimension.
    pub mean: Vec<f64>,
    /// Population standard deviation of each dimension; 0 for a constant one.
    pub std: Vec<f64>,
}

impl Standardizer {
    /// Fit mean and population standard deviation over `data`.
    pub fn fit(data: &[Vec<f32>]) -> Result<Self> {
        let d = check_shape(data)?;
        Ok(Self::fit_columns(data, d))
    }

    /// Fit over a batch whose shape has already been checked.
    fn fit_columns(data: &[Vec<f32>], d: usize) -> Self {
        let n = data.len() as f64;

        let mut sums = vec![0.0f64; d];
        for row in data {
            for (s, &x) in sums.iter_mut().zip(row.iter()) {
                *s += x as f64;
            }
        }
        let mean: Vec<f64> = sums.into_iter().map(|s| s / n).collect();

        let mut sq = vec![0.0f64; d];
        for row in data {
            for ((acc, &x), &m) in sq.iter_mut().zip(row.iter()).zip(mean.iter()) {
                let diff = x as f64 - m;
                *acc += diff * diff;
            }
        }

        let std = sq
            .into_iter()
            .zip(mean.iter())
            .map(|(sum, &m)| {
                let var = sum / n;
                if is_constant(var, m, n) {
                    0.0
                } else {
                    var.sqrt()
                }
            })
            .collect();

        Self { mean, std }
    }

    /// Apply the fitted parameters to `data`.
    pub fn transform(&self, data: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        let d = self.mean.len();
        data.iter()
            .map(|row| {
                if row.len() != d {
                    return Err(Error::DimensionMismatch {
                        expected: d,
                        found: row.len(),
                    });
                }
                Ok(self.apply(row))
            })
            .collect()
    }

    fn apply(&self, row: &[f32]) -> Vec<f32> {
        row.iter()
            .zip(self.mean.iter().zip(self.std.iter()))
            .map(|(&x, (&m, &s))| {
                if s > 0.0 {
                    ((x as f64 - m) / s) as f32
                } else {
                    0.0
                }
            })
            .collect()
    }
}

/// A variance this small relative to the column's own scale is accumulated
/// rounding error, not spread.
fn is_constant(var: f64, mean: f64, n: f64) -> bool {
    let bound = n * f64::EPSILON * var + (n * mean * f64::EPSILON).powi(2);
    var <= bound
}

/// Standardize a batch in one step.
///
/// An empty batch standardizes to an empty batch.
pub fn standardize(data: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    Standardizer::fit(data)?.transform(data)
}

/// Standardize a non-empty batch already accepted by
/// [`crate::record::validate_batch`] with dimensionality `d`.
pub(crate) fn standardize_validated(data: &[Vec<f32>], d: usize) -> Vec<Vec<f32>> {
    let fitted = Standardizer::fit_columns(data, d);
    data.iter().map(|row| fitted.apply(row)).collect()
}

fn check_shape(data: &[Vec<f32>]) -> Result<usize> {
    let first = data.first().ok_or(Error::EmptyInput)?;
    let d = first.len();
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
    Ok(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardize_zero_mean_unit_variance() {
        let data = vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]];
        let out = standardize(&data).unwrap();

        for j in 0..2 {
            let col: Vec<f32> = out.iter().map(|r| r[j]).collect();
            let mean = col.iter().sum::<f32>() / 3.0;
            let var = col.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / 3.0;
            assert!(mean.abs() < 1e-6);
            assert!((var - 1.0).abs() < 1e-5);
        }
        assert!(out[0][0] < 0.0 && out[2][0] > 0.0);
    }

    #[test]
    fn test_constant_dimension_is_zero() {
        let data = vec![vec![4.0, 1.0], vec![4.0, 2.0], vec![4.0, 3.0]];
        let out = standardize(&data).unwrap();

        for row in &out {
            assert_eq!(row[0], 0.0);
            assert!(row[1].is_finite());
        }
    }

    #[test]
    fn test_identical_rows_all_zero() {
        let data = vec![vec![0.3, -1.2, 7.0]; 10];
        let out = standardize(&data).unwrap();
        assert!(out.iter().flatten().all(|&x| x == 0.0));
    }

    #[test]
    fn test_fit_is_not_carried_over() {
        let a = Standardizer::fit(&[vec![0.0], vec![2.0]]).unwrap();
        let b = Standardizer::fit(&[vec![100.0], vec![300.0]]).unwrap();
        assert_eq!(a.mean, vec![1.0]);
        assert_eq!(b.mean, vec![200.0]);
        assert_eq!(b.std, vec![100.0]);
    }

    #[test]
    fn test_tiny_spread_is_not_constant() {
        let data = vec![vec![0.0, 1.0], vec![1e-16, 2.0], vec![2e-16, 3.0]];
        let out = standardize(&data).unwrap();

        assert!(out[0][0] < -1.0 && out[2][0] > 1.0);
        assert!(out[1][0].abs() < 1e-4);
        for (row, other) in out.iter().map(|r| r[0]).zip(out.iter().map(|r| r[1])) {
            assert!((row - other).abs() < 1e-4);
        }
    }

    #[test]
    fn test_large_offset_stays_centered() {
        // f32 spacing at 1e8 is 8, so an f32 mean would drift.
        let out = standardize(&[vec![1e8], vec![1e8 + 8.0]]).unwrap();
        assert_eq!(out, vec![vec![-1.0], vec![1.0]]);
    }

    #[test]
    fn test_validated_path_matches_checked_path() {
        let data = vec![vec![1.0, 4.0], vec![2.0, 4.0], vec![6.0, 4.0]];
        assert_eq!(standardize_validated(&data, 2), standardize(&data).unwrap());
    }

    #[test]
    fn test_shape_errors() {
        assert!(standardize(&[]).unwrap().is_empty());
        assert!(matches!(
            standardize(&[vec![1.0, 2.0], vec![1.0]]),
            Err(Error::DimensionMismatch { expected: 2, found: 1 })
        ));
        assert!(standardize(&[vec![], vec![]]).is_err());
        assert!(matches!(
            standardize(&[vec![f32::INFINITY]]),
            Err(Error::NonFinite { row: 0, column: 0 })
        ));
    }
}
