//! Summary statistics over numeric samples.
//!
//! Percentiles follow the usual linear interpolation between closest ranks, i.e. the `p`-th
//! percentile of `n` ascending samples sits at the fractional rank `p / 100 * (n - 1)`.

use serde::{Deserialize, Serialize};

/// The mean and the 10th, 50th and 90th percentile of a non-empty sequence of samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// The (possibly weighted) arithmetic mean.
    pub mean: f64,
    /// The 10th percentile.
    pub p10: f64,
    /// The 50th percentile (median).
    pub p50: f64,
    /// The 90th percentile.
    pub p90: f64,
}

impl Summary {
    /// Summarizes the samples with their arithmetic mean.
    ///
    /// Returns `None` if there are no samples.
    pub fn of(samples: &[f64]) -> Option<Self> {
        Self::with_mean(samples, mean(samples)?)
    }

    /// Summarizes the samples with their weighted mean.
    ///
    /// Returns `None` if there are no samples, if the number of weights doesn't match the number
    /// of samples or if the weights sum up to zero.
    pub fn weighted(samples: &[f64], weights: &[f64]) -> Option<Self> {
        Self::with_mean(samples, weighted_mean(samples, weights)?)
    }

    fn with_mean(samples: &[f64], mean: f64) -> Option<Self> {
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let (min, max) = (*sorted.first()?, *sorted.last()?);

        Some(Self {
            // rounding can push the mean of (nearly) equal samples just outside of their range
            mean: mean.max(min).min(max),
            p10: percentile(&sorted, 10.)?,
            p50: percentile(&sorted, 50.)?,
            p90: percentile(&sorted, 90.)?,
        })
    }
}

/// Computes the arithmetic mean, `None` for an empty sequence.
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Computes the weighted arithmetic mean.
///
/// Returns `None` instead of dividing by a zero total weight.
pub fn weighted_mean(samples: &[f64], weights: &[f64]) -> Option<f64> {
    if samples.is_empty() || samples.len() != weights.len() {
        return None;
    }
    let total = weights.iter().sum::<f64>();
    if total == 0. {
        return None;
    }
    let weighted = samples
        .iter()
        .zip(weights)
        .map(|(sample, weight)| sample * weight)
        .sum::<f64>();
    Some(weighted / total)
}

/// Computes the `p`-th percentile of samples sorted in ascending order.
///
/// `p` is clamped to `[0, 100]`. Returns `None` for an empty sequence.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (p / 100.).clamp(0., 1.) * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    let (low, high) = (sorted[lower], sorted[upper]);
    Some((low + (high - low) * fraction).max(low).min(high))
}
