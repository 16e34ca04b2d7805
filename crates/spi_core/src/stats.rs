//! Small descriptive statistics used by the divergence engine and grid search.

use std::cmp::Ordering;
use std::f64::consts::PI;

use statrs::statistics::Statistics;

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().mean()
}

/// Population standard deviation (ddof = 0).
pub fn std_dev(values: &[f64]) -> f64 {
    values.iter().population_std_dev()
}

/// Pearson correlation coefficient.
///
/// Returns 0.0 when either input has zero variance or fewer than two values.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    if x.len() < 2 {
        return 0.0;
    }
    let (sx, sy) = (std_dev(x), std_dev(y));
    if !(sx > 0.0 && sy > 0.0) {
        return 0.0;
    }
    (x.iter().population_covariance(y.iter()) / (sx * sy)).clamp(-1.0, 1.0)
}

/// 1-based ranks with ties sharing their average rank.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // positions i..=j share the mean of ranks i+1..=j+1
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Spearman rank correlation (Pearson on average ranks).
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    pearson(&average_ranks(x), &average_ranks(y))
}

/// Survival function of the Kolmogorov limiting distribution, `P(K > x)`.
pub fn kolmogorov_sf(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 1.0;
    }
    let sf = if x < 1.18 {
        // Jacobi theta form converges fast for small x
        let w = PI * PI / (8.0 * x * x);
        let mut cdf = 0.0;
        for k in 1..=50 {
            let m = (2 * k - 1) as f64;
            let term = (-m * m * w).exp();
            cdf += term;
            if term < 1e-17 {
                break;
            }
        }
        1.0 - (2.0 * PI).sqrt() / x * cdf
    } else {
        let mut total = 0.0;
        for k in 1..=100 {
            let kf = k as f64;
            let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
            let term = (-2.0 * kf * kf * x * x).exp();
            total += sign * term;
            if term < 1e-17 {
                break;
            }
        }
        2.0 * total
    };
    sf.clamp(0.0, 1.0)
}
