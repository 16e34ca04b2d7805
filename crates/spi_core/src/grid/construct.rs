//! Candidate generation: sweep xi, omega and alpha and build one sampled
//! model per valid combination.

use std::sync::Arc;

use nalgebra::{Matrix2, Vector2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::backend::SkewNormBackend;
use crate::config::GridSpec;
use crate::model::DistributionModel;
use crate::params::{is_positive_definite, is_symmetric, DirectParams};

/// `n` evenly spaced values from `lo` to `hi` inclusive (`[lo]` when n = 1).
pub fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (n - 1) as f64;
            (0..n).map(|i| if i == n - 1 { hi } else { lo + step * i as f64 }).collect()
        }
    }
}

/// Every `[[var1, cov], [cov, var2]]` that is symmetric positive definite.
///
/// Order: `var1`, then `var2`, then `cov` (fastest).
pub fn construct_omega_grid(
    variance_range: (f64, f64),
    variance_n: usize,
    covariance_range: (f64, f64),
    covariance_n: usize,
) -> Vec<Matrix2<f64>> {
    let variances = linspace(variance_range.0, variance_range.1, variance_n);
    let covariances = linspace(covariance_range.0, covariance_range.1, covariance_n);

    let mut grid = Vec::new();
    for &v1 in &variances {
        for &v2 in &variances {
            for &cov in &covariances {
                let m = Matrix2::new(v1, cov, cov, v2);
                if is_symmetric(&m) && is_positive_definite(&m) {
                    grid.push(m);
                }
            }
        }
    }
    debug!(
        kept = grid.len(),
        swept = variances.len() * variances.len() * covariances.len(),
        "omega grid built"
    );
    grid
}

/// One point of the parameter sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateParams {
    pub xi: [f64; 2],
    pub omega: Matrix2<f64>,
    pub alpha: [f64; 2],
}

/// Define and sample a single candidate; `None` when the parameters are invalid.
pub fn construct_target<B, R>(
    backend: &Arc<B>,
    params: &CandidateParams,
    n: usize,
    rng: &mut R,
) -> Option<DistributionModel<B>>
where
    B: SkewNormBackend,
    R: Rng + ?Sized,
{
    let dp = match DirectParams::new(
        Vector2::from(params.xi),
        params.omega,
        Vector2::from(params.alpha),
    ) {
        Ok(dp) => dp,
        Err(err) => {
            debug!(?params, %err, "dropping candidate");
            return None;
        }
    };
    let mut model = DistributionModel::from_direct(Arc::clone(backend), dp);
    if let Err(err) = model.sample(n, rng) {
        debug!(?params, %err, "dropping candidate that failed to sample");
        return None;
    }
    Some(model)
}

/// Sampled models for the Cartesian product `alpha_x × alpha_y × omega × xi_x × xi_y`
/// (parameter names in sorted order, `xi_y` fastest). Candidate `i` of the full product samples with
/// `ChaCha8Rng::seed_from_u64(seed + i)`, so dropping invalid candidates or
/// running in parallel never changes the others.
pub fn construct_target_grid<B: SkewNormBackend>(
    backend: &Arc<B>,
    omega_grid: &[Matrix2<f64>],
    spec: &GridSpec,
) -> Vec<DistributionModel<B>> {
    let xis = linspace(spec.xi_range.0, spec.xi_range.1, spec.xi_n);
    let alphas = linspace(spec.alpha_range.0, spec.alpha_range.1, spec.alpha_n);
    let dims = [alphas.len(), alphas.len(), omega_grid.len(), xis.len(), xis.len()];
    let total: usize = dims.iter().product();

    let candidate = |i: usize| -> CandidateParams {
        let mut rest = i;
        let mut digit = [0usize; 5];
        for (d, &size) in digit.iter_mut().zip(dims.iter()).rev() {
            *d = rest % size;
            rest /= size;
        }
        CandidateParams {
            xi: [xis[digit[3]], xis[digit[4]]],
            omega: omega_grid[digit[2]],
            alpha: [alphas[digit[0]], alphas[digit[1]]],
        }
    };
    let build = |i: usize| {
        let mut rng = ChaCha8Rng::seed_from_u64(spec.seed.wrapping_add(i as u64));
        construct_target(backend, &candidate(i), spec.sample_n, &mut rng)
    };

    let built: Vec<Option<DistributionModel<B>>> = if spec.parallel {
        (0..total).into_par_iter().map(build).collect()
    } else {
        (0..total).map(build).collect()
    };
    let targets: Vec<_> = built.into_iter().flatten().collect();
    info!(candidates = total, kept = targets.len(), parallel = spec.parallel, "target grid built");
    targets
}
