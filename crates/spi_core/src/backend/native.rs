//! Pure-Rust backend: moment fit + Azzalini stochastic representation.
//!
//! Sampling: with `δ` and `Ω̄` from the direct parameters,
//! `Z = δ·|U₀| + L·U` where `L Lᵀ = Ω̄ − δδᵀ` and `U₀, U ~ N(0, 1)`;
//! the draw is `ξ + ω∘Z`.
//!
//! Fitting: sample mean, covariance and marginal skewness are taken as
//! centred parameters and mapped to direct ones with [`DirectParams::from_cp`].

use nalgebra::{Cholesky, Matrix2, Vector2};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use tracing::{debug, warn};

use super::SkewNormBackend;
use crate::config::BackendConfig;
use crate::error::{Result, SpiError};
use crate::params::{CentredParams, DirectParams};
use crate::sample::Sample;

/// Skewness shrink factor applied while the moment estimate is inadmissible.
const SKEW_SHRINK: f64 = 0.9;
const MAX_SHRINK_STEPS: usize = 60;

/// Handle produced by [`NativeBackend::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct MomentFit {
    direct: DirectParams,
    centred: CentredParams,
    n_obs: usize,
}

impl MomentFit {
    pub fn n_obs(&self) -> usize {
        self.n_obs
    }
}

#[derive(Debug, Clone, Default)]
pub struct NativeBackend {
    config: BackendConfig,
}

impl NativeBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    /// Clamp marginal skewness, then shrink it until the centred set maps to
    /// valid direct parameters.
    fn admissible_direct(
        &self,
        mean: Vector2<f64>,
        sigma: Matrix2<f64>,
        skew: Vector2<f64>,
    ) -> Result<DirectParams> {
        let limit = self.config.max_skew;
        let clamped = skew.map(|g| g.clamp(-limit, limit));
        if clamped != skew {
            warn!(?skew, limit, "sample skewness outside the skew-normal range, clamping");
        }

        let mut current = clamped;
        for step in 0..MAX_SHRINK_STEPS {
            match DirectParams::from_cp(&CentredParams::new(mean, sigma, current)) {
                Ok(dp) => {
                    if step > 0 {
                        debug!(step, ?current, "skewness shrunk to reach an admissible fit");
                    }
                    return Ok(dp);
                }
                Err(err) if err.is_validation() => current *= SKEW_SHRINK,
                Err(err) => return Err(err),
            }
        }
        DirectParams::from_cp(&CentredParams::new(mean, sigma, Vector2::zeros()))
    }
}

impl SkewNormBackend for NativeBackend {
    type Handle = MomentFit;

    fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn fit(&self, data: &Sample) -> Result<MomentFit> {
        let n = data.len();
        if n < 3 {
            return Err(SpiError::argument(format!(
                "need at least 3 observations to fit, got {}",
                n
            )));
        }
        if data.points().iter().flatten().any(|v| !v.is_finite()) {
            return Err(SpiError::argument("data contains non-finite values"));
        }

        let nf = n as f64;
        let mut mean = Vector2::zeros();
        for p in data.points() {
            mean += Vector2::new(p[0], p[1]);
        }
        mean /= nf;

        let mut m2 = Matrix2::zeros();
        let mut m3 = Vector2::zeros();
        for p in data.points() {
            let d = Vector2::new(p[0], p[1]) - mean;
            m2 += d * d.transpose();
            m3 += d.map(|v| v.powi(3));
        }
        let pop_var = Vector2::new(m2[(0, 0)], m2[(1, 1)]) / nf;
        if pop_var.iter().any(|&v| v <= 0.0) {
            return Err(SpiError::validation("data has zero variance in at least one coordinate"));
        }
        let skew = Vector2::new(
            (m3[0] / nf) / pop_var[0].powf(1.5),
            (m3[1] / nf) / pop_var[1].powf(1.5),
        );
        let sigma = m2 / (nf - 1.0);

        let direct = self.admissible_direct(mean, sigma, skew)?;
        let centred = CentredParams::from_dp(&direct);
        debug!(n, "moment fit complete");
        Ok(MomentFit { direct, centred, n_obs: n })
    }

    fn extract_direct(&self, handle: &MomentFit) -> Result<DirectParams> {
        Ok(handle.direct.clone())
    }

    fn extract_centred(&self, handle: &MomentFit) -> Result<CentredParams> {
        Ok(handle.centred.clone())
    }

    fn sample_fitted<R: Rng + ?Sized>(
        &self,
        handle: &MomentFit,
        n: usize,
        rng: &mut R,
    ) -> Result<Sample> {
        self.sample_direct(&handle.direct, n, rng)
    }

    fn sample_direct<R: Rng + ?Sized>(
        &self,
        dp: &DirectParams,
        n: usize,
        rng: &mut R,
    ) -> Result<Sample> {
        let delta = dp.delta();
        let psi = dp.omega_bar() - delta * delta.transpose();
        let chol = Cholesky::new(psi).ok_or_else(|| {
            SpiError::validation("Omega_bar - delta delta' is not positive definite")
        })?;
        let l = chol.l();
        let scales = dp.scales();
        let xi = dp.xi();

        let mut points = Vec::with_capacity(n);
        for _ in 0..n {
            let u0: f64 = StandardNormal.sample(rng);
            let u = Vector2::<f64>::new(StandardNormal.sample(rng), StandardNormal.sample(rng));
            let z = delta * u0.abs() + l * u;
            let x = xi + scales.component_mul(&z);
            points.push([x[0], x[1]]);
        }
        Ok(Sample::new(points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn skewed_dp() -> DirectParams {
        DirectParams::from_arrays(
            [0.06534, 0.628637],
            [[0.14890315, -0.06423752], [-0.06423752, 0.10139612]],
            [0.79105, -0.767217],
        )
        .unwrap()
    }

    #[test]
    fn test_sample_size() {
        let backend = NativeBackend::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let s = backend.sample_direct(&skewed_dp(), 257, &mut rng).unwrap();
        assert_eq!(s.len(), 257);
        assert!(backend.sample_direct(&skewed_dp(), 0, &mut rng).unwrap().is_empty());
    }

    #[test]
    fn test_sample_moments_match_centred() {
        let backend = NativeBackend::default();
        let dp = skewed_dp();
        let cp = CentredParams::from_dp(&dp);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let s = backend.sample_direct(&dp, 40_000, &mut rng).unwrap();

        let mx = stats::mean(&s.xs());
        let my = stats::mean(&s.ys());
        assert!((mx - cp.mean()[0]).abs() < 0.01, "mean x {} vs {}", mx, cp.mean()[0]);
        assert!((my - cp.mean()[1]).abs() < 0.01, "mean y {} vs {}", my, cp.mean()[1]);

        let sx = stats::std_dev(&s.xs());
        assert!((sx * sx - cp.sigma()[(0, 0)]).abs() < 0.01);
    }

    #[test]
    fn test_same_seed_same_sample() {
        let backend = NativeBackend::default();
        let a = backend.sample_direct(&skewed_dp(), 50, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        let b = backend.sample_direct(&skewed_dp(), 50, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fit_recovers_parameters() {
        let backend = NativeBackend::default();
        let dp = skewed_dp();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let data = backend.sample_direct(&dp, 50_000, &mut rng).unwrap();

        let fit = backend.fit(&data).unwrap();
        assert_eq!(fit.n_obs(), 50_000);
        let cp_true = CentredParams::from_dp(&dp);
        let cp_fit = backend.extract_centred(&fit).unwrap();
        assert!((cp_fit.mean() - cp_true.mean()).norm() < 0.01);
        assert!((cp_fit.sigma() - cp_true.sigma()).norm() < 0.01);

        let dp_fit = backend.extract_direct(&fit).unwrap();
        assert!((dp_fit.omega() - dp.omega()).norm() < 0.05);
    }

    #[test]
    fn test_fit_needs_three_points() {
        let backend = NativeBackend::default();
        let data = Sample::new(vec![[0.0, 0.0], [1.0, 1.0]]);
        assert!(matches!(backend.fit(&data).unwrap_err(), SpiError::Argument(_)));
    }

    #[test]
    fn test_fit_constant_column_is_invalid() {
        let backend = NativeBackend::default();
        let data: Sample = (0..20).map(|i| [i as f64, 0.5]).collect();
        assert!(backend.fit(&data).unwrap_err().is_validation());
    }

    #[test]
    fn test_fit_extreme_skew_is_clamped() {
        // One far outlier drives the raw sample skewness past the family limit
        let backend = NativeBackend::default();
        let mut points: Vec<[f64; 2]> =
            (0..50).map(|i| [(i % 7) as f64 * 0.01, (i % 5) as f64 * 0.01]).collect();
        points.push([10.0, 0.02]);
        let fit = backend.fit(&Sample::new(points)).unwrap();
        let skew = backend.extract_centred(&fit).unwrap().skew()[0];
        assert!(skew <= backend.config().max_skew + 1e-9);
    }
}
