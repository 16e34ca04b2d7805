//! # Skew-normal parameter sets
//!
//! A bivariate skew-normal distribution has two common parameterisations:
//!
//! - **Direct** (`xi`, `omega`, `alpha`): location, scale matrix and shape.
//!   This is what the sampler consumes.
//! - **Centred** (`mean`, `sigma`, `skew`): mean vector, variance-covariance
//!   matrix and marginal skewness. This is what the moment fit produces and
//!   what is easiest to read.
//!
//! Both are immutable once built. [`DirectParams::new`] is the single place
//! where the omega invariant (symmetric, positive definite) is checked.
//!
//! ## Conversions
//! With `ω = sqrt(diag Ω)`, `Ω̄ = ω⁻¹ Ω ω⁻¹` and `b = sqrt(2/π)`:
//!
//! ```text
//! δ    = Ω̄α / sqrt(1 + αᵀΩ̄α)
//! μ_z  = b·δ
//! mean = ξ + ω∘μ_z
//! Σ    = Ω − (ω∘μ_z)(ω∘μ_z)ᵀ
//! γ₁   = (4 − π)/2 · μ_z³ / (1 − μ_z²)^{3/2}
//! ```
//!
//! [`CentredParams::from_dp`] applies these; [`DirectParams::from_cp`] inverts them.

use std::f64::consts::PI;
use std::fmt;

use nalgebra::{Matrix2, SymmetricEigen, Vector2};
use serde::Serialize;

use crate::error::{Result, SpiError};

// numpy.allclose defaults
const RTOL: f64 = 1e-5;
const ATOL: f64 = 1e-8;

/// Supremum of |γ₁| over the skew-normal family (δ → ±1).
pub fn max_skewness() -> f64 {
    let b2 = 2.0 / PI;
    (4.0 - PI) / 2.0 * b2.powf(1.5) / (1.0 - b2).powf(1.5)
}

/// `true` when `a` and `b` agree elementwise within numpy's default tolerances.
pub fn allclose(a: &Matrix2<f64>, b: &Matrix2<f64>) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= ATOL + RTOL * y.abs())
}

pub fn is_symmetric(m: &Matrix2<f64>) -> bool {
    allclose(m, &m.transpose())
}

/// Positive definite: both eigenvalues of the symmetric part strictly positive.
pub fn is_positive_definite(m: &Matrix2<f64>) -> bool {
    if !m.iter().all(|v| v.is_finite()) {
        return false;
    }
    let sym = (m + m.transpose()) * 0.5;
    SymmetricEigen::new(sym).eigenvalues.iter().all(|&ev| ev > 0.0)
}

/// Direct parameters `(xi, omega, alpha)` of a bivariate skew-normal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectParams {
    xi: Vector2<f64>,
    omega: Matrix2<f64>,
    alpha: Vector2<f64>,
}

impl DirectParams {
    /// Build and validate. Fails with [`SpiError::Validation`] when omega is not
    /// symmetric or not positive definite.
    pub fn new(xi: Vector2<f64>, omega: Matrix2<f64>, alpha: Vector2<f64>) -> Result<Self> {
        if !is_symmetric(&omega) {
            return Err(SpiError::validation("Omega must be symmetric"));
        }
        if !is_positive_definite(&omega) {
            return Err(SpiError::validation("Omega must be positive definite"));
        }
        Ok(Self { xi, omega, alpha })
    }

    /// Convenience constructor from plain arrays (`omega` row-major).
    pub fn from_arrays(xi: [f64; 2], omega: [[f64; 2]; 2], alpha: [f64; 2]) -> Result<Self> {
        Self::new(
            Vector2::new(xi[0], xi[1]),
            Matrix2::new(omega[0][0], omega[0][1], omega[1][0], omega[1][1]),
            Vector2::new(alpha[0], alpha[1]),
        )
    }

    pub fn xi(&self) -> &Vector2<f64> {
        &self.xi
    }

    pub fn omega(&self) -> &Matrix2<f64> {
        &self.omega
    }

    pub fn alpha(&self) -> &Vector2<f64> {
        &self.alpha
    }

    /// Optional check that every coordinate of xi lies in `[lo[i], hi[i]]`.
    pub fn xi_in_range(&self, lo: [f64; 2], hi: [f64; 2]) -> bool {
        (0..2).all(|i| lo[i] <= self.xi[i] && self.xi[i] <= hi[i])
    }

    /// Same range applied to both coordinates.
    pub fn xi_in_box(&self, range: (f64, f64)) -> bool {
        self.xi_in_range([range.0; 2], [range.1; 2])
    }

    /// Scale vector `ω = sqrt(diag Ω)`.
    pub fn scales(&self) -> Vector2<f64> {
        Vector2::new(self.omega[(0, 0)].sqrt(), self.omega[(1, 1)].sqrt())
    }

    /// Correlation matrix `Ω̄` implied by omega.
    pub fn omega_bar(&self) -> Matrix2<f64> {
        cov_to_cor(&self.omega)
    }

    /// Skewness direction `δ = Ω̄α / sqrt(1 + αᵀΩ̄α)`; each entry lies in (-1, 1).
    pub fn delta(&self) -> Vector2<f64> {
        let omega_bar = self.omega_bar();
        let oa = omega_bar * self.alpha;
        let q = self.alpha.dot(&oa);
        oa / (1.0 + q).sqrt()
    }

    /// Inverse of [`CentredParams::from_dp`].
    ///
    /// Fails with [`SpiError::Validation`] when the centred parameters fall
    /// outside the skew-normal family (|γ₁| too large, or the implied
    /// `δᵀΩ̄⁻¹δ ≥ 1`).
    pub fn from_cp(cp: &CentredParams) -> Result<Self> {
        let gmax = max_skewness();
        if let Some(g) = cp.skew.iter().find(|g| g.abs() >= gmax) {
            return Err(SpiError::validation(format!(
                "Skewness {:.4} outside the admissible range (|skew| < {:.5})",
                g, gmax
            )));
        }
        if !is_positive_definite(&cp.sigma) {
            return Err(SpiError::validation("Sigma must be positive definite"));
        }

        let b = (2.0 / PI).sqrt();
        let c = cp.skew.map(|g| (2.0 * g / (4.0 - PI)).cbrt());
        let mu_z = c.map(|c| c / (1.0 + c * c).sqrt());
        let sigma_z = mu_z.map(|m| (1.0 - m * m).sqrt());
        let scales = Vector2::new(
            cp.sigma[(0, 0)].sqrt() / sigma_z[0],
            cp.sigma[(1, 1)].sqrt() / sigma_z[1],
        );
        let shift = scales.component_mul(&mu_z);
        let omega = cp.sigma + shift * shift.transpose();
        let xi = cp.mean - shift;

        let delta = mu_z / b;
        let omega_bar = cov_to_cor(&omega);
        let inv = omega_bar
            .try_inverse()
            .ok_or_else(|| SpiError::validation("Implied correlation matrix is singular"))?;
        let inv_delta = inv * delta;
        let q = delta.dot(&inv_delta);
        if q >= 1.0 {
            return Err(SpiError::validation(format!(
                "Centred parameters not admissible (delta' inv(Omega_bar) delta = {:.4})",
                q
            )));
        }
        let alpha = inv_delta / (1.0 - q).sqrt();

        Self::new(xi, omega, alpha)
    }
}

impl fmt::Display for DirectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Direct Parameters:")?;
        writeln!(f, "xi:    {}", fmt_vec(&self.xi))?;
        writeln!(f, "omega: {}", fmt_mat(&self.omega))?;
        write!(f, "alpha: {}", fmt_vec(&self.alpha))
    }
}

/// Centred parameters `(mean, sigma, skew)` of a bivariate skew-normal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CentredParams {
    mean: Vector2<f64>,
    sigma: Matrix2<f64>,
    skew: Vector2<f64>,
}

impl CentredParams {
    /// Values are taken as produced by a fit; admissibility is only checked
    /// when converting with [`DirectParams::from_cp`].
    pub fn new(mean: Vector2<f64>, sigma: Matrix2<f64>, skew: Vector2<f64>) -> Self {
        Self { mean, sigma, skew }
    }

    pub fn mean(&self) -> &Vector2<f64> {
        &self.mean
    }

    pub fn sigma(&self) -> &Matrix2<f64> {
        &self.sigma
    }

    pub fn skew(&self) -> &Vector2<f64> {
        &self.skew
    }

    /// Closed-form direct → centred transform.
    pub fn from_dp(dp: &DirectParams) -> Self {
        let b = (2.0 / PI).sqrt();
        let mu_z = dp.delta() * b;
        let shift = dp.scales().component_mul(&mu_z);
        let mean = dp.xi + shift;
        let sigma = dp.omega - shift * shift.transpose();
        let skew = mu_z.map(|m| (4.0 - PI) / 2.0 * m.powi(3) / (1.0 - m * m).powf(1.5));
        Self { mean, sigma, skew }
    }
}

impl fmt::Display for CentredParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Centred Parameters:")?;
        writeln!(f, "mean:  {}", fmt_vec(&self.mean))?;
        writeln!(f, "sigma: {}", fmt_mat(&self.sigma))?;
        write!(f, "skew:  {}", fmt_vec(&self.skew))
    }
}

fn cov_to_cor(m: &Matrix2<f64>) -> Matrix2<f64> {
    let s0 = m[(0, 0)].sqrt();
    let s1 = m[(1, 1)].sqrt();
    let r = m[(0, 1)] / (s0 * s1);
    Matrix2::new(1.0, r, r, 1.0)
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn fmt_vec(v: &Vector2<f64>) -> String {
    format!("[{} {}]", round3(v[0]), round3(v[1]))
}

fn fmt_mat(m: &Matrix2<f64>) -> String {
    format!(
        "[[{} {}] [{} {}]]",
        round3(m[(0, 0)]),
        round3(m[(0, 1)]),
        round3(m[(1, 0)]),
        round3(m[(1, 1)])
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reference_dp() -> DirectParams {
        DirectParams::from_arrays(
            [0.06534, 0.628637],
            [[0.14890315, -0.06423752], [-0.06423752, 0.10139612]],
            [0.79105, -0.767217],
        )
        .unwrap()
    }

    #[test]
    fn test_identity_is_valid() {
        let dp = DirectParams::from_arrays([0.0, 0.0], [[1.0, 0.0], [0.0, 1.0]], [0.0, 0.0]);
        assert!(dp.is_ok());
    }

    #[test]
    fn test_asymmetric_omega_rejected() {
        let err = DirectParams::from_arrays([0.0, 0.0], [[1.0, 0.5], [0.2, 1.0]], [0.0, 0.0])
            .unwrap_err();
        assert_eq!(err, SpiError::validation("Omega must be symmetric"));
    }

    #[test]
    fn test_indefinite_omega_rejected() {
        let err = DirectParams::from_arrays([0.0, 0.0], [[1.0, 2.0], [2.0, 1.0]], [0.0, 0.0])
            .unwrap_err();
        assert_eq!(err, SpiError::validation("Omega must be positive definite"));

        // Zero variance is singular, not PD
        let err = DirectParams::from_arrays([0.0, 0.0], [[0.0, 0.0], [0.0, 1.0]], [0.0, 0.0])
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_nearly_symmetric_within_tolerance() {
        let dp = DirectParams::from_arrays([0.0, 0.0], [[1.0, 0.3], [0.3 + 1e-9, 1.0]], [0.0, 0.0]);
        assert!(dp.is_ok());
    }

    #[test]
    fn test_xi_range_predicate() {
        let dp = reference_dp();
        assert!(dp.xi_in_box((0.0, 1.0)));
        assert!(!dp.xi_in_box((0.1, 1.0)));
        assert!(dp.xi_in_range([0.0, 0.5], [0.1, 0.7]));
    }

    #[test]
    fn test_dp2cp_normal_special_case() {
        let dp = DirectParams::from_arrays([1.0, -2.0], [[2.0, 0.5], [0.5, 1.0]], [0.0, 0.0])
            .unwrap();
        let cp = CentredParams::from_dp(&dp);
        assert!((cp.mean() - dp.xi()).norm() < 1e-12);
        assert!((cp.sigma() - dp.omega()).norm() < 1e-12);
        assert!(cp.skew().norm() < 1e-12);
    }

    #[test]
    fn test_dp2cp_univariate_reference() {
        // Independent margins reduce to the univariate skew-normal:
        // xi=0, omega=1, alpha=3 => mean 0.7569, var 0.4271, skew 0.6670
        let dp = DirectParams::from_arrays([0.0, 0.0], [[1.0, 0.0], [0.0, 1.0]], [3.0, 0.0])
            .unwrap();
        let cp = CentredParams::from_dp(&dp);
        assert!((cp.mean()[0] - 0.756_9).abs() < 1e-3);
        assert!((cp.sigma()[(0, 0)] - 0.427_0).abs() < 1e-3);
        assert!((cp.skew()[0] - 0.667_0).abs() < 1e-3);
        assert!(cp.skew()[1].abs() < 1e-12);
    }

    #[test]
    fn test_cp_dp_round_trip() {
        let dp = reference_dp();
        let back = DirectParams::from_cp(&CentredParams::from_dp(&dp)).unwrap();
        assert!((back.xi() - dp.xi()).norm() < 1e-8);
        assert!((back.omega() - dp.omega()).norm() < 1e-8);
        assert!((back.alpha() - dp.alpha()).norm() < 1e-6);
    }

    #[test]
    fn test_from_cp_rejects_excess_skew() {
        let cp = CentredParams::new(
            Vector2::zeros(),
            Matrix2::identity(),
            Vector2::new(0.999, 0.0),
        );
        assert!(DirectParams::from_cp(&cp).unwrap_err().is_validation());
    }

    #[test]
    fn test_max_skewness_value() {
        assert!((max_skewness() - 0.99527).abs() < 1e-5);
    }

    #[test]
    fn test_display_rounds() {
        let text = reference_dp().to_string();
        assert!(text.starts_with("Direct Parameters:"));
        assert!(text.contains("xi:    [0.065 0.629]"));
        assert!(text.contains("alpha: [0.791 -0.767]"));
    }

    proptest! {
        #[test]
        fn prop_spd_matrices_accepted(
            v1 in 0.01f64..10.0,
            v2 in 0.01f64..10.0,
            rho in -0.99f64..0.99,
        ) {
            let cov = rho * (v1 * v2).sqrt();
            let dp = DirectParams::from_arrays([0.0, 0.0], [[v1, cov], [cov, v2]], [1.0, -1.0]);
            prop_assert!(dp.is_ok());
        }

        #[test]
        fn prop_asymmetric_matrices_rejected(
            v in 0.5f64..5.0,
            c in -0.4f64..0.4,
            gap in 0.01f64..1.0,
        ) {
            let dp = DirectParams::from_arrays([0.0, 0.0], [[v, c], [c + gap, v]], [0.0, 0.0]);
            prop_assert!(dp.unwrap_err().is_validation());
        }

        #[test]
        fn prop_non_pd_matrices_rejected(
            v1 in 0.01f64..5.0,
            v2 in 0.01f64..5.0,
            excess in 1.05f64..3.0,
        ) {
            // |cov| >= sqrt(v1 v2) makes the determinant non-positive
            let cov = excess * (v1 * v2).sqrt();
            let dp = DirectParams::from_arrays([0.0, 0.0], [[v1, cov], [cov, v2]], [0.0, 0.0]);
            prop_assert!(dp.unwrap_err().is_validation());
        }
    }
}
