//! Generalized extreme value distribution, used to smooth the bootstrap null
//! of the energy statistic.
//!
//! CDF: `G(x) = exp(-(1 + ξ·(x-μ)/σ)^(-1/ξ))` for ξ ≠ 0,
//!      `G(x) = exp(-exp(-(x-μ)/σ))` for ξ = 0.
//!
//! Parameters are estimated by probability-weighted moments
//! (Hosking, Wallis & Wood 1985), which needs no iterative optimiser.

use serde::Serialize;
use statrs::function::gamma::gamma;

use crate::error::{Result, SpiError};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GevParams {
    /// ξ (Fréchet ξ>0, Gumbel ξ≈0, Weibull ξ<0)
    pub shape: f64,
    pub loc: f64,
    pub scale: f64,
}

impl GevParams {
    /// PWM estimate from a sample (at least 3 values, not all equal).
    pub fn fit(data: &[f64]) -> Result<Self> {
        let n = data.len();
        if n < 3 {
            return Err(SpiError::argument(format!("GEV fit needs at least 3 values, got {}", n)));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(SpiError::argument("GEV fit data must be finite"));
        }

        let mut sorted = data.to_vec();
        sorted.sort_by(f64::total_cmp);
        let nf = n as f64;
        let mut b0 = 0.0;
        let mut b1 = 0.0;
        let mut b2 = 0.0;
        for (j, &x) in sorted.iter().enumerate() {
            let j = j as f64;
            b0 += x;
            b1 += j / (nf - 1.0) * x;
            b2 += j * (j - 1.0) / ((nf - 1.0) * (nf - 2.0)) * x;
        }
        b0 /= nf;
        b1 /= nf;
        b2 /= nf;

        let l2 = 2.0 * b1 - b0;
        if l2 <= 0.0 {
            return Err(SpiError::argument("GEV fit data is degenerate (no spread)"));
        }

        let c = l2 / (3.0 * b2 - b0) - 2f64.ln() / 3f64.ln();
        // Hosking's k = -ξ
        let k = 7.8590 * c + 2.9554 * c * c;
        if k.abs() < 1e-6 {
            let scale = l2 / 2f64.ln();
            return Ok(Self { shape: 0.0, loc: b0 - EULER_GAMMA * scale, scale });
        }
        if k <= -1.0 {
            return Err(SpiError::argument("GEV tail too heavy for a moment estimate"));
        }
        let g = gamma(1.0 + k);
        let scale = l2 * k / (g * (1.0 - 2f64.powf(-k)));
        let loc = b0 + scale * (g - 1.0) / k;
        Ok(Self { shape: -k, loc, scale })
    }

    fn t(&self, x: f64) -> Option<f64> {
        let z = (x - self.loc) / self.scale;
        if self.shape.abs() < 1e-12 {
            return Some((-z).exp());
        }
        let base = 1.0 + self.shape * z;
        if base <= 0.0 {
            None
        } else {
            Some(base.powf(-1.0 / self.shape))
        }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        match self.t(x) {
            Some(t) => (-t).exp(),
            // outside the support: below the lower bound (ξ>0) or above the upper bound (ξ<0)
            None if self.shape > 0.0 => 0.0,
            None => 1.0,
        }
    }

    /// Survival function `1 - G(x)`, computed without cancellation in the upper tail.
    pub fn sf(&self, x: f64) -> f64 {
        match self.t(x) {
            Some(t) => -(-t).exp_m1(),
            None if self.shape > 0.0 => 1.0,
            None => 0.0,
        }
    }
}
