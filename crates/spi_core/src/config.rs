//! # Configuration
//!
//! Tunable constants for the sampling backend and the grid search, with
//! presets in the same shape as the defaults the original CLI shipped with.
//!
//! ```rust
//! use spi_core::config::{BackendConfig, GridSpec};
//!
//! let backend = BackendConfig::default();
//! let quick = GridSpec::coarse();
//! assert!(quick.candidate_upper_bound() < GridSpec::default().candidate_upper_bound());
//! ```

use serde::{Deserialize, Serialize};

/// Backend settings shared by every model created from a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Sample size used when a model must sample implicitly (default: 1000)
    pub default_sample_size: usize,
    /// Maximum candidate draws for truncated (rejection) sampling (default: 1_000_000)
    pub max_rejection_draws: usize,
    /// Largest marginal |skewness| accepted by the moment fit (default: 0.99)
    ///
    /// The skew-normal family cannot exceed ~0.99527.
    pub max_skew: f64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self { default_sample_size: 1000, max_rejection_draws: 1_000_000, max_skew: 0.99 }
    }
}

impl BackendConfig {
    /// Small budgets for tests.
    pub fn testing() -> Self {
        Self { default_sample_size: 500, max_rejection_draws: 10_000, ..Self::default() }
    }
}

/// Parameter sweep for the grid search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSpec {
    pub variance_range: (f64, f64),
    pub variance_n: usize,
    pub covariance_range: (f64, f64),
    pub covariance_n: usize,
    pub xi_range: (f64, f64),
    pub xi_n: usize,
    pub alpha_range: (f64, f64),
    pub alpha_n: usize,
    /// Points drawn per candidate
    pub sample_n: usize,
    /// Candidate `i` samples with `ChaCha8Rng::seed_from_u64(seed + i)`
    pub seed: u64,
    pub parallel: bool,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            variance_range: (0.0, 1.0),
            variance_n: 10,
            covariance_range: (-1.0, 1.0),
            covariance_n: 10,
            xi_range: (0.0, 1.0),
            xi_n: 10,
            alpha_range: (0.0, 1.0),
            alpha_n: 10,
            sample_n: 100,
            seed: 0,
            parallel: false,
        }
    }
}

impl GridSpec {
    /// A few hundred candidates; useful for smoke runs.
    pub fn coarse() -> Self {
        Self {
            variance_n: 3,
            covariance_n: 3,
            xi_n: 3,
            alpha_n: 2,
            ..Self::default()
        }
    }

    /// Candidate count before omega filtering drops invalid matrices.
    pub fn candidate_upper_bound(&self) -> usize {
        let omegas = self.variance_n * self.variance_n * self.covariance_n;
        self.xi_n * self.xi_n * omegas * self.alpha_n * self.alpha_n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grid_matches_cli_defaults() {
        let spec = GridSpec::default();
        assert_eq!(spec.variance_range, (0.0, 1.0));
        assert_eq!(spec.covariance_range, (-1.0, 1.0));
        assert_eq!(spec.sample_n, 100);
        assert_eq!(spec.candidate_upper_bound(), 10 * 10 * 1000 * 10 * 10);
    }

    #[test]
    fn test_coarse_is_smaller() {
        assert!(GridSpec::coarse().candidate_upper_bound() < 1000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let spec: GridSpec = serde_json::from_str(r#"{"xi_n": 4, "parallel": true}"#).unwrap();
        assert_eq!(spec.xi_n, 4);
        assert!(spec.parallel);
        assert_eq!(spec.alpha_n, 10);
    }

    #[test]
    fn test_config_serialization() {
        let cfg = BackendConfig::testing();
        let json = serde_json::to_string(&cfg).unwrap();
        let parsed: BackendConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cfg);
    }
}
