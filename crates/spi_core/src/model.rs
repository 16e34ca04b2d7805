//! # Distribution model
//!
//! A bivariate skew-normal model that is either fitted to data or defined
//! directly from parameters, and that keeps its most recent sample around
//! for scoring.
//!
//! ```text
//! Unfit ──fit──▶ Fitted ──sample──▶ Sampled { from_data: true }
//!   │                                   ▲
//!   └──define_params──▶ Defined ──sample┘ (from_data: false)
//! ```
//!
//! Any `fit` or `define_params` call discards the cached sample; a failed
//! call leaves the model untouched.

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use tracing::debug;

use crate::backend::{self, NativeBackend, SkewNormBackend};
use crate::divergence::{ks2d2s, KsResult, PValueMethod};
use crate::error::{Result, SpiError};
use crate::params::{CentredParams, DirectParams};
use crate::sample::Sample;
use crate::score::Spi;

/// Data accepted by [`DistributionModel::fit`].
#[derive(Debug, Clone, Copy)]
pub enum FitInput<'a> {
    Table(&'a Sample),
    Columns(&'a [f64], &'a [f64]),
}

impl<'a> FitInput<'a> {
    /// Pick the table if given, otherwise both columns.
    pub fn from_options(
        table: Option<&'a Sample>,
        x: Option<&'a [f64]>,
        y: Option<&'a [f64]>,
    ) -> Result<Self> {
        match (table, x, y) {
            (Some(t), _, _) => Ok(FitInput::Table(t)),
            (None, Some(x), Some(y)) => Ok(FitInput::Columns(x, y)),
            _ => Err(SpiError::argument("either data or x and y must be provided")),
        }
    }

    fn to_sample(self) -> Result<Sample> {
        match self {
            FitInput::Table(s) => Ok(s.clone()),
            FitInput::Columns(x, y) => Sample::from_columns(x, y),
        }
    }
}

impl<'a> From<&'a Sample> for FitInput<'a> {
    fn from(s: &'a Sample) -> Self {
        FitInput::Table(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Unfit,
    Fitted,
    Defined,
    Sampled { from_data: bool },
}

pub struct DistributionModel<B: SkewNormBackend = NativeBackend> {
    backend: Arc<B>,
    handle: Option<B::Handle>,
    direct: Option<DirectParams>,
    centred: Option<CentredParams>,
    source_data: Option<Sample>,
    sample_cache: Option<Sample>,
}

impl DistributionModel<NativeBackend> {
    /// Unfit model on the shared backend session.
    pub fn new() -> Self {
        Self::with_backend(backend::session())
    }
}

impl Default for DistributionModel<NativeBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: SkewNormBackend> DistributionModel<B> {
    pub fn with_backend(backend: Arc<B>) -> Self {
        Self {
            backend,
            handle: None,
            direct: None,
            centred: None,
            source_data: None,
            sample_cache: None,
        }
    }

    /// Model defined from already-validated direct parameters.
    pub fn from_direct(backend: Arc<B>, dp: DirectParams) -> Self {
        let mut model = Self::with_backend(backend);
        model.set_direct(dp);
        model
    }

    pub fn state(&self) -> ModelState {
        match (&self.sample_cache, &self.handle, &self.direct) {
            (Some(_), handle, _) => ModelState::Sampled { from_data: handle.is_some() },
            (None, Some(_), _) => ModelState::Fitted,
            (None, None, Some(_)) => ModelState::Defined,
            (None, None, None) => ModelState::Unfit,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn direct(&self) -> Option<&DirectParams> {
        self.direct.as_ref()
    }

    /// Only present after [`fit`](Self::fit).
    pub fn centred(&self) -> Option<&CentredParams> {
        self.centred.as_ref()
    }

    pub fn source_data(&self) -> Option<&Sample> {
        self.source_data.as_ref()
    }

    pub fn sample_data(&self) -> Option<&Sample> {
        self.sample_cache.as_ref()
    }

    /// Fit to a two-column table or to separate x/y columns.
    pub fn fit<'a>(&mut self, input: impl Into<FitInput<'a>>) -> Result<()> {
        let table = input.into().to_sample()?;
        if table.is_empty() {
            return Err(SpiError::argument("cannot fit an empty sample"));
        }
        let handle = self.backend.fit(&table)?;
        let direct = self.backend.extract_direct(&handle)?;
        let centred = self.backend.extract_centred(&handle)?;

        self.handle = Some(handle);
        self.direct = Some(direct);
        self.centred = Some(centred);
        self.source_data = Some(table);
        self.sample_cache = None;
        Ok(())
    }

    /// Define the distribution directly. Fails with a validation error when
    /// omega is not symmetric positive definite.
    pub fn define_params(
        &mut self,
        xi: [f64; 2],
        omega: [[f64; 2]; 2],
        alpha: [f64; 2],
    ) -> Result<()> {
        let dp = DirectParams::from_arrays(xi, omega, alpha)?;
        self.set_direct(dp);
        Ok(())
    }

    pub fn set_direct(&mut self, dp: DirectParams) {
        self.handle = None;
        self.centred = None;
        self.source_data = None;
        self.sample_cache = None;
        self.direct = Some(dp);
    }

    /// Draw `n` points, replacing the cached sample.
    pub fn sample<R: Rng + ?Sized>(&mut self, n: usize, rng: &mut R) -> Result<&Sample> {
        let drawn = match (&self.handle, &self.direct) {
            (Some(handle), _) => self.backend.sample_fitted(handle, n, rng)?,
            (None, Some(dp)) => self.backend.sample_direct(dp, n, rng)?,
            (None, None) => {
                return Err(SpiError::argument(
                    "model must be fitted or have direct parameters before sampling",
                ));
            }
        };
        Ok(self.sample_cache.insert(drawn))
    }

    /// Draw `n` points restricted to the box `[lower, upper]²` by rejection.
    ///
    /// At most `max_rejection_draws` candidates are generated; running out
    /// fails with [`SpiError::ResourceExhausted`] and leaves the cache as it was.
    pub fn sample_truncated<R: Rng + ?Sized>(
        &mut self,
        n: usize,
        lower: f64,
        upper: f64,
        rng: &mut R,
    ) -> Result<&Sample> {
        if !(lower.is_finite() && upper.is_finite() && lower < upper) {
            return Err(SpiError::argument(format!(
                "truncation bounds must be finite with lower < upper (got {}, {})",
                lower, upper
            )));
        }
        let budget = self.backend.config().max_rejection_draws;
        let inside = |p: &[f64; 2]| p.iter().all(|v| (lower..=upper).contains(v));

        let mut accepted = Sample::new(Vec::with_capacity(n));
        let mut drawn = 0usize;
        while accepted.len() < n {
            let remaining = budget.saturating_sub(drawn);
            if remaining == 0 {
                return Err(SpiError::ResourceExhausted { budget, accepted: accepted.len() });
            }
            let batch = ((n - accepted.len()) * 2).max(64).min(remaining);
            let candidates = match (&self.handle, &self.direct) {
                (Some(handle), _) => self.backend.sample_fitted(handle, batch, rng)?,
                (None, Some(dp)) => self.backend.sample_direct(dp, batch, rng)?,
                (None, None) => {
                    return Err(SpiError::argument(
                        "model must be fitted or have direct parameters before sampling",
                    ));
                }
            };
            drawn += batch;
            for p in candidates.points().iter().filter(|p| inside(p)) {
                if accepted.len() == n {
                    break;
                }
                accepted.push(*p);
            }
        }
        debug!(n, drawn, "truncated sample complete");
        Ok(self.sample_cache.insert(accepted))
    }

    /// Human-readable description of the current parameters.
    pub fn summary(&self) -> String {
        let Some(dp) = &self.direct else {
            return "Model is not fitted.".to_string();
        };
        let mut out = match &self.source_data {
            Some(data) => format!("Fitted from data. n = {}\n", data.len()),
            None => "Fitted from direct parameters.\n".to_string(),
        };
        out.push_str(&dp.to_string());
        if let Some(cp) = &self.centred {
            out.push_str("\n\n");
            out.push_str(&cp.to_string());
        }
        out
    }

    /// KS2D of the cached sample (drawing `default_sample_size` points first
    /// if there is none) against `test`.
    pub fn ks2ds<R: Rng + ?Sized>(
        &mut self,
        test: &Sample,
        method: PValueMethod,
        rng: &mut R,
    ) -> Result<KsResult> {
        if self.sample_cache.is_none() {
            let n = self.backend.config().default_sample_size;
            self.sample(n, rng)?;
        }
        self.ks2ds_sampled(test, method)
    }

    /// KS2D against the cached sample without drawing.
    pub fn ks2ds_sampled(&self, test: &Sample, method: PValueMethod) -> Result<KsResult> {
        let cached = self
            .sample_cache
            .as_ref()
            .ok_or_else(|| SpiError::precondition("model has not been sampled"))?;
        ks2d2s(cached, test, method)
    }

    pub fn spi<R: Rng + ?Sized>(&mut self, test: &Sample, rng: &mut R) -> Result<Spi> {
        let r = self.ks2ds(test, PValueMethod::Analytic, rng)?;
        Ok(Spi::from_statistic(r.statistic))
    }

    pub fn spi_sampled(&self, test: &Sample) -> Result<Spi> {
        let r = self.ks2ds_sampled(test, PValueMethod::Analytic)?;
        Ok(Spi::from_statistic(r.statistic))
    }
}

impl<B: SkewNormBackend> Clone for DistributionModel<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            handle: self.handle.clone(),
            direct: self.direct.clone(),
            centred: self.centred.clone(),
            source_data: self.source_data.clone(),
            sample_cache: self.sample_cache.clone(),
        }
    }
}

impl<B: SkewNormBackend> fmt::Debug for DistributionModel<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributionModel")
            .field("state", &self.state())
            .field("direct", &self.direct)
            .field("n_sampled", &self.sample_cache.as_ref().map(Sample::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const XI: [f64; 2] = [0.06534, 0.628637];
    const OMEGA: [[f64; 2]; 2] = [[0.14890315, -0.06423752], [-0.06423752, 0.10139612]];
    const ALPHA: [f64; 2] = [0.79105, -0.767217];

    fn model() -> DistributionModel {
        DistributionModel::with_backend(Arc::new(NativeBackend::new(BackendConfig::testing())))
    }

    fn defined() -> DistributionModel {
        let mut m = model();
        m.define_params(XI, OMEGA, ALPHA).unwrap();
        m
    }

    #[test]
    fn test_unfit_cannot_sample() {
        let mut m = model();
        assert_eq!(m.state(), ModelState::Unfit);
        let err = m.sample(10, &mut ChaCha8Rng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, SpiError::Argument(_)));
        assert_eq!(m.summary(), "Model is not fitted.");
    }

    #[test]
    fn test_defined_sample_length() {
        let mut m = defined();
        assert_eq!(m.state(), ModelState::Defined);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(m.sample(123, &mut rng).unwrap().len(), 123);
        assert_eq!(m.state(), ModelState::Sampled { from_data: false });
        assert_eq!(m.sample_data().map(Sample::len), Some(123));
    }

    #[test]
    fn test_fit_then_sample() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let data = defined().sample(800, &mut rng).unwrap().clone();

        let mut m = model();
        m.fit(&data).unwrap();
        assert_eq!(m.state(), ModelState::Fitted);
        assert!(m.centred().is_some());
        assert_eq!(m.source_data().map(Sample::len), Some(800));

        assert_eq!(m.sample(50, &mut rng).unwrap().len(), 50);
        assert_eq!(m.state(), ModelState::Sampled { from_data: true });
    }

    #[test]
    fn test_fit_from_columns() {
        let x: Vec<f64> = (0..30).map(|i| (i as f64 * 0.37).sin()).collect();
        let y: Vec<f64> = (0..30).map(|i| (i as f64 * 0.11).cos()).collect();
        let mut m = model();
        m.fit(FitInput::Columns(&x, &y)).unwrap();
        assert!(m.summary().starts_with("Fitted from data. n = 30\nDirect Parameters:"));
        assert!(m.summary().contains("Centred Parameters:"));
    }

    #[test]
    fn test_fit_input_requires_data() {
        let err = FitInput::from_options(None, Some(&[1.0]), None).unwrap_err();
        assert!(matches!(err, SpiError::Argument(_)));

        let mut m = model();
        let err = m.fit(FitInput::Columns(&[1.0, 2.0], &[1.0])).unwrap_err();
        assert!(matches!(err, SpiError::Argument(_)));
        assert_eq!(m.state(), ModelState::Unfit);
    }

    #[test]
    fn test_define_clears_fit_and_cache() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let data = defined().sample(200, &mut rng).unwrap().clone();
        let mut m = model();
        m.fit(&data).unwrap();
        m.sample(20, &mut rng).unwrap();

        m.define_params([0.0, 0.0], [[1.0, 0.0], [0.0, 1.0]], [0.0, 0.0]).unwrap();
        assert_eq!(m.state(), ModelState::Defined);
        assert!(m.centred().is_none());
        assert!(m.source_data().is_none());
        assert!(m.sample_data().is_none());
        assert!(m.summary().starts_with("Fitted from direct parameters.\nDirect Parameters:"));
    }

    #[test]
    fn test_refit_clears_cache() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let first = defined().sample(200, &mut rng).unwrap().clone();
        let second = defined().sample(150, &mut rng).unwrap().clone();

        let mut m = defined();
        m.sample(30, &mut rng).unwrap();
        m.fit(&first).unwrap();
        assert_eq!(m.state(), ModelState::Fitted);
        assert!(m.sample_data().is_none());

        m.sample(30, &mut rng).unwrap();
        assert!(m.sample_data().is_some());
        m.fit(&second).unwrap();
        assert!(m.sample_data().is_none());
        assert_eq!(m.source_data().map(|s| s.len()), Some(150));
    }

    #[test]
    fn test_invalid_define_keeps_previous_parameters() {
        let mut m = defined();
        let err = m.define_params([0.0, 0.0], [[1.0, 2.0], [2.0, 1.0]], [0.0, 0.0]).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(m.direct().map(|d| d.xi()[0]), Some(XI[0]));
    }

    #[test]
    fn test_truncated_sample_stays_in_box() {
        let mut m = defined();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let s = m.sample_truncated(300, -1.0, 1.0, &mut rng).unwrap();
        assert_eq!(s.len(), 300);
        assert!(s.points().iter().flatten().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_truncated_sample_budget() {
        let mut m = defined();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let err = m.sample_truncated(10, 50.0, 51.0, &mut rng).unwrap_err();
        assert_eq!(err, SpiError::ResourceExhausted { budget: 10_000, accepted: 0 });
        assert!(m.sample_data().is_none());

        let err = m.sample_truncated(10, 1.0, -1.0, &mut rng).unwrap_err();
        assert!(matches!(err, SpiError::Argument(_)));
    }

    #[test]
    fn test_ks2ds_samples_on_demand() {
        let mut m = defined();
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let test = defined().sample(300, &mut rng).unwrap().clone();

        assert!(matches!(
            m.ks2ds_sampled(&test, PValueMethod::Analytic),
            Err(SpiError::Precondition(_))
        ));
        let r = m.ks2ds(&test, PValueMethod::Analytic, &mut rng).unwrap();
        assert_eq!(m.sample_data().map(Sample::len), Some(500));
        assert!(r.statistic < 0.2);
    }

    #[test]
    fn test_spi_same_distribution_is_high() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let test = defined().sample(500, &mut rng).unwrap().clone();
        let mut m = defined();
        let spi = m.spi(&test, &mut rng).unwrap();
        assert!(spi.value() >= 85, "spi {}", spi);
        assert_eq!(m.spi_sampled(&test).unwrap(), spi);
    }
}
