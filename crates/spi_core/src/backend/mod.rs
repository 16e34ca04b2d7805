//! # Fitting / sampling backend
//!
//! The model never looks inside a fitted handle. Everything it needs goes
//! through [`SkewNormBackend`]: fit a handle from data, read both parameter
//! sets back out, and draw samples either from a handle or from direct
//! parameters.
//!
//! ## Session
//! A backend is set up once per process. [`init_session`] installs the
//! shared [`NativeBackend`] with an explicit configuration; [`session`]
//! returns it, installing the default configuration on first use.

mod native;

pub use native::{MomentFit, NativeBackend};

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use rand::Rng;
use tracing::info;

use crate::config::BackendConfig;
use crate::error::{Result, SpiError};
use crate::params::{CentredParams, DirectParams};
use crate::sample::Sample;

/// Fitting and random-variate generation for the bivariate skew-normal family.
pub trait SkewNormBackend: Send + Sync {
    /// Opaque fitted-model handle.
    type Handle: Clone + fmt::Debug + Send + Sync;

    fn config(&self) -> &BackendConfig;

    /// Fit a model to a two-column table.
    fn fit(&self, data: &Sample) -> Result<Self::Handle>;

    fn extract_direct(&self, handle: &Self::Handle) -> Result<DirectParams>;

    fn extract_centred(&self, handle: &Self::Handle) -> Result<CentredParams>;

    /// Draw `n` points from a fitted handle.
    fn sample_fitted<R: Rng + ?Sized>(
        &self,
        handle: &Self::Handle,
        n: usize,
        rng: &mut R,
    ) -> Result<Sample>;

    /// Draw `n` points from direct parameters.
    fn sample_direct<R: Rng + ?Sized>(
        &self,
        dp: &DirectParams,
        n: usize,
        rng: &mut R,
    ) -> Result<Sample>;
}

static SESSION: OnceCell<Arc<NativeBackend>> = OnceCell::new();

/// One-time process-wide backend setup.
///
/// Calling again with the same configuration returns the existing backend;
/// a different configuration fails with [`SpiError::Argument`].
pub fn init_session(config: BackendConfig) -> Result<Arc<NativeBackend>> {
    let mut installed = false;
    let backend = SESSION.get_or_init(|| {
        installed = true;
        info!(?config, "initialising skew-normal backend session");
        Arc::new(NativeBackend::new(config.clone()))
    });
    if !installed && backend.config() != &config {
        return Err(SpiError::argument(
            "backend session already initialised with a different configuration",
        ));
    }
    Ok(Arc::clone(backend))
}

/// Shared backend, initialised with defaults if [`init_session`] was never called.
pub fn session() -> Arc<NativeBackend> {
    Arc::clone(SESSION.get_or_init(|| {
        info!("initialising skew-normal backend session with defaults");
        Arc::new(NativeBackend::default())
    }))
}
