//! # spi_core - Soundscape Perception Index
//!
//! Bivariate skew-normal modelling of perceptual ratings in the
//! ISOPleasant/ISOEventful plane, scored against empirical samples with a
//! two-dimensional Kolmogorov-Smirnov test.
//!
//! ## Features
//! - Direct and centred skew-normal parameters with closed-form conversions
//! - Fit/define/sample model backed by a pluggable backend
//! - KS2D and energy-distance two-sample tests
//! - SPI score (0-100) and a parallel grid search over target distributions
//! - Deterministic given a seed

pub mod backend;
pub mod config;
pub mod divergence;
pub mod error;
pub mod grid;
pub mod model;
pub mod params;
pub mod sample;
pub mod score;
pub mod stats;

pub use backend::{init_session, session, NativeBackend, SkewNormBackend};
pub use config::{BackendConfig, GridSpec};
pub use divergence::{ks2d2s, KsResult, PValueMethod};
pub use error::{Result, SpiError};
pub use grid::{construct_omega_grid, construct_target_grid, run_grid, target_success, GridReport};
pub use model::{DistributionModel, FitInput, ModelState};
pub use params::{CentredParams, DirectParams};
pub use sample::{GroupedData, Observation, Ranking, Sample};
pub use score::Spi;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
