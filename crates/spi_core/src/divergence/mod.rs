//! # Two-sample divergence
//!
//! - [`ks2d`]: two-dimensional Kolmogorov-Smirnov statistic with analytic or
//!   bootstrap p-values. This is what the perception index is built on.
//! - [`energy`]: energy-distance test with a permutation null, optionally
//!   smoothed by a fitted [`gev`] distribution.

pub mod energy;
pub mod gev;
pub mod ks2d;

pub use energy::{energy, estat, estat2d, EnergyKernel, EstatNull, EstatOptions, EstatResult};
pub use gev::GevParams;
pub use ks2d::{avg_max_dist, ks2d2s, ks2d2s_columns, max_dist, KsResult, PValueMethod};
