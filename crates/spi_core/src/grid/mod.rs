//! # Grid search
//!
//! Find the skew-normal target whose SPI ordering of groups best matches an
//! externally supplied ranking.
//!
//! 1. [`construct_omega_grid`] sweeps the scale matrices and keeps valid ones.
//! 2. [`construct_target_grid`] crosses them with xi and alpha sweeps and
//!    samples every valid candidate.
//! 3. [`run_grid`] scores each candidate with [`target_success`].
//!
//! Candidates are independent; both heavy steps can run on the rayon pool
//! and return results in candidate order.

mod construct;
mod evaluate;

pub use construct::{
    construct_omega_grid, construct_target, construct_target_grid, linspace, CandidateParams,
};
pub use evaluate::{run_grid, target_success, GridOutcome, GridReport, GroupScore, TargetSuccess};
