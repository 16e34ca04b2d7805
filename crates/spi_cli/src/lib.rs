//! Grid search driver
//!
//! CSV observations + ranking → candidate grid → ranked report

pub mod data;

use anyhow::{bail, Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use spi_core::grid::{construct_omega_grid, construct_target_grid, run_grid, GridReport};
use spi_core::{session, GridSpec, GroupedData, NativeBackend, Ranking, SkewNormBackend, Spi};
use std::path::Path;
use tracing::info;

pub use data::{load_observations, load_ranking, ColumnNames, ParseStats};

/// Read a [`GridSpec`] from JSON; missing fields take their defaults.
pub fn load_grid_spec(path: &Path) -> Result<GridSpec> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read grid config: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse grid config: {}", path.display()))
}

/// Build the candidate grid on the shared backend and score it.
pub fn run_search(
    spec: &GridSpec,
    data: &GroupedData,
    ranking: &Ranking,
) -> Result<GridReport<NativeBackend>> {
    let omegas = construct_omega_grid(
        spec.variance_range,
        spec.variance_n,
        spec.covariance_range,
        spec.covariance_n,
    );
    if omegas.is_empty() {
        bail!("no positive definite omega in the requested variance/covariance ranges");
    }
    let targets = construct_target_grid(&session(), &omegas, spec);
    if targets.is_empty() {
        bail!("every candidate was rejected; widen the parameter ranges");
    }
    info!(omegas = omegas.len(), targets = targets.len(), "scoring candidates");
    let outcomes = run_grid(targets, ranking, data, spec.parallel)?;
    Ok(GridReport::new(outcomes))
}

/// One reported candidate, flattened for printing or JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateSummary {
    pub position: usize,
    pub spearman: f64,
    pub weighted_spi: f64,
    pub xi: [f64; 2],
    pub omega: [[f64; 2]; 2],
    pub alpha: [f64; 2],
}

/// Best `k` candidates by Spearman correlation.
pub fn summarise(report: &GridReport<NativeBackend>, k: usize) -> Vec<CandidateSummary> {
    report
        .top_by_spearman(k)
        .into_iter()
        .enumerate()
        .filter_map(|(i, outcome)| {
            let dp = outcome.target.direct()?;
            let (xi, omega, alpha) = (dp.xi(), dp.omega(), dp.alpha());
            Some(CandidateSummary {
                position: i + 1,
                spearman: outcome.spearman,
                weighted_spi: outcome.weighted_spi,
                xi: [xi[0], xi[1]],
                omega: [[omega[(0, 0)], omega[(0, 1)]], [omega[(1, 0)], omega[(1, 1)]]],
                alpha: [alpha[0], alpha[1]],
            })
        })
        .collect()
}

/// Model fitted to one group and scored against the others.
#[derive(Debug, Clone, Serialize)]
pub struct FitReport {
    pub group: String,
    pub summary: String,
    pub scores: Vec<(String, Spi)>,
}

pub fn fit_group(data: &GroupedData, group: &str, seed: u64) -> Result<FitReport> {
    let sample = data.filter_group(group);
    if sample.is_empty() {
        bail!("group '{}' has no observations", group);
    }
    let mut model = spi_core::DistributionModel::new();
    model.fit(&sample).with_context(|| format!("Failed to fit group '{}'", group))?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n = model.backend().config().default_sample_size;
    model.sample(n, &mut rng)?;

    let mut scores = Vec::new();
    for other in data.groups() {
        let spi = model.spi_sampled(&data.filter_group(other))?;
        scores.push((other.to_string(), spi));
    }
    Ok(FitReport { group: group.to_string(), summary: model.summary(), scores })
}
