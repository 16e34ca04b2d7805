//! Candidate scoring against an external ranking of groups.

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::backend::SkewNormBackend;
use crate::error::{Result, SpiError};
use crate::model::DistributionModel;
use crate::sample::{GroupedData, Ranking};
use crate::score::Spi;
use crate::stats::{average_ranks, spearman};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupScore {
    pub group: String,
    pub spi: Spi,
    /// 1 = highest SPI; tied groups share their average rank
    pub rank: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSuccess {
    /// Spearman correlation between the supplied ranking and the SPI ranks
    pub spearman: f64,
    /// `Σ SPI / rank` over the ranked groups
    pub weighted_spi: f64,
    /// Sorted by SPI, best first
    pub spi_ranks: Vec<GroupScore>,
}

/// Score one sampled target against every group named in `ranking`.
///
/// Groups are ranked by SPI, highest first, with tied groups sharing their
/// average rank. A target that scores every group alike therefore has
/// constant ranks and a Spearman correlation of 0.
pub fn target_success<B: SkewNormBackend>(
    target: &DistributionModel<B>,
    ranking: &Ranking,
    data: &GroupedData,
) -> Result<TargetSuccess> {
    if target.sample_data().is_none() {
        return Err(SpiError::precondition("target has not been sampled"));
    }
    if ranking.is_empty() {
        return Err(SpiError::precondition("ranking is empty"));
    }

    let mut scored = Vec::with_capacity(ranking.len());
    for (group, supplied) in ranking.entries() {
        if !data.contains_group(group) {
            return Err(SpiError::precondition(format!("group '{}' not in data", group)));
        }
        let spi = target.spi_sampled(&data.filter_group(group))?;
        scored.push((group.as_str(), *supplied, spi));
    }

    let negated: Vec<f64> = scored.iter().map(|s| -s.2.as_f64()).collect();
    let spi_rank = average_ranks(&negated);

    let supplied: Vec<f64> = scored.iter().map(|s| s.1).collect();
    let weighted_spi = scored.iter().zip(&spi_rank).map(|(s, &rank)| s.2.as_f64() / rank).sum();

    let mut order: Vec<usize> = (0..scored.len()).collect();
    order.sort_by(|&a, &b| spi_rank[a].total_cmp(&spi_rank[b]));
    let spi_ranks = order
        .iter()
        .map(|&idx| GroupScore {
            group: scored[idx].0.to_string(),
            spi: scored[idx].2,
            rank: spi_rank[idx],
        })
        .collect();

    Ok(TargetSuccess { spearman: spearman(&supplied, &spi_rank), weighted_spi, spi_ranks })
}

/// Result of [`run_grid`] for one candidate.
#[derive(Debug, Clone)]
pub struct GridOutcome<B: SkewNormBackend> {
    pub spearman: f64,
    pub weighted_spi: f64,
    pub target: DistributionModel<B>,
}

/// Evaluate every candidate; outcome `i` belongs to `targets[i]`.
pub fn run_grid<B: SkewNormBackend>(
    targets: Vec<DistributionModel<B>>,
    ranking: &Ranking,
    data: &GroupedData,
    parallel: bool,
) -> Result<Vec<GridOutcome<B>>> {
    let n = targets.len();
    let evaluate = |target: DistributionModel<B>| -> Result<GridOutcome<B>> {
        let success = target_success(&target, ranking, data)?;
        Ok(GridOutcome { spearman: success.spearman, weighted_spi: success.weighted_spi, target })
    };
    let outcomes = if parallel {
        targets.into_par_iter().map(evaluate).collect::<Result<Vec<_>>>()?
    } else {
        targets.into_iter().map(evaluate).collect::<Result<Vec<_>>>()?
    };
    info!(candidates = n, groups = ranking.len(), parallel, "grid evaluated");
    Ok(outcomes)
}

/// Finished grid search with helpers to pick the winners.
#[derive(Debug, Clone)]
pub struct GridReport<B: SkewNormBackend> {
    outcomes: Vec<GridOutcome<B>>,
}

impl<B: SkewNormBackend> GridReport<B> {
    pub fn new(outcomes: Vec<GridOutcome<B>>) -> Self {
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[GridOutcome<B>] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Highest Spearman correlation; the earliest candidate wins ties.
    pub fn best_by_spearman(&self) -> Option<&GridOutcome<B>> {
        self.top_by(1, |o| o.spearman).into_iter().next()
    }

    /// Highest weighted SPI; the earliest candidate wins ties.
    pub fn best_by_weighted(&self) -> Option<&GridOutcome<B>> {
        self.top_by(1, |o| o.weighted_spi).into_iter().next()
    }

    pub fn top_by_spearman(&self, k: usize) -> Vec<&GridOutcome<B>> {
        self.top_by(k, |o| o.spearman)
    }

    pub fn top_by_weighted(&self, k: usize) -> Vec<&GridOutcome<B>> {
        self.top_by(k, |o| o.weighted_spi)
    }

    fn top_by(&self, k: usize, key: impl Fn(&GridOutcome<B>) -> f64) -> Vec<&GridOutcome<B>> {
        let mut refs: Vec<&GridOutcome<B>> = self.outcomes.iter().collect();
        refs.sort_by(|a, b| key(b).total_cmp(&key(a)));
        refs.truncate(k);
        refs
    }
}
