//! CSV ingestion: survey observations and group rankings.
//!
//! Observations come from a table with (at least) a group column and the two
//! perceptual coordinates, looked up by header name. Rows whose coordinates
//! are blank or not numbers are skipped and counted; the rest must parse.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use spi_core::{GroupedData, Observation, Ranking};
use tracing::{info, warn};

/// Header names of the observation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    pub group: String,
    pub x: String,
    pub y: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            group: "LocationID".to_string(),
            x: "ISOPleasant".to_string(),
            y: "ISOEventful".to_string(),
        }
    }
}

/// CSV parsing statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub total_rows: usize,
    pub parsed: usize,
    pub skipped: usize,
}

fn column_index(headers: &csv::StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .with_context(|| format!("column '{}' not found in {}", name, path.display()))
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    let v: f64 = raw.trim().parse().ok()?;
    v.is_finite().then_some(v)
}

/// Read grouped observations from a CSV file with a header row.
pub fn load_observations(path: &Path, columns: &ColumnNames) -> Result<(GroupedData, ParseStats)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .clone();
    let gi = column_index(&headers, &columns.group, path)?;
    let xi = column_index(&headers, &columns.x, path)?;
    let yi = column_index(&headers, &columns.y, path)?;

    let mut stats = ParseStats::default();
    let mut observations = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read row {}", row + 2))?;
        stats.total_rows += 1;
        let (Some(group), Some(x), Some(y)) = (record.get(gi), record.get(xi), record.get(yi))
        else {
            bail!("row {} of {} is missing columns", row + 2, path.display());
        };
        match (parse_coordinate(x), parse_coordinate(y)) {
            (Some(x), Some(y)) => {
                observations.push(Observation { group: group.trim().to_string(), x, y });
                stats.parsed += 1;
            }
            _ => {
                warn!(row = row + 2, x, y, "skipping row without numeric coordinates");
                stats.skipped += 1;
            }
        }
    }
    info!(path = %path.display(), parsed = stats.parsed, skipped = stats.skipped, "observations loaded");
    Ok((GroupedData::new(observations), stats))
}

/// Read a ranking from a CSV file whose first two columns are group and rank.
///
/// Duplicate groups are rejected.
pub fn load_ranking(path: &Path) -> Result<Ranking> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let mut entries = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read row {}", row + 2))?;
        let (Some(group), Some(rank)) = (record.get(0), record.get(1)) else {
            bail!("row {} of {} needs a group and a rank", row + 2, path.display());
        };
        let rank: f64 = rank
            .trim()
            .parse()
            .with_context(|| format!("invalid rank '{}' on row {}", rank.trim(), row + 2))?;
        entries.push((group.trim().to_string(), rank));
    }
    if entries.is_empty() {
        bail!("ranking file {} has no rows", path.display());
    }
    Ok(Ranking::new(entries)?)
}
