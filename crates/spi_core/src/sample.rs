//! Point sets in the ISOPleasant/ISOEventful plane and grouped survey tables.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpiError};

/// Ordered n×2 point set. Column 0 is x (pleasantness), column 1 is y (eventfulness).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sample {
    points: Vec<[f64; 2]>,
}

impl Sample {
    pub fn new(points: Vec<[f64; 2]>) -> Self {
        Self { points }
    }

    /// Zip two columns into a point set.
    pub fn from_columns(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(SpiError::argument(format!(
                "x and y must have the same length (got {} and {})",
                x.len(),
                y.len()
            )));
        }
        Ok(Self { points: x.iter().zip(y).map(|(&a, &b)| [a, b]).collect() })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    pub fn xs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p[0]).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.points.iter().map(|p| p[1]).collect()
    }

    pub fn push(&mut self, point: [f64; 2]) {
        self.points.push(point);
    }

    /// Gather points by index (used by bootstrap resampling).
    pub fn select(&self, indices: &[usize]) -> Self {
        Self { points: indices.iter().map(|&i| self.points[i]).collect() }
    }

    /// Concatenate two samples, `self` first.
    pub fn pooled(&self, other: &Sample) -> Self {
        let mut points = Vec::with_capacity(self.len() + other.len());
        points.extend_from_slice(&self.points);
        points.extend_from_slice(&other.points);
        Self { points }
    }
}

impl From<Vec<[f64; 2]>> for Sample {
    fn from(points: Vec<[f64; 2]>) -> Self {
        Self::new(points)
    }
}

impl FromIterator<[f64; 2]> for Sample {
    fn from_iter<I: IntoIterator<Item = [f64; 2]>>(iter: I) -> Self {
        Self { points: iter.into_iter().collect() }
    }
}

/// One survey response already projected into the 2D perceptual space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub group: String,
    pub x: f64,
    pub y: f64,
}

/// Observations tagged with a categorical group key (e.g. `LocationID`).
#[derive(Debug, Clone, Default)]
pub struct GroupedData {
    observations: Vec<Observation>,
}

impl GroupedData {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Group keys in first-seen order.
    pub fn groups(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.observations
            .iter()
            .filter(|o| seen.insert(o.group.as_str()))
            .map(|o| o.group.as_str())
            .collect()
    }

    pub fn contains_group(&self, group: &str) -> bool {
        self.observations.iter().any(|o| o.group == group)
    }

    /// Points belonging to `group`, in table order. Empty if the group is absent.
    pub fn filter_group(&self, group: &str) -> Sample {
        self.observations.iter().filter(|o| o.group == group).map(|o| [o.x, o.y]).collect()
    }
}

/// Externally supplied ranking of groups (1 = best). Keys are unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    entries: Vec<(String, f64)>,
}

impl Ranking {
    pub fn new(entries: Vec<(String, f64)>) -> Result<Self> {
        let mut seen = HashSet::new();
        for (key, _) in &entries {
            if !seen.insert(key.as_str()) {
                return Err(SpiError::precondition(format!("Ranking has duplicate key '{}'", key)));
            }
        }
        Ok(Self { entries })
    }

    /// Rank groups by their position in `keys` (first = rank 1).
    pub fn from_order<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Result<Self> {
        Self::new(keys.into_iter().enumerate().map(|(i, k)| (k.into(), (i + 1) as f64)).collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn rank_of(&self, key: &str) -> Option<f64> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, r)| *r)
    }
}
