//! Soundscape Perception Index: the KS2D statistic mapped onto 0..=100.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Integer score in `0..=100`; 100 means the samples are indistinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Spi(u8);

impl Spi {
    pub const MAX: Spi = Spi(100);

    /// `clamp(round(100·(1 − D)), 0, 100)`. A non-finite statistic scores 0.
    pub fn from_statistic(d: f64) -> Self {
        if !d.is_finite() {
            return Spi(0);
        }
        let score = (100.0 * (1.0 - d)).round().clamp(0.0, 100.0);
        Spi(score as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }
}

impl From<Spi> for u8 {
    fn from(spi: Spi) -> u8 {
        spi.0
    }
}

impl fmt::Display for Spi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
