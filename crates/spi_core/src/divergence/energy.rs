//! Energy-distance two-sample test (Aslan & Zech 2005; Székely & Rizzo 2013).
//!
//! Both samples are standardised together (pooled mean, population std per
//! coordinate) before distances are taken. The null distribution comes from
//! relabelling the pooled points, either by permutation or by resampling
//! with replacement.

use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::gev::GevParams;
use crate::error::{Result, SpiError};
use crate::sample::Sample;
use crate::stats;

/// Distances below this are treated as this value under the log kernel.
const MIN_LOG_DISTANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyKernel {
    #[default]
    Log,
    Linear,
    Gaussian,
}

impl FromStr for EnergyKernel {
    type Err = SpiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "linear" => Ok(Self::Linear),
            "gaussian" => Ok(Self::Gaussian),
            other => Err(SpiError::argument(format!("unknown energy kernel '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstatOptions {
    pub nboot: usize,
    /// Resample with replacement instead of permuting.
    pub replace: bool,
    pub kernel: EnergyKernel,
    /// Fit a GEV to the null and take the p-value from its survival function.
    pub fitting: bool,
    pub seed: u64,
}

impl Default for EstatOptions {
    fn default() -> Self {
        Self { nboot: 1000, replace: false, kernel: EnergyKernel::Log, fitting: false, seed: 0 }
    }
}

/// Null distribution that produced the p-value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EstatNull {
    Bootstrap(Vec<f64>),
    Gev(GevParams),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstatResult {
    pub p_value: f64,
    pub statistic: f64,
    pub null: EstatNull,
}

fn dist(p: &[f64; 2], q: &[f64; 2]) -> f64 {
    ((p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2)).sqrt()
}

/// Energy statistic between two point sets.
///
/// Within-sample terms sum each unordered pair once.
pub fn energy(x: &[[f64; 2]], y: &[[f64; 2]], kernel: EnergyKernel) -> Result<f64> {
    let transform: fn(f64) -> f64 = match kernel {
        EnergyKernel::Log => |d| d.max(MIN_LOG_DISTANCE).ln(),
        EnergyKernel::Linear => |d| d,
        EnergyKernel::Gaussian => {
            return Err(SpiError::NotSupported("gaussian energy kernel".into()));
        }
    };
    if x.is_empty() || y.is_empty() {
        return Err(SpiError::argument("energy needs two non-empty samples"));
    }

    let within = |s: &[[f64; 2]]| -> f64 {
        let mut total = 0.0;
        for (i, p) in s.iter().enumerate() {
            for q in &s[i + 1..] {
                total += transform(dist(p, q));
            }
        }
        total
    };
    let mut cross = 0.0;
    for p in x {
        for q in y {
            cross += transform(dist(p, q));
        }
    }

    let n = x.len() as f64;
    let m = y.len() as f64;
    Ok(cross / (n * m) - within(x) / (n * n) - within(y) / (m * m))
}

/// Energy test of `x` against `y`.
pub fn estat(x: &Sample, y: &Sample, opts: &EstatOptions) -> Result<EstatResult> {
    if opts.kernel == EnergyKernel::Gaussian {
        return Err(SpiError::NotSupported("gaussian energy kernel".into()));
    }
    if opts.nboot == 0 {
        return Err(SpiError::argument("nboot must be positive"));
    }
    if x.is_empty() || y.is_empty() {
        return Err(SpiError::argument("estat needs two non-empty samples"));
    }

    let stacked = standardise(&x.pooled(y))?;
    let n = x.len();
    let total = stacked.len();
    let statistic = energy(&stacked[..n], &stacked[n..], opts.kernel)?;

    let null = (0..opts.nboot)
        .into_par_iter()
        .map(|i| {
            let mut rng = ChaCha8Rng::seed_from_u64(opts.seed);
            rng.set_stream(i as u64);
            let idx = relabel(total, opts.replace, &mut rng);
            let boot: Vec<[f64; 2]> = idx.iter().map(|&k| stacked[k]).collect();
            energy(&boot[..n], &boot[n..], opts.kernel)
        })
        .collect::<Result<Vec<f64>>>()?;
    debug!(n, m = total - n, nboot = opts.nboot, statistic, "estat bootstrap done");

    if opts.fitting {
        let gev = GevParams::fit(&null)?;
        Ok(EstatResult { p_value: gev.sf(statistic), statistic, null: EstatNull::Gev(gev) })
    } else {
        let exceed = null.iter().filter(|&&e| e >= statistic).count();
        Ok(EstatResult {
            p_value: exceed as f64 / opts.nboot as f64,
            statistic,
            null: EstatNull::Bootstrap(null),
        })
    }
}

/// Column form of [`estat`].
pub fn estat2d(
    x1: &[f64],
    y1: &[f64],
    x2: &[f64],
    y2: &[f64],
    opts: &EstatOptions,
) -> Result<EstatResult> {
    let a = Sample::from_columns(x1, y1)?;
    let b = Sample::from_columns(x2, y2)?;
    estat(&a, &b, opts)
}

fn relabel<R: Rng + ?Sized>(n: usize, replace: bool, rng: &mut R) -> Vec<usize> {
    if replace {
        (0..n).map(|_| rng.gen_range(0..n)).collect()
    } else {
        let mut idx: Vec<usize> = (0..n).collect();
        idx.shuffle(rng);
        idx
    }
}

fn standardise(pooled: &Sample) -> Result<Vec<[f64; 2]>> {
    let xs = pooled.xs();
    let ys = pooled.ys();
    let (mx, my) = (stats::mean(&xs), stats::mean(&ys));
    let (sx, sy) = (stats::std_dev(&xs), stats::std_dev(&ys));
    if sx <= 0.0 || sy <= 0.0 {
        return Err(SpiError::argument("pooled sample has zero spread in a coordinate"));
    }
    Ok(pooled.points().iter().map(|p| [(p[0] - mx) / sx, (p[1] - my) / sy]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud(n: usize, shift: f64) -> Sample {
        // deterministic scatter without a regular lattice
        (0..n)
            .map(|i| {
                let t = i as f64;
                [(t * 0.618_034).fract() + shift, (t * 0.414_214).fract() + shift]
            })
            .collect()
    }

    #[test]
    fn test_linear_energy_by_hand() {
        let e = energy(&[[0.0, 0.0]], &[[1.0, 0.0]], EnergyKernel::Linear).unwrap();
        assert!((e - 1.0).abs() < 1e-12);
        // cross = 1, within(x) = 2 / 4
        let e = energy(&[[0.0, 0.0], [2.0, 0.0]], &[[1.0, 0.0]], EnergyKernel::Linear).unwrap();
        assert!((e - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_log_kernel_handles_coincident_points() {
        let e = energy(&[[0.0, 0.0], [0.0, 0.0]], &[[1.0, 1.0]], EnergyKernel::Log).unwrap();
        assert!(e.is_finite());
    }

    #[test]
    fn test_gaussian_kernel_not_supported() {
        let err = energy(&[[0.0, 0.0]], &[[1.0, 0.0]], EnergyKernel::Gaussian).unwrap_err();
        assert!(matches!(err, SpiError::NotSupported(_)));

        let opts = EstatOptions { kernel: EnergyKernel::Gaussian, ..EstatOptions::default() };
        let err = estat(&cloud(10, 0.0), &cloud(10, 0.5), &opts).unwrap_err();
        assert!(matches!(err, SpiError::NotSupported(_)));
    }

    #[test]
    fn test_kernel_from_str() {
        assert_eq!("LOG".parse::<EnergyKernel>().unwrap(), EnergyKernel::Log);
        assert_eq!("linear".parse::<EnergyKernel>().unwrap(), EnergyKernel::Linear);
        assert!(matches!("cosine".parse::<EnergyKernel>(), Err(SpiError::Argument(_))));
    }

    #[test]
    fn test_separated_samples_have_small_p() {
        let opts = EstatOptions { nboot: 200, seed: 5, ..EstatOptions::default() };
        let r = estat(&cloud(30, 0.0), &cloud(30, 10.0), &opts).unwrap();
        assert!(r.p_value < 0.05, "p = {}", r.p_value);
        assert!(matches!(r.null, EstatNull::Bootstrap(ref v) if v.len() == 200));
    }

    #[test]
    fn test_seed_determines_result() {
        let opts = EstatOptions { nboot: 64, seed: 17, replace: true, ..EstatOptions::default() };
        let a = estat(&cloud(20, 0.0), &cloud(25, 0.2), &opts).unwrap();
        let b = estat(&cloud(20, 0.0), &cloud(25, 0.2), &opts).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_gev_fitted_null() {
        let opts = EstatOptions { nboot: 300, fitting: true, seed: 3, ..EstatOptions::default() };
        let r = estat(&cloud(25, 0.0), &cloud(25, 0.1), &opts).unwrap();
        assert!(matches!(r.null, EstatNull::Gev(_)));
        assert!((0.0..=1.0).contains(&r.p_value));
    }

    #[test]
    fn test_zero_spread_rejected() {
        let a: Sample = (0..5).map(|i| [1.0, i as f64]).collect();
        let b: Sample = (0..5).map(|i| [1.0, i as f64 + 0.5]).collect();
        let err = estat(&a, &b, &EstatOptions::default()).unwrap_err();
        assert!(matches!(err, SpiError::Argument(_)));
    }

    #[test]
    fn test_estat2d_length_mismatch() {
        let err =
            estat2d(&[0.0, 1.0], &[0.0], &[0.0], &[1.0], &EstatOptions::default()).unwrap_err();
        assert!(matches!(err, SpiError::Argument(_)));
    }
}
