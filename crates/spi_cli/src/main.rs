//! spi-grid CLI
//!
//! Grid search for the skew-normal target that best reproduces a ranking
//! of locations, plus a single-group fit report.

#[cfg(feature = "cli")]
use anyhow::Result;
#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "spi-grid")]
#[command(about = "Soundscape Perception Index grid search", long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Args)]
struct DataArgs {
    /// Observation CSV with a header row
    #[arg(long)]
    data: PathBuf,

    #[arg(long, default_value = "LocationID")]
    group_col: String,

    #[arg(long, default_value = "ISOPleasant")]
    x_col: String,

    #[arg(long, default_value = "ISOEventful")]
    y_col: String,
}

#[cfg(feature = "cli")]
impl DataArgs {
    fn columns(&self) -> spi_cli::ColumnNames {
        spi_cli::ColumnNames {
            group: self.group_col.clone(),
            x: self.x_col.clone(),
            y: self.y_col.clone(),
        }
    }
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Search the parameter grid for the best-ranking target
    Grid {
        #[command(flatten)]
        data: DataArgs,

        /// Ranking CSV (group, rank)
        #[arg(long)]
        ranking: PathBuf,

        /// JSON grid config; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, num_args = 2, value_names = ["LO", "HI"])]
        variance_range: Option<Vec<f64>>,

        #[arg(long)]
        variance_n: Option<usize>,

        #[arg(long, num_args = 2, value_names = ["LO", "HI"], allow_negative_numbers = true)]
        covariance_range: Option<Vec<f64>>,

        #[arg(long)]
        covariance_n: Option<usize>,

        #[arg(long, num_args = 2, value_names = ["LO", "HI"], allow_negative_numbers = true)]
        xi_range: Option<Vec<f64>>,

        #[arg(long)]
        xi_n: Option<usize>,

        #[arg(long, num_args = 2, value_names = ["LO", "HI"], allow_negative_numbers = true)]
        alpha_range: Option<Vec<f64>>,

        #[arg(long)]
        alpha_n: Option<usize>,

        /// Points drawn per candidate
        #[arg(long)]
        sample_n: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        /// Run on the rayon thread pool
        #[arg(long, default_value = "false")]
        parallel: bool,

        /// Number of candidates to report
        #[arg(long, default_value = "10")]
        top: usize,

        /// Print the report as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Fit one group and score it against every group
    Fit {
        #[command(flatten)]
        data: DataArgs,

        /// Group to fit
        #[arg(long)]
        group: String,

        #[arg(long, default_value = "0")]
        seed: u64,

        #[arg(long, default_value = "false")]
        json: bool,
    },
}

#[cfg(feature = "cli")]
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[cfg(feature = "cli")]
fn range(values: Option<Vec<f64>>, fallback: (f64, f64)) -> (f64, f64) {
    match values.as_deref() {
        Some([lo, hi]) => (*lo, *hi),
        _ => fallback,
    }
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    use anyhow::Context;
    use spi_cli::{fit_group, load_grid_spec, load_observations, load_ranking, run_search};
    use spi_core::GridSpec;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Grid {
            data,
            ranking,
            config,
            variance_range,
            variance_n,
            covariance_range,
            covariance_n,
            xi_range,
            xi_n,
            alpha_range,
            alpha_n,
            sample_n,
            seed,
            parallel,
            top,
            json,
        } => {
            let base = match &config {
                Some(path) => load_grid_spec(path)?,
                None => GridSpec::default(),
            };
            let spec = GridSpec {
                variance_range: range(variance_range, base.variance_range),
                variance_n: variance_n.unwrap_or(base.variance_n),
                covariance_range: range(covariance_range, base.covariance_range),
                covariance_n: covariance_n.unwrap_or(base.covariance_n),
                xi_range: range(xi_range, base.xi_range),
                xi_n: xi_n.unwrap_or(base.xi_n),
                alpha_range: range(alpha_range, base.alpha_range),
                alpha_n: alpha_n.unwrap_or(base.alpha_n),
                sample_n: sample_n.unwrap_or(base.sample_n),
                seed: seed.unwrap_or(base.seed),
                parallel: parallel || base.parallel,
            };

            let (observations, _) = load_observations(&data.data, &data.columns())?;
            let ranking = load_ranking(&ranking)?;
            let report = run_search(&spec, &observations, &ranking)?;
            let best = spi_cli::summarise(&report, top);

            if json {
                let out = serde_json::to_string_pretty(&best)
                    .context("Failed to serialise grid report")?;
                println!("{}", out);
            } else {
                println!("Scored {} candidates", report.len());
                println!("{:>4}  {:>8}  {:>10}  xi / omega / alpha", "#", "spearman", "weighted");
                for c in &best {
                    println!(
                        "{:>4}  {:>8.4}  {:>10.2}  {:?} / {:?} / {:?}",
                        c.position, c.spearman, c.weighted_spi, c.xi, c.omega, c.alpha
                    );
                }
            }
        }

        Commands::Fit { data, group, seed, json } => {
            let (observations, _) = load_observations(&data.data, &data.columns())?;
            let report = fit_group(&observations, &group, seed)?;

            if json {
                let out =
                    serde_json::to_string_pretty(&report).context("Failed to serialise fit")?;
                println!("{}", out);
            } else {
                println!("{}", report.summary);
                println!("\nSPI of the fitted model against each group:");
                for (other, spi) in &report.scores {
                    println!("   {:<24} {:>3}", other, spi.value());
                }
            }
        }
    }

    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("spi-grid CLI is not available. Enable the 'cli' feature to use it.");
    std::process::exit(1);
}
