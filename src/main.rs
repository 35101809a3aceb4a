//! # envtrend
//!
//! Command-line driver: runs the analysis described by a TOML file and charts the forecast.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use envtrend::{analysis, config};

#[derive(Parser)]
#[command(name = "envtrend")]
#[command(about = "Fit trends to yearly environmental datasets and forecast them", long_about = None)]
struct Cli {
    /// Analysis description (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Chart file to write, overrides `output` of the config
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Year to report the forecast at
    #[arg(long)]
    forecast_year: Option<i32>,

    /// Only print the fitted model, don't render a chart
    #[arg(long)]
    no_plot: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load(&cli.config)?;
    if let Some(output) = cli.output {
        cfg.output = output;
    }
    if cli.forecast_year.is_some() {
        cfg.forecast_year = cli.forecast_year;
    }

    let report = analysis::run(&cfg)?;
    println!("{report}");

    if !cli.no_plot {
        render(&report, &cfg.output)?;
    }
    Ok(())
}

#[cfg(feature = "plot")]
fn render(report: &analysis::Report, output: &std::path::Path) -> anyhow::Result<()> {
    envtrend::plot::render_svg(report, output, envtrend::plot::DEFAULT_SIZE)?;
    Ok(())
}

#[cfg(not(feature = "plot"))]
fn render(_report: &analysis::Report, _output: &std::path::Path) -> anyhow::Result<()> {
    tracing::warn!("built without the `plot` feature, skipping the chart");
    Ok(())
}
