//! TOML description of an analysis: which datasets to load and how to combine them.
//!
//! ```toml
//! excluded_years = [1997, 1999, 2001, 2005]
//! output = "forecast.svg"
//!
//! [response]
//! name = "Threatened Species"
//! path = "data/red_list.xlsx"
//! reduction = "sum"
//!
//! [[predictors]]
//! name = "Temperature"
//! path = "data/temperature.csv"
//! reduction = "mean"
//! drop_last = 4
//! change = 0.5
//! ```

use std::{fs, path::Path, path::PathBuf};

use serde::Deserialize;

use crate::series::{Reduction, Year};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("at least one predictor dataset has to be configured")]
    NoPredictors,

    #[error("predictor `{name}` has a non-finite change")]
    InvalidChange { name: String },
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatasetCfg {
    /// Label used in logs and charts.
    pub name: String,
    /// CSV file or spreadsheet workbook, relative paths are taken relative to the config file.
    pub path: PathBuf,
    /// How several readings of one year are combined.
    #[serde(default)]
    pub reduction: Reduction,
    /// Number of trailing (most recent) points to ignore, e.g. incomplete years.
    #[serde(default)]
    pub drop_last: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PredictorCfg {
    #[serde(flatten)]
    pub dataset: DatasetCfg,
    /// Assumed change of the predictor from its last known value at the forecast.
    #[serde(default)]
    pub change: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub response: DatasetCfg,
    #[serde(default)]
    pub predictors: Vec<PredictorCfg>,
    /// Years with known data quality issues, left out of every fit.
    #[serde(default)]
    pub excluded_years: Vec<Year>,
    /// Year the forecast is drawn at; defaults to the year after the last year
    /// shared by all datasets.
    #[serde(default)]
    pub forecast_year: Option<Year>,
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

fn default_output() -> PathBuf {
    PathBuf::from("forecast.svg")
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.predictors.is_empty() {
            return Err(ConfigError::NoPredictors);
        }
        if let Some(predictor) = self.predictors.iter().find(|p| !p.change.is_finite()) {
            return Err(ConfigError::InvalidChange {
                name: predictor.dataset.name.clone(),
            });
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let datasets = std::iter::once(&mut self.response)
            .chain(self.predictors.iter_mut().map(|p| &mut p.dataset));
        for dataset in datasets {
            if dataset.path.is_relative() {
                dataset.path = base.join(&dataset.path);
            }
        }
    }
}

/// Read and validate a config file. Dataset paths are resolved against the file's directory.
pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let buf = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut cfg = parse(&buf)?;
    if let Some(base) = path.parent() {
        cfg.resolve_paths(base);
    }
    tracing::debug!(
        response = %cfg.response.name,
        predictors = cfg.predictors.len(),
        "loaded config"
    );
    Ok(cfg)
}

/// Parse and validate a config from its TOML source; paths are kept as written.
pub fn parse(source: &str) -> Result<Config, ConfigError> {
    let cfg = toml::from_str::<Config>(source)?;
    cfg.validate()?;
    Ok(cfg)
}
