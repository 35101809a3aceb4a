//! The analysis pipeline: align the datasets, fit the response against the predictors and
//! forecast the response for an assumed change of the predictors.

use std::collections::BTreeSet;
use std::fmt;

use ndarray::{Array1, ArrayView1};
use tracing::{debug, info};

use crate::config::{Config, DatasetCfg};
use crate::diagnostics::{prediction_interval_half_width, r_squared, Diagnostics};
use crate::error::FitError;
use crate::forecast::Forecast;
use crate::load::{self, LoadError};
use crate::regression::{fit_multiple, fit_simple, Line, MultipleModel};
use crate::series::{drop_last, filter_common_years, to_paired, PairedSeries, Series, Year};

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("dataset `{name}`: {source}")]
    Load {
        name: String,
        #[source]
        source: LoadError,
    },

    #[error("dataset `{name}` has no data left after trimming")]
    EmptyDataset { name: String },

    #[error("the datasets share no years")]
    NoCommonYears,

    #[error("fitting the model failed: {0}")]
    Fit(#[from] FitError),
}

/// A reduced dataset entering the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub series: Series,
    /// Number of trailing points to ignore
    pub drop_last: usize,
}

impl Dataset {
    pub fn new(name: impl Into<String>, series: Series) -> Self {
        Self {
            name: name.into(),
            series,
            drop_last: 0,
        }
    }

    pub fn with_drop_last(mut self, count: usize) -> Self {
        self.drop_last = count;
        self
    }

    /// The series without its last `drop_last` points, and the most recent value left
    fn trimmed(&self) -> Result<(PairedSeries, f64), AnalysisError> {
        let paired = drop_last(&to_paired(&self.series), self.drop_last);
        match paired.last() {
            Some((_, last)) => Ok((paired, last)),
            None => Err(AnalysisError::EmptyDataset {
                name: self.name.clone(),
            }),
        }
    }
}

/// A predictor dataset together with its assumed change at the forecast
#[derive(Debug, Clone, PartialEq)]
pub struct Predictor {
    pub dataset: Dataset,
    pub change: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    /// Years left out of every fit
    pub excluded_years: Vec<Year>,
    /// Year the forecast is reported at; the year after the last common year if not set
    pub forecast_year: Option<Year>,
}

/// A predictor as it entered the fit
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorReport {
    pub name: String,
    /// Values in the years of [Report::years]
    pub values: Vec<f64>,
    /// Most recent value of the dataset
    pub last_known: f64,
    /// The value assumed at the forecast, `last_known + change`
    pub future: f64,
    /// Coefficient of determination of the response against this predictor alone
    pub r_squared: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    Simple {
        line: Line<f64>,
        diagnostics: Diagnostics<f64>,
        forecast: Forecast<f64>,
    },
    Multiple(MultipleModel<f64>),
}

/// Outcome of an analysis run
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub response_name: String,
    /// Years shared by all datasets, ascending
    pub years: Vec<Year>,
    pub response: Vec<f64>,
    pub predictors: Vec<PredictorReport>,
    pub model: Model,
    pub forecast_year: Year,
    /// Forecast of the response
    pub prediction: f64,
    /// Half width of the 80% prediction interval around [Report::prediction]
    pub half_width: f64,
}

impl Report {
    pub fn r_squared(&self) -> Option<f64> {
        match &self.model {
            Model::Simple { diagnostics, .. } => Some(diagnostics.r_squared),
            Model::Multiple(model) => model.r_squared().ok(),
        }
    }

    pub fn lower(&self) -> f64 {
        self.prediction - self.half_width
    }

    pub fn upper(&self) -> f64 {
        self.prediction + self.half_width
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            Model::Simple { line, .. } => writeln!(
                f,
                "{} = {:.4} + {:.4} * {}",
                self.response_name, line.intercept, line.slope, self.predictors[0].name
            )?,
            Model::Multiple(model) => {
                write!(f, "{} = {:.4}", self.response_name, model.intercept)?;
                for (coeff, predictor) in model.coefficients.iter().zip(&self.predictors) {
                    write!(f, " + {:.4} * {}", coeff, predictor.name)?;
                }
                writeln!(f)?;
            }
        }
        if let Some(r2) = self.r_squared() {
            writeln!(f, "R² = {:.4} over {} years", r2, self.years.len())?;
        }
        for predictor in &self.predictors {
            write!(
                f,
                "{}: {:.4} -> {:.4}",
                predictor.name, predictor.last_known, predictor.future
            )?;
            if let Some(r2) = predictor.r_squared {
                write!(f, " (R² alone = {:.4})", r2)?;
            }
            writeln!(f)?;
        }
        write!(
            f,
            "{} in {}: {:.2} ± {:.2}",
            self.response_name, self.forecast_year, self.prediction, self.half_width
        )
    }
}

#[cfg(feature = "parallel_rayon")]
fn individual_fits(ys: ArrayView1<f64>, predictors: &[ArrayView1<f64>]) -> Vec<Option<f64>> {
    use crate::regression::fit_simple_each_par;
    fit_simple_each_par(ys, predictors)
        .into_iter()
        .zip(predictors)
        .map(|(line, xs)| line.and_then(|line| r_squared(xs.view(), ys, line)).ok())
        .collect()
}

#[cfg(not(feature = "parallel_rayon"))]
fn individual_fits(ys: ArrayView1<f64>, predictors: &[ArrayView1<f64>]) -> Vec<Option<f64>> {
    use crate::regression::fit_simple_each;
    fit_simple_each(ys, predictors)
        .into_iter()
        .zip(predictors)
        .map(|(line, xs)| line.and_then(|line| r_squared(xs.view(), ys, line)).ok())
        .collect()
}

/// Fit `response` against the `predictors` and forecast it.
///
/// Every dataset is trimmed by its own `drop_last` and restricted to the response years minus the
/// excluded ones; only the years left in all datasets enter the fit. A single predictor gets a
/// simple line fit with full diagnostics, several predictors a multiple regression. The forecast
/// evaluates the model at each predictor's most recent value plus its assumed change.
pub fn analyze(
    response: &Dataset,
    predictors: &[Predictor],
    options: &Options,
) -> Result<Report, AnalysisError> {
    if predictors.is_empty() {
        return Err(FitError::NoPredictors.into());
    }
    let excluded = &options.excluded_years;

    let (response_paired, _) = response.trimmed()?;
    let response_paired = filter_common_years(response_paired.years(), &response_paired, excluded);
    debug!(
        dataset = %response.name,
        years = response_paired.len(),
        "aligned response"
    );

    let mut common: BTreeSet<Year> = response_paired.years().iter().copied().collect();
    let mut aligned = Vec::with_capacity(predictors.len());
    for predictor in predictors {
        let (trimmed, last_known) = predictor.dataset.trimmed()?;
        let paired = filter_common_years(response_paired.years(), &trimmed, excluded);
        debug!(
            dataset = %predictor.dataset.name,
            years = paired.len(),
            last_known,
            "aligned predictor"
        );
        common.retain(|year| paired.years().contains(year));
        aligned.push((paired, last_known));
    }
    if common.is_empty() {
        return Err(AnalysisError::NoCommonYears);
    }
    let common: Vec<Year> = common.into_iter().collect();

    let response_paired = filter_common_years(&common, &response_paired, &[]);
    let aligned: Vec<(PairedSeries, f64)> = aligned
        .into_iter()
        .map(|(paired, last_known)| (filter_common_years(&common, &paired, &[]), last_known))
        .collect();

    let ys = response_paired.ys();
    let views: Vec<ArrayView1<f64>> = aligned.iter().map(|(paired, _)| paired.ys()).collect();
    let individual = individual_fits(ys, &views);

    let predictor_reports: Vec<PredictorReport> = predictors
        .iter()
        .zip(&aligned)
        .zip(individual)
        .map(|((predictor, (paired, last_known)), r_squared)| PredictorReport {
            name: predictor.dataset.name.clone(),
            values: paired.values().to_vec(),
            last_known: *last_known,
            future: last_known + predictor.change,
            r_squared,
        })
        .collect();

    let (model, prediction, half_width) = if let [single] = views.as_slice() {
        let line = fit_simple(single.view(), ys)?;
        let diagnostics = Diagnostics::compute(single.view(), ys, line)?;
        let forecast = Forecast::new(
            line,
            predictor_reports[0].last_known,
            predictors[0].change,
            diagnostics.residual_std_dev,
        );
        info!(
            intercept = line.intercept,
            slope = line.slope,
            r_squared = diagnostics.r_squared,
            "fitted line"
        );
        let (value, half_width) = (forecast.value, forecast.half_width);
        (
            Model::Simple {
                line,
                diagnostics,
                forecast,
            },
            value,
            half_width,
        )
    } else {
        let model = fit_multiple(ys, &views)?;
        let point: Array1<f64> = predictor_reports.iter().map(|p| p.future).collect();
        let prediction = model.predict(point.view())?;
        let half_width = prediction_interval_half_width(model.residual_std_dev()?);
        info!(
            intercept = model.intercept,
            coefficients = ?model.coefficients.to_vec(),
            r_squared = model.r_squared().ok(),
            "fitted multiple model"
        );
        (Model::Multiple(model), prediction, half_width)
    };

    let forecast_year = options
        .forecast_year
        .or_else(|| common.last().map(|year| year + 1))
        .ok_or(AnalysisError::NoCommonYears)?;
    info!(
        year = forecast_year,
        prediction,
        half_width,
        "forecast {}",
        response.name
    );

    Ok(Report {
        response_name: response.name.clone(),
        years: common,
        response: response_paired.values().to_vec(),
        predictors: predictor_reports,
        model,
        forecast_year,
        prediction,
        half_width,
    })
}

/// Load, reduce and analyze the datasets named in `cfg`.
pub fn run(cfg: &Config) -> Result<Report, AnalysisError> {
    let load_dataset = |dataset: &DatasetCfg| -> Result<Dataset, AnalysisError> {
        let raw = load::load(&dataset.path).map_err(|source| AnalysisError::Load {
            name: dataset.name.clone(),
            source,
        })?;
        Ok(
            Dataset::new(dataset.name.clone(), raw.into_scalar(dataset.reduction))
                .with_drop_last(dataset.drop_last),
        )
    };

    let response = load_dataset(&cfg.response)?;
    let predictors = cfg
        .predictors
        .iter()
        .map(|p| {
            Ok(Predictor {
                dataset: load_dataset(&p.dataset)?,
                change: p.change,
            })
        })
        .collect::<Result<Vec<_>, AnalysisError>>()?;
    let options = Options {
        excluded_years: cfg.excluded_years.clone(),
        forecast_year: cfg.forecast_year,
    };
    analyze(&response, &predictors, &options)
}
