//! Fit linear trends to yearly environmental datasets and forecast them.
//!
//! The crate takes datasets keyed by year (threatened species counts, temperature, carbon, ...),
//! reshapes them into aligned sequences, fits a simple or multiple ordinary least squares model,
//! judges the fit by its coefficient of determination and residual spread and forecasts the
//! response with an 80% prediction interval.
//!
//! The statistical functions work on [ndarray] views of any [num_traits::real::Real] float type.
//!
//! # Example
//! ```
//! use approx::assert_abs_diff_eq;
//! use ndarray::arr1;
//! use envtrend::{fit_simple, predict, Diagnostics};
//!
//! let temperature = arr1(&[9.1, 9.4, 9.3, 9.8, 9.9]);
//! let species = arr1(&[11.2, 12.1, 11.9, 13.4, 13.6]);
//! let line = fit_simple(temperature.view(), species.view()).unwrap();
//! let diagnostics = Diagnostics::compute(temperature.view(), species.view(), line).unwrap();
//! assert!(diagnostics.r_squared > 0.95);
//! assert_abs_diff_eq!(diagnostics.residuals.sum(), 0., epsilon = 1e-9);
//!
//! // the species count if temperature rises by another half degree
//! let forecast = predict(line, 9.9, 0.5);
//! assert!(forecast > 13.6);
//! ```

pub mod analysis;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod forecast;
pub mod load;
#[cfg(feature = "plot")]
pub mod plot;
pub mod regression;
pub mod series;

pub use diagnostics::{
    prediction_interval_half_width, r_squared, residual_std_dev, residuals, Diagnostics,
};
pub use error::FitError;
pub use forecast::{predict, Forecast};
#[cfg(feature = "parallel_rayon")]
pub use regression::fit_simple_each_par;
pub use regression::{fit_multiple, fit_simple, fit_simple_each, Line, MultipleModel};
pub use series::{
    drop_last, filter_common_years, from_paired, reduce, to_paired, MultiSeries, PairedSeries,
    Reduction, Series, Year,
};
