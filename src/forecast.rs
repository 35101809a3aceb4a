//! Extrapolation of a fitted line beyond the observed data.

use num_traits::real::Real;

use crate::diagnostics::prediction_interval_half_width;
use crate::regression::Line;

/// Evaluate `line` at `last_known_x + delta`.
///
/// The extrapolation distance isn't bounded; the further `delta` reaches past the data the less
/// the line can be trusted.
///
/// # Example
/// ```
/// use envtrend::{forecast::predict, regression::Line};
///
/// assert_eq!(predict(Line::new(1., 2.), 10., 5.), 31.);
/// ```
pub fn predict<R: Real>(line: Line<R>, last_known_x: R, delta: R) -> R {
    line.eval(last_known_x + delta)
}

/// A point forecast together with the half width of its prediction interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Forecast<R> {
    pub x: R,
    pub value: R,
    pub half_width: R,
}

impl<R: Real> Forecast<R> {
    /// Forecast `line` at `last_known_x + delta` with an 80% interval derived from the residual
    /// standard deviation of the fit.
    pub fn new(line: Line<R>, last_known_x: R, delta: R, residual_std_dev: R) -> Self {
        Self {
            x: last_known_x + delta,
            value: predict(line, last_known_x, delta),
            half_width: prediction_interval_half_width(residual_std_dev),
        }
    }

    pub fn lower(&self) -> R {
        self.value - self.half_width
    }

    pub fn upper(&self) -> R {
        self.value + self.half_width
    }
}
