//! Goodness of fit and spread of a fitted line.

use std::fmt::Debug;

use itertools::Itertools;
use ndarray::{Array1, ArrayView1};
use num_traits::real::Real;

use crate::error::{FitError, Result};
use crate::regression::{cast_len, mean, Line};

/// Two-sided z-score of an 80% interval under normally distributed residuals
pub const PREDICTION_INTERVAL_Z: f64 = 1.28;

/// `Σ(y-ȳ)²`; exactly zero if all `ys` coincide.
pub(crate) fn total_sum_of_squares<R: Real>(ys: ArrayView1<R>) -> R {
    if ys.iter().all_equal() {
        return R::zero();
    }
    let y_avg = mean(ys);
    ys.fold(R::zero(), |acc, &y| acc + (y - y_avg).powi(2))
}

fn check_lengths<R>(xs: ArrayView1<R>, ys: ArrayView1<R>) -> Result<()> {
    if xs.len() != ys.len() {
        return Err(FitError::InputsOfDifferentLengths {
            left: xs.len(),
            right: ys.len(),
        });
    }
    Ok(())
}

/// The coefficient of determination `1 - SSres/SStot` of `line` on the points `(xs[i], ys[i])`.
///
/// The fitted value of every point is evaluated at its own x value. The result is at most one
/// and may be negative if `line` describes the points worse than their mean does.
///
/// # Errors
/// * [FitError::InputsOfDifferentLengths] if `xs` and `ys` can't be paired up
/// * [FitError::NoVarianceInY] if all `ys` coincide
///
/// # Example
/// ```
/// use approx::assert_abs_diff_eq;
/// use ndarray::arr1;
/// use envtrend::{diagnostics::r_squared, regression::Line};
///
/// let xs = arr1(&[1996., 2000., 2004.]);
/// let ys = xs.mapv(|x| 2. + 3. * x);
/// assert_abs_diff_eq!(r_squared(xs.view(), ys.view(), Line::new(2., 3.)).unwrap(), 1.);
/// ```
pub fn r_squared<R>(xs: ArrayView1<R>, ys: ArrayView1<R>, line: Line<R>) -> Result<R>
where
    R: Real + Debug,
{
    check_lengths(xs, ys)?;
    let s_tot = total_sum_of_squares(ys);
    if s_tot.is_zero() {
        return Err(FitError::NoVarianceInY);
    }
    let s_res = xs
        .iter()
        .zip(ys.iter())
        .fold(R::zero(), |acc, (&x, &y)| acc + (y - line.eval(x)).powi(2));
    Ok(R::one() - s_res / s_tot)
}

/// The residuals `ys[i] - line(xs[i])`, in input order.
pub fn residuals<R>(xs: ArrayView1<R>, ys: ArrayView1<R>, line: Line<R>) -> Result<Array1<R>>
where
    R: Real + Debug,
{
    check_lengths(xs, ys)?;
    Ok(xs
        .iter()
        .zip(ys.iter())
        .map(|(&x, &y)| y - line.eval(x))
        .collect())
}

/// Standard deviation `sqrt(Σr² / (n - 2))` of the residuals of a line fit.
///
/// # Errors
/// [FitError::TooFewPoints] for two or fewer residuals.
pub fn residual_std_dev<R>(residuals: ArrayView1<R>) -> Result<R>
where
    R: Real + Debug,
{
    if residuals.len() <= 2 {
        return Err(FitError::TooFewPoints {
            needed: 3,
            got: residuals.len(),
        });
    }
    let squared_sum = residuals.fold(R::zero(), |acc, &r| acc + r * r);
    Ok((squared_sum / cast_len(residuals.len() - 2)).sqrt())
}

/// Half width of the 80% prediction interval around a forecast
pub fn prediction_interval_half_width<R: Real>(std_dev: R) -> R {
    let z = R::from(PREDICTION_INTERVAL_Z).expect("the z-score is representable as a float");
    z * std_dev
}

/// Everything needed to judge a line fit and to put an interval around its forecasts
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics<R> {
    pub r_squared: R,
    pub residuals: Array1<R>,
    pub residual_std_dev: R,
    pub half_width: R,
}

impl<R> Diagnostics<R>
where
    R: Real + Debug,
{
    /// Compute all diagnostics of `line` on the points `(xs[i], ys[i])`.
    pub fn compute(xs: ArrayView1<R>, ys: ArrayView1<R>, line: Line<R>) -> Result<Self> {
        let residuals = residuals(xs, ys, line)?;
        let residual_std_dev = residual_std_dev(residuals.view())?;
        Ok(Self {
            r_squared: r_squared(xs, ys, line)?,
            half_width: prediction_interval_half_width(residual_std_dev),
            residual_std_dev,
            residuals,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    use super::*;
    use crate::regression::fit_simple;

    #[test]
    fn perfect_line() {
        let xs = arr1(&[0., 1., 2., 3., 4.]);
        let ys = xs.mapv(|x| 2. + 3. * x);
        let r2 = r_squared(xs.view(), ys.view(), Line::new(2., 3.)).unwrap();
        assert_abs_diff_eq!(r2, 1., epsilon = 1e-12);
    }

    #[test]
    fn r_squared_evaluates_true_xs() {
        // xs far away from 0, 1, 2, ... so evaluating at the index would be way off
        let xs = arr1(&[10., 20., 30., 40.]);
        let ys = arr1(&[1.2, 1.9, 3.1, 4.0]);
        let line = fit_simple(xs.view(), ys.view()).unwrap();
        let r2 = r_squared(xs.view(), ys.view(), line).unwrap();
        // y = 0.15 + 0.096 x leaves residuals 0.09, -0.17, 0.07, 0.01
        assert_abs_diff_eq!(r2, 1. - 0.042 / 4.65, epsilon = 1e-9);
    }

    #[test]
    fn negative_r_squared() {
        let xs = arr1(&[1., 2., 3.]);
        let ys = arr1(&[1., 2., 3.]);
        let r2 = r_squared(xs.view(), ys.view(), Line::new(3., -1.)).unwrap();
        assert!(r2 < 0.);
    }

    #[test]
    fn constant_ys() {
        let xs = arr1(&[1., 2., 3.]);
        let ys = arr1(&[0.3, 0.3, 0.3]);
        assert_eq!(
            r_squared(xs.view(), ys.view(), Line::new(0.3, 0.)),
            Err(FitError::NoVarianceInY)
        );
    }

    #[test]
    fn residuals_in_order() {
        let xs = arr1(&[3., 1., 2.]);
        let ys = arr1(&[7., 4., 4.]);
        let res = residuals(xs.view(), ys.view(), Line::new(1., 2.)).unwrap();
        assert_abs_diff_eq!(res, arr1(&[0., 1., -1.]));
    }

    #[test]
    fn std_dev_of_alternating_residuals() {
        let res = arr1(&[1., -1., 1., -1.]);
        assert_abs_diff_eq!(
            residual_std_dev(res.view()).unwrap(),
            2f64.sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn std_dev_needs_three_residuals() {
        let res = arr1(&[1., -1.]);
        assert_eq!(
            residual_std_dev(res.view()),
            Err(FitError::TooFewPoints { needed: 3, got: 2 })
        );
    }

    #[test]
    fn half_width() {
        assert_abs_diff_eq!(prediction_interval_half_width(2.), 2.56, epsilon = 1e-12);
    }

    #[test]
    fn bundle() {
        let xs = arr1(&[1., 2., 3., 4.]);
        let ys = arr1(&[3., 3., 7., 7.]);
        let line = fit_simple(xs.view(), ys.view()).unwrap();
        let diagnostics = Diagnostics::compute(xs.view(), ys.view(), line).unwrap();
        // y = 1 + 1.6 x
        assert_abs_diff_eq!(line.intercept, 1., epsilon = 1e-12);
        assert_abs_diff_eq!(line.slope, 1.6, epsilon = 1e-12);
        assert_abs_diff_eq!(
            diagnostics.residuals,
            arr1(&[0.4, -1.2, 1.2, -0.4]),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(diagnostics.residuals.sum(), 0., epsilon = 1e-12);
        assert_abs_diff_eq!(
            diagnostics.half_width,
            1.28 * diagnostics.residual_std_dev,
            epsilon = 1e-12
        );
        assert!(diagnostics.r_squared > 0. && diagnostics.r_squared < 1.);
    }
}
