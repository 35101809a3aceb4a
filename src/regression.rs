//! Ordinary least squares fits of a response against one or several predictors.

use std::fmt::Debug;

use itertools::Itertools;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut2};
use num_traits::real::Real;

use crate::diagnostics::total_sum_of_squares;
use crate::error::{FitError, Result};

/// A straight line `y = intercept + slope * x`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line<R> {
    pub intercept: R,
    pub slope: R,
}

impl<R> Line<R>
where
    R: Real,
{
    pub fn new(intercept: R, slope: R) -> Self {
        Self { intercept, slope }
    }

    /// Evaluate the line at `x`
    pub fn eval(&self, x: R) -> R {
        self.intercept + self.slope * x
    }
}

/// Convert a length into the float type used for the computation
pub(crate) fn cast_len<R: Real>(len: usize) -> R {
    R::from(len).expect("every length is representable as a float")
}

pub(crate) fn mean<R: Real>(values: ArrayView1<R>) -> R {
    values.fold(R::zero(), |acc, &v| acc + v) / cast_len(values.len())
}

fn all_finite<'a, R: Real + 'a>(mut values: impl Iterator<Item = &'a R>) -> bool {
    values.all(|&v| (v - v).is_zero())
}

/// Fit the line minimizing the squared vertical distances to the points `(xs[i], ys[i])`.
///
/// Uses the closed form `slope = Σ(x-x̄)(y-ȳ) / Σ(x-x̄)²`, `intercept = ȳ - slope·x̄` with
/// unweighted means over all points.
///
/// # Errors
/// * [FitError::InputsOfDifferentLengths] if `xs` and `ys` can't be paired up
/// * [FitError::NonFiniteInput] if any value is `NaN` or infinite
/// * [FitError::TooFewPoints] for less than two points
/// * [FitError::NoVarianceInX] if all `xs` coincide
///
/// # Example
/// ```
/// use approx::assert_abs_diff_eq;
/// use ndarray::arr1;
/// use envtrend::regression::fit_simple;
///
/// let xs = arr1(&[1., 2., 3.]);
/// let ys = arr1(&[2., 4., 6.]);
/// let line = fit_simple(xs.view(), ys.view()).unwrap();
/// assert_abs_diff_eq!(line.intercept, 0., epsilon = 1e-12);
/// assert_abs_diff_eq!(line.slope, 2., epsilon = 1e-12);
/// ```
pub fn fit_simple<R>(xs: ArrayView1<R>, ys: ArrayView1<R>) -> Result<Line<R>>
where
    R: Real + Debug,
{
    if xs.len() != ys.len() {
        return Err(FitError::InputsOfDifferentLengths {
            left: xs.len(),
            right: ys.len(),
        });
    }
    if !all_finite(xs.iter().chain(ys.iter())) {
        return Err(FitError::NonFiniteInput);
    }
    if xs.len() < 2 {
        return Err(FitError::TooFewPoints {
            needed: 2,
            got: xs.len(),
        });
    }
    if xs.iter().all_equal() {
        return Err(FitError::NoVarianceInX);
    }

    let x_avg = mean(xs);
    let y_avg = mean(ys);
    let (s_xy, s_xx) = xs
        .iter()
        .zip(ys.iter())
        .fold((R::zero(), R::zero()), |(s_xy, s_xx), (&x, &y)| {
            let dx = x - x_avg;
            (s_xy + dx * (y - y_avg), s_xx + dx * dx)
        });
    let slope = s_xy / s_xx;
    Ok(Line::new(y_avg - slope * x_avg, slope))
}

/// Fit `ys` against every one of the `predictors` on its own.
///
/// The result at index `i` is the fit of `ys` against `predictors[i]`.
pub fn fit_simple_each<R>(ys: ArrayView1<R>, predictors: &[ArrayView1<R>]) -> Vec<Result<Line<R>>>
where
    R: Real + Debug,
{
    predictors
        .iter()
        .map(|xs| fit_simple(xs.view(), ys))
        .collect()
}

/// Parallel version of [fit_simple_each].
#[cfg(feature = "parallel_rayon")]
pub fn fit_simple_each_par<R>(
    ys: ArrayView1<R>,
    predictors: &[ArrayView1<R>],
) -> Vec<Result<Line<R>>>
where
    R: Real + Debug + Send + Sync,
{
    use rayon::prelude::*;

    predictors
        .par_iter()
        .map(|xs| fit_simple(xs.view(), ys))
        .collect()
}

/// A fitted linear model `y = intercept + Σ coefficients[k] * x_k` in several predictors
#[derive(Debug, Clone, PartialEq)]
pub struct MultipleModel<R> {
    pub intercept: R,
    /// One coefficient per predictor, in the order the predictors were given
    pub coefficients: Array1<R>,
    /// Residual sum of squares of the fit
    pub rss: R,
    /// Total sum of squares of the response around its mean
    pub tss: R,
    pub n_observations: usize,
}

impl<R> MultipleModel<R>
where
    R: Real + Debug + 'static,
{
    /// Number of predictors the model expects
    pub fn dimension(&self) -> usize {
        self.coefficients.len()
    }

    /// Evaluate the model at one value per predictor.
    ///
    /// # Errors
    /// [FitError::DimensionMismatch] if `point` doesn't hold exactly one value per predictor.
    pub fn predict(&self, point: ArrayView1<R>) -> Result<R> {
        if point.len() != self.dimension() {
            return Err(FitError::DimensionMismatch {
                expected: self.dimension(),
                got: point.len(),
            });
        }
        Ok(self.intercept + self.coefficients.dot(&point))
    }

    /// Coefficient of determination `1 - RSS/TSS`
    pub fn r_squared(&self) -> Result<R> {
        if self.tss.is_zero() {
            return Err(FitError::NoVarianceInY);
        }
        Ok(R::one() - self.rss / self.tss)
    }

    /// Standard deviation of the residuals, `sqrt(RSS / (n - k - 1))` for `k` predictors
    pub fn residual_std_dev(&self) -> Result<R> {
        let dofs = self.dimension() + 1;
        if self.n_observations <= dofs {
            return Err(FitError::TooFewPoints {
                needed: dofs + 1,
                got: self.n_observations,
            });
        }
        Ok((self.rss / cast_len(self.n_observations - dofs)).sqrt())
    }
}

/// Apply a givens rotation eliminating entry [i,j] of the given array *in-place*
#[inline]
fn apply_givens<R>(mut arr: ArrayViewMut2<R>, i: usize, j: usize)
where
    R: Real + Clone + Debug,
{
    let a = arr[[j, j]];
    let b = arr[[i, j]];
    if b.is_zero() {
        return;
    }
    let r = a.hypot(b);
    let c = a / r;
    let s = -b / r;
    for col_idx in 0..arr.shape()[1] {
        let new_j = c * arr[[j, col_idx]] - s * arr[[i, col_idx]];
        let new_i = s * arr[[j, col_idx]] + c * arr[[i, col_idx]];
        arr[[j, col_idx]] = new_j;
        arr[[i, col_idx]] = new_i;
    }
}

/// Fit `ys` by least squares against several predictors plus an intercept.
///
/// The observations are streamed one at a time into an upper triangular system using givens
/// rotations, which is then back-substituted for the coefficients. Whatever remains of an
/// observation's right hand side after elimination is its contribution to the residual sum of
/// squares.
///
/// # Errors
/// * [FitError::NoPredictors] if `predictors` is empty
/// * [FitError::InputsOfDifferentLengths] if a predictor doesn't match `ys` in length
/// * [FitError::NonFiniteInput] if any value is `NaN` or infinite
/// * [FitError::TooFewPoints] if there are fewer observations than coefficients
/// * [FitError::SingularDesign] if the predictors are collinear or constant
///
/// # Example
/// ```
/// use approx::assert_abs_diff_eq;
/// use ndarray::arr1;
/// use envtrend::regression::fit_multiple;
///
/// let temperature = arr1(&[1., 2., 3., 4., 5., 6.]);
/// let carbon = arr1(&[2., 1., 4., 3., 6., 5.]);
/// // ys = 1 + 2 * temperature - 3 * carbon
/// let ys = arr1(&[-3., 2., -5., 0., -7., -2.]);
/// let model = fit_multiple(ys.view(), &[temperature.view(), carbon.view()]).unwrap();
/// assert_abs_diff_eq!(model.intercept, 1., epsilon = 1e-10);
/// assert_abs_diff_eq!(model.predict(arr1(&[10., 1.]).view()).unwrap(), 18., epsilon = 1e-9);
/// ```
pub fn fit_multiple<R>(ys: ArrayView1<R>, predictors: &[ArrayView1<R>]) -> Result<MultipleModel<R>>
where
    R: Real + Debug + 'static,
{
    if predictors.is_empty() {
        return Err(FitError::NoPredictors);
    }
    if let Some(xs) = predictors.iter().find(|xs| xs.len() != ys.len()) {
        return Err(FitError::InputsOfDifferentLengths {
            left: ys.len(),
            right: xs.len(),
        });
    }
    if !all_finite(ys.iter().chain(predictors.iter().flat_map(|xs| xs.iter()))) {
        return Err(FitError::NonFiniteInput);
    }
    let dofs = predictors.len() + 1;
    if ys.len() < dofs {
        return Err(FitError::TooFewPoints {
            needed: dofs,
            got: ys.len(),
        });
    }

    // We keep the block matrix
    // [R Q^T y]
    // [x y    ]
    // where the first `dofs` rows hold the triangular factor together with the rotated right
    // hand side and the last row receives one observation at a time.
    let mut system_matrix: Array2<R> = Array2::zeros((dofs + 1, dofs + 1));
    let last_row_idx = dofs;
    let last_col_idx = dofs;
    // squared norms of the design matrix columns, used to judge rank deficiency
    let mut column_norms: Array1<R> = Array1::zeros(dofs);

    let mut rss = R::zero();
    for (obs, &y) in ys.iter().enumerate() {
        system_matrix[[last_row_idx, 0]] = R::one();
        for (col, xs) in predictors.iter().enumerate() {
            system_matrix[[last_row_idx, col + 1]] = xs[obs];
        }
        system_matrix[[last_row_idx, last_col_idx]] = y;
        for col in 0..dofs {
            let x = system_matrix[[last_row_idx, col]];
            column_norms[col] = column_norms[col] + x * x;
        }
        for deg in 0..dofs {
            apply_givens(system_matrix.view_mut(), last_row_idx, deg);
        }
        rss = rss + system_matrix[[last_row_idx, last_col_idx]].powi(2);
    }

    let tolerance = R::epsilon().sqrt();
    let rank_deficient = (0..dofs)
        .any(|i| system_matrix[[i, i]].abs() <= tolerance * column_norms[i].sqrt());
    if rank_deficient {
        return Err(FitError::SingularDesign);
    }

    let coeffs = solve_upper_triangular_system(
        system_matrix.slice(s![..last_row_idx, ..last_col_idx]),
        system_matrix.slice(s![..last_row_idx, last_col_idx]),
    );
    Ok(MultipleModel {
        intercept: coeffs[0],
        coefficients: coeffs.slice(s![1..]).to_owned(),
        rss,
        tss: total_sum_of_squares(ys),
        n_observations: ys.len(),
    })
}

/// Solves the linear system `matrix_product(lhs, x) = rhs` for `x`.
///
/// # Returns
/// The solution vector.
///
/// # Arguments
/// * `lhs` is a nonsingular upper triangular matrix
/// * `rhs` a vector with a dimension matching `lhs`
///
/// # Examples
/// ```
/// use approx::assert_abs_diff_eq;
/// use ndarray::{arr1, arr2};
/// use envtrend::regression::solve_upper_triangular_system;
///
/// let lhs = arr2(&[[0.5, 0.5, 0.5], [0., 0.25, 0.25], [0., 0., 0.125]]);
/// let rhs = arr1(&[1., 1., 1.]);
/// let correct_sol = arr1(&[-2., -4., 8.]);
/// let our_sol = solve_upper_triangular_system(lhs.view(), rhs.view());
///
/// assert_abs_diff_eq!(&our_sol, &correct_sol, epsilon = 1e-12);
/// ```
pub fn solve_upper_triangular_system<R>(lhs: ArrayView2<R>, rhs: ArrayView1<R>) -> Array1<R>
where
    R: Real + Debug + 'static,
{
    assert!(lhs.is_square());
    assert_eq!(lhs.shape()[1], rhs.shape()[0]);
    let row_count = rhs.shape()[0];
    let mut sol = Array1::zeros(row_count);
    for i in (0..row_count).rev() {
        let ax = lhs.slice(s![i, i + 1..]).dot(&sol.slice(s![i + 1..]));
        sol[i] = (rhs[i] - ax) / lhs[[i, i]];
    }
    sol
}
