//! Errors raised by the statistical core.

use crate::series::Year;

/// The errors that can occur while reshaping series or fitting and evaluating a model
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum FitError {
    /// Two sequences that have to be paired element-wise differ in length
    #[error("inputs have different lengths ({left} vs {right})")]
    InputsOfDifferentLengths { left: usize, right: usize },
    /// An input holds `NaN` or an infinity
    #[error("inputs contain non-finite values")]
    NonFiniteInput,
    /// Not enough data points for the requested statistic
    #[error("at least {needed} data points are required, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    /// All x values coincide so no slope can be determined
    #[error("x values have zero variance")]
    NoVarianceInX,
    /// All y values coincide so the total sum of squares vanishes
    #[error("y values have zero variance")]
    NoVarianceInY,
    /// The design matrix of a multiple regression is rank deficient
    #[error("design matrix is singular; predictors are collinear or constant")]
    SingularDesign,
    /// A prediction input does not have the dimension the model was fit with
    #[error("expected {expected} predictor values, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    /// A multiple regression was requested without any predictors
    #[error("no predictor series given")]
    NoPredictors,
    /// A paired series listed the same year twice
    #[error("year {0} appears more than once")]
    DuplicateYear(Year),
}

/// Result type of the statistical core
pub type Result<T> = std::result::Result<T, FitError>;
