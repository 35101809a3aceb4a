//! Yearly series and the reshaping steps that turn file contents into regression inputs.
//!
//! Every operation here is pure: reductions and alignments return new series and leave their
//! inputs untouched.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use ndarray::{Array1, ArrayView1};
use serde::Deserialize;

use crate::error::{FitError, Result};

/// Calendar year used as the key of every series
pub type Year = i32;

/// A series holding exactly one value per year
pub type Series = BTreeMap<Year, f64>;

/// A series holding several sub-readings per year (category counts, repeated samples, ...)
pub type MultiSeries = BTreeMap<Year, Vec<f64>>;

/// How the readings of a single year are collapsed into one value
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    /// Add the readings up, e.g. threatened species counts split by category
    #[default]
    Sum,
    /// Average the readings, e.g. several temperature samples taken during one year
    Mean,
}

impl Reduction {
    /// Collapse the readings of one year.
    ///
    /// # Panics
    /// Panics if `readings` is empty; a year without readings has no sum or mean.
    pub fn apply(self, readings: &[f64]) -> f64 {
        assert!(
            !readings.is_empty(),
            "cannot reduce a year without any readings"
        );
        let sum: f64 = readings.iter().sum();
        match self {
            Reduction::Sum => sum,
            Reduction::Mean => sum / readings.len() as f64,
        }
    }
}

/// Replace the readings of every year by their sum or mean.
///
/// # Panics
/// Panics if any year maps to an empty list of readings.
///
/// # Example
/// ```
/// use std::collections::BTreeMap;
/// use envtrend::series::{reduce, Reduction};
///
/// let counts = BTreeMap::from([(2000, vec![1., 2., 3.]), (2001, vec![4., 5.])]);
/// let totals = reduce(&counts, Reduction::Sum);
/// assert_eq!(totals, BTreeMap::from([(2000, 6.), (2001, 9.)]));
/// ```
pub fn reduce(series: &MultiSeries, reduction: Reduction) -> Series {
    series
        .iter()
        .map(|(&year, readings)| (year, reduction.apply(readings)))
        .collect()
}

/// Two equal-length sequences of years and the values observed in them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairedSeries {
    years: Vec<Year>,
    values: Vec<f64>,
}

impl PairedSeries {
    /// Pair up `years` and `values`, which have to be of the same length.
    pub fn new(years: Vec<Year>, values: Vec<f64>) -> Result<Self> {
        if years.len() != values.len() {
            return Err(FitError::InputsOfDifferentLengths {
                left: years.len(),
                right: values.len(),
            });
        }
        Ok(Self { years, values })
    }

    pub fn years(&self) -> &[Year] {
        &self.years
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// The most recent entry, i.e. the last one in sequence order
    pub fn last(&self) -> Option<(Year, f64)> {
        self.years.last().copied().zip(self.values.last().copied())
    }

    /// The years as floats, ready to be used as regression inputs
    pub fn xs(&self) -> Array1<f64> {
        self.years.iter().copied().map(f64::from).collect()
    }

    /// A view of the values, ready to be used as regression inputs
    pub fn ys(&self) -> ArrayView1<'_, f64> {
        ArrayView1::from(&self.values[..])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Year, f64)> + '_ {
        self.years
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }
}

/// Split a series into its years and values, ordered by year.
pub fn to_paired(series: &Series) -> PairedSeries {
    let (years, values) = series.iter().map(|(&year, &value)| (year, value)).unzip();
    PairedSeries { years, values }
}

/// Rebuild a series from a paired series.
///
/// Inverse of [to_paired]; fails if a year occurs more than once since the mapping could not
/// hold both values.
pub fn from_paired(pair: &PairedSeries) -> Result<Series> {
    if let Some(&year) = pair.years.iter().duplicates().next() {
        return Err(FitError::DuplicateYear(year));
    }
    Ok(pair.iter().collect())
}

/// Keep only those entries of `candidate` whose year occurs in `reference_years` and is not one
/// of the `excluded` years. The order of `candidate` is preserved.
///
/// # Example
/// ```
/// use envtrend::series::{filter_common_years, PairedSeries};
///
/// let temperature = PairedSeries::new(vec![1995, 1996, 1997, 1998], vec![9.1, 9.3, 9.2, 9.6]).unwrap();
/// let aligned = filter_common_years(&[1996, 1997, 1998], &temperature, &[1997]);
/// assert_eq!(aligned.years(), &[1996, 1998]);
/// assert_eq!(aligned.values(), &[9.3, 9.6]);
/// ```
pub fn filter_common_years(
    reference_years: &[Year],
    candidate: &PairedSeries,
    excluded: &[Year],
) -> PairedSeries {
    let reference: BTreeSet<Year> = reference_years.iter().copied().collect();
    let excluded: BTreeSet<Year> = excluded.iter().copied().collect();
    let (years, values) = candidate
        .iter()
        .filter(|(year, _)| reference.contains(year) && !excluded.contains(year))
        .unzip();
    PairedSeries { years, values }
}

/// Drop the last `count` entries. Dropping at least as many entries as there are yields an empty
/// series.
pub fn drop_last(paired: &PairedSeries, count: usize) -> PairedSeries {
    let keep = paired.len().saturating_sub(count);
    PairedSeries {
        years: paired.years[..keep].to_vec(),
        values: paired.values[..keep].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn sum_reduction() {
        let counts = MultiSeries::from([(2000, vec![1., 2., 3.]), (2001, vec![4., 5.])]);
        let reduced = reduce(&counts, Reduction::Sum);
        assert_eq!(reduced, Series::from([(2000, 6.), (2001, 9.)]));
        // the input is left as it was
        assert_eq!(counts[&2000], vec![1., 2., 3.]);
    }

    #[test]
    fn mean_reduction() {
        let samples = MultiSeries::from([(1990, vec![8.5, 9.5]), (1991, vec![9., 9.3, 9.6])]);
        let reduced = reduce(&samples, Reduction::Mean);
        assert_abs_diff_eq!(reduced[&1990], 9.0);
        assert_abs_diff_eq!(reduced[&1991], 9.3, epsilon = 1e-12);
    }

    #[test]
    #[should_panic(expected = "without any readings")]
    fn empty_readings() {
        let samples = MultiSeries::from([(1990, vec![])]);
        reduce(&samples, Reduction::Mean);
    }

    #[test]
    fn paired_round_trip() {
        let series = Series::from([(2003, 1.5), (1999, -2.), (2010, 0.)]);
        let paired = to_paired(&series);
        assert_eq!(paired.years(), &[1999, 2003, 2010]);
        assert_eq!(paired.values(), &[-2., 1.5, 0.]);
        assert_eq!(from_paired(&paired), Ok(series));
    }

    #[test]
    fn paired_different_lengths() {
        assert_eq!(
            PairedSeries::new(vec![2000, 2001], vec![1.]),
            Err(FitError::InputsOfDifferentLengths { left: 2, right: 1 })
        );
    }

    #[test]
    fn paired_duplicate_year() {
        let paired = PairedSeries::new(vec![2000, 2001, 2000], vec![1., 2., 3.]).unwrap();
        assert_eq!(from_paired(&paired), Err(FitError::DuplicateYear(2000)));
    }

    #[test]
    fn filter_keeps_order_and_drops_excluded() {
        let candidate =
            PairedSeries::new(vec![2005, 1996, 2001, 2010, 1999], vec![5., 1., 3., 7., 2.]).unwrap();
        let reference = [1996, 1998, 1999, 2001, 2004, 2005];
        let filtered = filter_common_years(&reference, &candidate, &[1999, 2001]);
        assert_eq!(filtered.years(), &[2005, 1996]);
        assert_eq!(filtered.values(), &[5., 1.]);
    }

    #[test]
    fn drop_trailing_points() {
        let paired = PairedSeries::new(vec![1, 2, 3, 4, 5], vec![1., 2., 3., 4., 5.]).unwrap();
        let dropped = drop_last(&paired, 2);
        assert_eq!(dropped.years(), &[1, 2, 3]);
        assert_eq!(dropped.values(), &[1., 2., 3.]);
        assert_eq!(dropped.last(), Some((3, 3.)));
        assert!(drop_last(&paired, 7).is_empty());
        assert_eq!(drop_last(&paired, 0), paired);
    }
}
