//! Readers turning CSV files and spreadsheet workbooks into yearly series.
//!
//! Both formats key their rows by year. A year either holds a single value or, for datasets
//! with several readings per year, a list of readings that still has to be [reduced](crate::series::reduce).

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Range, Reader};
use tracing::{debug, warn};

use crate::series::{reduce, MultiSeries, Reduction, Series, Year};

/// Index of the workbook sheet holding the data
pub const WORKBOOK_SHEET: usize = 1;
/// Rows above this (zero based) index of the data sheet hold titles and headers
pub const WORKBOOK_FIRST_ROW: u32 = 3;

/// Error type for reading datasets.
///
/// Row numbers are one based and count header rows, matching what a spreadsheet or text editor
/// shows.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to open {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read workbook {}: {source}", .path.display())]
    Workbook {
        path: PathBuf,
        source: calamine::Error,
    },

    #[error("workbook has no sheet with index {0}")]
    MissingSheet(usize),

    #[error("unsupported file type: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("row {row}: missing column {column}")]
    MissingColumn { row: usize, column: usize },

    #[error("row {row}: `{value}` does not start with a year")]
    InvalidYear { row: usize, value: String },

    #[error("row {row}, column {column}: `{value}` is not a number")]
    InvalidNumber {
        row: usize,
        column: usize,
        value: String,
    },

    #[error("row {row}: yearly values and dated readings can't be mixed in one file")]
    MixedShapes { row: usize },

    #[error("no data rows found")]
    Empty,

    #[error("{}: {source}", .path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<LoadError>,
    },
}

impl LoadError {
    fn in_file(self, path: &Path) -> Self {
        match self {
            LoadError::Io { .. } | LoadError::Workbook { .. } | LoadError::InFile { .. } => self,
            other => LoadError::InFile {
                path: path.to_path_buf(),
                source: Box::new(other),
            },
        }
    }
}

/// A dataset as found in a file, before the readings of each year are reduced
#[derive(Debug, Clone, PartialEq)]
pub enum RawSeries {
    Scalar(Series),
    Multi(MultiSeries),
}

impl RawSeries {
    /// Number of years in the dataset
    pub fn len(&self) -> usize {
        match self {
            RawSeries::Scalar(series) => series.len(),
            RawSeries::Multi(series) => series.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collapse the readings of every year using `reduction`; scalar datasets are returned as is.
    pub fn into_scalar(self, reduction: Reduction) -> Series {
        match self {
            RawSeries::Scalar(series) => series,
            RawSeries::Multi(series) => reduce(&series, reduction),
        }
    }
}

/// Load a dataset, picking the reader by file extension.
pub fn load(path: impl AsRef<Path>) -> Result<RawSeries, LoadError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("csv") => load_csv(path),
        Some("xls" | "xlsx" | "xlsm" | "xlsb" | "ods") => load_workbook(path),
        _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Load a dataset from a CSV file, see [read_csv].
pub fn load_csv(path: impl AsRef<Path>) -> Result<RawSeries, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let series = read_csv(BufReader::new(file)).map_err(|e| e.in_file(path))?;
    debug!(path = %path.display(), years = series.len(), "loaded csv dataset");
    Ok(series)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Yearly,
    Dated,
}

/// Read a dataset from CSV.
///
/// The first row is a header. The first column is either a bare year (`yyyy`), in which case the
/// second column is that year's value, or a date starting with the year (`yyyy-mm-dd`), in which
/// case the second column is one reading of that year and all readings of a year are collected.
/// Dated rows without a reading are skipped.
///
/// # Example
/// ```
/// use envtrend::load::{read_csv, RawSeries};
///
/// let csv = "date,anomaly\n1990-01-15,0.25\n1990-07-15,0.75\n1991-01-15,\n1991-03-15,0.5\n";
/// let RawSeries::Multi(readings) = read_csv(csv.as_bytes()).unwrap() else {
///     panic!("dated rows hold several readings per year");
/// };
/// assert_eq!(readings[&1990], vec![0.25, 0.75]);
/// assert_eq!(readings[&1991], vec![0.5]);
/// ```
pub fn read_csv<R: Read>(reader: R) -> Result<RawSeries, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let mut scalar = Series::new();
    let mut multi = MultiSeries::new();
    let mut shape = None;

    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        // header is row 1
        let row = idx + 2;
        let key = record
            .get(0)
            .ok_or(LoadError::MissingColumn { row, column: 1 })?
            .trim();
        let value = record
            .get(1)
            .ok_or(LoadError::MissingColumn { row, column: 2 })?
            .trim();
        let year = parse_year_prefix(key).ok_or_else(|| LoadError::InvalidYear {
            row,
            value: key.to_string(),
        })?;

        let row_shape = if key.len() == 4 {
            Shape::Yearly
        } else {
            Shape::Dated
        };
        if *shape.get_or_insert(row_shape) != row_shape {
            return Err(LoadError::MixedShapes { row });
        }

        match row_shape {
            Shape::Yearly => {
                let value = parse_number(value, row, 2)?;
                if scalar.insert(year, value).is_some() {
                    warn!(year, row, "year listed twice, keeping the later value");
                }
            }
            Shape::Dated if value.is_empty() => {}
            Shape::Dated => multi
                .entry(year)
                .or_default()
                .push(parse_number(value, row, 2)?),
        }
    }

    match shape {
        None => Err(LoadError::Empty),
        Some(Shape::Yearly) => Ok(RawSeries::Scalar(scalar)),
        Some(Shape::Dated) if multi.is_empty() => Err(LoadError::Empty),
        Some(Shape::Dated) => Ok(RawSeries::Multi(multi)),
    }
}

fn parse_year_prefix(key: &str) -> Option<Year> {
    key.get(..4)?.parse().ok()
}

/// Parse a reading; `NaN` and infinities are rejected like any other non-number.
fn parse_number(value: &str, row: usize, column: usize) -> Result<f64, LoadError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or_else(|| LoadError::InvalidNumber {
            row,
            column,
            value: value.to_string(),
        })
}

/// Load a dataset from the second sheet of a spreadsheet workbook, see [read_sheet].
pub fn load_workbook(path: impl AsRef<Path>) -> Result<RawSeries, LoadError> {
    let path = path.as_ref();
    let workbook_error = |source| LoadError::Workbook {
        path: path.to_path_buf(),
        source,
    };
    let mut workbook = open_workbook_auto(path).map_err(workbook_error)?;
    let sheet = data_sheet(path, workbook.worksheet_range_at(WORKBOOK_SHEET))?;
    let series = read_sheet(&sheet).map_err(|e| e.in_file(path))?;
    debug!(path = %path.display(), years = series.len(), "loaded workbook dataset");
    Ok(series)
}

fn data_sheet(
    path: &Path,
    sheet: Option<Result<Range<Data>, calamine::Error>>,
) -> Result<Range<Data>, LoadError> {
    sheet
        .ok_or(LoadError::MissingSheet(WORKBOOK_SHEET))
        .map_err(|e| e.in_file(path))?
        .map_err(|source| LoadError::Workbook {
            path: path.to_path_buf(),
            source,
        })
}

/// Read a dataset from a worksheet.
///
/// Data starts at row index [WORKBOOK_FIRST_ROW] with the year in the first column. A sheet with
/// two columns holds one value per year; a wider sheet holds one reading per column, of which
/// the numeric ones are collected. Rows without any content are skipped.
pub fn read_sheet(sheet: &Range<Data>) -> Result<RawSeries, LoadError> {
    let Some((last_row, last_col)) = sheet.end() else {
        return Err(LoadError::Empty);
    };
    let cell = |row: u32, col: u32| sheet.get_value((row, col)).unwrap_or(&Data::Empty);

    let mut scalar = Series::new();
    let mut multi = MultiSeries::new();

    for row in WORKBOOK_FIRST_ROW..=last_row {
        if (0..=last_col).all(|col| matches!(cell(row, col), Data::Empty)) {
            continue;
        }
        let display_row = row as usize + 1;
        let year = cell_year(cell(row, 0)).ok_or_else(|| LoadError::InvalidYear {
            row: display_row,
            value: cell(row, 0).to_string(),
        })?;

        if last_col > 1 {
            let readings: Vec<f64> = (1..=last_col)
                .filter_map(|col| cell_number(cell(row, col)))
                .collect();
            if readings.is_empty() {
                warn!(year, row = display_row, "row holds no numeric readings, skipping");
                continue;
            }
            multi.insert(year, readings);
        } else {
            match cell_number(cell(row, 1)) {
                Some(value) => {
                    scalar.insert(year, value);
                }
                None => warn!(year, row = display_row, "row holds no numeric value, skipping"),
            }
        }
    }

    if last_col > 1 {
        if multi.is_empty() {
            return Err(LoadError::Empty);
        }
        Ok(RawSeries::Multi(multi))
    } else {
        if scalar.is_empty() {
            return Err(LoadError::Empty);
        }
        Ok(RawSeries::Scalar(scalar))
    }
}

fn cell_number(cell: &Data) -> Option<f64> {
    match *cell {
        Data::Float(value) if value.is_finite() => Some(value),
        Data::Int(value) => Some(value as f64),
        _ => None,
    }
}

fn cell_year(cell: &Data) -> Option<Year> {
    match cell {
        Data::Float(value)
            if value.fract() == 0.
                && (f64::from(Year::MIN)..=f64::from(Year::MAX)).contains(value) =>
        {
            Some(*value as Year)
        }
        Data::Int(value) => Year::try_from(*value).ok(),
        Data::String(value) => parse_year_prefix(value.trim()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yearly_csv() {
        let csv = "year,carbon\n1996,362.5\n1997,363.7\n1998,366.6\n";
        let series = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(
            series,
            RawSeries::Scalar(Series::from([(1996, 362.5), (1997, 363.7), (1998, 366.6)]))
        );
    }

    #[test]
    fn dated_csv_accumulates_per_year() {
        let csv = "date,temperature\n\
                   1996-01-01,9.5\n\
                   1996-06-01,10.5\n\
                   1997-01-01,\n\
                   1997-06-01,11\n";
        let series = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(
            series,
            RawSeries::Multi(MultiSeries::from([
                (1996, vec![9.5, 10.5]),
                (1997, vec![11.])
            ]))
        );
        assert_eq!(
            series.into_scalar(Reduction::Mean),
            Series::from([(1996, 10.), (1997, 11.)])
        );
    }

    #[test]
    fn csv_invalid_year() {
        let csv = "year,value\n1996,1\nabc,2\n";
        let err = read_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidYear { row: 3, ref value } if value == "abc"
        ));
    }

    #[test]
    fn csv_invalid_number() {
        let csv = "year,value\n1996,many\n";
        let err = read_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidNumber { row: 2, column: 2, .. }
        ));
    }

    #[test]
    fn csv_rejects_non_finite_readings() {
        for value in ["NaN", "inf", "-infinity"] {
            let csv = format!("year,value\n1996,1\n1997,{value}\n");
            let err = read_csv(csv.as_bytes()).unwrap_err();
            assert!(matches!(
                err,
                LoadError::InvalidNumber { row: 3, column: 2, value: ref v } if v == value
            ));
        }
        let dated = "date,value\n1996-01-01,1\n1996-07-01,nan\n";
        assert!(matches!(
            read_csv(dated.as_bytes()).unwrap_err(),
            LoadError::InvalidNumber { row: 3, .. }
        ));
    }

    #[test]
    fn csv_short_row() {
        let csv = "year,value\n1996,1\n1997\n";
        let err = read_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { row: 3, column: 2 }));
    }

    #[test]
    fn csv_mixed_shapes() {
        let csv = "year,value\n1996,1\n1997-05-01,2\n";
        let err = read_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::MixedShapes { row: 3 }));
    }

    #[test]
    fn csv_without_rows() {
        let err = read_csv("year,value\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::Empty));
    }

    #[test]
    fn unsupported_extension() {
        let err = load("datasets/carbon.json").unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(_)));
    }

    #[test]
    fn missing_workbook() {
        let err = load("no/such/dir/red_list.xlsx").unwrap_err();
        assert!(matches!(err, LoadError::Workbook { .. }));
    }

    #[test]
    fn workbook_without_data_sheet() {
        let path = Path::new("red_list.xlsx");
        let err = data_sheet(path, None).unwrap_err();
        let LoadError::InFile { path: file, source } = err else {
            panic!("a missing sheet names the workbook");
        };
        assert_eq!(file, path);
        assert!(matches!(*source, LoadError::MissingSheet(WORKBOOK_SHEET)));
    }

    fn sheet(rows: &[&[Data]]) -> Range<Data> {
        let width = rows.iter().map(|row| row.len()).max().unwrap_or(1) as u32;
        let mut range = Range::new((0, 0), (rows.len() as u32 - 1, width - 1));
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    #[test]
    fn wide_sheet_collects_readings() {
        let first = [
            Data::Float(1996.),
            Data::Int(3),
            Data::Float(2.),
            Data::String("n/a".into()),
        ];
        let second = [
            Data::Int(1998),
            Data::Float(4.),
            Data::Float(1.),
            Data::Float(5.),
        ];
        let rows: [&[Data]; 5] = [&[], &[], &[], &first, &second];
        let series = read_sheet(&sheet(&rows)).unwrap();
        assert_eq!(
            series,
            RawSeries::Multi(MultiSeries::from([
                (1996, vec![3., 2.]),
                (1998, vec![4., 1., 5.])
            ]))
        );
        assert_eq!(
            series.into_scalar(Reduction::Sum),
            Series::from([(1996, 5.), (1998, 10.)])
        );
    }

    #[test]
    fn narrow_sheet_holds_values() {
        let first = [Data::Float(2000.), Data::Float(16118.)];
        let blank = [Data::Empty, Data::Empty];
        let second = [Data::String("2002".into()), Data::Int(16503)];
        let rows: [&[Data]; 6] = [&[], &[], &[], &first, &blank, &second];
        let series = read_sheet(&sheet(&rows)).unwrap();
        assert_eq!(
            series,
            RawSeries::Scalar(Series::from([(2000, 16118.), (2002, 16503.)]))
        );
    }

    #[test]
    fn sheet_skips_non_finite_values() {
        let first = [Data::Float(2000.), Data::Float(f64::NAN)];
        let second = [Data::Float(2001.), Data::Float(f64::INFINITY)];
        let third = [Data::Float(2002.), Data::Float(7.)];
        let rows: [&[Data]; 6] = [&[], &[], &[], &first, &second, &third];
        let series = read_sheet(&sheet(&rows)).unwrap();
        assert_eq!(series, RawSeries::Scalar(Series::from([(2002, 7.)])));
    }

    #[test]
    fn sheet_rejects_fractional_and_huge_years() {
        for year in [1996.7, 5e9, -5e9] {
            let bad = [Data::Float(year), Data::Float(1.)];
            let rows: [&[Data]; 4] = [&[], &[], &[], &bad];
            let err = read_sheet(&sheet(&rows)).unwrap_err();
            assert!(matches!(err, LoadError::InvalidYear { row: 4, .. }));
        }
    }

    #[test]
    fn sheet_invalid_year() {
        let bad = [Data::String("total".into()), Data::Float(1.)];
        let rows: [&[Data]; 4] = [&[], &[], &[], &bad];
        let err = read_sheet(&sheet(&rows)).unwrap_err();
        assert!(matches!(err, LoadError::InvalidYear { row: 4, .. }));
    }
}
