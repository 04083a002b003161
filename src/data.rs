//! # Dataset Loading and Validation
//!
//! Reads a tab-separated file with a header row into a row-major [`Dataset`].
//!
//! - One column is the response (by default `response`). Every other column is a
//!   feature, kept in file order.
//! - Missing, non-numeric and non-finite values are rejected with a [`DataError`]
//!   naming the offending column. Nothing is imputed.
//! - When an intercept is requested, a constant column of ones is inserted as column 0.

use crate::types::{Dataset, PipelineFloat, ShapeError};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// The response column name used when none is given.
pub const DEFAULT_RESPONSE_COLUMN: &str = "response";

const MINIMUM_ROWS: usize = 1;

/// A comprehensive error type for all data loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The response column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The column '{column_name}' could not be converted to the expected type '{expected_type}'. It contains non-numeric data. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in column '{0}'. This tool requires complete data with no missing values."
    )]
    MissingValuesFound(String),
    #[error(
        "Non-finite values (NaN or Infinity) were found in column '{0}'. This tool requires all data to be finite."
    )]
    NonFiniteValuesFound(String),
    #[error("Input file contains only {found} data rows, but at least {required} are required.")]
    InsufficientRows { found: usize, required: usize },
    #[error("Input file has no feature columns besides the response '{0}'.")]
    NoFeatureColumns(String),
    #[error("Loaded columns do not form a consistent matrix: {0}")]
    Shape(#[from] ShapeError),
}

/// Loads `path` into a dataset of width `T`.
pub fn load_dataset<T: PipelineFloat>(
    path: &Path,
    response_column: &str,
    add_intercept: bool,
) -> Result<Dataset<T>, DataError> {
    log::info!("Loading data from '{}'", path.display());

    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(CsvParseOptions::default().with_separator(b'\t')),
        )
        .finish()?;

    if df.height() < MINIMUM_ROWS {
        return Err(DataError::InsufficientRows {
            found: df.height(),
            required: MINIMUM_ROWS,
        });
    }

    let column_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    if !column_names.iter().any(|name| name == response_column) {
        return Err(DataError::ColumnNotFound(response_column.to_string()));
    }
    let feature_names: Vec<&String> = column_names
        .iter()
        .filter(|name| name.as_str() != response_column)
        .collect();
    if feature_names.is_empty() {
        return Err(DataError::NoFeatureColumns(response_column.to_string()));
    }

    let response: Vec<T> = extract_numeric_column(&df, response_column)?
        .into_iter()
        .map(T::from_f64_lossy)
        .collect();

    let feature_columns = feature_names
        .iter()
        .map(|name| extract_numeric_column(&df, name))
        .collect::<Result<Vec<_>, _>>()?;

    // Columns arrive column-major from polars; interleave them into rows.
    let rows = response.len();
    let ncols = feature_columns.len();
    let mut features = Vec::with_capacity(rows * ncols);
    for row in 0..rows {
        features.extend(
            feature_columns
                .iter()
                .map(|column| T::from_f64_lossy(column[row])),
        );
    }

    let dataset = Dataset::from_row_major(features, response, ncols)?;
    log::info!(
        "Loaded {} rows with {} feature columns ({})",
        dataset.nrows(),
        dataset.ncols(),
        T::PRECISION
    );

    Ok(if add_intercept {
        dataset.with_intercept_column()
    } else {
        dataset
    })
}

fn extract_numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let wrong_type = || DataError::ColumnWrongType {
        column_name: column_name.to_string(),
        expected_type: "f64 (numeric)",
        found_type: format!("{:?}", series.dtype()),
    };
    let casted = series.cast(&DataType::Float64).map_err(|_| wrong_type())?;
    if casted.null_count() > 0 {
        return Err(wrong_type());
    }

    let values: Vec<f64> = casted.f64()?.rechunk().into_no_null_iter().collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::{self, Write};
    use tempfile::NamedTempFile;

    fn create_test_tsv(content: &str) -> io::Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "{}", content)?;
        file.flush()?;
        Ok(file)
    }

    fn generate_content(header: &str, data_row: &str, num_rows: usize) -> String {
        let data_rows = std::iter::repeat(data_row)
            .take(num_rows)
            .collect::<Vec<_>>()
            .join("\n");
        format!("{}\n{}", header, data_rows)
    }

    #[test]
    fn loads_features_in_file_order_around_the_response() {
        let content = "x1\tresponse\tx2\n1.0\t10.0\t2.0\n3.0\t20.0\t4.0\n5.0\t30.0\t6.0";
        let file = create_test_tsv(content).unwrap();
        let data: Dataset<f64> = load_dataset(file.path(), "response", false).unwrap();
        assert_eq!(data.nrows(), 3);
        assert_eq!(data.ncols(), 2);
        assert_eq!(data.features_row_major(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(data.response(), &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn intercept_column_is_inserted_first() {
        let file = create_test_tsv("a\tresponse\n0.5\t1.0\n1.5\t2.0").unwrap();
        let data: Dataset<f32> = load_dataset(file.path(), "response", true).unwrap();
        assert_eq!(data.ncols(), 2);
        assert_eq!(data.features().get(0, 0), Some(1.0));
        assert_abs_diff_eq!(data.features().get(1, 1).unwrap(), 1.5, epsilon = 1e-6);
    }

    #[test]
    fn custom_response_column() {
        let file = create_test_tsv("y\tfeat\n2.0\t1.0\n4.0\t3.0").unwrap();
        let data: Dataset<f64> = load_dataset(file.path(), "y", false).unwrap();
        assert_eq!(data.response(), &[2.0, 4.0]);
        assert_eq!(data.features_row_major(), &[1.0, 3.0]);
    }

    #[test]
    fn error_response_column_not_found() {
        let file = create_test_tsv(&generate_content("a\tb", "1.0\t2.0", 5)).unwrap();
        let err = load_dataset::<f64>(file.path(), "response", false).unwrap_err();
        match err {
            DataError::ColumnNotFound(col) => assert_eq!(col, "response"),
            other => panic!("Expected ColumnNotFound, got {:?}", other),
        }
    }

    #[test]
    fn error_no_feature_columns() {
        let file = create_test_tsv(&generate_content("response", "1.0", 5)).unwrap();
        let err = load_dataset::<f64>(file.path(), "response", true).unwrap_err();
        assert!(matches!(err, DataError::NoFeatureColumns(_)));
    }

    #[test]
    fn error_missing_values() {
        let file = create_test_tsv(&generate_content("response\tx", "1.0\t", 5)).unwrap();
        let result = load_dataset::<f64>(file.path(), "response", false);
        match result {
            Err(DataError::MissingValuesFound(col)) => assert_eq!(col, "x"),
            other => panic!("Expected MissingValuesFound for 'x', got {:?}", other),
        }
    }

    #[test]
    fn error_wrong_type() {
        let file =
            create_test_tsv(&generate_content("response\tx", "1.0\tnot_a_number", 5)).unwrap();
        match load_dataset::<f64>(file.path(), "response", false) {
            Err(DataError::ColumnWrongType {
                column_name,
                expected_type,
                found_type,
            }) => {
                assert_eq!(column_name, "x");
                assert_eq!(expected_type, "f64 (numeric)");
                assert!(
                    found_type.contains("String") || found_type.contains("text"),
                    "Expected found_type to indicate String or text, got {}",
                    found_type
                );
            }
            other => panic!("Expected ColumnWrongType for 'x', got {:?}", other),
        }
    }

    #[test]
    fn error_non_finite_values() {
        let file = create_test_tsv(&generate_content("response\tx", "NaN\t1.0", 5)).unwrap();
        let err = load_dataset::<f64>(file.path(), "response", false).unwrap_err();
        match err {
            DataError::NonFiniteValuesFound(col) => assert_eq!(col, "response"),
            other => panic!("Expected NonFiniteValuesFound(response), got {:?}", other),
        }
    }

    #[test]
    fn error_header_only() {
        let file = create_test_tsv("response\tx").unwrap();
        let err = load_dataset::<f64>(file.path(), "response", false).unwrap_err();
        assert!(matches!(
            err,
            DataError::InsufficientRows {
                found: 0,
                required: 1
            }
        ));
    }
}
