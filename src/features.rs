//! Feature builder: turns raw tables into encoded feature rows.

use log::{debug, warn};
use polars::prelude::*;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::encoding::{table_for_column, EncodingTable};
use crate::error::FeatureError;
use crate::records::{
    raw_schema, EncodedFeatureRow, CATEGORICAL_COLUMNS, FEATURE_COLUMNS, ID_COLUMN,
    LABEL_COLUMN, NUMERIC_COLUMNS,
};

/// A categorical cell whose value has no code in its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmappedCell {
    pub row: usize,
    pub column: &'static str,
    pub label: Option<String>,
}

impl std::fmt::Display for UnmappedCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.label {
            Some(label) => write!(f, "row {} {}={:?}", self.row, self.column, label),
            None => write!(f, "row {} {} is empty", self.row, self.column),
        }
    }
}

/// Encoded upload, ready for prediction.
#[derive(Debug)]
pub struct EncodedBatch {
    /// Feature table in model column order.
    pub features: DataFrame,
    pub rows: Vec<EncodedFeatureRow>,
    pub labels: Option<Vec<i32>>,
    pub unmapped: Vec<UnmappedCell>,
}

/// Split a table into its feature columns and, when present, the target.
pub fn feature_and_target(in_df: &mut DataFrame) -> PolarsResult<(DataFrame, Option<Series>)> {
    let target = if has_column(in_df, LABEL_COLUMN) {
        Some(in_df.drop_in_place(LABEL_COLUMN)?)
    } else {
        None
    };
    if !has_column(in_df, ID_COLUMN) {
        debug!("no id column, synthesizing zeros");
        let ids = Series::new(ID_COLUMN, vec![0i64; in_df.height()]);
        in_df.insert_at_idx(0, ids)?;
    }
    let features = in_df.select(FEATURE_COLUMNS)?;

    Ok((features, target))
}

/// Encode an uploaded table in place and extract its rows and labels.
pub fn encode_batch(mut df: DataFrame, strict: bool) -> Result<EncodedBatch, FeatureError> {
    let missing: Vec<String> = CATEGORICAL_COLUMNS
        .iter()
        .chain(NUMERIC_COLUMNS.iter())
        .filter(|name| !has_column(&df, name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(FeatureError::MissingColumns { columns: missing });
    }
    if df.height() == 0 {
        return Err(FeatureError::EmptyTable);
    }

    let mut unmapped = Vec::new();
    for name in CATEGORICAL_COLUMNS {
        if let Some(table) = table_for_column(name) {
            unmapped.extend(encode_column(&mut df, name, table)?);
        }
    }
    if !unmapped.is_empty() {
        warn!("{} categorical cells have no code", unmapped.len());
        if strict {
            return Err(FeatureError::UnmappedLabels {
                count: unmapped.len(),
                first: unmapped[0].to_string(),
            });
        }
    }

    conform_to_schema(&mut df)?;
    let (features, target) = feature_and_target(&mut df)?;
    let labels = target.map(|series| extract_labels(&series)).transpose()?;
    let rows = feature_rows(&features)?;

    Ok(EncodedBatch {
        features,
        rows,
        labels,
        unmapped,
    })
}

/// Replace one categorical column by its codes. Returns the cells that
/// could not be mapped; those are left null.
pub fn encode_column(
    df: &mut DataFrame,
    name: &'static str,
    table: &EncodingTable,
) -> PolarsResult<Vec<UnmappedCell>> {
    let mut unmapped = Vec::new();
    let encoded: Vec<Option<i32>> = {
        let column = df.column(name)?;
        match column.dtype() {
            DataType::Utf8 => column
                .utf8()?
                .into_iter()
                .enumerate()
                .map(|(row, label)| {
                    let code =
                        label.and_then(|l| table.code(l).or_else(|| text_code(table, l)));
                    if code.is_none() {
                        unmapped.push(UnmappedCell {
                            row,
                            column: name,
                            label: label.map(str::to_string),
                        });
                    }
                    code
                })
                .collect(),
            // already-coded integer or boolean columns keep valid codes
            dtype if is_integer_like(dtype) => column
                .cast(&DataType::Int64)?
                .i64()?
                .into_iter()
                .enumerate()
                .map(|(row, value)| match value {
                    Some(code) if table.has_code(code) => Some(code as i32),
                    _ => {
                        unmapped.push(UnmappedCell {
                            row,
                            column: name,
                            label: value.map(|v| v.to_string()),
                        });
                        None
                    }
                })
                .collect(),
            dtype => {
                warn!("column {name} has unsupported type {dtype:?}");
                (0..column.len())
                    .map(|row| {
                        unmapped.push(UnmappedCell {
                            row,
                            column: name,
                            label: Some(format!("<{dtype:?}>")),
                        });
                        None
                    })
                    .collect()
            }
        }
    };
    df.with_column(Series::new(name, encoded))?;

    Ok(unmapped)
}

/// A code written out as text, as in a column mixing `0`/`1` with labels.
fn text_code(table: &EncodingTable, label: &str) -> Option<i32> {
    label
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|code| table.has_code(*code))
        .map(|code| code as i32)
}

/// Cast every known column to its encoded type. Cells that do not parse
/// as numbers, such as a `bmi` of `N/A`, become missing.
fn conform_to_schema(df: &mut DataFrame) -> PolarsResult<()> {
    for (name, dtype) in raw_schema().iter() {
        let name = name.as_str();
        if !has_column(df, name) {
            continue;
        }
        let column = df.column(name)?;
        if column.dtype() != dtype {
            debug!("casting {name} from {:?} to {dtype:?}", column.dtype());
            let cast = column.cast(dtype)?;
            df.with_column(cast)?;
        }
    }

    Ok(())
}

fn extract_labels(series: &Series) -> Result<Vec<i32>, FeatureError> {
    series
        .cast(&DataType::Int32)?
        .i32()?
        .into_iter()
        .enumerate()
        .map(|(row, label)| label.ok_or(FeatureError::MissingLabel { row }))
        .collect()
}

/// Read feature rows out of a table laid out as [`FEATURE_COLUMNS`].
/// Non-numeric cells become missing; a missing id becomes 0.
pub fn feature_rows(features: &DataFrame) -> PolarsResult<Vec<EncodedFeatureRow>> {
    let ids: Vec<i64> = features
        .column(ID_COLUMN)?
        .cast(&DataType::Int64)?
        .i64()?
        .into_iter()
        .map(|id| id.unwrap_or(0))
        .collect();

    let mut columns = Vec::with_capacity(FEATURE_COLUMNS.len() - 1);
    for name in &FEATURE_COLUMNS[1..] {
        let values: Vec<Option<f64>> = features
            .column(name)?
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .collect();
        columns.push(values);
    }

    Ok(ids
        .into_iter()
        .enumerate()
        .map(|(row, id)| {
            let mut cells = [None; 10];
            for (cell, column) in cells.iter_mut().zip(&columns) {
                *cell = column[row];
            }
            EncodedFeatureRow::from_cells(id, &cells)
        })
        .collect())
}

/// Convert feature rows to a dense matrix readable by the classifier.
pub fn convert_features_to_matrix(rows: &[EncodedFeatureRow]) -> DenseMatrix<f64> {
    let ncols = FEATURE_COLUMNS.len();
    let values: Vec<f64> = rows.iter().flat_map(|row| row.to_features()).collect();

    DenseMatrix::new(rows.len(), ncols, values, false)
}

fn is_integer_like(dtype: &DataType) -> bool {
    (dtype.is_numeric() && !dtype.is_float()) || *dtype == DataType::Boolean
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().contains(&name)
}
