use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use log::{info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, Dataset, Record};
use crate::config::LoadOptions;
use crate::error::{DatasetLoadError, Result};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load an expenditure dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – delimited text with a header row (`;` by default)
/// * `.parquet`      – one Arrow column per dataset column
/// * `.json`         – `[{ "MUNICIPIO": "...", "CODIGO": "...", ... }, ...]`
///
/// After decoding, the index artefact column is dropped and the configured
/// identifier columns are rewritten as text.
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let metadata = std::fs::metadata(path).map_err(|source| io_error(path, source))?;
    if metadata.len() == 0 {
        return Err(DatasetLoadError::Empty { path: path.to_path_buf() }.into());
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let (mut column_names, mut records) = match ext.as_str() {
        "csv" | "txt" => load_csv(path, options)?,
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        other => {
            return Err(DatasetLoadError::UnsupportedFormat {
                extension: other.to_string(),
            }
            .into())
        }
    };

    if options.drop_index_column {
        drop_index_columns(&mut column_names, &mut records);
    }

    let mut dataset = Dataset::new(column_names, into_records(records));
    dataset.normalize_text_columns(&options.text_columns);

    info!(
        "Loaded {} records with {} columns from {}",
        dataset.len(),
        dataset.column_names().len(),
        path.display()
    );
    Ok(dataset)
}

fn io_error(path: &Path, source: std::io::Error) -> DatasetLoadError {
    if source.kind() == std::io::ErrorKind::NotFound {
        DatasetLoadError::NotFound { path: path.to_path_buf() }
    } else {
        DatasetLoadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Headers that pandas writes for an unnamed row index.
fn is_index_artifact(name: &str) -> bool {
    name.trim().is_empty() || name.starts_with("Unnamed:")
}

fn drop_index_columns(column_names: &mut Vec<String>, records: &mut [Vec<CellValue>]) {
    let keep: Vec<bool> = column_names.iter().map(|n| !is_index_artifact(n)).collect();
    if keep.iter().all(|&k| k) {
        return;
    }
    for (name, _) in column_names.iter().zip(&keep).filter(|(_, k)| !**k) {
        warn!("Dropping index column {name:?}");
    }
    let mut flags = keep.iter();
    column_names.retain(|_| *flags.next().unwrap_or(&true));
    for values in records.iter_mut() {
        let mut flags = keep.iter();
        values.retain(|_| *flags.next().unwrap_or(&true));
    }
}

/// Column names plus row-major cells, before the index column is dropped.
type Table = (Vec<String>, Vec<Vec<CellValue>>);

fn into_records(rows: Vec<Vec<CellValue>>) -> Vec<Record> {
    rows.into_iter().map(Record::new).collect()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one record per line.
/// Columns listed in `options.text_columns` keep their raw text; every other
/// cell is typed by [`guess_cell_type`].
fn load_csv(path: &Path, options: &LoadOptions) -> Result<Table> {
    let delimiter = u8::try_from(options.delimiter).map_err(|_| {
        DatasetLoadError::parse(path, format!("delimiter {:?} is not a single byte", options.delimiter))
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(path, e))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(DatasetLoadError::Empty { path: path.to_path_buf() }.into());
    }

    let text_column: Vec<bool> = headers
        .iter()
        .map(|h| options.text_columns.iter().any(|t| t == h))
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            DatasetLoadError::parse(path, format!("row {}: {e}", row_no + 1))
        })?;
        let values = record
            .iter()
            .zip(&text_column)
            .map(|(value, &as_text)| {
                if value.is_empty() {
                    CellValue::Null
                } else if as_text {
                    CellValue::Text(value.to_string())
                } else {
                    guess_cell_type(value)
                }
            })
            .collect();
        rows.push(values);
    }

    for (name, count) in mixed_numeric_columns(&headers, &rows, &text_column) {
        warn!("Column {name:?}: {count} non-numeric cells kept as text; they fail every numeric filter");
    }

    Ok((headers, rows))
}

/// Non-text columns holding both numbers and unparsable text, with the
/// number of text cells in each.
fn mixed_numeric_columns<'h>(
    headers: &'h [String],
    rows: &[Vec<CellValue>],
    text_column: &[bool],
) -> Vec<(&'h str, usize)> {
    headers
        .iter()
        .enumerate()
        .filter(|(col, _)| !text_column.get(*col).copied().unwrap_or(false))
        .filter_map(|(col, name)| {
            let cells = rows.iter().filter_map(|r| r.get(col));
            let (mut numeric, mut text) = (0usize, 0usize);
            for cell in cells {
                match cell {
                    CellValue::Integer(_) | CellValue::Float(_) => numeric += 1,
                    CellValue::Text(_) => text += 1,
                    CellValue::Null => {}
                }
            }
            (numeric > 0 && text > 0).then_some((name.as_str(), text))
        })
        .collect()
}

fn csv_error(path: &Path, err: csv::Error) -> DatasetLoadError {
    match err.into_kind() {
        csv::ErrorKind::Io(source) => io_error(path, source),
        other => DatasetLoadError::parse(path, format!("{other:?}")),
    }
}

fn guess_cell_type(s: &str) -> CellValue {
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return CellValue::Float(f);
    }
    CellValue::Text(s.to_string())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "MUNICIPIO": "Alfa", "CODIGO": "319011", "VALOR_LIQUIDADO_MES": 1520.5 },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).map_err(|source| io_error(path, source))?;
    let root: JsonValue =
        serde_json::from_str(&text).map_err(|e| DatasetLoadError::parse(path, e))?;

    let records = root
        .as_array()
        .ok_or_else(|| DatasetLoadError::parse(path, "expected top-level JSON array"))?;

    let mut column_names: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| DatasetLoadError::parse(path, format!("row {i} is not a JSON object")))?;
        for key in obj.keys() {
            if !column_names.contains(key) {
                column_names.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(JsonValue::as_object)
        .map(|obj| {
            column_names
                .iter()
                .map(|col| obj.get(col).map(json_to_cell).unwrap_or(CellValue::Null))
                .collect()
        })
        .collect();

    Ok((column_names, rows))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::Text(n.to_string())
            }
        }
        JsonValue::Null => CellValue::Null,
        other => CellValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one flat column per dataset column.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path).map_err(|source| io_error(path, source))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| DatasetLoadError::parse(path, format!("reading parquet metadata: {e}")))?;
    let column_names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder
        .build()
        .map_err(|e| DatasetLoadError::parse(path, format!("building parquet reader: {e}")))?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result
            .map_err(|e| DatasetLoadError::parse(path, format!("reading parquet record batch: {e}")))?;
        let batch_columns = batch.columns();
        for row in 0..batch.num_rows() {
            rows.push(
                batch_columns
                    .iter()
                    .map(|col| extract_cell_value(col, row))
                    .collect(),
            );
        }
    }

    Ok((column_names, rows))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell_value(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    let value = match col.data_type() {
        DataType::Utf8 => col.as_string_opt::<i32>().map(|a| CellValue::from(a.value(row))),
        DataType::LargeUtf8 => col.as_string_opt::<i64>().map(|a| CellValue::from(a.value(row))),
        DataType::Int32 => col
            .as_primitive_opt::<Int32Type>()
            .map(|a| CellValue::Integer(i64::from(a.value(row)))),
        DataType::Int64 => col
            .as_primitive_opt::<Int64Type>()
            .map(|a| CellValue::Integer(a.value(row))),
        DataType::Float32 => col
            .as_primitive_opt::<Float32Type>()
            .map(|a| CellValue::Float(f64::from(a.value(row)))),
        DataType::Float64 => col
            .as_primitive_opt::<Float64Type>()
            .map(|a| CellValue::Float(a.value(row))),
        DataType::Boolean => col
            .as_boolean_opt()
            .map(|a| CellValue::Text(a.value(row).to_string())),
        other => {
            warn!("Unsupported parquet column type {other:?}; reading as null");
            None
        }
    };
    value.unwrap_or(CellValue::Null)
}
