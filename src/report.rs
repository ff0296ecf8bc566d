//! Tabular output of query results.
//!
//! Results are converted into Arrow record batches so they can be printed
//! as a table, or streamed as delimited text.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;

use crate::data::filter::SeriesPoint;
use crate::data::model::{CellValue, RowSet};

/// Arrow type that can hold every value of a column.
fn column_type(values: &[CellValue]) -> DataType {
    let mut data_type = DataType::Int64;
    for value in values {
        match value {
            CellValue::Null | CellValue::Integer(_) => {}
            CellValue::Float(_) => data_type = DataType::Float64,
            CellValue::Text(_) => return DataType::Utf8,
        }
    }
    data_type
}

fn to_array(values: &[CellValue], data_type: &DataType) -> ArrayRef {
    match data_type {
        DataType::Int64 => Arc::new(Int64Array::from(
            values
                .iter()
                .map(|v| match v {
                    CellValue::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Float64 => Arc::new(Float64Array::from(
            values.iter().map(CellValue::as_f64).collect::<Vec<_>>(),
        )),
        _ => Arc::new(StringArray::from(
            values
                .iter()
                .map(|v| (!v.is_null()).then(|| v.to_string()))
                .collect::<Vec<_>>(),
        )),
    }
}

/// Project the selected rows onto `columns`, in the given order.
pub fn rows_to_batch(rows: &RowSet<'_>, columns: &[&str]) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays = Vec::with_capacity(columns.len());
    for &name in columns {
        let values = rows.column(name);
        let data_type = column_type(&values);
        arrays.push(to_array(&values, &data_type));
        fields.push(Field::new(name, data_type, true));
    }
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).context("building result batch")
}

/// Per-competencia totals as a two-column batch.
pub fn series_to_batch(series: &[SeriesPoint]) -> Result<RecordBatch> {
    let schema = Schema::new(vec![
        Field::new("COMPETENCIA", DataType::Utf8, false),
        Field::new("VALOR_LIQUIDADO_MES", DataType::Float64, false),
    ]);
    let competencias = StringArray::from(
        series.iter().map(|p| p.competencia.as_str()).collect::<Vec<_>>(),
    );
    let valores = Float64Array::from(series.iter().map(|p| p.valor_liquidado).collect::<Vec<_>>());
    RecordBatch::try_new(Arc::new(schema), vec![Arc::new(competencias), Arc::new(valores)])
        .context("building series batch")
}

/// Render batches as an ASCII table.
pub fn format_table(batches: &[RecordBatch]) -> Result<String> {
    Ok(pretty_format_batches(batches)
        .context("formatting table")?
        .to_string())
}

/// Write the selected rows as delimited text with a header line.
pub fn write_delimited<W: Write>(
    rows: &RowSet<'_>,
    columns: &[&str],
    delimiter: u8,
    writer: W,
) -> Result<()> {
    let mut out = csv::WriterBuilder::new().delimiter(delimiter).from_writer(writer);
    out.write_record(columns).context("writing header")?;
    let dataset = rows.dataset();
    for &row in rows.indices() {
        let record: Vec<String> = columns
            .iter()
            .map(|col| dataset.value(row, col).map(CellValue::to_string).unwrap_or_default())
            .collect();
        out.write_record(&record).context("writing record")?;
    }
    out.flush().context("flushing output")?;
    Ok(())
}
