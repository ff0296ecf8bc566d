use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Well-known columns of the expenditure dataset
// ---------------------------------------------------------------------------

/// Column names that every expenditure dataset carries.
pub mod columns {
    pub const MUNICIPIO: &str = "MUNICIPIO";
    pub const UNIDADE: &str = "UNIDADE";
    pub const CODIGO: &str = "CODIGO";
    pub const DESCRICAO: &str = "DESCRICAO";
    pub const COMPETENCIA: &str = "COMPETENCIA";
    pub const VALOR_LIQUIDADO_MES: &str = "VALOR_LIQUIDADO_MES";
}

// ---------------------------------------------------------------------------
// CellValue – a single cell of the table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Null => Ok(()),
        }
    }
}

impl CellValue {
    /// Interpret the value as an `f64` for threshold comparisons.
    /// Text and null cells have no numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) if !v.is_nan() => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Render non-null values as text, keeping nulls as nulls.
    fn into_text(self) -> CellValue {
        match self {
            CellValue::Null | CellValue::Text(_) => self,
            other => CellValue::Text(other.to_string()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Integer(i)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}

// ---------------------------------------------------------------------------
// Record – one row of the table
// ---------------------------------------------------------------------------

/// A single expenditure record, cells stored in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<CellValue>,
}

impl Record {
    pub fn new(values: Vec<CellValue>) -> Self {
        Record { values }
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The full loaded dataset. Immutable once built; queries borrow it and
/// return [`RowSet`] views over it.
#[derive(Debug, Clone)]
pub struct Dataset {
    column_names: Vec<String>,
    column_index: HashMap<String, usize>,
    records: Vec<Record>,
}

impl Dataset {
    /// Build a dataset from column names and records. Records shorter than
    /// the header are padded with nulls; extra cells are dropped.
    pub fn new(column_names: Vec<String>, records: Vec<Record>) -> Self {
        let width = column_names.len();
        let records = records
            .into_iter()
            .map(|mut r| {
                r.values.resize(width, CellValue::Null);
                r
            })
            .collect();
        let column_index = column_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Dataset {
            column_names,
            column_index,
            records,
        }
    }

    /// Build a dataset from named cells. Columns are ordered by first
    /// appearance; a record lacking a column gets a null there.
    pub fn from_records(rows: Vec<Vec<(String, CellValue)>>) -> Self {
        let mut column_names: Vec<String> = Vec::new();
        for row in &rows {
            for (name, _) in row {
                if !column_names.contains(name) {
                    column_names.push(name.clone());
                }
            }
        }
        let records = rows
            .into_iter()
            .map(|row| {
                let mut values = vec![CellValue::Null; column_names.len()];
                for (name, value) in row {
                    if let Some(pos) = column_names.iter().position(|c| *c == name) {
                        values[pos] = value;
                    }
                }
                Record::new(values)
            })
            .collect();
        Dataset::new(column_names, records)
    }

    /// Ordered list of column names, as in the source.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index.contains_key(name)
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.column_index.get(name).copied()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Cell at `row` for column `name`, if both exist.
    pub fn value(&self, row: usize, name: &str) -> Option<&CellValue> {
        let col = self.column_position(name)?;
        self.records.get(row)?.values.get(col)
    }

    /// Text of a cell, if the column exists and the cell is text.
    pub fn text(&self, row: usize, name: &str) -> Option<&str> {
        self.value(row, name).and_then(CellValue::as_text)
    }

    /// Rewrite every non-null cell of the given columns as text, so that
    /// identifiers such as `CODIGO` never compare numerically.
    pub fn normalize_text_columns<S: AsRef<str>>(&mut self, names: &[S]) {
        let positions: Vec<usize> = names
            .iter()
            .filter_map(|n| self.column_position(n.as_ref()))
            .collect();
        for record in &mut self.records {
            for &pos in &positions {
                if let Some(cell) = record.values.get_mut(pos) {
                    *cell = std::mem::replace(cell, CellValue::Null).into_text();
                }
            }
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// View over every record, in order.
    pub fn all_rows(&self) -> RowSet<'_> {
        RowSet::new(self, (0..self.len()).collect())
    }
}

// ---------------------------------------------------------------------------
// RowSet – an ordered selection of records
// ---------------------------------------------------------------------------

/// A filtered (and possibly reordered) view of a [`Dataset`].
#[derive(Debug, Clone)]
pub struct RowSet<'a> {
    dataset: &'a Dataset,
    indices: Vec<usize>,
}

impl<'a> RowSet<'a> {
    pub(crate) fn new(dataset: &'a Dataset, indices: Vec<usize>) -> Self {
        RowSet { dataset, indices }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    /// Source row indices, in result order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &'a Record> + '_ {
        let records = self.dataset.records();
        self.indices.iter().map(move |&i| &records[i])
    }

    /// Values of one column across the selection; missing column yields nulls.
    pub fn column(&self, name: &str) -> Vec<CellValue> {
        self.indices
            .iter()
            .map(|&i| self.dataset.value(i, name).cloned().unwrap_or(CellValue::Null))
            .collect()
    }
}
