use std::collections::BTreeMap;

use log::debug;

use super::model::{columns, CellValue, Dataset, RowSet};
use super::QueryOutcome;

// ---------------------------------------------------------------------------
// Exploration filter: optional equality predicates on four columns
// ---------------------------------------------------------------------------

/// Exploration selections. A `None` field places no constraint on its column;
/// an empty string is a legitimate value and is matched literally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplorationFilter {
    pub municipio: Option<String>,
    pub unidade: Option<String>,
    pub codigo: Option<String>,
    pub competencia: Option<String>,
}

impl ExplorationFilter {
    /// Set predicates as `(column, expected value)` pairs.
    fn predicates(&self) -> Vec<(&'static str, &str)> {
        [
            (columns::MUNICIPIO, &self.municipio),
            (columns::UNIDADE, &self.unidade),
            (columns::CODIGO, &self.codigo),
            (columns::COMPETENCIA, &self.competencia),
        ]
        .into_iter()
        .filter_map(|(col, value)| value.as_deref().map(|v| (col, v)))
        .collect()
    }
}

/// One point of the per-competencia spending series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub competencia: String,
    pub valor_liquidado: f64,
}

/// Rows matching an [`ExplorationFilter`] plus their spending series.
#[derive(Debug, Clone)]
pub struct Exploration<'a> {
    pub rows: RowSet<'a>,
    pub series: Vec<SeriesPoint>,
}

/// Whether a cell equals a selected value, compared as text.
pub(crate) fn cell_matches(cell: Option<&CellValue>, expected: &str) -> bool {
    match cell {
        Some(CellValue::Text(s)) => s == expected,
        Some(CellValue::Null) | None => false,
        Some(other) => other.to_string() == expected,
    }
}

/// Return indices of records that pass every set predicate, in dataset order.
///
/// A record passes when, for each set field, its column value equals the
/// selection. With no field set every record passes.
pub fn filtered_indices(dataset: &Dataset, filter: &ExplorationFilter) -> Vec<usize> {
    let predicates = filter.predicates();
    (0..dataset.len())
        .filter(|&row| {
            predicates
                .iter()
                .all(|(col, expected)| cell_matches(dataset.value(row, col), expected))
        })
        .collect()
}

/// Sum `VALOR_LIQUIDADO_MES` per competencia over the given rows, ordered by
/// ascending competencia text. Non-numeric values contribute nothing; rows
/// without a competencia are left out.
pub fn series_by_competencia(rows: &RowSet<'_>) -> Vec<SeriesPoint> {
    let dataset = rows.dataset();
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for &row in rows.indices() {
        let Some(competencia) = dataset.value(row, columns::COMPETENCIA) else {
            continue;
        };
        if competencia.is_null() {
            continue;
        }
        let valor = dataset
            .value(row, columns::VALOR_LIQUIDADO_MES)
            .and_then(CellValue::as_f64)
            .unwrap_or(0.0);
        *totals.entry(competencia.to_string()).or_insert(0.0) += valor;
    }
    totals
        .into_iter()
        .map(|(competencia, valor_liquidado)| SeriesPoint {
            competencia,
            valor_liquidado,
        })
        .collect()
}

/// Run the exploration query.
pub fn explore<'a>(dataset: &'a Dataset, filter: &ExplorationFilter) -> QueryOutcome<Exploration<'a>> {
    let rows = RowSet::new(dataset, filtered_indices(dataset, filter));
    debug!("exploration {filter:?} matched {} of {} rows", rows.len(), dataset.len());
    if rows.is_empty() {
        return QueryOutcome::NoResults;
    }
    let series = series_by_competencia(&rows);
    QueryOutcome::Rows(Exploration { rows, series })
}
