use std::collections::BTreeSet;

use log::debug;
use serde::{Deserialize, Serialize};

use super::filter::cell_matches;
use super::model::{columns, CellValue, Dataset, RowSet};
use super::window::{JanelaTemporal, MetricColumns};
use super::QueryOutcome;
use crate::config::QueryDefaults;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Threshold query parameters (variation and weight modes)
// ---------------------------------------------------------------------------

/// How a record's outlier score is compared with the requested score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutlierComparison {
    #[default]
    #[serde(rename = "GTE")]
    GreaterOrEqual,
    #[serde(rename = "EQ")]
    Equal,
}

impl OutlierComparison {
    fn accepts(self, score: f64, requested: u8) -> bool {
        let requested = f64::from(requested);
        match self {
            OutlierComparison::GreaterOrEqual => score >= requested,
            OutlierComparison::Equal => score == requested,
        }
    }
}

/// Parameters shared by the variation and weight queries.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdQuery {
    /// Period to inspect. Unset matches nothing.
    pub competencia: Option<String>,
    pub janela: JanelaTemporal,
    pub min_percentual: f64,
    pub min_absoluto: f64,
    /// Codes to keep; `None` keeps every code in the dataset.
    pub codigos: Option<BTreeSet<String>>,
    /// Requested outlier score, 1..=9.
    pub outlier_score: u8,
    pub outlier_comparison: OutlierComparison,
}

impl ThresholdQuery {
    pub fn new(competencia: impl Into<String>) -> Self {
        Self::with_defaults(Some(competencia.into()), &QueryDefaults::default())
    }

    pub fn with_defaults(competencia: Option<String>, defaults: &QueryDefaults) -> Self {
        ThresholdQuery {
            competencia,
            janela: defaults.janela,
            min_percentual: defaults.min_percentual,
            min_absoluto: defaults.min_absoluto,
            codigos: None,
            outlier_score: defaults.outlier_score,
            outlier_comparison: defaults.outlier_comparison,
        }
    }
}

/// Rows passing a threshold query, sorted by the percentage column.
#[derive(Debug, Clone)]
pub struct MetricResult<'a> {
    pub rows: RowSet<'a>,
    pub columns: MetricColumns,
}

impl MetricResult<'_> {
    /// Columns shown for each result row.
    pub fn output_columns(&self) -> Vec<&str> {
        let mut out = vec![
            columns::MUNICIPIO,
            columns::UNIDADE,
            columns::CODIGO,
            columns::DESCRICAO,
        ];
        out.extend(self.columns.names());
        out
    }
}

// ---------------------------------------------------------------------------
// Query entry points
// ---------------------------------------------------------------------------

/// Variation query over `VARIACAO_*_<W>` columns.
pub fn variation<'a>(dataset: &'a Dataset, query: &ThresholdQuery) -> Result<QueryOutcome<MetricResult<'a>>> {
    run(dataset, query, MetricColumns::variacao(query.janela))
}

/// Weight query over `PERCENTUAL_DESPESA_CODIGO_<W>` and the window's
/// reference spending column.
pub fn weight<'a>(dataset: &'a Dataset, query: &ThresholdQuery) -> Result<QueryOutcome<MetricResult<'a>>> {
    run(dataset, query, MetricColumns::peso(query.janela))
}

fn run<'a>(
    dataset: &'a Dataset,
    query: &ThresholdQuery,
    metric: MetricColumns,
) -> Result<QueryOutcome<MetricResult<'a>>> {
    if !(1..=9).contains(&query.outlier_score) {
        return Err(Error::InvalidOutlierScore(query.outlier_score));
    }
    metric.ensure_present(dataset)?;
    debug!("threshold query resolved columns {:?}", metric.names());

    let Some(competencia) = query.competencia.as_deref() else {
        return Ok(QueryOutcome::NoResults);
    };

    let number = |row: usize, col: &str| dataset.value(row, col).and_then(CellValue::as_f64);
    let same_period = |row: usize| cell_matches(dataset.value(row, columns::COMPETENCIA), competencia);

    // Percentage side: period, percentage floor, code selection, outlier score.
    let percentual_side = |row: usize| {
        same_period(row)
            && number(row, &metric.percentual).is_some_and(|v| v >= query.min_percentual)
            && codigo_selected(dataset, row, query.codigos.as_ref())
            && number(row, &metric.outlier)
                .is_some_and(|s| query.outlier_comparison.accepts(s, query.outlier_score))
    };
    // Absolute side: period and absolute floor only.
    let absoluto_side = |row: usize| {
        same_period(row) && number(row, &metric.absoluto).is_some_and(|v| v >= query.min_absoluto)
    };

    let mut indices: Vec<usize> = (0..dataset.len())
        .filter(|&row| percentual_side(row) && absoluto_side(row))
        .collect();

    // Stable: equal keys keep dataset order.
    let key = |row: usize| number(row, &metric.percentual).unwrap_or(f64::NEG_INFINITY);
    indices.sort_by(|&a, &b| key(b).total_cmp(&key(a)));

    debug!(
        "{} query for {competencia} matched {} rows",
        metric.percentual,
        indices.len()
    );
    if indices.is_empty() {
        return Ok(QueryOutcome::NoResults);
    }
    Ok(QueryOutcome::Rows(MetricResult {
        rows: RowSet::new(dataset, indices),
        columns: metric,
    }))
}

fn codigo_selected(dataset: &Dataset, row: usize, codigos: Option<&BTreeSet<String>>) -> bool {
    let Some(codigos) = codigos else {
        return true;
    };
    match dataset.value(row, columns::CODIGO) {
        Some(CellValue::Null) | None => false,
        Some(cell) => codigos.contains(&cell.to_string()),
    }
}
