use std::collections::HashSet;

use super::filter::cell_matches;
use super::model::{columns, CellValue, Dataset};

// ---------------------------------------------------------------------------
// Cascading selection options
// ---------------------------------------------------------------------------

/// An expense code offered for selection, shown together with its
/// description but filtered by code alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodigoOption {
    pub codigo: String,
    pub descricao: String,
}

impl CodigoOption {
    const SEPARATOR: &'static str = " - ";

    pub fn label(&self) -> String {
        format!("{}{}{}", self.codigo, Self::SEPARATOR, self.descricao)
    }

    /// Recover the code from a label built by [`CodigoOption::label`].
    pub fn code_from_label(label: &str) -> &str {
        label.split(Self::SEPARATOR).next().unwrap_or(label)
    }
}

/// Distinct non-null text of `column` over rows accepted by `keep`,
/// in first-appearance order.
fn distinct_where(dataset: &Dataset, column: &str, keep: impl Fn(usize) -> bool) -> Vec<String> {
    let mut seen = HashSet::new();
    (0..dataset.len())
        .filter(|&row| keep(row))
        .filter_map(|row| dataset.value(row, column))
        .filter(|cell| !cell.is_null())
        .map(CellValue::to_string)
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

pub fn municipio_options(dataset: &Dataset) -> Vec<String> {
    distinct_where(dataset, columns::MUNICIPIO, |_| true)
}

/// Units of the chosen municipio. Nothing is offered until a municipio is set.
pub fn unidade_options(dataset: &Dataset, municipio: Option<&str>) -> Vec<String> {
    let Some(municipio) = municipio else {
        return Vec::new();
    };
    distinct_where(dataset, columns::UNIDADE, |row| {
        cell_matches(dataset.value(row, columns::MUNICIPIO), municipio)
    })
}

/// Codes used by the chosen (municipio, unidade) pair.
pub fn codigo_options(
    dataset: &Dataset,
    municipio: Option<&str>,
    unidade: Option<&str>,
) -> Vec<CodigoOption> {
    let (Some(municipio), Some(unidade)) = (municipio, unidade) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    (0..dataset.len())
        .filter(|&row| {
            cell_matches(dataset.value(row, columns::MUNICIPIO), municipio)
                && cell_matches(dataset.value(row, columns::UNIDADE), unidade)
        })
        .filter_map(|row| {
            let codigo = dataset.value(row, columns::CODIGO).filter(|c| !c.is_null())?;
            let descricao = dataset
                .value(row, columns::DESCRICAO)
                .map(CellValue::to_string)
                .unwrap_or_default();
            Some(CodigoOption {
                codigo: codigo.to_string(),
                descricao,
            })
        })
        .filter(|option| seen.insert(option.clone()))
        .collect()
}

pub fn competencia_options(dataset: &Dataset) -> Vec<String> {
    distinct_where(dataset, columns::COMPETENCIA, |_| true)
}

/// Every code in the dataset; the default selection of the threshold queries.
pub fn all_codigos(dataset: &Dataset) -> Vec<String> {
    distinct_where(dataset, columns::CODIGO, |_| true)
}
