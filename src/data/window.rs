use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::model::{columns, Dataset};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// JanelaTemporal – the time window selector
// ---------------------------------------------------------------------------

/// Aggregation window choosing which precomputed metric columns apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JanelaTemporal {
    Mensal,
    Trimestral,
    Semestral,
    Anual,
}

impl JanelaTemporal {
    pub const ALL: [JanelaTemporal; 4] = [
        JanelaTemporal::Mensal,
        JanelaTemporal::Trimestral,
        JanelaTemporal::Semestral,
        JanelaTemporal::Anual,
    ];

    /// Suffix used in derived column names.
    pub fn as_str(self) -> &'static str {
        match self {
            JanelaTemporal::Mensal => "MENSAL",
            JanelaTemporal::Trimestral => "TRIMESTRAL",
            JanelaTemporal::Semestral => "SEMESTRAL",
            JanelaTemporal::Anual => "ANUAL",
        }
    }

    /// Absolute spending column the weight metric is compared against.
    pub fn valor_referencia(self) -> &'static str {
        match self {
            JanelaTemporal::Mensal => columns::VALOR_LIQUIDADO_MES,
            JanelaTemporal::Trimestral => "VALOR_MEDIO_LIQUIDADO_TRIMESTRE",
            JanelaTemporal::Semestral => "VALOR_MEDIO_LIQUIDADO_SEMESTRE",
            JanelaTemporal::Anual => "VALOR_MEDIO_LIQUIDADO_ANO",
        }
    }
}

impl fmt::Display for JanelaTemporal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JanelaTemporal {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        JanelaTemporal::ALL
            .into_iter()
            .find(|w| w.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown time window '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// MetricColumns – column identifiers resolved for one window
// ---------------------------------------------------------------------------

/// The three columns a threshold query reads: a percentage metric (also the
/// sort key), an absolute metric and the outlier score of the percentage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricColumns {
    pub janela: JanelaTemporal,
    pub percentual: String,
    pub absoluto: String,
    pub outlier: String,
}

impl MetricColumns {
    /// Period-over-period variation columns.
    pub fn variacao(janela: JanelaTemporal) -> Self {
        let w = janela.as_str();
        MetricColumns {
            janela,
            percentual: format!("VARIACAO_PERCENTUAL_{w}"),
            absoluto: format!("VARIACAO_ABSOLUTA_{w}"),
            outlier: format!("VARIACAO_PERCENTUAL_{w}_OUTLIER_SCORE"),
        }
    }

    /// Expense-code weight columns.
    pub fn peso(janela: JanelaTemporal) -> Self {
        let w = janela.as_str();
        MetricColumns {
            janela,
            percentual: format!("PERCENTUAL_DESPESA_CODIGO_{w}"),
            absoluto: janela.valor_referencia().to_string(),
            outlier: format!("PERCENTUAL_DESPESA_CODIGO_{w}_OUTLIER_SCORE"),
        }
    }

    pub fn names(&self) -> [&str; 3] {
        [&self.percentual, &self.absoluto, &self.outlier]
    }

    /// Fail with [`Error::MissingColumns`] unless all three columns exist.
    pub fn ensure_present(&self, dataset: &Dataset) -> Result<()> {
        let missing: Vec<String> = self
            .names()
            .into_iter()
            .filter(|name| !dataset.has_column(name))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingColumns {
                janela: self.janela,
                columns: missing,
            })
        }
    }
}
