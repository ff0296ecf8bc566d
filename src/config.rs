//! Load options and query defaults.
//!
//! Settings can be read from an optional JSON file; anything the file leaves
//! out takes its default value.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::metrics::OutlierComparison;
use crate::data::model::columns;
use crate::data::window::JanelaTemporal;
use crate::error::{DatasetLoadError, Result};

/// How a source file is decoded into a [`crate::Dataset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Field delimiter for delimited text files.
    pub delimiter: char,
    /// Drop an unnamed leading index column (`""` or `Unnamed: 0` headers).
    pub drop_index_column: bool,
    /// Columns always kept as text, never parsed as numbers.
    pub text_columns: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: ';',
            drop_index_column: true,
            text_columns: vec![columns::COMPETENCIA.into(), columns::CODIGO.into()],
        }
    }
}

/// Initial values for the threshold query parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDefaults {
    pub janela: JanelaTemporal,
    pub min_percentual: f64,
    pub min_absoluto: f64,
    pub outlier_score: u8,
    pub outlier_comparison: OutlierComparison,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            janela: JanelaTemporal::Mensal,
            min_percentual: 0.0,
            min_absoluto: 1_000_000.0,
            outlier_score: 1,
            outlier_comparison: OutlierComparison::GreaterOrEqual,
        }
    }
}

/// Top-level settings for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dataset_path: PathBuf,
    pub load: LoadOptions,
    pub defaults: QueryDefaults,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("resultados.csv"),
            load: LoadOptions::default(),
            defaults: QueryDefaults::default(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| DatasetLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = serde_json::from_str(&text)
            .map_err(|e| DatasetLoadError::parse(path, format!("invalid settings: {e}")))?;
        Ok(settings)
    }
}
