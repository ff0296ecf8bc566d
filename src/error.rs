//! Error types for the expenditure query engine.
//!
//! Load failures halt a session; a missing metric column only prevents a
//! single query from running. An empty result is not an error at all, see
//! [`crate::data::QueryOutcome`].

use std::path::PathBuf;

use thiserror::Error;

use crate::data::window::JanelaTemporal;

/// Failures raised while turning a source file into a [`crate::Dataset`].
#[derive(Debug, Error)]
pub enum DatasetLoadError {
    #[error("Dataset file '{path}' not found")]
    NotFound { path: PathBuf },

    #[error("Dataset file '{path}' is empty")]
    Empty { path: PathBuf },

    #[error("Failed to parse dataset file '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported file extension: .{extension}")]
    UnsupportedFormat { extension: String },

    #[error("Failed to read dataset file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The main error type for query engine operations
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    DatasetLoad(#[from] DatasetLoadError),

    #[error("Columns not available for window {janela}: {}", .columns.join(", "))]
    MissingColumns {
        janela: JanelaTemporal,
        columns: Vec<String>,
    },

    #[error("Outlier score {0} is outside the range 1..=9")]
    InvalidOutlierScore(u8),
}

/// Result type alias for query engine operations
pub type Result<T> = std::result::Result<T, Error>;

impl DatasetLoadError {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        DatasetLoadError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl Error {
    /// Short message suitable for showing to the dashboard user.
    pub fn user_message(&self) -> String {
        match self {
            Error::DatasetLoad(DatasetLoadError::NotFound { path }) => {
                format!("Arquivo '{}' não encontrado.", file_name(path))
            }
            Error::DatasetLoad(DatasetLoadError::Empty { path }) => {
                format!("O arquivo '{}' está vazio.", file_name(path))
            }
            Error::DatasetLoad(DatasetLoadError::Parse { path, .. }) => format!(
                "Erro ao analisar o arquivo '{}'. Verifique o formato.",
                file_name(path)
            ),
            Error::DatasetLoad(other) => other.to_string(),
            Error::MissingColumns { .. } => {
                "Uma ou mais colunas não estão disponíveis no conjunto de dados.".to_string()
            }
            Error::InvalidOutlierScore(_) => {
                "O outlier score deve estar entre 1 e 9.".to_string()
            }
        }
    }

    /// Returns true if the session cannot continue after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DatasetLoad(_))
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
