/// Data layer: core types, loading, and the query engine.
///
/// Architecture:
/// ```text
///  .csv / .parquet / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Dataset   │  Vec<Record>, column index (read-only)
///   └──────────┘
///        │
///        ├──────────────┬───────────────┐
///        ▼              ▼               ▼
///   ┌──────────┐   ┌──────────┐   ┌──────────┐
///   │  options  │   │  filter   │   │ metrics   │  window → columns,
///   └──────────┘   └──────────┘   └──────────┘  threshold predicates
/// ```

pub mod filter;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod options;
pub mod window;

/// Result of a query that ran: either matching rows or nothing.
#[derive(Debug, Clone)]
pub enum QueryOutcome<T> {
    Rows(T),
    NoResults,
}

impl<T> QueryOutcome<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, QueryOutcome::NoResults)
    }

    pub fn rows(self) -> Option<T> {
        match self {
            QueryOutcome::Rows(rows) => Some(rows),
            QueryOutcome::NoResults => None,
        }
    }
}
