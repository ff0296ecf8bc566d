//! Query engine for a municipal expenditure dashboard.
//!
//! A [`Dataset`] is loaded once and never mutated. Each query borrows it and
//! returns a new [`RowSet`] view:
//!
//! * [`explore`] – optional equality filters on municipio, unidade, codigo and
//!   competencia, plus the spending series per competencia.
//! * [`variation`] / [`weight`] – threshold filters over the precomputed
//!   metric columns of a [`JanelaTemporal`].

pub mod config;
pub mod data;
pub mod error;
pub mod report;

pub use config::{LoadOptions, QueryDefaults, Settings};
pub use data::filter::{explore, Exploration, ExplorationFilter, SeriesPoint};
pub use data::loader::load_file;
pub use data::metrics::{variation, weight, MetricResult, OutlierComparison, ThresholdQuery};
pub use data::model::{columns, CellValue, Dataset, Record, RowSet};
pub use data::options::CodigoOption;
pub use data::window::{JanelaTemporal, MetricColumns};
pub use data::QueryOutcome;
pub use error::{DatasetLoadError, Error, Result};
