//! `seoaudit-recon`: crawl-export vs SEO-metrics reconciliation engine.
//!
//! Pure engine crate: receives raw tabular datasets, returns matched,
//! classified and summarized results. The only IO is `engine::load_csv`,
//! which parses CSV text the caller has already read.

pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod summary;
pub mod url;

pub use config::ReconConfig;
pub use engine::{load_csv, run, run_cancellable, CancelToken};
pub use error::{ReconError, UrlError};
pub use model::{
    CanonicalRecord, Classification, ComparisonSummary, FieldComparison, FieldValue, MatchResult,
    NormalizationWarning, RawDataset, RawValue, ReconOutput, ValueCounts, WarningKind,
};
pub use url::normalize_url;
