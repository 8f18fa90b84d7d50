use chrono::NaiveDate;
use std::path::PathBuf;

/// Errors surfaced while loading data or applying user filter input
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// No local cache and nothing to fetch it from
    #[error("dataset not found at {path} and no remote url configured")]
    MissingSource { path: PathBuf },

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed event table {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("event table {path} is missing required column `{column}`")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("dataset `{0}` contains no usable events")]
    EmptyDataset(String),

    /// Bad regex typed into the actor filter
    #[error("invalid actor pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("boundary document {path}: {reason}")]
    Boundary { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, DashboardError>;

impl DashboardError {
    /// Whether the error came from user input rather than a data source
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            DashboardError::InvalidPattern { .. } | DashboardError::InvalidRange { .. }
        )
    }
}
