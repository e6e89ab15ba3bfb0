// src/error.rs
use chrono::NaiveDate;
use thiserror::Error;

use crate::model::Band;

pub type Result<T, E = FeatureError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error(
        "Invalid worker budget: {total} total workers, {field_workers} field workers (each level needs at least one)"
    )]
    InvalidBudget { total: usize, field_workers: usize },

    #[error("No fields to process")]
    EmptyFieldSet,

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Duplicate field id: {0}")]
    DuplicateField(String),

    #[error("Invalid polygon: {0}")]
    InvalidPolygon(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Missing band {0} in band means")]
    MissingBand(Band),

    #[error("Field {field} failed: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<FeatureError>,
    },

    #[error("Worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FeatureError {
    /// Errors worth retrying at the image source boundary.
    pub fn is_transient(&self) -> bool {
        matches!(self, FeatureError::Upstream(_))
    }

    pub fn in_field(self, field: &str) -> Self {
        FeatureError::Field {
            field: field.to_string(),
            source: Box::new(self),
        }
    }
}
