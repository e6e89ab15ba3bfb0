// src/lib.rs
pub mod batch;
pub mod cli;
pub mod error;
pub mod io;
pub mod logging;
pub mod model;
pub mod processing;
pub mod source;
pub mod utils;

pub use error::{FeatureError, Result};
pub use model::{AcquisitionRow, Band, BandMeans, DateRange, Field, Polygon, ResultTable, Satellite};
pub use processing::{get_features, FailurePolicy, FeatureAggregator, WorkerBudget};
pub use source::ImageSource;

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
