// src/processing/mod.rs
pub mod chunks;
pub mod indices;
pub mod parallel;

// Re-export main components
pub use chunks::{partition, process_dates};
pub use parallel::{get_features, FailurePolicy, FeatureAggregator, WorkerBudget};
