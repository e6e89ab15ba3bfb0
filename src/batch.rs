// src/batch.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::io::{load_fields, SceneCatalog};
use crate::model::{DateRange, ResultTable, Satellite, DEFAULT_ID_COLUMN};
use crate::processing::{FailurePolicy, FeatureAggregator, WorkerBudget};
use crate::utils::{RetryPolicy, Retrying};

#[derive(Deserialize, Serialize, Debug)]
pub struct BatchConfig {
    #[serde(default)]
    pub global: GlobalParams,
    pub jobs: Vec<Job>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GlobalParams {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_field_workers")]
    pub field_workers: usize,
    #[serde(default)]
    pub on_failure: FailurePolicy,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_id_column")]
    pub id_column: String,
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            field_workers: default_field_workers(),
            on_failure: FailurePolicy::default(),
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
            id_column: default_id_column(),
        }
    }
}

/// CPU count, with room for one worker on each level.
pub fn default_workers() -> usize {
    num_cpus::get().max(2)
}

fn default_field_workers() -> usize {
    1
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_id_column() -> String {
    DEFAULT_ID_COLUMN.to_string()
}

/// One feature extraction. Unset options fall back to the global parameters.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Job {
    pub name: Option<String>,
    pub satellite: Satellite,
    pub fields: PathBuf,
    pub catalog: PathBuf,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub id_property: Option<String>,
    pub workers: Option<usize>,
    pub field_workers: Option<usize>,
    pub on_failure: Option<FailurePolicy>,
}

impl Job {
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{} {}", self.satellite, self.fields.display()))
    }
}

/// Loads a job's inputs and runs the aggregator over them.
pub fn run_job(job: &Job, global: &GlobalParams) -> Result<ResultTable> {
    let workers = job.workers.unwrap_or(global.workers);
    let field_workers = job.field_workers.unwrap_or(global.field_workers);
    let on_failure = job.on_failure.unwrap_or(global.on_failure);

    let budget = WorkerBudget::new(workers, field_workers)?;
    let range = DateRange::new(job.start_date, job.end_date)?;

    let fields = load_fields(&job.fields, job.id_property.as_deref())
        .with_context(|| format!("Failed to load fields from {}", job.fields.display()))?;
    let catalog = SceneCatalog::load(&job.catalog)
        .with_context(|| format!("Failed to load scene catalog {}", job.catalog.display()))?;

    let backoff = Duration::from_millis(global.backoff_ms);
    let retry = RetryPolicy {
        max_attempts: global.attempts,
        initial_backoff: backoff,
        max_backoff: backoff.saturating_mul(16),
    };

    let aggregator = FeatureAggregator::new(Retrying::new(catalog, retry), budget)
        .failure_policy(on_failure)
        .id_column(global.id_column.clone());

    let table = aggregator
        .get_features(&fields, &range, job.satellite)
        .with_context(|| format!("Job '{}' failed", job.label()))?;
    Ok(table)
}

/// Runs every job of a batch file in order. Relative paths resolve against
/// the file's directory; `workers` overrides the global worker count.
pub fn process_batch(config_path: &Path, workers: Option<usize>) -> Result<Vec<(String, ResultTable)>> {
    // Read and parse configuration file
    let config_content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read batch config {}", config_path.display()))?;
    let mut config: BatchConfig = serde_json::from_str(&config_content)
        .with_context(|| format!("Invalid batch config {}", config_path.display()))?;

    if let Some(workers) = workers {
        config.global.workers = workers;
    }

    let base = config_path.parent().unwrap_or_else(|| Path::new(""));
    info!(jobs = config.jobs.len(), "Starting batch");

    let mut tables = Vec::with_capacity(config.jobs.len());
    for (i, job) in config.jobs.iter().enumerate() {
        let mut job = job.clone();
        job.fields = base.join(&job.fields);
        job.catalog = base.join(&job.catalog);

        info!(job = %job.label(), index = i + 1, total = config.jobs.len(), "Running job");
        let table = run_job(&job, &config.global)?;
        tables.push((job.label(), table));
    }

    info!("Batch complete");
    Ok(tables)
}
