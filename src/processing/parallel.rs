// src/processing/parallel.rs
use std::collections::HashSet;
use std::thread;

use clap::ValueEnum;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};

use crate::error::{FeatureError, Result};
use crate::model::{
    AcquisitionRow, DateRange, Field, FieldFailure, ResultTable, Satellite, DEFAULT_ID_COLUMN,
};
use crate::processing::chunks::process_dates;
use crate::processing::indices::{BandMath, IndexEvaluator};
use crate::source::{Collection, ImageSource};

/// Worker threads for the whole job, split between the field level and the
/// shared date-level pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerBudget {
    total: usize,
    field_workers: usize,
}

impl WorkerBudget {
    /// Both levels need at least one worker, so `total` must exceed `field_workers`.
    pub fn new(total: usize, field_workers: usize) -> Result<Self> {
        if field_workers == 0 || total <= field_workers {
            return Err(FeatureError::InvalidBudget {
                total,
                field_workers,
            });
        }
        Ok(Self {
            total,
            field_workers,
        })
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn field_workers(&self) -> usize {
        self.field_workers
    }

    pub fn inner_workers(&self) -> usize {
        self.total - self.field_workers
    }
}

/// What the job returns when some fields fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Fail the job with the first failing field's error
    #[default]
    Abort,
    /// Return the rows of the fields that succeeded and list the failures
    Partial,
}

/// Fans (field, date) work out over two levels of workers.
///
/// `field_workers` threads each take one field at a time, list its
/// acquisition dates, and hand date chunks to a single date-level pool of
/// `total - field_workers` threads shared by every field. The job never runs
/// more than `total` workers.
pub struct FeatureAggregator<S, E = BandMath> {
    source: S,
    evaluator: E,
    budget: WorkerBudget,
    policy: FailurePolicy,
    id_column: String,
}

impl<S: ImageSource> FeatureAggregator<S, BandMath> {
    pub fn new(source: S, budget: WorkerBudget) -> Self {
        Self::with_evaluator(source, BandMath, budget)
    }
}

impl<S: ImageSource, E: IndexEvaluator> FeatureAggregator<S, E> {
    pub fn with_evaluator(source: S, evaluator: E, budget: WorkerBudget) -> Self {
        Self {
            source,
            evaluator,
            budget,
            policy: FailurePolicy::default(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
        }
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn id_column(mut self, name: impl Into<String>) -> Self {
        self.id_column = name.into();
        self
    }

    pub fn budget(&self) -> WorkerBudget {
        self.budget
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn get_features(
        &self,
        fields: &[Field],
        range: &DateRange,
        satellite: Satellite,
    ) -> Result<ResultTable> {
        if fields.is_empty() {
            return Err(FeatureError::EmptyFieldSet);
        }

        let mut seen = HashSet::with_capacity(fields.len());
        if let Some(dup) = fields.iter().find(|f| !seen.insert(f.id.as_str())) {
            return Err(FeatureError::DuplicateField(dup.id.clone()));
        }

        let inner_workers = self.budget.inner_workers();
        let pool = ThreadPoolBuilder::new()
            .num_threads(inner_workers)
            .thread_name(|i| format!("date-worker-{i}"))
            .build()?;

        let collection = satellite.collection();
        let field_workers = self.budget.field_workers().min(fields.len());

        info!(
            fields = fields.len(),
            %satellite,
            start = %range.start(),
            end = %range.end(),
            field_workers,
            date_workers = inner_workers,
            "Extracting features"
        );

        // Every field is queued up front; workers drain the queue until it is empty.
        let (task_tx, task_rx) = flume::unbounded::<(usize, &Field)>();
        for task in fields.iter().enumerate() {
            if task_tx.send(task).is_err() {
                break;
            }
        }
        drop(task_tx);

        let (result_tx, result_rx) = flume::unbounded::<(usize, Result<Vec<AcquisitionRow>>)>();
        let mut outcomes: Vec<Option<Result<Vec<AcquisitionRow>>>> =
            fields.iter().map(|_| None).collect();

        thread::scope(|scope| -> Result<()> {
            for worker in 0..field_workers {
                let task_rx = task_rx.clone();
                let result_tx = result_tx.clone();
                let pool = &pool;
                let collection = &collection;

                thread::Builder::new()
                    .name(format!("field-worker-{worker}"))
                    .spawn_scoped(scope, move || {
                        for (index, field) in task_rx {
                            let outcome =
                                self.process_field(field, range, satellite, collection, pool);
                            if result_tx.send((index, outcome)).is_err() {
                                break;
                            }
                        }
                    })?;
            }
            drop(result_tx);

            let mut done = 0;
            for (index, outcome) in result_rx.iter() {
                done += 1;
                debug!(field = %fields[index].id, done, total = fields.len(), "Field task finished");
                outcomes[index] = Some(outcome);
            }
            Ok(())
        })?;

        self.assemble(fields, satellite, outcomes)
    }

    fn process_field(
        &self,
        field: &Field,
        range: &DateRange,
        satellite: Satellite,
        collection: &Collection,
        pool: &ThreadPool,
    ) -> Result<Vec<AcquisitionRow>> {
        let span = info_span!("field", id = %field.id);
        let _enter = span.enter();

        let dates = self.source.list_acquisition_dates(field, range, collection)?;
        if dates.is_empty() {
            warn!("No acquisitions in range, field contributes no rows");
            return Ok(Vec::new());
        }
        debug!(acquisitions = dates.len(), "Listed acquisition dates");

        let rows = process_dates(
            &self.source,
            &self.evaluator,
            field,
            &dates,
            satellite,
            self.budget.inner_workers(),
            pool,
        )?;

        info!(rows = rows.len(), "Field complete");
        Ok(rows)
    }

    /// Merges per-field outcomes, in input order, into one sorted table.
    fn assemble(
        &self,
        fields: &[Field],
        satellite: Satellite,
        outcomes: Vec<Option<Result<Vec<AcquisitionRow>>>>,
    ) -> Result<ResultTable> {
        let mut rows = Vec::new();
        let mut failures = Vec::new();
        let mut first_error = None;

        for (field, outcome) in fields.iter().zip(outcomes) {
            // A worker that stops early (receiver gone) leaves no outcome behind.
            let outcome = outcome.unwrap_or_else(|| {
                Err(FeatureError::Upstream("field task did not report".to_string()))
            });

            match outcome {
                Ok(field_rows) => rows.extend(field_rows),
                Err(e) => {
                    error!(field = %field.id, error = %e, "Field failed");
                    failures.push(FieldFailure {
                        field_id: field.id.clone(),
                        message: e.to_string(),
                    });
                    if first_error.is_none() {
                        first_error = Some(e.in_field(&field.id));
                    }
                }
            }
        }

        if let Some(e) = first_error {
            match self.policy {
                FailurePolicy::Abort => return Err(e),
                FailurePolicy::Partial => {
                    warn!(failed = failures.len(), "Returning partial results");
                }
            }
        }

        let table = ResultTable::new(self.id_column.clone(), satellite, rows, failures);
        info!(rows = table.len(), failed = table.failures.len(), "Feature extraction complete");
        Ok(table)
    }
}

/// Job entry point with the default evaluator and abort-on-failure policy.
pub fn get_features<S: ImageSource>(
    source: S,
    fields: &[Field],
    range: &DateRange,
    satellite: Satellite,
    field_workers: usize,
    total_workers: usize,
) -> Result<ResultTable> {
    let budget = WorkerBudget::new(total_workers, field_workers)?;
    FeatureAggregator::new(source, budget).get_features(fields, range, satellite)
}
