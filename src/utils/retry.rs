// src/utils/retry.rs
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::warn;

use crate::error::Result;
use crate::model::{BandMeans, DateRange, Field};
use crate::source::{Collection, ImageSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Calls made in total, first one included.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after the `failures`-th failed call: doubles each time, capped.
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Retries transient image source failures with exponential backoff.
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ImageSource> Retrying<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn call<T>(&self, operation: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    warn!(operation, attempt, ?delay, error = %e, "Retrying image source call");
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<S: ImageSource> ImageSource for Retrying<S> {
    fn list_acquisition_dates(
        &self,
        field: &Field,
        range: &DateRange,
        collection: &Collection,
    ) -> Result<Vec<NaiveDate>> {
        self.call("list_acquisition_dates", || {
            self.inner.list_acquisition_dates(field, range, collection)
        })
    }

    fn get_band_means(
        &self,
        field: &Field,
        date: NaiveDate,
        collection: &Collection,
    ) -> Result<BandMeans> {
        self.call("get_band_means", || {
            self.inner.get_band_means(field, date, collection)
        })
    }
}
