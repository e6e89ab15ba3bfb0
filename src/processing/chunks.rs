// src/processing/chunks.rs
use chrono::NaiveDate;
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, warn};

use crate::error::{FeatureError, Result};
use crate::model::{AcquisitionRow, BandMeans, Field, Satellite};
use crate::processing::indices::IndexEvaluator;
use crate::source::{Collection, ImageSource};

/// Splits `items` into at most `parts` contiguous chunks.
///
/// Never produces more chunks than items, and chunk sizes differ by at most
/// one: the first `len % parts` chunks take the extra item.
pub fn partition<T>(items: &[T], parts: usize) -> Vec<&[T]> {
    if items.is_empty() || parts == 0 {
        return Vec::new();
    }

    let parts = parts.min(items.len());
    let base = items.len() / parts;
    let extra = items.len() % parts;

    let mut chunks = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let len = base + usize::from(i < extra);
        chunks.push(&items[start..start + len]);
        start += len;
    }
    chunks
}

/// Processes one field's acquisition dates on the date-level pool.
///
/// Dates are cut into `inner_workers` chunks, one pool task per chunk. A
/// failing date aborts its chunk and the whole call. Rows come back grouped
/// by chunk; callers sort.
pub fn process_dates<S, E>(
    source: &S,
    evaluator: &E,
    field: &Field,
    dates: &[NaiveDate],
    satellite: Satellite,
    inner_workers: usize,
    pool: &ThreadPool,
) -> Result<Vec<AcquisitionRow>>
where
    S: ImageSource + ?Sized,
    E: IndexEvaluator + ?Sized,
{
    // With no chunks every date would be skipped silently.
    if inner_workers == 0 {
        return Err(FeatureError::InvalidBudget {
            total: inner_workers,
            field_workers: 0,
        });
    }

    let chunks = partition(dates, inner_workers);
    let collection = satellite.collection();

    debug!(
        field = %field.id,
        dates = dates.len(),
        chunks = chunks.len(),
        "Dispatching date chunks"
    );

    let per_chunk = pool.install(|| {
        chunks
            .into_par_iter()
            .map(|chunk| process_chunk(source, evaluator, field, chunk, satellite, &collection))
            .collect::<Result<Vec<_>>>()
    })?;

    Ok(per_chunk.into_iter().flatten().collect())
}

fn process_chunk<S, E>(
    source: &S,
    evaluator: &E,
    field: &Field,
    chunk: &[NaiveDate],
    satellite: Satellite,
    collection: &Collection,
) -> Result<Vec<AcquisitionRow>>
where
    S: ImageSource + ?Sized,
    E: IndexEvaluator + ?Sized,
{
    chunk
        .iter()
        .map(|&date| {
            build_row(source, evaluator, field, date, satellite, collection).map_err(|e| {
                warn!(field = %field.id, %date, error = %e, "Acquisition failed, aborting chunk");
                e
            })
        })
        .collect()
}

/// One acquisition: fetch the band means, keep the satellite's bands, derive indices.
pub fn build_row<S, E>(
    source: &S,
    evaluator: &E,
    field: &Field,
    date: NaiveDate,
    satellite: Satellite,
    collection: &Collection,
) -> Result<AcquisitionRow>
where
    S: ImageSource + ?Sized,
    E: IndexEvaluator + ?Sized,
{
    let means = source.get_band_means(field, date, collection)?;

    let mut bands = BandMeans::new();
    for &band in satellite.bands() {
        let value = means
            .get(&band)
            .copied()
            .ok_or(FeatureError::MissingBand(band))?;
        bands.insert(band, value);
    }

    let indices = evaluator.evaluate_all(satellite.indices(), &bands)?;

    Ok(AcquisitionRow {
        field_id: field.id.clone(),
        date,
        bands,
        indices,
    })
}
