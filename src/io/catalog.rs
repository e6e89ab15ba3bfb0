// src/io/catalog.rs
use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FeatureError, Result};
use crate::model::{BandMeans, DateRange, Field};
use crate::source::{Collection, ImageSource, SceneMetadata};

/// One exported acquisition of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub collection: String,
    pub field: String,
    pub time_start: DateTime<Utc>,
    #[serde(flatten)]
    pub metadata: SceneMetadata,
    pub band_means: BandMeans,
}

impl SceneRecord {
    pub fn date(&self) -> NaiveDate {
        self.time_start.date_naive()
    }
}

/// Offline image source backed by a JSON export of scenes and their
/// per-field band means.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneCatalog {
    pub scenes: Vec<SceneRecord>,
}

impl SceneCatalog {
    pub fn new(scenes: Vec<SceneRecord>) -> Self {
        Self { scenes }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let catalog = Self::from_json(&content)?;
        info!(path = %path.display(), scenes = catalog.scenes.len(), "Loaded scene catalog");
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Scenes of `collection` over `field` that pass the collection's filter, in catalog order.
    fn matching<'a>(
        &'a self,
        field: &'a Field,
        collection: &'a Collection,
    ) -> impl Iterator<Item = &'a SceneRecord> + 'a {
        self.scenes.iter().filter(move |scene| {
            scene.collection == collection.id
                && scene.field == field.id
                && collection.filter.accepts(&scene.metadata)
        })
    }
}

impl ImageSource for SceneCatalog {
    fn list_acquisition_dates(
        &self,
        field: &Field,
        range: &DateRange,
        collection: &Collection,
    ) -> Result<Vec<NaiveDate>> {
        let dates: Vec<NaiveDate> = self
            .matching(field, collection)
            .map(SceneRecord::date)
            .filter(|date| range.contains(*date))
            .sorted()
            .dedup()
            .collect();

        debug!(field = %field.id, collection = %collection.id, dates = dates.len(), "Listed catalog dates");
        Ok(dates)
    }

    fn get_band_means(
        &self,
        field: &Field,
        date: NaiveDate,
        collection: &Collection,
    ) -> Result<BandMeans> {
        self.matching(field, collection)
            .find(|scene| scene.date() == date)
            .map(|scene| scene.band_means.clone())
            .ok_or_else(|| {
                FeatureError::Upstream(format!(
                    "no {} scene for field {} on {}",
                    collection.id, field.id, date
                ))
            })
    }
}
