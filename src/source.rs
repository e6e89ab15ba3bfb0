// src/source.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Band, BandMeans, DateRange, Field};

/// An imagery collection together with the scene filter applied before any query.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub id: String,
    pub filter: SceneFilter,
}

/// Per-scene acceptance rules. Empty rules accept everything.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneFilter {
    /// Polarisations the scene must carry.
    pub polarisations: Vec<Band>,
    pub instrument_mode: Option<String>,
    /// Scenes must be strictly below this cloudy pixel percentage.
    pub max_cloud_cover: Option<f64>,
}

/// Scene properties the filter is evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    #[serde(default)]
    pub polarisations: Vec<Band>,
    #[serde(default)]
    pub instrument_mode: Option<String>,
    #[serde(default)]
    pub cloudy_pixel_percentage: Option<f64>,
}

impl SceneFilter {
    pub fn accepts(&self, scene: &SceneMetadata) -> bool {
        let polarised = self
            .polarisations
            .iter()
            .all(|p| scene.polarisations.contains(p));

        let mode_ok = match &self.instrument_mode {
            Some(mode) => scene.instrument_mode.as_deref() == Some(mode.as_str()),
            None => true,
        };

        // A scene without a cloud estimate can't prove it is clear enough.
        let clouds_ok = match self.max_cloud_cover {
            Some(max) => scene.cloudy_pixel_percentage.is_some_and(|c| c < max),
            None => true,
        };

        polarised && mode_ok && clouds_ok
    }
}

/// The imagery platform seen from the aggregator.
///
/// Both calls block the calling worker until the platform answers.
pub trait ImageSource: Send + Sync {
    /// Distinct acquisition dates of `collection` over the field, ascending.
    fn list_acquisition_dates(
        &self,
        field: &Field,
        range: &DateRange,
        collection: &Collection,
    ) -> Result<Vec<NaiveDate>>;

    /// Mean of every band over the field polygon for one acquisition date.
    fn get_band_means(
        &self,
        field: &Field,
        date: NaiveDate,
        collection: &Collection,
    ) -> Result<BandMeans>;
}

impl<S: ImageSource + ?Sized> ImageSource for &S {
    fn list_acquisition_dates(
        &self,
        field: &Field,
        range: &DateRange,
        collection: &Collection,
    ) -> Result<Vec<NaiveDate>> {
        (**self).list_acquisition_dates(field, range, collection)
    }

    fn get_band_means(
        &self,
        field: &Field,
        date: NaiveDate,
        collection: &Collection,
    ) -> Result<BandMeans> {
        (**self).get_band_means(field, date, collection)
    }
}

impl<S: ImageSource + ?Sized> ImageSource for Box<S> {
    fn list_acquisition_dates(
        &self,
        field: &Field,
        range: &DateRange,
        collection: &Collection,
    ) -> Result<Vec<NaiveDate>> {
        (**self).list_acquisition_dates(field, range, collection)
    }

    fn get_band_means(
        &self,
        field: &Field,
        date: NaiveDate,
        collection: &Collection,
    ) -> Result<BandMeans> {
        (**self).get_band_means(field, date, collection)
    }
}
