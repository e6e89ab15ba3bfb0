// src/model.rs
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use clap::ValueEnum;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};
use crate::processing::indices::{IndexKind, OPTICAL_INDICES, RADAR_INDICES};
use crate::source::{Collection, SceneFilter};

/// Column name used for the field identifier when the caller doesn't pick one.
pub const DEFAULT_ID_COLUMN: &str = "crop_field_name";

/// Maximum cloudy pixel percentage accepted for optical scenes.
pub const MAX_CLOUD_COVER: f64 = 40.0;

/// Radar polarisations and optical bands, in column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Band {
    VV,
    VH,
    B1,
    B2,
    B3,
    B4,
    B5,
    B6,
    B7,
    B8,
    B8A,
    B9,
    B11,
    B12,
}

impl Band {
    pub fn name(&self) -> &'static str {
        match self {
            Band::VV => "VV",
            Band::VH => "VH",
            Band::B1 => "B1",
            Band::B2 => "B2",
            Band::B3 => "B3",
            Band::B4 => "B4",
            Band::B5 => "B5",
            Band::B6 => "B6",
            Band::B7 => "B7",
            Band::B8 => "B8",
            Band::B8A => "B8A",
            Band::B9 => "B9",
            Band::B11 => "B11",
            Band::B12 => "B12",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub type BandMeans = BTreeMap<Band, f64>;

const RADAR_BANDS: &[Band] = &[Band::VV, Band::VH];

const OPTICAL_BANDS: &[Band] = &[
    Band::B1,
    Band::B2,
    Band::B3,
    Band::B4,
    Band::B5,
    Band::B6,
    Band::B7,
    Band::B8,
    Band::B8A,
    Band::B9,
    Band::B11,
    Band::B12,
];

/// Which mission's imagery a job reads. Fixed for a whole job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Satellite {
    /// Sentinel-1 SAR, dual polarisation
    #[serde(alias = "s1")]
    #[value(alias = "s1")]
    Radar,
    /// Sentinel-2 surface reflectance
    #[serde(alias = "s2")]
    #[value(alias = "s2")]
    Optical,
}

impl Satellite {
    pub fn collection(&self) -> Collection {
        match self {
            Satellite::Radar => Collection {
                id: "COPERNICUS/S1_GRD_FLOAT".to_string(),
                filter: SceneFilter {
                    polarisations: vec![Band::VV, Band::VH],
                    instrument_mode: Some("IW".to_string()),
                    max_cloud_cover: None,
                },
            },
            Satellite::Optical => Collection {
                id: "COPERNICUS/S2_SR".to_string(),
                filter: SceneFilter {
                    polarisations: Vec::new(),
                    instrument_mode: None,
                    max_cloud_cover: Some(MAX_CLOUD_COVER),
                },
            },
        }
    }

    pub fn bands(&self) -> &'static [Band] {
        match self {
            Satellite::Radar => RADAR_BANDS,
            Satellite::Optical => OPTICAL_BANDS,
        }
    }

    pub fn indices(&self) -> &'static [IndexKind] {
        match self {
            Satellite::Radar => RADAR_INDICES,
            Satellite::Optical => OPTICAL_INDICES,
        }
    }

    pub fn date_column(&self) -> &'static str {
        match self {
            Satellite::Radar => "s1_acquisition_date",
            Satellite::Optical => "s2_acquisition_date",
        }
    }
}

impl fmt::Display for Satellite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Satellite::Radar => f.write_str("radar"),
            Satellite::Optical => f.write_str("optical"),
        }
    }
}

/// Closed ring of (lon, lat) vertices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polygon(Vec<(f64, f64)>);

impl Polygon {
    /// Builds a ring, closing it if the last vertex doesn't repeat the first.
    pub fn new(mut vertices: Vec<(f64, f64)>) -> Result<Self> {
        if let Some(bad) = vertices.iter().find(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(FeatureError::InvalidPolygon(format!(
                "non-finite vertex ({}, {})",
                bad.0, bad.1
            )));
        }

        if vertices.first() != vertices.last() {
            if let Some(&first) = vertices.first() {
                vertices.push(first);
            }
        }

        // The closing vertex repeats the first one. Adding 0.0 folds -0.0 into 0.0.
        let open = &vertices[..vertices.len().saturating_sub(1)];
        let distinct = open
            .iter()
            .map(|(x, y)| ((x + 0.0).to_bits(), (y + 0.0).to_bits()))
            .unique()
            .count();
        if distinct < 3 {
            return Err(FeatureError::InvalidPolygon(format!(
                "ring needs at least 3 distinct vertices, got {}",
                distinct
            )));
        }

        Ok(Self(vertices))
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub id: String,
    pub polygon: Polygon,
}

impl Field {
    pub fn new(id: impl Into<String>, polygon: Polygon) -> Self {
        Self {
            id: id.into(),
            polygon,
        }
    }
}

/// Half-open `[start, end)` span of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(FeatureError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// Band means and derived indices of one field on one acquisition date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquisitionRow {
    pub field_id: String,
    pub date: NaiveDate,
    pub bands: BandMeans,
    pub indices: BTreeMap<IndexKind, f64>,
}

impl AcquisitionRow {
    pub fn band(&self, band: Band) -> Option<f64> {
        self.bands.get(&band).copied()
    }

    pub fn index(&self, index: IndexKind) -> Option<f64> {
        self.indices.get(&index).copied()
    }
}

/// A field whose processing failed while partial results were allowed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldFailure {
    pub field_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultTable {
    pub id_column: String,
    pub satellite: Satellite,
    pub rows: Vec<AcquisitionRow>,
    pub failures: Vec<FieldFailure>,
}

impl ResultTable {
    /// Builds a table, ordering rows by field id then acquisition date.
    pub fn new(
        id_column: impl Into<String>,
        satellite: Satellite,
        mut rows: Vec<AcquisitionRow>,
        failures: Vec<FieldFailure>,
    ) -> Self {
        rows.sort_by(|a, b| a.field_id.cmp(&b.field_id).then(a.date.cmp(&b.date)));
        Self {
            id_column: id_column.into(),
            satellite,
            rows,
            failures,
        }
    }

    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![
            self.id_column.clone(),
            self.satellite.date_column().to_string(),
        ];
        columns.extend(self.satellite.bands().iter().map(|b| b.name().to_string()));
        columns.extend(self.satellite.indices().iter().map(|i| i.name().to_string()));
        columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows_for<'a>(&'a self, field_id: &'a str) -> impl Iterator<Item = &'a AcquisitionRow> {
        self.rows.iter().filter(move |r| r.field_id == field_id)
    }
}

/// Tab-separated rendering: header line, then one line per row.
impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.columns().join("\t"))?;

        let bands = self.satellite.bands();
        let indices = self.satellite.indices();
        for row in &self.rows {
            let values = bands
                .iter()
                .map(|b| row.band(*b))
                .chain(indices.iter().map(|i| row.index(*i)))
                .map(|v| v.map_or_else(String::new, |v| v.to_string()))
                .join("\t");
            writeln!(f, "{}\t{}\t{}", row.field_id, row.date.format("%Y-%m-%d"), values)?;
        }
        Ok(())
    }
}
