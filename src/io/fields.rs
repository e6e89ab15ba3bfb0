// src/io/fields.rs
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{FeatureError, Result};
use crate::model::{Field, Polygon};

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    geometry: Geometry,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    /// Outer ring first, then holes.
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
}

/// Reads a GeoJSON `FeatureCollection` of polygons into fields.
///
/// The id comes from `id_property` when the feature has it as a string or
/// number; otherwise it is `field-{n}` with `n` the 1-based feature position.
pub fn load_fields(path: &Path, id_property: Option<&str>) -> Result<Vec<Field>> {
    let content = fs::read_to_string(path)?;
    let fields = parse_fields(&content, id_property)?;
    info!(path = %path.display(), fields = fields.len(), "Loaded fields");
    Ok(fields)
}

pub fn parse_fields(json: &str, id_property: Option<&str>) -> Result<Vec<Field>> {
    let collection: FeatureCollection = serde_json::from_str(json)?;

    collection
        .features
        .into_iter()
        .enumerate()
        .map(|(i, feature)| {
            let id = feature_id(feature.properties.as_ref(), id_property)
                .unwrap_or_else(|| format!("field-{}", i + 1));

            let Geometry::Polygon { coordinates } = feature.geometry;
            let ring = coordinates.into_iter().next().ok_or_else(|| {
                FeatureError::InvalidPolygon(format!("field {id} has no outer ring"))
            })?;
            debug!(field = %id, vertices = ring.len(), "Read field polygon");

            let vertices = ring
                .into_iter()
                .map(|position| match position.as_slice() {
                    [x, y, ..] => Ok((*x, *y)),
                    _ => Err(FeatureError::InvalidPolygon(format!(
                        "field {id} has a position with fewer than two coordinates"
                    ))),
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(Field::new(id, Polygon::new(vertices)?))
        })
        .collect()
}

fn feature_id(properties: Option<&Map<String, Value>>, key: Option<&str>) -> Option<String> {
    match properties?.get(key?)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
