//! GeoJSON sign dataset I/O
//!
//! Reads the predictions FeatureCollection (WGS84 Point features) into
//! `PointOfInterest` records and writes the edited collection back out.
//! Properties are flattened to strings on read.

use crate::domain::types::{GeoPoint, PoiId, PointOfInterest, IMAGE_KEY};
use crate::services::catalog::SignCatalog;
use anyhow::{bail, Context};
use rustc_hash::FxHashSet;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Vec<Value>,
}

/// Parse a GeoJSON FeatureCollection of sign points
pub fn parse_signs(content: &str) -> anyhow::Result<Vec<PointOfInterest>> {
    let collection: FeatureCollection =
        serde_json::from_str(content).context("Failed to parse GeoJSON")?;
    if collection.kind != "FeatureCollection" {
        bail!("Expected a FeatureCollection, got {:?}", collection.kind);
    }

    let mut signs = Vec::with_capacity(collection.features.len());
    let mut seen: FxHashSet<String> = FxHashSet::default();

    for (index, feature) in collection.features.into_iter().enumerate() {
        let Some(location) = feature.geometry.as_ref().and_then(point_location) else {
            warn!(index = %index, "geojson_feature_skipped_not_a_point");
            continue;
        };

        let attributes = flatten_properties(feature.properties.unwrap_or_default());
        let base_id = feature_id(feature.id.as_ref(), &attributes, index);
        let id = unique_id(base_id, &mut seen);

        signs.push(PointOfInterest { id: PoiId(id), location, attributes });
    }

    debug!(signs = %signs.len(), "geojson_parsed");
    Ok(signs)
}

/// Load the sign catalog from a GeoJSON file
pub fn load_catalog<P: AsRef<Path>>(path: P) -> anyhow::Result<SignCatalog> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read sign dataset {}", path.display()))?;
    let signs = parse_signs(&content)
        .with_context(|| format!("Failed to load sign dataset {}", path.display()))?;
    info!(path = %path.display(), signs = %signs.len(), "sign_dataset_loaded");
    Ok(SignCatalog::new(signs))
}

/// Build a FeatureCollection from sign records
pub fn to_feature_collection<'a, I>(signs: I) -> Value
where
    I: IntoIterator<Item = &'a PointOfInterest>,
{
    let features: Vec<Value> = signs
        .into_iter()
        .map(|sign| {
            json!({
                "type": "Feature",
                "id": sign.id.as_str(),
                "geometry": {
                    "type": "Point",
                    "coordinates": [sign.location.lon, sign.location.lat],
                },
                "properties": sign.attributes,
            })
        })
        .collect();

    json!({ "type": "FeatureCollection", "features": features })
}

/// Write signs as pretty-printed GeoJSON, creating parent directories
pub fn write_signs<'a, P, I>(path: P, signs: I) -> anyhow::Result<usize>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a PointOfInterest>,
{
    let path = path.as_ref();
    let collection = to_feature_collection(signs);
    let count = collection["features"].as_array().map_or(0, Vec::len);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let body = serde_json::to_string_pretty(&collection).context("Failed to encode GeoJSON")?;
    fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), signs = %count, "geojson_exported");
    Ok(count)
}

fn point_location(geometry: &Geometry) -> Option<GeoPoint> {
    if geometry.kind != "Point" || geometry.coordinates.len() < 2 {
        return None;
    }
    let lon = geometry.coordinates[0].as_f64()?;
    let lat = geometry.coordinates[1].as_f64()?;
    Some(GeoPoint::new(lat, lon))
}

fn flatten_properties(properties: Map<String, Value>) -> BTreeMap<String, String> {
    properties
        .into_iter()
        .filter_map(|(key, value)| {
            let flat = match value {
                Value::Null => return None,
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                other => other.to_string(),
            };
            Some((key, flat))
        })
        .collect()
}

/// Feature `id`, else the image name, else the position in the file
fn feature_id(id: Option<&Value>, attributes: &BTreeMap<String, String>, index: usize) -> String {
    match id {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => attributes
            .get(IMAGE_KEY)
            .filter(|name| !name.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("sign-{index}")),
    }
}

fn unique_id(base: String, seen: &mut FxHashSet<String>) -> String {
    if seen.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}#{n}");
        if seen.insert(candidate.clone()) {
            warn!(id = %base, renamed = %candidate, "geojson_duplicate_id");
            return candidate;
        }
        n += 1;
    }
}
