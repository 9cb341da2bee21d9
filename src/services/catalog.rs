//! Sign catalog - in-memory collection of detected signs
//!
//! Loaded once from GeoJSON, then queried for the class list, filtered by
//! class and capture date, edited and exported by the operator.

use crate::domain::types::{PoiId, PointOfInterest, CLASS_KEY, IMAGE_KEY, TIMESTAMP_KEY};
use anyhow::{anyhow, Context};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Class/date filter applied to the catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignFilter {
    /// `None` matches every class
    pub class: Option<String>,
    /// Inclusive lower bound (UTC midnight of this date)
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound (UTC midnight of this date)
    pub to: Option<NaiveDate>,
}

impl SignFilter {
    /// Build a filter from operator input; "all" or empty means any class
    pub fn from_input(
        class: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
    ) -> anyhow::Result<Self> {
        let class = class
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != "all")
            .map(str::to_string);
        Ok(Self { class, from: parse_date_arg(from)?, to: parse_date_arg(to)? })
    }

    pub fn matches(&self, sign: &PointOfInterest) -> bool {
        let class_ok = match &self.class {
            None => true,
            Some(class) => sign.class() == Some(class.as_str()),
        };
        class_ok && self.matches_date(sign)
    }

    fn matches_date(&self, sign: &PointOfInterest) -> bool {
        if self.from.is_none() && self.to.is_none() {
            return true;
        }
        let Some(t) = sign.attribute(TIMESTAMP_KEY).and_then(parse_timestamp) else {
            return false;
        };
        let after_from = self.from.map_or(true, |d| t >= utc_midnight(d));
        let before_to = self.to.map_or(true, |d| t <= utc_midnight(d));
        after_from && before_to
    }
}

fn parse_date_arg(value: Option<&str>) -> anyhow::Result<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .with_context(|| format!("Invalid date {v:?}, expected YYYY-MM-DD")),
    }
}

fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Parse a capture timestamp as found in the predictions dataset
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` (UTC),
/// a bare date, or epoch milliseconds.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(utc_midnight(date));
    }
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return value.parse::<i64>().ok().and_then(|ms| Utc.timestamp_millis_opt(ms).single());
    }
    None
}

/// Which picture to show for a sign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageMode {
    /// Captured photo under `data/images/`
    #[default]
    Real,
    /// Class pictogram under `data/icons/`
    Icon,
}

impl std::str::FromStr for ImageMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "real" => Ok(ImageMode::Real),
            "icon" => Ok(ImageMode::Icon),
            other => Err(anyhow!("unknown image mode {other:?} (expected real or icon)")),
        }
    }
}

/// Relative path of the picture for a sign
pub fn image_path(sign: &PointOfInterest, mode: ImageMode) -> Option<String> {
    match mode {
        ImageMode::Real => sign.attribute(IMAGE_KEY).map(|name| format!("data/images/{name}")),
        ImageMode::Icon => sign.class().map(|class| format!("data/icons/{class}.png")),
    }
}

/// In-memory sign collection
#[derive(Debug, Clone, Default)]
pub struct SignCatalog {
    signs: Vec<PointOfInterest>,
}

impl SignCatalog {
    pub fn new(signs: Vec<PointOfInterest>) -> Self {
        info!(signs = %signs.len(), "catalog_loaded");
        Self { signs }
    }

    pub fn signs(&self) -> &[PointOfInterest] {
        &self.signs
    }

    pub fn len(&self) -> usize {
        self.signs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signs.is_empty()
    }

    pub fn get(&self, id: &PoiId) -> Option<&PointOfInterest> {
        self.signs.iter().find(|s| &s.id == id)
    }

    /// Swap in a freshly loaded collection
    pub fn replace(&mut self, signs: Vec<PointOfInterest>) {
        info!(old = %self.signs.len(), new = %signs.len(), "catalog_replaced");
        self.signs = signs;
    }

    /// Sorted distinct classification labels
    pub fn classes(&self) -> Vec<String> {
        let classes: BTreeSet<&str> = self.signs.iter().filter_map(|s| s.class()).collect();
        classes.into_iter().map(str::to_string).collect()
    }

    /// Signs passing the filter, in catalog order
    pub fn filter(&self, filter: &SignFilter) -> Vec<&PointOfInterest> {
        let matched: Vec<&PointOfInterest> =
            self.signs.iter().filter(|s| filter.matches(s)).collect();
        debug!(
            class = ?filter.class,
            from = ?filter.from,
            to = ?filter.to,
            matched = %matched.len(),
            total = %self.signs.len(),
            "catalog_filtered"
        );
        matched
    }

    /// Relabel a sign; returns the previous class
    pub fn set_class(&mut self, id: &PoiId, class: &str) -> anyhow::Result<Option<String>> {
        let class = class.trim();
        if class.is_empty() {
            return Err(anyhow!("class for sign {id} must not be empty"));
        }
        let sign = self
            .signs
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| anyhow!("unknown sign id {id}"))?;

        let previous = sign.attributes.insert(CLASS_KEY.to_string(), class.to_string());
        info!(
            sign_id = %id,
            old_class = ?previous,
            new_class = %class,
            "sign_class_updated"
        );
        Ok(previous)
    }
}
