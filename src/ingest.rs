//! Tracking-export ingestion
//!
//! Reads downsampled tracking CSVs (one row per fish per time bin) into
//! [`TrackRecord`] tables. Species-name corrections are applied exactly once
//! here; downstream stages see canonical names only. Timestamp monotonicity
//! per fish is enforced at load time so every later stage can rely on it.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::AnalysisError;
use crate::species;
use crate::types::TrackRecord;

/// Columns that must be present in a tracking export. Feature columns are
/// required in the header; individual values may still be empty.
const REQUIRED_COLUMNS: [&str; 7] = [
    "FishID",
    "species",
    "ts",
    "speed_mm",
    "movement",
    "rest",
    "vertical_pos",
];

/// Raw CSV row as exported by the tracking system
#[derive(Debug, Deserialize)]
struct RawTrackRow {
    #[serde(rename = "FishID")]
    fish_id: String,
    species: String,
    ts: String,
    #[serde(default)]
    speed_mm: Option<f64>,
    #[serde(default)]
    movement: Option<f64>,
    #[serde(default)]
    rest: Option<f64>,
    #[serde(default)]
    vertical_pos: Option<f64>,
}

/// One row of the species metrics lookup table, keyed by six-letter code
#[derive(Debug, Clone, Deserialize)]
pub struct SpeciesMetrics {
    pub species_six: String,
    pub tribe: String,
}

/// Load a downsampled tracking export.
///
/// Applies the canonical species rename table, derives six-letter codes, and
/// validates that timestamps are strictly increasing per fish.
pub fn read_track_csv(path: &Path) -> Result<Vec<TrackRecord>, AnalysisError> {
    let mut reader = ReaderBuilder::new().from_path(path)?;

    let headers = reader.headers()?.clone();
    for required in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == required) {
            return Err(AnalysisError::DataShape(format!(
                "missing required column '{required}' in {}",
                path.display()
            )));
        }
    }

    let mut records = Vec::new();
    let mut last_ts: HashMap<String, DateTime<Utc>> = HashMap::new();

    for row in reader.deserialize::<RawTrackRow>() {
        let raw = row?;
        let ts = parse_timestamp(&raw.ts)?;

        let fish_id = species::canonical_fish_id(&raw.fish_id);
        if let Some(prev) = last_ts.get(&fish_id) {
            if ts <= *prev {
                return Err(AnalysisError::DataShape(format!(
                    "non-monotonic timestamps for fish {fish_id}: {ts} follows {prev}"
                )));
            }
        }
        last_ts.insert(fish_id.clone(), ts);

        let name = species::canonical_species(&raw.species);
        let species_six = species::six_letter_code(&name);

        records.push(TrackRecord {
            fish_id,
            species: name,
            species_six,
            tribe: None,
            ts,
            speed_mm: raw.speed_mm,
            movement: raw.movement,
            rest: raw.rest,
            vertical_pos: raw.vertical_pos,
        });
    }

    if records.is_empty() {
        return Err(AnalysisError::DataShape(format!(
            "no rows in tracking export {}",
            path.display()
        )));
    }

    info!(
        rows = records.len(),
        fish = last_ts.len(),
        path = %path.display(),
        "loaded tracking export"
    );
    Ok(records)
}

/// Load the species metrics lookup table (six-letter code -> tribe, etc.)
pub fn read_species_metrics(path: &Path) -> Result<HashMap<String, SpeciesMetrics>, AnalysisError> {
    let mut reader = ReaderBuilder::new().from_path(path)?;
    let mut metrics = HashMap::new();
    for row in reader.deserialize::<SpeciesMetrics>() {
        let mut m = row?;
        m.species_six = species::canonical_six(&m.species_six);
        metrics.insert(m.species_six.clone(), m);
    }
    debug!(species = metrics.len(), "loaded species metrics table");
    Ok(metrics)
}

/// Attach tribe labels from the metrics table; species without an entry keep `None`
pub fn attach_tribes(records: &mut [TrackRecord], metrics: &HashMap<String, SpeciesMetrics>) {
    for record in records.iter_mut() {
        record.tribe = metrics.get(&record.species_six).map(|m| m.tribe.clone());
    }
}

/// Parse an export timestamp: RFC 3339 or a naive `YYYY-MM-DD HH:MM:SS` treated as UTC
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AnalysisError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| AnalysisError::TimestampParse(format!("unparseable timestamp '{raw}'")))
}
