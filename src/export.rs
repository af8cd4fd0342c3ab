//! Combined diel-pattern CSV export
//!
//! Writes the per-species summary table consumed downstream of the analysis:
//! crepuscular peak columns from both twilight windows plus the day/night
//! activity difference and the majority-vote label. The same rows can be read
//! back, so a run's output is reproducible input for later comparison.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AnalysisError;
use crate::types::{DielPattern, SpeciesDielPattern, SpeciesPeakSummary, TwilightWindow};

/// One exported row per species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedDielRow {
    pub species_six: String,
    pub species: String,
    pub dawn_peak_offset_sec: Option<f64>,
    pub dawn_peak_magnitude: Option<f64>,
    pub dusk_peak_offset_sec: Option<f64>,
    pub dusk_peak_magnitude: Option<f64>,
    /// Mean over the two windows of the fraction of days carrying a peak
    pub peak_day_fraction: Option<f64>,
    pub crepuscular_fraction: f64,
    pub day_night_dif: f64,
    pub diel_pattern: DielPattern,
}

/// Join species classification rows with both windows' peak summaries
pub fn build_combined_rows(
    species_patterns: &[SpeciesDielPattern],
    peak_summaries: &[SpeciesPeakSummary],
) -> Vec<CombinedDielRow> {
    let mut peaks: HashMap<(&str, TwilightWindow), &SpeciesPeakSummary> = HashMap::new();
    for summary in peak_summaries {
        peaks.insert((&summary.species_six, summary.window), summary);
    }

    species_patterns
        .iter()
        .map(|pattern| {
            let dawn = peaks.get(&(pattern.species_six.as_str(), TwilightWindow::Dawn));
            let dusk = peaks.get(&(pattern.species_six.as_str(), TwilightWindow::Dusk));

            let fractions: Vec<f64> = [dawn, dusk]
                .iter()
                .flatten()
                .map(|s| s.mean_peak_day_fraction)
                .collect();
            let peak_day_fraction = crate::aggregation::mean(&fractions);

            CombinedDielRow {
                species_six: pattern.species_six.clone(),
                species: pattern.species.clone(),
                dawn_peak_offset_sec: dawn.and_then(|s| s.mean_offset_sec),
                dawn_peak_magnitude: dawn.and_then(|s| s.mean_magnitude),
                dusk_peak_offset_sec: dusk.and_then(|s| s.mean_offset_sec),
                dusk_peak_magnitude: dusk.and_then(|s| s.mean_magnitude),
                peak_day_fraction,
                crepuscular_fraction: pattern.crepuscular_fraction,
                day_night_dif: pattern.day_night_dif,
                diel_pattern: pattern.pattern,
            }
        })
        .collect()
}

/// File name for a combined export on the given date
pub fn combined_csv_name(date: NaiveDate) -> String {
    format!("combined_diel_patterns_{}_dp.csv", date.format("%Y-%m-%d"))
}

/// Write the combined table into `dir`, returning the full path.
///
/// Missing values serialize as empty fields. Rows are staged to a temporary
/// file and renamed into place once flushed, so a failure mid-write leaves no
/// partial table at the final name.
pub fn write_combined_csv(
    dir: &Path,
    rows: &[CombinedDielRow],
    date: NaiveDate,
) -> Result<PathBuf, AnalysisError> {
    let name = combined_csv_name(date);
    let path = dir.join(&name);
    let staging = dir.join(format!("{name}.tmp"));

    if let Err(e) = write_rows(&staging, rows) {
        std::fs::remove_file(&staging).ok();
        return Err(e);
    }
    std::fs::rename(&staging, &path)?;

    info!(rows = rows.len(), path = %path.display(), "wrote combined diel pattern table");
    Ok(path)
}

fn write_rows(path: &Path, rows: &[CombinedDielRow]) -> Result<(), AnalysisError> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a previously exported combined table
pub fn read_combined_csv(path: &Path) -> Result<Vec<CombinedDielRow>, AnalysisError> {
    let mut reader = ReaderBuilder::new().from_path(path)?;
    let rows = reader
        .deserialize::<CombinedDielRow>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_rows() -> Vec<CombinedDielRow> {
        vec![
            CombinedDielRow {
                species_six: "Neopul".into(),
                species: "Neolamprologus pulcher".into(),
                dawn_peak_offset_sec: Some(1800.0),
                dawn_peak_magnitude: Some(42.5),
                dusk_peak_offset_sec: Some(2700.0),
                dusk_peak_magnitude: Some(38.25),
                peak_day_fraction: Some(0.75),
                crepuscular_fraction: 0.6,
                day_night_dif: 12.375,
                diel_pattern: DielPattern::Diurnal,
            },
            CombinedDielRow {
                species_six: "Altcal".into(),
                species: "Altolamprologus calvus".into(),
                dawn_peak_offset_sec: None,
                dawn_peak_magnitude: None,
                dusk_peak_offset_sec: None,
                dusk_peak_magnitude: None,
                peak_day_fraction: Some(0.0),
                crepuscular_fraction: 0.0,
                day_night_dif: -3.5,
                diel_pattern: DielPattern::Nocturnal,
            },
        ]
    }

    #[test]
    fn test_round_trip() {
        let dir = std::env::temp_dir().join(format!("diel-export-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let date = NaiveDate::from_ymd_opt(2021, 9, 1).unwrap();

        let rows = sample_rows();
        let path = write_combined_csv(&dir, &rows, date).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "combined_diel_patterns_2021-09-01_dp.csv"
        );

        let reloaded = read_combined_csv(&path).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(reloaded, rows);
    }

    #[test]
    fn test_failed_write_leaves_no_output_file() {
        let dir = std::env::temp_dir().join(format!("diel-export-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let date = NaiveDate::from_ymd_opt(2021, 9, 1).unwrap();

        // Occupy the staging path with a directory so the writer cannot open it.
        std::fs::create_dir(dir.join(format!("{}.tmp", combined_csv_name(date)))).unwrap();

        let result = write_combined_csv(&dir, &sample_rows(), date);
        let final_exists = dir.join(combined_csv_name(date)).exists();
        std::fs::remove_dir_all(&dir).ok();

        assert!(result.is_err());
        assert!(!final_exists);
    }

    #[test]
    fn test_build_combined_rows_joins_windows() {
        let patterns = vec![SpeciesDielPattern {
            species_six: "Neopul".into(),
            species: "Neolamprologus pulcher".into(),
            pattern: DielPattern::Diurnal,
            n_individuals: 4,
            day_night_dif: 5.0,
            day_night_ratio: Some(2.0),
            crepuscular_fraction: 0.5,
        }];
        let peaks = vec![
            SpeciesPeakSummary {
                species_six: "Neopul".into(),
                species: "Neolamprologus pulcher".into(),
                window: TwilightWindow::Dawn,
                n_fish: 4,
                mean_offset_sec: Some(1800.0),
                mean_magnitude: Some(10.0),
                mean_peak_day_fraction: 1.0,
            },
            SpeciesPeakSummary {
                species_six: "Neopul".into(),
                species: "Neolamprologus pulcher".into(),
                window: TwilightWindow::Dusk,
                n_fish: 4,
                mean_offset_sec: Some(900.0),
                mean_magnitude: Some(8.0),
                mean_peak_day_fraction: 0.5,
            },
        ];

        let rows = build_combined_rows(&patterns, &peaks);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].dawn_peak_offset_sec, Some(1800.0));
        assert_eq!(rows[0].dusk_peak_magnitude, Some(8.0));
        assert_eq!(rows[0].peak_day_fraction, Some(0.75));
        assert_eq!(rows[0].diel_pattern, DielPattern::Diurnal);
    }

    #[test]
    fn test_missing_window_stays_missing() {
        let patterns = vec![SpeciesDielPattern {
            species_six: "Altcal".into(),
            species: "Altolamprologus calvus".into(),
            pattern: DielPattern::Undefined,
            n_individuals: 2,
            day_night_dif: 0.0,
            day_night_ratio: None,
            crepuscular_fraction: 0.0,
        }];
        let rows = build_combined_rows(&patterns, &[]);
        assert_eq!(rows[0].dawn_peak_offset_sec, None);
        assert_eq!(rows[0].peak_day_fraction, None);
    }
}
