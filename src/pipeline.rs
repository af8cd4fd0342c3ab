//! Pipeline orchestration
//!
//! This module provides the public API for the diel analysis: a configured
//! processor that takes a loaded tracking table through classification, peak
//! detection, species aggregation, and the combined export rows. Stages are
//! pure table-to-table transformations; any stage error aborts the whole run
//! and no partial output is produced.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::crepuscular;
use crate::diel::{self, DielTest, DEFAULT_ALPHA};
use crate::error::AnalysisError;
use crate::export::{self, CombinedDielRow};
use crate::ingest;
use crate::timing::TimingConfig;
use crate::types::{
    Feature, IndividualDielPattern, SpeciesDielPattern, SpeciesPeakSummary, TrackRecord,
    TwilightWindow,
};

/// Options for one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Feature to classify and scan for peaks
    pub feature: Feature,
    /// Day-vs-night statistical test
    pub test: DielTest,
    /// Significance threshold for the day/night comparison
    pub alpha: f64,
    /// Minimum prominence for a twilight peak; 0 accepts any local maximum
    pub min_prominence: f64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            feature: Feature::SpeedMm,
            test: DielTest::Welch,
            alpha: DEFAULT_ALPHA,
            min_prominence: 0.0,
        }
    }
}

/// Result of one analysis run, with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DielRunSummary {
    pub run_id: Uuid,
    pub computed_at: DateTime<Utc>,
    pub options: AnalysisOptions,
    pub individuals: Vec<IndividualDielPattern>,
    pub species: Vec<SpeciesDielPattern>,
    pub dawn_peaks: Vec<SpeciesPeakSummary>,
    pub dusk_peaks: Vec<SpeciesPeakSummary>,
    pub combined: Vec<CombinedDielRow>,
}

/// Configured processor for diel pattern analysis
pub struct DielProcessor {
    timing: TimingConfig,
    options: AnalysisOptions,
}

impl DielProcessor {
    pub fn new(timing: TimingConfig, options: AnalysisOptions) -> Self {
        Self { timing, options }
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// Run the full analysis over a loaded tracking table.
    ///
    /// Stage order: individual classification, twilight peak detection (which
    /// sets the crepuscular flags), species majority vote, peak aggregation,
    /// combined export rows.
    pub fn run(&self, records: &[TrackRecord]) -> Result<DielRunSummary, AnalysisError> {
        if records.is_empty() {
            return Err(AnalysisError::DataShape(
                "cannot analyze an empty tracking table".to_string(),
            ));
        }

        info!(
            rows = records.len(),
            feature = self.options.feature.as_str(),
            "starting diel analysis run"
        );

        let mut individuals = diel::classify_all(
            records,
            self.options.feature,
            &self.timing,
            self.options.test,
            self.options.alpha,
        )?;

        let dawn_fish = crepuscular::fish_peak_summaries(
            records,
            self.options.feature,
            &self.timing,
            TwilightWindow::Dawn,
            self.options.min_prominence,
        );
        let dusk_fish = crepuscular::fish_peak_summaries(
            records,
            self.options.feature,
            &self.timing,
            TwilightWindow::Dusk,
            self.options.min_prominence,
        );

        // Peak summaries come back in the same first-seen fish order as the
        // classification rows; join defensively by fish ID anyway.
        for row in individuals.iter_mut() {
            let dawn = dawn_fish.iter().find(|s| s.fish_id == row.fish_id);
            let dusk = dusk_fish.iter().find(|s| s.fish_id == row.fish_id);
            if let (Some(dawn), Some(dusk)) = (dawn, dusk) {
                row.crepuscular = crepuscular::is_crepuscular(dawn, dusk);
            }
        }

        let species = diel::classify_species(&individuals);
        let dawn_peaks = crepuscular::species_peak_summaries(&dawn_fish);
        let dusk_peaks = crepuscular::species_peak_summaries(&dusk_fish);

        let mut all_peaks = dawn_peaks.clone();
        all_peaks.extend(dusk_peaks.iter().cloned());
        let combined = export::build_combined_rows(&species, &all_peaks);

        info!(
            individuals = individuals.len(),
            species = species.len(),
            "finished diel analysis run"
        );

        Ok(DielRunSummary {
            run_id: Uuid::new_v4(),
            computed_at: Utc::now(),
            options: self.options.clone(),
            individuals,
            species,
            dawn_peaks,
            dusk_peaks,
            combined,
        })
    }

    /// Write a run's combined table into `dir`, dated today
    pub fn export_csv(
        &self,
        summary: &DielRunSummary,
        dir: &Path,
    ) -> Result<PathBuf, AnalysisError> {
        export::write_combined_csv(dir, &summary.combined, Utc::now().date_naive())
    }
}

/// Convenience entry point: load a tracking export and run the analysis.
///
/// The metrics path is explicit configuration; when given, tribe labels are
/// attached before analysis.
pub fn analyze_csv(
    input: &Path,
    metrics: Option<&Path>,
    timing: TimingConfig,
    options: AnalysisOptions,
) -> Result<DielRunSummary, AnalysisError> {
    let mut records = ingest::read_track_csv(input)?;
    if let Some(metrics_path) = metrics {
        let table = ingest::read_species_metrics(metrics_path)?;
        ingest::attach_tribes(&mut records, &table);
    }
    DielProcessor::new(timing, options).run(&records)
}
