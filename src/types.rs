//! Core types for the diel analysis pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw track records, phase tags, daily profiles, classification rows,
//! and peak summaries. Every row is an immutable value; each stage produces new
//! tables rather than mutating its input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of the diel cycle assigned to a sample by time-of-day.
///
/// The six phases partition every 24 h period with no gaps or overlaps for any
/// valid [`TimingConfig`](crate::timing::TimingConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayPhase {
    Predawn,
    Dawn,
    Day,
    Dusk,
    Postdusk,
    Night,
}

impl DayPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayPhase::Predawn => "predawn",
            DayPhase::Dawn => "dawn",
            DayPhase::Day => "day",
            DayPhase::Dusk => "dusk",
            DayPhase::Postdusk => "postdusk",
            DayPhase::Night => "night",
        }
    }

    /// Whether this phase is one of the four twilight windows bridging day and night
    pub fn is_twilight(&self) -> bool {
        matches!(
            self,
            DayPhase::Predawn | DayPhase::Dawn | DayPhase::Dusk | DayPhase::Postdusk
        )
    }

    /// All phases in clock order starting from predawn
    pub const ALL: [DayPhase; 6] = [
        DayPhase::Predawn,
        DayPhase::Dawn,
        DayPhase::Day,
        DayPhase::Dusk,
        DayPhase::Postdusk,
        DayPhase::Night,
    ];
}

/// Tracked behavioral feature selected for an analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    SpeedMm,
    Movement,
    Rest,
    VerticalPos,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::SpeedMm => "speed_mm",
            Feature::Movement => "movement",
            Feature::Rest => "rest",
            Feature::VerticalPos => "vertical_pos",
        }
    }
}

/// One time-binned tracking sample for one fish.
///
/// Feature values are `Option<f64>`: a dropped bin stays missing and is never
/// coerced to zero on the way through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Unique fish identifier (embeds species and recording metadata)
    pub fish_id: String,
    /// Full species name, canonical spelling
    pub species: String,
    /// Six-letter species code (e.g. "Altcal" for Altolamprologus calvus)
    pub species_six: String,
    /// Taxonomic tribe, attached from the species metrics table when available
    pub tribe: Option<String>,
    /// Bin timestamp (UTC)
    pub ts: DateTime<Utc>,
    /// Mean speed over the bin (mm/s)
    pub speed_mm: Option<f64>,
    /// Fraction of the bin spent moving (0-1)
    pub movement: Option<f64>,
    /// Fraction of the bin spent in rest state (0-1)
    pub rest: Option<f64>,
    /// Mean vertical position over the bin (0 = bottom, 1 = surface)
    pub vertical_pos: Option<f64>,
}

impl TrackRecord {
    /// Value of the selected feature for this sample
    pub fn value(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::SpeedMm => self.speed_mm,
            Feature::Movement => self.movement,
            Feature::Rest => self.rest,
            Feature::VerticalPos => self.vertical_pos,
        }
    }
}

/// Average feature value per time-of-day bucket across all observed days.
///
/// Bucket count is dataset-global (86400 / bin width). Buckets with no
/// observations are `None` and stay `None` through downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyProfile {
    pub bins: Vec<Option<f64>>,
}

impl DailyProfile {
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Number of buckets holding an observed value
    pub fn present_count(&self) -> usize {
        self.bins.iter().filter(|b| b.is_some()).count()
    }
}

/// Diel activity pattern category.
///
/// The crepuscular flag is tracked separately on the classification rows; it is
/// set by the peak detector, not by the day/night comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DielPattern {
    Diurnal,
    Nocturnal,
    Undefined,
}

impl DielPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            DielPattern::Diurnal => "diurnal",
            DielPattern::Nocturnal => "nocturnal",
            DielPattern::Undefined => "undefined",
        }
    }
}

impl std::fmt::Display for DielPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-individual diel classification row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndividualDielPattern {
    pub fish_id: String,
    pub species: String,
    pub species_six: String,
    /// Day/night pattern from the statistical comparison
    pub pattern: DielPattern,
    /// Set from the crepuscular peak detector, independent of `pattern`
    pub crepuscular: bool,
    pub day_mean: f64,
    pub night_mean: f64,
    /// `day_mean - night_mean`
    pub day_night_dif: f64,
    /// `day_mean / night_mean`; `None` when the night mean is zero
    pub day_night_ratio: Option<f64>,
    /// Two-sided p-value of the day-vs-night test
    pub p_value: f64,
    pub n_day: usize,
    pub n_night: usize,
}

/// Per-species diel classification row (majority vote over individuals)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesDielPattern {
    pub species_six: String,
    pub species: String,
    /// Label carried by > 50% of individuals; `Undefined` when no strict majority
    pub pattern: DielPattern,
    pub n_individuals: usize,
    /// Mean of individual day/night differences
    pub day_night_dif: f64,
    /// Mean of individual day/night ratios, over individuals where defined
    pub day_night_ratio: Option<f64>,
    /// Fraction of individuals flagged crepuscular
    pub crepuscular_fraction: f64,
}

/// Dawn or dusk event window for peak detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TwilightWindow {
    Dawn,
    Dusk,
}

impl TwilightWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TwilightWindow::Dawn => "dawn",
            TwilightWindow::Dusk => "dusk",
        }
    }
}

/// A local activity maximum inside a twilight window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrepuscularPeak {
    /// Offset from the window start, seconds
    pub offset_sec: f64,
    pub magnitude: f64,
}

/// Per-fish peak summary for one twilight window, aggregated across days
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FishPeakSummary {
    pub fish_id: String,
    pub species: String,
    pub species_six: String,
    pub window: TwilightWindow,
    /// Days with at least one sample inside the window
    pub days_observed: usize,
    /// Days where a peak was detected
    pub days_with_peak: usize,
    /// Mean offset of the per-day highest peak, seconds from window start
    pub mean_offset_sec: Option<f64>,
    /// Mean magnitude of the per-day highest peak
    pub mean_magnitude: Option<f64>,
}

impl FishPeakSummary {
    /// Fraction of observed days where a peak was present
    pub fn peak_day_fraction(&self) -> f64 {
        if self.days_observed == 0 {
            return 0.0;
        }
        self.days_with_peak as f64 / self.days_observed as f64
    }
}

/// Per-species peak summary for one twilight window (means over member fish)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesPeakSummary {
    pub species_six: String,
    pub species: String,
    pub window: TwilightWindow,
    pub n_fish: usize,
    pub mean_offset_sec: Option<f64>,
    pub mean_magnitude: Option<f64>,
    /// Mean over fish of the fraction of days with a peak
    pub mean_peak_day_fraction: f64,
}

/// One row of the per-fish-per-day summary table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySummary {
    pub fish_id: String,
    /// Calendar-day index relative to the fish's first sample date
    pub day_index: i64,
    /// Mean of non-missing feature values that day; `None` when all missing
    pub mean: Option<f64>,
    /// Sample standard deviation; `None` with fewer than two observations
    pub std: Option<f64>,
    /// Samples recorded that day, missing values included
    pub n_samples: usize,
    /// True when the day holds fewer samples than a full day would
    pub partial: bool,
}
