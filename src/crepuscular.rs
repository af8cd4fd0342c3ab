//! Crepuscular peak detection
//!
//! Scans each fish's dawn and dusk clock windows for local activity maxima,
//! one window pass per calendar day, then aggregates peak timing and magnitude
//! across days per fish and across fish per species. Each event window spans
//! one twilight buffer either side of the twilight transition, so a 30-minute
//! dataset still has interior samples to test.

use std::collections::HashMap;

use chrono::Timelike;
use tracing::{debug, info};

use crate::aggregation::mean;
use crate::timing::TimingConfig;
use crate::types::{
    CrepuscularPeak, Feature, FishPeakSummary, SpeciesPeakSummary, TrackRecord, TwilightWindow,
};

/// Fraction of observed days that must carry a peak for a fish to be
/// flagged crepuscular
pub const CREPUSCULAR_DAY_FRACTION: f64 = 0.5;

/// Local maxima of `series`, in order: samples strictly greater than both
/// immediate neighbors, with prominence at or above `min_prominence`.
///
/// Series shorter than three samples have no interior points and return empty.
pub fn detect_peaks(series: &[f64], min_prominence: f64) -> Vec<(usize, f64)> {
    let n = series.len();
    if n < 3 {
        return Vec::new();
    }

    let mut peaks = Vec::new();
    for i in 1..(n - 1) {
        if series[i] > series[i - 1]
            && series[i] > series[i + 1]
            && prominence(series, i) >= min_prominence
        {
            peaks.push((i, series[i]));
        }
    }
    peaks
}

/// Height of a peak above the higher of the two valleys separating it from
/// neighbouring terrain of at least its own height
fn prominence(series: &[f64], peak_idx: usize) -> f64 {
    let peak_val = series[peak_idx];

    let mut left_min = peak_val;
    for &v in series[..peak_idx].iter().rev() {
        if v >= peak_val {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = peak_val;
    for &v in &series[peak_idx + 1..] {
        if v >= peak_val {
            break;
        }
        right_min = right_min.min(v);
    }

    peak_val - left_min.max(right_min)
}

/// Clock range of a twilight event window, seconds from midnight:
/// the twilight transition padded by one buffer on each side
fn window_range(timing: &TimingConfig, window: TwilightWindow) -> (u32, u32) {
    let buffer = timing.twilight_buffer_sec;
    match window {
        TwilightWindow::Dawn => (
            timing.dawn_start.num_seconds_from_midnight() - buffer,
            timing.day_start.num_seconds_from_midnight() + buffer,
        ),
        TwilightWindow::Dusk => (
            timing.dusk_start.num_seconds_from_midnight() - buffer,
            timing.night_start.num_seconds_from_midnight() + buffer,
        ),
    }
}

/// Per-day peaks inside one twilight window for a single fish.
///
/// Each day contributes at most its highest peak; days whose window series is
/// shorter than three samples contribute nothing, degenerately but not as an
/// error.
fn fish_day_peaks(
    records: &[&TrackRecord],
    feature: Feature,
    timing: &TimingConfig,
    window: TwilightWindow,
    min_prominence: f64,
) -> (usize, Vec<CrepuscularPeak>) {
    let (start_sec, end_sec) = window_range(timing, window);
    let first_ts = match records.first() {
        Some(r) => r.ts,
        None => return (0, Vec::new()),
    };

    // Group in-window samples by calendar day, keeping time order.
    let mut by_day: HashMap<i64, Vec<(u32, f64)>> = HashMap::new();
    let mut days_observed: Vec<i64> = Vec::new();
    for record in records {
        let tod = record.ts.time().num_seconds_from_midnight();
        if tod < start_sec || tod >= end_sec {
            continue;
        }
        let day = timing.day_index(record.ts, first_ts);
        if !days_observed.contains(&day) {
            days_observed.push(day);
        }
        if let Some(value) = record.value(feature) {
            by_day.entry(day).or_default().push((tod - start_sec, value));
        }
    }

    let mut days: Vec<i64> = by_day.keys().copied().collect();
    days.sort_unstable();

    let mut peaks = Vec::new();
    for day in days {
        let samples = &by_day[&day];
        let series: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();
        let best = detect_peaks(&series, min_prominence)
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        if let Some((idx, magnitude)) = best {
            peaks.push(CrepuscularPeak {
                offset_sec: samples[idx].0 as f64,
                magnitude,
            });
        }
    }

    (days_observed.len(), peaks)
}

/// Summarize one twilight window for every fish in the table
pub fn fish_peak_summaries(
    records: &[TrackRecord],
    feature: Feature,
    timing: &TimingConfig,
    window: TwilightWindow,
    min_prominence: f64,
) -> Vec<FishPeakSummary> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_fish: HashMap<&str, Vec<&TrackRecord>> = HashMap::new();
    for record in records {
        if !by_fish.contains_key(record.fish_id.as_str()) {
            order.push(&record.fish_id);
        }
        by_fish.entry(&record.fish_id).or_default().push(record);
    }

    let summaries: Vec<FishPeakSummary> = order
        .into_iter()
        .map(|fish_id| {
            let fish_records = &by_fish[fish_id];
            let (days_observed, peaks) =
                fish_day_peaks(fish_records, feature, timing, window, min_prominence);
            let offsets: Vec<f64> = peaks.iter().map(|p| p.offset_sec).collect();
            let magnitudes: Vec<f64> = peaks.iter().map(|p| p.magnitude).collect();

            debug!(
                fish_id,
                window = window.as_str(),
                days_observed,
                days_with_peak = peaks.len(),
                "summarized twilight peaks"
            );

            FishPeakSummary {
                fish_id: fish_id.to_string(),
                species: fish_records[0].species.clone(),
                species_six: fish_records[0].species_six.clone(),
                window,
                days_observed,
                days_with_peak: peaks.len(),
                mean_offset_sec: mean(&offsets),
                mean_magnitude: mean(&magnitudes),
            }
        })
        .collect();

    info!(
        fish = summaries.len(),
        window = window.as_str(),
        "computed twilight peak summaries"
    );
    summaries
}

/// Aggregate per-fish window summaries to species level
pub fn species_peak_summaries(fish_summaries: &[FishPeakSummary]) -> Vec<SpeciesPeakSummary> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_species: HashMap<&str, Vec<&FishPeakSummary>> = HashMap::new();
    for summary in fish_summaries {
        if !by_species.contains_key(summary.species_six.as_str()) {
            order.push(&summary.species_six);
        }
        by_species
            .entry(&summary.species_six)
            .or_default()
            .push(summary);
    }

    order
        .into_iter()
        .map(|species_six| {
            let members = &by_species[species_six];
            let offsets: Vec<f64> = members.iter().filter_map(|m| m.mean_offset_sec).collect();
            let magnitudes: Vec<f64> =
                members.iter().filter_map(|m| m.mean_magnitude).collect();
            let fractions: Vec<f64> = members.iter().map(|m| m.peak_day_fraction()).collect();

            SpeciesPeakSummary {
                species_six: species_six.to_string(),
                species: members[0].species.clone(),
                window: members[0].window,
                n_fish: members.len(),
                mean_offset_sec: mean(&offsets),
                mean_magnitude: mean(&magnitudes),
                mean_peak_day_fraction: mean(&fractions).unwrap_or_default(),
            }
        })
        .collect()
}

/// Whether a fish counts as crepuscular: peaks on more than
/// [`CREPUSCULAR_DAY_FRACTION`] of observed days in either window
pub fn is_crepuscular(dawn: &FishPeakSummary, dusk: &FishPeakSummary) -> bool {
    dawn.peak_day_fraction() > CREPUSCULAR_DAY_FRACTION
        || dusk.peak_day_fraction() > CREPUSCULAR_DAY_FRACTION
}
