//! Daily/weekly aggregation
//!
//! Resamples per-fish tracking series into "typical day" profiles (mean over
//! time-of-day across all recorded days) and per-fish per-day summary rows.
//! Aggregation is order-independent over input rows; empty buckets stay
//! missing rather than being zero-filled.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::timing::TimingConfig;
use crate::types::{DailyProfile, DaySummary, Feature, TrackRecord};

/// Average the feature by time-of-day bucket across all days present.
///
/// Buckets never observed come back as `None`.
pub fn daily_profile(
    records: &[TrackRecord],
    feature: Feature,
    timing: &TimingConfig,
) -> DailyProfile {
    profile_of(records.iter(), feature, timing)
}

fn profile_of<'a>(
    records: impl Iterator<Item = &'a TrackRecord>,
    feature: Feature,
    timing: &TimingConfig,
) -> DailyProfile {
    let bins = timing.bins_per_day();
    let mut sums = vec![0.0_f64; bins];
    let mut counts = vec![0_usize; bins];

    for record in records {
        if let Some(value) = record.value(feature) {
            let bin = timing.bin_of(record.ts);
            sums[bin] += value;
            counts[bin] += 1;
        }
    }

    DailyProfile {
        bins: sums
            .iter()
            .zip(&counts)
            .map(|(sum, &count)| (count > 0).then(|| sum / count as f64))
            .collect(),
    }
}

/// One summary row per fish per calendar day.
///
/// Day indices come from the timing calendar relative to each fish's first
/// sample date, so they are consistent for recordings that start mid-day.
/// Short first/last days are included and flagged `partial`.
pub fn daily_summary(
    records: &[TrackRecord],
    feature: Feature,
    timing: &TimingConfig,
) -> Vec<DaySummary> {
    // First timestamp per fish; per-fish timestamps are increasing, so the
    // first row encountered is the earliest.
    let mut first_ts: HashMap<&str, DateTime<Utc>> = HashMap::new();
    for record in records {
        first_ts.entry(&record.fish_id).or_insert(record.ts);
    }

    let mut groups: HashMap<(&str, i64), (Vec<f64>, usize)> = HashMap::new();
    let mut fish_order: Vec<&str> = Vec::new();
    for record in records {
        let day = timing.day_index(record.ts, first_ts[record.fish_id.as_str()]);
        let entry = groups
            .entry((record.fish_id.as_str(), day))
            .or_insert_with(|| (Vec::new(), 0));
        if let Some(value) = record.value(feature) {
            entry.0.push(value);
        }
        entry.1 += 1;
        if !fish_order.contains(&record.fish_id.as_str()) {
            fish_order.push(&record.fish_id);
        }
    }

    let bins_per_day = timing.bins_per_day();
    let mut rows = Vec::with_capacity(groups.len());
    for fish_id in fish_order {
        let mut days: Vec<i64> = groups
            .keys()
            .filter(|(f, _)| *f == fish_id)
            .map(|(_, d)| *d)
            .collect();
        days.sort_unstable();
        for day in days {
            let (values, n_samples) = &groups[&(fish_id, day)];
            rows.push(DaySummary {
                fish_id: fish_id.to_string(),
                day_index: day,
                mean: mean(values),
                std: sample_std(values),
                n_samples: *n_samples,
                partial: *n_samples < bins_per_day,
            });
        }
    }

    debug!(rows = rows.len(), feature = feature.as_str(), "daily summary");
    rows
}

/// Per-fish daily profiles, preserving first-seen fish order
pub fn fish_daily_profiles(
    records: &[TrackRecord],
    feature: Feature,
    timing: &TimingConfig,
) -> Vec<(String, DailyProfile)> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_fish: HashMap<&str, Vec<&TrackRecord>> = HashMap::new();
    for record in records {
        if !by_fish.contains_key(record.fish_id.as_str()) {
            order.push(&record.fish_id);
        }
        by_fish.entry(&record.fish_id).or_default().push(record);
    }

    order
        .into_iter()
        .map(|fish_id| {
            let profile = profile_of(by_fish[fish_id].iter().copied(), feature, timing);
            (fish_id.to_string(), profile)
        })
        .collect()
}

/// Daily profiles of each fish of one species
pub fn species_fish_daily_profiles(
    records: &[TrackRecord],
    species_six: &str,
    feature: Feature,
    timing: &TimingConfig,
) -> Vec<(String, DailyProfile)> {
    let subset: Vec<TrackRecord> = records
        .iter()
        .filter(|r| r.species_six == species_six)
        .cloned()
        .collect();
    fish_daily_profiles(&subset, feature, timing)
}

/// Species-level profile: per-bucket mean over member-fish profiles,
/// skipping fish that are missing that bucket
pub fn species_daily_profile(fish_profiles: &[(String, DailyProfile)]) -> DailyProfile {
    let bins = fish_profiles
        .first()
        .map(|(_, p)| p.len())
        .unwrap_or_default();

    let mut averaged = Vec::with_capacity(bins);
    for bin in 0..bins {
        let values: Vec<f64> = fish_profiles
            .iter()
            .filter_map(|(_, profile)| profile.bins[bin])
            .collect();
        averaged.push(mean(&values));
    }
    DailyProfile { bins: averaged }
}

/// Mean of a slice; `None` when empty
pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n-1); `None` with fewer than two values
pub(crate) fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn timing() -> TimingConfig {
        TimingConfig::standard_tanganyikan(1800, 48 * 2).unwrap()
    }

    fn record(fish: &str, ts: DateTime<Utc>, speed: Option<f64>) -> TrackRecord {
        TrackRecord {
            fish_id: fish.to_string(),
            species: "Neolamprologus pulcher".into(),
            species_six: "Neopul".into(),
            tribe: None,
            ts,
            speed_mm: speed,
            movement: None,
            rest: None,
            vertical_pos: None,
        }
    }

    /// Two full days of samples with a fixed value per day
    fn two_days(fish: &str, day1: f64, day2: f64) -> Vec<TrackRecord> {
        let start = Utc.with_ymd_and_hms(2021, 5, 10, 0, 0, 0).unwrap();
        let mut records = Vec::new();
        for day in 0..2 {
            let value = if day == 0 { day1 } else { day2 };
            for bin in 0..48 {
                let ts = start + Duration::days(day) + Duration::minutes(30 * bin);
                records.push(record(fish, ts, Some(value)));
            }
        }
        records
    }

    #[test]
    fn test_daily_profile_averages_across_days() {
        let records = two_days("FISH1", 10.0, 20.0);
        let profile = daily_profile(&records, Feature::SpeedMm, &timing());
        assert_eq!(profile.len(), 48);
        for bin in &profile.bins {
            assert_eq!(*bin, Some(15.0));
        }
    }

    #[test]
    fn test_daily_profile_order_independent() {
        let records = two_days("FISH1", 10.0, 20.0);
        let mut reversed = records.clone();
        reversed.reverse();
        let timing = timing();
        assert_eq!(
            daily_profile(&records, Feature::SpeedMm, &timing),
            daily_profile(&reversed, Feature::SpeedMm, &timing)
        );
    }

    #[test]
    fn test_daily_profile_duplication_changes_mean() {
        let records = two_days("FISH1", 10.0, 20.0);
        let timing = timing();
        let base = daily_profile(&records, Feature::SpeedMm, &timing);

        // Duplicate day one's rows: the per-bucket mean must shift toward 10.
        let mut duplicated = records.clone();
        duplicated.extend(records.iter().take(48).cloned());
        let skewed = daily_profile(&duplicated, Feature::SpeedMm, &timing);

        assert_eq!(base.bins[0], Some(15.0));
        assert!((skewed.bins[0].unwrap() - 40.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_buckets_are_missing() {
        // Samples only in the first two bins of one day.
        let start = Utc.with_ymd_and_hms(2021, 5, 10, 0, 0, 0).unwrap();
        let records = vec![
            record("FISH1", start, Some(5.0)),
            record("FISH1", start + Duration::minutes(30), None),
        ];
        let profile = daily_profile(&records, Feature::SpeedMm, &timing());
        assert_eq!(profile.bins[0], Some(5.0));
        // A row with a missing value does not create an observation.
        assert_eq!(profile.bins[1], None);
        assert_eq!(profile.present_count(), 1);
    }

    #[test]
    fn test_daily_summary_flags_partial_days() {
        // Recording starts at 16:30: day 0 has 15 bins, day 1 is full.
        let start = Utc.with_ymd_and_hms(2021, 5, 10, 16, 30, 0).unwrap();
        let mut records = Vec::new();
        for bin in 0..(15 + 48) {
            let ts = start + Duration::minutes(30 * bin);
            records.push(record("FISH1", ts, Some(1.0)));
        }

        let rows = daily_summary(&records, Feature::SpeedMm, &timing());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].day_index, 0);
        assert_eq!(rows[0].n_samples, 15);
        assert!(rows[0].partial);
        assert_eq!(rows[1].n_samples, 48);
        assert!(!rows[1].partial);
    }

    #[test]
    fn test_daily_summary_stats() {
        let start = Utc.with_ymd_and_hms(2021, 5, 10, 8, 0, 0).unwrap();
        let records = vec![
            record("FISH1", start, Some(2.0)),
            record("FISH1", start + Duration::minutes(30), Some(4.0)),
            record("FISH1", start + Duration::minutes(60), None),
        ];
        let rows = daily_summary(&records, Feature::SpeedMm, &timing());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mean, Some(3.0));
        assert!((rows[0].std.unwrap() - std::f64::consts::SQRT_2).abs() < 1e-12);
        assert_eq!(rows[0].n_samples, 3);
    }

    #[test]
    fn test_species_daily_profile_skips_missing() {
        let profiles = vec![
            (
                "FISH1".to_string(),
                DailyProfile {
                    bins: vec![Some(10.0), None],
                },
            ),
            (
                "FISH2".to_string(),
                DailyProfile {
                    bins: vec![Some(20.0), Some(6.0)],
                },
            ),
        ];
        let species = species_daily_profile(&profiles);
        assert_eq!(species.bins[0], Some(15.0));
        // Bucket 1 averages over the single present fish.
        assert_eq!(species.bins[1], Some(6.0));
    }

    #[test]
    fn test_species_fish_daily_profiles_filters() {
        let mut records = two_days("FISH1", 10.0, 20.0);
        let mut other = two_days("FISH2", 1.0, 1.0);
        for r in &mut other {
            r.species_six = "Altcal".into();
        }
        records.extend(other);

        let timing = timing();
        let profiles =
            species_fish_daily_profiles(&records, "Neopul", Feature::SpeedMm, &timing);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].0, "FISH1");
    }
}
