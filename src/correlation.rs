//! Self-correlation diagnostics
//!
//! Pairwise correlation matrices over daily profiles: day-vs-day for one fish,
//! fish-vs-fish within a species, or fish-vs-fish over the full aligned
//! recording series. Used as a pattern-consistency diagnostic
//! and as clustering input. Missing buckets are excluded pairwise-complete,
//! never treated as zero.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::timing::TimingConfig;
use crate::types::{DailyProfile, Feature, TrackRecord};

/// Minimum complete pairs for a correlation coefficient to be reported
const MIN_COMPLETE_PAIRS: usize = 3;

/// Correlation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    Pearson,
    /// Pearson over average ranks; robust to monotone nonlinearity
    Spearman,
}

/// Square symmetric correlation matrix indexed by entity label.
///
/// Entries are `None` when too few complete pairs exist or a profile has zero
/// variance over the complete pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub labels: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.values[i][j]
    }
}

/// Pairwise correlation over labeled profiles
pub fn correlate(
    profiles: &[(String, DailyProfile)],
    method: CorrelationMethod,
) -> CorrelationMatrix {
    let n = profiles.len();
    let mut values = vec![vec![None; n]; n];

    for i in 0..n {
        values[i][i] = Some(1.0);
        for j in (i + 1)..n {
            let r = pair_correlation(&profiles[i].1, &profiles[j].1, method);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    debug!(entities = n, ?method, "computed correlation matrix");
    CorrelationMatrix {
        labels: profiles.iter().map(|(label, _)| label.clone()).collect(),
        values,
    }
}

/// Day-vs-day correlation of one fish's per-day profiles
pub fn fish_daily_corr(
    records: &[TrackRecord],
    fish_id: &str,
    feature: Feature,
    timing: &TimingConfig,
) -> CorrelationMatrix {
    let fish_records: Vec<&TrackRecord> = records
        .iter()
        .filter(|r| r.fish_id == fish_id)
        .collect();
    let first_ts = match fish_records.first() {
        Some(r) => r.ts,
        None => {
            return CorrelationMatrix {
                labels: Vec::new(),
                values: Vec::new(),
            }
        }
    };

    let profiles = day_profiles(&fish_records, first_ts, feature, timing);
    correlate(&profiles, CorrelationMethod::Pearson)
}

/// Fish-vs-fish correlation of daily profiles within one species
pub fn species_fish_corr(
    records: &[TrackRecord],
    species_six: &str,
    feature: Feature,
    timing: &TimingConfig,
    method: CorrelationMethod,
) -> CorrelationMatrix {
    let profiles =
        crate::aggregation::species_fish_daily_profiles(records, species_six, feature, timing);
    correlate(&profiles, method)
}

/// Fish-vs-fish correlation over each fish's full recording series.
///
/// Series are aligned on (day index, time-of-day bucket) relative to the
/// earliest sample in the table, so fish recorded over the same week line up
/// bucket for bucket; buckets a fish never sampled stay missing and drop out
/// pairwise.
pub fn fish_weekly_corr(
    records: &[TrackRecord],
    feature: Feature,
    timing: &TimingConfig,
    method: CorrelationMethod,
) -> CorrelationMatrix {
    let first_ts = match records.iter().map(|r| r.ts).min() {
        Some(ts) => ts,
        None => {
            return CorrelationMatrix {
                labels: Vec::new(),
                values: Vec::new(),
            }
        }
    };
    let bins = timing.bins_per_day();
    let span_days = records
        .iter()
        .map(|r| timing.day_index(r.ts, first_ts))
        .max()
        .unwrap_or(0) as usize
        + 1;

    let mut order: Vec<String> = Vec::new();
    let mut series: HashMap<&str, Vec<Option<f64>>> = HashMap::new();
    for record in records {
        if !series.contains_key(record.fish_id.as_str()) {
            order.push(record.fish_id.clone());
        }
        let row = series
            .entry(record.fish_id.as_str())
            .or_insert_with(|| vec![None; span_days * bins]);
        let day = timing.day_index(record.ts, first_ts) as usize;
        row[day * bins + timing.bin_of(record.ts)] = record.value(feature);
    }

    let profiles: Vec<(String, DailyProfile)> = order
        .into_iter()
        .map(|fish_id| {
            let bins = series[fish_id.as_str()].clone();
            (fish_id, DailyProfile { bins })
        })
        .collect();
    correlate(&profiles, method)
}

/// One time-of-day profile per calendar day of a single fish's records
fn day_profiles(
    records: &[&TrackRecord],
    first_ts: DateTime<Utc>,
    feature: Feature,
    timing: &TimingConfig,
) -> Vec<(String, DailyProfile)> {
    let bins = timing.bins_per_day();
    let mut by_day: HashMap<i64, Vec<Option<f64>>> = HashMap::new();
    for record in records {
        let day = timing.day_index(record.ts, first_ts);
        let profile = by_day.entry(day).or_insert_with(|| vec![None; bins]);
        profile[timing.bin_of(record.ts)] = record.value(feature);
    }

    let mut days: Vec<i64> = by_day.keys().copied().collect();
    days.sort_unstable();
    days.into_iter()
        .map(|day| {
            (
                format!("day_{day}"),
                DailyProfile {
                    bins: by_day[&day].clone(),
                },
            )
        })
        .collect()
}

fn pair_correlation(
    a: &DailyProfile,
    b: &DailyProfile,
    method: CorrelationMethod,
) -> Option<f64> {
    // Pairwise-complete observations: only buckets present in both profiles.
    let (x, y): (Vec<f64>, Vec<f64>) = a
        .bins
        .iter()
        .zip(&b.bins)
        .filter_map(|(av, bv)| av.zip(*bv))
        .unzip();

    if x.len() < MIN_COMPLETE_PAIRS {
        return None;
    }

    match method {
        CorrelationMethod::Pearson => pearson(&x, &y),
        CorrelationMethod::Spearman => pearson(&ranks(&x), &ranks(&y)),
    }
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        cov += (xi - mx) * (yi - my);
        vx += (xi - mx).powi(2);
        vy += (yi - my).powi(2);
    }

    let denominator = (vx * vy).sqrt();
    if denominator == 0.0 {
        return None;
    }
    Some((cov / denominator).clamp(-1.0, 1.0))
}

/// Average ranks, ties shared
fn ranks(values: &[f64]) -> Vec<f64> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut out = vec![0.0; values.len()];
    let mut i = 0;
    while i < idx.len() {
        let mut j = i;
        while j + 1 < idx.len() && values[idx[j + 1]] == values[idx[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &idx[i..=j] {
            out[k] = avg_rank;
        }
        i = j + 1;
    }
    out
}
