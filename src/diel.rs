//! Diel pattern classification
//!
//! Compares each individual's day-phase and night-phase feature values with a
//! two-sample test and assigns diurnal/nocturnal/undefined labels; species
//! labels are a strict majority vote over individuals. Twilight samples are
//! excluded from both sets.
//!
//! The exact test is configuration: Welch's t-test is the conventional choice,
//! Mann-Whitney is available for strongly non-normal features.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use tracing::{debug, info};

use crate::aggregation::mean;
use crate::error::AnalysisError;
use crate::timing::TimingConfig;
use crate::types::{
    DayPhase, DielPattern, Feature, IndividualDielPattern, SpeciesDielPattern, TrackRecord,
};

/// Conventional significance threshold for the day/night comparison
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Minimum non-missing observations per phase for the test to be meaningful
pub const MIN_PHASE_SAMPLES: usize = 3;

/// Two-sample test used for the day/night comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DielTest {
    /// Welch's unequal-variance t-test
    Welch,
    /// Mann-Whitney U with normal approximation and tie correction
    MannWhitney,
}

/// Classify one fish from its day-phase vs night-phase feature values.
///
/// `records` must belong to a single fish. The returned row has
/// `crepuscular = false`; the pipeline sets the flag from the peak detector.
pub fn classify_individual(
    records: &[TrackRecord],
    feature: Feature,
    timing: &TimingConfig,
    test: DielTest,
    alpha: f64,
) -> Result<IndividualDielPattern, AnalysisError> {
    let first = records.first().ok_or_else(|| {
        AnalysisError::DataShape("cannot classify a fish with zero samples".to_string())
    })?;
    let fish_id = first.fish_id.clone();

    let mut day_rows = 0_usize;
    let mut night_rows = 0_usize;
    let mut day_values = Vec::new();
    let mut night_values = Vec::new();
    for record in records {
        match timing.phase_of(record.ts) {
            DayPhase::Day => {
                day_rows += 1;
                if let Some(v) = record.value(feature) {
                    day_values.push(v);
                }
            }
            DayPhase::Night => {
                night_rows += 1;
                if let Some(v) = record.value(feature) {
                    night_values.push(v);
                }
            }
            _ => {}
        }
    }

    if day_rows == 0 || night_rows == 0 {
        return Err(AnalysisError::DataShape(format!(
            "fish {fish_id} has no samples in the {} phase",
            if day_rows == 0 { "day" } else { "night" }
        )));
    }
    if day_values.len() < MIN_PHASE_SAMPLES || night_values.len() < MIN_PHASE_SAMPLES {
        return Err(AnalysisError::InsufficientData(format!(
            "fish {fish_id}: {} day / {} night observations, need {MIN_PHASE_SAMPLES} in each phase",
            day_values.len(),
            night_values.len()
        )));
    }

    let p_value = match test {
        DielTest::Welch => welch_t_test(&day_values, &night_values),
        DielTest::MannWhitney => mann_whitney_u(&day_values, &night_values),
    };

    let day_mean = mean(&day_values).unwrap_or_default();
    let night_mean = mean(&night_values).unwrap_or_default();
    let pattern = if p_value < alpha {
        if day_mean > night_mean {
            DielPattern::Diurnal
        } else {
            DielPattern::Nocturnal
        }
    } else {
        DielPattern::Undefined
    };

    debug!(
        fish_id,
        pattern = pattern.as_str(),
        p_value,
        day_mean,
        night_mean,
        "classified individual"
    );

    Ok(IndividualDielPattern {
        fish_id,
        species: first.species.clone(),
        species_six: first.species_six.clone(),
        pattern,
        crepuscular: false,
        day_mean,
        night_mean,
        day_night_dif: day_mean - night_mean,
        day_night_ratio: (night_mean > 0.0).then(|| day_mean / night_mean),
        p_value,
        n_day: day_values.len(),
        n_night: night_values.len(),
    })
}

/// Classify every fish in the table, preserving first-seen fish order
pub fn classify_all(
    records: &[TrackRecord],
    feature: Feature,
    timing: &TimingConfig,
    test: DielTest,
    alpha: f64,
) -> Result<Vec<IndividualDielPattern>, AnalysisError> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_fish: HashMap<&str, Vec<TrackRecord>> = HashMap::new();
    for record in records {
        if !by_fish.contains_key(record.fish_id.as_str()) {
            order.push(&record.fish_id);
        }
        by_fish
            .entry(&record.fish_id)
            .or_default()
            .push(record.clone());
    }

    let patterns = order
        .into_iter()
        .map(|fish_id| classify_individual(&by_fish[fish_id], feature, timing, test, alpha))
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        individuals = patterns.len(),
        feature = feature.as_str(),
        "classified individuals"
    );
    Ok(patterns)
}

/// Majority vote per species: the label held by more than half of a species'
/// individuals wins; ties or no strict majority yield `Undefined`.
pub fn classify_species(individuals: &[IndividualDielPattern]) -> Vec<SpeciesDielPattern> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_species: HashMap<&str, Vec<&IndividualDielPattern>> = HashMap::new();
    for row in individuals {
        if !by_species.contains_key(row.species_six.as_str()) {
            order.push(&row.species_six);
        }
        by_species.entry(&row.species_six).or_default().push(row);
    }

    order
        .into_iter()
        .map(|species_six| {
            let members = &by_species[species_six];
            let n = members.len();

            let mut pattern = DielPattern::Undefined;
            for candidate in [DielPattern::Diurnal, DielPattern::Nocturnal] {
                let votes = members.iter().filter(|m| m.pattern == candidate).count();
                if votes as f64 / n as f64 > 0.5 {
                    pattern = candidate;
                }
            }

            let difs: Vec<f64> = members.iter().map(|m| m.day_night_dif).collect();
            let ratios: Vec<f64> = members.iter().filter_map(|m| m.day_night_ratio).collect();
            let crepuscular = members.iter().filter(|m| m.crepuscular).count();

            SpeciesDielPattern {
                species_six: species_six.to_string(),
                species: members[0].species.clone(),
                pattern,
                n_individuals: n,
                day_night_dif: mean(&difs).unwrap_or_default(),
                day_night_ratio: mean(&ratios),
                crepuscular_fraction: crepuscular as f64 / n as f64,
            }
        })
        .collect()
}

/// Two-sided Welch's t-test p-value for a difference in means
pub fn welch_t_test(a: &[f64], b: &[f64]) -> f64 {
    let n1 = a.len() as f64;
    let n2 = b.len() as f64;
    let m1 = a.iter().sum::<f64>() / n1;
    let m2 = b.iter().sum::<f64>() / n2;
    let v1 = a.iter().map(|x| (x - m1).powi(2)).sum::<f64>() / (n1 - 1.0);
    let v2 = b.iter().map(|x| (x - m2).powi(2)).sum::<f64>() / (n2 - 1.0);

    let se_sq = v1 / n1 + v2 / n2;
    if se_sq == 0.0 {
        // Both samples constant: identical means are indistinguishable,
        // different means are trivially separated.
        return if m1 == m2 { 1.0 } else { 0.0 };
    }

    let t = (m1 - m2) / se_sq.sqrt();
    // Welch-Satterthwaite degrees of freedom
    let df = se_sq.powi(2)
        / ((v1 / n1).powi(2) / (n1 - 1.0) + (v2 / n2).powi(2) / (n2 - 1.0));

    let Ok(dist) = StudentsT::new(0.0, 1.0, df) else {
        return 1.0;
    };
    2.0 * (1.0 - dist.cdf(t.abs()))
}

/// Two-sided Mann-Whitney U p-value (normal approximation, tie-corrected,
/// with continuity correction)
pub fn mann_whitney_u(a: &[f64], b: &[f64]) -> f64 {
    let n1 = a.len() as f64;
    let n2 = b.len() as f64;
    let n = n1 + n2;

    let mut combined: Vec<(f64, bool)> = a
        .iter()
        .map(|&v| (v, true))
        .chain(b.iter().map(|&v| (v, false)))
        .collect();
    combined.sort_by(|x, y| x.0.partial_cmp(&y.0).unwrap_or(std::cmp::Ordering::Equal));

    // Average ranks within tie groups, accumulating the tie correction term.
    let mut ranks = vec![0.0_f64; combined.len()];
    let mut tie_term = 0.0_f64;
    let mut i = 0;
    while i < combined.len() {
        let mut j = i;
        while j + 1 < combined.len() && combined[j + 1].0 == combined[i].0 {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for rank in ranks.iter_mut().take(j + 1).skip(i) {
            *rank = avg_rank;
        }
        let t = (j - i + 1) as f64;
        tie_term += t.powi(3) - t;
        i = j + 1;
    }

    let r1: f64 = combined
        .iter()
        .zip(&ranks)
        .filter(|((_, is_a), _)| *is_a)
        .map(|(_, rank)| rank)
        .sum();
    let u1 = r1 - n1 * (n1 + 1.0) / 2.0;

    let mu = n1 * n2 / 2.0;
    let sigma_sq = n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if sigma_sq <= 0.0 {
        return 1.0;
    }

    let z = (u1 - mu).abs() - 0.5;
    let z = z.max(0.0) / sigma_sq.sqrt();
    let Ok(normal) = Normal::new(0.0, 1.0) else {
        return 1.0;
    };
    2.0 * (1.0 - normal.cdf(z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn timing() -> TimingConfig {
        TimingConfig::standard_tanganyikan(1800, 48 * 3).unwrap()
    }

    /// Deterministic series: day-phase bins around `day_level`, night-phase
    /// bins around `night_level`, both with the same small spread.
    fn synthetic_fish(fish_id: &str, day_level: f64, night_level: f64) -> Vec<TrackRecord> {
        let start = Utc.with_ymd_and_hms(2021, 5, 10, 0, 0, 0).unwrap();
        let mut records = Vec::new();
        for day in 0..3 {
            for bin in 0..48 {
                let ts = start + Duration::days(day) + Duration::minutes(30 * bin);
                let jitter = 0.2 * ((bin % 5) as f64 - 2.0);
                let value = match timing().phase_of(ts) {
                    DayPhase::Day => Some(day_level + jitter),
                    DayPhase::Night => Some(night_level + jitter),
                    _ => Some((day_level + night_level) / 2.0),
                };
                records.push(TrackRecord {
                    fish_id: fish_id.to_string(),
                    species: "Neolamprologus pulcher".into(),
                    species_six: "Neopul".into(),
                    tribe: None,
                    ts,
                    speed_mm: value,
                    movement: None,
                    rest: None,
                    vertical_pos: None,
                });
            }
        }
        records
    }

    fn pattern_row(species_six: &str, pattern: DielPattern) -> IndividualDielPattern {
        IndividualDielPattern {
            fish_id: format!("fish-{}", uuid::Uuid::new_v4()),
            species: species_six.to_string(),
            species_six: species_six.to_string(),
            pattern,
            crepuscular: false,
            day_mean: 1.0,
            night_mean: 0.5,
            day_night_dif: 0.5,
            day_night_ratio: Some(2.0),
            p_value: 0.01,
            n_day: 10,
            n_night: 10,
        }
    }

    #[test]
    fn test_day_active_fish_is_diurnal() {
        let records = synthetic_fish("FISH1", 10.0, 1.0);
        let row =
            classify_individual(&records, Feature::SpeedMm, &timing(), DielTest::Welch, 0.05)
                .unwrap();
        assert_eq!(row.pattern, DielPattern::Diurnal);
        assert!(row.day_night_dif > 0.0);
        assert!(row.p_value < 0.05);
    }

    #[test]
    fn test_night_active_fish_is_nocturnal() {
        let records = synthetic_fish("FISH1", 1.0, 10.0);
        let row =
            classify_individual(&records, Feature::SpeedMm, &timing(), DielTest::Welch, 0.05)
                .unwrap();
        assert_eq!(row.pattern, DielPattern::Nocturnal);
    }

    #[test]
    fn test_no_difference_is_undefined() {
        let records = synthetic_fish("FISH1", 5.0, 5.0);
        let row =
            classify_individual(&records, Feature::SpeedMm, &timing(), DielTest::Welch, 0.05)
                .unwrap();
        assert_eq!(row.pattern, DielPattern::Undefined);
    }

    #[test]
    fn test_mann_whitney_agrees_on_clear_separation() {
        let records = synthetic_fish("FISH1", 10.0, 1.0);
        let row = classify_individual(
            &records,
            Feature::SpeedMm,
            &timing(),
            DielTest::MannWhitney,
            0.05,
        )
        .unwrap();
        assert_eq!(row.pattern, DielPattern::Diurnal);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let records = synthetic_fish("FISH1", 10.0, 1.0);
        let timing = timing();
        let a = classify_individual(&records, Feature::SpeedMm, &timing, DielTest::Welch, 0.05)
            .unwrap();
        let b = classify_individual(&records, Feature::SpeedMm, &timing, DielTest::Welch, 0.05)
            .unwrap();
        assert_eq!(a.pattern, b.pattern);
        assert_eq!(a.p_value, b.p_value);
    }

    #[test]
    fn test_missing_phase_is_data_shape_error() {
        // Only day-phase samples.
        let records: Vec<TrackRecord> = synthetic_fish("FISH1", 5.0, 5.0)
            .into_iter()
            .filter(|r| timing().phase_of(r.ts) == DayPhase::Day)
            .collect();
        let result =
            classify_individual(&records, Feature::SpeedMm, &timing(), DielTest::Welch, 0.05);
        assert!(matches!(result, Err(AnalysisError::DataShape(_))));
    }

    #[test]
    fn test_too_few_observations_is_insufficient_data() {
        // Night values present as rows but mostly missing.
        let mut records = synthetic_fish("FISH1", 5.0, 5.0);
        let mut kept_night = 0;
        for r in records.iter_mut() {
            if timing().phase_of(r.ts) == DayPhase::Night {
                kept_night += 1;
                if kept_night > 2 {
                    r.speed_mm = None;
                }
            }
        }
        let result =
            classify_individual(&records, Feature::SpeedMm, &timing(), DielTest::Welch, 0.05);
        assert!(matches!(result, Err(AnalysisError::InsufficientData(_))));
    }

    #[test]
    fn test_species_majority_vote() {
        let individuals = vec![
            pattern_row("Neopul", DielPattern::Diurnal),
            pattern_row("Neopul", DielPattern::Diurnal),
            pattern_row("Neopul", DielPattern::Diurnal),
            pattern_row("Neopul", DielPattern::Nocturnal),
        ];
        let species = classify_species(&individuals);
        assert_eq!(species.len(), 1);
        assert_eq!(species[0].pattern, DielPattern::Diurnal);
        assert_eq!(species[0].n_individuals, 4);
    }

    #[test]
    fn test_species_tie_is_undefined() {
        let individuals = vec![
            pattern_row("Neopul", DielPattern::Diurnal),
            pattern_row("Neopul", DielPattern::Diurnal),
            pattern_row("Neopul", DielPattern::Nocturnal),
            pattern_row("Neopul", DielPattern::Nocturnal),
        ];
        let species = classify_species(&individuals);
        assert_eq!(species[0].pattern, DielPattern::Undefined);
    }

    #[test]
    fn test_welch_p_values() {
        // Clearly separated samples.
        let a = [10.0, 10.5, 9.5, 10.2, 9.8, 10.1];
        let b = [1.0, 1.5, 0.5, 1.2, 0.8, 1.1];
        assert!(welch_t_test(&a, &b) < 0.001);

        // Identical samples.
        assert!((welch_t_test(&a, &a) - 1.0).abs() < 1e-9);

        // Constant but different samples.
        let c = [2.0, 2.0, 2.0];
        let d = [3.0, 3.0, 3.0];
        assert_eq!(welch_t_test(&c, &d), 0.0);
        assert_eq!(welch_t_test(&c, &c), 1.0);
    }

    #[test]
    fn test_mann_whitney_p_values() {
        let a = [10.0, 10.5, 9.5, 10.2, 9.8, 10.1, 10.4, 9.6];
        let b = [1.0, 1.5, 0.5, 1.2, 0.8, 1.1, 1.4, 0.6];
        assert!(mann_whitney_u(&a, &b) < 0.01);

        // All values tied: no evidence of a difference.
        let c = [2.0, 2.0, 2.0, 2.0];
        assert!(mann_whitney_u(&c, &c) > 0.9);
    }
}
