//! Timing calendar
//!
//! Maps clock time to diel phases and calendar-day indices. All tagging is done
//! on time-of-day modulo 24 h, so a recording that starts mid-afternoon is
//! tagged exactly like one starting at midnight.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::types::DayPhase;

/// Seconds in a 24 h period
pub const SECONDS_PER_DAY: u32 = 86_400;

/// Timing configuration for one recording batch.
///
/// The four transition clock-times and the twilight buffer are required
/// configuration; [`TimingConfig::standard_tanganyikan`] provides the
/// documented standard schedule (07:00 dawn start, 07:30 day start, 18:30 dusk
/// start, 19:00 night start, 30 min buffer) as a named constructor, not an
/// implicit default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Width of one sample bin, seconds (e.g. 1800 for 30 min downsampling)
    pub bin_seconds: u32,
    /// Samples recorded per fish over the whole recording
    pub samples_per_fish: usize,
    /// Start of dawn twilight
    pub dawn_start: NaiveTime,
    /// End of dawn twilight / start of full day
    pub day_start: NaiveTime,
    /// Start of dusk twilight
    pub dusk_start: NaiveTime,
    /// End of dusk twilight / start of night
    pub night_start: NaiveTime,
    /// Length of the predawn and postdusk windows either side of twilight, seconds
    pub twilight_buffer_sec: u32,
}

/// Duration of one diel phase per 24 h period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDuration {
    pub phase: DayPhase,
    pub seconds: u32,
    /// Whole sample bins covered by the phase
    pub samples: u32,
}

/// Absolute phase-boundary datetimes for one calendar day of the recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayBoundaries {
    pub date: NaiveDate,
    pub predawn_start: DateTime<Utc>,
    pub dawn_start: DateTime<Utc>,
    pub day_start: DateTime<Utc>,
    pub dusk_start: DateTime<Utc>,
    pub night_start: DateTime<Utc>,
    pub postdusk_end: DateTime<Utc>,
}

impl TimingConfig {
    /// Create a validated timing configuration.
    ///
    /// Fails with [`AnalysisError::Configuration`] when the four transition
    /// times are not in strictly increasing clock order, when the bin width
    /// does not divide a day evenly, or when a twilight buffer would wrap
    /// across midnight or overlap the day phase.
    pub fn new(
        bin_seconds: u32,
        samples_per_fish: usize,
        dawn_start: NaiveTime,
        day_start: NaiveTime,
        dusk_start: NaiveTime,
        night_start: NaiveTime,
        twilight_buffer_sec: u32,
    ) -> Result<Self, AnalysisError> {
        if bin_seconds == 0 || SECONDS_PER_DAY % bin_seconds != 0 {
            return Err(AnalysisError::Configuration(format!(
                "bin width {bin_seconds}s must evenly divide 86400s"
            )));
        }

        let transitions = [
            ("dawn_start", dawn_start),
            ("day_start", day_start),
            ("dusk_start", dusk_start),
            ("night_start", night_start),
        ];
        for pair in transitions.windows(2) {
            if pair[0].1 >= pair[1].1 {
                return Err(AnalysisError::Configuration(format!(
                    "{} ({}) must come before {} ({})",
                    pair[0].0, pair[0].1, pair[1].0, pair[1].1
                )));
            }
        }

        let buffer = twilight_buffer_sec;
        if buffer >= seconds_of(dawn_start) {
            return Err(AnalysisError::Configuration(format!(
                "twilight buffer of {buffer}s crosses midnight before dawn at {dawn_start}"
            )));
        }
        if seconds_of(night_start) + buffer >= SECONDS_PER_DAY {
            return Err(AnalysisError::Configuration(format!(
                "twilight buffer of {buffer}s crosses midnight after night start at {night_start}"
            )));
        }

        Ok(Self {
            bin_seconds,
            samples_per_fish,
            dawn_start,
            day_start,
            dusk_start,
            night_start,
            twilight_buffer_sec,
        })
    }

    /// Standard Lake Tanganyika light schedule: dawn 07:00, day 07:30,
    /// dusk 18:30, night 19:00, 30 minute predawn/postdusk windows.
    pub fn standard_tanganyikan(
        bin_seconds: u32,
        samples_per_fish: usize,
    ) -> Result<Self, AnalysisError> {
        Self::new(
            bin_seconds,
            samples_per_fish,
            NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            30 * 60,
        )
    }

    /// Number of time-of-day buckets in a full day
    pub fn bins_per_day(&self) -> usize {
        (SECONDS_PER_DAY / self.bin_seconds) as usize
    }

    /// Total recorded span per fish
    pub fn recording_span(&self) -> Duration {
        Duration::seconds(self.samples_per_fish as i64 * self.bin_seconds as i64)
    }

    /// Recorded span per fish, in (fractional) days
    pub fn recording_days(&self) -> f64 {
        (self.samples_per_fish as f64 * self.bin_seconds as f64) / SECONDS_PER_DAY as f64
    }

    /// Diel phase for an arbitrary timestamp, from time-of-day alone
    pub fn phase_of(&self, ts: DateTime<Utc>) -> DayPhase {
        let tod = ts.time().num_seconds_from_midnight();
        let dawn = seconds_of(self.dawn_start);
        let day = seconds_of(self.day_start);
        let dusk = seconds_of(self.dusk_start);
        let night = seconds_of(self.night_start);
        let buffer = self.twilight_buffer_sec;

        if tod >= dawn - buffer && tod < dawn {
            DayPhase::Predawn
        } else if tod >= dawn && tod < day {
            DayPhase::Dawn
        } else if tod >= day && tod < dusk {
            DayPhase::Day
        } else if tod >= dusk && tod < night {
            DayPhase::Dusk
        } else if tod >= night && tod < night + buffer {
            DayPhase::Postdusk
        } else {
            DayPhase::Night
        }
    }

    /// Time-of-day bucket index for a timestamp
    pub fn bin_of(&self, ts: DateTime<Utc>) -> usize {
        (ts.time().num_seconds_from_midnight() / self.bin_seconds) as usize
    }

    /// Calendar-day index of `ts` relative to the calendar date of `first_ts`.
    ///
    /// Day indices follow calendar dates, not elapsed 24 h periods, so they are
    /// consistent even when the recording does not start at midnight.
    pub fn day_index(&self, ts: DateTime<Utc>, first_ts: DateTime<Utc>) -> i64 {
        (ts.date_naive() - first_ts.date_naive()).num_days()
    }

    /// Duration of each phase per 24 h period, in seconds and sample bins
    pub fn phase_durations(&self) -> Vec<PhaseDuration> {
        let dawn = seconds_of(self.dawn_start);
        let day = seconds_of(self.day_start);
        let dusk = seconds_of(self.dusk_start);
        let night = seconds_of(self.night_start);
        let buffer = self.twilight_buffer_sec;
        let twilight_total = 2 * buffer + (day - dawn) + (night - dusk);

        let seconds = [
            (DayPhase::Predawn, buffer),
            (DayPhase::Dawn, day - dawn),
            (DayPhase::Day, dusk - day),
            (DayPhase::Dusk, night - dusk),
            (DayPhase::Postdusk, buffer),
            (DayPhase::Night, SECONDS_PER_DAY - (dusk - day) - twilight_total),
        ];

        seconds
            .into_iter()
            .map(|(phase, secs)| PhaseDuration {
                phase,
                seconds: secs,
                samples: secs / self.bin_seconds,
            })
            .collect()
    }

    /// Absolute phase boundaries for every calendar day spanned by the data
    pub fn day_boundaries(
        &self,
        first_ts: DateTime<Utc>,
        last_ts: DateTime<Utc>,
    ) -> Vec<DayBoundaries> {
        let mut out = Vec::new();
        let mut date = first_ts.date_naive();
        let end = last_ts.date_naive();
        let buffer = Duration::seconds(self.twilight_buffer_sec as i64);

        while date <= end {
            let at = |t: NaiveTime| Utc.from_utc_datetime(&date.and_time(t));
            out.push(DayBoundaries {
                date,
                predawn_start: at(self.dawn_start) - buffer,
                dawn_start: at(self.dawn_start),
                day_start: at(self.day_start),
                dusk_start: at(self.dusk_start),
                night_start: at(self.night_start),
                postdusk_end: at(self.night_start) + buffer,
            });
            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        out
    }
}

fn seconds_of(t: NaiveTime) -> u32 {
    t.num_seconds_from_midnight()
}
