use chrono::{NaiveDate, Timelike};
use clap::ValueEnum;
use log::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::series::{HourlySeries, HOURS_PER_DAY};
use crate::snapshot::RawReading;

/// What to do when several readings land in the same hour slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BinPolicy {
    /// The reading that appears last in the file wins.
    #[default]
    Last,
    Sum,
    Mean,
}

/// The series of the latest day found in a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DaySeries {
    pub day: NaiveDate,
    pub series: HourlySeries,
}

/// Fold raw readings into the 24-slot series of the latest day present,
/// keeping only hours strictly before `current_hour`.
pub fn build_series(
    source_name: &str,
    readings: &[RawReading],
    policy: BinPolicy,
    current_hour: usize,
) -> PipelineResult<DaySeries> {
    let day = readings
        .iter()
        .map(|r| r.timestamp.date())
        .max()
        .ok_or_else(|| PipelineError::EmptySeries(source_name.to_string()))?;

    let mut sums = [0.0f64; HOURS_PER_DAY];
    let mut counts = [0u32; HOURS_PER_DAY];
    let mut last = [None; HOURS_PER_DAY];

    for reading in readings.iter().filter(|r| r.timestamp.date() == day) {
        let Some(value) = reading.value else {
            continue;
        };
        let hour = reading.timestamp.hour() as usize;
        sums[hour] += value;
        counts[hour] += 1;
        last[hour] = Some(value);
    }

    let mut slots = [None; HOURS_PER_DAY];
    for (hour, slot) in slots.iter_mut().enumerate() {
        if counts[hour] == 0 {
            continue;
        }
        *slot = match policy {
            BinPolicy::Last => last[hour],
            BinPolicy::Sum => Some(sums[hour]),
            BinPolicy::Mean => Some(sums[hour] / f64::from(counts[hour])),
        };
    }

    let series = HourlySeries::from_slots(slots).elapsed_only(current_hour);
    debug!(
        "{}: built series for {} ({} hour(s) with data before {:02}:00)",
        source_name,
        day,
        series.slots().iter().flatten().count(),
        current_hour
    );
    Ok(DaySeries { day, series })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::HOUR_LABELS;

    fn reading(day: u32, hour: u32, value: f64) -> RawReading {
        RawReading {
            timestamp: NaiveDate::from_ymd_opt(2026, 10, day)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            value: Some(value),
        }
    }

    #[test]
    fn morning_readings_before_half_past_three() {
        let readings: Vec<_> = (0..15).map(|h| reading(16, h, f64::from(h + 1))).collect();
        let built = build_series("A", &readings, BinPolicy::Last, 15).unwrap();
        for h in 0..15 {
            assert_eq!(built.series.get(h), Some((h + 1) as f64));
        }
        assert!(built.series.slots()[15..].iter().all(Option::is_none));
        let total: f64 = built.series.slots().iter().flatten().sum();
        assert!((total - 120.0).abs() < 1e-9);
    }

    #[test]
    fn always_twenty_four_canonical_slots() {
        let built = build_series("A", &[reading(16, 9, 3.0)], BinPolicy::Last, 23).unwrap();
        let labels: Vec<_> = built.series.iter().map(|s| s.hour).collect();
        assert_eq!(labels, HOUR_LABELS.to_vec());
    }

    #[test]
    fn future_hours_are_cleared_even_with_data() {
        let readings: Vec<_> = (0..24).map(|h| reading(16, h, 1.0)).collect();
        let built = build_series("A", &readings, BinPolicy::Last, 10).unwrap();
        assert_eq!(built.series.slots().iter().flatten().count(), 10);
        assert_eq!(built.series.get(10), None);
    }

    #[test]
    fn only_latest_day_is_kept() {
        let readings = vec![reading(15, 3, 9.0), reading(16, 4, 2.0), reading(15, 5, 9.0)];
        let built = build_series("A", &readings, BinPolicy::Last, 23).unwrap();
        assert_eq!(built.day, NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
        assert_eq!(built.series.get(3), None);
        assert_eq!(built.series.get(4), Some(2.0));
        assert_eq!(built.series.get(5), None);
    }

    #[test]
    fn duplicate_slot_policies() {
        let readings = vec![reading(16, 2, 1.0), reading(16, 2, 3.0)];
        let last = build_series("A", &readings, BinPolicy::Last, 23).unwrap();
        let sum = build_series("A", &readings, BinPolicy::Sum, 23).unwrap();
        let mean = build_series("A", &readings, BinPolicy::Mean, 23).unwrap();
        assert_eq!(last.series.get(2), Some(3.0));
        assert_eq!(sum.series.get(2), Some(4.0));
        assert_eq!(mean.series.get(2), Some(2.0));
    }

    #[test]
    fn blank_readings_stay_missing_not_zero() {
        let mut blank = reading(16, 1, 0.0);
        blank.value = None;
        let built = build_series("A", &[reading(16, 0, 1.0), blank], BinPolicy::Last, 23).unwrap();
        assert_eq!(built.series.get(1), None);
    }

    #[test]
    fn no_readings_is_empty_series() {
        let err = build_series("A", &[], BinPolicy::Last, 12).unwrap_err();
        assert!(matches!(err, PipelineError::EmptySeries(name) if name == "A"));
    }
}
