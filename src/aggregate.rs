use serde::Serialize;

use crate::series::{HourlySeries, HOUR_LABELS};

/// A labelled point of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourPoint {
    pub hour: &'static str,
    pub value: f64,
}

/// KPI values derived from one series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryMetrics {
    /// Sum of all slots with a value; 0.0 when there are none.
    pub total: f64,
    /// Latest hour with a value; `None` means "no data yet".
    pub last_valid: Option<HourPoint>,
    /// Highest slot, earliest hour on ties.
    pub peak: Option<HourPoint>,
}

impl SummaryMetrics {
    pub fn from_series(series: &HourlySeries) -> Self {
        Self {
            total: total(series),
            last_valid: last_valid(series),
            peak: peak(series),
        }
    }
}

pub fn total(series: &HourlySeries) -> f64 {
    series.slots().iter().flatten().sum()
}

pub fn last_valid(series: &HourlySeries) -> Option<HourPoint> {
    series
        .slots()
        .iter()
        .enumerate()
        .rev()
        .find_map(|(hour, value)| value.map(|value| point(hour, value)))
}

pub fn peak(series: &HourlySeries) -> Option<HourPoint> {
    let mut best: Option<HourPoint> = None;
    for (hour, value) in series.slots().iter().enumerate() {
        let Some(value) = *value else { continue };
        match best {
            Some(b) if b.value >= value => {}
            _ => best = Some(point(hour, value)),
        }
    }
    best
}

fn point(hour: usize, value: f64) -> HourPoint {
    HourPoint {
        hour: HOUR_LABELS[hour],
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::HOURS_PER_DAY;

    fn series(values: &[(usize, f64)]) -> HourlySeries {
        let mut slots = [None; HOURS_PER_DAY];
        for &(h, v) in values {
            slots[h] = Some(v);
        }
        HourlySeries::from_slots(slots)
    }

    #[test]
    fn all_missing_series() {
        let metrics = SummaryMetrics::from_series(&HourlySeries::default());
        assert_eq!(metrics.total, 0.0);
        assert!(metrics.last_valid.is_none());
        assert!(metrics.peak.is_none());
    }

    #[test]
    fn last_valid_skips_trailing_gaps() {
        let s = series(&[(0, 1.0), (6, 0.0), (3, 2.0)]);
        let last = last_valid(&s).unwrap();
        assert_eq!(last.hour, "06:00");
        assert_eq!(last.value, 0.0);
    }

    #[test]
    fn peak_ties_go_to_earliest_hour() {
        let s = series(&[(4, 7.0), (9, 7.0), (2, 1.0)]);
        let p = peak(&s).unwrap();
        assert_eq!(p.hour, "04:00");
        assert_eq!(p.value, 7.0);
    }

    #[test]
    fn total_ignores_slot_order() {
        let a = series(&[(0, 1.5), (1, 2.5), (10, 3.0)]);
        let b = series(&[(23, 3.0), (5, 1.5), (7, 2.5)]);
        assert!((total(&a) - 7.0).abs() < 1e-9);
        assert!((total(&a) - total(&b)).abs() < 1e-9);
    }

    #[test]
    fn repeated_reductions_agree() {
        let s = series(&[(1, 0.1), (2, 0.2), (3, 0.3)]);
        let first = SummaryMetrics::from_series(&s);
        let second = SummaryMetrics::from_series(&s);
        assert_eq!(first.total.to_bits(), second.total.to_bits());
        assert_eq!(first, second);
    }
}
