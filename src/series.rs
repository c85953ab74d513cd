use serde::{Serialize, Serializer};

pub const HOURS_PER_DAY: usize = 24;

/// Canonical hour labels of a generation day.
pub const HOUR_LABELS: [&str; HOURS_PER_DAY] = [
    "00:00", "01:00", "02:00", "03:00", "04:00", "05:00", "06:00", "07:00", "08:00", "09:00",
    "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00", "17:00", "18:00", "19:00",
    "20:00", "21:00", "22:00", "23:00",
];

/// Energy per clock hour (MWh). A `None` slot means "no value", never zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HourlySeries {
    slots: [Option<f64>; HOURS_PER_DAY],
}

/// One labelled slot of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourValue {
    pub hour: &'static str,
    pub value: Option<f64>,
}

impl HourlySeries {
    pub fn from_slots(slots: [Option<f64>; HOURS_PER_DAY]) -> Self {
        Self { slots }
    }

    pub fn get(&self, hour: usize) -> Option<f64> {
        self.slots.get(hour).copied().flatten()
    }

    pub fn slots(&self) -> &[Option<f64>; HOURS_PER_DAY] {
        &self.slots
    }

    pub fn iter(&self) -> impl Iterator<Item = HourValue> + '_ {
        self.slots
            .iter()
            .zip(HOUR_LABELS)
            .map(|(value, hour)| HourValue {
                hour,
                value: *value,
            })
    }

    /// Copy with every slot at or after `current_hour` cleared.
    pub fn elapsed_only(&self, current_hour: usize) -> Self {
        let mut slots = self.slots;
        for slot in slots.iter_mut().skip(current_hour) {
            *slot = None;
        }
        Self { slots }
    }

    pub fn has_data(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }
}

impl Serialize for HourlySeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_canonical() {
        for (i, label) in HOUR_LABELS.iter().enumerate() {
            assert_eq!(*label, format!("{:02}:00", i));
        }
    }

    #[test]
    fn elapsed_only_clears_current_and_later_hours() {
        let series = HourlySeries::from_slots([Some(1.0); HOURS_PER_DAY]);
        let cut = series.elapsed_only(15);
        assert_eq!(cut.get(14), Some(1.0));
        assert!(cut.slots()[15..].iter().all(Option::is_none));
    }

    #[test]
    fn out_of_range_hour_has_no_value() {
        assert_eq!(HourlySeries::default().get(30), None);
    }

    #[test]
    fn serializes_as_labelled_slots() {
        let mut slots = [None; HOURS_PER_DAY];
        slots[1] = Some(2.5);
        let json = serde_json::to_value(HourlySeries::from_slots(slots)).unwrap();
        assert_eq!(json.as_array().unwrap().len(), HOURS_PER_DAY);
        assert_eq!(json[0]["hour"], "00:00");
        assert!(json[0]["value"].is_null());
        assert_eq!(json[1]["value"], 2.5);
    }
}
