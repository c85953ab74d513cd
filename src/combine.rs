use serde::Serialize;

use crate::series::{HourlySeries, HOURS_PER_DAY};

/// Element-wise sum where a missing slot adds nothing, but a slot missing in
/// every input stays missing.
pub fn sum_units<'a>(units: impl IntoIterator<Item = &'a HourlySeries>) -> HourlySeries {
    let mut slots: [Option<f64>; HOURS_PER_DAY] = [None; HOURS_PER_DAY];
    for unit in units {
        for (acc, value) in slots.iter_mut().zip(unit.slots()) {
            if let Some(v) = value {
                *acc = Some(acc.unwrap_or(0.0) + v);
            }
        }
    }
    HourlySeries::from_slots(slots)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedSeries {
    pub name: String,
    pub series: HourlySeries,
}

/// Per-source series in declaration order, plus their total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedSeries {
    pub sources: Vec<NamedSeries>,
    pub total: HourlySeries,
}

impl CombinedSeries {
    pub fn source(&self, name: &str) -> Option<&HourlySeries> {
        self.sources
            .iter()
            .find(|s| s.name == name)
            .map(|s| &s.series)
    }
}

pub fn combine(sources: Vec<NamedSeries>) -> CombinedSeries {
    let total = sum_units(sources.iter().map(|s| &s.series));
    CombinedSeries { sources, total }
}
