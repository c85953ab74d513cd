use serde::Serialize;

use crate::pipeline::SourceSummary;

/// Emphasis of the latest-point marker, toggled by the fast timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pulse {
    #[default]
    Emphasized,
    Muted,
}

impl Pulse {
    pub fn next(self) -> Self {
        match self {
            Pulse::Emphasized => Pulse::Muted,
            Pulse::Muted => Pulse::Emphasized,
        }
    }

    pub fn size(self) -> u8 {
        match self {
            Pulse::Emphasized => 12,
            Pulse::Muted => 8,
        }
    }

    pub fn opacity(self) -> f32 {
        match self {
            Pulse::Emphasized => 1.0,
            Pulse::Muted => 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub source: String,
    pub hour: &'static str,
    pub value: f64,
    pub pulse: Pulse,
    pub size: u8,
    pub opacity: f32,
}

/// Place the marker on the source whose latest point is highest, so it sits
/// away from the x axis. The first declared source wins a tie. No source
/// with data means no marker at all.
pub fn marker(per_source: &[SourceSummary], pulse: Pulse) -> Option<Marker> {
    let mut best: Option<(&SourceSummary, _)> = None;
    for summary in per_source {
        let Some(point) = summary.metrics.last_valid else {
            continue;
        };
        match best {
            Some((_, b)) if point.value <= b => {}
            _ => best = Some((summary, point.value)),
        }
    }

    best.and_then(|(summary, _)| {
        let point = summary.metrics.last_valid?;
        Some(Marker {
            source: summary.name.clone(),
            hour: point.hour,
            value: point.value,
            pulse,
            size: pulse.size(),
            opacity: pulse.opacity(),
        })
    })
}
