use anyhow::Result;
use log::{debug, info};
use serde::Serialize;

use crate::error::PipelineResult;
use crate::pipeline::Refresh;
use crate::pulse::{marker, Marker, Pulse};

/// What the dashboard shows: the latest good refresh, and the error of the
/// latest refresh if it failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub refresh: Option<Refresh>,
    pub error: Option<String>,
    pub marker: Option<Marker>,
}

/// Dashboard state carried between timer ticks. A failed refresh never
/// replaces the last good one.
#[derive(Debug, Default)]
pub struct Dashboard {
    latest: Option<Refresh>,
    error: Option<String>,
    pulse: Pulse,
}

impl Dashboard {
    pub fn apply(&mut self, result: PipelineResult<Refresh>) {
        match result {
            Ok(refresh) => {
                self.latest = Some(refresh);
                self.error = None;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    /// Advance the marker emphasis without touching the data.
    pub fn pulse(&mut self) -> Option<Marker> {
        self.pulse = self.pulse.next();
        self.marker()
    }

    pub fn marker(&self) -> Option<Marker> {
        self.latest
            .as_ref()
            .and_then(|r| marker(&r.per_source, self.pulse))
    }

    pub fn frame(&self) -> Frame {
        Frame {
            refresh: self.latest.clone(),
            error: self.error.clone(),
            marker: self.marker(),
        }
    }
}

/// Sink for dashboard output.
pub trait Presenter: Send + Sync {
    fn show_frame(&self, frame: &Frame) -> Result<()>;
    fn show_marker(&self, marker: Option<&Marker>) -> Result<()>;
}

/// Presenter used when no broker is configured.
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn show_frame(&self, frame: &Frame) -> Result<()> {
        if let Some(error) = &frame.error {
            info!("Showing previous frame, latest refresh failed: {}", error);
        }
        match &frame.refresh {
            Some(refresh) => {
                for stale in &refresh.stale {
                    info!("{}: left out, latest data is from {}", stale.name, stale.day);
                }
                if !refresh.combined.total.has_data() {
                    info!("{}: no elapsed hour with data yet", refresh.day);
                }
                for source in &refresh.per_source {
                    let hours = refresh
                        .combined
                        .source(&source.name)
                        .map_or(0, |s| s.slots().iter().flatten().count());
                    info!(
                        "{} {}: {:.1} MWh over {} hour(s) (last {})",
                        refresh.day,
                        source.name,
                        source.metrics.total,
                        hours,
                        source
                            .metrics
                            .last_valid
                            .map_or("none", |p| p.hour)
                    );
                }
                info!("{} total: {:.1} MWh", refresh.day, refresh.summary.total);
            }
            None => info!("No data to show yet"),
        }
        Ok(())
    }

    fn show_marker(&self, marker: Option<&Marker>) -> Result<()> {
        match marker {
            Some(m) => debug!("Marker {} {} {:?}", m.source, m.hour, m.pulse),
            None => debug!("No marker"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{HourPoint, SummaryMetrics};
    use crate::combine::{combine, NamedSeries};
    use crate::error::PipelineError;
    use crate::pipeline::SourceSummary;
    use crate::series::HourlySeries;
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    fn refresh(last: Option<f64>) -> Refresh {
        let metrics = SummaryMetrics {
            total: last.unwrap_or(0.0),
            last_valid: last.map(|value| HourPoint { hour: "09:00", value }),
            peak: None,
        };
        Refresh {
            computed_at: FixedOffset::west_opt(5 * 3600)
                .unwrap()
                .with_ymd_and_hms(2026, 10, 16, 10, 0, 0)
                .unwrap(),
            day: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            combined: combine(vec![NamedSeries {
                name: "sun".into(),
                series: HourlySeries::default(),
            }]),
            summary: metrics,
            per_source: vec![SourceSummary {
                name: "sun".into(),
                metrics,
            }],
            failed: Vec::new(),
            stale: Vec::new(),
        }
    }

    #[test]
    fn failed_refresh_keeps_previous_frame() {
        let mut dashboard = Dashboard::default();
        dashboard.apply(Ok(refresh(Some(4.0))));
        dashboard.apply(Err(PipelineError::FetchFailure("connection refused".into())));
        let frame = dashboard.frame();
        assert_eq!(frame.refresh, Some(refresh(Some(4.0))));
        assert!(frame.error.unwrap().contains("connection refused"));

        dashboard.apply(Ok(refresh(Some(5.0))));
        assert!(dashboard.frame().error.is_none());
    }

    #[test]
    fn failure_before_any_data() {
        let mut dashboard = Dashboard::default();
        dashboard.apply(Err(PipelineError::EmptySeries("sun".into())));
        let frame = dashboard.frame();
        assert!(frame.refresh.is_none());
        assert!(frame.marker.is_none());
        assert!(frame.error.is_some());
    }

    #[test]
    fn pulse_alternates_marker_emphasis() {
        let mut dashboard = Dashboard::default();
        dashboard.apply(Ok(refresh(Some(4.0))));
        assert_eq!(dashboard.marker().unwrap().pulse, Pulse::Emphasized);
        assert_eq!(dashboard.pulse().unwrap().pulse, Pulse::Muted);
        assert_eq!(dashboard.pulse().unwrap().pulse, Pulse::Emphasized);
    }

    #[test]
    fn no_last_valid_point_means_no_marker() {
        let mut dashboard = Dashboard::default();
        dashboard.apply(Ok(refresh(None)));
        assert!(dashboard.pulse().is_none());
        assert!(dashboard.frame().marker.is_none());
    }

    #[test]
    fn frame_serializes_for_the_sink() {
        let mut dashboard = Dashboard::default();
        dashboard.apply(Ok(refresh(Some(4.0))));
        let json = serde_json::to_value(dashboard.frame()).unwrap();
        assert_eq!(json["refresh"]["day"], "2026-10-16");
        assert_eq!(json["marker"]["pulse"], "emphasized");
        assert_eq!(json["refresh"]["combined"]["total"].as_array().unwrap().len(), 24);
        assert!(json["error"].is_null());
    }
}
