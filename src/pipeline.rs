use chrono::{DateTime, FixedOffset, NaiveDate, Timelike};
use log::{info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::aggregate::SummaryMetrics;
use crate::builder::{build_series, BinPolicy, DaySeries};
use crate::combine::{combine, sum_units, CombinedSeries, NamedSeries};
use crate::error::{PipelineError, PipelineResult};
use crate::snapshot::{parse_export, parse_hourly_table, HourConvention, TimestampZone};

/// Where a source's readings come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Time-series export with instantaneous power per hour end.
    Export { path: PathBuf },
    /// Units of one plant taken from an hourly table and summed.
    Plant {
        path: PathBuf,
        site_codes: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub kind: SourceKind,
}

/// What to do when one source cannot be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Any failing source fails the refresh.
    #[default]
    Strict,
    /// Show the remaining sources and list the failed ones.
    Degrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub offset: FixedOffset,
    pub timestamp_zone: TimestampZone,
    pub hour_convention: HourConvention,
    /// Binning of export readings sharing an hour. Hourly table units
    /// always keep the last value.
    pub export_bins: BinPolicy,
    pub policy: RefreshPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub metrics: SummaryMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedSource {
    pub name: String,
    pub error: String,
}

/// A source whose latest data is older than the day being shown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaleSource {
    pub name: String,
    pub day: NaiveDate,
}

/// Everything one refresh cycle produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Refresh {
    pub computed_at: DateTime<FixedOffset>,
    pub day: NaiveDate,
    pub combined: CombinedSeries,
    pub summary: SummaryMetrics,
    pub per_source: Vec<SourceSummary>,
    pub failed: Vec<FailedSource>,
    /// Left out of `combined` so an old day never adds to today's total.
    pub stale: Vec<StaleSource>,
}

pub struct Pipeline {
    sources: Vec<Source>,
    settings: Settings,
}

impl Pipeline {
    pub fn new(sources: Vec<Source>, settings: Settings) -> Self {
        Self { sources, settings }
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Rebuild every source from the snapshot files on disk. Holds no state
    /// between calls.
    pub fn refresh(&self, now: DateTime<FixedOffset>) -> PipelineResult<Refresh> {
        let current_hour = now.hour() as usize;
        let mut built = Vec::new();
        let mut failed = Vec::new();
        let mut first_error = None;

        for source in &self.sources {
            match self.build_source(source, now.date_naive(), current_hour) {
                Ok(day_series) => built.push((source.name.clone(), day_series)),
                Err(e) => match self.settings.policy {
                    RefreshPolicy::Strict => return Err(e),
                    RefreshPolicy::Degrade => {
                        warn!("Source {} skipped: {}", source.name, e);
                        failed.push(FailedSource {
                            name: source.name.clone(),
                            error: e.to_string(),
                        });
                        first_error.get_or_insert(e);
                    }
                },
            }
        }

        let Some(day) = built.iter().map(|(_, b)| b.day).max() else {
            return Err(first_error
                .unwrap_or_else(|| PipelineError::malformed("pipeline", "no sources declared")));
        };

        let mut stale = Vec::new();
        let mut named = Vec::with_capacity(built.len());
        for (name, b) in built {
            if b.day == day {
                named.push(NamedSeries {
                    name,
                    series: b.series,
                });
            } else {
                warn!("Source {} only has data for {}, not {}", name, b.day, day);
                stale.push(StaleSource { name, day: b.day });
            }
        }
        let per_source = named
            .iter()
            .map(|n| SourceSummary {
                name: n.name.clone(),
                metrics: SummaryMetrics::from_series(&n.series),
            })
            .collect();
        let combined = combine(named);
        let summary = SummaryMetrics::from_series(&combined.total);

        info!(
            "Refreshed {} source(s) for {}: total {:.1} MWh, last hour {}",
            combined.sources.len(),
            day,
            summary.total,
            summary.last_valid.map_or("none", |p| p.hour)
        );

        Ok(Refresh {
            computed_at: now,
            day,
            combined,
            summary,
            per_source,
            failed,
            stale,
        })
    }

    fn build_source(
        &self,
        source: &Source,
        today: NaiveDate,
        current_hour: usize,
    ) -> PipelineResult<DaySeries> {
        match &source.kind {
            SourceKind::Export { path } => {
                let file = open_snapshot(path)?;
                let readings = parse_export(
                    &source.name,
                    file,
                    self.settings.timestamp_zone,
                    self.settings.offset,
                )?;
                build_series(&source.name, &readings, self.settings.export_bins, current_hour)
            }
            SourceKind::Plant { path, site_codes } => {
                let file = open_snapshot(path)?;
                let units =
                    parse_hourly_table(&source.name, file, self.settings.hour_convention, today)?;
                if units.is_empty() {
                    return Err(PipelineError::EmptySeries(source.name.clone()));
                }
                let mut unit_series = Vec::with_capacity(site_codes.len());
                for code in site_codes {
                    let readings = units.get(code).ok_or_else(|| {
                        let reason = format!("site code {code} not in table");
                        PipelineError::malformed(&source.name, reason)
                    })?;
                    unit_series.push(build_series(
                        &format!("{}/{}", source.name, code),
                        readings,
                        BinPolicy::Last,
                        current_hour,
                    )?);
                }
                let day = unit_series
                    .iter()
                    .map(|u| u.day)
                    .max()
                    .ok_or_else(|| PipelineError::EmptySeries(source.name.clone()))?;
                Ok(DaySeries {
                    day,
                    series: sum_units(unit_series.iter().map(|u| &u.series)),
                })
            }
        }
    }
}

fn open_snapshot(path: &Path) -> PipelineResult<File> {
    File::open(path).map_err(|error| match error.kind() {
        ErrorKind::NotFound => {
            PipelineError::FetchFailure(format!("no local snapshot at {}", path.display()))
        }
        _ => PipelineError::Io {
            path: path.display().to_string(),
            error,
        },
    })
}
