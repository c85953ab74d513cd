use chrono::FixedOffset;
use clap::Parser;
use std::path::PathBuf;

use crate::builder::BinPolicy;
use crate::fetch::{FetchTarget, FtpSettings};
use crate::pipeline::{RefreshPolicy, Settings, Source, SourceKind};
use crate::snapshot::{HourConvention, TimestampZone, DEFAULT_HOUR_CONVENTION};

#[derive(Parser, Debug)]
#[command(
    name = "genboard",
    about = "Hourly generation dashboard feed built from plant snapshot files"
)]
pub struct Config {
    /// Time-series export source, as NAME=PATH (repeatable)
    #[arg(long = "export", value_name = "NAME=PATH", value_parser = parse_export_source)]
    pub exports: Vec<Source>,

    /// Plant summed from site codes of an hourly table, as NAME=PATH:CODE[+CODE...] (repeatable)
    #[arg(long = "plant", value_name = "NAME=PATH:CODES", value_parser = parse_plant_source)]
    pub plants: Vec<Source>,

    /// Reference time zone as a UTC offset
    #[arg(
        long,
        default_value = "-05:00",
        allow_hyphen_values = true,
        value_parser = parse_utc_offset
    )]
    pub utc_offset: FixedOffset,

    /// Whether export timestamps are UTC or already in the reference zone
    #[arg(long, value_enum, default_value_t = TimestampZone::Local)]
    pub timestamp_zone: TimestampZone,

    /// Clock hour the `HOUR nn` columns of an hourly table are labelled with
    #[arg(long, value_enum, default_value_t = DEFAULT_HOUR_CONVENTION)]
    pub hour_convention: HourConvention,

    /// How export readings falling in the same hour are combined
    #[arg(long, value_enum, default_value_t = BinPolicy::Last)]
    pub export_bins: BinPolicy,

    /// Show the remaining sources when one of them fails to build
    #[arg(long)]
    pub degrade: bool,

    /// Seconds between two full refreshes
    #[arg(long, default_value_t = 300)]
    pub refresh_secs: u64,

    /// Milliseconds between two marker pulses
    #[arg(long, default_value_t = 1000)]
    pub pulse_millis: u64,

    /// FTP server holding the snapshots (if omitted, local files are used as they are)
    #[arg(long)]
    pub ftp_host: Option<String>,

    /// FTP server port
    #[arg(long, default_value_t = 21)]
    pub ftp_port: u16,

    /// FTP user
    #[arg(long, default_value = "anonymous")]
    pub ftp_user: String,

    /// FTP password
    #[arg(long, default_value = "")]
    pub ftp_password: String,

    /// Extension of the remote snapshot files
    #[arg(long, default_value = ".csv")]
    pub ftp_extension: String,

    /// Remote directory mirrored to a local snapshot, as REMOTE_DIR=LOCAL_PATH (repeatable)
    #[arg(long = "fetch", value_name = "REMOTE_DIR=LOCAL_PATH", value_parser = parse_fetch_target)]
    pub fetch: Vec<FetchTarget>,

    /// MQTT broker hostname (if omitted, frames are only logged)
    #[arg(long)]
    pub mqtt_host: Option<String>,

    /// MQTT broker port
    #[arg(long, default_value_t = 1883)]
    pub mqtt_port: u16,

    /// MQTT client ID
    #[arg(long, default_value = "genboard")]
    pub mqtt_client_id: String,

    /// MQTT topic for dashboard frames; markers go to `<topic>/marker`
    #[arg(long, default_value = "dashboard/generation")]
    pub mqtt_topic: String,
}

impl Config {
    /// Exports first, then plants, each in command line order.
    pub fn sources(&self) -> Vec<Source> {
        self.exports.iter().chain(&self.plants).cloned().collect()
    }

    pub fn settings(&self) -> Settings {
        Settings {
            offset: self.utc_offset,
            timestamp_zone: self.timestamp_zone,
            hour_convention: self.hour_convention,
            export_bins: self.export_bins,
            policy: if self.degrade {
                RefreshPolicy::Degrade
            } else {
                RefreshPolicy::Strict
            },
        }
    }

    pub fn ftp(&self) -> Option<FtpSettings> {
        self.ftp_host.as_ref().map(|host| FtpSettings {
            host: host.clone(),
            port: self.ftp_port,
            user: self.ftp_user.clone(),
            password: self.ftp_password.clone(),
            extension: self.ftp_extension.clone(),
        })
    }
}

fn split_pair<'a>(raw: &'a str, what: &str) -> Result<(&'a str, &'a str), String> {
    match raw.split_once('=') {
        Some((left, right)) if !left.is_empty() && !right.is_empty() => Ok((left, right)),
        _ => Err(format!("expected {what}, got {raw:?}")),
    }
}

fn parse_export_source(raw: &str) -> Result<Source, String> {
    let (name, path) = split_pair(raw, "NAME=PATH")?;
    Ok(Source {
        name: name.to_string(),
        kind: SourceKind::Export {
            path: PathBuf::from(path),
        },
    })
}

fn parse_plant_source(raw: &str) -> Result<Source, String> {
    let (name, rest) = split_pair(raw, "NAME=PATH:CODES")?;
    let (path, codes) = rest
        .rsplit_once(':')
        .ok_or_else(|| format!("expected PATH:CODE[+CODE...], got {rest:?}"))?;
    let site_codes: Vec<String> = codes
        .split('+')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect();
    if path.is_empty() || site_codes.is_empty() {
        return Err(format!("expected PATH:CODE[+CODE...], got {rest:?}"));
    }
    Ok(Source {
        name: name.to_string(),
        kind: SourceKind::Plant {
            path: PathBuf::from(path),
            site_codes,
        },
    })
}

fn parse_fetch_target(raw: &str) -> Result<FetchTarget, String> {
    let (remote_dir, local_path) = split_pair(raw, "REMOTE_DIR=LOCAL_PATH")?;
    Ok(FetchTarget {
        remote_dir: remote_dir.to_string(),
        local_path: PathBuf::from(local_path),
    })
}

/// `+HH:MM` / `-HH:MM`, or a whole number of hours like `-5`.
fn parse_utc_offset(raw: &str) -> Result<FixedOffset, String> {
    let invalid = || format!("invalid UTC offset {raw:?}, expected e.g. -05:00");
    let (sign, body) = match raw.as_bytes().first() {
        Some(b'-') => (-1, &raw[1..]),
        Some(b'+') => (1, &raw[1..]),
        _ => (1, raw),
    };
    let (hours, minutes) = match body.split_once(':') {
        Some((h, m)) => (h, m),
        None => (body, "0"),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..60).contains(&minutes) {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
