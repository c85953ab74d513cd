mod aggregate;
mod builder;
mod combine;
mod config;
mod error;
mod fetch;
mod mqtt;
mod pipeline;
mod present;
mod pulse;
mod series;
mod snapshot;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use log::{error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::pipeline::Pipeline;
use crate::present::{Dashboard, LogPresenter, Presenter};

fn main() -> Result<()> {
    env_logger::init();

    let config = config::Config::parse();
    info!("Starting genboard");

    let sources = config.sources();
    if sources.is_empty() {
        bail!("No sources declared, use --export or --plant");
    }
    let pipeline = Pipeline::new(sources, config.settings());
    info!(
        "Tracking {} source(s), refresh every {}s",
        pipeline.sources().len(),
        config.refresh_secs
    );

    let presenter: Arc<dyn Presenter> = match &config.mqtt_host {
        Some(host) => {
            info!("Publishing frames to {}:{} on {}", host, config.mqtt_port, config.mqtt_topic);
            Arc::new(mqtt::MqttPresenter::connect(&config, host)?)
        }
        None => {
            info!("No MQTT broker specified, logging frames");
            Arc::new(LogPresenter)
        }
    };
    let dashboard = Arc::new(Mutex::new(Dashboard::default()));

    spawn_pulse(
        Arc::clone(&dashboard),
        Arc::clone(&presenter),
        Duration::from_millis(config.pulse_millis),
    )?;

    // Refreshes run back to back on this thread, so a tick that comes due
    // while one is still running is skipped rather than overlapped.
    let interval = Duration::from_secs(config.refresh_secs);
    let ftp = config.ftp();
    loop {
        let started = Instant::now();

        if let Some(ftp) = &ftp {
            for target in &config.fetch {
                match fetch::fetch_latest(ftp, target) {
                    Ok(name) => info!("Fetched {} from {}", name, target.remote_dir),
                    Err(e) => warn!("Keeping previous {}: {}", target.local_path.display(), e),
                }
            }
        }

        let result = pipeline.refresh(Utc::now().with_timezone(&config.utc_offset));
        if let Err(e) = &result {
            error!("Refresh failed, keeping previous frame: {}", e);
        }
        let frame = {
            let mut dashboard = lock(&dashboard);
            dashboard.apply(result);
            dashboard.frame()
        };
        if let Err(e) = presenter.show_frame(&frame) {
            error!("Failed to present frame: {:#}", e);
        }

        let elapsed = started.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        } else {
            warn!("Refresh took {:?}, longer than the {:?} interval", elapsed, interval);
        }
    }
}

/// Toggle the marker emphasis on the last computed frame. Never fetches or
/// rebuilds.
fn spawn_pulse(
    dashboard: Arc<Mutex<Dashboard>>,
    presenter: Arc<dyn Presenter>,
    period: Duration,
) -> Result<()> {
    thread::Builder::new()
        .name("pulse".into())
        .spawn(move || loop {
            thread::sleep(period);
            let marker = lock(&dashboard).pulse();
            if let Err(e) = presenter.show_marker(marker.as_ref()) {
                error!("Failed to present marker: {:#}", e);
            }
        })
        .context("Failed to spawn pulse timer")?;
    Ok(())
}

fn lock(dashboard: &Mutex<Dashboard>) -> MutexGuard<'_, Dashboard> {
    dashboard.lock().unwrap_or_else(PoisonError::into_inner)
}
