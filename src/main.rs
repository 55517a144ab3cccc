//! # Elero Bridge
//!
//! Drive Elero radio-controlled blinds and lights through a serial radio
//! bridge.
//!
//! The binary loads the configuration, opens the radio and runs the hub on
//! a fixed tick. Received frames are fed to the hub as they arrive and every
//! frame the hub produces is written to the radio.

use anyhow::{Context, Result};
use std::time::Instant;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use elero_bridge::config::{Config, LoggingConfig, RadioConfig};
use elero_bridge::hub::{Hub, HubEvent};
use elero_bridge::publisher::{RssiSink, StatusSink};
use elero_bridge::radio::RadioLink;

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Hub tick period in milliseconds
const TICK_INTERVAL_MS: u64 = 10;

/// File name prefix of the daily rolling log
const LOG_FILE_PREFIX: &str = "elero-bridge.log";

/// Main entry point for Elero Bridge
///
/// # Control Flow
///
/// 1. Load the configuration (first argument, or `config/default.toml`)
/// 2. Set up logging, optionally to a daily rolling file
/// 3. Open the radio bridge; failure here is fatal
/// 4. Loop: tick the hub every 10 ms and send what it returns, feed received
///    frames to the hub, reopen the radio when the link goes down
/// 5. Exit on Ctrl+C
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging);

    info!("Elero Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    let mut link = RadioLink::open(&config.radio).context("radio bridge unavailable")?;
    info!("Radio bridge opened at: {}", link.device_path());

    let mut hub = Hub::from_config(&config)?;
    register_log_sensors(&mut hub, &config);

    let started = Instant::now();
    let now_ms = || started.elapsed().as_millis() as u64;

    if config.scan.on_startup {
        hub.start_scan(now_ms());
    }

    let mut ticker = interval(Duration::from_millis(TICK_INTERVAL_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = now_ms();
                if let Some(frame) = hub.tick(now) {
                    if let Err(e) = link.send_frame(&frame).await {
                        warn!("Failed to send frame: {}", e);
                        hub.transmit_failed(now);
                    }
                }
            }

            received = link.recv_frame() => {
                match received {
                    Ok(frame) => hub.handle_frame(&frame, now_ms()),
                    Err(e) => {
                        warn!("Radio receive failed: {}", e);
                        match reconnect(&config.radio).await {
                            Some(new_link) => link = new_link,
                            None => break,
                        }
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }

        for event in hub.drain_events() {
            log_event(&hub, &event);
        }

        if !link.is_healthy() {
            warn!(
                "Radio link unhealthy after {} failed sends",
                link.consecutive_failures()
            );
            match reconnect(&config.radio).await {
                Some(new_link) => link = new_link,
                None => break,
            }
        }
    }

    if let Ok(report) = hub.stop_scan(now_ms()) {
        log_event(&hub, &HubEvent::ScanFinished(report));
    }

    Ok(())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. The returned guard flushes the
/// file writer and must live until exit.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Reopen the radio, waiting `reconnect_interval_ms` between attempts
///
/// Returns `None` if Ctrl+C arrives while waiting.
async fn reconnect(config: &RadioConfig) -> Option<RadioLink> {
    loop {
        tokio::select! {
            _ = sleep(Duration::from_millis(config.reconnect_interval_ms)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C while reconnecting, shutting down...");
                return None;
            }
        }

        match RadioLink::open(config) {
            Ok(link) => {
                info!("Radio bridge reopened at: {}", link.device_path());
                return Some(link);
            }
            Err(e) => warn!("Reconnect failed: {}", e),
        }
    }
}

/// Sensor that writes published values to the log
struct LogSensor {
    name: String,
}

impl RssiSink for LogSensor {
    fn publish_rssi(&mut self, dbm: f32) {
        debug!("{}: RSSI {:.1} dBm", self.name, dbm);
    }
}

impl StatusSink for LogSensor {
    fn publish_status(&mut self, text: &str) {
        info!("{}: {}", self.name, text);
    }
}

fn register_log_sensors(hub: &mut Hub, config: &Config) {
    let devices = config
        .covers
        .iter()
        .map(|c| (c.blind_address, &c.name, c.auto_sensors))
        .chain(
            config
                .lights
                .iter()
                .map(|l| (l.blind_address, &l.name, l.auto_sensors)),
        );

    for (address, name, auto_sensors) in devices {
        if !auto_sensors {
            continue;
        }
        let publisher = hub.publisher_mut();
        publisher.register_rssi(address, Box::new(LogSensor { name: name.clone() }));
        publisher.register_status(address, Box::new(LogSensor { name: name.clone() }));
    }
}

fn log_event(hub: &Hub, event: &HubEvent) {
    let name = |address: u32| hub.name(address).unwrap_or("unknown").to_string();

    match event {
        HubEvent::CoverUpdated {
            address,
            state,
            position,
            stale,
        } => debug!(
            "{}: {:?} (position {:?}){}",
            name(*address),
            state,
            position,
            stale_marker(*stale)
        ),
        HubEvent::LightUpdated {
            address,
            on,
            brightness,
            stale,
        } => debug!(
            "{}: {} at {:.0}%{}",
            name(*address),
            if *on { "on" } else { "off" },
            brightness * 100.0,
            stale_marker(*stale)
        ),
        HubEvent::CommandFailed {
            address,
            action,
            attempts,
        } => warn!("{}: {} failed after {} attempts", name(*address), action, attempts),
        HubEvent::BlindStale { address } => warn!("{}: not answering polls", name(*address)),
        HubEvent::Discovered { address } => info!("Discovered device 0x{:06x}", address),
        HubEvent::ScanFinished(report) => match report.to_json() {
            Ok(json) => info!("Scan report:\n{}", json),
            Err(e) => warn!("Could not serialize scan report: {}", e),
        },
    }
}

fn stale_marker(stale: bool) -> &'static str {
    if stale {
        " [stale]"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_builds_hub() {
        let config = Config::parse(include_str!("../config/default.toml")).unwrap();
        let mut hub = Hub::from_config(&config).unwrap();
        register_log_sensors(&mut hub, &config);

        assert_eq!(hub.addresses().count(), 3);
        assert!(hub.publisher_mut().has_sinks(0xa831e5));
    }

    #[test]
    fn test_tick_is_shorter_than_frame_gap() {
        let config = Config::default();
        assert!(TICK_INTERVAL_MS <= config.dispatcher.frame_gap_ms);
    }

    #[test]
    fn test_log_sensor_accepts_values() {
        let mut sensor = LogSensor {
            name: "test".to_string(),
        };
        sensor.publish_rssi(-70.0);
        sensor.publish_status("top");
    }
}
