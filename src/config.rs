//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Durations are written the way Elero users know them from remote setups:
//! `"500ms"`, `"25s"`, `"5min"`, `"1h"`, or `"never"` for poll intervals.
//! Bare integers are taken as milliseconds.

use serde::de::Error;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::elero::protocol::{is_valid_command_type, CommandCodes, FramingBytes, ADDRESS_MAX};
use crate::error::{EleroError, Result};

/// Poll interval sentinel meaning "never poll"
pub const POLL_NEVER: u32 = u32::MAX;

/// Poll interval of devices that do not set one
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 5 * 60 * 1000;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub radio: RadioConfig,

    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    #[serde(default)]
    pub poller: PollerConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default, rename = "cover")]
    pub covers: Vec<CoverConfig>,

    #[serde(default, rename = "light")]
    pub lights: Vec<LightConfig>,
}

/// Radio bridge configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RadioConfig {
    /// Serial device; auto-detected when absent
    #[serde(default)]
    pub port: Option<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

/// Retransmission delay growth
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    Fixed,
    Exponential,
}

/// Command dispatcher configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DispatcherConfig {
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff")]
    pub backoff: Backoff,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    #[serde(default = "default_frame_gap_ms")]
    pub frame_gap_ms: u64,

    #[serde(default = "default_max_queue")]
    pub max_queue: usize,
}

/// Poller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PollerConfig {
    #[serde(default = "default_stale_after_misses")]
    pub stale_after_misses: u32,

    #[serde(default = "default_moving_interval_ms")]
    pub moving_interval_ms: u64,

    #[serde(default = "default_movement_timeout_ms")]
    pub movement_timeout_ms: u64,

    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,
}

/// Scan configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_scan_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_discovered")]
    pub max_discovered: usize,

    #[serde(default)]
    pub on_startup: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files; console only when absent
    #[serde(default)]
    pub log_dir: Option<String>,
}

/// A blind (cover) entry
#[derive(Debug, Deserialize, Clone)]
pub struct CoverConfig {
    pub name: String,
    pub blind_address: u32,
    pub remote_address: u32,
    pub channel: u8,

    #[serde(default = "default_poll_interval", deserialize_with = "de_poll_interval")]
    pub poll_interval: u32,

    #[serde(default, deserialize_with = "de_duration")]
    pub open_duration: u32,

    #[serde(default, deserialize_with = "de_duration")]
    pub close_duration: u32,

    #[serde(default)]
    pub supports_tilt: bool,

    #[serde(default = "default_auto_sensors")]
    pub auto_sensors: bool,

    #[serde(default = "default_payload_1")]
    pub payload_1: u8,
    #[serde(default = "default_payload_2")]
    pub payload_2: u8,
    #[serde(default = "default_pck_inf1")]
    pub pck_inf1: u8,
    #[serde(default = "default_pck_inf2")]
    pub pck_inf2: u8,
    #[serde(default = "default_hop")]
    pub hop: u8,

    #[serde(default = "default_command_up")]
    pub command_up: u8,
    #[serde(default = "default_command_down")]
    pub command_down: u8,
    #[serde(default = "default_command_stop")]
    pub command_stop: u8,
    #[serde(default = "default_command_check")]
    pub command_check: u8,
    #[serde(default = "default_command_tilt")]
    pub command_tilt: u8,
}

/// A light actuator entry
#[derive(Debug, Deserialize, Clone)]
pub struct LightConfig {
    pub name: String,
    pub blind_address: u32,
    pub remote_address: u32,
    pub channel: u8,

    #[serde(default = "default_poll_interval", deserialize_with = "de_poll_interval")]
    pub poll_interval: u32,

    /// Time to dim from 0 to 100 %; 0 for on/off lights
    #[serde(default, deserialize_with = "de_duration")]
    pub dim_duration: u32,

    #[serde(default = "default_auto_sensors")]
    pub auto_sensors: bool,

    #[serde(default = "default_payload_1")]
    pub payload_1: u8,
    #[serde(default = "default_payload_2")]
    pub payload_2: u8,
    #[serde(default = "default_pck_inf1")]
    pub pck_inf1: u8,
    #[serde(default = "default_pck_inf2")]
    pub pck_inf2: u8,
    #[serde(default = "default_hop")]
    pub hop: u8,

    #[serde(default = "default_command_up")]
    pub command_on: u8,
    #[serde(default = "default_command_down")]
    pub command_off: u8,
    #[serde(default = "default_command_up")]
    pub command_dim_up: u8,
    #[serde(default = "default_command_down")]
    pub command_dim_down: u8,
    #[serde(default = "default_command_stop")]
    pub command_stop: u8,
    #[serde(default = "default_command_check")]
    pub command_check: u8,
}

// Default value functions
fn default_baud_rate() -> u32 { crate::radio::DEFAULT_BAUD_RATE }
fn default_reconnect_interval_ms() -> u64 { 5000 }
fn default_max_consecutive_failures() -> u32 { 5 }

fn default_ack_timeout_ms() -> u64 { 500 }
fn default_max_attempts() -> u32 { 3 }
fn default_backoff() -> Backoff { Backoff::Fixed }
fn default_retry_delay_ms() -> u64 { 50 }
fn default_max_retry_delay_ms() -> u64 { 2000 }
fn default_frame_gap_ms() -> u64 { 50 }
fn default_max_queue() -> usize { 10 }

fn default_stale_after_misses() -> u32 { 3 }
fn default_moving_interval_ms() -> u64 { 2000 }
fn default_movement_timeout_ms() -> u64 { 120_000 }
fn default_stagger_ms() -> u64 { 5000 }

fn default_scan_timeout_ms() -> u64 { 60_000 }
fn default_max_discovered() -> usize { 20 }

fn default_log_level() -> String { "info".to_string() }

fn default_poll_interval() -> u32 { DEFAULT_POLL_INTERVAL_MS }
fn default_auto_sensors() -> bool { true }

fn default_payload_1() -> u8 { 0x00 }
fn default_payload_2() -> u8 { 0x04 }
fn default_pck_inf1() -> u8 { 0x6a }
fn default_pck_inf2() -> u8 { 0x00 }
fn default_hop() -> u8 { 0x0a }

fn default_command_up() -> u8 { 0x20 }
fn default_command_down() -> u8 { 0x40 }
fn default_command_stop() -> u8 { 0x10 }
fn default_command_check() -> u8 { 0x00 }
fn default_command_tilt() -> u8 { 0x24 }

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: default_ack_timeout_ms(),
            max_attempts: default_max_attempts(),
            backoff: default_backoff(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            frame_gap_ms: default_frame_gap_ms(),
            max_queue: default_max_queue(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            stale_after_misses: default_stale_after_misses(),
            moving_interval_ms: default_moving_interval_ms(),
            movement_timeout_ms: default_movement_timeout_ms(),
            stagger_ms: default_stagger_ms(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_scan_timeout_ms(),
            max_discovered: default_max_discovered(),
            on_startup: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

/// Duration as written in the config file
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Millis(u64),
    Text(String),
}

/// Parse a duration string into milliseconds
///
/// # Arguments
///
/// * `text` - e.g. `"250ms"`, `"25s"`, `"5min"`, `"2h"` or `"never"`
/// * `allow_never` - Whether `"never"` is accepted (poll intervals only)
///
/// # Errors
///
/// Returns a message if the text is malformed or the value reaches the
/// [`POLL_NEVER`] sentinel without being spelled `"never"`.
///
/// # Examples
///
/// ```
/// use elero_bridge::config::{parse_duration, POLL_NEVER};
///
/// assert_eq!(parse_duration("5min", true), Ok(300_000));
/// assert_eq!(parse_duration("never", true), Ok(POLL_NEVER));
/// assert!(parse_duration("never", false).is_err());
/// ```
pub fn parse_duration(text: &str, allow_never: bool) -> std::result::Result<u32, String> {
    let text = text.trim();

    if text.eq_ignore_ascii_case("never") {
        return if allow_never {
            Ok(POLL_NEVER)
        } else {
            Err("'never' is only valid for poll_interval".to_string())
        };
    }

    let split = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    let (digits, unit) = text.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{}'", text))?;

    let factor = match unit.trim() {
        "" | "ms" => 1,
        "s" => 1000,
        "min" => 60 * 1000,
        "h" => 60 * 60 * 1000,
        other => return Err(format!("unknown duration unit '{}' in '{}'", other, text)),
    };

    millis_to_u32(value.saturating_mul(factor))
}

fn millis_to_u32(millis: u64) -> std::result::Result<u32, String> {
    if millis >= u64::from(POLL_NEVER) {
        return Err(format!(
            "duration of {}ms reaches the 'never' sentinel; write \"never\" instead",
            millis
        ));
    }
    Ok(millis as u32)
}

fn de_poll_interval<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    match RawDuration::deserialize(deserializer)? {
        RawDuration::Millis(ms) => millis_to_u32(ms),
        RawDuration::Text(text) => parse_duration(&text, true),
    }
    .map_err(D::Error::custom)
}

fn de_duration<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    match RawDuration::deserialize(deserializer)? {
        RawDuration::Millis(ms) => millis_to_u32(ms),
        RawDuration::Text(text) => parse_duration(&text, false),
    }
    .map_err(D::Error::custom)
}

fn config_error(message: impl std::fmt::Display) -> EleroError {
    EleroError::Config(toml::de::Error::custom(message))
}

impl CoverConfig {
    /// Framing bytes copied into every command frame
    pub fn framing(&self) -> FramingBytes {
        FramingBytes {
            payload_1: self.payload_1,
            payload_2: self.payload_2,
            pck_inf1: self.pck_inf1,
            pck_inf2: self.pck_inf2,
            hop: self.hop,
        }
    }

    /// Command bytes for each action
    pub fn codes(&self) -> CommandCodes {
        CommandCodes {
            up: self.command_up,
            down: self.command_down,
            stop: self.command_stop,
            check: self.command_check,
            tilt: self.command_tilt,
            ..CommandCodes::default()
        }
    }

    /// Whether numeric position tracking is enabled
    pub fn tracks_position(&self) -> bool {
        self.open_duration > 0 && self.close_duration > 0
    }
}

impl LightConfig {
    pub fn framing(&self) -> FramingBytes {
        FramingBytes {
            payload_1: self.payload_1,
            payload_2: self.payload_2,
            pck_inf1: self.pck_inf1,
            pck_inf2: self.pck_inf2,
            hop: self.hop,
        }
    }

    pub fn codes(&self) -> CommandCodes {
        CommandCodes {
            on: self.command_on,
            off: self.command_off,
            dim_up: self.command_dim_up,
            dim_down: self.command_dim_down,
            stop: self.command_stop,
            check: self.command_check,
            ..CommandCodes::default()
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use elero_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns [`EleroError::ConfigInconsistency`] when only one of a cover's
    /// travel durations is set, [`EleroError::DuplicateAddress`] when two
    /// devices share an address, and [`EleroError::Config`] for values out
    /// of range.
    pub fn validate(&self) -> Result<()> {
        if self.radio.baud_rate == 0 {
            return Err(config_error("baud_rate must be greater than 0"));
        }

        if self.radio.reconnect_interval_ms == 0 || self.radio.reconnect_interval_ms > 600_000 {
            return Err(config_error("reconnect_interval_ms must be between 1 and 600000"));
        }

        if self.radio.max_consecutive_failures == 0 {
            return Err(config_error("max_consecutive_failures must be greater than 0"));
        }

        if self.dispatcher.ack_timeout_ms == 0 || self.dispatcher.ack_timeout_ms > 60_000 {
            return Err(config_error("ack_timeout_ms must be between 1 and 60000"));
        }

        if self.dispatcher.max_attempts == 0 || self.dispatcher.max_attempts > 10 {
            return Err(config_error("max_attempts must be between 1 and 10"));
        }

        if self.dispatcher.max_retry_delay_ms < self.dispatcher.retry_delay_ms {
            return Err(config_error("max_retry_delay_ms must not be less than retry_delay_ms"));
        }

        if self.dispatcher.max_queue == 0 {
            return Err(config_error("max_queue must be greater than 0"));
        }

        if self.poller.stale_after_misses == 0 {
            return Err(config_error("stale_after_misses must be greater than 0"));
        }

        if self.poller.moving_interval_ms == 0 {
            return Err(config_error("moving_interval_ms must be greater than 0"));
        }

        if self.scan.timeout_ms == 0 {
            return Err(config_error("scan timeout_ms must be greater than 0"));
        }

        if self.scan.max_discovered == 0 {
            return Err(config_error("max_discovered must be greater than 0"));
        }

        let mut seen = HashSet::new();

        for cover in &self.covers {
            validate_identity(&cover.name, cover.blind_address, cover.remote_address)?;
            validate_framing(&cover.name, &cover.framing())?;

            if (cover.open_duration == 0) != (cover.close_duration == 0) {
                return Err(EleroError::ConfigInconsistency(format!(
                    "cover '{}': open_duration and close_duration must both be set or both be 0",
                    cover.name
                )));
            }

            if !seen.insert(cover.blind_address) {
                return Err(EleroError::DuplicateAddress(cover.blind_address));
            }
        }

        for light in &self.lights {
            validate_identity(&light.name, light.blind_address, light.remote_address)?;
            validate_framing(&light.name, &light.framing())?;

            if !seen.insert(light.blind_address) {
                return Err(EleroError::DuplicateAddress(light.blind_address));
            }
        }

        Ok(())
    }
}

fn validate_identity(name: &str, blind_address: u32, remote_address: u32) -> Result<()> {
    if name.is_empty() {
        return Err(config_error("device name cannot be empty"));
    }

    if blind_address > ADDRESS_MAX {
        return Err(config_error(format!(
            "'{}': blind_address 0x{:x} exceeds 24 bits",
            name, blind_address
        )));
    }

    if remote_address > ADDRESS_MAX {
        return Err(config_error(format!(
            "'{}': remote_address 0x{:x} exceeds 24 bits",
            name, remote_address
        )));
    }

    Ok(())
}

fn validate_framing(name: &str, framing: &FramingBytes) -> Result<()> {
    if !is_valid_command_type(framing.pck_inf1) {
        return Err(config_error(format!(
            "'{}': pck_inf1 0x{:02x} must be above 0x60 and not a status packet type",
            name, framing.pck_inf1
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const COVER: &str = r#"
[[cover]]
name = "Living room"
blind_address = 0xa831e5
remote_address = 0x123456
channel = 4
"#;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.radio.port, None);
        assert_eq!(config.radio.baud_rate, 115_200);
        assert_eq!(config.dispatcher.ack_timeout_ms, 500);
        assert_eq!(config.dispatcher.max_attempts, 3);
        assert_eq!(config.dispatcher.backoff, Backoff::Fixed);
        assert_eq!(config.dispatcher.retry_delay_ms, 50);
        assert_eq!(config.poller.stale_after_misses, 3);
        assert_eq!(config.scan.timeout_ms, 60_000);
        assert_eq!(config.logging.level, "info");
        assert!(config.covers.is_empty());
    }

    #[test]
    fn test_cover_defaults() {
        let config = Config::parse(COVER).unwrap();
        let cover = &config.covers[0];

        assert_eq!(cover.blind_address, 0xa831e5);
        assert_eq!(cover.poll_interval, 300_000);
        assert_eq!(cover.open_duration, 0);
        assert!(!cover.tracks_position());
        assert!(cover.auto_sensors);
        assert_eq!(cover.framing(), FramingBytes::default());
        assert_eq!(cover.codes(), CommandCodes::default());
    }

    #[test]
    fn test_cover_overrides() {
        let toml = format!(
            "{}poll_interval = \"never\"\nopen_duration = \"25s\"\nclose_duration = 22000\n\
             supports_tilt = true\nhop = 0x00\ncommand_tilt = 0x44\n",
            COVER
        );
        let config = Config::parse(&toml).unwrap();
        let cover = &config.covers[0];

        assert_eq!(cover.poll_interval, POLL_NEVER);
        assert_eq!(cover.open_duration, 25_000);
        assert_eq!(cover.close_duration, 22_000);
        assert!(cover.tracks_position());
        assert_eq!(cover.framing().hop, 0x00);
        assert_eq!(cover.codes().tilt, 0x44);
    }

    #[test]
    fn test_one_sided_duration_is_inconsistent() {
        for line in ["open_duration = \"20s\"", "close_duration = \"18s\""] {
            let toml = format!("{}{}\n", COVER, line);
            let result = Config::parse(&toml);
            assert!(
                matches!(result, Err(EleroError::ConfigInconsistency(_))),
                "expected inconsistency for {}",
                line
            );
        }
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let toml = format!(
            "{}\n[[light]]\nname = \"Lamp\"\nblind_address = 0xa831e5\nremote_address = 0x1\nchannel = 1\n",
            COVER
        );
        assert!(matches!(
            Config::parse(&toml),
            Err(EleroError::DuplicateAddress(0xa831e5))
        ));
    }

    #[test]
    fn test_address_must_fit_24_bits() {
        let toml = COVER.replace("0xa831e5", "0x1000000");
        assert!(matches!(Config::parse(&toml), Err(EleroError::Config(_))));
    }

    #[test]
    fn test_packet_type_must_decode_as_command() {
        for pck_inf1 in ["0x44", "0x60", "0xca", "0xc9"] {
            let toml = format!("{}pck_inf1 = {}\n", COVER, pck_inf1);
            assert!(Config::parse(&toml).is_err(), "pck_inf1 {}", pck_inf1);
        }

        let toml = format!("{}pck_inf1 = 0x6b\n", COVER);
        assert_eq!(Config::parse(&toml).unwrap().covers[0].pck_inf1, 0x6b);
    }

    #[test]
    fn test_never_rejected_for_travel_durations() {
        let toml = format!("{}open_duration = \"never\"\nclose_duration = \"never\"\n", COVER);
        assert!(matches!(Config::parse(&toml), Err(EleroError::Config(_))));
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms", false), Ok(250));
        assert_eq!(parse_duration("250", false), Ok(250));
        assert_eq!(parse_duration("25s", false), Ok(25_000));
        assert_eq!(parse_duration("5min", false), Ok(300_000));
        assert_eq!(parse_duration("2h", false), Ok(7_200_000));
        assert_eq!(parse_duration(" NEVER ", true), Ok(POLL_NEVER));
        assert!(parse_duration("5 fortnights", false).is_err());
        assert!(parse_duration("s", false).is_err());
    }

    #[test]
    fn test_duration_reaching_sentinel_rejected() {
        // 1194h is just past u32::MAX milliseconds
        assert!(parse_duration("1194h", true).is_err());
        assert!(parse_duration("4294967295ms", true).is_err());
        assert_eq!(parse_duration("4294967294ms", true), Ok(POLL_NEVER - 1));
    }

    #[test]
    fn test_light_defaults() {
        let toml = "[[light]]\nname = \"Lamp\"\nblind_address = 0x10\nremote_address = 0x20\nchannel = 2\ndim_duration = \"8s\"\n";
        let config = Config::parse(toml).unwrap();
        let light = &config.lights[0];

        assert_eq!(light.dim_duration, 8_000);
        assert_eq!(light.codes().on, 0x20);
        assert_eq!(light.codes().off, 0x40);
        assert_eq!(light.codes().dim_down, 0x40);
    }

    #[test]
    fn test_invalid_dispatcher_values() {
        assert!(Config::parse("[dispatcher]\nmax_attempts = 0\n").is_err());
        assert!(Config::parse("[dispatcher]\nack_timeout_ms = 0\n").is_err());
        assert!(Config::parse("[dispatcher]\nbackoff = \"linear\"\n").is_err());

        let config = Config::parse("[dispatcher]\nbackoff = \"exponential\"\n").unwrap();
        assert_eq!(config.dispatcher.backoff, Backoff::Exponential);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(COVER.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.covers.len(), 1);
        assert_eq!(config.covers[0].name, "Living room");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/elero.toml");
        assert!(matches!(result, Err(EleroError::Io(_))));
    }

    #[test]
    fn test_bundled_default_config_is_valid() {
        let contents = include_str!("../config/default.toml");
        let config = Config::parse(contents).unwrap();
        assert!(!config.covers.is_empty());
    }
}
