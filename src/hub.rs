//! # Hub
//!
//! Ties the protocol pieces together around one radio.
//!
//! The hub owns every configured device, the dispatcher, the poller, the
//! publisher and an optional scan session. It never touches the radio
//! itself: the caller feeds it received frames and clock ticks, and sends
//! whatever frame [`Hub::tick`] hands back. State changes are collected as
//! [`HubEvent`]s for the host to drain.

use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use crate::blind::cover::{Cover, CoverState};
use crate::blind::light::Light;
use crate::blind::{Capabilities, Motion, StatusUpdate};
use crate::config::{Config, CoverConfig, LightConfig, ScanConfig, DEFAULT_POLL_INTERVAL_MS};
use crate::dispatcher::{DispatchEvent, Dispatcher, Origin, Target};
use crate::elero::decoder::decode_frame;
use crate::elero::protocol::{
    is_valid_command_type, Action, BlindAddress, CommandCodes, Frame, FramingBytes, STATE_UNKNOWN,
};
use crate::error::{EleroError, Result};
use crate::poller::{PollInterval, Poller};
use crate::publisher::Publisher;
use crate::scan::{DiscoveredBlind, ScanReport, ScanSession};

/// Positions closer than this to the estimate need no movement
const POSITION_TOLERANCE: f32 = 0.01;

/// Status text published when a device stops answering polls
const STALE_STATUS: &str = "stale";

/// Name given to adopted devices when none is supplied
const ADOPTED_NAME: &str = "Adopted";

/// High-level request from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Open,
    Close,
    Stop,
    Toggle,
    /// Target position in percent (covers with travel durations)
    SetPosition(u8),
    /// Tilt in percent (covers with tilt support)
    SetTilt(u8),
    Check,
    LightOn,
    LightOff,
    /// Brightness in percent (lights)
    SetBrightness(u8),
}

impl Intent {
    pub fn name(self) -> &'static str {
        match self {
            Intent::Open => "open",
            Intent::Close => "close",
            Intent::Stop => "stop",
            Intent::Toggle => "toggle",
            Intent::SetPosition(_) => "set_position",
            Intent::SetTilt(_) => "set_tilt",
            Intent::Check => "check",
            Intent::LightOn => "light_on",
            Intent::LightOff => "light_off",
            Intent::SetBrightness(_) => "set_brightness",
        }
    }
}

/// Something the host should know about
#[derive(Debug, Clone)]
pub enum HubEvent {
    CoverUpdated {
        address: BlindAddress,
        state: CoverState,
        position: Option<f32>,
        /// The device missed its recent polls
        stale: bool,
    },
    LightUpdated {
        address: BlindAddress,
        on: bool,
        brightness: f32,
        stale: bool,
    },
    /// A command exhausted its retries
    CommandFailed {
        address: BlindAddress,
        action: Action,
        attempts: u32,
    },
    /// Polls went unanswered; the last known status may be outdated
    BlindStale { address: BlindAddress },
    /// A scan heard an unconfigured device
    Discovered { address: BlindAddress },
    ScanFinished(ScanReport),
}

/// Radio diagnostics per device
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Diagnostics {
    pub last_seen: Option<u64>,
    pub last_rssi: Option<f32>,
    /// Raw state byte of the last status frame
    pub last_state: Option<u8>,
}

#[derive(Debug, Clone)]
enum Device {
    Cover(Cover),
    Light(Light),
}

#[derive(Debug)]
struct Entry {
    name: String,
    device: Device,
    diagnostics: Diagnostics,
    /// Added at runtime from a scan rather than from the configuration
    adopted: bool,
}

/// Central coordinator for one radio
#[derive(Debug)]
pub struct Hub {
    devices: BTreeMap<BlindAddress, Entry>,
    dispatcher: Dispatcher,
    poller: Poller,
    publisher: Publisher,
    scan_config: ScanConfig,
    scan: Option<ScanSession>,
    events: Vec<HubEvent>,
}

impl Hub {
    /// Build a hub with every cover and light from `config`
    ///
    /// # Errors
    ///
    /// Returns [`EleroError::DuplicateAddress`] if two devices share an
    /// address.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut hub = Self {
            devices: BTreeMap::new(),
            dispatcher: Dispatcher::new(&config.dispatcher),
            poller: Poller::new(&config.poller),
            publisher: Publisher::new(),
            scan_config: config.scan.clone(),
            scan: None,
            events: Vec::new(),
        };

        for cover in &config.covers {
            hub.add_cover(cover)?;
        }
        for light in &config.lights {
            hub.add_light(light)?;
        }

        info!("Hub ready with {} device(s)", hub.devices.len());
        Ok(hub)
    }

    pub fn add_cover(&mut self, config: &CoverConfig) -> Result<()> {
        let cover = Cover::new(
            u64::from(config.open_duration),
            u64::from(config.close_duration),
            config.supports_tilt,
        );
        let target = Target::new(config.remote_address, config.channel, config.framing(), config.codes());
        self.add_device(&config.name, config.blind_address, Device::Cover(cover), target, config.poll_interval)
    }

    pub fn add_light(&mut self, config: &LightConfig) -> Result<()> {
        let light = Light::new(u64::from(config.dim_duration));
        let target = Target::new(config.remote_address, config.channel, config.framing(), config.codes());
        self.add_device(&config.name, config.blind_address, Device::Light(light), target, config.poll_interval)
    }

    fn add_device(
        &mut self,
        name: &str,
        address: BlindAddress,
        device: Device,
        target: Target,
        poll_interval: u32,
    ) -> Result<()> {
        if self.devices.contains_key(&address) {
            return Err(EleroError::DuplicateAddress(address));
        }

        let interval = PollInterval::from_millis(poll_interval);
        debug!("Registered '{}' at 0x{:06x} (poll {:?})", name, address, interval);

        self.dispatcher.register(address, target);
        self.poller.register(address, interval);
        self.devices.insert(
            address,
            Entry {
                name: name.to_string(),
                device,
                diagnostics: Diagnostics::default(),
                adopted: false,
            },
        );
        Ok(())
    }

    /// Start controlling a device found by a scan
    ///
    /// The device becomes a cover without position tracking, polled at the
    /// default interval. Framing bytes are replayed from the entry only when
    /// they were learned from a remote's command frame; entries seen only
    /// through status frames get the factory defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EleroError::DuplicateAddress`] if the address is already
    /// registered.
    pub fn adopt(&mut self, discovered: &DiscoveredBlind, name: &str, now: u64) -> Result<()> {
        let address = discovered.blind_address;
        let name = if name.is_empty() { ADOPTED_NAME } else { name };

        let framing = if discovered.params_from_command && is_valid_command_type(discovered.pck_inf1) {
            FramingBytes {
                payload_1: discovered.payload_1,
                payload_2: discovered.payload_2,
                pck_inf1: discovered.pck_inf1,
                pck_inf2: discovered.pck_inf2,
                hop: discovered.hop,
            }
        } else {
            FramingBytes::default()
        };
        let target = Target::new(
            discovered.remote_address,
            discovered.channel,
            framing,
            CommandCodes::default(),
        );

        let mut cover = Cover::new(0, 0, false);
        if discovered.last_state != STATE_UNKNOWN {
            cover.apply_status(&StatusUpdate::from_cover_state(discovered.last_state), now);
        }

        self.add_device(name, address, Device::Cover(cover), target, DEFAULT_POLL_INTERVAL_MS)?;
        if let Some(entry) = self.devices.get_mut(&address) {
            entry.adopted = true;
            entry.diagnostics.last_rssi = discovered.rssi;
            entry.diagnostics.last_state =
                (discovered.last_state != STATE_UNKNOWN).then_some(discovered.last_state);
        }

        info!("Adopted 0x{:06x} as '{}'", address, name);
        self.publish_update(address, now);
        Ok(())
    }

    /// Stop controlling an adopted device
    ///
    /// Anything queued for it is dropped along with its sinks.
    ///
    /// # Errors
    ///
    /// - [`EleroError::UnknownBlind`] if nothing is registered at `address`
    /// - [`EleroError::NotAdopted`] for devices from the configuration
    pub fn remove(&mut self, address: BlindAddress) -> Result<()> {
        let entry = self
            .devices
            .get(&address)
            .ok_or(EleroError::UnknownBlind(address))?;
        if !entry.adopted {
            return Err(EleroError::NotAdopted(address));
        }

        self.devices.remove(&address);
        self.dispatcher.unregister(address);
        self.poller.unregister(address);
        self.publisher.unregister(address);
        info!("Removed adopted device 0x{:06x}", address);
        Ok(())
    }

    pub fn is_adopted(&self, address: BlindAddress) -> bool {
        self.devices.get(&address).is_some_and(|e| e.adopted)
    }

    /// Submit an intent for a device
    ///
    /// Local state changes optimistically once the command is queued.
    ///
    /// # Errors
    ///
    /// - [`EleroError::UnknownBlind`] for unregistered addresses
    /// - [`EleroError::Unsupported`] when the device lacks the capability
    /// - [`EleroError::QueueFull`] when the command queue is at capacity
    pub fn submit(&mut self, address: BlindAddress, intent: Intent, now: u64) -> Result<()> {
        let entry = self
            .devices
            .get_mut(&address)
            .ok_or(EleroError::UnknownBlind(address))?;

        let mut device = entry.device.clone();
        let action = match &mut device {
            Device::Cover(cover) => cover_action(address, cover, intent, now)?,
            Device::Light(light) => light_action(address, light, intent, now)?,
        };

        if let Some(action) = action {
            self.dispatcher.submit(address, action, Origin::User)?;
            info!("'{}' {} -> {}", entry.name, intent.name(), action);
        }
        entry.device = device;

        self.publish_update(address, now);
        Ok(())
    }

    /// Advance timers and return the next frame to transmit
    pub fn tick(&mut self, now: u64) -> Option<Vec<u8>> {
        if let Some(event) = self.dispatcher.check_timeout(now) {
            self.handle_dispatch(event, now);
        }

        let mut changed = Vec::new();
        for (&address, entry) in self.devices.iter_mut() {
            let (action, transitioned) = match &mut entry.device {
                Device::Cover(cover) => {
                    let before = cover.motion();
                    let action = cover.tick(now);
                    (action, before != cover.motion())
                }
                Device::Light(light) => {
                    let before = light.is_dimming();
                    let action = light.tick(now);
                    (action, before != light.is_dimming())
                }
            };

            if transitioned || action.is_some() {
                changed.push((address, action));
            }
        }

        for (address, action) in changed {
            if let Some(action) = action {
                debug!("0x{:06x} reached its target, sending {}", address, action);
                if let Err(e) = self.dispatcher.submit(address, action, Origin::User) {
                    warn!("Could not queue {} for 0x{:06x}: {}", action, address, e);
                }
            }
            self.publish_update(address, now);
        }

        for address in self.poller.due(now) {
            if let Err(e) = self.dispatcher.submit(address, Action::Check, Origin::Poll) {
                debug!("Poll for 0x{:06x} not queued: {}", address, e);
            }
        }

        if self.scan.as_ref().is_some_and(|s| s.is_expired(now)) {
            if let Some(scan) = self.scan.take() {
                self.events.push(HubEvent::ScanFinished(scan.finish(now)));
            }
        }

        self.dispatcher.next_transmission(now)
    }

    /// Process a buffer received from the radio
    ///
    /// Malformed or corrupt frames are logged and dropped.
    pub fn handle_frame(&mut self, raw: &[u8], now: u64) {
        let frame = match decode_frame(raw) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Dropping received frame: {}", e);
                return;
            }
        };

        debug!(
            "Received type 0x{:02x} from 0x{:06x}, channel {}, counter {}, rssi {:?}",
            frame.packet_type, frame.source, frame.channel, frame.counter, frame.rssi
        );

        if let Some(entry) = self.devices.get_mut(&frame.source) {
            entry.diagnostics.last_seen = Some(now);
            if frame.rssi.is_some() {
                entry.diagnostics.last_rssi = frame.rssi;
            }
        }
        if frame.rssi.is_some() {
            self.publisher.publish(frame.source, frame.rssi, None);
        }

        if let Some(scan) = self.scan.as_mut() {
            let devices = &self.devices;
            for address in scan.observe(&frame, |a| devices.contains_key(&a)) {
                self.events.push(HubEvent::Discovered { address });
            }
        }

        if frame.is_status() {
            self.handle_status(&frame, now);
        } else if frame.is_command() {
            for &destination in &frame.destinations {
                if self.devices.contains_key(&destination) {
                    debug!("Remote 0x{:06x} commanded 0x{:06x}, polling", frame.source, destination);
                    self.poller.request_immediate(destination);
                }
            }
        }
    }

    fn handle_status(&mut self, frame: &Frame, now: u64) {
        let address = frame.source;
        let state = frame.state();

        let Some(entry) = self.devices.get_mut(&address) else {
            debug!("Status from unconfigured 0x{:06x}", address);
            return;
        };
        entry.diagnostics.last_state = Some(state);

        let update = match &mut entry.device {
            Device::Cover(cover) => {
                let update = StatusUpdate::from_cover_state(state);
                if let Some(fault) = update.fault {
                    warn!("'{}' reports {:?}", entry.name, fault);
                }
                cover.apply_status(&update, now);
                update
            }
            Device::Light(light) => {
                let update = StatusUpdate::from_light_state(state);
                light.apply_status(&update, now);
                update
            }
        };

        self.publisher.publish(address, None, Some(update.text()));

        if self.poller.on_reply(address) {
            info!("0x{:06x} is reachable again", address);
        }
        if let Some(event) = self.dispatcher.on_reply(address, now) {
            self.handle_dispatch(event, now);
        }

        self.publish_update(address, now);
    }

    /// The last frame returned by [`Hub::tick`] could not be sent
    pub fn transmit_failed(&mut self, now: u64) {
        if let Some(event) = self.dispatcher.transmit_failed(now) {
            self.handle_dispatch(event, now);
        }
    }

    fn handle_dispatch(&mut self, event: DispatchEvent, now: u64) {
        match event {
            DispatchEvent::Completed { address, action } => {
                let follow_up = match self.devices.get_mut(&address).map(|e| &mut e.device) {
                    Some(Device::Light(light)) => light.command_completed(action, now),
                    Some(Device::Cover(cover)) => {
                        if action == Action::Tilt {
                            cover.tilt_finished();
                        }
                        None
                    }
                    None => None,
                };

                if let Some(action) = follow_up {
                    if let Err(e) = self.dispatcher.submit(address, action, Origin::User) {
                        warn!("Could not queue {} for 0x{:06x}: {}", action, address, e);
                    }
                }
            }
            DispatchEvent::Failed {
                address,
                action,
                attempts,
            } => {
                error!(
                    "{}",
                    EleroError::CommandTimeout {
                        address,
                        action: action.to_string(),
                        attempts,
                    }
                );

                match self.devices.get_mut(&address).map(|e| &mut e.device) {
                    Some(Device::Cover(cover)) => cover.mark_unknown(now),
                    Some(Device::Light(light)) => light.command_failed(now),
                    None => {}
                }

                self.events.push(HubEvent::CommandFailed {
                    address,
                    action,
                    attempts,
                });
                self.publish_update(address, now);
            }
            DispatchEvent::PollMissed { address } => {
                if !self.poller.on_miss(address) {
                    return;
                }

                if let Some(Device::Cover(cover)) = self.devices.get_mut(&address).map(|e| &mut e.device) {
                    cover.mark_unknown(now);
                }
                self.publisher.publish(address, None, Some(STALE_STATUS));
                self.events.push(HubEvent::BlindStale { address });
                self.publish_update(address, now);
            }
        }
    }

    fn publish_update(&mut self, address: BlindAddress, now: u64) {
        let Some(entry) = self.devices.get(&address) else {
            return;
        };
        let stale = self.poller.is_stale(address);

        let (event, moving) = match &entry.device {
            Device::Cover(cover) => (
                HubEvent::CoverUpdated {
                    address,
                    state: cover.state(now),
                    position: cover.position_at(now),
                    stale,
                },
                cover.motion().is_moving(),
            ),
            Device::Light(light) => (
                HubEvent::LightUpdated {
                    address,
                    on: light.is_on(),
                    brightness: light.brightness_at(now),
                    stale,
                },
                light.is_dimming(),
            ),
        };

        self.poller.set_moving(address, moving, now);
        self.events.push(event);
    }

    /// Take all events collected since the last call
    pub fn drain_events(&mut self) -> Vec<HubEvent> {
        std::mem::take(&mut self.events)
    }

    /// Start discovery, discarding any scan already running
    pub fn start_scan(&mut self, now: u64) {
        if self.scan.is_some() {
            warn!("Restarting active scan");
        }
        self.scan = Some(ScanSession::new(
            now,
            self.scan_config.timeout_ms,
            self.scan_config.max_discovered,
        ));
    }

    /// Stop discovery and return what was found
    pub fn stop_scan(&mut self, now: u64) -> Result<ScanReport> {
        self.scan
            .take()
            .map(|scan| scan.finish(now))
            .ok_or(EleroError::ScanNotActive)
    }

    pub fn is_scanning(&self) -> bool {
        self.scan.is_some()
    }

    pub fn publisher_mut(&mut self) -> &mut Publisher {
        &mut self.publisher
    }

    pub fn cover(&self, address: BlindAddress) -> Option<&Cover> {
        match &self.devices.get(&address)?.device {
            Device::Cover(cover) => Some(cover),
            Device::Light(_) => None,
        }
    }

    pub fn light(&self, address: BlindAddress) -> Option<&Light> {
        match &self.devices.get(&address)?.device {
            Device::Light(light) => Some(light),
            Device::Cover(_) => None,
        }
    }

    pub fn name(&self, address: BlindAddress) -> Option<&str> {
        self.devices.get(&address).map(|e| e.name.as_str())
    }

    pub fn capabilities(&self, address: BlindAddress) -> Option<Capabilities> {
        Some(match &self.devices.get(&address)?.device {
            Device::Cover(cover) => cover.capabilities(),
            Device::Light(light) => light.capabilities(),
        })
    }

    pub fn diagnostics(&self, address: BlindAddress) -> Option<&Diagnostics> {
        self.devices.get(&address).map(|e| &e.diagnostics)
    }

    pub fn is_stale(&self, address: BlindAddress) -> bool {
        self.poller.is_stale(address)
    }

    /// Configured addresses in ascending order
    pub fn addresses(&self) -> impl Iterator<Item = BlindAddress> + '_ {
        self.devices.keys().copied()
    }
}

fn unsupported(address: BlindAddress, intent: Intent) -> EleroError {
    EleroError::Unsupported {
        address,
        intent: intent.name().to_string(),
    }
}

fn percent(value: u8) -> f32 {
    f32::from(value.min(100)) / 100.0
}

fn cover_action(
    address: BlindAddress,
    cover: &mut Cover,
    intent: Intent,
    now: u64,
) -> Result<Option<Action>> {
    let action = match intent {
        Intent::Open => {
            cover.start(Motion::Opening, None, now);
            Some(Action::Up)
        }
        Intent::Close => {
            cover.start(Motion::Closing, None, now);
            Some(Action::Down)
        }
        Intent::Stop => {
            cover.stop(now);
            Some(Action::Stop)
        }
        Intent::Toggle => match cover.toggle_direction() {
            Some(Motion::Opening) => return cover_action(address, cover, Intent::Open, now),
            Some(_) => return cover_action(address, cover, Intent::Close, now),
            None => return cover_action(address, cover, Intent::Stop, now),
        },
        Intent::SetPosition(value) => {
            if !cover.tracks_position() {
                return Err(unsupported(address, intent));
            }

            let target = percent(value);
            if value >= 100 {
                return cover_action(address, cover, Intent::Open, now);
            }
            if value == 0 {
                return cover_action(address, cover, Intent::Close, now);
            }

            // An unknown position is treated as closed
            let current = cover.position_at(now).unwrap_or(0.0);
            if target > current + POSITION_TOLERANCE {
                cover.start(Motion::Opening, Some(target), now);
                Some(Action::Up)
            } else if target < current - POSITION_TOLERANCE {
                cover.start(Motion::Closing, Some(target), now);
                Some(Action::Down)
            } else {
                None
            }
        }
        Intent::SetTilt(value) => {
            if !cover.capabilities().tilt {
                return Err(unsupported(address, intent));
            }
            cover.set_tilt(percent(value), now)
        }
        Intent::Check => Some(Action::Check),
        Intent::LightOn | Intent::LightOff | Intent::SetBrightness(_) => {
            return Err(unsupported(address, intent));
        }
    };

    Ok(action)
}

fn light_action(
    address: BlindAddress,
    light: &mut Light,
    intent: Intent,
    now: u64,
) -> Result<Option<Action>> {
    let action = match intent {
        Intent::LightOn => Some(light.turn_on()),
        Intent::LightOff => Some(light.turn_off()),
        Intent::Toggle => Some(if light.is_on() {
            light.turn_off()
        } else {
            light.turn_on()
        }),
        Intent::SetBrightness(value) => light.set_brightness(percent(value), now),
        Intent::Stop => {
            light.stop(now);
            Some(Action::Stop)
        }
        Intent::Check => Some(Action::Check),
        Intent::Open | Intent::Close | Intent::SetPosition(_) | Intent::SetTilt(_) => {
            return Err(unsupported(address, intent));
        }
    };

    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elero::encoder::{append_radio_status, encode_command_frame, encode_status_frame};
    use crate::elero::protocol::*;
    use crate::publisher::{MockRssiSink, MockStatusSink};
    use mockall::predicate::eq;

    const COVER: u32 = 0xa831e5;
    const LIGHT: u32 = 0xb11a01;
    const REMOTE: u32 = 0x123456;

    fn hub(toml: &str) -> Hub {
        Hub::from_config(&Config::parse(toml).unwrap()).unwrap()
    }

    fn tracked_cover() -> Hub {
        hub(r#"
            [[cover]]
            name = "Living room"
            blind_address = 0xa831e5
            remote_address = 0x123456
            channel = 4
            poll_interval = "never"
            open_duration = "20s"
            close_duration = "20s"
        "#)
    }

    fn plain_cover(poll: &str) -> Hub {
        hub(&format!(
            r#"
            [[cover]]
            name = "Kitchen"
            blind_address = 0xa831e5
            remote_address = 0x123456
            channel = 4
            poll_interval = "{poll}"
        "#
        ))
    }

    fn dimmable_light() -> Hub {
        hub(r#"
            [[light]]
            name = "Terrace"
            blind_address = 0xb11a01
            remote_address = 0x123456
            channel = 6
            poll_interval = "never"
            dim_duration = "8s"
        "#)
    }

    fn status(blind: u32, state: u8) -> Vec<u8> {
        append_radio_status(
            encode_status_frame(&StatusFrame {
                counter: 1,
                blind,
                remote: REMOTE,
                channel: 4,
                state,
            }),
            0x20,
            true,
        )
    }

    fn sent_command(frame: &[u8]) -> (u32, u8) {
        let decoded = decode_frame(frame).unwrap();
        (decoded.destinations[0], decoded.command())
    }

    #[test]
    fn test_open_sends_up_frame() {
        let mut hub = plain_cover("never");
        hub.submit(COVER, Intent::Open, 0).unwrap();

        let frame = hub.tick(0).unwrap();
        assert_eq!(frame.len(), 30);
        assert_eq!(sent_command(&frame), (COVER, COMMAND_UP));
        assert_eq!(decode_frame(&frame).unwrap().counter, 1);
        assert_eq!(hub.cover(COVER).unwrap().state(0), CoverState::Opening);
    }

    #[test]
    fn test_position_estimate_then_status_override() {
        let mut hub = tracked_cover();
        hub.handle_frame(&status(COVER, STATE_BOTTOM), 0);
        assert_eq!(hub.cover(COVER).unwrap().state(0), CoverState::Closed);

        hub.submit(COVER, Intent::Open, 1_000).unwrap();
        let position = hub.cover(COVER).unwrap().position_at(11_000).unwrap();
        assert!((position - 0.5).abs() < 1e-6);

        hub.handle_frame(&status(COVER, STATE_TOP), 12_000);
        assert_eq!(hub.cover(COVER).unwrap().state(12_000), CoverState::Open);
        assert_eq!(hub.cover(COVER).unwrap().position_at(12_000), Some(1.0));
    }

    #[test]
    fn test_set_position_sends_stop_at_target() {
        let mut hub = tracked_cover();
        hub.handle_frame(&status(COVER, STATE_BOTTOM), 0);
        hub.submit(COVER, Intent::SetPosition(50), 0).unwrap();

        let up = hub.tick(0).unwrap();
        assert_eq!(sent_command(&up), (COVER, COMMAND_UP));
        hub.handle_frame(&status(COVER, STATE_MOVING_UP), 100);

        assert!(hub.tick(5_000).is_none());
        let stop = hub.tick(10_000).unwrap();
        assert_eq!(sent_command(&stop), (COVER, COMMAND_STOP));
        assert_eq!(
            hub.cover(COVER).unwrap().state(10_000),
            CoverState::PartiallyOpen(50)
        );
    }

    #[test]
    fn test_three_timeouts_mark_cover_unknown() {
        let mut hub = plain_cover("never");
        hub.submit(COVER, Intent::Close, 0).unwrap();

        let first = hub.tick(0).unwrap();
        assert!(hub.tick(500).is_none());
        let second = hub.tick(550).unwrap();
        assert!(hub.tick(1_050).is_none());
        let third = hub.tick(1_100).unwrap();
        assert_eq!(first, second);
        assert_eq!(second, third);

        assert!(hub.tick(1_600).is_none());
        assert_eq!(hub.cover(COVER).unwrap().state(1_600), CoverState::Unknown);
        assert!(hub.drain_events().iter().any(|e| matches!(
            e,
            HubEvent::CommandFailed { address: COVER, action: Action::Down, attempts: 3 }
        )));

        for t in (1_700..60_000).step_by(100) {
            assert!(hub.tick(t).is_none(), "no fourth attempt");
        }
    }

    #[test]
    fn test_reply_completes_command() {
        let mut hub = plain_cover("never");
        hub.submit(COVER, Intent::Open, 0).unwrap();
        hub.tick(0).unwrap();

        hub.handle_frame(&status(COVER, STATE_START_MOVING_UP), 200);
        assert!(hub.tick(700).is_none());
        assert!(hub.tick(2_000).is_none());
        assert_eq!(hub.diagnostics(COVER).unwrap().last_state, Some(STATE_START_MOVING_UP));
        assert!(hub.diagnostics(COVER).unwrap().last_rssi.is_some());
    }

    #[test]
    fn test_never_polled_cover_stays_silent() {
        let mut hub = plain_cover("never");
        for t in (0..3_600_000u64).step_by(1_000) {
            assert!(hub.tick(t).is_none());
        }
    }

    #[test]
    fn test_poll_sends_check_and_goes_stale() {
        let mut hub = plain_cover("10s");

        let mut sink = MockStatusSink::new();
        sink.expect_publish_status().with(eq("top")).times(2).return_const(());
        sink.expect_publish_status().with(eq("stale")).times(1).return_const(());
        hub.publisher_mut().register_status(COVER, Box::new(sink));

        hub.handle_frame(&status(COVER, STATE_TOP), 0);
        assert_eq!(hub.cover(COVER).unwrap().state(0), CoverState::Open);
        hub.drain_events();

        for round in 0..3u64 {
            let start = round * 10_000;
            let frame = hub.tick(start).unwrap();
            assert_eq!(sent_command(&frame), (COVER, COMMAND_CHECK));
            assert!(hub.tick(start + 500).is_none());
        }

        assert!(hub.is_stale(COVER));
        let events = hub.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, HubEvent::BlindStale { address: COVER })));
        assert!(matches!(
            events.last(),
            Some(HubEvent::CoverUpdated { state: CoverState::Unknown, stale: true, .. })
        ));

        hub.handle_frame(&status(COVER, STATE_TOP), 31_000);
        assert!(!hub.is_stale(COVER));
        assert!(matches!(
            hub.drain_events().last(),
            Some(HubEvent::CoverUpdated { state: CoverState::Open, stale: false, .. })
        ));
    }

    #[test]
    fn test_polls_for_shared_remote_never_overlap() {
        let mut hub = hub(r#"
            [poller]
            stagger_ms = 0

            [[cover]]
            name = "Left"
            blind_address = 0x000001
            remote_address = 0x123456
            channel = 4
            poll_interval = "1s"

            [[cover]]
            name = "Right"
            blind_address = 0x000002
            remote_address = 0x123456
            channel = 5
            poll_interval = "1s"
        "#);

        let mut sends = Vec::new();
        for t in (0..10_000u64).step_by(10) {
            if let Some(frame) = hub.tick(t) {
                sends.push((t, sent_command(&frame).0));
            }
        }

        assert!(sends.iter().any(|&(_, blind)| blind == 0x000001));
        assert!(sends.iter().any(|&(_, blind)| blind == 0x000002));
        for pair in sends.windows(2) {
            // ack timeout plus frame gap
            assert!(pair[1].0 - pair[0].0 >= 550);
        }
    }

    #[test]
    fn test_stop_preempts_in_flight_command() {
        let mut hub = plain_cover("never");
        hub.submit(COVER, Intent::Open, 0).unwrap();
        hub.tick(0).unwrap();

        hub.submit(COVER, Intent::Stop, 100).unwrap();
        let stop = hub.tick(100).unwrap();
        assert_eq!(sent_command(&stop), (COVER, COMMAND_STOP));
        assert_eq!(decode_frame(&stop).unwrap().counter, 2);
    }

    #[test]
    fn test_unsupported_intents() {
        let mut hub = plain_cover("never");
        assert!(matches!(
            hub.submit(COVER, Intent::SetPosition(40), 0),
            Err(EleroError::Unsupported { .. })
        ));
        assert!(matches!(
            hub.submit(COVER, Intent::SetTilt(100), 0),
            Err(EleroError::Unsupported { .. })
        ));
        assert!(matches!(
            hub.submit(COVER, Intent::LightOn, 0),
            Err(EleroError::Unsupported { .. })
        ));
        assert!(matches!(
            hub.submit(0x000001, Intent::Open, 0),
            Err(EleroError::UnknownBlind(0x000001))
        ));
        assert!(hub.tick(0).is_none());
    }

    #[test]
    fn test_toggle_alternates_direction() {
        let mut hub = plain_cover("never");
        hub.handle_frame(&status(COVER, STATE_BOTTOM), 0);

        hub.submit(COVER, Intent::Toggle, 0).unwrap();
        assert_eq!(sent_command(&hub.tick(0).unwrap()), (COVER, COMMAND_UP));

        hub.submit(COVER, Intent::Toggle, 100).unwrap();
        assert_eq!(sent_command(&hub.tick(100).unwrap()), (COVER, COMMAND_STOP));
    }

    #[test]
    fn test_light_brightness_switches_on_then_dims() {
        let mut hub = dimmable_light();
        hub.submit(LIGHT, Intent::SetBrightness(50), 0).unwrap();

        assert_eq!(sent_command(&hub.tick(0).unwrap()), (LIGHT, COMMAND_UP));
        hub.handle_frame(&status(LIGHT, STATE_ON), 100);

        assert_eq!(sent_command(&hub.tick(150).unwrap()), (LIGHT, COMMAND_DOWN));
        hub.handle_frame(&status(LIGHT, STATE_ON), 200);

        assert!(hub.tick(4_000).is_none());
        assert_eq!(sent_command(&hub.tick(4_100).unwrap()), (LIGHT, COMMAND_STOP));

        let light = hub.light(LIGHT).unwrap();
        assert!(light.is_on());
        assert!((light.brightness_at(4_100) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_remote_command_triggers_poll() {
        let mut hub = plain_cover("5min");
        assert!(hub.tick(0).is_some());
        hub.handle_frame(&status(COVER, STATE_TOP), 100);
        hub.tick(1_000);

        let remote = encode_command_frame(&CommandFrame {
            counter: 9,
            blind: COVER,
            remote: 0x777777,
            channel: 1,
            command: COMMAND_DOWN,
            framing: FramingBytes::default(),
        });
        hub.handle_frame(&remote, 2_000);

        let check = hub.tick(2_000).unwrap();
        assert_eq!(sent_command(&check), (COVER, COMMAND_CHECK));
    }

    #[test]
    fn test_corrupt_frame_is_dropped() {
        let mut hub = plain_cover("never");
        let mut bad = status(COVER, STATE_TOP);
        let last = bad.len() - 1;
        bad[last] = 0x00;

        hub.handle_frame(&bad, 0);
        hub.handle_frame(&[0x05, 0x01], 0);
        assert_eq!(hub.diagnostics(COVER).unwrap().last_seen, None);
        assert!(hub.drain_events().is_empty());
    }

    #[test]
    fn test_publisher_receives_rssi_and_status() {
        let mut hub = plain_cover("never");

        let mut rssi = MockRssiSink::new();
        rssi.expect_publish_rssi().with(eq(rssi_dbm(0x20))).times(1).return_const(());
        let mut text = MockStatusSink::new();
        text.expect_publish_status().with(eq("top")).times(1).return_const(());

        hub.publisher_mut().register_rssi(COVER, Box::new(rssi));
        hub.publisher_mut().register_status(COVER, Box::new(text));

        hub.handle_frame(&status(COVER, STATE_TOP), 0);
    }

    #[test]
    fn test_scan_discovers_unknown_devices() {
        let mut hub = plain_cover("never");
        hub.start_scan(0);

        hub.handle_frame(&status(0x0badf0, STATE_BOTTOM), 100);
        hub.handle_frame(&status(COVER, STATE_TOP), 200);

        let events = hub.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, HubEvent::Discovered { address: 0x0badf0 })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, HubEvent::Discovered { address: COVER })));

        let report = hub.stop_scan(1_000).unwrap();
        assert_eq!(report.blinds.len(), 1);
        assert!(matches!(hub.stop_scan(1_000), Err(EleroError::ScanNotActive)));
    }

    #[test]
    fn test_scan_expires() {
        let mut hub = plain_cover("never");
        hub.start_scan(0);
        hub.tick(59_999);
        assert!(hub.is_scanning());

        hub.tick(60_000);
        assert!(!hub.is_scanning());
        assert!(hub
            .drain_events()
            .iter()
            .any(|e| matches!(e, HubEvent::ScanFinished(_))));
    }

    #[test]
    fn test_duplicate_device_rejected() {
        let mut hub = plain_cover("never");
        let config = Config::parse(
            r#"
            [[light]]
            name = "Clash"
            blind_address = 0xa831e5
            remote_address = 0x123456
            channel = 1
        "#,
        )
        .unwrap();

        assert!(matches!(
            hub.add_light(&config.lights[0]),
            Err(EleroError::DuplicateAddress(COVER))
        ));
    }

    #[test]
    fn test_adopt_replays_remote_framing() {
        let mut hub = plain_cover("never");
        hub.start_scan(0);

        let remote_command = CommandFrame {
            counter: 40,
            blind: 0x0c0ffe,
            remote: 0x654321,
            channel: 9,
            command: COMMAND_UP,
            framing: FramingBytes {
                pck_inf1: PKT_TYPE_COMMAND_ALT,
                hop: 0x05,
                ..FramingBytes::default()
            },
        };
        hub.handle_frame(&encode_command_frame(&remote_command), 10);
        let report = hub.stop_scan(100).unwrap();
        let entry = &report.blinds[0];
        assert!(entry.params_from_command);

        hub.adopt(entry, "Patio", 100).unwrap();
        assert!(hub.is_adopted(0x0c0ffe));
        assert_eq!(hub.name(0x0c0ffe), Some("Patio"));

        hub.submit(0x0c0ffe, Intent::Open, 200).unwrap();
        let sent = decode_frame(&hub.tick(200).unwrap()).unwrap().to_command().unwrap();
        assert_eq!(sent.blind, 0x0c0ffe);
        assert_eq!(sent.remote, 0x654321);
        assert_eq!(sent.channel, 9);
        assert_eq!(sent.command, COMMAND_UP);
        assert_eq!(sent.framing, remote_command.framing);

        assert!(matches!(
            hub.adopt(entry, "Again", 300),
            Err(EleroError::DuplicateAddress(0x0c0ffe))
        ));
    }

    #[test]
    fn test_adopt_status_only_entry_uses_defaults() {
        let mut hub = plain_cover("never");
        hub.start_scan(0);
        hub.handle_frame(&status(0x0badf0, STATE_TOP), 10);
        let report = hub.stop_scan(100).unwrap();
        let entry = &report.blinds[0];
        assert!(!entry.params_from_command);

        hub.adopt(entry, "", 100).unwrap();
        assert_eq!(hub.name(0x0badf0), Some("Adopted"));
        assert_eq!(hub.cover(0x0badf0).unwrap().state(100), CoverState::Open);
        assert_eq!(hub.diagnostics(0x0badf0).unwrap().last_state, Some(STATE_TOP));

        hub.submit(0x0badf0, Intent::Close, 200).unwrap();
        let sent = decode_frame(&hub.tick(200).unwrap()).unwrap().to_command().unwrap();
        assert_eq!(sent.remote, REMOTE);
        assert_eq!(sent.channel, 4);
        assert_eq!(sent.command, COMMAND_DOWN);
        assert_eq!(sent.framing, FramingBytes::default());
    }

    #[test]
    fn test_adopted_device_is_skipped_by_later_scans() {
        let mut hub = plain_cover("never");
        hub.start_scan(0);
        hub.handle_frame(&status(0x0badf0, STATE_BOTTOM), 10);
        let report = hub.stop_scan(100).unwrap();
        hub.adopt(&report.blinds[0], "Shed", 100).unwrap();
        hub.drain_events();

        hub.start_scan(200);
        hub.handle_frame(&status(0x0badf0, STATE_BOTTOM), 300);
        assert!(!hub
            .drain_events()
            .iter()
            .any(|e| matches!(e, HubEvent::Discovered { .. })));
        assert!(hub.stop_scan(400).unwrap().blinds.is_empty());
    }

    #[test]
    fn test_remove_only_adopted_devices() {
        let mut hub = plain_cover("never");
        hub.start_scan(0);
        hub.handle_frame(&status(0x0badf0, STATE_BOTTOM), 10);
        let report = hub.stop_scan(100).unwrap();
        hub.adopt(&report.blinds[0], "Shed", 100).unwrap();

        hub.submit(0x0badf0, Intent::Open, 200).unwrap();
        hub.tick(200).unwrap();

        hub.remove(0x0badf0).unwrap();
        assert!(hub.cover(0x0badf0).is_none());
        assert!(hub.tick(1_000).is_none(), "pending command dropped with the device");
        assert!(matches!(
            hub.submit(0x0badf0, Intent::Open, 1_100),
            Err(EleroError::UnknownBlind(0x0badf0))
        ));
        assert!(matches!(hub.remove(0x0badf0), Err(EleroError::UnknownBlind(0x0badf0))));
        assert!(matches!(hub.remove(COVER), Err(EleroError::NotAdopted(COVER))));
    }
}
