//! # Scan / Discovery
//!
//! Collects addresses of unconfigured devices heard on the air.
//!
//! Two kinds of traffic reveal a device:
//! - Command frames from a remote list the device as a destination. Their
//!   channel, packet info, hop and payload bytes are exactly what the bridge
//!   must replay, so entries found this way are authoritative.
//! - Status frames from the device itself carry its address as the source.
//!   Their framing describes the reply format, so entries found this way
//!   are provisional and get upgraded once a command frame is heard.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::elero::protocol::{BlindAddress, Frame, RemoteAddress};

/// A device heard during a scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredBlind {
    pub blind_address: BlindAddress,
    pub remote_address: RemoteAddress,
    pub channel: u8,
    pub payload_1: u8,
    pub payload_2: u8,
    pub pck_inf1: u8,
    pub pck_inf2: u8,
    pub hop: u8,
    pub rssi: Option<f32>,
    /// Last reported state byte, 0 until a status frame is heard
    pub last_state: u8,
    pub times_seen: u32,
    /// Whether the parameters come from a remote's command frame
    pub params_from_command: bool,
}

/// Result of a finished scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub blinds: Vec<DiscoveredBlind>,
}

impl ScanReport {
    /// Render the report as pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// An active scan
#[derive(Debug)]
pub struct ScanSession {
    started_at: u64,
    timeout_ms: u64,
    max_entries: usize,
    entries: Vec<DiscoveredBlind>,
}

impl ScanSession {
    pub fn new(now: u64, timeout_ms: u64, max_entries: usize) -> Self {
        info!("Scan started ({} ms)", timeout_ms);
        Self {
            started_at: now,
            timeout_ms,
            max_entries,
            entries: Vec::new(),
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.started_at) >= self.timeout_ms
    }

    pub fn entries(&self) -> &[DiscoveredBlind] {
        &self.entries
    }

    /// Record a received frame
    ///
    /// # Arguments
    ///
    /// * `frame` - Decoded frame
    /// * `is_known` - Whether an address is already configured
    ///
    /// # Returns
    ///
    /// * `Vec<BlindAddress>` - Addresses seen for the first time
    pub fn observe<F>(&mut self, frame: &Frame, is_known: F) -> Vec<BlindAddress>
    where
        F: Fn(BlindAddress) -> bool,
    {
        let mut new = Vec::new();

        if frame.is_status() {
            if !is_known(frame.source) && self.track(frame, frame.source, frame.forward, frame.state(), false) {
                new.push(frame.source);
            }
        } else if frame.is_command() {
            for &destination in &frame.destinations {
                if !is_known(destination) && self.track(frame, destination, frame.source, 0, true) {
                    new.push(destination);
                }
            }
        }

        new
    }

    /// Update or add an entry, returning whether it was added
    fn track(
        &mut self,
        frame: &Frame,
        address: BlindAddress,
        remote: RemoteAddress,
        state: u8,
        from_command: bool,
    ) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.blind_address == address) {
            if frame.rssi.is_some() {
                entry.rssi = frame.rssi;
            }
            if state != 0 {
                entry.last_state = state;
            }
            entry.times_seen += 1;

            if from_command && !entry.params_from_command {
                fill_params(entry, frame, remote);
                entry.params_from_command = true;
                info!(
                    "Upgraded 0x{:06x} params from command frame: channel {}, pck_inf 0x{:02x}/0x{:02x}, hop 0x{:02x}",
                    address, entry.channel, entry.pck_inf1, entry.pck_inf2, entry.hop
                );
            }
            return false;
        }

        if self.entries.len() >= self.max_entries {
            return false;
        }

        let mut entry = DiscoveredBlind {
            blind_address: address,
            remote_address: remote,
            channel: 0,
            payload_1: 0,
            payload_2: 0,
            pck_inf1: 0,
            pck_inf2: 0,
            hop: 0,
            rssi: frame.rssi,
            last_state: state,
            times_seen: 1,
            params_from_command: from_command,
        };
        fill_params(&mut entry, frame, remote);

        info!(
            "Discovered 0x{:06x} (remote 0x{:06x}, channel {}, from {})",
            address,
            remote,
            entry.channel,
            if from_command { "command" } else { "status" }
        );
        self.entries.push(entry);
        true
    }

    /// End the scan
    pub fn finish(self, now: u64) -> ScanReport {
        info!("Scan finished, {} device(s) found", self.entries.len());
        ScanReport {
            finished_at: Utc::now(),
            duration_ms: now.saturating_sub(self.started_at),
            blinds: self.entries,
        }
    }
}

fn fill_params(entry: &mut DiscoveredBlind, frame: &Frame, remote: RemoteAddress) {
    entry.remote_address = remote;
    entry.channel = frame.channel;
    entry.payload_1 = frame.payload_1;
    entry.payload_2 = frame.payload_2;
    entry.pck_inf1 = frame.packet_type;
    entry.pck_inf2 = frame.packet_info;
    entry.hop = frame.hop;
}
