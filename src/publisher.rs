//! # Sensor/Status Publisher
//!
//! Forwards the latest RSSI and status text of each device to whatever
//! observers the host registered for it. Addresses without a registered
//! sink are ignored.

use std::collections::HashMap;
use tracing::trace;

use crate::elero::protocol::BlindAddress;

/// Receives signal strength readings for one device
#[cfg_attr(test, mockall::automock)]
pub trait RssiSink {
    fn publish_rssi(&mut self, dbm: f32);
}

/// Receives status text for one device
#[cfg_attr(test, mockall::automock)]
pub trait StatusSink {
    fn publish_status(&mut self, text: &str);
}

/// Registry of per-device sinks
#[derive(Default)]
pub struct Publisher {
    rssi: HashMap<BlindAddress, Box<dyn RssiSink>>,
    status: HashMap<BlindAddress, Box<dyn StatusSink>>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the RSSI sink for an address, replacing any previous one
    pub fn register_rssi(&mut self, address: BlindAddress, sink: Box<dyn RssiSink>) {
        self.rssi.insert(address, sink);
    }

    /// Register the status sink for an address, replacing any previous one
    pub fn register_status(&mut self, address: BlindAddress, sink: Box<dyn StatusSink>) {
        self.status.insert(address, sink);
    }

    /// Drop every sink registered for an address
    pub fn unregister(&mut self, address: BlindAddress) {
        self.rssi.remove(&address);
        self.status.remove(&address);
    }

    pub fn has_sinks(&self, address: BlindAddress) -> bool {
        self.rssi.contains_key(&address) || self.status.contains_key(&address)
    }

    /// Forward values to the sinks registered for `address`
    pub fn publish(&mut self, address: BlindAddress, rssi: Option<f32>, status: Option<&str>) {
        if let (Some(dbm), Some(sink)) = (rssi, self.rssi.get_mut(&address)) {
            trace!("RSSI 0x{:06x}: {:.1} dBm", address, dbm);
            sink.publish_rssi(dbm);
        }

        if let (Some(text), Some(sink)) = (status, self.status.get_mut(&address)) {
            trace!("Status 0x{:06x}: {}", address, text);
            sink.publish_status(text);
        }
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("rssi_sinks", &self.rssi.len())
            .field("status_sinks", &self.status.len())
            .finish()
    }
}
