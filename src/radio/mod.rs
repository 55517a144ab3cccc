//! # Radio Link Module
//!
//! Handles communication with the Elero radio bridge over a serial line.
//!
//! The bridge forwards raw Elero frames in both directions:
//! - Outgoing: `[length][length bytes]`, exactly as produced by the encoder
//! - Incoming: `[length][length bytes][rssi][lqi|crc_ok]`
//!
//! The radio is half-duplex; serializing transmissions is the dispatcher's
//! job. This module only moves bytes and tracks link health.

pub mod port_trait;

use crate::config::RadioConfig;
use crate::elero::decoder::wire_size;
use crate::elero::protocol::{ELERO_HEADER_SIZE, ELERO_MAX_PACKET_SIZE};
use crate::error::TransportError;
use bytes::{Buf, BytesMut};
use port_trait::{RadioPort, TokioSerialPort};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Default radio bridge baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default radio bridge device paths to try (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // USB-to-serial adapters (CP210x / CH340 bridges)
    "/dev/ttyACM0", // USB CDC devices
];

/// Size of a single read from the port
const READ_CHUNK_SIZE: usize = 64;

/// Radio bridge link
///
/// Owns the port and a receive buffer. Exactly one instance exists per
/// physical radio; it is passed by `&mut` to the code that drives it.
pub struct RadioLink {
    /// Port handle
    port: Box<dyn RadioPort>,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
    /// Bytes received but not yet framed
    rx_buffer: BytesMut,
    /// Send failures since the last successful send
    consecutive_failures: u32,
    /// Failures after which the link is reported unhealthy
    max_consecutive_failures: u32,
}

impl std::fmt::Debug for RadioLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadioLink")
            .field("device_path", &self.device_path)
            .field("consecutive_failures", &self.consecutive_failures)
            .finish_non_exhaustive()
    }
}

impl RadioLink {
    /// Open the radio bridge described by the configuration
    ///
    /// Uses the configured port if set, otherwise auto-detects the device by
    /// trying common paths.
    ///
    /// # Errors
    ///
    /// Returns error if no radio bridge could be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use elero_bridge::config::RadioConfig;
    /// use elero_bridge::radio::RadioLink;
    ///
    /// fn main() -> anyhow::Result<()> {
    ///     let link = RadioLink::open(&RadioConfig::default())?;
    ///     println!("Connected to: {}", link.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(config: &RadioConfig) -> Result<Self, TransportError> {
        match &config.port {
            Some(port) => Self::open_with_paths(
                &[port.as_str()],
                config.baud_rate,
                config.max_consecutive_failures,
            ),
            None => Self::open_with_paths(
                DEFAULT_DEVICE_PATHS,
                config.baud_rate,
                config.max_consecutive_failures,
            ),
        }
    }

    /// Open the radio bridge trying custom device paths in order
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyUSB0"])
    /// * `baud_rate` - Serial speed of the bridge
    /// * `max_consecutive_failures` - Failures before the link is unhealthy
    ///
    /// # Returns
    ///
    /// * `Result<RadioLink, TransportError>` - Connected link or error
    pub fn open_with_paths(
        paths: &[&str],
        baud_rate: u32,
        max_consecutive_failures: u32,
    ) -> Result<Self, TransportError> {
        for path in paths {
            debug!("Trying to open radio bridge: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened radio bridge at {} ({} baud)", path, baud_rate);
                    return Ok(Self::from_port(
                        Box::new(TokioSerialPort::new(port)),
                        path,
                        max_consecutive_failures,
                    ));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(TransportError::PortNotFound(paths.join(", ")))
    }

    /// Wrap an already opened port
    pub fn from_port(
        port: Box<dyn RadioPort>,
        device_path: &str,
        max_consecutive_failures: u32,
    ) -> Self {
        Self {
            port,
            device_path: device_path.to_string(),
            rx_buffer: BytesMut::with_capacity(usize::from(ELERO_MAX_PACKET_SIZE) * 2),
            consecutive_failures: 0,
            max_consecutive_failures,
        }
    }

    /// Open a specific serial port with 8N1 settings
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream, TransportError> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| TransportError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Send an encoded frame to the radio bridge
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unavailable`] once the consecutive failure
    /// limit is reached, [`TransportError::Serial`] for individual failures.
    pub async fn send_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        match self.write_frame(frame).await {
            Ok(()) => {
                self.consecutive_failures = 0;
                debug!("Sent frame ({} bytes)", frame.len());
                Ok(())
            }
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    "Send failed on {} ({} consecutive): {}",
                    self.device_path, self.consecutive_failures, e
                );
                if self.is_healthy() {
                    Err(e)
                } else {
                    Err(TransportError::Unavailable(self.consecutive_failures))
                }
            }
        }
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.port
            .write_all(frame)
            .await
            .map_err(|e| TransportError::Serial(format!("Failed to write frame: {}", e)))?;

        self.port
            .flush()
            .await
            .map_err(|e| TransportError::Serial(format!("Failed to flush port: {}", e)))?;

        Ok(())
    }

    /// Receive the next complete frame, including the radio status bytes
    ///
    /// Cancel-safe: partial data stays buffered across calls, so this can be
    /// used as a `tokio::select!` branch.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] at end of stream and
    /// [`TransportError::Io`] on read failures.
    pub async fn recv_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            if let Some(frame) = self.take_frame() {
                return Ok(frame);
            }

            let n = self.port.read(&mut chunk).await?;
            if n == 0 {
                return Err(TransportError::Closed);
            }
            self.rx_buffer.extend_from_slice(&chunk[..n]);
        }
    }

    /// Split a complete frame off the receive buffer
    ///
    /// Skips length bytes that cannot start a valid frame so the stream
    /// resynchronizes after line noise.
    fn take_frame(&mut self) -> Option<Vec<u8>> {
        while let Some(&length) = self.rx_buffer.first() {
            if usize::from(length) < ELERO_HEADER_SIZE || length > ELERO_MAX_PACKET_SIZE {
                debug!("Discarding invalid length byte 0x{:02x}", length);
                self.rx_buffer.advance(1);
                continue;
            }

            let needed = wire_size(length);
            if self.rx_buffer.len() < needed {
                return None;
            }
            return Some(self.rx_buffer.split_to(needed).to_vec());
        }

        None
    }

    /// Whether the link is below the consecutive failure limit
    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures < self.max_consecutive_failures
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Get the device path of the opened port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}
