//! # Elero Protocol Constants and Types
//!
//! Core protocol definitions for Elero RF communication.
//!
//! Frame layout (commands sent by a remote, 30 bytes on air):
//!
//! ```text
//! [0]  length (0x1d)          [6]      channel
//! [1]  counter                [7..10]  source address
//! [2]  packet type (pck_inf1) [10..13] backward address
//! [3]  pck_inf2               [13..16] forward address
//! [4]  hop                    [16]     destination count
//! [5]  system address         [17..20] destination (blind) address
//! [20] payload_1  [21] payload_2  [22..30] scrambled block
//! ```

use serde::Deserialize;

/// 24-bit address of a physical blind or light actuator
pub type BlindAddress = u32;

/// 24-bit address of the (virtual) remote sending commands
pub type RemoteAddress = u32;

/// Largest valid 24-bit address
pub const ADDRESS_MAX: u32 = 0xFF_FFFF;

/// Length byte of every frame we transmit
pub const ELERO_MSG_LENGTH: u8 = 0x1d;

/// Maximum frame length according to FCC documents
pub const ELERO_MAX_PACKET_SIZE: u8 = 57;

/// Maximum destination count accepted on receive
pub const ELERO_MAX_DESTINATIONS: u8 = 20;

/// System address byte
pub const ELERO_SYS_ADDR: u8 = 0x01;

/// Destination count in commands we send
pub const ELERO_DEST_COUNT: u8 = 0x01;

/// Size of the fixed header up to and including the destination count
pub const ELERO_HEADER_SIZE: usize = 17;

/// Size of the scrambled payload block
pub const ELERO_BLOCK_SIZE: usize = 8;

/// Bytes the radio appends to every received frame (RSSI, LQI/CRC)
pub const RADIO_STATUS_SIZE: usize = 2;

/// Multiplier for the counter-derived rolling code
pub const ELERO_CRYPTO_MULT: u16 = 0x708f;

/// Command packet types (remote → blind)
pub const PKT_TYPE_COMMAND: u8 = 0x6a;
pub const PKT_TYPE_COMMAND_ALT: u8 = 0x69;

/// Status packet types (blind → remote)
pub const PKT_TYPE_STATUS: u8 = 0xca;
pub const PKT_TYPE_STATUS_ALT: u8 = 0xc9;

/// Packet types above this value use 3-byte destination addresses
pub const PKT_TYPE_LONG_ADDRESS_THRESHOLD: u8 = 0x60;

/// Index of the command byte inside the decrypted block
pub const BLOCK_COMMAND_INDEX: usize = 2;

/// Index of the state byte inside the decrypted block
pub const BLOCK_STATE_INDEX: usize = 6;

// Default command bytes
pub const COMMAND_CHECK: u8 = 0x00;
pub const COMMAND_STOP: u8 = 0x10;
pub const COMMAND_UP: u8 = 0x20;
pub const COMMAND_TILT: u8 = 0x24;
pub const COMMAND_DOWN: u8 = 0x40;
pub const COMMAND_INTERMEDIATE: u8 = 0x44;

// State bytes reported in status frames
pub const STATE_UNKNOWN: u8 = 0x00;
pub const STATE_TOP: u8 = 0x01;
pub const STATE_BOTTOM: u8 = 0x02;
pub const STATE_INTERMEDIATE: u8 = 0x03;
pub const STATE_TILT: u8 = 0x04;
pub const STATE_BLOCKING: u8 = 0x05;
pub const STATE_OVERHEATED: u8 = 0x06;
pub const STATE_TIMEOUT: u8 = 0x07;
pub const STATE_START_MOVING_UP: u8 = 0x08;
pub const STATE_START_MOVING_DOWN: u8 = 0x09;
pub const STATE_MOVING_UP: u8 = 0x0a;
pub const STATE_MOVING_DOWN: u8 = 0x0b;
pub const STATE_STOPPED: u8 = 0x0d;
pub const STATE_TOP_TILT: u8 = 0x0e;
pub const STATE_BOTTOM_TILT: u8 = 0x0f;
/// Lights reuse 0x0f for "off"
pub const STATE_OFF: u8 = 0x0f;
pub const STATE_ON: u8 = 0x10;

// RSSI conversion (CC1101 two's complement, half-dB steps)
const RSSI_OFFSET: f32 = -74.0;
const RSSI_DIVISOR: f32 = 2.0;

/// Whether a packet type denotes a command frame
pub fn is_command_packet(packet_type: u8) -> bool {
    packet_type == PKT_TYPE_COMMAND || packet_type == PKT_TYPE_COMMAND_ALT
}

/// Whether a packet type denotes a status frame
pub fn is_status_packet(packet_type: u8) -> bool {
    packet_type == PKT_TYPE_STATUS || packet_type == PKT_TYPE_STATUS_ALT
}

/// Whether a command frame carrying this packet type decodes back to a
/// command: it needs 3-byte addressing and must not look like status
pub fn is_valid_command_type(packet_type: u8) -> bool {
    packet_type > PKT_TYPE_LONG_ADDRESS_THRESHOLD && !is_status_packet(packet_type)
}

/// Convert the radio's raw RSSI byte to dBm
pub fn rssi_dbm(raw: u8) -> f32 {
    f32::from(raw as i8) / RSSI_DIVISOR + RSSI_OFFSET
}

/// Human readable name of a status byte
pub fn state_name(state: u8) -> &'static str {
    match state {
        STATE_TOP => "top",
        STATE_BOTTOM => "bottom",
        STATE_INTERMEDIATE => "intermediate",
        STATE_TILT => "tilt",
        STATE_BLOCKING => "blocking",
        STATE_OVERHEATED => "overheated",
        STATE_TIMEOUT => "timeout",
        STATE_START_MOVING_UP => "start_moving_up",
        STATE_START_MOVING_DOWN => "start_moving_down",
        STATE_MOVING_UP => "moving_up",
        STATE_MOVING_DOWN => "moving_down",
        STATE_STOPPED => "stopped",
        STATE_TOP_TILT => "top_tilt",
        STATE_BOTTOM_TILT => "bottom_tilt",
        STATE_ON => "on",
        _ => "unknown",
    }
}

/// Per-installation framing bytes copied into every command frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FramingBytes {
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
}

fn default_payload_1() -> u8 { 0x00 }
fn default_payload_2() -> u8 { 0x04 }
fn default_pck_inf1() -> u8 { PKT_TYPE_COMMAND }
fn default_pck_inf2() -> u8 { 0x00 }
fn default_hop() -> u8 { 0x0a }

impl Default for FramingBytes {
    fn default() -> Self {
        Self {
            payload_1: default_payload_1(),
            payload_2: default_payload_2(),
            pck_inf1: default_pck_inf1(),
            pck_inf2: default_pck_inf2(),
            hop: default_hop(),
        }
    }
}

/// Logical action understood by a blind or light actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Up,
    Down,
    Stop,
    Check,
    Tilt,
    On,
    Off,
    DimUp,
    DimDown,
}

impl Action {
    /// Actions that start or change a movement (subject to last-write-wins)
    pub fn is_motion(self) -> bool {
        !matches!(self, Action::Stop | Action::Check)
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Up => "up",
            Action::Down => "down",
            Action::Stop => "stop",
            Action::Check => "check",
            Action::Tilt => "tilt",
            Action::On => "on",
            Action::Off => "off",
            Action::DimUp => "dim_up",
            Action::DimDown => "dim_down",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Mapping from logical action to protocol command byte
///
/// Defaults match factory Elero remotes; every entry can be overridden per
/// device in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandCodes {
    pub up: u8,
    pub down: u8,
    pub stop: u8,
    pub check: u8,
    pub tilt: u8,
    pub on: u8,
    pub off: u8,
    pub dim_up: u8,
    pub dim_down: u8,
}

impl Default for CommandCodes {
    fn default() -> Self {
        Self {
            up: COMMAND_UP,
            down: COMMAND_DOWN,
            stop: COMMAND_STOP,
            check: COMMAND_CHECK,
            tilt: COMMAND_TILT,
            on: COMMAND_UP,
            off: COMMAND_DOWN,
            dim_up: COMMAND_UP,
            dim_down: COMMAND_DOWN,
        }
    }
}

impl CommandCodes {
    /// Command byte for an action
    pub fn code(&self, action: Action) -> u8 {
        match action {
            Action::Up => self.up,
            Action::Down => self.down,
            Action::Stop => self.stop,
            Action::Check => self.check,
            Action::Tilt => self.tilt,
            Action::On => self.on,
            Action::Off => self.off,
            Action::DimUp => self.dim_up,
            Action::DimDown => self.dim_down,
        }
    }
}

/// Fields of a command frame we transmit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    pub counter: u8,
    pub blind: BlindAddress,
    pub remote: RemoteAddress,
    pub channel: u8,
    pub command: u8,
    pub framing: FramingBytes,
}

/// Fields of a status frame sent by a blind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFrame {
    pub counter: u8,
    pub blind: BlindAddress,
    pub remote: RemoteAddress,
    pub channel: u8,
    pub state: u8,
}

/// A decoded Elero frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Rolling message counter
    pub counter: u8,

    /// Packet type (pck_inf1)
    pub packet_type: u8,

    /// Secondary packet info (pck_inf2)
    pub packet_info: u8,

    /// Hop info
    pub hop: u8,

    /// System address
    pub system: u8,

    /// Channel within the remote group
    pub channel: u8,

    /// Source address (remote for commands, blind for status)
    pub source: u32,

    /// Backward address
    pub backward: u32,

    /// Forward address
    pub forward: u32,

    /// Destination addresses (3-byte or 1-byte depending on packet type)
    pub destinations: Vec<u32>,

    /// Clear payload byte preceding the block
    pub payload_1: u8,

    /// Clear payload byte preceding the block
    pub payload_2: u8,

    /// Decrypted block: rolling code, data bytes, parity
    pub block: [u8; ELERO_BLOCK_SIZE],

    /// Received signal strength in dBm, when the radio appended it
    pub rssi: Option<f32>,

    /// Link quality indicator, when the radio appended it
    pub lqi: Option<u8>,
}

impl Frame {
    pub fn is_command(&self) -> bool {
        is_command_packet(self.packet_type)
    }

    pub fn is_status(&self) -> bool {
        is_status_packet(self.packet_type)
    }

    /// Command byte (meaningful for command frames)
    pub fn command(&self) -> u8 {
        self.block[BLOCK_COMMAND_INDEX]
    }

    /// State byte (meaningful for status frames)
    pub fn state(&self) -> u8 {
        self.block[BLOCK_STATE_INDEX]
    }

    /// Whether 3-byte addressing is used for destinations
    pub fn uses_long_addresses(&self) -> bool {
        self.packet_type > PKT_TYPE_LONG_ADDRESS_THRESHOLD
    }

    /// Rolling code carried in the block
    pub fn rolling_code(&self) -> u16 {
        u16::from_be_bytes([self.block[0], self.block[1]])
    }

    /// Command frame fields, if this is a single-destination frame with
    /// 3-byte addressing that is not a status frame
    ///
    /// Installations may use any long-address packet type for commands, so
    /// this does not require [`Frame::is_command`].
    pub fn to_command(&self) -> Option<CommandFrame> {
        if self.is_status() || !self.uses_long_addresses() || self.destinations.len() != 1 {
            return None;
        }

        Some(CommandFrame {
            counter: self.counter,
            blind: self.destinations[0],
            remote: self.source,
            channel: self.channel,
            command: self.command(),
            framing: FramingBytes {
                payload_1: self.payload_1,
                payload_2: self.payload_2,
                pck_inf1: self.packet_type,
                pck_inf2: self.packet_info,
                hop: self.hop,
            },
        })
    }
}

/// Rolling code derived from the message counter
pub fn rolling_code(counter: u8) -> u16 {
    0u16.wrapping_sub(u16::from(counter).wrapping_mul(ELERO_CRYPTO_MULT))
}

/// Advance a message counter, skipping zero
pub fn next_counter(counter: u8) -> u8 {
    if counter == 0xff {
        1
    } else {
        counter + 1
    }
}
