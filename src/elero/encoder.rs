//! # Elero Frame Encoder
//!
//! Packs command and status fields into on-air Elero frames.

use super::cipher::encode_block;
use super::protocol::*;

/// Encode any frame into its on-air byte layout
///
/// The rolling code (block bytes 0 and 1) is derived from `frame.counter`
/// and the parity byte is recomputed, so only block bytes 2..7 of
/// `frame.block` are taken as data. Radio status fields (`rssi`, `lqi`) are
/// receive-only and ignored.
///
/// # Returns
///
/// * `Vec<u8>` - Length byte followed by `length` frame bytes
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    encode_with_addressing(frame, frame.uses_long_addresses())
}

fn encode_with_addressing(frame: &Frame, long_addresses: bool) -> Vec<u8> {
    let dests_len = if long_addresses {
        frame.destinations.len() * 3
    } else {
        frame.destinations.len()
    };
    let length = ELERO_HEADER_SIZE + dests_len + 2 + ELERO_BLOCK_SIZE - 1;

    let mut out = Vec::with_capacity(length + 1);
    out.push(length as u8);
    out.push(frame.counter);
    out.push(frame.packet_type);
    out.push(frame.packet_info);
    out.push(frame.hop);
    out.push(frame.system);
    out.push(frame.channel);
    push_address(&mut out, frame.source);
    push_address(&mut out, frame.backward);
    push_address(&mut out, frame.forward);
    out.push(frame.destinations.len() as u8);

    for &destination in &frame.destinations {
        if long_addresses {
            push_address(&mut out, destination);
        } else {
            out.push((destination & 0xFF) as u8);
        }
    }

    out.push(frame.payload_1);
    out.push(frame.payload_2);

    let mut block = frame.block;
    let code = rolling_code(frame.counter).to_be_bytes();
    block[0] = code[0];
    block[1] = code[1];
    block[7] = 0;
    encode_block(&mut block);
    out.extend_from_slice(&block);

    out
}

/// Encode a command frame addressed to a single blind
///
/// Source, backward and forward addresses are all set to the remote address,
/// matching what factory remotes transmit. The destination is always a
/// 3-byte address, so the frame is 30 bytes whatever `pck_inf1` says.
///
/// # Examples
///
/// ```
/// use elero_bridge::elero::encoder::encode_command_frame;
/// use elero_bridge::elero::protocol::{CommandFrame, FramingBytes, COMMAND_UP};
///
/// let frame = encode_command_frame(&CommandFrame {
///     counter: 1,
///     blind: 0xa831e5,
///     remote: 0x123456,
///     channel: 4,
///     command: COMMAND_UP,
///     framing: FramingBytes::default(),
/// });
/// assert_eq!(frame.len(), 30);
/// assert_eq!(frame[0], 0x1d);
/// ```
pub fn encode_command_frame(command: &CommandFrame) -> Vec<u8> {
    let mut block = [0u8; ELERO_BLOCK_SIZE];
    block[BLOCK_COMMAND_INDEX] = command.command;

    let frame = Frame {
        counter: command.counter,
        packet_type: command.framing.pck_inf1,
        packet_info: command.framing.pck_inf2,
        hop: command.framing.hop,
        system: ELERO_SYS_ADDR,
        channel: command.channel,
        source: command.remote,
        backward: command.remote,
        forward: command.remote,
        destinations: vec![command.blind],
        payload_1: command.framing.payload_1,
        payload_2: command.framing.payload_2,
        block,
        rssi: None,
        lqi: None,
    };
    encode_with_addressing(&frame, true)
}

/// Encode a status frame as a blind would send it
///
/// Used by simulators and tests; the bridge itself never transmits status.
pub fn encode_status_frame(status: &StatusFrame) -> Vec<u8> {
    let mut block = [0u8; ELERO_BLOCK_SIZE];
    block[BLOCK_STATE_INDEX] = status.state;

    encode_frame(&Frame {
        counter: status.counter,
        packet_type: PKT_TYPE_STATUS,
        packet_info: 0x10,
        hop: 0x00,
        system: ELERO_SYS_ADDR,
        channel: status.channel,
        source: status.blind,
        backward: status.blind,
        forward: status.remote,
        destinations: vec![status.remote],
        payload_1: 0x00,
        payload_2: 0x04,
        block,
        rssi: None,
        lqi: None,
    })
}

/// Append the radio status bytes a receiver would add
///
/// # Arguments
///
/// * `frame` - Encoded frame
/// * `rssi_raw` - Raw RSSI byte
/// * `crc_ok` - Whether the radio's CRC check passed
pub fn append_radio_status(mut frame: Vec<u8>, rssi_raw: u8, crc_ok: bool) -> Vec<u8> {
    frame.push(rssi_raw);
    frame.push(if crc_ok { 0x80 } else { 0x00 });
    frame
}

fn push_address(out: &mut Vec<u8>, address: u32) {
    out.push(((address >> 16) & 0xFF) as u8);
    out.push(((address >> 8) & 0xFF) as u8);
    out.push((address & 0xFF) as u8);
}
