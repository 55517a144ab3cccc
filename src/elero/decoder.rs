//! # Elero Frame Decoder
//!
//! Validates and decodes frames read from the radio.
//!
//! A buffer is `length` byte + `length` frame bytes, optionally followed by
//! the two status bytes the radio appends (RSSI, LQI with CRC-OK in bit 7).
//! Trailing bytes beyond that are ignored.

use super::cipher::decode_block;
use super::protocol::*;
use crate::error::DecodeError;

/// Decode a complete Elero frame
///
/// # Arguments
///
/// * `raw` - Frame bytes starting at the length byte
///
/// # Returns
///
/// * `Result<Frame, DecodeError>` - Decoded frame, or the reason it was rejected
///
/// # Errors
///
/// Returns error if:
/// - The buffer is shorter than the fixed header or than the length byte says
/// - The length byte or destination count exceeds protocol limits
/// - The destination list leaves no room for the payload block
/// - The radio flagged a CRC failure
pub fn decode_frame(raw: &[u8]) -> Result<Frame, DecodeError> {
    if raw.len() < ELERO_HEADER_SIZE {
        return Err(DecodeError::TooShort(raw.len()));
    }

    let length = raw[0];
    if length > ELERO_MAX_PACKET_SIZE {
        return Err(DecodeError::TooLong(length));
    }

    let frame_len = usize::from(length) + 1;
    if raw.len() < frame_len {
        return Err(DecodeError::Truncated {
            expected: frame_len,
            actual: raw.len(),
        });
    }

    let packet_type = raw[2];
    let num_dests = raw[16];
    if num_dests > ELERO_MAX_DESTINATIONS {
        return Err(DecodeError::TooManyDestinations(num_dests));
    }

    let long_addresses = packet_type > PKT_TYPE_LONG_ADDRESS_THRESHOLD;
    let dests_len = if long_addresses {
        usize::from(num_dests) * 3
    } else {
        usize::from(num_dests)
    };

    // Highest index touched by the payload block
    let last_index = ELERO_HEADER_SIZE + dests_len + 2 + ELERO_BLOCK_SIZE - 1;
    if last_index > usize::from(length) {
        return Err(DecodeError::DestinationsTooLong { dests_len, length });
    }

    let (rssi, lqi) = if raw.len() >= frame_len + RADIO_STATUS_SIZE {
        let status = raw[frame_len + 1];
        if status & 0x80 == 0 {
            return Err(DecodeError::ChecksumMismatch);
        }
        (Some(rssi_dbm(raw[frame_len])), Some(status & 0x7F))
    } else {
        (None, None)
    };

    let destinations = raw[ELERO_HEADER_SIZE..ELERO_HEADER_SIZE + dests_len]
        .chunks_exact(if long_addresses { 3 } else { 1 })
        .map(read_address)
        .collect();

    let payload_start = ELERO_HEADER_SIZE + dests_len;
    let block_start = payload_start + 2;
    let mut block = [0u8; ELERO_BLOCK_SIZE];
    block.copy_from_slice(&raw[block_start..block_start + ELERO_BLOCK_SIZE]);
    decode_block(&mut block);

    Ok(Frame {
        counter: raw[1],
        packet_type,
        packet_info: raw[3],
        hop: raw[4],
        system: raw[5],
        channel: raw[6],
        source: read_address(&raw[7..10]),
        backward: read_address(&raw[10..13]),
        forward: read_address(&raw[13..16]),
        destinations,
        payload_1: raw[payload_start],
        payload_2: raw[payload_start + 1],
        block,
        rssi,
        lqi,
    })
}

/// Number of bytes a frame occupies on the wire, given its first byte
///
/// Includes the length byte and the two radio status bytes.
pub fn wire_size(length: u8) -> usize {
    usize::from(length) + 1 + RADIO_STATUS_SIZE
}

/// Read a big-endian address of 1 to 3 bytes
fn read_address(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elero::encoder::{
        append_radio_status, encode_command_frame, encode_frame, encode_status_frame,
    };

    fn sample_command() -> CommandFrame {
        CommandFrame {
            counter: 0x42,
            blind: 0xa831e5,
            remote: 0x123456,
            channel: 17,
            command: COMMAND_DOWN,
            framing: FramingBytes::default(),
        }
    }

    #[test]
    fn test_read_address_big_endian() {
        assert_eq!(read_address(&[0xa8, 0x31, 0xe5]), 0xa831e5);
        assert_eq!(read_address(&[0x00, 0x00, 0x00]), 0);
        assert_eq!(read_address(&[0xff, 0xff, 0xff]), 0xffffff);
        assert_eq!(read_address(&[0x07]), 0x07);
    }

    #[test]
    fn test_decode_command_round_trip() {
        let command = sample_command();
        let frame = decode_frame(&encode_command_frame(&command)).unwrap();

        assert_eq!(frame.to_command(), Some(command));
        assert_eq!(frame.rolling_code(), rolling_code(0x42));
        assert!(frame.rssi.is_none());
    }

    #[test]
    fn test_round_trip_across_field_ranges() {
        let addresses = [0x000000, 0x000001, 0x7fffff, 0xffffff];
        let bytes = [0x00, 0x01, 0x7f, 0x80, 0xff];
        let packet_types = [0x61, PKT_TYPE_COMMAND_ALT, PKT_TYPE_COMMAND, 0x6b, 0x80, 0xff];

        for &blind in &addresses {
            for &remote in &addresses {
                for (&value, &pck_inf1) in bytes.iter().zip(packet_types.iter().cycle()) {
                    let command = CommandFrame {
                        counter: value.max(1),
                        blind,
                        remote,
                        channel: value,
                        command: value,
                        framing: FramingBytes {
                            payload_1: value,
                            payload_2: !value,
                            pck_inf1,
                            pck_inf2: value,
                            hop: !value,
                        },
                    };
                    let decoded = decode_frame(&encode_command_frame(&command)).unwrap();
                    assert_eq!(decoded.to_command(), Some(command));
                }
            }
        }
    }

    #[test]
    fn test_every_accepted_packet_type_round_trips() {
        for pck_inf1 in (0..=u8::MAX).filter(|&t| is_valid_command_type(t)) {
            let command = CommandFrame {
                framing: FramingBytes { pck_inf1, ..FramingBytes::default() },
                ..sample_command()
            };
            let raw = encode_command_frame(&command);
            assert_eq!(raw.len(), 30, "pck_inf1 0x{:02x}", pck_inf1);

            let decoded = decode_frame(&raw).unwrap();
            assert_eq!(decoded.destinations, vec![0xa831e5]);
            assert_eq!(decoded.to_command(), Some(command));
        }
    }

    #[test]
    fn test_decode_status_with_radio_bytes() {
        let raw = append_radio_status(
            encode_status_frame(&StatusFrame {
                counter: 9,
                blind: 0xa831e5,
                remote: 0x123456,
                channel: 17,
                state: STATE_MOVING_UP,
            }),
            100,
            true,
        );

        let frame = decode_frame(&raw).unwrap();
        assert!(frame.is_status());
        assert_eq!(frame.source, 0xa831e5);
        assert_eq!(frame.forward, 0x123456);
        assert_eq!(frame.state(), STATE_MOVING_UP);
        assert!((frame.rssi.unwrap() - -24.0).abs() < 0.1);
        assert_eq!(frame.lqi, Some(0));
        assert_eq!(frame.to_command(), None);
    }

    #[test]
    fn test_decode_crc_failure() {
        let raw = append_radio_status(encode_command_frame(&sample_command()), 100, false);
        assert_eq!(decode_frame(&raw), Err(DecodeError::ChecksumMismatch));
    }

    #[test]
    fn test_decode_too_short() {
        assert_eq!(decode_frame(&[0x1d, 0x01]), Err(DecodeError::TooShort(2)));
        assert_eq!(decode_frame(&[]), Err(DecodeError::TooShort(0)));
    }

    #[test]
    fn test_decode_too_long() {
        let mut raw = encode_command_frame(&sample_command());
        raw[0] = 58;
        assert_eq!(decode_frame(&raw), Err(DecodeError::TooLong(58)));
    }

    #[test]
    fn test_decode_truncated() {
        let raw = encode_command_frame(&sample_command());
        let result = decode_frame(&raw[..25]);
        assert_eq!(
            result,
            Err(DecodeError::Truncated { expected: 30, actual: 25 })
        );
    }

    #[test]
    fn test_decode_too_many_destinations() {
        let mut raw = encode_command_frame(&sample_command());
        raw[16] = 21;
        assert_eq!(decode_frame(&raw), Err(DecodeError::TooManyDestinations(21)));
    }

    #[test]
    fn test_decode_destinations_overflow_length() {
        let mut raw = encode_command_frame(&sample_command());
        raw[16] = 2; // 6 bytes of destinations no longer fit 29-byte frame
        assert_eq!(
            decode_frame(&raw),
            Err(DecodeError::DestinationsTooLong { dests_len: 6, length: 29 })
        );
    }

    #[test]
    fn test_decode_multiple_short_destinations() {
        let original = Frame {
            counter: 3,
            packet_type: 0x44,
            packet_info: 0x00,
            hop: 0x01,
            system: ELERO_SYS_ADDR,
            channel: 2,
            source: 0x010203,
            backward: 0x010203,
            forward: 0x010203,
            destinations: vec![0x05, 0x06, 0x07],
            payload_1: 0x00,
            payload_2: 0x04,
            block: [0, 0, 0x10, 0, 0, 0, 0, 0],
            rssi: None,
            lqi: None,
        };

        let decoded = decode_frame(&encode_frame(&original)).unwrap();
        assert_eq!(decoded.destinations, vec![0x05, 0x06, 0x07]);
        assert!(!decoded.uses_long_addresses());
        assert_eq!(decoded.command(), 0x10);
    }

    #[test]
    fn test_malformed_frames_are_classified() {
        let err = decode_frame(&[0x01]).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_wire_size() {
        assert_eq!(wire_size(ELERO_MSG_LENGTH), 32);
    }
}
