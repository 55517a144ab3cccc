//! # Elero Protocol Module
//!
//! Implementation of the Elero RF frame format used by Elero blinds and
//! light actuators.
//!
//! This module handles:
//! - Command frame encoding (remote → blind)
//! - Status frame decoding (blind → remote)
//! - Payload block scrambling and parity
//! - Frame validation against protocol limits

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod cipher;
