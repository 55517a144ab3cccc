//! # Blind Module
//!
//! Per-device state models for Elero actuators.
//!
//! - [`cover`]: roller shutters and awnings (motion, position estimate, tilt)
//! - [`light`]: dimmable light actuators (on/off, brightness estimate)
//!
//! Both consume [`StatusUpdate`]s decoded from status frames. Which intents a
//! device accepts is described by its [`Capabilities`].

pub mod cover;
pub mod light;

use crate::elero::protocol::*;

/// Intents a device accepts beyond on/off or open/close/stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Numeric position tracking (both travel durations configured)
    pub position: bool,
    /// Tilt (venetian / lamella positioning)
    pub tilt: bool,
    /// Brightness control (dimmable lights)
    pub dim: bool,
}

/// Movement direction of a cover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Idle,
    Opening,
    Closing,
    /// A command failed; the actual movement is not known
    Unknown,
}

impl Motion {
    pub fn is_moving(self) -> bool {
        matches!(self, Motion::Opening | Motion::Closing)
    }
}

/// Fault conditions a blind may report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Blocking,
    Overheated,
    Timeout,
}

/// Device state carried by one status frame
///
/// Fields left as `None` keep the device's current value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusUpdate {
    /// Raw state byte
    pub state: u8,
    /// Absolute position, 0.0 (closed) to 1.0 (open)
    pub position: Option<f32>,
    /// Movement after this report
    pub motion: Option<Motion>,
    /// Tilt, 0.0 or 1.0
    pub tilt: Option<f32>,
    pub fault: Option<Fault>,
    /// Light on/off
    pub light: Option<bool>,
}

impl StatusUpdate {
    fn raw(state: u8) -> Self {
        Self {
            state,
            position: None,
            motion: None,
            tilt: None,
            fault: None,
            light: None,
        }
    }

    /// Interpret a state byte reported by a cover
    pub fn from_cover_state(state: u8) -> Self {
        let mut update = Self::raw(state);

        match state {
            STATE_TOP => {
                update.position = Some(1.0);
                update.motion = Some(Motion::Idle);
                update.tilt = Some(0.0);
            }
            STATE_BOTTOM => {
                update.position = Some(0.0);
                update.motion = Some(Motion::Idle);
                update.tilt = Some(0.0);
            }
            STATE_INTERMEDIATE | STATE_STOPPED => {
                update.motion = Some(Motion::Idle);
                update.tilt = Some(0.0);
            }
            STATE_START_MOVING_UP | STATE_MOVING_UP => {
                update.motion = Some(Motion::Opening);
                update.tilt = Some(0.0);
            }
            STATE_START_MOVING_DOWN | STATE_MOVING_DOWN => {
                update.motion = Some(Motion::Closing);
                update.tilt = Some(0.0);
            }
            STATE_TILT => {
                update.motion = Some(Motion::Idle);
                update.tilt = Some(1.0);
            }
            STATE_TOP_TILT => {
                update.position = Some(1.0);
                update.motion = Some(Motion::Idle);
                update.tilt = Some(1.0);
            }
            STATE_BOTTOM_TILT => {
                update.position = Some(0.0);
                update.motion = Some(Motion::Idle);
                update.tilt = Some(1.0);
            }
            STATE_BLOCKING => {
                update.motion = Some(Motion::Idle);
                update.fault = Some(Fault::Blocking);
            }
            STATE_OVERHEATED => {
                update.motion = Some(Motion::Idle);
                update.fault = Some(Fault::Overheated);
            }
            STATE_TIMEOUT => {
                update.motion = Some(Motion::Idle);
                update.fault = Some(Fault::Timeout);
            }
            _ => {}
        }

        update
    }

    /// Interpret a state byte reported by a light actuator
    pub fn from_light_state(state: u8) -> Self {
        let mut update = Self::raw(state);

        match state {
            STATE_ON => update.light = Some(true),
            STATE_OFF => update.light = Some(false),
            _ => {}
        }

        update
    }

    /// An explicit position report, leaving the cover idle
    ///
    /// Elero status frames only carry endpoint states, so only tests build
    /// numeric position reports.
    #[cfg(test)]
    pub fn at_position(position: f32) -> Self {
        let mut update = Self::raw(STATE_INTERMEDIATE);
        update.position = Some(position.clamp(0.0, 1.0));
        update.motion = Some(Motion::Idle);
        update
    }

    /// Text published to status sensors
    pub fn text(&self) -> &'static str {
        match self.light {
            Some(true) => "on",
            Some(false) => "off",
            None => state_name(self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_set_position() {
        let top = StatusUpdate::from_cover_state(STATE_TOP);
        assert_eq!(top.position, Some(1.0));
        assert_eq!(top.motion, Some(Motion::Idle));

        let bottom = StatusUpdate::from_cover_state(STATE_BOTTOM);
        assert_eq!(bottom.position, Some(0.0));
    }

    #[test]
    fn test_intermediate_keeps_position() {
        let update = StatusUpdate::from_cover_state(STATE_INTERMEDIATE);
        assert_eq!(update.position, None);
        assert_eq!(update.motion, Some(Motion::Idle));
    }

    #[test]
    fn test_moving_states() {
        for state in [STATE_START_MOVING_UP, STATE_MOVING_UP] {
            assert_eq!(StatusUpdate::from_cover_state(state).motion, Some(Motion::Opening));
        }
        for state in [STATE_START_MOVING_DOWN, STATE_MOVING_DOWN] {
            assert_eq!(StatusUpdate::from_cover_state(state).motion, Some(Motion::Closing));
        }
    }

    #[test]
    fn test_tilt_states() {
        let tilt = StatusUpdate::from_cover_state(STATE_TILT);
        assert_eq!(tilt.tilt, Some(1.0));
        assert_eq!(tilt.position, None);

        let bottom_tilt = StatusUpdate::from_cover_state(STATE_BOTTOM_TILT);
        assert_eq!(bottom_tilt.tilt, Some(1.0));
        assert_eq!(bottom_tilt.position, Some(0.0));
    }

    #[test]
    fn test_faults_stop_motion() {
        let update = StatusUpdate::from_cover_state(STATE_OVERHEATED);
        assert_eq!(update.fault, Some(Fault::Overheated));
        assert_eq!(update.motion, Some(Motion::Idle));
        assert_eq!(update.text(), "overheated");
    }

    #[test]
    fn test_unknown_state_changes_nothing() {
        let update = StatusUpdate::from_cover_state(0x42);
        assert_eq!(update.motion, None);
        assert_eq!(update.position, None);
        assert_eq!(update.text(), "unknown");
    }

    #[test]
    fn test_light_states_share_bytes() {
        // 0x0f is bottom_tilt for covers but off for lights
        assert_eq!(StatusUpdate::from_light_state(STATE_OFF).light, Some(false));
        assert_eq!(StatusUpdate::from_light_state(STATE_OFF).text(), "off");
        assert_eq!(StatusUpdate::from_light_state(STATE_ON).light, Some(true));
        assert_eq!(StatusUpdate::from_light_state(STATE_TOP).light, None);
    }

    #[test]
    fn test_explicit_position_is_clamped() {
        assert_eq!(StatusUpdate::at_position(0.7).position, Some(0.7));
        assert_eq!(StatusUpdate::at_position(1.5).position, Some(1.0));
    }
}
