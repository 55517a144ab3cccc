//! # Cover State Machine
//!
//! Tracks motion and position of a single blind.
//!
//! Elero status frames only report endpoints (top, bottom, intermediate), so
//! positions in between are estimated by linear interpolation of elapsed
//! travel time against the configured open and close durations. Position
//! tracking is enabled only when both durations are non-zero. Any status
//! that carries a position overrides the estimate.
//!
//! All methods take the current time in milliseconds; nothing here reads a
//! clock.

use super::{Capabilities, Fault, Motion, StatusUpdate};
use crate::elero::protocol::Action;

/// Fully open position
pub const COVER_OPEN: f32 = 1.0;

/// Fully closed position
pub const COVER_CLOSED: f32 = 0.0;

/// Externally visible cover state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverState {
    Unknown,
    Open,
    Closed,
    /// Idle between the endpoints, position in percent
    PartiallyOpen(u8),
    Opening,
    Closing,
    Tilting,
}

/// An ongoing movement used for interpolation
#[derive(Debug, Clone, Copy, PartialEq)]
struct Movement {
    started_at: u64,
    start_position: f32,
    target: f32,
}

/// State of one cover
#[derive(Debug, Clone)]
pub struct Cover {
    open_duration_ms: u64,
    close_duration_ms: u64,
    supports_tilt: bool,
    position: Option<f32>,
    motion: Motion,
    movement: Option<Movement>,
    last_direction: Motion,
    tilt: f32,
    tilting: bool,
    fault: Option<Fault>,
    last_report: Option<u64>,
}

impl Cover {
    /// Create a cover with unknown position
    ///
    /// # Arguments
    ///
    /// * `open_duration_ms` - Travel time from closed to open, 0 if unknown
    /// * `close_duration_ms` - Travel time from open to closed, 0 if unknown
    /// * `supports_tilt` - Whether tilt commands are accepted
    pub fn new(open_duration_ms: u64, close_duration_ms: u64, supports_tilt: bool) -> Self {
        Self {
            open_duration_ms,
            close_duration_ms,
            supports_tilt,
            position: None,
            motion: Motion::Idle,
            movement: None,
            last_direction: Motion::Idle,
            tilt: 0.0,
            tilting: false,
            fault: None,
            last_report: None,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            position: self.tracks_position(),
            tilt: self.supports_tilt,
            dim: false,
        }
    }

    /// Whether numeric position estimates are available
    pub fn tracks_position(&self) -> bool {
        self.open_duration_ms > 0 && self.close_duration_ms > 0
    }

    pub fn motion(&self) -> Motion {
        self.motion
    }

    pub fn tilt(&self) -> f32 {
        self.tilt
    }

    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    /// Time of the last status report
    pub fn last_report(&self) -> Option<u64> {
        self.last_report
    }

    /// Position estimate at `now`, `None` when unknown or not tracked
    pub fn position_at(&self, now: u64) -> Option<f32> {
        if !self.tracks_position() {
            return None;
        }

        match self.movement {
            Some(movement) => Some(self.interpolate(movement, now)),
            None => self.position,
        }
    }

    /// Cover state at `now`
    pub fn state(&self, now: u64) -> CoverState {
        match self.motion {
            Motion::Opening => return CoverState::Opening,
            Motion::Closing => return CoverState::Closing,
            Motion::Unknown => return CoverState::Unknown,
            Motion::Idle => {}
        }

        if self.tilting && self.tracks_position() {
            return CoverState::Tilting;
        }

        match self.position {
            Some(p) if p >= COVER_OPEN => CoverState::Open,
            Some(p) if p <= COVER_CLOSED => CoverState::Closed,
            Some(_) if self.tracks_position() => match self.position_at(now) {
                Some(p) => CoverState::PartiallyOpen((p * 100.0).round() as u8),
                None => CoverState::Unknown,
            },
            _ => CoverState::Unknown,
        }
    }

    /// Start moving, optimistically, towards an endpoint or `target`
    ///
    /// From an unknown position an opening movement is estimated from fully
    /// closed and a closing movement from fully open.
    pub fn start(&mut self, direction: Motion, target: Option<f32>, now: u64) {
        let (from_unknown, endpoint) = match direction {
            Motion::Opening => (COVER_CLOSED, COVER_OPEN),
            Motion::Closing => (COVER_OPEN, COVER_CLOSED),
            Motion::Idle | Motion::Unknown => return self.stop(now),
        };

        self.settle(now);
        self.tilt = 0.0;
        self.tilting = false;
        self.motion = direction;
        self.last_direction = direction;

        if self.tracks_position() {
            let start_position = self.position.unwrap_or(from_unknown);
            self.position = Some(start_position);
            self.movement = Some(Movement {
                started_at: now,
                start_position,
                target: target.unwrap_or(endpoint).clamp(COVER_CLOSED, COVER_OPEN),
            });
        } else {
            self.position = None;
        }
    }

    /// Stop: freeze the position estimate and go idle
    pub fn stop(&mut self, now: u64) {
        let was_moving = self.motion.is_moving();
        self.settle(now);
        self.motion = Motion::Idle;
        self.tilting = false;

        if was_moving && !self.tracks_position() {
            self.position = None;
        }
    }

    /// Advance the estimate
    ///
    /// # Returns
    ///
    /// * `Option<Action>` - `Stop` when an intermediate target was reached
    ///   and the blind must be told to stop. Endpoints need no command.
    pub fn tick(&mut self, now: u64) -> Option<Action> {
        let movement = self.movement?;
        let position = self.interpolate(movement, now);

        let reached = match self.motion {
            Motion::Opening => position >= movement.target,
            Motion::Closing => position <= movement.target,
            _ => false,
        };
        if !reached {
            return None;
        }

        self.position = Some(movement.target);
        self.movement = None;
        self.motion = Motion::Idle;

        if movement.target > COVER_CLOSED && movement.target < COVER_OPEN {
            Some(Action::Stop)
        } else {
            None
        }
    }

    /// Apply a status report; reported values win over estimates
    pub fn apply_status(&mut self, update: &StatusUpdate, now: u64) {
        self.last_report = Some(now);

        if update.fault.is_some() {
            self.fault = update.fault;
        } else if update.motion.is_some() {
            self.fault = None;
        }

        match update.motion {
            Some(direction @ (Motion::Opening | Motion::Closing)) => {
                if self.motion != direction {
                    self.start(direction, None, now);
                }
            }
            Some(_) => {
                let was_moving = self.motion.is_moving();
                self.settle(now);
                self.motion = Motion::Idle;
                if was_moving && !self.tracks_position() && update.position.is_none() {
                    self.position = None;
                }
            }
            None => {}
        }

        if let Some(position) = update.position {
            self.position = Some(position);
            if let Some(movement) = self.movement.as_mut() {
                movement.started_at = now;
                movement.start_position = position;
            }
        }

        if let Some(tilt) = update.tilt {
            self.tilt = tilt;
            self.tilting = false;
        }
    }

    /// A command for this cover failed; movement is no longer known
    pub fn mark_unknown(&mut self, now: u64) {
        self.settle(now);
        self.motion = Motion::Unknown;
        self.tilting = false;
    }

    /// Request a tilt position
    ///
    /// Elero tilt is a single preset: any non-zero tilt sends the tilt
    /// command, zero only clears the local tilt state.
    pub fn set_tilt(&mut self, tilt: f32, now: u64) -> Option<Action> {
        if tilt > 0.0 {
            self.settle(now);
            self.motion = Motion::Idle;
            self.tilt = 1.0;
            self.tilting = true;
            Some(Action::Tilt)
        } else {
            self.tilt = 0.0;
            None
        }
    }

    /// The tilt command was acknowledged or gave up
    pub fn tilt_finished(&mut self) {
        self.tilting = false;
    }

    /// Direction a toggle should move in, `None` meaning stop
    pub fn toggle_direction(&self) -> Option<Motion> {
        if self.motion.is_moving() {
            return None;
        }

        if self.position == Some(COVER_CLOSED) || self.last_direction == Motion::Closing {
            Some(Motion::Opening)
        } else {
            Some(Motion::Closing)
        }
    }

    fn interpolate(&self, movement: Movement, now: u64) -> f32 {
        let elapsed = now.saturating_sub(movement.started_at) as f32;

        let position = match self.motion {
            Motion::Opening => movement.start_position + elapsed / self.open_duration_ms as f32,
            Motion::Closing => movement.start_position - elapsed / self.close_duration_ms as f32,
            _ => movement.start_position,
        };

        position.clamp(COVER_CLOSED, COVER_OPEN)
    }

    /// Freeze any running interpolation at `now`
    fn settle(&mut self, now: u64) {
        if let Some(movement) = self.movement.take() {
            self.position = Some(self.interpolate(movement, now));
        }
    }
}
