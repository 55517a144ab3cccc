//! # Light State Machine
//!
//! On/off state and brightness estimate of an Elero light actuator.
//!
//! Dimmable actuators have no absolute brightness command: brightness is
//! changed by sending dim-up or dim-down and stopping after the proportional
//! share of `dim_duration`. Without a dim duration the light is on/off only.

use super::{Capabilities, StatusUpdate};
use crate::elero::protocol::Action;

/// Brightness difference below which no dimming is started
const BRIGHTNESS_TOLERANCE: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Dimming {
    up: bool,
    started_at: u64,
    start_brightness: f32,
    target: f32,
}

/// State of one light
#[derive(Debug, Clone)]
pub struct Light {
    dim_duration_ms: u64,
    on: bool,
    brightness: f32,
    dimming: Option<Dimming>,
    /// Brightness to dim to once the pending "on" command completes
    pending_target: Option<f32>,
    last_report: Option<u64>,
}

impl Light {
    pub fn new(dim_duration_ms: u64) -> Self {
        Self {
            dim_duration_ms,
            on: false,
            brightness: 0.0,
            dimming: None,
            pending_target: None,
            last_report: None,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            position: false,
            tilt: false,
            dim: self.dim_duration_ms > 0,
        }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn is_dimming(&self) -> bool {
        self.dimming.is_some()
    }

    pub fn last_report(&self) -> Option<u64> {
        self.last_report
    }

    /// Brightness estimate at `now`, 0.0 to 1.0
    pub fn brightness_at(&self, now: u64) -> f32 {
        match self.dimming {
            Some(dimming) => self.interpolate(dimming, now),
            None => self.brightness,
        }
    }

    pub fn turn_on(&mut self) -> Action {
        self.on = true;
        self.brightness = 1.0;
        self.dimming = None;
        self.pending_target = None;
        Action::On
    }

    pub fn turn_off(&mut self) -> Action {
        self.on = false;
        self.brightness = 0.0;
        self.dimming = None;
        self.pending_target = None;
        Action::Off
    }

    /// Request a brightness level
    ///
    /// A light that is off is switched on at full brightness first; the dim
    /// towards `target` starts from [`Light::command_completed`].
    ///
    /// # Returns
    ///
    /// * `Option<Action>` - Command to send, `None` if already at `target`
    pub fn set_brightness(&mut self, target: f32, now: u64) -> Option<Action> {
        let target = target.clamp(0.0, 1.0);

        if target <= 0.0 {
            return Some(self.turn_off());
        }
        if self.dim_duration_ms == 0 || target >= 1.0 {
            return Some(self.turn_on());
        }

        if !self.on || self.brightness_at(now) < BRIGHTNESS_TOLERANCE {
            self.turn_on();
            self.pending_target = Some(target);
            return Some(Action::On);
        }

        self.start_dim(target, now)
    }

    /// A command for this light was acknowledged
    ///
    /// # Returns
    ///
    /// * `Option<Action>` - Follow-up dim command, if one was deferred
    pub fn command_completed(&mut self, action: Action, now: u64) -> Option<Action> {
        if action != Action::On {
            return None;
        }

        let target = self.pending_target.take()?;
        self.start_dim(target, now)
    }

    /// Advance the brightness estimate
    ///
    /// # Returns
    ///
    /// * `Option<Action>` - `Stop` once the target brightness is reached
    pub fn tick(&mut self, now: u64) -> Option<Action> {
        let dimming = self.dimming?;
        let brightness = self.interpolate(dimming, now);

        let reached = if dimming.up {
            brightness >= dimming.target
        } else {
            brightness <= dimming.target
        };
        if !reached {
            return None;
        }

        self.brightness = dimming.target;
        self.dimming = None;
        Some(Action::Stop)
    }

    /// Stop dimming at the current estimate
    pub fn stop(&mut self, now: u64) {
        if let Some(dimming) = self.dimming.take() {
            self.brightness = self.interpolate(dimming, now);
        }
    }

    /// Apply a status report
    pub fn apply_status(&mut self, update: &StatusUpdate, now: u64) {
        self.last_report = Some(now);

        match update.light {
            Some(true) if !self.on => {
                self.on = true;
                self.brightness = 1.0;
            }
            Some(false) => {
                self.on = false;
                self.brightness = 0.0;
                self.dimming = None;
                self.pending_target = None;
            }
            _ => {}
        }
    }

    /// A command for this light failed; drop deferred work
    pub fn command_failed(&mut self, now: u64) {
        self.stop(now);
        self.pending_target = None;
    }

    fn start_dim(&mut self, target: f32, now: u64) -> Option<Action> {
        let current = self.brightness_at(now);
        self.dimming = None;
        self.brightness = current;

        let up = if target > current + BRIGHTNESS_TOLERANCE {
            true
        } else if target < current - BRIGHTNESS_TOLERANCE {
            false
        } else {
            return None;
        };

        self.dimming = Some(Dimming {
            up,
            started_at: now,
            start_brightness: current,
            target,
        });

        Some(if up { Action::DimUp } else { Action::DimDown })
    }

    fn interpolate(&self, dimming: Dimming, now: u64) -> f32 {
        let delta = now.saturating_sub(dimming.started_at) as f32 / self.dim_duration_ms as f32;
        let brightness = if dimming.up {
            dimming.start_brightness + delta
        } else {
            dimming.start_brightness - delta
        };
        brightness.clamp(0.0, 1.0)
    }
}
