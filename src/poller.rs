//! # Poller
//!
//! Decides when each registered device is due for a status check.
//!
//! The poller only schedules; the checks themselves go through the
//! dispatcher so they share the single radio with user commands. Devices
//! are staggered so that they do not all poll at once, polled fast while
//! moving, and marked stale after repeated missed replies. Stale devices
//! keep being polled.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::{PollerConfig, POLL_NEVER};
use crate::elero::protocol::BlindAddress;

/// How often a device is polled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollInterval {
    Never,
    Every(u64),
}

impl PollInterval {
    /// Interpret a configured interval, where [`POLL_NEVER`] disables polling
    pub fn from_millis(millis: u32) -> Self {
        if millis == POLL_NEVER {
            PollInterval::Never
        } else {
            PollInterval::Every(u64::from(millis))
        }
    }
}

#[derive(Debug, Clone)]
struct PollEntry {
    interval: PollInterval,
    offset: u64,
    last_poll: Option<u64>,
    moving_since: Option<u64>,
    immediate: bool,
    misses: u32,
    stale: bool,
}

/// Per-device poll schedule
#[derive(Debug)]
pub struct Poller {
    config: PollerConfig,
    entries: BTreeMap<BlindAddress, PollEntry>,
}

impl Poller {
    pub fn new(config: &PollerConfig) -> Self {
        Self {
            config: config.clone(),
            entries: BTreeMap::new(),
        }
    }

    /// Register a device; the n-th registration is offset by n stagger steps
    pub fn register(&mut self, address: BlindAddress, interval: PollInterval) {
        let offset = self.entries.len() as u64 * self.config.stagger_ms;
        self.entries.insert(
            address,
            PollEntry {
                interval,
                offset,
                last_poll: None,
                moving_since: None,
                immediate: false,
                misses: 0,
                stale: false,
            },
        );
    }

    /// Devices due for a check at `now`
    ///
    /// Returned devices are considered polled at `now`.
    pub fn due(&mut self, now: u64) -> Vec<BlindAddress> {
        let mut due = Vec::new();

        for (&address, entry) in self.entries.iter_mut() {
            let PollInterval::Every(base) = entry.interval else {
                continue;
            };

            let interval = match entry.moving_since {
                Some(since) if now.saturating_sub(since) < self.config.movement_timeout_ms => {
                    self.config.moving_interval_ms.min(base)
                }
                _ => base,
            };

            let is_due = entry.immediate
                || match entry.last_poll {
                    None => now >= entry.offset,
                    Some(last) => now.saturating_sub(last) >= interval,
                };

            if is_due {
                entry.immediate = false;
                entry.last_poll = Some(now);
                due.push(address);
            }
        }

        due
    }

    /// Track whether a device is moving, enabling fast polling
    pub fn set_moving(&mut self, address: BlindAddress, moving: bool, now: u64) {
        if let Some(entry) = self.entries.get_mut(&address) {
            match (moving, entry.moving_since) {
                (true, None) => entry.moving_since = Some(now),
                (false, Some(_)) => entry.moving_since = None,
                _ => {}
            }
        }
    }

    /// Poll a device on the next [`Poller::due`] call
    pub fn request_immediate(&mut self, address: BlindAddress) {
        if let Some(entry) = self.entries.get_mut(&address) {
            if entry.interval != PollInterval::Never {
                entry.immediate = true;
            }
        }
    }

    /// A status frame from the device arrived
    ///
    /// # Returns
    ///
    /// * `bool` - Whether the device was stale before
    pub fn on_reply(&mut self, address: BlindAddress) -> bool {
        let Some(entry) = self.entries.get_mut(&address) else {
            return false;
        };

        entry.misses = 0;
        let was_stale = entry.stale;
        entry.stale = false;
        if was_stale {
            debug!("0x{:06x} is answering again", address);
        }
        was_stale
    }

    /// A poll check to the device went unanswered
    ///
    /// # Returns
    ///
    /// * `bool` - Whether the device just became stale
    pub fn on_miss(&mut self, address: BlindAddress) -> bool {
        let Some(entry) = self.entries.get_mut(&address) else {
            return false;
        };

        entry.misses += 1;
        if !entry.stale && entry.misses >= self.config.stale_after_misses {
            entry.stale = true;
            warn!(
                "0x{:06x} missed {} polls, status is stale",
                address, entry.misses
            );
            return true;
        }
        false
    }

    pub fn unregister(&mut self, address: BlindAddress) {
        self.entries.remove(&address);
    }

    pub fn is_stale(&self, address: BlindAddress) -> bool {
        self.entries.get(&address).is_some_and(|e| e.stale)
    }

    pub fn misses(&self, address: BlindAddress) -> u32 {
        self.entries.get(&address).map_or(0, |e| e.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poller() -> Poller {
        Poller::new(&PollerConfig::default())
    }

    #[test]
    fn test_interval_from_millis() {
        assert_eq!(PollInterval::from_millis(POLL_NEVER), PollInterval::Never);
        assert_eq!(PollInterval::from_millis(300_000), PollInterval::Every(300_000));
    }

    #[test]
    fn test_first_poll_at_offset_then_interval() {
        let mut p = poller();
        p.register(1, PollInterval::Every(60_000));
        p.register(2, PollInterval::Every(60_000));

        assert_eq!(p.due(0), vec![1]);
        assert_eq!(p.due(4_999), Vec::<u32>::new());
        assert_eq!(p.due(5_000), vec![2]);
        assert_eq!(p.due(59_999), Vec::<u32>::new());
        assert_eq!(p.due(60_000), vec![1]);
        assert_eq!(p.due(65_000), vec![2]);
    }

    #[test]
    fn test_never_never_polls() {
        let mut p = poller();
        p.register(1, PollInterval::Never);
        p.set_moving(1, true, 0);
        p.request_immediate(1);

        for t in (0..10_000_000u64).step_by(1_000) {
            assert!(p.due(t).is_empty());
        }
    }

    #[test]
    fn test_fast_poll_while_moving() {
        let mut p = poller();
        p.register(1, PollInterval::Every(300_000));
        assert_eq!(p.due(0), vec![1]);

        p.set_moving(1, true, 1_000);
        assert!(p.due(1_500).is_empty());
        assert_eq!(p.due(2_000), vec![1]);
        assert_eq!(p.due(4_000), vec![1]);

        p.set_moving(1, false, 5_000);
        assert!(p.due(6_000).is_empty());
    }

    #[test]
    fn test_fast_poll_stops_after_movement_timeout() {
        let mut p = poller();
        p.register(1, PollInterval::Every(300_000));
        p.set_moving(1, true, 0);
        assert_eq!(p.due(0), vec![1]);

        assert_eq!(p.due(118_000), vec![1]);
        assert!(p.due(120_500).is_empty());
    }

    #[test]
    fn test_immediate_poll() {
        let mut p = poller();
        p.register(1, PollInterval::Every(300_000));
        p.due(0);

        p.request_immediate(1);
        assert_eq!(p.due(10), vec![1]);
        assert!(p.due(20).is_empty());
    }

    #[test]
    fn test_stale_after_misses_but_still_polled() {
        let mut p = poller();
        p.register(1, PollInterval::Every(1_000));

        assert!(!p.on_miss(1));
        assert!(!p.on_miss(1));
        assert!(p.on_miss(1));
        assert!(p.is_stale(1));
        assert!(!p.on_miss(1), "stale is reported once");

        assert_eq!(p.due(0), vec![1]);
        assert_eq!(p.due(1_000), vec![1]);

        assert!(p.on_reply(1));
        assert!(!p.is_stale(1));
        assert_eq!(p.misses(1), 0);
    }

    #[test]
    fn test_unregistered_device_is_not_polled() {
        let mut p = poller();
        p.register(1, PollInterval::Every(1_000));
        p.unregister(1);

        assert!(p.due(0).is_empty());
        assert!(!p.on_miss(1));
    }
}
