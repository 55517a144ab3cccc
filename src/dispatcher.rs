//! # Command Dispatcher
//!
//! Serializes every outgoing command onto the single half-duplex radio.
//!
//! All blinds share one FIFO queue and at most one command is in flight at
//! any time. A command is complete when the addressed blind answers with a
//! status frame; otherwise it is retransmitted after the ack timeout, up to
//! `max_attempts` transmissions in total.
//!
//! Queue policy:
//! - A motion intent replaces queued or in-flight motion for the same blind
//!   (last write wins)
//! - Stop drops everything queued for the blind, cancels its in-flight
//!   command and jumps to the head of the queue
//! - Checks are dropped while anything is pending for the blind
//! - Poll checks are sent once; a missed reply is reported, not retried

use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

use crate::config::{Backoff, DispatcherConfig};
use crate::elero::encoder::encode_command_frame;
use crate::elero::protocol::{
    next_counter, Action, BlindAddress, CommandCodes, CommandFrame, FramingBytes, RemoteAddress,
};
use crate::error::{EleroError, Result};

/// Who asked for a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// An explicit intent; retried on timeout
    User,
    /// A periodic status check; single attempt
    Poll,
}

/// How to address one blind
#[derive(Debug, Clone)]
pub struct Target {
    pub remote: RemoteAddress,
    pub channel: u8,
    pub framing: FramingBytes,
    pub codes: CommandCodes,
    /// Next message counter, 1..=255
    counter: u8,
}

impl Target {
    pub fn new(remote: RemoteAddress, channel: u8, framing: FramingBytes, codes: CommandCodes) -> Self {
        Self {
            remote,
            channel,
            framing,
            codes,
            counter: 1,
        }
    }
}

/// Result of a finished command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEvent {
    /// The blind replied
    Completed { address: BlindAddress, action: Action },
    /// Every attempt went unanswered
    Failed {
        address: BlindAddress,
        action: Action,
        attempts: u32,
    },
    /// A poll check went unanswered
    PollMissed { address: BlindAddress },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Queued {
    address: BlindAddress,
    action: Action,
    origin: Origin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingReply { deadline: u64 },
    RetryAt(u64),
}

#[derive(Debug, Clone)]
struct InFlight {
    command: Queued,
    frame: Vec<u8>,
    attempts: u32,
    phase: Phase,
}

/// The shared command queue
#[derive(Debug)]
pub struct Dispatcher {
    config: DispatcherConfig,
    targets: HashMap<BlindAddress, Target>,
    queue: VecDeque<Queued>,
    in_flight: Option<InFlight>,
    next_send_at: u64,
}

impl Dispatcher {
    pub fn new(config: &DispatcherConfig) -> Self {
        Self {
            config: config.clone(),
            targets: HashMap::new(),
            queue: VecDeque::new(),
            in_flight: None,
            next_send_at: 0,
        }
    }

    /// Register how commands to `address` are framed
    pub fn register(&mut self, address: BlindAddress, target: Target) {
        self.targets.insert(address, target);
    }

    /// Forget `address`, dropping anything queued or in flight for it
    pub fn unregister(&mut self, address: BlindAddress) {
        self.targets.remove(&address);
        self.queue.retain(|q| q.address != address);
        if self.in_flight_for(address) {
            self.in_flight = None;
        }
    }

    /// Counter the next command to `address` will carry
    pub fn counter(&self, address: BlindAddress) -> Option<u8> {
        self.targets.get(&address).map(|t| t.counter)
    }

    /// Queue a command
    ///
    /// # Returns
    ///
    /// * `Result<bool>` - `true` if queued, `false` if dropped as a duplicate
    ///   check
    ///
    /// # Errors
    ///
    /// Returns [`EleroError::UnknownBlind`] for unregistered addresses and
    /// [`EleroError::QueueFull`] when the queue is at capacity. Stop is never
    /// rejected for capacity.
    pub fn submit(&mut self, address: BlindAddress, action: Action, origin: Origin) -> Result<bool> {
        if !self.targets.contains_key(&address) {
            return Err(EleroError::UnknownBlind(address));
        }

        let command = Queued { address, action, origin };

        match action {
            Action::Stop => {
                self.queue.retain(|q| q.address != address);
                if self.in_flight_for(address) {
                    debug!("Stop pre-empts in-flight command for 0x{:06x}", address);
                    self.in_flight = None;
                }
                self.queue.push_front(command);
                return Ok(true);
            }
            Action::Check => {
                if self.is_pending(address) {
                    debug!("Check for 0x{:06x} already covered by a pending command", address);
                    return Ok(false);
                }
            }
            _ => {
                let superseded = |q: &Queued| {
                    q.address == address && (q.action.is_motion() || q.action == Action::Check)
                };
                let remaining = self.queue.iter().filter(|q| !superseded(*q)).count();
                if remaining >= self.config.max_queue {
                    warn!("Command queue full, dropping {} for 0x{:06x}", action, address);
                    return Err(EleroError::QueueFull(address));
                }

                self.queue.retain(|q| !superseded(q));
                let replace_in_flight = self
                    .in_flight
                    .as_ref()
                    .is_some_and(|f| f.command.address == address && f.command.action.is_motion());
                if replace_in_flight {
                    debug!("{} replaces in-flight command for 0x{:06x}", action, address);
                    self.in_flight = None;
                }
            }
        }

        if self.queue.len() >= self.config.max_queue {
            warn!("Command queue full, dropping {} for 0x{:06x}", action, address);
            return Err(EleroError::QueueFull(address));
        }

        self.queue.push_back(command);
        Ok(true)
    }

    /// Next frame to put on the air, if the radio is free
    ///
    /// Returns a retransmission of the in-flight command once its backoff
    /// has elapsed, otherwise the head of the queue once the inter-frame gap
    /// has passed. The message counter advances once per command.
    pub fn next_transmission(&mut self, now: u64) -> Option<Vec<u8>> {
        if let Some(in_flight) = self.in_flight.as_mut() {
            return match in_flight.phase {
                Phase::RetryAt(at) if now >= at => {
                    in_flight.attempts += 1;
                    in_flight.phase = Phase::AwaitingReply {
                        deadline: now + self.config.ack_timeout_ms,
                    };
                    debug!(
                        "Retry #{} of {} for 0x{:06x}",
                        in_flight.attempts - 1,
                        in_flight.command.action,
                        in_flight.command.address
                    );
                    Some(in_flight.frame.clone())
                }
                _ => None,
            };
        }

        if now < self.next_send_at {
            return None;
        }

        while let Some(command) = self.queue.pop_front() {
            let Some(target) = self.targets.get_mut(&command.address) else {
                continue;
            };

            let counter = target.counter;
            target.counter = next_counter(counter);

            let frame = encode_command_frame(&CommandFrame {
                counter,
                blind: command.address,
                remote: target.remote,
                channel: target.channel,
                command: target.codes.code(command.action),
                framing: target.framing,
            });

            debug!(
                "Sending {} to 0x{:06x} (counter {})",
                command.action, command.address, counter
            );

            self.in_flight = Some(InFlight {
                command,
                frame: frame.clone(),
                attempts: 1,
                phase: Phase::AwaitingReply {
                    deadline: now + self.config.ack_timeout_ms,
                },
            });
            return Some(frame);
        }

        None
    }

    /// A status frame from `address` arrived
    pub fn on_reply(&mut self, address: BlindAddress, now: u64) -> Option<DispatchEvent> {
        if !self.in_flight_for(address) {
            return None;
        }

        let in_flight = self.in_flight.take()?;
        self.next_send_at = now + self.config.frame_gap_ms;
        Some(DispatchEvent::Completed {
            address,
            action: in_flight.command.action,
        })
    }

    /// Expire the in-flight command if its ack timeout has passed
    pub fn check_timeout(&mut self, now: u64) -> Option<DispatchEvent> {
        match self.in_flight.as_ref()?.phase {
            Phase::AwaitingReply { deadline } if now >= deadline => self.attempt_failed(now),
            _ => None,
        }
    }

    /// The last transmission never reached the air
    pub fn transmit_failed(&mut self, now: u64) -> Option<DispatchEvent> {
        self.attempt_failed(now)
    }

    fn attempt_failed(&mut self, now: u64) -> Option<DispatchEvent> {
        let (command, attempts) = self
            .in_flight
            .as_ref()
            .map(|f| (f.command, f.attempts))?;

        if command.origin == Origin::Poll {
            self.in_flight = None;
            self.next_send_at = now + self.config.frame_gap_ms;
            return Some(DispatchEvent::PollMissed {
                address: command.address,
            });
        }

        if attempts >= self.config.max_attempts {
            self.in_flight = None;
            self.next_send_at = now + self.config.frame_gap_ms;
            return Some(DispatchEvent::Failed {
                address: command.address,
                action: command.action,
                attempts,
            });
        }

        let retry_at = now + self.backoff_delay(attempts);
        if let Some(in_flight) = self.in_flight.as_mut() {
            in_flight.phase = Phase::RetryAt(retry_at);
        }
        None
    }

    /// Delay before retransmission after `attempts` transmissions
    fn backoff_delay(&self, attempts: u32) -> u64 {
        match self.config.backoff {
            Backoff::Fixed => self.config.retry_delay_ms,
            Backoff::Exponential => {
                let shift = attempts.saturating_sub(1).min(16);
                self.config
                    .retry_delay_ms
                    .saturating_mul(1u64 << shift)
                    .min(self.config.max_retry_delay_ms)
            }
        }
    }

    fn in_flight_for(&self, address: BlindAddress) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|f| f.command.address == address)
    }

    /// Whether anything is queued or in flight for `address`
    pub fn is_pending(&self, address: BlindAddress) -> bool {
        self.in_flight_for(address) || self.queue.iter().any(|q| q.address == address)
    }

    /// Address and action of the in-flight command
    pub fn in_flight(&self) -> Option<(BlindAddress, Action)> {
        self.in_flight
            .as_ref()
            .map(|f| (f.command.address, f.command.action))
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}
