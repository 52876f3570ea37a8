//! Timer registry, pending-ACK table, and the injectable clock (spec.md §4.4).

use std::collections::HashMap;
use std::time::Instant;

use crate::addr::Peer;
use crate::bus::SchedulerEvent;

/// Abstract monotonic clock, milliseconds since some fixed epoch.
///
/// Pending-command timeouts and timer drift are computed against this
/// clock, never wall-clock time, so tests can drive them deterministically
/// (spec.md §5).
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Production clock: monotonic milliseconds since construction.
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// Test clock: advanced explicitly by calling [`VirtualClock::advance`].
#[derive(Debug, Default)]
pub struct VirtualClock {
    now_ms: u64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self { now_ms: 0 }
    }

    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
    }

    pub fn set(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
    }
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Periodic { period_ms: u64 },
    Countdown,
}

#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    kind: TimerKind,
    next_fire_at: u64,
    enabled: bool,
}

#[derive(Debug, Clone, Copy)]
struct PendingCommand {
    peer: Peer,
    sent_at: u64,
    timeout_ms: u64,
}

/// Owns the timer registry and the pending-command table (spec.md §3/§4.4).
pub struct Scheduler<C: Clock> {
    clock: C,
    timers: HashMap<&'static str, TimerEntry>,
    pending: HashMap<u32, PendingCommand>,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            timers: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Register (or re-enable) a periodic timer with the given period.
    /// Idempotent: calling twice with the same name just re-enables it.
    pub fn enable_timer(&mut self, name: &'static str, period_ms: u64) {
        let now = self.clock.now_ms();
        self.timers
            .entry(name)
            .and_modify(|t| t.enabled = true)
            .or_insert(TimerEntry {
                kind: TimerKind::Periodic { period_ms },
                next_fire_at: now + period_ms,
                enabled: true,
            });
    }

    /// Disable a periodic timer. Idempotent.
    pub fn disable_timer(&mut self, name: &'static str) {
        if let Some(t) = self.timers.get_mut(name) {
            t.enabled = false;
        }
    }

    /// Schedule a one-shot countdown, replacing (resetting) any existing
    /// countdown of the same name.
    pub fn start_countdown(&mut self, name: &'static str, duration_ms: u64) {
        let now = self.clock.now_ms();
        self.timers.insert(
            name,
            TimerEntry {
                kind: TimerKind::Countdown,
                next_fire_at: now + duration_ms,
                enabled: true,
            },
        );
    }

    /// Cancel a countdown (or disable a periodic timer) by name.
    pub fn cancel(&mut self, name: &'static str) {
        self.timers.remove(name);
    }

    /// Track an outbound command awaiting an ACK.
    pub fn register_pending(&mut self, command_id: u32, peer: Peer, timeout_ms: u64) {
        let now = self.clock.now_ms();
        self.pending.insert(
            command_id,
            PendingCommand {
                peer,
                sent_at: now,
                timeout_ms,
            },
        );
    }

    /// Mark a command ACKed, removing it from the pending table. No-op if
    /// the id isn't present (already timed out, or unknown).
    pub fn ack(&mut self, command_id: u32) {
        self.pending.remove(&command_id);
    }

    /// Number of commands in flight for `peer` (spec.md §8 invariant 4:
    /// this must never exceed 1).
    pub fn in_flight(&self, peer: Peer) -> usize {
        self.pending.values().filter(|p| p.peer == peer).count()
    }

    /// Fire all due timers and surface any pending command past its
    /// deadline. Periodic timers reschedule from their *previous*
    /// `next_fire_at`, not `now`, to avoid drift (spec.md §4.4); a timer
    /// more than one period overdue still only emits once per `tick()`
    /// call, re-evaluating due-ness on the next call (see DESIGN.md).
    pub fn tick(&mut self) -> Vec<SchedulerEvent> {
        let now = self.clock.now_ms();
        let mut events = Vec::new();

        let mut fired_countdowns = Vec::new();
        for (&name, timer) in self.timers.iter_mut() {
            if !timer.enabled || timer.next_fire_at > now {
                continue;
            }
            events.push(SchedulerEvent::TimerTick { name });
            match timer.kind {
                TimerKind::Periodic { period_ms } => {
                    timer.next_fire_at += period_ms;
                }
                TimerKind::Countdown => {
                    timer.enabled = false;
                    fired_countdowns.push(name);
                }
            }
        }
        for name in fired_countdowns {
            self.timers.remove(name);
        }

        let mut timed_out = Vec::new();
        for (&id, pending) in self.pending.iter() {
            if pending.sent_at + pending.timeout_ms <= now {
                events.push(SchedulerEvent::CommandTimeout {
                    command_id: id,
                    peer: pending.peer,
                });
                timed_out.push(id);
            }
        }
        for id in timed_out {
            self.pending.remove(&id);
        }

        events
    }
}
