//! The event bus: single typed channel from all producers to the engine.
//!
//! Bounded, `Mutex` + `Condvar`-backed (spec.md §4.3/§5 — no async runtime,
//! consistent with the teacher crate's synchronous style). `DetectionEvent`
//! is the only lossy variant; every other kind blocks the producer up to
//! the backpressure timeout rather than being silently dropped.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::addr::Peer;
use crate::protocol::{DetectionEvent, ObstacleDistance, PeerReply};

/// Link-level status change, surfaced instead of a transport error
/// reaching the state machine directly (spec.md §4.2/§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Disconnected { peer: Peer },
    Reconnected { peer: Peer },
}

/// A scheduler-fired timer or command timeout (see [`crate::scheduler`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    TimerTick { name: &'static str },
    CommandTimeout { command_id: u32, peer: Peer },
}

/// The tagged union of everything that flows through the bus.
#[derive(Debug, Clone)]
pub enum ControlEvent {
    Detection(DetectionEvent),
    Obstacle(ObstacleDistance),
    Timer(SchedulerEvent),
    Reply(PeerReply),
    LinkStatus(LinkEvent),
    Shutdown,
}

impl ControlEvent {
    fn is_detection(&self) -> bool {
        matches!(self, ControlEvent::Detection(_))
    }
}

/// Error returned by [`Bus::push`] when a non-`Detection` event could not
/// be placed within the backpressure window (spec.md §7, never silently
/// dropped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("bus is full and did not drain within the backpressure window")]
pub struct BusFull;

struct Inner {
    queue: VecDeque<ControlEvent>,
    capacity: usize,
}

/// Bounded, multi-producer single-consumer event bus.
pub struct Bus {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    not_full: Condvar,
    backpressure: Duration,
}

impl Bus {
    pub fn new(capacity: usize, backpressure: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity),
                capacity,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            backpressure,
        }
    }

    /// Push an event. `Detection` events drop the oldest queued detection
    /// when full instead of blocking (spec.md §4.3's lossy-vision rule);
    /// every other kind waits up to the configured backpressure timeout
    /// and returns [`BusFull`] rather than dropping silently.
    pub fn push(&self, event: ControlEvent) -> Result<(), BusFull> {
        let mut guard = self.inner.lock().expect("bus mutex poisoned");
        if event.is_detection() {
            if guard.queue.len() >= guard.capacity {
                if let Some(pos) = guard
                    .queue
                    .iter()
                    .position(ControlEvent::is_detection)
                {
                    guard.queue.remove(pos);
                }
            }
            // Still full (no detection to evict): drop the incoming one.
            if guard.queue.len() >= guard.capacity {
                return Ok(());
            }
            guard.queue.push_back(event);
            self.not_empty.notify_one();
            return Ok(());
        }

        let deadline = Instant::now() + self.backpressure;
        while guard.queue.len() >= guard.capacity {
            let now = Instant::now();
            if now >= deadline {
                return Err(BusFull);
            }
            let (g, timeout) = self
                .not_full
                .wait_timeout(guard, deadline - now)
                .expect("bus mutex poisoned");
            guard = g;
            if timeout.timed_out() && guard.queue.len() >= guard.capacity {
                return Err(BusFull);
            }
        }
        guard.queue.push_back(event);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Block for up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ControlEvent> {
        let mut guard = self.inner.lock().expect("bus mutex poisoned");
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(event) = guard.queue.pop_front() {
                self.not_full.notify_one();
                return Some(event);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (g, timed_out) = self
                .not_empty
                .wait_timeout(guard, deadline - now)
                .expect("bus mutex poisoned");
            guard = g;
            if timed_out.timed_out() && guard.queue.is_empty() {
                return None;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("bus mutex poisoned").queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
