//! The seven-state control state machine (spec.md §4.5).
//!
//! Modeled as a pure transition function over an explicit machine-state
//! value (spec.md §9's "avoid one-class-per-state inheritance" redesign
//! note): `transition(state, event, id, params) -> (state', effects)`.
//! `effects` are applied by [`crate::engine::ControlEngine`] — nothing in
//! this module touches the bus, the scheduler, or a link directly, which
//! is what makes it trivially unit-testable.

use std::collections::HashMap;

use crate::addr::Peer;
use crate::protocol::command::OutboundCommand;
use crate::protocol::reply::{ActorState, ArmState, PeerReply};
use crate::protocol::{Coordinate, DetectionEvent, ObstacleDistance};

/// One of the seven control states (spec.md §3). `PickUpEgg` carries the
/// pick queue directly, so it only exists while that state is active.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlState {
    Idle,
    ScanAndMove,
    PickUpEgg { queue: Vec<Coordinate> },
    Turn1st,
    ScanOnly,
    MoveOnly,
    Turn2nd,
}

/// A command sent as part of a state transition, awaiting its ACK before
/// the machine commits to `target` (spec.md §4.5 transition discipline).
#[derive(Debug, Clone, PartialEq)]
struct Awaiting {
    command_id: u32,
    peer: Peer,
    command: OutboundCommand,
    retries: u8,
    target: ControlState,
}

/// Whether a `Send` effect is a simple status poll (ACKed via the
/// scheduler's pending table only) or a state-changing transition (ACKed
/// via `Awaiting`, retried up to `max_retries`, then handed to the
/// idle-resend loop).
#[derive(Debug, Clone, PartialEq)]
pub enum SendKind {
    Poll,
    Transition { target: ControlState },
    /// Resend of an exhausted transition; retried forever rather than
    /// counted against `max_retries` (spec.md §4.5: "retries every 1s
    /// indefinitely").
    IdleResend { target: ControlState },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send {
        id: u32,
        command: OutboundCommand,
        kind: SendKind,
    },
    EnableTimer(&'static str),
    DisableTimer(&'static str),
    StartCountdown { name: &'static str, duration_ms: u64 },
    CancelCountdown(&'static str),
}

/// Configuration the transition function needs but that isn't part of the
/// machine's own state (spec.md §6's "configurable" constants).
#[derive(Debug, Clone, Copy)]
pub struct Params {
    pub center_band_low: f32,
    pub center_band_high: f32,
    pub obstacle_threshold_cm: u32,
    pub max_retries: u8,
    pub scan_only_timeout_ms: u64,
    pub move_only_countdown_ms: u64,
}

/// Everything the transition function needs to know in order to be pure:
/// the public `ControlState`, the in-flight transition (if any), whether
/// detections are currently consumed, the last-known obstacle reading
/// (spec.md §6 treats standalone and piggy-backed readings identically),
/// and per-peer send-enablement from `ControlToggle`.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineState {
    pub control: ControlState,
    awaiting: Option<Awaiting>,
    /// Outstanding status-poll command id per peer, keyed by peer. A poll
    /// isn't a state-changing transition so it isn't tracked by `awaiting`,
    /// but the at-most-one-in-flight-per-peer invariant (spec.md §8) still
    /// applies to it: `poll_or_defer` won't send a new poll to a peer that
    /// already has one outstanding here.
    poll_pending: HashMap<Peer, u32>,
    accept_detections: bool,
    obstacle_near: bool,
    peer_enabled: HashMap<Peer, bool>,
}

impl Default for MachineState {
    fn default() -> Self {
        let mut peer_enabled = HashMap::new();
        peer_enabled.insert(Peer::Actor, true);
        peer_enabled.insert(Peer::Arm, true);
        Self {
            control: ControlState::Idle,
            awaiting: None,
            poll_pending: HashMap::new(),
            accept_detections: false,
            obstacle_near: false,
            peer_enabled,
        }
    }
}

impl MachineState {
    pub fn is_peer_enabled(&self, peer: Peer) -> bool {
        *self.peer_enabled.get(&peer).unwrap_or(&true)
    }
}

/// Events the state machine reacts to. A strict subset of
/// [`crate::bus::ControlEvent`] — `LinkStatus` and `Shutdown` are handled
/// by the engine directly and never reach `transition`.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    FirstTick,
    Detection(DetectionEvent),
    Obstacle(ObstacleDistance),
    TimerTick(&'static str),
    Reply(PeerReply),
    CommandTimeout { command_id: u32, peer: Peer },
}

/// Owns the current [`MachineState`] and the monotonic command-id counter
/// (the one piece of this module that isn't purely functional — issuing a
/// fresh id is an effect-free but stateful operation). All decision logic
/// lives in [`transition`].
pub struct StateMachine {
    state: MachineState,
    next_id: u32,
    params: Params,
}

impl StateMachine {
    pub fn new(params: Params) -> Self {
        Self {
            state: MachineState::default(),
            next_id: 1,
            params,
        }
    }

    pub fn control_state(&self) -> &ControlState {
        &self.state.control
    }

    pub fn is_peer_enabled(&self, peer: Peer) -> bool {
        self.state.is_peer_enabled(peer)
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Drive one event through the machine, applying the resulting
    /// transition and returning the effects for the engine to carry out.
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let id = self.alloc_id();
        let (next, effects) = transition(&self.state, &event, id, &self.params);
        self.state = next;
        effects
    }
}

/// The pure transition function (spec.md §9 redesign note). `id` is the
/// command id to use *if* this call needs to send something; calls that
/// don't send simply leave it unused.
fn transition(
    ms: &MachineState,
    event: &Event,
    id: u32,
    params: &Params,
) -> (MachineState, Vec<Effect>) {
    // ControlToggle is independent of control state (spec.md §4.5).
    if let Event::Reply(PeerReply::ControlToggle { peer, enable }) = event {
        let mut next = ms.clone();
        next.peer_enabled.insert(*peer, *enable);
        return (next, Vec::new());
    }

    // Clear an outstanding status poll's busy flag on its CommandTimeout or
    // on the status reply it was waiting for. Applies regardless of control
    // state, the same way ControlToggle and obstacle tracking do, since a
    // poll's lifecycle is independent of the control state table.
    let mut poll_scratch;
    let ms: &MachineState = match event {
        Event::CommandTimeout { command_id, peer } if ms.poll_pending.get(peer) == Some(command_id) => {
            poll_scratch = ms.clone();
            poll_scratch.poll_pending.remove(peer);
            &poll_scratch
        }
        Event::Reply(PeerReply::ActorStatus1 { .. }) if ms.poll_pending.contains_key(&Peer::Actor) => {
            poll_scratch = ms.clone();
            poll_scratch.poll_pending.remove(&Peer::Actor);
            &poll_scratch
        }
        Event::Reply(PeerReply::ArmStatus2 { .. }) if ms.poll_pending.contains_key(&Peer::Arm) => {
            poll_scratch = ms.clone();
            poll_scratch.poll_pending.remove(&Peer::Arm);
            &poll_scratch
        }
        _ => ms,
    };

    // Normalize obstacle-near tracking, whether delivered standalone or
    // piggy-backed on an Actor status reply (spec.md §6: "treats them
    // identically"). Applies regardless of control state.
    let mut updated;
    let ms: &MachineState = match event {
        Event::Obstacle(ob) => {
            updated = ms.clone();
            updated.obstacle_near = ob.is_near(params.obstacle_threshold_cm);
            &updated
        }
        Event::Reply(PeerReply::ActorStatus1 { obstacle_cm: Some(cm), .. }) => {
            updated = ms.clone();
            updated.obstacle_near = (*cm as u32) < params.obstacle_threshold_cm;
            &updated
        }
        _ => ms,
    };

    // Status poll timers fire regardless of control state, as long as the
    // timer is enabled, but must respect the at-most-one-in-flight-per-peer
    // invariant (spec.md §8 invariant 4): skip this tick if a
    // state-transition command to the same peer is still outstanding.
    if let Event::TimerTick(name) = event {
        if *name == "actor_status" {
            return poll_or_defer(ms, id, Peer::Actor);
        }
        if *name == "arm_status" {
            return poll_or_defer(ms, id, Peer::Arm);
        }
    }

    // A command awaiting ACK takes priority over ordinary state-table
    // dispatch: only its own Ack/CommandTimeout can resolve it.
    if let Some(awaiting) = ms.awaiting.clone() {
        if let Event::Reply(PeerReply::Ack { peer, command_id }) = event {
            if *peer == awaiting.peer && *command_id == awaiting.command_id {
                return commit(ms, awaiting.target, id, params);
            }
        }
        if let Event::CommandTimeout { command_id, peer } = event {
            if *command_id == awaiting.command_id && *peer == awaiting.peer {
                return retry(ms, &awaiting, id, params);
            }
        }
        // Any other event while a transition is in flight is deferred —
        // e.g. a `DetectionEvent` arriving mid-`PickUpEgg` is handled by
        // the state-table arm below once `awaiting` clears.
        return (ms.clone(), Vec::new());
    }

    match &ms.control {
        ControlState::Idle => match event {
            Event::FirstTick => {
                await_transition(ms, id, Peer::Actor, OutboundCommand::MoveForward, ControlState::ScanAndMove)
            }
            _ => (ms.clone(), Vec::new()),
        },

        ControlState::ScanAndMove => match event {
            Event::Detection(det) if ms.accept_detections => {
                let egg = det.has_center_egg(params.center_band_low, params.center_band_high);
                if egg {
                    let queue = det.pick_queue();
                    await_transition(ms, id, Peer::Actor, OutboundCommand::Stop, ControlState::PickUpEgg { queue })
                } else if ms.obstacle_near {
                    await_transition(ms, id, Peer::Actor, OutboundCommand::Rotate90, ControlState::Turn1st)
                } else {
                    (ms.clone(), Vec::new())
                }
            }
            Event::Obstacle(_) if ms.obstacle_near => {
                await_transition(ms, id, Peer::Actor, OutboundCommand::Rotate90, ControlState::Turn1st)
            }
            _ => (ms.clone(), Vec::new()),
        },

        ControlState::PickUpEgg { queue } => match event {
            Event::Reply(PeerReply::ArmStatus2 { state: ArmState::Done }) => {
                let rest = &queue[1.min(queue.len())..];
                if rest.is_empty() {
                    await_transition(ms, id, Peer::Actor, OutboundCommand::MoveForward, ControlState::ScanAndMove)
                } else {
                    let target = rest[0];
                    let mut next = ms.clone();
                    next.control = ControlState::PickUpEgg { queue: rest.to_vec() };
                    (
                        next,
                        vec![Effect::Send {
                            id,
                            command: OutboundCommand::PickControl { target },
                            kind: SendKind::Poll,
                        }],
                    )
                }
            }
            // Refresh only when the queue has emptied (spec.md §9 Open
            // Question a): while `PickUpEgg` holds a nonempty queue,
            // fresh detections are ignored.
            Event::Detection(_) => (ms.clone(), Vec::new()),
            _ => (ms.clone(), Vec::new()),
        },

        ControlState::Turn1st => match event {
            Event::Reply(PeerReply::ActorStatus1 { state: ActorState::Idle, .. }) => {
                enter(ms, ControlState::ScanOnly, id, params)
            }
            _ => (ms.clone(), Vec::new()),
        },

        ControlState::ScanOnly => match event {
            Event::Detection(det) if ms.accept_detections && !det.detections.is_empty() => {
                let queue = det.pick_queue();
                let (next, mut effects) =
                    await_transition(ms, id, Peer::Actor, OutboundCommand::Stop, ControlState::PickUpEgg { queue });
                effects.insert(0, Effect::CancelCountdown("scan_only_timeout"));
                (next, effects)
            }
            Event::TimerTick("scan_only_timeout") => {
                await_transition(ms, id, Peer::Actor, OutboundCommand::MoveForward, ControlState::MoveOnly)
            }
            _ => (ms.clone(), Vec::new()),
        },

        ControlState::MoveOnly => match event {
            Event::TimerTick("move_only_countdown") => {
                await_transition(ms, id, Peer::Actor, OutboundCommand::Rotate90, ControlState::Turn2nd)
            }
            _ => (ms.clone(), Vec::new()),
        },

        ControlState::Turn2nd => match event {
            Event::Reply(PeerReply::ActorStatus1 { state: ActorState::Idle, .. }) => {
                await_transition(ms, id, Peer::Actor, OutboundCommand::MoveForward, ControlState::ScanAndMove)
            }
            _ => (ms.clone(), Vec::new()),
        },
    }
}

fn poll_or_defer(ms: &MachineState, id: u32, peer: Peer) -> (MachineState, Vec<Effect>) {
    if ms.awaiting.as_ref().map(|a| a.peer) == Some(peer) {
        // Respect the at-most-one-in-flight-per-peer invariant; the
        // periodic timer will try again next tick.
        return (ms.clone(), Vec::new());
    }
    if ms.poll_pending.contains_key(&peer) {
        // A previous status poll to this peer hasn't resolved yet either
        // (same invariant, for polls rather than transitions).
        return (ms.clone(), Vec::new());
    }
    let command = match peer {
        Peer::Actor => OutboundCommand::ReadStatus1,
        Peer::Arm => OutboundCommand::ReadStatus2,
    };
    let mut next = ms.clone();
    next.poll_pending.insert(peer, id);
    (next, vec![Effect::Send { id, command, kind: SendKind::Poll }])
}

/// Begin a state-changing transition: send `command`, await its ACK, and
/// only then commit to `target` (spec.md §4.5).
fn await_transition(
    ms: &MachineState,
    id: u32,
    peer: Peer,
    command: OutboundCommand,
    target: ControlState,
) -> (MachineState, Vec<Effect>) {
    let mut next = ms.clone();
    next.awaiting = Some(Awaiting {
        command_id: id,
        peer,
        command,
        retries: 0,
        target: target.clone(),
    });
    (next, vec![Effect::Send { id, command, kind: SendKind::Transition { target } }])
}

fn retry(ms: &MachineState, awaiting: &Awaiting, id: u32, params: &Params) -> (MachineState, Vec<Effect>) {
    let mut next = ms.clone();
    if awaiting.retries < params.max_retries {
        next.awaiting = Some(Awaiting {
            command_id: id,
            peer: awaiting.peer,
            command: awaiting.command,
            retries: awaiting.retries + 1,
            target: awaiting.target.clone(),
        });
        (
            next,
            vec![Effect::Send {
                id,
                command: awaiting.command,
                kind: SendKind::Transition { target: awaiting.target.clone() },
            }],
        )
    } else {
        next.awaiting = Some(Awaiting {
            command_id: id,
            peer: awaiting.peer,
            command: awaiting.command,
            retries: awaiting.retries,
            target: awaiting.target.clone(),
        });
        (
            next,
            vec![Effect::Send {
                id,
                command: awaiting.command,
                kind: SendKind::IdleResend { target: awaiting.target.clone() },
            }],
        )
    }
}

fn commit(ms: &MachineState, target: ControlState, id: u32, params: &Params) -> (MachineState, Vec<Effect>) {
    let mut next = ms.clone();
    next.awaiting = None;
    enter(&next, target, id, params)
}

/// Run on_exit for the current state, then on_enter for `target` (spec.md
/// §4.5 transition discipline on leaving/entering states). `id` is used
/// only by on_enter arms that themselves send a command (`PickUpEgg`'s
/// head-of-queue `PickControl`) — the command that drove the transition
/// itself was already sent by `await_transition`.
fn enter(ms: &MachineState, target: ControlState, id: u32, params: &Params) -> (MachineState, Vec<Effect>) {
    let mut next = ms.clone();
    let mut effects = Vec::new();

    // on_exit: disable timers/subscriptions that don't apply downstream.
    match &ms.control {
        ControlState::ScanAndMove => {
            if !matches!(target, ControlState::PickUpEgg { .. } | ControlState::ScanOnly) {
                next.accept_detections = false;
                effects.push(Effect::DisableTimer("actor_status"));
            }
        }
        ControlState::PickUpEgg { .. } => {
            effects.push(Effect::DisableTimer("arm_status"));
        }
        ControlState::Turn1st | ControlState::Turn2nd => {
            if !matches!(target, ControlState::ScanAndMove | ControlState::ScanOnly) {
                effects.push(Effect::DisableTimer("actor_status"));
            }
        }
        ControlState::ScanOnly => {
            next.accept_detections = false;
            effects.push(Effect::CancelCountdown("scan_only_timeout"));
        }
        ControlState::MoveOnly => {
            effects.push(Effect::CancelCountdown("move_only_countdown"));
        }
        ControlState::Idle => {}
    }

    // on_enter.
    match &target {
        ControlState::ScanAndMove => {
            next.accept_detections = true;
            effects.push(Effect::EnableTimer("actor_status"));
        }
        ControlState::PickUpEgg { queue } => {
            if let Some(&head) = queue.first() {
                effects.push(Effect::Send {
                    id,
                    command: OutboundCommand::PickControl { target: head },
                    kind: SendKind::Poll,
                });
            }
            effects.push(Effect::EnableTimer("arm_status"));
        }
        ControlState::Turn1st | ControlState::Turn2nd => {
            effects.push(Effect::EnableTimer("actor_status"));
        }
        ControlState::ScanOnly => {
            next.accept_detections = true;
            effects.push(Effect::StartCountdown {
                name: "scan_only_timeout",
                duration_ms: params.scan_only_timeout_ms,
            });
        }
        ControlState::MoveOnly => {
            effects.push(Effect::StartCountdown {
                name: "move_only_countdown",
                duration_ms: params.move_only_countdown_ms,
            });
        }
        ControlState::Idle => {}
    }

    next.control = target;
    (next, effects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Coordinate, Detection};

    fn params() -> Params {
        Params {
            center_band_low: 0.25,
            center_band_high: 0.75,
            obstacle_threshold_cm: 30,
            max_retries: 3,
            scan_only_timeout_ms: 5000,
            move_only_countdown_ms: 5000,
        }
    }

    fn detection_at(y: u16) -> DetectionEvent {
        DetectionEvent {
            timestamp: 0,
            frame_height: 480,
            frame_width: 640,
            detections: vec![Detection {
                center: Coordinate::new(320, y),
                confidence: 0.9,
                class_id: 0,
            }],
        }
    }

    fn ack_for(effects: &[Effect]) -> Event {
        for e in effects {
            if let Effect::Send { id, command, .. } = e {
                return Event::Reply(PeerReply::Ack {
                    peer: command.peer(),
                    command_id: *id,
                });
            }
        }
        panic!("no Send effect found");
    }

    /// Drives the cold-start `Idle -> ScanAndMove` transition to completion
    /// (send `MoveForward`, ack it) so tests that don't care about cold
    /// start itself can just start from `ScanAndMove`.
    fn enter_scan_and_move(sm: &mut StateMachine) {
        let effects = sm.handle(Event::FirstTick);
        let ack = ack_for(&effects);
        sm.handle(ack);
        assert_eq!(*sm.control_state(), ControlState::ScanAndMove);
    }

    #[test]
    fn cold_start_to_scan_and_move() {
        let mut sm = StateMachine::new(params());
        let effects = sm.handle(Event::FirstTick);
        let move_sent = effects
            .iter()
            .any(|e| matches!(e, Effect::Send { command: OutboundCommand::MoveForward, .. }));
        assert!(move_sent, "cold start must send MoveForward to the Actor");
        assert_eq!(*sm.control_state(), ControlState::Idle);

        let ack = ack_for(&effects);
        let effects = sm.handle(ack);
        assert_eq!(*sm.control_state(), ControlState::ScanAndMove);
        assert!(effects.contains(&Effect::EnableTimer("actor_status")));
    }

    #[test]
    fn center_band_detection_leads_to_pick_up_egg() {
        let mut sm = StateMachine::new(params());
        enter_scan_and_move(&mut sm);
        let effects = sm.handle(Event::Detection(detection_at(300)));
        let stop_sent = effects
            .iter()
            .any(|e| matches!(e, Effect::Send { command: OutboundCommand::Stop, .. }));
        assert!(stop_sent);
        let ack = ack_for(&effects);
        let effects = sm.handle(ack);
        match sm.control_state() {
            ControlState::PickUpEgg { queue } => {
                assert_eq!(queue.as_slice(), &[Coordinate::new(320, 300)]);
            }
            other => panic!("expected PickUpEgg, got {other:?}"),
        }
        let pick_sent = effects.iter().any(|e| {
            matches!(
                e,
                Effect::Send { command: OutboundCommand::PickControl { target }, .. }
                    if *target == Coordinate::new(320, 300)
            )
        });
        assert!(pick_sent, "entering PickUpEgg must send PickControl for the queue head");
        assert!(effects.contains(&Effect::EnableTimer("arm_status")));
    }

    #[test]
    fn pick_completion_empties_queue_and_returns_to_scan() {
        let mut sm = StateMachine::new(params());
        enter_scan_and_move(&mut sm);
        let effects = sm.handle(Event::Detection(detection_at(300)));
        let ack = ack_for(&effects);
        sm.handle(ack);

        let effects = sm.handle(Event::Reply(PeerReply::ArmStatus2 { state: ArmState::Done }));
        let move_sent = effects
            .iter()
            .any(|e| matches!(e, Effect::Send { command: OutboundCommand::MoveForward, .. }));
        assert!(move_sent);
        let ack = ack_for(&effects);
        sm.handle(ack);
        assert_eq!(*sm.control_state(), ControlState::ScanAndMove);
    }

    #[test]
    fn obstacle_rotate_to_turn1st_then_scan_only() {
        let mut sm = StateMachine::new(params());
        enter_scan_and_move(&mut sm);
        let effects = sm.handle(Event::Obstacle(ObstacleDistance { cm: 20, timestamp: 0 }));
        let rotate_sent = effects
            .iter()
            .any(|e| matches!(e, Effect::Send { command: OutboundCommand::Rotate90, .. }));
        assert!(rotate_sent);
        let ack = ack_for(&effects);
        sm.handle(ack);
        assert_eq!(*sm.control_state(), ControlState::Turn1st);

        sm.handle(Event::Reply(PeerReply::ActorStatus1 {
            state: ActorState::Idle,
            obstacle_cm: None,
        }));
        assert_eq!(*sm.control_state(), ControlState::ScanOnly);
    }

    #[test]
    fn scan_only_timeout_chain_to_move_only_and_turn2nd() {
        let mut sm = StateMachine::new(params());
        enter_scan_and_move(&mut sm);
        let effects = sm.handle(Event::Obstacle(ObstacleDistance { cm: 20, timestamp: 0 }));
        let ack = ack_for(&effects);
        sm.handle(ack);
        sm.handle(Event::Reply(PeerReply::ActorStatus1 { state: ActorState::Idle, obstacle_cm: None }));
        assert_eq!(*sm.control_state(), ControlState::ScanOnly);

        let effects = sm.handle(Event::TimerTick("scan_only_timeout"));
        let ack = ack_for(&effects);
        sm.handle(ack);
        assert_eq!(*sm.control_state(), ControlState::MoveOnly);

        let effects = sm.handle(Event::TimerTick("move_only_countdown"));
        let ack = ack_for(&effects);
        sm.handle(ack);
        assert_eq!(*sm.control_state(), ControlState::Turn2nd);

        let effects = sm.handle(Event::Reply(PeerReply::ActorStatus1 { state: ActorState::Idle, obstacle_cm: None }));
        let move_sent = effects
            .iter()
            .any(|e| matches!(e, Effect::Send { command: OutboundCommand::MoveForward, .. }));
        assert!(move_sent, "Turn2nd must resend MoveForward before re-entering ScanAndMove");
        let ack = ack_for(&effects);
        sm.handle(ack);
        assert_eq!(*sm.control_state(), ControlState::ScanAndMove);
    }

    #[test]
    fn command_timeout_retries_then_idle_resends() {
        let mut sm = StateMachine::new(params());
        enter_scan_and_move(&mut sm);
        let effects = sm.handle(Event::Obstacle(ObstacleDistance { cm: 20, timestamp: 0 }));
        let (id, peer) = match &effects[0] {
            Effect::Send { id, command, .. } => (*id, command.peer()),
            _ => panic!("expected send"),
        };

        for _ in 1..=3u8 {
            let effects = sm.handle(Event::CommandTimeout { command_id: id, peer });
            assert!(effects
                .iter()
                .any(|e| matches!(e, Effect::Send { kind: SendKind::Transition { .. }, .. })));
        }
        let effects = sm.handle(Event::CommandTimeout { command_id: id, peer });
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Send { kind: SendKind::IdleResend { .. }, .. })));
    }

    #[test]
    fn status_poll_does_not_overlap_itself() {
        let mut sm = StateMachine::new(params());
        enter_scan_and_move(&mut sm); // enables actor_status
        let first = sm.handle(Event::TimerTick("actor_status"));
        assert!(first
            .iter()
            .any(|e| matches!(e, Effect::Send { command: OutboundCommand::ReadStatus1, .. })));

        // The poll hasn't been answered yet; a second tick must not send
        // another ReadStatus1 on top of it (spec.md §8 invariant 4).
        let second = sm.handle(Event::TimerTick("actor_status"));
        assert!(second.is_empty());

        // Once the poll times out, the next tick is free to send again.
        let (id, peer) = match &first[0] {
            Effect::Send { id, command, .. } => (*id, command.peer()),
            _ => panic!("expected send"),
        };
        sm.handle(Event::CommandTimeout { command_id: id, peer });
        let third = sm.handle(Event::TimerTick("actor_status"));
        assert!(third
            .iter()
            .any(|e| matches!(e, Effect::Send { command: OutboundCommand::ReadStatus1, .. })));
    }

    #[test]
    fn status_reply_clears_poll_in_flight_for_next_tick() {
        let mut sm = StateMachine::new(params());
        enter_scan_and_move(&mut sm);
        let first = sm.handle(Event::TimerTick("actor_status"));
        assert_eq!(first.len(), 1);

        // The status reply itself resolves the poll, even with no explicit
        // Ack frame (status replies don't carry a command id on the wire).
        sm.handle(Event::Reply(PeerReply::ActorStatus1 { state: ActorState::Moving, obstacle_cm: None }));
        let second = sm.handle(Event::TimerTick("actor_status"));
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn control_toggle_is_independent_of_state() {
        let mut sm = StateMachine::new(params());
        enter_scan_and_move(&mut sm);
        assert!(sm.is_peer_enabled(Peer::Arm));
        sm.handle(Event::Reply(PeerReply::ControlToggle { peer: Peer::Arm, enable: false }));
        assert!(!sm.is_peer_enabled(Peer::Arm));
        assert_eq!(*sm.control_state(), ControlState::ScanAndMove);
        sm.handle(Event::Reply(PeerReply::ControlToggle { peer: Peer::Arm, enable: true }));
        assert!(sm.is_peer_enabled(Peer::Arm));
    }

    #[test]
    fn center_band_boundary_values_match_has_center_egg() {
        let p = params();
        assert!(detection_at(120).has_center_egg(p.center_band_low, p.center_band_high));
        assert!(!detection_at(115).has_center_egg(p.center_band_low, p.center_band_high));
    }
}
