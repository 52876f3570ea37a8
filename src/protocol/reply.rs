//! Inbound replies (Actor/Arm → PC) decoded from wire frames.

use crate::addr::Peer;
use crate::error::FrameError;
use crate::frame::Frame;
use crate::protocol::{TYPE_ACK, TYPE_ACTOR_STATUS, TYPE_ARM_STATUS, TYPE_CONTROL_TOGGLE};

/// Locomotion state reported by the Actor (spec.md §6, word 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    Idle,
    Moving,
    Turning,
}

/// Manipulator state reported by the Arm (spec.md §6, word 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmState {
    /// Idle/done — both are the same wire value (spec.md §6).
    Done,
    Picking,
}

/// A decoded reply from a peer, tagged with which peer it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerReply {
    Ack {
        peer: Peer,
        command_id: u32,
    },
    ActorStatus1 {
        state: ActorState,
        /// Obstacle distance piggy-backed on word 1, if present (spec.md §6).
        obstacle_cm: Option<u16>,
    },
    ArmStatus2 {
        state: ArmState,
    },
    ControlToggle {
        peer: Peer,
        enable: bool,
    },
}

impl PeerReply {
    /// Decode a frame arriving on `peer`'s link.
    pub fn decode(peer: Peer, frame: &Frame) -> Result<Self, FrameError> {
        match frame.data_type {
            TYPE_ACK => {
                let word = *frame.payload.first().ok_or(FrameError::UnexpectedLength {
                    what: "Ack",
                    expected: 1,
                    got: 0,
                })?;
                Ok(Self::Ack {
                    peer,
                    command_id: word as u32,
                })
            }
            TYPE_ACTOR_STATUS => {
                let word = *frame.payload.first().ok_or(FrameError::UnexpectedLength {
                    what: "ActorStatus1",
                    expected: 1,
                    got: 0,
                })?;
                let state = match word {
                    0 => ActorState::Idle,
                    1 => ActorState::Moving,
                    2 => ActorState::Turning,
                    other => {
                        return Err(FrameError::UnknownDataType { data_type: other as u8 });
                    }
                };
                let obstacle_cm = frame.payload.get(1).copied();
                Ok(Self::ActorStatus1 { state, obstacle_cm })
            }
            TYPE_ARM_STATUS => {
                let word = *frame.payload.first().ok_or(FrameError::UnexpectedLength {
                    what: "ArmStatus2",
                    expected: 1,
                    got: 0,
                })?;
                let state = match word {
                    0 => ArmState::Done,
                    1 => ArmState::Picking,
                    other => {
                        return Err(FrameError::UnknownDataType { data_type: other as u8 });
                    }
                };
                Ok(Self::ArmStatus2 { state })
            }
            TYPE_CONTROL_TOGGLE => {
                let word = *frame.payload.first().ok_or(FrameError::UnexpectedLength {
                    what: "ControlToggle",
                    expected: 1,
                    got: 0,
                })?;
                Ok(Self::ControlToggle {
                    peer,
                    enable: word != 0,
                })
            }
            other => Err(FrameError::UnknownDataType { data_type: other }),
        }
    }
}
