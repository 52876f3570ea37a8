//! Outbound commands (PC → Actor/Arm) and their wire encoding.

use crate::addr::Peer;
use crate::frame::Frame;
use crate::protocol::types::Coordinate;
use crate::protocol::{
    TYPE_COORDINATE, TYPE_MOVE_FORWARD, TYPE_READ_STATUS, TYPE_ROTATE90, TYPE_STOP,
};

/// A command targeted at a specific peer, tagged with the id used to
/// correlate its eventual ACK (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundCommand {
    MoveForward,
    Stop,
    Rotate90,
    ReadStatus1,
    PickControl { target: Coordinate },
    ReadStatus2,
}

impl OutboundCommand {
    /// The peer this command is sent to.
    pub fn peer(&self) -> Peer {
        match self {
            Self::MoveForward | Self::Stop | Self::Rotate90 | Self::ReadStatus1 => Peer::Actor,
            Self::PickControl { .. } | Self::ReadStatus2 => Peer::Arm,
        }
    }

    /// Encode to the wire frame carrying `id` as its sentinel word.
    ///
    /// `MoveForward`/`Stop`/`Rotate90`/`ReadStatus1`/`ReadStatus2` are
    /// single-word sentinel commands (spec.md §6); `PickControl` carries
    /// the target coordinate as the §6 coordinate-output frame.
    pub fn encode(&self, id: u32) -> Frame {
        let sentinel = (id & 0xFFFF) as u16;
        match self {
            Self::MoveForward => Frame::new(TYPE_MOVE_FORWARD, vec![sentinel]),
            Self::Stop => Frame::new(TYPE_STOP, vec![sentinel]),
            Self::Rotate90 => Frame::new(TYPE_ROTATE90, vec![sentinel]),
            Self::ReadStatus1 => Frame::new(TYPE_READ_STATUS, vec![sentinel]),
            Self::ReadStatus2 => Frame::new(TYPE_READ_STATUS, vec![sentinel]),
            Self::PickControl { target } => {
                Frame::new(TYPE_COORDINATE, vec![target.x, target.y])
            }
        }
    }
}
