//! Wire-level command/reply types and the type-ID dispatch table.
//!
//! - [`OutboundCommand`] — messages the controller sends (PC → Actor/Arm).
//! - [`PeerReply`] — messages a peer sends back (Actor/Arm → PC).
//!
//! Type IDs not pinned down by spec.md §6 (the per-command IDs for
//! `MoveForward`/`Stop`/`Rotate90`/`ReadStatus1`/`ReadStatus2`) are assigned
//! here as a private dispatch table; the ones spec.md does pin down
//! (coordinate output, status replies, ACK, control toggle) use its exact
//! values.

pub mod command;
pub mod reply;
pub mod types;

pub use command::OutboundCommand;
pub use reply::PeerReply;
pub use types::{Coordinate, Detection, DetectionEvent, ObstacleDistance};

/// Coordinate payload, PC → Arm (spec.md §6). Also used for `PickControl`.
pub const TYPE_COORDINATE: u8 = 0x01;
/// Control toggle, MCU → PC (spec.md §6).
pub const TYPE_CONTROL_TOGGLE: u8 = 0x02;
/// Actor status reply (spec.md §6).
pub const TYPE_ACTOR_STATUS: u8 = 0x10;
/// Arm status reply (spec.md §6).
pub const TYPE_ARM_STATUS: u8 = 0x20;
/// ACK frame, echoing a command id (spec.md §6).
pub const TYPE_ACK: u8 = 0xFF;

// Outbound command IDs not pinned down by spec.md; assigned locally.
pub(crate) const TYPE_MOVE_FORWARD: u8 = 0x11;
pub(crate) const TYPE_STOP: u8 = 0x12;
pub(crate) const TYPE_ROTATE90: u8 = 0x13;
pub(crate) const TYPE_READ_STATUS: u8 = 0x14;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Peer;
    use crate::frame::Frame;

    #[test]
    fn command_encode_decode_round_trips_through_ack() {
        let cmd = OutboundCommand::Stop;
        let frame = cmd.encode(42);
        // A peer ACKs by echoing the id on TYPE_ACK.
        let ack_frame = Frame::new(TYPE_ACK, vec![42]);
        let reply = PeerReply::decode(Peer::Actor, &ack_frame).unwrap();
        assert_eq!(reply, PeerReply::Ack { peer: Peer::Actor, command_id: 42 });
        let _ = frame;
    }
}
