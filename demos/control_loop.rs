//! Drives a `ControlEngine` through a cold start, an egg pickup, and an
//! obstacle-avoidance turn, printing each state transition.
//!
//! Usage: cargo run --example control_loop
//!
//! No real Actor/Arm hardware is required: this wires the engine to a
//! pair of inert sink channels and acks commands by hand, the way a test
//! harness would, to show the main loop's shape end to end.

use std::io::{self, Read, Write};
use std::time::Duration;

use henhouse::addr::Peer;
use henhouse::bus::ControlEvent;
use henhouse::config::Config;
use henhouse::link::DuplexChannel;
use henhouse::protocol::reply::PeerReply;
use henhouse::protocol::{Coordinate, Detection, DetectionEvent};
use henhouse::scheduler::VirtualClock;
use henhouse::state_machine::ControlState;
use henhouse::ControlEngine;

/// A channel with nobody on the other end: every read is `WouldBlock`,
/// every write succeeds and is discarded. Stands in for the serial port
/// when no Actor/Arm firmware is attached.
struct NullChannel;

impl Read for NullChannel {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::WouldBlock, "no peer attached"))
    }
}

impl Write for NullChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn null_channel() -> Box<dyn DuplexChannel> {
    Box::new(NullChannel)
}

fn main() {
    env_logger::init();

    let mut engine = ControlEngine::new(Config::default(), VirtualClock::new(), null_channel(), null_channel())
        .expect("default config is valid");
    println!("cold start -> {:?} (MoveForward in flight)", engine.control_state());
    assert_eq!(*engine.control_state(), ControlState::Idle);

    // Stand in for the Actor ACKing the cold-start MoveForward (id 1): only
    // then does the engine commit to ScanAndMove.
    engine
        .bus()
        .push(ControlEvent::Reply(PeerReply::Ack { peer: Peer::Actor, command_id: 1 }))
        .unwrap();
    engine.poll_once(Duration::from_millis(5));
    println!("MoveForward acked -> {:?}", engine.control_state());
    assert_eq!(*engine.control_state(), ControlState::ScanAndMove);

    // A detection lands in the center band: the engine issues a Stop to
    // the Actor and waits for its ACK before committing to PickUpEgg.
    let detection = DetectionEvent {
        timestamp: 0,
        frame_height: 480,
        frame_width: 640,
        detections: vec![Detection {
            center: Coordinate::new(320, 300),
            confidence: 0.92,
            class_id: 0,
        }],
    };
    engine.bus().push(ControlEvent::Detection(detection)).unwrap();
    engine.poll_once(Duration::from_millis(5));
    println!("detection seen -> {:?} (Stop in flight)", engine.control_state());

    // Stand in for the Actor ACKing command id 3 (id 2 was spent committing
    // the cold-start transition, which sends nothing).
    engine
        .bus()
        .push(ControlEvent::Reply(PeerReply::Ack { peer: Peer::Actor, command_id: 3 }))
        .unwrap();
    engine.poll_once(Duration::from_millis(5));
    println!("Stop acked -> {:?} (PickControl in flight)", engine.control_state());

    // The Arm reports the pick finished; with the queue now empty the
    // engine sends MoveForward and awaits its ACK before resuming scanning.
    engine
        .bus()
        .push(ControlEvent::Reply(PeerReply::ArmStatus2 { state: henhouse::protocol::reply::ArmState::Done }))
        .unwrap();
    engine.poll_once(Duration::from_millis(5));
    engine
        .bus()
        .push(ControlEvent::Reply(PeerReply::Ack { peer: Peer::Actor, command_id: 5 }))
        .unwrap();
    engine.poll_once(Duration::from_millis(5));
    println!("pick complete -> {:?}", engine.control_state());
    assert_eq!(*engine.control_state(), ControlState::ScanAndMove);
}
