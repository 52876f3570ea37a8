//! Serial links to the Actor and Arm peers (spec.md §4.2).
//!
//! Generic over a `DuplexChannel` so the core never depends on a concrete
//! transport: production code plugs in a `serialport`-crate handle or a
//! `TcpStream`; tests plug in an in-memory double.

use std::io::{self, Read, Write};

use crate::addr::Peer;
use crate::error::{LinkError, LinkResult};
use crate::frame::FrameDecoder;
use crate::protocol::command::OutboundCommand;
use crate::protocol::reply::PeerReply;

/// Anything byte-duplex the core can drive a [`SerialLink`] over.
pub trait DuplexChannel: Read + Write + Send {}
impl<T: Read + Write + Send> DuplexChannel for T {}

/// Maximum reconnect backoff (spec.md §4.2).
const MAX_BACKOFF_MS: u64 = 10_000;

/// A serial link to one peer: owns the channel, the frame decoder, and
/// reconnect backoff state.
pub struct SerialLink {
    peer: Peer,
    channel: Option<Box<dyn DuplexChannel>>,
    decoder: FrameDecoder,
    read_buf: [u8; 512],
    next_backoff_ms: u64,
}

impl SerialLink {
    pub fn new(peer: Peer, channel: Box<dyn DuplexChannel>, initial_backoff_ms: u64) -> Self {
        Self {
            peer,
            channel: Some(channel),
            decoder: FrameDecoder::new(),
            read_buf: [0u8; 512],
            next_backoff_ms: initial_backoff_ms,
        }
    }

    pub fn peer(&self) -> Peer {
        self.peer
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Encode and write `command` (tagged with `id` for ACK correlation).
    /// On write failure the link marks itself disconnected; the caller's
    /// scheduler-registered pending entry is left to time out (spec.md
    /// §4.2/§7 — `LinkError::WriteFailed`, no direct state change).
    pub fn send(&mut self, command: OutboundCommand, id: u32) -> LinkResult<()> {
        let Some(channel) = self.channel.as_mut() else {
            return Err(LinkError::Disconnected { peer: self.peer });
        };
        let frame = command.encode(id);
        let wire = frame
            .encode()
            .map_err(|source| LinkError::EncodeFailed { peer: self.peer, source })?;
        if let Err(source) = channel.write_all(&wire) {
            self.channel = None;
            return Err(LinkError::WriteFailed { peer: self.peer, source });
        }
        Ok(())
    }

    /// Read whatever bytes are available (non-blocking is the caller's
    /// responsibility via a read-timeout channel) and decode any complete
    /// frames into replies.
    pub fn poll(&mut self) -> LinkResult<Vec<PeerReply>> {
        let Some(channel) = self.channel.as_mut() else {
            return Err(LinkError::Disconnected { peer: self.peer });
        };
        let n = match channel.read(&mut self.read_buf) {
            Ok(0) => {
                self.channel = None;
                return Err(LinkError::Disconnected { peer: self.peer });
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                return Ok(Vec::new());
            }
            Err(source) => {
                self.channel = None;
                return Err(LinkError::ReadFailed { peer: self.peer, source });
            }
        };

        let frames = self.decoder.feed(&self.read_buf[..n]);
        let mut replies = Vec::with_capacity(frames.len());
        for frame in frames {
            match PeerReply::decode(self.peer, &frame) {
                Ok(reply) => replies.push(reply),
                Err(source) => return Err(LinkError::Decode { peer: self.peer, source }),
            }
        }
        Ok(replies)
    }

    /// Replace the channel after a successful reconnect and reset backoff.
    pub fn set_channel(&mut self, channel: Box<dyn DuplexChannel>, initial_backoff_ms: u64) {
        self.channel = Some(channel);
        self.next_backoff_ms = initial_backoff_ms;
    }

    /// The delay to wait before the next reconnect attempt, doubling each
    /// call up to [`MAX_BACKOFF_MS`] (spec.md §4.2).
    pub fn next_backoff(&mut self) -> u64 {
        let delay = self.next_backoff_ms;
        self.next_backoff_ms = (self.next_backoff_ms * 2).min(MAX_BACKOFF_MS);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;

    struct LoopbackChannel {
        inbound: VecDeque<u8>,
        outbound: Vec<u8>,
    }

    impl Read for LoopbackChannel {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.inbound.len().min(buf.len());
            for (i, slot) in buf.iter_mut().enumerate().take(n) {
                *slot = self.inbound.pop_front().unwrap();
                let _ = i;
            }
            if n == 0 {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "no data"))
            } else {
                Ok(n)
            }
        }
    }

    impl Write for LoopbackChannel {
        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            self.outbound.extend_from_slice(buf);
            Ok(())
        }
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.outbound.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn send_writes_encoded_frame() {
        let chan = LoopbackChannel { inbound: VecDeque::new(), outbound: Vec::new() };
        let mut link = SerialLink::new(Peer::Actor, Box::new(chan), 500);
        link.send(OutboundCommand::Stop, 9).unwrap();
        assert!(link.is_connected());
    }

    #[test]
    fn poll_decodes_ack() {
        let ack_wire = crate::frame::Frame::new(crate::protocol::TYPE_ACK, vec![9])
            .encode()
            .unwrap();
        let chan = LoopbackChannel { inbound: ack_wire.into(), outbound: Vec::new() };
        let mut link = SerialLink::new(Peer::Actor, Box::new(chan), 500);
        let replies = link.poll().unwrap();
        assert_eq!(replies, vec![PeerReply::Ack { peer: Peer::Actor, command_id: 9 }]);
    }

    #[test]
    fn write_failure_disconnects() {
        struct BrokenChannel;
        impl Read for BrokenChannel {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "no data"))
            }
        }
        impl Write for BrokenChannel {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("broken pipe"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut link = SerialLink::new(Peer::Arm, Box::new(BrokenChannel), 500);
        let result = link.send(OutboundCommand::ReadStatus2, 1);
        assert!(result.is_err());
        assert!(!link.is_connected());
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let chan = Cursor::new(Vec::<u8>::new());
        let mut link = SerialLink::new(Peer::Actor, Box::new(chan), 500);
        assert_eq!(link.next_backoff(), 500);
        assert_eq!(link.next_backoff(), 1000);
        assert_eq!(link.next_backoff(), 2000);
        assert_eq!(link.next_backoff(), 4000);
        assert_eq!(link.next_backoff(), 8000);
        assert_eq!(link.next_backoff(), 10_000);
        assert_eq!(link.next_backoff(), 10_000);
    }
}
