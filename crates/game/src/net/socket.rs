use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::TransportError;
use crate::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Reliable,
    Unreliable,
}

/// A user's connection as the game sees it. Sends never block; a transport
/// that can no longer deliver reports it through `is_connected`.
pub trait Socket: Send + Sync {
    fn is_connected(&self) -> bool;

    fn send(&self, data: &[u8], channel: Channel) -> Result<(), TransportError>;

    fn max_unreliable_message_size(&self) -> usize;

    fn close(&self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    pub data: Vec<u8>,
    pub channel: Channel,
}

impl SentPacket {
    pub fn opcode(&self) -> Option<u8> {
        self.data.first().copied()
    }
}

#[derive(Debug)]
pub struct MemorySocket {
    connected: AtomicBool,
    closed: AtomicBool,
    max_unreliable: usize,
    sent: Mutex<Vec<SentPacket>>,
}

impl MemorySocket {
    pub fn new(max_unreliable: usize) -> Self {
        Self {
            connected: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            max_unreliable,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SentPacket> {
        lock(&self.sent).clone()
    }

    pub fn take_sent(&self) -> Vec<SentPacket> {
        std::mem::take(&mut *lock(&self.sent))
    }

    pub fn sent_count(&self) -> usize {
        lock(&self.sent).len()
    }
}

impl Default for MemorySocket {
    fn default() -> Self {
        Self::new(super::MAX_PAYLOAD_SIZE)
    }
}

impl Socket for MemorySocket {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.is_closed()
    }

    fn send(&self, data: &[u8], channel: Channel) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        lock(&self.sent).push(SentPacket {
            data: data.to_vec(),
            channel,
        });
        Ok(())
    }

    fn max_unreliable_message_size(&self) -> usize {
        self.max_unreliable
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_sends_with_channel() {
        let socket = MemorySocket::new(64);
        socket.send(&[1, 2], Channel::Reliable).unwrap();
        socket.send(&[3], Channel::Unreliable).unwrap();

        let sent = socket.take_sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].channel, Channel::Unreliable);
        assert_eq!(sent[0].opcode(), Some(1));
        assert_eq!(socket.sent_count(), 0);
    }

    #[test]
    fn disconnected_socket_rejects_sends() {
        let socket = MemorySocket::new(64);
        socket.set_connected(false);
        assert!(socket.send(&[1], Channel::Reliable).is_err());

        socket.set_connected(true);
        socket.close();
        assert!(!socket.is_connected());
        assert!(socket.send(&[1], Channel::Reliable).is_err());
    }
}
