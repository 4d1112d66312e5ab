use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::protocol::MAX_PAYLOAD_SIZE;
use super::socket::{Channel, SentPacket, Socket};
use crate::error::TransportError;
use crate::lock;

/// The game-facing side of a UDP peer. Sends are queued here and framed by
/// the server loop, which owns the peer's sequencing state.
#[derive(Debug)]
pub struct UdpPeerSocket {
    connected: AtomicBool,
    outbound: Mutex<VecDeque<SentPacket>>,
}

impl UdpPeerSocket {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            outbound: Mutex::new(VecDeque::new()),
        }
    }

    pub fn take_outbound(&self) -> Vec<SentPacket> {
        lock(&self.outbound).drain(..).collect()
    }

    pub fn queued(&self) -> usize {
        lock(&self.outbound).len()
    }

    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        lock(&self.outbound).clear();
    }
}

impl Default for UdpPeerSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl Socket for UdpPeerSocket {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(&self, data: &[u8], channel: Channel) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if data.len() > MAX_PAYLOAD_SIZE {
            return Err(TransportError::FrameTooLarge(data.len()));
        }
        lock(&self.outbound).push_back(SentPacket {
            data: data.to_vec(),
            channel,
        });
        Ok(())
    }

    fn max_unreliable_message_size(&self) -> usize {
        MAX_PAYLOAD_SIZE
    }

    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}
