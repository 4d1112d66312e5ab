use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::protocol::{Frame, MAX_PACKET_SIZE};
use crate::error::TransportError;

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub frames_rejected: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

pub struct NetworkEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    stats: NetworkStats,
    recv_buffer: [u8; MAX_PACKET_SIZE],
    running: Arc<AtomicBool>,
}

impl NetworkEndpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            stats: NetworkStats::default(),
            recv_buffer: [0u8; MAX_PACKET_SIZE],
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn send_to(&mut self, data: &[u8], addr: SocketAddr) -> Result<usize, TransportError> {
        if data.len() > MAX_PACKET_SIZE {
            return Err(TransportError::FrameTooLarge(data.len()));
        }

        let bytes = self.socket.send_to(data, addr)?;
        self.stats.frames_sent += 1;
        self.stats.bytes_sent += bytes as u64;
        Ok(bytes)
    }

    pub fn send_frame(&mut self, frame: &Frame, addr: SocketAddr) -> Result<usize, TransportError> {
        let data = frame.encode()?;
        self.send_to(&data, addr)
    }

    pub fn receive(&mut self) -> io::Result<Vec<(Frame, SocketAddr)>> {
        let mut frames = Vec::new();

        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((size, addr)) => match Frame::decode(&self.recv_buffer[..size]) {
                    Ok(frame) => {
                        self.stats.frames_received += 1;
                        self.stats.bytes_received += size as u64;
                        frames.push((frame, addr));
                    }
                    Err(e) => {
                        self.stats.frames_rejected += 1;
                        log::trace!("Rejected datagram from {}: {}", addr, e);
                    }
                },
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                // Windows reports ICMP port unreachable on the next recv.
                Err(ref e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(frames)
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
