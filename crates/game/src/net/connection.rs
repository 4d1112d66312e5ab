use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::channel::PeerChannel;
use super::udp_socket::UdpPeerSocket;
use crate::error::TransportError;
use crate::world::UserId;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RESEND_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    LoggedIn,
    Disconnecting,
}

#[derive(Debug)]
pub struct ClientConnection {
    pub addr: SocketAddr,
    pub client_id: u32,
    pub state: ConnectionState,
    pub last_receive_time: Instant,
    pub channel: PeerChannel,
    pub socket: Arc<UdpPeerSocket>,
    pub user: Option<UserId>,
}

impl ClientConnection {
    pub fn new(addr: SocketAddr, client_id: u32, resend_after: Duration, now: Instant) -> Self {
        Self {
            addr,
            client_id,
            state: ConnectionState::Connected,
            last_receive_time: now,
            channel: PeerChannel::new(resend_after),
            socket: Arc::new(UdpPeerSocket::new()),
            user: None,
        }
    }

    pub fn is_timed_out(&self, timeout: Duration, now: Instant) -> bool {
        now.duration_since(self.last_receive_time) > timeout
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_receive_time = now;
    }
}

#[derive(Debug)]
pub struct ConnectionManager {
    clients_by_addr: HashMap<SocketAddr, u32>,
    clients: HashMap<u32, ClientConnection>,
    next_client_id: u32,
    max_clients: usize,
    timeout: Duration,
    resend_after: Duration,
}

impl ConnectionManager {
    pub fn new(max_clients: usize) -> Self {
        Self::with_timeouts(
            max_clients,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            Duration::from_millis(DEFAULT_RESEND_MS),
        )
    }

    pub fn with_timeouts(max_clients: usize, timeout: Duration, resend_after: Duration) -> Self {
        Self {
            clients_by_addr: HashMap::new(),
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
            resend_after,
        }
    }

    pub fn accept(
        &mut self,
        addr: SocketAddr,
        now: Instant,
    ) -> Result<&mut ClientConnection, TransportError> {
        if let Some(&client_id) = self.clients_by_addr.get(&addr) {
            return self
                .clients
                .get_mut(&client_id)
                .ok_or(TransportError::Malformed("stale address entry"));
        }

        if self.clients.len() >= self.max_clients {
            return Err(TransportError::ServerFull);
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;
        self.clients_by_addr.insert(addr, client_id);

        let resend_after = self.resend_after;
        Ok(self
            .clients
            .entry(client_id)
            .or_insert_with(|| ClientConnection::new(addr, client_id, resend_after, now)))
    }

    pub fn get_by_addr(&self, addr: &SocketAddr) -> Option<&ClientConnection> {
        self.clients_by_addr
            .get(addr)
            .and_then(|id| self.clients.get(id))
    }

    pub fn get_by_addr_mut(&mut self, addr: &SocketAddr) -> Option<&mut ClientConnection> {
        let id = self.clients_by_addr.get(addr)?;
        self.clients.get_mut(id)
    }

    pub fn get(&self, client_id: u32) -> Option<&ClientConnection> {
        self.clients.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: u32) -> Option<&mut ClientConnection> {
        self.clients.get_mut(&client_id)
    }

    pub fn remove(&mut self, client_id: u32) -> Option<ClientConnection> {
        let conn = self.clients.remove(&client_id)?;
        self.clients_by_addr.remove(&conn.addr);
        Some(conn)
    }

    pub fn remove_by_addr(&mut self, addr: &SocketAddr) -> Option<ClientConnection> {
        let client_id = self.clients_by_addr.remove(addr)?;
        self.clients.remove(&client_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientConnection> {
        self.clients.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ClientConnection> {
        self.clients.values_mut()
    }

    pub fn client_ids(&self) -> Vec<u32> {
        self.clients.keys().copied().collect()
    }

    pub fn cleanup_timed_out(&mut self, now: Instant) -> Vec<ClientConnection> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, c)| c.is_timed_out(self.timeout, now))
            .map(|(&id, _)| id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }

    pub fn logged_in_count(&self) -> usize {
        self.clients
            .values()
            .filter(|c| c.state == ConnectionState::LoggedIn)
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.clients.len()
    }
}
