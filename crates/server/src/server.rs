use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use realm::{
    Channel, ClientConnection, ClientPacket, ConnectionManager, ConnectionState, Frame,
    FrameFlags, MemoryDb, NetworkEndpoint, NetworkStats, Socket, World,
};

use crate::config::ServerConfig;
use crate::events::{DisconnectReason, ServerEvent};
use crate::handler::{Outcome, handle_packet};

pub struct GameServer {
    endpoint: NetworkEndpoint,
    connections: ConnectionManager,
    config: ServerConfig,
    world: World,
    tick: u64,
    tick_duration: Duration,
    last_tick_time: Instant,
    accumulator: Duration,
    running: Arc<AtomicBool>,
    pending_events: VecDeque<ServerEvent>,
}

impl GameServer {
    pub fn new(bind_addr: &str, config: ServerConfig) -> io::Result<Self> {
        let world = World::new(config.game_settings(), Arc::new(MemoryDb::demo()));
        Self::with_world(bind_addr, config, world)
    }

    pub fn with_world(bind_addr: &str, config: ServerConfig, world: World) -> io::Result<Self> {
        let endpoint = NetworkEndpoint::bind(bind_addr)?;
        let tick_duration = Duration::from_secs_f64(1.0 / config.tick_rate.max(1) as f64);

        Ok(Self {
            running: endpoint.running(),
            endpoint,
            connections: ConnectionManager::with_timeouts(
                config.max_clients,
                config.timeout,
                config.resend_interval,
            ),
            world,
            tick: 0,
            tick_duration,
            last_tick_time: Instant::now(),
            accumulator: Duration::ZERO,
            pending_events: VecDeque::new(),
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            for event in self.drain_events().collect::<Vec<_>>() {
                log_event(&event);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        self.shutdown_connections();
    }

    pub fn shutdown_connections(&mut self) {
        for client_id in self.connections.client_ids() {
            self.kick_client(client_id, DisconnectReason::Kicked);
        }
        self.world.shutdown();
    }

    pub fn kick_client(&mut self, client_id: u32, reason: DisconnectReason) {
        if let Some(client) = self.connections.remove(client_id) {
            self.send_control(FrameFlags::DISCONNECT, client.addr);
            self.release(client, reason);
        }
    }

    fn release(&mut self, client: ClientConnection, reason: DisconnectReason) {
        client.socket.mark_disconnected();
        if let Some(user) = client.user {
            if let Err(e) = self.world.logout(user) {
                log::debug!("Logout for client {}: {}", client.client_id, e);
            }
        }
        self.pending_events.push_back(ServerEvent::ClientDisconnected {
            client_id: client.client_id,
            reason,
        });
    }

    fn send_control(&mut self, flags: FrameFlags, addr: SocketAddr) {
        if let Err(e) = self.endpoint.send_frame(&Frame::control(flags), addr) {
            log::warn!("Control frame to {} failed: {}", addr, e);
        }
    }

    pub fn tick_once(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_tick_time;
        self.last_tick_time = now;
        self.accumulator += delta;

        if let Err(e) = self.process_network(now) {
            self.pending_events.push_back(ServerEvent::Error {
                message: format!("Network error: {}", e),
            });
        }

        while self.accumulator >= self.tick_duration {
            self.accumulator -= self.tick_duration;
            self.tick(now);
        }
    }

    fn tick(&mut self, now: Instant) {
        self.world.update(self.tick_duration.as_millis() as u32);
        self.tick += 1;

        self.pump_outbound(now);

        for client in self.connections.cleanup_timed_out(now) {
            self.release(client, DisconnectReason::Timeout);
        }
    }

    /// Frames everything the world queued on each peer socket, adds due
    /// resends and owed acks, and drops peers the world has closed.
    fn pump_outbound(&mut self, now: Instant) {
        let mut datagrams: Vec<(SocketAddr, Vec<u8>)> = Vec::new();
        let mut closed = Vec::new();

        for client in self.connections.iter_mut() {
            for packet in client.socket.take_outbound() {
                let framed = match packet.channel {
                    Channel::Reliable => client.channel.reliable(packet.data, now),
                    Channel::Unreliable => client.channel.unreliable(&packet.data, now),
                };
                match framed {
                    Ok(bytes) => datagrams.push((client.addr, bytes)),
                    Err(e) => log::error!("Could not frame for {}: {}", client.addr, e),
                }
            }

            for bytes in client.channel.resend_due(now) {
                datagrams.push((client.addr, bytes));
            }
            if let Some(bytes) = client.channel.ack_frame(now) {
                datagrams.push((client.addr, bytes));
            }

            if !client.socket.is_connected() {
                closed.push(client.client_id);
            }
        }

        for (addr, bytes) in datagrams {
            if let Err(e) = self.endpoint.send_to(&bytes, addr) {
                log::warn!("Send to {} failed: {}", addr, e);
            }
        }

        for client_id in closed {
            self.kick_client(client_id, DisconnectReason::Closed);
        }
    }

    fn process_network(&mut self, now: Instant) -> io::Result<()> {
        for (frame, addr) in self.endpoint.receive()? {
            self.handle_frame(frame, addr, now);
        }
        Ok(())
    }

    fn handle_frame(&mut self, frame: Frame, addr: SocketAddr, now: Instant) {
        let flags = frame.header.flags;
        if flags.contains(FrameFlags::CONNECT) {
            self.handle_connect(addr, now);
            return;
        }
        if flags.contains(FrameFlags::DISCONNECT) {
            if let Some(client) = self.connections.remove_by_addr(&addr) {
                self.release(client, DisconnectReason::Graceful);
            }
            return;
        }

        let Some(client) = self.connections.get_by_addr_mut(&addr) else {
            log::trace!("Frame from unknown peer {}", addr);
            return;
        };
        client.touch(now);
        let client_id = client.client_id;

        for payload in client.channel.receive(frame, now) {
            self.handle_payload(client_id, &payload);
        }
    }

    fn handle_connect(&mut self, addr: SocketAddr, now: Instant) {
        let known = self.connections.get_by_addr(&addr).is_some();

        match self.connections.accept(addr, now) {
            Ok(client) => {
                client.touch(now);
                let client_id = client.client_id;
                let mut accept = Frame::control(FrameFlags::ACCEPT);
                accept.payload = client_id.to_be_bytes().to_vec();
                if let Err(e) = self.endpoint.send_frame(&accept, addr) {
                    log::warn!("Accept to {} failed: {}", addr, e);
                }
                if !known {
                    self.pending_events
                        .push_back(ServerEvent::ClientConnected { client_id, addr });
                }
            }
            Err(e) => {
                self.send_control(FrameFlags::DISCONNECT, addr);
                self.pending_events.push_back(ServerEvent::ConnectionDenied {
                    addr,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn handle_payload(&mut self, client_id: u32, payload: &[u8]) {
        let packets = match ClientPacket::decode_all(payload) {
            Ok(packets) => packets,
            Err(e) => {
                log::warn!("Malformed payload from client {}: {}", client_id, e);
                return;
            }
        };

        for packet in packets {
            let Some(client) = self.connections.get(client_id) else {
                return;
            };
            let socket = Arc::clone(&client.socket);
            let user = client.user;

            match handle_packet(&mut self.world, user, &socket, packet) {
                Outcome::Continue => {}
                Outcome::LoggedIn(id) => {
                    if let Some(client) = self.connections.get_mut(client_id) {
                        client.user = Some(id);
                        client.state = ConnectionState::LoggedIn;
                    }
                    let name = self
                        .world
                        .user(id)
                        .map(|u| u.name().to_string())
                        .unwrap_or_default();
                    self.pending_events.push_back(ServerEvent::LoggedIn {
                        client_id,
                        user: id,
                        name,
                    });
                }
                Outcome::Disconnect => {
                    self.kick_client(client_id, DisconnectReason::Graceful);
                    return;
                }
            }
        }
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            tick: self.tick,
            client_count: self.connections.total_count(),
            logged_in: self.connections.logged_in_count(),
            max_clients: self.config.max_clients,
            user_count: self.world.user_count(),
            network_stats: self.endpoint.stats().clone(),
        }
    }
}

fn log_event(event: &ServerEvent) {
    match event {
        ServerEvent::ClientConnected { client_id, addr } => {
            log::info!("Client {} connected from {}", client_id, addr);
        }
        ServerEvent::LoggedIn {
            client_id,
            user,
            name,
        } => {
            log::info!("Client {} logged in as {} ({})", client_id, name, user);
        }
        ServerEvent::ClientDisconnected { client_id, reason } => {
            log::info!("Client {} {}", client_id, reason.as_str());
        }
        ServerEvent::ConnectionDenied { addr, reason } => {
            log::warn!("Connection denied to {}: {}", addr, reason);
        }
        ServerEvent::Error { message } => log::error!("{}", message),
    }
}

#[derive(Debug, Clone)]
pub struct ServerStats {
    pub tick: u64,
    pub client_count: usize,
    pub logged_in: usize,
    pub max_clients: usize,
    pub user_count: usize,
    pub network_stats: NetworkStats,
}
