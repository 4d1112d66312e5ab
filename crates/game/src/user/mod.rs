mod send_queue;
mod shopping;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::context::{ServerContext, Teardown};
use crate::entity::MapEntityIndex;
use crate::error::TransportError;
use crate::lock;
use crate::net::{Channel, Socket};
use crate::packet::{GameMessage, PacketWriter, server};
use crate::world::{MapId, UserId};

pub use send_queue::SendQueue;
pub use shopping::{ShopSession, UserShoppingState};

/// A player's session: the connection plus everything outbound for it.
/// The character itself lives on the map as a dynamic entity and refers
/// back here.
pub struct User {
    id: UserId,
    name: String,
    conn: Arc<dyn Socket>,
    ctx: Arc<ServerContext>,
    unreliable: Mutex<SendQueue>,
    shopping: UserShoppingState,
    location: Mutex<Option<(MapId, MapEntityIndex)>>,
    dispose_requested: AtomicBool,
    disposed: AtomicBool,
}

impl User {
    pub fn new(
        id: UserId,
        name: impl Into<String>,
        conn: Arc<dyn Socket>,
        ctx: Arc<ServerContext>,
    ) -> Arc<Self> {
        let max_chunk = conn.max_unreliable_message_size();
        Arc::new(Self {
            id,
            name: name.into(),
            conn,
            ctx,
            unreliable: Mutex::new(SendQueue::new(max_chunk)),
            shopping: UserShoppingState::default(),
            location: Mutex::new(None),
            dispose_requested: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &Arc<dyn Socket> {
        &self.conn
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    pub fn shopping(&self) -> &UserShoppingState {
        &self.shopping
    }

    pub fn location(&self) -> Option<(MapId, MapEntityIndex)> {
        *lock(&self.location)
    }

    pub(crate) fn set_location(&self, location: Option<(MapId, MapEntityIndex)>) {
        *lock(&self.location) = location;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn is_dispose_requested(&self) -> bool {
        self.dispose_requested.load(Ordering::SeqCst)
    }

    /// Queues this user for teardown at the end of the current tick. Only the
    /// first request has an effect.
    pub fn request_dispose(&self) {
        if self.dispose_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        log::debug!("User {} ({}) scheduled for disposal", self.name, self.id);
        self.ctx.defer_teardown(Teardown::User(self.id));
    }

    pub(crate) fn mark_disposed(&self) {
        self.dispose_requested.store(true, Ordering::SeqCst);
        self.disposed.store(true, Ordering::SeqCst);
        lock(&self.unreliable).clear();
    }

    pub fn send(&self, data: &PacketWriter) {
        self.send_with(data, Channel::Reliable);
    }

    pub fn send_with(&self, data: &PacketWriter, channel: Channel) {
        self.send_raw(data.as_bytes(), channel);
    }

    fn send_raw(&self, data: &[u8], channel: Channel) {
        if self.is_disposed() {
            log::warn!(
                "Send to disposed user {} dropped (opcode {:?})",
                self.name,
                data.first()
            );
            return;
        }

        if !self.conn.is_connected() {
            log::error!("User {} has no live connection; disposing", self.name);
            self.request_dispose();
            return;
        }

        log::trace!("-> {} {:?} {} bytes", self.name, channel, data.len());
        match self.conn.send(data, channel) {
            Ok(()) => {}
            Err(TransportError::NotConnected) => {
                log::error!("Send to {} found the connection closed; disposing", self.name);
                self.request_dispose();
            }
            Err(e) => log::error!(
                "Dropped packet for {} (opcode {:?}): {}",
                self.name,
                data.first(),
                e
            ),
        }
    }

    pub fn send_unreliable_buffered(&self, data: &PacketWriter) {
        lock(&self.unreliable).enqueue(data.as_bytes());
    }

    pub fn unreliable_buffered(&self) -> usize {
        lock(&self.unreliable).len()
    }

    pub fn flush_unreliable_buffer(&self) {
        if self.is_disposed() {
            return;
        }

        if !self.conn.is_connected() {
            log::error!(
                "User {} lost its connection with unreliable data pending; disposing",
                self.name
            );
            lock(&self.unreliable).clear();
            self.request_dispose();
            return;
        }

        let chunks: Vec<Vec<u8>> = {
            let mut queue = lock(&self.unreliable);
            std::iter::from_fn(|| queue.dequeue()).collect()
        };
        for chunk in chunks {
            self.send_raw(&chunk, Channel::Unreliable);
        }
    }

    pub fn send_message(&self, message: GameMessage, params: &[&dyn fmt::Display]) {
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        self.send(&server::send_message(message, &params));
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("location", &self.location())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameSettings;
    use crate::db::MemoryDb;
    use crate::net::MemorySocket;

    fn user_with(socket: Arc<MemorySocket>) -> (Arc<User>, Arc<ServerContext>) {
        let ctx = Arc::new(ServerContext::new(
            GameSettings::default(),
            Arc::new(MemoryDb::new()),
        ));
        let user = User::new(UserId(7), "Alice", socket, ctx.clone());
        (user, ctx)
    }

    #[test]
    fn buffered_sends_flush_in_order() {
        let socket = Arc::new(MemorySocket::new(1024));
        let (user, _ctx) = user_with(socket.clone());

        for byte in [0xA, 0xB, 0xC] {
            let mut pw = PacketWriter::with_opcode(byte);
            pw.write_u8(byte);
            user.send_unreliable_buffered(&pw);
        }
        assert_eq!(socket.sent_count(), 0);

        user.flush_unreliable_buffer();
        let sent = socket.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, Channel::Unreliable);
        assert_eq!(sent[0].data, vec![0xA, 0xA, 0xB, 0xB, 0xC, 0xC]);
        assert_eq!(user.unreliable_buffered(), 0);
    }

    #[test]
    fn flush_splits_at_max_message_size() {
        let socket = Arc::new(MemorySocket::new(4));
        let (user, _ctx) = user_with(socket.clone());

        for byte in 1..=3u8 {
            let mut pw = PacketWriter::with_opcode(byte);
            pw.write_u8(byte);
            user.send_unreliable_buffered(&pw);
        }
        user.flush_unreliable_buffer();

        let data: Vec<Vec<u8>> = socket.take_sent().into_iter().map(|p| p.data).collect();
        assert_eq!(data, vec![vec![1, 1, 2, 2], vec![3, 3]]);
    }

    #[test]
    fn dead_connection_schedules_disposal_once() {
        let socket = Arc::new(MemorySocket::default());
        let (user, ctx) = user_with(socket.clone());
        socket.set_connected(false);

        user.send(&server::ping());
        user.send(&server::ping());
        user.flush_unreliable_buffer();

        assert!(user.is_dispose_requested());
        assert!(!user.is_disposed());
        assert_eq!(ctx.pending_teardown(), 1);
        assert_eq!(socket.sent_count(), 0);
    }

    #[test]
    fn oversized_packet_is_dropped_without_disposal() {
        let socket = Arc::new(crate::net::UdpPeerSocket::new());
        let ctx = Arc::new(ServerContext::new(
            GameSettings::default(),
            Arc::new(MemoryDb::new()),
        ));
        let user = User::new(UserId(3), "Carol", socket.clone(), ctx.clone());

        let mut big = PacketWriter::with_opcode(1);
        big.write_bytes(&vec![0; crate::net::MAX_PAYLOAD_SIZE]);
        user.send(&big);
        user.send(&server::ping());

        assert!(!user.is_dispose_requested());
        assert_eq!(ctx.pending_teardown(), 0);
        assert_eq!(socket.take_outbound().len(), 1);
    }

    #[test]
    fn disposed_user_ignores_sends() {
        let socket = Arc::new(MemorySocket::default());
        let (user, _ctx) = user_with(socket.clone());
        user.mark_disposed();

        user.send(&server::ping());
        user.send_unreliable_buffered(&server::ping());
        user.flush_unreliable_buffer();
        assert_eq!(socket.sent_count(), 0);
    }

    #[test]
    fn message_parameters_are_stringified() {
        let socket = Arc::new(MemorySocket::default());
        let (user, _ctx) = user_with(socket.clone());
        user.send_message(GameMessage::CommandTellSender, &[&"Bob", &42]);

        let sent = socket.take_sent();
        assert_eq!(
            sent[0].data,
            server::send_message(GameMessage::CommandTellSender, &["Bob", "42"]).into_bytes()
        );
    }
}
