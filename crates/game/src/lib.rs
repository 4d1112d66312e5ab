pub mod config;
pub mod context;
pub mod db;
pub mod entity;
pub mod error;
pub mod map;
pub mod net;
pub mod packet;
pub mod user;
pub mod world;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use config::GameSettings;
pub use context::{GameClock, PendingRespawn, ServerContext, Teardown};
pub use db::{
    CharacterRecord, DbController, ItemEffect, ItemTemplate, MapRecord, MemoryDb, NpcSpawn,
    NpcTemplate, Shop,
};
pub use entity::{
    Character, CharacterKind, CharacterStats, Disposable, DynamicEntity, EntityKind, EntityTag,
    Inventory, InventoryItem, ItemEntity, MapEntityIndex, NpcData, Respawnable,
};
pub use error::{PacketError, TransportError, WorldError};
pub use map::{Map, MapActivity, UserList};
pub use net::{
    Channel, ClientConnection, ConnectionManager, ConnectionState, DEFAULT_PORT,
    DEFAULT_TICK_RATE, Frame, FrameFlags, MemorySocket, NetworkEndpoint, NetworkStats,
    PeerChannel, SentPacket, Socket, UdpPeerSocket,
};
pub use packet::{
    ClientPacket, ClientPacketId, GameMessage, MoveDirection, PacketReader, PacketWriter,
    MAX_SHOP_ITEMS, ServerPacketId,
};
pub use user::{ShopSession, User, UserShoppingState};
pub use world::{AccountRegistry, MapId, SayCommand, UserId, World};

/// Locks `m`, recovering the guard if a panicking holder poisoned it.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
