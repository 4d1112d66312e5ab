use std::sync::{Arc, Mutex, Weak};

use crate::entity::MapEntityIndex;
use crate::lock;
use crate::net::Channel;
use crate::packet::PacketWriter;
use crate::user::User;
use crate::world::UserId;

#[derive(Debug, Clone)]
struct UserEntry {
    index: MapEntityIndex,
    user: Weak<User>,
}

/// Users on one map. Login and logout may touch this from the network side
/// while the tick iterates it, so iteration always walks a snapshot.
#[derive(Debug, Default)]
pub struct UserList {
    entries: Mutex<Vec<UserEntry>>,
}

impl UserList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, index: MapEntityIndex, user: &Arc<User>) {
        lock(&self.entries).push(UserEntry {
            index,
            user: Arc::downgrade(user),
        });
    }

    pub fn remove(&self, index: MapEntityIndex) -> bool {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|entry| entry.index != index);
        entries.len() != before
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    pub fn contains(&self, index: MapEntityIndex) -> bool {
        lock(&self.entries).iter().any(|entry| entry.index == index)
    }

    /// Live users with their entity index. Entries whose user is gone are
    /// logged and left out.
    pub fn snapshot(&self) -> Vec<(MapEntityIndex, Arc<User>)> {
        let entries = lock(&self.entries).clone();
        entries
            .into_iter()
            .filter_map(|entry| match entry.user.upgrade() {
                Some(user) => Some((entry.index, user)),
                None => {
                    log::error!("Null user in map user list at {}", entry.index);
                    None
                }
            })
            .collect()
    }

    pub fn broadcast(&self, data: &PacketWriter, skip: Option<UserId>, channel: Channel) {
        for (_, user) in self.snapshot() {
            if skip == Some(user.id()) {
                continue;
            }
            match channel {
                Channel::Reliable => user.send(data),
                Channel::Unreliable => user.send_unreliable_buffered(data),
            }
        }
    }
}
