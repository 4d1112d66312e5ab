use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::GameSettings;
use crate::db::DbController;
use crate::entity::DynamicEntity;
use crate::lock;
use crate::world::{MapId, UserId};

/// Game time in milliseconds, advanced only by the world tick.
#[derive(Debug, Default)]
pub struct GameClock {
    now_ms: AtomicU64,
}

impl GameClock {
    pub fn now(&self) -> u64 {
        self.now_ms.load(Ordering::Acquire)
    }

    pub(crate) fn advance(&self, delta_ms: u64) -> u64 {
        self.now_ms.fetch_add(delta_ms, Ordering::AcqRel) + delta_ms
    }
}

#[derive(Debug)]
pub enum Teardown {
    User(UserId),
    Entity(DynamicEntity),
}

#[derive(Debug)]
pub struct PendingRespawn {
    pub map: MapId,
    pub entity: DynamicEntity,
}

pub struct ServerContext {
    settings: GameSettings,
    db: Arc<dyn DbController>,
    clock: GameClock,
    teardown: Mutex<Vec<Teardown>>,
    respawns: Mutex<Vec<PendingRespawn>>,
}

impl ServerContext {
    pub fn new(settings: GameSettings, db: Arc<dyn DbController>) -> Self {
        Self {
            settings,
            db,
            clock: GameClock::default(),
            teardown: Mutex::new(Vec::new()),
            respawns: Mutex::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn db(&self) -> &dyn DbController {
        self.db.as_ref()
    }

    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn defer_teardown(&self, item: Teardown) {
        lock(&self.teardown).push(item);
    }

    pub fn pending_teardown(&self) -> usize {
        lock(&self.teardown).len()
    }

    pub(crate) fn take_teardown(&self) -> Vec<Teardown> {
        std::mem::take(&mut *lock(&self.teardown))
    }

    pub fn defer_respawn(&self, map: MapId, entity: DynamicEntity) {
        log::debug!("Entity deferred for respawn on map {}", map);
        lock(&self.respawns).push(PendingRespawn { map, entity });
    }

    pub fn pending_respawns(&self) -> usize {
        lock(&self.respawns).len()
    }

    pub(crate) fn take_ready_respawns(&self, now: u64) -> Vec<PendingRespawn> {
        let mut respawns = lock(&self.respawns);
        let (ready, waiting): (Vec<_>, Vec<_>) =
            respawns.drain(..).partition(|pending| {
                pending
                    .entity
                    .as_respawnable()
                    .is_none_or(|r| r.ready_to_respawn(now))
            });
        *respawns = waiting;
        ready
    }
}

impl std::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("now", &self.now())
            .field("pending_teardown", &self.pending_teardown())
            .field("pending_respawns", &self.pending_respawns())
            .finish_non_exhaustive()
    }
}
