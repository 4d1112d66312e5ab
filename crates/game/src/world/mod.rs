mod account;
mod say;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::GameSettings;
use crate::context::{ServerContext, Teardown};
use crate::db::{DbController, NpcSpawn};
use crate::entity::{
    Character, CharacterStats, Disposable, DynamicEntity, Inventory, MapEntityIndex, NpcData,
};
use crate::error::WorldError;
use crate::map::Map;
use crate::net::{Channel, Socket};
use crate::packet::{GameMessage, MAX_NAME_LENGTH, MoveDirection, PacketWriter, server};
use crate::user::User;

pub use account::AccountRegistry;
pub use say::SayCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MapId(pub u16);

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

fn valid_account_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Owns the maps and the online users, and runs the tick.
///
/// Teardown requested anywhere during a tick (dead connections, logouts, map
/// disposal) is carried out at the end of [`World::update`], after every map
/// has updated and every user's unreliable buffer has been flushed.
#[derive(Debug)]
pub struct World {
    ctx: Arc<ServerContext>,
    maps: BTreeMap<MapId, Map>,
    users: HashMap<UserId, Arc<User>>,
    accounts: AccountRegistry,
    next_user_id: u32,
}

impl World {
    pub fn new(settings: GameSettings, db: Arc<dyn DbController>) -> Self {
        let ctx = Arc::new(ServerContext::new(settings, db));
        let mut world = Self {
            ctx,
            maps: BTreeMap::new(),
            users: HashMap::new(),
            accounts: AccountRegistry::new(),
            next_user_id: 1,
        };

        for record in world.ctx.db().maps() {
            if let Err(e) = world.create_map(record.id, record.size) {
                log::error!("Skipping map record: {}", e);
            }
        }
        world
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    pub fn settings(&self) -> &GameSettings {
        self.ctx.settings()
    }

    pub fn now(&self) -> u64 {
        self.ctx.now()
    }

    pub fn create_map(&mut self, id: MapId, size: Vec2) -> Result<&mut Map, WorldError> {
        if self.maps.contains_key(&id) {
            return Err(WorldError::DuplicateMap(id));
        }

        let mut map = Map::new(id, size, Arc::clone(&self.ctx));
        for spawn in self.ctx.db().npc_spawns(id) {
            self.spawn_npc(&mut map, &spawn);
        }
        Ok(self.maps.entry(id).or_insert(map))
    }

    fn spawn_npc(&self, map: &mut Map, spawn: &NpcSpawn) {
        let Some(template) = self.ctx.db().npc_template(spawn.template) else {
            log::warn!("Map {} spawns unknown NPC template {}", map.id(), spawn.template);
            return;
        };

        let npc = NpcData {
            template_id: template.id,
            give_exp: template.give_exp,
            give_cash: template.give_cash,
            shop: template.shop,
            respawn_delay_ms: template.respawn_delay_ms,
            ready_at: 0,
            spawn_position: spawn.position,
        };
        let stats = CharacterStats::new(template.level, template.max_hp, 0);
        let character = Character::npc(template.name, npc, stats, Inventory::new(0, 1));
        let entity = DynamicEntity::character(
            character,
            spawn.position,
            self.ctx.settings().character_size,
        );
        if let Err(e) = map.add_entity(entity) {
            log::warn!("NPC spawn failed: {}", e);
        }
    }

    pub fn map(&self, id: MapId) -> Option<&Map> {
        self.maps.get(&id)
    }

    pub fn map_mut(&mut self, id: MapId) -> Option<&mut Map> {
        self.maps.get_mut(&id)
    }

    pub fn maps(&self) -> impl Iterator<Item = &Map> {
        self.maps.values()
    }

    pub fn user(&self, id: UserId) -> Option<&Arc<User>> {
        self.users.get(&id)
    }

    pub fn users(&self) -> impl Iterator<Item = &Arc<User>> {
        self.users.values()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn find_user(&self, name: &str) -> Option<&Arc<User>> {
        self.accounts
            .user_of(name)
            .and_then(|id| self.users.get(&id))
    }

    pub fn login(&mut self, name: &str, conn: Arc<dyn Socket>) -> Result<UserId, WorldError> {
        let name = name.trim();
        if !valid_account_name(name) {
            reject_login(conn.as_ref(), GameMessage::InvalidAccount);
            return Err(WorldError::InvalidAccount(name.to_string()));
        }
        if self.accounts.is_online(name) {
            reject_login(conn.as_ref(), GameMessage::AccountInUse);
            return Err(WorldError::AccountInUse(name.to_string()));
        }

        let settings = self.ctx.settings().clone();
        let record = self.ctx.db().character(name);

        let usable = |id: MapId| self.maps.get(&id).is_some_and(|m| !m.is_disposed());
        let (map_id, position) = match &record {
            Some(r) if usable(r.map) => (r.map, r.position),
            _ => (settings.start_map, settings.spawn_position),
        };
        if !usable(map_id) {
            log::error!("Start map {} is unavailable; refusing {}", map_id, name);
            conn.close();
            return Err(WorldError::UnknownMap(map_id));
        }

        let id = UserId(self.next_user_id);
        self.next_user_id += 1;

        let display_name = record.as_ref().map_or(name, |r| r.name.as_str());
        let user = User::new(id, display_name, conn, Arc::clone(&self.ctx));
        user.send(&server::login_successful());

        let mut stats = CharacterStats::new(1, settings.start_hp, settings.start_mp);
        if let Some(r) = &record {
            stats.level = r.level;
            stats.exp = r.exp;
            stats.cash = r.cash;
            stats.stat_points = r.stat_points;
            stats.hp = r.hp.min(stats.max_hp).max(1);
            stats.mp = r.mp.min(stats.max_mp).max(0);
        }
        let inventory = Inventory::new(settings.inventory_size, settings.max_stack);
        let character = Character::user(Arc::clone(&user), stats, inventory);
        let entity = DynamicEntity::character(character, position, settings.character_size);

        let placed = self
            .maps
            .get_mut(&map_id)
            .ok_or(WorldError::UnknownMap(map_id))
            .and_then(|map| map.add_entity(entity));
        if let Err(e) = placed {
            log::error!("Could not place {} on map {}: {}", name, map_id, e);
            user.mark_disposed();
            user.connection().close();
            return Err(e);
        }

        self.accounts.open(name, id)?;
        self.users.insert(id, user);
        log::info!("{} logged in as {} on map {}", name, id, map_id);
        Ok(id)
    }

    pub fn logout(&self, id: UserId) -> Result<(), WorldError> {
        let user = self.users.get(&id).ok_or(WorldError::UnknownUser(id))?;
        user.request_dispose();
        Ok(())
    }

    fn locate(&self, id: UserId) -> Result<(Arc<User>, MapId, MapEntityIndex), WorldError> {
        let user = self.users.get(&id).ok_or(WorldError::UnknownUser(id))?;
        let (map, index) = user.location().ok_or(WorldError::UnknownUser(id))?;
        Ok((Arc::clone(user), map, index))
    }

    fn live_map(&mut self, id: MapId) -> Result<&mut Map, WorldError> {
        match self.maps.get_mut(&id) {
            Some(map) if !map.is_disposed() => Ok(map),
            Some(_) => Err(WorldError::MapDisposed(id)),
            None => Err(WorldError::UnknownMap(id)),
        }
    }

    pub fn move_user(&mut self, id: UserId, direction: MoveDirection) -> Result<(), WorldError> {
        let (_, map_id, index) = self.locate(id)?;
        let speed = self.ctx.settings().walk_speed;
        let entity = self
            .live_map(map_id)?
            .entity_mut(index)
            .ok_or(WorldError::UnknownEntity { map: map_id, index })?;
        entity.set_velocity(direction.vector() * speed);
        Ok(())
    }

    pub fn attack(&mut self, id: UserId, target: MapEntityIndex) -> Result<bool, WorldError> {
        let (_, map_id, index) = self.locate(id)?;
        Ok(self.live_map(map_id)?.attack(index, target))
    }

    pub fn start_shopping(
        &mut self,
        id: UserId,
        shopkeeper: MapEntityIndex,
    ) -> Result<bool, WorldError> {
        let (user, map_id, _) = self.locate(id)?;
        let map = self.live_map(map_id)?;
        Ok(user.try_start_shopping(map, shopkeeper))
    }

    pub fn buy_from_shop(&mut self, id: UserId, slot: u8, amount: u8) -> Result<bool, WorldError> {
        let (user, map_id, _) = self.locate(id)?;
        let map = self.live_map(map_id)?;
        Ok(user.try_purchase(map, slot, amount))
    }

    pub fn use_item(&mut self, id: UserId, slot: u8) -> Result<bool, WorldError> {
        let (user, map_id, index) = self.locate(id)?;
        let ctx = Arc::clone(&self.ctx);
        let character = self
            .live_map(map_id)?
            .entity_mut(index)
            .and_then(DynamicEntity::as_character_mut)
            .ok_or(WorldError::UnknownEntity { map: map_id, index })?;

        let Some(template_id) = character.inventory().get(slot as usize).map(|i| i.template_id)
        else {
            log::debug!("{} used empty inventory slot {}", user.name(), slot);
            return Ok(false);
        };
        let Some(template) = ctx.db().item_template(template_id) else {
            log::warn!("{} holds unknown item template {}", user.name(), template_id);
            return Ok(false);
        };
        Ok(character.use_item(slot as usize, &template))
    }

    /// Moves the user's character to `target` at `position`. A target that
    /// cannot take the character leaves it where it was.
    pub fn change_map(
        &mut self,
        id: UserId,
        target: MapId,
        position: Vec2,
    ) -> Result<MapEntityIndex, WorldError> {
        let (user, from, index) = self.locate(id)?;
        if target != from && self.live_map(target)?.is_full() {
            return Err(WorldError::MapFull(target));
        }

        let mut entity = self
            .live_map(from)?
            .remove_entity(index)
            .ok_or(WorldError::UnknownEntity { map: from, index })?;
        if user.shopping().clear().is_some() {
            user.send(&server::stop_shopping());
        }
        entity.teleport(position);

        let placed = match self.live_map(target) {
            Ok(map) => map.add_entity(entity),
            Err(e) => Err(e),
        };
        match placed {
            Ok(Some(index)) => Ok(index),
            Ok(None) => {
                log::error!("{} was queued for respawn on map {}; disposing", user.name(), target);
                user.request_dispose();
                Err(WorldError::UnknownUser(id))
            }
            Err(e) => {
                log::error!("Could not move {} to map {}: {}; disposing", user.name(), target, e);
                user.request_dispose();
                Err(e)
            }
        }
    }

    pub fn say(&mut self, id: UserId, text: &str) -> Result<(), WorldError> {
        let (user, map_id, index) = self.locate(id)?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        match SayCommand::parse(text) {
            SayCommand::Plain(text) => self.live_map(map_id)?.say(index, text),
            SayCommand::Shout(message) => {
                self.send_to_all(&server::send_message(
                    GameMessage::CommandShout,
                    &[user.name(), message],
                ));
            }
            SayCommand::Tell { name, message } => self.tell(&user, name, message),
            SayCommand::Unknown(command) => {
                user.send_message(GameMessage::CommandUnknown, &[&command]);
            }
        }
        Ok(())
    }

    fn tell(&self, sender: &User, name: &str, message: &str) {
        if name.is_empty() {
            sender.send_message(GameMessage::CommandTellNoName, &[]);
            return;
        }
        if message.is_empty() {
            sender.send_message(GameMessage::CommandTellNoMessage, &[]);
            return;
        }
        let Some(receiver) = self.find_user(name) else {
            sender.send_message(GameMessage::CommandTellInvalidUser, &[&name]);
            return;
        };

        sender.send_message(GameMessage::CommandTellSender, &[&receiver.name(), &message]);
        receiver.send_message(GameMessage::CommandTellReceiver, &[&sender.name(), &message]);
    }

    pub fn send_to_all(&self, data: &PacketWriter) {
        for user in self.users.values() {
            user.send_with(data, Channel::Reliable);
        }
    }

    /// One tick: advance the clock, return ready respawns to their maps,
    /// update every map, flush unreliable buffers, then run teardown.
    pub fn update(&mut self, delta_ms: u32) {
        let now = self.ctx.clock().advance(delta_ms as u64);

        for pending in self.ctx.take_ready_respawns(now) {
            match self.live_map(pending.map) {
                Ok(map) => {
                    if let Err(e) = map.add_entity(pending.entity) {
                        log::warn!("Respawn failed: {}", e);
                    }
                }
                Err(e) => log::warn!("Dropping respawn: {}", e),
            }
        }

        for map in self.maps.values_mut() {
            map.update(delta_ms);
        }

        for user in self.users.values() {
            user.flush_unreliable_buffer();
        }

        self.process_teardown();
    }

    /// Runs queued teardown until the queue stays empty. Removing a user can
    /// surface more dead connections, so this loops.
    pub fn process_teardown(&mut self) {
        loop {
            let items = self.ctx.take_teardown();
            if items.is_empty() {
                break;
            }
            for item in items {
                match item {
                    Teardown::User(id) => self.teardown_user(id),
                    Teardown::Entity(mut entity) => entity.dispose(),
                }
            }
        }
    }

    fn teardown_user(&mut self, id: UserId) {
        let Some(user) = self.users.remove(&id) else {
            log::debug!("User {} already torn down", id);
            return;
        };

        if let Some((map_id, index)) = user.location() {
            match self.maps.get_mut(&map_id).and_then(|map| map.remove_entity(index)) {
                Some(mut entity) => entity.dispose(),
                None => log::error!("User {} had no entity at {} on map {}", user.name(), index, map_id),
            }
        }

        user.shopping().clear();
        self.accounts.close(user.name(), id);
        user.mark_disposed();
        user.connection().close();
        log::info!("{} ({}) logged out", user.name(), id);
    }

    pub fn dispose_map(&mut self, id: MapId) -> Result<(), WorldError> {
        let mut map = self.maps.remove(&id).ok_or(WorldError::UnknownMap(id))?;
        map.dispose();
        Ok(())
    }

    pub fn shutdown(&mut self) {
        log::info!("World shutting down with {} users", self.users.len());
        for user in self.users.values() {
            user.request_dispose();
        }
        self.process_teardown();
        for map in self.maps.values_mut() {
            map.dispose();
        }
        self.process_teardown();
        self.maps.clear();
    }
}

fn reject_login(conn: &dyn Socket, reason: GameMessage) {
    let data = server::login_unsuccessful(reason);
    if let Err(e) = conn.send(data.as_bytes(), Channel::Reliable) {
        log::warn!("Could not deliver login rejection: {}", e);
    }
}
