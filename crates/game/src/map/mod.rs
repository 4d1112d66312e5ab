mod user_list;

use std::sync::Arc;

use glam::Vec2;

use crate::context::{ServerContext, Teardown};
use crate::db::ItemTemplateId;
use crate::entity::{Character, DynamicEntity, EntitySlots, ItemEntity, MapEntityIndex};
use crate::error::WorldError;
use crate::net::Channel;
use crate::packet::{PacketWriter, server};
use crate::user::User;
use crate::world::MapId;

pub use user_list::UserList;

/// Area broadcasts reach this many screens around their origin.
const AREA_SCREEN_FACTOR: f32 = 1.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapActivity {
    Active,
    IdleCounting,
    Inactive,
}

/// One map's entities and the users watching them.
///
/// Every entity added while users are present is announced with a create
/// packet before the map sends anything else about it. Users joining get
/// `SetMap`, one create per entity (their own included) and `SetUserChar`.
#[derive(Debug)]
pub struct Map {
    id: MapId,
    size: Vec2,
    ctx: Arc<ServerContext>,
    entities: EntitySlots,
    users: UserList,
    npcs: Vec<MapEntityIndex>,
    inactive_counter: i64,
    disposed: bool,
    simulated_ticks: u64,
}

impl Map {
    /// Starts inactive: nothing is simulated until the first user joins.
    pub fn new(id: MapId, size: Vec2, ctx: Arc<ServerContext>) -> Self {
        log::info!("Map {} created ({}x{})", id, size.x, size.y);
        Self {
            id,
            size,
            ctx,
            entities: EntitySlots::new(),
            users: UserList::new(),
            npcs: Vec::new(),
            inactive_counter: 0,
            disposed: false,
            simulated_ticks: 0,
        }
    }

    pub fn id(&self) -> MapId {
        self.id
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn users(&self) -> &UserList {
        &self.users
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn npcs(&self) -> &[MapEntityIndex] {
        &self.npcs
    }

    pub fn entity(&self, index: MapEntityIndex) -> Option<&DynamicEntity> {
        self.entities.get(index)
    }

    pub fn entity_mut(&mut self, index: MapEntityIndex) -> Option<&mut DynamicEntity> {
        self.entities.get_mut(index)
    }

    pub fn entities(&self) -> impl Iterator<Item = &DynamicEntity> {
        self.entities.iter()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn is_full(&self) -> bool {
        self.entities.is_full()
    }

    pub fn inactive_counter(&self) -> i64 {
        self.inactive_counter
    }

    pub fn simulated_ticks(&self) -> u64 {
        self.simulated_ticks
    }

    pub fn activity(&self) -> MapActivity {
        if !self.users.is_empty() {
            MapActivity::Active
        } else if self.inactive_counter > 0 {
            MapActivity::IdleCounting
        } else {
            MapActivity::Inactive
        }
    }

    /// Places the entity. Respawnable entities that are not ready yet go to
    /// the respawn queue instead and `Ok(None)` is returned.
    pub fn add_entity(
        &mut self,
        entity: DynamicEntity,
    ) -> Result<Option<MapEntityIndex>, WorldError> {
        if self.disposed {
            return Err(WorldError::MapDisposed(self.id));
        }

        if let Some(respawnable) = entity.as_respawnable() {
            if !respawnable.ready_to_respawn(self.ctx.now()) {
                self.ctx.defer_respawn(self.id, entity);
                return Ok(None);
            }
        }

        let index = self.entities.insert(entity).map_err(|rejected| {
            log::error!("Map {} is full; dropping {:?} entity", self.id, rejected.tag());
            WorldError::MapFull(self.id)
        })?;

        self.entity_added(index);
        Ok(Some(index))
    }

    fn entity_added(&mut self, index: MapEntityIndex) {
        let Some(entity) = self.entities.get(index) else {
            return;
        };
        let user = entity
            .as_character()
            .and_then(Character::user_handle)
            .cloned();

        if user.is_some() {
            self.inactive_counter = self.ctx.settings().empty_map_no_update_delay_ms as i64;
        }

        if !self.users.is_empty() {
            self.users.broadcast(
                &server::create_dynamic_entity(entity),
                None,
                Channel::Reliable,
            );
        }

        let Some(character) = self
            .entities
            .get_mut(index)
            .and_then(DynamicEntity::as_character_mut)
        else {
            return;
        };

        if let Some(previous) = character.map() {
            if previous != self.id {
                log::error!(
                    "Character {} added to map {} while still bound to map {}; rebinding",
                    character.name(),
                    self.id,
                    previous
                );
                debug_assert_eq!(previous, self.id, "character bound to two maps");
            }
        }
        character.set_map(Some(self.id));

        match user {
            Some(user) => {
                self.users.add(index, &user);
                user.set_location(Some((self.id, index)));
                log::debug!("User {} entered map {} as {}", user.name(), self.id, index);
                self.send_map_data(&user, index);
            }
            None => self.npcs.push(index),
        }
    }

    fn send_map_data(&self, user: &User, own_index: MapEntityIndex) {
        user.send(&server::set_map(self.id));
        for entity in self.entities.iter() {
            user.send(&server::create_dynamic_entity(entity));
        }
        user.send(&server::set_user_char(own_index));
    }

    pub fn remove_entity(&mut self, index: MapEntityIndex) -> Option<DynamicEntity> {
        let mut entity = self.entities.remove(index)?;

        if let Some(character) = entity.as_character_mut() {
            match character.user_handle().cloned() {
                Some(user) => {
                    if !self.users.remove(index) {
                        log::error!("User {} was missing from map {} user list", user.name(), self.id);
                    }
                    user.set_location(None);
                }
                None => self.npcs.retain(|&npc| npc != index),
            }
            character.set_map(None);
        }

        if !self.users.is_empty() {
            self.users.broadcast(
                &server::remove_dynamic_entity(index),
                None,
                Channel::Reliable,
            );
        }
        Some(entity)
    }

    pub fn update(&mut self, delta_ms: u32) {
        if self.disposed {
            return;
        }

        if self.users.is_empty() {
            if self.inactive_counter <= 0 {
                return;
            }
            self.inactive_counter -= delta_ms as i64;
            if self.inactive_counter <= 0 {
                log::debug!("Map {} going inactive", self.id);
            }
        }

        self.simulate(delta_ms);
        self.synchronize_dynamic_entities();
    }

    fn simulate(&mut self, delta_ms: u32) {
        let bounds = self.size;
        for entity in self.entities.iter_mut() {
            entity.update(delta_ms, bounds);
        }
        self.simulated_ticks += 1;
    }

    pub fn synchronize_dynamic_entities(&mut self) {
        let now = self.ctx.now();
        let users = &self.users;

        for entity in self.entities.iter_mut() {
            if !entity.is_synchronized() {
                let pw = server::synchronize_dynamic_entity(entity);
                entity.mark_synchronized();
                users.broadcast(&pw, None, Channel::Reliable);
            }

            if entity.need_sync_position_and_velocity(now) {
                let pw = server::update_velocity_and_position(entity, now);
                entity.mark_position_and_velocity_sent(now);
                users.broadcast(&pw, None, Channel::Unreliable);
            }
        }
    }

    pub fn send(&self, data: &PacketWriter, skip: Option<&User>, channel: Channel) {
        self.users.broadcast(data, skip.map(User::id), channel);
    }

    pub fn send_to_area(&self, origin: Vec2, data: &PacketWriter, skip: Option<&User>) {
        let reach = self.ctx.settings().screen_size * AREA_SCREEN_FACTOR;

        for (index, user) in self.users.snapshot() {
            if skip.is_some_and(|s| s.id() == user.id()) {
                continue;
            }
            let Some(entity) = self.entities.get(index) else {
                log::error!("User {} listed at {} with no entity", user.name(), index);
                continue;
            };
            let offset = (entity.position() - origin).abs();
            if offset.x < reach.x && offset.y < reach.y {
                user.send(data);
            }
        }
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            log::error!("Map {} disposed twice", self.id);
            return;
        }
        self.disposed = true;
        log::info!("Disposing map {} with {} entities", self.id, self.entities.len());

        for mut entity in self.entities.drain() {
            if let Some(character) = entity.as_character_mut() {
                if let Some(user) = character.user_handle().cloned() {
                    user.set_location(None);
                    user.request_dispose();
                }
                character.set_map(None);
            }
            self.ctx.defer_teardown(Teardown::Entity(entity));
        }
        self.users.clear();
        self.npcs.clear();
    }

    pub fn create_item(
        &mut self,
        template_id: ItemTemplateId,
        position: Vec2,
        amount: u8,
    ) -> Option<MapEntityIndex> {
        if amount == 0 {
            log::warn!("Refusing to create zero of item {} on map {}", template_id, self.id);
            return None;
        }
        let Some(template) = self.ctx.db().item_template(template_id) else {
            log::warn!("Unknown item template {} on map {}", template_id, self.id);
            return None;
        };

        let item = ItemEntity::new(
            template.id,
            template.name,
            template.graphic,
            amount,
            template.value,
        );
        match self.add_entity(DynamicEntity::item(item, position)) {
            Ok(index) => index,
            Err(e) => {
                log::warn!("Could not place item {}: {}", template_id, e);
                None
            }
        }
    }

    pub fn say(&self, speaker: MapEntityIndex, text: &str) {
        let Some(character) = self.entity(speaker).and_then(DynamicEntity::as_character) else {
            return;
        };
        self.send(
            &server::chat_say(character.name(), speaker, text),
            None,
            Channel::Reliable,
        );
    }

    pub fn attack(&mut self, attacker: MapEntityIndex, target: MapEntityIndex) -> bool {
        if attacker == target {
            return false;
        }
        let (Some(a), Some(t)) = (self.entities.get(attacker), self.entities.get(target)) else {
            return false;
        };
        let (Some(attacker_char), Some(target_char)) = (a.as_character(), t.as_character()) else {
            return false;
        };
        if attacker_char.is_user() && target_char.is_user() {
            return false;
        }
        if target_char.npc_data().is_some_and(|npc| npc.shop.is_some()) {
            return false;
        }
        if a.center().distance(t.center()) > self.ctx.settings().attack_range {
            return false;
        }

        let damage = attacker_char.stats().attack_damage();
        let attacker_pos = a.position();
        let target_pos = t.position();

        self.send_to_area(attacker_pos, &server::char_attack(attacker), None);

        let died = self
            .entities
            .get_mut(target)
            .and_then(DynamicEntity::as_character_mut)
            .is_some_and(|c| c.damage(damage));
        self.send_to_area(target_pos, &server::char_damage(target, damage), None);

        if died {
            self.kill_character(target, Some(attacker));
        }
        true
    }

    /// NPCs reward their killer and go to the respawn queue; users are
    /// healed and moved to the spawn point.
    pub fn kill_character(&mut self, target: MapEntityIndex, killer: Option<MapEntityIndex>) {
        let ctx = Arc::clone(&self.ctx);
        let settings = ctx.settings();

        let Some(victim) = self.entities.get(target).and_then(DynamicEntity::as_character) else {
            return;
        };

        if victim.is_user() {
            if let Some(entity) = self.entities.get_mut(target) {
                entity.teleport(settings.spawn_position);
                if let Some(character) = entity.as_character_mut() {
                    character.restore();
                }
            }
            return;
        }

        let (exp, cash) = victim
            .npc_data()
            .map(|npc| (npc.give_exp, npc.give_cash))
            .unwrap_or_default();

        if let Some(killer) = killer {
            let leveled = self
                .entities
                .get_mut(killer)
                .and_then(DynamicEntity::as_character_mut)
                .filter(|c| c.is_user())
                .is_some_and(|c| c.give_kill_reward(exp, cash, settings));
            if leveled {
                self.send(&server::notify_level(killer), None, Channel::Reliable);
            }
        }

        let Some(mut npc) = self.remove_entity(target) else {
            return;
        };
        let now = ctx.now();
        if let Some(character) = npc.as_character_mut() {
            character.restore();
            if let Some(data) = character.npc_data_mut() {
                data.ready_at = now + data.respawn_delay_ms;
            }
        }
        if let Some(spawn) = npc.as_respawnable().map(|r| r.respawn_position()) {
            npc.teleport(spawn);
        }
        if let Err(e) = self.add_entity(npc) {
            log::warn!("NPC from map {} lost on respawn: {}", self.id, e);
        }
    }
}
