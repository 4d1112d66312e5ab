use glam::Vec2;

use crate::db::ItemTemplateId;
use crate::packet::{MAX_NAME_LENGTH, PacketWriter};

use super::capability::{Disposable, Respawnable};
use super::character::{Character, CharacterKind};
use super::index::MapEntityIndex;

/// While moving without a velocity change, position is re-sent at this period
/// so clients correct accumulated drift.
pub const POSITION_RESYNC_INTERVAL_MS: u64 = 2000;

/// Velocity is sent in px/ms as fixed point with this many steps per unit.
const VELOCITY_SCALE: f32 = 1000.0;
const MAX_VELOCITY: f32 = i16::MAX as f32 / VELOCITY_SCALE;

pub fn encode_velocity(velocity: Vec2) -> [i16; 2] {
    [
        (velocity.x.clamp(-MAX_VELOCITY, MAX_VELOCITY) * VELOCITY_SCALE).round() as i16,
        (velocity.y.clamp(-MAX_VELOCITY, MAX_VELOCITY) * VELOCITY_SCALE).round() as i16,
    ]
}

pub fn decode_velocity(encoded: [i16; 2]) -> Vec2 {
    Vec2::new(
        encoded[0] as f32 / VELOCITY_SCALE,
        encoded[1] as f32 / VELOCITY_SCALE,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntityTag {
    Character = 0,
    Item = 1,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemEntity {
    pub template_id: ItemTemplateId,
    pub name: String,
    pub graphic: u16,
    pub amount: u8,
    pub value: u32,
}

impl ItemEntity {
    pub fn new(
        template_id: ItemTemplateId,
        name: impl Into<String>,
        graphic: u16,
        amount: u8,
        value: u32,
    ) -> Self {
        Self {
            template_id,
            name: name.into(),
            graphic,
            amount,
            value,
        }
    }
}

#[derive(Debug)]
pub enum EntityKind {
    Character(Character),
    Item(ItemEntity),
}

/// The state clients render besides position and velocity. A change here
/// means the entity needs a full synchronize.
#[derive(Debug, Clone, PartialEq)]
enum PublicState {
    Character {
        name: String,
        level: u8,
        hp_percent: u8,
        size: Vec2,
    },
    Item {
        name: String,
        graphic: u16,
        amount: u8,
    },
}

#[derive(Debug, Default)]
struct SyncState {
    synchronized: Option<PublicState>,
    last_sent_position: Vec2,
    last_sent_velocity: Vec2,
    last_sync_time: Option<u64>,
}

#[derive(Debug)]
pub struct DynamicEntity {
    index: MapEntityIndex,
    position: Vec2,
    velocity: Vec2,
    size: Vec2,
    kind: EntityKind,
    sync: SyncState,
    disposed: bool,
}

impl DynamicEntity {
    pub fn new(kind: EntityKind, position: Vec2, size: Vec2) -> Self {
        Self {
            index: MapEntityIndex::default(),
            position,
            velocity: Vec2::ZERO,
            size,
            kind,
            sync: SyncState::default(),
            disposed: false,
        }
    }

    pub fn character(character: Character, position: Vec2, size: Vec2) -> Self {
        Self::new(EntityKind::Character(character), position, size)
    }

    pub fn item(item: ItemEntity, position: Vec2) -> Self {
        Self::new(EntityKind::Item(item), position, Vec2::new(16.0, 16.0))
    }

    pub fn index(&self) -> MapEntityIndex {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: MapEntityIndex) {
        self.index = index;
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn center(&self) -> Vec2 {
        self.position + self.size / 2.0
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    pub fn tag(&self) -> EntityTag {
        match self.kind {
            EntityKind::Character(_) => EntityTag::Character,
            EntityKind::Item(_) => EntityTag::Item,
        }
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    pub fn teleport(&mut self, position: Vec2) {
        self.position = position;
        self.velocity = Vec2::ZERO;
    }

    pub fn as_character(&self) -> Option<&Character> {
        match &self.kind {
            EntityKind::Character(c) => Some(c),
            EntityKind::Item(_) => None,
        }
    }

    pub fn as_character_mut(&mut self) -> Option<&mut Character> {
        match &mut self.kind {
            EntityKind::Character(c) => Some(c),
            EntityKind::Item(_) => None,
        }
    }

    pub fn as_item(&self) -> Option<&ItemEntity> {
        match &self.kind {
            EntityKind::Item(item) => Some(item),
            EntityKind::Character(_) => None,
        }
    }

    pub fn as_item_mut(&mut self) -> Option<&mut ItemEntity> {
        match &mut self.kind {
            EntityKind::Item(item) => Some(item),
            EntityKind::Character(_) => None,
        }
    }

    pub fn as_respawnable(&self) -> Option<&dyn Respawnable> {
        match &self.kind {
            EntityKind::Character(c) => match c.kind() {
                CharacterKind::Npc(npc) => Some(npc),
                CharacterKind::User(_) => None,
            },
            EntityKind::Item(_) => None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.as_character().is_some_and(Character::is_user)
    }

    fn public_state(&self) -> PublicState {
        match &self.kind {
            EntityKind::Character(c) => PublicState::Character {
                name: c.name().to_string(),
                level: c.stats().level,
                hp_percent: c.stats().hp_percent(),
                size: self.size,
            },
            EntityKind::Item(item) => PublicState::Item {
                name: item.name.clone(),
                graphic: item.graphic,
                amount: item.amount,
            },
        }
    }

    pub fn is_synchronized(&self) -> bool {
        self.sync
            .synchronized
            .as_ref()
            .is_some_and(|sent| *sent == self.public_state())
    }

    pub fn mark_synchronized(&mut self) {
        self.sync.synchronized = Some(self.public_state());
    }

    pub fn need_sync_position_and_velocity(&self, current_time: u64) -> bool {
        let Some(last_time) = self.sync.last_sync_time else {
            return true;
        };

        if self.velocity != self.sync.last_sent_velocity {
            return true;
        }

        self.position != self.sync.last_sent_position
            && current_time.saturating_sub(last_time) >= POSITION_RESYNC_INTERVAL_MS
    }

    pub fn mark_position_and_velocity_sent(&mut self, current_time: u64) {
        self.sync.last_sent_position = self.position;
        self.sync.last_sent_velocity = self.velocity;
        self.sync.last_sync_time = Some(current_time);
    }

    pub fn update(&mut self, delta_ms: u32, bounds: Vec2) {
        if self.velocity == Vec2::ZERO {
            return;
        }

        let max = (bounds - self.size).max(Vec2::ZERO);
        let target = self.position + self.velocity * delta_ms as f32;
        let clamped = target.clamp(Vec2::ZERO, max);

        if clamped.x != target.x {
            self.velocity.x = 0.0;
        }
        if clamped.y != target.y {
            self.velocity.y = 0.0;
        }
        self.position = clamped;
    }

    pub fn write_full(&self, pw: &mut PacketWriter) {
        pw.write_u8(self.tag() as u8);
        pw.write_vec2(self.position);
        pw.write_vec2(self.size);
        let [vx, vy] = encode_velocity(self.velocity);
        pw.write_i16(vx);
        pw.write_i16(vy);

        match &self.kind {
            EntityKind::Character(c) => {
                pw.write_string(c.name(), MAX_NAME_LENGTH);
                pw.write_u8(c.stats().level);
                pw.write_u8(c.stats().hp_percent());
                pw.write_bool(c.is_user());
            }
            EntityKind::Item(item) => {
                pw.write_u32(item.template_id);
                pw.write_string(&item.name, MAX_NAME_LENGTH);
                pw.write_u16(item.graphic);
                pw.write_u8(item.amount);
            }
        }
    }

    pub fn write_position_and_velocity(&self, pw: &mut PacketWriter, current_time: u64) {
        pw.write_u32(current_time as u32);
        pw.write_vec2(self.position);
        let [vx, vy] = encode_velocity(self.velocity);
        pw.write_i16(vx);
        pw.write_i16(vy);
    }
}

impl Disposable for DynamicEntity {
    fn dispose(&mut self) {
        if self.disposed {
            log::error!("Entity {} disposed twice", self.index);
            return;
        }
        self.disposed = true;
        log::debug!("Disposed entity {} ({:?})", self.index, self.tag());
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apple() -> DynamicEntity {
        DynamicEntity::item(ItemEntity::new(7, "Apple", 2, 3, 10), Vec2::new(10.0, 20.0))
    }

    #[test]
    fn velocity_encoding() {
        let encoded = encode_velocity(Vec2::new(0.18, -0.5));
        let decoded = decode_velocity(encoded);
        assert!((decoded.x - 0.18).abs() < 0.001);
        assert!((decoded.y + 0.5).abs() < 0.001);

        let clamped = decode_velocity(encode_velocity(Vec2::new(1000.0, 0.0)));
        assert!((clamped.x - MAX_VELOCITY).abs() < 0.001);
    }

    #[test]
    fn new_entity_is_unsynchronized() {
        let mut entity = apple();
        assert!(!entity.is_synchronized());
        entity.mark_synchronized();
        assert!(entity.is_synchronized());
    }

    #[test]
    fn public_change_clears_synchronized() {
        let mut entity = apple();
        entity.mark_synchronized();
        entity.as_item_mut().unwrap().amount = 2;
        assert!(!entity.is_synchronized());
    }

    #[test]
    fn movement_does_not_clear_synchronized() {
        let mut entity = apple();
        entity.mark_synchronized();
        entity.set_velocity(Vec2::new(0.1, 0.0));
        entity.update(100, Vec2::new(1000.0, 1000.0));
        assert!(entity.is_synchronized());
    }

    #[test]
    fn position_sync_predicate() {
        let mut entity = apple();
        assert!(entity.need_sync_position_and_velocity(0));

        entity.mark_position_and_velocity_sent(0);
        assert!(!entity.need_sync_position_and_velocity(10));

        entity.set_velocity(Vec2::new(0.1, 0.0));
        assert!(entity.need_sync_position_and_velocity(10));
        entity.mark_position_and_velocity_sent(10);

        entity.update(100, Vec2::new(1000.0, 1000.0));
        assert!(!entity.need_sync_position_and_velocity(110));
        assert!(entity.need_sync_position_and_velocity(10 + POSITION_RESYNC_INTERVAL_MS));
    }

    #[test]
    fn update_clamps_to_bounds() {
        let mut entity = apple();
        entity.set_velocity(Vec2::new(-1.0, 1.0));
        entity.update(1000, Vec2::new(100.0, 100.0));

        assert_eq!(entity.position(), Vec2::new(0.0, 84.0));
        assert_eq!(entity.velocity(), Vec2::ZERO);
    }

    #[test]
    fn dispose_once() {
        let mut entity = apple();
        entity.dispose();
        assert!(entity.is_disposed());
        entity.dispose();
        assert!(entity.is_disposed());
    }
}
