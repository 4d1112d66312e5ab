use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::GameSettings;
use crate::db::{ItemTemplate, NpcTemplateId, ShopId};
use crate::packet::{GameMessage, server};
use crate::user::User;
use crate::world::MapId;

use super::capability::Respawnable;
use super::inventory::{Inventory, InventoryItem};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterStats {
    pub level: u8,
    pub exp: u32,
    pub cash: u32,
    pub stat_points: u32,
    pub hp: i32,
    pub mp: i32,
    pub max_hp: i32,
    pub max_mp: i32,
}

impl CharacterStats {
    pub fn new(level: u8, max_hp: i32, max_mp: i32) -> Self {
        Self {
            level,
            exp: 0,
            cash: 0,
            stat_points: 0,
            hp: max_hp,
            mp: max_mp,
            max_hp,
            max_mp,
        }
    }

    pub fn hp_percent(&self) -> u8 {
        if self.max_hp <= 0 {
            return 0;
        }
        ((self.hp.max(0) as i64 * 100) / self.max_hp as i64).min(100) as u8
    }

    pub fn attack_damage(&self) -> i32 {
        2 + self.level as i32
    }
}

#[derive(Debug, Clone)]
pub struct NpcData {
    pub template_id: NpcTemplateId,
    pub give_exp: u32,
    pub give_cash: u32,
    pub shop: Option<ShopId>,
    pub respawn_delay_ms: u64,
    pub ready_at: u64,
    pub spawn_position: Vec2,
}

impl Respawnable for NpcData {
    fn ready_to_respawn(&self, now: u64) -> bool {
        now >= self.ready_at
    }

    fn respawn_position(&self) -> Vec2 {
        self.spawn_position
    }
}

#[derive(Debug)]
pub enum CharacterKind {
    User(Arc<User>),
    Npc(NpcData),
}

/// A user or NPC. Stat mutators on a user's character send the matching
/// packet to that user as part of the change.
#[derive(Debug)]
pub struct Character {
    name: String,
    map: Option<MapId>,
    kind: CharacterKind,
    stats: CharacterStats,
    inventory: Inventory,
}

impl Character {
    pub fn user(user: Arc<User>, stats: CharacterStats, inventory: Inventory) -> Self {
        user.send(&server::set_level(stats.level));
        user.send(&server::set_cash(stats.cash));
        user.send(&server::set_exp(stats.exp));
        user.send(&server::set_stat_points(stats.stat_points));
        user.send(&server::set_hp(stats.hp, stats.max_hp));
        user.send(&server::set_mp(stats.mp, stats.max_mp));

        Self {
            name: user.name().to_string(),
            map: None,
            kind: CharacterKind::User(user),
            stats,
            inventory,
        }
    }

    pub fn npc(name: impl Into<String>, npc: NpcData, stats: CharacterStats, inventory: Inventory) -> Self {
        Self {
            name: name.into(),
            map: None,
            kind: CharacterKind::Npc(npc),
            stats,
            inventory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn map(&self) -> Option<MapId> {
        self.map
    }

    pub(crate) fn set_map(&mut self, map: Option<MapId>) {
        self.map = map;
    }

    pub fn kind(&self) -> &CharacterKind {
        &self.kind
    }

    pub fn is_user(&self) -> bool {
        matches!(self.kind, CharacterKind::User(_))
    }

    pub fn user_handle(&self) -> Option<&Arc<User>> {
        match &self.kind {
            CharacterKind::User(user) => Some(user),
            CharacterKind::Npc(_) => None,
        }
    }

    pub fn npc_data(&self) -> Option<&NpcData> {
        match &self.kind {
            CharacterKind::Npc(npc) => Some(npc),
            CharacterKind::User(_) => None,
        }
    }

    pub fn npc_data_mut(&mut self) -> Option<&mut NpcData> {
        match &mut self.kind {
            CharacterKind::Npc(npc) => Some(npc),
            CharacterKind::User(_) => None,
        }
    }

    pub fn stats(&self) -> &CharacterStats {
        &self.stats
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    fn notify(&self, build: impl FnOnce() -> crate::packet::PacketWriter) {
        if let Some(user) = self.user_handle() {
            user.send(&build());
        }
    }

    pub fn set_cash(&mut self, cash: u32) {
        self.stats.cash = cash;
        self.notify(|| server::set_cash(cash));
    }

    pub fn set_exp(&mut self, exp: u32) {
        self.stats.exp = exp;
        self.notify(|| server::set_exp(exp));
    }

    pub fn set_level(&mut self, level: u8) {
        self.stats.level = level;
        self.notify(|| server::set_level(level));
    }

    pub fn set_stat_points(&mut self, points: u32) {
        self.stats.stat_points = points;
        self.notify(|| server::set_stat_points(points));
    }

    pub fn set_hp(&mut self, hp: i32) {
        self.stats.hp = hp;
        let max = self.stats.max_hp;
        self.notify(|| server::set_hp(hp, max));
    }

    pub fn set_mp(&mut self, mp: i32) {
        self.stats.mp = mp;
        let max = self.stats.max_mp;
        self.notify(|| server::set_mp(mp, max));
    }

    pub fn add_exp(&mut self, amount: u32, settings: &GameSettings) -> bool {
        let mut exp = self.stats.exp.saturating_add(amount);
        let mut level = self.stats.level;
        let mut points = self.stats.stat_points;

        while level < settings.max_level && exp >= settings.exp_for_level(level) {
            exp -= settings.exp_for_level(level);
            level += 1;
            points = points.saturating_add(settings.stat_points_per_level);
        }

        let leveled = level != self.stats.level;
        if leveled {
            log::debug!("{} reached level {}", self.name, level);
            self.set_level(level);
            self.set_stat_points(points);
        }
        self.set_exp(exp);
        leveled
    }

    pub fn give_kill_reward(&mut self, exp: u32, cash: u32, settings: &GameSettings) -> bool {
        self.notify(|| server::notify_exp_cash(exp, cash));
        self.set_cash(self.stats.cash.saturating_add(cash));
        self.add_exp(exp, settings)
    }

    pub fn damage(&mut self, amount: i32) -> bool {
        let hp = self.stats.hp.saturating_sub(amount.max(0));
        self.set_hp(hp);
        hp <= 0
    }

    pub fn restore(&mut self) {
        self.set_hp(self.stats.max_hp);
        self.set_mp(self.stats.max_mp);
    }

    /// Uses the item in `slot`, whose template is `template`. Items without
    /// an effect stay put; use-once items apply their effect, capped at the
    /// maximums, and lose one unit.
    pub fn use_item(&mut self, slot: usize, template: &ItemTemplate) -> bool {
        let Some(item) = self.inventory.get(slot) else {
            log::warn!("{} tried to use empty inventory slot {}", self.name, slot);
            return false;
        };
        if item.template_id != template.id {
            log::error!(
                "{} slot {} holds template {}, not {}",
                self.name,
                slot,
                item.template_id,
                template.id
            );
            return false;
        }
        let Some(effect) = template.effect else {
            return false;
        };

        if effect.hp != 0 {
            let hp = self.stats.hp.saturating_add(effect.hp).min(self.stats.max_hp);
            self.set_hp(hp);
        }
        if effect.mp != 0 {
            let mp = self.stats.mp.saturating_add(effect.mp).min(self.stats.max_mp);
            self.set_mp(mp);
        }

        self.inventory.decrease_amount(slot);
        self.notify(|| server::set_inventory_slot(slot as u8, self.inventory.get(slot)));
        true
    }

    pub fn give_item(&mut self, item: InventoryItem) -> u8 {
        let requested = item.amount;
        let name = item.name.clone();
        let result = self.inventory.add(item);

        if let Some(user) = self.user_handle() {
            for &slot in &result.changed_slots {
                user.send(&server::set_inventory_slot(
                    slot as u8,
                    self.inventory.get(slot),
                ));
            }
            let added = result.added(requested);
            if added > 0 {
                user.send(&server::notify_get_item(&name, added));
            }
        }
        result.remainder
    }

    pub fn try_buy_item(&mut self, template: &ItemTemplate, amount: u8) -> bool {
        let Some(user) = self.user_handle().cloned() else {
            log::error!("NPC {} attempted a purchase", self.name);
            return false;
        };
        if amount == 0 {
            return false;
        }

        let total_cost = template.value as u64 * amount as u64;
        if (self.stats.cash as u64) < total_cost {
            if amount == 1 {
                user.send_message(
                    GameMessage::ShopInsufficientFundsToPurchaseSingular,
                    &[&template.name],
                );
            } else {
                user.send_message(
                    GameMessage::ShopInsufficientFundsToPurchasePlural,
                    &[&amount, &template.name],
                );
            }
            return false;
        }

        if !self.inventory.can_add(template.id) {
            user.send_message(GameMessage::ShopInventoryFull, &[&template.name]);
            return false;
        }

        let remainder = self.give_item(InventoryItem::from_template(template, amount));

        let mut purchased = amount as i32 - remainder as i32;
        if purchased < 0 {
            log::error!(
                "{} bought a negative amount ({}) of {}; charging nothing",
                self.name,
                purchased,
                template.name
            );
            purchased = 0;
        }

        let charge = template.value as u64 * purchased as u64;
        self.set_cash(self.stats.cash.saturating_sub(charge.min(u32::MAX as u64) as u32));

        if purchased == 1 {
            user.send_message(GameMessage::ShopPurchaseSingular, &[&template.name, &charge]);
        } else {
            user.send_message(
                GameMessage::ShopPurchasePlural,
                &[&purchased, &template.name, &charge],
            );
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ServerContext;
    use crate::db::{ItemEffect, MemoryDb};
    use crate::net::{MemorySocket, SentPacket};
    use crate::packet::{PacketReader, ServerPacketId};
    use crate::world::UserId;

    fn user_character(cash: u32) -> (Character, Arc<MemorySocket>) {
        let ctx = Arc::new(ServerContext::new(
            GameSettings::default(),
            Arc::new(MemoryDb::new()),
        ));
        let socket = Arc::new(MemorySocket::default());
        let user = User::new(UserId(1), "Tester", socket.clone(), ctx);
        let mut stats = CharacterStats::new(1, 50, 50);
        stats.cash = cash;
        let character = Character::user(user, stats, Inventory::new(2, 10));
        socket.take_sent();
        (character, socket)
    }

    fn opcodes(sent: &[SentPacket]) -> Vec<ServerPacketId> {
        sent.iter()
            .map(|p| ServerPacketId::try_from(p.data[0]).unwrap())
            .collect()
    }

    fn potion() -> ItemTemplate {
        ItemTemplate {
            id: 1,
            name: "Potion".into(),
            graphic: 1,
            value: 10,
            effect: Some(ItemEffect { hp: 20, mp: 0 }),
        }
    }

    #[test]
    fn user_creation_sends_stats() {
        let ctx = Arc::new(ServerContext::new(
            GameSettings::default(),
            Arc::new(MemoryDb::new()),
        ));
        let socket = Arc::new(MemorySocket::default());
        let user = User::new(UserId(1), "Tester", socket.clone(), ctx);
        Character::user(user, CharacterStats::new(1, 50, 50), Inventory::new(2, 10));

        assert_eq!(
            opcodes(&socket.sent()),
            vec![
                ServerPacketId::SetLevel,
                ServerPacketId::SetCash,
                ServerPacketId::SetExp,
                ServerPacketId::SetStatPoints,
                ServerPacketId::SetHp,
                ServerPacketId::SetMp,
            ]
        );
    }

    #[test]
    fn each_stat_change_sends_one_packet() {
        let (mut character, socket) = user_character(0);
        character.set_cash(250);
        let sent = socket.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].data, server::set_cash(250).into_bytes());
    }

    #[test]
    fn level_up_grants_stat_points() {
        let (mut character, socket) = user_character(0);
        let settings = GameSettings::default();
        assert!(character.add_exp(130, &settings));

        assert_eq!(character.stats().level, 2);
        assert_eq!(character.stats().exp, 30);
        assert_eq!(character.stats().stat_points, settings.stat_points_per_level);
        assert_eq!(
            opcodes(&socket.take_sent()),
            vec![
                ServerPacketId::SetLevel,
                ServerPacketId::SetStatPoints,
                ServerPacketId::SetExp,
            ]
        );
    }

    #[test]
    fn insufficient_funds_sends_plural_message() {
        let (mut character, socket) = user_character(15);
        assert!(!character.try_buy_item(&potion(), 2));

        let sent = socket.take_sent();
        assert_eq!(sent.len(), 1);
        let mut r = PacketReader::new(&sent[0].data);
        assert_eq!(r.read_u8().unwrap(), ServerPacketId::SendMessage as u8);
        assert_eq!(
            r.read_u16().unwrap(),
            GameMessage::ShopInsufficientFundsToPurchasePlural.id()
        );
        assert_eq!(character.stats().cash, 15);
    }

    #[test]
    fn purchase_charges_only_what_fit() {
        // Two slots of ten: buying 25 fits 20.
        let (mut character, socket) = user_character(1000);
        assert!(character.try_buy_item(&potion(), 25));

        assert_eq!(character.stats().cash, 800);
        assert_eq!(character.inventory().count(1), 20);
        assert_eq!(
            opcodes(&socket.take_sent()),
            vec![
                ServerPacketId::SetInventorySlot,
                ServerPacketId::SetInventorySlot,
                ServerPacketId::NotifyGetItem,
                ServerPacketId::SetCash,
                ServerPacketId::SendMessage,
            ]
        );
    }

    #[test]
    fn full_inventory_refuses_purchase() {
        let (mut character, _socket) = user_character(1000);
        character.give_item(InventoryItem::from_template(&potion(), 20));
        let other = ItemTemplate {
            id: 2,
            ..potion()
        };
        assert!(!character.try_buy_item(&other, 1));
        assert_eq!(character.stats().cash, 1000);
    }

    #[test]
    fn damage_and_restore_reach_the_owner() {
        let (mut character, socket) = user_character(0);
        assert!(!character.damage(15));
        assert_eq!(socket.take_sent()[0].data, server::set_hp(35, 50).into_bytes());

        character.restore();
        assert_eq!(
            opcodes(&socket.take_sent()),
            vec![ServerPacketId::SetHp, ServerPacketId::SetMp]
        );
        assert_eq!(character.stats().hp, 50);
    }

    #[test]
    fn using_potion_heals_and_consumes_one() {
        let (mut character, socket) = user_character(0);
        character.give_item(InventoryItem::from_template(&potion(), 2));
        character.damage(30);
        socket.take_sent();

        assert!(character.use_item(0, &potion()));
        assert_eq!(character.stats().hp, 40);
        assert_eq!(character.inventory().get(0).unwrap().amount, 1);

        let sent = socket.take_sent();
        assert_eq!(
            opcodes(&sent),
            vec![ServerPacketId::SetHp, ServerPacketId::SetInventorySlot]
        );
        assert_eq!(sent[0].data, server::set_hp(40, 50).into_bytes());

        // Healing is capped and the last unit empties the slot.
        assert!(character.use_item(0, &potion()));
        assert_eq!(character.stats().hp, 50);
        assert!(character.inventory().get(0).is_none());
    }

    #[test]
    fn items_without_effect_are_not_used() {
        let (mut character, _socket) = user_character(0);
        let sword = ItemTemplate {
            id: 5,
            effect: None,
            ..potion()
        };
        character.give_item(InventoryItem::from_template(&sword, 1));

        assert!(!character.use_item(0, &sword));
        assert!(!character.use_item(1, &sword));
        assert!(!character.use_item(0, &potion()));
        assert_eq!(character.inventory().get(0).unwrap().amount, 1);
    }

    #[test]
    fn hp_percent_bounds() {
        let mut stats = CharacterStats::new(1, 40, 0);
        stats.hp = 10;
        assert_eq!(stats.hp_percent(), 25);
        stats.hp = -5;
        assert_eq!(stats.hp_percent(), 0);
    }
}
