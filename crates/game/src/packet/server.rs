//! Server to client messages. Each function builds one complete message and
//! has no side effects.

use crate::db::{ItemTemplate, Shop};
use crate::entity::{DynamicEntity, InventoryItem, MapEntityIndex};
use crate::error::PacketError;
use crate::world::MapId;

use super::{
    GameMessage, MAX_MESSAGE_PARAMETER_LENGTH, MAX_MESSAGE_PARAMETERS, MAX_NAME_LENGTH,
    MAX_SAY_LENGTH, MAX_SHOP_ITEMS, MAX_SHOP_NAME_LENGTH, PacketWriter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServerPacketId {
    CharAttack = 1,
    CharDamage = 2,
    ChatSay = 3,
    CreateDynamicEntity = 4,
    LoginSuccessful = 5,
    LoginUnsuccessful = 6,
    NotifyExpCash = 7,
    NotifyGetItem = 8,
    NotifyLevel = 9,
    Ping = 10,
    RemoveDynamicEntity = 11,
    SendMessage = 12,
    SetInventorySlot = 13,
    SetMap = 14,
    SetUserChar = 15,
    SynchronizeDynamicEntity = 16,
    UpdateVelocityAndPosition = 17,
    SetCash = 18,
    SetExp = 19,
    SetLevel = 20,
    SetStatPoints = 21,
    StartShopping = 22,
    StopShopping = 23,
    SetHp = 24,
    SetMp = 25,
}

impl TryFrom<u8> for ServerPacketId {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use ServerPacketId::*;
        let id = match value {
            1 => CharAttack,
            2 => CharDamage,
            3 => ChatSay,
            4 => CreateDynamicEntity,
            5 => LoginSuccessful,
            6 => LoginUnsuccessful,
            7 => NotifyExpCash,
            8 => NotifyGetItem,
            9 => NotifyLevel,
            10 => Ping,
            11 => RemoveDynamicEntity,
            12 => SendMessage,
            13 => SetInventorySlot,
            14 => SetMap,
            15 => SetUserChar,
            16 => SynchronizeDynamicEntity,
            17 => UpdateVelocityAndPosition,
            18 => SetCash,
            19 => SetExp,
            20 => SetLevel,
            21 => SetStatPoints,
            22 => StartShopping,
            23 => StopShopping,
            24 => SetHp,
            25 => SetMp,
            other => return Err(PacketError::UnknownOpcode(other)),
        };
        Ok(id)
    }
}

fn writer(id: ServerPacketId) -> PacketWriter {
    PacketWriter::with_opcode(id as u8)
}

pub fn char_attack(attacker: MapEntityIndex) -> PacketWriter {
    let mut pw = writer(ServerPacketId::CharAttack);
    pw.write_u16(attacker.get());
    pw
}

pub fn char_damage(target: MapEntityIndex, damage: i32) -> PacketWriter {
    let mut pw = writer(ServerPacketId::CharDamage);
    pw.write_u16(target.get());
    pw.write_i32(damage);
    pw
}

pub fn chat_say(name: &str, speaker: MapEntityIndex, text: &str) -> PacketWriter {
    let mut pw = writer(ServerPacketId::ChatSay);
    pw.write_string(name, MAX_NAME_LENGTH);
    pw.write_u16(speaker.get());
    pw.write_string(text, MAX_SAY_LENGTH);
    pw
}

pub fn create_dynamic_entity(entity: &DynamicEntity) -> PacketWriter {
    let mut pw = writer(ServerPacketId::CreateDynamicEntity);
    pw.write_u16(entity.index().get());
    entity.write_full(&mut pw);
    pw
}

pub fn login_successful() -> PacketWriter {
    writer(ServerPacketId::LoginSuccessful)
}

pub fn login_unsuccessful(reason: GameMessage) -> PacketWriter {
    let mut pw = writer(ServerPacketId::LoginUnsuccessful);
    pw.write_u16(reason.id());
    pw
}

pub fn notify_exp_cash(exp: u32, cash: u32) -> PacketWriter {
    let mut pw = writer(ServerPacketId::NotifyExpCash);
    pw.write_u32(exp);
    pw.write_u32(cash);
    pw
}

pub fn notify_get_item(name: &str, amount: u8) -> PacketWriter {
    let mut pw = writer(ServerPacketId::NotifyGetItem);
    pw.write_string(name, MAX_NAME_LENGTH);
    pw.write_u8(amount);
    pw
}

pub fn notify_level(index: MapEntityIndex) -> PacketWriter {
    let mut pw = writer(ServerPacketId::NotifyLevel);
    pw.write_u16(index.get());
    pw
}

pub fn ping() -> PacketWriter {
    writer(ServerPacketId::Ping)
}

pub fn remove_dynamic_entity(index: MapEntityIndex) -> PacketWriter {
    let mut pw = writer(ServerPacketId::RemoveDynamicEntity);
    pw.write_u16(index.get());
    pw
}

/// Extra parameters past the protocol limit are dropped.
pub fn send_message<S: AsRef<str>>(message: GameMessage, params: &[S]) -> PacketWriter {
    let mut pw = writer(ServerPacketId::SendMessage);
    pw.write_u16(message.id());

    let count = params.len().min(MAX_MESSAGE_PARAMETERS);
    pw.write_u8(count as u8);
    for param in &params[..count] {
        pw.write_string(param.as_ref(), MAX_MESSAGE_PARAMETER_LENGTH);
    }
    pw
}

pub fn set_inventory_slot(slot: u8, item: Option<&InventoryItem>) -> PacketWriter {
    let mut pw = writer(ServerPacketId::SetInventorySlot);
    pw.write_u8(slot);
    match item {
        Some(item) => {
            pw.write_bool(true);
            pw.write_u32(item.template_id);
            pw.write_string(&item.name, MAX_NAME_LENGTH);
            pw.write_u16(item.graphic);
            pw.write_u8(item.amount);
        }
        None => pw.write_bool(false),
    }
    pw
}

pub fn set_map(map: MapId) -> PacketWriter {
    let mut pw = writer(ServerPacketId::SetMap);
    pw.write_u16(map.0);
    pw
}

pub fn set_user_char(index: MapEntityIndex) -> PacketWriter {
    let mut pw = writer(ServerPacketId::SetUserChar);
    pw.write_u16(index.get());
    pw
}

pub fn synchronize_dynamic_entity(entity: &DynamicEntity) -> PacketWriter {
    let mut pw = writer(ServerPacketId::SynchronizeDynamicEntity);
    pw.write_u16(entity.index().get());
    entity.write_full(&mut pw);
    pw
}

pub fn update_velocity_and_position(entity: &DynamicEntity, current_time: u64) -> PacketWriter {
    let mut pw = writer(ServerPacketId::UpdateVelocityAndPosition);
    pw.write_u16(entity.index().get());
    entity.write_position_and_velocity(&mut pw, current_time);
    pw
}

pub fn set_cash(cash: u32) -> PacketWriter {
    let mut pw = writer(ServerPacketId::SetCash);
    pw.write_u32(cash);
    pw
}

pub fn set_exp(exp: u32) -> PacketWriter {
    let mut pw = writer(ServerPacketId::SetExp);
    pw.write_u32(exp);
    pw
}

pub fn set_level(level: u8) -> PacketWriter {
    let mut pw = writer(ServerPacketId::SetLevel);
    pw.write_u8(level);
    pw
}

pub fn set_stat_points(points: u32) -> PacketWriter {
    let mut pw = writer(ServerPacketId::SetStatPoints);
    pw.write_u32(points);
    pw
}

pub fn set_hp(hp: i32, max_hp: i32) -> PacketWriter {
    let mut pw = writer(ServerPacketId::SetHp);
    pw.write_i32(hp);
    pw.write_i32(max_hp);
    pw
}

pub fn set_mp(mp: i32, max_mp: i32) -> PacketWriter {
    let mut pw = writer(ServerPacketId::SetMp);
    pw.write_i32(mp);
    pw.write_i32(max_mp);
    pw
}

/// `items` follow the shop's slot order; `None` marks a slot whose template
/// is gone. Slots past `MAX_SHOP_ITEMS` are not listed.
pub fn start_shopping(
    shopkeeper: MapEntityIndex,
    shop: &Shop,
    items: &[Option<ItemTemplate>],
) -> PacketWriter {
    let mut pw = writer(ServerPacketId::StartShopping);
    pw.write_u16(shopkeeper.get());
    pw.write_string(&shop.name, MAX_SHOP_NAME_LENGTH);

    let count = items.len().min(MAX_SHOP_ITEMS);
    pw.write_u8(count as u8);
    for item in &items[..count] {
        match item {
            Some(item) => {
                pw.write_bool(true);
                pw.write_u32(item.id);
                pw.write_string(&item.name, MAX_NAME_LENGTH);
                pw.write_u16(item.graphic);
                pw.write_u32(item.value);
            }
            None => pw.write_bool(false),
        }
    }
    pw
}

pub fn stop_shopping() -> PacketWriter {
    writer(ServerPacketId::StopShopping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ItemEntity;
    use crate::packet::PacketReader;
    use glam::Vec2;

    #[test]
    fn opcode_roundtrip() {
        for raw in 1..=25u8 {
            let id = ServerPacketId::try_from(raw).unwrap();
            assert_eq!(id as u8, raw);
        }
        assert!(ServerPacketId::try_from(0).is_err());
        assert!(ServerPacketId::try_from(26).is_err());
    }

    #[test]
    fn remove_dynamic_entity_bytes() {
        let pw = remove_dynamic_entity(MapEntityIndex(0x0102));
        assert_eq!(pw.as_bytes(), &[ServerPacketId::RemoveDynamicEntity as u8, 0x01, 0x02]);
    }

    #[test]
    fn set_cash_bytes() {
        let pw = set_cash(1000);
        assert_eq!(pw.as_bytes(), &[ServerPacketId::SetCash as u8, 0, 0, 0x03, 0xE8]);
    }

    #[test]
    fn creation_carries_index_then_entity() {
        let mut slots = crate::entity::EntitySlots::new();
        let idx = slots
            .insert(DynamicEntity::item(
                ItemEntity::new(4, "Gem", 9, 2, 50),
                Vec2::new(1.0, 2.0),
            ))
            .unwrap();
        let entity = slots.get(idx).unwrap();

        let pw = create_dynamic_entity(entity);
        let mut r = PacketReader::new(pw.as_bytes());
        assert_eq!(r.read_u8().unwrap(), ServerPacketId::CreateDynamicEntity as u8);
        assert_eq!(r.read_u16().unwrap(), idx.get());
        assert_eq!(r.read_u8().unwrap(), 1); // item tag
        assert_eq!(r.read_vec2().unwrap(), Vec2::new(1.0, 2.0));
    }

    #[test]
    fn message_parameters_are_capped() {
        let params: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        let pw = send_message(GameMessage::CommandShout, &params);
        let mut r = PacketReader::new(pw.as_bytes());
        r.read_u8().unwrap();
        assert_eq!(r.read_u16().unwrap(), GameMessage::CommandShout.id());
        assert_eq!(r.read_u8().unwrap() as usize, MAX_MESSAGE_PARAMETERS);
    }

    #[test]
    fn full_shop_fits_one_payload() {
        let shop = Shop {
            id: 1,
            name: "n".repeat(MAX_SHOP_NAME_LENGTH + 10),
            items: (0..40).collect(),
        };
        let items: Vec<Option<ItemTemplate>> = (0..40)
            .map(|id| {
                Some(ItemTemplate {
                    id,
                    name: "x".repeat(MAX_NAME_LENGTH),
                    graphic: 1,
                    value: 1,
                    effect: None,
                })
            })
            .collect();

        let pw = start_shopping(MapEntityIndex(3), &shop, &items);
        assert!(pw.as_bytes().len() <= crate::net::MAX_PAYLOAD_SIZE);

        let mut r = PacketReader::new(pw.as_bytes());
        r.read_u8().unwrap();
        r.read_u16().unwrap();
        r.read_string(MAX_SHOP_NAME_LENGTH).unwrap();
        assert_eq!(r.read_u8().unwrap() as usize, MAX_SHOP_ITEMS);
    }

    #[test]
    fn missing_shop_template_keeps_its_slot() {
        let shop = Shop {
            id: 1,
            name: "Store".into(),
            items: vec![7, 8],
        };
        let sword = ItemTemplate {
            id: 8,
            name: "Sword".into(),
            graphic: 2,
            value: 9,
            effect: None,
        };
        let pw = start_shopping(MapEntityIndex(0), &shop, &[None, Some(sword)]);

        let mut r = PacketReader::new(pw.as_bytes());
        r.read_u8().unwrap();
        r.read_u16().unwrap();
        r.read_string(MAX_SHOP_NAME_LENGTH).unwrap();
        assert_eq!(r.read_u8().unwrap(), 2);
        assert!(!r.read_bool().unwrap());
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_u32().unwrap(), 8);
    }

    #[test]
    fn longest_message_fits_one_payload() {
        let params: Vec<String> = (0..MAX_MESSAGE_PARAMETERS).map(|_| "m".repeat(400)).collect();
        let pw = send_message(GameMessage::CommandTellSender, &params);
        assert!(pw.as_bytes().len() <= crate::net::MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn empty_inventory_slot() {
        let pw = set_inventory_slot(3, None);
        assert_eq!(pw.as_bytes(), &[ServerPacketId::SetInventorySlot as u8, 3, 0]);
    }

    #[test]
    fn update_packet_is_timestamped() {
        let mut entity = DynamicEntity::item(ItemEntity::new(1, "Rock", 1, 1, 0), Vec2::ZERO);
        entity.set_velocity(Vec2::new(0.5, 0.0));
        let pw = update_velocity_and_position(&entity, 70_000);

        let mut r = PacketReader::new(pw.as_bytes());
        r.read_u8().unwrap();
        r.read_u16().unwrap();
        assert_eq!(r.read_u32().unwrap(), 70_000);
        assert_eq!(r.read_vec2().unwrap(), Vec2::ZERO);
        assert_eq!(r.read_i16().unwrap(), 500);
        assert_eq!(r.remaining(), 2);
    }
}
