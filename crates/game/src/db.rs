//! Read-only game data the world consumes: item templates, shops, NPC
//! placements and saved characters.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::world::MapId;

pub type ItemTemplateId = u32;
pub type ShopId = u32;
pub type NpcTemplateId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTemplate {
    pub id: ItemTemplateId,
    pub name: String,
    pub graphic: u16,
    pub value: u32,
    #[serde(default)]
    pub effect: Option<ItemEffect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEffect {
    pub hp: i32,
    pub mp: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
    pub items: Vec<ItemTemplateId>,
}

impl Shop {
    pub fn item(&self, slot: usize) -> Option<ItemTemplateId> {
        self.items.get(slot).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcTemplate {
    pub id: NpcTemplateId,
    pub name: String,
    pub level: u8,
    pub max_hp: i32,
    pub give_exp: u32,
    pub give_cash: u32,
    pub shop: Option<ShopId>,
    pub respawn_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcSpawn {
    pub template: NpcTemplateId,
    pub position: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRecord {
    pub id: MapId,
    pub size: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub name: String,
    pub map: MapId,
    pub position: Vec2,
    pub level: u8,
    pub exp: u32,
    pub cash: u32,
    pub stat_points: u32,
    pub hp: i32,
    pub mp: i32,
}

pub trait DbController: Send + Sync {
    fn item_template(&self, id: ItemTemplateId) -> Option<ItemTemplate>;

    fn shop(&self, id: ShopId) -> Option<Arc<Shop>>;

    fn character(&self, name: &str) -> Option<CharacterRecord>;

    fn npc_template(&self, id: NpcTemplateId) -> Option<NpcTemplate>;

    fn npc_spawns(&self, map: MapId) -> Vec<NpcSpawn>;

    fn maps(&self) -> Vec<MapRecord>;
}

#[derive(Debug, Default)]
pub struct MemoryDb {
    items: HashMap<ItemTemplateId, ItemTemplate>,
    shops: HashMap<ShopId, Arc<Shop>>,
    characters: HashMap<String, CharacterRecord>,
    npc_templates: HashMap<NpcTemplateId, NpcTemplate>,
    spawns: HashMap<MapId, Vec<NpcSpawn>>,
    maps: Vec<MapRecord>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: ItemTemplate) -> Self {
        self.items.insert(item.id, item);
        self
    }

    pub fn with_shop(mut self, shop: Shop) -> Self {
        self.shops.insert(shop.id, Arc::new(shop));
        self
    }

    pub fn with_character(mut self, record: CharacterRecord) -> Self {
        self.characters
            .insert(record.name.to_lowercase(), record);
        self
    }

    pub fn with_npc_template(mut self, template: NpcTemplate) -> Self {
        self.npc_templates.insert(template.id, template);
        self
    }

    pub fn with_spawn(mut self, map: MapId, spawn: NpcSpawn) -> Self {
        self.spawns.entry(map).or_default().push(spawn);
        self
    }

    pub fn with_map(mut self, record: MapRecord) -> Self {
        self.maps.push(record);
        self
    }

    pub fn demo() -> Self {
        let town = MapId(1);
        let field = MapId(2);

        Self::new()
            .with_map(MapRecord {
                id: town,
                size: Vec2::new(1600.0, 1200.0),
            })
            .with_map(MapRecord {
                id: field,
                size: Vec2::new(3200.0, 2400.0),
            })
            .with_item(ItemTemplate {
                id: 1,
                name: "Healing Potion".into(),
                graphic: 10,
                value: 15,
                effect: Some(ItemEffect { hp: 25, mp: 0 }),
            })
            .with_item(ItemTemplate {
                id: 2,
                name: "Mana Potion".into(),
                graphic: 11,
                value: 20,
                effect: Some(ItemEffect { hp: 0, mp: 25 }),
            })
            .with_item(ItemTemplate {
                id: 3,
                name: "Short Sword".into(),
                graphic: 30,
                value: 120,
                effect: None,
            })
            .with_shop(Shop {
                id: 1,
                name: "General Store".into(),
                items: vec![1, 2, 3],
            })
            .with_npc_template(NpcTemplate {
                id: 1,
                name: "Shopkeeper".into(),
                level: 10,
                max_hp: 500,
                give_exp: 0,
                give_cash: 0,
                shop: Some(1),
                respawn_delay_ms: 5_000,
            })
            .with_npc_template(NpcTemplate {
                id: 2,
                name: "Bee".into(),
                level: 1,
                max_hp: 20,
                give_exp: 12,
                give_cash: 5,
                shop: None,
                respawn_delay_ms: 10_000,
            })
            .with_spawn(
                town,
                NpcSpawn {
                    template: 1,
                    position: Vec2::new(600.0, 400.0),
                },
            )
            .with_spawn(
                field,
                NpcSpawn {
                    template: 2,
                    position: Vec2::new(900.0, 700.0),
                },
            )
            .with_spawn(
                field,
                NpcSpawn {
                    template: 2,
                    position: Vec2::new(1400.0, 1100.0),
                },
            )
    }
}

impl DbController for MemoryDb {
    fn item_template(&self, id: ItemTemplateId) -> Option<ItemTemplate> {
        self.items.get(&id).cloned()
    }

    fn shop(&self, id: ShopId) -> Option<Arc<Shop>> {
        self.shops.get(&id).cloned()
    }

    fn character(&self, name: &str) -> Option<CharacterRecord> {
        self.characters.get(&name.to_lowercase()).cloned()
    }

    fn npc_template(&self, id: NpcTemplateId) -> Option<NpcTemplate> {
        self.npc_templates.get(&id).cloned()
    }

    fn npc_spawns(&self, map: MapId) -> Vec<NpcSpawn> {
        self.spawns.get(&map).cloned().unwrap_or_default()
    }

    fn maps(&self) -> Vec<MapRecord> {
        self.maps.clone()
    }
}
