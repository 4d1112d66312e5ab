use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::packet::MAX_SHOP_ITEMS;
use crate::world::MapId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Client viewport; area broadcasts reach 1.25 screens around the origin.
    pub screen_size: Vec2,
    /// Countdown a map keeps simulating after its last user leaves.
    pub empty_map_no_update_delay_ms: u64,
    pub max_shop_distance: f32,
    /// Shop slots offered; never more than one `StartShopping` can carry.
    pub max_shop_items: usize,
    pub inventory_size: usize,
    pub max_stack: u8,
    /// Walking speed in px/ms.
    pub walk_speed: f32,
    pub attack_range: f32,
    pub character_size: Vec2,
    pub start_map: MapId,
    pub spawn_position: Vec2,
    pub stat_points_per_level: u32,
    pub max_level: u8,
    pub start_hp: i32,
    pub start_mp: i32,
}

impl GameSettings {
    /// Total experience needed to advance from `level`.
    pub fn exp_for_level(&self, level: u8) -> u32 {
        100 * level as u32
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            screen_size: Vec2::new(800.0, 600.0),
            empty_map_no_update_delay_ms: 60_000,
            max_shop_distance: 250.0,
            max_shop_items: MAX_SHOP_ITEMS,
            inventory_size: 36,
            max_stack: 99,
            walk_speed: 0.18,
            attack_range: 64.0,
            character_size: Vec2::new(32.0, 48.0),
            start_map: MapId(1),
            spawn_position: Vec2::new(512.0, 512.0),
            stat_points_per_level: 5,
            max_level: 100,
            start_hp: 50,
            start_mp: 50,
        }
    }
}
