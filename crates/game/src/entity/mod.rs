mod capability;
mod character;
mod dynamic;
mod index;
mod inventory;

pub use capability::{Disposable, Respawnable};
pub use character::{Character, CharacterKind, CharacterStats, NpcData};
pub use dynamic::{
    DynamicEntity, EntityKind, EntityTag, ItemEntity, POSITION_RESYNC_INTERVAL_MS,
    decode_velocity, encode_velocity,
};
pub use index::{EntitySlots, MapEntityIndex};
pub use inventory::{AddResult, Inventory, InventoryItem};
