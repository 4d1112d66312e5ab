use std::sync::{Arc, Mutex};

use crate::db::{ItemTemplate, Shop};
use crate::entity::{DynamicEntity, MapEntityIndex};
use crate::lock;
use crate::map::Map;
use crate::packet::{MAX_SHOP_ITEMS, server};
use crate::world::MapId;

use super::User;

#[derive(Debug, Clone)]
pub struct ShopSession {
    pub shop: Arc<Shop>,
    pub owner: MapEntityIndex,
    pub map: MapId,
}

/// The three session fields only ever change together, under this lock.
#[derive(Debug, Default)]
pub struct UserShoppingState {
    session: Mutex<Option<ShopSession>>,
}

impl UserShoppingState {
    pub fn current(&self) -> Option<ShopSession> {
        lock(&self.session).clone()
    }

    pub fn is_shopping(&self) -> bool {
        lock(&self.session).is_some()
    }

    pub(crate) fn clear(&self) -> Option<ShopSession> {
        lock(&self.session).take()
    }
}

fn shop_of(entity: &DynamicEntity) -> Option<u32> {
    entity.as_character()?.npc_data()?.shop
}

impl User {
    fn shop_distance_valid(&self, map: &Map, owner: MapEntityIndex, session_map: MapId) -> bool {
        if map.id() != session_map {
            return false;
        }
        let Some((user_map, user_index)) = self.location() else {
            return false;
        };
        if user_map != map.id() {
            return false;
        }
        let (Some(me), Some(keeper)) = (map.entity(user_index), map.entity(owner)) else {
            return false;
        };
        if shop_of(keeper).is_none() {
            return false;
        }
        me.center().distance(keeper.center()) <= self.context().settings().max_shop_distance
    }

    pub fn try_start_shopping(&self, map: &Map, shopkeeper: MapEntityIndex) -> bool {
        let Some(shop_id) = map.entity(shopkeeper).and_then(shop_of) else {
            return false;
        };
        if !self.shop_distance_valid(map, shopkeeper, map.id()) {
            return false;
        }

        let db = self.context().db();
        let Some(shop) = db.shop(shop_id) else {
            log::warn!("Shopkeeper {} refers to missing shop {}", shopkeeper, shop_id);
            return false;
        };
        let listed = self.context().settings().max_shop_items.min(MAX_SHOP_ITEMS);
        let items: Vec<Option<ItemTemplate>> = shop
            .items
            .iter()
            .take(listed)
            .map(|&id| {
                let template = db.item_template(id);
                if template.is_none() {
                    log::warn!("Shop {} lists missing item template {}", shop.id, id);
                }
                template
            })
            .collect();

        let mut session = lock(&self.shopping().session);
        if session.is_some() {
            self.send(&server::stop_shopping());
        }
        *session = Some(ShopSession {
            shop: Arc::clone(&shop),
            owner: shopkeeper,
            map: map.id(),
        });
        self.send(&server::start_shopping(shopkeeper, &shop, &items));
        true
    }

    /// Buys from the active session. The distance to the shopkeeper is
    /// checked again here; failing it ends the session.
    pub fn try_purchase(&self, map: &mut Map, slot: u8, amount: u8) -> bool {
        let shop = {
            let mut session = lock(&self.shopping().session);
            let Some(active) = session.as_ref() else {
                return false;
            };
            if !self.shop_distance_valid(map, active.owner, active.map) {
                self.send(&server::stop_shopping());
                *session = None;
                return false;
            }
            Arc::clone(&active.shop)
        };

        let settings = self.context().settings();
        if slot as usize >= settings.max_shop_items.min(MAX_SHOP_ITEMS) {
            return false;
        }
        let Some(template_id) = shop.item(slot as usize) else {
            return false;
        };
        let Some(template) = self.context().db().item_template(template_id) else {
            log::warn!("Shop {} lists missing item template {}", shop.id, template_id);
            return false;
        };

        let Some((_, index)) = self.location() else {
            return false;
        };
        let Some(character) = map
            .entity_mut(index)
            .and_then(DynamicEntity::as_character_mut)
        else {
            log::error!("User {} has no character at {}", self.name(), index);
            return false;
        };
        character.try_buy_item(&template, amount)
    }
}
