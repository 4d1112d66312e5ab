use std::collections::BTreeSet;
use std::fmt;

use super::dynamic::DynamicEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MapEntityIndex(pub u16);

impl MapEntityIndex {
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for MapEntityIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Slot storage for a map's entities. Indices of removed entities are reused,
/// lowest first, so the wire indices stay small.
#[derive(Debug, Default)]
pub struct EntitySlots {
    slots: Vec<Option<DynamicEntity>>,
    free: BTreeSet<u16>,
    count: usize,
}

impl EntitySlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mut entity: DynamicEntity) -> Result<MapEntityIndex, DynamicEntity> {
        let raw = match self.free.pop_first() {
            Some(raw) => raw,
            None => {
                if self.slots.len() > u16::MAX as usize {
                    return Err(entity);
                }
                self.slots.push(None);
                (self.slots.len() - 1) as u16
            }
        };

        let index = MapEntityIndex(raw);
        entity.set_index(index);
        self.slots[raw as usize] = Some(entity);
        self.count += 1;
        Ok(index)
    }

    pub fn remove(&mut self, index: MapEntityIndex) -> Option<DynamicEntity> {
        let entity = self.slots.get_mut(index.0 as usize)?.take()?;
        self.free.insert(index.0);
        self.count -= 1;
        Some(entity)
    }

    pub fn get(&self, index: MapEntityIndex) -> Option<&DynamicEntity> {
        self.slots.get(index.0 as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, index: MapEntityIndex) -> Option<&mut DynamicEntity> {
        self.slots.get_mut(index.0 as usize)?.as_mut()
    }

    pub fn contains(&self, index: MapEntityIndex) -> bool {
        self.get(index).is_some()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.free.is_empty() && self.slots.len() > u16::MAX as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = &DynamicEntity> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DynamicEntity> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    pub fn drain(&mut self) -> Vec<DynamicEntity> {
        self.free.clear();
        self.count = 0;
        self.slots.drain(..).flatten().collect()
    }
}
