use serde::{Deserialize, Serialize};

use crate::db::{ItemTemplate, ItemTemplateId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub template_id: ItemTemplateId,
    pub name: String,
    pub graphic: u16,
    pub amount: u8,
    pub value: u32,
}

impl InventoryItem {
    pub fn from_template(template: &ItemTemplate, amount: u8) -> Self {
        Self {
            template_id: template.id,
            name: template.name.clone(),
            graphic: template.graphic,
            amount,
            value: template.value,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct AddResult {
    pub remainder: u8,
    pub changed_slots: Vec<usize>,
}

impl AddResult {
    pub fn added(&self, requested: u8) -> u8 {
        requested.saturating_sub(self.remainder)
    }
}

#[derive(Debug, Clone)]
pub struct Inventory {
    slots: Vec<Option<InventoryItem>>,
    max_stack: u8,
}

impl Inventory {
    pub fn new(size: usize, max_stack: u8) -> Self {
        Self {
            slots: vec![None; size],
            max_stack: max_stack.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn get(&self, slot: usize) -> Option<&InventoryItem> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &InventoryItem)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, item)| item.as_ref().map(|item| (slot, item)))
    }

    pub fn count(&self, template_id: ItemTemplateId) -> u32 {
        self.iter()
            .filter(|(_, item)| item.template_id == template_id)
            .map(|(_, item)| item.amount as u32)
            .sum()
    }

    pub fn can_add(&self, template_id: ItemTemplateId) -> bool {
        self.slots.iter().any(|slot| match slot {
            None => true,
            Some(item) => item.template_id == template_id && item.amount < self.max_stack,
        })
    }

    pub fn add(&mut self, mut item: InventoryItem) -> AddResult {
        let mut changed_slots = Vec::new();

        for (slot, existing) in self.slots.iter_mut().enumerate() {
            if item.amount == 0 {
                break;
            }
            let Some(existing) = existing else {
                continue;
            };
            if existing.template_id != item.template_id || existing.amount >= self.max_stack {
                continue;
            }
            let moved = item.amount.min(self.max_stack - existing.amount);
            existing.amount += moved;
            item.amount -= moved;
            changed_slots.push(slot);
        }

        for (slot, empty) in self.slots.iter_mut().enumerate() {
            if item.amount == 0 {
                break;
            }
            if empty.is_some() {
                continue;
            }
            let moved = item.amount.min(self.max_stack);
            *empty = Some(InventoryItem {
                amount: moved,
                ..item.clone()
            });
            item.amount -= moved;
            changed_slots.push(slot);
        }

        AddResult {
            remainder: item.amount,
            changed_slots,
        }
    }

    pub fn remove(&mut self, slot: usize) -> Option<InventoryItem> {
        self.slots.get_mut(slot)?.take()
    }

    pub fn decrease_amount(&mut self, slot: usize) -> Option<u8> {
        let entry = self.slots.get_mut(slot)?;
        let item = entry.as_mut()?;
        item.amount = item.amount.saturating_sub(1);
        let left = item.amount;
        if left == 0 {
            *entry = None;
        }
        Some(left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn potion(amount: u8) -> InventoryItem {
        InventoryItem {
            template_id: 2,
            name: "Potion".into(),
            graphic: 4,
            amount,
            value: 15,
        }
    }

    #[test]
    fn decrease_empties_slot_at_zero() {
        let mut inv = Inventory::new(2, 10);
        inv.add(potion(2));
        assert_eq!(inv.decrease_amount(0), Some(1));
        assert_eq!(inv.decrease_amount(0), Some(0));
        assert!(inv.get(0).is_none());
        assert_eq!(inv.decrease_amount(0), None);
        assert_eq!(inv.decrease_amount(9), None);
    }

    #[test]
    fn stacks_before_using_empty_slots() {
        let mut inv = Inventory::new(4, 10);
        inv.add(potion(6));
        let result = inv.add(potion(7));

        assert_eq!(result.remainder, 0);
        assert_eq!(result.changed_slots, vec![0, 1]);
        assert_eq!(inv.get(0).unwrap().amount, 10);
        assert_eq!(inv.get(1).unwrap().amount, 3);
    }

    #[test]
    fn returns_what_does_not_fit() {
        let mut inv = Inventory::new(2, 5);
        let result = inv.add(potion(12));

        assert_eq!(result.remainder, 2);
        assert_eq!(result.added(12), 10);
        assert!(!inv.can_add(2));
        assert_eq!(inv.count(2), 10);
    }

    #[test]
    fn can_add_into_partial_stack() {
        let mut inv = Inventory::new(1, 5);
        inv.add(potion(3));
        assert!(inv.can_add(2));
        assert!(!inv.can_add(9));
    }
}
