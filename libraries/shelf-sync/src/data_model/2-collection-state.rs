use std::collections::{HashMap, HashSet};

use im::Vector;

use crate::data_model::{Item, ItemId, ItemPatch};

/// What the UI sees.
///
/// `items` is `None` until the first load succeeds (or after a reset). It also stays `None` when
/// the very first load fails, in which case `error` says why.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectionState {
    pub items: Option<Vector<Item>>,
    pub loaded: bool,
    pub error: Option<String>,
}

impl CollectionState {
    pub fn loaded(items: Vector<Item>) -> Self {
        Self {
            items: Some(items),
            loaded: true,
            error: None,
        }
    }

    /// Same state with different items. `loaded` and `error` are carried over.
    pub fn with_items(&self, items: Vector<Item>) -> Self {
        Self {
            items: Some(items),
            loaded: self.loaded,
            error: self.error.clone(),
        }
    }

    /// Same items, flagged with `error`.
    pub fn with_error(&self, error: impl Into<String>) -> Self {
        Self {
            items: self.items.clone(),
            loaded: self.loaded,
            error: Some(error.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.items.as_ref().map(Vector::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.as_ref()?.iter().find(|item| item.id == id)
    }
}

/// Builds the next item list from a previous one without touching it.
///
/// `im::Vector` shares structure with the snapshot it was cloned from, so items that aren't
/// edited stay shared with every older snapshot.
pub(crate) struct ItemsEditor {
    items: Vector<Item>,
    positions: HashMap<ItemId, usize>,
}

impl ItemsEditor {
    pub(crate) fn new(items: Vector<Item>) -> Self {
        let positions = index_positions(&items);
        Self { items, positions }
    }

    pub(crate) fn contains(&self, id: ItemId) -> bool {
        self.positions.contains_key(&id)
    }

    pub(crate) fn get(&self, id: ItemId) -> Option<&Item> {
        self.positions.get(&id).and_then(|&pos| self.items.get(pos))
    }

    /// Replace the item with the same id, or append it.
    pub(crate) fn upsert(&mut self, item: Item) {
        match self.positions.get(&item.id) {
            Some(&pos) => {
                self.items.set(pos, item);
            }
            None => {
                self.positions.insert(item.id, self.items.len());
                self.items.push_back(item);
            }
        }
    }

    /// Merge `patch` into the item it names. An unknown id is created from the patch.
    pub(crate) fn patch(&mut self, patch: ItemPatch) {
        let next = match self.get(patch.id) {
            Some(existing) => existing.clone().merged(patch),
            None => Item::from(patch),
        };
        self.upsert(next);
    }

    /// Returns whether anything was removed.
    pub(crate) fn remove(&mut self, ids: &[ItemId]) -> bool {
        if !ids.iter().any(|id| self.positions.contains_key(id)) {
            return false;
        }
        let ids: HashSet<ItemId> = ids.iter().copied().collect();
        self.items.retain(|item| !ids.contains(&item.id));
        self.positions = index_positions(&self.items);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn finish(self) -> Vector<Item> {
        self.items
    }
}

fn index_positions(items: &Vector<Item>) -> HashMap<ItemId, usize> {
    items
        .iter()
        .enumerate()
        .map(|(pos, item)| (item.id, pos))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(ids: &[ItemId]) -> Vector<Item> {
        ids.iter().copied().map(Item::new).collect()
    }

    #[test]
    fn editing_leaves_the_original_snapshot_alone() {
        let before = items(&[1, 2, 3]);
        let mut editor = ItemsEditor::new(before.clone());
        let mut renamed = Item::new(2);
        renamed.read_status = Some("READ".to_string());
        editor.upsert(renamed.clone());
        editor.upsert(Item::new(4));
        editor.remove(&[1]);
        let after = editor.finish();

        assert_eq!(before, items(&[1, 2, 3]));
        let ids: Vec<_> = after.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(after[0], renamed);
    }

    #[test]
    fn positions_stay_correct_after_removal() {
        let mut editor = ItemsEditor::new(items(&[1, 2, 3, 4]));
        assert!(editor.remove(&[2]));
        assert!(!editor.remove(&[2]));

        let mut updated = Item::new(4);
        updated.personal_rating = Some(5);
        editor.upsert(updated.clone());

        assert_eq!(editor.len(), 3);
        assert_eq!(editor.get(4), Some(&updated));
        assert_eq!(editor.get(3), Some(&Item::new(3)));

        assert!(editor.remove(&[1, 99, 3, 1]));
        assert_eq!(editor.len(), 1);
        assert_eq!(editor.get(4), Some(&updated));
        assert_eq!(editor.get(1), None);
    }

    #[test]
    fn error_keeps_items() {
        let state = CollectionState::loaded(items(&[1]));
        let failed = state.with_error("offline");
        assert_eq!(failed.items, state.items);
        assert!(failed.loaded);
        assert_eq!(failed.error.as_deref(), Some("offline"));
    }
}
