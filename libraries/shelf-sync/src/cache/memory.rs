use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::cache::ItemCache;
use crate::data_model::{Item, ItemId, SyncToken};
use crate::error::CacheError;

/// Cache that lives as long as the process. Clones share the same storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache {
    inner: Rc<RefCell<Stored>>,
}

#[derive(Debug, Default)]
struct Stored {
    items: BTreeMap<ItemId, Item>,
    sync_token: Option<SyncToken>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ItemCache for MemoryCache {
    async fn get_all(&self) -> Result<Vec<Item>, CacheError> {
        Ok(self.inner.borrow().items.values().cloned().collect())
    }

    async fn put_all(&self, items: &[Item]) -> Result<(), CacheError> {
        let mut stored = self.inner.borrow_mut();
        for item in items {
            stored.items.insert(item.id, item.clone());
        }
        Ok(())
    }

    async fn delete_many(&self, ids: &[ItemId]) -> Result<(), CacheError> {
        let mut stored = self.inner.borrow_mut();
        for id in ids {
            stored.items.remove(id);
        }
        Ok(())
    }

    async fn sync_token(&self) -> Result<Option<SyncToken>, CacheError> {
        Ok(self.inner.borrow().sync_token.clone())
    }

    async fn set_sync_token(&self, token: &SyncToken) -> Result<(), CacheError> {
        self.inner.borrow_mut().sync_token = Some(token.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut stored = self.inner.borrow_mut();
        stored.items.clear();
        stored.sync_token = None;
        Ok(())
    }
}
