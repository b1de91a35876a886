//! Durable mirror of the collection plus the sync token.
//!
//! Pure storage. The orchestrator decides what goes in and treats any error coming out of here as
//! a cache miss.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryCache;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCache;

use crate::data_model::{Item, ItemId, SyncToken};
use crate::error::CacheError;

/// Every operation is atomic on its own; `put_all` and `delete_many` are a single transaction.
#[allow(async_fn_in_trait)]
pub trait ItemCache {
    async fn get_all(&self) -> Result<Vec<Item>, CacheError>;

    /// Upsert `items` by id.
    async fn put_all(&self, items: &[Item]) -> Result<(), CacheError>;

    async fn put(&self, item: &Item) -> Result<(), CacheError> {
        self.put_all(std::slice::from_ref(item)).await
    }

    async fn delete_many(&self, ids: &[ItemId]) -> Result<(), CacheError>;

    async fn delete(&self, id: ItemId) -> Result<(), CacheError> {
        self.delete_many(&[id]).await
    }

    async fn sync_token(&self) -> Result<Option<SyncToken>, CacheError>;

    async fn set_sync_token(&self, token: &SyncToken) -> Result<(), CacheError>;

    /// Drop all items and the sync token.
    async fn clear(&self) -> Result<(), CacheError>;
}
