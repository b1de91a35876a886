use std::cell::RefCell;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::cache::ItemCache;
use crate::data_model::{Item, ItemId, SyncToken};
use crate::error::CacheError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS items (
        id   INTEGER PRIMARY KEY,
        body TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS sync_meta (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

const SYNC_TOKEN_KEY: &str = "sync_token";

/// Cache stored in a SQLite file: one row per item (as JSON) and a key/value table holding the
/// sync token.
///
/// Calls run synchronously inside the returned futures, so they never interleave with each other.
pub struct SqliteCache {
    connection: RefCell<Connection>,
}

impl SqliteCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let connection = Connection::open(path)
            .inspect_err(|e| log::error!("Failed to open cache at {}: {e}", path.display()))?;
        Self::from_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> Result<Self, CacheError> {
        connection.execute_batch(SCHEMA)?;
        Ok(Self {
            connection: RefCell::new(connection),
        })
    }

    pub fn close(self) -> Result<(), CacheError> {
        self.connection
            .into_inner()
            .close()
            .map_err(|(_, e)| CacheError::from(e))
    }

    /// Number of cached items, without deserializing them.
    pub fn count(&self) -> Result<usize, CacheError> {
        let count: i64 = self
            .connection
            .borrow()
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl ItemCache for SqliteCache {
    async fn get_all(&self) -> Result<Vec<Item>, CacheError> {
        let connection = self.connection.borrow();
        let mut statement = connection.prepare_cached("SELECT body FROM items ORDER BY id")?;
        let bodies = statement.query_map([], |row| row.get::<_, String>(0))?;

        let mut items = Vec::new();
        for body in bodies {
            let body = body?;
            items.push(serde_json::from_str(&body)?);
        }
        Ok(items)
    }

    async fn put_all(&self, items: &[Item]) -> Result<(), CacheError> {
        if items.is_empty() {
            return Ok(());
        }
        let mut connection = self.connection.borrow_mut();
        let transaction = connection.transaction()?;
        {
            let mut statement = transaction.prepare_cached(
                "INSERT INTO items (id, body) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET body = excluded.body",
            )?;
            for item in items {
                statement.execute(params![item.id, serde_json::to_string(item)?])?;
            }
        }
        transaction.commit()?;
        Ok(())
    }

    async fn delete_many(&self, ids: &[ItemId]) -> Result<(), CacheError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut connection = self.connection.borrow_mut();
        let transaction = connection.transaction()?;
        {
            let mut statement = transaction.prepare_cached("DELETE FROM items WHERE id = ?1")?;
            for id in ids {
                statement.execute([id])?;
            }
        }
        transaction.commit()?;
        Ok(())
    }

    async fn sync_token(&self) -> Result<Option<SyncToken>, CacheError> {
        let token = self
            .connection
            .borrow()
            .query_row(
                "SELECT value FROM sync_meta WHERE key = ?1",
                [SYNC_TOKEN_KEY],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(token.map(SyncToken::new))
    }

    async fn set_sync_token(&self, token: &SyncToken) -> Result<(), CacheError> {
        self.connection.borrow().execute(
            "INSERT INTO sync_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![SYNC_TOKEN_KEY, token.as_str()],
        )?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.connection
            .borrow()
            .execute_batch("DELETE FROM items; DELETE FROM sync_meta;")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;

    fn item(id: ItemId, title: &str) -> Item {
        let mut item = Item::new(id);
        item.metadata.insert("title".to_string(), json!(title));
        item
    }

    #[test]
    fn contents_survive_reopening_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");
        let items = vec![item(1, "Dune"), item(2, "Emma")];

        block_on(async {
            let cache = SqliteCache::open(&path).unwrap();
            cache.put_all(&items).await.unwrap();
            cache.set_sync_token(&SyncToken::new("T0")).await.unwrap();
            cache.close().unwrap();

            let reopened = SqliteCache::open(&path).unwrap();
            assert_eq!(reopened.get_all().await.unwrap(), items);
            assert_eq!(
                reopened.sync_token().await.unwrap(),
                Some(SyncToken::new("T0"))
            );
        });
    }

    #[test]
    fn put_all_upserts_and_delete_many_removes() {
        block_on(async {
            let cache = SqliteCache::open_in_memory().unwrap();
            cache.put_all(&[item(1, "a"), item(2, "b"), item(3, "c")]).await.unwrap();
            cache.put(&item(2, "b2")).await.unwrap();
            cache.delete_many(&[1, 3, 99]).await.unwrap();

            assert_eq!(cache.get_all().await.unwrap(), vec![item(2, "b2")]);
            assert_eq!(cache.count().unwrap(), 1);
        });
    }

    #[test]
    fn clear_drops_items_and_token() {
        block_on(async {
            let cache = SqliteCache::open_in_memory().unwrap();
            cache.put(&item(1, "a")).await.unwrap();
            cache.set_sync_token(&SyncToken::new("T0")).await.unwrap();
            cache.set_sync_token(&SyncToken::new("T1")).await.unwrap();
            assert_eq!(cache.sync_token().await.unwrap(), Some(SyncToken::new("T1")));

            cache.clear().await.unwrap();
            assert!(cache.get_all().await.unwrap().is_empty());
            assert_eq!(cache.sync_token().await.unwrap(), None);
        });
    }

    #[test]
    fn corrupt_row_is_an_error() {
        block_on(async {
            let cache = SqliteCache::open_in_memory().unwrap();
            cache
                .connection
                .borrow()
                .execute("INSERT INTO items (id, body) VALUES (1, 'not json')", [])
                .unwrap();
            assert!(matches!(
                cache.get_all().await,
                Err(CacheError::Serde(_))
            ));
        });
    }
}
