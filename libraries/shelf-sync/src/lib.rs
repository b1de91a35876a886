//! Client-side sync core for the shelf media library.
//!
//! It keeps one collection of items consistent across three places: a durable local cache, an
//! in-memory state container that the UI subscribes to, and the server.
//!
//! Syncing strategy:
//! 1. The first time the collection is needed, the cache is read. If it holds items and a sync
//!    token, those items are published right away and the server is asked only for what changed
//!    since the token (a "delta").
//! 2. If the delta can't be trusted (its reported total disagrees with what we end up with) or the
//!    delta request fails, the whole collection is fetched again and the cache is replaced.
//! 3. Writes go to the server first. Only the values the server confirms are merged into the state,
//!    by id, so nothing else in the collection changes.
//! 4. Push events from other sessions are merged with the same id-keyed rules as deltas, and are
//!    written through to the cache.
//!
//! Everything runs on one thread. Shared state lives in `RefCell`s and no borrow is ever held
//! across an `.await`.

pub mod api;
pub mod cache;
mod coalesce;
pub mod config;
pub mod data_model;
pub mod error;
mod mutations;
mod realtime;
mod session;
pub mod state;
mod sync;

#[cfg(feature = "http")]
pub mod http;

pub use api::LibraryApi;
pub use cache::{ItemCache, MemoryCache};
#[cfg(feature = "sqlite")]
pub use cache::SqliteCache;
pub use config::SyncConfig;
pub use data_model::{
    CollectionState, Delta, FileId, FileRef, Item, ItemId, ItemPatch, Mutation, MutationOutcome,
    MutationReceipt, PushEvent, ReadingProgress, Rejection, ShelfId, Snapshot, SyncToken,
};
pub use error::{CacheError, MutationError, TransportError};
pub use mutations::ProgressSave;
pub use state::{ListenerKey, StateStream};
pub use sync::Library;
