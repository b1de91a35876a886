//! Deciding how to get the collection: cache plus delta, or a full fetch.

use std::cell::Cell;
use std::rc::Rc;

use chokepoint::ChokePoint;
use im::Vector;

use crate::api::LibraryApi;
use crate::cache::ItemCache;
use crate::coalesce::Coalescer;
use crate::config::SyncConfig;
use crate::data_model::{
    CollectionState, Delta, Item, ItemId, ReadingProgress, Snapshot, SyncToken,
};
use crate::error::CacheError;
use crate::state::{ListenerKey, StateContainer, StateStream};

/// The sync core for one collection.
///
/// Cheap to clone; clones share everything.
pub struct Library<A, C> {
    pub(crate) inner: Rc<Inner<A, C>>,
}

pub(crate) struct Inner<A, C> {
    pub(crate) api: A,
    pub(crate) cache: C,
    pub(crate) state: StateContainer,
    pub(crate) config: SyncConfig,
    pub(crate) progress: Coalescer<ItemId, ReadingProgress>,
    /// Keyed by session generation, so an abandoned load can't be joined by the next session.
    pub(crate) flight: ChokePoint<u64, ()>,
    /// Bumped on every session reset. Async work remembers the generation it started in and
    /// drops its result if that is no longer current.
    pub(crate) generation: Cell<u64>,
}

impl<A, C> Clone for Library<A, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A, C> Library<A, C>
where
    A: LibraryApi + 'static,
    C: ItemCache + 'static,
{
    pub fn new(api: A, cache: C, config: SyncConfig) -> Self {
        Self {
            inner: Rc::new(Inner {
                api,
                cache,
                state: StateContainer::new(),
                config,
                progress: Coalescer::new(),
                flight: ChokePoint::new(),
                generation: Cell::new(0),
            }),
        }
    }

    pub fn state(&self) -> Rc<CollectionState> {
        self.inner.state.current()
    }

    pub fn subscribe(&self, listener: impl Fn(&Rc<CollectionState>) + 'static) -> ListenerKey {
        self.inner.state.subscribe(listener)
    }

    pub fn unsubscribe(&self, key: ListenerKey) {
        self.inner.state.unsubscribe(key)
    }

    pub fn stream(&self) -> StateStream {
        self.inner.state.stream()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.flight.is_in_flight(&self.generation())
    }

    /// Make sure the collection is loaded, loading it if needed.
    ///
    /// Safe to call from everywhere at once: concurrent callers share a single load, and once the
    /// collection is loaded this returns immediately.
    pub async fn ensure_loaded(&self) {
        let generation = self.generation();
        if !self.inner.flight.is_in_flight(&generation) && self.inner.state.current().loaded {
            return;
        }

        let this = self.clone();
        self.inner
            .flight
            .run(generation, move || async move { this.load(generation).await })
            .await
    }

    /// Refetch everything and replace the cache wholesale.
    ///
    /// A load already in flight is allowed to finish first, so only one fetch runs at a time.
    pub async fn refresh(&self) {
        let generation = self.generation();
        if let Some(pending) = self.inner.flight.in_flight(&generation) {
            pending.await;
        }
        if !self.is_current(generation) {
            return;
        }

        let this = self.clone();
        self.inner
            .flight
            .run(generation, move || async move {
                this.full_fetch(generation).await
            })
            .await
    }

    pub(crate) fn generation(&self) -> u64 {
        self.inner.generation.get()
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.get() == generation
    }

    fn publish(&self, generation: u64, next: CollectionState) -> bool {
        if !self.is_current(generation) {
            log::debug!("Dropping a load result from an abandoned session");
            return false;
        }
        self.inner.state.replace(next);
        true
    }

    async fn load(&self, generation: u64) {
        match self.read_cache().await {
            Some((cached, token)) => self.delta_sync(generation, cached, token).await,
            None => self.full_fetch(generation).await,
        }
    }

    /// Cached items and token, if the cache is readable and both are present.
    async fn read_cache(&self) -> Option<(Vec<Item>, SyncToken)> {
        let cache = &self.inner.cache;
        let items = cache
            .get_all()
            .await
            .inspect_err(|e| log::warn!("Cache unreadable, loading from the server: {e}"))
            .ok()?;
        let token = cache
            .sync_token()
            .await
            .inspect_err(|e| log::warn!("Sync token unreadable, loading from the server: {e}"))
            .ok()
            .flatten();

        match token {
            Some(token) if !items.is_empty() => Some((items, token)),
            _ => {
                log::info!("No usable cache ({} items), doing a full fetch", items.len());
                None
            }
        }
    }

    async fn delta_sync(&self, generation: u64, cached: Vec<Item>, token: SyncToken) {
        log::info!(
            "Serving {} cached items, requesting changes since {token}",
            cached.len()
        );
        // show the cached collection while the delta is in flight
        let cached: Vector<Item> = cached.into_iter().collect();
        if !self.publish(generation, CollectionState::loaded(cached)) {
            return;
        }

        let delta = match self.inner.api.fetch_delta(&token).await {
            Ok(delta) => delta,
            Err(e) => {
                log::warn!("Delta sync failed, falling back to a full fetch: {e}");
                return self.full_fetch(generation).await;
            }
        };
        if !self.is_current(generation) {
            return;
        }

        // merge into what is live now, which may already include push events
        let current = self.inner.state.current();
        let merged = current.items.as_ref().and_then(|items| delta.apply_to(items));
        let Some(merged) = merged else {
            log::info!("Delta can't be trusted, falling back to a full fetch");
            return self.full_fetch(generation).await;
        };

        log::info!(
            "Delta sync applied: {} updated, {} deleted, {} total",
            delta.updated.len(),
            delta.deleted_ids.len(),
            merged.len()
        );
        self.publish(generation, CollectionState::loaded(merged));
        if let Err(e) = self.persist_delta(generation, &delta).await {
            log::warn!("Failed to write the delta to the cache: {e}");
        }
    }

    async fn full_fetch(&self, generation: u64) {
        let attempts = self.inner.config.fetch_attempts();
        let mut attempt = 1;
        let snapshot = loop {
            match self.inner.api.fetch_all().await {
                Ok(snapshot) => break snapshot,
                Err(e) if attempt < attempts => {
                    log::warn!("Full fetch attempt {attempt}/{attempts} failed: {e}");
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("Full fetch failed after {attempts} attempt(s): {e}");
                    // keep whatever items we already have on screen
                    let current = self.inner.state.current();
                    self.publish(generation, current.with_error(e.to_string()));
                    return;
                }
            }
            if !self.is_current(generation) {
                return;
            }
        };

        let items: Vector<Item> = snapshot.items.iter().cloned().collect();
        log::info!("Full fetch loaded {} items", items.len());
        if !self.publish(generation, CollectionState::loaded(items)) {
            return;
        }
        if let Err(e) = self.replace_cache(generation, &snapshot).await {
            log::warn!("Failed to replace the cache after a full fetch: {e}");
        }
    }

    async fn replace_cache(&self, generation: u64, snapshot: &Snapshot) -> Result<(), CacheError> {
        let cache = &self.inner.cache;
        if !self.is_current(generation) {
            return Ok(());
        }
        cache.clear().await?;
        if !self.is_current(generation) {
            return Ok(());
        }
        cache.put_all(&snapshot.items).await?;

        match &snapshot.sync_token {
            Some(token) if self.is_current(generation) => cache.set_sync_token(token).await,
            Some(_) => Ok(()),
            None => {
                log::warn!("Server sent no sync token; the next load will be a full fetch");
                Ok(())
            }
        }
    }

    async fn persist_delta(&self, generation: u64, delta: &Delta) -> Result<(), CacheError> {
        self.persist_changes(generation, &delta.updated, &delta.deleted_ids)
            .await?;
        // the token only moves once the data it describes is stored
        if self.is_current(generation) {
            self.inner.cache.set_sync_token(&delta.sync_token).await?;
        }
        Ok(())
    }

    async fn persist_changes(
        &self,
        generation: u64,
        upserted: &[Item],
        removed: &[ItemId],
    ) -> Result<(), CacheError> {
        let cache = &self.inner.cache;
        if !upserted.is_empty() && self.is_current(generation) {
            cache.put_all(upserted).await?;
        }
        if !removed.is_empty() && self.is_current(generation) {
            cache.delete_many(removed).await?;
        }
        Ok(())
    }

    /// Mirror a state change into the cache. Failures are logged, never surfaced.
    pub(crate) async fn write_through(
        &self,
        generation: u64,
        upserted: &[Item],
        removed: &[ItemId],
    ) {
        if let Err(e) = self.persist_changes(generation, upserted, removed).await {
            log::warn!("Failed to write changes through to the cache: {e}");
        }
    }
}
