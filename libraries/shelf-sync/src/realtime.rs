//! Push events from other sessions, merged with the same id-keyed rules as deltas.

use std::collections::BTreeSet;

use futures::{Stream, StreamExt};

use crate::api::LibraryApi;
use crate::cache::ItemCache;
use crate::data_model::{Item, ItemId, ItemsEditor, PushChange, PushEvent};
use crate::sync::Library;

impl<A, C> Library<A, C>
where
    A: LibraryApi + 'static,
    C: ItemCache + 'static,
{
    /// Consume push events until the stream ends.
    ///
    /// Events that are already waiting when we get to them are applied together, in arrival
    /// order, as one state transition.
    pub async fn run_push_bridge<S>(&self, events: S)
    where
        S: Stream<Item = PushEvent>,
    {
        let mut batches = std::pin::pin!(events.ready_chunks(self.inner.config.batch_size()));
        while let Some(batch) = batches.next().await {
            log::debug!("Applying {} push event(s)", batch.len());
            self.apply_push_batch(batch).await;
        }
        log::info!("Push event stream ended");
    }

    pub async fn apply_push(&self, event: PushEvent) {
        self.apply_push_batch(vec![event]).await
    }

    /// Apply `events` in order, publish the result once and write it through to the cache.
    pub async fn apply_push_batch(&self, events: Vec<PushEvent>) {
        if events.is_empty() {
            return;
        }
        let generation = self.generation();
        let current = self.inner.state.current();

        let Some(items) = current.items.clone() else {
            // nothing to merge into yet: removals can go straight to the cache, everything else
            // arrives with the next delta
            let removed: Vec<ItemId> = events
                .into_iter()
                .flat_map(|event| match event {
                    PushEvent::Removed { ids } => ids,
                    _ => Vec::new(),
                })
                .collect();
            log::debug!(
                "Collection not loaded; applying {} push removal(s) to the cache only",
                removed.len()
            );
            self.write_through(generation, &[], &removed).await;
            return;
        };

        let mut editor = ItemsEditor::new(items);
        let mut touched = BTreeSet::new();
        let mut removed = BTreeSet::new();
        for change in events.into_iter().flat_map(PushEvent::into_changes) {
            match change {
                PushChange::Upsert(item) => {
                    removed.remove(&item.id);
                    touched.insert(item.id);
                    editor.upsert(item);
                }
                PushChange::Patch(patch) => {
                    if !editor.contains(patch.id) {
                        log::debug!("Push update for unknown item {}, creating it", patch.id);
                    }
                    removed.remove(&patch.id);
                    touched.insert(patch.id);
                    editor.patch(patch);
                }
                PushChange::Remove(ids) => {
                    editor.remove(&ids);
                    for id in ids {
                        touched.remove(&id);
                        removed.insert(id);
                    }
                }
            }
        }

        let upserted: Vec<Item> = touched
            .iter()
            .filter_map(|&id| editor.get(id).cloned())
            .collect();
        let removed: Vec<ItemId> = removed.into_iter().collect();
        self.inner.state.replace(current.with_items(editor.finish()));
        self.write_through(generation, &upserted, &removed).await;
    }
}
