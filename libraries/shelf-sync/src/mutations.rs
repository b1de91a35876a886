//! Writes: server first, then merge exactly what the server confirmed.

use std::collections::{BTreeMap, BTreeSet};

use crate::api::LibraryApi;
use crate::cache::ItemCache;
use crate::data_model::{
    FileId, Item, ItemId, ItemsEditor, Mutation, MutationOutcome, MutationReceipt,
    ReadingProgress, ShelfId,
};
use crate::error::MutationError;
use crate::sync::Library;

#[derive(Clone, Debug, PartialEq)]
pub enum ProgressSave {
    /// This call sent the request (and any newer positions queued while it was in flight).
    Sent(MutationOutcome),
    /// A save for the same item was already in flight; this position will go out after it, unless
    /// an even newer one replaces it first.
    Coalesced,
}

impl<A, C> Library<A, C>
where
    A: LibraryApi + 'static,
    C: ItemCache + 'static,
{
    /// Send `mutation` and merge the server-confirmed result into the collection.
    ///
    /// Nothing changes locally if the request fails. Items the server rejected are reported in the
    /// outcome while the rest of the batch is still applied.
    pub async fn mutate(&self, mutation: Mutation) -> Result<MutationOutcome, MutationError> {
        let generation = self.generation();
        let receipt = self
            .inner
            .api
            .send_mutation(&mutation)
            .await
            .inspect_err(|e| log::warn!("Failed to {}: {e}", mutation.kind()))?;

        if !self.is_current(generation) {
            log::debug!("Dropping the result of {}: session changed", mutation.kind());
            return Err(MutationError::SessionChanged);
        }
        if !receipt.rejected.is_empty() {
            log::warn!(
                "Server rejected {} item(s) in {}",
                receipt.rejected.len(),
                mutation.kind()
            );
        }

        Ok(self.apply_receipt(generation, receipt).await)
    }

    async fn apply_receipt(&self, generation: u64, receipt: MutationReceipt) -> MutationOutcome {
        let MutationReceipt {
            confirmed,
            rejected,
            removed,
        } = receipt;
        let mut outcome = MutationOutcome {
            applied: Vec::new(),
            rejected,
            removed: removed.clone(),
        };

        let current = self.inner.state.current();
        let Some(items) = current.items.clone() else {
            log::debug!("Collection not loaded yet; the next sync brings the confirmed values");
            return outcome;
        };

        let mut editor = ItemsEditor::new(items);
        for patch in confirmed {
            if editor.contains(patch.id) {
                outcome.applied.push(patch.id);
                editor.patch(patch);
            } else {
                log::debug!("Server confirmed a change to item {} we don't have", patch.id);
            }
        }
        let removed_any = editor.remove(&removed);
        if outcome.applied.is_empty() && !removed_any {
            return outcome;
        }

        let changed: Vec<Item> = outcome
            .applied
            .iter()
            .filter_map(|&id| editor.get(id).cloned())
            .collect();
        self.inner.state.replace(current.with_items(editor.finish()));
        self.write_through(generation, &changed, &removed).await;
        outcome
    }

    pub async fn assign_shelves(
        &self,
        item_ids: Vec<ItemId>,
        assign: BTreeSet<ShelfId>,
        unassign: BTreeSet<ShelfId>,
    ) -> Result<MutationOutcome, MutationError> {
        self.mutate(Mutation::AssignShelves {
            item_ids,
            assign,
            unassign,
        })
        .await
    }

    pub async fn update_read_status(
        &self,
        item_ids: Vec<ItemId>,
        status: impl Into<String>,
    ) -> Result<MutationOutcome, MutationError> {
        self.mutate(Mutation::UpdateReadStatus {
            item_ids,
            status: status.into(),
        })
        .await
    }

    pub async fn update_rating(
        &self,
        item_ids: Vec<ItemId>,
        rating: u8,
    ) -> Result<MutationOutcome, MutationError> {
        self.mutate(Mutation::UpdateRating {
            item_ids,
            rating: Some(rating),
        })
        .await
    }

    pub async fn reset_rating(
        &self,
        item_ids: Vec<ItemId>,
    ) -> Result<MutationOutcome, MutationError> {
        self.mutate(Mutation::UpdateRating {
            item_ids,
            rating: None,
        })
        .await
    }

    pub async fn set_field_locks(
        &self,
        item_ids: Vec<ItemId>,
        locks: BTreeMap<String, bool>,
    ) -> Result<MutationOutcome, MutationError> {
        self.mutate(Mutation::SetFieldLocks { item_ids, locks }).await
    }

    pub async fn attach_files(
        &self,
        item_id: ItemId,
        file_ids: Vec<FileId>,
    ) -> Result<MutationOutcome, MutationError> {
        self.mutate(Mutation::AttachFiles { item_id, file_ids }).await
    }

    pub async fn detach_files(
        &self,
        item_id: ItemId,
        file_ids: Vec<FileId>,
    ) -> Result<MutationOutcome, MutationError> {
        self.mutate(Mutation::DetachFiles { item_id, file_ids }).await
    }

    pub async fn delete_items(
        &self,
        item_ids: Vec<ItemId>,
    ) -> Result<MutationOutcome, MutationError> {
        self.mutate(Mutation::DeleteItems { item_ids }).await
    }

    /// Save a reading position. Meant to be called on every page turn.
    ///
    /// At most one save per item is in flight; positions arriving meanwhile are collapsed and only
    /// the newest is sent after it.
    pub async fn save_progress(
        &self,
        item_id: ItemId,
        progress: ReadingProgress,
    ) -> Result<ProgressSave, MutationError> {
        let Some((lease, mut progress)) = self.inner.progress.admit(item_id, progress) else {
            log::debug!("Queued progress for item {item_id} behind the save in flight");
            return Ok(ProgressSave::Coalesced);
        };

        // dropping this future drops the lease, so the next save for the item goes straight out
        let generation = self.generation();
        loop {
            let result = self
                .mutate(Mutation::SaveProgress { item_id, progress })
                .await;
            if !self.is_current(generation) {
                // the reset already cleared our slot; the lease can't touch the next session's
                return Err(MutationError::SessionChanged);
            }

            match lease.settle() {
                Some(next) => {
                    if let Err(e) = &result {
                        log::warn!(
                            "Progress save for item {item_id} failed, sending the newer one: {e}"
                        );
                    }
                    progress = next;
                }
                None => return result.map(ProgressSave::Sent),
            }
        }
    }
}
