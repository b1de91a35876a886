use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::data_model::{FileId, ItemId, ItemPatch, ReadingProgress, ShelfId};

/// A write the client asks the server to make.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Mutation {
    #[serde(rename_all = "camelCase")]
    AssignShelves {
        item_ids: Vec<ItemId>,
        assign: BTreeSet<ShelfId>,
        unassign: BTreeSet<ShelfId>,
    },
    #[serde(rename_all = "camelCase")]
    SaveProgress {
        item_id: ItemId,
        progress: ReadingProgress,
    },
    #[serde(rename_all = "camelCase")]
    UpdateReadStatus {
        item_ids: Vec<ItemId>,
        status: String,
    },
    /// `rating: None` resets the rating.
    #[serde(rename_all = "camelCase")]
    UpdateRating {
        item_ids: Vec<ItemId>,
        rating: Option<u8>,
    },
    /// Lock or unlock metadata fields against automatic refreshes, by field name.
    #[serde(rename_all = "camelCase")]
    SetFieldLocks {
        item_ids: Vec<ItemId>,
        locks: BTreeMap<String, bool>,
    },
    #[serde(rename_all = "camelCase")]
    AttachFiles {
        item_id: ItemId,
        file_ids: Vec<FileId>,
    },
    #[serde(rename_all = "camelCase")]
    DetachFiles {
        item_id: ItemId,
        file_ids: Vec<FileId>,
    },
    #[serde(rename_all = "camelCase")]
    DeleteItems { item_ids: Vec<ItemId> },
}

impl Mutation {
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::AssignShelves { .. } => "assign shelves",
            Mutation::SaveProgress { .. } => "save progress",
            Mutation::UpdateReadStatus { .. } => "update read status",
            Mutation::UpdateRating { .. } => "update rating",
            Mutation::SetFieldLocks { .. } => "set field locks",
            Mutation::AttachFiles { .. } => "attach files",
            Mutation::DetachFiles { .. } => "detach files",
            Mutation::DeleteItems { .. } => "delete items",
        }
    }
}

/// The server's answer to a mutation: what it actually stored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationReceipt {
    #[serde(default)]
    pub confirmed: Vec<ItemPatch>,
    #[serde(default)]
    pub rejected: Vec<Rejection>,
    #[serde(default)]
    pub removed: Vec<ItemId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub id: ItemId,
    pub reason: String,
}

/// What a mutation did to the local collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutationOutcome {
    /// Confirmed items that were merged. Confirmations for items we don't hold are skipped.
    pub applied: Vec<ItemId>,
    pub rejected: Vec<Rejection>,
    pub removed: Vec<ItemId>,
}

impl MutationOutcome {
    pub fn is_partial(&self) -> bool {
        !self.rejected.is_empty()
    }
}
