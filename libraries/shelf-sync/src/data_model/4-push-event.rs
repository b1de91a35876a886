use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::data_model::{Item, ItemId, ItemPatch};

/// A change made somewhere else (another session, a background job) and pushed to us.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PushEvent {
    Created {
        item: Item,
    },
    Removed {
        ids: Vec<ItemId>,
    },
    Updated {
        patch: ItemPatch,
    },
    BatchUpdated {
        patches: Vec<ItemPatch>,
    },
    #[serde(rename_all = "camelCase")]
    MetadataPatched {
        id: ItemId,
        metadata: Map<String, Value>,
    },
    #[serde(rename_all = "camelCase")]
    CoverPatched {
        id: ItemId,
        cover_version: u64,
    },
}

/// What a push event does to the collection, in terms of the shared merge primitives.
pub(crate) enum PushChange {
    Upsert(Item),
    Patch(ItemPatch),
    Remove(Vec<ItemId>),
}

impl PushEvent {
    pub(crate) fn into_changes(self) -> Vec<PushChange> {
        match self {
            PushEvent::Created { item } => vec![PushChange::Upsert(item)],
            PushEvent::Removed { ids } => vec![PushChange::Remove(ids)],
            PushEvent::Updated { patch } => vec![PushChange::Patch(patch)],
            PushEvent::BatchUpdated { patches } => {
                patches.into_iter().map(PushChange::Patch).collect()
            }
            PushEvent::MetadataPatched { id, metadata } => {
                vec![PushChange::Patch(ItemPatch::with_metadata(id, metadata))]
            }
            PushEvent::CoverPatched { id, cover_version } => {
                vec![PushChange::Patch(ItemPatch::with_cover_version(
                    id,
                    cover_version,
                ))]
            }
        }
    }
}
