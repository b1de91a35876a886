use chrono::{DateTime, SecondsFormat, Utc};
use im::Vector;
use serde::{Deserialize, Serialize};

use crate::data_model::{Item, ItemId, ItemsEditor};

/// The server instant through which the cache is known to be correct.
///
/// Opaque to the client; only ever produced from server responses.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncToken(String);

impl SyncToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Token for a server-reported instant.
    pub fn from_server_time(time: DateTime<Utc>) -> Self {
        Self(time.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SyncToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a full fetch.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub items: Vec<Item>,
    /// `None` when the server didn't say what time it was; the cache then can't be delta-synced.
    pub sync_token: Option<SyncToken>,
}

/// Everything that changed on the server since a token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    #[serde(default)]
    pub updated: Vec<Item>,
    #[serde(default)]
    pub deleted_ids: Vec<ItemId>,
    /// How many items the server says the collection holds after this delta.
    pub total_count: usize,
    pub sync_token: SyncToken,
}

impl Delta {
    /// Upsert `updated` and drop `deleted_ids`.
    ///
    /// Returns `None` when the result doesn't have `total_count` items: the server changed
    /// something a delta can't describe, and a full fetch is needed.
    pub fn apply_to(&self, items: &Vector<Item>) -> Option<Vector<Item>> {
        let mut editor = ItemsEditor::new(items.clone());
        for item in &self.updated {
            editor.upsert(item.clone());
        }
        editor.remove(&self.deleted_ids);

        if editor.len() != self.total_count {
            log::info!(
                "Delta reconciliation mismatch: {} items after merge, server reports {}",
                editor.len(),
                self.total_count
            );
            return None;
        }
        Some(editor.finish())
    }
}
