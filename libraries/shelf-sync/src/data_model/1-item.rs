use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type ItemId = i64;
pub type ShelfId = i64;
pub type FileId = i64;

/// One record of the collection.
///
/// Only the fields the sync core has to merge are typed. Everything else the server sends is kept
/// in `extra` and written back out untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_rating: Option<u8>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_version: Option<u64>,
    #[serde(default)]
    pub files: Vec<FileRef>,
    #[serde(default)]
    pub shelves: BTreeSet<ShelfId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ReadingProgress>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub id: FileId,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingProgress {
    /// Reader-specific location (a CFI, a page number, a timestamp...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub percentage: f32,
}

/// Server-confirmed changes to one item. `None` means "leave as is".
///
/// `metadata` and `extra` are merged key by key; every other field is replaced wholesale.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_status: Option<String>,
    /// `Some(None)` clears the rating.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub personal_rating: Option<Option<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shelves: Option<BTreeSet<ShelfId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ReadingProgress>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A field that is present in the JSON is `Some`, even when its value is `null`.
fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl Item {
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            read_status: None,
            personal_rating: None,
            metadata: Map::new(),
            cover_version: None,
            files: Vec::new(),
            shelves: BTreeSet::new(),
            progress: None,
            extra: Map::new(),
        }
    }

    /// Apply `patch` on top of this item. Fields the patch doesn't mention are left untouched.
    pub fn merged(mut self, patch: ItemPatch) -> Self {
        debug_assert_eq!(self.id, patch.id);
        let ItemPatch {
            id: _,
            read_status,
            personal_rating,
            metadata,
            cover_version,
            files,
            shelves,
            progress,
            extra,
        } = patch;

        if let Some(read_status) = read_status {
            self.read_status = Some(read_status);
        }
        if let Some(personal_rating) = personal_rating {
            self.personal_rating = personal_rating;
        }
        if let Some(metadata) = metadata {
            self.metadata.extend(metadata);
        }
        if let Some(cover_version) = cover_version {
            self.cover_version = Some(cover_version);
        }
        if let Some(files) = files {
            self.files = files;
        }
        if let Some(shelves) = shelves {
            self.shelves = shelves;
        }
        if let Some(progress) = progress {
            self.progress = Some(progress);
        }
        self.extra.extend(extra);
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(Value::as_str)
    }
}

impl From<ItemPatch> for Item {
    fn from(patch: ItemPatch) -> Self {
        Item::new(patch.id).merged(patch)
    }
}

impl ItemPatch {
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn with_metadata(id: ItemId, metadata: Map<String, Value>) -> Self {
        Self {
            metadata: Some(metadata),
            ..Self::new(id)
        }
    }

    pub fn with_cover_version(id: ItemId, cover_version: u64) -> Self {
        Self {
            cover_version: Some(cover_version),
            ..Self::new(id)
        }
    }
}
