use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Full-fetch attempts before the failure is surfaced on the collection state.
    pub max_fetch_attempts: u32,
    /// Most push events folded into a single state transition by the push bridge.
    pub push_batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_fetch_attempts: 3,
            push_batch_size: 64,
        }
    }
}

impl SyncConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub(crate) fn fetch_attempts(&self) -> u32 {
        self.max_fetch_attempts.max(1)
    }

    pub(crate) fn batch_size(&self) -> usize {
        self.push_batch_size.max(1)
    }
}
