use serde::{Deserialize, Serialize};

/// Per-item failure inside a batch response. Batch operations report these
/// alongside their counters instead of aborting sibling items, so callers
/// can tell "fully succeeded" from "partially succeeded" from "fully
/// failed".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemError {
    pub id: String,
    pub error: String,
}

impl ItemError {
    pub fn new(id: impl Into<String>, error: impl Into<String>) -> Self {
        ItemError {
            id: id.into(),
            error: error.into(),
        }
    }
}
