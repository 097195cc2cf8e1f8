//! The `Dataset` scope-boundary entity (§3). The versioning core treats
//! `dataset_id` as an opaque grouping key; creation, deletion, RBAC and
//! tagging are external responsibilities (§1 "out of scope") — this module
//! only fixes the id type every other store keys on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(pub i64);

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for DatasetId {
    fn from(value: i64) -> Self {
        DatasetId(value)
    }
}

/// Minimal metadata the versioning core is handed about a dataset; it never
/// mutates this, only reads `id` off it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: String,
    pub description: String,
    pub created_by: i64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}
