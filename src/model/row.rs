//! The `Row` entity (§3): content-addressed, immutable, shared by every
//! commit whose manifest references it.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::hash::RowHash;

/// A stored row: its fingerprint and the canonical JSON bytes it fingerprints.
/// `data` is kept as the already-canonicalized `serde_json::Value` — the Row
/// Store never re-derives it, only persists and returns it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub row_hash: RowHash,
    pub data: Json,
}

impl Row {
    pub fn new(row_hash: RowHash, data: Json) -> Self {
        Row { row_hash, data }
    }
}
