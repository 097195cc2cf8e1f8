//! Deterministic serialization and hashing (spec §4.1).
//!
//! Two distinct canonical forms are defined here, because the spec asks for
//! two different orderings:
//!
//! - **Row canonicalization** emits the row's top-level keys in the order the
//!   table's schema declares them (not sorted) but sorts keys of any nested
//!   composite value. This is what `row_hash` is computed over.
//! - **Commit-id canonicalization** (§6 normative pseudocode) sorts *every*
//!   object's keys recursively, including the top-level envelope. This is
//!   what `CommitBuilder` uses to derive a `commit_id`.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value as Json;

use crate::errors::{Result, RowledgerError};
use crate::hash::RowHash;
use crate::value::RowValue;

/// Serialize `row` as a JSON object with keys in `column_order`, recursing
/// into nested values with sorted keys, then return the exact bytes (no
/// trailing whitespace, minimal separators) that would be hashed.
pub fn canonicalize_row(row: &RowValue, column_order: &[String]) -> Result<Vec<u8>> {
    if row.0.len() != column_order.len() {
        return Err(RowledgerError::InvalidInput(format!(
            "row has {} columns but schema declares {}",
            row.0.len(),
            column_order.len()
        )));
    }
    let mut obj = serde_json::Map::with_capacity(column_order.len());
    for column in column_order {
        let value = row.get(column).ok_or_else(|| {
            RowledgerError::InvalidInput(format!("row is missing schema column `{column}`"))
        })?;
        obj.insert(column.clone(), value.to_canonical_json());
    }
    // serde_json's `Map` (built with the `preserve_order` feature) serializes
    // in insertion order, i.e. `column_order` here, and `to_vec` uses the
    // compact formatter: no extra whitespace, `:`/`,` only.
    serde_json::to_vec(&Json::Object(obj))
        .map_err(|e| RowledgerError::InvalidInput(format!("row does not serialize: {e}")))
}

/// Compute the row's content fingerprint: SHA-256 of [`canonicalize_row`].
pub fn row_hash(row: &RowValue, column_order: &[String]) -> Result<RowHash> {
    let bytes = canonicalize_row(row, column_order)?;
    Ok(RowHash::of(&bytes))
}

/// Recursively sort every JSON object's keys, leaving arrays and scalars
/// untouched. Used for the commit-id envelope, which — unlike a row — has no
/// schema to dictate top-level key order, so the spec sorts everything.
pub fn sort_keys_recursive(value: &Json) -> Json {
    match value {
        Json::Object(map) => {
            let sorted: BTreeMap<String, Json> = map
                .iter()
                .map(|(k, v)| (k.clone(), sort_keys_recursive(v)))
                .collect();
            let mut out = serde_json::Map::with_capacity(sorted.len());
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Json::Object(out)
        }
        Json::Array(items) => Json::Array(items.iter().map(sort_keys_recursive).collect()),
        scalar => scalar.clone(),
    }
}

/// Serialize `value` as a [`sort_keys_recursive`] canonical JSON document:
/// compact separators, sorted keys, no trailing whitespace.
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_value(value)
        .map_err(|e| RowledgerError::InvalidInput(format!("does not serialize: {e}")))?;
    let sorted = sort_keys_recursive(&json);
    serde_json::to_vec(&sorted)
        .map_err(|e| RowledgerError::InvalidInput(format!("does not serialize: {e}")))
}
