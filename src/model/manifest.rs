//! Manifest entries and the logical row id address scheme (§3, §6).
//!
//! The spec documents two formats seen in the source (`"table:idx"` and
//! `"table_idx"`) and requires an implementation pick exactly one. This crate
//! only ever writes and reads `"{table_key}:{index}"` with an unpadded
//! base-10 `index`, ordered by `(table_key, index)` as a typed tuple rather
//! than by string comparison (see `SPEC_FULL.md`, "Open questions").

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, RowledgerError};
use crate::hash::RowHash;

static TABLE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_ -]{0,62}$").expect("valid regex"));

/// `"primary"` for single-table sources, the sheet name for multi-sheet
/// sources. Validated against the spec's `^[A-Za-z_][A-Za-z0-9_ -]{0,62}$`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableKey(String);

impl TableKey {
    pub const PRIMARY: &'static str = "primary";

    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if !TABLE_KEY_RE.is_match(&raw) {
            return Err(RowledgerError::InvalidInput(format!(
                "`{raw}` is not a valid table key"
            )));
        }
        Ok(TableKey(raw))
    }

    pub fn primary() -> Self {
        TableKey(Self::PRIMARY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TableKey {
    type Error = RowledgerError;

    fn try_from(value: String) -> Result<Self> {
        TableKey::new(value)
    }
}

impl From<TableKey> for String {
    fn from(value: TableKey) -> Self {
        value.0
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The table-qualified address of a row within a commit: `"{table_key}:{i}"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogicalRowId {
    pub table_key: TableKey,
    pub index: u64,
}

impl LogicalRowId {
    pub fn new(table_key: TableKey, index: u64) -> Self {
        LogicalRowId { table_key, index }
    }

    /// Sort key used everywhere pagination needs `ORDER BY logical_row_id`:
    /// `(table_key, index)`, never the formatted string.
    pub fn sort_key(&self) -> (&str, u64) {
        (self.table_key.as_str(), self.index)
    }
}

impl fmt::Display for LogicalRowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_key, self.index)
    }
}

impl std::str::FromStr for LogicalRowId {
    type Err = RowledgerError;

    fn from_str(s: &str) -> Result<Self> {
        let (table, idx) = s.rsplit_once(':').ok_or_else(|| {
            RowledgerError::InvalidInput(format!("`{s}` is not a valid logical row id"))
        })?;
        let index: u64 = idx.parse().map_err(|_| {
            RowledgerError::InvalidInput(format!(
                "`{s}` has a non-integer suffix; mixed-format repositories are not supported"
            ))
        })?;
        Ok(LogicalRowId {
            table_key: TableKey::new(table)?,
            index,
        })
    }
}

/// One `(commit_id, logical_row_id, row_hash)` binding (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub logical_row_id: LogicalRowId,
    pub row_hash: RowHash,
}
