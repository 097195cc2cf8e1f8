//! Commit Schema entity (§3, §4.5): one per commit, one column list per table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::manifest::TableKey;

/// Coarse column type tags. Inference from sampled values is a read-path
/// concern (statistics/profiling, out of scope for the versioning engine);
/// this enum only names what the inferred/declared type *can be*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Null,
    Bool,
    Integer,
    Float,
    String,
    Timestamp,
    Array,
    Object,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

/// The ordered column list for one table within one commit. Column order
/// here *is* the row-canonicalization order (§4.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TableSchema {
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn column_order(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// `(commit_id, schema_definition)` (§3): one [`TableSchema`] per table key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CommitSchema {
    pub tables: BTreeMap<TableKey, TableSchema>,
}

impl CommitSchema {
    pub fn table_keys(&self) -> Vec<TableKey> {
        self.tables.keys().cloned().collect()
    }
}
