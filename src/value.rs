//! The tagged-variant value type rows are made of.
//!
//! §9 calls for "schema-tagged values" in place of the source's dynamically
//! typed mappings: a column's cell is one of these variants, never a bare
//! `serde_json::Value` whose type could silently drift between rows.
//! Column type *inference* is a read-path concern (statistics/profiling,
//! out of scope here); this module only fixes what a cell *can be*.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// One cell value, or one element of a composite cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<CellValue>),
    Object(BTreeMap<String, CellValue>),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Render this value as a `serde_json::Value`, sorting object keys
    /// recursively as the canonicalization rules (§4.1) require. Arrays keep
    /// their element order — only key order within an object is normalized.
    pub fn to_canonical_json(&self) -> serde_json::Value {
        match self {
            CellValue::Null => serde_json::Value::Null,
            CellValue::Bool(b) => serde_json::Value::Bool(*b),
            CellValue::Integer(i) => serde_json::Value::Number(Number::from(*i)),
            CellValue::Float(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                // NaN/Infinity have no canonical JSON number form; fall back to
                // a string sentinel so the row still hashes deterministically.
                .unwrap_or_else(|| serde_json::Value::String(format!("{f}"))),
            CellValue::String(s) => serde_json::Value::String(s.clone()),
            CellValue::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
            CellValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(CellValue::to_canonical_json).collect())
            }
            CellValue::Object(map) => {
                // `BTreeMap` already iterates in sorted key order.
                let mut obj = serde_json::Map::new();
                for (k, v) in map {
                    obj.insert(k.clone(), v.to_canonical_json());
                }
                serde_json::Value::Object(obj)
            }
        }
    }
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A total order so sorted-column samples and quickcheck shrinking behave;
/// follows the variant declaration order above (`Null` sorts first).
impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &CellValue) -> u8 {
            match v {
                CellValue::Null => 0,
                CellValue::Bool(_) => 1,
                CellValue::Integer(_) => 2,
                CellValue::Float(_) => 3,
                CellValue::String(_) => 4,
                CellValue::Timestamp(_) => 5,
                CellValue::Array(_) => 6,
                CellValue::Object(_) => 7,
            }
        }
        match (self, other) {
            (CellValue::Null, CellValue::Null) => Ordering::Equal,
            (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
            (CellValue::Integer(a), CellValue::Integer(b)) => a.cmp(b),
            (CellValue::Float(a), CellValue::Float(b)) => a.total_cmp(b),
            (CellValue::String(a), CellValue::String(b)) => a.cmp(b),
            (CellValue::Timestamp(a), CellValue::Timestamp(b)) => a.cmp(b),
            (CellValue::Array(a), CellValue::Array(b)) => a.cmp(b),
            (CellValue::Object(a), CellValue::Object(b)) => a.cmp(b),
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }
}

/// One logical row: an ordered list of `(column, value)` pairs in the order
/// the table's schema declares them. Ordering is part of the type because
/// canonicalization (§4.1) serializes the row's JSON object with keys in
/// schema-declared order, not lexicographic order — only nested composite
/// values sort their keys.
#[derive(Debug, Clone, PartialEq)]
pub struct RowValue(pub Vec<(String, CellValue)>);

impl RowValue {
    pub fn new(columns: Vec<(String, CellValue)>) -> Self {
        RowValue(columns)
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.0.iter().find(|(name, _)| name == column).map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_object_keys_sort_on_canonicalization() {
        let mut obj = BTreeMap::new();
        obj.insert("b".to_string(), CellValue::Integer(2));
        obj.insert("a".to_string(), CellValue::Integer(1));
        let json = CellValue::Object(obj).to_canonical_json();
        let rendered = serde_json::to_string(&json).unwrap();
        assert_eq!(rendered, r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn array_element_order_is_preserved() {
        let arr = CellValue::Array(vec![CellValue::Integer(3), CellValue::Integer(1)]);
        let json = arr.to_canonical_json();
        assert_eq!(serde_json::to_string(&json).unwrap(), "[3,1]");
    }

    #[test]
    fn null_and_empty_string_are_distinct() {
        assert_ne!(
            CellValue::Null.to_canonical_json(),
            CellValue::String(String::new()).to_canonical_json()
        );
    }
}
