use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single extracted field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Scalar field (e.g. a quote's text)
    Single(String),

    /// Multi-valued field (e.g. tags)
    Many(Vec<String>),
}

impl FieldValue {
    /// Canonical string form, used for identity comparison and CSV cells.
    /// Multi-valued fields join with the fixed `|` separator.
    pub fn joined(&self) -> String {
        match self {
            FieldValue::Single(value) => value.clone(),
            FieldValue::Many(values) => values.join("|"),
        }
    }

    /// Whether the value carries no content
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Single(value) => value.is_empty(),
            FieldValue::Many(values) => values.is_empty(),
        }
    }
}

/// One extracted item: an ordered mapping of field names to values.
///
/// Field order follows the schema's declaration order and is preserved
/// through deduplication and export. Records are immutable once produced
/// by the extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a field, keeping insertion order
    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push((name.into(), value));
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Iterate fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Stable first-occurrence deduplication by the named identity field.
///
/// Keeps the first record for each distinct key value, preserves the
/// original order, and runs in O(n) with a seen-set of key values. Records
/// lacking the key field are kept as-is since they cannot collide on it.
pub fn dedupe_by_key(records: Vec<Record>, key: &str) -> Vec<Record> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(records.len());

    for record in records {
        match record.get(key) {
            Some(value) => {
                if seen.insert(value.joined()) {
                    kept.push(record);
                } else {
                    ::log::debug!("Dropping duplicate record for key `{}`", key);
                }
            }
            None => kept.push(record),
        }
    }

    kept
}
