//! Value trees: records with scalar fields and repeatable row slots.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::path::{FieldPath, PathSegment, RowId};
use crate::value::FieldValue;

/// Errors raised while importing a value tree from JSON
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("expected a JSON object at '{0}'")]
    NotAnObject(String),

    #[error("row {index} of slot '{slot}' is not a JSON object")]
    RowNotAnObject { slot: String, index: usize },
}

/// Ordered rows of one repeatable slot.
///
/// Rows live in an arena keyed by [`RowId`]; `order` alone decides display
/// position. Identities are minted from `next_id` and never reused.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowList {
    rows: BTreeMap<RowId, RecordValues>,
    order: Vec<RowId>,
    next_id: u64,
}

impl RowList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from row values, minting identities in order
    pub fn from_rows(rows: impl IntoIterator<Item = RecordValues>) -> Self {
        let mut list = Self::new();
        for row in rows {
            list.push(row);
        }
        list
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Row identities in display order
    pub fn ids(&self) -> &[RowId] {
        &self.order
    }

    pub fn get(&self, id: RowId) -> Option<&RecordValues> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: RowId) -> Option<&mut RecordValues> {
        self.rows.get_mut(&id)
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.rows.contains_key(&id)
    }

    /// Current display position of a row
    pub fn position(&self, id: RowId) -> Option<usize> {
        self.order.iter().position(|r| *r == id)
    }

    /// Rows in display order
    pub fn iter(&self) -> impl Iterator<Item = (RowId, &RecordValues)> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.rows.get(id).map(|row| (*id, row)))
    }

    /// Append a row and return its fresh identity
    pub fn push(&mut self, values: RecordValues) -> RowId {
        let id = self.mint();
        self.rows.insert(id, values);
        self.order.push(id);
        id
    }

    /// Insert a row at `index` (clamped to the current length)
    pub fn insert(&mut self, index: usize, values: RecordValues) -> RowId {
        let id = self.mint();
        self.rows.insert(id, values);
        let index = index.min(self.order.len());
        self.order.insert(index, id);
        id
    }

    /// Remove exactly the row with this identity. Other rows keep theirs.
    pub fn remove(&mut self, id: RowId) -> Option<RecordValues> {
        let removed = self.rows.remove(&id)?;
        self.order.retain(|r| *r != id);
        Some(removed)
    }

    /// Move a row to `index` (clamped). Returns false for unknown rows.
    pub fn move_to(&mut self, id: RowId, index: usize) -> bool {
        let Some(from) = self.position(id) else {
            return false;
        };
        self.order.remove(from);
        let index = index.min(self.order.len());
        self.order.insert(index, id);
        true
    }

    /// Same identities and order, transformed row values
    pub fn map_rows(&self, mut f: impl FnMut(RowId, &RecordValues) -> RecordValues) -> RowList {
        let rows = self
            .order
            .iter()
            .filter_map(|id| self.rows.get(id).map(|row| (*id, f(*id, row))))
            .collect();
        RowList {
            rows,
            order: self.order.clone(),
            next_id: self.next_id,
        }
    }

    fn mint(&mut self) -> RowId {
        self.next_id += 1;
        RowId::new(self.next_id)
    }
}

#[derive(Serialize)]
struct RowEntry<'a> {
    id: RowId,
    #[serde(flatten)]
    values: &'a RecordValues,
}

impl Serialize for RowList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for (id, values) in self.iter() {
            seq.serialize_element(&RowEntry { id, values })?;
        }
        seq.end()
    }
}

/// One record of a value tree: scalar fields plus named repeatable slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordValues {
    fields: BTreeMap<String, FieldValue>,
    slots: BTreeMap<String, RowList>,
}

impl RecordValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Builder-style slot setter
    pub fn with_slot(mut self, name: impl Into<String>, rows: RowList) -> Self {
        self.slots.insert(name.into(), rows);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> + '_ {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn slot(&self, name: &str) -> Option<&RowList> {
        self.slots.get(name)
    }

    pub fn slot_mut(&mut self, name: &str) -> Option<&mut RowList> {
        self.slots.get_mut(name)
    }

    /// Slot by name, created empty when absent
    pub fn ensure_slot(&mut self, name: &str) -> &mut RowList {
        self.slots.entry(name.to_string()).or_default()
    }

    pub fn slots(&self) -> impl Iterator<Item = (&str, &RowList)> + '_ {
        self.slots.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Record reached by `slot.#row` pairs; the empty slice is `self`.
    pub fn record_at(&self, segments: &[PathSegment]) -> Option<&RecordValues> {
        match segments {
            [] => Some(self),
            [PathSegment::Key(slot), PathSegment::Row(row), rest @ ..] => {
                self.slots.get(slot)?.get(*row)?.record_at(rest)
            }
            _ => None,
        }
    }

    pub fn record_at_mut(&mut self, segments: &[PathSegment]) -> Option<&mut RecordValues> {
        match segments {
            [] => Some(self),
            [PathSegment::Key(slot), PathSegment::Row(row), rest @ ..] => {
                self.slots.get_mut(slot)?.get_mut(*row)?.record_at_mut(rest)
            }
            _ => None,
        }
    }

    /// Scalar at a field path
    pub fn get(&self, path: &FieldPath) -> Option<&FieldValue> {
        let (last, parent) = path.segments().split_last()?;
        let PathSegment::Key(name) = last else {
            return None;
        };
        self.record_at(parent)?.fields.get(name)
    }

    /// Row list at a slot path
    pub fn slot_at(&self, path: &FieldPath) -> Option<&RowList> {
        let (last, parent) = path.segments().split_last()?;
        let PathSegment::Key(name) = last else {
            return None;
        };
        self.record_at(parent)?.slots.get(name)
    }

    /// Row list at a slot path, created empty when the owning record exists
    pub fn slot_at_mut(&mut self, path: &FieldPath) -> Option<&mut RowList> {
        let (last, parent) = path.segments().split_last()?;
        let PathSegment::Key(name) = last else {
            return None;
        };
        Some(self.record_at_mut(parent)?.ensure_slot(name))
    }

    /// Write a scalar at a field path. The owning record must exist.
    ///
    /// Returns the previous value (`Empty` when the field was unset), or
    /// `None` when the path does not reach a record.
    pub fn set(&mut self, path: &FieldPath, value: FieldValue) -> Option<FieldValue> {
        let (last, parent) = path.segments().split_last()?;
        let PathSegment::Key(name) = last else {
            return None;
        };
        let record = self.record_at_mut(parent)?;
        Some(record.fields.insert(name.clone(), value).unwrap_or_default())
    }

    /// Import the plain JSON shape `{ "age": 5, "items": [ { .. }, .. ] }`.
    ///
    /// Arrays become slots (rows get fresh identities), scalars become fields.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ValueError> {
        Self::from_json_at(value, "")
    }

    fn from_json_at(value: &serde_json::Value, at: &str) -> Result<Self, ValueError> {
        let object = value
            .as_object()
            .ok_or_else(|| ValueError::NotAnObject(at.to_string()))?;
        let mut record = RecordValues::new();
        for (key, item) in object {
            match item {
                serde_json::Value::Array(rows) => {
                    let mut list = RowList::new();
                    for (index, row) in rows.iter().enumerate() {
                        if !row.is_object() {
                            return Err(ValueError::RowNotAnObject {
                                slot: key.clone(),
                                index,
                            });
                        }
                        let child_at = format!("{}{}[{}]", at, key, index);
                        list.push(Self::from_json_at(row, &child_at)?);
                    }
                    record.slots.insert(key.clone(), list);
                }
                serde_json::Value::Object(_) => {
                    return Err(ValueError::NotAnObject(format!("{}{}", at, key)));
                }
                scalar => {
                    if let Some(v) = FieldValue::from_json(scalar) {
                        record.fields.insert(key.clone(), v);
                    }
                }
            }
        }
        Ok(record)
    }

    /// Plain JSON rendering; rows appear in display order without identities
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (k, v) in &self.fields {
            object.insert(k.clone(), v.to_json());
        }
        for (k, rows) in &self.slots {
            let rows = rows.iter().map(|(_, row)| row.to_json()).collect();
            object.insert(k.clone(), serde_json::Value::Array(rows));
        }
        serde_json::Value::Object(object)
    }
}

impl Serialize for RecordValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + self.slots.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        for (k, rows) in &self.slots {
            map.serialize_entry(k, rows)?;
        }
        map.end()
    }
}
