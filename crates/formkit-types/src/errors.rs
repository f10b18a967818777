//! Error trees mirroring value trees.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::path::{FieldPath, PathSegment, RowId};

/// JSON key of the form-level message. Schemas reject field names starting
/// with `$`, so it never collides with a field.
pub const ROOT_KEY: &str = "$root";

/// Where a validation or submission message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A declared constraint on one field failed
    FieldConstraint,
    /// Raw input could not be converted to the field's type
    Coercion,
    /// A refine rule evaluated against the whole normalized tree failed
    CrossField,
    /// Row count of a repeatable slot is outside its bounds
    SlotCardinality,
    /// The external submit handler reported a failure
    Submit,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::FieldConstraint => "field_constraint",
            ErrorKind::Coercion => "coercion",
            ErrorKind::CrossField => "cross_field",
            ErrorKind::SlotCardinality => "slot_cardinality",
            ErrorKind::Submit => "submit",
        }
    }
}

/// One user-facing message attached to a field, slot or the form root.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct FieldError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FieldError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FieldConstraint, message)
    }

    pub fn coercion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Coercion, message)
    }

    pub fn cross_field(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CrossField, message)
    }

    pub fn slot_cardinality(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SlotCardinality, message)
    }

    pub fn submit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Submit, message)
    }
}

/// Errors of one row, keyed by the row's identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowErrors {
    pub id: RowId,
    pub errors: RecordErrors,
}

/// Errors of one repeatable slot.
///
/// Only rows that carry at least one message are stored, in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlotErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<FieldError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<RowErrors>,
}

impl SlotErrors {
    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.rows.iter().all(|r| r.errors.is_empty())
    }

    pub fn message_count(&self) -> usize {
        usize::from(self.root.is_some())
            + self
                .rows
                .iter()
                .map(|r| r.errors.message_count())
                .sum::<usize>()
    }

    pub fn row(&self, id: RowId) -> Option<&RecordErrors> {
        self.rows.iter().find(|r| r.id == id).map(|r| &r.errors)
    }

    pub fn row_mut(&mut self, id: RowId) -> Option<&mut RecordErrors> {
        self.rows.iter_mut().find(|r| r.id == id).map(|r| &mut r.errors)
    }

    /// Errors of a row, created empty when absent
    pub fn row_entry(&mut self, id: RowId) -> &mut RecordErrors {
        let index = match self.rows.iter().position(|r| r.id == id) {
            Some(index) => index,
            None => {
                self.rows.push(RowErrors {
                    id,
                    errors: RecordErrors::default(),
                });
                self.rows.len() - 1
            }
        };
        &mut self.rows[index].errors
    }

    /// Record a row's errors; empty error records are dropped
    pub fn push_row(&mut self, id: RowId, errors: RecordErrors) {
        if !errors.is_empty() {
            self.rows.push(RowErrors { id, errors });
        }
    }

    /// Drop the error entry of a removed row
    pub fn remove_row(&mut self, id: RowId) -> bool {
        let before = self.rows.len();
        self.rows.retain(|r| r.id != id);
        self.rows.len() != before
    }
}

/// Error tree of one record.
///
/// Field and slot entries keep insertion order, which the validation engine
/// makes equal to schema declaration order, so the first entry is the first
/// invalid field on screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordErrors {
    fields: Vec<(String, FieldError)>,
    slots: Vec<(String, SlotErrors)>,
    root: Option<FieldError>,
}

impl RecordErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when there is no message at any depth
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.root.is_none() && self.slots.iter().all(|(_, s)| s.is_empty())
    }

    /// Total number of messages at every depth
    pub fn message_count(&self) -> usize {
        self.fields.len()
            + usize::from(self.root.is_some())
            + self.slots.iter().map(|(_, s)| s.message_count()).sum::<usize>()
    }

    /// Set a field's message, replacing any previous one
    pub fn insert_field(&mut self, name: impl Into<String>, error: FieldError) {
        let name = name.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => *existing = error,
            None => self.fields.push((name, error)),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldError> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, e)| e)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldError)> + '_ {
        self.fields.iter().map(|(k, e)| (k.as_str(), e))
    }

    /// Attach a slot's errors; empty slot errors are dropped
    pub fn insert_slot(&mut self, name: impl Into<String>, errors: SlotErrors) {
        let name = name.into();
        self.slots.retain(|(k, _)| *k != name);
        if !errors.is_empty() {
            self.slots.push((name, errors));
        }
    }

    pub fn slot(&self, name: &str) -> Option<&SlotErrors> {
        self.slots.iter().find(|(k, _)| k == name).map(|(_, s)| s)
    }

    /// Slot errors by name, created empty when absent
    pub fn slot_entry(&mut self, name: &str) -> &mut SlotErrors {
        let index = match self.slots.iter().position(|(k, _)| k == name) {
            Some(index) => index,
            None => {
                self.slots.push((name.to_string(), SlotErrors::default()));
                self.slots.len() - 1
            }
        };
        &mut self.slots[index].1
    }

    pub fn slots(&self) -> impl Iterator<Item = (&str, &SlotErrors)> + '_ {
        self.slots.iter().map(|(k, s)| (k.as_str(), s))
    }

    /// Form-level message (submit failures)
    pub fn root(&self) -> Option<&FieldError> {
        self.root.as_ref()
    }

    pub fn set_root(&mut self, error: Option<FieldError>) {
        self.root = error;
    }

    fn record_at(&self, segments: &[PathSegment]) -> Option<&RecordErrors> {
        match segments {
            [] => Some(self),
            [PathSegment::Key(slot), PathSegment::Row(row), rest @ ..] => {
                self.slot(slot)?.row(*row)?.record_at(rest)
            }
            _ => None,
        }
    }

    /// Like `record_at`, creating slot and row entries on the way down
    fn record_entry(&mut self, segments: &[PathSegment]) -> Option<&mut RecordErrors> {
        match segments {
            [] => Some(self),
            [PathSegment::Key(slot), PathSegment::Row(row), rest @ ..] => {
                self.slot_entry(slot).row_entry(*row).record_entry(rest)
            }
            _ => None,
        }
    }

    /// Message at a path: a field's message, a slot's root message, or the
    /// form root message for the empty path
    pub fn get(&self, path: &FieldPath) -> Option<&FieldError> {
        let Some((last, parent)) = path.segments().split_last() else {
            return self.root.as_ref();
        };
        let PathSegment::Key(name) = last else {
            return None;
        };
        let record = self.record_at(parent)?;
        record
            .field(name)
            .or_else(|| record.slot(name).and_then(|s| s.root.as_ref()))
    }

    /// Errors of a row, if it has any
    pub fn row_at(&self, slot: &FieldPath, row: RowId) -> Option<&RecordErrors> {
        self.slot_at(slot)?.row(row)
    }

    pub fn slot_at(&self, path: &FieldPath) -> Option<&SlotErrors> {
        let (last, parent) = path.segments().split_last()?;
        let PathSegment::Key(name) = last else {
            return None;
        };
        self.record_at(parent)?.slot(name)
    }

    /// Slot errors at a path, creating empty entries along the way.
    ///
    /// `None` only when the path is not shaped like a slot path.
    pub fn slot_at_mut(&mut self, path: &FieldPath) -> Option<&mut SlotErrors> {
        let (last, parent) = path.segments().split_last()?;
        let PathSegment::Key(name) = last else {
            return None;
        };
        Some(self.record_entry(parent)?.slot_entry(name))
    }

    /// Every message with its path, fields before slots, rows in order
    pub fn iter(&self) -> Vec<(FieldPath, &FieldError)> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            out.push((FieldPath::root(), root));
        }
        self.collect_into(&FieldPath::root(), &mut out);
        out
    }

    fn collect_into<'a>(&'a self, base: &FieldPath, out: &mut Vec<(FieldPath, &'a FieldError)>) {
        for (name, error) in &self.fields {
            out.push((base.clone().with_key(name), error));
        }
        for (name, slot) in &self.slots {
            let slot_path = base.clone().with_key(name);
            if let Some(root) = &slot.root {
                out.push((slot_path.clone(), root));
            }
            for row in &slot.rows {
                let row_path = slot_path.clone().with_row(row.id);
                if let Some(root) = &row.errors.root {
                    out.push((row_path.clone(), root));
                }
                row.errors.collect_into(&row_path, out);
            }
        }
    }

    /// First validation message in declaration order (form root excluded)
    pub fn first_error(&self) -> Option<(FieldPath, &FieldError)> {
        let mut out = Vec::new();
        self.collect_into(&FieldPath::root(), &mut out);
        out.into_iter().next()
    }
}

impl Serialize for RecordErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.fields.len() + self.slots.len() + usize::from(self.root.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(root) = &self.root {
            map.serialize_entry(ROOT_KEY, root)?;
        }
        for (k, e) in &self.fields {
            map.serialize_entry(k, e)?;
        }
        for (k, s) in &self.slots {
            map.serialize_entry(k, s)?;
        }
        map.end()
    }
}
