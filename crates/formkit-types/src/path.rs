//! Row identity and field addressing.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Stable, content-independent identity of one row in a repeatable slot.
///
/// Minted from a per-list monotonically increasing counter and never reused
/// inside that list, so UI state bound to a row survives removal or
/// reordering of other rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(u64);

impl RowId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    /// Field or slot name
    Key(String),
    /// Row inside the slot named by the previous segment
    Row(RowId),
}

/// Errors from parsing a textual field path
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty field path")]
    Empty,

    #[error("empty segment in field path '{0}'")]
    EmptySegment(String),

    #[error("invalid row reference '{segment}' in field path '{path}'")]
    InvalidRow { path: String, segment: String },
}

/// Address of a field, slot or row inside a value tree.
///
/// Rendered as dot-separated segments with rows written as `#<id>`:
/// `age`, `items`, `items.#3`, `items.#3.price`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// The empty path (the form root)
    pub fn root() -> Self {
        Self::default()
    }

    /// A top-level field or slot
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            segments: vec![PathSegment::Key(name.into())],
        }
    }

    /// `slot.#row.field` shorthand for the common one-level case
    pub fn row_field(slot: impl Into<String>, row: RowId, field: impl Into<String>) -> Self {
        Self::field(slot).with_row(row).with_key(field)
    }

    pub fn with_key(mut self, name: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(name.into()));
        self
    }

    pub fn with_row(mut self, row: RowId) -> Self {
        self.segments.push(PathSegment::Row(row));
        self
    }

    pub fn push_key(&mut self, name: impl Into<String>) {
        self.segments.push(PathSegment::Key(name.into()));
    }

    pub fn push_row(&mut self, row: RowId) {
        self.segments.push(PathSegment::Row(row));
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Name of the final segment, if it is a key
    pub fn last_key(&self) -> Option<&str> {
        match self.segments.last() {
            Some(PathSegment::Key(k)) => Some(k),
            _ => None,
        }
    }

    /// Final row id, if the path ends on a row
    pub fn last_row(&self) -> Option<RowId> {
        match self.segments.last() {
            Some(PathSegment::Row(r)) => Some(*r),
            _ => None,
        }
    }

    /// Path without its final segment
    pub fn parent(&self) -> Option<FieldPath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(FieldPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// True when `self` is `other` or lies underneath it
    pub fn starts_with(&self, other: &FieldPath) -> bool {
        self.segments.starts_with(&other.segments)
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                PathSegment::Key(k) => f.write_str(k)?,
                PathSegment::Row(r) => write!(f, "{}", r)?,
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        let mut path = FieldPath::root();
        for part in s.split('.') {
            if part.is_empty() {
                return Err(PathError::EmptySegment(s.to_string()));
            }
            match part.strip_prefix('#') {
                Some(raw) => {
                    let id = raw.parse::<u64>().map_err(|_| PathError::InvalidRow {
                        path: s.to_string(),
                        segment: part.to_string(),
                    })?;
                    path.push_row(RowId::new(id));
                }
                None => path.push_key(part),
            }
        }
        Ok(path)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

impl TryFrom<String> for FieldPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
