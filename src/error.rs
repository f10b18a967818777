//! Error types for the form engine
//!
//! Validation and submission failures are never errors here: they are values
//! in the error tree. These enums cover programming-time faults (malformed
//! schemas) and requests that address something that does not exist.

use formkit_types::{FieldPath, RowId};
use thiserror::Error;

/// Fatal schema faults found while compiling a [`crate::FormSchema`]
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema parse error: {0}")]
    Parse(String),

    #[error("Root record '{0}' is not defined")]
    MissingRoot(String),

    #[error("Slot '{slot}' references undefined record '{record}'")]
    UndefinedRecord { slot: String, record: String },

    #[error("Record '{0}' contains itself through its slots")]
    CyclicRecord(String),

    #[error("Invalid field or slot name '{name}' in record '{record}'")]
    InvalidName { record: String, name: String },

    #[error("Duplicate field or slot '{name}' in record '{record}'")]
    DuplicateName { record: String, name: String },

    #[error("Constraint '{rule}' does not apply to {kind} field '{field}'")]
    InapplicableConstraint {
        field: String,
        rule: &'static str,
        kind: &'static str,
    },

    #[error("Invalid pattern '{pattern}' on field '{field}': {source}")]
    InvalidPattern {
        field: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Enum field '{0}' declares no values")]
    EmptyEnum(String),

    #[error("Field '{field}' uses unknown refine rule '{name}'")]
    UnknownRefine { field: String, name: String },

    #[error("Refine rule on field '{field}' is invalid: {reason}")]
    InvalidRefine { field: String, reason: String },

    #[error("Slot '{slot}' has min_rows {min} greater than max_rows {max}")]
    InvalidCardinality { slot: String, min: usize, max: usize },

    #[error("Aggregate '{name}' is invalid: {reason}")]
    InvalidAggregate { name: String, reason: String },
}

/// Rejected row-list operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    #[error("No repeatable slot at '{0}'")]
    UnknownSlot(FieldPath),

    #[error("No row {row} in slot '{slot}'")]
    UnknownRow { slot: FieldPath, row: RowId },

    #[error("Slot '{slot}' requires at least {min} rows")]
    BelowMinimum { slot: FieldPath, min: usize },

    #[error("Slot '{slot}' allows at most {max} rows")]
    AboveMaximum { slot: FieldPath, max: usize },
}

impl ListError {
    /// Rejected by the slot's min/max rows (the slot carries a message)
    pub fn is_cardinality(&self) -> bool {
        matches!(self, ListError::BelowMinimum { .. } | ListError::AboveMaximum { .. })
    }
}

/// Errors returned by [`crate::FormSession`] event methods
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No field at '{0}'")]
    UnknownField(FieldPath),

    #[error(transparent)]
    List(#[from] ListError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = SchemaError::UndefinedRecord {
            slot: "items".into(),
            record: "item".into(),
        };
        assert_eq!(err.to_string(), "Slot 'items' references undefined record 'item'");

        let err = ListError::BelowMinimum {
            slot: FieldPath::field("items"),
            min: 1,
        };
        assert_eq!(err.to_string(), "Slot 'items' requires at least 1 rows");

        assert!(err.is_cardinality());
        assert!(!ListError::UnknownSlot(FieldPath::field("tags")).is_cardinality());

        let err: SessionError = ListError::UnknownSlot(FieldPath::field("tags")).into();
        assert_eq!(err.to_string(), "No repeatable slot at 'tags'");
    }
}
