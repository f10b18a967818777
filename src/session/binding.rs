//! Read-only views a rendering layer binds to.
//!
//! Bindings carry data only; actions go through the session's event methods
//! (`set_field` is a field's `onChange`, `append_row`/`remove_row` a list's).

use serde::Serialize;

use formkit_types::{FieldError, FieldPath, FieldValue, RecordErrors, RecordValues, RowId};

use super::state::FormState;
use crate::aggregate::Aggregates;

/// One field: `{ value, error, touched }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldBinding {
    pub path: FieldPath,
    pub value: FieldValue,
    pub error: Option<FieldError>,
    pub touched: bool,
}

impl FieldBinding {
    /// Message to render next to the field: only once the user has been there
    pub fn visible_error(&self) -> Option<&FieldError> {
        self.error.as_ref().filter(|_| self.touched)
    }
}

/// One row of a list, in display order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowBinding {
    pub id: RowId,
    pub index: usize,
    /// Path of the row (`items.#3`); field paths extend it
    pub path: FieldPath,
    pub values: RecordValues,
    pub errors: Option<RecordErrors>,
}

impl RowBinding {
    pub fn field_path(&self, name: &str) -> FieldPath {
        self.path.clone().with_key(name)
    }
}

/// One repeatable slot: `{ rows }` plus append/remove availability
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListBinding {
    pub path: FieldPath,
    pub rows: Vec<RowBinding>,
    /// Slot-level message (cardinality)
    pub error: Option<FieldError>,
    pub can_append: bool,
    pub can_remove: bool,
}

/// Session-level controls: `{ submit, submitting, is_valid, aggregates }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionBinding {
    pub state: FormState,
    pub submitting: bool,
    pub is_valid: bool,
    /// Submit control enabled
    pub can_submit: bool,
    pub aggregates: Aggregates,
    /// Form-level message (submit failure)
    pub root_error: Option<FieldError>,
    /// First invalid field in declaration order, for focusing
    pub first_error: Option<(FieldPath, FieldError)>,
}
