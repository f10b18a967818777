//! Depth-first tree walk.
//!
//! Two passes over the same shape: the first builds the normalized tree
//! (coerced values where coercion succeeded), the second reports errors,
//! giving refine rules the complete normalized tree as context.

use formkit_types::{FieldError, FieldPath, FieldValue, RecordErrors, RecordValues, RowList, SlotErrors};

use crate::schema::{CompiledField, CompiledRecord, RefineContext};

/// Normalized copy of `raw` shaped by `spec`.
///
/// Fields unknown to the schema are dropped; failing fields keep their raw
/// value; absent slots become empty lists. Row identities are preserved.
pub(crate) fn normalize_record(spec: &CompiledRecord, raw: &RecordValues) -> RecordValues {
    let mut out = RecordValues::new();
    for field in &spec.fields {
        let raw_value = raw.field(field.name()).cloned().unwrap_or_default();
        let value = field.validate(&raw_value).unwrap_or(raw_value);
        out.set_field(field.name(), value);
    }
    for slot in &spec.slots {
        let rows = match raw.slot(&slot.name) {
            Some(rows) => rows.map_rows(|_, row| normalize_record(&slot.record, row)),
            None => RowList::new(),
        };
        out = out.with_slot(slot.name.clone(), rows);
    }
    out
}

/// Error tree for one record, in declaration order
pub(crate) fn check_record(
    spec: &CompiledRecord,
    raw: &RecordValues,
    normalized: &RecordValues,
    root: &RecordValues,
    base: &FieldPath,
) -> RecordErrors {
    let mut errors = RecordErrors::new();

    for field in &spec.fields {
        let path = base.clone().with_key(field.name());
        let raw_value = raw.field(field.name()).cloned().unwrap_or_default();
        if let Err(error) = check_field(field, &raw_value, normalized, root, &path) {
            errors.insert_field(field.name(), error);
        }
    }

    let no_rows = RowList::new();
    for slot in &spec.slots {
        let raw_rows = raw.slot(&slot.name).unwrap_or(&no_rows);
        let normalized_rows = normalized.slot(&slot.name);

        let mut slot_errors = SlotErrors {
            root: slot
                .cardinality_message(raw_rows.len())
                .map(FieldError::slot_cardinality),
            rows: Vec::new(),
        };
        // every row is checked; a failing row never hides the next one
        for (id, row) in raw_rows.iter() {
            let normalized_row = normalized_rows.and_then(|r| r.get(id)).unwrap_or(row);
            let row_path = base.clone().with_key(&slot.name).with_row(id);
            slot_errors.push_row(
                id,
                check_record(&slot.record, row, normalized_row, root, &row_path),
            );
        }
        errors.insert_slot(&slot.name, slot_errors);
    }

    errors
}

/// Full check of one field: coercion, constraints, then refine rules
pub(crate) fn check_field(
    field: &CompiledField,
    raw: &FieldValue,
    record: &RecordValues,
    root: &RecordValues,
    path: &FieldPath,
) -> Result<(), FieldError> {
    let value = field.validate(raw)?;
    let ctx = RefineContext { root, record, path };
    field.check_refines(&value, &ctx)
}
