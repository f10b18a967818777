//! Row-list operations on repeatable slots.
//!
//! The controller edits a value tree and its error tree together: removing a
//! row drops its error entry, and a rejected cardinality change is exposed as
//! the slot's root message. Rows keep their identity through every operation.

use formkit_types::{FieldError, FieldPath, RecordErrors, RecordValues, RowId, RowList};

use crate::error::ListError;
use crate::schema::{CompiledSchema, CompiledSlot};

/// Slot operations checked against a compiled schema
#[derive(Debug, Clone, Copy)]
pub struct ListController<'a> {
    schema: &'a CompiledSchema,
}

impl<'a> ListController<'a> {
    pub fn new(schema: &'a CompiledSchema) -> Self {
        Self { schema }
    }

    /// Append a row with a fresh identity
    pub fn append(
        &self,
        values: &mut RecordValues,
        errors: &mut RecordErrors,
        slot: &FieldPath,
        row: RecordValues,
    ) -> Result<RowId, ListError> {
        let spec = self.spec(slot)?;
        let rows = rows_mut(values, slot)?;
        check_max(spec, slot, rows.len(), errors)?;
        let id = rows.push(row);
        tracing::debug!(slot = %slot, row = %id, rows = rows.len(), "appended row");
        Ok(id)
    }

    /// Insert a row at `index` (clamped to the end) with a fresh identity
    pub fn insert(
        &self,
        values: &mut RecordValues,
        errors: &mut RecordErrors,
        slot: &FieldPath,
        index: usize,
        row: RecordValues,
    ) -> Result<RowId, ListError> {
        let spec = self.spec(slot)?;
        let rows = rows_mut(values, slot)?;
        check_max(spec, slot, rows.len(), errors)?;
        let id = rows.insert(index, row);
        tracing::debug!(slot = %slot, row = %id, index, "inserted row");
        Ok(id)
    }

    /// Remove exactly the row `id` and its error entry
    pub fn remove(
        &self,
        values: &mut RecordValues,
        errors: &mut RecordErrors,
        slot: &FieldPath,
        id: RowId,
    ) -> Result<RecordValues, ListError> {
        let spec = self.spec(slot)?;
        let rows = rows_mut(values, slot)?;
        if !rows.contains(id) {
            return Err(ListError::UnknownRow {
                slot: slot.clone(),
                row: id,
            });
        }
        if rows.len() <= spec.min_rows {
            reject(errors, slot, &spec.min_message);
            tracing::warn!(slot = %slot, row = %id, min = spec.min_rows, "row removal rejected");
            return Err(ListError::BelowMinimum {
                slot: slot.clone(),
                min: spec.min_rows,
            });
        }
        let removed = rows.remove(id).ok_or_else(|| ListError::UnknownRow {
            slot: slot.clone(),
            row: id,
        })?;
        if let Some(slot_errors) = errors.slot_at_mut(slot) {
            slot_errors.remove_row(id);
        }
        tracing::debug!(slot = %slot, row = %id, rows = rows.len(), "removed row");
        Ok(removed)
    }

    /// Move row `id` to position `index` (clamped to the end)
    pub fn move_row(
        &self,
        values: &mut RecordValues,
        slot: &FieldPath,
        id: RowId,
        index: usize,
    ) -> Result<(), ListError> {
        self.spec(slot)?;
        let rows = rows_mut(values, slot)?;
        if !rows.move_to(id, index) {
            return Err(ListError::UnknownRow {
                slot: slot.clone(),
                row: id,
            });
        }
        tracing::debug!(slot = %slot, row = %id, index, "moved row");
        Ok(())
    }

    fn spec(&self, slot: &FieldPath) -> Result<&'a CompiledSlot, ListError> {
        self.schema
            .slot_at(slot)
            .ok_or_else(|| ListError::UnknownSlot(slot.clone()))
    }
}

fn rows_mut<'v>(values: &'v mut RecordValues, slot: &FieldPath) -> Result<&'v mut RowList, ListError> {
    values
        .slot_at_mut(slot)
        .ok_or_else(|| ListError::UnknownSlot(slot.clone()))
}

fn check_max(
    spec: &CompiledSlot,
    slot: &FieldPath,
    rows: usize,
    errors: &mut RecordErrors,
) -> Result<(), ListError> {
    match spec.max_rows {
        Some(max) if rows >= max => {
            reject(errors, slot, &spec.max_message);
            tracing::warn!(slot = %slot, max, "row addition rejected");
            Err(ListError::AboveMaximum {
                slot: slot.clone(),
                max,
            })
        }
        _ => Ok(()),
    }
}

fn reject(errors: &mut RecordErrors, slot: &FieldPath, message: &str) {
    if let Some(slot_errors) = errors.slot_at_mut(slot) {
        slot_errors.root = Some(FieldError::slot_cardinality(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, FormSchema, RecordSpec, SlotSpec};
    use formkit_types::ErrorKind;

    fn schema() -> CompiledSchema {
        FormSchema::new("order", "order")
            .record(
                "order",
                RecordSpec::new().slot(
                    SlotSpec::new("items", "item")
                        .min_rows(1, None)
                        .max_rows(3, Some("three items at most")),
                ),
            )
            .record(
                "item",
                RecordSpec::new()
                    .field(FieldSpec::text("name"))
                    .slot(SlotSpec::new("notes", "note")),
            )
            .record("note", RecordSpec::new().field(FieldSpec::text("body")))
            .compile()
            .unwrap()
    }

    fn named(name: &str) -> RecordValues {
        RecordValues::new().with_field("name", name)
    }

    fn names(values: &RecordValues) -> Vec<String> {
        values
            .slot("items")
            .map(|rows| {
                rows.iter()
                    .map(|(_, r)| r.field("name").map(|v| v.to_string()).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn append_mints_new_identities() {
        let schema = schema();
        let list = ListController::new(&schema);
        let items = FieldPath::field("items");
        let mut values = RecordValues::new();
        let mut errors = RecordErrors::new();

        let a = list.append(&mut values, &mut errors, &items, named("a")).unwrap();
        let b = list.append(&mut values, &mut errors, &items, named("b")).unwrap();
        assert_ne!(a, b);
        list.remove(&mut values, &mut errors, &items, b).unwrap();
        let c = list.append(&mut values, &mut errors, &items, named("c")).unwrap();
        assert_ne!(c, b);
        assert_eq!(names(&values), vec!["a", "c"]);
    }

    #[test]
    fn remove_drops_row_errors_and_keeps_other_identities() {
        let schema = schema();
        let list = ListController::new(&schema);
        let items = FieldPath::field("items");
        let mut values = RecordValues::new()
            .with_slot("items", RowList::from_rows([named("a"), named("b"), named("c")]));
        let ids = values.slot("items").unwrap().ids().to_vec();

        let mut errors = RecordErrors::new();
        let mut row_errors = RecordErrors::new();
        row_errors.insert_field("name", FieldError::constraint("bad"));
        errors.slot_entry("items").push_row(ids[0], row_errors);

        list.remove(&mut values, &mut errors, &items, ids[0]).unwrap();
        assert!(errors.is_empty());
        let rows = values.slot("items").unwrap();
        assert_eq!(rows.ids(), &ids[1..]);
        assert_eq!(rows.position(ids[2]), Some(1));
    }

    #[test]
    fn cardinality_is_enforced() {
        let schema = schema();
        let list = ListController::new(&schema);
        let items = FieldPath::field("items");
        let mut values = RecordValues::new();
        let mut errors = RecordErrors::new();

        let only = list.append(&mut values, &mut errors, &items, named("a")).unwrap();
        let err = list.remove(&mut values, &mut errors, &items, only).unwrap_err();
        assert_eq!(err, ListError::BelowMinimum { slot: items.clone(), min: 1 });
        assert_eq!(values.slot("items").map(|r| r.len()), Some(1));
        let root = errors.get(&items).unwrap();
        assert_eq!(root.kind, ErrorKind::SlotCardinality);
        assert_eq!(root.message, "must have at least one item");

        list.append(&mut values, &mut errors, &items, named("b")).unwrap();
        list.append(&mut values, &mut errors, &items, named("c")).unwrap();
        let err = list.append(&mut values, &mut errors, &items, named("d")).unwrap_err();
        assert!(matches!(err, ListError::AboveMaximum { max: 3, .. }));
        assert_eq!(errors.get(&items).map(|e| e.message.as_str()), Some("three items at most"));
        assert_eq!(names(&values), vec!["a", "b", "c"]);
    }

    #[test]
    fn insert_and_move() {
        let schema = schema();
        let list = ListController::new(&schema);
        let items = FieldPath::field("items");
        let mut values = RecordValues::new();
        let mut errors = RecordErrors::new();

        let a = list.append(&mut values, &mut errors, &items, named("a")).unwrap();
        list.append(&mut values, &mut errors, &items, named("b")).unwrap();
        list.insert(&mut values, &mut errors, &items, 0, named("z")).unwrap();
        assert_eq!(names(&values), vec!["z", "a", "b"]);

        list.move_row(&mut values, &items, a, 99).unwrap();
        assert_eq!(names(&values), vec!["z", "b", "a"]);
        assert!(matches!(
            list.move_row(&mut values, &items, RowId::new(77), 0),
            Err(ListError::UnknownRow { .. })
        ));
    }

    #[test]
    fn nested_slots_and_unknown_paths() {
        let schema = schema();
        let list = ListController::new(&schema);
        let items = FieldPath::field("items");
        let mut values = RecordValues::new();
        let mut errors = RecordErrors::new();
        let row = list.append(&mut values, &mut errors, &items, named("a")).unwrap();

        let notes = items.clone().with_row(row).with_key("notes");
        let note = list
            .append(&mut values, &mut errors, &notes, RecordValues::new().with_field("body", "x"))
            .unwrap();
        assert!(values.slot_at(&notes).unwrap().contains(note));

        assert!(matches!(
            list.append(&mut values, &mut errors, &FieldPath::field("nope"), RecordValues::new()),
            Err(ListError::UnknownSlot(_))
        ));
        let missing_row = items.with_row(RowId::new(42)).with_key("notes");
        assert!(matches!(
            list.append(&mut values, &mut errors, &missing_row, RecordValues::new()),
            Err(ListError::UnknownSlot(_))
        ));
    }
}
