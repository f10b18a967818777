//! Form validation
//!
//! Validation is a pure function of a [`CompiledSchema`] and a value tree. It
//! never fails: every problem is reported as a message in the returned
//! [`RecordErrors`], at the path of the offending field, slot or row.
//!
//! Rules:
//! - each field reports at most one message (coercion first, then constraints
//!   in declaration order, then refine rules)
//! - rows are validated independently; one invalid row never hides another
//! - slot cardinality problems are reported on the slot itself
//! - refine rules see the whole normalized tree

mod engine;
mod field;

use serde::Serialize;

use formkit_types::{FieldError, FieldPath, PathSegment, RecordErrors, RecordValues};

use crate::error::SessionError;
use crate::schema::CompiledSchema;

/// Result of validating a whole form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    /// Coerced values; fields that failed coercion keep their raw input
    pub normalized: RecordValues,
    pub errors: RecordErrors,
    pub valid: bool,
}

impl ValidationOutcome {
    pub fn first_error(&self) -> Option<(FieldPath, &FieldError)> {
        self.errors.first_error()
    }
}

/// Validate a complete value tree
pub fn validate(schema: &CompiledSchema, values: &RecordValues) -> ValidationOutcome {
    let normalized = engine::normalize_record(schema.root(), values);
    let errors = engine::check_record(
        schema.root(),
        values,
        &normalized,
        &normalized,
        &FieldPath::root(),
    );
    let valid = errors.is_empty();
    tracing::trace!(
        schema = schema.name(),
        messages = errors.message_count(),
        valid,
        "validated form"
    );
    ValidationOutcome {
        normalized,
        errors,
        valid,
    }
}

/// Validate the single field at `path`.
///
/// Refine rules still see the whole normalized tree. Fails only when the
/// path names no field of the schema, or a row that does not exist.
pub fn validate_field(
    schema: &CompiledSchema,
    values: &RecordValues,
    path: &FieldPath,
) -> Result<Option<FieldError>, SessionError> {
    let unknown = || SessionError::UnknownField(path.clone());
    let field = schema.field_at(path).ok_or_else(unknown)?;
    let parent: &[PathSegment] = path
        .segments()
        .split_last()
        .map(|(_, parent)| parent)
        .unwrap_or_default();

    let record = values.record_at(parent).ok_or_else(unknown)?;
    let normalized = engine::normalize_record(schema.root(), values);
    let normalized_record = normalized.record_at(parent).ok_or_else(unknown)?;
    let raw = record.field(field.name()).cloned().unwrap_or_default();

    Ok(engine::check_field(field, &raw, normalized_record, &normalized, path).err())
}
