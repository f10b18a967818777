//! Schema compilation.
//!
//! Resolves record references into a tree, compiles patterns once, looks up
//! named refine rules and checks every declaration. Anything wrong here is a
//! programming-time fault reported as [`SchemaError`]; a [`CompiledSchema`]
//! can always be validated against without failing.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use formkit_types::{FieldPath, PathSegment, RecordValues};

use super::field::{Constraint, FieldKind, FieldSpec};
use super::refine::{RefinePredicate, RefineRegistry, RefineRule};
use super::FormSchema;
use crate::aggregate::AggregateSpec;
use crate::error::SchemaError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$").unwrap()
});

/// A constraint ready to evaluate
#[derive(Debug, Clone)]
pub(crate) enum Check {
    Rule(Constraint),
    Pattern { regex: Regex, message: String },
    Email { message: String },
}

impl Check {
    pub(crate) fn email_regex() -> &'static Regex {
        &EMAIL_RE
    }
}

/// A refine rule ready to evaluate
#[derive(Clone)]
pub(crate) enum CompiledRefine {
    MultipleOf {
        value: f64,
        message: String,
    },
    EqualsField {
        field: String,
        message: String,
    },
    Named {
        name: String,
        message: String,
        predicate: Arc<dyn RefinePredicate>,
    },
}

impl std::fmt::Debug for CompiledRefine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompiledRefine::MultipleOf { value, .. } => write!(f, "MultipleOf({})", value),
            CompiledRefine::EqualsField { field, .. } => write!(f, "EqualsField({})", field),
            CompiledRefine::Named { name, .. } => write!(f, "Named({})", name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledField {
    spec: FieldSpec,
    pub(crate) checks: Vec<Check>,
    pub(crate) refines: Vec<CompiledRefine>,
}

impl CompiledField {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.spec.kind
    }

    pub fn is_optional(&self) -> bool {
        self.spec.optional
    }

    pub fn spec(&self) -> &FieldSpec {
        &self.spec
    }
}

#[derive(Debug, Clone)]
pub struct CompiledSlot {
    pub name: String,
    pub min_rows: usize,
    pub max_rows: Option<usize>,
    pub min_message: String,
    pub max_message: String,
    pub record: Arc<CompiledRecord>,
}

impl CompiledSlot {
    /// Cardinality message for a row count, if out of bounds
    pub fn cardinality_message(&self, rows: usize) -> Option<&str> {
        if rows < self.min_rows {
            return Some(&self.min_message);
        }
        match self.max_rows {
            Some(max) if rows > max => Some(&self.max_message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledRecord {
    pub name: String,
    pub fields: Vec<CompiledField>,
    pub slots: Vec<CompiledSlot>,
}

impl CompiledRecord {
    pub fn field(&self, name: &str) -> Option<&CompiledField> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn slot(&self, name: &str) -> Option<&CompiledSlot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Record reached by `slot.#row` pairs (row ids are not checked)
    fn record_at(&self, segments: &[PathSegment]) -> Option<&CompiledRecord> {
        match segments {
            [] => Some(self),
            [PathSegment::Key(slot), PathSegment::Row(_), rest @ ..] => {
                self.slot(slot)?.record.record_at(rest)
            }
            _ => None,
        }
    }

    fn collect_leaves(&self, values: &RecordValues, base: &FieldPath, out: &mut Vec<FieldPath>) {
        for field in &self.fields {
            out.push(base.clone().with_key(field.name()));
        }
        for slot in &self.slots {
            let Some(rows) = values.slot(&slot.name) else {
                continue;
            };
            for (id, row) in rows.iter() {
                let row_path = base.clone().with_key(&slot.name).with_row(id);
                slot.record.collect_leaves(row, &row_path, out);
            }
        }
    }
}

/// A validated, ready-to-run schema
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    source: FormSchema,
    root: Arc<CompiledRecord>,
}

impl CompiledSchema {
    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn root(&self) -> &CompiledRecord {
        &self.root
    }

    pub fn aggregates(&self) -> &[AggregateSpec] {
        &self.source.aggregates
    }

    /// The declarative document this schema was compiled from
    pub fn source(&self) -> &FormSchema {
        &self.source
    }

    pub fn field_at(&self, path: &FieldPath) -> Option<&CompiledField> {
        let (last, parent) = path.segments().split_last()?;
        let PathSegment::Key(name) = last else {
            return None;
        };
        self.root.record_at(parent)?.field(name)
    }

    pub fn slot_at(&self, path: &FieldPath) -> Option<&CompiledSlot> {
        let (last, parent) = path.segments().split_last()?;
        let PathSegment::Key(name) = last else {
            return None;
        };
        self.root.record_at(parent)?.slot(name)
    }

    /// Record spec for a path made of `slot.#row` pairs
    pub fn record_at(&self, path: &FieldPath) -> Option<&CompiledRecord> {
        self.root.record_at(path.segments())
    }

    /// Every field path present for the current rows, in declaration order
    pub fn leaf_paths(&self, values: &RecordValues) -> Vec<FieldPath> {
        let mut out = Vec::new();
        self.root.collect_leaves(values, &FieldPath::root(), &mut out);
        out
    }
}

pub(crate) fn compile(
    schema: &FormSchema,
    refines: &RefineRegistry,
) -> Result<CompiledSchema, SchemaError> {
    if !schema.records.contains_key(&schema.root) {
        return Err(SchemaError::MissingRoot(schema.root.clone()));
    }
    let mut compiler = Compiler {
        schema,
        refines,
        stack: Vec::new(),
        done: HashMap::new(),
    };
    let root = compiler.record(&schema.root)?;
    check_aggregates(&schema.aggregates, &root)?;
    Ok(CompiledSchema {
        source: schema.clone(),
        root,
    })
}

struct Compiler<'a> {
    schema: &'a FormSchema,
    refines: &'a RefineRegistry,
    stack: Vec<String>,
    done: HashMap<String, Arc<CompiledRecord>>,
}

impl Compiler<'_> {
    fn record(&mut self, name: &str) -> Result<Arc<CompiledRecord>, SchemaError> {
        if let Some(done) = self.done.get(name) {
            return Ok(done.clone());
        }
        if self.stack.iter().any(|s| s == name) {
            return Err(SchemaError::CyclicRecord(name.to_string()));
        }
        let schema = self.schema;
        let spec = schema
            .records
            .get(name)
            .ok_or_else(|| SchemaError::MissingRoot(name.to_string()))?;
        self.stack.push(name.to_string());

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(spec.fields.len());
        for field in &spec.fields {
            check_name(name, &field.name)?;
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateName {
                    record: name.to_string(),
                    name: field.name.clone(),
                });
            }
            fields.push(self.field(field, &spec.fields)?);
        }

        let mut slots = Vec::with_capacity(spec.slots.len());
        for slot in &spec.slots {
            check_name(name, &slot.name)?;
            if !seen.insert(slot.name.as_str()) {
                return Err(SchemaError::DuplicateName {
                    record: name.to_string(),
                    name: slot.name.clone(),
                });
            }
            if !schema.records.contains_key(&slot.record) {
                return Err(SchemaError::UndefinedRecord {
                    slot: slot.name.clone(),
                    record: slot.record.clone(),
                });
            }
            if let Some(max) = slot.max_rows {
                if slot.min_rows > max {
                    return Err(SchemaError::InvalidCardinality {
                        slot: slot.name.clone(),
                        min: slot.min_rows,
                        max,
                    });
                }
            }
            slots.push(CompiledSlot {
                name: slot.name.clone(),
                min_rows: slot.min_rows,
                max_rows: slot.max_rows,
                min_message: slot.resolved_min_message(),
                max_message: slot.resolved_max_message(),
                record: self.record(&slot.record)?,
            });
        }

        self.stack.pop();
        let compiled = Arc::new(CompiledRecord {
            name: name.to_string(),
            fields,
            slots,
        });
        self.done.insert(name.to_string(), compiled.clone());
        Ok(compiled)
    }

    fn field(&self, spec: &FieldSpec, siblings: &[FieldSpec]) -> Result<CompiledField, SchemaError> {
        if let FieldKind::Enum { values, .. } = &spec.kind {
            if values.is_empty() {
                return Err(SchemaError::EmptyEnum(spec.name.clone()));
            }
        }

        let mut checks = Vec::with_capacity(spec.constraints.len());
        for constraint in &spec.constraints {
            if !constraint.applies_to(&spec.kind) {
                return Err(SchemaError::InapplicableConstraint {
                    field: spec.name.clone(),
                    rule: constraint.rule_name(),
                    kind: spec.kind.name(),
                });
            }
            checks.push(match constraint {
                Constraint::Pattern { pattern, message } => Check::Pattern {
                    regex: Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
                        field: spec.name.clone(),
                        pattern: pattern.clone(),
                        source,
                    })?,
                    message: message.clone(),
                },
                Constraint::Email { message } => Check::Email {
                    message: message.clone(),
                },
                other => Check::Rule(other.clone()),
            });
        }

        let mut refines = Vec::with_capacity(spec.refine.len());
        for rule in &spec.refine {
            refines.push(self.refine(spec, rule, siblings)?);
        }

        Ok(CompiledField {
            spec: spec.clone(),
            checks,
            refines,
        })
    }

    fn refine(
        &self,
        spec: &FieldSpec,
        rule: &RefineRule,
        siblings: &[FieldSpec],
    ) -> Result<CompiledRefine, SchemaError> {
        let invalid = |reason: String| SchemaError::InvalidRefine {
            field: spec.name.clone(),
            reason,
        };
        match rule {
            RefineRule::MultipleOf { value, message } => {
                if !spec.kind.is_numeric() {
                    return Err(invalid(format!(
                        "multiple_of needs a number field, found {}",
                        spec.kind.name()
                    )));
                }
                if *value == 0.0 || !value.is_finite() {
                    return Err(invalid(format!("multiple_of value {} is not usable", value)));
                }
                Ok(CompiledRefine::MultipleOf {
                    value: *value,
                    message: message.clone(),
                })
            }
            RefineRule::EqualsField { field, message } => {
                let in_record = siblings.iter().any(|f| f.name == *field);
                let in_root = self
                    .schema
                    .records
                    .get(&self.schema.root)
                    .is_some_and(|r| r.fields.iter().any(|f| f.name == *field));
                if !in_record && !in_root {
                    return Err(invalid(format!("equals_field target '{}' does not exist", field)));
                }
                Ok(CompiledRefine::EqualsField {
                    field: field.clone(),
                    message: message.clone(),
                })
            }
            RefineRule::Named { name, message } => {
                let predicate = self.refines.get(name).ok_or_else(|| SchemaError::UnknownRefine {
                    field: spec.name.clone(),
                    name: name.clone(),
                })?;
                Ok(CompiledRefine::Named {
                    name: name.clone(),
                    message: message.clone(),
                    predicate,
                })
            }
        }
    }
}

/// Names must survive a round trip through `FieldPath` text and stay clear of
/// the error tree's reserved root key
fn check_name(record: &str, name: &str) -> Result<(), SchemaError> {
    let usable = !name.is_empty() && !name.contains('.') && !name.starts_with(['#', '$']);
    if usable {
        Ok(())
    } else {
        Err(SchemaError::InvalidName {
            record: record.to_string(),
            name: name.to_string(),
        })
    }
}

fn check_aggregates(specs: &[AggregateSpec], root: &CompiledRecord) -> Result<(), SchemaError> {
    let mut names = HashSet::new();
    for spec in specs {
        let invalid = |reason: String| SchemaError::InvalidAggregate {
            name: spec.name.clone(),
            reason,
        };
        if !names.insert(spec.name.as_str()) {
            return Err(invalid("duplicate aggregate name".to_string()));
        }
        let slot = root
            .slot(&spec.slot)
            .ok_or_else(|| invalid(format!("root record has no slot '{}'", spec.slot)))?;
        match (&spec.field, spec.op.needs_field()) {
            (Some(field), _) => {
                let target = slot.record.field(field).ok_or_else(|| {
                    invalid(format!("slot '{}' has no field '{}'", spec.slot, field))
                })?;
                if spec.op.needs_field() && !target.kind().is_numeric() {
                    return Err(invalid(format!("field '{}' is not numeric", field)));
                }
            }
            (None, true) => return Err(invalid("a field is required".to_string())),
            (None, false) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RecordSpec, SlotSpec};

    fn item_record() -> RecordSpec {
        RecordSpec::new()
            .field(FieldSpec::text("name"))
            .field(FieldSpec::number("price"))
    }

    #[test]
    fn compiles_nested_slots() {
        let schema = FormSchema::new("order", "order")
            .record(
                "order",
                RecordSpec::new()
                    .field(FieldSpec::text("customer"))
                    .slot(SlotSpec::new("items", "item").min_rows(1, None)),
            )
            .record("item", item_record())
            .aggregate(AggregateSpec::sum("total", "items", "price"));
        let compiled = schema.compile().unwrap();

        assert_eq!(compiled.name(), "order");
        let slot = compiled.slot_at(&FieldPath::field("items")).unwrap();
        assert_eq!(slot.record.fields.len(), 2);
        assert_eq!(slot.cardinality_message(0), Some("must have at least one item"));
        assert_eq!(slot.cardinality_message(1), None);

        let price = "items.#4.price".parse().unwrap();
        assert_eq!(compiled.field_at(&price).map(|f| f.name()), Some("price"));
        assert!(compiled.field_at(&FieldPath::field("items")).is_none());
    }

    #[test]
    fn undefined_record_is_fatal() {
        let schema = FormSchema::new("s", "root").record(
            "root",
            RecordSpec::new().slot(SlotSpec::new("items", "missing")),
        );
        assert!(matches!(
            schema.compile(),
            Err(SchemaError::UndefinedRecord { ref record, .. }) if record == "missing"
        ));
        let schema = FormSchema::new("s", "nope");
        assert!(matches!(schema.compile(), Err(SchemaError::MissingRoot(_))));
    }

    #[test]
    fn cycles_are_rejected() {
        let schema = FormSchema::new("s", "node")
            .record("node", RecordSpec::new().slot(SlotSpec::new("children", "node")));
        assert!(matches!(schema.compile(), Err(SchemaError::CyclicRecord(_))));
    }

    #[test]
    fn field_declarations_are_checked() {
        let dup = FormSchema::new("s", "r").record(
            "r",
            RecordSpec::new()
                .field(FieldSpec::text("a"))
                .field(FieldSpec::number("a")),
        );
        assert!(matches!(dup.compile(), Err(SchemaError::DuplicateName { .. })));

        for bad in ["", "a.b", "#1", "$root"] {
            let schema = FormSchema::new("s", "r").record("r", RecordSpec::new().field(FieldSpec::text(bad)));
            assert!(
                matches!(schema.compile(), Err(SchemaError::InvalidName { .. })),
                "name {:?}",
                bad
            );
        }

        let bad_rule = FormSchema::new("s", "r").record(
            "r",
            RecordSpec::new().field(FieldSpec::number("n").with(Constraint::min_length(1, "m"))),
        );
        assert!(matches!(
            bad_rule.compile(),
            Err(SchemaError::InapplicableConstraint { rule: "min_length", .. })
        ));

        let bad_regex = FormSchema::new("s", "r").record(
            "r",
            RecordSpec::new().field(FieldSpec::text("t").with(Constraint::pattern("([a-z", "m"))),
        );
        assert!(matches!(bad_regex.compile(), Err(SchemaError::InvalidPattern { .. })));

        let empty_enum = FormSchema::new("s", "r").record(
            "r",
            RecordSpec::new().field(FieldSpec::enumeration("g", Vec::<String>::new())),
        );
        assert!(matches!(empty_enum.compile(), Err(SchemaError::EmptyEnum(_))));
    }

    #[test]
    fn refine_rules_are_resolved() {
        let named = FormSchema::new("s", "r").record(
            "r",
            RecordSpec::new().field(FieldSpec::number("n").refine(RefineRule::named("prime", "m"))),
        );
        assert!(matches!(named.compile(), Err(SchemaError::UnknownRefine { .. })));

        let mut registry = RefineRegistry::new();
        registry.register("prime", |_, _| true);
        assert!(named.compile_with(&registry).is_ok());

        let even_text = FormSchema::new("s", "r").record(
            "r",
            RecordSpec::new().field(FieldSpec::text("t").refine(RefineRule::multiple_of(2.0, "m"))),
        );
        assert!(matches!(even_text.compile(), Err(SchemaError::InvalidRefine { .. })));

        let confirm = FormSchema::new("s", "r").record(
            "r",
            RecordSpec::new()
                .field(FieldSpec::text("password"))
                .field(FieldSpec::text("confirm").refine(RefineRule::equals_field("password", "m"))),
        );
        assert!(confirm.compile().is_ok());
    }

    #[test]
    fn aggregates_are_checked() {
        let base = FormSchema::new("s", "r")
            .record("r", RecordSpec::new().slot(SlotSpec::new("items", "item")))
            .record("item", item_record());

        let ok = base.clone().aggregate(AggregateSpec::count("lines", "items"));
        assert!(ok.compile().is_ok());

        let text_sum = base.clone().aggregate(AggregateSpec::sum("t", "items", "name"));
        assert!(matches!(text_sum.compile(), Err(SchemaError::InvalidAggregate { .. })));

        let no_slot = base.aggregate(AggregateSpec::sum("t", "lines", "price"));
        assert!(matches!(no_slot.compile(), Err(SchemaError::InvalidAggregate { .. })));
    }

    #[test]
    fn leaf_paths_follow_rows() {
        let schema = FormSchema::new("s", "r")
            .record(
                "r",
                RecordSpec::new()
                    .field(FieldSpec::number("age"))
                    .slot(SlotSpec::new("items", "item")),
            )
            .record("item", item_record())
            .compile()
            .unwrap();
        let values = RecordValues::new().with_slot(
            "items",
            formkit_types::RowList::from_rows([RecordValues::new()]),
        );
        let paths: Vec<String> = schema.leaf_paths(&values).iter().map(|p| p.to_string()).collect();
        assert_eq!(paths, vec!["age", "items.#1.name", "items.#1.price"]);
    }
}
