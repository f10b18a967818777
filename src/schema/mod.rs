//! Declarative form schemas
//!
//! A [`FormSchema`] is plain data: records of fields and repeatable slots,
//! optional derived aggregates, and nothing executable. It can be written in
//! YAML or JSON, unit-tested without any UI, and compiled into a
//! [`CompiledSchema`] once per process.
//!
//! ```yaml
//! name: user-registration
//! root: user
//! records:
//!   user:
//!     fields:
//!       - name: age
//!         kind: { type: number, message: "enter valid number" }
//!         constraints:
//!           - { rule: gt, value: 10, message: "age must be greater than 10" }
//!     slots:
//!       - { name: items, record: item }
//!   item:
//!     fields:
//!       - { name: price, kind: { type: number } }
//! aggregates:
//!   - { name: total, slot: items, field: price, op: sum }
//! ```

mod compile;
mod field;
mod record;
mod refine;

pub(crate) use compile::{Check, CompiledRefine};
pub use compile::{CompiledField, CompiledRecord, CompiledSchema, CompiledSlot};
pub use field::{Constraint, FieldKind, FieldSpec};
pub use record::{RecordSpec, SlotSpec};
pub use refine::{RefineContext, RefinePredicate, RefineRegistry, RefineRule};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::aggregate::AggregateSpec;
use crate::error::SchemaError;

/// A complete form description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    pub name: String,
    /// Name of the record describing the whole form
    pub root: String,
    pub records: BTreeMap<String, RecordSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregates: Vec<AggregateSpec>,
}

impl FormSchema {
    pub fn new(name: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            records: BTreeMap::new(),
            aggregates: Vec::new(),
        }
    }

    pub fn record(mut self, name: impl Into<String>, spec: RecordSpec) -> Self {
        self.records.insert(name.into(), spec);
        self
    }

    pub fn aggregate(mut self, spec: AggregateSpec) -> Self {
        self.aggregates.push(spec);
        self
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, SchemaError> {
        serde_yaml::from_str(source).map_err(|e| SchemaError::Parse(e.to_string()))
    }

    pub fn from_json_str(source: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(source).map_err(|e| SchemaError::Parse(e.to_string()))
    }

    pub fn to_yaml_string(&self) -> Result<String, SchemaError> {
        serde_yaml::to_string(self).map_err(|e| SchemaError::Parse(e.to_string()))
    }

    /// Compile without host refine predicates
    pub fn compile(&self) -> Result<CompiledSchema, SchemaError> {
        compile::compile(self, &RefineRegistry::default())
    }

    /// Compile, resolving `named` refine rules against `refines`
    pub fn compile_with(&self, refines: &RefineRegistry) -> Result<CompiledSchema, SchemaError> {
        compile::compile(self, refines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: &str = r#"
name: order
root: order
records:
  order:
    fields:
      - name: customer
        kind: { type: text }
        constraints:
          - { rule: min_length, value: 1, message: "customer is required" }
    slots:
      - { name: items, record: item, min_rows: 1 }
  item:
    fields:
      - { name: price, kind: { type: number } }
aggregates:
  - { name: total, slot: items, field: price }
"#;

    #[test]
    fn parses_yaml_document() {
        let schema = FormSchema::from_yaml_str(ORDER).unwrap();
        assert_eq!(schema.root, "order");
        assert_eq!(schema.records.len(), 2);
        assert_eq!(schema.records["order"].slots[0].min_rows, 1);
        assert_eq!(schema.aggregates[0].op, crate::AggregateOp::Sum);
        assert!(schema.compile().is_ok());
    }

    #[test]
    fn yaml_round_trip_is_stable() {
        let schema = FormSchema::from_yaml_str(ORDER).unwrap();
        let text = schema.to_yaml_string().unwrap();
        assert_eq!(FormSchema::from_yaml_str(&text).unwrap(), schema);
    }

    #[test]
    fn parse_errors_are_reported() {
        assert!(matches!(
            FormSchema::from_yaml_str("name: [unterminated"),
            Err(SchemaError::Parse(_))
        ));
        assert!(matches!(FormSchema::from_json_str("{}"), Err(SchemaError::Parse(_))));
    }
}
