//! Cross-field refine rules.
//!
//! Rules stay data in the schema. `named` rules point into a
//! [`RefineRegistry`] of host-registered pure predicates, which keeps schemas
//! serializable while still allowing custom checks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use formkit_types::{FieldPath, FieldValue, RecordValues};

/// A refine rule declared on a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum RefineRule {
    /// Numeric value must be a whole multiple of `value` (2 = even)
    MultipleOf { value: f64, message: String },
    /// Value must equal another field of the same record (or of the root)
    EqualsField { field: String, message: String },
    /// Host predicate looked up by name at compile time
    Named { name: String, message: String },
}

impl RefineRule {
    pub fn multiple_of(value: f64, message: impl Into<String>) -> Self {
        RefineRule::MultipleOf {
            value,
            message: message.into(),
        }
    }

    pub fn equals_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        RefineRule::EqualsField {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
        RefineRule::Named {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RefineRule::MultipleOf { message, .. }
            | RefineRule::EqualsField { message, .. }
            | RefineRule::Named { message, .. } => message,
        }
    }
}

/// What a refine predicate can see: the normalized tree and its own position
#[derive(Debug, Clone, Copy)]
pub struct RefineContext<'a> {
    /// Whole normalized value tree
    pub root: &'a RecordValues,
    /// Normalized record that owns the refined field
    pub record: &'a RecordValues,
    /// Path of the refined field
    pub path: &'a FieldPath,
}

impl<'a> RefineContext<'a> {
    /// Field of the owning record, falling back to the root record
    pub fn sibling(&self, name: &str) -> Option<&'a FieldValue> {
        self.record.field(name).or_else(|| self.root.field(name))
    }

    pub fn lookup(&self, path: &FieldPath) -> Option<&'a FieldValue> {
        self.root.get(path)
    }
}

/// A pure check used by `named` refine rules
pub trait RefinePredicate: Send + Sync {
    fn check(&self, value: &FieldValue, ctx: &RefineContext<'_>) -> bool;
}

struct FnPredicate<F>(F);

impl<F> RefinePredicate for FnPredicate<F>
where
    F: Fn(&FieldValue, &RefineContext<'_>) -> bool + Send + Sync,
{
    fn check(&self, value: &FieldValue, ctx: &RefineContext<'_>) -> bool {
        (self.0)(value, ctx)
    }
}

/// Named predicates available to `named` refine rules
#[derive(Clone, Default)]
pub struct RefineRegistry {
    rules: HashMap<String, Arc<dyn RefinePredicate>>,
}

impl RefineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure under `name`, replacing any previous rule
    pub fn register<F>(&mut self, name: impl Into<String>, check: F) -> &mut Self
    where
        F: Fn(&FieldValue, &RefineContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.rules.insert(name.into(), Arc::new(FnPredicate(check)));
        self
    }

    pub fn register_predicate(
        &mut self,
        name: impl Into<String>,
        predicate: impl RefinePredicate + 'static,
    ) -> &mut Self {
        self.rules.insert(name.into(), Arc::new(predicate));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RefinePredicate>> {
        self.rules.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for RefineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefineRegistry")
            .field("rules", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lookup() {
        let mut registry = RefineRegistry::new();
        registry.register("positive", |v, _ctx| v.as_number().is_some_and(|n| n > 0.0));

        let root = RecordValues::new();
        let path = FieldPath::field("n");
        let ctx = RefineContext {
            root: &root,
            record: &root,
            path: &path,
        };
        let rule = registry.get("positive").unwrap();
        assert!(rule.check(&FieldValue::Number(3.0), &ctx));
        assert!(!rule.check(&FieldValue::Number(-1.0), &ctx));
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["positive"]);
    }

    #[test]
    fn sibling_falls_back_to_root() {
        let root = RecordValues::new().with_field("currency", "EUR");
        let record = RecordValues::new().with_field("price", 3.0);
        let path = FieldPath::field("price");
        let ctx = RefineContext {
            root: &root,
            record: &record,
            path: &path,
        };
        assert_eq!(ctx.sibling("price"), Some(&FieldValue::Number(3.0)));
        assert_eq!(ctx.sibling("currency"), Some(&FieldValue::from("EUR")));
        assert_eq!(ctx.sibling("nope"), None);
    }

    #[test]
    fn yaml_rules() {
        let rules: Vec<RefineRule> = serde_yaml::from_str(
            r#"
- { rule: multiple_of, value: 2, message: "number should be an even" }
- { rule: equals_field, field: password, message: "passwords must match" }
- { rule: named, name: positive, message: "must be positive" }
"#,
        )
        .unwrap();
        assert_eq!(rules[0], RefineRule::multiple_of(2.0, "number should be an even"));
        assert_eq!(rules[1].message(), "passwords must match");
        assert!(matches!(rules[2], RefineRule::Named { .. }));
    }
}
