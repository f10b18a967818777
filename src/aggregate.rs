//! Derived aggregates over repeatable slots (running totals and counts).
//!
//! Aggregates are pure functions of the current value tree. A row whose field
//! is not a number contributes nothing, so a half-typed price never breaks
//! the total.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use formkit_types::RecordValues;

/// How rows are folded into one number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOp {
    #[default]
    Sum,
    /// Number of rows in the slot
    Count,
    Min,
    Max,
}

impl AggregateOp {
    pub fn needs_field(&self) -> bool {
        !matches!(self, AggregateOp::Count)
    }
}

/// Declaration of a derived value over a top-level slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    pub name: String,
    pub slot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default)]
    pub op: AggregateOp,
}

impl AggregateSpec {
    pub fn sum(name: impl Into<String>, slot: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: slot.into(),
            field: Some(field.into()),
            op: AggregateOp::Sum,
        }
    }

    pub fn count(name: impl Into<String>, slot: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: slot.into(),
            field: None,
            op: AggregateOp::Count,
        }
    }

    /// Evaluate against a value tree
    pub fn evaluate(&self, values: &RecordValues) -> f64 {
        let Some(rows) = values.slot(&self.slot) else {
            return 0.0;
        };
        if self.op == AggregateOp::Count {
            return rows.len() as f64;
        }
        let numbers = rows.iter().filter_map(|(_, row)| {
            self.field
                .as_deref()
                .and_then(|f| row.field(f))
                .and_then(|v| v.as_number())
        });
        match self.op {
            AggregateOp::Sum => numbers.sum(),
            AggregateOp::Min => numbers.reduce(f64::min).unwrap_or(0.0),
            AggregateOp::Max => numbers.reduce(f64::max).unwrap_or(0.0),
            AggregateOp::Count => rows.len() as f64,
        }
    }
}

/// Current values of every declared aggregate, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Aggregates(BTreeMap<String, f64>);

impl Aggregates {
    pub fn compute(specs: &[AggregateSpec], values: &RecordValues) -> Self {
        Self(
            specs
                .iter()
                .map(|spec| (spec.name.clone(), spec.evaluate(values)))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formkit_types::{FieldValue, RowList};

    fn items(prices: &[FieldValue]) -> RecordValues {
        let rows = RowList::from_rows(
            prices
                .iter()
                .map(|p| RecordValues::new().with_field("price", p.clone())),
        );
        RecordValues::new().with_slot("items", rows)
    }

    #[test]
    fn non_numeric_rows_contribute_nothing() {
        let values = items(&[10.0.into(), "abc".into(), 5.0.into()]);
        let total = AggregateSpec::sum("total", "items", "price");
        assert_eq!(total.evaluate(&values), 15.0);
    }

    #[test]
    fn nan_and_empty_are_ignored() {
        let values = items(&[FieldValue::Number(f64::NAN), FieldValue::Empty, "2.5".into()]);
        let total = AggregateSpec::sum("total", "items", "price");
        assert_eq!(total.evaluate(&values), 2.5);
    }

    #[test]
    fn count_min_max() {
        let values = items(&[3.0.into(), "x".into(), 7.0.into()]);
        assert_eq!(AggregateSpec::count("lines", "items").evaluate(&values), 3.0);

        let mut max = AggregateSpec::sum("max", "items", "price");
        max.op = AggregateOp::Max;
        assert_eq!(max.evaluate(&values), 7.0);

        let mut min = max.clone();
        min.op = AggregateOp::Min;
        assert_eq!(min.evaluate(&values), 3.0);
        assert_eq!(min.evaluate(&RecordValues::new()), 0.0);
    }

    #[test]
    fn compute_all() {
        let values = items(&[1.0.into(), 2.0.into()]);
        let specs = vec![
            AggregateSpec::sum("total", "items", "price"),
            AggregateSpec::count("lines", "items"),
        ];
        let aggregates = Aggregates::compute(&specs, &values);
        assert_eq!(aggregates.get("total"), Some(3.0));
        assert_eq!(aggregates.get("lines"), Some(2.0));
        assert_eq!(aggregates.get("other"), None);
    }
}
