//! Record schema: fields plus repeatable sub-record slots.

use serde::{Deserialize, Serialize};

use super::field::FieldSpec;

/// Named composition of fields and repeatable slots.
///
/// Field order is declaration order; it drives error ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<SlotSpec>,
}

impl RecordSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn slot(mut self, spec: SlotSpec) -> Self {
        self.slots.push(spec);
        self
    }
}

/// A repeatable slot holding rows of another record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSpec {
    pub name: String,
    /// Name of the record each row conforms to
    pub record: String,
    #[serde(default)]
    pub min_rows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_message: Option<String>,
}

impl SlotSpec {
    pub fn new(name: impl Into<String>, record: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record: record.into(),
            min_rows: 0,
            max_rows: None,
            min_message: None,
            max_message: None,
        }
    }

    pub fn min_rows(mut self, min: usize, message: Option<&str>) -> Self {
        self.min_rows = min;
        self.min_message = message.map(str::to_string);
        self
    }

    pub fn max_rows(mut self, max: usize, message: Option<&str>) -> Self {
        self.max_rows = Some(max);
        self.max_message = message.map(str::to_string);
        self
    }

    pub(crate) fn resolved_min_message(&self) -> String {
        self.min_message.clone().unwrap_or_else(|| match self.min_rows {
            1 => "must have at least one item".to_string(),
            n => format!("must have at least {} items", n),
        })
    }

    pub(crate) fn resolved_max_message(&self) -> String {
        self.max_message.clone().unwrap_or_else(|| match self.max_rows {
            Some(1) => "must have at most one item".to_string(),
            Some(n) => format!("must have at most {} items", n),
            None => String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cardinality_messages() {
        let slot = SlotSpec::new("items", "item").min_rows(1, None);
        assert_eq!(slot.resolved_min_message(), "must have at least one item");
        let slot = SlotSpec::new("items", "item").min_rows(3, None).max_rows(5, None);
        assert_eq!(slot.resolved_min_message(), "must have at least 3 items");
        assert_eq!(slot.resolved_max_message(), "must have at most 5 items");
        let slot = SlotSpec::new("items", "item").min_rows(2, Some("add two lines"));
        assert_eq!(slot.resolved_min_message(), "add two lines");
    }
}
