//! Field schema: scalar kind, ordered constraints and their messages.

use serde::{Deserialize, Serialize};

use super::refine::RefineRule;

/// Semantic type of a scalar field.
///
/// Each kind optionally carries the message reported when raw input cannot be
/// coerced to it ("enter valid number").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum FieldKind {
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Number {
        /// Reject values with a fractional part
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        integer: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Boolean {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Membership in a fixed literal set
    Enum {
        values: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl FieldKind {
    pub fn text() -> Self {
        FieldKind::Text { message: None }
    }

    pub fn number() -> Self {
        FieldKind::Number {
            integer: false,
            message: None,
        }
    }

    pub fn integer() -> Self {
        FieldKind::Number {
            integer: true,
            message: None,
        }
    }

    pub fn boolean() -> Self {
        FieldKind::Boolean { message: None }
    }

    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldKind::Enum {
            values: values.into_iter().map(Into::into).collect(),
            message: None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } => "text",
            FieldKind::Number { .. } => "number",
            FieldKind::Boolean { .. } => "boolean",
            FieldKind::Enum { .. } => "enum",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Number { .. })
    }

    /// Message reported on coercion failure
    pub fn type_message(&self) -> String {
        match self {
            FieldKind::Text { message } => message.clone().unwrap_or_else(|| "expected text".into()),
            FieldKind::Number { message, integer } => message.clone().unwrap_or_else(|| {
                if *integer {
                    "expected a whole number".into()
                } else {
                    "expected a number".into()
                }
            }),
            FieldKind::Boolean { message } => message
                .clone()
                .unwrap_or_else(|| "expected true or false".into()),
            FieldKind::Enum { message, values } => message
                .clone()
                .unwrap_or_else(|| format!("must be one of: {}", values.join(", "))),
        }
    }

    fn set_message(&mut self, text: String) {
        match self {
            FieldKind::Text { message }
            | FieldKind::Number { message, .. }
            | FieldKind::Boolean { message }
            | FieldKind::Enum { message, .. } => *message = Some(text),
        }
    }
}

/// A declared predicate over the coerced value plus its own message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum Constraint {
    MinLength { value: usize, message: String },
    MaxLength { value: usize, message: String },
    /// Regular expression the whole text must match somewhere
    Pattern { pattern: String, message: String },
    Email { message: String },
    /// Rejects text that is empty after trimming
    NotBlank { message: String },
    OneOf { values: Vec<String>, message: String },
    Gt { value: f64, message: String },
    Gte { value: f64, message: String },
    Lt { value: f64, message: String },
    Lte { value: f64, message: String },
}

impl Constraint {
    pub fn min_length(value: usize, message: impl Into<String>) -> Self {
        Constraint::MinLength {
            value,
            message: message.into(),
        }
    }

    pub fn max_length(value: usize, message: impl Into<String>) -> Self {
        Constraint::MaxLength {
            value,
            message: message.into(),
        }
    }

    pub fn pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Constraint::Pattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    pub fn email(message: impl Into<String>) -> Self {
        Constraint::Email {
            message: message.into(),
        }
    }

    pub fn not_blank(message: impl Into<String>) -> Self {
        Constraint::NotBlank {
            message: message.into(),
        }
    }

    pub fn one_of<I, S>(values: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Constraint::OneOf {
            values: values.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }

    pub fn gt(value: f64, message: impl Into<String>) -> Self {
        Constraint::Gt {
            value,
            message: message.into(),
        }
    }

    pub fn gte(value: f64, message: impl Into<String>) -> Self {
        Constraint::Gte {
            value,
            message: message.into(),
        }
    }

    pub fn lt(value: f64, message: impl Into<String>) -> Self {
        Constraint::Lt {
            value,
            message: message.into(),
        }
    }

    pub fn lte(value: f64, message: impl Into<String>) -> Self {
        Constraint::Lte {
            value,
            message: message.into(),
        }
    }

    pub fn rule_name(&self) -> &'static str {
        match self {
            Constraint::MinLength { .. } => "min_length",
            Constraint::MaxLength { .. } => "max_length",
            Constraint::Pattern { .. } => "pattern",
            Constraint::Email { .. } => "email",
            Constraint::NotBlank { .. } => "not_blank",
            Constraint::OneOf { .. } => "one_of",
            Constraint::Gt { .. } => "gt",
            Constraint::Gte { .. } => "gte",
            Constraint::Lt { .. } => "lt",
            Constraint::Lte { .. } => "lte",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Constraint::MinLength { message, .. }
            | Constraint::MaxLength { message, .. }
            | Constraint::Pattern { message, .. }
            | Constraint::Email { message }
            | Constraint::NotBlank { message }
            | Constraint::OneOf { message, .. }
            | Constraint::Gt { message, .. }
            | Constraint::Gte { message, .. }
            | Constraint::Lt { message, .. }
            | Constraint::Lte { message, .. } => message,
        }
    }

    /// Text rules apply to text fields, bounds to numeric fields
    pub fn applies_to(&self, kind: &FieldKind) -> bool {
        match self {
            Constraint::MinLength { .. }
            | Constraint::MaxLength { .. }
            | Constraint::Pattern { .. }
            | Constraint::Email { .. }
            | Constraint::NotBlank { .. }
            | Constraint::OneOf { .. } => matches!(kind, FieldKind::Text { .. }),
            Constraint::Gt { .. }
            | Constraint::Gte { .. }
            | Constraint::Lt { .. }
            | Constraint::Lte { .. } => kind.is_numeric(),
        }
    }
}

/// Declarative rule set for one scalar field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Empty input passes without running constraints
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    /// Evaluated in order; the first failure is reported
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    /// Evaluated after every constraint passed, against the whole tree
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refine: Vec<RefineRule>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            constraints: Vec::new(),
            refine: Vec::new(),
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::text())
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::number())
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::integer())
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::boolean())
    }

    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, FieldKind::enumeration(values))
    }

    /// Message used when raw input cannot be coerced to the kind
    pub fn type_message(mut self, message: impl Into<String>) -> Self {
        self.kind.set_message(message.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn refine(mut self, rule: RefineRule) -> Self {
        self.refine.push(rule);
        self
    }
}
