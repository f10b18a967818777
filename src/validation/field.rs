//! Scalar validation: coercion, declared constraints, refine rules.

use formkit_types::{FieldError, FieldValue};

use crate::schema::{
    Check, CompiledField, CompiledRefine, Constraint, FieldKind, RefineContext,
};

impl CompiledField {
    /// Coerce raw input and run the declared constraints in order.
    ///
    /// The first failing constraint is reported. Optional fields accept empty
    /// input as [`FieldValue::Empty`] without running constraints.
    pub fn validate(&self, raw: &FieldValue) -> Result<FieldValue, FieldError> {
        if self.is_optional() && raw.is_empty() {
            return Ok(FieldValue::Empty);
        }
        let value = coerce(self.kind(), raw)?;
        for check in &self.checks {
            if !passes(check, &value) {
                return Err(FieldError::constraint(check_message(check)));
            }
        }
        Ok(value)
    }

    /// Run refine rules against a value that already passed [`Self::validate`]
    pub fn check_refines(&self, value: &FieldValue, ctx: &RefineContext<'_>) -> Result<(), FieldError> {
        if value.is_empty() && self.is_optional() {
            return Ok(());
        }
        for refine in &self.refines {
            let ok = match refine {
                CompiledRefine::MultipleOf { value: step, .. } => {
                    value.as_number().is_some_and(|n| is_multiple(n, *step))
                }
                CompiledRefine::EqualsField { field, .. } => ctx.sibling(field) == Some(value),
                CompiledRefine::Named { predicate, .. } => predicate.check(value, ctx),
            };
            if !ok {
                return Err(FieldError::cross_field(refine_message(refine)));
            }
        }
        Ok(())
    }
}

/// Convert raw input to the kind's semantic type
pub(crate) fn coerce(kind: &FieldKind, raw: &FieldValue) -> Result<FieldValue, FieldError> {
    let fail = || FieldError::coercion(kind.type_message());
    match kind {
        FieldKind::Text { .. } => match raw {
            FieldValue::Text(s) => Ok(FieldValue::Text(s.clone())),
            _ => Err(fail()),
        },
        FieldKind::Number { integer, .. } => {
            let n = raw.as_number().ok_or_else(fail)?;
            if *integer && n.fract() != 0.0 {
                return Err(fail());
            }
            Ok(FieldValue::Number(n))
        }
        FieldKind::Boolean { .. } => match raw {
            FieldValue::Bool(b) => Ok(FieldValue::Bool(*b)),
            FieldValue::Text(s) => match s.trim() {
                "true" | "on" => Ok(FieldValue::Bool(true)),
                "false" | "off" => Ok(FieldValue::Bool(false)),
                _ => Err(fail()),
            },
            _ => Err(fail()),
        },
        FieldKind::Enum { values, .. } => match raw {
            FieldValue::Text(s) if values.iter().any(|v| v == s) => Ok(FieldValue::Text(s.clone())),
            _ => Err(fail()),
        },
    }
}

fn passes(check: &Check, value: &FieldValue) -> bool {
    match check {
        Check::Pattern { regex, .. } => value.as_text().is_some_and(|t| regex.is_match(t)),
        Check::Email { .. } => value.as_text().is_some_and(|t| Check::email_regex().is_match(t)),
        Check::Rule(rule) => passes_rule(rule, value),
    }
}

fn passes_rule(rule: &Constraint, value: &FieldValue) -> bool {
    match rule {
        Constraint::MinLength { value: min, .. } => {
            value.as_text().is_some_and(|t| t.chars().count() >= *min)
        }
        Constraint::MaxLength { value: max, .. } => {
            value.as_text().is_some_and(|t| t.chars().count() <= *max)
        }
        Constraint::NotBlank { .. } => value.as_text().is_some_and(|t| !t.trim().is_empty()),
        Constraint::OneOf { values, .. } => {
            value.as_text().is_some_and(|t| values.iter().any(|v| v == t))
        }
        Constraint::Gt { value: bound, .. } => value.as_number().is_some_and(|n| n > *bound),
        Constraint::Gte { value: bound, .. } => value.as_number().is_some_and(|n| n >= *bound),
        Constraint::Lt { value: bound, .. } => value.as_number().is_some_and(|n| n < *bound),
        Constraint::Lte { value: bound, .. } => value.as_number().is_some_and(|n| n <= *bound),
        // compiled into Check::Pattern / Check::Email
        Constraint::Pattern { .. } | Constraint::Email { .. } => false,
    }
}

fn is_multiple(n: f64, step: f64) -> bool {
    let quotient = (n / step).round();
    (n - quotient * step).abs() <= 1e-9 * n.abs().max(1.0)
}

fn check_message(check: &Check) -> &str {
    match check {
        Check::Rule(rule) => rule.message(),
        Check::Pattern { message, .. } | Check::Email { message } => message,
    }
}

fn refine_message(refine: &CompiledRefine) -> &str {
    match refine {
        CompiledRefine::MultipleOf { message, .. }
        | CompiledRefine::EqualsField { message, .. }
        | CompiledRefine::Named { message, .. } => message,
    }
}
