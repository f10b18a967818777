//! Form Session - owns one form's value tree and drives its state machine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │            FormSession (cloneable handle)                    │
//! ├──────────────────────────────────────────────────────────────┤
//! │  schema:  Arc<CompiledSchema>                                │
//! │  handler: Arc<dyn SubmitHandler>                             │
//! │  inner:   Arc<RwLock<SessionInner>>  values/errors/state     │
//! │  sender:  watch::Sender<FormSnapshot>                        │
//! └──────────────────────────────────────────────────────────────┘
//!        ▲ events (set_field, append_row, ..)      │ snapshots
//!        │                                         ▼
//!   rendering layer  ◄──────────────────────  subscribers
//! ```
//!
//! Every event takes the write lock, mutates, re-validates the whole tree,
//! publishes a snapshot and releases. `submit` holds the lock only to flip
//! the `submitting` flag and to settle; the handler is awaited with the lock
//! released, so inputs stay editable and a second `submit` sees the flag and
//! returns [`SubmitOutcome::Ignored`].

mod binding;
mod handler;
mod state;

pub use binding::{FieldBinding, ListBinding, RowBinding, SessionBinding};
pub use handler::{SubmitFailure, SubmitHandler, SubmitOutcome, SubmitRecord};
pub use state::{FormState, StateTransition};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use formkit_types::{
    FieldError, FieldPath, FieldValue, PathSegment, RecordErrors, RecordValues, RowId,
};

use crate::aggregate::Aggregates;
use crate::error::{ListError, SessionError};
use crate::list::ListController;
use crate::schema::CompiledSchema;
use crate::validation::validate;

/// Transitions kept per session
const TRANSITION_HISTORY: usize = 64;

/// Settled submissions kept per session
const SUBMIT_HISTORY: usize = 32;

/// Session watcher - yields a new snapshot after every event
pub type FormWatcher = watch::Receiver<FormSnapshot>;

/// Everything a renderer needs, published after every event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormSnapshot {
    pub session_id: Uuid,
    /// Incremented on each event
    pub version: u64,
    pub state: FormState,
    pub values: RecordValues,
    pub errors: RecordErrors,
    pub valid: bool,
    pub submitting: bool,
    pub aggregates: Aggregates,
    pub touched: BTreeSet<FieldPath>,
    pub submit_count: u32,
    pub updated_at: DateTime<Utc>,
}

struct SessionInner {
    state: FormState,
    values: RecordValues,
    normalized: RecordValues,
    errors: RecordErrors,
    valid: bool,
    submitting: bool,
    /// Root message of the last failed submission, cleared on the next submit
    submit_error: Option<FieldError>,
    aggregates: Aggregates,
    touched: BTreeSet<FieldPath>,
    submit_count: u32,
    submissions: Vec<SubmitRecord>,
    transitions: Vec<StateTransition>,
    version: u64,
}

impl SessionInner {
    fn mount(schema: &CompiledSchema, values: RecordValues) -> Self {
        let mut inner = Self {
            state: FormState::Idle,
            values,
            normalized: RecordValues::new(),
            errors: RecordErrors::new(),
            valid: false,
            submitting: false,
            submit_error: None,
            aggregates: Aggregates::default(),
            touched: BTreeSet::new(),
            submit_count: 0,
            submissions: Vec::new(),
            transitions: Vec::new(),
            version: 0,
        };
        inner.recompute(schema);
        inner
    }

    /// Re-derive errors, normalized values and aggregates from `values`
    fn recompute(&mut self, schema: &CompiledSchema) {
        let outcome = validate(schema, &self.values);
        self.normalized = outcome.normalized;
        self.errors = outcome.errors;
        self.errors.set_root(self.submit_error.clone());
        self.valid = outcome.valid;
        self.aggregates = Aggregates::compute(schema.aggregates(), &self.values);
    }

    fn transition(&mut self, session_id: Uuid, to: FormState, reason: &str) {
        debug_assert!(
            self.state.can_transition_to(to),
            "illegal form transition {} -> {}",
            self.state,
            to
        );
        let from = std::mem::replace(&mut self.state, to);
        tracing::debug!(session_id = %session_id, %from, %to, reason, "form state transition");
        self.transitions.push(StateTransition {
            from,
            to,
            at: Utc::now(),
            reason: reason.to_string(),
        });
        if self.transitions.len() > TRANSITION_HISTORY {
            self.transitions.remove(0);
        }
    }

    /// Whole-tree re-validation after a value mutation.
    ///
    /// While a submission is in flight the state stays `Submitting`; values,
    /// errors and aggregates are still refreshed.
    fn revalidate(&mut self, schema: &CompiledSchema, session_id: Uuid, reason: &str) {
        self.recompute(schema);
        if self.submitting {
            return;
        }
        if self.state.is_settled() {
            self.transition(session_id, FormState::Idle, reason);
        }
        self.transition(session_id, FormState::Validating, reason);
        let next = if self.valid {
            FormState::Valid
        } else {
            FormState::Invalid
        };
        self.transition(session_id, next, reason);
    }

    /// A rejected list operation wrote a cardinality message into the error
    /// tree; bring `valid` and the state in line with it.
    fn reject_list_op(&mut self, session_id: Uuid, reason: &str) {
        self.valid = self.errors.first_error().is_none();
        if self.submitting {
            return;
        }
        let next = if self.valid {
            FormState::Valid
        } else {
            FormState::Invalid
        };
        if self.state == next {
            return;
        }
        if self.state.is_settled() {
            self.transition(session_id, FormState::Idle, reason);
        }
        self.transition(session_id, FormState::Validating, reason);
        self.transition(session_id, next, reason);
    }

    fn begin_submit(
        &mut self,
        schema: &CompiledSchema,
        session_id: Uuid,
    ) -> Result<RecordValues, SubmitOutcome> {
        if self.submitting {
            tracing::debug!(session_id = %session_id, "submit ignored, submission in flight");
            return Err(SubmitOutcome::Ignored);
        }
        self.submit_error = None;
        for path in schema.leaf_paths(&self.values) {
            self.touched.insert(path);
        }
        self.revalidate(schema, session_id, "submit");
        if !self.valid {
            tracing::debug!(
                session_id = %session_id,
                messages = self.errors.message_count(),
                "submit aborted, form is invalid"
            );
            let outcome = SubmitOutcome::Rejected {
                errors: self.errors.clone(),
            };
            return Err(outcome);
        }
        self.submitting = true;
        self.submit_count += 1;
        self.transition(session_id, FormState::Submitting, "submit");
        Ok(self.normalized.clone())
    }

    fn finish_submit(
        &mut self,
        session_id: Uuid,
        started_at: DateTime<Utc>,
        result: Result<Option<serde_json::Value>, SubmitFailure>,
    ) -> SubmitOutcome {
        self.submitting = false;
        let outcome = match result {
            Ok(result) => {
                tracing::info!(session_id = %session_id, attempt = self.submit_count, "submit succeeded");
                self.transition(session_id, FormState::SubmitSucceeded, "submit handler succeeded");
                SubmitOutcome::Succeeded { result }
            }
            Err(failure) => {
                tracing::warn!(
                    session_id = %session_id,
                    attempt = self.submit_count,
                    reason = %failure.reason,
                    "submit failed"
                );
                self.submit_error = Some(FieldError::submit(failure.reason.clone()));
                self.errors.set_root(self.submit_error.clone());
                self.transition(session_id, FormState::SubmitFailed, "submit handler failed");
                SubmitOutcome::Failed {
                    reason: failure.reason,
                }
            }
        };
        self.submissions.push(SubmitRecord {
            attempt: self.submit_count,
            started_at,
            finished_at: Utc::now(),
            outcome: outcome.clone(),
        });
        if self.submissions.len() > SUBMIT_HISTORY {
            self.submissions.remove(0);
        }
        outcome
    }

    fn snapshot(&self, session_id: Uuid) -> FormSnapshot {
        FormSnapshot {
            session_id,
            version: self.version,
            state: self.state,
            values: self.values.clone(),
            errors: self.errors.clone(),
            valid: self.valid,
            submitting: self.submitting,
            aggregates: self.aggregates.clone(),
            touched: self.touched.clone(),
            submit_count: self.submit_count,
            updated_at: Utc::now(),
        }
    }
}

/// A mounted form.
///
/// Clones share the same session; the value and error trees are only ever
/// written through these methods.
#[derive(Clone)]
pub struct FormSession {
    id: Uuid,
    schema: Arc<CompiledSchema>,
    handler: Arc<dyn SubmitHandler>,
    inner: Arc<RwLock<SessionInner>>,
    sender: Arc<watch::Sender<FormSnapshot>>,
}

impl std::fmt::Debug for FormSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormSession")
            .field("id", &self.id)
            .field("schema", &self.schema.name())
            .finish_non_exhaustive()
    }
}

impl FormSession {
    /// Mount a form with initial values. Errors are computed immediately; the
    /// session starts `Idle`.
    pub fn new(
        schema: Arc<CompiledSchema>,
        handler: Arc<dyn SubmitHandler>,
        initial: RecordValues,
    ) -> Self {
        let id = Uuid::new_v4();
        let inner = SessionInner::mount(&schema, initial);
        let (sender, _rx) = watch::channel(inner.snapshot(id));
        tracing::debug!(
            session_id = %id,
            schema = schema.name(),
            valid = inner.valid,
            "form session mounted"
        );
        Self {
            id,
            schema,
            handler,
            inner: Arc::new(RwLock::new(inner)),
            sender: Arc::new(sender),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    /// Apply one event under the write lock and publish the result
    async fn update<T>(&self, f: impl FnOnce(&mut SessionInner) -> T) -> T {
        let mut inner = self.inner.write().await;
        let result = f(&mut *inner);
        inner.version += 1;
        self.sender.send_replace(inner.snapshot(self.id));
        result
    }

    /// Field edit (`onChange`). Marks the field touched.
    pub async fn set_field(
        &self,
        path: &FieldPath,
        value: impl Into<FieldValue>,
    ) -> Result<(), SessionError> {
        if self.schema.field_at(path).is_none() {
            return Err(SessionError::UnknownField(path.clone()));
        }
        let value = value.into();
        self.update(|inner| -> Result<(), SessionError> {
            inner
                .values
                .set(path, value)
                .ok_or_else(|| SessionError::UnknownField(path.clone()))?;
            inner.touched.insert(path.clone());
            inner.revalidate(&self.schema, self.id, "set_field");
            Ok(())
        })
        .await
    }

    /// Mark a field touched (blur) without changing its value
    pub async fn touch(&self, path: &FieldPath) -> Result<(), SessionError> {
        if self.schema.field_at(path).is_none() {
            return Err(SessionError::UnknownField(path.clone()));
        }
        self.update(|inner| {
            inner.touched.insert(path.clone());
        })
        .await;
        Ok(())
    }

    pub async fn append_row(&self, slot: &FieldPath, row: RecordValues) -> Result<RowId, SessionError> {
        self.update(|inner| -> Result<RowId, SessionError> {
            let id = ListController::new(&self.schema)
                .append(&mut inner.values, &mut inner.errors, slot, row)
                .inspect_err(|err| {
                    if err.is_cardinality() {
                        inner.reject_list_op(self.id, "append_row");
                    }
                })?;
            inner.revalidate(&self.schema, self.id, "append_row");
            Ok(id)
        })
        .await
    }

    pub async fn insert_row(
        &self,
        slot: &FieldPath,
        index: usize,
        row: RecordValues,
    ) -> Result<RowId, SessionError> {
        self.update(|inner| -> Result<RowId, SessionError> {
            let id = ListController::new(&self.schema)
                .insert(&mut inner.values, &mut inner.errors, slot, index, row)
                .inspect_err(|err| {
                    if err.is_cardinality() {
                        inner.reject_list_op(self.id, "insert_row");
                    }
                })?;
            inner.revalidate(&self.schema, self.id, "insert_row");
            Ok(id)
        })
        .await
    }

    /// Remove exactly one row. Rejected below the slot's minimum, with the
    /// slot's cardinality message shown on the slot.
    pub async fn remove_row(&self, slot: &FieldPath, row: RowId) -> Result<RecordValues, SessionError> {
        self.update(|inner| -> Result<RecordValues, SessionError> {
            let removed = ListController::new(&self.schema)
                .remove(&mut inner.values, &mut inner.errors, slot, row)
                .inspect_err(|err| {
                    if err.is_cardinality() {
                        inner.reject_list_op(self.id, "remove_row");
                    }
                })?;
            let row_path = slot.clone().with_row(row);
            inner.touched.retain(|p| !p.starts_with(&row_path));
            inner.revalidate(&self.schema, self.id, "remove_row");
            Ok(removed)
        })
        .await
    }

    pub async fn move_row(&self, slot: &FieldPath, row: RowId, index: usize) -> Result<(), SessionError> {
        self.update(|inner| -> Result<(), SessionError> {
            ListController::new(&self.schema).move_row(&mut inner.values, slot, row, index)?;
            inner.revalidate(&self.schema, self.id, "move_row");
            Ok(())
        })
        .await
    }

    /// Replace the value tree, clearing touched fields and the submit message.
    ///
    /// An in-flight submission still settles afterwards.
    pub async fn reset(&self, values: RecordValues) {
        self.update(|inner| {
            inner.values = values;
            inner.touched.clear();
            inner.submit_error = None;
            if !inner.submitting && inner.state != FormState::Idle {
                inner.transition(self.id, FormState::Idle, "reset");
            }
            inner.revalidate(&self.schema, self.id, "reset");
        })
        .await
    }

    /// Explicit submit.
    ///
    /// Re-validates first; an invalid form is rejected without calling the
    /// handler. At most one submission is in flight; a call made meanwhile
    /// returns [`SubmitOutcome::Ignored`].
    ///
    /// The handler runs on its own task and the session settles from a second
    /// task, so a panicking handler settles as `SubmitFailed` and dropping
    /// this future does not leave the session in `Submitting`.
    pub async fn submit(&self) -> SubmitOutcome {
        let prepared = self
            .update(|inner| inner.begin_submit(&self.schema, self.id))
            .await;
        let values = match prepared {
            Ok(values) => values,
            Err(outcome) => return outcome,
        };

        let started_at = Utc::now();
        tracing::info!(session_id = %self.id, schema = self.schema.name(), "submitting form");

        let session = self.clone();
        let settle = tokio::spawn(async move {
            let handler = session.handler.clone();
            let result = match tokio::spawn(async move { handler.submit(values).await }).await {
                Ok(result) => result,
                Err(err) => Err(SubmitFailure::from(err)),
            };
            session
                .update(|inner| inner.finish_submit(session.id, started_at, result))
                .await
        });

        match settle.await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(session_id = %self.id, error = %err, "submit settlement task failed");
                SubmitOutcome::Failed {
                    reason: SubmitFailure::from(err).reason,
                }
            }
        }
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> FormSnapshot {
        self.sender.borrow().clone()
    }

    /// Receiver yielding a snapshot after every event.
    ///
    /// ```ignore
    /// let mut rx = session.subscribe();
    /// while rx.changed().await.is_ok() {
    ///     render(&rx.borrow());
    /// }
    /// ```
    pub fn subscribe(&self) -> FormWatcher {
        self.sender.subscribe()
    }

    pub async fn state(&self) -> FormState {
        self.inner.read().await.state
    }

    pub async fn values(&self) -> RecordValues {
        self.inner.read().await.values.clone()
    }

    /// Coerced values as they would be submitted
    pub async fn normalized(&self) -> RecordValues {
        self.inner.read().await.normalized.clone()
    }

    pub async fn errors(&self) -> RecordErrors {
        self.inner.read().await.errors.clone()
    }

    pub async fn is_valid(&self) -> bool {
        self.inner.read().await.valid
    }

    pub async fn is_submitting(&self) -> bool {
        self.inner.read().await.submitting
    }

    pub async fn aggregates(&self) -> Aggregates {
        self.inner.read().await.aggregates.clone()
    }

    pub async fn aggregate(&self, name: &str) -> Option<f64> {
        self.inner.read().await.aggregates.get(name)
    }

    /// Number of handler invocations
    pub async fn submit_count(&self) -> u32 {
        self.inner.read().await.submit_count
    }

    pub async fn last_outcome(&self) -> Option<SubmitOutcome> {
        let inner = self.inner.read().await;
        inner.submissions.last().map(|r| r.outcome.clone())
    }

    pub async fn submissions(&self) -> Vec<SubmitRecord> {
        self.inner.read().await.submissions.clone()
    }

    /// Most recent state transitions, oldest first
    pub async fn transitions(&self) -> Vec<StateTransition> {
        self.inner.read().await.transitions.clone()
    }

    /// Binding for the field at `path`
    pub async fn field(&self, path: &FieldPath) -> Result<FieldBinding, SessionError> {
        let unknown = || SessionError::UnknownField(path.clone());
        self.schema.field_at(path).ok_or_else(unknown)?;
        let inner = self.inner.read().await;
        inner
            .values
            .record_at(parent_segments(path))
            .ok_or_else(unknown)?;
        Ok(FieldBinding {
            path: path.clone(),
            value: inner.values.get(path).cloned().unwrap_or_default(),
            error: inner.errors.get(path).cloned(),
            touched: inner.touched.contains(path),
        })
    }

    /// Binding for the repeatable slot at `slot`
    pub async fn list(&self, slot: &FieldPath) -> Result<ListBinding, SessionError> {
        let unknown = || SessionError::List(ListError::UnknownSlot(slot.clone()));
        let spec = self.schema.slot_at(slot).ok_or_else(unknown)?;
        let inner = self.inner.read().await;
        inner
            .values
            .record_at(parent_segments(slot))
            .ok_or_else(unknown)?;

        let slot_errors = inner.errors.slot_at(slot);
        let rows: Vec<RowBinding> = inner
            .values
            .slot_at(slot)
            .map(|rows| {
                rows.iter()
                    .enumerate()
                    .map(|(index, (id, values))| RowBinding {
                        id,
                        index,
                        path: slot.clone().with_row(id),
                        values: values.clone(),
                        errors: slot_errors
                            .and_then(|s| s.row(id))
                            .filter(|e| !e.is_empty())
                            .cloned(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let len = rows.len();
        Ok(ListBinding {
            path: slot.clone(),
            error: slot_errors.and_then(|s| s.root.clone()),
            can_append: spec.max_rows.map_or(true, |max| len < max),
            can_remove: len > spec.min_rows,
            rows,
        })
    }

    /// Session-level binding
    pub async fn binding(&self) -> SessionBinding {
        let inner = self.inner.read().await;
        SessionBinding {
            state: inner.state,
            submitting: inner.submitting,
            is_valid: inner.valid,
            can_submit: inner.valid && !inner.submitting,
            aggregates: inner.aggregates.clone(),
            root_error: inner.errors.root().cloned(),
            first_error: inner
                .errors
                .first_error()
                .map(|(path, error)| (path, error.clone())),
        }
    }
}

fn parent_segments(path: &FieldPath) -> &[PathSegment] {
    path.segments()
        .split_last()
        .map(|(_, parent)| parent)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Constraint, FieldSpec, FormSchema, RecordSpec, SlotSpec};
    use crate::AggregateSpec;
    use async_trait::async_trait;
    use formkit_types::{ErrorKind, RowList};

    struct Accept;

    #[async_trait]
    impl SubmitHandler for Accept {
        async fn submit(&self, _values: RecordValues) -> Result<Option<serde_json::Value>, SubmitFailure> {
            Ok(Some(serde_json::json!({"id": 1})))
        }
    }

    struct Refuse;

    #[async_trait]
    impl SubmitHandler for Refuse {
        async fn submit(&self, _values: RecordValues) -> Result<Option<serde_json::Value>, SubmitFailure> {
            Err(SubmitFailure::new("server unavailable"))
        }
    }

    fn schema() -> Arc<CompiledSchema> {
        Arc::new(
            FormSchema::new("order", "order")
                .record(
                    "order",
                    RecordSpec::new()
                        .field(
                            FieldSpec::number("age")
                                .type_message("enter valid number")
                                .with(Constraint::gt(10.0, "age must be greater than 10")),
                        )
                        .slot(SlotSpec::new("items", "item").min_rows(1, None)),
                )
                .record(
                    "item",
                    RecordSpec::new().field(
                        FieldSpec::number("price").with(Constraint::gte(1.0, "Item price is required")),
                    ),
                )
                .aggregate(AggregateSpec::sum("total", "items", "price"))
                .compile()
                .unwrap(),
        )
    }

    fn valid_values() -> RecordValues {
        RecordValues::new().with_field("age", 42.0).with_slot(
            "items",
            RowList::from_rows([RecordValues::new().with_field("price", 3.0)]),
        )
    }

    fn states(transitions: &[StateTransition]) -> Vec<FormState> {
        transitions.iter().map(|t| t.to).collect()
    }

    #[tokio::test]
    async fn mount_validates_but_stays_idle() {
        let session = FormSession::new(schema(), Arc::new(Accept), RecordValues::new());
        assert_eq!(session.state().await, FormState::Idle);
        assert!(!session.is_valid().await);
        assert!(session.transitions().await.is_empty());
        assert_eq!(session.snapshot().version, 0);
    }

    #[tokio::test]
    async fn edits_drive_validation_states() {
        let session = FormSession::new(schema(), Arc::new(Accept), valid_values());
        let age = FieldPath::field("age");

        session.set_field(&age, "5").await.unwrap();
        assert_eq!(session.state().await, FormState::Invalid);
        let binding = session.field(&age).await.unwrap();
        assert_eq!(binding.error.map(|e| e.message), Some("age must be greater than 10".into()));
        assert!(binding.touched);

        session.set_field(&age, "42").await.unwrap();
        assert_eq!(session.state().await, FormState::Valid);
        assert_eq!(
            states(&session.transitions().await),
            vec![
                FormState::Validating,
                FormState::Invalid,
                FormState::Validating,
                FormState::Valid
            ]
        );
        assert_eq!(session.snapshot().version, 2);
    }

    #[tokio::test]
    async fn unknown_paths_are_errors() {
        let session = FormSession::new(schema(), Arc::new(Accept), valid_values());
        let bogus = FieldPath::field("nope");
        assert_eq!(
            session.set_field(&bogus, 1.0).await,
            Err(SessionError::UnknownField(bogus.clone()))
        );
        let missing_row: FieldPath = "items.#99.price".parse().unwrap();
        assert!(session.set_field(&missing_row, 1.0).await.is_err());
        assert!(session.list(&bogus).await.is_err());
    }

    #[tokio::test]
    async fn successful_submit_settles_and_returns_to_idle() {
        let session = FormSession::new(schema(), Arc::new(Accept), valid_values());
        let outcome = session.submit().await;
        assert_eq!(
            outcome,
            SubmitOutcome::Succeeded {
                result: Some(serde_json::json!({"id": 1}))
            }
        );
        assert_eq!(session.state().await, FormState::SubmitSucceeded);
        assert_eq!(session.submit_count().await, 1);
        assert_eq!(session.last_outcome().await, Some(outcome));

        session.set_field(&FieldPath::field("age"), 50.0).await.unwrap();
        let tail: Vec<FormState> = states(&session.transitions().await)
            .into_iter()
            .rev()
            .take(3)
            .collect();
        assert_eq!(tail, vec![FormState::Valid, FormState::Validating, FormState::Idle]);
    }

    #[tokio::test]
    async fn failed_submit_sets_root_error_until_next_submit() {
        let session = FormSession::new(schema(), Arc::new(Refuse), valid_values());
        let outcome = session.submit().await;
        assert_eq!(
            outcome,
            SubmitOutcome::Failed {
                reason: "server unavailable".into()
            }
        );
        assert_eq!(session.state().await, FormState::SubmitFailed);

        let root = session.binding().await.root_error.unwrap();
        assert_eq!(root.kind, ErrorKind::Submit);
        assert_eq!(root.message, "server unavailable");
        // validity is about field rules only
        assert!(session.is_valid().await);

        // edits keep the message
        session.set_field(&FieldPath::field("age"), 43.0).await.unwrap();
        assert!(session.errors().await.root().is_some());

        session.reset(valid_values()).await;
        assert!(session.errors().await.root().is_none());
    }

    #[tokio::test]
    async fn invalid_submit_never_reaches_handler() {
        let session = FormSession::new(schema(), Arc::new(Accept), RecordValues::new());
        let outcome = session.submit().await;
        assert!(matches!(outcome, SubmitOutcome::Rejected { .. }));
        assert_eq!(session.state().await, FormState::Invalid);
        assert_eq!(session.submit_count().await, 0);
        // every leaf is touched after a submit attempt
        assert!(session.snapshot().touched.contains(&FieldPath::field("age")));
    }

    #[tokio::test]
    async fn list_events_update_aggregates_and_bindings() {
        let session = FormSession::new(schema(), Arc::new(Accept), valid_values());
        let items = FieldPath::field("items");
        let first = session.list(&items).await.unwrap().rows[0].id;
        assert!(!session.list(&items).await.unwrap().can_remove);

        let second = session
            .append_row(&items, RecordValues::new().with_field("price", "abc"))
            .await
            .unwrap();
        assert_eq!(session.aggregate("total").await, Some(3.0));
        assert_eq!(session.state().await, FormState::Invalid);

        let list = session.list(&items).await.unwrap();
        assert_eq!(list.rows.len(), 2);
        assert!(list.rows[0].errors.is_none());
        assert_eq!(list.rows[1].index, 1);
        assert!(list.rows[1].errors.is_some());

        session.remove_row(&items, second).await.unwrap();
        assert_eq!(session.state().await, FormState::Valid);

        let rejected = session.remove_row(&items, first).await;
        assert!(matches!(
            rejected,
            Err(SessionError::List(ListError::BelowMinimum { min: 1, .. }))
        ));
        let list = session.list(&items).await.unwrap();
        assert_eq!(list.rows.len(), 1);
        assert_eq!(list.error.map(|e| e.kind), Some(ErrorKind::SlotCardinality));
    }

    #[tokio::test]
    async fn rejected_removal_keeps_validity_in_step_with_errors() {
        let session = FormSession::new(schema(), Arc::new(Accept), valid_values());
        let items = FieldPath::field("items");
        session.touch(&FieldPath::field("age")).await.unwrap();
        session.set_field(&FieldPath::field("age"), 42.0).await.unwrap();
        assert_eq!(session.state().await, FormState::Valid);

        let only = session.list(&items).await.unwrap().rows[0].id;
        assert!(session.remove_row(&items, only).await.is_err());

        let snapshot = session.snapshot();
        assert_eq!(snapshot.valid, snapshot.errors.is_empty());
        assert!(!snapshot.valid);
        assert_eq!(snapshot.state, FormState::Invalid);
        assert!(!session.binding().await.can_submit);

        // the next edit re-validates and clears the transient message
        session.set_field(&FieldPath::field("age"), 43.0).await.unwrap();
        let snapshot = session.snapshot();
        assert!(snapshot.valid);
        assert!(snapshot.errors.is_empty());
    }

    #[tokio::test]
    async fn submit_history_is_capped() {
        let session = FormSession::new(schema(), Arc::new(Accept), valid_values());
        let total = SUBMIT_HISTORY as u32 + 5;
        for _ in 0..total {
            assert!(session.submit().await.is_success());
        }
        let history = session.submissions().await;
        assert_eq!(history.len(), SUBMIT_HISTORY);
        assert_eq!(history.last().map(|r| r.attempt), Some(total));
        assert_eq!(history[0].attempt, 6);
        assert_eq!(session.submit_count().await, total);
    }

    #[tokio::test]
    async fn subscribers_see_every_event() {
        let session = FormSession::new(schema(), Arc::new(Accept), valid_values());
        let mut rx = session.subscribe();
        session.touch(&FieldPath::field("age")).await.unwrap();
        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.version, 1);
        assert!(snapshot.touched.contains(&FieldPath::field("age")));
        assert_eq!(snapshot.session_id, session.id());
    }
}
