//! formkit: schema-driven dynamic form validation and submission
//!
//! This crate contains the form engine with NO rendering or transport:
//! - Declarative, serializable schemas (fields, constraints, refine rules,
//!   repeatable row slots, derived aggregates)
//! - A compile step that resolves record references and compiles patterns
//! - A pure validation engine producing a normalized tree and an error tree
//! - A list controller with stable row identity
//! - A form session driving the validate/submit state machine
//! - A YAML/JSON schema loader
//!
//! # Architecture
//!
//! ```text
//! FormSchema (YAML/JSON) ──► compile() ──► CompiledSchema
//!                                               │
//!      mutation event ──► FormSession ──► validate() ──► errors + aggregates
//!                              │                              │
//!                              └──── submit() ──► SubmitHandler (host)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use formkit::{FormSession, SchemaLoader};
//!
//! let schema = SchemaLoader::from_env().load("user-registration")?;
//! let session = FormSession::new(schema.into(), handler, RecordValues::new());
//! session.set_field(&"age".parse()?, 42).await?;
//! let outcome = session.submit().await;
//! ```

pub mod aggregate;
pub mod error;
pub mod list;
pub mod loader;
pub mod schema;
pub mod session;
pub mod validation;

pub use formkit_types::{
    ErrorKind, FieldError, FieldPath, FieldValue, PathError, PathSegment, RecordErrors,
    RecordValues, RowErrors, RowId, RowList, SlotErrors, ValueError, ROOT_KEY,
};

pub use aggregate::{AggregateOp, AggregateSpec, Aggregates};
pub use error::{ListError, SchemaError, SessionError};
pub use list::ListController;
pub use loader::{SchemaLoader, SchemaRegistry};
pub use schema::{
    CompiledField, CompiledRecord, CompiledSchema, CompiledSlot, Constraint, FieldKind,
    FieldSpec, FormSchema, RecordSpec, RefineContext, RefinePredicate, RefineRegistry,
    RefineRule, SlotSpec,
};
pub use session::{
    FieldBinding, FormSession, FormSnapshot, FormState, FormWatcher, ListBinding, RowBinding,
    SessionBinding, StateTransition, SubmitFailure, SubmitHandler, SubmitOutcome, SubmitRecord,
};
pub use validation::{validate, validate_field, ValidationOutcome};
