//! Form Types - Level 1 Foundation Types
//!
//! Pure data structures shared by every layer of the form engine. This crate
//! knows nothing about schemas, validation rules or sessions; it only defines
//! the shapes those layers exchange.
//!
//! ## Contents
//!
//! - [`FieldValue`]: a raw or normalized scalar leaf
//! - [`RowId`] / [`FieldPath`]: stable row identity and addressing
//! - [`RecordValues`] / [`RowList`]: the value tree (repeatable slots keep an
//!   arena of rows plus a separate display order)
//! - [`RecordErrors`] / [`SlotErrors`] / [`FieldError`]: the error tree that
//!   mirrors the value tree
//!
//! ## Rules
//!
//! 1. **NO BUSINESS LOGIC** - validation lives in `formkit`
//! 2. **SERIALIZABLE** - every type supports serde (snapshots are published as JSON)
//! 3. **THREAD SAFE** - all types are `Send + Sync`

mod errors;
mod path;
mod tree;
mod value;

pub use errors::{ErrorKind, FieldError, RecordErrors, RowErrors, SlotErrors, ROOT_KEY};
pub use path::{FieldPath, PathError, PathSegment, RowId};
pub use tree::{RecordValues, RowList, ValueError};
pub use value::FieldValue;
