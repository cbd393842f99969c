//! Statechart model: document parsing, the arena IR, path resolution, and
//! validation.
//!
//! The pipeline owns exactly one mutable phase: [`Model::from_yaml_str`]
//! builds the tree, then [`validate`] proves it well-formed, and everything
//! downstream (planning, DOT, code emission) reads it immutably.

pub mod doc;
pub mod error;
pub mod ir;
pub mod path;
pub mod validate;

pub use error::{ModelError, Result};
pub use ir::{ContextField, Guard, Hooks, Model, State, StateId, StateKind, StateTree, Transition};
pub use path::{display_path, Resolution, TargetExpr};
pub use validate::validate;
