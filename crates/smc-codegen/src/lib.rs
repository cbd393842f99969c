//! Code generation for the statechart compiler: transition planning, DOT
//! rendering, and the template-method emission engine with per-language
//! backends (C, Rust, Python).
//!
//! The shared skeleton lives in [`generate`]; backends only supply syntax
//! hooks, template bodies, and final file assembly.

pub mod backend;
pub mod dot;
pub mod error;
pub mod generate;
pub mod plan;

pub use backend::{Artifact, Language, LanguageBackend};
pub use error::{CodegenError, Result};
pub use generate::generate;
pub use plan::{lca_index, plan_termination, plan_transition, EntryStep, TransitionPlan};
