//! Serde document structs for the YAML statechart input.
//!
//! These mirror the on-disk shape one-to-one and carry no semantics; the
//! loader in `ir` turns a [`ModelDoc`] into the arena tree. Unknown keys are
//! ignored. Declaration order of states, decisions, and context fields is
//! significant, so mappings deserialize into [`IndexMap`].

use indexmap::IndexMap;
use serde::Deserialize;

/// A guard expression: either a YAML boolean or an opaque target-language
/// expression string. Absent guards are always-true.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GuardDoc {
    Bool(bool),
    Expr(String),
}

/// One transition as written in the document.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionDoc {
    #[serde(default)]
    pub guard: Option<GuardDoc>,
    #[serde(default)]
    pub action: Option<String>,
    /// Target path expression; `null` (or absent) means termination.
    #[serde(default)]
    pub to: Option<String>,
}

/// One state as written in the document. A state with a `states:` mapping is
/// composite; `orthogonal: true` makes its children parallel regions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateDoc {
    #[serde(default)]
    pub initial: Option<String>,
    #[serde(default)]
    pub states: IndexMap<String, StateDoc>,
    #[serde(default)]
    pub orthogonal: bool,
    #[serde(default)]
    pub history: bool,
    #[serde(default)]
    pub entry: Option<String>,
    #[serde(default)]
    pub exit: Option<String>,
    #[serde(default, rename = "do")]
    pub do_code: Option<String>,
    #[serde(default)]
    pub transitions: Vec<TransitionDoc>,
    #[serde(default)]
    pub decisions: IndexMap<String, Vec<TransitionDoc>>,
}

/// Global code hooks injected into every generated site of their kind.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HooksDoc {
    #[serde(default)]
    pub entry: Option<String>,
    #[serde(default)]
    pub exit: Option<String>,
    #[serde(default, rename = "do")]
    pub do_code: Option<String>,
    #[serde(default)]
    pub transition: Option<String>,
}

/// One user context field: name plus target-language type text.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextFieldDoc {
    pub name: String,
    #[serde(default, rename = "type")]
    pub ty: Option<String>,
}

/// The `lang:` key: a single language or a list (for multi-target models).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LangDoc {
    One(String),
    Many(Vec<String>),
}

impl LangDoc {
    /// The requested languages, in order.
    pub fn names(&self) -> Vec<String> {
        match self {
            LangDoc::One(name) => vec![name.clone()],
            LangDoc::Many(names) => names.clone(),
        }
    }
}

/// The document root. The root is itself a composite state (named `root` in
/// the tree) whose children come from the top-level `states:` mapping.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDoc {
    #[serde(default)]
    pub lang: Option<LangDoc>,
    #[serde(default)]
    pub initial: Option<String>,
    #[serde(default)]
    pub states: IndexMap<String, StateDoc>,
    #[serde(default)]
    pub orthogonal: bool,
    #[serde(default)]
    pub entry: Option<String>,
    #[serde(default)]
    pub exit: Option<String>,
    #[serde(default, rename = "do")]
    pub do_code: Option<String>,
    #[serde(default)]
    pub transitions: Vec<TransitionDoc>,
    #[serde(default)]
    pub decisions: IndexMap<String, Vec<TransitionDoc>>,
    #[serde(default)]
    pub hooks: HooksDoc,
    #[serde(default)]
    pub context: Vec<ContextFieldDoc>,
    #[serde(default)]
    pub context_init: Option<String>,
    #[serde(default)]
    pub includes: Option<String>,
}

impl ModelDoc {
    /// Parse a document from YAML text.
    pub fn from_yaml_str(text: &str) -> crate::error::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}
