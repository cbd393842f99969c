//! In-memory statechart IR: an arena-backed state tree plus the flattened
//! decision table, hooks, and context schema.
//!
//! States live in a `Vec` indexed by [`StateId`]; `parent` back-references
//! are ids, never owning links. The tree is built once by [`Model::load`],
//! frozen after validation, and read-only for every later stage.

use std::fmt;

use indexmap::IndexMap;

use crate::doc::{ModelDoc, StateDoc, TransitionDoc};
use crate::error::{ModelError, Result};
use crate::path::{display_path, TargetExpr};

pub use crate::doc::GuardDoc as Guard;

/// Index of a state in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(pub usize);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// What kind of node a state is. A closed set; the emitter switches on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateKind {
    /// No children.
    Leaf,
    /// Exactly one active child at a time.
    CompositeOr {
        /// Name of the default child.
        initial: String,
        /// Shallow history: re-entry restores the last active child.
        history: bool,
    },
    /// Orthogonal: every child is a region, all active concurrently.
    CompositeAnd,
}

impl StateKind {
    pub fn is_composite(&self) -> bool {
        !matches!(self, StateKind::Leaf)
    }

    pub fn is_orthogonal(&self) -> bool {
        matches!(self, StateKind::CompositeAnd)
    }
}

/// A transition with its target already parsed.
#[derive(Debug, Clone)]
pub struct Transition {
    pub guard: Option<Guard>,
    pub action: Option<String>,
    pub to: TargetExpr,
}

impl Transition {
    fn from_doc(doc: &TransitionDoc) -> Transition {
        Transition {
            guard: doc.guard.clone(),
            action: doc.action.clone(),
            to: TargetExpr::parse(doc.to.as_deref()),
        }
    }
}

/// One node of the state tree.
#[derive(Debug, Clone)]
pub struct State {
    pub name: String,
    pub kind: StateKind,
    pub parent: Option<StateId>,
    /// Direct children in declaration order (empty for leaves).
    pub children: IndexMap<String, StateId>,
    pub entry: Option<String>,
    pub exit: Option<String>,
    pub do_code: Option<String>,
    pub transitions: Vec<Transition>,
}

/// Arena of states. Index 0 is always the synthetic `root` node.
#[derive(Debug, Clone)]
pub struct StateTree {
    arena: Vec<State>,
}

impl StateTree {
    pub fn root(&self) -> StateId {
        StateId(0)
    }

    pub fn get(&self, id: StateId) -> &State {
        &self.arena[id.0]
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// All states with their ids, in creation (pre-)order.
    pub fn states(&self) -> impl Iterator<Item = (StateId, &State)> {
        self.arena
            .iter()
            .enumerate()
            .map(|(i, s)| (StateId(i), s))
    }

    /// Absolute path of a state, from `root` down.
    pub fn path_of(&self, id: StateId) -> Vec<String> {
        let mut segs = Vec::new();
        let mut cursor = Some(id);
        while let Some(at) = cursor {
            let state = self.get(at);
            segs.push(state.name.clone());
            cursor = state.parent;
        }
        segs.reverse();
        segs
    }

    /// Look up a state by absolute path (`["root", ...]`).
    pub fn resolve(&self, path: &[String]) -> Option<StateId> {
        let mut segs = path.iter();
        if segs.next().map(String::as_str) != Some("root") {
            return None;
        }
        let mut at = self.root();
        for seg in segs {
            at = *self.get(at).children.get(seg)?;
        }
        Some(at)
    }

    fn push(&mut self, state: State) -> StateId {
        let id = StateId(self.arena.len());
        self.arena.push(state);
        id
    }
}

/// Global code hooks (see `doc::HooksDoc`).
#[derive(Debug, Clone, Default)]
pub struct Hooks {
    pub entry: Option<String>,
    pub exit: Option<String>,
    pub do_code: Option<String>,
    pub transition: Option<String>,
}

/// A user context field.
#[derive(Debug, Clone)]
pub struct ContextField {
    pub name: String,
    pub ty: Option<String>,
}

/// The loaded model: tree plus everything that is not a state.
#[derive(Debug, Clone)]
pub struct Model {
    pub tree: StateTree,
    /// Flattened decision table, in encounter order.
    pub decisions: IndexMap<String, Vec<Transition>>,
    pub hooks: Hooks,
    pub context: Vec<ContextField>,
    pub context_init: Option<String>,
    pub includes: Option<String>,
    /// Languages requested by the document's `lang:` key, if any.
    pub languages: Vec<String>,
}

impl Model {
    /// Parse and load a model from YAML text. Structural only; run
    /// [`crate::validate::validate`] before using the model.
    pub fn from_yaml_str(text: &str) -> Result<Model> {
        Model::load(&ModelDoc::from_yaml_str(text)?)
    }

    /// Build the arena tree from a parsed document, flattening all nested
    /// `decisions:` maps into one table (duplicate names are an error).
    pub fn load(doc: &ModelDoc) -> Result<Model> {
        let mut tree = StateTree { arena: Vec::new() };
        let mut decisions: IndexMap<String, Vec<Transition>> = IndexMap::new();

        let root_kind = if doc.orthogonal {
            StateKind::CompositeAnd
        } else {
            StateKind::CompositeOr {
                initial: doc.initial.clone().unwrap_or_default(),
                history: false,
            }
        };
        let root = tree.push(State {
            name: "root".to_string(),
            kind: root_kind,
            parent: None,
            children: IndexMap::new(),
            entry: doc.entry.clone(),
            exit: doc.exit.clone(),
            do_code: doc.do_code.clone(),
            transitions: doc.transitions.iter().map(Transition::from_doc).collect(),
        });

        for (name, transitions) in &doc.decisions {
            collect_decision(&mut decisions, name, transitions, &["root".to_string()])?;
        }
        for (name, child) in &doc.states {
            build_state(&mut tree, &mut decisions, root, name, child)?;
        }

        Ok(Model {
            tree,
            decisions,
            hooks: Hooks {
                entry: doc.hooks.entry.clone(),
                exit: doc.hooks.exit.clone(),
                do_code: doc.hooks.do_code.clone(),
                transition: doc.hooks.transition.clone(),
            },
            context: doc
                .context
                .iter()
                .map(|f| ContextField {
                    name: f.name.clone(),
                    ty: f.ty.clone(),
                })
                .collect(),
            context_init: doc.context_init.clone(),
            includes: doc.includes.clone(),
            languages: doc.lang.as_ref().map(|l| l.names()).unwrap_or_default(),
        })
    }
}

fn collect_decision(
    decisions: &mut IndexMap<String, Vec<Transition>>,
    name: &str,
    transitions: &[TransitionDoc],
    owner_path: &[String],
) -> Result<()> {
    if decisions.contains_key(name) {
        return Err(ModelError::DuplicateDecision {
            name: name.to_string(),
            path: display_path(owner_path),
        });
    }
    decisions.insert(
        name.to_string(),
        transitions.iter().map(Transition::from_doc).collect(),
    );
    Ok(())
}

fn build_state(
    tree: &mut StateTree,
    decisions: &mut IndexMap<String, Vec<Transition>>,
    parent: StateId,
    name: &str,
    doc: &StateDoc,
) -> Result<StateId> {
    let kind = if doc.states.is_empty() {
        StateKind::Leaf
    } else if doc.orthogonal {
        StateKind::CompositeAnd
    } else {
        StateKind::CompositeOr {
            initial: doc.initial.clone().unwrap_or_default(),
            history: doc.history,
        }
    };

    let id = tree.push(State {
        name: name.to_string(),
        kind,
        parent: Some(parent),
        children: IndexMap::new(),
        entry: doc.entry.clone(),
        exit: doc.exit.clone(),
        do_code: doc.do_code.clone(),
        transitions: doc.transitions.iter().map(Transition::from_doc).collect(),
    });
    tree.arena[parent.0].children.insert(name.to_string(), id);

    if !doc.decisions.is_empty() {
        let owner = tree.path_of(id);
        for (dname, transitions) in &doc.decisions {
            collect_decision(decisions, dname, transitions, &owner)?;
        }
    }
    for (child_name, child) in &doc.states {
        build_state(tree, decisions, id, child_name, child)?;
    }
    Ok(id)
}
