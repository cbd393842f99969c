//! Transition planning: least common ancestor, exit/entry sequences, fork
//! fan-out, and cross-limb normalization.
//!
//! A plan is pure data, ordered lists of absolute state paths, which the
//! emitter lowers to `_exit`/`_start`/`_entry` calls. Entry steps distinguish
//! `Start` (enter the state itself, no descent) from `Enter` (enter and then
//! descend through `initial`/history until a leaf is active).

use smc_model::{display_path, Model, Resolution, StateKind};

use crate::error::{CodegenError, Result};

/// One step of an entry sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStep {
    /// Call the state's `_start`: run entry code, wire parent slots.
    Start(Vec<String>),
    /// Call the state's `_entry`: `_start` plus the runtime descent to a leaf.
    Enter(Vec<String>),
}

impl EntryStep {
    pub fn path(&self) -> &[String] {
        match self {
            EntryStep::Start(p) | EntryStep::Enter(p) => p,
        }
    }
}

/// Entry chain for one region of a forked orthogonal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionEntry {
    /// Absolute path of the region.
    pub region: Vec<String>,
    /// Steps entering this region (deep chain for named limbs, a single
    /// `Enter` for regions the fork does not name).
    pub steps: Vec<EntryStep>,
}

/// A lowered transition: what to exit, what to enter, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionPlan {
    /// An OR composite whose *current* child must exit through the
    /// null-checked active-child pointer (source is an ancestor of the
    /// target, so the child is only known at runtime).
    pub dynamic_child_exit: Option<Vec<String>>,
    /// Static exits, bottom-up.
    pub exits: Vec<Vec<String>>,
    /// Entries, top-down.
    pub entries: Vec<EntryStep>,
    /// Fork fan-out, one entry per region in declaration order.
    pub regions: Vec<RegionEntry>,
    /// The machine terminates after the exits.
    pub terminate: bool,
}

/// Index of the least common ancestor boundary: the length of the longest
/// common prefix of `s` and `t`. Identical paths are an explicit
/// self-transition, where the state itself must exit and re-enter, so the
/// index steps back one.
pub fn lca_index(s: &[String], t: &[String]) -> usize {
    let limit = s.len().min(t.len());
    let mut i = 0;
    while i < limit && s[i] == t[i] {
        i += 1;
    }
    if i == s.len() && i == t.len() {
        i -= 1;
    }
    i
}

/// Plan a termination transition: exit everything from the source down to and
/// including the root, then stop.
pub fn plan_termination(source: &[String]) -> TransitionPlan {
    let mut exits: Vec<Vec<String>> = (1..source.len())
        .rev()
        .map(|i| source[..i + 1].to_vec())
        .collect();
    exits.push(source[..1].to_vec());
    TransitionPlan {
        exits,
        terminate: true,
        ..TransitionPlan::default()
    }
}

/// Plan a transition from `source` to a resolved target. `Terminate` goes
/// through [`plan_termination`]; decision references are inlined by the
/// emitter and never reach the planner.
pub fn plan_transition(
    model: &Model,
    source: &[String],
    resolution: &Resolution,
) -> Result<TransitionPlan> {
    match resolution {
        Resolution::Terminate => Ok(plan_termination(source)),
        Resolution::Decision(name) => Err(CodegenError::Plan {
            path: display_path(source),
            message: format!("decision '@{name}' reached the planner"),
        }),
        Resolution::One(target) => plan_one(model, source, target),
        Resolution::Fork { base, limbs } => plan_fork(model, source, base, limbs),
    }
}

fn kind_at<'m>(model: &'m Model, path: &[String]) -> Result<&'m StateKind> {
    let id = model
        .tree
        .resolve(path)
        .ok_or_else(|| CodegenError::Plan {
            path: display_path(path),
            message: "state disappeared between validation and planning".into(),
        })?;
    Ok(&model.tree.get(id).kind)
}

fn plan_one(model: &Model, source: &[String], target: &[String]) -> Result<TransitionPlan> {
    // Cross-limb: the strict LCA is an orthogonal state and source and target
    // sit in different regions. The whole orthogonal exits (every region) and
    // re-enters as a fork naming the target limb; the other regions restart
    // at their defaults.
    let strict = strict_lca(source, target);
    if strict < source.len() && strict < target.len() {
        let container = &source[..strict];
        if kind_at(model, container)?.is_orthogonal() {
            let limbs = vec![target.to_vec()];
            return plan_fork(model, source, container, &limbs);
        }
    }

    // Implicit fork: a target strictly inside an orthogonal, approached from
    // outside its limb, normalizes to a single-limb fork so the sibling
    // regions are entered too.
    if let Some(idx) = first_orthogonal_index(model, target)? {
        if idx < target.len() - 1 {
            let limb_idx = idx + 1;
            let same_limb = source.len() > limb_idx
                && source[..limb_idx] == target[..limb_idx]
                && source[limb_idx] == target[limb_idx];
            if !same_limb {
                let limbs = vec![target.to_vec()];
                return plan_fork(model, source, &target[..limb_idx], &limbs);
            }
        }
    }

    let lca = lca_index(source, target);

    // Source is a strict ancestor of the target: nothing exits statically,
    // but an OR source's active child must exit through its pointer slot.
    let dynamic_child_exit = if lca >= source.len()
        && matches!(kind_at(model, source)?, StateKind::CompositeOr { .. })
    {
        Some(source.to_vec())
    } else {
        None
    };

    let exits = (lca..source.len())
        .rev()
        .map(|i| source[..i + 1].to_vec())
        .collect();

    // Target equal to (or an ancestor of) the source re-enters itself fully.
    let entry_from = if lca >= target.len() { target.len() - 1 } else { lca };
    let entries = (entry_from..target.len())
        .map(|i| {
            if i == target.len() - 1 {
                EntryStep::Enter(target[..i + 1].to_vec())
            } else {
                EntryStep::Start(target[..i + 1].to_vec())
            }
        })
        .collect();

    Ok(TransitionPlan {
        dynamic_child_exit,
        exits,
        entries,
        regions: Vec::new(),
        terminate: false,
    })
}

fn plan_fork(
    model: &Model,
    source: &[String],
    base: &[String],
    limbs: &[Vec<String>],
) -> Result<TransitionPlan> {
    let base_id = model.tree.resolve(base).ok_or_else(|| CodegenError::Plan {
        path: display_path(base),
        message: "fork base disappeared between validation and planning".into(),
    })?;
    let base_state = model.tree.get(base_id);

    let lca = lca_index(source, base);
    let (exits, entries) = if lca >= base.len() {
        // Base is the source or one of its ancestors: full re-entry. Exit
        // down through the base itself (which recursively exits every
        // region), then restart it.
        let exits = (base.len() - 1..source.len())
            .rev()
            .map(|i| source[..i + 1].to_vec())
            .collect();
        (exits, vec![EntryStep::Start(base.to_vec())])
    } else {
        let exits = (lca..source.len())
            .rev()
            .map(|i| source[..i + 1].to_vec())
            .collect();
        // The whole chain down to the base uses `_start`: the fan-out below
        // decides what happens inside each region, so the base must not
        // descend on its own.
        let entries = (lca..base.len())
            .map(|i| EntryStep::Start(base[..i + 1].to_vec()))
            .collect();
        (exits, entries)
    };

    // Regions enter in declaration order; limbs pick their deep chain, the
    // rest enter at their defaults.
    let mut regions = Vec::new();
    for region_name in base_state.children.keys() {
        let mut region_path = base.to_vec();
        region_path.push(region_name.clone());
        let limb = limbs.iter().find(|l| {
            l.len() > base.len() && l[base.len()] == *region_name
        });
        let steps = match limb {
            Some(limb) => (base.len()..limb.len())
                .map(|i| {
                    if i == limb.len() - 1 {
                        EntryStep::Enter(limb[..i + 1].to_vec())
                    } else {
                        EntryStep::Start(limb[..i + 1].to_vec())
                    }
                })
                .collect(),
            None => vec![EntryStep::Enter(region_path.clone())],
        };
        regions.push(RegionEntry {
            region: region_path,
            steps,
        });
    }

    Ok(TransitionPlan {
        dynamic_child_exit: None,
        exits,
        entries,
        regions,
        terminate: false,
    })
}

/// Longest common prefix length with no self-transition adjustment.
fn strict_lca(s: &[String], t: &[String]) -> usize {
    let limit = s.len().min(t.len());
    let mut i = 0;
    while i < limit && s[i] == t[i] {
        i += 1;
    }
    i
}

/// Index of the outermost orthogonal state along `path`, if any.
fn first_orthogonal_index(model: &Model, path: &[String]) -> Result<Option<usize>> {
    for i in 0..path.len() {
        if kind_at(model, &path[..i + 1])?.is_orthogonal() {
            return Ok(Some(i));
        }
    }
    Ok(None)
}
