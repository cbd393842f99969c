//! Model well-formedness checks.
//!
//! One total pass over every state and transition, including transition lists
//! nested in orthogonal regions and those reached only through decisions.
//! The first violation wins and is reported with the offending node's path.

use indexmap::IndexSet;

use crate::error::{ModelError, Result};
use crate::ir::{Model, StateId, StateKind, Transition};
use crate::path::{display_path, Resolution};

/// Validate a loaded model. `Ok(())` means the model is safe to emit.
pub fn validate(model: &Model) -> Result<()> {
    let root = model.tree.get(model.tree.root());
    if root.children.is_empty() {
        return fail(&["root".to_string()], "model has no states");
    }
    check_state(model, model.tree.root())
}

fn fail(path: &[String], message: impl Into<String>) -> Result<()> {
    Err(ModelError::Validation {
        path: display_path(path),
        message: message.into(),
    })
}

fn check_state(model: &Model, id: StateId) -> Result<()> {
    let state = model.tree.get(id);
    let path = model.tree.path_of(id);

    if let StateKind::CompositeOr { initial, .. } = &state.kind {
        if initial.is_empty() {
            return fail(&path, "composite state is missing 'initial'");
        }
        if !state.children.contains_key(initial) {
            return fail(
                &path,
                format!("initial child '{initial}' does not exist"),
            );
        }
    }

    for (index, transition) in state.transitions.iter().enumerate() {
        let site = format!("transition #{}", index + 1);
        let mut stack = IndexSet::new();
        check_transition(model, &path, &site, transition, &mut stack)?;
    }

    for child in state.children.values() {
        check_state(model, *child)?;
    }
    Ok(())
}

fn check_transition(
    model: &Model,
    path: &[String],
    site: &str,
    transition: &Transition,
    stack: &mut IndexSet<String>,
) -> Result<()> {
    match transition.to.resolve(path) {
        Resolution::Terminate => Ok(()),

        Resolution::Decision(name) => {
            let Some(rules) = model.decisions.get(&name) else {
                return fail(path, format!("{site}: decision '@{name}' does not exist"));
            };
            if !stack.insert(name.clone()) {
                return fail(
                    path,
                    format!("{site}: decision reference cycle involving '@{name}'"),
                );
            }
            for (index, rule) in rules.iter().enumerate() {
                let rule_site = format!("decision '@{name}' arm #{}", index + 1);
                check_transition(model, path, &rule_site, rule, stack)?;
            }
            stack.shift_remove(&name);
            Ok(())
        }

        Resolution::One(target) => {
            if model.tree.resolve(&target).is_none() {
                return fail(
                    path,
                    format!(
                        "{site}: target '{}' does not exist",
                        display_path(&target)
                    ),
                );
            }
            Ok(())
        }

        Resolution::Fork { base, limbs } => {
            let Some(base_id) = model.tree.resolve(&base) else {
                return fail(
                    path,
                    format!("{site}: fork base '{}' does not exist", display_path(&base)),
                );
            };
            let base_state = model.tree.get(base_id);
            if !base_state.kind.is_orthogonal() {
                return fail(
                    path,
                    format!(
                        "{site}: fork target '{}' is not an orthogonal state",
                        display_path(&base)
                    ),
                );
            }
            let mut seen_regions = IndexSet::new();
            for limb in &limbs {
                if limb.len() <= base.len() {
                    return fail(path, format!("{site}: empty fork limb"));
                }
                let region = &limb[base.len()];
                if !base_state.children.contains_key(region) {
                    return fail(
                        path,
                        format!(
                            "{site}: fork limb region '{region}' is not a region of '{}'",
                            display_path(&base)
                        ),
                    );
                }
                if !seen_regions.insert(region.clone()) {
                    return fail(
                        path,
                        format!("{site}: fork names region '{region}' more than once"),
                    );
                }
                if model.tree.resolve(limb).is_none() {
                    return fail(
                        path,
                        format!(
                            "{site}: fork limb '{}' does not exist",
                            display_path(limb)
                        ),
                    );
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(yaml: &str) -> Result<()> {
        validate(&Model::from_yaml_str(yaml).unwrap())
    }

    fn message(yaml: &str) -> String {
        check(yaml).unwrap_err().to_string()
    }

    #[test]
    fn valid_model_passes() {
        check(
            r#"
initial: a
states:
  a:
    transitions:
      - { guard: ctx.go, to: b }
      - { to: null }
  b:
    initial: x
    states:
      x: {}
      y: {}
"#,
        )
        .unwrap();
    }

    #[test]
    fn empty_model_rejected() {
        assert!(message("states: {}").contains("no states"));
    }

    #[test]
    fn missing_root_initial() {
        assert!(message("states: { a: {} }").contains("missing 'initial'"));
    }

    #[test]
    fn unknown_initial_child() {
        let msg = message(
            r#"
initial: a
states:
  a:
    initial: ghost
    states:
      x: {}
"#,
        );
        assert!(msg.contains("initial child 'ghost'"), "{msg}");
        assert!(msg.starts_with("/a:"), "{msg}");
    }

    #[test]
    fn orthogonal_root_needs_no_initial() {
        check(
            r#"
orthogonal: true
states:
  r1: { initial: a, states: { a: {} } }
  r2: { initial: b, states: { b: {} } }
"#,
        )
        .unwrap();
    }

    #[test]
    fn dangling_target() {
        let msg = message(
            r#"
initial: a
states:
  a:
    transitions:
      - { to: nowhere }
"#,
        );
        assert!(msg.contains("target '/nowhere' does not exist"), "{msg}");
        assert!(msg.contains("transition #1"), "{msg}");
    }

    #[test]
    fn unknown_decision() {
        let msg = message(
            r#"
initial: a
states:
  a:
    transitions:
      - { to: "@ghost" }
"#,
        );
        assert!(msg.contains("decision '@ghost' does not exist"), "{msg}");
    }

    #[test]
    fn decision_arms_are_validated() {
        let msg = message(
            r#"
initial: a
decisions:
  pick:
    - { guard: ctx.x, to: nowhere }
states:
  a:
    transitions:
      - { to: "@pick" }
"#,
        );
        assert!(msg.contains("decision '@pick' arm #1"), "{msg}");
    }

    #[test]
    fn decision_cycle_rejected() {
        let msg = message(
            r#"
initial: a
decisions:
  ping:
    - { to: "@pong" }
  pong:
    - { to: "@ping" }
states:
  a:
    transitions:
      - { to: "@ping" }
"#,
        );
        assert!(msg.contains("cycle"), "{msg}");
    }

    #[test]
    fn fork_into_non_orthogonal() {
        let msg = message(
            r#"
initial: a
states:
  a:
    transitions:
      - { to: "b/[x]" }
  b:
    initial: x
    states:
      x: {}
"#,
        );
        assert!(msg.contains("not an orthogonal state"), "{msg}");
    }

    #[test]
    fn fork_limb_must_name_a_region() {
        let msg = message(
            r#"
initial: a
states:
  a:
    transitions:
      - { to: "b/[ghost/x]" }
  b:
    orthogonal: true
    states:
      r1: { initial: x, states: { x: {} } }
      r2: { initial: y, states: { y: {} } }
"#,
        );
        assert!(msg.contains("is not a region"), "{msg}");
    }

    #[test]
    fn fork_regions_must_be_distinct() {
        let msg = message(
            r#"
initial: a
states:
  a:
    transitions:
      - { to: "b/[r1/x, r1/x]" }
  b:
    orthogonal: true
    states:
      r1: { initial: x, states: { x: {} } }
      r2: { initial: y, states: { y: {} } }
"#,
        );
        assert!(msg.contains("more than once"), "{msg}");
    }

    #[test]
    fn orthogonal_fork_passes() {
        check(
            r#"
initial: a
states:
  a:
    transitions:
      - { to: "b/[r1/x, r2/y]" }
  b:
    orthogonal: true
    states:
      r1: { initial: x, states: { x: {} } }
      r2: { initial: y, states: { y: {} } }
"#,
        )
        .unwrap();
    }

    #[test]
    fn transitions_inside_regions_are_checked() {
        let msg = message(
            r#"
orthogonal: true
states:
  r1:
    initial: a
    states:
      a:
        transitions:
          - { to: missing }
  r2: { initial: b, states: { b: {} } }
"#,
        );
        assert!(msg.contains("does not exist"), "{msg}");
        assert!(msg.starts_with("/r1/a:"), "{msg}");
    }
}
