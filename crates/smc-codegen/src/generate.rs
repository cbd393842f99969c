//! The emission engine: one recursive walk over the state tree producing the
//! per-state lifecycle procedures (`_start`, `_entry`, `_exit`, `_do`), the
//! transition-selection blocks, and the inspector chain. All target syntax
//! comes through the [`LanguageBackend`] hooks; this module never spells a
//! target language construct itself.

use smc_model::{display_path, Guard, Model, Resolution, StateId, StateKind, Transition};

use crate::backend::{
    flatten, indent_block, Artifact, AssembleInput, GeneratedParts, LanguageBackend,
};
use crate::error::{CodegenError, Result};
use crate::plan::{self, EntryStep, TransitionPlan};

/// Generate all output files for one model and one backend.
pub fn generate(
    model: &Model,
    backend: &dyn LanguageBackend,
    basename: &str,
) -> Result<Vec<Artifact>> {
    let mut walker = Walker {
        model,
        backend,
        parts: GeneratedParts::default(),
        counter: 0,
    };
    let root_path = vec!["root".to_string()];
    walker.walk(&root_path, model.tree.root(), None)?;
    walker.parts.state_count = walker.counter;
    walker.inspect(&root_path, model.tree.root());

    backend.assemble(&AssembleInput {
        model,
        parts: &walker.parts,
        basename,
    })
}

/// Context slots of the parent that a child wires in `_start` and clears in
/// `_exit`.
struct ParentSlots {
    run: String,
    exit: String,
    hist: Option<String>,
}

struct Walker<'a> {
    model: &'a Model,
    backend: &'a dyn LanguageBackend,
    parts: GeneratedParts,
    counter: usize,
}

impl Walker<'_> {
    fn push_slot(&mut self, slot: &str) {
        if let Some(decl) = self.backend.slot_decl(slot) {
            self.parts.slot_decls.push(decl);
        }
        if let Some(init) = self.backend.slot_init(slot) {
            self.parts.slot_inits.push(init);
        }
    }

    fn walk(&mut self, path: &[String], id: StateId, parent: Option<&ParentSlots>) -> Result<()> {
        let b = self.backend;
        let state = self.model.tree.get(id).clone();
        let state_id = self.counter;
        self.counter += 1;
        let flat = flatten(path);

        let preamble = b.format_template(
            b.func_preamble(),
            &[
                ("short_name", state.name.clone()),
                ("display_name", display_path(path)),
                ("state_id", state_id.to_string()),
            ],
        );

        let mut set_parent = String::new();
        let mut clear_parent = String::new();
        if let Some(slots) = parent {
            self.parts.in_state_impls.push(b.in_state_impl(&flat, &slots.run));
            let mut sets = vec![
                b.set_slot(&slots.run, &format!("state_{flat}_do")),
                b.set_slot(&slots.exit, &format!("state_{flat}_exit")),
            ];
            if let Some(hist) = &slots.hist {
                sets.push(b.set_slot(hist, &format!("state_{flat}_entry")));
            }
            set_parent = sets.join("\n");
            clear_parent = [b.clear_slot(&slots.run), b.clear_slot(&slots.exit)].join("\n");
        }

        let mut transitions = String::new();
        for t in &state.transitions {
            transitions.push_str(&self.emit_transition(path, t, 0)?);
        }
        let transitions = transitions.trim_end().to_string();

        self.parts.forwards.extend(b.forward_decls(&flat));

        let hooks = &self.model.hooks;
        let mut subs: Vec<(&str, String)> = vec![
            ("c_name", flat.clone()),
            ("state_id", state_id.to_string()),
            ("preamble", preamble),
            ("hook_entry", hooks.entry.clone().unwrap_or_default()),
            ("hook_do", hooks.do_code.clone().unwrap_or_default()),
            ("hook_exit", hooks.exit.clone().unwrap_or_default()),
            ("entry", state.entry.clone().unwrap_or_default()),
            ("exit", state.exit.clone().unwrap_or_default()),
            ("do", state.do_code.clone().unwrap_or_default()),
            ("transitions", transitions),
            ("set_parent", set_parent),
            ("clear_parent", clear_parent),
        ];

        let children: Vec<(String, StateId)> = state
            .children
            .iter()
            .map(|(name, child)| (name.clone(), *child))
            .collect();

        match &state.kind {
            StateKind::Leaf => {
                let body = b.format_template(b.leaf_template(), &subs);
                self.parts.functions.push(body);
            }

            StateKind::CompositeOr { initial, history } => {
                let self_ptr = format!("ptr_{flat}");
                let self_exit_ptr = format!("ptr_{flat}_exit");
                self.push_slot(&self_ptr);
                self.push_slot(&self_exit_ptr);
                let hist_slot = history.then(|| format!("hist_{flat}"));
                if let Some(hist) = &hist_slot {
                    self.push_slot(hist);
                }

                let mut initial_path = path.to_vec();
                initial_path.push(initial.clone());
                let enter_child = b.enter_child(hist_slot.as_deref(), &flatten(&initial_path));

                subs.push(("self_ptr", self_ptr.clone()));
                subs.push(("self_exit_ptr", self_exit_ptr.clone()));
                subs.push(("enter_child", enter_child));
                let body = b.format_template(b.composite_or_template(), &subs);

                for (name, child) in &children {
                    let mut child_path = path.to_vec();
                    child_path.push(name.clone());
                    let slots = ParentSlots {
                        run: self_ptr.clone(),
                        exit: self_exit_ptr.clone(),
                        hist: hist_slot.clone(),
                    };
                    self.walk(&child_path, *child, Some(&slots))?;
                }
                self.parts.functions.push(body);
            }

            StateKind::CompositeAnd => {
                let safety = b.safety_check(&flat, parent.is_some());
                let mut entries = Vec::new();
                let mut exits = Vec::new();
                let mut ticks = Vec::new();
                let mut region_slots = Vec::new();

                for (name, child) in &children {
                    let mut child_path = path.to_vec();
                    child_path.push(name.clone());
                    let child_flat = flatten(&child_path);
                    let region_ptr = format!("ptr_{child_flat}_region");
                    let region_exit_ptr = format!("ptr_{child_flat}_region_exit");
                    self.push_slot(&region_ptr);
                    self.push_slot(&region_exit_ptr);

                    entries.push(b.call(&format!("state_{child_flat}_entry")));
                    exits.push(b.opt_call(&region_exit_ptr));
                    ticks.push(b.call(&format!("state_{child_flat}_do")));
                    ticks.push(safety.clone());

                    region_slots.push((
                        child_path,
                        *child,
                        ParentSlots {
                            run: region_ptr,
                            exit: region_exit_ptr,
                            hist: None,
                        },
                    ));
                }

                subs.push(("parallel_entries", entries.join("\n")));
                subs.push(("parallel_exits", exits.join("\n")));
                subs.push(("parallel_ticks", ticks.join("\n")));
                subs.push(("safety_check", safety));
                let body = b.format_template(b.composite_and_template(), &subs);

                for (child_path, child, slots) in &region_slots {
                    self.walk(child_path, *child, Some(slots))?;
                }
                self.parts.functions.push(body);
            }
        }
        Ok(())
    }

    /// One guarded transition block. `level` is the nesting depth relative to
    /// the `{transitions}` insertion point (decision arms nest one deeper per
    /// reference).
    fn emit_transition(&self, path: &[String], t: &Transition, level: usize) -> Result<String> {
        let b = self.backend;
        let ind = "    ".repeat(level);
        let body = "    ".repeat(level + 1);

        let cond = match &t.guard {
            None | Some(Guard::Bool(true)) => b.true_lit().to_string(),
            Some(Guard::Bool(false)) => b.false_lit().to_string(),
            Some(Guard::Expr(expr)) => b.expand_in_state(expr),
        };

        let resolution = t.to.resolve(path);
        let mut code = format!("{ind}{}\n", b.if_open(&cond));

        if let Resolution::Decision(name) = &resolution {
            code.push_str(&format!(
                "{body}{}\n",
                b.set_flag("transition_fired", true)
            ));
            if let Some(action) = &t.action {
                code.push_str(&indent_block(&b.expand_in_state(action), &body));
                code.push('\n');
            }
            let rules = self.model.decisions.get(name).ok_or_else(|| CodegenError::Plan {
                path: display_path(path),
                message: format!("decision '@{name}' vanished between validation and emission"),
            })?;
            for rule in rules {
                code.push_str(&self.emit_transition(path, rule, level + 1)?);
            }
        } else {
            code.push_str(&format!(
                "{body}{}\n",
                b.str_var("t_src", &display_path(path))
            ));
            code.push_str(&format!(
                "{body}{}\n",
                b.str_var("t_dst", &target_label(&resolution))
            ));
            if let Some(hook) = &self.model.hooks.transition {
                code.push_str(&indent_block(hook, &body));
                code.push('\n');
            }
            code.push_str(&format!(
                "{body}{}\n",
                b.set_flag("transition_fired", true)
            ));
            if let Some(action) = &t.action {
                code.push_str(&indent_block(&b.expand_in_state(action), &body));
                code.push('\n');
            }
            let plan = plan::plan_transition(self.model, path, &resolution)?;
            code.push_str(&self.lower_plan(&plan, &body));
        }

        if !b.block_close().is_empty() {
            code.push_str(&format!("{ind}{}\n", b.block_close()));
        }
        Ok(code)
    }

    fn lower_plan(&self, plan: &TransitionPlan, body: &str) -> String {
        let b = self.backend;
        let mut code = String::new();
        if let Some(composite) = &plan.dynamic_child_exit {
            let slot = format!("ptr_{}", flatten(composite));
            code.push_str(&format!("{body}{}\n", b.opt_call(&slot)));
        }
        for exit in &plan.exits {
            code.push_str(&format!(
                "{body}{}\n",
                b.call(&format!("state_{}_exit", flatten(exit)))
            ));
        }
        for step in &plan.entries {
            code.push_str(&format!("{body}{}\n", self.entry_call(step)));
        }
        for region in &plan.regions {
            for step in &region.steps {
                code.push_str(&format!("{body}{}\n", self.entry_call(step)));
            }
        }
        if plan.terminate {
            code.push_str(&format!("{body}{}\n", b.set_flag("terminated", true)));
        }
        code.push_str(&format!("{body}{}\n", b.ret()));
        code
    }

    fn entry_call(&self, step: &EntryStep) -> String {
        let suffix = match step {
            EntryStep::Start(_) => "start",
            EntryStep::Enter(_) => "entry",
        };
        self.backend
            .call(&format!("state_{}_{suffix}", flatten(step.path())))
    }

    fn inspect(&mut self, path: &[String], id: StateId) {
        let b = self.backend;
        let state = self.model.tree.get(id).clone();
        let flat = flatten(path);
        let push_name = b.inspect_push(&state.name);
        let children: Vec<(String, StateId)> = state
            .children
            .iter()
            .map(|(name, child)| (name.clone(), *child))
            .collect();

        let mut content = String::new();
        match &state.kind {
            StateKind::Leaf => {}

            StateKind::CompositeAnd => {
                content.push_str(&format!("{}\n", b.inspect_push("/[")));
                for (i, (name, child)) in children.iter().enumerate() {
                    let mut child_path = path.to_vec();
                    child_path.push(name.clone());
                    self.inspect(&child_path, *child);
                    content.push_str(&format!("{}\n", b.inspect_call(&flatten(&child_path))));
                    if i + 1 < children.len() {
                        content.push_str(&format!("{}\n", b.inspect_push(" | ")));
                    }
                }
                content.push_str(&b.inspect_push("]"));
            }

            StateKind::CompositeOr { .. } => {
                let slot = format!("ptr_{flat}");
                for (name, child) in &children {
                    let mut child_path = path.to_vec();
                    child_path.push(name.clone());
                    self.inspect(&child_path, *child);
                }
                for (i, (name, _)) in children.iter().enumerate() {
                    let mut child_path = path.to_vec();
                    child_path.push(name.clone());
                    let child_flat = flatten(&child_path);
                    let cond = b.inspect_slot_eq(&slot, &child_flat);
                    let open = if i == 0 {
                        b.if_open(&cond)
                    } else {
                        b.elif_open(&cond)
                    };
                    content.push_str(&format!(
                        "{open}\n    {}\n    {}\n",
                        b.inspect_push("/"),
                        b.inspect_call(&child_flat)
                    ));
                    if !b.block_close().is_empty() {
                        content.push_str(&format!("{}\n", b.block_close()));
                    }
                }
            }
        }
        let content = content.trim_end().to_string();

        let rendered = b.format_template(
            b.inspector_template(),
            &[
                ("c_name", flat),
                ("push_name", push_name),
                ("content", content),
            ],
        );
        self.parts.inspectors.push(rendered);
    }
}

fn target_label(resolution: &Resolution) -> String {
    match resolution {
        Resolution::Terminate => "Termination".to_string(),
        Resolution::Decision(name) => format!("Decision({name})"),
        Resolution::One(path) => display_path(path),
        Resolution::Fork { base, limbs } => {
            let tails: Vec<String> = limbs
                .iter()
                .map(|limb| limb[base.len()..].join("/"))
                .collect();
            format!("{}/[{}]", display_path(base), tails.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Language;

    fn toggle_yaml() -> &'static str {
        r#"
initial: a
context:
  - { name: counter, type: i64 }
states:
  a:
    entry: ctx.counter += 1;
    transitions:
      - { guard: ctx.counter == 3, to: b }
  b:
    transitions:
      - { guard: ctx.counter == 6, to: a }
"#
    }

    fn gen(yaml: &str, lang: Language) -> String {
        let model = Model::from_yaml_str(yaml).unwrap();
        smc_model::validate(&model).unwrap();
        let backend = lang.backend();
        let artifacts = generate(&model, backend.as_ref(), "statemachine").unwrap();
        artifacts
            .into_iter()
            .map(|a| a.content)
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn rust_toggle_has_lifecycle_procedures() {
        let out = gen(toggle_yaml(), Language::Rust);
        for name in [
            "fn state_root_start",
            "fn state_root_a_start",
            "fn state_root_a_entry",
            "fn state_root_a_exit",
            "fn state_root_a_do",
            "fn state_root_b_do",
        ] {
            assert!(out.contains(name), "missing {name}\n{out}");
        }
        // Transition fires exit-then-entry in order.
        let do_a = &out[out.find("fn state_root_a_do").unwrap()..];
        let exit_at = do_a.find("state_root_a_exit(ctx);").unwrap();
        let entry_at = do_a.find("state_root_b_entry(ctx);").unwrap();
        assert!(exit_at < entry_at);
    }

    #[test]
    fn rust_toggle_wires_parent_slots() {
        let out = gen(toggle_yaml(), Language::Rust);
        assert!(out.contains("ctx.ptr_root = Some(state_root_a_do);"));
        assert!(out.contains("ctx.ptr_root_exit = Some(state_root_a_exit);"));
        assert!(out.contains("ctx.ptr_root = None;"));
    }

    #[test]
    fn c_split_produces_header_and_source() {
        let model = Model::from_yaml_str(toggle_yaml()).unwrap();
        smc_model::validate(&model).unwrap();
        let backend = Language::C.backend();
        let artifacts = generate(&model, backend.as_ref(), "statemachine").unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].extension, "h");
        assert_eq!(artifacts[1].extension, "c");
        assert!(artifacts[0].content.contains("void state_root_a_do(SM_Context* ctx);"));
        assert!(artifacts[1].content.contains("#include \"statemachine.h\""));
    }

    #[test]
    fn missing_context_type_is_an_emission_error() {
        let yaml = r#"
initial: a
context:
  - { name: untyped }
states:
  a: {}
"#;
        let model = Model::from_yaml_str(yaml).unwrap();
        let backend = Language::Rust.backend();
        let err = generate(&model, backend.as_ref(), "statemachine").unwrap_err();
        assert!(matches!(err, CodegenError::MissingFieldType { ref field } if field == "untyped"));
    }

    #[test]
    fn python_tolerates_missing_context_type() {
        let yaml = r#"
initial: a
context:
  - { name: untyped }
states:
  a: {}
"#;
        let model = Model::from_yaml_str(yaml).unwrap();
        let backend = Language::Python.backend();
        let artifacts = generate(&model, backend.as_ref(), "statemachine").unwrap();
        assert!(artifacts[0].content.contains("self.untyped = 0"));
    }

    #[test]
    fn in_state_guard_expands_per_backend() {
        let yaml = r#"
initial: a
states:
  a:
    transitions:
      - { guard: IN_STATE(root_b), to: b }
  b: {}
"#;
        let rust = gen(yaml, Language::Rust);
        assert!(rust.contains("if ctx.in_state_root_b()"));
        let c = gen(yaml, Language::C);
        assert!(c.contains("if (IN_STATE_root_b)"));
        let py = gen(yaml, Language::Python);
        assert!(py.contains("if ctx.in_state_root_b():"));
    }

    #[test]
    fn decision_arms_inline_first_match() {
        let yaml = r#"
initial: a
decisions:
  pick:
    - { guard: ctx.x > 0, to: b }
    - { to: c }
states:
  a:
    transitions:
      - { to: "@pick" }
  b: {}
  c: {}
"#;
        let out = gen(yaml, Language::Rust);
        let do_a = &out[out.find("fn state_root_a_do").unwrap()..];
        let first = do_a.find("state_root_b_entry(ctx);").unwrap();
        let second = do_a.find("state_root_c_entry(ctx);").unwrap();
        // First arm's body precedes the second arm's, and each arm returns.
        assert!(first < second);
    }

    #[test]
    fn termination_sets_flag_and_exits_root() {
        let yaml = r#"
initial: a
states:
  a:
    transitions:
      - { guard: ctx.done, to: null }
"#;
        let out = gen(yaml, Language::Rust);
        let do_a = &out[out.find("fn state_root_a_do").unwrap()..];
        assert!(do_a.contains("state_root_a_exit(ctx);"));
        assert!(do_a.contains("state_root_exit(ctx);"));
        assert!(do_a.contains("ctx.terminated = true;"));
    }

    #[test]
    fn history_slot_only_when_requested() {
        let yaml = r#"
initial: m
states:
  m:
    history: true
    initial: a
    states:
      a: { transitions: [ { guard: ctx.go, to: b } ] }
      b: {}
"#;
        let out = gen(yaml, Language::Rust);
        assert!(out.contains("hist_root_m"));
        assert!(out.contains("ctx.hist_root_m = Some(state_root_m_a_entry);"));
        // The root composite has no history slot.
        assert!(!out.contains("hist_root,"));
    }

    #[test]
    fn orthogonal_regions_tick_in_order_with_safety() {
        let yaml = r#"
orthogonal: true
states:
  r1: { initial: p, states: { p: {} } }
  r2: { initial: u, states: { u: {} } }
"#;
        let out = gen(yaml, Language::Rust);
        let do_root = &out[out.find("fn state_root_do").unwrap()..];
        let r1 = do_root.find("state_root_r1_do(ctx);").unwrap();
        let r2 = do_root.find("state_root_r2_do(ctx);").unwrap();
        assert!(r1 < r2);
        assert!(do_root.contains("if ctx.transition_fired { return; }"));
        assert!(out.contains("ptr_root_r1_region_exit"));
    }

    #[test]
    fn inspector_renders_or_chain_and_regions() {
        let yaml = r#"
orthogonal: true
states:
  r1: { initial: p, states: { p: {} } }
  r2: { initial: u, states: { u: {} } }
"#;
        let out = gen(yaml, Language::Rust);
        assert!(out.contains("fn inspect_root"));
        assert!(out.contains("buf.push_str(\"/[\");"));
        assert!(out.contains("buf.push_str(\" | \");"));
        assert!(out.contains("inspect_root_r1(ctx, buf);"));
    }

    #[test]
    fn emission_is_deterministic() {
        let a = gen(toggle_yaml(), Language::Rust);
        let b = gen(toggle_yaml(), Language::Rust);
        assert_eq!(a, b);
    }
}
