//! Rust backend: single-file output, `Option<fn(&mut Context)>` slots,
//! value-semantics `StateMachine` wrapper.

use crate::backend::{Artifact, AssembleInput, Language, LanguageBackend};
use crate::error::{CodegenError, Result};

pub struct RustBackend;

const FUNC_PREAMBLE: &str = r#"let state_name = "{short_name}";
let state_full_name = "{display_name}";
let time = ctx.now - ctx.state_timers[{state_id}];"#;

const LEAF_TEMPLATE: &str = r#"
fn state_{c_name}_start(ctx: &mut Context) {
    ctx.state_timers[{state_id}] = ctx.now;
    {preamble}
    {hook_entry}
    {entry}
    {set_parent}
}

fn state_{c_name}_entry(ctx: &mut Context) {
    state_{c_name}_start(ctx);
}

fn state_{c_name}_exit(ctx: &mut Context) {
    {preamble}
    {exit}
    {hook_exit}
    {clear_parent}
}

fn state_{c_name}_do(ctx: &mut Context) {
    {preamble}
    {hook_do}
    {do}
    {transitions}
}
"#;

const COMPOSITE_OR_TEMPLATE: &str = r#"
fn state_{c_name}_start(ctx: &mut Context) {
    ctx.state_timers[{state_id}] = ctx.now;
    {preamble}
    {hook_entry}
    {entry}
    {set_parent}
}

fn state_{c_name}_entry(ctx: &mut Context) {
    state_{c_name}_start(ctx);
    {enter_child}
}

fn state_{c_name}_exit(ctx: &mut Context) {
    {preamble}
    // the active child exits first
    if let Some(child_exit) = ctx.{self_exit_ptr} {
        child_exit(ctx);
    }
    {exit}
    {hook_exit}
    {clear_parent}
}

fn state_{c_name}_do(ctx: &mut Context) {
    {preamble}
    {hook_do}
    {do}
    {transitions}
    // tick the active child
    if let Some(child_do) = ctx.{self_ptr} {
        child_do(ctx);
    }
}
"#;

const COMPOSITE_AND_TEMPLATE: &str = r#"
fn state_{c_name}_start(ctx: &mut Context) {
    ctx.state_timers[{state_id}] = ctx.now;
    {preamble}
    {hook_entry}
    {entry}
    {set_parent}
}

fn state_{c_name}_entry(ctx: &mut Context) {
    state_{c_name}_start(ctx);
    {parallel_entries}
}

fn state_{c_name}_exit(ctx: &mut Context) {
    {preamble}
    // every region exits first
    {parallel_exits}
    {exit}
    {hook_exit}
    {clear_parent}
}

fn state_{c_name}_do(ctx: &mut Context) {
    {preamble}
    {hook_do}
    {do}
    {transitions}
    // stop if this state was exited or any transition fired
    {safety_check}
    {parallel_ticks}
}
"#;

const INSPECTOR_TEMPLATE: &str = r#"
fn inspect_{c_name}(ctx: &Context, buf: &mut String) {
    {push_name}
    {content}
}
"#;

const FILE_TEMPLATE: &str = r#"#![allow(unused_variables)]
#![allow(dead_code)]
#![allow(non_snake_case)]

// --- User includes ---
{includes}

pub struct Context {
    pub now: f64,
    pub state_timers: [f64; {total_states}],
    pub transition_fired: bool,
    pub terminated: bool,

    // Hierarchy slots
    {slot_decls}

    // User context fields
    {field_decls}
}

// Function pointer type
type StateFn = fn(&mut Context);

impl Context {
    {in_state_impls}
}

pub struct StateMachine {
    pub ctx: Context,
    pub root: Option<StateFn>,
}

impl StateMachine {
    pub fn new() -> Self {
        let mut ctx = Context {
            now: 0.0,
            state_timers: [0.0; {total_states}],
            transition_fired: false,
            terminated: false,
            {slot_inits}
            {field_inits}
        };
        {context_init}
        state_root_entry(&mut ctx);
        StateMachine {
            ctx,
            root: Some(state_root_do),
        }
    }

    pub fn tick(&mut self) {
        self.ctx.transition_fired = false;
        if let Some(do_fn) = self.root {
            do_fn(&mut self.ctx);
            if self.ctx.terminated {
                self.root = None;
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.root.is_some()
    }

    pub fn get_state_str(&self) -> String {
        let mut buf = String::new();
        if self.root.is_some() {
            buf.push('/');
            inspect_root(&self.ctx, &mut buf);
        } else {
            buf.push_str("FINISHED");
        }
        buf
    }
}

// --- State logic ---
{functions}

// --- Inspection ---
{inspectors}
"#;

fn quote(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

impl LanguageBackend for RustBackend {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn true_lit(&self) -> &'static str {
        "true"
    }

    fn false_lit(&self) -> &'static str {
        "false"
    }

    fn if_open(&self, cond: &str) -> String {
        format!("if {cond} {{")
    }

    fn elif_open(&self, cond: &str) -> String {
        format!("else if {cond} {{")
    }

    fn block_close(&self) -> &'static str {
        "}"
    }

    fn str_var(&self, name: &str, value: &str) -> String {
        format!("let {name} = \"{}\";", quote(value))
    }

    fn set_flag(&self, flag: &str, value: bool) -> String {
        format!("ctx.{flag} = {value};")
    }

    fn call(&self, func: &str) -> String {
        format!("{func}(ctx);")
    }

    fn opt_call(&self, slot: &str) -> String {
        format!("if let Some(f) = ctx.{slot} {{ f(ctx); }}")
    }

    fn ret(&self) -> &'static str {
        "return;"
    }

    fn set_slot(&self, slot: &str, func: &str) -> String {
        format!("ctx.{slot} = Some({func});")
    }

    fn clear_slot(&self, slot: &str) -> String {
        format!("ctx.{slot} = None;")
    }

    fn slot_decl(&self, slot: &str) -> Option<String> {
        Some(format!("pub {slot}: Option<StateFn>,"))
    }

    fn slot_init(&self, slot: &str) -> Option<String> {
        Some(format!("{slot}: None,"))
    }

    fn in_state_impl(&self, flat: &str, parent_slot: &str) -> String {
        format!(
            "pub fn in_state_{flat}(&self) -> bool {{\n    self.{parent_slot}.map(|f| f as usize) == Some(state_{flat}_do as usize)\n}}"
        )
    }

    fn safety_check(&self, flat: &str, has_parent: bool) -> String {
        if has_parent {
            format!("if !ctx.in_state_{flat}() || ctx.transition_fired {{ return; }}")
        } else {
            "if ctx.transition_fired { return; }".to_string()
        }
    }

    fn in_state_pattern(&self) -> &'static str {
        "ctx.in_state_$1()"
    }

    fn enter_child(&self, hist_slot: Option<&str>, initial_flat: &str) -> String {
        match hist_slot {
            Some(hist) => format!(
                "if let Some(hist_fn) = ctx.{hist} {{\n    hist_fn(ctx);\n}} else {{\n    state_{initial_flat}_entry(ctx);\n}}"
            ),
            None => format!("state_{initial_flat}_entry(ctx);"),
        }
    }

    fn inspect_push(&self, text: &str) -> String {
        format!("buf.push_str(\"{}\");", quote(text))
    }

    fn inspect_call(&self, flat: &str) -> String {
        format!("inspect_{flat}(ctx, buf);")
    }

    fn inspect_slot_eq(&self, slot: &str, flat: &str) -> String {
        format!("ctx.{slot}.map(|f| f as usize) == Some(state_{flat}_do as usize)")
    }

    fn func_preamble(&self) -> &'static str {
        FUNC_PREAMBLE
    }

    fn leaf_template(&self) -> &'static str {
        LEAF_TEMPLATE
    }

    fn composite_or_template(&self) -> &'static str {
        COMPOSITE_OR_TEMPLATE
    }

    fn composite_and_template(&self) -> &'static str {
        COMPOSITE_AND_TEMPLATE
    }

    fn inspector_template(&self) -> &'static str {
        INSPECTOR_TEMPLATE
    }

    fn assemble(&self, input: &AssembleInput<'_>) -> Result<Vec<Artifact>> {
        let mut field_decls = Vec::new();
        let mut field_inits = Vec::new();
        for field in &input.model.context {
            let ty = field
                .ty
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| CodegenError::MissingFieldType {
                    field: field.name.clone(),
                })?;
            field_decls.push(format!("pub {}: {},", field.name, ty));
            field_inits.push(format!("{}: Default::default(),", field.name));
        }

        let context_init = match &input.model.context_init {
            Some(code) => format!("{{\n    let ctx = &mut ctx;\n    {}\n}}", code.trim_end()),
            None => String::new(),
        };

        let content = self.format_template(
            FILE_TEMPLATE,
            &[
                ("includes", input.model.includes.clone().unwrap_or_default()),
                ("total_states", input.parts.state_count.to_string()),
                ("slot_decls", input.parts.slot_decls.join("\n")),
                ("field_decls", field_decls.join("\n")),
                ("in_state_impls", input.parts.in_state_impls.join("\n\n")),
                ("slot_inits", input.parts.slot_inits.join("\n")),
                ("field_inits", field_inits.join("\n")),
                ("context_init", context_init),
                ("functions", input.parts.functions.join("\n")),
                ("inspectors", input.parts.inspectors.join("\n")),
            ],
        );

        Ok(vec![Artifact {
            extension: "rs",
            content,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_hooks() {
        let b = RustBackend;
        assert_eq!(b.if_open("x > 1"), "if x > 1 {");
        assert_eq!(b.set_slot("ptr_root", "state_root_a_do"), "ctx.ptr_root = Some(state_root_a_do);");
        assert_eq!(b.clear_slot("ptr_root"), "ctx.ptr_root = None;");
        assert_eq!(b.opt_call("ptr_root"), "if let Some(f) = ctx.ptr_root { f(ctx); }");
    }

    #[test]
    fn in_state_expansion() {
        let b = RustBackend;
        assert_eq!(
            b.expand_in_state("IN_STATE(root_a) && ctx.n > 2"),
            "ctx.in_state_root_a() && ctx.n > 2"
        );
    }

    #[test]
    fn history_dispatch_is_static() {
        let b = RustBackend;
        let with = b.enter_child(Some("hist_root_m"), "root_m_a");
        assert!(with.contains("hist_fn(ctx);"));
        assert!(with.contains("state_root_m_a_entry(ctx);"));
        let without = b.enter_child(None, "root_m_a");
        assert_eq!(without, "state_root_m_a_entry(ctx);");
    }

    #[test]
    fn str_var_escapes_quotes() {
        let b = RustBackend;
        assert_eq!(b.str_var("t_dst", "say \"hi\""), "let t_dst = \"say \\\"hi\\\"\";");
    }
}
