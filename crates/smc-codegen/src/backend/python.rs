//! Python backend: indent-sensitive single-file output with first-class
//! callables in the slot attributes. Overrides the template formatter to
//! re-indent inserted blocks to the insertion column.

use crate::backend::{substitute, Artifact, AssembleInput, Language, LanguageBackend};
use crate::error::Result;

pub struct PythonBackend;

const FUNC_PREAMBLE: &str = r#"state_name = "{short_name}"
state_full_name = "{display_name}"
time = ctx.now - ctx.state_timers[{state_id}]"#;

const LEAF_TEMPLATE: &str = r#"
def state_{c_name}_start(ctx):
    ctx.state_timers[{state_id}] = ctx.now
    {preamble}
    {hook_entry}
    {entry}
    {set_parent}

def state_{c_name}_entry(ctx):
    state_{c_name}_start(ctx)

def state_{c_name}_exit(ctx):
    {preamble}
    {exit}
    {hook_exit}
    {clear_parent}

def state_{c_name}_do(ctx):
    {preamble}
    {hook_do}
    {do}
    {transitions}
"#;

const COMPOSITE_OR_TEMPLATE: &str = r#"
def state_{c_name}_start(ctx):
    ctx.state_timers[{state_id}] = ctx.now
    {preamble}
    {hook_entry}
    {entry}
    {set_parent}

def state_{c_name}_entry(ctx):
    state_{c_name}_start(ctx)
    {enter_child}

def state_{c_name}_exit(ctx):
    {preamble}
    # the active child exits first
    if ctx.{self_exit_ptr} is not None:
        ctx.{self_exit_ptr}(ctx)
    {exit}
    {hook_exit}
    {clear_parent}

def state_{c_name}_do(ctx):
    {preamble}
    {hook_do}
    {do}
    {transitions}
    # tick the active child
    if ctx.{self_ptr} is not None:
        ctx.{self_ptr}(ctx)
"#;

const COMPOSITE_AND_TEMPLATE: &str = r#"
def state_{c_name}_start(ctx):
    ctx.state_timers[{state_id}] = ctx.now
    {preamble}
    {hook_entry}
    {entry}
    {set_parent}

def state_{c_name}_entry(ctx):
    state_{c_name}_start(ctx)
    {parallel_entries}

def state_{c_name}_exit(ctx):
    {preamble}
    # every region exits first
    {parallel_exits}
    {exit}
    {hook_exit}
    {clear_parent}

def state_{c_name}_do(ctx):
    {preamble}
    {hook_do}
    {do}
    {transitions}
    # stop if this state was exited or any transition fired
    {safety_check}
    {parallel_ticks}
"#;

const INSPECTOR_TEMPLATE: &str = r#"
def inspect_{c_name}(ctx, buf):
    {push_name}
    {content}
"#;

const FILE_TEMPLATE: &str = r#"# Generated state machine. Do not edit.

TOTAL_STATES = {total_states}

# --- User includes ---
{includes}


class Context:
    def __init__(self):
        ctx = self
        self.owner = None
        self.now = 0.0
        self.state_timers = [0.0] * TOTAL_STATES
        self.transition_fired = False
        self.terminated = False

        # Hierarchy slots
        {slot_inits}

        # User context fields
        {field_inits}

        # User context init
        {context_init}

    {in_state_impls}


# --- State logic ---
{functions}

# --- Inspection ---
{inspectors}


class StateMachine:
    def __init__(self):
        self.ctx = Context()
        self.root = None
        state_root_entry(self.ctx)
        self.root = state_root_do

    def tick(self):
        self.ctx.transition_fired = False
        if self.root is not None:
            self.root(self.ctx)
            if self.ctx.terminated:
                self.root = None

    def is_running(self):
        return self.root is not None

    def get_state_str(self):
        buf = []
        if self.root is not None:
            buf.append("/")
            inspect_root(self.ctx, buf)
        else:
            buf.append("FINISHED")
        return "".join(buf)
"#;

fn quote(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

impl LanguageBackend for PythonBackend {
    fn language(&self) -> Language {
        Language::Python
    }

    fn true_lit(&self) -> &'static str {
        "True"
    }

    fn false_lit(&self) -> &'static str {
        "False"
    }

    fn if_open(&self, cond: &str) -> String {
        format!("if {cond}:")
    }

    fn elif_open(&self, cond: &str) -> String {
        format!("elif {cond}:")
    }

    fn block_close(&self) -> &'static str {
        ""
    }

    fn str_var(&self, name: &str, value: &str) -> String {
        format!("{name} = \"{}\"", quote(value))
    }

    fn set_flag(&self, flag: &str, value: bool) -> String {
        let literal = if value { "True" } else { "False" };
        format!("ctx.{flag} = {literal}")
    }

    fn call(&self, func: &str) -> String {
        format!("{func}(ctx)")
    }

    fn opt_call(&self, slot: &str) -> String {
        format!("if ctx.{slot} is not None: ctx.{slot}(ctx)")
    }

    fn ret(&self) -> &'static str {
        "return"
    }

    fn set_slot(&self, slot: &str, func: &str) -> String {
        format!("ctx.{slot} = {func}")
    }

    fn clear_slot(&self, slot: &str) -> String {
        format!("ctx.{slot} = None")
    }

    fn slot_decl(&self, _slot: &str) -> Option<String> {
        // Python attributes need no declaration.
        None
    }

    fn slot_init(&self, slot: &str) -> Option<String> {
        Some(format!("self.{slot} = None"))
    }

    fn in_state_impl(&self, flat: &str, parent_slot: &str) -> String {
        format!("def in_state_{flat}(self):\n    return self.{parent_slot} == state_{flat}_do")
    }

    fn safety_check(&self, flat: &str, has_parent: bool) -> String {
        if has_parent {
            format!("if not ctx.in_state_{flat}() or ctx.transition_fired: return")
        } else {
            "if ctx.transition_fired: return".to_string()
        }
    }

    fn in_state_pattern(&self) -> &'static str {
        "ctx.in_state_$1()"
    }

    fn enter_child(&self, hist_slot: Option<&str>, initial_flat: &str) -> String {
        match hist_slot {
            Some(hist) => format!(
                "if ctx.{hist} is not None:\n    ctx.{hist}(ctx)\nelse:\n    state_{initial_flat}_entry(ctx)"
            ),
            None => format!("state_{initial_flat}_entry(ctx)"),
        }
    }

    fn inspect_push(&self, text: &str) -> String {
        format!("buf.append(\"{}\")", quote(text))
    }

    fn inspect_call(&self, flat: &str) -> String {
        format!("inspect_{flat}(ctx, buf)")
    }

    fn inspect_slot_eq(&self, slot: &str, flat: &str) -> String {
        format!("ctx.{slot} == state_{flat}_do")
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

    fn format_template(&self, template: &str, subs: &[(&str, String)]) -> String {
        // Re-indent inserted blocks: strip their own base indentation, then
        // align every line to the placeholder column.
        substitute(template, subs, true)
    }

    fn assemble(&self, input: &AssembleInput<'_>) -> Result<Vec<Artifact>> {
        let field_inits: Vec<String> = input
            .model
            .context
            .iter()
            .map(|field| match field.ty.as_deref() {
                Some(ty) if !ty.trim().is_empty() => {
                    format!("self.{} = 0  # {}", field.name, ty.trim())
                }
                _ => format!("self.{} = 0", field.name),
            })
            .collect();

        let content = self.format_template(
            FILE_TEMPLATE,
            &[
                ("total_states", input.parts.state_count.to_string()),
                ("includes", input.model.includes.clone().unwrap_or_default()),
                ("slot_inits", input.parts.slot_inits.join("\n")),
                ("field_inits", field_inits.join("\n")),
                (
                    "context_init",
                    input.model.context_init.clone().unwrap_or_default(),
                ),
                ("in_state_impls", input.parts.in_state_impls.join("\n\n")),
                ("functions", input.parts.functions.join("\n")),
                ("inspectors", input.parts.inspectors.join("\n")),
            ],
        );

        Ok(vec![Artifact {
            extension: "py",
            content,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_hooks() {
        let b = PythonBackend;
        assert_eq!(b.if_open("x > 1"), "if x > 1:");
        assert_eq!(b.elif_open("x > 2"), "elif x > 2:");
        assert_eq!(b.set_flag("terminated", true), "ctx.terminated = True");
        assert_eq!(
            b.opt_call("ptr_root"),
            "if ctx.ptr_root is not None: ctx.ptr_root(ctx)"
        );
    }

    #[test]
    fn format_template_reindents_blocks() {
        let b = PythonBackend;
        let template = "def f(ctx):\n    {body}\n";
        let body = "if ctx.x:\n    ctx.y = 1".to_string();
        let out = b.format_template(template, &[("body", body)]);
        assert_eq!(out, "def f(ctx):\n    if ctx.x:\n        ctx.y = 1\n");
    }

    #[test]
    fn history_dispatch_indents() {
        let b = PythonBackend;
        let code = b.enter_child(Some("hist_root_m"), "root_m_a");
        assert!(code.starts_with("if ctx.hist_root_m is not None:"));
        assert!(code.contains("\nelse:\n    state_root_m_a_entry(ctx)"));
    }
}
