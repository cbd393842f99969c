//! C backend: header/source split, `StateFunc` typedef slots zeroed by
//! `memset`, `IN_STATE_*` macros, and a bounded `safe_strcat` inspector.

use crate::backend::{Artifact, AssembleInput, Language, LanguageBackend};
use crate::error::{CodegenError, Result};

pub struct CBackend;

const FUNC_PREAMBLE: &str = r#"(void)ctx;
const char* state_name = "{short_name}";
const char* state_full_name = "{display_name}";
(void)state_name; (void)state_full_name;
double time = ctx->now - ctx->state_timers[{state_id}];
(void)time;"#;

const LEAF_TEMPLATE: &str = r#"
void state_{c_name}_start(SM_Context* ctx) {
    ctx->state_timers[{state_id}] = ctx->now;
    {preamble}
    {hook_entry}
    {entry}
    {set_parent}
}

void state_{c_name}_entry(SM_Context* ctx) {
    state_{c_name}_start(ctx);
}

void state_{c_name}_exit(SM_Context* ctx) {
    {preamble}
    {exit}
    {hook_exit}
    {clear_parent}
}

void state_{c_name}_do(SM_Context* ctx) {
    {preamble}
    {hook_do}
    {do}
    {transitions}
}
"#;

const COMPOSITE_OR_TEMPLATE: &str = r#"
void state_{c_name}_start(SM_Context* ctx) {
    ctx->state_timers[{state_id}] = ctx->now;
    {preamble}
    {hook_entry}
    {entry}
    {set_parent}
}

void state_{c_name}_entry(SM_Context* ctx) {
    state_{c_name}_start(ctx);
    {enter_child}
}

void state_{c_name}_exit(SM_Context* ctx) {
    {preamble}
    /* the active child exits first */
    if (ctx->{self_exit_ptr}) ctx->{self_exit_ptr}(ctx);
    {exit}
    {hook_exit}
    {clear_parent}
}

void state_{c_name}_do(SM_Context* ctx) {
    {preamble}
    {hook_do}
    {do}
    {transitions}
    /* tick the active child */
    if (ctx->{self_ptr}) ctx->{self_ptr}(ctx);
}
"#;

const COMPOSITE_AND_TEMPLATE: &str = r#"
void state_{c_name}_start(SM_Context* ctx) {
    ctx->state_timers[{state_id}] = ctx->now;
    {preamble}
    {hook_entry}
    {entry}
    {set_parent}
}

void state_{c_name}_entry(SM_Context* ctx) {
    state_{c_name}_start(ctx);
    {parallel_entries}
}

void state_{c_name}_exit(SM_Context* ctx) {
    {preamble}
    /* every region exits first */
    {parallel_exits}
    {exit}
    {hook_exit}
    {clear_parent}
}

void state_{c_name}_do(SM_Context* ctx) {
    {preamble}
    {hook_do}
    {do}
    {transitions}
    /* stop if this state was exited or any transition fired */
    {safety_check}
    {parallel_ticks}
}
"#;

const INSPECTOR_TEMPLATE: &str = r#"
void inspect_{c_name}(SM_Context* ctx, char* buf, size_t* off, size_t max) {
    (void)ctx;
    {push_name}
    {content}
}
"#;

const HEADER_TEMPLATE: &str = r#"#ifndef {guard}
#define {guard}
#include <stdio.h>
#include <stdbool.h>
#include <string.h>

#define TOTAL_STATES {total_states}

typedef struct SM_Context SM_Context;
typedef void (*StateFunc)(SM_Context* ctx);

/* --- Forward declarations --- */
{forwards}

struct SM_Context {
    void* owner;
    double now;
    double state_timers[TOTAL_STATES];
    bool transition_fired;
    bool terminated;

    /* Hierarchy slots */
    {slot_decls}

    /* User context fields */
    {field_decls}
};

typedef struct {
    SM_Context ctx;
    StateFunc root;
} StateMachine;

void sm_init(StateMachine* sm);
void sm_tick(StateMachine* sm);
bool sm_is_running(StateMachine* sm);
void sm_get_state_str(StateMachine* sm, char* buffer, size_t max_len);

/* --- IN_STATE macros --- */
{in_state_macros}

#endif
"#;

const SOURCE_TEMPLATE: &str = r#"#include "{header_name}"

/* --- User includes --- */
{includes}

static void safe_strcat(char* dest, const char* src, size_t* offset, size_t max) {
    size_t len = strlen(src);
    if (*offset + len >= max) return;
    strcpy(dest + *offset, src);
    *offset += len;
}

/* --- State logic --- */
{functions}

/* --- Inspection --- */
{inspectors}

void sm_init(StateMachine* sm) {
    memset(&sm->ctx, 0, sizeof(sm->ctx));
    sm->ctx.owner = sm;
    SM_Context* ctx = &sm->ctx;
    (void)ctx;
    {context_init}
    state_root_entry(ctx);
    sm->root = state_root_do;
}

void sm_tick(StateMachine* sm) {
    sm->ctx.transition_fired = false;
    if (sm->root) {
        sm->root(&sm->ctx);
        if (sm->ctx.terminated) {
            sm->root = NULL;
        }
    }
}

bool sm_is_running(StateMachine* sm) {
    return sm->root != NULL;
}

void sm_get_state_str(StateMachine* sm, char* buffer, size_t max_len) {
    size_t offset = 0;
    buffer[0] = '\0';
    if (sm->root) {
        safe_strcat(buffer, "/", &offset, max_len);
        inspect_root(&sm->ctx, buffer, &offset, max_len);
    } else {
        safe_strcat(buffer, "FINISHED", &offset, max_len);
    }
}
"#;

fn quote(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

impl LanguageBackend for CBackend {
    fn language(&self) -> Language {
        Language::C
    }

    fn true_lit(&self) -> &'static str {
        "true"
    }

    fn false_lit(&self) -> &'static str {
        "false"
    }

    fn if_open(&self, cond: &str) -> String {
        format!("if ({cond}) {{")
    }

    fn elif_open(&self, cond: &str) -> String {
        format!("else if ({cond}) {{")
    }

    fn block_close(&self) -> &'static str {
        "}"
    }

    fn str_var(&self, name: &str, value: &str) -> String {
        format!("const char* {name} = \"{}\"; (void){name};", quote(value))
    }

    fn set_flag(&self, flag: &str, value: bool) -> String {
        format!("ctx->{flag} = {value};")
    }

    fn call(&self, func: &str) -> String {
        format!("{func}(ctx);")
    }

    fn opt_call(&self, slot: &str) -> String {
        format!("if (ctx->{slot}) ctx->{slot}(ctx);")
    }

    fn ret(&self) -> &'static str {
        "return;"
    }

    fn set_slot(&self, slot: &str, func: &str) -> String {
        format!("ctx->{slot} = {func};")
    }

    fn clear_slot(&self, slot: &str) -> String {
        format!("ctx->{slot} = NULL;")
    }

    fn slot_decl(&self, slot: &str) -> Option<String> {
        Some(format!("StateFunc {slot};"))
    }

    fn slot_init(&self, _slot: &str) -> Option<String> {
        // memset covers zero-initialization.
        None
    }

    fn in_state_impl(&self, flat: &str, parent_slot: &str) -> String {
        format!("#define IN_STATE_{flat} (ctx->{parent_slot} == state_{flat}_do)")
    }

    fn safety_check(&self, flat: &str, has_parent: bool) -> String {
        if has_parent {
            format!("if (!IN_STATE_{flat} || ctx->transition_fired) return;")
        } else {
            "if (ctx->transition_fired) return;".to_string()
        }
    }

    fn in_state_pattern(&self) -> &'static str {
        "IN_STATE_$1"
    }

    fn enter_child(&self, hist_slot: Option<&str>, initial_flat: &str) -> String {
        match hist_slot {
            Some(hist) => format!(
                "if (ctx->{hist}) {{\n    ctx->{hist}(ctx);\n}} else {{\n    state_{initial_flat}_entry(ctx);\n}}"
            ),
            None => format!("state_{initial_flat}_entry(ctx);"),
        }
    }

    fn inspect_push(&self, text: &str) -> String {
        format!("safe_strcat(buf, \"{}\", off, max);", quote(text))
    }

    fn inspect_call(&self, flat: &str) -> String {
        format!("inspect_{flat}(ctx, buf, off, max);")
    }

    fn inspect_slot_eq(&self, slot: &str, flat: &str) -> String {
        format!("ctx->{slot} == state_{flat}_do")
    }

    fn forward_decls(&self, flat: &str) -> Vec<String> {
        vec![
            format!("void state_{flat}_start(SM_Context* ctx);"),
            format!("void state_{flat}_entry(SM_Context* ctx);"),
            format!("void state_{flat}_exit(SM_Context* ctx);"),
            format!("void state_{flat}_do(SM_Context* ctx);"),
        ]
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
        for field in &input.model.context {
            let ty = field
                .ty
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| CodegenError::MissingFieldType {
                    field: field.name.clone(),
                })?;
            field_decls.push(format!("{ty} {};", field.name));
        }

        let guard: String = input
            .basename
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect::<String>()
            + "_H";

        let header = self.format_template(
            HEADER_TEMPLATE,
            &[
                ("guard", guard),
                ("total_states", input.parts.state_count.to_string()),
                ("forwards", input.parts.forwards.join("\n")),
                ("slot_decls", input.parts.slot_decls.join("\n")),
                ("field_decls", field_decls.join("\n")),
                ("in_state_macros", input.parts.in_state_impls.join("\n")),
            ],
        );

        let source = self.format_template(
            SOURCE_TEMPLATE,
            &[
                ("header_name", format!("{}.h", input.basename)),
                ("includes", input.model.includes.clone().unwrap_or_default()),
                ("functions", input.parts.functions.join("\n")),
                ("inspectors", input.parts.inspectors.join("\n")),
                (
                    "context_init",
                    input
                        .model
                        .context_init
                        .clone()
                        .unwrap_or_default()
                        .trim_end()
                        .to_string(),
                ),
            ],
        );

        Ok(vec![
            Artifact {
                extension: "h",
                content: header,
            },
            Artifact {
                extension: "c",
                content: source,
            },
        ])
    }
}
