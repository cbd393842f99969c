//! Language backend abstraction.
//!
//! The tree walker in `generate` is language-agnostic; everything
//! surface-level (statement punctuation, null-check idiom, function-pointer
//! assignment, template bodies, final file assembly) comes through this
//! trait. Adding a language means implementing it and nothing else.

pub mod c;
pub mod python;
pub mod rust;

use std::sync::OnceLock;

use regex::Regex;
use smc_model::Model;

use crate::error::{CodegenError, Result};

/// A supported target language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    Rust,
    Python,
}

impl Language {
    /// Parse a language name as written in `lang:` or `--lang`.
    pub fn parse(name: &str) -> Result<Language> {
        match name {
            "c" => Ok(Language::C),
            "rust" => Ok(Language::Rust),
            "python" | "py" => Ok(Language::Python),
            _ => Err(CodegenError::UnknownLanguage {
                name: name.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Rust => "rust",
            Language::Python => "python",
        }
    }

    /// Construct the backend for this language.
    pub fn backend(&self) -> Box<dyn LanguageBackend> {
        match self {
            Language::C => Box::new(c::CBackend),
            Language::Rust => Box::new(rust::RustBackend),
            Language::Python => Box::new(python::PythonBackend),
        }
    }
}

/// One generated output file.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// File extension without the dot (`"rs"`, `"c"`, `"h"`, `"py"`).
    pub extension: &'static str,
    pub content: String,
}

/// Everything the tree walk produced, ready for final assembly.
#[derive(Debug, Default)]
pub struct GeneratedParts {
    /// Total number of states (sizes the per-state timer array).
    pub state_count: usize,
    /// Context slot declarations (active-child / history pointers).
    pub slot_decls: Vec<String>,
    /// Context slot initializers.
    pub slot_inits: Vec<String>,
    /// `in_state_*` predicate implementations (methods or macros).
    pub in_state_impls: Vec<String>,
    /// Per-state lifecycle procedures.
    pub functions: Vec<String>,
    /// Per-state inspector procedures.
    pub inspectors: Vec<String>,
    /// Forward declarations (header languages only).
    pub forwards: Vec<String>,
}

/// Input to [`LanguageBackend::assemble`].
pub struct AssembleInput<'a> {
    pub model: &'a Model,
    pub parts: &'a GeneratedParts,
    /// Output base name (file stem), e.g. `statemachine`.
    pub basename: &'a str,
}

/// Per-language syntax hooks and templates. Every method that returns code
/// returns complete lines without trailing newline unless noted.
pub trait LanguageBackend {
    fn language(&self) -> Language;

    // --- syntax tokens ---
    fn true_lit(&self) -> &'static str;
    fn false_lit(&self) -> &'static str;
    /// `if <cond>` opener including block punctuation.
    fn if_open(&self, cond: &str) -> String;
    /// `else if` opener for inspector chains.
    fn elif_open(&self, cond: &str) -> String;
    /// Block terminator line; empty for indent-sensitive languages.
    fn block_close(&self) -> &'static str;
    /// Bind a local string variable (`t_src`, `t_dst`).
    fn str_var(&self, name: &str, value: &str) -> String;
    /// Assign a boolean context flag.
    fn set_flag(&self, flag: &str, value: bool) -> String;
    /// Call a generated procedure with the context argument.
    fn call(&self, func: &str) -> String;
    /// Null-checked call through a context slot.
    fn opt_call(&self, slot: &str) -> String;
    /// Early return from the current procedure.
    fn ret(&self) -> &'static str;
    /// Store a procedure into a context slot.
    fn set_slot(&self, slot: &str, func: &str) -> String;
    /// Clear a context slot.
    fn clear_slot(&self, slot: &str) -> String;
    /// Context slot declaration, if the language declares fields.
    fn slot_decl(&self, slot: &str) -> Option<String>;
    /// Context slot initializer, if zero-init does not cover it.
    fn slot_init(&self, slot: &str) -> Option<String>;
    /// `in_state_*` predicate implementation for a state.
    fn in_state_impl(&self, flat: &str, parent_slot: &str) -> String;
    /// Region-tick guard inside an orthogonal `_do`.
    fn safety_check(&self, flat: &str, has_parent: bool) -> String;
    /// Replacement pattern for `IN_STATE(x)`, `$1` is the flat state name.
    fn in_state_pattern(&self) -> &'static str;
    /// Composite `_entry` descent: history dispatch or plain initial entry.
    fn enter_child(&self, hist_slot: Option<&str>, initial_flat: &str) -> String;
    /// Inspector: append literal text to the output buffer.
    fn inspect_push(&self, text: &str) -> String;
    /// Inspector: recurse into a child's inspector.
    fn inspect_call(&self, flat: &str) -> String;
    /// Inspector: active-child equality test against a slot.
    fn inspect_slot_eq(&self, slot: &str, flat: &str) -> String;
    /// Forward declarations for one state's procedures (header languages).
    fn forward_decls(&self, _flat: &str) -> Vec<String> {
        Vec::new()
    }

    // --- templates ---
    fn func_preamble(&self) -> &'static str;
    fn leaf_template(&self) -> &'static str;
    fn composite_or_template(&self) -> &'static str;
    fn composite_and_template(&self) -> &'static str;
    fn inspector_template(&self) -> &'static str;

    /// Expand `IN_STATE(x)` in opaque guard/action text.
    fn expand_in_state(&self, code: &str) -> String {
        static IN_STATE: OnceLock<Regex> = OnceLock::new();
        let re = IN_STATE.get_or_init(|| Regex::new(r"IN_STATE\((\w+)\)").expect("static regex"));
        re.replace_all(code, self.in_state_pattern()).into_owned()
    }

    /// Substitute `{key}` placeholders into a template. The default keeps
    /// inserted blocks as-is apart from aligning continuation lines to the
    /// placeholder column; indent-sensitive backends override to re-indent
    /// whole blocks.
    fn format_template(&self, template: &str, subs: &[(&str, String)]) -> String {
        substitute(template, subs, false)
    }

    /// Combine the generated parts into the final output file(s).
    fn assemble(&self, input: &AssembleInput<'_>) -> Result<Vec<Artifact>>;
}

/// Shared placeholder substitution.
///
/// Multi-line values inserted at a line-leading placeholder have their
/// continuation lines indented to the placeholder's column; with
/// `strip_base`, the value's own common indentation is removed first so the
/// block lands at exactly the placeholder depth (what Python needs).
pub fn substitute(template: &str, subs: &[(&str, String)], strip_base: bool) -> String {
    let mut out = template.to_string();
    for (key, value) in subs {
        let token = format!("{{{key}}}");
        let indent = line_leading_indent(template, &token);
        let rendered = match indent {
            Some(ws) if value.contains('\n') => reindent_value(value, &ws, strip_base),
            _ => value.clone(),
        };
        out = out.replace(&token, &rendered);
    }
    out
}

/// Leading whitespace of the first template line that starts with `token`.
fn line_leading_indent(template: &str, token: &str) -> Option<String> {
    template.lines().find_map(|line| {
        let ws_len = line.len() - line.trim_start().len();
        let (ws, rest) = line.split_at(ws_len);
        rest.starts_with(token).then(|| ws.to_string())
    })
}

fn reindent_value(value: &str, indent: &str, strip_base: bool) -> String {
    let lines: Vec<&str> = value.split('\n').collect();
    let base = if strip_base {
        lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.len() - l.trim_start().len())
            .min()
            .unwrap_or(0)
    } else {
        0
    };
    let mut out = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            out.push(String::new());
        } else {
            let stripped = &line[base.min(line.len() - line.trim_start().len())..];
            if i == 0 {
                // The template already provides the first line's indent.
                out.push(stripped.trim_start_matches(' ').to_string());
            } else {
                out.push(format!("{indent}{stripped}"));
            }
        }
    }
    out.join("\n")
}

/// Indent every non-empty line of a code block (used for user hooks and
/// actions inlined into transition bodies).
pub fn indent_block(code: &str, indent: &str) -> String {
    let trimmed = code.trim_end_matches('\n');
    let base = trimmed
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    trimmed
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{indent}{}", &line[base..])
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Flatten an absolute path into an identifier segment: `root_a_b`.
pub fn flatten(path: &[String]) -> String {
    path.join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_languages() {
        assert_eq!(Language::parse("rust").unwrap(), Language::Rust);
        assert_eq!(Language::parse("c").unwrap(), Language::C);
        assert_eq!(Language::parse("python").unwrap(), Language::Python);
        assert!(Language::parse("cobol").is_err());
    }

    #[test]
    fn substitute_single_line() {
        let out = substitute("fn {name}() {}", &[("name", "tick".into())], false);
        assert_eq!(out, "fn tick() {}");
    }

    #[test]
    fn substitute_aligns_continuation_lines() {
        let template = "    {body}\n";
        let value = "first();\nsecond();".to_string();
        let out = substitute(template, &[("body", value)], false);
        assert_eq!(out, "    first();\n    second();\n");
    }

    #[test]
    fn substitute_strip_base_reindents() {
        let template = "    {body}\n";
        let value = "        first()\n            nested()".to_string();
        let out = substitute(template, &[("body", value)], true);
        assert_eq!(out, "    first()\n        nested()\n");
    }

    #[test]
    fn indent_block_preserves_relative_depth() {
        let out = indent_block("if x:\n    y()\n", "        ");
        assert_eq!(out, "        if x:\n            y()");
    }

    #[test]
    fn flatten_paths() {
        let path: Vec<String> = ["root", "a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(flatten(&path), "root_a_b");
    }
}
