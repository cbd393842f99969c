//! smc: hierarchical state machine compiler.
//!
//! Consumes a declarative YAML statechart and emits executable source in a
//! target language (function-pointer dispatch) plus a Graphviz diagram.

mod compile;

use std::path::PathBuf;
use std::process;

use clap::Parser;

#[derive(Parser)]
#[command(name = "smc", version, about = "Hierarchical state machine compiler")]
struct Cli {
    /// Input statechart model (YAML)
    file: PathBuf,

    /// Output language (overrides the model's `lang:` field)
    #[arg(long, value_parser = ["rust", "c", "python"])]
    lang: Option<String>,

    /// Output base path without extension
    #[arg(short, long, default_value = "./statemachine")]
    output: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = compile::run(&cli.file, cli.lang.as_deref(), &cli.output) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    const TOGGLE: &str = r#"
lang: rust
initial: a
context:
  - { name: counter, type: i64 }
states:
  a:
    transitions:
      - { guard: ctx.counter == 3, to: b }
  b:
    transitions:
      - { guard: ctx.counter == 6, to: a }
"#;

    fn write_fixture(dir: &Path, yaml: &str) -> PathBuf {
        let path = dir.join("machine.yaml");
        fs::write(&path, yaml).unwrap();
        path
    }

    fn read(base: &Path, ext: &str) -> String {
        fs::read_to_string(format!("{}.{ext}", base.display())).unwrap()
    }

    /// Full pipeline: model in, .dot plus .rs out.
    #[test]
    fn toggle_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), TOGGLE);
        let base = dir.path().join("statemachine");

        compile::run(&input, None, &base).unwrap();

        let dot = read(&base, "dot");
        assert!(dot.contains("digraph StateMachine"));
        assert!(dot.contains("label=\"[ctx.counter == 3]\""));

        let rs = read(&base, "rs");
        assert!(rs.contains("pub struct StateMachine"));
        assert!(rs.contains("fn state_root_a_do"));
        assert!(rs.contains("pub counter: i64,"));
        // The transition lowers to exit-then-entry.
        let do_a = &rs[rs.find("fn state_root_a_do").unwrap()..];
        assert!(
            do_a.find("state_root_a_exit(ctx);").unwrap()
                < do_a.find("state_root_b_entry(ctx);").unwrap()
        );
    }

    /// P6: byte-for-byte reproducible artifacts.
    #[test]
    fn emission_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), TOGGLE);

        let base_a = dir.path().join("first");
        let base_b = dir.path().join("second");
        compile::run(&input, None, &base_a).unwrap();
        compile::run(&input, None, &base_b).unwrap();

        assert_eq!(read(&base_a, "rs"), read(&base_b, "rs"));
        assert_eq!(read(&base_a, "dot"), read(&base_b, "dot"));
    }

    /// The C backend produces both header and source.
    #[test]
    fn c_backend_writes_header_and_source() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), TOGGLE);
        let base = dir.path().join("sm");

        compile::run(&input, Some("c"), &base).unwrap();

        let header = read(&base, "h");
        assert!(header.contains("#ifndef SM_H"));
        assert!(header.contains("void sm_tick(StateMachine* sm);"));
        let source = read(&base, "c");
        assert!(source.contains("#include \"sm.h\""));
        assert!(source.contains("void state_root_a_do(SM_Context* ctx)"));
    }

    /// A `lang:` list emits every listed language in one run.
    #[test]
    fn multi_language_model() {
        let yaml = TOGGLE.replace("lang: rust", "lang: [c, rust, python]");
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), &yaml);
        let base = dir.path().join("statemachine");

        compile::run(&input, None, &base).unwrap();

        for ext in ["dot", "h", "c", "rs", "py"] {
            assert!(
                Path::new(&format!("{}.{ext}", base.display())).is_file(),
                "missing .{ext}"
            );
        }
    }

    /// No placeholder survives substitution in any backend.
    #[test]
    fn no_unsubstituted_placeholders() {
        let yaml = TOGGLE.replace("lang: rust", "lang: [c, rust, python]");
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), &yaml);
        let base = dir.path().join("statemachine");

        compile::run(&input, None, &base).unwrap();

        for ext in ["h", "c", "rs", "py"] {
            let content = read(&base, ext);
            for token in ["{c_name}", "{preamble}", "{transitions}", "{state_id}"] {
                assert!(!content.contains(token), "{token} left in .{ext}");
            }
        }
    }

    /// Validation failures report `validation:` and write nothing.
    #[test]
    fn validation_error_leaves_no_artifacts() {
        let yaml = r#"
initial: a
states:
  a:
    transitions:
      - { to: nowhere }
"#;
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), yaml);
        let base = dir.path().join("statemachine");

        let err = compile::run(&input, None, &base).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.starts_with("validation: /a:"), "{msg}");
        assert!(!Path::new(&format!("{}.dot", base.display())).exists());
        assert!(!Path::new(&format!("{}.rs", base.display())).exists());
    }

    /// Missing input file reports `input:`.
    #[test]
    fn missing_input_reports_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = compile::run(
            &dir.path().join("ghost.yaml"),
            None,
            &dir.path().join("out"),
        )
        .unwrap_err();
        assert!(format!("{err:#}").starts_with("input:"));
    }

    /// A context field without a type is an emission error for Rust/C, and
    /// must not leave partial output behind.
    #[test]
    fn missing_type_is_emission_error() {
        let yaml = r#"
initial: a
context:
  - { name: untyped }
states:
  a: {}
"#;
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), yaml);
        let base = dir.path().join("statemachine");

        let err = compile::run(&input, Some("rust"), &base).unwrap_err();
        assert!(format!("{err:#}").starts_with("emission:"));
        assert!(!Path::new(&format!("{}.dot", base.display())).exists());
    }

    /// Scenario: explicit self-transition exits and re-enters the state.
    #[test]
    fn self_transition_full_reentry() {
        let yaml = r#"
initial: x
states:
  x:
    transitions:
      - { guard: ctx.n == 2, to: "." }
"#;
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), yaml);
        let base = dir.path().join("statemachine");
        compile::run(&input, None, &base).unwrap();

        let rs = read(&base, "rs");
        let do_x = &rs[rs.find("fn state_root_x_do").unwrap()..];
        let exit_at = do_x.find("state_root_x_exit(ctx);").unwrap();
        let entry_at = do_x.find("state_root_x_entry(ctx);").unwrap();
        assert!(exit_at < entry_at);
    }

    /// Scenario: shallow history restores the last active child.
    #[test]
    fn history_restores_last_child() {
        let yaml = r#"
initial: m
states:
  m:
    history: true
    initial: a
    states:
      a:
        transitions:
          - { guard: ctx.go_b, to: b }
      b:
        transitions:
          - { guard: ctx.leave, to: /out }
  out:
    transitions:
      - { guard: ctx.back, to: m }
"#;
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), yaml);
        let base = dir.path().join("statemachine");
        compile::run(&input, None, &base).unwrap();

        let rs = read(&base, "rs");
        // Children record themselves in the history slot...
        assert!(rs.contains("ctx.hist_root_m = Some(state_root_m_b_entry);"));
        // ...and re-entry dispatches through it.
        assert!(rs.contains("if let Some(hist_fn) = ctx.hist_root_m {"));
        // Exit clears only the run/exit slots, never history.
        assert!(!rs.contains("ctx.hist_root_m = None;"));
    }

    /// Scenario: orthogonal regions plus termination once both are done.
    #[test]
    fn orthogonal_fork_and_termination() {
        let yaml = r#"
orthogonal: true
transitions:
  - { guard: IN_STATE(root_r1_q) && IN_STATE(root_r2_v), to: null }
states:
  r1:
    initial: p
    states:
      p: { transitions: [ { guard: ctx.t1, to: q } ] }
      q: {}
  r2:
    initial: u
    states:
      u: { transitions: [ { guard: ctx.t2, to: v } ] }
      v: {}
"#;
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), yaml);
        let base = dir.path().join("statemachine");
        compile::run(&input, None, &base).unwrap();

        let rs = read(&base, "rs");
        assert!(rs.contains("if ctx.in_state_root_r1_q() && ctx.in_state_root_r2_v()"));
        assert!(rs.contains("ctx.terminated = true;"));
        // Inspector renders the orthogonal configuration.
        assert!(rs.contains("buf.push_str(\"/[\");"));
        assert!(rs.contains("buf.push_str(\" | \");"));
        assert!(rs.contains("buf.push_str(\"FINISHED\")"));
    }

    /// Scenario: cross-limb transition re-enters the whole orthogonal.
    #[test]
    fn cross_limb_full_reentry() {
        let yaml = r#"
initial: m
states:
  m:
    orthogonal: true
    states:
      r1:
        initial: p
        states:
          p: { transitions: [ { guard: ctx.jump, to: ../r2/v } ] }
      r2:
        initial: u
        states:
          u: {}
          v: {}
"#;
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), yaml);
        let base = dir.path().join("statemachine");
        compile::run(&input, None, &base).unwrap();

        let rs = read(&base, "rs");
        let do_p = &rs[rs.find("fn state_root_m_r1_p_do").unwrap()..];
        let body = &do_p[..do_p.find("\n}").unwrap()];
        // The orthogonal itself exits, then restarts with both regions.
        assert!(body.contains("state_root_m_exit(ctx);"), "{body}");
        assert!(body.contains("state_root_m_start(ctx);"), "{body}");
        assert!(body.contains("state_root_m_r1_entry(ctx);"), "{body}");
        assert!(body.contains("state_root_m_r2_v_entry(ctx);"), "{body}");
    }

    /// Scenario: decision arms keep first-match order.
    #[test]
    fn decision_first_match_order() {
        let yaml = r#"
initial: a
decisions:
  pick:
    - { guard: ctx.x > 0, to: b }
    - { guard: ctx.x < 0, to: c }
states:
  a:
    transitions:
      - { guard: ctx.ready, to: "@pick" }
  b: {}
  c: {}
"#;
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), yaml);
        let base = dir.path().join("statemachine");
        compile::run(&input, None, &base).unwrap();

        let rs = read(&base, "rs");
        let do_a = &rs[rs.find("fn state_root_a_do").unwrap()..];
        let first = do_a.find("if ctx.x > 0").unwrap();
        let second = do_a.find("if ctx.x < 0").unwrap();
        assert!(first < second);
        // Each fired arm returns, so a later guard never runs after a match.
        let first_arm = &do_a[first..second];
        assert!(first_arm.contains("return;"));
    }

    /// `-o` with a nested directory creates the parents.
    #[test]
    fn output_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), TOGGLE);
        let base = dir.path().join("deep/nested/out");

        compile::run(&input, None, &base).unwrap();
        assert!(Path::new(&format!("{}.rs", base.display())).is_file());
    }

    /// Unsupported language names are input errors.
    #[test]
    fn unsupported_language_is_rejected() {
        let yaml = TOGGLE.replace("lang: rust", "lang: cobol");
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), &yaml);
        let err = compile::run(&input, None, &dir.path().join("out")).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.starts_with("input:"), "{msg}");
        assert!(msg.contains("unsupported language 'cobol'"), "{msg}");
    }

    /// Python artifact is structurally sound: no tabs, balanced defs.
    #[test]
    fn python_artifact_shape() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_fixture(dir.path(), TOGGLE);
        let base = dir.path().join("statemachine");
        compile::run(&input, Some("python"), &base).unwrap();

        let py = read(&base, "py");
        assert!(py.contains("class Context:"));
        assert!(py.contains("class StateMachine:"));
        assert!(py.contains("def state_root_a_do(ctx):"));
        assert!(py.contains("self.counter = 0  # i64"));
        assert!(!py.contains('\t'));
    }
}
