//! Graphviz rendering of the state tree and its transitions.
//!
//! Composites become `cluster_*` subgraphs (dashed for orthogonals), every
//! composite gets a point-shaped start node wired to its default child (or to
//! every region), history shows as an `H` circle, decisions as yellow
//! diamonds, and fork targets fan out from the orthogonal's start point.

use smc_model::{Guard, Model, Resolution, StateId, StateKind, Transition};

struct DotWriter<'a> {
    model: &'a Model,
    composites: Vec<String>,
    node_lines: Vec<String>,
    edge_lines: Vec<String>,
}

/// Render the whole model as DOT text.
pub fn render(model: &Model) -> String {
    let mut writer = DotWriter {
        model,
        composites: Vec::new(),
        node_lines: Vec::new(),
        edge_lines: Vec::new(),
    };

    let root_path = vec!["root".to_string()];
    writer.collect_composites(&root_path, model.tree.root());
    writer.visit(&root_path, model.tree.root());
    writer.render_decisions();

    let mut lines = vec![
        "digraph StateMachine {".to_string(),
        "    compound=true; fontname=\"Arial\"; node [fontname=\"Arial\"]; edge [fontname=\"Arial\"];"
            .to_string(),
        "    // --- Structures ---".to_string(),
    ];
    lines.extend(writer.node_lines);
    lines.push("    // --- Transitions ---".to_string());
    lines.extend(writer.edge_lines);
    lines.push("}".to_string());
    lines.join("\n")
}

fn graph_id(path: &[String]) -> String {
    path.join("__")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn escape(text: &str) -> String {
    text.replace('"', "\\\"")
}

impl DotWriter<'_> {
    fn collect_composites(&mut self, path: &[String], id: StateId) {
        let state = self.model.tree.get(id);
        if state.kind.is_composite() {
            self.composites.push(graph_id(path));
            for (name, child) in &state.children {
                let mut child_path = path.to_vec();
                child_path.push(name.clone());
                self.collect_composites(&child_path, *child);
            }
        }
    }

    fn is_cluster(&self, id: &str) -> bool {
        self.composites.iter().any(|c| c == id)
    }

    /// Node reference plus optional `lhead` for edges into a state.
    fn edge_target(&self, target_id: &str) -> (String, Option<String>) {
        if self.is_cluster(target_id) {
            (
                format!("{target_id}_start"),
                Some(format!("lhead=cluster_{target_id}")),
            )
        } else {
            (target_id.to_string(), None)
        }
    }

    fn visit(&mut self, path: &[String], id: StateId) {
        let state = self.model.tree.get(id).clone();
        let my_id = graph_id(path);
        let indent = "    ".repeat(path.len());

        match &state.kind {
            StateKind::Leaf => {
                self.node_lines.push(format!(
                    "{indent}{my_id} [label=\"{}\", shape=box, style=\"rounded,filled\", fillcolor=white];",
                    escape(&state.name)
                ));
            }
            kind => {
                self.node_lines
                    .push(format!("{indent}subgraph cluster_{my_id} {{"));
                self.node_lines
                    .push(format!("{indent}    label = \"{}\";", escape(&state.name)));

                if kind.is_orthogonal() {
                    self.node_lines.push(format!(
                        "{indent}    style=dashed; color=black; penwidth=1.5; node [style=filled, fillcolor=white];"
                    ));
                    self.node_lines.push(format!(
                        "{indent}    {my_id}_start [shape=point, width=0.15];"
                    ));
                    for name in state.children.keys() {
                        let mut child_path = path.to_vec();
                        child_path.push(name.clone());
                        let (target, lhead) = self.edge_target(&graph_id(&child_path));
                        let attrs = match lhead {
                            Some(lhead) => format!("style=dashed, {lhead}"),
                            None => "style=dashed".to_string(),
                        };
                        self.node_lines.push(format!(
                            "{indent}    {my_id}_start -> {target} [{attrs}];"
                        ));
                    }
                } else {
                    self.node_lines.push(format!(
                        "{indent}    style=rounded; color=black; penwidth=1.0; node [style=filled, fillcolor=white];"
                    ));
                    if let StateKind::CompositeOr { initial, history } = kind {
                        if *history {
                            self.node_lines.push(format!(
                                "{indent}    {my_id}_hist [shape=circle, label=\"H\", width=0.3];"
                            ));
                        }
                        let mut init_path = path.to_vec();
                        init_path.push(initial.clone());
                        let (target, lhead) = self.edge_target(&graph_id(&init_path));
                        self.node_lines.push(format!(
                            "{indent}    {my_id}_start [shape=point, width=0.15];"
                        ));
                        self.node_lines.push(format!(
                            "{indent}    {my_id}_start -> {target} [{}];",
                            lhead.unwrap_or_default()
                        ));
                    }
                }

                for (name, child) in &state.children {
                    let mut child_path = path.to_vec();
                    child_path.push(name.clone());
                    self.visit(&child_path, *child);
                }
                self.node_lines.push(format!("{indent}}}"));
            }
        }

        let is_composite = state.kind.is_composite();
        for transition in &state.transitions {
            self.visit_transition(path, &my_id, is_composite, transition);
        }
    }

    fn visit_transition(
        &mut self,
        path: &[String],
        my_id: &str,
        is_composite: bool,
        transition: &Transition,
    ) {
        let src = if is_composite {
            format!("{my_id}_start")
        } else {
            my_id.to_string()
        };
        let ltail = is_composite.then(|| format!("ltail=cluster_{my_id}"));

        let (target, lhead, fanout) = match transition.to.resolve(path) {
            // Termination is not drawn.
            Resolution::Terminate => return,
            Resolution::Decision(name) => {
                let dec_path = vec!["root".to_string(), name];
                (graph_id(&dec_path), None, Vec::new())
            }
            Resolution::One(target) => {
                let (node, lhead) = self.edge_target(&graph_id(&target));
                (node, lhead, Vec::new())
            }
            Resolution::Fork { base, limbs } => {
                let base_id = graph_id(&base);
                (format!("{base_id}_start"), None, limbs)
            }
        };

        let mut attrs: Vec<String> = [ltail, lhead].into_iter().flatten().collect();
        attrs.push(format!("label=\"{}\"", transition_label(transition)));
        attrs.push("fontsize=10".to_string());
        self.edge_lines
            .push(format!("{src} -> {target} [{}];", attrs.join(", ")));

        // Fork fan-out: dashed edges from the orthogonal's start point to each
        // limb target.
        for limb in &fanout {
            let (node, lhead) = self.edge_target(&graph_id(limb));
            let mut attrs = vec!["style=dashed".to_string()];
            attrs.extend(lhead);
            self.edge_lines
                .push(format!("{target} -> {node} [{}];", attrs.join(", ")));
        }
    }

    fn render_decisions(&mut self) {
        let decisions: Vec<(String, Vec<Transition>)> = self
            .model
            .decisions
            .iter()
            .map(|(name, rules)| (name.clone(), rules.clone()))
            .collect();
        for (name, rules) in &decisions {
            let dec_path = vec!["root".to_string(), name.clone()];
            let dec_id = graph_id(&dec_path);
            self.node_lines.push(format!(
                "    {dec_id} [label=\"?\", shape=diamond, style=filled, fillcolor=lightyellow];"
            ));
            for rule in rules {
                let (target, lhead) = match rule.to.resolve(&dec_path) {
                    Resolution::Terminate => continue,
                    Resolution::Decision(other) => {
                        (graph_id(&["root".to_string(), other]), None)
                    }
                    Resolution::One(target) => self.edge_target(&graph_id(&target)),
                    Resolution::Fork { base, .. } => {
                        (format!("{}_start", graph_id(&base)), None)
                    }
                };
                let guard = match &rule.guard {
                    Some(Guard::Expr(expr)) => escape(expr),
                    Some(Guard::Bool(b)) => b.to_string(),
                    None => String::new(),
                };
                let mut attrs = vec![format!("label=\"{guard}\""), "fontsize=10".to_string()];
                attrs.extend(lhead);
                self.edge_lines
                    .push(format!("    {dec_id} -> {target} [{}];", attrs.join(", ")));
            }
        }
    }
}

fn transition_label(transition: &Transition) -> String {
    let mut parts = Vec::new();
    if let Some(Guard::Expr(expr)) = &transition.guard {
        parts.push(format!("[{expr}]"));
    }
    if let Some(action) = &transition.action {
        let mut text = action.trim().replace('\n', "; ");
        if text.chars().count() > 15 {
            text = text.chars().take(12).collect::<String>() + "...";
        }
        parts.push(format!("/ {text}"));
    }
    escape(&parts.join(" "))
}
