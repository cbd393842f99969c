//! Target path expressions: parsing and resolution against a current state.
//!
//! A transition's `to:` is one of a handful of textual forms (`/abs`,
//! `sibling`, `./child`, `../uncle`, `.`, `null`, `@decision`, or a fork
//! `prefix/[limb, limb]`). They parse once into a [`TargetExpr`] and resolve
//! to canonical absolute paths (always rooted at the synthetic `root`
//! segment). Resolution is pure path arithmetic; existence and kind checks
//! belong to the validator.

/// A parsed target path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetExpr {
    /// Termination token (`null`, `~`, empty, or an absent `to:`).
    Null,
    /// `@name`: reference into the flattened decision table.
    Decision(String),
    /// `prefix/[a, b/c]`: fork into orthogonal regions.
    Fork {
        base: Box<TargetExpr>,
        limbs: Vec<Vec<String>>,
    },
    /// `.`: explicit self-transition.
    Current,
    /// `/a/b`: absolute from the root.
    Absolute(Vec<String>),
    /// `./a/b`: descend from the current state.
    Descend(Vec<String>),
    /// `../a`: pop `levels` ancestors, then resolve as a sibling there.
    Up { levels: usize, rest: Vec<String> },
    /// `a/b`: sibling of the current state (possibly descending).
    Sibling(Vec<String>),
}

/// A resolved target, in canonical absolute segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The machine terminates.
    Terminate,
    /// Delegate to a named decision.
    Decision(String),
    /// A single absolute path.
    One(Vec<String>),
    /// Fork: the orthogonal base plus one absolute path per limb.
    Fork {
        base: Vec<String>,
        limbs: Vec<Vec<String>>,
    },
}

fn split_segments(text: &str) -> Vec<String> {
    text.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl TargetExpr {
    /// Parse a raw `to:` value. `None` is the termination token.
    pub fn parse(raw: Option<&str>) -> TargetExpr {
        let text = match raw {
            None => return TargetExpr::Null,
            Some(t) => t.trim(),
        };
        if text.is_empty() || text == "null" || text == "~" {
            return TargetExpr::Null;
        }
        if let Some(name) = text.strip_prefix('@') {
            return TargetExpr::Decision(name.to_string());
        }
        // Fork form: everything before the last `/[` is the base expression,
        // the bracket holds comma-separated limb sub-paths.
        if text.ends_with(']') {
            if let Some(open) = text.rfind("/[") {
                let base = &text[..open];
                let inner = &text[open + 2..text.len() - 1];
                let limbs = inner
                    .split(',')
                    .map(|limb| split_segments(limb.trim()))
                    .collect();
                return TargetExpr::Fork {
                    base: Box::new(TargetExpr::parse(Some(base))),
                    limbs,
                };
            }
        }
        if text == "." || text == "./" {
            return TargetExpr::Current;
        }
        if let Some(rest) = text.strip_prefix('/') {
            let mut segs = split_segments(rest);
            if segs.first().map(String::as_str) != Some("root") {
                segs.insert(0, "root".to_string());
            }
            return TargetExpr::Absolute(segs);
        }
        // Legacy absolute without the leading slash.
        if text == "root" || text.starts_with("root/") {
            return TargetExpr::Absolute(split_segments(text));
        }
        if let Some(rest) = text.strip_prefix("./") {
            return TargetExpr::Descend(split_segments(rest));
        }
        if text.starts_with("../") {
            let mut levels = 0;
            let mut rest = text;
            while let Some(tail) = rest.strip_prefix("../") {
                levels += 1;
                rest = tail;
            }
            return TargetExpr::Up {
                levels,
                rest: split_segments(rest),
            };
        }
        TargetExpr::Sibling(split_segments(text))
    }

    /// Resolve against the current absolute path (`current[0] == "root"`).
    pub fn resolve(&self, current: &[String]) -> Resolution {
        match self {
            TargetExpr::Null => Resolution::Terminate,
            TargetExpr::Decision(name) => Resolution::Decision(name.clone()),
            TargetExpr::Current => Resolution::One(current.to_vec()),
            TargetExpr::Absolute(segs) => Resolution::One(segs.clone()),
            TargetExpr::Descend(segs) => {
                let mut path = current.to_vec();
                path.extend(segs.iter().cloned());
                Resolution::One(path)
            }
            TargetExpr::Up { levels, rest } => {
                // Pop one ancestor per `../`, never past the root.
                let kept = current.len().saturating_sub(*levels).max(1);
                let mut path = current[..kept].to_vec();
                if !rest.is_empty() {
                    // Remainder is a sibling at that level.
                    path.pop();
                    if path.is_empty() {
                        path.push("root".to_string());
                    }
                    path.extend(rest.iter().cloned());
                }
                Resolution::One(path)
            }
            TargetExpr::Sibling(segs) => {
                let mut path = current[..current.len().saturating_sub(1).max(1)].to_vec();
                path.extend(segs.iter().cloned());
                Resolution::One(path)
            }
            TargetExpr::Fork { base, limbs } => {
                let base_path = match base.resolve(current) {
                    Resolution::One(p) => p,
                    // Nested forks / decisions / null inside a fork base are
                    // nonsense; surface the base as-is and let validation
                    // reject the construct.
                    other => return other,
                };
                let limbs = limbs
                    .iter()
                    .map(|limb| {
                        let mut p = base_path.clone();
                        p.extend(limb.iter().cloned());
                        p
                    })
                    .collect();
                Resolution::Fork {
                    base: base_path,
                    limbs,
                }
            }
        }
    }
}

/// Render an absolute path for diagnostics and labels: `/a/b` (the `root`
/// segment is implied by the leading slash; the root itself is `/`).
pub fn display_path(path: &[String]) -> String {
    if path.len() <= 1 {
        "/".to_string()
    } else {
        format!("/{}", path[1..].join("/"))
    }
}
