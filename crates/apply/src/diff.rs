//! Structural diff between two JSON trees.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub adds: usize,
    pub updates: usize,
    pub removes: usize,
}

impl DiffSummary {
    pub fn from_entries(entries: &[DiffEntry]) -> Self {
        let mut s = DiffSummary::default();
        for e in entries {
            match e.change {
                Change::Added { .. } => s.adds += 1,
                Change::Changed { .. } => s.updates += 1,
                Change::Removed { .. } => s.removes += 1,
            }
        }
        s
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Change {
    Added { value: Json },
    Removed { value: Json },
    Changed { from: Json, to: Json },
}

/// One difference, addressed by a dotted path with `[i]` array indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub path: String,
    #[serde(flatten)]
    pub change: Change,
}

fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() { key.to_string() } else { format!("{parent}.{key}") }
}

/// Differences that turn `base` into `target`.
///
/// Object keys are visited in `target` order, then keys only `base` has;
/// arrays compare index by index.
pub fn structural_diff(base: &Json, target: &Json) -> Vec<DiffEntry> {
    fn walk(path: &str, b: &Json, t: &Json, out: &mut Vec<DiffEntry>) {
        match (b, t) {
            (Json::Object(bo), Json::Object(to)) => {
                for (k, tv) in to.iter() {
                    let p = join(path, k);
                    match bo.get(k) {
                        Some(bv) if bv == tv => {}
                        Some(bv) => walk(&p, bv, tv, out),
                        None => out.push(DiffEntry { path: p, change: Change::Added { value: tv.clone() } }),
                    }
                }
                for (k, bv) in bo.iter() {
                    if !to.contains_key(k) {
                        out.push(DiffEntry { path: join(path, k), change: Change::Removed { value: bv.clone() } });
                    }
                }
            }
            (Json::Array(ba), Json::Array(ta)) => {
                let min_len = ba.len().min(ta.len());
                for i in 0..min_len {
                    if ba[i] != ta[i] {
                        walk(&format!("{path}[{i}]"), &ba[i], &ta[i], out);
                    }
                }
                for (i, tv) in ta.iter().enumerate().skip(min_len) {
                    out.push(DiffEntry { path: format!("{path}[{i}]"), change: Change::Added { value: tv.clone() } });
                }
                for (i, bv) in ba.iter().enumerate().skip(min_len) {
                    out.push(DiffEntry { path: format!("{path}[{i}]"), change: Change::Removed { value: bv.clone() } });
                }
            }
            // Scalars differ or type differs
            (bv, tv) => {
                if bv != tv {
                    out.push(DiffEntry { path: path.to_string(), change: Change::Changed { from: bv.clone(), to: tv.clone() } });
                }
            }
        }
    }
    let mut out = Vec::new();
    walk("", base, target, &mut out);
    out
}

/// `- path: old` / `+ path: new` lines, one pair per change.
pub fn render_entries(entries: &[DiffEntry]) -> String {
    let compact = |v: &Json| serde_json::to_string(v).unwrap_or_else(|_| v.to_string());
    let mut out = String::new();
    for e in entries {
        let path = if e.path.is_empty() { "(root)" } else { e.path.as_str() };
        let _ = match &e.change {
            Change::Added { value } => writeln!(out, "+ {path}: {}", compact(value)),
            Change::Removed { value } => writeln!(out, "- {path}: {}", compact(value)),
            Change::Changed { from, to } => writeln!(out, "- {path}: {}\n+ {path}: {}", compact(from), compact(to)),
        };
    }
    out
}
