use super::versions::VersionComparison;
use crate::model::ModuleInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::Display;

const KNOWN_RENAMES: &[(&str, &str)] = &[("imds", "advertising"), ("gothamads", "intenze")];

/// How a rename candidate was recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RenameMethod {
    KnownRename,
    CaseChange,
    Substring,
    Abbreviation,
    Similarity,
}

/// A removed module that plausibly reappeared under a new name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenameCandidate {
    pub category: String,
    pub old: ModuleInfo,
    pub new: ModuleInfo,
    pub score: f64,
    pub method: RenameMethod,
}

/// Tuning for rename detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RenameRules {
    /// Old name to new name pairs taken from project history.
    pub known: BTreeMap<String, String>,

    /// Candidates scoring below this are discarded.
    pub min_score: f64,
}

impl Default for RenameRules {
    fn default() -> Self {
        Self {
            known: KNOWN_RENAMES.iter().map(|(old, new)| ((*old).to_string(), (*new).to_string())).collect(),
            min_score: 0.7,
        }
    }
}

/// Pair removed modules with added ones that look like the same module under a new name.
///
/// This is advisory: the comparison's buckets are left as they are. Modules are only paired
/// within one category, and each module takes part in at most one candidate.
#[must_use]
pub fn detect_renames(comparison: &VersionComparison, rules: &RenameRules) -> Vec<RenameCandidate> {
    let mut candidates = Vec::new();

    for (category, diff) in &comparison.categories {
        let mut taken = vec![false; diff.added.len()];
        let mut pending = Vec::new();

        for old in &diff.removed {
            let known = rules
                .known
                .get(&old.name)
                .and_then(|target| diff.added.iter().position(|m| &m.name == target))
                .filter(|&i| !taken[i]);

            match known {
                Some(i) => {
                    taken[i] = true;
                    candidates.push(RenameCandidate {
                        category: category.clone(),
                        old: old.clone(),
                        new: diff.added[i].clone(),
                        score: 1.0,
                        method: RenameMethod::KnownRename,
                    });
                }
                None => pending.push(old),
            }
        }

        for old in pending {
            let mut best: Option<(usize, f64, RenameMethod)> = None;

            for (i, new) in diff.added.iter().enumerate() {
                if taken[i] {
                    continue;
                }

                let (score, method) = score(&old.name, &new.name);
                if score >= rules.min_score && best.is_none_or(|(_, s, _)| score > s) {
                    best = Some((i, score, method));
                }
            }

            if let Some((i, score, method)) = best {
                taken[i] = true;
                candidates.push(RenameCandidate {
                    category: category.clone(),
                    old: old.clone(),
                    new: diff.added[i].clone(),
                    score,
                    method,
                });
            }
        }
    }

    candidates
}

fn score(old: &str, new: &str) -> (f64, RenameMethod) {
    if camel_to_snake(old) == new || snake_to_camel(new) == old {
        return (0.95, RenameMethod::CaseChange);
    }

    let (a, b) = (normalize(old), normalize(new));
    if a.contains(&b) || b.contains(&a) {
        return (0.85, RenameMethod::Substring);
    }

    let (a, b) = (old.to_lowercase(), new.to_lowercase());
    if is_abbreviation(&a, &b) || is_abbreviation(&b, &a) {
        return (0.9, RenameMethod::Abbreviation);
    }

    (strsim::jaro_winkler(&a, &b), RenameMethod::Similarity)
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }

    out
}

fn snake_to_camel(name: &str) -> String {
    let mut parts = name.split('_');
    let mut out = parts.next().unwrap_or_default().to_string();

    for part in parts {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }

    out
}

/// Whether every character of `short` appears in `long`, in order, starting from the same letter.
fn is_abbreviation(short: &str, long: &str) -> bool {
    if short.len() >= long.len() || short.chars().next() != long.chars().next() {
        return false;
    }

    let mut rest = long.chars();
    short.chars().all(|c| rest.any(|l| l == c))
}
