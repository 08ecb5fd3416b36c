use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use prov_core::ProvId;
use regex::Regex;

struct CaseRules {
    brackets: Regex,
    word: Regex,
    hump: Regex,
    other: Regex,
}

fn case_rules() -> Option<&'static CaseRules> {
    static RULES: OnceLock<Option<CaseRules>> = OnceLock::new();
    RULES
        .get_or_init(|| {
            Some(CaseRules {
                brackets: Regex::new(r"[\[\]]").ok()?,
                word: Regex::new(r"(.)([A-Z][a-z]+)").ok()?,
                hump: Regex::new(r"([a-z0-9])([A-Z])").ok()?,
                other: Regex::new(r"[^a-z0-9]+").ok()?,
            })
        })
        .as_ref()
}

/// Kebab-case a semantic type or recorded name, keeping acronyms together:
/// `EMPSingleEndSequences` becomes `emp-single-end-sequences`,
/// `FeatureTable[Frequency]` becomes `feature-table-frequency`.
pub fn kebab_case(name: &str) -> String {
    let Some(rules) = case_rules() else {
        return fallback_kebab(name);
    };
    let name = rules.brackets.replace_all(name, "");
    let name = rules.word.replace_all(&name, "${1}-${2}");
    let name = rules.hump.replace_all(&name, "${1}-${2}");
    let lowered = name.to_lowercase();
    let kebab = rules.other.replace_all(&lowered, "-");
    non_empty(kebab.trim_matches('-'))
}

fn fallback_kebab(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    non_empty(out.trim_matches('-'))
}

fn non_empty(s: &str) -> String {
    if s.is_empty() {
        "artifact".to_string()
    } else {
        s.to_string()
    }
}

/// Collision-free variable names for one script. The first claim of a base
/// name gets it unsuffixed; later claims get `-1`, `-2`, ...
#[derive(Debug, Clone, Default)]
pub struct VariableNamespace {
    counters: BTreeMap<String, usize>,
    taken: BTreeSet<String>,
    bound: BTreeMap<ProvId, String>,
}

impl VariableNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh name derived from `base`.
    pub fn claim(&mut self, base: &str) -> String {
        let base = kebab_case(base);
        let counter = self.counters.entry(base.clone()).or_insert(0);
        loop {
            let candidate = if *counter == 0 {
                base.clone()
            } else {
                format!("{}-{}", base, counter)
            };
            *counter += 1;
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Name for `id`, claimed on first use and stable afterwards.
    pub fn bind(&mut self, id: &ProvId, base: &str) -> String {
        if let Some(name) = self.bound.get(id) {
            return name.clone();
        }
        let name = self.claim(base);
        self.bound.insert(id.clone(), name.clone());
        name
    }

    pub fn get(&self, id: &ProvId) -> Option<&str> {
        self.bound.get(id).map(String::as_str)
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }
}
