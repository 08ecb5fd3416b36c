//! Action-signature lookup.
//!
//! Replay checks every recorded parameter against the signature the caller's
//! environment currently registers for that action. The lookup is passed in
//! explicitly; there is no process-wide registry.

use std::collections::{BTreeMap, BTreeSet};

use prov_dag::ProvDag;

/// What an environment currently accepts for one action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSignature {
    pub parameters: BTreeSet<String>,
    /// Parameters typed as a single metadata column.
    pub metadata_columns: BTreeSet<String>,
    /// Output names in declaration order.
    pub outputs: Vec<String>,
}

impl ActionSignature {
    pub fn new<I, S>(parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parameters: parameters.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_metadata_column(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.parameters.insert(name.clone());
        self.metadata_columns.insert(name);
        self
    }

    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn accepts(&self, parameter: &str) -> bool {
        self.parameters.contains(parameter)
    }

    pub fn is_metadata_column(&self, parameter: &str) -> bool {
        self.metadata_columns.contains(parameter)
    }
}

pub trait ActionSignatureLookup {
    /// `None` when the plugin or action is not registered.
    fn lookup(&self, plugin: &str, action: &str) -> Option<ActionSignature>;
}

impl<T: ActionSignatureLookup + ?Sized> ActionSignatureLookup for &T {
    fn lookup(&self, plugin: &str, action: &str) -> Option<ActionSignature> {
        (**self).lookup(plugin, action)
    }
}

/// Plugin and action ids are compared with `-` and `_` treated alike.
pub fn normalize_id(id: &str) -> String {
    id.trim().to_ascii_lowercase().replace('-', "_")
}

/// Fixed table of signatures keyed by (plugin, action).
#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    entries: BTreeMap<(String, String), ActionSignature>,
}

impl SignatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: &str, action: &str, signature: ActionSignature) {
        self.entries
            .insert((normalize_id(plugin), normalize_id(action)), signature);
    }

    pub fn with(mut self, plugin: &str, action: &str, signature: ActionSignature) -> Self {
        self.register(plugin, action, signature);
        self
    }

    /// Signatures as the graph itself recorded them: every recorded
    /// parameter and output is accepted. Useful when no live environment
    /// is at hand.
    pub fn from_recorded(dag: &ProvDag) -> Self {
        let mut table = Self::new();
        for node in dag.nodes() {
            let Some(action) = node.action.as_ref().filter(|a| !a.is_import()) else {
                continue;
            };
            let key = (
                normalize_id(&action.plugin_name),
                normalize_id(&action.action_name),
            );
            let entry = table.entries.entry(key).or_default();
            for param in &action.parameters {
                entry.parameters.insert(param.name.clone());
            }
            for output in &action.outputs {
                if !entry.outputs.contains(output) {
                    entry.outputs.push(output.clone());
                }
            }
        }
        table
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ActionSignatureLookup for SignatureTable {
    fn lookup(&self, plugin: &str, action: &str) -> Option<ActionSignature> {
        self.entries
            .get(&(normalize_id(plugin), normalize_id(action)))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_dash_underscore_spelling() {
        let table = SignatureTable::new().with(
            "feature-table",
            "summarize",
            ActionSignature::new(["sample_metadata"]).with_outputs(["visualization"]),
        );
        let sig = table.lookup("feature_table", "summarize").unwrap();
        assert!(sig.accepts("sample_metadata"));
        assert!(!sig.accepts("trunc_len"));
        assert!(table.lookup("feature_table", "rarefy").is_none());
    }

    #[test]
    fn metadata_columns_are_parameters() {
        let sig = ActionSignature::default().with_metadata_column("metadata");
        assert!(sig.accepts("metadata"));
        assert!(sig.is_metadata_column("metadata"));
    }
}
