use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::bibtex::BibEntry;
use crate::checksum::ChecksumStatus;
use crate::version::FormatVersion;

/// Archive-scoped artifact identity (a UUID in well-formed archives).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvId(String);

impl ProvId {
    pub fn new(s: impl Into<String>) -> Self {
        ProvId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for human-facing placeholders.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for ProvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProvId {
    fn from(s: &str) -> Self {
        ProvId(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Terminal result of an archive.
    Root,
    /// Intermediate artifact recorded in an archive's provenance.
    Standard,
    /// History stripped or predating provenance capture.
    NoProvenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Method,
    Visualizer,
    Pipeline,
    Import,
}

impl ActionType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "method" => Some(ActionType::Method),
            "visualizer" => Some(ActionType::Visualizer),
            "pipeline" => Some(ActionType::Pipeline),
            "import" => Some(ActionType::Import),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Method => "method",
            ActionType::Visualizer => "visualizer",
            ActionType::Pipeline => "pipeline",
            ActionType::Import => "import",
        }
    }
}

/// One artifact referenced by an input slot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub id: ProvId,
    /// Recorded with a `!no-provenance` tag.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_provenance: bool,
}

/// A named input slot. `artifacts` is empty for an optional input that was
/// not supplied; `collection` marks variadic (list/set) inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBinding {
    pub name: String,
    pub artifacts: Vec<ArtifactRef>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub collection: bool,
}

/// A metadata parameter (`!metadata` tag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRef {
    /// Artifacts viewed as metadata; more than one means they were merged.
    pub input_artifact_ids: Vec<ProvId>,
    /// File name next to `action.yaml`.
    pub relative_path: String,
    /// The recorded `.tsv`, when metadata parsing is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Literal(Value),
    Metadata(MetadataRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: ParamValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runtime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_version: Option<String>,
}

/// Normalized contents of one `action.yaml`, independent of the schema
/// version that wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Execution id; shared by every output of one action run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    pub action_type: ActionType,
    pub plugin_name: String,
    pub action_name: String,
    pub inputs: Vec<InputBinding>,
    pub parameters: Vec<Parameter>,
    pub outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<ProvId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_manifest: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformers: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_context: Option<Value>,
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default)]
    pub environment: Environment,
}

impl ActionRecord {
    pub fn is_import(&self) -> bool {
        self.action_type == ActionType::Import
    }
}

/// Why one node depends on another.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DependencyKind {
    Input { name: String },
    Metadata { parameter: String },
    /// Pipeline output aliasing an inner result.
    AliasOf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: ProvId,
    pub kind: DependencyKind,
    pub no_provenance: bool,
}

/// One artifact ever produced or consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvNode {
    pub id: ProvId,
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_version: Option<FormatVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionRecord>,
    #[serde(default)]
    pub citations: BTreeMap<String, BibEntry>,
    pub checksum_status: ChecksumStatus,
}

impl ProvNode {
    /// Stub for an artifact whose history is unavailable.
    pub fn no_provenance(id: ProvId, checksum_status: ChecksumStatus) -> Self {
        ProvNode {
            id,
            node_type: NodeType::NoProvenance,
            format_version: None,
            semantic_type: None,
            data_format: None,
            action: None,
            citations: BTreeMap::new(),
            checksum_status,
        }
    }

    pub fn has_provenance(&self) -> bool {
        self.node_type != NodeType::NoProvenance
    }

    pub fn is_visualization(&self) -> bool {
        self.semantic_type.as_deref() == Some("Visualization")
            || self
                .action
                .as_ref()
                .is_some_and(|a| a.action_type == ActionType::Visualizer)
    }

    /// Every node this one was produced from, in record order: inputs,
    /// then artifacts passed as metadata, then the pipeline alias target.
    pub fn dependencies(&self) -> Vec<Dependency> {
        let Some(action) = &self.action else {
            return Vec::new();
        };
        let mut deps = Vec::new();
        for input in &action.inputs {
            for artifact in &input.artifacts {
                deps.push(Dependency {
                    id: artifact.id.clone(),
                    kind: DependencyKind::Input {
                        name: input.name.clone(),
                    },
                    no_provenance: artifact.no_provenance,
                });
            }
        }
        for param in &action.parameters {
            if let ParamValue::Metadata(md) = &param.value {
                for id in &md.input_artifact_ids {
                    deps.push(Dependency {
                        id: id.clone(),
                        kind: DependencyKind::Metadata {
                            parameter: param.name.clone(),
                        },
                        no_provenance: false,
                    });
                }
            }
        }
        if let Some(alias) = &action.alias_of {
            deps.push(Dependency {
                id: alias.clone(),
                kind: DependencyKind::AliasOf,
                no_provenance: false,
            });
        }
        deps
    }

    /// Whether two records describe the same artifact history. Root/standard
    /// placement and checksum status are per-archive observations and are
    /// not part of the history.
    pub fn same_history(&self, other: &ProvNode) -> bool {
        self.history_value() == other.history_value()
    }

    /// sha256 over the canonical JSON of the node's history, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut out = String::new();
        write_canonical_json(&self.history_value(), &mut out);
        let mut hasher = Sha256::new();
        hasher.update(out.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn history_value(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "has_provenance": self.has_provenance(),
            "format_version": self.format_version,
            "semantic_type": self.semantic_type,
            "data_format": self.data_format,
            "action": self.action,
            "citations": self.citations.keys().collect::<Vec<_>>(),
        })
    }
}

fn write_canonical_json(value: &Value, out: &mut String) {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            out.push_str(&value.to_string());
        }
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical_json(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            for (idx, key) in keys.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                if let Some(val) = map.get(*key) {
                    write_canonical_json(val, out);
                }
            }
            out.push('}');
        }
    }
}
