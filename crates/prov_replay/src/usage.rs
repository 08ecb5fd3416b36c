//! Renderer-neutral replay operations and the driver seam.

use prov_core::ProvId;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    Import,
    Action,
    Comment,
}

/// An input slot bound to one or more script variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageInput {
    pub name: String,
    pub variables: Vec<String>,
    /// Recorded as a collection; rendered as a list even with one member.
    pub collection: bool,
}

/// Artifact passed as metadata, with the variable holding its metadata view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactView {
    pub artifact: String,
    pub view: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageValue {
    Literal(Value),
    /// Metadata the user supplies as a file. `source` is the recorded
    /// snapshot location when replay was asked to reuse it.
    MetadataFile {
        variable: String,
        source: Option<String>,
        column: Option<String>,
    },
    /// Artifacts viewed as metadata; `merged` names their merge when more
    /// than one is passed.
    ArtifactMetadata {
        views: Vec<ArtifactView>,
        merged: Option<String>,
        column: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageParameter {
    pub name: String,
    pub value: UsageValue,
}

/// Recorded snapshot handed to the metadata sink for one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFileRef {
    pub parameter: String,
    pub location: String,
}

/// Output slot. `variable` is `None` when the signature declares an output
/// the graph never recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageOutput {
    pub name: String,
    pub variable: Option<String>,
    pub visualization: bool,
}

/// One rendered step of a replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageAction {
    pub kind: UsageKind,
    pub node_id: Option<ProvId>,
    pub plugin: String,
    pub action: String,
    /// Semantic type and recorded view format of an import.
    pub semantic_type: Option<String>,
    pub import_format: Option<String>,
    pub inputs: Vec<UsageInput>,
    pub resolved_parameters: Vec<UsageParameter>,
    /// Parameters the current signature does not know; drivers render
    /// them as visible placeholders.
    pub unresolved_parameters: Vec<UsageParameter>,
    pub metadata_file_refs: Vec<MetadataFileRef>,
    pub outputs: Vec<UsageOutput>,
    /// Comment text, for [`UsageKind::Comment`].
    pub text: String,
}

impl UsageAction {
    fn empty(kind: UsageKind) -> Self {
        Self {
            kind,
            node_id: None,
            plugin: String::new(),
            action: String::new(),
            semantic_type: None,
            import_format: None,
            inputs: Vec::new(),
            resolved_parameters: Vec::new(),
            unresolved_parameters: Vec::new(),
            metadata_file_refs: Vec::new(),
            outputs: Vec::new(),
            text: String::new(),
        }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::empty(UsageKind::Comment)
        }
    }

    pub fn import(
        node_id: ProvId,
        semantic_type: impl Into<String>,
        import_format: Option<String>,
        variable: impl Into<String>,
    ) -> Self {
        Self {
            node_id: Some(node_id),
            plugin: "tools".to_string(),
            action: "import".to_string(),
            semantic_type: Some(semantic_type.into()),
            import_format,
            outputs: vec![UsageOutput {
                name: "output".to_string(),
                variable: Some(variable.into()),
                visualization: false,
            }],
            ..Self::empty(UsageKind::Import)
        }
    }

    pub fn action(node_id: ProvId, plugin: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id),
            plugin: plugin.into(),
            action: action.into(),
            ..Self::empty(UsageKind::Action)
        }
    }

    pub fn unresolved_parameter_names(&self) -> Vec<&str> {
        self.unresolved_parameters
            .iter()
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Variable bound to the first recorded output.
    pub fn primary_variable(&self) -> Option<&str> {
        self.outputs.iter().find_map(|o| o.variable.as_deref())
    }
}

/// A target surface. The replay engine only ever talks to this trait.
pub trait UsageDriver {
    fn render_import(&mut self, usage: &UsageAction);
    fn render_action(&mut self, usage: &UsageAction);
    fn render_comment(&mut self, text: &str);
    /// Complete script, including anything that belongs above the body.
    fn finalize(&mut self) -> String;
}

/// Route one operation to the matching driver call.
pub fn dispatch(driver: &mut dyn UsageDriver, usage: &UsageAction) {
    match usage.kind {
        UsageKind::Import => driver.render_import(usage),
        UsageKind::Action => driver.render_action(usage),
        UsageKind::Comment => driver.render_comment(&usage.text),
    }
}

/// Multi-line text as `#` comment lines.
pub(crate) fn comment_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                "#".to_string()
            } else {
                format!("# {}", line)
            }
        })
        .collect()
}
