//! Archive metadata parser.
//!
//! One archive yields one [`ParsedArchive`]: the root node, every ancestor
//! recorded under `provenance/artifacts/`, stub nodes for `!no-provenance`
//! inputs, the checksum outcome and the advisories collected on the way.
//!
//! Only the archive's own self-description is fatal. A broken ancestor is
//! skipped with [`Advisory::MalformedNodeMetadata`] so the rest of the
//! history is still recovered.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_yaml::Value;

use crate::archive::{root_dir, ArchiveSource};
use crate::bibtex::parse_bibtex;
use crate::checksum::{validate_entries, ChecksumOutcome, UnvalidatableReason};
use crate::config::ParseConfig;
use crate::error::{Advisory, ParseError};
use crate::node::{NodeType, ParamValue, ProvId, ProvNode};
use crate::schema::{DecodeInput, SchemaRegistry, SchemaRule};
use crate::version::{parse_version, FormatVersion};
use crate::yaml_tags::get_str;

/// Everything recovered from one archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedArchive {
    pub label: String,
    pub root_id: ProvId,
    pub format: FormatVersion,
    pub checksum: ChecksumOutcome,
    /// Root first, then ancestors in archive order, then stubs.
    pub nodes: Vec<ProvNode>,
    pub advisories: Vec<Advisory>,
}

impl ParsedArchive {
    pub fn root(&self) -> Option<&ProvNode> {
        self.nodes.iter().find(|n| n.id == self.root_id)
    }

    pub fn into_nodes(self) -> Vec<ProvNode> {
        self.nodes
    }
}

/// Parse with default configuration.
pub fn parse(archive: &dyn ArchiveSource) -> Result<ParsedArchive, ParseError> {
    ArchiveParser::default().parse(archive)
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveParser {
    config: ParseConfig,
}

struct ArchiveContext<'a> {
    archive: &'a dyn ArchiveSource,
    label: String,
    root: String,
    format: FormatVersion,
    checksum: &'a ChecksumOutcome,
}

/// A provenance directory inside the archive.
struct NodeDir {
    /// Entry prefix without trailing slash.
    prefix: String,
    /// Directory name for ancestors, `None` for the root.
    dir_id: Option<String>,
}

struct ResultMetadata {
    uuid: Option<String>,
    semantic_type: Option<String>,
    data_format: Option<String>,
}

impl ArchiveParser {
    pub fn new(config: ParseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    pub fn parse(&self, archive: &dyn ArchiveSource) -> Result<ParsedArchive, ParseError> {
        let label = archive.label();
        let entries = archive.list_entries()?;
        let root = root_dir(&entries).ok_or_else(|| ParseError::EmptyArchive {
            label: label.clone(),
        })?;

        let version_bytes = archive
            .read_entry(&format!("{}/VERSION", root))?
            .ok_or_else(|| ParseError::MissingRootMetadata {
                root: root.clone(),
                detail: "VERSION file misplaced or nonexistent".to_string(),
            })?;
        let format = parse_version(&root, &version_bytes)?;
        let rule = SchemaRegistry::lookup(format.archive).ok_or_else(|| {
            ParseError::UnsupportedFormatVersion {
                root: root.clone(),
                version: format.archive,
            }
        })?;

        let root_md_name = format!("{}/metadata.yaml", root);
        let root_md = read_yaml(archive, &root_md_name)
            .map_err(|detail| ParseError::MissingRootMetadata {
                root: root.clone(),
                detail,
            })?
            .ok_or_else(|| ParseError::MissingRootMetadata {
                root: root.clone(),
                detail: "no top-level metadata.yaml file".to_string(),
            })?;
        let root_md = result_metadata(&root_md);

        let mut advisories = Vec::new();
        let checksum = if !self.config.validate_checksums {
            ChecksumOutcome::Unvalidatable {
                reason: UnvalidatableReason::OptedOut,
            }
        } else {
            validate_entries(archive, &root, &entries, rule)?
        };
        match &checksum {
            ChecksumOutcome::Mismatch { diff } => advise(
                &mut advisories,
                Advisory::ChecksumMismatch {
                    archive: label.clone(),
                    diff: diff.clone(),
                },
            ),
            ChecksumOutcome::Unvalidatable {
                reason: UnvalidatableReason::ManifestMissing,
            } => advise(
                &mut advisories,
                Advisory::ChecksumUnvalidatable {
                    archive: label.clone(),
                    reason: UnvalidatableReason::ManifestMissing,
                },
            ),
            _ => {}
        }

        let ctx = ArchiveContext {
            archive,
            label: label.clone(),
            root: root.clone(),
            format: format.clone(),
            checksum: &checksum,
        };

        if !rule.tracks_provenance {
            let id = ProvId::new(root_md.uuid.clone().unwrap_or_else(|| root.clone()));
            let mut node = ProvNode::no_provenance(id.clone(), checksum.status_for_node(&id, true));
            node.format_version = Some(format.clone());
            node.semantic_type = root_md.semantic_type;
            node.data_format = root_md.data_format;
            advise(
                &mut advisories,
                Advisory::NoProvenance {
                    archive: label.clone(),
                    node: id.clone(),
                },
            );
            tracing::debug!(archive = %label, root = %id, "parsed archive without provenance");
            return Ok(ParsedArchive {
                label,
                root_id: id,
                format,
                checksum,
                nodes: vec![node],
                advisories,
            });
        }

        let root_id = root_md.uuid.clone().map(ProvId::new).ok_or_else(|| {
            ParseError::MissingRootMetadata {
                root: root.clone(),
                detail: "top-level metadata.yaml has no uuid".to_string(),
            }
        })?;

        let mut nodes: Vec<ProvNode> = Vec::new();
        let mut seen: BTreeSet<ProvId> = BTreeSet::new();

        for dir in node_dirs(&root, &entries) {
            let is_root = dir.dir_id.is_none();
            match self.parse_node(&ctx, &dir, &mut advisories) {
                Ok(node) => {
                    if !seen.insert(node.id.clone()) {
                        advise(
                            &mut advisories,
                            Advisory::MalformedNodeMetadata {
                                archive: label.clone(),
                                node: node.id.to_string(),
                                detail: "provenance recorded twice for this id".to_string(),
                            },
                        );
                        continue;
                    }
                    nodes.push(node);
                }
                Err(detail) if is_root => {
                    return Err(ParseError::MissingRootMetadata {
                        root: root.clone(),
                        detail,
                    });
                }
                Err(detail) => advise(
                    &mut advisories,
                    Advisory::MalformedNodeMetadata {
                        archive: label.clone(),
                        node: dir.dir_id.unwrap_or_default(),
                        detail,
                    },
                ),
            }
        }

        if !seen.contains(&root_id) {
            return Err(ParseError::MissingRootMetadata {
                root,
                detail: "no provenance recorded for the archive root".to_string(),
            });
        }

        // Root first so callers can rely on nodes[0].
        if let Some(pos) = nodes.iter().position(|n| n.id == root_id) {
            let root_node = nodes.remove(pos);
            nodes.insert(0, root_node);
        }

        let stubs = no_provenance_stubs(&nodes, &seen, &checksum);
        for stub in stubs {
            advise(
                &mut advisories,
                Advisory::NoProvenance {
                    archive: label.clone(),
                    node: stub.id.clone(),
                },
            );
            nodes.push(stub);
        }

        tracing::debug!(
            archive = %label,
            root = %root_id,
            format = %format,
            nodes = nodes.len(),
            advisories = advisories.len(),
            "parsed archive"
        );

        Ok(ParsedArchive {
            label,
            root_id,
            format,
            checksum,
            nodes,
            advisories,
        })
    }

    fn parse_node(
        &self,
        ctx: &ArchiveContext<'_>,
        dir: &NodeDir,
        advisories: &mut Vec<Advisory>,
    ) -> Result<ProvNode, String> {
        let format = match ctx.archive.read_entry(&format!("{}/VERSION", dir.prefix)) {
            Ok(Some(bytes)) => parse_version(&ctx.root, &bytes).map_err(|e| e.to_string())?,
            Ok(None) => ctx.format.clone(),
            Err(err) => return Err(err.to_string()),
        };
        let rule: &SchemaRule = SchemaRegistry::lookup(format.archive)
            .ok_or_else(|| format!("unsupported format version {}", format.archive))?;

        let md = read_yaml(ctx.archive, &format!("{}/metadata.yaml", dir.prefix))?
            .ok_or_else(|| "metadata.yaml is missing".to_string())?;
        let md = result_metadata(&md);

        let id = match (&md.uuid, &dir.dir_id) {
            (Some(uuid), _) => ProvId::new(uuid.clone()),
            (None, _) if rule.uuid_required => {
                return Err("metadata.yaml has no uuid".to_string());
            }
            (None, Some(dir_id)) => ProvId::new(dir_id.clone()),
            (None, None) => ProvId::new(ctx.root.clone()),
        };
        let is_root = dir.dir_id.is_none();
        let checksum_status = ctx.checksum.status_for_node(&id, is_root);

        if !rule.tracks_provenance {
            let mut node = ProvNode::no_provenance(id.clone(), checksum_status);
            node.format_version = Some(format);
            node.semantic_type = md.semantic_type;
            node.data_format = md.data_format;
            advise(
                advisories,
                Advisory::NoProvenance {
                    archive: ctx.label.clone(),
                    node: id,
                },
            );
            return Ok(node);
        }

        let action_yaml = read_yaml(ctx.archive, &format!("{}/action/action.yaml", dir.prefix))?;
        let mut action = rule.decode_action(&DecodeInput {
            action_yaml: action_yaml.as_ref(),
            semantic_type: md.semantic_type.as_deref(),
        })?;

        if self.config.parse_metadata {
            if let Some(action) = action.as_mut() {
                for param in action.parameters.iter_mut() {
                    let ParamValue::Metadata(md_ref) = &mut param.value else {
                        continue;
                    };
                    let name = format!("{}/action/{}", dir.prefix, md_ref.relative_path);
                    match ctx.archive.read_entry(&name) {
                        Ok(Some(bytes)) => {
                            md_ref.contents = Some(String::from_utf8_lossy(&bytes).into_owned());
                        }
                        Ok(None) => advise(
                            advisories,
                            Advisory::RecordedMetadataMissing {
                                archive: ctx.label.clone(),
                                node: id.clone(),
                                path: name,
                            },
                        ),
                        Err(err) => return Err(err.to_string()),
                    }
                }
            }
        }

        let mut citations = BTreeMap::new();
        if rule.citations_sidecar {
            let bib_name = format!("{}/citations.bib", dir.prefix);
            if let Some(bytes) = ctx.archive.read_entry(&bib_name).map_err(|e| e.to_string())? {
                let (entries, errors) = parse_bibtex(&String::from_utf8_lossy(&bytes));
                for err in errors {
                    tracing::warn!(archive = %ctx.label, node = %id, error = %err, "skipped unreadable citation");
                }
                for entry in entries {
                    citations.insert(entry.key.clone(), entry);
                }
            }
        }

        Ok(ProvNode {
            id,
            node_type: if is_root {
                NodeType::Root
            } else {
                NodeType::Standard
            },
            format_version: Some(format),
            semantic_type: md.semantic_type,
            data_format: md.data_format,
            action,
            citations,
            checksum_status,
        })
    }
}

fn advise(advisories: &mut Vec<Advisory>, advisory: Advisory) {
    tracing::warn!("{}", advisory);
    advisories.push(advisory);
}

fn read_yaml(archive: &dyn ArchiveSource, name: &str) -> Result<Option<Value>, String> {
    let Some(bytes) = archive.read_entry(name).map_err(|e| e.to_string())? else {
        return Ok(None);
    };
    serde_yaml::from_slice(&bytes)
        .map(Some)
        .map_err(|e| format!("{}: {}", name, e))
}

fn result_metadata(doc: &Value) -> ResultMetadata {
    ResultMetadata {
        uuid: get_str(doc, "uuid").filter(|s| !s.is_empty()),
        semantic_type: get_str(doc, "type"),
        data_format: get_str(doc, "format"),
    }
}

/// Provenance directories in entry order: the root's own, then one per
/// recorded ancestor.
fn node_dirs(root: &str, entries: &[String]) -> Vec<NodeDir> {
    let prov_prefix = format!("{}/provenance/", root);
    let artifacts_prefix = format!("{}artifacts/", prov_prefix);
    let mut dirs = Vec::new();
    let mut ancestors = BTreeSet::new();
    let mut has_root = false;

    for name in entries {
        let Some(rest) = name.strip_prefix(&prov_prefix) else {
            continue;
        };
        match rest.strip_prefix("artifacts/") {
            Some(tail) => {
                if let Some((uuid, _)) = tail.split_once('/') {
                    if !uuid.is_empty() && ancestors.insert(uuid.to_string()) {
                        dirs.push(NodeDir {
                            prefix: format!("{}{}", artifacts_prefix, uuid),
                            dir_id: Some(uuid.to_string()),
                        });
                    }
                }
            }
            None => has_root = true,
        }
    }

    if has_root {
        dirs.insert(
            0,
            NodeDir {
                prefix: format!("{}/provenance", root),
                dir_id: None,
            },
        );
    }
    dirs
}

/// Stub nodes for `!no-provenance` inputs that the archive has no record of.
fn no_provenance_stubs(
    nodes: &[ProvNode],
    known: &BTreeSet<ProvId>,
    checksum: &ChecksumOutcome,
) -> Vec<ProvNode> {
    let mut created = BTreeSet::new();
    let mut stubs = Vec::new();
    for node in nodes {
        for dep in node.dependencies() {
            if dep.no_provenance && !known.contains(&dep.id) && created.insert(dep.id.clone()) {
                let status = checksum.status_for_node(&dep.id, false);
                stubs.push(ProvNode::no_provenance(dep.id, status));
            }
        }
    }
    stubs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_dirs_put_root_first() {
        let entries: Vec<String> = [
            "r/VERSION",
            "r/metadata.yaml",
            "r/provenance/VERSION",
            "r/provenance/action/action.yaml",
            "r/provenance/artifacts/a/VERSION",
            "r/provenance/artifacts/a/action/action.yaml",
            "r/provenance/artifacts/b/metadata.yaml",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let dirs = node_dirs("r", &entries);
        let prefixes: Vec<_> = dirs.iter().map(|d| d.prefix.as_str()).collect();
        assert_eq!(
            prefixes,
            vec![
                "r/provenance",
                "r/provenance/artifacts/a",
                "r/provenance/artifacts/b"
            ]
        );
        assert!(dirs[0].dir_id.is_none());
        assert_eq!(dirs[1].dir_id.as_deref(), Some("a"));
    }
}
