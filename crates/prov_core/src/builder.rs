//! Assemble archives with the on-disk layout the parser reads, including a
//! correct `checksums.md5` for v5+ formats. Used to produce fixtures and to
//! re-package provenance for inspection.

use std::fs;
use std::path::Path;

use crate::archive::{ArchiveSource, DirArchive, MemoryArchive};
use crate::checksum::{md5_hex, MANIFEST_NAME};
use crate::error::ArchiveError;

/// Provenance files for one result.
#[derive(Debug, Clone, Default)]
pub struct NodeRecord {
    pub id: String,
    pub semantic_type: String,
    pub data_format: Option<String>,
    /// Written to the node's own `VERSION`; defaults to the archive's.
    pub archive_version: Option<u32>,
    pub action_yaml: Option<String>,
    pub citations_bib: Option<String>,
    /// Extra files next to `action.yaml` (recorded metadata).
    pub action_files: Vec<(String, String)>,
}

impl NodeRecord {
    pub fn new(id: impl Into<String>, semantic_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            semantic_type: semantic_type.into(),
            ..Self::default()
        }
    }

    pub fn format(mut self, data_format: impl Into<String>) -> Self {
        self.data_format = Some(data_format.into());
        self
    }

    pub fn version(mut self, archive_version: u32) -> Self {
        self.archive_version = Some(archive_version);
        self
    }

    pub fn action(mut self, yaml: impl Into<String>) -> Self {
        self.action_yaml = Some(yaml.into());
        self
    }

    pub fn citations(mut self, bib: impl Into<String>) -> Self {
        self.citations_bib = Some(bib.into());
        self
    }

    pub fn action_file(mut self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.action_files.push((name.into(), contents.into()));
        self
    }

    fn metadata_yaml(&self) -> String {
        format!(
            "uuid: {}\ntype: {}\nformat: {}\n",
            self.id,
            self.semantic_type,
            self.data_format.as_deref().unwrap_or("null")
        )
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    label: String,
    archive_version: u32,
    framework: String,
    root: NodeRecord,
    ancestors: Vec<NodeRecord>,
    data: Vec<(String, Vec<u8>)>,
    write_manifest: bool,
}

impl ArchiveBuilder {
    pub fn new(root: NodeRecord, archive_version: u32, framework: impl Into<String>) -> Self {
        Self {
            label: format!("{}.qza", root.id),
            archive_version,
            framework: framework.into(),
            root,
            ancestors: Vec::new(),
            data: Vec::new(),
            write_manifest: true,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn ancestor(mut self, node: NodeRecord) -> Self {
        self.ancestors.push(node);
        self
    }

    /// A payload file under `data/`.
    pub fn data_file(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.data.push((name.into(), bytes.into()));
        self
    }

    pub fn without_manifest(mut self) -> Self {
        self.write_manifest = false;
        self
    }

    fn version_file(&self, archive_version: u32) -> String {
        format!(
            "QIIME 2\narchive: {}\nframework: {}\n",
            archive_version, self.framework
        )
    }

    fn write_node(&self, archive: &mut MemoryArchive, prefix: &str, node: &NodeRecord) {
        let version = node.archive_version.unwrap_or(self.archive_version);
        archive.insert(format!("{}/VERSION", prefix), self.version_file(version));
        archive.insert(format!("{}/metadata.yaml", prefix), node.metadata_yaml());
        if let Some(action) = &node.action_yaml {
            archive.insert(format!("{}/action/action.yaml", prefix), action.clone());
        }
        for (name, contents) in &node.action_files {
            archive.insert(format!("{}/action/{}", prefix, name), contents.clone());
        }
        if let Some(bib) = &node.citations_bib {
            archive.insert(format!("{}/citations.bib", prefix), bib.clone());
        }
    }

    pub fn build(&self) -> MemoryArchive {
        let root = self.root.id.as_str();
        let mut archive = MemoryArchive::new(self.label.clone());
        archive.insert(
            format!("{}/VERSION", root),
            self.version_file(self.archive_version),
        );
        archive.insert(format!("{}/metadata.yaml", root), self.root.metadata_yaml());
        for (name, bytes) in &self.data {
            archive.insert(format!("{}/data/{}", root, name), bytes.clone());
        }

        if self.archive_version > 0 {
            let prov = format!("{}/provenance", root);
            self.write_node(&mut archive, &prov, &self.root);
            for node in &self.ancestors {
                let prefix = format!("{}/artifacts/{}", prov, node.id);
                self.write_node(&mut archive, &prefix, node);
            }
        }

        if self.archive_version >= 5 && self.write_manifest {
            let prefix = format!("{}/", root);
            let mut manifest = String::new();
            for name in archive.names() {
                if let Some(rel) = name.strip_prefix(&prefix) {
                    if let Some(bytes) = archive.get(&name) {
                        manifest.push_str(&format!("{}  {}\n", md5_hex(bytes), rel));
                    }
                }
            }
            archive.insert(format!("{}/{}", root, MANIFEST_NAME), manifest);
        }
        archive
    }

    /// Extract the archive under `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<DirArchive, ArchiveError> {
        let archive = self.build();
        for name in archive.names() {
            let path = name.split('/').fold(dir.to_path_buf(), |acc, s| acc.join(s));
            let io_err = |err: std::io::Error| ArchiveError::Io {
                path: path.display().to_string(),
                detail: err.to_string(),
            };
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
            let bytes = archive.read_entry(&name)?.unwrap_or_default();
            fs::write(&path, bytes).map_err(io_err)?;
        }
        Ok(DirArchive::new(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{validate, ChecksumOutcome};

    #[test]
    fn builds_layout_with_valid_manifest() {
        let archive = ArchiveBuilder::new(
            NodeRecord::new("root-id", "FeatureTable[Frequency]")
                .format("BIOMV210DirFmt")
                .action("action: {}\n"),
            5,
            "2020.8.0",
        )
        .ancestor(NodeRecord::new("anc", "SampleData[Sequences]").action("action: {}\n"))
        .data_file("feature-table.biom", "payload")
        .build();

        let entries = archive.list_entries().unwrap();
        assert!(entries.contains(&"root-id/provenance/action/action.yaml".to_string()));
        assert!(entries.contains(&"root-id/provenance/artifacts/anc/metadata.yaml".to_string()));
        assert!(entries.contains(&"root-id/checksums.md5".to_string()));
        assert_eq!(validate(&archive).unwrap(), ChecksumOutcome::Valid);
    }

    #[test]
    fn v0_has_no_provenance_dir() {
        let archive = ArchiveBuilder::new(NodeRecord::new("r", "T"), 0, "2.0.5").build();
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn writes_to_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = ArchiveBuilder::new(NodeRecord::new("r", "T"), 4, "2019.10.0")
            .write_to(tmp.path())
            .unwrap();
        let entries = dir.list_entries().unwrap();
        assert!(entries.contains(&"r/provenance/metadata.yaml".to_string()));
    }
}
