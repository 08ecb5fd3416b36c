//! `checksums.md5` validation.
//!
//! Digests are recomputed for every archive member except the manifest
//! itself and compared with the manifest. The outcome never blocks parsing;
//! it is mapped onto per-node [`ChecksumStatus`] values.

use std::collections::BTreeMap;
use std::fmt;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::archive::{root_dir, ArchiveSource};
use crate::error::{ArchiveError, ParseError};
use crate::node::ProvId;
use crate::schema::{SchemaRegistry, SchemaRule};
use crate::version::parse_version;

pub const MANIFEST_NAME: &str = "checksums.md5";

/// Checksum state attached to each node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumStatus {
    Valid,
    Unvalidatable,
    Mismatch,
}

impl ChecksumStatus {
    /// The less trustworthy of two observations.
    pub fn worst(self, other: ChecksumStatus) -> ChecksumStatus {
        self.max(other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnvalidatableReason {
    /// Archive format older than v5.
    PredatesChecksums,
    /// v5+ archive without `checksums.md5`.
    ManifestMissing,
    /// Validation disabled in [`crate::ParseConfig`].
    OptedOut,
}

impl fmt::Display for UnvalidatableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnvalidatableReason::PredatesChecksums => write!(f, "archive format predates checksums"),
            UnvalidatableReason::ManifestMissing => write!(f, "{} is missing", MANIFEST_NAME),
            UnvalidatableReason::OptedOut => write!(f, "checksum validation disabled"),
        }
    }
}

/// Paths are relative to the archive root directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumDiff {
    /// Present in the archive but not in the manifest: path -> observed.
    pub added: BTreeMap<String, String>,
    /// In the manifest but absent from the archive: path -> expected.
    pub removed: BTreeMap<String, String>,
    /// path -> (expected, observed).
    pub changed: BTreeMap<String, (String, String)>,
}

impl ChecksumDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.added
            .keys()
            .chain(self.removed.keys())
            .chain(self.changed.keys())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChecksumOutcome {
    Valid,
    Mismatch { diff: ChecksumDiff },
    Unvalidatable { reason: UnvalidatableReason },
}

impl ChecksumOutcome {
    /// Status of one node. Mismatched paths under
    /// `provenance/artifacts/<uuid>/` belong to that node; every other path
    /// belongs to the archive root.
    pub fn status_for_node(&self, node: &ProvId, is_root: bool) -> ChecksumStatus {
        match self {
            ChecksumOutcome::Valid => ChecksumStatus::Valid,
            ChecksumOutcome::Unvalidatable { .. } => ChecksumStatus::Unvalidatable,
            ChecksumOutcome::Mismatch { diff } => {
                let touched = diff.paths().any(|path| match owning_node(path) {
                    Some(owner) => owner == node.as_str(),
                    None => is_root,
                });
                if touched {
                    ChecksumStatus::Mismatch
                } else {
                    ChecksumStatus::Valid
                }
            }
        }
    }
}

fn owning_node(path: &str) -> Option<&str> {
    let mut parts = path.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("provenance"), Some("artifacts"), Some(uuid)) if !uuid.is_empty() => Some(uuid),
        _ => None,
    }
}

pub fn md5_hex(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Parse one manifest line into `(path, digest)`. A leading `\` on the
/// digest marks an escaped path.
pub fn parse_manifest_line(line: &str) -> Option<(String, String)> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() {
        return None;
    }
    let (digest, path) = line.split_once("  ").or_else(|| line.split_once(" *"))?;

    match digest.strip_prefix('\\') {
        Some(digest) => Some((unescape_path(path), digest.to_string())),
        None => Some((path.to_string(), digest.to_string())),
    }
}

fn unescape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Compare observed digests with the manifest. `None` when the manifest
/// is absent.
pub fn diff_checksums(
    archive: &dyn ArchiveSource,
    root: &str,
    entries: &[String],
) -> Result<Option<ChecksumDiff>, ArchiveError> {
    let manifest_name = format!("{}/{}", root, MANIFEST_NAME);
    let Some(manifest) = archive.read_entry(&manifest_name)? else {
        return Ok(None);
    };

    let prefix = format!("{}/", root);
    let mut observed = BTreeMap::new();
    for name in entries {
        if name == &manifest_name {
            continue;
        }
        let Some(rel) = name.strip_prefix(&prefix) else {
            continue;
        };
        if let Some(bytes) = archive.read_entry(name)? {
            observed.insert(rel.to_string(), md5_hex(&bytes));
        }
    }

    let mut expected = BTreeMap::new();
    for line in String::from_utf8_lossy(&manifest).lines() {
        match parse_manifest_line(line) {
            Some((path, digest)) => {
                expected.insert(path, digest);
            }
            None if line.trim().is_empty() => {}
            None => tracing::warn!(archive = %archive.label(), line = %line, "unreadable checksum manifest line"),
        }
    }

    let mut diff = ChecksumDiff::default();
    for (path, obs) in &observed {
        match expected.get(path) {
            None => {
                diff.added.insert(path.clone(), obs.clone());
            }
            Some(exp) if exp != obs => {
                diff.changed.insert(path.clone(), (exp.clone(), obs.clone()));
            }
            Some(_) => {}
        }
    }
    for (path, exp) in expected {
        if !observed.contains_key(&path) {
            diff.removed.insert(path, exp);
        }
    }
    Ok(Some(diff))
}

/// Validate an archive whose entries are already listed, under `rule`.
pub fn validate_entries(
    archive: &dyn ArchiveSource,
    root: &str,
    entries: &[String],
    rule: &SchemaRule,
) -> Result<ChecksumOutcome, ArchiveError> {
    if !rule.checksums {
        return Ok(ChecksumOutcome::Unvalidatable {
            reason: UnvalidatableReason::PredatesChecksums,
        });
    }
    Ok(match diff_checksums(archive, root, entries)? {
        None => ChecksumOutcome::Unvalidatable {
            reason: UnvalidatableReason::ManifestMissing,
        },
        Some(diff) if diff.is_empty() => ChecksumOutcome::Valid,
        Some(diff) => ChecksumOutcome::Mismatch { diff },
    })
}

/// Validate an archive end to end: locate its root, read `VERSION`, and
/// check the manifest if the format has one.
pub fn validate(archive: &dyn ArchiveSource) -> Result<ChecksumOutcome, ParseError> {
    let entries = archive.list_entries()?;
    let root = root_dir(&entries).ok_or_else(|| ParseError::EmptyArchive {
        label: archive.label(),
    })?;
    let version_bytes = archive
        .read_entry(&format!("{}/VERSION", root))?
        .ok_or_else(|| ParseError::MissingRootMetadata {
            root: root.clone(),
            detail: "VERSION file misplaced or nonexistent".to_string(),
        })?;
    let version = parse_version(&root, &version_bytes)?;
    let rule = SchemaRegistry::lookup(version.archive).ok_or_else(|| {
        ParseError::UnsupportedFormatVersion {
            root: root.clone(),
            version: version.archive,
        }
    })?;
    Ok(validate_entries(archive, &root, &entries, rule)?)
}
