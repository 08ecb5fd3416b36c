use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::checksum::{ChecksumDiff, UnvalidatableReason};
use crate::node::ProvId;

/// Failure of the underlying container while listing or reading members.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveError {
    #[error("io error at {path}: {detail}")]
    Io { path: String, detail: String },
}

/// Conditions that make a parse result meaningless. Everything else is an
/// [`Advisory`] returned alongside the parsed nodes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("archive {label} contains no entries")]
    EmptyArchive { label: String },

    #[error("malformed archive {root}: {detail}")]
    MissingRootMetadata { root: String, detail: String },

    #[error("malformed archive {root}: unrecognized VERSION file, found {found:?}")]
    MalformedVersion { root: String, found: String },

    #[error("archive {root} declares unsupported format version {version}")]
    UnsupportedFormatVersion { root: String, version: u32 },

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Non-fatal findings accumulated while parsing one archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    MalformedNodeMetadata {
        archive: String,
        node: String,
        detail: String,
    },
    NoProvenance {
        archive: String,
        node: ProvId,
    },
    ChecksumMismatch {
        archive: String,
        diff: ChecksumDiff,
    },
    ChecksumUnvalidatable {
        archive: String,
        reason: UnvalidatableReason,
    },
    RecordedMetadataMissing {
        archive: String,
        node: ProvId,
        path: String,
    },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::MalformedNodeMetadata {
                archive,
                node,
                detail,
            } => write!(
                f,
                "archive {}: provenance for node {} is malformed and was skipped: {}",
                archive, node, detail
            ),
            Advisory::NoProvenance { archive, node } => write!(
                f,
                "archive {}: artifact {} was created prior to provenance tracking; provenance data will be incomplete",
                archive, node
            ),
            Advisory::ChecksumMismatch { archive, diff } => write!(
                f,
                "archive {}: checksums are invalid, archive may be corrupt or provenance may be false (added: {:?}, removed: {:?}, changed: {:?})",
                archive,
                diff.added.keys().collect::<Vec<_>>(),
                diff.removed.keys().collect::<Vec<_>>(),
                diff.changed.keys().collect::<Vec<_>>()
            ),
            Advisory::ChecksumUnvalidatable { archive, reason } => {
                write!(f, "archive {}: checksums not validated ({})", archive, reason)
            }
            Advisory::RecordedMetadataMissing {
                archive,
                node,
                path,
            } => write!(
                f,
                "archive {}: recorded metadata file {} for node {} is missing",
                archive, path, node
            ),
        }
    }
}
