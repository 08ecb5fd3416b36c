use std::fmt;

use prov_core::ProvId;
use serde::Serialize;
use thiserror::Error;

/// Configuration that cannot be read, parsed or honored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("read {path}: {detail}")]
    Read { path: String, detail: String },

    #[error("parse config: {detail}")]
    Parse { detail: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("recorded metadata sink failed at {location}: {detail}")]
    Sink { location: String, detail: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Non-fatal findings of one replay pass. The script is still complete;
/// these say where it is not faithful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayAdvisory {
    UnresolvedParameter {
        node: ProvId,
        plugin: String,
        action: String,
        parameter: String,
    },
    UnknownAction {
        node: ProvId,
        plugin: String,
        action: String,
    },
    NoProvenanceInput {
        node: ProvId,
        input: ProvId,
    },
    MissingInput {
        node: ProvId,
        input: ProvId,
    },
    RecordedMetadata {
        node: ProvId,
        parameter: String,
        /// Sink location of the snapshot, if one was recorded.
        location: Option<String>,
    },
}

impl fmt::Display for ReplayAdvisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayAdvisory::UnresolvedParameter {
                node,
                plugin,
                action,
                parameter,
            } => write!(
                f,
                "node {}: parameter `{}` is not part of the current signature of {} {}",
                node, parameter, plugin, action
            ),
            ReplayAdvisory::UnknownAction {
                node,
                plugin,
                action,
            } => write!(
                f,
                "node {}: action {} {} is not registered; parameters rendered as recorded",
                node, plugin, action
            ),
            ReplayAdvisory::NoProvenanceInput { node, input } => write!(
                f,
                "node {}: input {} has no provenance and is rendered as a placeholder",
                node, input
            ),
            ReplayAdvisory::MissingInput { node, input } => write!(
                f,
                "node {}: input {} is not part of the graph and is rendered as a placeholder",
                node, input
            ),
            ReplayAdvisory::RecordedMetadata {
                node,
                parameter,
                location: Some(location),
            } => write!(
                f,
                "node {}: metadata for `{}` recorded at {}",
                node, parameter, location
            ),
            ReplayAdvisory::RecordedMetadata {
                node,
                parameter,
                location: None,
            } => write!(
                f,
                "node {}: metadata for `{}` was not captured; supply it manually",
                node, parameter
            ),
        }
    }
}
