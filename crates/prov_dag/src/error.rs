use prov_core::{ParseError, ProvId};
use thiserror::Error;

fn render_cycle(cycle: &[ProvId]) -> String {
    cycle
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("provenance cycle detected: {}", render_cycle(.cycle))]
    Cycle { cycle: Vec<ProvId> },

    /// The same id was supplied twice with different histories.
    #[error("node {id} supplied twice with different provenance ({left} vs {right})")]
    DuplicateNode {
        id: ProvId,
        left: String,
        right: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// Two graphs disagree about one artifact's history. `left` and `right`
    /// are the payload fingerprints.
    #[error("merge conflict on node {id}: provenance differs ({left} vs {right})")]
    Conflict {
        id: ProvId,
        left: String,
        right: String,
    },

    #[error("merged graph contains a cycle: {}", render_cycle(.cycle))]
    Cycle { cycle: Vec<ProvId> },
}

/// Why an archive was left out of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveFailure {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Parsed, but its nodes do not form a valid graph.
    #[error(transparent)]
    Build(#[from] BuildError),
}
