use serde::{Deserialize, Serialize};
use std::fmt;

use prov_core::{DependencyKind, ProvId};

/// `from` was produced using `to`. Data dependency, not time order: one
/// input may feed many consumers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProvEdge {
    pub from: ProvId,
    pub to: ProvId,
    pub kind: DependencyKind,
}

impl ProvEdge {
    pub fn new(from: ProvId, to: ProvId, kind: DependencyKind) -> Self {
        ProvEdge { from, to, kind }
    }

    /// Input and metadata edges; pipeline aliases are excluded.
    pub fn is_data(&self) -> bool {
        !matches!(self.kind, DependencyKind::AliasOf)
    }
}

impl fmt::Display for ProvEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DependencyKind::Input { name } => write!(f, "{} <-[input {}]- {}", self.from, name, self.to),
            DependencyKind::Metadata { parameter } => {
                write!(f, "{} <-[metadata {}]- {}", self.from, parameter, self.to)
            }
            DependencyKind::AliasOf => write!(f, "{} <-[alias-of]- {}", self.from, self.to),
        }
    }
}

/// A dependency whose target is not (yet) in the graph. Kept so a later
/// merge can resolve it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DanglingReference {
    pub from: ProvId,
    pub missing: ProvId,
    pub kind: DependencyKind,
}

impl fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node {} references {} which is not present in the graph",
            self.from, self.missing
        )
    }
}
