pub mod builder;
pub mod edge;
pub mod error;
pub mod fold;
pub mod graph;
pub mod order;
pub mod validation;

// Re-export main types for convenience
pub use builder::{build, merge, reconcile};
pub use edge::{DanglingReference, ProvEdge};
pub use error::{ArchiveFailure, BuildError, MergeError};
pub use fold::{assemble_outcomes, from_parsed, load_archives, merge_all, CollectionReport};
pub use graph::ProvDag;
pub use order::{ancestors, nested_provenance, select_subgraph, topological_order};
pub use validation::find_cycle;
