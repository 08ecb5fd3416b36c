pub mod action;
pub mod archive;
pub mod batch;
pub mod bibtex;
pub mod builder;
pub mod checksum;
pub mod config;
pub mod error;
pub mod node;
pub mod parser;
pub mod schema;
pub mod version;
pub mod yaml_tags;

// Re-export main types for convenience
pub use archive::{root_dir, ArchiveSource, DirArchive, MemoryArchive};
pub use batch::{parse_all, ArchiveOutcome};
pub use bibtex::{parse_bibtex, BibEntry};
pub use builder::{ArchiveBuilder, NodeRecord};
pub use checksum::{
    validate, ChecksumDiff, ChecksumOutcome, ChecksumStatus, UnvalidatableReason,
};
pub use config::ParseConfig;
pub use error::{Advisory, ArchiveError, ParseError};
pub use node::{
    ActionRecord, ActionType, ArtifactRef, Dependency, DependencyKind, Environment,
    InputBinding, MetadataRef, NodeType, ParamValue, Parameter, ProvId, ProvNode, Runtime,
};
pub use parser::{parse, ArchiveParser, ParsedArchive};
pub use schema::{SchemaRegistry, SchemaRule, SchemaVersion};
pub use version::{parse_version, FormatVersion};
