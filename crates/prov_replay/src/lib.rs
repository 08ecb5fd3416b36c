pub mod citations;
pub mod config;
pub mod drivers;
pub mod engine;
pub mod error;
pub mod namespace;
pub mod signature;
pub mod sink;
pub mod usage;

// Re-export main types for convenience
pub use citations::{collect, collect_with, deduplicate, to_bibtex, CitationRecord};
pub use config::{CitationConfig, DriverKind, ProvConfig, ReplayConfig};
pub use drivers::{driver_for, CliDriver, PythonDriver};
pub use engine::{replay, replay_from_config, replay_scope, replay_with, ReplayContext, ReplayReport};
pub use error::{ConfigError, ReplayAdvisory, ReplayError};
pub use namespace::{kebab_case, VariableNamespace};
pub use signature::{ActionSignature, ActionSignatureLookup, SignatureTable};
pub use sink::{Deposit, DirSink, MemorySink, RecordedMetadataSink};
pub use usage::{
    dispatch, ArtifactView, MetadataFileRef, UsageAction, UsageDriver, UsageInput, UsageKind,
    UsageOutput, UsageParameter, UsageValue,
};
