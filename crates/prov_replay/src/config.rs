use std::path::Path;

use prov_core::ParseConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Target surface of a rendered script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    #[default]
    Cli,
    Python3,
}

impl DriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverKind::Cli => "cli",
            DriverKind::Python3 => "python3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub driver: DriverKind,
    /// Point metadata parameters at the recorded snapshots instead of
    /// asking the user for a file.
    pub use_recorded_metadata: bool,
    /// Render pipelines as one call and skip the steps they ran internally.
    pub collapse_pipelines: bool,
    /// Prefix of every location handed to the recorded-metadata sink.
    pub metadata_dir: String,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::Cli,
            use_recorded_metadata: false,
            collapse_pipelines: true,
            metadata_dir: "recorded_metadata".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationConfig {
    /// Collapse framework citations and entries sharing a DOI.
    pub deduplicate: bool,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self { deduplicate: true }
    }
}

/// Everything a caller can set, as read from one TOML document:
///
/// ```toml
/// [parse]
/// validate_checksums = true
/// workers = 4
///
/// [replay]
/// driver = "python3"
/// use_recorded_metadata = true
///
/// [citations]
/// deduplicate = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvConfig {
    pub parse: ParseConfig,
    pub replay: ReplayConfig,
    pub citations: CitationConfig,
}

impl ProvConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ProvConfig = toml::from_str(raw).map_err(|err| ConfigError::Parse {
            detail: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            detail: err.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replay.use_recorded_metadata && !self.parse.parse_metadata {
            return Err(ConfigError::Invalid(
                "use_recorded_metadata requires parse_metadata = true".to_string(),
            ));
        }
        if self.replay.metadata_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("metadata_dir must not be empty".to_string()));
        }
        Ok(())
    }
}
