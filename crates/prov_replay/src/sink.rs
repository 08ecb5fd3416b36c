use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use prov_core::ProvId;

use crate::error::ReplayError;

/// Write target for the metadata snapshots recovered from provenance.
///
/// `location` is a `/`-separated relative path such as
/// `recorded_metadata/emperor_plot_0/metadata.tsv`.
pub trait RecordedMetadataSink {
    fn deposit(&mut self, node: &ProvId, location: &str, contents: &str) -> Result<(), ReplayError>;
}

impl<T: RecordedMetadataSink + ?Sized> RecordedMetadataSink for &mut T {
    fn deposit(&mut self, node: &ProvId, location: &str, contents: &str) -> Result<(), ReplayError> {
        (**self).deposit(node, location, contents)
    }
}

/// One deposited snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    pub node: ProvId,
    pub contents: String,
}

/// Keeps snapshots in memory, keyed by location.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    deposits: BTreeMap<String, Deposit>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: &str) -> Option<&Deposit> {
        self.deposits.get(location)
    }

    pub fn locations(&self) -> Vec<&str> {
        self.deposits.keys().map(String::as_str).collect()
    }

    /// Locations deposited on behalf of `node`.
    pub fn for_node(&self, node: &ProvId) -> Vec<&str> {
        self.deposits
            .iter()
            .filter(|(_, d)| &d.node == node)
            .map(|(loc, _)| loc.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.deposits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deposits.is_empty()
    }
}

impl RecordedMetadataSink for MemorySink {
    fn deposit(&mut self, node: &ProvId, location: &str, contents: &str) -> Result<(), ReplayError> {
        self.deposits.insert(
            location.to_string(),
            Deposit {
                node: node.clone(),
                contents: contents.to_string(),
            },
        );
        Ok(())
    }
}

/// Writes snapshots below a base directory, creating parents as needed.
#[derive(Debug, Clone)]
pub struct DirSink {
    base: PathBuf,
    written: Vec<PathBuf>,
}

impl DirSink {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            written: Vec::new(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Files written so far, in deposit order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn resolve(&self, location: &str) -> Result<PathBuf, ReplayError> {
        let mut path = self.base.clone();
        for segment in location.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." || segment == "." {
                return Err(ReplayError::Sink {
                    location: location.to_string(),
                    detail: "location must not contain relative segments".to_string(),
                });
            }
            path.push(segment);
        }
        Ok(path)
    }
}

impl RecordedMetadataSink for DirSink {
    fn deposit(&mut self, node: &ProvId, location: &str, contents: &str) -> Result<(), ReplayError> {
        let path = self.resolve(location)?;
        let io_err = |err: std::io::Error| ReplayError::Sink {
            location: path.display().to_string(),
            detail: err.to_string(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&path, contents).map_err(io_err)?;
        tracing::debug!(node = %node, path = %path.display(), "deposited recorded metadata");
        self.written.push(path);
        Ok(())
    }
}
