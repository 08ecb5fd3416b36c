use serde::{Deserialize, Serialize};

/// Parser options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Recompute and compare `checksums.md5`.
    pub validate_checksums: bool,
    /// Read the `.tsv` snapshots referenced by `!metadata` parameters.
    pub parse_metadata: bool,
    /// Upper bound on archives parsed concurrently.
    pub workers: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            validate_checksums: true,
            parse_metadata: true,
            workers: default_workers(),
        }
    }
}

impl ParseConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ParseConfig::default();
        assert!(cfg.validate_checksums);
        assert!(cfg.parse_metadata);
        assert!(cfg.workers >= 1);
    }

    #[test]
    fn zero_workers_still_runs_one() {
        let cfg = ParseConfig {
            workers: 0,
            ..ParseConfig::default()
        };
        assert_eq!(cfg.effective_workers(), 1);
        assert_eq!(ParseConfig::default().with_workers(0).workers, 1);
    }
}
