//! Parse many archives concurrently.
//!
//! Each archive is independent: one failing archive never cancels its
//! siblings, and results come back in caller order.

use rayon::prelude::*;

use crate::archive::ArchiveSource;
use crate::config::ParseConfig;
use crate::error::ParseError;
use crate::parser::{ArchiveParser, ParsedArchive};

/// Result for the archive at `index` of the caller's slice.
#[derive(Debug)]
pub struct ArchiveOutcome {
    pub index: usize,
    pub label: String,
    pub result: Result<ParsedArchive, ParseError>,
}

impl ArchiveOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub fn parse_all<A: ArchiveSource>(archives: &[A], config: &ParseConfig) -> Vec<ArchiveOutcome> {
    let parser = ArchiveParser::new(config.clone());
    let run = |(index, archive): (usize, &A)| {
        let result = parser.parse(archive);
        if let Err(err) = &result {
            tracing::warn!(archive = %archive.label(), error = %err, "archive failed to parse");
        }
        ArchiveOutcome {
            index,
            label: archive.label(),
            result,
        }
    };

    let workers = config.effective_workers();
    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(|| archives.par_iter().enumerate().map(run).collect()),
        Err(err) => {
            tracing::warn!(error = %err, "thread pool unavailable, parsing sequentially");
            archives.iter().enumerate().map(run).collect()
        }
    }
}
