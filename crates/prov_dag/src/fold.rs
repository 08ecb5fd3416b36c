//! Sequential assembly of many parsed archives into one graph.
//!
//! Parsing runs in parallel (see [`prov_core::parse_all`]); building and
//! merging here is a left-to-right fold in caller order, so the first
//! reported conflict is stable across runs.

use prov_core::{parse_all, Advisory, ArchiveOutcome, ArchiveSource, ParseConfig, ParsedArchive};

use crate::builder::{build, merge};
use crate::error::{ArchiveFailure, BuildError, MergeError};
use crate::graph::ProvDag;

/// Graph for one parsed archive.
pub fn from_parsed(parsed: &ParsedArchive) -> Result<ProvDag, BuildError> {
    build(parsed.nodes.clone())
}

/// Left fold of [`merge`] over `dags`; empty input yields an empty graph.
pub fn merge_all<'a, I>(dags: I) -> Result<ProvDag, MergeError>
where
    I: IntoIterator<Item = &'a ProvDag>,
{
    let mut acc = ProvDag::new();
    for dag in dags {
        acc = merge(&acc, dag)?;
    }
    Ok(acc)
}

/// Combined graph plus everything reported along the way.
#[derive(Debug)]
pub struct CollectionReport {
    pub dag: ProvDag,
    /// Parse advisories of every archive that parsed, in archive order.
    pub advisories: Vec<Advisory>,
    /// Archives that failed to parse or build, by label. They are left out
    /// of `dag`.
    pub failures: Vec<(String, ArchiveFailure)>,
}

/// Fold parse outcomes (in index order) into one graph. Archives that fail
/// to parse or build are reported, not fatal; a merge conflict aborts.
pub fn assemble_outcomes(mut outcomes: Vec<ArchiveOutcome>) -> Result<CollectionReport, MergeError> {
    outcomes.sort_by_key(|o| o.index);

    let mut dag = ProvDag::new();
    let mut advisories = Vec::new();
    let mut failures = Vec::new();

    for outcome in outcomes {
        let label = outcome.label;
        let built = outcome
            .result
            .map_err(ArchiveFailure::from)
            .and_then(|parsed| match from_parsed(&parsed) {
                Ok(single) => Ok((parsed, single)),
                Err(err) => Err(ArchiveFailure::from(err)),
            });
        match built {
            Ok((parsed, single)) => {
                dag = merge(&dag, &single)?;
                advisories.extend(parsed.advisories);
            }
            Err(err) => {
                tracing::warn!(archive = %label, error = %err, "archive left out of the provenance graph");
                failures.push((label, err));
            }
        }
    }

    tracing::debug!(
        nodes = dag.len(),
        failures = failures.len(),
        "assembled provenance collection"
    );
    Ok(CollectionReport {
        dag,
        advisories,
        failures,
    })
}

/// Parse `archives` concurrently and fold them into one graph.
pub fn load_archives<A: ArchiveSource>(
    archives: &[A],
    config: &ParseConfig,
) -> Result<CollectionReport, MergeError> {
    assemble_outcomes(parse_all(archives, config))
}
