//! Bibliography of everything a graph's results were computed with.

use std::collections::BTreeMap;

use prov_core::ProvId;
use prov_dag::ProvDag;
use serde::Serialize;

use crate::config::CitationConfig;

const FRAMEWORK_KEY: &str = "framework|qiime2";
const NO_CITATIONS: &str = "No citations were recorded for this file.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationRecord {
    pub key: String,
    pub raw_bibtex_entry: String,
    /// Nodes citing this entry, in first-seen order.
    pub contributing_node_ids: Vec<ProvId>,
    #[serde(skip)]
    doi: Option<String>,
}

impl CitationRecord {
    pub fn doi(&self) -> Option<&str> {
        self.doi.as_deref()
    }

    fn absorb(&mut self, other: &CitationRecord) {
        for id in &other.contributing_node_ids {
            if !self.contributing_node_ids.contains(id) {
                self.contributing_node_ids.push(id.clone());
            }
        }
    }
}

/// Every citation in `dag`, one record per key, in the order keys are first
/// met walking the graph topologically.
pub fn collect(dag: &ProvDag) -> Vec<CitationRecord> {
    let mut records: Vec<CitationRecord> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();
    for id in dag.topological_order() {
        let Some(node) = dag.get(&id) else { continue };
        for (key, entry) in &node.citations {
            match index.get(key) {
                Some(&i) => {
                    let ids = &mut records[i].contributing_node_ids;
                    if !ids.contains(&id) {
                        ids.push(id.clone());
                    }
                }
                None => {
                    index.insert(key.clone(), records.len());
                    records.push(CitationRecord {
                        key: key.clone(),
                        raw_bibtex_entry: entry.raw.trim().to_string(),
                        contributing_node_ids: vec![id.clone()],
                        doi: entry.doi().map(|d| d.to_ascii_lowercase()),
                    });
                }
            }
        }
    }
    tracing::debug!(citations = records.len(), "collected citations");
    records
}

/// Collapse framework citations to the first one seen and entries sharing a
/// DOI to the first one seen. Entries without a DOI are kept.
pub fn deduplicate(records: Vec<CitationRecord>) -> Vec<CitationRecord> {
    let mut kept: Vec<CitationRecord> = Vec::new();
    let mut framework: Option<usize> = None;
    let mut by_doi: BTreeMap<String, usize> = BTreeMap::new();

    for record in records {
        if record.key.contains(FRAMEWORK_KEY) {
            match framework {
                Some(i) => kept[i].absorb(&record),
                None => {
                    framework = Some(kept.len());
                    kept.push(record);
                }
            }
            continue;
        }
        match record.doi.clone() {
            Some(doi) => match by_doi.get(&doi) {
                Some(&i) => kept[i].absorb(&record),
                None => {
                    by_doi.insert(doi, kept.len());
                    kept.push(record);
                }
            },
            None => kept.push(record),
        }
    }
    kept
}

pub fn collect_with(dag: &ProvDag, config: &CitationConfig) -> Vec<CitationRecord> {
    let records = collect(dag);
    if config.deduplicate {
        deduplicate(records)
    } else {
        records
    }
}

/// BibTeX document of `records`.
pub fn to_bibtex(records: &[CitationRecord]) -> String {
    if records.is_empty() {
        return NO_CITATIONS.to_string();
    }
    let mut out = records
        .iter()
        .map(|r| r.raw_bibtex_entry.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    out.push('\n');
    out
}
