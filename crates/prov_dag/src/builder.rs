//! Graph construction and merging.
//!
//! Both operations go through [`assemble`]: nodes are keyed by id, then every
//! dependency is wired as an edge if its target is present and recorded as
//! dangling otherwise. Merging is a union of node sets followed by a fresh
//! assembly, so references left dangling by one archive resolve as soon as
//! the archive that records them is merged in.

use std::collections::{BTreeMap, BTreeSet};

use prov_core::{NodeType, ProvId, ProvNode};

use crate::edge::{DanglingReference, ProvEdge};
use crate::error::{BuildError, MergeError};
use crate::graph::ProvDag;
use crate::validation::find_cycle;

/// Build a graph from one archive's nodes (or any node set).
pub fn build(nodes: Vec<ProvNode>) -> Result<ProvDag, BuildError> {
    let mut map: BTreeMap<ProvId, ProvNode> = BTreeMap::new();
    let mut order = Vec::with_capacity(nodes.len());

    for node in nodes {
        match map.get(&node.id) {
            None => {
                order.push(node.id.clone());
                map.insert(node.id.clone(), node);
            }
            Some(existing) => {
                let combined = reconcile(existing, &node).ok_or_else(|| BuildError::DuplicateNode {
                    id: node.id.clone(),
                    left: existing.fingerprint(),
                    right: node.fingerprint(),
                })?;
                map.insert(node.id.clone(), combined);
            }
        }
    }

    let dag = assemble(map, order);
    if let Some(cycle) = find_cycle(dag.ids(), dag.edges()) {
        return Err(BuildError::Cycle { cycle });
    }
    for dangling in dag.dangling() {
        tracing::warn!(from = %dangling.from, missing = %dangling.missing, "dangling provenance reference");
    }
    tracing::debug!(
        nodes = dag.len(),
        edges = dag.edge_count(),
        dangling = dag.dangling().len(),
        "built provenance graph"
    );
    Ok(dag)
}

/// Union of two graphs. Shared ids must carry the same history; the first
/// disagreement fails the merge and neither input is touched.
pub fn merge(a: &ProvDag, b: &ProvDag) -> Result<ProvDag, MergeError> {
    let mut map = a.node_map().clone();
    let mut order = a.ids().to_vec();

    for node in b.nodes() {
        match map.get(&node.id) {
            None => {
                order.push(node.id.clone());
                map.insert(node.id.clone(), node.clone());
            }
            Some(existing) => {
                let combined = reconcile(existing, node).ok_or_else(|| MergeError::Conflict {
                    id: node.id.clone(),
                    left: existing.fingerprint(),
                    right: node.fingerprint(),
                })?;
                map.insert(node.id.clone(), combined);
            }
        }
    }

    let dag = assemble(map, order);
    if let Some(cycle) = find_cycle(dag.ids(), dag.edges()) {
        return Err(MergeError::Cycle { cycle });
    }
    tracing::debug!(
        left = a.len(),
        right = b.len(),
        merged = dag.len(),
        dangling = dag.dangling().len(),
        "merged provenance graphs"
    );
    Ok(dag)
}

/// Combine two records of the same id, or `None` if they disagree.
///
/// A bare no-provenance stub (an id seen only as a `!no-provenance` input)
/// yields to any fuller record. Otherwise the histories must match; the
/// result is a root if either side was, and carries the worse checksum.
pub fn reconcile(existing: &ProvNode, incoming: &ProvNode) -> Option<ProvNode> {
    let status = existing.checksum_status.worst(incoming.checksum_status);
    let mut combined = match (is_bare_stub(existing), is_bare_stub(incoming)) {
        (true, _) => incoming.clone(),
        (false, true) => existing.clone(),
        (false, false) if existing.same_history(incoming) => {
            let mut node = existing.clone();
            if incoming.node_type == NodeType::Root {
                node.node_type = NodeType::Root;
            }
            for (key, entry) in &incoming.citations {
                node.citations.entry(key.clone()).or_insert_with(|| entry.clone());
            }
            node
        }
        (false, false) => return None,
    };
    combined.checksum_status = status;
    Some(combined)
}

fn is_bare_stub(node: &ProvNode) -> bool {
    node.node_type == NodeType::NoProvenance
        && node.format_version.is_none()
        && node.semantic_type.is_none()
        && node.action.is_none()
}

fn assemble(nodes: BTreeMap<ProvId, ProvNode>, order: Vec<ProvId>) -> ProvDag {
    let mut edges = Vec::new();
    let mut dangling = Vec::new();
    let mut seen_edges = BTreeSet::new();
    let mut seen_dangling = BTreeSet::new();

    for id in &order {
        let Some(node) = nodes.get(id) else {
            continue;
        };
        for dep in node.dependencies() {
            if nodes.contains_key(&dep.id) {
                let edge = ProvEdge::new(id.clone(), dep.id, dep.kind);
                if seen_edges.insert(edge.clone()) {
                    edges.push(edge);
                }
            } else {
                let reference = DanglingReference {
                    from: id.clone(),
                    missing: dep.id,
                    kind: dep.kind,
                };
                if seen_dangling.insert(reference.clone()) {
                    dangling.push(reference);
                }
            }
        }
    }

    ProvDag::from_parts(nodes, order, edges, dangling)
}
