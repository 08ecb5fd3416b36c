use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use prov_core::{ChecksumStatus, NodeType, ProvId, ProvNode};

use crate::edge::{DanglingReference, ProvEdge};

/// Arena of [`ProvNode`]s keyed by id, with edges stored as id pairs.
///
/// Values are immutable once built; [`crate::merge`] and
/// [`crate::select_subgraph`] produce new graphs. `order` records insertion
/// order and is the tie-break for every ordered view.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProvDag {
    nodes: BTreeMap<ProvId, ProvNode>,
    order: Vec<ProvId>,
    edges: Vec<ProvEdge>,
    dangling: Vec<DanglingReference>,
}

impl ProvDag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callers guarantee `order` lists exactly the keys of `nodes`.
    pub(crate) fn from_parts(
        nodes: BTreeMap<ProvId, ProvNode>,
        order: Vec<ProvId>,
        edges: Vec<ProvEdge>,
        dangling: Vec<DanglingReference>,
    ) -> Self {
        ProvDag {
            nodes,
            order,
            edges,
            dangling,
        }
    }

    pub(crate) fn node_map(&self) -> &BTreeMap<ProvId, ProvNode> {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &ProvId) -> Option<&ProvNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &ProvId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> &[ProvId] {
        &self.order
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &ProvNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn edges(&self) -> &[ProvEdge] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Unresolved dependencies, in discovery order.
    pub fn dangling(&self) -> &[DanglingReference] {
        &self.dangling
    }

    /// Whether `from` was produced using `to`.
    pub fn has_edge(&self, from: &ProvId, to: &ProvId) -> bool {
        self.edges.iter().any(|e| &e.from == from && &e.to == to)
    }

    /// Nodes `id` was produced from, in record order.
    pub fn parents(&self, id: &ProvId) -> Vec<&ProvId> {
        let mut out: Vec<&ProvId> = Vec::new();
        for edge in self.edges.iter().filter(|e| &e.from == id) {
            if !out.contains(&&edge.to) {
                out.push(&edge.to);
            }
        }
        out
    }

    /// Nodes that consumed `id`.
    pub fn children(&self, id: &ProvId) -> Vec<&ProvId> {
        let mut out: Vec<&ProvId> = Vec::new();
        for edge in self.edges.iter().filter(|e| &e.to == id) {
            if !out.contains(&&edge.from) {
                out.push(&edge.from);
            }
        }
        out
    }

    /// Nodes nothing else in the graph consumed, in insertion order.
    pub fn terminals(&self) -> Vec<ProvId> {
        let consumed: BTreeSet<&ProvId> = self.edges.iter().map(|e| &e.to).collect();
        self.order
            .iter()
            .filter(|id| !consumed.contains(id))
            .cloned()
            .collect()
    }

    /// Archive roots, in insertion order.
    pub fn roots(&self) -> Vec<ProvId> {
        self.nodes()
            .filter(|n| n.node_type == NodeType::Root)
            .map(|n| n.id.clone())
            .collect()
    }

    pub fn nodes_without_provenance(&self) -> Vec<ProvId> {
        self.nodes()
            .filter(|n| !n.has_provenance())
            .map(|n| n.id.clone())
            .collect()
    }

    pub fn checksum_statuses(&self) -> BTreeMap<ProvId, ChecksumStatus> {
        self.nodes
            .iter()
            .map(|(id, n)| (id.clone(), n.checksum_status))
            .collect()
    }

    /// Position of `id` in insertion order.
    pub fn position(&self, id: &ProvId) -> Option<usize> {
        self.order.iter().position(|x| x == id)
    }

    pub fn edge_set(&self) -> BTreeSet<&ProvEdge> {
        self.edges.iter().collect()
    }
}

/// Graphs are equal when their node payloads, edges and unresolved references
/// match; insertion order is not part of the comparison.
impl PartialEq for ProvDag {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
            && self.edge_set() == other.edge_set()
            && self.dangling.iter().collect::<BTreeSet<_>>()
                == other.dangling.iter().collect::<BTreeSet<_>>()
    }
}

impl Eq for ProvDag {}
