use std::collections::{BTreeMap, BTreeSet, VecDeque};

use prov_core::ProvId;

use crate::edge::ProvEdge;
use crate::graph::ProvDag;

/// Every node after all nodes it depends on. Ready nodes are emitted in
/// insertion order, so the same graph always yields the same sequence.
pub fn topological_order(dag: &ProvDag) -> Vec<ProvId> {
    let index: BTreeMap<&ProvId, usize> = dag.ids().iter().enumerate().map(|(i, id)| (id, i)).collect();

    let mut pending: Vec<usize> = vec![0; dag.ids().len()];
    let mut consumers: BTreeMap<&ProvId, Vec<&ProvId>> = BTreeMap::new();
    for edge in dag.edges() {
        if let Some(&i) = index.get(&edge.from) {
            pending[i] += 1;
        }
        consumers.entry(&edge.to).or_default().push(&edge.from);
    }

    let mut ready: BTreeSet<usize> = pending
        .iter()
        .enumerate()
        .filter(|(_, n)| **n == 0)
        .map(|(i, _)| i)
        .collect();

    let mut out = Vec::with_capacity(dag.len());
    while let Some(i) = ready.pop_first() {
        let id = &dag.ids()[i];
        out.push(id.clone());
        if let Some(users) = consumers.get(id) {
            for user in users {
                if let Some(&j) = index.get(user) {
                    pending[j] -= 1;
                    if pending[j] == 0 {
                        ready.insert(j);
                    }
                }
            }
        }
    }
    out
}

/// Ids reachable backward from `starts` along edges accepted by `follow`,
/// including the starts that exist in the graph.
pub fn ancestors<F>(dag: &ProvDag, starts: &BTreeSet<ProvId>, follow: F) -> BTreeSet<ProvId>
where
    F: Fn(&ProvEdge) -> bool,
{
    let mut deps: BTreeMap<&ProvId, Vec<&ProvId>> = BTreeMap::new();
    for edge in dag.edges().iter().filter(|e| follow(e)) {
        deps.entry(&edge.from).or_default().push(&edge.to);
    }

    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<&ProvId> = starts.iter().filter(|id| dag.contains(id)).collect();
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Some(next) = deps.get(id) {
            queue.extend(next.iter().copied());
        }
    }
    seen
}

/// Induced subgraph of everything the given terminals were derived from.
/// Terminal ids absent from the graph are ignored.
pub fn select_subgraph(dag: &ProvDag, terminals: &BTreeSet<ProvId>) -> ProvDag {
    let keep = ancestors(dag, terminals, |_| true);
    dag.restrict(&keep)
}

/// `id` and every node it was computed from through inputs and metadata,
/// without stepping into pipeline internals.
pub fn nested_provenance(dag: &ProvDag, id: &ProvId) -> BTreeSet<ProvId> {
    let mut start = BTreeSet::new();
    start.insert(id.clone());
    ancestors(dag, &start, ProvEdge::is_data)
}

impl ProvDag {
    /// Subgraph over `keep`, preserving insertion order.
    pub fn restrict(&self, keep: &BTreeSet<ProvId>) -> ProvDag {
        let nodes = self
            .node_map()
            .iter()
            .filter(|(id, _)| keep.contains(*id))
            .map(|(id, n)| (id.clone(), n.clone()))
            .collect();
        let order = self.ids().iter().filter(|id| keep.contains(*id)).cloned().collect();
        let edges = self
            .edges()
            .iter()
            .filter(|e| keep.contains(&e.from) && keep.contains(&e.to))
            .cloned()
            .collect();
        let dangling = self
            .dangling()
            .iter()
            .filter(|d| keep.contains(&d.from))
            .cloned()
            .collect();
        ProvDag::from_parts(nodes, order, edges, dangling)
    }

    pub fn topological_order(&self) -> Vec<ProvId> {
        topological_order(self)
    }

    pub fn select_subgraph(&self, terminals: &BTreeSet<ProvId>) -> ProvDag {
        select_subgraph(self, terminals)
    }

    pub fn nested_provenance(&self, id: &ProvId) -> BTreeSet<ProvId> {
        nested_provenance(self, id)
    }
}
