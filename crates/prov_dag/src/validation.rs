use std::collections::{BTreeMap, BTreeSet};

use prov_core::ProvId;

use crate::edge::ProvEdge;

/// DFS cycle detection over dependency edges. Returns the first cycle found,
/// walking start nodes in `order`.
pub fn find_cycle(order: &[ProvId], edges: &[ProvEdge]) -> Option<Vec<ProvId>> {
    let mut adj: BTreeMap<&ProvId, Vec<&ProvId>> = BTreeMap::new();
    for edge in edges {
        adj.entry(&edge.from).or_default().push(&edge.to);
    }

    let mut visiting = BTreeSet::new();
    let mut visited = BTreeSet::new();
    let mut path = Vec::new();

    for id in order {
        if !visited.contains(id) {
            if let Some(cycle) = cycle_dfs(id, &adj, &mut visiting, &mut visited, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

fn cycle_dfs<'a>(
    node: &'a ProvId,
    adj: &BTreeMap<&'a ProvId, Vec<&'a ProvId>>,
    visiting: &mut BTreeSet<&'a ProvId>,
    visited: &mut BTreeSet<&'a ProvId>,
    path: &mut Vec<&'a ProvId>,
) -> Option<Vec<ProvId>> {
    if visiting.contains(node) {
        let start = path.iter().position(|n| *n == node)?;
        let mut cycle: Vec<ProvId> = path[start..].iter().map(|id| (*id).clone()).collect();
        cycle.push(node.clone());
        return Some(cycle);
    }
    if visited.contains(node) {
        return None;
    }

    visiting.insert(node);
    path.push(node);

    if let Some(next) = adj.get(node) {
        for dep in next.iter() {
            if let Some(cycle) = cycle_dfs(*dep, adj, visiting, visited, path) {
                return Some(cycle);
            }
        }
    }

    path.pop();
    visiting.remove(node);
    visited.insert(node);
    None
}
