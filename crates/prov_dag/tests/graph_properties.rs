use std::collections::BTreeMap;

use proptest::prelude::*;
use prov_core::{
    ActionRecord, ActionType, ArtifactRef, ChecksumStatus, Environment, InputBinding, NodeType,
    ProvId, ProvNode, Runtime,
};
use prov_dag::{build, merge, topological_order, MergeError, ProvDag};

fn make_node(index: usize, deps: &[usize], ghost: bool, root: bool) -> ProvNode {
    let mut inputs: Vec<InputBinding> = deps
        .iter()
        .map(|d| InputBinding {
            name: format!("input_{}", d),
            artifacts: vec![ArtifactRef {
                id: ProvId::new(format!("n{}", d)),
                no_provenance: false,
            }],
            collection: false,
        })
        .collect();
    if ghost {
        inputs.push(InputBinding {
            name: "external".into(),
            artifacts: vec![ArtifactRef {
                id: ProvId::new(format!("ghost{}", index)),
                no_provenance: false,
            }],
            collection: false,
        });
    }
    ProvNode {
        id: ProvId::new(format!("n{}", index)),
        node_type: if root { NodeType::Root } else { NodeType::Standard },
        format_version: None,
        semantic_type: Some("FeatureTable[Frequency]".into()),
        data_format: None,
        action: Some(ActionRecord {
            action_id: Some(format!("exec{}", index)),
            action_type: if inputs.is_empty() {
                ActionType::Import
            } else {
                ActionType::Method
            },
            plugin_name: "feature_table".into(),
            action_name: "merge".into(),
            inputs,
            parameters: vec![],
            outputs: vec!["merged_table".into()],
            alias_of: None,
            import_format: None,
            import_manifest: None,
            transformers: None,
            execution_context: None,
            runtime: Runtime::default(),
            environment: Environment::default(),
        }),
        citations: BTreeMap::new(),
        checksum_status: ChecksumStatus::Valid,
    }
}

/// Consistent node universe: node `i` may only depend on nodes `< i`.
fn arb_universe() -> impl Strategy<Value = Vec<ProvNode>> {
    prop::collection::vec(
        (prop::collection::vec(any::<bool>(), 8), any::<bool>(), any::<bool>()),
        1..8,
    )
    .prop_map(|shapes| {
        shapes
            .iter()
            .enumerate()
            .map(|(i, (dep_mask, ghost, root))| {
                let deps: Vec<usize> = (0..i).filter(|j| dep_mask[*j]).collect();
                make_node(i, &deps, *ghost, *root)
            })
            .collect()
    })
}

fn subset(universe: &[ProvNode], mask: &[bool]) -> Vec<ProvNode> {
    universe
        .iter()
        .zip(mask.iter().cycle())
        .filter(|(_, keep)| **keep)
        .map(|(n, _)| n.clone())
        .collect()
}

fn assert_topologically_valid(dag: &ProvDag) -> Result<(), TestCaseError> {
    let order = topological_order(dag);
    prop_assert_eq!(order.len(), dag.len());
    let pos: BTreeMap<&ProvId, usize> = order.iter().enumerate().map(|(i, id)| (id, i)).collect();
    for edge in dag.edges() {
        prop_assert!(
            pos[&edge.to] < pos[&edge.from],
            "{} must precede {}",
            edge.to,
            edge.from
        );
    }
    Ok(())
}

proptest! {
    #[test]
    fn merge_with_self_is_identity(universe in arb_universe()) {
        let dag = build(universe).unwrap();
        let merged = merge(&dag, &dag).unwrap();
        prop_assert_eq!(merged, dag);
    }

    #[test]
    fn merge_commutes_without_conflicts(
        universe in arb_universe(),
        left_mask in prop::collection::vec(any::<bool>(), 1..8),
        right_mask in prop::collection::vec(any::<bool>(), 1..8),
    ) {
        let left = build(subset(&universe, &left_mask)).unwrap();
        let right = build(subset(&universe, &right_mask)).unwrap();
        let lr = merge(&left, &right).unwrap();
        let rl = merge(&right, &left).unwrap();
        prop_assert_eq!(lr, rl);
    }

    #[test]
    fn topological_order_respects_dependencies(
        universe in arb_universe(),
        mask in prop::collection::vec(any::<bool>(), 1..8),
    ) {
        let full = build(universe.clone()).unwrap();
        assert_topologically_valid(&full)?;

        let mut reversed = universe;
        reversed.reverse();
        let partial = build(subset(&reversed, &mask)).unwrap();
        assert_topologically_valid(&partial)?;
    }

    #[test]
    fn conflicting_merge_fails_without_mutation(universe in arb_universe(), pick in any::<prop::sample::Index>()) {
        let dag = build(universe.clone()).unwrap();
        let target = &universe[pick.index(universe.len())];
        let mut altered = target.clone();
        if let Some(action) = altered.action.as_mut() {
            action.action_name = "something_else".into();
        }
        let other = build(vec![altered]).unwrap();
        let before = dag.clone();

        match merge(&dag, &other) {
            Err(MergeError::Conflict { id, .. }) => {
                prop_assert_eq!(id, target.id.clone());
            }
            other => {
                prop_assert!(false, "expected conflict, got {:?}", other);
            }
        }
        prop_assert_eq!(dag, before);
    }
}
