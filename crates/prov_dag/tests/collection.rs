use std::collections::BTreeSet;

use prov_core::{
    parse, ArchiveBuilder, ChecksumStatus, MemoryArchive, NodeRecord, NodeType, ParseConfig,
    ParseError, ProvId,
};
use prov_dag::{from_parsed, load_archives, merge, merge_all, ArchiveFailure, BuildError, MergeError};

const SEQS: &str = "0f1e2d3c-0000-4000-8000-00000000000a";
const TABLE: &str = "0f1e2d3c-0000-4000-8000-00000000000b";
const VIZ: &str = "0f1e2d3c-0000-4000-8000-00000000000c";
const LOOP_A: &str = "0f1e2d3c-0000-4000-8000-0000000000a1";
const LOOP_B: &str = "0f1e2d3c-0000-4000-8000-0000000000b2";

fn import_node(format: &str) -> NodeRecord {
    NodeRecord::new(SEQS, "SampleData[SequencesWithQuality]").action(format!(
        "execution:\n    uuid: exec-import\naction:\n    type: import\n    format: {}\n",
        format
    ))
}

fn table_node() -> NodeRecord {
    NodeRecord::new(TABLE, "FeatureTable[Frequency]").action(format!(
        "execution:\n    uuid: exec-denoise\naction:\n    type: method\n    plugin: !ref 'environment:plugins:dada2'\n    action: denoise_single\n    inputs:\n    -   demultiplexed_seqs: {}\n    parameters:\n    -   trunc_len: 150\n    output-name: table\n",
        SEQS
    ))
}

fn viz_node() -> NodeRecord {
    NodeRecord::new(VIZ, "Visualization").action(format!(
        "execution:\n    uuid: exec-summarize\naction:\n    type: visualizer\n    plugin: !ref 'environment:plugins:feature-table'\n    action: summarize\n    inputs:\n    -   table: {}\n    output-name: visualization\n",
        TABLE
    ))
}

fn table_archive() -> MemoryArchive {
    ArchiveBuilder::new(table_node(), 5, "2020.8.0")
        .ancestor(import_node("SingleLanePerSampleSingleEndFastqDirFmt"))
        .build()
}

fn viz_archive() -> MemoryArchive {
    ArchiveBuilder::new(viz_node(), 5, "2020.8.0")
        .ancestor(table_node())
        .ancestor(import_node("SingleLanePerSampleSingleEndFastqDirFmt"))
        .build()
}

fn id(s: &str) -> ProvId {
    ProvId::new(s)
}

#[test]
fn chain_builds_three_nodes_two_edges() {
    let dag = from_parsed(&parse(&viz_archive()).expect("parse")).expect("build");
    assert_eq!(dag.len(), 3);
    assert_eq!(dag.edge_count(), 2);
    assert!(dag.has_edge(&id(VIZ), &id(TABLE)));
    assert!(dag.has_edge(&id(TABLE), &id(SEQS)));
    assert_eq!(dag.topological_order(), vec![id(SEQS), id(TABLE), id(VIZ)]);
    assert_eq!(dag.terminals(), vec![id(VIZ)]);
    assert_eq!(dag.roots(), vec![id(VIZ)]);
    assert!(dag.dangling().is_empty());
}

#[test]
fn overlapping_archives_merge_into_one_history() {
    let table = from_parsed(&parse(&table_archive()).unwrap()).unwrap();
    let viz = from_parsed(&parse(&viz_archive()).unwrap()).unwrap();

    let merged = merge(&table, &viz).expect("compatible archives merge");
    assert_eq!(merged.len(), 3);
    assert_eq!(merged.edge_count(), 2);
    assert_eq!(merged.get(&id(TABLE)).unwrap().node_type, NodeType::Root);
    assert_eq!(merged, merge(&viz, &table).unwrap());
    assert_eq!(merged, merge_all([&table, &viz, &table]).unwrap());
}

#[test]
fn disagreeing_archives_conflict_on_the_shared_id() {
    let left = from_parsed(&parse(&table_archive()).unwrap()).unwrap();
    let other = ArchiveBuilder::new(table_node(), 5, "2020.8.0")
        .ancestor(import_node("CasavaOneEightSingleLanePerSampleDirFmt"))
        .build();
    let right = from_parsed(&parse(&other).unwrap()).unwrap();

    match merge(&left, &right) {
        Err(MergeError::Conflict { id: conflict, .. }) => assert_eq!(conflict, id(SEQS)),
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[test]
fn subgraph_limits_scope_to_requested_results() {
    let viz = from_parsed(&parse(&viz_archive()).unwrap()).unwrap();
    let terminals: BTreeSet<ProvId> = [id(TABLE)].into_iter().collect();
    let sub = viz.select_subgraph(&terminals);
    assert_eq!(sub.len(), 2);
    assert!(!sub.contains(&id(VIZ)));
    assert_eq!(sub.edge_count(), 1);
}

#[test]
fn corrupted_member_only_flags_its_node() {
    let mut archive = viz_archive();
    archive.insert(
        format!("{}/provenance/artifacts/{}/metadata.yaml", VIZ, SEQS),
        format!("uuid: {}\ntype: SampleData[SequencesWithQuality]\nformat: null\n# edited\n", SEQS),
    );
    let dag = from_parsed(&parse(&archive).unwrap()).unwrap();
    assert_eq!(dag.len(), 3);
    let statuses = dag.checksum_statuses();
    assert_eq!(statuses[&id(SEQS)], ChecksumStatus::Mismatch);
    assert_eq!(statuses[&id(TABLE)], ChecksumStatus::Valid);
    assert_eq!(statuses[&id(VIZ)], ChecksumStatus::Valid);
}

#[test]
fn batch_load_keeps_going_past_broken_archives() {
    let archives = vec![
        table_archive(),
        MemoryArchive::new("broken.qza").with_entry("x/VERSION", "not a version"),
        viz_archive(),
    ];
    let report = load_archives(&archives, &ParseConfig::default().with_workers(2)).expect("load");
    assert_eq!(report.dag.len(), 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "broken.qza");
    assert!(matches!(
        report.failures[0].1,
        ArchiveFailure::Parse(ParseError::MalformedVersion { .. })
    ));
}

#[test]
fn dangling_inputs_resolve_after_merge() {
    let lone_viz = ArchiveBuilder::new(viz_node(), 5, "2020.8.0").build();
    let viz_only = from_parsed(&parse(&lone_viz).unwrap()).unwrap();
    assert_eq!(viz_only.dangling().len(), 1);
    assert_eq!(viz_only.dangling()[0].missing, id(TABLE));

    let table = from_parsed(&parse(&table_archive()).unwrap()).unwrap();
    let merged = merge(&viz_only, &table).unwrap();
    assert!(merged.dangling().is_empty());
    assert!(merged.has_edge(&id(VIZ), &id(TABLE)));
}

fn looped_node(id: &str, input: &str) -> NodeRecord {
    NodeRecord::new(id, "FeatureTable[Frequency]").action(format!(
        "execution:\n    uuid: exec-{}\naction:\n    type: method\n    plugin: !ref 'environment:plugins:feature-table'\n    action: filter_samples\n    inputs:\n    -   table: {}\n    output-name: filtered_table\n",
        id, input
    ))
}

#[test]
fn cyclic_archive_is_reported_without_losing_its_siblings() {
    let cyclic = ArchiveBuilder::new(looped_node(LOOP_A, LOOP_B), 5, "2020.8.0")
        .label("cyclic.qza")
        .ancestor(looped_node(LOOP_B, LOOP_A))
        .build();
    assert!(parse(&cyclic).is_ok());

    let archives = vec![table_archive(), cyclic, viz_archive()];
    let report = load_archives(&archives, &ParseConfig::default()).expect("load");

    assert_eq!(report.dag.len(), 3);
    assert!(report.dag.contains(&id(VIZ)));
    assert!(!report.dag.contains(&id(LOOP_A)));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "cyclic.qza");
    assert!(matches!(
        report.failures[0].1,
        ArchiveFailure::Build(BuildError::Cycle { .. })
    ));
}
