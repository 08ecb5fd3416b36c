use prov_core::{parse, ArchiveBuilder, NodeRecord, ProvId};
use prov_dag::{from_parsed, merge, ProvDag};
use prov_replay::{
    collect_with, replay, replay_from_config, to_bibtex, ActionSignature, CitationConfig,
    DirSink, DriverKind, MemorySink, ProvConfig, ReplayAdvisory, ReplayConfig, ReplayContext,
    SignatureTable,
};

const IMPORT_ID: &str = "5b929500-0000-4000-8000-000000000001";
const TABLE_ID: &str = "6c0a3611-0000-4000-8000-000000000002";
const VIZ_ID: &str = "7d1b4722-0000-4000-8000-000000000003";

const BIB: &str = "@article{framework|qiime2:2020.8.0|0,\n doi = {10.1038/s41587-019-0209-9},\n title = {QIIME 2}\n}\n";
const DADA2_BIB: &str = "@article{action|dada2:2020.8.0|method:denoise_single|0,\n doi = {10.1038/nmeth.3869},\n title = {DADA2}\n}\n";

fn import_record() -> NodeRecord {
    NodeRecord::new(IMPORT_ID, "SampleData[SequencesWithQuality]")
        .format("SingleLanePerSampleSingleEndFastqDirFmt")
        .action(
            "execution:\n    uuid: exec-import\naction:\n    type: import\n    format: SingleLanePerSampleSingleEndFastqDirFmt\n",
        )
        .citations(BIB)
}

fn table_record() -> NodeRecord {
    NodeRecord::new(TABLE_ID, "FeatureTable[Frequency]")
        .action(format!(
            "execution:\n    uuid: exec-denoise\naction:\n    type: method\n    plugin: !ref 'environment:plugins:dada2'\n    action: denoise_single\n    inputs:\n    -   demultiplexed_seqs: {}\n    parameters:\n    -   trunc_len: 120\n    -   trim_left: 0\n    output-name: table\n",
            IMPORT_ID
        ))
        .citations(format!("{}{}", BIB, DADA2_BIB))
}

fn viz_record() -> NodeRecord {
    NodeRecord::new(VIZ_ID, "Visualization")
        .action(format!(
            "execution:\n    uuid: exec-summarize\naction:\n    type: visualizer\n    plugin: !ref 'environment:plugins:feature-table'\n    action: summarize\n    inputs:\n    -   table: {}\n    parameters:\n    -   sample_metadata: !metadata 'sample_metadata.tsv'\n    output-name: visualization\n",
            TABLE_ID
        ))
        .action_file("sample_metadata.tsv", "sample-id\tbody-site\nS1\tgut\n")
        .citations(BIB)
}

fn chain_dag() -> ProvDag {
    let archive = ArchiveBuilder::new(viz_record(), 5, "2020.8.0")
        .ancestor(table_record())
        .ancestor(import_record())
        .build();
    from_parsed(&parse(&archive).expect("parse")).expect("build")
}

fn signatures(dada2_params: &[&str]) -> SignatureTable {
    SignatureTable::new()
        .with(
            "dada2",
            "denoise_single",
            ActionSignature::new(dada2_params.iter().copied())
                .with_outputs(["table", "representative_sequences", "denoising_stats"]),
        )
        .with(
            "feature_table",
            "summarize",
            ActionSignature::new(["sample_metadata"]).with_outputs(["visualization"]),
        )
}

fn render(dag: &ProvDag, config: &ReplayConfig, table: &SignatureTable) -> (String, Vec<ReplayAdvisory>) {
    let mut sink = MemorySink::new();
    let report = replay(
        dag,
        ReplayContext {
            config,
            signatures: table,
        },
        &mut sink,
    )
    .expect("replay");
    (report.script, report.advisories)
}

fn position(script: &str, needle: &str) -> usize {
    script
        .find(needle)
        .unwrap_or_else(|| panic!("{:?} missing from script:\n{}", needle, script))
}

#[test]
fn cli_script_imports_once_then_runs_both_actions_in_order() {
    let dag = chain_dag();
    assert_eq!(dag.len(), 3);
    assert_eq!(dag.edge_count(), 2);

    let (script, _) = render(&dag, &ReplayConfig::default(), &signatures(&["trunc_len", "trim_left"]));

    assert!(script.starts_with("#!/usr/bin/env bash\n"));
    assert_eq!(script.matches("qiime tools import").count(), 1);
    assert_eq!(script.matches("\nqiime ").count(), 3);

    let import = position(&script, "qiime tools import");
    let denoise = position(&script, "qiime dada2 denoise-single");
    let summarize = position(&script, "qiime feature-table summarize");
    assert!(import < denoise && denoise < summarize);

    assert!(script.contains("  --output-path sample-data-sequences-with-quality.qza\n"));
    assert!(script.contains("  --input-format SingleLanePerSampleSingleEndFastqDirFmt \\\n"));
    assert!(script.contains("  --i-demultiplexed-seqs sample-data-sequences-with-quality.qza \\\n"));
    assert!(script.contains("  --p-trunc-len 120 \\\n  --p-trim-left 0 \\\n  --o-table table.qza\n"));
    assert!(script.contains("  --i-table table.qza \\\n"));
    assert!(script.contains("  --m-sample-metadata-file sample-metadata.tsv \\\n"));
    assert!(script.contains("  --o-visualization visualization.qzv\n"));
    assert!(script.contains("# metadata, saved at 'recorded_metadata/feature_table_summarize_0/'\n"));
}

#[test]
fn python_script_binds_the_same_chain() {
    let dag = chain_dag();
    let config = ReplayConfig {
        driver: DriverKind::Python3,
        ..ReplayConfig::default()
    };
    let (script, _) = render(&dag, &config, &signatures(&["trunc_len", "trim_left"]));

    assert!(script.starts_with(
        "from qiime2 import Artifact\nfrom qiime2 import Metadata\n\
         import qiime2.plugins.dada2.actions as dada2_actions\n\
         import qiime2.plugins.feature_table.actions as feature_table_actions\n\n"
    ));
    let import = position(&script, "sample_data_sequences_with_quality = Artifact.import_data(");
    let denoise = position(
        &script,
        "table, _, _ = dada2_actions.denoise_single(\n    demultiplexed_seqs=sample_data_sequences_with_quality,\n",
    );
    let summarize = position(
        &script,
        "visualization, = feature_table_actions.summarize(\n    table=table,\n    sample_metadata=sample_metadata_md,\n)\n",
    );
    assert!(import < denoise && denoise < summarize);
    assert!(script.contains("sample_metadata_md = Metadata.load('<your metadata filepath>')\n"));
}

#[test]
fn unresolved_parameter_is_marked_and_nothing_else_changes() {
    let dag = chain_dag();
    let (full, full_advisories) =
        render(&dag, &ReplayConfig::default(), &signatures(&["trunc_len", "trim_left"]));
    let (drifted, advisories) = render(&dag, &ReplayConfig::default(), &signatures(&["trunc_len"]));

    assert!(drifted.contains("  --?-trim-left 0\n") || drifted.contains("  --?-trim-left 0 \\\n"));
    assert!(drifted.contains("# NOTE: dada2 denoise_single does not accept the parameter(s) trim_left"));

    let unresolved: Vec<&ReplayAdvisory> = advisories
        .iter()
        .filter(|a| matches!(a, ReplayAdvisory::UnresolvedParameter { .. }))
        .collect();
    assert_eq!(
        unresolved,
        vec![&ReplayAdvisory::UnresolvedParameter {
            node: ProvId::new(TABLE_ID),
            plugin: "dada2".into(),
            action: "denoise_single".into(),
            parameter: "trim_left".into(),
        }]
    );
    assert_eq!(advisories.len(), full_advisories.len() + 1);

    let restored: String = drifted
        .lines()
        .filter(|line| {
            !(line.starts_with("# NOTE: dada2")
                || line.starts_with("# The plugin version installed")
                || line.starts_with("# analysis. Replace each"))
        })
        .map(|line| format!("{}\n", line.replace("--?-trim-left", "--p-trim-left")))
        .collect();
    assert_eq!(restored, full);
}

#[test]
fn replay_is_byte_for_byte_deterministic() {
    for driver in [DriverKind::Cli, DriverKind::Python3] {
        let config = ReplayConfig {
            driver,
            ..ReplayConfig::default()
        };
        let table = signatures(&["trunc_len"]);
        let first = render(&chain_dag(), &config, &table);
        let second = render(&chain_dag(), &config, &table);
        assert_eq!(first, second);
    }
}

#[test]
fn recorded_metadata_lands_in_a_directory_sink() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sink = DirSink::new(dir.path());
    let report = replay(
        &chain_dag(),
        ReplayContext {
            config: &ReplayConfig::default(),
            signatures: &signatures(&["trunc_len", "trim_left"]),
        },
        &mut sink,
    )
    .expect("replay");

    let written = dir
        .path()
        .join("recorded_metadata")
        .join("feature_table_summarize_0")
        .join("sample_metadata.tsv");
    assert_eq!(
        std::fs::read_to_string(&written).expect("snapshot written"),
        "sample-id\tbody-site\nS1\tgut\n"
    );
    assert!(report.advisories.contains(&ReplayAdvisory::RecordedMetadata {
        node: ProvId::new(VIZ_ID),
        parameter: "sample_metadata".into(),
        location: Some("recorded_metadata/feature_table_summarize_0/sample_metadata.tsv".into()),
    }));
}

#[test]
fn toml_config_drives_driver_and_metadata_reuse() {
    let config = ProvConfig::from_toml_str(
        "[replay]\ndriver = \"python3\"\nuse_recorded_metadata = true\nmetadata_dir = \"snapshots\"\n",
    )
    .expect("config");
    let mut sink = MemorySink::new();
    let report = replay_from_config(
        &chain_dag(),
        &config,
        &SignatureTable::from_recorded(&chain_dag()),
        &mut sink,
    )
    .expect("replay");

    assert!(report.script.contains(
        "sample_metadata_md = Metadata.load('snapshots/feature_table_summarize_0/sample_metadata.tsv')\n"
    ));
    assert!(!report.script.contains("<your metadata filepath>"));
    assert_eq!(sink.for_node(&ProvId::new(VIZ_ID)).len(), 1);
}

#[test]
fn input_from_another_archive_is_a_placeholder_until_merged() {
    let lone = ArchiveBuilder::new(viz_record(), 5, "2020.8.0").build();
    let viz_only = from_parsed(&parse(&lone).expect("parse")).expect("build");
    let table = signatures(&["trunc_len", "trim_left"]);

    let (script, advisories) = render(&viz_only, &ReplayConfig::default(), &table);
    assert!(script.contains("  --i-table missing-6c0a3611.qza \\\n"));
    assert!(advisories.contains(&ReplayAdvisory::MissingInput {
        node: ProvId::new(VIZ_ID),
        input: ProvId::new(TABLE_ID),
    }));

    let merged = merge(&viz_only, &chain_dag()).expect("merge");
    let (script, advisories) = render(&merged, &ReplayConfig::default(), &table);
    assert!(script.contains("  --i-table table.qza \\\n"));
    assert!(!advisories
        .iter()
        .any(|a| matches!(a, ReplayAdvisory::MissingInput { .. })));
}

#[test]
fn citations_cover_the_whole_chain() {
    let dag = chain_dag();
    let records = collect_with(&dag, &CitationConfig::default());
    let keys: Vec<&str> = records.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "framework|qiime2:2020.8.0|0",
            "action|dada2:2020.8.0|method:denoise_single|0",
        ]
    );
    assert_eq!(records[0].contributing_node_ids.len(), 3);

    let bib = to_bibtex(&records);
    assert!(bib.contains("@article{action|dada2:2020.8.0|method:denoise_single|0,"));
    assert!(bib.ends_with("}\n"));
}
