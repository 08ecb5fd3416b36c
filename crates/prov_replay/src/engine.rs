//! Replay: turn a provenance graph into a script that reruns it.
//!
//! The walk is driver-agnostic. Every step becomes a [`UsageAction`] handed
//! to a [`UsageDriver`]; the driver alone decides what the script looks like.

use std::collections::{BTreeMap, BTreeSet};

use prov_core::{ActionRecord, ArtifactRef, MetadataRef, ParamValue, ProvId, ProvNode};
use prov_dag::{ancestors, ProvDag, ProvEdge};

use crate::config::{ProvConfig, ReplayConfig};
use crate::drivers::driver_for;
use crate::error::{ReplayAdvisory, ReplayError};
use crate::namespace::{kebab_case, VariableNamespace};
use crate::signature::{normalize_id, ActionSignature, ActionSignatureLookup};
use crate::sink::RecordedMetadataSink;
use crate::usage::{
    dispatch, ArtifactView, MetadataFileRef, UsageAction, UsageDriver, UsageInput, UsageOutput,
    UsageParameter, UsageValue,
};

const NO_PROVENANCE_CONTEXT: &str = "One or more nodes have no provenance, so full replay is impossible. Any\n\
commands we were able to reconstruct have been rendered, with the string\n\
descriptions below replacing actual inputs.";
const NO_PROVENANCE_HEADER: &str = "Original Node ID                       String Description";
const METADATA_CONTEXT: &str = "Replay attempts to represent metadata inputs accurately, but metadata .tsv\n\
files are merged automatically by some interfaces, rendering distinctions\n\
between file inputs invisible in provenance. We output the recorded metadata\n\
to disk to enable visual inspection.";
const COLUMN_PLACEHOLDER: &str = "<column_name>";

/// Read-only collaborators of one replay.
#[derive(Clone, Copy)]
pub struct ReplayContext<'a> {
    pub config: &'a ReplayConfig,
    pub signatures: &'a dyn ActionSignatureLookup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    pub script: String,
    pub advisories: Vec<ReplayAdvisory>,
}

/// Render `dag` with the driver named in the configuration.
pub fn replay(
    dag: &ProvDag,
    context: ReplayContext<'_>,
    sink: &mut dyn RecordedMetadataSink,
) -> Result<ReplayReport, ReplayError> {
    let mut driver = driver_for(context.config.driver);
    replay_with(dag, driver.as_mut(), context, sink)
}

/// Validate `config`, then render `dag` with its replay settings.
pub fn replay_from_config(
    dag: &ProvDag,
    config: &ProvConfig,
    signatures: &dyn ActionSignatureLookup,
    sink: &mut dyn RecordedMetadataSink,
) -> Result<ReplayReport, ReplayError> {
    config.validate()?;
    replay(
        dag,
        ReplayContext {
            config: &config.replay,
            signatures,
        },
        sink,
    )
}

/// Render `dag` through a caller-supplied driver.
pub fn replay_with(
    dag: &ProvDag,
    driver: &mut dyn UsageDriver,
    context: ReplayContext<'_>,
    sink: &mut dyn RecordedMetadataSink,
) -> Result<ReplayReport, ReplayError> {
    let scope = replay_scope(dag, context.config.collapse_pipelines);
    let mut pass = ReplayPass {
        context,
        scope: &scope,
        namespace: VariableNamespace::new(),
        invocations: BTreeMap::new(),
        metadata_noted: false,
        advisories: Vec::new(),
    };
    pass.run(driver, sink)?;
    let script = driver.finalize();
    tracing::debug!(
        nodes = scope.len(),
        advisories = pass.advisories.len(),
        "rendered replay script"
    );
    Ok(ReplayReport {
        script,
        advisories: pass.advisories,
    })
}

/// Nodes worth rendering. With pipelines collapsed, steps reachable from
/// the terminal results only through alias edges are left out.
pub fn replay_scope(dag: &ProvDag, collapse_pipelines: bool) -> ProvDag {
    if !collapse_pipelines {
        return dag.clone();
    }
    let terminals: BTreeSet<ProvId> = dag.terminals().into_iter().collect();
    let keep = ancestors(dag, &terminals, ProvEdge::is_data);
    dag.restrict(&keep)
}

/// Nodes of one action execution, in topological order.
struct ActionGroup {
    members: Vec<ProvId>,
}

/// Split the topological order into nodes without a recorded action and
/// groups of nodes sharing an execution id.
fn group_by_action(scope: &ProvDag, order: &[ProvId]) -> (Vec<ProvId>, Vec<ActionGroup>) {
    let mut without = Vec::new();
    let mut groups: Vec<ActionGroup> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();
    for id in order {
        let Some(node) = scope.get(id) else { continue };
        let Some(action) = node.action.as_ref().filter(|_| node.has_provenance()) else {
            without.push(id.clone());
            continue;
        };
        let key = match (&action.action_id, action.is_import()) {
            (Some(exec), false) => exec.clone(),
            _ => format!("node:{}", id),
        };
        match index.get(&key) {
            Some(&i) => groups[i].members.push(id.clone()),
            None => {
                index.insert(key, groups.len());
                groups.push(ActionGroup {
                    members: vec![id.clone()],
                });
            }
        }
    }
    (without, groups)
}

fn no_provenance_placeholder(id: &ProvId) -> String {
    format!("no-provenance-{}", id.short())
}

fn missing_placeholder(id: &ProvId) -> String {
    format!("missing-{}", id.short())
}

/// Recorded output name, or the semantic type when none was recorded.
fn output_name(node: &ProvNode, action: &ActionRecord) -> String {
    match action.outputs.first() {
        Some(name) => name.clone(),
        None => kebab_case(node.semantic_type.as_deref().unwrap_or("output")).replace('-', "_"),
    }
}

struct ReplayPass<'a> {
    context: ReplayContext<'a>,
    scope: &'a ProvDag,
    namespace: VariableNamespace,
    /// Per plugin/action counter for invocation directory names.
    invocations: BTreeMap<String, usize>,
    metadata_noted: bool,
    advisories: Vec<ReplayAdvisory>,
}

impl ReplayPass<'_> {
    fn advise(&mut self, advisory: ReplayAdvisory) {
        tracing::warn!("{}", advisory);
        self.advisories.push(advisory);
    }

    fn run(
        &mut self,
        driver: &mut dyn UsageDriver,
        sink: &mut dyn RecordedMetadataSink,
    ) -> Result<(), ReplayError> {
        let scope = self.scope;
        let order = scope.topological_order();
        let (without, groups) = group_by_action(scope, &order);

        if !without.is_empty() {
            dispatch(driver, &UsageAction::comment(NO_PROVENANCE_CONTEXT));
            dispatch(driver, &UsageAction::comment(NO_PROVENANCE_HEADER));
            for id in &without {
                let line = format!("{}   {}", id, no_provenance_placeholder(id));
                dispatch(driver, &UsageAction::comment(line));
            }
        }

        for group in &groups {
            let Some(first) = group.members.first().and_then(|id| scope.get(id)) else {
                continue;
            };
            let Some(action) = first.action.as_ref() else { continue };
            if action.is_import() {
                for id in &group.members {
                    if let Some(node) = scope.get(id) {
                        let usage = self.import_usage(node, action);
                        dispatch(driver, &usage);
                    }
                }
            } else {
                let (notes, usage) = self.action_usage(first, action, &group.members, sink)?;
                for note in &notes {
                    dispatch(driver, &UsageAction::comment(note.as_str()));
                }
                dispatch(driver, &usage);
            }
        }
        Ok(())
    }

    fn import_usage(&mut self, node: &ProvNode, action: &ActionRecord) -> UsageAction {
        let semantic_type = node.semantic_type.clone().unwrap_or_default();
        let base = if semantic_type.is_empty() { "imported-data" } else { semantic_type.as_str() };
        let variable = self.namespace.bind(&node.id, base);
        UsageAction::import(
            node.id.clone(),
            semantic_type.clone(),
            action.import_format.clone(),
            variable,
        )
    }

    fn invocation_name(&mut self, action: &ActionRecord) -> String {
        let base = format!(
            "{}_{}",
            normalize_id(&action.plugin_name),
            normalize_id(&action.action_name)
        );
        let counter = self.invocations.entry(base.clone()).or_insert(0);
        let name = format!("{}_{}", base, counter);
        *counter += 1;
        name
    }

    /// Script variable for an input artifact, or a visible placeholder when
    /// the artifact was never rendered.
    fn input_variable(&mut self, consumer: &ProvId, input: &ArtifactRef) -> String {
        if let Some(name) = self.namespace.get(&input.id) {
            return name.to_string();
        }
        let without_history = match self.scope.get(&input.id) {
            Some(node) => !node.has_provenance() || node.action.is_none(),
            None => input.no_provenance,
        };
        if without_history {
            self.advise(ReplayAdvisory::NoProvenanceInput {
                node: consumer.clone(),
                input: input.id.clone(),
            });
            no_provenance_placeholder(&input.id)
        } else {
            self.advise(ReplayAdvisory::MissingInput {
                node: consumer.clone(),
                input: input.id.clone(),
            });
            missing_placeholder(&input.id)
        }
    }

    fn outputs(
        &mut self,
        action: &ActionRecord,
        members: &[ProvId],
        signature: Option<&ActionSignature>,
    ) -> Vec<UsageOutput> {
        let mut recorded = Vec::new();
        for id in members {
            let Some(node) = self.scope.get(id) else { continue };
            let name = node
                .action
                .as_ref()
                .map(|a| output_name(node, a))
                .unwrap_or_else(|| output_name(node, action));
            let variable = self.namespace.bind(id, &name);
            recorded.push(UsageOutput {
                name,
                variable: Some(variable),
                visualization: node.is_visualization(),
            });
        }

        let Some(declared) = signature.map(|s| &s.outputs).filter(|o| !o.is_empty()) else {
            return recorded;
        };
        let mut ordered: Vec<UsageOutput> = declared
            .iter()
            .map(|name| {
                recorded
                    .iter()
                    .find(|o| &o.name == name)
                    .cloned()
                    .unwrap_or_else(|| UsageOutput {
                        name: name.clone(),
                        variable: None,
                        visualization: false,
                    })
            })
            .collect();
        for output in recorded {
            if !declared.contains(&output.name) {
                ordered.push(output);
            }
        }
        ordered
    }

    fn metadata_value(
        &mut self,
        node: &ProvNode,
        name: &str,
        metadata: &MetadataRef,
        source: Option<String>,
        column: bool,
    ) -> UsageValue {
        let column = column.then(|| COLUMN_PLACEHOLDER.to_string());
        if metadata.input_artifact_ids.is_empty() {
            return UsageValue::MetadataFile {
                variable: self.namespace.claim(name),
                source,
                column,
            };
        }
        let mut views = Vec::new();
        for id in &metadata.input_artifact_ids {
            let artifact = self.input_variable(
                &node.id,
                &ArtifactRef {
                    id: id.clone(),
                    no_provenance: false,
                },
            );
            let view = self.namespace.claim(&format!("{}-md", artifact));
            views.push(ArtifactView { artifact, view });
        }
        let merged = (views.len() > 1).then(|| self.namespace.claim("merged-artifacts"));
        UsageValue::ArtifactMetadata {
            views,
            merged,
            column,
        }
    }

    fn action_usage(
        &mut self,
        node: &ProvNode,
        action: &ActionRecord,
        members: &[ProvId],
        sink: &mut dyn RecordedMetadataSink,
    ) -> Result<(Vec<String>, UsageAction), ReplayError> {
        let config = self.context.config;
        let signature = self
            .context
            .signatures
            .lookup(&action.plugin_name, &action.action_name);
        let mut notes = Vec::new();
        if signature.is_none() {
            self.advise(ReplayAdvisory::UnknownAction {
                node: node.id.clone(),
                plugin: action.plugin_name.clone(),
                action: action.action_name.clone(),
            });
            notes.push(format!(
                "WARNING: {} {} is not registered in the current environment.\n\
                 Its parameters are rendered exactly as recorded.",
                action.plugin_name, action.action_name
            ));
        }

        let invocation = self.invocation_name(action);
        let mut usage = UsageAction::action(
            node.id.clone(),
            action.plugin_name.clone(),
            action.action_name.clone(),
        );

        for binding in &action.inputs {
            if binding.artifacts.is_empty() {
                continue;
            }
            let variables = binding
                .artifacts
                .iter()
                .map(|artifact| self.input_variable(&node.id, artifact))
                .collect();
            usage.inputs.push(UsageInput {
                name: binding.name.clone(),
                variables,
                collection: binding.collection,
            });
        }

        usage.outputs = self.outputs(action, members, signature.as_ref());

        let mut metadata_dir_noted = false;
        for param in &action.parameters {
            let resolved = signature.as_ref().map_or(true, |s| s.accepts(&param.name));
            let value = match &param.value {
                ParamValue::Literal(value) => UsageValue::Literal(value.clone()),
                ParamValue::Metadata(metadata) => {
                    let location = format!(
                        "{}/{}/{}.tsv",
                        config.metadata_dir.trim_end_matches('/'),
                        invocation,
                        param.name
                    );
                    let deposited = match &metadata.contents {
                        Some(contents) => {
                            sink.deposit(&node.id, &location, contents)?;
                            usage.metadata_file_refs.push(MetadataFileRef {
                                parameter: param.name.clone(),
                                location: location.clone(),
                            });
                            true
                        }
                        None => false,
                    };
                    self.advise(ReplayAdvisory::RecordedMetadata {
                        node: node.id.clone(),
                        parameter: param.name.clone(),
                        location: deposited.then(|| location.clone()),
                    });

                    if !config.use_recorded_metadata && deposited {
                        if !self.metadata_noted {
                            self.metadata_noted = true;
                            notes.push(METADATA_CONTEXT.to_string());
                        }
                        if !metadata_dir_noted {
                            metadata_dir_noted = true;
                            notes.push(format!(
                                "The following command may have received additional metadata .tsv files.\n\
                                 To confirm you have covered your metadata needs adequately, review the original\n\
                                 metadata, saved at '{}/{}/'",
                                config.metadata_dir.trim_end_matches('/'),
                                invocation
                            ));
                        }
                    }

                    let source = (config.use_recorded_metadata && deposited).then_some(location);
                    let column = signature
                        .as_ref()
                        .is_some_and(|s| s.is_metadata_column(&param.name));
                    self.metadata_value(node, &param.name, metadata, source, column)
                }
            };
            let parameter = UsageParameter {
                name: param.name.clone(),
                value,
            };
            if resolved {
                usage.resolved_parameters.push(parameter);
            } else {
                self.advise(ReplayAdvisory::UnresolvedParameter {
                    node: node.id.clone(),
                    plugin: action.plugin_name.clone(),
                    action: action.action_name.clone(),
                    parameter: param.name.clone(),
                });
                usage.unresolved_parameters.push(parameter);
            }
        }

        Ok((notes, usage))
    }
}
