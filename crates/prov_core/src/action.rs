//! Decoders from a parsed `action.yaml` into [`ActionRecord`].

use serde_yaml::Value;

use crate::node::{
    ActionRecord, ActionType, ArtifactRef, Environment, InputBinding, MetadataRef, ParamValue,
    Parameter, ProvId, Runtime,
};
use crate::schema::{DecodeInput, SchemaRule};
use crate::yaml_tags::{
    get, get_str, parse_metadata_tag, scalar_str, single_key_entries, to_json, untag, TagKind,
};

/// Revisions without provenance have no action to decode.
pub fn decode_untracked(
    _rule: &SchemaRule,
    _input: &DecodeInput<'_>,
) -> Result<Option<ActionRecord>, String> {
    Ok(None)
}

/// Revisions that record provenance. Where the rule does not require
/// `action.type`, a missing type is inferred from the shape of the record.
pub fn decode_tracked(
    rule: &SchemaRule,
    input: &DecodeInput<'_>,
) -> Result<Option<ActionRecord>, String> {
    let doc = require_doc(input)?;
    let details = get(doc, "action").ok_or("action.yaml has no `action` section")?;
    let action_type = match get_str(details, "type") {
        Some(tag) => parse_action_type(&tag)?,
        None if rule.action_type_required => return Err("action.type is missing".to_string()),
        None => infer_action_type(details, input.semantic_type),
    };
    decode_record(rule, doc, action_type).map(Some)
}

/// `plugin` + `action` present means an action ran; a visualization result
/// came from a visualizer. Anything else was imported.
pub fn infer_action_type(details: &Value, semantic_type: Option<&str>) -> ActionType {
    let ran_action = get_str(details, "plugin").is_some() && get_str(details, "action").is_some();
    match (ran_action, semantic_type) {
        (true, Some("Visualization")) => ActionType::Visualizer,
        (true, _) => ActionType::Method,
        (false, _) => ActionType::Import,
    }
}

fn require_doc<'a>(input: &DecodeInput<'a>) -> Result<&'a Value, String> {
    input
        .action_yaml
        .ok_or_else(|| "action/action.yaml is missing".to_string())
}

fn parse_action_type(tag: &str) -> Result<ActionType, String> {
    ActionType::from_tag(tag).ok_or_else(|| format!("unknown action type `{}`", tag))
}

fn decode_record(
    rule: &SchemaRule,
    doc: &Value,
    action_type: ActionType,
) -> Result<ActionRecord, String> {
    let details = get(doc, "action").ok_or("action.yaml has no `action` section")?;
    let execution = get(doc, "execution");

    let (plugin_name, action_name) = if action_type == ActionType::Import {
        ("framework".to_string(), "import".to_string())
    } else {
        let plugin = get_str(details, "plugin").ok_or("action.plugin is missing")?;
        let action = get_str(details, "action").ok_or("action.action is missing")?;
        (plugin, action)
    };

    let mut inputs = Vec::new();
    if let Some(raw) = get(details, "inputs") {
        for (name, value) in single_key_entries(raw).map_err(|e| format!("inputs: {}", e))? {
            inputs.push(decode_input(rule, name, value)?);
        }
    }

    let mut parameters = Vec::new();
    if let Some(raw) = get(details, "parameters") {
        for (name, value) in single_key_entries(raw).map_err(|e| format!("parameters: {}", e))? {
            parameters.push(decode_parameter(name, value)?);
        }
    }

    let outputs = get_str(details, "output-name").into_iter().collect();

    let alias_of = if rule.alias_of {
        get_str(details, "alias-of").map(ProvId::new)
    } else {
        None
    };

    let (import_format, import_manifest) = if action_type == ActionType::Import {
        (
            get_str(details, "format"),
            get(details, "manifest").map(to_json),
        )
    } else {
        (None, None)
    };

    let transformers = if rule.transformers {
        get(doc, "transformers").map(to_json)
    } else {
        None
    };

    let execution_context = if rule.execution_context {
        execution
            .and_then(|e| get(e, "execution_context"))
            .or_else(|| get(doc, "execution_context"))
            .map(to_json)
    } else {
        None
    };

    let runtime = execution
        .and_then(|e| get(e, "runtime"))
        .map(|rt| Runtime {
            start: get_str(rt, "start"),
            end: get_str(rt, "end"),
            duration: get_str(rt, "duration"),
        })
        .unwrap_or_default();

    let environment = get(doc, "environment")
        .map(|env| Environment {
            framework_version: get(env, "framework").and_then(|fw| get_str(fw, "version")),
            plugin_version: get(env, "plugins")
                .and_then(|plugins| get(plugins, &plugin_name))
                .and_then(|plugin| get_str(plugin, "version")),
        })
        .unwrap_or_default();

    Ok(ActionRecord {
        action_id: execution.and_then(|e| get_str(e, "uuid")),
        action_type,
        plugin_name,
        action_name,
        inputs,
        parameters,
        outputs,
        alias_of,
        import_format,
        import_manifest,
        transformers,
        execution_context,
        runtime,
        environment,
    })
}

fn decode_input(rule: &SchemaRule, name: String, value: &Value) -> Result<InputBinding, String> {
    let (tag, inner) = untag(value);
    let (artifacts, collection) = match (tag, inner) {
        (None, Value::Null) => (Vec::new(), false),
        (Some(TagKind::Set), Value::Sequence(items)) | (None, Value::Sequence(items)) => {
            if !rule.variadic_inputs {
                return Err(format!(
                    "input `{}` is a collection, which archive version {} does not support",
                    name,
                    rule.version.number()
                ));
            }
            let artifacts = items
                .iter()
                .map(|item| artifact_ref(&name, item))
                .collect::<Result<Vec<_>, _>>()?;
            (artifacts, true)
        }
        _ => (vec![artifact_ref(&name, value)?], false),
    };
    Ok(InputBinding {
        name,
        artifacts,
        collection,
    })
}

fn artifact_ref(input: &str, value: &Value) -> Result<ArtifactRef, String> {
    let (tag, inner) = untag(value);
    let id = scalar_str(inner)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| format!("input `{}` does not reference an artifact id", input))?;
    Ok(ArtifactRef {
        id: ProvId::new(id),
        no_provenance: tag == Some(TagKind::NoProvenance),
    })
}

fn decode_parameter(name: String, value: &Value) -> Result<Parameter, String> {
    let value = match untag(value) {
        (Some(TagKind::Metadata), inner) => {
            let raw = scalar_str(inner)
                .ok_or_else(|| format!("parameter `{}` has an empty !metadata tag", name))?;
            let (input_artifact_ids, relative_path) = parse_metadata_tag(&raw);
            ParamValue::Metadata(MetadataRef {
                input_artifact_ids,
                relative_path,
                contents: None,
            })
        }
        _ => ParamValue::Literal(to_json(value)),
    };
    Ok(Parameter { name, value })
}
