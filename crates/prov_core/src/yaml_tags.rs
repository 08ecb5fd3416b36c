//! Decoding of the custom tags that appear in `action.yaml`.
//!
//! `serde_yaml` hands tagged nodes back as [`Value::Tagged`]; nothing here
//! registers constructors, the tags are interpreted where they are read.

use serde_json::Value as Json;
use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::Value;

use crate::node::ProvId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `!ref 'environment:plugins:<name>'`
    Ref,
    /// `!cite '<key>'`
    Cite,
    /// `!metadata '[uuid[,uuid]*:]file.tsv'`
    Metadata,
    /// `!no-provenance '<uuid>'`
    NoProvenance,
    /// `!set [...]`
    Set,
    /// `!color '#rrggbb'`
    Color,
    Unknown,
}

impl TagKind {
    pub fn of(tag: &Tag) -> Self {
        match tag_name(tag).as_str() {
            "ref" => TagKind::Ref,
            "cite" => TagKind::Cite,
            "metadata" => TagKind::Metadata,
            "no-provenance" => TagKind::NoProvenance,
            "set" => TagKind::Set,
            "color" => TagKind::Color,
            _ => TagKind::Unknown,
        }
    }
}

/// Tag text without the leading `!`.
pub fn tag_name(tag: &Tag) -> String {
    tag.to_string().trim_start_matches('!').to_string()
}

/// Split a tagged value into its kind and inner value. Untagged values pass
/// through with `None`.
pub fn untag(value: &Value) -> (Option<TagKind>, &Value) {
    match value {
        Value::Tagged(tagged) => {
            let TaggedValue { tag, value } = tagged.as_ref();
            (Some(TagKind::of(tag)), value)
        }
        other => (None, other),
    }
}

/// Scalar rendered as text; `None` for null, sequences and mappings.
pub fn scalar_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_str(&tagged.value),
        _ => None,
    }
}

/// Resolve a `!ref`. Plugin references collapse to the plugin name, any
/// other reference is returned as its colon-joined path.
pub fn resolve_ref(raw: &str) -> String {
    let keys: Vec<&str> = raw.split(':').collect();
    match keys.as_slice() {
        ["environment", "plugins", name, ..] => name.to_string(),
        _ => raw.to_string(),
    }
}

/// Decode the body of a `!metadata` tag into the artifact ids passed as
/// metadata and the file name of the recorded snapshot.
pub fn parse_metadata_tag(raw: &str) -> (Vec<ProvId>, String) {
    match raw.rsplit_once(':') {
        Some((ids, path)) => {
            let ids = ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(ProvId::new)
                .collect();
            (ids, path.to_string())
        }
        None => (Vec::new(), raw.to_string()),
    }
}

/// Convert a YAML value to JSON for literal parameter storage. Tags decode to
/// their meaning where one exists and to the inner value otherwise.
pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Json::from(i)
            } else if let Some(u) = n.as_u64() {
                Json::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Json::Number)
                    .unwrap_or_else(|| Json::String(n.to_string()))
            }
        }
        Value::String(s) => Json::String(s.clone()),
        Value::Sequence(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Mapping(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let key = scalar_str(k).unwrap_or_else(|| format!("{:?}", k));
                out.insert(key, to_json(v));
            }
            Json::Object(out)
        }
        Value::Tagged(tagged) => match TagKind::of(&tagged.tag) {
            TagKind::Ref => scalar_str(&tagged.value)
                .map(|raw| Json::String(resolve_ref(&raw)))
                .unwrap_or(Json::Null),
            _ => to_json(&tagged.value),
        },
    }
}

/// Look up `key` in a mapping value.
pub fn get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Mapping(map) => map.get(key),
        Value::Tagged(tagged) => get(&tagged.value, key),
        _ => None,
    }
}

/// String field, resolving `!ref` and friends.
pub fn get_str(value: &Value, key: &str) -> Option<String> {
    let field = get(value, key)?;
    match untag(field) {
        (Some(TagKind::Ref), inner) => scalar_str(inner).map(|raw| resolve_ref(&raw)),
        (_, inner) => scalar_str(inner),
    }
}

/// Entries of a list of single-key mappings (`- name: value`), the shape
/// used for inputs and parameters.
pub fn single_key_entries(value: &Value) -> Result<Vec<(String, &Value)>, String> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Sequence(items) => items,
        _ => return Err("expected a list of single-key mappings".to_string()),
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Value::Mapping(map) = item else {
            return Err("list entry is not a mapping".to_string());
        };
        let mut iter = map.iter();
        match (iter.next(), iter.next()) {
            (Some((k, v)), None) => {
                let name = scalar_str(k).ok_or_else(|| "non-scalar entry name".to_string())?;
                out.push((name, v));
            }
            _ => return Err("list entry must have exactly one key".to_string()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn ref_collapses_plugin_path() {
        assert_eq!(resolve_ref("environment:plugins:feature-table"), "feature-table");
        assert_eq!(resolve_ref("environment:framework:version"), "environment:framework:version");

        let doc = yaml("plugin: !ref 'environment:plugins:diversity'\n");
        assert_eq!(get_str(&doc, "plugin").as_deref(), Some("diversity"));
    }

    #[test]
    fn metadata_tag_variants() {
        assert_eq!(
            parse_metadata_tag("sample_metadata.tsv"),
            (vec![], "sample_metadata.tsv".to_string())
        );
        assert_eq!(
            parse_metadata_tag("415409a4:feature_metadata.tsv"),
            (vec![ProvId::new("415409a4")], "feature_metadata.tsv".to_string())
        );
        let (ids, path) = parse_metadata_tag("a,b,c:merged.tsv");
        assert_eq!(ids, vec![ProvId::new("a"), ProvId::new("b"), ProvId::new("c")]);
        assert_eq!(path, "merged.tsv");
    }

    #[test]
    fn tags_are_classified() {
        let doc = yaml(
            "- a: !no-provenance 'x'\n- b: !set [1, 2]\n- c: !color '#ffffff'\n- d: !cite 'key'\n- e: !weird 3\n",
        );
        let entries = single_key_entries(&doc).unwrap();
        let kinds: Vec<_> = entries.iter().map(|(_, v)| untag(v).0).collect();
        assert_eq!(
            kinds,
            vec![
                Some(TagKind::NoProvenance),
                Some(TagKind::Set),
                Some(TagKind::Color),
                Some(TagKind::Cite),
                Some(TagKind::Unknown),
            ]
        );
        assert_eq!(to_json(entries[1].1), serde_json::json!([1, 2]));
        assert_eq!(to_json(entries[2].1), serde_json::json!("#ffffff"));
        assert_eq!(to_json(entries[4].1), serde_json::json!(3));
    }

    #[test]
    fn single_key_entries_rejects_wide_mappings() {
        let doc = yaml("- a: 1\n  b: 2\n");
        assert!(single_key_entries(&doc).is_err());
        assert!(single_key_entries(&Value::Null).unwrap().is_empty());
    }
}
