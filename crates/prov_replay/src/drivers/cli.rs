//! Shell script of `qiime` command-line calls.

use serde_json::Value;

use crate::usage::{comment_lines, UsageAction, UsageDriver, UsageParameter, UsageValue};

const INDENT: &str = "  ";

#[derive(Debug, Clone, Default)]
pub struct CliDriver {
    lines: Vec<String>,
}

impl CliDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_command(&mut self, head: String, options: Vec<String>) {
        let mut parts = vec![head];
        parts.extend(options.into_iter().map(|o| format!("{}{}", INDENT, o)));
        let last = parts.len() - 1;
        for (i, part) in parts.into_iter().enumerate() {
            if i == last {
                self.lines.push(part);
            } else {
                self.lines.push(format!("{} \\", part));
            }
        }
        self.lines.push(String::new());
    }
}

fn cli_name(name: &str) -> String {
    name.replace('_', "-")
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c)
}

pub(crate) fn shell_quote(s: &str) -> String {
    if !s.is_empty() && s.chars().all(is_shell_safe) {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => shell_quote(s),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        Value::Number(n) => n.to_string(),
        other => shell_quote(&other.to_string()),
    }
}

fn tsv_file(variable: &str) -> String {
    format!("{}.tsv", variable)
}

/// Options for one parameter. Unresolved ones use the `--?-` prefix.
fn parameter_options(param: &UsageParameter, resolved: bool) -> Vec<String> {
    let name = cli_name(&param.name);
    let (p, m) = if resolved {
        (format!("--p-{}", name), format!("--m-{}", name))
    } else {
        (format!("--?-{}", name), format!("--?-{}", name))
    };
    match &param.value {
        UsageValue::Literal(Value::Null) if resolved => Vec::new(),
        UsageValue::Literal(Value::Bool(flag)) if resolved => {
            if *flag {
                vec![p]
            } else {
                vec![format!("--p-no-{}", name)]
            }
        }
        UsageValue::Literal(Value::Array(items)) => {
            let rendered: Vec<String> = items.iter().map(scalar).collect();
            vec![format!("{} {}", p, rendered.join(" "))]
        }
        UsageValue::Literal(value) => vec![format!("{} {}", p, scalar(value))],
        UsageValue::MetadataFile {
            variable,
            source,
            column,
        } => {
            let file = source.clone().unwrap_or_else(|| tsv_file(variable));
            metadata_options(&m, resolved, vec![file], column.as_deref())
        }
        UsageValue::ArtifactMetadata { views, column, .. } => {
            let files = views.iter().map(|v| format!("{}.qza", v.artifact)).collect();
            metadata_options(&m, resolved, files, column.as_deref())
        }
    }
}

fn metadata_options(prefix: &str, resolved: bool, files: Vec<String>, column: Option<&str>) -> Vec<String> {
    let mut out = Vec::new();
    if resolved {
        out.push(format!("{}-file {}", prefix, files.join(" ")));
        if let Some(column) = column {
            out.push(format!("{}-column {}", prefix, shell_quote(column)));
        }
    } else {
        out.push(format!("{} {}", prefix, files.join(" ")));
    }
    out
}

impl UsageDriver for CliDriver {
    fn render_import(&mut self, usage: &UsageAction) {
        let mut options = vec![format!(
            "--type {}",
            shell_quote(usage.semantic_type.as_deref().unwrap_or_default())
        )];
        if let Some(format) = &usage.import_format {
            options.push(format!("--input-format {}", format));
        }
        options.push("--input-path <your data here>".to_string());
        if let Some(variable) = usage.primary_variable() {
            options.push(format!("--output-path {}.qza", variable));
        }
        self.push_command("qiime tools import".to_string(), options);
    }

    fn render_action(&mut self, usage: &UsageAction) {
        let unresolved = usage.unresolved_parameter_names();
        if !unresolved.is_empty() {
            let note = format!(
                "NOTE: {} {} does not accept the parameter(s) {} in the current environment.\n\
                 The plugin version installed may differ from the one used in the original\n\
                 analysis. Replace each --?- option below with a valid one before running.",
                usage.plugin,
                usage.action,
                unresolved.join(", ")
            );
            self.lines.extend(comment_lines(&note));
        }

        let mut options = Vec::new();
        for input in &usage.inputs {
            let files: Vec<String> = input.variables.iter().map(|v| format!("{}.qza", v)).collect();
            options.push(format!("--i-{} {}", cli_name(&input.name), files.join(" ")));
        }
        for param in &usage.resolved_parameters {
            options.extend(parameter_options(param, true));
        }
        for param in &usage.unresolved_parameters {
            options.extend(parameter_options(param, false));
        }
        for output in &usage.outputs {
            if let Some(variable) = &output.variable {
                let ext = if output.visualization { "qzv" } else { "qza" };
                options.push(format!("--o-{} {}.{}", cli_name(&output.name), variable, ext));
            }
        }

        let head = format!("qiime {} {}", cli_name(&usage.plugin), cli_name(&usage.action));
        self.push_command(head, options);
    }

    fn render_comment(&mut self, text: &str) {
        self.lines.extend(comment_lines(text));
    }

    fn finalize(&mut self) -> String {
        while self.lines.last().is_some_and(|l| l.is_empty()) {
            self.lines.pop();
        }
        let mut out = String::from("#!/usr/bin/env bash\n\n");
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::{ArtifactView, UsageInput, UsageOutput};
    use prov_core::ProvId;
    use serde_json::json;

    fn param(name: &str, value: Value) -> UsageParameter {
        UsageParameter {
            name: name.into(),
            value: UsageValue::Literal(value),
        }
    }

    #[test]
    fn import_command() {
        let mut driver = CliDriver::new();
        driver.render_import(&UsageAction::import(
            ProvId::new("a"),
            "SampleData[SequencesWithQuality]",
            Some("SingleLanePerSampleSingleEndFastqDirFmt".into()),
            "demux",
        ));
        assert_eq!(
            driver.finalize(),
            "#!/usr/bin/env bash\n\n\
             qiime tools import \\\n\
             \x20 --type 'SampleData[SequencesWithQuality]' \\\n\
             \x20 --input-format SingleLanePerSampleSingleEndFastqDirFmt \\\n\
             \x20 --input-path <your data here> \\\n\
             \x20 --output-path demux.qza\n"
        );
    }

    #[test]
    fn action_options_cover_every_value_kind() {
        let mut usage = UsageAction::action(ProvId::new("b"), "feature_table", "summarize");
        usage.inputs.push(UsageInput {
            name: "table".into(),
            variables: vec!["table".into()],
            collection: false,
        });
        usage.resolved_parameters = vec![
            param("sampling_depth", json!(1000)),
            param("with_replacement", json!(false)),
            param("random_seed", Value::Null),
            param("labels", json!(["a b", "c"])),
            UsageParameter {
                name: "sample_metadata".into(),
                value: UsageValue::MetadataFile {
                    variable: "sample-metadata".into(),
                    source: None,
                    column: Some("<column_name>".into()),
                },
            },
            UsageParameter {
                name: "extra".into(),
                value: UsageValue::ArtifactMetadata {
                    views: vec![
                        ArtifactView {
                            artifact: "taxonomy".into(),
                            view: "taxonomy-md".into(),
                        },
                        ArtifactView {
                            artifact: "alpha".into(),
                            view: "alpha-md".into(),
                        },
                    ],
                    merged: Some("merged-artifacts".into()),
                    column: None,
                },
            },
        ];
        usage.outputs.push(UsageOutput {
            name: "visualization".into(),
            variable: Some("table-summary".into()),
            visualization: true,
        });

        let mut driver = CliDriver::new();
        driver.render_action(&usage);
        let script = driver.finalize();
        assert!(script.contains("qiime feature-table summarize \\\n"));
        assert!(script.contains("  --i-table table.qza \\\n"));
        assert!(script.contains("  --p-sampling-depth 1000 \\\n"));
        assert!(script.contains("  --p-no-with-replacement \\\n"));
        assert!(!script.contains("random-seed"));
        assert!(script.contains("  --p-labels 'a b' c \\\n"));
        assert!(script.contains("  --m-sample-metadata-file sample-metadata.tsv \\\n"));
        assert!(script.contains("  --m-sample-metadata-column '<column_name>' \\\n"));
        assert!(script.contains("  --m-extra-file taxonomy.qza alpha.qza \\\n"));
        assert!(script.ends_with("  --o-visualization table-summary.qzv\n"));
    }

    #[test]
    fn unresolved_parameters_are_marked() {
        let mut usage = UsageAction::action(ProvId::new("b"), "dada2", "denoise_single");
        usage.unresolved_parameters = vec![param("trunc_q", json!(2))];
        let mut driver = CliDriver::new();
        driver.render_action(&usage);
        let script = driver.finalize();
        assert!(script.contains("# NOTE: dada2 denoise_single does not accept the parameter(s) trunc_q"));
        assert!(script.contains("qiime dada2 denoise-single \\\n  --?-trunc-q 2\n"));
    }

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("plain.qza"), "plain.qza");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
    }
}
