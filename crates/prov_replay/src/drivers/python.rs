//! Python script against the Artifact API.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::usage::{comment_lines, UsageAction, UsageDriver, UsageParameter, UsageValue};

const INDENT: &str = "    ";
const UNRESOLVED_PREFIX: &str = "UNRESOLVED__";

#[derive(Debug, Clone, Default)]
pub struct PythonDriver {
    imports: BTreeSet<String>,
    lines: Vec<String>,
}

/// Script variable names are kebab-case; Python needs identifiers.
pub fn identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

fn py_str(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n");
    format!("'{}'", escaped)
}

pub(crate) fn py_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => py_str(s),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(py_literal).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", py_str(k), py_literal(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

impl PythonDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn import(&mut self, line: &str) {
        self.imports.insert(line.to_string());
    }

    /// Emit any statements `param` needs first and return the expression
    /// passed to the action.
    fn argument(&mut self, param: &UsageParameter) -> String {
        match &param.value {
            UsageValue::Literal(value) => py_literal(value),
            UsageValue::MetadataFile {
                variable,
                source,
                column,
            } => {
                self.import("from qiime2 import Metadata");
                let md = format!("{}_md", identifier(variable));
                match source {
                    Some(path) => {
                        self.lines
                            .push(format!("{} = Metadata.load({})", md, py_str(path)));
                    }
                    None => {
                        self.lines.extend(comment_lines(
                            "NOTE: You may substitute already-loaded Metadata for the following,\n\
                             or cast a pandas.DataFrame to Metadata as needed.",
                        ));
                        self.lines
                            .push(format!("{} = Metadata.load('<your metadata filepath>')", md));
                    }
                }
                self.column(md, column.as_deref())
            }
            UsageValue::ArtifactMetadata {
                views,
                merged,
                column,
            } => {
                self.import("from qiime2 import Metadata");
                for view in views {
                    self.lines.push(format!(
                        "{} = {}.view(Metadata)",
                        identifier(&view.view),
                        identifier(&view.artifact)
                    ));
                }
                let target = match (merged, views.split_first()) {
                    (Some(merged), Some((first, rest))) if !rest.is_empty() => {
                        let others: Vec<String> = rest.iter().map(|v| identifier(&v.view)).collect();
                        let merged = identifier(merged);
                        self.lines.push(format!(
                            "{} = {}.merge({})",
                            merged,
                            identifier(&first.view),
                            others.join(", ")
                        ));
                        merged
                    }
                    (_, Some((first, _))) => identifier(&first.view),
                    (_, None) => "None".to_string(),
                };
                self.column(target, column.as_deref())
            }
        }
    }

    fn column(&mut self, md: String, column: Option<&str>) -> String {
        match column {
            Some(column) => {
                let col = format!("{}_col", md);
                self.lines
                    .push(format!("{} = {}.get_column({})", col, md, py_str(column)));
                col
            }
            None => md,
        }
    }
}

impl UsageDriver for PythonDriver {
    fn render_import(&mut self, usage: &UsageAction) {
        self.import("from qiime2 import Artifact");
        let variable = usage.primary_variable().map(identifier).unwrap_or_else(|| "_".to_string());
        self.lines.push(format!("{} = Artifact.import_data(", variable));
        self.lines.push(format!(
            "{}{},",
            INDENT,
            py_str(usage.semantic_type.as_deref().unwrap_or_default())
        ));
        self.lines.push(format!("{}'<your data here>',", INDENT));
        if let Some(format) = &usage.import_format {
            self.lines.push(format!("{}{},", INDENT, py_str(format)));
        }
        self.lines.push(")".to_string());
        self.lines.push(String::new());
    }

    fn render_action(&mut self, usage: &UsageAction) {
        let plugin = identifier(&usage.plugin);
        let module = format!("{}_actions", plugin);
        self.import(&format!("import qiime2.plugins.{}.actions as {}", plugin, module));

        let unresolved = usage.unresolved_parameter_names();
        if !unresolved.is_empty() {
            let note = format!(
                "NOTE: {} {} does not accept the parameter(s) {} in the current environment.\n\
                 The plugin version installed may differ from the one used in the original\n\
                 analysis. Rename each {}-prefixed argument below before running.",
                usage.plugin,
                usage.action,
                unresolved.join(", "),
                UNRESOLVED_PREFIX
            );
            self.lines.extend(comment_lines(&note));
        }

        let mut args = Vec::new();
        for input in &usage.inputs {
            let vars: Vec<String> = input.variables.iter().map(|v| identifier(v)).collect();
            let expr = if input.collection || vars.len() != 1 {
                format!("[{}]", vars.join(", "))
            } else {
                vars.join("")
            };
            args.push(format!("{}={}", input.name, expr));
        }
        for param in &usage.resolved_parameters {
            let expr = self.argument(param);
            args.push(format!("{}={}", param.name, expr));
        }
        for param in &usage.unresolved_parameters {
            let expr = self.argument(param);
            args.push(format!("{}{}={}", UNRESOLVED_PREFIX, param.name, expr));
        }

        let targets: Vec<String> = usage
            .outputs
            .iter()
            .map(|o| o.variable.as_deref().map(identifier).unwrap_or_else(|| "_".to_string()))
            .collect();
        let call = format!("{}.{}(", module, identifier(&usage.action));
        let head = match targets.len() {
            0 => call,
            1 => format!("{}, = {}", targets[0], call),
            _ => format!("{} = {}", targets.join(", "), call),
        };
        self.lines.push(head);
        for arg in args {
            self.lines.push(format!("{}{},", INDENT, arg));
        }
        self.lines.push(")".to_string());
        self.lines.push(String::new());
    }

    fn render_comment(&mut self, text: &str) {
        self.lines.extend(comment_lines(text));
    }

    fn finalize(&mut self) -> String {
        while self.lines.last().is_some_and(|l| l.is_empty()) {
            self.lines.pop();
        }
        let mut out = String::new();
        for import in &self.imports {
            out.push_str(import);
            out.push('\n');
        }
        if !self.imports.is_empty() {
            out.push('\n');
        }
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}
