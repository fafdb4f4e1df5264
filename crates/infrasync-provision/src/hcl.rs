//! HCL rendering of recorded state
//!
//! Turns the JSON printed by `show -json` into `resource` blocks. Lists of
//! objects become nested blocks, objects become maps.

use crate::error::{ProvisionError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt::Write;

/// Attributes computed by the provider, never written back
const COMPUTED_ATTRIBUTES: &[&str] = &["id", "etag", "self_link", "timeouts"];

/// One managed resource from `show -json`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub values: Map<String, Value>,
}

#[derive(Deserialize)]
struct ShowOutput {
    #[serde(default)]
    values: Option<ShowValues>,
}

#[derive(Deserialize)]
struct ShowValues {
    root_module: Module,
}

#[derive(Deserialize)]
struct Module {
    #[serde(default)]
    resources: Vec<StateResource>,
    #[serde(default)]
    child_modules: Vec<Module>,
}

impl Module {
    fn collect_managed(self, out: &mut Vec<StateResource>) {
        out.extend(self.resources.into_iter().filter(|r| r.mode == "managed"));
        for child in self.child_modules {
            child.collect_managed(out);
        }
    }
}

/// Managed resources of every module in `show -json` output
pub fn managed_resources(show_json: &str) -> Result<Vec<StateResource>> {
    let output: ShowOutput = serde_json::from_str(show_json)?;
    let Some(values) = output.values else {
        // Empty state
        return Ok(Vec::new());
    };

    let mut resources = Vec::new();
    values.root_module.collect_managed(&mut resources);
    Ok(resources)
}

/// Render one `resource` block
pub fn render_resource(resource: &StateResource) -> Result<String> {
    let mut out = String::new();
    writeln!(
        out,
        "resource {} {} {{",
        quote(&resource.resource_type),
        quote(&resource.name)
    )
    .map_err(fmt_error)?;

    let attributes: Map<String, Value> = resource
        .values
        .iter()
        .filter(|(key, _)| !COMPUTED_ATTRIBUTES.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    render_body(&mut out, &attributes, 1).map_err(fmt_error)?;

    out.push_str("}\n");
    Ok(out)
}

fn fmt_error(e: std::fmt::Error) -> ProvisionError {
    ProvisionError::InvalidOutput(e.to_string())
}

fn render_body(out: &mut String, body: &Map<String, Value>, depth: usize) -> std::fmt::Result {
    let indent = "  ".repeat(depth);

    for (key, value) in body {
        match value {
            Value::Null => {}
            Value::Array(items) if items.is_empty() => {}
            Value::Array(items) if items.iter().all(Value::is_object) => {
                for item in items.iter().filter_map(Value::as_object) {
                    writeln!(out, "{}{} {{", indent, key)?;
                    render_body(out, item, depth + 1)?;
                    writeln!(out, "{}}}", indent)?;
                }
            }
            _ => writeln!(out, "{}{} = {}", indent, key, render_value(value, depth))?,
        }
    }
    Ok(())
}

fn render_value(value: &Value, depth: usize) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(|v| render_value(v, depth)).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(map) if map.is_empty() => "{}".to_string(),
        Value::Object(map) => {
            let indent = "  ".repeat(depth + 1);
            let mut out = String::from("{\n");
            for (key, value) in map {
                out.push_str(&format!(
                    "{}{} = {}\n",
                    indent,
                    quote(key),
                    render_value(value, depth + 1)
                ));
            }
            out.push_str(&"  ".repeat(depth));
            out.push('}');
            out
        }
    }
}

/// HCL string literal, with template sequences escaped
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
