/*!
shared.rs - shared helpers for subcommands.

Focus:
  - build_dispatcher / runtime: wiring used by serve, list and exec
  - parse_param_pairs / load_param_file_into_map: KEY=VALUE and file params
  - build_arguments_from_shape + primitive coercion
*/

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::azure::{AzureCli, Locator};
use crate::ops::{Dispatcher, FieldKind, InputShape, JsonObject};

/* ---- Wiring ---- */

/// Registry of Azure operations + the system `az` locator.
pub fn build_dispatcher(max_output: usize) -> Result<Dispatcher> {
    let registry = crate::tools::registry().context("Invalid operation registry")?;
    Ok(Dispatcher::new(
        registry,
        AzureCli::new(Locator::system(), max_output),
    ))
}

/// Multi-threaded runtime for the (sync) subcommand entry points.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")
}

/* ---- Parameter Collection ---- */

/// Parse repeated `KEY=VALUE` flags.
pub fn parse_param_pairs(params: &[String]) -> Result<HashMap<String, String>> {
    let mut provided = HashMap::new();
    for kv in params {
        let Some((k, v)) = kv.split_once('=') else {
            anyhow::bail!("invalid --param (expected KEY=VALUE): {kv}");
        };
        let key = k.trim();
        if key.is_empty() {
            anyhow::bail!("invalid --param (empty key): {kv}");
        }
        provided.insert(key.to_string(), v.trim().to_string());
    }
    Ok(provided)
}

/// Merge a JSON / YAML object file into `provided`; existing keys win.
pub fn load_param_file_into_map(path: &str, provided: &mut HashMap<String, String>) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read param file: {path}"))?;
    let lower = path.to_ascii_lowercase();

    let value: Value = if lower.ends_with(".yaml") || lower.ends_with(".yml") {
        let yaml_v: serde_yaml::Value =
            serde_yaml::from_str(&raw).context("failed to parse YAML param file")?;
        serde_json::to_value(yaml_v).context("failed to convert YAML to JSON")?
    } else {
        serde_json::from_str(&raw).context("failed to parse JSON param file")?
    };

    let obj = value
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("param file root must be an object"))?;

    for (k, v) in obj {
        if provided.contains_key(k) {
            continue;
        }
        let s = match v {
            Value::String(sv) => sv.clone(),
            _ => v.to_string(),
        };
        provided.insert(k.clone(), s);
    }
    Ok(())
}

/* ---- Argument Building ---- */

/// Build an arguments object from raw strings using the declared shape.
///
/// - Declared fields are coerced by kind; a missing required field is an error.
/// - Keys the shape does not declare pass through as strings.
pub fn build_arguments_from_shape(
    shape: &InputShape,
    provided: &HashMap<String, String>,
) -> Result<JsonObject> {
    let mut result = JsonObject::new();
    let mut remaining = provided.clone();

    for field in shape.fields() {
        if let Some(raw) = remaining.remove(field.name) {
            result.insert(field.name.to_string(), coerce_value(&raw, field.kind));
        } else if field.required {
            anyhow::bail!("missing required parameter: {}", field.name);
        }
    }

    for (k, v) in remaining {
        result.insert(k, Value::String(v));
    }
    Ok(result)
}

/// Coerce a raw string to `kind`, keeping the string when it does not parse.
pub fn coerce_value(raw: &str, kind: FieldKind) -> Value {
    match kind {
        FieldKind::Integer => raw
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        FieldKind::Number => raw
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .ok()
            .or_else(|| {
                raw.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            })
            .unwrap_or_else(|| Value::String(raw.to_string())),
        FieldKind::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => Value::Bool(true),
            "false" | "0" | "no" | "n" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        FieldKind::Array => Value::Array(
            raw.split(',')
                .map(|s| Value::String(s.trim().to_string()))
                .collect(),
        ),
        FieldKind::String => Value::String(raw.to_string()),
    }
}
