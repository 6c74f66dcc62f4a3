/*!
`list.rs`

Implements the `list` subcommand: print every registered operation with its
declared input shape. Nothing is executed, so `az` does not need to be installed.

JSON Output Shape (--json):
{
  "count": 13,
  "operations": [
    { "name": "azure_auth_status", "description": "...", "inputSchema": { ... } }
  ]
}
*/

use anyhow::Result;
use clap::Args;

use crate::cmd::shared::build_dispatcher;
use crate::ops::{Field, OperationDescriptor};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output JSON instead of human-readable text
    #[arg(long)]
    pub json: bool,
}

pub fn execute_list(args: ListArgs, max_output: usize) -> Result<()> {
    let dispatcher = build_dispatcher(max_output)?;

    if args.json {
        let ops = dispatcher.list_operations();
        let out = serde_json::json!({ "count": ops.len(), "operations": ops });
        println!(
            "{}",
            serde_json::to_string_pretty(&out).unwrap_or_else(|_| out.to_string())
        );
        return Ok(());
    }

    let registry = dispatcher.registry();
    println!("Operations ({})", registry.len());
    for op in registry.iter() {
        println!("{}", render(op));
    }
    Ok(())
}

fn render(op: &OperationDescriptor) -> String {
    let params: Vec<String> = op.input.fields().iter().map(render_field).collect();
    if params.is_empty() {
        format!("  {}\n      {}", op.name, op.description)
    } else {
        format!(
            "  {} ({})\n      {}",
            op.name,
            params.join(", "),
            op.description
        )
    }
}

fn render_field(f: &Field) -> String {
    let marker = if f.required { "" } else { "?" };
    format!("{}{}: {}", f.name, marker, f.kind.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{FieldKind, HandlerFuture, InputShape, JsonObject, boxed};
    use std::sync::Arc;

    fn noop(_: Arc<crate::azure::AzureCli>, _: JsonObject) -> HandlerFuture {
        boxed(async { Ok(serde_json::Value::Null) })
    }

    #[test]
    fn render_marks_optional_fields() {
        let op = OperationDescriptor::new(
            "azure_function_logs",
            "Get logs",
            InputShape::new(vec![
                Field::required("name", FieldKind::String, ""),
                Field::optional("lines", FieldKind::Number, ""),
            ]),
            noop,
        );
        assert_eq!(
            render(&op),
            "  azure_function_logs (name: string, lines?: number)\n      Get logs"
        );
    }
}
