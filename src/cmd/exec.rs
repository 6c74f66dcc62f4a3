/*!
`exec.rs`

Implements the `call` subcommand: invoke one registered operation directly,
without an MCP client, and print its envelope.

  azure-cli-mcp call azure_resource_list --param resourceGroup=MyRG
  azure-cli-mcp call azure_function_logs --param-file app.yaml --param lines=100 --json

Parameters:
  --param KEY=VALUE        (repeatable; coerced by the operation's declared shape)
  --param-file FILE        (JSON or YAML object; --param overrides file entries)

JSON Output (--json): the envelope itself
{
  "isError": false,
  "payload": { ... }
}

Human output prints the payload as pretty JSON. The process exits non-zero
when the envelope is an error.
*/

use anyhow::Result;
use clap::Args;
use std::time::Instant;

use crate::cmd::shared::{
    build_arguments_from_shape, build_dispatcher, load_param_file_into_map, parse_param_pairs,
    runtime,
};

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Operation name (see `azure-cli-mcp list`)
    #[arg(value_name = "OPERATION")]
    pub operation: String,

    /// Provide parameter (KEY=VALUE), repeatable
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Load parameters from file (JSON or YAML). CLI --param overrides file entries
    #[arg(long = "param-file", value_name = "PATH")]
    pub param_file: Option<String>,

    /// Output the full envelope as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute_exec(args: ExecArgs, max_output: usize) -> Result<()> {
    let name = args.operation.trim();
    if name.is_empty() {
        anyhow::bail!("operation name cannot be empty");
    }

    let dispatcher = build_dispatcher(max_output)?;

    let mut provided = parse_param_pairs(&args.params)?;
    if let Some(ref pf) = args.param_file {
        load_param_file_into_map(pf, &mut provided)?;
    }

    // Unknown names go straight to the dispatcher, which reports them.
    let arguments = match dispatcher.registry().lookup(name) {
        Ok(op) => build_arguments_from_shape(&op.input, &provided)?,
        Err(_) => Default::default(),
    };

    let started = Instant::now();
    let envelope = runtime()?.block_on(dispatcher.invoke(name, Some(arguments)));
    tracing::debug!(operation = name, elapsed_ms = started.elapsed().as_millis() as u64, "call finished");

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| envelope.payload.to_string())
        );
    } else {
        println!("{}", envelope.payload_text());
    }

    if envelope.is_error {
        anyhow::bail!("operation '{name}' failed");
    }
    Ok(())
}
