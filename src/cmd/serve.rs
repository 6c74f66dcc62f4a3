//! `serve` subcommand: run the MCP server on stdio (the default).

use anyhow::Result;
use clap::Args;

use crate::cmd::shared::{build_dispatcher, runtime};
use crate::mcp::{AzureMcpServer, serve_stdio};

#[derive(Args, Debug, Default)]
pub struct ServeArgs {}

pub fn execute_serve(_args: ServeArgs, max_output: usize) -> Result<()> {
    let server = AzureMcpServer::new(build_dispatcher(max_output)?);
    tracing::debug!(max_output, "starting stdio server");
    runtime()?.block_on(serve_stdio(server))
}
