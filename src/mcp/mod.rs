//! MCP server surface.
//!
//! AzureMcpServer -> rmcp `ServerHandler`:
//!   list_tools -> Dispatcher::list_operations (inputSchema from InputShape)
//!   call_tool  -> Dispatcher::invoke, envelope rendered as one text item
//!
//! Operation failures never become protocol errors; they come back as
//! `isError: true` tool results.
//!
use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, ErrorData, Implementation, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler, ServiceExt};
use tracing::info;

use crate::ops::{Dispatcher, OperationInfo, ResponseEnvelope};

const INSTRUCTIONS: &str = "Azure CLI tools. Run azure_auth_status first; if not authenticated, \
run `az login` in a terminal (or call azure_auth_login). Use azure_cli for any command without a \
dedicated tool.";

#[derive(Debug, Clone)]
pub struct AzureMcpServer {
    dispatcher: Dispatcher,
}

impl AzureMcpServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Every registered operation as an MCP tool definition.
    pub fn tools(&self) -> Vec<Tool> {
        self.dispatcher
            .list_operations()
            .into_iter()
            .map(to_tool)
            .collect()
    }
}

fn to_tool(op: OperationInfo) -> Tool {
    Tool::new(op.name, op.description, Arc::new(op.input_schema))
}

impl From<ResponseEnvelope> for CallToolResult {
    fn from(envelope: ResponseEnvelope) -> Self {
        let content = vec![Content::text(envelope.payload_text())];
        if envelope.is_error {
            CallToolResult::error(content)
        } else {
            CallToolResult::success(content)
        }
    }
}

impl ServerHandler for AzureMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let envelope = self
            .dispatcher
            .invoke(&request.name, request.arguments)
            .await;
        Ok(envelope.into())
    }
}

/// Serve over stdin/stdout until the client goes away.
pub async fn serve_stdio(server: AzureMcpServer) -> Result<()> {
    let running = server
        .serve(rmcp::transport::stdio())
        .await
        .context("Failed to initialize MCP session on stdio")?;
    info!("Azure CLI MCP server running on stdio");
    let reason = running.waiting().await.context("MCP session task failed")?;
    info!(?reason, "MCP session closed");
    Ok(())
}
