use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use rmcp::model::Tool as McpTool;

use acis_core::error::Result;
use acis_core::traits::Tool;
use acis_core::types::{ToolContext, ToolResult};
use acis_tools::ToolRegistry;

use crate::McpClientManager;

/// A registry tool that forwards calls to an MCP server tool of the same name.
pub struct McpBridgedTool {
    server_name: String,
    tool_name: String,
    description: String,
    schema: serde_json::Value,
    manager: Arc<McpClientManager>,
    timeout: u64,
}

impl Tool for McpBridgedTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            debug!(server = %self.server_name, tool = %self.tool_name, "Calling MCP tool");

            match self
                .manager
                .call_tool(&self.server_name, &self.tool_name, input.as_object().cloned())
                .await
            {
                Ok(content) => Ok(ToolResult::success(content)),
                Err(e) => Ok(ToolResult::error(e.to_string())),
            }
        })
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout
    }
}

/// Register every tool of an MCP server under its own name.
/// Returns the registered names.
pub fn register_mcp_tools(
    registry: &mut ToolRegistry,
    manager: &Arc<McpClientManager>,
    server_name: &str,
    tools: &[McpTool],
    timeout_secs: u64,
) -> Vec<String> {
    let mut names = Vec::with_capacity(tools.len());
    for tool in tools {
        let description = tool
            .description
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_else(|| format!("MCP tool: {}", tool.name));

        let schema = serde_json::to_value(&*tool.input_schema)
            .unwrap_or(serde_json::json!({"type": "object"}));

        registry.register(McpBridgedTool {
            server_name: server_name.to_string(),
            tool_name: tool.name.to_string(),
            description,
            schema,
            manager: manager.clone(),
            timeout: timeout_secs,
        });
        debug!(server = %server_name, tool = %tool.name, "Registered MCP bridged tool");
        names.push(tool.name.to_string());
    }
    names
}
