//! MCP server exposing the rcon tools over any rmcp transport.
//!
//! Tool failures come back as a `CallToolResult` with `is_error: true`, so the
//! calling model can read them; protocol errors (unknown tool, malformed
//! arguments) are handled by rmcp.

use log::debug;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};

use crate::{
    error::ToolError,
    tools::{ConnectParams, DisconnectParams, ExecuteParams, RconTools},
};

#[derive(Clone)]
pub struct RconMcpServer {
    tools: RconTools,
    tool_router: ToolRouter<RconMcpServer>,
}

impl RconMcpServer {
    pub fn new(tools: RconTools) -> Self {
        RconMcpServer {
            tools,
            tool_router: Self::tool_router(),
        }
    }
}

fn to_result(outcome: Result<String, ToolError>) -> CallToolResult {
    match outcome {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(err) => CallToolResult::error(vec![Content::text(err.to_string())]),
    }
}

#[tool_router]
impl RconMcpServer {
    #[tool(description = "Connect to an RCON server and authenticate")]
    async fn rcon_connect(
        &self,
        Parameters(req): Parameters<ConnectParams>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: rcon_connect {}", req.session_id);
        Ok(to_result(self.tools.connect(req).await))
    }

    #[tool(description = "Disconnect from an RCON server")]
    async fn rcon_disconnect(
        &self,
        Parameters(req): Parameters<DisconnectParams>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: rcon_disconnect {}", req.session_id);
        Ok(to_result(self.tools.disconnect(req).await))
    }

    #[tool(description = "Execute a command on an RCON server")]
    async fn rcon_execute(
        &self,
        Parameters(req): Parameters<ExecuteParams>,
    ) -> Result<CallToolResult, McpError> {
        debug!("Tool call: rcon_execute {}", req.session_id);
        Ok(to_result(self.tools.execute(req).await))
    }

    #[tool(description = "List all active RCON sessions")]
    async fn rcon_list_sessions(&self) -> Result<CallToolResult, McpError> {
        debug!("Tool call: rcon_list_sessions");
        let listing = self.tools.list_sessions().await;
        Ok(CallToolResult::success(vec![Content::text(listing)]))
    }
}

#[tool_handler]
impl ServerHandler for RconMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Bridge to Source RCON servers. \
                 \n1. rcon_connect: open and authenticate a session under an id you choose \
                 \n2. rcon_execute: run commands on that session \
                 \n3. rcon_list_sessions: show sessions and their state \
                 \n4. rcon_disconnect: close a session when done"
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}
