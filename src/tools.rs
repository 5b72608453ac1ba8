//! The four bridge operations, independent of the transport that invokes them.

use std::{fmt::Write, sync::Arc};

use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::{error::ToolError, session::SessionRegistry};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConnectParams {
    #[schemars(description = "Unique identifier for this RCON session")]
    pub session_id: String,
    #[schemars(description = "Friendly name for this connection (optional)")]
    #[serde(default)]
    pub name: Option<String>,
    #[schemars(description = "RCON server address (host:port)")]
    pub address: String,
    #[schemars(description = "RCON server password")]
    pub password: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DisconnectParams {
    #[schemars(description = "Session ID to disconnect")]
    pub session_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteParams {
    #[schemars(description = "Session ID to use for execution")]
    pub session_id: String,
    #[schemars(description = "Command to execute on the RCON server")]
    pub command: String,
}

/// Connect, disconnect, execute and list, on top of a shared registry.
#[derive(Clone, Default)]
pub struct RconTools {
    registry: Arc<SessionRegistry>,
}

impl RconTools {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        RconTools { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Creates the session, dials and authenticates. On any failure after the
    /// session was created it is removed again.
    pub async fn connect(&self, params: ConnectParams) -> Result<String, ToolError> {
        let ConnectParams {
            session_id,
            name,
            address,
            password,
        } = params;

        let session = self
            .registry
            .create_session(&session_id, name.as_deref(), &address)
            .await
            .map_err(ToolError::CreateSession)?;

        if let Err(err) = session.client().connect(&address).await {
            self.roll_back(&session_id).await;
            return Err(ToolError::Connect(err));
        }

        if let Err(err) = session.client().authenticate(&password).await {
            self.roll_back(&session_id).await;
            return Err(ToolError::Authenticate(err));
        }

        info!("session {} connected to {}", session_id, address);
        Ok(format!(
            "Connected to RCON server at {} (session: {})",
            address, session_id
        ))
    }

    pub async fn disconnect(&self, params: DisconnectParams) -> Result<String, ToolError> {
        self.registry
            .remove_session(&params.session_id)
            .await
            .map_err(ToolError::Disconnect)?;

        info!("session {} disconnected", params.session_id);
        Ok(format!("Disconnected session: {}", params.session_id))
    }

    /// Returns the raw response text of the command.
    pub async fn execute(&self, params: ExecuteParams) -> Result<String, ToolError> {
        let session = self
            .registry
            .get_session(&params.session_id)
            .await
            .map_err(ToolError::SessionNotFound)?;

        debug!("executing on session {}: {}", params.session_id, params.command);
        session
            .client()
            .execute(&params.command)
            .await
            .map_err(ToolError::Execute)
    }

    pub async fn list_sessions(&self) -> String {
        let sessions = self.registry.list_sessions().await;
        if sessions.is_empty() {
            return "No active RCON sessions".to_string();
        }

        let mut out = String::from("Active RCON sessions:\n");
        for session in sessions {
            let _ = writeln!(
                out,
                "- {} ({}): {} - {}",
                session.id(),
                session.display_name(),
                session.address(),
                session.status().await
            );
        }
        out
    }

    async fn roll_back(&self, session_id: &str) {
        if let Err(err) = self.registry.remove_session(session_id).await {
            warn!("rolling back session {} failed: {}", session_id, err);
        }
    }
}
