use std::{collections::HashMap, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use tokio::sync::RwLock;

use crate::{
    client::{Client, ClientConfig},
    error::SessionError,
};

/// A caller-named binding to one rcon connection.
pub struct Session {
    id: String,
    name: Option<String>,
    address: String,
    created: DateTime<Utc>,
    client: Client,
}

/// Connection state of a session, as shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connected,
    Authenticated,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connected => "connected (not authenticated)",
            SessionStatus::Authenticated => "connected & authenticated",
        })
    }
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The name, or `"unnamed"` if none was given.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "unnamed",
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn status(&self) -> SessionStatus {
        match self.client.connection_state().await {
            (false, _) => SessionStatus::Disconnected,
            (true, true) => SessionStatus::Authenticated,
            (true, false) => SessionStatus::Connected,
        }
    }
}

/// Concurrent-safe set of live sessions keyed by their identifier.
///
/// Topology changes (create, remove, disconnect all) take the write lock;
/// lookups and listings share the read lock. Once looked up, a session's
/// client is driven under its own lock, so commands on different sessions
/// never wait on each other.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    client_config: ClientConfig,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose clients use the given deadlines.
    pub fn with_client_config(client_config: ClientConfig) -> Self {
        SessionRegistry {
            sessions: RwLock::default(),
            client_config,
        }
    }

    /// Registers a new, disconnected session. Connecting and authenticating
    /// its client is up to the caller.
    pub async fn create_session(
        &self,
        id: &str,
        name: Option<&str>,
        address: &str,
    ) -> Result<Arc<Session>, SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(id) {
            return Err(SessionError::DuplicateSession(id.to_string()));
        }

        let session = Arc::new(Session {
            id: id.to_string(),
            name: name.map(str::to_string),
            address: address.to_string(),
            created: Utc::now(),
            client: Client::with_config(self.client_config),
        });
        sessions.insert(id.to_string(), session.clone());

        debug!("created session {} for {}", id, address);
        Ok(session)
    }

    pub async fn get_session(&self, id: &str) -> Result<Arc<Session>, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::SessionNotFound(id.to_string()))
    }

    /// Snapshot of all sessions, in no particular order.
    pub async fn list_sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Removes the session, disconnecting its client first if needed. The
    /// entry is gone afterwards even if the disconnect failed.
    pub async fn remove_session(&self, id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .remove(id)
            .ok_or_else(|| SessionError::SessionNotFound(id.to_string()))?;

        debug!("removed session {}", id);
        if session.client.is_connected().await {
            session
                .client
                .disconnect()
                .await
                .map_err(SessionError::Disconnect)?;
        }
        Ok(())
    }

    /// Disconnects every session and empties the registry. All sessions are
    /// attempted; failures are collected into one error.
    pub async fn disconnect_all(&self) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;

        let mut failures = Vec::new();
        for (id, session) in sessions.drain() {
            if !session.client.is_connected().await {
                continue;
            }
            if let Err(err) = session.client.disconnect().await {
                warn!("failed to disconnect session {}: {}", id, err);
                failures.push((id, err));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SessionError::DisconnectAll(failures))
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Server;

    #[tokio::test]
    async fn new_registry_is_empty() {
        let registry = SessionRegistry::new();

        assert!(registry.is_empty().await);
        assert!(registry.list_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn create_then_get() {
        let registry = SessionRegistry::new();
        let before = Utc::now();

        let created = registry
            .create_session("s1", Some("survival"), "127.0.0.1:25575")
            .await
            .unwrap();
        assert_eq!(created.id(), "s1");
        assert_eq!(created.display_name(), "survival");
        assert_eq!(created.address(), "127.0.0.1:25575");
        assert!(created.created() >= before);
        assert_eq!(created.status().await, SessionStatus::Disconnected);

        let fetched = registry.get_session("s1").await.unwrap();
        assert!(Arc::ptr_eq(&created, &fetched));
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected_and_first_kept() {
        let registry = SessionRegistry::new();
        registry
            .create_session("x", Some("first"), "a:1")
            .await
            .unwrap();

        let err = registry
            .create_session("x", Some("second"), "b:2")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::DuplicateSession(id) if id == "x"));

        let kept = registry.get_session("x").await.unwrap();
        assert_eq!(kept.name(), Some("first"));
        assert_eq!(kept.address(), "a:1");
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn missing_name_displays_as_unnamed() {
        let registry = SessionRegistry::new();

        let none = registry.create_session("a", None, "h:1").await.unwrap();
        let empty = registry.create_session("b", Some(""), "h:1").await.unwrap();
        assert_eq!(none.display_name(), "unnamed");
        assert_eq!(empty.display_name(), "unnamed");
    }

    #[tokio::test]
    async fn get_unknown_session_fails() {
        let registry = SessionRegistry::new();

        let err = registry.get_session("nope").await.err().unwrap();
        assert!(matches!(err, SessionError::SessionNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn removed_session_is_gone() {
        let registry = SessionRegistry::new();
        registry.create_session("s", None, "h:1").await.unwrap();

        registry.remove_session("s").await.unwrap();
        assert!(matches!(
            registry.get_session("s").await.err().unwrap(),
            SessionError::SessionNotFound(_)
        ));
        assert!(matches!(
            registry.remove_session("s").await.unwrap_err(),
            SessionError::SessionNotFound(_)
        ));
    }

    #[tokio::test]
    async fn remove_disconnects_live_client() {
        let server = Server::bind("127.0.0.1:0", None, |command: &str| command.to_string())
            .await
            .unwrap();
        let address = server.local_addr().to_string();
        let _running = server.spawn();

        let registry = SessionRegistry::new();
        let session = registry.create_session("live", None, &address).await.unwrap();
        session.client().connect(&address).await.unwrap();
        session.client().authenticate("anything").await.unwrap();
        assert_eq!(session.status().await, SessionStatus::Authenticated);

        registry.remove_session("live").await.unwrap();
        // the caller's handle sees the disconnect
        assert_eq!(session.status().await, SessionStatus::Disconnected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn status_never_mixes_states_during_disconnect() {
        let server = Server::bind("127.0.0.1:0", None, |command: &str| command.to_string())
            .await
            .unwrap();
        let address = server.local_addr().to_string();
        let _running = server.spawn();

        let registry = SessionRegistry::new();
        let session = registry.create_session("s", None, &address).await.unwrap();
        session.client().connect(&address).await.unwrap();
        session.client().authenticate("pw").await.unwrap();

        let observer = {
            let session = session.clone();
            tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..200 {
                    seen.push(session.status().await);
                    tokio::task::yield_now().await;
                }
                seen
            })
        };
        session.client().disconnect().await.unwrap();

        // an authenticated session goes straight to disconnected
        let seen = observer.await.unwrap();
        assert!(!seen.contains(&SessionStatus::Connected));
        assert_eq!(session.status().await, SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn list_is_a_snapshot() {
        let registry = SessionRegistry::new();
        registry.create_session("a", None, "h:1").await.unwrap();
        registry.create_session("b", None, "h:2").await.unwrap();

        let snapshot = registry.list_sessions().await;
        registry.remove_session("a").await.unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.list_sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn disconnect_all_clears_everything() {
        let server = Server::bind("127.0.0.1:0", None, |command: &str| command.to_string())
            .await
            .unwrap();
        let address = server.local_addr().to_string();
        let _running = server.spawn();

        let registry = SessionRegistry::new();
        let connected = registry.create_session("on", None, &address).await.unwrap();
        connected.client().connect(&address).await.unwrap();
        registry.create_session("off", None, &address).await.unwrap();

        registry.disconnect_all().await.unwrap();
        assert!(registry.is_empty().await);
        assert!(!connected.client().is_connected().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_creates_lose_nothing() {
        let registry = Arc::new(SessionRegistry::new());

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .create_session(&format!("session-{i}"), None, "h:1")
                        .await
                        .map(|_| ())
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut ids: Vec<_> = registry
            .list_sessions()
            .await
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_of_one_id_have_one_winner() {
        let registry = Arc::new(SessionRegistry::new());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.create_session("same", None, "h:1").await.is_ok() })
            })
            .collect();
        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(registry.len().await, 1);
    }

    #[test]
    fn status_strings() {
        assert_eq!(SessionStatus::Disconnected.to_string(), "disconnected");
        assert_eq!(
            SessionStatus::Connected.to_string(),
            "connected (not authenticated)"
        );
        assert_eq!(
            SessionStatus::Authenticated.to_string(),
            "connected & authenticated"
        );
    }
}
