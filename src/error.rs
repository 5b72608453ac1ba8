use thiserror::Error;

/// Possible errors of a single rcon connection.
#[derive(Error, Debug)]
pub enum RconError {
    /// Returned by `connect()` on a client that already holds a stream.
    #[error("already connected")]
    AlreadyConnected,
    #[error("not connected")]
    NotConnected,
    #[error("already authenticated")]
    AlreadyAuthenticated,
    #[error("not authenticated")]
    NotAuthenticated,
    /// Returned if the host is down or behind a firewall.
    #[error("failed to connect to {address}")]
    ConnectionError {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// The stream was successfully established, but there was a problem
    /// writing to the socket.
    #[error("cannot send message to host")]
    SendError(#[source] std::io::Error),
    /// The stream was successfully established, but there was a problem
    /// reading from the socket (including a stream closed mid-packet).
    #[error("cannot receive response from host")]
    ReceiveError(#[source] std::io::Error),
    #[error("cannot bind listener on {address}")]
    BindError {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to close connection")]
    CloseError(#[source] std::io::Error),
    /// Returned if the host did not respond in time.
    #[error("timed out while {0}")]
    TimeoutError(&'static str),
    /// The declared packet length is outside of `10..=4096`.
    #[error("invalid packet size: {0}")]
    InvalidPacketSize(i32),
    /// Returned if you can't remember the password.
    #[error("authentication failed: invalid password")]
    AuthenticationFailed,
    #[error("authentication failed: unexpected response id {actual} (sent {expected})")]
    UnexpectedResponse { expected: i32, actual: i32 },
    #[error("response id mismatch: expected {expected}, got {actual}")]
    ResponseMismatch { expected: i32, actual: i32 },
}

/// Bookkeeping errors of the session registry.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session with ID {0} already exists")]
    DuplicateSession(String),
    #[error("session with ID {0} not found")]
    SessionNotFound(String),
    /// The session was removed, but closing its connection failed.
    #[error("failed to disconnect client")]
    Disconnect(#[source] RconError),
    #[error("failed to disconnect {} session(s): {}", .0.len(), join_failures(.0))]
    DisconnectAll(Vec<(String, RconError)>),
}

fn join_failures(failures: &[(String, RconError)]) -> String {
    failures
        .iter()
        .map(|(id, err)| format!("session {id}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors of the four bridge operations, carrying the step that failed.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to create session: {0}")]
    CreateSession(#[source] SessionError),
    #[error("failed to connect: {0}")]
    Connect(#[source] RconError),
    #[error("failed to authenticate: {0}")]
    Authenticate(#[source] RconError),
    #[error("session not found: {0}")]
    SessionNotFound(#[source] SessionError),
    #[error("failed to execute command: {0}")]
    Execute(#[source] RconError),
    #[error("failed to disconnect: {0}")]
    Disconnect(#[source] SessionError),
}
