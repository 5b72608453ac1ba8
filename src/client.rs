use std::{io, time::Duration};

use log::{debug, trace};
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    sync::Mutex,
    time::timeout,
};

use crate::{
    error::RconError,
    packet::{Packet, PacketType},
};

/// Deadline used for dialing, reading and writing unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-operation deadlines of a [Client].
#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            connect_timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Uses the same deadline for every operation.
    pub fn uniform(deadline: Duration) -> Self {
        ClientConfig {
            connect_timeout: deadline,
            read_timeout: deadline,
            write_timeout: deadline,
        }
    }
}

/// Asynchronous rcon client for a single remote endpoint.
///
/// The client moves through `disconnected -> connected -> authenticated` and
/// only ever forward; `disconnect()` drops it back to the start. Every
/// operation holds the client's lock for its whole duration, so at most one
/// packet is in flight on the connection at any time. Responses are matched
/// to requests purely by order, so this is what keeps the framing intact when
/// many tasks share one client.
///
/// ## Example
/// ```no_run
/// use rcon_mcp::client::Client;
/// use std::error::Error;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn Error>> {
///     let client = Client::new();
///     client.connect("127.0.0.1:25575").await?;
///     client.authenticate("<put rcon password here>").await?;
///
///     let response = client.execute("echo hi").await?;
///     assert_eq!(response, "hi");
///
///     client.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct Client {
    config: ClientConfig,
    state: Mutex<ClientState>,
}

struct ClientState {
    // `Some` while connected
    stream: Option<TcpStream>,
    next_request_id: i32,
    authenticated: bool,
}

impl ClientState {
    fn take_request_id(&mut self) -> i32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }
}

fn dial_failed(address: &str, source: io::Error) -> RconError {
    RconError::ConnectionError {
        address: address.to_string(),
        source,
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Client {
            config,
            state: Mutex::new(ClientState {
                stream: None,
                next_request_id: 1,
                authenticated: false,
            }),
        }
    }

    /// Opens the TCP connection. Does not authenticate.
    pub async fn connect(&self, address: &str) -> Result<(), RconError> {
        let mut state = self.state.lock().await;
        if state.stream.is_some() {
            return Err(RconError::AlreadyConnected);
        }

        let stream = timeout(self.config.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| dial_failed(address, io::ErrorKind::TimedOut.into()))?
            .map_err(|source| dial_failed(address, source))?;

        debug!("opened tcp stream to {}", address);
        state.stream = Some(stream);
        Ok(())
    }

    /// Sends the password and waits for the server's verdict. A failed attempt
    /// leaves the client connected but unauthenticated.
    pub async fn authenticate(&self, password: &str) -> Result<(), RconError> {
        let mut state = self.state.lock().await;
        if state.stream.is_none() {
            return Err(RconError::NotConnected);
        }
        if state.authenticated {
            return Err(RconError::AlreadyAuthenticated);
        }

        let auth_packet = Packet::new(state.take_request_id(), PacketType::AUTH, password);
        let stream = state.stream.as_mut().ok_or(RconError::NotConnected)?;

        trace!("sending auth packet {} to server", auth_packet.id());
        let response = self.round_trip(stream, &auth_packet).await?;
        // -1 is how the server says "wrong password", whatever id we sent
        if response.id() == -1 {
            return Err(RconError::AuthenticationFailed);
        }
        if response.id() != auth_packet.id() {
            return Err(RconError::UnexpectedResponse {
                expected: auth_packet.id(),
                actual: response.id(),
            });
        }

        debug!("auth complete");
        state.authenticated = true;
        Ok(())
    }

    /// Runs a command and returns the body of its response verbatim.
    ///
    /// Exactly one response packet is read. Servers that split long output
    /// over several packets will leave the remainder on the stream.
    pub async fn execute(&self, command: &str) -> Result<String, RconError> {
        let mut state = self.state.lock().await;
        if state.stream.is_none() {
            return Err(RconError::NotConnected);
        }
        if !state.authenticated {
            return Err(RconError::NotAuthenticated);
        }

        let command_packet = Packet::new(state.take_request_id(), PacketType::COMMAND, command);
        let stream = state.stream.as_mut().ok_or(RconError::NotConnected)?;

        trace!("sending command packet {} to server", command_packet.id());
        let response = self.round_trip(stream, &command_packet).await?;
        if response.id() != command_packet.id() {
            return Err(RconError::ResponseMismatch {
                expected: command_packet.id(),
                actual: response.id(),
            });
        }

        Ok(response.body().to_string())
    }

    /// Closes the connection. Calling this on a disconnected client is a no-op.
    ///
    /// Local state is always reset, even when closing the socket reports an
    /// error.
    pub async fn disconnect(&self) -> Result<(), RconError> {
        let mut state = self.state.lock().await;
        state.authenticated = false;
        let Some(mut stream) = state.stream.take() else {
            return Ok(());
        };

        debug!("closing tcp stream");
        match stream.shutdown().await {
            Ok(()) => Ok(()),
            // the peer hung up first, which is just as closed
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(RconError::CloseError(e)),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.stream.is_some()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.authenticated
    }

    /// `(connected, authenticated)` read under a single lock.
    pub async fn connection_state(&self) -> (bool, bool) {
        let state = self.state.lock().await;
        (state.stream.is_some(), state.authenticated)
    }

    async fn round_trip(
        &self,
        stream: &mut TcpStream,
        request: &Packet,
    ) -> Result<Packet, RconError> {
        timeout(self.config.write_timeout, request.write_to(stream))
            .await
            .map_err(|_| RconError::TimeoutError("sending packet"))??;

        let response = timeout(self.config.read_timeout, Packet::read_from(stream))
            .await
            .map_err(|_| RconError::TimeoutError("reading response"))??;

        trace!("receive response for packet id {}", response.id());
        Ok(response)
    }
}
