//! Minimal rcon endpoint for local trials and tests.

use std::{net::SocketAddr, sync::Arc};

use log::{debug, error, info};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

use crate::{
    error::RconError,
    packet::{Packet, PacketType},
};

type Handler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Accepts rcon connections and answers every command with whatever the
/// handler returns for it.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    password: Option<String>,
    handler: Handler,
}

impl Server {
    /// Binds the listener. With `password` set to `None` any password is
    /// accepted.
    pub async fn bind<F>(addr: &str, password: Option<&str>, handler: F) -> Result<Self, RconError>
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let bind_error = |source| RconError::BindError {
            address: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        Ok(Server {
            listener,
            local_addr,
            password: password.map(str::to_string),
            handler: Arc::new(handler),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the accept loop on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let Server {
            listener,
            local_addr,
            password,
            handler,
        } = self;
        info!("rcon server running on {}", local_addr);

        let password = Arc::new(password);
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let password = password.clone();
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Server::process(stream, addr, &password, &handler).await {
                            debug!("connection from {} ended: {}", addr, e);
                        }
                    });
                }
                Err(e) => error!("{:?}", e),
            }
        }
    }

    async fn process(
        mut stream: TcpStream,
        addr: SocketAddr,
        password: &Option<String>,
        handler: &Handler,
    ) -> Result<(), RconError> {
        info!("accept from {:?}", addr);
        let mut authenticated = false;

        loop {
            let request = Packet::read_from(&mut stream).await?;
            let reply = if request.packet_type() == PacketType::AUTH {
                let accepted = password.as_deref().map_or(true, |p| p == request.body());
                authenticated = accepted;
                let id = if accepted { request.id() } else { -1 };
                Packet::new(id, PacketType::AUTH_RESPONSE, "")
            } else if authenticated {
                let output = (handler.as_ref())(request.body());
                Packet::new(request.id(), PacketType::RESPONSE, &output)
            } else {
                Packet::new(-1, PacketType::RESPONSE, "")
            };
            reply.write_to(&mut stream).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn start(password: Option<&str>) -> (SocketAddr, JoinHandle<()>) {
        let server = Server::bind("127.0.0.1:0", password, |command: &str| {
            command.to_uppercase()
        })
        .await
        .unwrap();
        (server.local_addr(), server.spawn())
    }

    async fn send(stream: &mut TcpStream, packet: Packet) -> Packet {
        packet.write_to(stream).await.unwrap();
        Packet::read_from(stream).await.unwrap()
    }

    #[tokio::test]
    async fn answers_auth_and_commands() {
        let (addr, _server) = start(Some("secret")).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let auth = send(&mut stream, Packet::new(5, PacketType::AUTH, "secret")).await;
        assert_eq!(auth.id(), 5);
        assert_eq!(auth.packet_type(), PacketType::AUTH_RESPONSE);

        let reply = send(&mut stream, Packet::new(6, PacketType::COMMAND, "status")).await;
        assert_eq!(reply.id(), 6);
        assert_eq!(reply.packet_type(), PacketType::RESPONSE);
        assert_eq!(reply.body(), "STATUS");
    }

    #[tokio::test]
    async fn wrong_password_gets_minus_one() {
        let (addr, _server) = start(Some("secret")).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let auth = send(&mut stream, Packet::new(1, PacketType::AUTH, "guess")).await;
        assert_eq!(auth.id(), -1);

        let reply = send(&mut stream, Packet::new(2, PacketType::COMMAND, "status")).await;
        assert_eq!(reply.id(), -1);
    }

    #[tokio::test]
    async fn no_password_accepts_anything() {
        let (addr, _server) = start(None).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let auth = send(&mut stream, Packet::new(9, PacketType::AUTH, "whatever")).await;
        assert_eq!(auth.id(), 9);
    }
}
