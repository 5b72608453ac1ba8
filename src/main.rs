use std::{io::Write, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use log::{error, info, warn, LevelFilter, Metadata, Record};
use rcon_mcp::{
    client::ClientConfig, mcp::RconMcpServer, server::Server, session::SessionRegistry,
    tools::RconTools,
};
use rmcp::{transport::stdio, ServiceExt};
use tokio::signal;

/// Writes to stderr; stdout belongs to the MCP transport.
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(
                std::io::stderr(),
                "{} {} - {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

#[derive(Parser)]
#[command(name = "rcon-mcp-server", version, about = "RCON Model Context Protocol server")]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "RCON_LOG", default_value = "info", global = true)]
    log_level: LevelFilter,
    /// Deadline in seconds for connecting to, reading from and writing to RCON servers
    #[arg(long, env = "RCON_TIMEOUT_SECS", default_value_t = 10, global = true)]
    timeout_secs: u64,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the MCP server on stdio (default)
    Serve,
    /// Run a local RCON server that echoes commands back
    Mock {
        #[arg(long, default_value = "127.0.0.1:25575")]
        bind: String,
        /// Accept only this password (any password if omitted)
        #[arg(long)]
        password: Option<String>,
        /// Echo commands uppercased
        #[arg(long)]
        uppercase: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _ = log::set_logger(&StderrLogger).map(|()| log::set_max_level(cli.log_level));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(Duration::from_secs(cli.timeout_secs)).await,
        Command::Mock {
            bind,
            password,
            uppercase,
        } => mock(&bind, password.as_deref(), uppercase).await,
    }
}

async fn serve(deadline: Duration) -> anyhow::Result<()> {
    let registry = Arc::new(SessionRegistry::with_client_config(ClientConfig::uniform(
        deadline,
    )));
    let server = RconMcpServer::new(RconTools::new(registry.clone()));

    info!("RCON MCP server listening on stdio");
    let outcome = match server.serve(stdio()).await {
        Ok(running) => running.waiting().await.map(|_| ()).map_err(anyhow::Error::from),
        Err(e) => Err(anyhow::Error::from(e)),
    };

    // close every session, whatever ended the transport
    if let Err(e) = registry.disconnect_all().await {
        warn!("failed to disconnect all sessions cleanly: {}", e);
    }
    if let Err(e) = &outcome {
        error!("MCP server stopped: {:#}", e);
    }
    info!("bye");
    outcome
}

async fn mock(bind: &str, password: Option<&str>, uppercase: bool) -> anyhow::Result<()> {
    let server = Server::bind(bind, password, move |command: &str| {
        info!("receive: {:?}", command);
        if uppercase {
            command.to_uppercase()
        } else {
            command.to_string()
        }
    })
    .await?;

    tokio::select!(
        _ = server.run() => {}
        _ = signal::ctrl_c() => {}
    );

    info!("bye");
    Ok(())
}
