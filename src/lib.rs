//! Bridge between MCP tool calls and [Source RCON](https://developer.valvesoftware.com/wiki/Source_RCON_Protocol)
//! servers.
//!
//! [client::Client] speaks the protocol to one server, [session::SessionRegistry]
//! keeps many of them under caller-chosen ids, and [tools::RconTools] offers
//! the connect / disconnect / execute / list operations on top. [mcp] wires
//! those operations into an MCP server.
pub mod client;
pub mod error;
pub mod mcp;
pub mod packet;
pub mod server;
pub mod session;
pub mod tools;
