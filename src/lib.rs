//! crud-relay: a loopback command server for CRUD-style clients
//!
//! The server accepts one TCP connection at a time on a loopback port,
//! reads a single command line, answers with a single status line and
//! closes the connection:
//! - `CREATE|...`, `DELETE|...`, `MARK_READ|...` and `SHAKE` are acknowledged
//! - anything else gets `ERROR|UNKNOWN`
//!
//! Nothing is persisted; every command gets a canned acknowledgment.
//! [`start_server`] launches the listener at most once per process.

pub mod client;
pub mod config;
pub mod events;
pub mod lifecycle;
pub mod protocol;
pub mod server;

pub use config::Config;
pub use events::{ServerEvents, TracingEvents};
pub use lifecycle::{start_server, start_server_with, ServerHandle, ServerState, StartOutcome};
pub use protocol::{dispatch, Command, CommandKind, Response};
