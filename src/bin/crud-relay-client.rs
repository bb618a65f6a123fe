//! Command-line client for the crud-relay server.
//!
//! Sends one command and prints the server's status line.

use clap::{Parser, Subcommand};
use crud_relay::client::{Client, Request};
use std::net::SocketAddr;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crud-relay-client")]
#[command(version = "0.1.0")]
#[command(about = "Send a single command to a crud-relay server", long_about = None)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:5555")]
    addr: SocketAddr,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Create an entry
    Create {
        id: String,
        title: String,
        message: String,
    },
    /// Delete an entry
    Delete { id: String },
    /// Mark an entry as read
    MarkRead { id: String },
    /// Mark everything as read
    Shake,
    /// Send a raw request line
    Raw { payload: String },
}

impl Action {
    fn request(&self) -> Request {
        match self {
            Action::Create { id, title, message } => Request::create(id, title, message),
            Action::Delete { id } => Request::delete(id),
            Action::MarkRead { id } => Request::mark_read(id),
            Action::Shake => Request::shake(),
            Action::Raw { payload } => Request::raw(payload.clone()),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = Client::new(cli.addr);

    match client.send(&cli.command.request()).await {
        Ok(response) => {
            println!("{response}");
            if response.starts_with("OK|") {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
