//! Client side of the command protocol.
//!
//! Builds request lines the way the mobile app does and sends each one on a
//! fresh connection, returning the server's status line.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::config::DEFAULT_PORT;

/// A single request line, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    payload: String,
}

impl Request {
    /// `CREATE|<id>|<title>|<message>`.
    ///
    /// `|` inside title and message becomes a space, and so do line breaks
    /// in the message, so the request stays one line with four fields.
    pub fn create(id: &str, title: &str, message: &str) -> Self {
        let title = title.replace('|', " ");
        let message = message.replace('|', " ").replace(['\r', '\n'], " ");
        Request {
            payload: format!("CREATE|{id}|{title}|{message}"),
        }
    }

    pub fn delete(id: &str) -> Self {
        Request {
            payload: format!("DELETE|{id}"),
        }
    }

    pub fn mark_read(id: &str) -> Self {
        Request {
            payload: format!("MARK_READ|{id}"),
        }
    }

    pub fn shake() -> Self {
        Request {
            payload: "SHAKE".to_string(),
        }
    }

    /// Arbitrary payload, sent as-is.
    pub fn raw(payload: impl Into<String>) -> Self {
        Request {
            payload: payload.into(),
        }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// Client errors
#[derive(Debug)]
pub enum ClientError {
    Io(io::Error),
    /// The server closed the connection without answering.
    NoResponse,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Io(e) => write!(f, "I/O error: {}", e),
            ClientError::NoResponse => write!(f, "Server closed the connection without a response"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Io(e) => Some(e),
            ClientError::NoResponse => None,
        }
    }
}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        ClientError::Io(e)
    }
}

/// Connection settings for talking to the command server.
#[derive(Debug, Clone, Copy)]
pub struct Client {
    addr: SocketAddr,
}

impl Default for Client {
    fn default() -> Self {
        Client::new(SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
    }
}

impl Client {
    pub fn new(addr: SocketAddr) -> Self {
        Client { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Send one request and return the response line without its terminator.
    pub async fn send(&self, request: &Request) -> Result<String, ClientError> {
        let stream = TcpStream::connect(self.addr).await?;
        let (reader, mut writer) = stream.into_split();

        let mut line = String::with_capacity(request.payload.len() + 1);
        line.push_str(&request.payload);
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;

        let mut reader = BufReader::new(reader);
        let mut response = String::new();
        if reader.read_line(&mut response).await? == 0 {
            return Err(ClientError::NoResponse);
        }

        let trimmed = response.trim_end_matches(['\r', '\n']).len();
        response.truncate(trimmed);
        tracing::debug!(request = %request.payload, response = %response, "Response received");
        Ok(response)
    }
}
