//! TCP listener for the command protocol.
//!
//! Binds a loopback socket, then accepts and fully services one connection
//! at a time: read one line, dispatch it, write the response, close.

use crate::config::Config;
use crate::events::ServerEvents;
use crate::protocol::dispatch;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Outcome of servicing one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    /// A response was written.
    Answered,
    /// The peer sent nothing (EOF, read error or timeout); nothing was written.
    Dropped,
}

/// Command server bound to its listening socket.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    max_line_length: usize,
    read_timeout: Option<Duration>,
    events: Arc<dyn ServerEvents>,
}

impl Server {
    /// Create, configure and bind the listening socket.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn bind(config: &Config, events: Arc<dyn ServerEvents>) -> io::Result<Self> {
        let listener = match create_listener(config.listen, config.backlog)
            .and_then(TcpListener::from_std)
        {
            Ok(listener) => listener,
            Err(e) => {
                events.setup_failed(config.listen, &e);
                return Err(e);
            }
        };
        let local_addr = listener.local_addr()?;
        events.listening(local_addr);

        Ok(Server {
            listener,
            local_addr,
            max_line_length: config.max_line_length,
            read_timeout: config.read_timeout,
            events,
        })
    }

    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept and service connections until `shutdown` turns true.
    ///
    /// Connections are handled inline, strictly in acceptance order. If the
    /// sending half of `shutdown` is dropped without signalling, the loop
    /// keeps running.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                _ = shutdown_requested(&mut shutdown) => break,
            };

            match accepted {
                Ok((stream, peer)) => {
                    self.events.connection_opened(peer);
                    self.serve(stream, peer).await;
                }
                Err(e) => self.events.accept_failed(&e),
            }
        }

        self.events.stopped();
    }

    async fn serve<S>(&self, stream: S, peer: SocketAddr) -> Served
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        serve_connection(
            stream,
            peer,
            self.max_line_length,
            self.read_timeout,
            self.events.as_ref(),
        )
        .await
    }
}

/// Service a single connection: one line in, one line out, then close.
pub async fn serve_connection<S>(
    stream: S,
    peer: SocketAddr,
    max_line_length: usize,
    read_timeout: Option<Duration>,
    events: &dyn ServerEvents,
) -> Served
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = Vec::with_capacity(max_line_length.min(1024));

    let read = read_request(&mut reader, &mut line, max_line_length);
    let read = match read_timeout {
        Some(limit) => match tokio::time::timeout(limit, read).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out")),
        },
        None => read.await,
    };

    match read {
        Ok(0) => {
            events.connection_dropped(peer, None);
            return Served::Dropped;
        }
        Ok(_) => {}
        Err(e) => {
            events.connection_dropped(peer, Some(&e));
            return Served::Dropped;
        }
    }

    let mut response = dispatch(&line, events).to_bytes();

    let stream = reader.get_mut();
    let written = async {
        stream.write_all_buf(&mut response).await?;
        stream.flush().await?;
        stream.shutdown().await
    }
    .await;

    if let Err(e) = written {
        events.write_failed(peer, &e);
    }
    Served::Answered
}

/// Read up to the first line feed, never more than `limit` bytes.
///
/// Returns 0 only when the peer sent nothing at all.
async fn read_request<R>(reader: &mut R, line: &mut Vec<u8>, limit: usize) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut limited = reader.take(limit as u64);
    limited.read_until(b'\n', line).await
}

/// Resolve once `shutdown` holds `true`. Pends forever if the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Create a loopback TCP listener with SO_REUSEADDR and the given backlog.
fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}
