//! Diagnostic events emitted by the listener and the request handler.
//!
//! The server never calls the logging macros directly; it reports what
//! happened through a [`ServerEvents`] implementation handed to it at start.
//! [`TracingEvents`] forwards everything to `tracing`.

use std::io;
use std::net::SocketAddr;

use crate::protocol::CommandKind;

/// Sink for server diagnostics.
pub trait ServerEvents: Send + Sync {
    /// The listening socket is bound and accepting.
    fn listening(&self, addr: SocketAddr);

    /// Socket creation, bind or listen failed. The loop will not run.
    fn setup_failed(&self, addr: SocketAddr, error: &io::Error);

    /// `accept` failed; the loop keeps going.
    fn accept_failed(&self, error: &io::Error);

    /// A connection was accepted.
    fn connection_opened(&self, peer: SocketAddr);

    /// The peer closed or errored before sending a line.
    fn connection_dropped(&self, peer: SocketAddr, error: Option<&io::Error>);

    /// A request line was received (already truncated at the first line end).
    fn received(&self, line: &[u8]);

    /// A supported command was dispatched.
    fn command_handled(&self, kind: CommandKind, argument: &[u8]);

    /// The line matched no known command.
    fn unknown_command(&self, line: &[u8]);

    /// Writing the response failed.
    fn write_failed(&self, peer: SocketAddr, error: &io::Error);

    /// The loop observed the shutdown signal and is exiting.
    fn stopped(&self);

    /// The listener thread was spawned.
    fn thread_spawned(&self);

    /// A start call found the listener already launched.
    fn already_started(&self);

    /// The listener thread could not be spawned.
    fn spawn_failed(&self, error: &io::Error);
}

/// Forwards server events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl ServerEvents for TracingEvents {
    fn listening(&self, addr: SocketAddr) {
        tracing::info!(address = %addr, "Command server listening");
    }

    fn setup_failed(&self, addr: SocketAddr, error: &io::Error) {
        tracing::error!(address = %addr, error = %error, "Failed to set up listener");
    }

    fn accept_failed(&self, error: &io::Error) {
        tracing::error!(error = %error, "Failed to accept connection");
    }

    fn connection_opened(&self, peer: SocketAddr) {
        tracing::debug!(peer = %peer, "New connection");
    }

    fn connection_dropped(&self, peer: SocketAddr, error: Option<&io::Error>) {
        match error {
            Some(e) => tracing::debug!(peer = %peer, error = %e, "Connection dropped"),
            None => tracing::trace!(peer = %peer, "Connection closed without a request"),
        }
    }

    fn received(&self, line: &[u8]) {
        tracing::info!(line = %String::from_utf8_lossy(line), "Received");
    }

    fn command_handled(&self, kind: CommandKind, argument: &[u8]) {
        if kind == CommandKind::Shake {
            tracing::info!("Handled SHAKE: marking all as read");
        } else {
            tracing::info!(
                command = kind.name(),
                argument = %String::from_utf8_lossy(argument),
                "Handled command"
            );
        }
    }

    fn unknown_command(&self, line: &[u8]) {
        tracing::warn!(line = %String::from_utf8_lossy(line), "Unknown command");
    }

    fn write_failed(&self, peer: SocketAddr, error: &io::Error) {
        tracing::debug!(peer = %peer, error = %error, "Failed to write response");
    }

    fn stopped(&self) {
        tracing::info!("Command server stopped");
    }

    fn thread_spawned(&self) {
        tracing::info!("Server thread created");
    }

    fn already_started(&self) {
        tracing::info!("Server already started");
    }

    fn spawn_failed(&self, error: &io::Error) {
        tracing::error!(error = %error, "Failed to create server thread");
    }
}

/// Records events in memory so tests can assert on them.
#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Event {
        Listening(SocketAddr),
        SetupFailed,
        AcceptFailed,
        Opened,
        Dropped,
        Received(Vec<u8>),
        Handled(CommandKind, Vec<u8>),
        Unknown(Vec<u8>),
        WriteFailed,
        Stopped,
        ThreadSpawned,
        AlreadyStarted,
        SpawnFailed,
    }

    #[derive(Debug, Default)]
    pub(crate) struct RecordingEvents {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingEvents {
        pub(crate) fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl ServerEvents for RecordingEvents {
        fn listening(&self, addr: SocketAddr) {
            self.push(Event::Listening(addr));
        }

        fn setup_failed(&self, _addr: SocketAddr, _error: &io::Error) {
            self.push(Event::SetupFailed);
        }

        fn accept_failed(&self, _error: &io::Error) {
            self.push(Event::AcceptFailed);
        }

        fn connection_opened(&self, _peer: SocketAddr) {
            self.push(Event::Opened);
        }

        fn connection_dropped(&self, _peer: SocketAddr, _error: Option<&io::Error>) {
            self.push(Event::Dropped);
        }

        fn received(&self, line: &[u8]) {
            self.push(Event::Received(line.to_vec()));
        }

        fn command_handled(&self, kind: CommandKind, argument: &[u8]) {
            self.push(Event::Handled(kind, argument.to_vec()));
        }

        fn unknown_command(&self, line: &[u8]) {
            self.push(Event::Unknown(line.to_vec()));
        }

        fn write_failed(&self, _peer: SocketAddr, _error: &io::Error) {
            self.push(Event::WriteFailed);
        }

        fn stopped(&self) {
            self.push(Event::Stopped);
        }

        fn thread_spawned(&self) {
            self.push(Event::ThreadSpawned);
        }

        fn already_started(&self) {
            self.push(Event::AlreadyStarted);
        }

        fn spawn_failed(&self, _error: &io::Error) {
            self.push(Event::SpawnFailed);
        }
    }
}
