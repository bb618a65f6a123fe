//! Start-once guard around the listener thread.
//!
//! The listener runs on its own named OS thread with a single-threaded tokio
//! runtime, for the rest of the process lifetime. [`ServerState`] makes sure
//! that thread is launched at most once, even under concurrent start calls.

use crate::config::Config;
use crate::events::{ServerEvents, TracingEvents};
use crate::server::Server;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, OnceLock};
use std::thread;
use std::time::Duration;
use tokio::sync::watch;

const LISTENER_THREAD_NAME: &str = "crud-relay-listener";

/// Process-wide state backing [`start_server`].
static SERVER: ServerState = ServerState::new();

/// Start flag for one listener.
#[derive(Debug, Default)]
pub struct ServerState {
    started: AtomicBool,
}

/// Result of a start call.
#[derive(Debug)]
pub enum StartOutcome {
    /// The listener thread was launched by this call.
    Started(ServerHandle),
    /// A listener was already launched; nothing happened.
    AlreadyStarted,
    /// The thread could not be spawned; a later call may retry.
    SpawnFailed,
}

impl StartOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, StartOutcome::Started(_))
    }

    pub fn into_handle(self) -> Option<ServerHandle> {
        match self {
            StartOutcome::Started(handle) => Some(handle),
            _ => None,
        }
    }
}

/// Control side of a launched listener.
///
/// Dropping the handle leaves the listener running.
#[derive(Debug)]
pub struct ServerHandle {
    shutdown: watch::Sender<bool>,
    bound: mpsc::Receiver<SocketAddr>,
    local_addr: OnceLock<SocketAddr>,
}

impl ServerHandle {
    /// Ask the listener to exit once the current connection is done.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Wait up to `timeout` for the listener to report its bound address.
    ///
    /// Once known, the address is returned immediately. Returns `None` if
    /// setup failed or the timeout elapsed.
    pub fn local_addr(&self, timeout: Duration) -> Option<SocketAddr> {
        if let Some(addr) = self.local_addr.get() {
            return Some(*addr);
        }
        let addr = self.bound.recv_timeout(timeout).ok()?;
        Some(*self.local_addr.get_or_init(|| addr))
    }
}

impl ServerState {
    pub const fn new() -> Self {
        ServerState {
            started: AtomicBool::new(false),
        }
    }

    /// The state shared by the whole process.
    pub fn global() -> &'static ServerState {
        &SERVER
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Launch the listener unless one was already launched from this state.
    pub fn start(&self, config: Config, events: Arc<dyn ServerEvents>) -> StartOutcome {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            events.already_started();
            return StartOutcome::AlreadyStarted;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (bound_tx, bound_rx) = mpsc::sync_channel(1);

        let spawned = thread::Builder::new()
            .name(LISTENER_THREAD_NAME.to_string())
            .spawn({
                let events = Arc::clone(&events);
                move || listener_thread(config, events, shutdown_rx, bound_tx)
            });

        match spawned {
            Ok(_) => {
                events.thread_spawned();
                StartOutcome::Started(ServerHandle {
                    shutdown: shutdown_tx,
                    bound: bound_rx,
                    local_addr: OnceLock::new(),
                })
            }
            Err(e) => {
                events.spawn_failed(&e);
                self.started.store(false, Ordering::Release);
                StartOutcome::SpawnFailed
            }
        }
    }
}

/// Start the process-wide listener with the default configuration.
///
/// Repeated calls are no-ops.
pub fn start_server() {
    start_server_with(Config::default());
}

/// Start the process-wide listener with `config`.
pub fn start_server_with(config: Config) -> StartOutcome {
    ServerState::global().start(config, Arc::new(TracingEvents))
}

/// Body of the listener thread. Never panics on I/O failure.
fn listener_thread(
    config: Config,
    events: Arc<dyn ServerEvents>,
    shutdown: watch::Receiver<bool>,
    bound: mpsc::SyncSender<SocketAddr>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            events.setup_failed(config.listen, &e);
            return;
        }
    };

    runtime.block_on(async move {
        let server = match Server::bind(&config, events) {
            Ok(server) => server,
            // Already reported through the event sink.
            Err(_) => return,
        };
        let _ = bound.try_send(server.local_addr());
        server.run(shutdown).await;
    });
}
