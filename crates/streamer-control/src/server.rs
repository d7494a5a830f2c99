//! The accept loop and per-connection worker threads (§4.2 ControlServer).
//!
//! The acceptor is non-blocking `mio`, polled with a 200 ms timeout so it
//! notices shutdown promptly (§4.2, §5). Each accepted socket is then handed
//! to its own worker thread as an ordinary blocking `std::net::TcpStream` —
//! §5 says workers suspend on `read`/`write`, which is the natural fit for
//! thread-per-connection, not another non-blocking reactor.

use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use mio::{Events, Interest, Poll, Token};
use tracing::{debug, info, warn};

use crate::collaborators::Collaborators;
use crate::dispatch::dispatch;
use crate::error::Error;
use crate::state::{Connection, Credentials, ServerState};

const LISTENER_TOKEN: Token = Token(0);
const POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// `54197 + adapter_index` per §4.2.
pub const BASE_PORT: u16 = 54_197;

/// Shutdown handles for every worker's socket, keyed by a monotonic
/// connection id (not `peer_addr` — nothing rules out two workers racing
/// through accept/exit with the id not yet freed). [`ControlServer::shutdown`]
/// walks this table and calls `shutdown(Both)` on each one so a worker
/// blocked in `recv` on an otherwise-idle connection observes the socket
/// fail instead of waiting for its client to hang up (§4.2 "Deinit closes
/// the listen socket and every active connection's socket").
type ConnectionTable = Mutex<HashMap<u64, std::net::TcpStream>>;

pub struct ControlServer {
    state: Arc<ServerState>,
    shutdown: Arc<AtomicBool>,
    connections: Arc<ConnectionTable>,
    next_conn_id: AtomicU64,
}

impl ControlServer {
    pub fn new(
        streamer_name: impl Into<String>,
        credentials: Credentials,
        n_max: usize,
        collaborators: Arc<dyn Collaborators>,
    ) -> Self {
        Self {
            state: ServerState::new(streamer_name, credentials, n_max, collaborators),
            shutdown: Arc::new(AtomicBool::new(false)),
            connections: Arc::new(Mutex::new(HashMap::new())),
            next_conn_id: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Runs the accept loop on the calling thread until [`shutdown`] is
    /// called from another thread. Returns once the listener is closed.
    ///
    /// [`shutdown`]: ControlServer::shutdown
    pub fn run(&self, bind_addr: SocketAddr) -> Result<(), Error> {
        let mut listener = mio::net::TcpListener::bind(bind_addr)?;
        let poll = Poll::new()?;
        poll.registry().register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
        let mut events = Events::with_capacity(16);

        info!(%bind_addr, "control server listening");

        while !self.shutdown.load(Ordering::Acquire) {
            match poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            for event in events.iter() {
                if event.token() != LISTENER_TOKEN {
                    continue;
                }
                self.drain_accepts(&listener);
            }
        }

        let _ = poll.registry().deregister(&mut listener);
        Ok(())
    }

    fn drain_accepts(&self, listener: &mio::net::TcpListener) {
        loop {
            match listener.accept() {
                Ok((stream, peer_addr)) => self.accept(stream, peer_addr),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    return;
                }
            }
        }
    }

    /// Signals the accept loop to stop and closes every active connection's
    /// socket (§4.2 "Shutdown", §5's process-wide `ExitProgram` flag: "each
    /// worker checks between frames"). A worker blocked in `recv` observes
    /// its socket fail right away instead of waiting for the client to hang
    /// up on its own; this call does not wait for workers to exit.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        let connections = self.connections.lock().expect("connections mutex poisoned");
        for stream in connections.values() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!(error = %e, "closing active connection during shutdown");
            }
        }
    }

    fn accept(&self, stream: mio::net::TcpStream, peer_addr: SocketAddr) {
        if !self.state.try_acquire_slot() {
            warn!(%peer_addr, "no free connection slot, dropping");
            drop(stream);
            return;
        }

        let state = Arc::clone(&self.state);
        let connections = Arc::clone(&self.connections);
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let spawned = thread::Builder::new()
            .name(format!("ctrl-worker-{peer_addr}"))
            .spawn(move || {
                if let Ok(blocking) = into_blocking(stream).inspect_err(|e| {
                    warn!(%peer_addr, error = %e, "failed to convert accepted socket");
                }) {
                    register_connection(&connections, conn_id, &blocking, peer_addr);
                    worker_loop(&state, peer_addr, blocking);
                    connections.lock().expect("connections mutex poisoned").remove(&conn_id);
                }
                state.release_slot();
            });

        if let Err(e) = spawned {
            warn!(%peer_addr, error = %e, "failed to spawn worker thread");
            self.state.release_slot();
        }
    }
}

/// Stashes a clone of the worker's socket in the shared connection table so
/// [`ControlServer::shutdown`] can force it closed from another thread.
fn register_connection(
    connections: &ConnectionTable,
    conn_id: u64,
    stream: &std::net::TcpStream,
    peer_addr: SocketAddr,
) {
    match stream.try_clone() {
        Ok(handle) => {
            connections.lock().expect("connections mutex poisoned").insert(conn_id, handle);
        }
        Err(e) => warn!(%peer_addr, error = %e, "failed to clone socket for shutdown tracking"),
    }
}

#[cfg(unix)]
fn into_blocking(stream: mio::net::TcpStream) -> io::Result<std::net::TcpStream> {
    use std::os::unix::io::{FromRawFd, IntoRawFd};

    // SAFETY: `stream` was never registered with a `Poll` of its own (only
    // the listener is), so handing its fd to a fresh std TcpStream is safe
    // and leaves nothing double-owned.
    let blocking = unsafe { std::net::TcpStream::from_raw_fd(stream.into_raw_fd()) };
    blocking.set_nonblocking(false)?;
    Ok(blocking)
}

#[cfg(not(unix))]
fn into_blocking(_stream: mio::net::TcpStream) -> io::Result<std::net::TcpStream> {
    Err(io::Error::other("converting an accepted socket to blocking mode is only implemented on unix"))
}

fn worker_loop(state: &ServerState, peer_addr: SocketAddr, mut stream: std::net::TcpStream) {
    let mut conn = Connection::new(peer_addr);
    let mut msg = streamer_proto::Message::new();
    debug!(%peer_addr, "worker started");

    loop {
        if let Err(e) = streamer_proto::recv(&mut stream, &mut msg) {
            debug!(%peer_addr, error = %e, "connection closed on recv");
            break;
        }

        dispatch(state, &mut conn, &mut msg);

        if !conn.connected {
            debug!(%peer_addr, "handler closed connection after malformed request");
            break;
        }

        if let Err(e) = streamer_proto::send(&mut stream, &msg) {
            debug!(%peer_addr, error = %e, "connection closed on send");
            break;
        }
    }

    debug!(%peer_addr, "worker exiting");
}
