use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Instant,
};

use crate::collaborators::Collaborators;

/// Plain-text configured credentials. §1's Non-goals explicitly exclude
/// credential hot-reload, so this is a fixed snapshot taken at startup.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

/// Fixed-capacity slot counter. §9 calls the original's array of
/// pre-allocated `Connection_t` records "a consequence of pre-allocated
/// connection records, not essential" — here each connection gets its own
/// thread and owned state, so the slot table collapses to a bound counter
/// guarding acceptance, the one piece of shared mutable state §5 requires a
/// mutex for.
#[derive(Debug)]
struct SlotTable {
    active: usize,
    max: usize,
}

impl SlotTable {
    fn try_acquire(&mut self) -> bool {
        if self.active >= self.max {
            return false;
        }
        self.active += 1;
        true
    }

    fn release(&mut self) {
        debug_assert!(self.active > 0);
        self.active = self.active.saturating_sub(1);
    }
}

/// Global control-subsystem state (§3 `ServerState`), minus the listening
/// socket itself (owned by [`crate::server::ControlServer`]).
pub struct ServerState {
    pub streamer_name: String,
    pub credentials: Credentials,
    start_time: Instant,
    slots: Mutex<SlotTable>,
    pub collaborators: Arc<dyn Collaborators>,
}

impl ServerState {
    pub fn new(
        streamer_name: impl Into<String>,
        credentials: Credentials,
        n_max: usize,
        collaborators: Arc<dyn Collaborators>,
    ) -> Arc<Self> {
        Arc::new(Self {
            streamer_name: streamer_name.into(),
            credentials,
            start_time: Instant::now(),
            slots: Mutex::new(SlotTable { active: 0, max: n_max.max(1) }),
            collaborators,
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// `N_MAX` enforcement (§4.2 step 2, property 4 in §8): only a worker
    /// holding a successfully acquired slot may run; the acceptor drops the
    /// socket immediately if this returns `false`.
    pub(crate) fn try_acquire_slot(&self) -> bool {
        self.slots.lock().expect("slot mutex poisoned").try_acquire()
    }

    pub(crate) fn release_slot(&self) {
        self.slots.lock().expect("slot mutex poisoned").release();
    }

    #[cfg(test)]
    pub(crate) fn active_slots(&self) -> usize {
        self.slots.lock().expect("slot mutex poisoned").active
    }
}

/// Per-connection state (§3 `Connection`), owned entirely by the worker
/// thread handling that socket. The socket itself and the worker thread
/// handle aren't modelled here — in Rust the thread *is* the worker, and it
/// owns the `TcpStream` directly, so there's nothing for `Connection` to
/// hold a reference back to.
pub struct Connection {
    pub peer_addr: SocketAddr,
    pub authenticated: bool,
    pub connected: bool,
}

impl Connection {
    pub fn new(peer_addr: SocketAddr) -> Self {
        Self { peer_addr, authenticated: false, connected: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::testutil::NullCollaborators;

    #[test]
    fn slot_table_enforces_n_max() {
        let state = ServerState::new(
            "box1",
            Credentials { username: "u".into(), password: "p".into() },
            2,
            Arc::new(NullCollaborators),
        );
        assert!(state.try_acquire_slot());
        assert!(state.try_acquire_slot());
        assert!(!state.try_acquire_slot());
        assert_eq!(state.active_slots(), 2);
        state.release_slot();
        assert!(state.try_acquire_slot());
        assert_eq!(state.active_slots(), 2);
    }
}
