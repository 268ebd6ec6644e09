//! Process-wide (but injectable) store of live sessions.
//!
//! Sessions live behind their own `Mutex`, so operations on different
//! sessions never contend. Lock order is always *session lock first, then
//! map shard*: no code path locks a session while holding a `DashMap` guard.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tracing::debug;

use crate::ids::{ConnectionId, DEFAULT_SESSION_ID_LENGTH, SessionId};
use crate::session::Session;

/// Shared handle to one live session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Owns every live [`Session`] plus the connection → session index.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionHandle>,
    memberships: DashMap<ConnectionId, SessionId>,
    id_length: usize,
}

impl SessionRegistry {
    /// Create an empty registry generating ids of the default length.
    pub fn new() -> Self {
        Self::with_id_length(DEFAULT_SESSION_ID_LENGTH)
    }

    /// Create an empty registry generating ids of `id_length` characters.
    pub fn with_id_length(id_length: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            memberships: DashMap::new(),
            id_length: id_length.max(1),
        }
    }

    /// Insert a fresh empty session and return its id.
    pub fn create(&self) -> SessionId {
        self.create_with(|_| {}).0
    }

    /// Insert a fresh session, letting `init` populate it before it becomes
    /// reachable by [`get`](Self::get).
    ///
    /// Generation is retried until the id is vacant among live sessions.
    pub fn create_with(&self, init: impl FnOnce(&mut Session)) -> (SessionId, SessionHandle) {
        let mut init = Some(init);
        loop {
            let id = SessionId::generate(self.id_length);
            match self.sessions.entry(id.clone()) {
                Entry::Occupied(_) => {
                    debug!(session_id = %id, "session id collision, regenerating");
                }
                Entry::Vacant(slot) => {
                    let mut session = Session::new(id.clone());
                    if let Some(init) = init.take() {
                        init(&mut session);
                    }
                    let handle = Arc::new(Mutex::new(session));
                    let _ = slot.insert(Arc::clone(&handle));
                    return (id, handle);
                }
            }
        }
    }

    /// Resolve a live session.
    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a session. No-op if absent.
    pub fn delete(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.remove(id).map(|(_, handle)| handle)
    }

    /// Whether `id` is live.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Copy of every live session handle, safe to lock one at a time.
    pub fn handles(&self) -> Vec<SessionHandle> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Record that `connection` now belongs to `session`, returning the
    /// session it belonged to before.
    pub fn bind(&self, connection: ConnectionId, session: SessionId) -> Option<SessionId> {
        self.memberships.insert(connection, session)
    }

    /// Forget that `connection` belongs to `session`. Leaves a binding to
    /// any other session alone.
    pub fn unbind(&self, connection: &ConnectionId, session: &SessionId) -> bool {
        self.memberships
            .remove_if(connection, |_, bound| bound == session)
            .is_some()
    }

    /// Session `connection` currently belongs to.
    pub fn membership(&self, connection: &ConnectionId) -> Option<SessionId> {
        self.memberships
            .get(connection)
            .map(|entry| entry.value().clone())
    }

    /// Number of bound connections.
    pub fn bound_connections(&self) -> usize {
        self.memberships.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .field("memberships", &self.memberships.len())
            .field("id_length", &self.id_length)
            .finish()
    }
}
