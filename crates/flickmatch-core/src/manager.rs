//! Session lifecycle manager: create, join, swipe, leave, disconnect, expire.
//!
//! Every operation re-resolves its session through the [`SessionRegistry`]
//! and holds that session's lock for its whole duration, so operations on
//! one session are serialized while different sessions proceed in parallel.
//! Events are emitted while the lock is still held.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use crate::errors::SessionError;
use crate::events::{EndReason, EventEmitter, SessionEvent};
use crate::ids::{ConnectionId, ItemId, SessionId};
use crate::matcher;
use crate::registry::SessionRegistry;
use crate::session::{Session, SessionSnapshot, SessionState, Vote};

/// Result of a recorded swipe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwipeOutcome {
    /// The vote this swipe replaced, if the voter had already voted on the item.
    pub previous: Option<Vote>,
    /// Whether the item is a match for the current pair after this swipe.
    pub matched: bool,
    /// Whether this swipe produced a new `Matched` event.
    pub announced: bool,
}

/// Orchestrates session mutations and publishes the resulting events.
pub struct SessionManager {
    registry: Arc<SessionRegistry>,
    emitter: Arc<EventEmitter>,
}

impl SessionManager {
    /// Create a manager over an existing registry and emitter.
    pub fn new(registry: Arc<SessionRegistry>, emitter: Arc<EventEmitter>) -> Self {
        Self { registry, emitter }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.emitter.subscribe()
    }

    /// Create a session with `connection` as its sole participant.
    ///
    /// If `connection` was in another session it leaves that one afterwards.
    #[instrument(skip_all, fields(conn_id = %connection))]
    pub fn create_session(&self, connection: &ConnectionId) -> SessionId {
        let (session_id, prior) = loop {
            let (session_id, handle) = self.registry.create_with(|session| {
                // A fresh session is open and empty; admission cannot fail.
                let _ = session.add_participant(connection.clone());
            });
            let session = handle.lock();
            // The idle sweeper may have torn it down before we got the lock.
            if session.is_closed() {
                debug!(session_id = %session_id, "new session expired before bind, retrying");
                continue;
            }
            break (
                session_id.clone(),
                self.registry.bind(connection.clone(), session_id),
            );
        };
        info!(session_id = %session_id, "session created");

        if let Some(prior) = prior.filter(|p| *p != session_id) {
            let _ = self.remove_participant(&prior, connection);
        }
        session_id
    }

    /// Admit `connection` as the second participant of `session_id`.
    ///
    /// Returns the participants after the join. Filling the second slot
    /// emits [`SessionEvent::Started`] to both of them.
    #[instrument(skip_all, fields(session_id = %session_id, conn_id = %connection))]
    pub fn join_session(
        &self,
        session_id: &SessionId,
        connection: &ConnectionId,
    ) -> Result<Vec<ConnectionId>, SessionError> {
        let handle = self
            .registry
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.clone()))?;

        let (participants, prior) = {
            let mut session = handle.lock();
            session.add_participant(connection.clone()).inspect_err(|e| {
                debug!(code = e.code(), "join rejected");
            })?;
            let prior = self.registry.bind(connection.clone(), session_id.clone());
            let participants = session.participants().to_vec();
            if session.state() == SessionState::Active {
                let receivers = self.emitter.emit(SessionEvent::Started {
                    session_id: session_id.clone(),
                    participants: participants.clone(),
                });
                debug!(receivers, "session started");
            }
            (participants, prior)
        };
        info!(participants = participants.len(), "session joined");

        if let Some(prior) = prior.filter(|p| p != session_id) {
            let _ = self.remove_participant(&prior, connection);
        }
        Ok(participants)
    }

    /// Record `connection`'s vote on `item` and check for a mutual match.
    ///
    /// A match is announced only when the item turns from not-matched into
    /// matched for the current pair.
    #[instrument(skip_all, fields(session_id = %session_id, conn_id = %connection, item_id = %item))]
    pub fn record_swipe(
        &self,
        session_id: &SessionId,
        connection: &ConnectionId,
        item: &ItemId,
        vote: Vote,
    ) -> Result<SwipeOutcome, SessionError> {
        let handle = self
            .registry
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.clone()))?;
        let mut session = handle.lock();
        if session.is_closed() {
            return Err(SessionError::NotFound(session_id.clone()));
        }
        if !session.contains(connection) {
            return Err(SessionError::NotParticipant {
                session_id: session_id.clone(),
                connection_id: connection.clone(),
            });
        }

        let previous = session.record_vote(connection, item, vote);
        let matched = matcher::is_match(&session, item);
        let announced = if matched {
            session.mark_matched(item)
        } else {
            session.unmark_matched(item);
            false
        };

        if announced {
            let _ = self.emitter.emit(SessionEvent::Matched {
                session_id: session_id.clone(),
                item_id: item.clone(),
                participants: session.participants().to_vec(),
            });
            info!("match");
        } else {
            debug!(vote = vote.as_str(), matched, "swipe recorded");
        }

        Ok(SwipeOutcome {
            previous,
            matched,
            announced,
        })
    }

    /// Remove `connection` from `session_id` without closing the connection.
    #[instrument(skip_all, fields(session_id = %session_id, conn_id = %connection))]
    pub fn leave_session(
        &self,
        session_id: &SessionId,
        connection: &ConnectionId,
    ) -> Result<(), SessionError> {
        let handle = self
            .registry
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.clone()))?;
        let mut session = handle.lock();
        if session.is_closed() {
            return Err(SessionError::NotFound(session_id.clone()));
        }
        if !session.contains(connection) {
            return Err(SessionError::NotParticipant {
                session_id: session_id.clone(),
                connection_id: connection.clone(),
            });
        }
        let _ = self.registry.unbind(connection, session_id);
        self.detach(&mut session, connection);
        info!("participant left");
        Ok(())
    }

    /// Drop `connection` from whatever session it belongs to.
    ///
    /// Returns the session it was removed from. Never fails; an unbound
    /// connection is a no-op.
    #[instrument(skip_all, fields(conn_id = %connection))]
    pub fn disconnect(&self, connection: &ConnectionId) -> Option<SessionId> {
        let session_id = self.registry.membership(connection)?;
        let _ = self.registry.unbind(connection, &session_id);
        if self.remove_participant(&session_id, connection) {
            debug!(session_id = %session_id, "removed disconnected participant");
            Some(session_id)
        } else {
            None
        }
    }

    /// Tear down every session idle for at least `max_idle`.
    ///
    /// Participants are unbound and receive [`SessionEvent::Ended`].
    pub fn expire_idle(&self, max_idle: Duration) -> Vec<SessionId> {
        let now = Instant::now();
        let mut expired = Vec::new();
        for handle in self.registry.handles() {
            let mut session = handle.lock();
            if session.is_closed() || session.idle_for(now) < max_idle {
                continue;
            }
            let session_id = session.id().clone();
            let participants = session.close();
            for participant in &participants {
                let _ = self.registry.unbind(participant, &session_id);
            }
            let _ = self.registry.delete(&session_id);
            let _ = self.emitter.emit(SessionEvent::Ended {
                session_id: session_id.clone(),
                reason: EndReason::Idle,
                participants,
            });
            info!(session_id = %session_id, "idle session expired");
            expired.push(session_id);
        }
        expired
    }

    /// Read-only view of a live session.
    pub fn snapshot(&self, session_id: &SessionId) -> Option<SessionSnapshot> {
        let handle = self.registry.get(session_id)?;
        let session = handle.lock();
        (!session.is_closed()).then(|| session.snapshot())
    }

    /// Session `connection` currently belongs to.
    pub fn session_of(&self, connection: &ConnectionId) -> Option<SessionId> {
        self.registry.membership(connection)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Remove `connection` from `session_id` if it is a participant there.
    /// The membership index is the caller's concern.
    fn remove_participant(&self, session_id: &SessionId, connection: &ConnectionId) -> bool {
        let Some(handle) = self.registry.get(session_id) else {
            return false;
        };
        let mut session = handle.lock();
        if !session.contains(connection) {
            return false;
        }
        self.detach(&mut session, connection);
        true
    }

    /// Remove a known participant from a locked session, deleting the
    /// session once it is empty.
    fn detach(&self, session: &mut Session, connection: &ConnectionId) {
        let _ = session.remove_participant(connection);
        if session.is_closed() {
            let _ = self.registry.delete(session.id());
            debug!(session_id = %session.id(), "empty session deleted");
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(EventEmitter::default()),
        )
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("registry", &self.registry)
            .field("emitter", &self.emitter)
            .finish()
    }
}
