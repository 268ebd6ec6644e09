//! Session error taxonomy.

use thiserror::Error;

use crate::ids::{ConnectionId, SessionId};

/// Session does not exist (never created, or already deleted).
pub const SESSION_NOT_FOUND: &str = "SESSION_NOT_FOUND";
/// Session already holds two participants.
pub const SESSION_FULL: &str = "SESSION_FULL";
/// Caller is already a participant of the session it tried to join.
pub const ALREADY_JOINED: &str = "ALREADY_JOINED";
/// Caller is not a participant of the session it addressed.
pub const NOT_PARTICIPANT: &str = "NOT_PARTICIPANT";

/// Errors raised by session lifecycle operations.
///
/// Every error is terminal for the single triggering operation and leaves
/// the addressed session untouched.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The session id is unknown.
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// The session already has its two participants.
    #[error("session is full: {0}")]
    Full(SessionId),

    /// The connection is already a participant of this session.
    #[error("connection {connection_id} already joined session {session_id}")]
    AlreadyJoined {
        /// Session that was addressed.
        session_id: SessionId,
        /// Connection that tried to re-enter.
        connection_id: ConnectionId,
    },

    /// The connection is not a participant of this session.
    #[error("connection {connection_id} is not a participant of session {session_id}")]
    NotParticipant {
        /// Session that was addressed.
        session_id: SessionId,
        /// Offending connection.
        connection_id: ConnectionId,
    },
}

impl SessionError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => SESSION_NOT_FOUND,
            Self::Full(_) => SESSION_FULL,
            Self::AlreadyJoined { .. } => ALREADY_JOINED,
            Self::NotParticipant { .. } => NOT_PARTICIPANT,
        }
    }

    /// The session the failed operation addressed.
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::NotFound(id) | Self::Full(id) => id,
            Self::AlreadyJoined { session_id, .. } | Self::NotParticipant { session_id, .. } => {
                session_id
            }
        }
    }
}
