//! The `Session` entity: two participant slots plus a swipe ledger.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::errors::SessionError;
use crate::ids::{ConnectionId, ItemId, SessionId};
use crate::ledger::SwipeLedger;

/// Participant capacity of a session.
pub const MAX_PARTICIPANTS: usize = 2;

/// A participant's binary decision on one item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    /// Swipe right.
    #[serde(alias = "right")]
    Accept,
    /// Swipe left.
    #[serde(alias = "left")]
    Reject,
}

impl Vote {
    /// Wire name of the vote.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
        }
    }

    /// Whether this is an accept vote.
    pub fn is_accept(self) -> bool {
        self == Self::Accept
    }
}

/// Lifecycle state, derived from the participant count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No participants. Only observable on a session that is being torn down.
    Empty,
    /// One participant, waiting for a partner.
    Waiting,
    /// Two participants, swiping.
    Active,
}

impl SessionState {
    /// Wire name of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Waiting => "waiting",
            Self::Active => "active",
        }
    }
}

/// Point-in-time read-only view of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Session id.
    pub session_id: SessionId,
    /// Derived lifecycle state.
    pub state: SessionState,
    /// Current participants, in join order.
    pub participants: Vec<ConnectionId>,
    /// Items currently matched by the present pair, sorted.
    pub matched_items: Vec<ItemId>,
    /// Total number of recorded votes.
    pub vote_count: usize,
}

/// A pairing session.
///
/// Owned exclusively by the [`SessionRegistry`](crate::registry::SessionRegistry);
/// callers reach it through a locked handle for the duration of one operation.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    participants: Vec<ConnectionId>,
    ledger: SwipeLedger,
    /// Items for which `match` was already announced to the current pair.
    matched: HashSet<ItemId>,
    /// Set once the last participant leaves. A closed session accepts nothing.
    closed: bool,
    last_activity: Instant,
}

impl Session {
    /// Create an empty session.
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            participants: Vec::with_capacity(MAX_PARTICIPANTS),
            ledger: SwipeLedger::new(),
            matched: HashSet::new(),
            closed: false,
            last_activity: Instant::now(),
        }
    }

    /// Session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Participants in join order.
    pub fn participants(&self) -> &[ConnectionId] {
        &self.participants
    }

    /// Whether `connection` currently holds a slot.
    pub fn contains(&self, connection: &ConnectionId) -> bool {
        self.participants.contains(connection)
    }

    /// Whether both slots are taken.
    pub fn is_full(&self) -> bool {
        self.participants.len() >= MAX_PARTICIPANTS
    }

    /// Whether the session was torn down.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Derived lifecycle state.
    pub fn state(&self) -> SessionState {
        match self.participants.len() {
            0 => SessionState::Empty,
            1 => SessionState::Waiting,
            _ => SessionState::Active,
        }
    }

    /// The swipe ledger.
    pub fn ledger(&self) -> &SwipeLedger {
        &self.ledger
    }

    /// Time since the last create / join / swipe / leave as of `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Admit `connection` into the next free slot.
    pub fn add_participant(&mut self, connection: ConnectionId) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::NotFound(self.id.clone()));
        }
        if self.contains(&connection) {
            return Err(SessionError::AlreadyJoined {
                session_id: self.id.clone(),
                connection_id: connection,
            });
        }
        if self.is_full() {
            return Err(SessionError::Full(self.id.clone()));
        }
        self.participants.push(connection);
        self.matched.clear();
        self.touch();
        Ok(())
    }

    /// Remove `connection` from its slot. Ledger entries are kept.
    ///
    /// Returns `false` if it was not a participant. Removing the last
    /// participant closes the session.
    pub fn remove_participant(&mut self, connection: &ConnectionId) -> bool {
        let before = self.participants.len();
        self.participants.retain(|c| c != connection);
        if self.participants.len() == before {
            return false;
        }
        self.matched.clear();
        self.touch();
        if self.participants.is_empty() {
            self.closed = true;
        }
        true
    }

    /// Evict every participant and close the session, returning who was in it.
    pub fn close(&mut self) -> Vec<ConnectionId> {
        self.closed = true;
        self.matched.clear();
        std::mem::take(&mut self.participants)
    }

    /// Record a vote, returning the one it replaced.
    pub fn record_vote(&mut self, voter: &ConnectionId, item: &ItemId, vote: Vote) -> Option<Vote> {
        self.touch();
        self.ledger.record(voter, item, vote)
    }

    /// Remember that `item` was announced as a match. Returns `true` if it
    /// was not already announced.
    pub fn mark_matched(&mut self, item: &ItemId) -> bool {
        self.matched.insert(item.clone())
    }

    /// Forget a previous match announcement for `item`.
    pub fn unmark_matched(&mut self, item: &ItemId) {
        let _ = self.matched.remove(item);
    }

    /// Read-only view.
    pub fn snapshot(&self) -> SessionSnapshot {
        let mut matched_items: Vec<ItemId> = self.matched.iter().cloned().collect();
        matched_items.sort();
        SessionSnapshot {
            session_id: self.id.clone(),
            state: self.state(),
            participants: self.participants.clone(),
            matched_items,
            vote_count: self.ledger.len(),
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}
