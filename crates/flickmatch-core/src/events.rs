//! Session lifecycle events and the broadcast channel that carries them.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::ids::{ConnectionId, ItemId, SessionId};

/// Default buffer of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Why a session ended without its participants leaving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    /// No activity for longer than the configured idle timeout.
    Idle,
}

impl EndReason {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
        }
    }
}

/// Something the participants of a session must be told about.
///
/// Each event carries its own recipient list, captured at the moment it
/// was produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The second participant joined.
    Started {
        /// Session that became active.
        session_id: SessionId,
        /// Both participants.
        participants: Vec<ConnectionId>,
    },
    /// Both participants accepted the same item.
    Matched {
        /// Session the match happened in.
        session_id: SessionId,
        /// The matched item.
        item_id: ItemId,
        /// Both participants.
        participants: Vec<ConnectionId>,
    },
    /// The session was torn down by the server.
    Ended {
        /// Session that ended.
        session_id: SessionId,
        /// Why.
        reason: EndReason,
        /// Participants at the time it ended.
        participants: Vec<ConnectionId>,
    },
}

impl SessionEvent {
    /// Wire event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "session.started",
            Self::Matched { .. } => "session.matched",
            Self::Ended { .. } => "session.ended",
        }
    }

    /// Session the event belongs to.
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Started { session_id, .. }
            | Self::Matched { session_id, .. }
            | Self::Ended { session_id, .. } => session_id,
        }
    }

    /// Connections that must receive the event.
    pub fn recipients(&self) -> &[ConnectionId] {
        match self {
            Self::Started { participants, .. }
            | Self::Matched { participants, .. }
            | Self::Ended { participants, .. } => participants,
        }
    }
}

/// Fan-out of [`SessionEvent`]s to any number of subscribers.
pub struct EventEmitter {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventEmitter {
    /// Create an emitter buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Returns the number of subscribers that received it.
    pub fn emit(&self, event: SessionEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched() -> SessionEvent {
        SessionEvent::Matched {
            session_id: "s1".into(),
            item_id: "m1".into(),
            participants: vec!["c1".into(), "c2".into()],
        }
    }

    #[test]
    fn event_types() {
        let started = SessionEvent::Started {
            session_id: "s1".into(),
            participants: vec![],
        };
        let ended = SessionEvent::Ended {
            session_id: "s1".into(),
            reason: EndReason::Idle,
            participants: vec![],
        };
        assert_eq!(started.event_type(), "session.started");
        assert_eq!(matched().event_type(), "session.matched");
        assert_eq!(ended.event_type(), "session.ended");
    }

    #[test]
    fn accessors() {
        let ev = matched();
        assert_eq!(ev.session_id().as_str(), "s1");
        assert_eq!(ev.recipients().len(), 2);
        assert_eq!(EndReason::Idle.as_str(), "idle");
    }

    #[test]
    fn emit_without_subscribers_is_zero() {
        let emitter = EventEmitter::default();
        assert_eq!(emitter.emit(matched()), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let emitter = EventEmitter::new(8);
        let mut rx1 = emitter.subscribe();
        let mut rx2 = emitter.subscribe();
        assert_eq!(emitter.emit(matched()), 2);
        assert_eq!(rx1.recv().await.unwrap(), matched());
        assert_eq!(rx2.recv().await.unwrap(), matched());
    }
}
