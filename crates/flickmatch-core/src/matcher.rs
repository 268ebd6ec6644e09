//! Mutual-match decision.

use crate::ids::ItemId;
use crate::session::{MAX_PARTICIPANTS, Session, Vote};

/// Whether `item` is currently a match in `session`.
///
/// True iff the session has exactly two participants and each of them has
/// an accept vote recorded for `item`. Votes from connections that already
/// left are ignored.
pub fn is_match(session: &Session, item: &ItemId) -> bool {
    let participants = session.participants();
    participants.len() == MAX_PARTICIPANTS
        && participants.iter().all(|p| {
            session
                .ledger()
                .vote(p, item)
                .is_some_and(Vote::is_accept)
        })
}
