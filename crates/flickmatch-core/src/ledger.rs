//! Swipe ledger: participant → item → vote.

use std::collections::HashMap;

use crate::ids::{ConnectionId, ItemId};
use crate::session::Vote;

/// Votes cast inside one session.
///
/// Entries are never removed. A participant that leaves keeps its votes;
/// overwriting a vote on the same item is last-write-wins.
#[derive(Clone, Debug, Default)]
pub struct SwipeLedger {
    votes: HashMap<ConnectionId, HashMap<ItemId, Vote>>,
}

impl SwipeLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `vote` by `voter` on `item`, returning the vote it replaced.
    pub fn record(&mut self, voter: &ConnectionId, item: &ItemId, vote: Vote) -> Option<Vote> {
        self.votes
            .entry(voter.clone())
            .or_default()
            .insert(item.clone(), vote)
    }

    /// The vote `voter` cast on `item`, if any.
    pub fn vote(&self, voter: &ConnectionId, item: &ItemId) -> Option<Vote> {
        self.votes.get(voter)?.get(item).copied()
    }

    /// Connections that have cast at least one vote.
    pub fn voters(&self) -> impl Iterator<Item = &ConnectionId> {
        self.votes.keys()
    }

    /// Total number of (voter, item) entries.
    pub fn len(&self) -> usize {
        self.votes.values().map(HashMap::len).sum()
    }

    /// Whether no vote has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
