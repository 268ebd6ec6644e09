//! # flickmatch-core
//!
//! Pairing sessions, swipe bookkeeping and mutual-match detection.
//!
//! - [`registry::SessionRegistry`]: owns every live [`session::Session`]
//! - [`ledger::SwipeLedger`]: per-session participant → item → vote map
//! - [`matcher`]: pure "did both participants accept this item" decision
//! - [`manager::SessionManager`]: create / join / swipe / leave / disconnect
//!   orchestration, publishing [`events::SessionEvent`]s to subscribers
//!
//! Nothing in this crate performs I/O. Delivery of events to clients is the
//! job of whoever subscribes to the [`events::EventEmitter`].

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod ids;
pub mod ledger;
pub mod manager;
pub mod matcher;
pub mod registry;
pub mod session;

pub use errors::SessionError;
pub use events::{EndReason, EventEmitter, SessionEvent};
pub use ids::{ConnectionId, ItemId, SessionId};
pub use manager::{SessionManager, SwipeOutcome};
pub use registry::SessionRegistry;
pub use session::{MAX_PARTICIPANTS, Session, SessionSnapshot, SessionState, Vote};
