//! JSON request/response protocol spoken over the `WebSocket`.

pub mod context;
pub mod errors;
pub mod handlers;
pub mod registry;
pub mod types;
