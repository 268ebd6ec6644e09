//! Shared state handed to every RPC handler.

use std::sync::Arc;
use std::time::Instant;

use flickmatch_core::SessionManager;

/// Shared context passed to every RPC handler.
pub struct RpcContext {
    /// Session lifecycle manager.
    pub sessions: Arc<SessionManager>,
    /// When the server started.
    pub server_start_time: Instant,
}

impl RpcContext {
    /// Build a context over `sessions`, stamped with the current time.
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            server_start_time: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flickmatch_core::ConnectionId;

    #[test]
    fn context_shares_manager() {
        let sessions = Arc::new(SessionManager::default());
        let ctx = RpcContext::new(Arc::clone(&sessions));
        let _ = sessions.create_session(&ConnectionId::from("c1"));
        assert_eq!(ctx.sessions.session_count(), 1);
        assert!(ctx.server_start_time.elapsed().as_secs() < 5);
    }
}
