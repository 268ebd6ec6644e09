//! RPC error codes and error type.

use flickmatch_core::SessionError;
use serde_json::json;

use crate::rpc::types::RpcErrorBody;

/// Invalid or missing parameters.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
/// Unexpected internal error.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
/// Method not found in the registry.
pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
/// Session does not exist.
pub const SESSION_NOT_FOUND: &str = flickmatch_core::errors::SESSION_NOT_FOUND;
/// Session already has two participants.
pub const SESSION_FULL: &str = flickmatch_core::errors::SESSION_FULL;
/// Caller already belongs to the session.
pub const ALREADY_JOINED: &str = flickmatch_core::errors::ALREADY_JOINED;
/// Caller does not belong to the session.
pub const NOT_PARTICIPANT: &str = flickmatch_core::errors::NOT_PARTICIPANT;

/// Message returned for every failed join, whatever the reason.
pub const JOIN_FAILED_MESSAGE: &str = "Session is full or does not exist";

/// RPC error type returned by handlers.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Required parameter missing or wrong type.
    #[error("{message}")]
    InvalidParams {
        /// Description of what is wrong.
        message: String,
    },

    /// Requested resource not found.
    #[error("{message}")]
    NotFound {
        /// Specific error code (e.g. `SESSION_NOT_FOUND`).
        code: String,
        /// Human-readable message.
        message: String,
    },

    /// Internal server error.
    #[error("{message}")]
    Internal {
        /// Description.
        message: String,
    },

    /// Domain-specific error with arbitrary code.
    #[error("{message}")]
    Custom {
        /// Machine-readable code.
        code: String,
        /// Human-readable message.
        message: String,
        /// Optional structured details.
        details: Option<serde_json::Value>,
    },
}

impl RpcError {
    /// Machine-readable error code for this variant.
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::NotFound { code, .. } | Self::Custom { code, .. } => code,
            Self::Internal { .. } => INTERNAL_ERROR,
        }
    }

    /// Convert to the wire-format error body.
    pub fn to_error_body(&self) -> RpcErrorBody {
        RpcErrorBody {
            code: self.code().to_owned(),
            message: self.to_string(),
            details: match self {
                Self::Custom { details, .. } => details.clone(),
                _ => None,
            },
        }
    }

    /// Collapse a failed join into the single client-facing message while
    /// keeping the precise code.
    pub fn join_failed(err: &SessionError) -> Self {
        Self::Custom {
            code: err.code().to_owned(),
            message: JOIN_FAILED_MESSAGE.to_owned(),
            details: Some(json!({ "sessionId": err.session_id().as_str() })),
        }
    }
}

impl From<SessionError> for RpcError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(_) => Self::NotFound {
                code: err.code().to_owned(),
                message: err.to_string(),
            },
            SessionError::Full(_)
            | SessionError::AlreadyJoined { .. }
            | SessionError::NotParticipant { .. } => Self::Custom {
                code: err.code().to_owned(),
                message: err.to_string(),
                details: Some(json!({ "sessionId": err.session_id().as_str() })),
            },
        }
    }
}
