// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the vktg relay.

use thiserror::Error;

/// The primary error type used across all vktg adapters and relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport, DNS or non-200 HTTP failure talking to the source network.
    #[error("upstream unavailable: {message}")]
    Connectivity {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The long-poll server reported the session or cursor as stale.
    #[error("long-poll session expired (failed={code})")]
    SessionExpired { code: i64 },

    /// Structured error body returned by the source API.
    #[error("source API error {code}: {message}")]
    Protocol { code: i64, message: String },

    /// A success envelope carried no payload.
    #[error("empty response from {method}")]
    EmptyResponse { method: String },

    /// An upstream payload did not have the expected shape.
    #[error("malformed upstream payload: {0}")]
    Decode(String),

    /// Neither the store nor the source API could produce the referenced message.
    #[error("cannot resolve reply target {source_message_id}")]
    ThreadResolution { source_message_id: i64 },

    /// No source peer could be determined for an outbound message.
    #[error("cannot determine recipient: {0}")]
    MissingPeer(String),

    /// A reply referenced a destination message with no stored correlation.
    #[error("no correlated source message: {0}")]
    MissingCorrelation(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Destination adapter errors (send failure, rate limiting, bad request).
    #[error("destination error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operator input that cannot be acted on (for example a malformed peer id).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Retry interval class chosen by the poll loop for a failed iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BackoffClass {
    Connection,
    Protocol,
    Generic,
}

impl RelayError {
    /// Which backoff interval applies after this error.
    pub fn backoff_class(&self) -> BackoffClass {
        match self {
            RelayError::Connectivity { .. } | RelayError::Timeout { .. } => {
                BackoffClass::Connection
            }
            RelayError::Protocol { .. } => BackoffClass::Protocol,
            _ => BackoffClass::Generic,
        }
    }

    /// Whether a human should be told about this error in the control channel.
    pub fn is_operator_actionable(&self) -> bool {
        matches!(self, RelayError::Protocol { .. })
    }

    /// Shorthand for a destination failure wrapping a lower-level error.
    pub fn channel<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RelayError::Channel {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
