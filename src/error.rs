// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Common error types for the pooled MQTT client runtime.
//!
//! Every fallible operation in this crate returns a [`CoreError`]. The error handler
//! inspects [`CoreError::category`] to decide whether to retry, and the metrics store
//! uses the same category to classify failures.

use std::time::Duration;

use thiserror::Error;

use crate::topic::TopicParseError;

/// Error type surfaced by the underlying Protocol Codec's event loop.
pub type ConnectionError = rumqttc::v5::ConnectionError;
/// Error type for completion tokens (QoS 1/2 delivery acknowledgement).
pub type CompletionError = rumqttc::NoticeError;

/// Coarse classification of a [`CoreError`], used for metrics and retry policy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Failure to establish or maintain a transport-level connection.
    Connection,
    /// A malformed or unexpected MQTT protocol exchange.
    Protocol,
    /// A configuration object failed validation.
    Configuration,
    /// A resource limit (pool capacity, memory) was hit.
    Resource,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::Connection => "connection",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Resource => "resource",
        };
        write!(f, "{s}")
    }
}

/// Subcategory of a connection-class failure.
#[derive(Debug, Clone)]
pub enum ConnectionErrorKind {
    /// The underlying socket could not be established.
    DialFailed(String),
    /// The broker rejected the CONNECT packet (bad credentials, protocol mismatch, etc.).
    ConnectRejected(String),
    /// The connection was unexpectedly closed (by the broker or the transport).
    Closed,
    /// No connection is currently established and none could be created on demand.
    Unavailable,
}

impl std::fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionErrorKind::DialFailed(reason) => write!(f, "dial failed: {reason}"),
            ConnectionErrorKind::ConnectRejected(reason) => {
                write!(f, "CONNECT rejected: {reason}")
            }
            ConnectionErrorKind::Closed => write!(f, "connection closed"),
            ConnectionErrorKind::Unavailable => write!(f, "no connection available"),
        }
    }
}

/// Subcategory of a protocol-class failure.
#[derive(Debug, Clone)]
pub enum ProtocolErrorKind {
    /// A reply to an in-flight operation did not arrive (the proxy's command loop exited).
    DetachedProxy,
    /// An ack (PUBACK/PUBCOMP/SUBACK/UNSUBACK) could not be matched to its request.
    UnmatchedAck,
    /// The codec reported a decode or state error outside of connection loss.
    Codec(String),
}

impl std::fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolErrorKind::DetachedProxy => {
                write!(f, "client proxy is detached from its connection loop")
            }
            ProtocolErrorKind::UnmatchedAck => write!(f, "received an unmatched acknowledgement"),
            ProtocolErrorKind::Codec(reason) => write!(f, "codec error: {reason}"),
        }
    }
}

/// Subcategory of a resource-class failure.
#[derive(Debug, Clone)]
pub enum ResourceErrorKind {
    /// The pool is at `max_connections` and no idle connection is available.
    PoolExhausted,
    /// Process memory pressure triggered a reclaim before the operation could proceed.
    MemoryPressure,
}

impl std::fmt::Display for ResourceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceErrorKind::PoolExhausted => write!(f, "connection pool exhausted"),
            ResourceErrorKind::MemoryPressure => write!(f, "memory pressure reclaim triggered"),
        }
    }
}

/// Top-level error type returned by every fallible operation in this crate.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    /// One or more configuration values failed validation. Not retryable.
    #[error("invalid configuration: {}", .reasons.join("; "))]
    InvalidConfig {
        /// Every violation found, not just the first (validation is exhaustive, not short-circuiting).
        reasons: Vec<String>,
    },

    /// A connection-level failure. Retryable, and counted against the operation's circuit breaker.
    #[error("connection failure: {0}")]
    ConnectionFailure(ConnectionErrorKind),

    /// A protocol-level failure. Retryable, and counted against the operation's circuit breaker.
    #[error("protocol error: {0}")]
    Protocol(ProtocolErrorKind),

    /// A resource exhaustion failure. Triggers memory-pressure cleanup; retryable.
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(ResourceErrorKind),

    /// A pool `acquire` did not complete within `wait_timeout`. Not retryable by the error handler
    /// (the caller decides whether to try again).
    #[error("timed out waiting for a pooled connection after {0:?}")]
    PoolTimeout(Duration),

    /// The circuit breaker for an operation is open; the call was rejected without touching the
    /// network. Not retryable until `retry_after` elapses.
    #[error("circuit breaker open for operation {operation}; retry after {retry_after:?}")]
    BreakerOpen {
        /// Name of the operation whose breaker is open (e.g. `"mqtt.publish"`).
        operation: String,
        /// How much longer the breaker will remain open.
        retry_after: Duration,
    },
}

impl CoreError {
    /// Classify this error for metrics and retry-policy purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::InvalidConfig { .. } => ErrorCategory::Configuration,
            CoreError::ConnectionFailure(_) => ErrorCategory::Connection,
            CoreError::Protocol(_) => ErrorCategory::Protocol,
            CoreError::ResourceExhaustion(_) | CoreError::PoolTimeout(_) => {
                ErrorCategory::Resource
            }
            // Breaker-open events are caused by whatever category originally tripped the
            // breaker, but since that information is not retained past the trip, classify
            // the fast-fail itself as a resource-class event (the resource being guarded).
            CoreError::BreakerOpen { .. } => ErrorCategory::Resource,
        }
    }

    /// Returns true if [`crate::error_handler::ErrorHandler::wrap_operation`] should retry this
    /// error (subject to the operation's `max_retries` and the circuit breaker's state).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::ConnectionFailure(_) | CoreError::Protocol(_) | CoreError::ResourceExhaustion(_)
        )
    }

    /// Construct an [`CoreError::InvalidConfig`] from a single reason.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        CoreError::InvalidConfig {
            reasons: vec![reason.into()],
        }
    }
}

impl From<TopicParseError> for CoreError {
    fn from(e: TopicParseError) -> Self {
        CoreError::invalid_config(e.to_string())
    }
}
