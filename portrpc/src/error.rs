//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Top-level error types for portrpc.
//!
//! Errors are split by which side of the port observes them:
//!
//! 1. **Classification**: [`ErrorCode`], the fixed taxonomy shared by both
//!    sides and carried on the wire as `error.data.code`.
//! 2. **Server side**: [`RpcError`], raised by routers and context factories.
//!    It never crosses the wire as-is; the [`codec`](crate::codec) turns it
//!    into a [`WireError`](crate::protocol::WireError).
//! 3. **Client side**: [`ClientError`], the rejection reason a caller
//!    observes. Server-reported failures arrive as [`RemoteError`]; timeouts
//!    and disconnections are synthesized locally and never sent.
//!
//! # Examples
//!
//! ```rust
//! use portrpc::{ClientError, ErrorCode, RpcError};
//!
//! let error = RpcError::not_found("no user 42");
//! assert_eq!(error.code(), ErrorCode::NotFound);
//! assert_eq!(error.code().json_rpc_code(), -32004);
//!
//! let disconnected = ClientError::Disconnected;
//! assert!(disconnected.is_disconnected());
//! assert_eq!(disconnected.code(), ErrorCode::ClientClosedRequest);
//! ```

use crate::serialization::TransformError;
use crate::transport::ConnectionError;
use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Error classification shared by client and server.
///
/// Each classification maps to a fixed JSON-RPC numeric code and an
/// HTTP-status-like hint. The hint exists for logging parity only; nothing in
/// this crate speaks HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The payload could not be parsed or transformed.
    ParseError,
    /// The request was malformed or its input was rejected.
    BadRequest,
    /// Unclassified server failure.
    InternalServerError,
    /// The procedure exists but is not implemented.
    NotImplemented,
    /// The caller is not authenticated.
    Unauthorized,
    /// The caller is authenticated but not allowed.
    Forbidden,
    /// No procedure, or no resource, matches the request.
    NotFound,
    /// The procedure does not support the requested call kind.
    MethodNotSupported,
    /// The operation exceeded its deadline.
    Timeout,
    /// The request conflicts with current state.
    Conflict,
    /// A precondition of the request failed.
    PreconditionFailed,
    /// The payload is too large.
    PayloadTooLarge,
    /// The input was well formed but semantically invalid.
    UnprocessableContent,
    /// The caller is being rate limited.
    TooManyRequests,
    /// The caller went away before the request completed.
    ClientClosedRequest,
}

impl ErrorCode {
    /// Every classification, in table order.
    pub const ALL: [ErrorCode; 15] = [
        Self::ParseError,
        Self::BadRequest,
        Self::InternalServerError,
        Self::NotImplemented,
        Self::Unauthorized,
        Self::Forbidden,
        Self::NotFound,
        Self::MethodNotSupported,
        Self::Timeout,
        Self::Conflict,
        Self::PreconditionFailed,
        Self::PayloadTooLarge,
        Self::UnprocessableContent,
        Self::TooManyRequests,
        Self::ClientClosedRequest,
    ];

    /// Returns the string key carried in `error.data.code`.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::ParseError => "PARSE_ERROR",
            Self::BadRequest => "BAD_REQUEST",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
            Self::NotImplemented => "NOT_IMPLEMENTED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::MethodNotSupported => "METHOD_NOT_SUPPORTED",
            Self::Timeout => "TIMEOUT",
            Self::Conflict => "CONFLICT",
            Self::PreconditionFailed => "PRECONDITION_FAILED",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::UnprocessableContent => "UNPROCESSABLE_CONTENT",
            Self::TooManyRequests => "TOO_MANY_REQUESTS",
            Self::ClientClosedRequest => "CLIENT_CLOSED_REQUEST",
        }
    }

    /// Returns the JSON-RPC numeric code for this classification.
    ///
    /// Used to classify errors from peers that omit a known key. Errors sent
    /// by this crate always carry [`crate::codec::INTERNAL_ERROR_CODE`].
    #[must_use]
    pub const fn json_rpc_code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::BadRequest => -32600,
            Self::InternalServerError | Self::NotImplemented => -32603,
            Self::Unauthorized => -32001,
            Self::Forbidden => -32003,
            Self::NotFound => -32004,
            Self::MethodNotSupported => -32005,
            Self::Timeout => -32008,
            Self::Conflict => -32009,
            Self::PreconditionFailed => -32012,
            Self::PayloadTooLarge => -32013,
            Self::UnprocessableContent => -32022,
            Self::TooManyRequests => -32029,
            Self::ClientClosedRequest => -32099,
        }
    }

    /// Returns the HTTP-status-like hint for this classification.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::ParseError | Self::BadRequest => 400,
            Self::InternalServerError => 500,
            Self::NotImplemented => 501,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::MethodNotSupported => 405,
            Self::Timeout => 408,
            Self::Conflict => 409,
            Self::PreconditionFailed => 412,
            Self::PayloadTooLarge => 413,
            Self::UnprocessableContent => 422,
            Self::TooManyRequests => 429,
            Self::ClientClosedRequest => 499,
        }
    }

    /// Looks up a classification by its string key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.key() == key)
    }

    /// Looks up the first classification using the given JSON-RPC code.
    ///
    /// `-32603` is shared by two classifications and resolves to
    /// [`ErrorCode::InternalServerError`].
    #[must_use]
    pub fn from_json_rpc_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.json_rpc_code() == code)
    }

    /// Returns `true` for classifications the server is responsible for.
    #[must_use]
    pub const fn is_server_fault(self) -> bool {
        self.http_status() >= 500
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Returned by [`ErrorCode::from_str`] for unknown keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown error code `{0}`")]
pub struct UnknownErrorCode(pub String);

impl FromStr for ErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| UnknownErrorCode(s.to_owned()))
    }
}

/// An error raised while executing a call on the server.
///
/// Routers and context factories return this type. It carries a
/// classification, a human-readable message, and optionally the error that
/// caused it. Before leaving the process it is converted into a wire error by
/// [`codec::serialize_error`](crate::codec::serialize_error); the cause only
/// ever crosses the wire as a rendered string.
///
/// # Examples
///
/// ```rust
/// use portrpc::{ErrorCode, RpcError};
///
/// let io = std::io::Error::other("disk on fire");
/// let error = RpcError::internal("failed to load settings").with_cause(io);
///
/// assert_eq!(error.code(), ErrorCode::InternalServerError);
/// assert_eq!(error.to_string(), "failed to load settings");
/// assert!(std::error::Error::source(&error).is_some());
/// ```
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RpcError {
    code: ErrorCode,
    message: String,
    #[source]
    cause: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl RpcError {
    /// Creates an error with the given classification and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// Wraps an arbitrary error as an internal server error.
    ///
    /// The message is taken from the error's `Display` output and the error
    /// itself becomes the cause.
    #[must_use]
    pub fn from_cause<E>(cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            code: ErrorCode::InternalServerError,
            message: cause.to_string(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Attaches the underlying cause of this error.
    #[must_use]
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Shorthand for an [`ErrorCode::InternalServerError`].
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalServerError, message)
    }

    /// Shorthand for an [`ErrorCode::BadRequest`].
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Shorthand for an [`ErrorCode::NotFound`].
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Shorthand for an [`ErrorCode::ParseError`].
    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, message)
    }

    /// Returns the classification of this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the underlying cause, if one was attached.
    #[must_use]
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(ErrorCode::ParseError, error.to_string()).with_cause(error)
    }
}

impl From<TransformError> for RpcError {
    fn from(error: TransformError) -> Self {
        Self::new(ErrorCode::ParseError, error.to_string()).with_cause(error)
    }
}

/// A server-reported error reconstructed from the wire.
///
/// Produced by [`codec::deserialize_error`](crate::codec::deserialize_error).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    /// Classification reported by the server.
    pub code: ErrorCode,
    /// Numeric JSON-RPC code as received.
    pub json_rpc_code: i32,
    /// Human-readable message.
    pub message: String,
    /// HTTP-status-like hint, if the server sent one.
    pub http_status: Option<u16>,
    /// Path of the failing procedure, if the server sent one.
    pub path: Option<String>,
    /// Rendered cause chain, if the server sent one.
    pub stack: Option<String>,
}

/// The rejection reason observed by a caller.
///
/// Every call that cannot complete settles with one of these. The variant
/// tells a locally synthesized failure (timeout, disconnection) apart from an
/// error the server reported, even when the server reported a
/// [`ErrorCode::Timeout`] of its own.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server executed the call and reported an error.
    #[error(transparent)]
    Server(#[from] RemoteError),

    /// No response arrived before the call's deadline.
    #[error("call to `{path}` timed out after {timeout:?}")]
    Timeout {
        /// Path of the call that timed out.
        path: String,
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// The connection closed before the call settled.
    #[error("connection closed before the call completed")]
    Disconnected,

    /// The connection could not be opened.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The transformer rejected an input or result payload.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// A result payload did not match the type the caller asked for.
    #[error("failed to decode result of `{path}`: {source}")]
    Decode {
        /// Path of the call whose result failed to decode.
        path: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    /// Returns the classification of this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Server(remote) => remote.code,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Disconnected => ErrorCode::ClientClosedRequest,
            Self::Connection(_) => ErrorCode::InternalServerError,
            Self::Transform(_) | Self::Decode { .. } => ErrorCode::ParseError,
        }
    }

    /// Returns `true` if the call exceeded its local deadline.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the connection closed under the call.
    #[must_use]
    pub const fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Returns `true` if the error was reported by the server.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Server(_))
    }

    /// Returns `true` if retrying the call on a fresh connection may succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Disconnected => true,
            Self::Connection(e) => e.is_recoverable(),
            Self::Server(_) | Self::Transform(_) | Self::Decode { .. } => false,
        }
    }

    /// Returns the server-reported error, if this is one.
    #[must_use]
    pub const fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Server(remote) => Some(remote),
            _ => None,
        }
    }
}
