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

//! Connection layer error types.
//!
//! Connection errors are the lowest level of the error hierarchy. They only
//! occur while opening a port or handing a message to the host; once a
//! connection is open, a closed channel is reported through disconnect
//! handlers rather than as an error.

use thiserror::Error;

/// Errors that can occur while opening or using a port.
///
/// # Examples
///
/// ```rust
/// use portrpc::transport::ConnectionError;
///
/// let error = ConnectionError::Unavailable {
///     reason: "no channel provider configured".to_string(),
/// };
/// assert!(!error.is_recoverable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The host environment's messaging capability is not available.
    ///
    /// This occurs when no port was supplied and no provider can open one.
    #[error("messaging capability unavailable: {reason}")]
    Unavailable {
        /// Description of what is missing
        reason: String,
    },

    /// The provider refused to open the named channel.
    #[error("failed to open channel `{name}`: {reason}")]
    OpenFailed {
        /// The requested channel name
        name: String,
        /// Description of the failure
        reason: String,
    },

    /// The channel is closed.
    ///
    /// Returned by [`PortSink`](crate::transport::PortSink) implementations
    /// when the counterpart is gone.
    #[error("channel is closed")]
    Closed,
}

impl ConnectionError {
    /// Returns `true` if retrying the open may succeed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use portrpc::transport::ConnectionError;
    ///
    /// let error = ConnectionError::OpenFailed {
    ///     name: "trpc".to_string(),
    ///     reason: "background not ready".to_string(),
    /// };
    /// assert!(error.is_recoverable());
    /// ```
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::OpenFailed { .. } | Self::Closed)
    }

    /// Returns `true` if this error indicates the channel is closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
