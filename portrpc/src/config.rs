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

//! Configuration types for clients and servers.

use std::time::Duration;

/// Default channel name requested by clients.
pub const DEFAULT_CHANNEL_NAME: &str = "trpc";

/// Configuration for a [`Client`](crate::client::Client).
///
/// # Examples
///
/// ```rust
/// use portrpc::config::ClientConfig;
/// use std::time::Duration;
///
/// // Use default configuration
/// let config = ClientConfig::default();
/// assert_eq!(config.channel_name, "trpc");
///
/// // Customize configuration
/// let config = ClientConfig {
///     timeout: Some(Duration::from_secs(5)),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Name of the channel requested from the port provider.
    ///
    /// Ignored when the client is given an already-open port.
    ///
    /// Default: `"trpc"`
    pub channel_name: String,

    /// Deadline for queries and mutations.
    ///
    /// A call with no response after this long is rejected with a timeout
    /// error. The server is not told; its work continues unobserved.
    /// Subscriptions are never timed out. Overridable per call with
    /// [`CallOptions`].
    ///
    /// Default: None (wait until a response or disconnection)
    pub timeout: Option<Duration>,

    /// Check transformer symmetry on every outbound input.
    ///
    /// When enabled, each input is run through `deserialize(serialize(x))` and
    /// a warning is logged if the result differs from `x`. The call itself is
    /// never altered.
    ///
    /// Default: true in debug builds, false in release builds
    pub verify_transformer: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            timeout: None,
            verify_transformer: cfg!(debug_assertions),
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the channel name.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use portrpc::config::ClientConfig;
    ///
    /// let config = ClientConfig::new().with_channel_name("settings");
    /// assert_eq!(config.channel_name, "settings");
    /// ```
    #[must_use]
    pub fn with_channel_name(mut self, name: impl Into<String>) -> Self {
        self.channel_name = name.into();
        self
    }

    /// Sets the default call deadline.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use portrpc::config::ClientConfig;
    /// use std::time::Duration;
    ///
    /// let config = ClientConfig::new().with_timeout(Duration::from_millis(250));
    /// assert_eq!(config.timeout, Some(Duration::from_millis(250)));
    /// ```
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enables or disables the transformer symmetry check.
    #[must_use]
    pub fn with_verify_transformer(mut self, verify: bool) -> Self {
        self.verify_transformer = verify;
        self
    }
}

/// Configuration for a [`Server`](crate::server::Server).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Attach the rendered cause chain of an error as `error.data.stack`.
    ///
    /// Default: true in debug builds, false in release builds
    pub include_stack_trace: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            include_stack_trace: cfg!(debug_assertions),
        }
    }
}

impl ServerConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables stack traces in error replies.
    #[must_use]
    pub fn with_stack_trace(mut self, include: bool) -> Self {
        self.include_stack_trace = include;
        self
    }
}

/// Per-call options.
///
/// # Examples
///
/// ```rust
/// use portrpc::config::CallOptions;
/// use std::time::Duration;
///
/// let options = CallOptions::timeout(Duration::from_millis(50));
/// assert_eq!(options.timeout, Some(Duration::from_millis(50)));
/// assert_eq!(CallOptions::default().timeout, None);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Deadline for this call, overriding [`ClientConfig::timeout`].
    pub timeout: Option<Duration>,
}

impl CallOptions {
    /// Options with the given deadline.
    #[must_use]
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}
