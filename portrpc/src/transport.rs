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

//! Connection layer abstractions for portrpc.
//!
//! The host environment owns the actual inter-context channel (a browser
//! extension's `runtime.Port`, a `MessagePort`, a worker channel, ...). This
//! module describes the small capability portrpc needs from it and builds a
//! [`Connection`] on top.
//!
//! # Architecture
//!
//! - [`Port`]: one already-open duplex channel as handed over by the host: a
//!   name, a [`PortSink`] for outbound values, and an ordered stream of
//!   inbound values that ends when the channel closes.
//! - [`PortProvider`]: the host's "open a named channel" capability, injected
//!   explicitly instead of being looked up globally.
//! - [`Connection`]: envelope-level wrapper with message listeners, disconnect
//!   handlers, and a connected/disconnected state.
//! - [`MemoryPort`] / [`MemoryHub`]: in-process implementation used by tests
//!   and benchmarks.
//!
//! # Examples
//!
//! ```rust
//! use portrpc::transport::{Connection, MemoryPort};
//!
//! # async fn example() {
//! let (left, right) = MemoryPort::pair("trpc");
//! let left = Connection::new(left);
//! let right = Connection::new(right);
//!
//! right.on_message(|message| println!("received {:?}", message));
//! left.disconnect();
//! right.closed().await;
//! assert!(!right.is_connected());
//! # }
//! ```

mod connection;
mod error;
mod memory;

pub use connection::{Connection, ConnectionId, ListenerId};
pub use error::ConnectionError;
pub use memory::{MemoryHub, MemoryListener, MemoryPort};

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::Value;
use std::sync::Arc;

/// Outbound half of a host channel.
///
/// Implementations hand values to the host and return immediately; there is
/// no delivery confirmation at this layer. Both methods may be called
/// concurrently from any task.
pub trait PortSink: Send + Sync + 'static {
    /// Hands one value to the host for delivery to the counterpart.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Closed`] if the channel is gone.
    fn post_message(&self, message: Value) -> Result<(), ConnectionError>;

    /// Closes the channel. Must be idempotent.
    fn disconnect(&self);
}

/// One open duplex channel to a specific counterpart context.
///
/// The inbound stream must yield values in arrival order and end when the
/// channel closes, whether the counterpart closed it or the host revoked it.
pub struct Port {
    name: String,
    sink: Arc<dyn PortSink>,
    inbound: BoxStream<'static, Value>,
}

impl Port {
    /// Assembles a port from its sink and inbound stream.
    pub fn new<S, I>(name: impl Into<String>, sink: S, inbound: I) -> Self
    where
        S: PortSink,
        I: Stream<Item = Value> + Send + 'static,
    {
        Self {
            name: name.into(),
            sink: Arc::new(sink),
            inbound: inbound.boxed(),
        }
    }

    /// Returns the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (String, Arc<dyn PortSink>, BoxStream<'static, Value>) {
        (self.name, self.sink, self.inbound)
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port").field("name", &self.name).finish()
    }
}

/// The host's capability to open a named channel to another context.
///
/// # Example
///
/// ```rust
/// use portrpc::transport::{ConnectionError, Port, PortProvider};
///
/// struct Unavailable;
///
/// #[async_trait::async_trait]
/// impl PortProvider for Unavailable {
///     async fn connect(&self, name: &str) -> Result<Port, ConnectionError> {
///         Err(ConnectionError::Unavailable {
///             reason: format!("cannot open `{}` outside an extension", name),
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait PortProvider: Send + Sync + 'static {
    /// Opens a channel with the given name.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectionError`] if the messaging capability is missing
    /// or the host refused the channel.
    async fn connect(&self, name: &str) -> Result<Port, ConnectionError>;
}

#[async_trait]
impl<P: PortProvider + ?Sized> PortProvider for Arc<P> {
    async fn connect(&self, name: &str) -> Result<Port, ConnectionError> {
        (**self).connect(name).await
    }
}

/// Options for [`Connection::open`].
///
/// An externally supplied `port` takes precedence; otherwise a channel named
/// `name` is requested from the provider.
#[derive(Debug)]
pub struct ConnectOptions {
    /// Channel name to request from the provider.
    pub name: String,
    /// An already-open channel to wrap instead of opening one.
    pub port: Option<Port>,
}

impl ConnectOptions {
    /// Options that open a channel with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: None,
        }
    }

    /// Options that wrap an already-open channel.
    #[must_use]
    pub fn with_port(port: Port) -> Self {
        Self {
            name: port.name().to_owned(),
            port: Some(port),
        }
    }
}
