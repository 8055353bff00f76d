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

//! Client-side call dispatch.
//!
//! A [`Client`] owns at most one [`Connection`] at a time and multiplexes
//! every call made through it over that connection. Each call is registered
//! in a [`PendingCalls`] table under a fresh [`RequestId`]; a single
//! connection listener routes responses back by ID, regardless of the order
//! in which they arrive.
//!
//! # Call lifecycle
//!
//! - **Query / mutation**: settles exactly once, with the response, a
//!   server error, a timeout, or a disconnection error. Responses arriving
//!   after a timeout are discarded.
//! - **Subscription**: a [`Subscription`] stream yields items until the
//!   server completes it, an error arrives, the connection closes, or the
//!   caller cancels it.
//!
//! When the connection closes, every pending call on it is settled with
//! [`ClientError::Disconnected`]. The next call opens a fresh connection.

mod pending;
mod subscription;

pub use pending::{EventReceiver, PendingCalls, ResponseReceiver, SubscriptionEvent};
pub use subscription::{Subscription, SubscriptionHandle};

use crate::codec;
use crate::config::{CallOptions, ClientConfig};
use crate::error::ClientError;
use crate::protocol::{CallKind, Frame, Message, RequestId};
use crate::serialization::{IdentityTransformer, TransformError, Transformer};
use crate::transport::{ConnectOptions, Connection, Port, PortProvider};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "observability")]
use tracing::{debug, trace, warn};

/// The outcome of an untyped [`Client::call`].
#[derive(Debug)]
pub enum Response {
    /// The result of a query or mutation.
    Data(Value),
    /// A live subscription.
    Subscription(Subscription<Value>),
}

/// Issues calls to a server over a single shared connection.
///
/// `Client` is cheap to clone; clones share the connection and the pending
/// call table. Dropping the last clone disconnects, which also ends any
/// subscription still open on it.
///
/// # Example
///
/// ```rust,no_run
/// use portrpc::client::Client;
/// use portrpc::transport::MemoryHub;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: String,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), portrpc::ClientError> {
/// let (hub, _listener) = MemoryHub::new();
/// let client = Client::new(hub);
///
/// let user: User = client.query("user.get", &"42").await?;
/// println!("{} is {}", user.id, user.name);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    provider: Option<Arc<dyn PortProvider>>,
    port: parking_lot::Mutex<Option<Port>>,
    transformer: Arc<dyn Transformer>,
    config: ClientConfig,
    link: tokio::sync::Mutex<Option<Link>>,
}

/// The current connection and the calls pending on it.
#[derive(Clone)]
struct Link {
    connection: Connection,
    pending: Arc<PendingCalls>,
}

/// Removes a call from the pending table when its future is dropped.
struct PendingGuard<'a> {
    pending: &'a PendingCalls,
    id: &'a RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.cancel(self.id);
    }
}

impl Client {
    /// Creates a client that opens its channel through `provider`.
    #[must_use]
    pub fn new(provider: impl PortProvider) -> Self {
        ClientBuilder::new().provider(provider).build()
    }

    /// Creates a client over an already-open port.
    ///
    /// Once that port disconnects there is nothing to reconnect with, and
    /// further calls fail with a connection error.
    #[must_use]
    pub fn from_port(port: Port) -> Self {
        ClientBuilder::new().port(port).build()
    }

    /// Returns a builder for a customized client.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Issues a query and decodes its result.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call cannot complete.
    pub async fn query<T: DeserializeOwned>(
        &self,
        path: &str,
        input: &impl Serialize,
    ) -> Result<T, ClientError> {
        self.query_with(path, input, CallOptions::default()).await
    }

    /// Issues a query with per-call options.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call cannot complete.
    pub async fn query_with<T: DeserializeOwned>(
        &self,
        path: &str,
        input: &impl Serialize,
        options: CallOptions,
    ) -> Result<T, ClientError> {
        let input = to_input(input)?;
        let value = self.request(CallKind::Query, path, input, options).await?;
        decode(path, value)
    }

    /// Issues a mutation and decodes its result.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call cannot complete.
    pub async fn mutation<T: DeserializeOwned>(
        &self,
        path: &str,
        input: &impl Serialize,
    ) -> Result<T, ClientError> {
        self.mutation_with(path, input, CallOptions::default()).await
    }

    /// Issues a mutation with per-call options.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call cannot complete.
    pub async fn mutation_with<T: DeserializeOwned>(
        &self,
        path: &str,
        input: &impl Serialize,
        options: CallOptions,
    ) -> Result<T, ClientError> {
        let input = to_input(input)?;
        let value = self.request(CallKind::Mutation, path, input, options).await?;
        decode(path, value)
    }

    /// Opens a subscription.
    ///
    /// The returned stream exists as soon as the request is sent; items
    /// arrive once the server has started the subscription.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the connection cannot be opened or the
    /// input cannot be encoded.
    pub async fn subscribe<T: DeserializeOwned>(
        &self,
        path: &str,
        input: &impl Serialize,
    ) -> Result<Subscription<T>, ClientError> {
        let input = to_input(input)?;
        self.open_subscription(path, input).await
    }

    /// Issues a call of any kind with an untyped input.
    ///
    /// `options` are ignored for subscriptions, which are never timed out.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call cannot complete.
    pub async fn call(
        &self,
        kind: CallKind,
        path: &str,
        input: Value,
        options: CallOptions,
    ) -> Result<Response, ClientError> {
        match kind {
            CallKind::Query | CallKind::Mutation => self
                .request(kind, path, input, options)
                .await
                .map(Response::Data),
            CallKind::Subscription => self
                .open_subscription(path, input)
                .await
                .map(Response::Subscription),
        }
    }

    /// Returns the current connection, opening one if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connection`] if no connection can be opened.
    pub async fn connection(&self) -> Result<Connection, ClientError> {
        Ok(self.link().await?.connection)
    }

    /// Returns the number of calls awaiting a response on the current
    /// connection.
    pub async fn pending_count(&self) -> usize {
        self.inner
            .link
            .lock()
            .await
            .as_ref()
            .map_or(0, |link| link.pending.len())
    }

    /// Closes the current connection, settling every pending call with a
    /// disconnection error.
    pub async fn disconnect(&self) {
        let link = self.inner.link.lock().await.take();
        if let Some(link) = link {
            link.connection.disconnect();
        }
    }

    async fn request(
        &self,
        kind: CallKind,
        path: &str,
        input: Value,
        options: CallOptions,
    ) -> Result<Value, ClientError> {
        let link = self.link().await?;
        let id = RequestId::generate();
        let input = self.encode_input(input)?;

        let response = link.pending.register_request(id.clone());
        let _guard = PendingGuard {
            pending: &link.pending,
            id: &id,
        };
        if !link.connection.is_connected() {
            return Err(codec::disconnection_error());
        }

        #[cfg(feature = "observability")]
        debug!(
            connection_id = %link.connection.id(),
            request_id = %id,
            kind = %kind,
            path = %path,
            "Sending request"
        );

        link.connection
            .send(&Message::request(id.clone(), kind, path, input));

        let settled = match options.timeout.or(self.inner.config.timeout) {
            Some(timeout) => match tokio::time::timeout(timeout, response).await {
                Ok(settled) => settled,
                Err(_) => {
                    #[cfg(feature = "observability")]
                    debug!(request_id = %id, path = %path, ?timeout, "Call timed out");

                    return Err(codec::timeout_error(path, timeout));
                }
            },
            None => response.await,
        };

        // The sender only disappears without a value if the call was
        // cancelled under us by a disconnect.
        settled.unwrap_or_else(|_| Err(codec::disconnection_error()))
    }

    async fn open_subscription<T>(
        &self,
        path: &str,
        input: Value,
    ) -> Result<Subscription<T>, ClientError> {
        let link = self.link().await?;
        let id = RequestId::generate();
        let input = self.encode_input(input)?;

        let events = link.pending.register_subscription(id.clone());
        let handle = SubscriptionHandle::new(
            id.clone(),
            path.to_owned(),
            link.connection.clone(),
            Arc::clone(&link.pending),
        );
        let subscription = Subscription::new(handle, events);
        if !link.connection.is_connected() {
            return Err(codec::disconnection_error());
        }

        #[cfg(feature = "observability")]
        debug!(
            connection_id = %link.connection.id(),
            request_id = %id,
            path = %path,
            "Opening subscription"
        );

        link.connection
            .send(&Message::request(id, CallKind::Subscription, path, input));
        Ok(subscription)
    }

    fn encode_input(&self, input: Value) -> Result<Value, ClientError> {
        #[cfg(feature = "observability")]
        if self.inner.config.verify_transformer
            && !crate::serialization::verify_round_trip(self.inner.transformer.as_ref(), &input)
        {
            warn!(
                transformer = self.inner.transformer.name(),
                "Transformer does not round-trip this input; results may differ from what was sent"
            );
        }

        Ok(self.inner.transformer.serialize(input)?)
    }

    async fn link(&self) -> Result<Link, ClientError> {
        let mut current = self.inner.link.lock().await;
        if let Some(link) = current.as_ref() {
            if link.connection.is_connected() {
                return Ok(link.clone());
            }
        }

        let port = self.inner.port.lock().take();
        let options = match port {
            Some(port) => ConnectOptions::with_port(port),
            None => ConnectOptions::named(self.inner.config.channel_name.clone()),
        };
        let connection = Connection::open(options, self.inner.provider.as_deref()).await?;
        let link = self.inner.attach(connection);
        *current = Some(link.clone());
        Ok(link)
    }
}

impl ClientInner {
    fn attach(&self, connection: Connection) -> Link {
        let pending = Arc::new(PendingCalls::new());

        let rejected = Arc::clone(&pending);
        #[cfg(feature = "observability")]
        let connection_id = connection.id();
        connection.on_disconnect(move || {
            let _count = rejected.reject_all();

            #[cfg(feature = "observability")]
            debug!(connection_id = %connection_id, rejected = _count, "Settled pending calls on disconnect");
        });

        let routed = Arc::clone(&pending);
        let transformer = Arc::clone(&self.transformer);
        connection.on_message(move |message| match message.clone().into_frame() {
            Some(Frame::Response { id, outcome }) => {
                routed.resolve(&id, outcome, transformer.as_ref());
            }
            _other => {
                #[cfg(feature = "observability")]
                trace!(frame = ?_other, "Client ignoring non-response envelope");
            }
        });

        #[cfg(feature = "observability")]
        debug!(connection_id = %connection.id(), name = %connection.name(), "Client connected");

        Link {
            connection,
            pending,
        }
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            #[cfg(feature = "observability")]
            debug!(connection_id = %link.connection.id(), "Client dropped, disconnecting");

            link.connection.disconnect();
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("transformer", &self.inner.transformer.name())
            .finish()
    }
}

/// Builder for [`Client`].
///
/// # Example
///
/// ```rust
/// use portrpc::client::ClientBuilder;
/// use portrpc::transport::MemoryHub;
/// use std::time::Duration;
///
/// let (hub, _listener) = MemoryHub::new();
/// let client = ClientBuilder::new()
///     .provider(hub)
///     .channel_name("popup")
///     .timeout(Duration::from_secs(5))
///     .build();
/// assert_eq!(client.config().channel_name, "popup");
/// ```
pub struct ClientBuilder {
    provider: Option<Arc<dyn PortProvider>>,
    port: Option<Port>,
    transformer: Arc<dyn Transformer>,
    config: ClientConfig,
}

impl ClientBuilder {
    /// Creates a builder with the identity transformer and default config.
    #[must_use]
    pub fn new() -> Self {
        Self {
            provider: None,
            port: None,
            transformer: Arc::new(IdentityTransformer),
            config: ClientConfig::default(),
        }
    }

    /// Sets the provider used to open the channel.
    #[must_use]
    pub fn provider(mut self, provider: impl PortProvider) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Uses an already-open port for the first connection.
    #[must_use]
    pub fn port(mut self, port: Port) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the payload transformer.
    #[must_use]
    pub fn transformer(mut self, transformer: impl Transformer) -> Self {
        self.transformer = Arc::new(transformer);
        self
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the channel name requested from the provider.
    #[must_use]
    pub fn channel_name(mut self, name: impl Into<String>) -> Self {
        self.config.channel_name = name.into();
        self
    }

    /// Sets the default deadline for queries and mutations.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Builds the client. No connection is opened until the first call.
    #[must_use]
    pub fn build(self) -> Client {
        Client {
            inner: Arc::new(ClientInner {
                provider: self.provider,
                port: parking_lot::Mutex::new(self.port),
                transformer: self.transformer,
                config: self.config,
                link: tokio::sync::Mutex::new(None),
            }),
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("has_provider", &self.provider.is_some())
            .field("port", &self.port)
            .field("transformer", &self.transformer.name())
            .field("config", &self.config)
            .finish()
    }
}

fn to_input(input: &impl Serialize) -> Result<Value, ClientError> {
    serde_json::to_value(input).map_err(|e| TransformError::serialize(e.to_string()).into())
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|source| ClientError::Decode {
        path: path.to_owned(),
        source,
    })
}
