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

//! Server-side adapter between ports and a [`Router`].
//!
//! A [`Server`] accepts inbound ports. For each one it keeps a
//! [`SubscriptionRegistry`] and handles every inbound envelope:
//!
//! - **`subscription.stop`**: cancels the matching subscription, if any. No
//!   reply is sent.
//! - **Query / mutation**: decodes the input, creates a context, runs the
//!   router, and replies with one `data` result or one error.
//! - **Subscription**: as above, then replies `started`, one `data` result per
//!   stream item, and finally `stopped` or an error.
//! - Envelopes without an `id` are ignored.
//!
//! Every request runs in its own task, so a slow call never delays others on
//! the same connection. When the connection closes, every subscription on it
//! is cancelled and the registry is cleared.

mod registry;
mod router;

pub use registry::{ActiveSubscription, StopSignal, SubscriptionRegistry};
pub use router::{
    Call, ContextFactory, ContextOptions, DefaultContext, FnContextFactory, Router, RouterOutput,
};

use crate::codec;
use crate::config::ServerConfig;
use crate::error::RpcError;
use crate::observability::{ErrorEvent, ErrorObserver, log_error};
use crate::protocol::{CallKind, Frame, Message, RequestId};
use crate::serialization::{IdentityTransformer, Transformer};
use crate::transport::{Connection, Port};
use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "observability")]
use tracing::{debug, trace};

/// Serves calls from any number of ports with one router.
///
/// `Server` is cheap to clone.
///
/// # Example
///
/// ```rust,no_run
/// use portrpc::server::{Call, DefaultContext, Router, RouterOutput, Server};
/// use portrpc::transport::MemoryHub;
/// use portrpc::RpcError;
/// use std::sync::Arc;
///
/// struct Ping;
///
/// #[async_trait::async_trait]
/// impl Router for Ping {
///     type Context = ();
///
///     async fn call(&self, _call: &Call, _ctx: Arc<()>) -> Result<RouterOutput, RpcError> {
///         RouterOutput::data("pong")
///     }
/// }
///
/// # async fn example() {
/// let (hub, listener) = MemoryHub::new();
/// let server = Server::new(Ping, DefaultContext::new());
/// tokio::spawn(async move { server.serve(listener.into_stream()).await });
/// # let _ = hub;
/// # }
/// ```
pub struct Server<R: Router> {
    inner: Arc<ServerInner<R>>,
}

struct ServerInner<R: Router> {
    router: R,
    context: Box<dyn ContextFactory<R::Context>>,
    transformer: Arc<dyn Transformer>,
    observer: ErrorObserver<R::Context>,
    config: ServerConfig,
}

/// Where a failure happened, for error replies and observers.
struct FailureSite<'a, C> {
    connection: &'a Connection,
    id: RequestId,
    call: Option<&'a Call>,
    context: Option<&'a C>,
}

impl<R: Router> Server<R> {
    /// Creates a server with the identity transformer and default config.
    pub fn new(router: R, context: impl ContextFactory<R::Context>) -> Self {
        ServerBuilder::new(router, context).build()
    }

    /// Returns a builder for a customized server.
    pub fn builder(router: R, context: impl ContextFactory<R::Context>) -> ServerBuilder<R> {
        ServerBuilder::new(router, context)
    }

    /// Returns the server's error observer, for registering callbacks.
    #[must_use]
    pub fn observer(&self) -> &ErrorObserver<R::Context> {
        &self.inner.observer
    }

    /// Starts serving calls on one port.
    ///
    /// Must be called within a Tokio runtime.
    pub fn accept(&self, port: Port) -> ServerConnection {
        let connection = Connection::new(port);
        let registry = Arc::new(SubscriptionRegistry::new());

        {
            let registry = Arc::clone(&registry);
            #[cfg(feature = "observability")]
            let connection_id = connection.id();
            connection.on_disconnect(move || {
                let _cancelled = registry.cancel_all();

                #[cfg(feature = "observability")]
                debug!(connection_id = %connection_id, cancelled = _cancelled, "Cancelled subscriptions on disconnect");
            });
        }

        {
            let server = Arc::clone(&self.inner);
            let registry = Arc::clone(&registry);
            let replies = connection.clone();
            connection.on_message(move |message| {
                server.dispatch(message, &replies, &registry);
            });
        }

        #[cfg(feature = "observability")]
        debug!(connection_id = %connection.id(), name = %connection.name(), "Accepted connection");

        ServerConnection {
            connection,
            registry,
        }
    }

    /// Accepts every port from `incoming` until it ends.
    pub async fn serve<S>(&self, incoming: S)
    where
        S: Stream<Item = Port> + Send,
    {
        let mut incoming = std::pin::pin!(incoming);
        while let Some(port) = incoming.next().await {
            self.accept(port);
        }
    }
}

impl<R: Router> ServerInner<R> {
    fn dispatch(
        self: &Arc<Self>,
        message: &Message,
        connection: &Connection,
        registry: &Arc<SubscriptionRegistry>,
    ) {
        let frame = match message.clone().into_frame() {
            Some(frame) => frame,
            None => {
                #[cfg(feature = "observability")]
                trace!(connection_id = %connection.id(), "Ignoring envelope without id");
                return;
            }
        };

        match frame {
            Frame::Stop { id } => {
                let _cancelled = registry.cancel(&id);

                #[cfg(feature = "observability")]
                debug!(request_id = %id, cancelled = _cancelled, "Stop requested");
            }
            Frame::Request {
                id,
                kind,
                path,
                input,
            } => {
                let call = Call { kind, path, input };
                let stop = if kind == CallKind::Subscription {
                    let (handle, stop) = ActiveSubscription::new();
                    if !registry.register(id.clone(), handle) {
                        let error = RpcError::bad_request(format!(
                            "subscription id `{}` is already in use",
                            id
                        ));
                        self.reject(
                            &FailureSite {
                                connection,
                                id,
                                call: Some(&call),
                                context: None,
                            },
                            &error,
                        );
                        return;
                    }
                    Some(stop)
                } else {
                    None
                };

                let server = Arc::clone(self);
                let connection = connection.clone();
                let registry = Arc::clone(registry);
                tokio::spawn(async move {
                    server.handle(connection, registry, id, call, stop).await;
                });
            }
            Frame::Malformed { id, reason } => {
                let error = RpcError::bad_request(format!("malformed envelope: {}", reason));
                self.reject(
                    &FailureSite {
                        connection,
                        id,
                        call: None,
                        context: None,
                    },
                    &error,
                );
            }
            Frame::Response { id, .. } => {
                #[cfg(feature = "observability")]
                trace!(request_id = %id, "Server ignoring response envelope");
                let _ = id;
            }
        }
    }

    async fn handle(
        &self,
        connection: Connection,
        registry: Arc<SubscriptionRegistry>,
        id: RequestId,
        mut call: Call,
        mut stop: Option<StopSignal>,
    ) {
        #[cfg(feature = "observability")]
        debug!(
            connection_id = %connection.id(),
            request_id = %id,
            kind = %call.kind,
            path = %call.path,
            "Handling request"
        );

        match self.transformer.deserialize(call.input.clone()) {
            Ok(input) => call.input = input,
            Err(e) => {
                if let Some(stop) = &stop {
                    registry.remove(&id, stop);
                }
                let site = FailureSite {
                    connection: &connection,
                    id,
                    call: Some(&call),
                    context: None,
                };
                self.reject(&site, &RpcError::from(e));
                return;
            }
        }

        let options = ContextOptions {
            connection: connection.clone(),
        };
        let context = match self.context.create(options).await {
            Ok(context) => Arc::new(context),
            Err(error) => {
                if let Some(stop) = &stop {
                    registry.remove(&id, stop);
                }
                let site = FailureSite {
                    connection: &connection,
                    id,
                    call: Some(&call),
                    context: None,
                };
                self.reject(&site, &error);
                return;
            }
        };

        let output = self.router.call(&call, Arc::clone(&context)).await;
        if stop.as_mut().is_some_and(StopSignal::is_stopped) {
            #[cfg(feature = "observability")]
            debug!(request_id = %id, "Subscription stopped before it started");
            return;
        }
        let site = FailureSite {
            connection: &connection,
            id: id.clone(),
            call: Some(&call),
            context: Some(context.as_ref()),
        };

        match (output, stop) {
            (Err(error), stop) => {
                if let Some(stop) = &stop {
                    registry.remove(&id, stop);
                }
                self.reject(&site, &error);
            }
            (Ok(RouterOutput::Stream(stream)), Some(stop)) => {
                self.drive(site, &registry, stream, stop).await;
            }
            (Ok(RouterOutput::Data(value)), None) => match self.transformer.serialize(value) {
                Ok(data) => connection.send(&Message::data(id, data)),
                Err(e) => self.reject(&site, &RpcError::from(e)),
            },
            (Ok(RouterOutput::Data(_)), Some(stop)) => {
                registry.remove(&id, &stop);
                let error = RpcError::internal(format!(
                    "subscription procedure `{}` returned a value instead of a stream",
                    call.path
                ));
                self.reject(&site, &error);
            }
            (Ok(RouterOutput::Stream(_)), None) => {
                let error = RpcError::internal(format!(
                    "{} procedure `{}` returned a stream instead of a value",
                    call.kind, call.path
                ));
                self.reject(&site, &error);
            }
        }
    }

    async fn drive(
        &self,
        site: FailureSite<'_, R::Context>,
        registry: &SubscriptionRegistry,
        mut stream: BoxStream<'static, Result<Value, RpcError>>,
        mut stop: StopSignal,
    ) {
        let connection = site.connection;
        let id = site.id.clone();

        connection.send(&Message::started(id.clone()));

        loop {
            tokio::select! {
                biased;
                _ = stop.stopped() => {
                    #[cfg(feature = "observability")]
                    debug!(request_id = %id, "Subscription stopped");
                    return;
                }
                item = stream.next() => match item {
                    Some(Ok(value)) => match self.transformer.serialize(value) {
                        Ok(data) => connection.send(&Message::data(id.clone(), data)),
                        Err(e) => {
                            registry.remove(&id, &stop);
                            self.reject(&site, &RpcError::from(e));
                            return;
                        }
                    },
                    Some(Err(error)) => {
                        registry.remove(&id, &stop);
                        self.reject(&site, &error);
                        return;
                    }
                    None => {
                        registry.remove(&id, &stop);

                        #[cfg(feature = "observability")]
                        debug!(request_id = %id, "Subscription completed");

                        connection.send(&Message::stopped(id));
                        return;
                    }
                },
            }
        }
    }

    /// Logs, notifies observers, then replies with the error.
    fn reject(&self, site: &FailureSite<'_, R::Context>, error: &RpcError) {
        let path = site.call.map(|call| call.path.as_str());
        log_error(error, path);

        self.observer.notify(&ErrorEvent {
            error,
            kind: site.call.map(|call| call.kind),
            path,
            input: site.call.map(|call| &call.input),
            context: site.context,
            connection: site.connection,
        });

        let wire = codec::serialize_error(error, path, self.config.include_stack_trace);
        site.connection.send(&Message::error(site.id.clone(), wire));
    }
}

impl<R: Router> Clone for Server<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Router> fmt::Debug for Server<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("transformer", &self.inner.transformer.name())
            .field("observer", &self.inner.observer)
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Builder for [`Server`].
pub struct ServerBuilder<R: Router> {
    router: R,
    context: Box<dyn ContextFactory<R::Context>>,
    transformer: Arc<dyn Transformer>,
    observer: ErrorObserver<R::Context>,
    config: ServerConfig,
}

impl<R: Router> ServerBuilder<R> {
    /// Creates a builder with the identity transformer and default config.
    pub fn new(router: R, context: impl ContextFactory<R::Context>) -> Self {
        Self {
            router,
            context: Box::new(context),
            transformer: Arc::new(IdentityTransformer),
            observer: ErrorObserver::new(),
            config: ServerConfig::default(),
        }
    }

    /// Sets the payload transformer.
    #[must_use]
    pub fn transformer(mut self, transformer: impl Transformer) -> Self {
        self.transformer = Arc::new(transformer);
        self
    }

    /// Registers an error observer callback.
    #[must_use]
    pub fn on_error<F>(self, callback: F) -> Self
    where
        F: Fn(&ErrorEvent<'_, R::Context>) + Send + Sync + 'static,
    {
        self.observer.on_error(callback);
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the server.
    pub fn build(self) -> Server<R> {
        Server {
            inner: Arc::new(ServerInner {
                router: self.router,
                context: self.context,
                transformer: self.transformer,
                observer: self.observer,
                config: self.config,
            }),
        }
    }
}

/// One port being served.
#[derive(Debug, Clone)]
pub struct ServerConnection {
    connection: Connection,
    registry: Arc<SubscriptionRegistry>,
}

impl ServerConnection {
    /// Returns the underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns the live subscriptions of this connection.
    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Closes the connection, cancelling every subscription on it.
    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    /// Waits until the connection has closed.
    pub async fn closed(&self) {
        self.connection.closed().await;
    }
}
