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

//! Envelope-level connection over one host port.

use super::{ConnectOptions, ConnectionError, Port, PortProvider, PortSink};
use crate::protocol::Message;
use futures::StreamExt;
use futures::stream::BoxStream;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[cfg(feature = "observability")]
use tracing::{debug, trace, warn};

/// Global counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-local identifier of a [`Connection`], used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the connection ID as a u64.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection({})", self.0)
    }
}

/// Handle returned by [`Connection::on_message`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;
type DisconnectHandler = Box<dyn FnOnce() + Send>;

/// One duplex, envelope-level channel to a counterpart context.
///
/// A `Connection` is a cheap, cloneable handle. All clones share the same
/// listeners and state.
///
/// # Delivery
///
/// Inbound values are decoded into [`Message`]s and handed to every
/// registered listener, one message at a time, in arrival order. Values that
/// are not envelopes are dropped. Delivery starts when the first listener is
/// registered, so nothing is lost between opening a connection and wiring it
/// up.
///
/// # Disconnection
///
/// When the inbound stream ends, or [`disconnect`](Self::disconnect) is
/// called locally, the connection tears down exactly once: it stops
/// accepting sends, runs every disconnect handler, drops its listeners, and
/// wakes everyone awaiting [`closed`](Self::closed). Sending on a
/// disconnected connection is a silent no-op.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    id: ConnectionId,
    name: String,
    sink: Arc<dyn PortSink>,
    connected: AtomicBool,
    inbound: Mutex<Option<BoxStream<'static, Value>>>,
    listeners: Mutex<Vec<(ListenerId, MessageHandler)>>,
    next_listener: AtomicU64,
    disconnect_handlers: Mutex<Vec<DisconnectHandler>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    closed: watch::Sender<bool>,
}

impl Connection {
    /// Wraps an already-open port.
    #[must_use]
    pub fn new(port: Port) -> Self {
        let (name, sink, inbound) = port.into_parts();
        let (closed, _) = watch::channel(false);
        let inner = Arc::new(Inner {
            id: ConnectionId::next(),
            name,
            sink,
            connected: AtomicBool::new(true),
            inbound: Mutex::new(Some(inbound)),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            disconnect_handlers: Mutex::new(Vec::new()),
            pump: Mutex::new(None),
            closed,
        });

        #[cfg(feature = "observability")]
        debug!(connection_id = %inner.id, name = %inner.name, "Connection opened");

        Self { inner }
    }

    /// Establishes a connection from the given options.
    ///
    /// A port supplied in `options` is wrapped directly; otherwise a channel
    /// named `options.name` is opened through `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Unavailable`] if no port was supplied and
    /// there is no provider, or whatever error the provider reports.
    pub async fn open(
        options: ConnectOptions,
        provider: Option<&dyn PortProvider>,
    ) -> Result<Self, ConnectionError> {
        if let Some(port) = options.port {
            return Ok(Self::new(port));
        }

        let provider = provider.ok_or_else(|| ConnectionError::Unavailable {
            reason: "no port supplied and no channel provider configured".to_string(),
        })?;

        let port = provider.connect(&options.name).await?;
        Ok(Self::new(port))
    }

    /// Returns the process-local identifier of this connection.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Returns the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns `true` until the connection has torn down.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Sends an envelope to the counterpart.
    ///
    /// There is no delivery confirmation. On a disconnected connection, or if
    /// the host rejects the message, the envelope is dropped silently.
    pub fn send(&self, message: &Message) {
        if !self.is_connected() {
            #[cfg(feature = "observability")]
            trace!(connection_id = %self.inner.id, "Dropping send on disconnected connection");
            return;
        }

        let value = match serde_json::to_value(message) {
            Ok(value) => value,
            Err(_e) => {
                #[cfg(feature = "observability")]
                warn!(connection_id = %self.inner.id, error = %_e, "Failed to encode envelope");
                return;
            }
        };

        if let Err(_e) = self.inner.sink.post_message(value) {
            #[cfg(feature = "observability")]
            debug!(connection_id = %self.inner.id, error = %_e, "Host rejected message");
        }
    }

    /// Registers a callback invoked once per inbound envelope.
    ///
    /// The first registration starts inbound delivery, which requires a
    /// running Tokio runtime.
    pub fn on_message<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().push((id, Arc::new(handler)));
        self.start();
        id
    }

    /// Unregisters a message listener. Returns `false` if it was not registered.
    pub fn remove_message_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener, _)| *listener != id);
        listeners.len() != before
    }

    /// Registers a callback invoked exactly once when the connection closes.
    ///
    /// If the connection has already closed, the callback runs immediately.
    pub fn on_disconnect<F>(&self, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut handlers = self.inner.disconnect_handlers.lock();
        if self.is_connected() {
            handlers.push(Box::new(handler));
        } else {
            drop(handlers);
            handler();
        }
    }

    /// Closes the connection from this side.
    ///
    /// The host channel is closed and local teardown runs immediately.
    pub fn disconnect(&self) {
        if let Some(pump) = self.inner.pump.lock().take() {
            pump.abort();
        }
        self.inner.teardown();
    }

    /// Waits until the connection has torn down.
    pub async fn closed(&self) {
        let mut closed = self.inner.closed.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = closed.wait_for(|closed| *closed).await;
    }

    fn start(&self) {
        let Some(inbound) = self.inner.inbound.lock().take() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        let pump = tokio::spawn(Inner::pump(inner, inbound));
        *self.inner.pump.lock() = Some(pump);
    }
}

impl Inner {
    async fn pump(inner: Arc<Inner>, mut inbound: BoxStream<'static, Value>) {
        while let Some(value) = inbound.next().await {
            if !inner.connected.load(Ordering::Acquire) {
                break;
            }

            let message = match serde_json::from_value::<Message>(value) {
                Ok(message) => message,
                Err(_e) => {
                    #[cfg(feature = "observability")]
                    trace!(connection_id = %inner.id, error = %_e, "Ignoring non-envelope message");
                    continue;
                }
            };

            // Snapshot so handlers may add or remove listeners.
            let listeners: Vec<MessageHandler> = inner
                .listeners
                .lock()
                .iter()
                .map(|(_, handler)| Arc::clone(handler))
                .collect();
            for listener in listeners {
                listener(&message);
            }
        }

        inner.teardown();
    }

    fn teardown(&self) {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }

        #[cfg(feature = "observability")]
        debug!(connection_id = %self.id, name = %self.name, "Connection closed");

        self.sink.disconnect();

        let handlers = std::mem::take(&mut *self.disconnect_handlers.lock());
        for handler in handlers {
            handler();
        }

        self.listeners.lock().clear();
        self.inbound.lock().take();
        self.closed.send_replace(true);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("connected", &self.is_connected())
            .finish()
    }
}
