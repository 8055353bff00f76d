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

//! In-memory ports for testing.
//!
//! This module provides ports backed by Tokio channels. They are useful for
//! testing and benchmarking the RPC layer without a host environment.

use super::{ConnectionError, Port, PortProvider, PortSink};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

#[cfg(feature = "observability")]
use tracing::debug;

/// Factory for connected pairs of in-memory ports.
///
/// Values posted to one port arrive, in order, on the other port's inbound
/// stream. Disconnecting either side ends the counterpart's inbound stream.
///
/// # Examples
///
/// ```rust
/// use portrpc::transport::MemoryPort;
///
/// let (client, server) = MemoryPort::pair("trpc");
/// assert_eq!(client.name(), "trpc");
/// assert_eq!(server.name(), "trpc");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MemoryPort;

impl MemoryPort {
    /// Creates a pair of connected ports sharing one channel name.
    #[must_use]
    pub fn pair(name: &str) -> (Port, Port) {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();

        let left = Port::new(name, MemorySink::new(right_tx), receiver_stream(left_rx));
        let right = Port::new(name, MemorySink::new(left_tx), receiver_stream(right_rx));
        (left, right)
    }
}

/// Sending half of an in-memory port.
struct MemorySink {
    tx: Mutex<Option<mpsc::UnboundedSender<Value>>>,
}

impl MemorySink {
    fn new(tx: mpsc::UnboundedSender<Value>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }
}

impl PortSink for MemorySink {
    fn post_message(&self, message: Value) -> Result<(), ConnectionError> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(ConnectionError::Closed)?;
        tx.send(message).map_err(|_| ConnectionError::Closed)
    }

    fn disconnect(&self) {
        // Dropping the sender ends the peer's inbound stream.
        self.tx.lock().take();
    }
}

fn receiver_stream(rx: mpsc::UnboundedReceiver<Value>) -> BoxStream<'static, Value> {
    stream::unfold(rx, |mut rx| async move {
        let value = rx.recv().await?;
        Some((value, rx))
    })
    .boxed()
}

/// A [`PortProvider`] that hands the server half of every opened channel to
/// a [`MemoryListener`].
///
/// # Examples
///
/// ```rust
/// use portrpc::transport::{MemoryHub, PortProvider};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (hub, mut listener) = MemoryHub::new();
///
/// let client_port = hub.connect("trpc").await?;
/// let server_port = listener.accept().await.expect("hub is alive");
/// assert_eq!(client_port.name(), server_port.name());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryHub {
    incoming: mpsc::UnboundedSender<Port>,
}

/// Receiving end of a [`MemoryHub`].
#[derive(Debug)]
pub struct MemoryListener {
    incoming: mpsc::UnboundedReceiver<Port>,
}

impl MemoryHub {
    /// Creates a hub and the listener that receives its server-side ports.
    #[must_use]
    pub fn new() -> (Self, MemoryListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { incoming: tx }, MemoryListener { incoming: rx })
    }
}

#[async_trait]
impl PortProvider for MemoryHub {
    async fn connect(&self, name: &str) -> Result<Port, ConnectionError> {
        let (local, remote) = MemoryPort::pair(name);
        self.incoming
            .send(remote)
            .map_err(|_| ConnectionError::OpenFailed {
                name: name.to_owned(),
                reason: "listener dropped".to_string(),
            })?;

        #[cfg(feature = "observability")]
        debug!(name = %name, "Opened in-memory channel");

        Ok(local)
    }
}

impl MemoryListener {
    /// Waits for the next opened channel.
    ///
    /// Returns `None` once every [`MemoryHub`] clone has been dropped.
    pub async fn accept(&mut self) -> Option<Port> {
        self.incoming.recv().await
    }

    /// Converts the listener into a stream of opened channels.
    pub fn into_stream(self) -> BoxStream<'static, Port> {
        stream::unfold(self, |mut listener| async move {
            let port = listener.accept().await?;
            Some((port, listener))
        })
        .boxed()
    }
}
