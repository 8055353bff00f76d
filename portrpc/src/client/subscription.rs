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

//! Client-side subscription streams.

use super::pending::{EventReceiver, PendingCalls, SubscriptionEvent};
use crate::error::ClientError;
use crate::protocol::{Message, RequestId};
use crate::transport::Connection;
use futures::Stream;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, ready};

#[cfg(feature = "observability")]
use tracing::debug;

/// A cloneable handle that cancels a subscription.
///
/// Cancelling sends one `subscription.stop` notification to the server and
/// stops local delivery immediately. It does not wait for the server; items
/// already in flight are discarded on arrival.
#[derive(Clone)]
pub struct SubscriptionHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    id: RequestId,
    path: String,
    connection: Connection,
    pending: Arc<PendingCalls>,
    cancelled: AtomicBool,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        id: RequestId,
        path: String,
        connection: Connection,
        pending: Arc<PendingCalls>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                path,
                connection,
                pending,
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the correlation ID of the subscription.
    #[must_use]
    pub fn id(&self) -> &RequestId {
        &self.inner.id
    }

    /// Returns the subscribed path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Cancels the subscription. Calling this more than once has no effect.
    ///
    /// The stop notification is only sent if the subscription had not
    /// already ended, whether by completion, error, or disconnection.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.inner.pending.cancel(&self.inner.id) {
            #[cfg(feature = "observability")]
            debug!(request_id = %self.inner.id, path = %self.inner.path, "Cancelling subscription");

            self.inner.connection.send(&Message::stop(self.inner.id.clone()));
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.inner.id)
            .field("path", &self.inner.path)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A live subscription, consumed as a [`Stream`] of decoded items.
///
/// The stream yields one `Ok` item per `data` event, in the order the server
/// emitted them. It ends after the server completes the stream, or after
/// yielding one `Err` when the subscription fails, its connection closes, or
/// the transformer rejects an item. In the last case a stop is sent to the
/// server. An item that does not decode as `T` yields an `Err` without ending
/// the stream.
///
/// Dropping a `Subscription` cancels it.
///
/// # Example
///
/// ```rust,no_run
/// use futures::StreamExt;
/// use portrpc::client::Client;
///
/// # async fn example(client: Client) -> Result<(), portrpc::ClientError> {
/// let mut feed = client.subscribe::<u64>("feed.watch", &()).await?;
/// while let Some(item) = feed.next().await {
///     println!("item {}", item?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Subscription<T> {
    handle: SubscriptionHandle,
    events: EventReceiver,
    started: bool,
    done: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(handle: SubscriptionHandle, events: EventReceiver) -> Self {
        Self {
            handle,
            events,
            started: false,
            done: false,
            _marker: PhantomData,
        }
    }

    /// Returns the correlation ID of the subscription.
    #[must_use]
    pub fn id(&self) -> &RequestId {
        self.handle.id()
    }

    /// Returns `true` once the server has confirmed the subscription.
    ///
    /// Confirmation is observed while polling the stream.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Returns a handle that can cancel this subscription from elsewhere.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Cancels the subscription and discards the stream.
    pub fn unsubscribe(self) {
        self.handle.cancel();
    }
}

impl<T: DeserializeOwned> Stream for Subscription<T> {
    type Item = Result<T, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.done || this.handle.is_cancelled() {
                return Poll::Ready(None);
            }

            match ready!(this.events.poll_recv(cx)) {
                Some(SubscriptionEvent::Started) => {
                    this.started = true;
                }
                Some(SubscriptionEvent::Data(value)) => {
                    let item = serde_json::from_value(value).map_err(|source| ClientError::Decode {
                        path: this.handle.path().to_owned(),
                        source,
                    });
                    return Poll::Ready(Some(item));
                }
                Some(SubscriptionEvent::Error(error)) => {
                    this.done = true;
                    // A payload the transformer rejected leaves the call live on
                    // both ends; end it there too.
                    this.handle.cancel();
                    return Poll::Ready(Some(Err(error)));
                }
                Some(SubscriptionEvent::Stopped) | None => {
                    this.done = true;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", self.handle.id())
            .field("path", &self.handle.path())
            .field("started", &self.started)
            .field("done", &self.done)
            .finish()
    }
}
