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

//! Tracking of pending calls awaiting responses.
//!
//! This module maintains the client's dispatch table: one entry per in-flight
//! call, keyed by correlation ID. A single connection-level listener looks
//! every inbound response up here and routes it to the right caller.

use crate::codec;
use crate::error::ClientError;
use crate::protocol::{RequestId, ResponseResult, WireError};
use crate::serialization::Transformer;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

#[cfg(feature = "observability")]
use tracing::trace;

/// An event delivered to an open subscription.
#[derive(Debug)]
pub enum SubscriptionEvent {
    /// The server confirmed the subscription is live.
    Started,
    /// One stream item, already passed through the transformer.
    Data(Value),
    /// The server completed the stream.
    Stopped,
    /// The subscription failed and will deliver nothing further.
    Error(ClientError),
}

/// Receiving end of a pending query or mutation.
pub type ResponseReceiver = oneshot::Receiver<Result<Value, ClientError>>;

/// Receiving end of a pending subscription.
pub type EventReceiver = mpsc::UnboundedReceiver<SubscriptionEvent>;

#[derive(Debug)]
enum PendingCall {
    Request(oneshot::Sender<Result<Value, ClientError>>),
    Subscription(mpsc::UnboundedSender<SubscriptionEvent>),
}

/// Tracks in-flight calls awaiting responses.
///
/// Query and mutation entries are removed by their first response.
/// Subscription entries stay until a `stopped` result or an error arrives,
/// or until they are cancelled.
///
/// # Thread Safety
///
/// All operations are synchronous and take a short-lived lock, so they can be
/// called from connection callbacks as well as from any task.
///
/// # Example
///
/// ```rust
/// use portrpc::client::PendingCalls;
/// use portrpc::protocol::{RequestId, ResponseResult};
/// use portrpc::serialization::IdentityTransformer;
/// use serde_json::json;
///
/// # async fn example() {
/// let pending = PendingCalls::new();
/// let id = RequestId::generate();
/// let rx = pending.register_request(id.clone());
///
/// let outcome = Ok(ResponseResult::Data { data: json!("pong") });
/// assert!(pending.resolve(&id, outcome, &IdentityTransformer));
///
/// assert_eq!(rx.await.unwrap().unwrap(), json!("pong"));
/// assert!(pending.is_empty());
/// # }
/// ```
#[derive(Debug, Default)]
pub struct PendingCalls {
    calls: Mutex<HashMap<RequestId, PendingCall>>,
}

impl PendingCalls {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a query or mutation.
    ///
    /// Returns a receiver that settles exactly once: with the response, or
    /// with an error on disconnection. It closes without a value if the call
    /// is cancelled.
    pub fn register_request(&self, id: RequestId) -> ResponseReceiver {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().insert(id, PendingCall::Request(tx));
        rx
    }

    /// Registers a subscription.
    pub fn register_subscription(&self, id: RequestId) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.calls.lock().insert(id, PendingCall::Subscription(tx));
        rx
    }

    /// Routes a response to the call registered under `id`.
    ///
    /// Payloads are passed through `transformer` before delivery. A payload
    /// the transformer rejects is delivered to a subscription as an error
    /// event without removing its entry; the consuming stream then cancels
    /// it, which also notifies the server. Returns
    /// `false` if no call is registered under `id`, in which case the
    /// response is discarded.
    pub fn resolve(
        &self,
        id: &RequestId,
        outcome: Result<ResponseResult, WireError>,
        transformer: &dyn Transformer,
    ) -> bool {
        let terminal = matches!(outcome, Ok(ResponseResult::Stopped) | Err(_));

        let target = {
            let mut calls = self.calls.lock();
            match calls.remove(id) {
                None => {
                    #[cfg(feature = "observability")]
                    trace!(request_id = %id, "Discarding response for unknown call");
                    return false;
                }
                Some(PendingCall::Subscription(tx)) if !terminal => {
                    calls.insert(id.clone(), PendingCall::Subscription(tx.clone()));
                    PendingCall::Subscription(tx)
                }
                Some(call) => call,
            }
        };

        match target {
            PendingCall::Request(tx) => {
                let result = match outcome {
                    Ok(ResponseResult::Data { data }) => {
                        transformer.deserialize(data).map_err(ClientError::from)
                    }
                    Ok(ResponseResult::Started | ResponseResult::Stopped) => Ok(Value::Null),
                    Err(wire) => Err(ClientError::Server(codec::deserialize_error(wire))),
                };
                // The caller may have stopped waiting.
                let _ = tx.send(result);
            }
            PendingCall::Subscription(tx) => {
                let event = match outcome {
                    Ok(ResponseResult::Started) => SubscriptionEvent::Started,
                    Ok(ResponseResult::Data { data }) => match transformer.deserialize(data) {
                        Ok(value) => SubscriptionEvent::Data(value),
                        Err(e) => SubscriptionEvent::Error(e.into()),
                    },
                    Ok(ResponseResult::Stopped) => SubscriptionEvent::Stopped,
                    Err(wire) => {
                        SubscriptionEvent::Error(ClientError::Server(codec::deserialize_error(wire)))
                    }
                };
                let _ = tx.send(event);
            }
        }
        true
    }

    /// Removes the call registered under `id` without settling it.
    ///
    /// Returns `true` if the call was still pending.
    pub fn cancel(&self, id: &RequestId) -> bool {
        self.calls.lock().remove(id).is_some()
    }

    /// Settles every pending call with a disconnection error and clears the
    /// table. Returns the number of calls settled.
    pub fn reject_all(&self) -> usize {
        let calls: Vec<PendingCall> = self.calls.lock().drain().map(|(_, call)| call).collect();
        let count = calls.len();

        for call in calls {
            match call {
                PendingCall::Request(tx) => {
                    let _ = tx.send(Err(codec::disconnection_error()));
                }
                PendingCall::Subscription(tx) => {
                    let _ = tx.send(SubscriptionEvent::Error(codec::disconnection_error()));
                }
            }
        }
        count
    }

    /// Returns the number of pending calls.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns `true` if no calls are pending.
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// Returns `true` if a call is registered under `id`.
    pub fn contains(&self, id: &RequestId) -> bool {
        self.calls.lock().contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::protocol::WireErrorData;
    use crate::serialization::{IdentityTransformer, TransformError};
    use serde_json::json;
    use std::sync::Arc;

    struct Rejecting;

    impl Transformer for Rejecting {
        fn serialize(&self, value: Value) -> Result<Value, TransformError> {
            Ok(value)
        }

        fn deserialize(&self, _value: Value) -> Result<Value, TransformError> {
            Err(TransformError::deserialize("rejected"))
        }
    }

    fn data(value: Value) -> Result<ResponseResult, WireError> {
        Ok(ResponseResult::Data { data: value })
    }

    fn wire_error(key: &str) -> WireError {
        WireError {
            code: -32603,
            message: "boom".to_string(),
            data: Some(WireErrorData {
                code: key.to_string(),
                http_status: None,
                stack: None,
                path: None,
            }),
        }
    }

    #[tokio::test]
    async fn test_resolve_request() {
        let pending = PendingCalls::new();
        let id = RequestId::from("1");
        let rx = pending.register_request(id.clone());
        assert!(pending.contains(&id));

        assert!(pending.resolve(&id, data(json!(1)), &IdentityTransformer));
        assert_eq!(rx.await.unwrap().unwrap(), json!(1));

        // Second response for the same id is discarded.
        assert!(!pending.resolve(&id, data(json!(2)), &IdentityTransformer));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_request_with_error() {
        let pending = PendingCalls::new();
        let id = RequestId::from("1");
        let rx = pending.register_request(id.clone());

        pending.resolve(&id, Err(wire_error("FORBIDDEN")), &IdentityTransformer);
        let error = rx.await.unwrap().unwrap_err();
        assert!(error.is_server_error());
        assert_eq!(error.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn test_resolve_request_with_stopped_settles_null() {
        let pending = PendingCalls::new();
        let id = RequestId::from("1");
        let rx = pending.register_request(id.clone());

        pending.resolve(&id, Ok(ResponseResult::Stopped), &IdentityTransformer);
        assert_eq!(rx.await.unwrap().unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_resolve_request_transform_failure() {
        let pending = PendingCalls::new();
        let id = RequestId::from("1");
        let rx = pending.register_request(id.clone());

        pending.resolve(&id, data(json!(1)), &Rejecting);
        assert!(matches!(rx.await.unwrap(), Err(ClientError::Transform(_))));
    }

    #[tokio::test]
    async fn test_subscription_lifecycle() {
        let pending = PendingCalls::new();
        let id = RequestId::from("s");
        let mut rx = pending.register_subscription(id.clone());

        pending.resolve(&id, Ok(ResponseResult::Started), &IdentityTransformer);
        pending.resolve(&id, data(json!(1)), &IdentityTransformer);
        pending.resolve(&id, data(json!(2)), &IdentityTransformer);
        assert!(pending.contains(&id));
        pending.resolve(&id, Ok(ResponseResult::Stopped), &IdentityTransformer);
        assert!(!pending.contains(&id));

        assert!(matches!(rx.recv().await, Some(SubscriptionEvent::Started)));
        assert!(matches!(rx.recv().await, Some(SubscriptionEvent::Data(v)) if v == json!(1)));
        assert!(matches!(rx.recv().await, Some(SubscriptionEvent::Data(v)) if v == json!(2)));
        assert!(matches!(rx.recv().await, Some(SubscriptionEvent::Stopped)));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_subscription_error_is_terminal() {
        let pending = PendingCalls::new();
        let id = RequestId::from("s");
        let mut rx = pending.register_subscription(id.clone());

        pending.resolve(&id, Err(wire_error("INTERNAL_SERVER_ERROR")), &IdentityTransformer);
        assert!(pending.is_empty());
        assert!(matches!(rx.recv().await, Some(SubscriptionEvent::Error(e)) if e.is_server_error()));
    }

    #[tokio::test]
    async fn test_subscription_transform_failure_left_for_stream_to_stop() {
        let pending = PendingCalls::new();
        let id = RequestId::from("s");
        let mut rx = pending.register_subscription(id.clone());

        pending.resolve(&id, data(json!(1)), &Rejecting);
        // The entry stays so the stream's cancel can find it and send a stop.
        assert!(pending.contains(&id));
        assert!(pending.cancel(&id));
        assert!(matches!(
            rx.recv().await,
            Some(SubscriptionEvent::Error(ClientError::Transform(_)))
        ));
    }

    #[tokio::test]
    async fn test_cancel() {
        let pending = PendingCalls::new();
        let id = RequestId::from("1");
        let rx = pending.register_request(id.clone());

        assert!(pending.cancel(&id));
        assert!(!pending.cancel(&id));
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_reject_all() {
        let pending = PendingCalls::new();
        let requests: Vec<_> = (0..3)
            .map(|i| pending.register_request(RequestId::from(format!("r{}", i))))
            .collect();
        let mut subscriptions: Vec<_> = (0..5)
            .map(|i| pending.register_subscription(RequestId::from(format!("s{}", i))))
            .collect();

        assert_eq!(pending.reject_all(), 8);
        assert!(pending.is_empty());

        for rx in requests {
            assert!(rx.await.unwrap().unwrap_err().is_disconnected());
        }
        for rx in &mut subscriptions {
            assert!(matches!(rx.recv().await, Some(SubscriptionEvent::Error(e)) if e.is_disconnected()));
            assert!(rx.recv().await.is_none());
        }
    }

    #[tokio::test]
    async fn test_interleaved_resolution() {
        let pending = Arc::new(PendingCalls::new());
        let mut handles = vec![];

        for i in 0..100u64 {
            let id = RequestId::from(i.to_string());
            let rx = pending.register_request(id.clone());
            handles.push((i, rx));
        }

        // Resolve in reverse order from another task.
        let resolver = Arc::clone(&pending);
        tokio::spawn(async move {
            for i in (0..100u64).rev() {
                let id = RequestId::from(i.to_string());
                resolver.resolve(&id, data(json!(i * 2)), &IdentityTransformer);
            }
        });

        for (i, rx) in handles {
            assert_eq!(rx.await.unwrap().unwrap(), json!(i * 2));
        }
        assert!(pending.is_empty());
    }
}
