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

//! Wire envelope types.
//!
//! Every message on a port is a JSON object with a single `trpc` key holding
//! an [`Envelope`]. The envelope is deliberately loose on input (all fields
//! optional) so that foreign or partially-formed messages deserialize; the
//! strict shape is recovered afterwards by [`Message::into_frame`].

use super::{JSONRPC_VERSION, RequestId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One message unit exchanged over a port.
///
/// # Example
///
/// ```rust
/// use portrpc::protocol::{CallKind, Message, RequestId};
/// use serde_json::json;
///
/// let message = Message::request(RequestId::from("1"), CallKind::Query, "user.get", json!("42"));
/// assert_eq!(
///     serde_json::to_value(&message).unwrap(),
///     json!({"trpc": {
///         "id": "1",
///         "jsonrpc": "2.0",
///         "method": "query",
///         "params": {"path": "user.get", "input": "42"}
///     }})
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The envelope body.
    pub trpc: Envelope,
}

/// The body of a [`Message`].
///
/// Requests carry `method` and `params`; responses carry exactly one of
/// `result` or `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    /// Protocol version marker, always `"2.0"` when sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    /// Call kind, present on requests and stop notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,
    /// Call target, present on requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
    /// Successful outcome, present on responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResponseResult>,
    /// Failed outcome, present on responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

/// The `method` field of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// A read-only call.
    #[serde(rename = "query")]
    Query,
    /// A state-changing call.
    #[serde(rename = "mutation")]
    Mutation,
    /// A long-lived stream.
    #[serde(rename = "subscription")]
    Subscription,
    /// Client-initiated cancellation of a subscription.
    #[serde(rename = "subscription.stop")]
    SubscriptionStop,
}

impl Method {
    /// Returns the call kind, or `None` for a stop notification.
    #[must_use]
    pub const fn kind(self) -> Option<CallKind> {
        match self {
            Self::Query => Some(CallKind::Query),
            Self::Mutation => Some(CallKind::Mutation),
            Self::Subscription => Some(CallKind::Subscription),
            Self::SubscriptionStop => None,
        }
    }
}

impl From<CallKind> for Method {
    fn from(kind: CallKind) -> Self {
        match kind {
            CallKind::Query => Self::Query,
            CallKind::Mutation => Self::Mutation,
            CallKind::Subscription => Self::Subscription,
        }
    }
}

/// The category of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// Expects exactly one response.
    Query,
    /// Expects exactly one response.
    Mutation,
    /// Expects `started`, any number of `data` results, then one terminal event.
    Subscription,
}

impl CallKind {
    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Dot-delimited operation name.
    pub path: String,
    /// Transformed input payload.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub input: Value,
}

/// The `result` field of a response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResponseResult {
    /// A value: the single result of a query or mutation, or one stream item.
    Data {
        /// Transformed payload.
        #[serde(default)]
        data: Value,
    },
    /// The subscription is live.
    Started,
    /// The subscription completed.
    Stopped,
}

/// The `error` field of a response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    /// JSON-RPC numeric code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Structured classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<WireErrorData>,
}

/// Structured classification nested in a [`WireError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireErrorData {
    /// Error classification key, such as `NOT_FOUND`.
    pub code: String,
    /// HTTP-status-like hint for logging.
    #[serde(rename = "httpStatus", default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Rendered cause chain, for diagnostics only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Path of the failing call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A classified, addressable envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A call to execute.
    Request {
        /// Correlation ID.
        id: RequestId,
        /// Call kind.
        kind: CallKind,
        /// Operation path.
        path: String,
        /// Transformed input.
        input: Value,
    },
    /// Cancellation of a subscription.
    Stop {
        /// ID of the subscription request.
        id: RequestId,
    },
    /// The outcome of, or an event for, an earlier request.
    Response {
        /// Correlation ID.
        id: RequestId,
        /// Result or error.
        outcome: Result<ResponseResult, WireError>,
    },
    /// An addressable envelope that is neither a valid request nor response.
    Malformed {
        /// Correlation ID.
        id: RequestId,
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl Frame {
    /// Returns the correlation ID of this frame.
    #[must_use]
    pub fn id(&self) -> &RequestId {
        match self {
            Self::Request { id, .. }
            | Self::Stop { id }
            | Self::Response { id, .. }
            | Self::Malformed { id, .. } => id,
        }
    }
}

impl Message {
    fn new(envelope: Envelope) -> Self {
        Self {
            trpc: Envelope {
                jsonrpc: Some(JSONRPC_VERSION.to_string()),
                ..envelope
            },
        }
    }

    /// Builds a request envelope.
    #[must_use]
    pub fn request(id: RequestId, kind: CallKind, path: impl Into<String>, input: Value) -> Self {
        Self::new(Envelope {
            id: Some(id),
            method: Some(kind.into()),
            params: Some(Params {
                path: path.into(),
                input,
            }),
            ..Envelope::default()
        })
    }

    /// Builds a `subscription.stop` notification.
    #[must_use]
    pub fn stop(id: RequestId) -> Self {
        Self::new(Envelope {
            id: Some(id),
            method: Some(Method::SubscriptionStop),
            ..Envelope::default()
        })
    }

    /// Builds a successful response.
    #[must_use]
    pub fn result(id: RequestId, result: ResponseResult) -> Self {
        Self::new(Envelope {
            id: Some(id),
            result: Some(result),
            ..Envelope::default()
        })
    }

    /// Builds a `data` response.
    #[must_use]
    pub fn data(id: RequestId, data: Value) -> Self {
        Self::result(id, ResponseResult::Data { data })
    }

    /// Builds a `started` response.
    #[must_use]
    pub fn started(id: RequestId) -> Self {
        Self::result(id, ResponseResult::Started)
    }

    /// Builds a `stopped` response.
    #[must_use]
    pub fn stopped(id: RequestId) -> Self {
        Self::result(id, ResponseResult::Stopped)
    }

    /// Builds an error response.
    #[must_use]
    pub fn error(id: RequestId, error: WireError) -> Self {
        Self::new(Envelope {
            id: Some(id),
            error: Some(error),
            ..Envelope::default()
        })
    }

    /// Classifies this message.
    ///
    /// Returns `None` for envelopes without an `id`, which cannot be
    /// answered and are ignored by both sides.
    #[must_use]
    pub fn into_frame(self) -> Option<Frame> {
        let Envelope {
            id,
            method,
            params,
            result,
            error,
            ..
        } = self.trpc;
        let id = id?;

        let frame = match (method.map(Method::kind), params, result, error) {
            (Some(None), _, _, _) => Frame::Stop { id },
            (Some(Some(kind)), Some(params), None, None) => Frame::Request {
                id,
                kind,
                path: params.path,
                input: params.input,
            },
            (Some(Some(_)), None, None, None) => Frame::Malformed {
                id,
                reason: "request without params",
            },
            (Some(Some(_)), _, _, _) => Frame::Malformed {
                id,
                reason: "request carrying a result or error",
            },
            (None, _, Some(result), None) => Frame::Response {
                id,
                outcome: Ok(result),
            },
            (None, _, None, Some(error)) => Frame::Response {
                id,
                outcome: Err(error),
            },
            (None, _, Some(_), Some(_)) => Frame::Malformed {
                id,
                reason: "response carrying both result and error",
            },
            (None, _, None, None) => Frame::Malformed {
                id,
                reason: "envelope without method, result, or error",
            },
        };
        Some(frame)
    }
}
