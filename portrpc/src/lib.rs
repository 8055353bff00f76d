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

#![doc = include_str!("../../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! ## Architecture
//!
//! portrpc is organized into several layers:
//!
//! - **[`transport`]**: ports, the [`Connection`] wrapper around them, and an
//!   in-memory port pair for tests and same-process use
//! - **[`protocol`]**: the JSON envelope, call kinds, and request IDs
//! - **[`serialization`]**: pluggable payload transformers
//! - **[`codec`]**: conversion between [`RpcError`] and its wire form
//! - **[`client`]**: the caller side, with request correlation, timeouts, and
//!   subscription streams
//! - **[`server`]**: the adapter between ports and a [`Router`]
//! - **[`observability`]**: error observers and structured logging
//!
//! [`Router`]: server::Router

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod serialization;
pub mod server;
pub mod transport;

pub use client::{Client, ClientBuilder, Response, Subscription, SubscriptionEvent};
pub use config::{CallOptions, ClientConfig, ServerConfig};
pub use error::{ClientError, ErrorCode, RemoteError, RpcError};
pub use observability::{ErrorEvent, ErrorObserver, log_error};
pub use protocol::{CallKind, Message, RequestId};
pub use serialization::{IdentityTransformer, TransformError, Transformer};
pub use server::{Server, ServerBuilder, ServerConnection};
pub use transport::{
    ConnectOptions, Connection, ConnectionError, MemoryHub, MemoryPort, Port, PortProvider,
    PortSink,
};
