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

//! Wire protocol for portrpc.
//!
//! Messages are JSON values of the shape:
//!
//! ```text
//! { "trpc": {
//!     "id": string,
//!     "jsonrpc": "2.0",
//!     "method"?: "query" | "mutation" | "subscription" | "subscription.stop",
//!     "params"?: { "path": string, "input": any },
//!     "result"?: { "type": "data" | "started" | "stopped", "data"?: any },
//!     "error"?: { "code": number, "message": string,
//!                 "data"?: { "code": string, "httpStatus": number,
//!                            "stack"?: string, "path"?: string } }
//! }}
//! ```
//!
//! Many calls share one port; every response refers back to its request by
//! [`RequestId`] and is routed by that ID alone.

mod envelope;
mod id;

pub use envelope::{
    CallKind, Envelope, Frame, Message, Method, Params, ResponseResult, WireError, WireErrorData,
};
pub use id::RequestId;

/// Value of the `jsonrpc` field on every outbound envelope.
pub const JSONRPC_VERSION: &str = "2.0";
