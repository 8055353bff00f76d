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

//! Error codec.
//!
//! Translates between the server-side [`RpcError`] and the wire
//! [`WireError`], and back into the client-side [`RemoteError`]. Every error
//! goes out with the numeric code [`INTERNAL_ERROR_CODE`]; the classification
//! travels as its string key in `data.code`, so
//! `deserialize_error(serialize_error(e))` preserves the classification and
//! message of `e`.
//!
//! # Examples
//!
//! ```rust
//! use portrpc::codec;
//! use portrpc::{ErrorCode, RpcError};
//!
//! let error = RpcError::new(ErrorCode::Unauthorized, "sign in first");
//! let wire = codec::format_error(&error, Some("settings.save"));
//! assert_eq!(wire.code, codec::INTERNAL_ERROR_CODE);
//! assert_eq!(wire.data.as_ref().unwrap().code, "UNAUTHORIZED");
//!
//! let remote = codec::deserialize_error(wire);
//! assert_eq!(remote.code, ErrorCode::Unauthorized);
//! assert_eq!(remote.message, "sign in first");
//! assert_eq!(remote.path.as_deref(), Some("settings.save"));
//! ```

use crate::error::{ClientError, ErrorCode, RemoteError, RpcError};
use crate::protocol::{WireError, WireErrorData};
use std::error::Error as StdError;
use std::fmt::Write as _;
use std::time::Duration;

/// The JSON-RPC numeric code carried by every error this layer emits.
pub const INTERNAL_ERROR_CODE: i32 = -32603;

/// Converts a server-side error into its wire form, without a stack.
#[must_use]
pub fn format_error(error: &RpcError, path: Option<&str>) -> WireError {
    serialize_error(error, path, false)
}

/// Converts a server-side error into its wire form.
///
/// The numeric code is always [`INTERNAL_ERROR_CODE`]; the classification key
/// and its HTTP status hint are nested in `data`. When `include_stack` is set
/// and the error has a cause, the rendered cause chain is attached as
/// `data.stack`. Raw error objects never cross the wire.
#[must_use]
pub fn serialize_error(error: &RpcError, path: Option<&str>, include_stack: bool) -> WireError {
    let code = error.code();
    let stack = if include_stack {
        render_stack(error)
    } else {
        None
    };

    WireError {
        code: INTERNAL_ERROR_CODE,
        message: error.message().to_owned(),
        data: Some(WireErrorData {
            code: code.key().to_owned(),
            http_status: Some(code.http_status()),
            stack,
            path: path.map(str::to_owned),
        }),
    }
}

/// Reconstructs a server-reported error from its wire form.
///
/// The classification is taken from `data.code` when it is a known key,
/// otherwise from the numeric code (peers outside this layer may classify
/// with the JSON-RPC table), otherwise it defaults to
/// [`ErrorCode::InternalServerError`].
#[must_use]
pub fn deserialize_error(wire: WireError) -> RemoteError {
    let WireError {
        code: json_rpc_code,
        message,
        data,
    } = wire;

    let by_key = data.as_ref().and_then(|data| ErrorCode::from_key(&data.code));
    let code = by_key
        .or_else(|| ErrorCode::from_json_rpc_code(json_rpc_code))
        .unwrap_or(ErrorCode::InternalServerError);

    let (http_status, path, stack) = match data {
        Some(data) => (data.http_status, data.path, data.stack),
        None => (None, None, None),
    };

    RemoteError {
        code,
        json_rpc_code,
        message,
        http_status,
        path,
        stack,
    }
}

/// Returns the HTTP-status-like hint for an error.
#[must_use]
pub fn http_status(error: &RpcError) -> u16 {
    error.code().http_status()
}

/// Returns the JSON-RPC code of an error's classification.
///
/// This is the lookup table used when decoding foreign errors. It is not
/// what [`serialize_error`] puts on the wire.
#[must_use]
pub fn json_rpc_code(error: &RpcError) -> i32 {
    error.code().json_rpc_code()
}

/// Builds the error a caller observes when `path` exceeded `timeout`.
#[must_use]
pub fn timeout_error(path: impl Into<String>, timeout: Duration) -> ClientError {
    ClientError::Timeout {
        path: path.into(),
        timeout,
    }
}

/// Builds the error a caller observes when its connection closed.
#[must_use]
pub fn disconnection_error() -> ClientError {
    ClientError::Disconnected
}

fn render_stack(error: &RpcError) -> Option<String> {
    let mut cause: &(dyn StdError + 'static) = error.source()?;

    let mut stack = format!("RpcError({}): {}", error.code(), error.message());
    loop {
        let _ = write!(stack, "\n  caused by: {}", cause);
        match cause.source() {
            Some(next) => cause = next,
            None => return Some(stack),
        }
    }
}
