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

//! Observability support for portrpc.
//!
//! # Overview
//!
//! - **[`ErrorObserver`]**: callbacks invoked with the full detail of every
//!   error a server is about to reply with, before it is reduced to its wire
//!   form.
//! - **[`log_error`]**: structured logging of server-side errors through
//!   `tracing`.
//!
//! # Error Observers
//!
//! Observers are for local logging and telemetry. They run before the error
//! reply is sent, and nothing they do can change that reply: a panicking
//! callback is caught and discarded.
//!
//! ```rust
//! use portrpc::observability::ErrorObserver;
//!
//! let observer = ErrorObserver::<()>::new();
//! observer.on_error(|event| {
//!     eprintln!(
//!         "{} failed: {}",
//!         event.path.unwrap_or("<unknown>"),
//!         event.error
//!     );
//! });
//! ```
//!
//! # Logging
//!
//! With the default `observability` feature, every crate component logs
//! through `tracing` with structured fields such as `connection_id`,
//! `request_id`, `path`, and `kind`. Install any subscriber to see them:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("portrpc=debug")
//!     .init();
//! ```

use crate::error::RpcError;
use crate::protocol::CallKind;
use crate::transport::Connection;
use parking_lot::Mutex;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Everything known about a failed call at the moment it failed.
#[derive(Debug)]
pub struct ErrorEvent<'a, C> {
    /// The error, before serialization.
    pub error: &'a RpcError,
    /// Kind of the failing call, if the envelope named one.
    pub kind: Option<CallKind>,
    /// Path of the failing call, if known.
    pub path: Option<&'a str>,
    /// Input of the failing call, if known.
    ///
    /// This is the transformed input if the transformer succeeded, and the
    /// raw wire input otherwise.
    pub input: Option<&'a Value>,
    /// The execution context, if one was created before the failure.
    pub context: Option<&'a C>,
    /// The connection the call arrived on.
    pub connection: &'a Connection,
}

/// Type alias for error callback functions.
pub type ErrorCallback<C> = Arc<dyn Fn(&ErrorEvent<'_, C>) + Send + Sync>;

/// Observer for server-side call errors.
///
/// `C` is the router's context type.
///
/// # Examples
///
/// ```rust
/// use portrpc::observability::ErrorObserver;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// let observer = ErrorObserver::<()>::new();
/// let counter = Arc::new(AtomicU64::new(0));
/// let counter_clone = counter.clone();
///
/// observer.on_error(move |_event| {
///     counter_clone.fetch_add(1, Ordering::Relaxed);
/// });
/// assert_eq!(observer.len(), 1);
/// ```
pub struct ErrorObserver<C> {
    callbacks: Arc<Mutex<Vec<ErrorCallback<C>>>>,
}

impl<C> ErrorObserver<C> {
    /// Creates an observer with no callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            callbacks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Registers a callback.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&ErrorEvent<'_, C>) + Send + Sync + 'static,
    {
        self.callbacks.lock().push(Arc::new(callback));
    }

    /// Invokes every registered callback with `event`.
    ///
    /// Callbacks run in registration order. A panic in one callback is
    /// caught; the remaining callbacks still run.
    pub fn notify(&self, event: &ErrorEvent<'_, C>) {
        // Snapshot so callbacks may register further callbacks.
        let callbacks: Vec<ErrorCallback<C>> = self.callbacks.lock().clone();
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                #[cfg(feature = "observability")]
                tracing::warn!(path = ?event.path, "Error observer panicked");
            }
        }
    }

    /// Removes every callback.
    pub fn clear(&self) {
        self.callbacks.lock().clear();
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Returns `true` if no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.lock().is_empty()
    }
}

impl<C> Clone for ErrorObserver<C> {
    fn clone(&self) -> Self {
        Self {
            callbacks: Arc::clone(&self.callbacks),
        }
    }
}

impl<C> Default for ErrorObserver<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for ErrorObserver<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorObserver")
            .field("callback_count", &self.len())
            .finish()
    }
}

/// Logs a server-side error with structured context.
///
/// The level follows the classification: server faults (5xx class) are
/// logged at ERROR, everything else, being the caller's fault, at DEBUG.
#[cfg(feature = "observability")]
pub fn log_error(error: &RpcError, path: Option<&str>) {
    let code = error.code();
    if code.is_server_fault() {
        tracing::error!(
            code = %code,
            path = path.unwrap_or("<unknown>"),
            error = %error,
            cause = error.cause().map(tracing::field::display),
            "Call failed"
        );
    } else {
        tracing::debug!(
            code = %code,
            path = path.unwrap_or("<unknown>"),
            error = %error,
            "Call rejected"
        );
    }
}

/// Logs a server-side error (no-op when the `observability` feature is
/// disabled).
#[cfg(not(feature = "observability"))]
pub fn log_error(_error: &RpcError, _path: Option<&str>) {}
