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

//! Seams to the procedure router and the context factory.
//!
//! portrpc does not resolve procedures itself. A [`Router`] takes a
//! [`Call`] (kind, path, and already-decoded input) plus a per-call context
//! and produces either a single value or a stream of values.

use crate::error::RpcError;
use crate::protocol::CallKind;
use crate::transport::Connection;
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// One call to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Call kind.
    pub kind: CallKind,
    /// Dot-delimited procedure path.
    pub path: String,
    /// Input, already passed through the transformer.
    pub input: Value,
}

/// What a router produced for a call.
pub enum RouterOutput {
    /// The single result of a query or mutation.
    Data(Value),
    /// The items of a subscription. The subscription completes when the
    /// stream ends and fails at the first `Err` item.
    Stream(BoxStream<'static, Result<Value, RpcError>>),
}

impl RouterOutput {
    /// Serializes a single result.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorCode::ParseError`](crate::ErrorCode::ParseError) if
    /// the value cannot be serialized.
    pub fn data<T: Serialize>(value: T) -> Result<Self, RpcError> {
        Ok(Self::Data(serde_json::to_value(value)?))
    }

    /// Wraps a stream of serializable items.
    pub fn stream<S, T>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, RpcError>> + Send + 'static,
        T: Serialize,
    {
        Self::Stream(
            stream
                .map(|item| item.and_then(|value| Ok(serde_json::to_value(value)?)))
                .boxed(),
        )
    }

    /// Returns `true` for a stream output.
    #[must_use]
    pub const fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }
}

impl fmt::Debug for RouterOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Executes named procedures.
///
/// # Example
///
/// ```rust
/// use portrpc::protocol::CallKind;
/// use portrpc::server::{Call, Router, RouterOutput};
/// use portrpc::RpcError;
/// use std::sync::Arc;
///
/// struct Greeter;
///
/// #[async_trait::async_trait]
/// impl Router for Greeter {
///     type Context = ();
///
///     async fn call(&self, call: &Call, _ctx: Arc<()>) -> Result<RouterOutput, RpcError> {
///         match (call.kind, call.path.as_str()) {
///             (CallKind::Query, "greet") => {
///                 let name = call.input.as_str().unwrap_or("world");
///                 RouterOutput::data(format!("hello, {}", name))
///             }
///             _ => Err(RpcError::not_found(format!("no procedure `{}`", call.path))),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Router: Send + Sync + 'static {
    /// Per-call execution context.
    type Context: Send + Sync + 'static;

    /// Executes `call`.
    ///
    /// Subscriptions must produce [`RouterOutput::Stream`]; queries and
    /// mutations must produce [`RouterOutput::Data`]. Any other combination
    /// is reported to the caller as an internal error.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if the procedure fails; it is sent to the
    /// caller as an error reply.
    async fn call(&self, call: &Call, ctx: Arc<Self::Context>) -> Result<RouterOutput, RpcError>;
}

#[async_trait]
impl<R: Router + ?Sized> Router for Arc<R> {
    type Context = R::Context;

    async fn call(&self, call: &Call, ctx: Arc<Self::Context>) -> Result<RouterOutput, RpcError> {
        (**self).call(call, ctx).await
    }
}

/// Request-scoped information handed to a [`ContextFactory`].
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// The connection the call arrived on.
    pub connection: Connection,
}

/// Creates the execution context for each call.
///
/// A failure is replied to the caller exactly like a router error.
#[async_trait]
pub trait ContextFactory<C>: Send + Sync + 'static {
    /// Creates a context for one call.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] if no context can be created.
    async fn create(&self, options: ContextOptions) -> Result<C, RpcError>;
}

/// A [`ContextFactory`] built from an async closure.
///
/// # Example
///
/// ```rust
/// use portrpc::server::{ContextOptions, FnContextFactory};
/// use portrpc::RpcError;
///
/// struct Session {
///     channel: String,
/// }
///
/// let factory = FnContextFactory::new(|options: ContextOptions| async move {
///     Ok::<_, RpcError>(Session {
///         channel: options.connection.name().to_owned(),
///     })
/// });
/// # let _ = factory;
/// ```
pub struct FnContextFactory<F> {
    f: F,
}

impl<F> FnContextFactory<F> {
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<C, F, Fut> ContextFactory<C> for FnContextFactory<F>
where
    C: Send + 'static,
    F: Fn(ContextOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<C, RpcError>> + Send + 'static,
{
    async fn create(&self, options: ContextOptions) -> Result<C, RpcError> {
        (self.f)(options).await
    }
}

impl<F> fmt::Debug for FnContextFactory<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnContextFactory")
    }
}

/// A [`ContextFactory`] producing `C::default()` for every call.
pub struct DefaultContext<C>(PhantomData<fn() -> C>);

impl<C> DefaultContext<C> {
    /// Creates the factory.
    #[must_use]
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<C> Default for DefaultContext<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for DefaultContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DefaultContext")
    }
}

#[async_trait]
impl<C> ContextFactory<C> for DefaultContext<C>
where
    C: Default + Send + 'static,
{
    async fn create(&self, _options: ContextOptions) -> Result<C, RpcError> {
        Ok(C::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::transport::MemoryPort;
    use futures::stream;
    use serde_json::json;

    fn options() -> ContextOptions {
        let (port, _peer) = MemoryPort::pair("ctx");
        ContextOptions {
            connection: Connection::new(port),
        }
    }

    #[test]
    fn test_output_data() {
        let output = RouterOutput::data(json!({"ok": true})).unwrap();
        assert!(!output.is_stream());
        assert!(matches!(output, RouterOutput::Data(v) if v == json!({"ok": true})));
    }

    #[tokio::test]
    async fn test_output_stream_serializes_items() {
        let items = stream::iter(vec![Ok(1u8), Err(RpcError::internal("x")), Ok(3)]);
        let output = RouterOutput::stream(items);
        assert!(output.is_stream());

        let RouterOutput::Stream(mut stream) = output else {
            panic!("expected a stream");
        };
        assert_eq!(stream.next().await.unwrap().unwrap(), json!(1));
        assert_eq!(
            stream.next().await.unwrap().unwrap_err().code(),
            ErrorCode::InternalServerError
        );
        assert_eq!(stream.next().await.unwrap().unwrap(), json!(3));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_fn_context_factory() {
        let factory = FnContextFactory::new(|options: ContextOptions| async move {
            Ok::<_, RpcError>(options.connection.name().to_owned())
        });
        assert_eq!(factory.create(options()).await.unwrap(), "ctx");

        let failing = FnContextFactory::new(|_options: ContextOptions| async move {
            Err::<(), _>(RpcError::new(ErrorCode::Unauthorized, "no session"))
        });
        let error = failing.create(options()).await.unwrap_err();
        assert_eq!(error.code(), ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn test_default_context() {
        let factory = DefaultContext::<Vec<u8>>::new();
        assert!(factory.create(options()).await.unwrap().is_empty());
    }
}
