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

//! Shared router and wiring for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{StreamExt, stream};
use portrpc::server::{Call, ContextOptions, FnContextFactory, Router, RouterOutput};
use portrpc::{
    CallKind, Client, ErrorCode, MemoryPort, RpcError, Server, ServerBuilder, ServerConfig,
    ServerConnection,
};
use serde_json::json;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Per-call context: the name of the port the call arrived on.
#[derive(Debug, Clone, PartialEq)]
pub struct TestContext {
    pub channel: String,
}

/// Procedures used across the integration tests.
///
/// - `user.get` (query): `"42"` resolves to Ada, anything else is NOT_FOUND
/// - `slow.op` (query): sleeps for `input` milliseconds (200 by default)
/// - `echo` (any kind but subscription): returns its input
/// - `fail.internal` (mutation): an internal error with a cause
/// - `feed.watch` (subscription): emits 1, 2, 3 then completes
/// - `feed.forever` (subscription): never emits, never completes
/// - `feed.broken` (subscription): emits 1 then fails with CONFLICT
/// - `feed.stall` (subscription): emits 1 then never completes
pub struct TestRouter;

#[async_trait]
impl Router for TestRouter {
    type Context = TestContext;

    async fn call(&self, call: &Call, _ctx: Arc<TestContext>) -> Result<RouterOutput, RpcError> {
        match (call.kind, call.path.as_str()) {
            (CallKind::Query, "user.get") => {
                let id = call
                    .input
                    .as_str()
                    .ok_or_else(|| RpcError::bad_request("expected a string id"))?;
                if id == "42" {
                    RouterOutput::data(json!({ "id": id, "name": "Ada" }))
                } else {
                    Err(RpcError::not_found(format!("no user `{}`", id)))
                }
            }
            (CallKind::Query, "slow.op") => {
                let delay = call.input.as_u64().unwrap_or(200);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                RouterOutput::data("done")
            }
            (CallKind::Query | CallKind::Mutation, "echo") => {
                Ok(RouterOutput::Data(call.input.clone()))
            }
            (CallKind::Mutation, "fail.internal") => Err(RpcError::internal(
                "database unavailable",
            )
            .with_cause(io::Error::other("connection refused"))),
            (CallKind::Subscription, "feed.watch") => Ok(RouterOutput::stream(stream::iter(
                (1..=3u32).map(Ok::<_, RpcError>),
            ))),
            (CallKind::Subscription, "feed.forever") => Ok(RouterOutput::stream(
                stream::pending::<Result<u32, RpcError>>(),
            )),
            (CallKind::Subscription, "feed.broken") => Ok(RouterOutput::stream(stream::iter(
                vec![
                    Ok(1u32),
                    Err(RpcError::new(ErrorCode::Conflict, "feed diverged")),
                ],
            ))),
            (CallKind::Subscription, "feed.stall") => Ok(RouterOutput::stream(
                stream::iter([Ok::<_, RpcError>(1u32)]).chain(stream::pending()),
            )),
            _ => Err(RpcError::not_found(format!(
                "no {} procedure `{}`",
                call.kind, call.path
            ))),
        }
    }
}

/// A server builder with the test router and a context built from the port.
pub fn server_builder() -> ServerBuilder<TestRouter> {
    let context = FnContextFactory::new(|options: ContextOptions| async move {
        Ok::<_, RpcError>(TestContext {
            channel: options.connection.name().to_owned(),
        })
    });
    Server::builder(TestRouter, context).config(ServerConfig::new().with_stack_trace(false))
}

/// Connects a fresh client to `server` over an in-memory port pair.
pub fn connect(server: &Server<TestRouter>) -> (Client, ServerConnection) {
    let (client_port, server_port) = MemoryPort::pair("trpc");
    let served = server.accept(server_port);
    (Client::from_port(client_port), served)
}

/// Waits until `condition` holds, yielding to other tasks in between.
pub async fn until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
