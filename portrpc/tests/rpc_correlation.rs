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

//! Integration tests for request/response correlation.
//!
//! These tests verify that:
//! - Each response settles exactly the call that issued it
//! - Concurrent calls may complete out of order
//! - Server errors arrive with their classification intact
//! - Timed out calls do not disturb later calls

mod common;

use common::{connect, server_builder};
use portrpc::{CallOptions, ClientError, ErrorCode, MemoryHub, Server};
use serde_json::{Value, json};
use std::time::Duration;

#[tokio::test]
async fn test_query_resolves_with_data() {
    let server = server_builder().build();
    let (client, _served) = connect(&server);

    let user: Value = client.query("user.get", &"42").await.unwrap();
    assert_eq!(user, json!({ "id": "42", "name": "Ada" }));
    assert_eq!(client.pending_count().await, 0);
}

#[tokio::test]
async fn test_interleaved_responses_reach_their_callers() {
    let server = server_builder().build();
    let (client, _served) = connect(&server);

    // The slow call is issued first but answered last.
    let (slow, fast, echoed) = tokio::join!(
        client.query::<String>("slow.op", &100),
        client.query::<Value>("user.get", &"42"),
        client.mutation::<Vec<u32>>("echo", &[1, 2, 3]),
    );

    assert_eq!(slow.unwrap(), "done");
    assert_eq!(fast.unwrap()["name"], "Ada");
    assert_eq!(echoed.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_many_concurrent_calls() {
    let server = server_builder().build();
    let (client, _served) = connect(&server);

    let calls = (0..50u32).map(|n| {
        let client = client.clone();
        tokio::spawn(async move { client.query::<u32>("echo", &n).await })
    });
    let results = futures::future::join_all(calls).await;

    for (n, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap().unwrap(), n as u32);
    }
    assert_eq!(client.pending_count().await, 0);
}

#[tokio::test]
async fn test_server_error_is_classified() {
    let server = server_builder().build();
    let (client, _served) = connect(&server);

    let error = client.query::<Value>("user.get", &"7").await.unwrap_err();
    assert!(error.is_server_error());
    assert_eq!(error.code(), ErrorCode::NotFound);

    let remote = error.remote().unwrap();
    assert_eq!(remote.message, "no user `7`");
    assert_eq!(remote.http_status, Some(404));
    assert_eq!(remote.path.as_deref(), Some("user.get"));
    assert!(remote.stack.is_none());
}

#[tokio::test]
async fn test_unknown_procedure() {
    let server = server_builder().build();
    let (client, _served) = connect(&server);

    let error = client.mutation::<Value>("user.delete", &()).await.unwrap_err();
    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn test_timeout_then_recovers() {
    let server = server_builder().build();
    let (client, _served) = connect(&server);

    let error = client
        .query_with::<String>(
            "slow.op",
            &200,
            CallOptions::timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        ClientError::Timeout { ref path, timeout } if path == "slow.op" && timeout == Duration::from_millis(50)
    ));
    assert_eq!(error.code(), ErrorCode::Timeout);
    assert!(!error.is_server_error());
    assert_eq!(client.pending_count().await, 0);

    // The late response for the timed out call must be discarded.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let user: Value = client.query("user.get", &"42").await.unwrap();
    assert_eq!(user["id"], "42");
}

#[tokio::test]
async fn test_client_default_timeout() {
    let server = server_builder().build();
    let (hub, listener) = MemoryHub::new();
    {
        let server = server.clone();
        tokio::spawn(async move { server.serve(listener.into_stream()).await });
    }

    let client = portrpc::Client::builder()
        .provider(hub)
        .timeout(Duration::from_millis(30))
        .build();

    let error = client.query::<String>("slow.op", &500).await.unwrap_err();
    assert!(error.is_timeout());

    // A per-call deadline overrides the client default.
    let done: String = client
        .query_with("slow.op", &50, CallOptions::timeout(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(done, "done");
}

#[tokio::test]
async fn test_serve_many_clients() {
    let server: Server<_> = server_builder().build();
    let (hub, listener) = MemoryHub::new();
    {
        let server = server.clone();
        tokio::spawn(async move { server.serve(listener.into_stream()).await });
    }

    let clients: Vec<_> = (0..4).map(|_| portrpc::Client::new(hub.clone())).collect();
    for (n, client) in clients.iter().enumerate() {
        let echoed: usize = client.query("echo", &n).await.unwrap();
        assert_eq!(echoed, n);
    }
}
