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

//! Integration tests for connection loss on either side.
//!
//! Every outstanding call must settle with a disconnection error, and every
//! server-side subscription on the lost port must be cancelled.

mod common;

use common::{connect, server_builder, until};
use futures::StreamExt;
use portrpc::{ClientError, ConnectionError, ErrorCode, MemoryHub};
use serde_json::Value;

#[tokio::test]
async fn test_client_disconnect_settles_everything() {
    let server = server_builder().build();
    let (client, served) = connect(&server);

    let mut feeds = Vec::new();
    for _ in 0..5 {
        feeds.push(client.subscribe::<u32>("feed.forever", &()).await.unwrap());
    }
    let calls: Vec<_> = (0..2)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.query::<String>("slow.op", &10_000).await })
        })
        .collect();

    until(|| served.registry().len() == 5).await;
    while client.pending_count().await < 7 {
        tokio::task::yield_now().await;
    }

    client.disconnect().await;

    for call in calls {
        let error = call.await.unwrap().unwrap_err();
        assert!(error.is_disconnected());
        assert_eq!(error.code(), ErrorCode::ClientClosedRequest);
    }
    for feed in &mut feeds {
        let error = feed.next().await.unwrap().unwrap_err();
        assert!(matches!(error, ClientError::Disconnected));
        assert!(feed.next().await.is_none());
    }

    served.closed().await;
    assert_eq!(served.registry().len(), 0);
    assert_eq!(client.pending_count().await, 0);
}

#[tokio::test]
async fn test_server_disconnect_settles_everything() {
    let server = server_builder().build();
    let (client, served) = connect(&server);

    let mut feed = client.subscribe::<u32>("feed.forever", &()).await.unwrap();
    let call = {
        let client = client.clone();
        tokio::spawn(async move { client.query::<String>("slow.op", &10_000).await })
    };
    until(|| served.registry().len() == 1).await;
    while client.pending_count().await < 2 {
        tokio::task::yield_now().await;
    }

    served.disconnect();

    assert!(call.await.unwrap().unwrap_err().is_disconnected());
    assert!(feed.next().await.unwrap().unwrap_err().is_disconnected());
    assert!(served.registry().is_empty());
    assert!(!client.connection().await.is_ok_and(|c| c.is_connected()));
}

#[tokio::test]
async fn test_call_after_disconnect_without_provider() {
    let server = server_builder().build();
    let (client, served) = connect(&server);

    let echoed: u32 = client.query("echo", &1).await.unwrap();
    assert_eq!(echoed, 1);

    served.disconnect();
    served.closed().await;

    // The one-shot port is spent and there is nothing to reconnect with.
    let error = client.query::<Value>("echo", &2).await.unwrap_err();
    assert!(matches!(error, ClientError::Connection(_) | ClientError::Disconnected));
}

#[tokio::test]
async fn test_reconnect_after_disconnect() {
    let server = server_builder().build();
    let (hub, listener) = MemoryHub::new();
    {
        let server = server.clone();
        tokio::spawn(async move { server.serve(listener.into_stream()).await });
    }

    let client = portrpc::Client::new(hub);
    let mut feed = client.subscribe::<u32>("feed.forever", &()).await.unwrap();
    let first = client.connection().await.unwrap();

    client.disconnect().await;
    assert!(feed.next().await.unwrap().unwrap_err().is_disconnected());

    let echoed: String = client.query("echo", &"again").await.unwrap();
    assert_eq!(echoed, "again");
    let second = client.connection().await.unwrap();
    assert_ne!(first.id(), second.id());
}

#[tokio::test]
async fn test_provider_refusal_surfaces_as_open_failure() {
    let (hub, listener) = MemoryHub::new();
    drop(listener);

    let client = portrpc::Client::new(hub);
    let error = client.query::<Value>("echo", &1).await.unwrap_err();
    assert!(matches!(
        error,
        ClientError::Connection(ConnectionError::OpenFailed { ref name, .. }) if name == "trpc"
    ));
    assert_eq!(client.pending_count().await, 0);
}

#[tokio::test]
async fn test_dropping_client_closes_server_side() {
    let server = server_builder().build();
    let (client, served) = connect(&server);

    let mut feed = client.subscribe::<u32>("feed.forever", &()).await.unwrap();
    until(|| served.registry().len() == 1).await;

    drop(client);

    served.closed().await;
    assert!(served.registry().is_empty());
    assert!(feed.next().await.unwrap().unwrap_err().is_disconnected());
}
