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

//! Integration tests for payload transformers on both ends of a port.

mod common;

use common::{server_builder, until};
use futures::StreamExt;
use portrpc::{Client, ClientError, ErrorCode, MemoryPort, TransformError, Transformer};
use serde_json::{Value, json};

/// Wraps every payload as `{"json": ...}`.
struct Boxed;

impl Transformer for Boxed {
    fn serialize(&self, value: Value) -> Result<Value, TransformError> {
        Ok(json!({ "json": value }))
    }

    fn deserialize(&self, value: Value) -> Result<Value, TransformError> {
        match value {
            Value::Object(mut map) => map
                .remove("json")
                .ok_or_else(|| TransformError::deserialize("missing `json` key")),
            _ => Err(TransformError::deserialize("expected an object")),
        }
    }

    fn name(&self) -> &'static str {
        "boxed"
    }
}

#[tokio::test]
async fn test_symmetric_transformer_round_trips() {
    let server = server_builder().transformer(Boxed).build();
    let (client_port, server_port) = MemoryPort::pair("trpc");
    let _served = server.accept(server_port);
    let client = Client::builder()
        .port(client_port)
        .transformer(Boxed)
        .build();

    let user: Value = client.query("user.get", &"42").await.unwrap();
    assert_eq!(user, json!({ "id": "42", "name": "Ada" }));

    let items: Vec<u32> = client
        .subscribe::<u32>("feed.watch", &())
        .await
        .unwrap()
        .map(Result::unwrap)
        .collect()
        .await;
    assert_eq!(items, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_mismatched_transformer_is_a_parse_error() {
    let server = server_builder().transformer(Boxed).build();
    let (client_port, server_port) = MemoryPort::pair("trpc");
    let _served = server.accept(server_port);
    let client = Client::from_port(client_port);

    let error = client.query::<Value>("user.get", &"42").await.unwrap_err();
    assert!(error.is_server_error());
    assert_eq!(error.code(), ErrorCode::ParseError);
    assert_eq!(error.remote().unwrap().json_rpc_code, -32603);
}

/// Accepts every payload except the number 1.
struct RejectOne;

impl Transformer for RejectOne {
    fn serialize(&self, value: Value) -> Result<Value, TransformError> {
        Ok(value)
    }

    fn deserialize(&self, value: Value) -> Result<Value, TransformError> {
        if value == json!(1) {
            Err(TransformError::deserialize("1 is not allowed"))
        } else {
            Ok(value)
        }
    }
}

#[tokio::test]
async fn test_rejected_item_ends_subscription_on_both_sides() {
    let server = server_builder().build();
    let (client_port, server_port) = MemoryPort::pair("trpc");
    let served = server.accept(server_port);
    let client = Client::builder()
        .port(client_port)
        .transformer(RejectOne)
        .build();

    let mut feed = client.subscribe::<u32>("feed.stall", &()).await.unwrap();
    until(|| served.registry().len() == 1).await;

    let error = feed.next().await.unwrap().unwrap_err();
    assert!(matches!(error, ClientError::Transform(_)));
    assert!(feed.next().await.is_none());

    until(|| served.registry().is_empty()).await;
    assert_eq!(client.pending_count().await, 0);

    // The connection is still usable.
    let echoed: u32 = client.query("echo", &2).await.unwrap();
    assert_eq!(echoed, 2);
}
