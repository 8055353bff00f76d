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

//! Correlation ID generation for request-response matching.
//!
//! Every request envelope carries a [`RequestId`] and every response, stream
//! event, or stop notification refers back to it. IDs only need to be unique
//! among the calls currently in flight on one connection, but they are
//! generated from random UUIDs so that they stay unique across every
//! connection in the process without any shared counter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Correlation identifier linking a request to its response(s).
///
/// On the wire this is a plain JSON string. Peers may send any string; IDs
/// generated locally are hyphenated UUID v4 values.
///
/// # Thread Safety
///
/// [`RequestId::generate`] is stateless and can be called concurrently from
/// any number of tasks without coordination.
///
/// # Example
///
/// ```rust
/// use portrpc::protocol::RequestId;
///
/// let id1 = RequestId::generate();
/// let id2 = RequestId::generate();
/// assert_ne!(id1, id2);
///
/// let fixed = RequestId::from("42");
/// assert_eq!(fixed.as_str(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generates a fresh, collision-resistant correlation ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the ID, returning the underlying string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_is_uuid() {
        let id = RequestId::generate();
        assert!(uuid::Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn test_generate_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            let id = RequestId::generate();
            assert!(ids.insert(id.clone()), "Duplicate ID generated: {}", id);
        }
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = RequestId::from("abc");
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("abc"));

        let back: RequestId = serde_json::from_value(serde_json::json!("abc")).unwrap();
        assert_eq!(back, id);
    }

    #[tokio::test]
    async fn test_generate_concurrent() {
        let mut handles = vec![];

        for _ in 0..10 {
            handles.push(tokio::spawn(async move {
                (0..100).map(|_| RequestId::generate()).collect::<Vec<_>>()
            }));
        }

        let mut all_ids = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(all_ids.insert(id.clone()), "Duplicate ID in concurrent test: {}", id);
            }
        }

        assert_eq!(all_ids.len(), 1000);
    }
}
