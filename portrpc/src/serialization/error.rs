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

//! Transformer error types.

use std::fmt;

/// Error returned by a [`Transformer`](crate::serialization::Transformer).
///
/// # Examples
///
/// ```rust
/// use portrpc::serialization::TransformError;
///
/// let error = TransformError::deserialize("expected a tagged date");
/// assert!(error.is_deserialize());
/// assert_eq!(error.to_string(), "failed to deserialize payload: expected a tagged date");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// An outbound payload could not be encoded.
    Serialize {
        /// Description of the failure
        reason: String,
    },
    /// An inbound payload could not be decoded.
    Deserialize {
        /// Description of the failure
        reason: String,
    },
}

impl TransformError {
    /// Creates a serialize-direction error.
    pub fn serialize(reason: impl Into<String>) -> Self {
        Self::Serialize {
            reason: reason.into(),
        }
    }

    /// Creates a deserialize-direction error.
    pub fn deserialize(reason: impl Into<String>) -> Self {
        Self::Deserialize {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error happened while decoding.
    #[must_use]
    pub const fn is_deserialize(&self) -> bool {
        matches!(self, Self::Deserialize { .. })
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize { reason } => write!(f, "failed to serialize payload: {}", reason),
            Self::Deserialize { reason } => write!(f, "failed to deserialize payload: {}", reason),
        }
    }
}

impl std::error::Error for TransformError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let error = TransformError::serialize("cycle");
        assert_eq!(error.to_string(), "failed to serialize payload: cycle");
        assert!(!error.is_deserialize());
    }

    #[test]
    fn test_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<TransformError>();
    }
}
