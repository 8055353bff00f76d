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

//! Payload transformer trait.

use crate::serialization::TransformError;
use serde_json::Value;

/// Encodes and decodes call payloads.
///
/// A transformer is applied to request `input` and to `result.data` only,
/// never to the envelope itself. Client and server must share the same
/// transformer, and it must be symmetric: `deserialize(serialize(x))` has to
/// be observably equal to `x`. This is not enforced at runtime, although a
/// client built with [`ClientConfig::verify_transformer`] checks it per call
/// and logs a warning on mismatch.
///
/// [`ClientConfig::verify_transformer`]: crate::config::ClientConfig::verify_transformer
///
/// # Thread Safety
///
/// Transformers are shared read-only between every call on a client or
/// server and must be `Send + Sync + 'static`.
///
/// # Examples
///
/// ## Implementing a custom transformer
///
/// ```rust
/// use portrpc::serialization::{TransformError, Transformer};
/// use serde_json::{json, Value};
///
/// /// Wraps every payload in an object so `undefined`-like nulls survive.
/// struct Boxed;
///
/// impl Transformer for Boxed {
///     fn serialize(&self, value: Value) -> Result<Value, TransformError> {
///         Ok(json!({ "json": value }))
///     }
///
///     fn deserialize(&self, value: Value) -> Result<Value, TransformError> {
///         match value {
///             Value::Object(mut map) => map
///                 .remove("json")
///                 .ok_or_else(|| TransformError::deserialize("missing `json` key")),
///             _ => Err(TransformError::deserialize("expected an object")),
///         }
///     }
///
///     fn name(&self) -> &'static str {
///         "boxed"
///     }
/// }
///
/// let boxed = Boxed;
/// let wire = boxed.serialize(json!(42)).unwrap();
/// assert_eq!(boxed.deserialize(wire).unwrap(), json!(42));
/// ```
pub trait Transformer: Send + Sync + 'static {
    /// Encodes an outbound payload.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Serialize`] if the value cannot be encoded.
    fn serialize(&self, value: Value) -> Result<Value, TransformError>;

    /// Decodes an inbound payload.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Deserialize`] if the value is not a valid
    /// encoding.
    fn deserialize(&self, value: Value) -> Result<Value, TransformError>;

    /// Returns the name of this transformer, for logging.
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// The default transformer: payloads cross the wire unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransformer;

impl Transformer for IdentityTransformer {
    fn serialize(&self, value: Value) -> Result<Value, TransformError> {
        Ok(value)
    }

    fn deserialize(&self, value: Value) -> Result<Value, TransformError> {
        Ok(value)
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

/// Returns `true` if `deserialize(serialize(value)) == value`.
///
/// A transformer error in either direction counts as a mismatch.
pub fn verify_round_trip(transformer: &dyn Transformer, value: &Value) -> bool {
    transformer
        .serialize(value.clone())
        .and_then(|encoded| transformer.deserialize(encoded))
        .is_ok_and(|decoded| decoded == *value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Lossy;

    impl Transformer for Lossy {
        fn serialize(&self, _value: Value) -> Result<Value, TransformError> {
            Ok(Value::Null)
        }

        fn deserialize(&self, value: Value) -> Result<Value, TransformError> {
            Ok(value)
        }
    }

    struct Failing;

    impl Transformer for Failing {
        fn serialize(&self, _value: Value) -> Result<Value, TransformError> {
            Err(TransformError::serialize("nope"))
        }

        fn deserialize(&self, value: Value) -> Result<Value, TransformError> {
            Ok(value)
        }
    }

    #[test]
    fn test_identity_is_symmetric() {
        let value = json!({"id": "42", "tags": [1, 2, 3]});
        assert!(verify_round_trip(&IdentityTransformer, &value));
        assert_eq!(IdentityTransformer.name(), "identity");
    }

    #[test]
    fn test_lossy_transformer_detected() {
        assert!(!verify_round_trip(&Lossy, &json!(1)));
        assert!(verify_round_trip(&Lossy, &Value::Null));
        assert_eq!(Lossy.name(), "custom");
    }

    #[test]
    fn test_failing_transformer_detected() {
        assert!(!verify_round_trip(&Failing, &json!("x")));
    }
}
