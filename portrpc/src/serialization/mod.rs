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

//! Serialization layer for portrpc.
//!
//! Envelopes are always plain JSON values. What varies is how call payloads
//! (request `input` and `result.data`) are encoded inside them, which is the
//! job of a pluggable [`Transformer`].
//!
//! # Overview
//!
//! - **[`Transformer`] trait**: object-safe `serialize`/`deserialize` pair
//!   over [`serde_json::Value`].
//! - **[`IdentityTransformer`]**: the default; payloads cross unchanged.
//! - **[`verify_round_trip`]**: symmetry check used by debug builds of the
//!   client.
//! - **Error type**: [`TransformError`].
//!
//! Typed calls convert between Rust types and `Value` with `serde_json`
//! before the transformer runs on the way out, and after it runs on the way
//! in.

mod error;
mod transformer;

pub use error::TransformError;
pub use transformer::{IdentityTransformer, Transformer, verify_round_trip};
