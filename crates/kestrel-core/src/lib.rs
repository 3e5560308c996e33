// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Kestrel Core
//!
//! The serializer contract shared by every backend, the reflection boundary, and the
//! traversal that drives a serializer over reflected types.

#![warn(missing_docs)]

// Lets `#[derive(Reflect)]` output name this crate by its public path from inside it.
extern crate self as kestrel_core;

pub mod config;
pub mod error;
pub mod flags;
pub mod hash;
pub mod reflect;
pub mod serializer;
pub mod traversal;

pub use config::CodecConfig;
pub use error::{ErrorCategory, ParseErrorKind, SerializeError, SerializeResult};
pub use flags::{SerializationFlags, DEFAULT_SERIALIZATION_FLAGS};
pub use hash::FieldHash;
pub use kestrel_macros::Reflect;
pub use reflect::{
    MemberDesc, Reflect, ReflectArray, ReflectEnum, Reflected, ScalarKind, TypeKind, ValueMut,
};
pub use serializer::{Scalar, SerializationMode, Serializer, SerializerExt, SessionState};
pub use traversal::{
    serialize_class_instance, serialize_class_instance_members, serialize_reflected,
    serialize_value,
};
