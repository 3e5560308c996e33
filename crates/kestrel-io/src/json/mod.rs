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

//! The JSON [`Serializer`](kestrel_core::Serializer) backend.
//!
//! Documents are held as a tree of [`JsonValue`] nodes in a [`JsonArena`]. A write
//! session appends nodes as values arrive and renders the tree once, pretty printed,
//! when the session ends. A read session parses the whole source first, then resolves
//! object members by name and array elements in order.

mod parser;
mod serializer;
mod value;
mod writer;

pub use serializer::JsonSerializer;
pub use value::{JsonArena, JsonValue, NodeId};
