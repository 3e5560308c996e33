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

//! JSON document nodes and the arena that owns them.

/// A handle to a node stored in a [`JsonArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A JSON value. Containers refer to their children by [`NodeId`].
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    /// `null`
    Null,
    /// `true` or `false`
    Bool(bool),
    /// A number, kept as its decimal (or hexadecimal) text.
    Number(String),
    /// A string.
    String(String),
    /// Elements in order.
    Array(Vec<NodeId>),
    /// Members in insertion order.
    Object(Vec<(String, NodeId)>),
}

impl JsonValue {
    /// Returns the JSON name of the value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            JsonValue::Null => "null",
            JsonValue::Bool(_) => "boolean",
            JsonValue::Number(_) => "number",
            JsonValue::String(_) => "string",
            JsonValue::Array(_) => "array",
            JsonValue::Object(_) => "object",
        }
    }
}

/// Owns every node of a document. All nodes are released together.
#[derive(Debug, Default)]
pub struct JsonArena {
    nodes: Vec<JsonValue>,
}

impl JsonArena {
    /// Stores `value` and returns its handle.
    pub fn alloc(&mut self, value: JsonValue) -> NodeId {
        self.nodes.push(value);
        NodeId(self.nodes.len() - 1)
    }

    /// Returns the node behind `id`.
    pub fn get(&self, id: NodeId) -> &JsonValue {
        &self.nodes[id.0]
    }

    /// Returns the node behind `id` mutably.
    pub fn get_mut(&mut self, id: NodeId) -> &mut JsonValue {
        &mut self.nodes[id.0]
    }

    /// Returns the first member of `object` called `name`.
    pub fn find_member(&self, object: NodeId, name: &str) -> Option<NodeId> {
        match self.get(object) {
            JsonValue::Object(members) => members
                .iter()
                .find(|(member, _)| member == name)
                .map(|&(_, id)| id),
            _ => None,
        }
    }

    /// Returns the number of stored nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no node is stored.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Releases every node. Handles from before the call become invalid.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_are_found_by_name() {
        let mut arena = JsonArena::default();
        let width = arena.alloc(JsonValue::Number("800".into()));
        let height = arena.alloc(JsonValue::Number("600".into()));
        let object = arena.alloc(JsonValue::Object(vec![
            ("width".into(), width),
            ("height".into(), height),
        ]));

        assert_eq!(arena.find_member(object, "height"), Some(height));
        assert_eq!(arena.find_member(object, "depth"), None);
        assert_eq!(arena.find_member(width, "width"), None);
        assert_eq!(arena.get(object).type_name(), "object");

        arena.clear();
        assert!(arena.is_empty());
    }
}
