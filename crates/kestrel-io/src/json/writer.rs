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

//! Pretty printing of a node tree.

use std::fmt::Write;

use super::value::{JsonArena, JsonValue, NodeId};

/// Renders the tree under `root`, one value per line, terminated by `newline`.
pub fn write_pretty(arena: &JsonArena, root: NodeId, indent: &str, newline: &str) -> String {
    let mut writer = PrettyWriter {
        arena,
        indent,
        newline,
        out: String::new(),
    };
    writer.value(root, 0);
    writer.out.push_str(newline);
    writer.out
}

struct PrettyWriter<'a> {
    arena: &'a JsonArena,
    indent: &'a str,
    newline: &'a str,
    out: String,
}

impl PrettyWriter<'_> {
    fn value(&mut self, node: NodeId, depth: usize) {
        let arena = self.arena;
        match arena.get(node) {
            JsonValue::Null => self.out.push_str("null"),
            JsonValue::Bool(value) => self.out.push_str(if *value { "true" } else { "false" }),
            JsonValue::Number(text) => self.out.push_str(text),
            JsonValue::String(text) => self.string(text),
            JsonValue::Array(elements) if elements.is_empty() => self.out.push_str("[]"),
            JsonValue::Object(members) if members.is_empty() => self.out.push_str("{}"),
            JsonValue::Array(elements) => {
                self.out.push('[');
                for (i, &element) in elements.iter().enumerate() {
                    self.separator(i, depth + 1);
                    self.value(element, depth + 1);
                }
                self.line(depth);
                self.out.push(']');
            }
            JsonValue::Object(members) => {
                self.out.push('{');
                for (i, (name, member)) in members.iter().enumerate() {
                    self.separator(i, depth + 1);
                    self.string(name);
                    self.out.push_str(": ");
                    self.value(*member, depth + 1);
                }
                self.line(depth);
                self.out.push('}');
            }
        }
    }

    fn separator(&mut self, index: usize, depth: usize) {
        if index > 0 {
            self.out.push(',');
        }
        self.line(depth);
    }

    fn line(&mut self, depth: usize) {
        self.out.push_str(self.newline);
        for _ in 0..depth {
            self.out.push_str(self.indent);
        }
    }

    fn string(&mut self, text: &str) {
        self.out.push('"');
        for c in text.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                '\u{8}' => self.out.push_str("\\b"),
                '\u{c}' => self.out.push_str("\\f"),
                c if (c as u32) < 0x20 => {
                    let _ = write!(self.out, "\\u{:04x}", c as u32);
                }
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_prints_with_tabs() {
        let mut arena = JsonArena::default();
        let one = arena.alloc(JsonValue::Number("1".into()));
        let two = arena.alloc(JsonValue::Number("2".into()));
        let list = arena.alloc(JsonValue::Array(vec![one, two]));
        let empty = arena.alloc(JsonValue::Object(Vec::new()));
        let name = arena.alloc(JsonValue::String("a \"b\"\n".into()));
        let root = arena.alloc(JsonValue::Object(vec![
            ("list".into(), list),
            ("empty".into(), empty),
            ("name".into(), name),
        ]));

        assert_eq!(
            write_pretty(&arena, root, "\t", "\n"),
            "{\n\t\"list\": [\n\t\t1,\n\t\t2\n\t],\n\t\"empty\": {},\n\t\"name\": \"a \\\"b\\\"\\n\"\n}\n"
        );
    }

    #[test]
    fn scalar_root_is_newline_terminated() {
        let mut arena = JsonArena::default();
        let root = arena.alloc(JsonValue::Bool(false));
        assert_eq!(write_pretty(&arena, root, "  ", "\r\n"), "false\r\n");

        let control = arena.alloc(JsonValue::String("\u{1}".into()));
        assert_eq!(write_pretty(&arena, control, "  ", "\n"), "\"\\u0001\"\n");
    }
}
