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

use kestrel_core::{
    CodecConfig, SerializationMode, SerializeError, SerializeResult, Serializer, SessionState,
};

use super::parser;
use super::value::{JsonArena, JsonValue, NodeId};
use super::writer;

/// An open array or object. Array reads consume elements through `cursor`.
#[derive(Debug, Clone, Copy)]
struct Scope {
    node: NodeId,
    cursor: usize,
}

/// The JSON [`Serializer`] backend.
///
/// A write session builds a node tree and renders it at [`Serializer::end_write`]. A read
/// session parses the whole source at [`Serializer::begin_read`], then walks the tree.
/// Exactly one root value is written or read per session.
#[derive(Default)]
pub struct JsonSerializer {
    state: SessionState,
    config: CodecConfig,
    arena: JsonArena,
    root: Option<NodeId>,
    stack: Vec<Scope>,
}

impl JsonSerializer {
    /// Creates a serializer with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a serializer with the given configuration.
    pub fn with_config(config: CodecConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Returns the configuration of this serializer.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn reset(&mut self) {
        self.arena.clear();
        self.root = None;
        self.stack.clear();
    }

    fn closed_session(&self) -> SerializeError {
        debug_assert!(false, "Serializer used outside of a session.");
        SerializeError::NoOpenScope
    }

    /// Attaches a new node holding `value` where the next value goes.
    fn push_value(&mut self, value: JsonValue, id: Option<&str>) -> SerializeResult<NodeId> {
        let Some(scope) = self.stack.last() else {
            if let Some(id) = id {
                return Err(SerializeError::IdOutsideObject(id.to_string()));
            }
            if self.root.is_some() {
                return Err(SerializeError::RootWrittenTwice);
            }
            let node = self.arena.alloc(value);
            self.root = Some(node);
            return Ok(node);
        };
        let parent = scope.node;

        match (self.arena.get(parent), id) {
            (JsonValue::Object(_), None) => return Err(SerializeError::MissingId),
            (JsonValue::Object(_), Some(id)) if self.arena.find_member(parent, id).is_some() => {
                log::warn!("Field \"{id}\" written twice in the same object, second write rejected.");
                return Err(SerializeError::DuplicateField(id.to_string()));
            }
            (JsonValue::Array(_), Some(id)) => {
                return Err(SerializeError::IdOutsideObject(id.to_string()))
            }
            _ => {}
        }

        let node = self.arena.alloc(value);
        match (self.arena.get_mut(parent), id) {
            (JsonValue::Object(members), Some(id)) => members.push((id.to_string(), node)),
            (JsonValue::Array(elements), _) => elements.push(node),
            _ => return Err(SerializeError::NoOpenScope),
        }
        Ok(node)
    }

    /// Finds the node the next read consumes.
    fn next_value(&mut self, id: Option<&str>) -> SerializeResult<NodeId> {
        let Some(scope) = self.stack.last_mut() else {
            if let Some(id) = id {
                return Err(SerializeError::IdOutsideObject(id.to_string()));
            }
            return self.root.ok_or(SerializeError::NoOpenScope);
        };

        match (self.arena.get(scope.node), id) {
            (JsonValue::Object(_), None) => Err(SerializeError::MissingId),
            (JsonValue::Object(_), Some(id)) => self
                .arena
                .find_member(scope.node, id)
                .ok_or_else(|| SerializeError::FieldNotFound(id.to_string())),
            (JsonValue::Array(_), Some(id)) => Err(SerializeError::IdOutsideObject(id.to_string())),
            (JsonValue::Array(elements), None) => {
                let element = elements.get(scope.cursor).copied().ok_or(
                    SerializeError::ArrayOutOfBounds {
                        index: scope.cursor,
                        len: elements.len(),
                    },
                )?;
                scope.cursor += 1;
                Ok(element)
            }
            _ => Err(SerializeError::NoOpenScope),
        }
    }

    fn read_value(&mut self, id: Option<&str>) -> SerializeResult<&JsonValue> {
        let node = self.next_value(id)?;
        Ok(self.arena.get(node))
    }

    fn read_number(&mut self, id: Option<&str>) -> SerializeResult<&str> {
        match self.read_value(id)? {
            JsonValue::Number(text) => Ok(text),
            _ => Err(SerializeError::TypeMismatch { expected: "number" }),
        }
    }

    fn serialize_integer<T>(&mut self, value: &mut T, id: Option<&str>) -> SerializeResult
    where
        T: ToString + TryFrom<i128>,
    {
        let result = match self.state.mode() {
            SerializationMode::Write => self
                .push_value(JsonValue::Number(value.to_string()), id)
                .map(|_| ()),
            SerializationMode::Read => self
                .read_number(id)
                .and_then(parse_integer::<T>)
                .map(|parsed| *value = parsed),
            SerializationMode::None => Err(self.closed_session()),
        };
        self.state.record(result)
    }

    fn serialize_float<T>(&mut self, value: &mut T, id: Option<&str>) -> SerializeResult
    where
        T: JsonFloat,
    {
        let result = match self.state.mode() {
            SerializationMode::Write => self
                .push_value(JsonValue::Number(value.to_json()), id)
                .map(|_| ()),
            SerializationMode::Read => self
                .read_number(id)
                .and_then(T::from_json)
                .map(|parsed| *value = parsed),
            SerializationMode::None => Err(self.closed_session()),
        };
        self.state.record(result)
    }

    fn begin_scope(&mut self, empty: JsonValue, id: Option<&str>) -> SerializeResult<usize> {
        let expected = empty.type_name();
        let node = match self.state.mode() {
            SerializationMode::Write => self.push_value(empty, id)?,
            SerializationMode::Read => self.next_value(id)?,
            SerializationMode::None => return Err(self.closed_session()),
        };
        let len = match self.arena.get(node) {
            JsonValue::Array(elements) if expected == "array" => elements.len(),
            JsonValue::Object(members) if expected == "object" => members.len(),
            _ => return Err(SerializeError::TypeMismatch { expected }),
        };
        self.stack.push(Scope { node, cursor: 0 });
        Ok(len)
    }

    fn end_scope(&mut self, expected: &'static str) -> SerializeResult {
        if self.state.mode() == SerializationMode::None {
            return Err(self.closed_session());
        }
        let scope = self.stack.last().ok_or(SerializeError::NoOpenScope)?;
        let found = self.arena.get(scope.node).type_name();
        if found != expected {
            return Err(SerializeError::ScopeMismatch { expected, found });
        }
        self.stack.pop();
        Ok(())
    }
}

fn parse_integer<T: TryFrom<i128>>(text: &str) -> SerializeResult<T> {
    let out_of_range = || SerializeError::NumberOutOfRange {
        text: text.to_string(),
        target: std::any::type_name::<T>(),
    };

    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i128::from_str_radix(hex, 16).map(|v| if negative { -v } else { v }),
        None => text.parse::<i128>(),
    };

    let wide = match parsed {
        Ok(wide) => wide,
        Err(err) => match err.kind() {
            std::num::IntErrorKind::PosOverflow | std::num::IntErrorKind::NegOverflow => {
                return Err(out_of_range())
            }
            // Integral values written with a fraction or an exponent, like `1e3`.
            _ => match text.parse::<f64>() {
                Ok(float) if float.is_finite() && float.fract() == 0.0 => {
                    if float.abs() >= 1e38 {
                        return Err(out_of_range());
                    }
                    float as i128
                }
                _ => return Err(SerializeError::TypeMismatch { expected: "integer" }),
            },
        },
    };
    T::try_from(wide).map_err(|_| out_of_range())
}

/// Float conversions to and from JSON number text.
trait JsonFloat: Sized {
    fn to_json(&self) -> String;
    fn from_json(text: &str) -> SerializeResult<Self>;
}

macro_rules! impl_json_float {
    ($($ty:ty),*) => {
        $(
            impl JsonFloat for $ty {
                fn to_json(&self) -> String {
                    if self.is_nan() {
                        "NaN".to_string()
                    } else if self.is_infinite() {
                        let sign = if *self > 0.0 { "" } else { "-" };
                        format!("{sign}Infinity")
                    } else {
                        self.to_string()
                    }
                }

                fn from_json(text: &str) -> SerializeResult<Self> {
                    match text {
                        "NaN" => return Ok(<$ty>::NAN),
                        "Infinity" => return Ok(<$ty>::INFINITY),
                        "-Infinity" => return Ok(<$ty>::NEG_INFINITY),
                        _ => {}
                    }
                    if let Ok(value) = text.parse::<$ty>() {
                        return Ok(value);
                    }
                    // Hexadecimal integers are valid JSON5 numbers.
                    parse_integer::<i128>(text)
                        .map(|value| value as $ty)
                        .map_err(|err| match err {
                            SerializeError::NumberOutOfRange { text, .. } => {
                                SerializeError::NumberOutOfRange {
                                    text,
                                    target: stringify!($ty),
                                }
                            }
                            _ => SerializeError::TypeMismatch { expected: "number" },
                        })
                }
            }
        )*
    };
}

impl_json_float!(f32, f64);

macro_rules! integer_operations {
    ($($method:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method(&mut self, value: &mut $ty, id: Option<&str>) -> SerializeResult {
                self.serialize_integer(value, id)
            }
        )*
    };
}

impl<'de> Serializer<'de> for JsonSerializer {
    fn mode(&self) -> SerializationMode {
        self.state.mode()
    }

    fn last_error(&self) -> &str {
        self.state.last_error()
    }

    fn begin_write(&mut self) {
        self.state.begin(SerializationMode::Write);
        self.reset();
    }

    fn end_write(&mut self) -> Vec<u8> {
        debug_assert!(
            self.stack.is_empty(),
            "Write session closed with open array or object scopes."
        );
        let output = match self.root {
            Some(root) => writer::write_pretty(
                &self.arena,
                root,
                &self.config.json_indent,
                &self.config.json_newline,
            ),
            None => String::new(),
        };
        self.reset();
        self.state.end(SerializationMode::Write);
        output.into_bytes()
    }

    fn begin_read(&mut self, data: &'de [u8]) -> SerializeResult {
        debug_assert_eq!(
            self.state.mode(),
            SerializationMode::None,
            "Serializer is in the middle of another serialization session."
        );
        self.reset();
        match parser::parse(
            data,
            &mut self.arena,
            self.config.allow_json5,
            self.config.json_max_depth,
        ) {
            Ok(root) => {
                self.state.begin(SerializationMode::Read);
                self.root = Some(root);
                log::trace!("Parsed JSON source into {} nodes.", self.arena.len());
                Ok(())
            }
            Err(err) => {
                self.reset();
                self.state.fail(err)
            }
        }
    }

    fn end_read(&mut self) {
        debug_assert!(
            self.stack.is_empty(),
            "Read session closed with open array or object scopes."
        );
        self.reset();
        self.state.end(SerializationMode::Read);
    }

    fn serialize_bool(&mut self, value: &mut bool, id: Option<&str>) -> SerializeResult {
        let result = match self.state.mode() {
            SerializationMode::Write => self.push_value(JsonValue::Bool(*value), id).map(|_| ()),
            SerializationMode::Read => match self.read_value(id) {
                Ok(JsonValue::Bool(stored)) => {
                    *value = *stored;
                    Ok(())
                }
                Ok(_) => Err(SerializeError::TypeMismatch { expected: "boolean" }),
                Err(err) => Err(err),
            },
            SerializationMode::None => Err(self.closed_session()),
        };
        self.state.record(result)
    }

    integer_operations! {
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
    }

    fn serialize_f32(&mut self, value: &mut f32, id: Option<&str>) -> SerializeResult {
        self.serialize_float(value, id)
    }

    fn serialize_f64(&mut self, value: &mut f64, id: Option<&str>) -> SerializeResult {
        self.serialize_float(value, id)
    }

    fn serialize_string(&mut self, value: &mut String, id: Option<&str>) -> SerializeResult {
        let result = match self.state.mode() {
            SerializationMode::Write => self
                .push_value(JsonValue::String(value.clone()), id)
                .map(|_| ()),
            SerializationMode::Read => match self.read_value(id) {
                Ok(JsonValue::String(stored)) => {
                    value.clone_from(stored);
                    Ok(())
                }
                Ok(_) => Err(SerializeError::TypeMismatch { expected: "string" }),
                Err(err) => Err(err),
            },
            SerializationMode::None => Err(self.closed_session()),
        };
        self.state.record(result)
    }

    fn begin_serialize_array(&mut self, size: &mut u32, id: Option<&str>) -> SerializeResult {
        let capacity = *size as usize;
        let result = self
            .begin_scope(JsonValue::Array(Vec::with_capacity(capacity)), id)
            .map(|len| {
                if self.state.mode() == SerializationMode::Read {
                    *size = len as u32;
                }
            });
        self.state.record(result)
    }

    fn end_serialize_array(&mut self) -> SerializeResult {
        let result = self.end_scope("array");
        self.state.record(result)
    }

    fn begin_serialize_object(&mut self, id: Option<&str>) -> SerializeResult {
        let result = self
            .begin_scope(JsonValue::Object(Vec::new()), id)
            .map(|_| ());
        self.state.record(result)
    }

    fn end_serialize_object(&mut self) -> SerializeResult {
        let result = self.end_scope("object");
        self.state.record(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::SerializerExt;

    fn write_json(f: impl FnOnce(&mut JsonSerializer)) -> String {
        let mut serializer = JsonSerializer::new();
        serializer.begin_write();
        f(&mut serializer);
        String::from_utf8(serializer.end_write()).expect("Output should be UTF-8")
    }

    #[test]
    fn writes_pretty_object() {
        let json = write_json(|s| {
            s.begin_serialize_object(None).unwrap();
            s.serialize(&mut 800_i32, Some("width")).unwrap();
            s.serialize(&mut 0.5_f32, Some("scale")).unwrap();
            s.serialize(&mut true, Some("visible")).unwrap();
            s.end_serialize_object().unwrap();
        });

        assert_eq!(
            json,
            "{\n\t\"width\": 800,\n\t\"scale\": 0.5,\n\t\"visible\": true\n}\n"
        );
    }

    #[test]
    fn second_root_is_rejected() {
        let json = write_json(|s| {
            s.serialize(&mut 1_u8, None).unwrap();
            let err = s.serialize(&mut 2_u8, None).unwrap_err();
            assert_eq!(err, SerializeError::RootWrittenTwice);
            assert_eq!(s.last_error(), "can't write the root value twice");
        });
        assert_eq!(json, "1\n");
    }

    #[test]
    fn duplicate_field_is_rejected() {
        let json = write_json(|s| {
            s.begin_serialize_object(None).unwrap();
            s.serialize(&mut 1_i32, Some("a")).unwrap();
            let err = s.serialize(&mut 2_i32, Some("a")).unwrap_err();
            assert_eq!(err, SerializeError::DuplicateField("a".into()));
            s.end_serialize_object().unwrap();
        });
        assert_eq!(json, "{\n\t\"a\": 1\n}\n");
    }

    #[test]
    fn integer_reads_check_range() {
        let source = br#"{ "small": 300, "negative": -1, "big": 18446744073709551615, "hex": 0xFF, "exp": 1e3 }"#;
        let mut serializer = JsonSerializer::new();
        serializer.begin_read(source).unwrap();
        serializer.begin_serialize_object(None).unwrap();

        let mut byte = 0_u8;
        let err = serializer.serialize(&mut byte, Some("small")).unwrap_err();
        assert_eq!(
            err,
            SerializeError::NumberOutOfRange {
                text: "300".into(),
                target: "u8"
            }
        );
        assert!(serializer.serialize(&mut byte, Some("negative")).is_err());

        let mut wide = 0_u64;
        serializer.serialize(&mut wide, Some("big")).unwrap();
        assert_eq!(wide, u64::MAX);

        serializer.serialize(&mut byte, Some("hex")).unwrap();
        assert_eq!(byte, 255);

        let mut thousand = 0_i16;
        serializer.serialize(&mut thousand, Some("exp")).unwrap();
        assert_eq!(thousand, 1000);

        serializer.end_serialize_object().unwrap();
        serializer.end_read();
    }

    #[test]
    fn float_reads_accept_wide_hex() {
        let huge = format!("0x{}", "F".repeat(40));
        let source = format!(r#"{{ "max": 0xFFFFFFFFFFFFFFFF, "neg": -0x10, "huge": {huge} }}"#);
        let mut serializer = JsonSerializer::new();
        serializer.begin_read(source.as_bytes()).unwrap();
        serializer.begin_serialize_object(None).unwrap();

        let mut max = 0.0_f64;
        serializer.serialize(&mut max, Some("max")).unwrap();
        assert_eq!(max, 18446744073709551615.0);

        let mut neg = 0.0_f32;
        serializer.serialize(&mut neg, Some("neg")).unwrap();
        assert_eq!(neg, -16.0);

        let err = serializer.serialize(&mut max, Some("huge")).unwrap_err();
        assert_eq!(err, SerializeError::NumberOutOfRange { text: huge, target: "f64" });

        serializer.end_serialize_object().unwrap();
        serializer.end_read();
    }

    #[test]
    fn type_mismatch_keeps_session_usable() {
        let source = br#"{ "name": "kestrel", "count": 3 }"#;
        let mut serializer = JsonSerializer::new();
        serializer.begin_read(source).unwrap();
        serializer.begin_serialize_object(None).unwrap();

        let mut count = 0_i32;
        let err = serializer.serialize(&mut count, Some("name")).unwrap_err();
        assert_eq!(err, SerializeError::TypeMismatch { expected: "number" });
        assert_eq!(serializer.last_error(), "current value is not a number type");

        let mut size = 0;
        let err = serializer.begin_serialize_array(&mut size, Some("count")).unwrap_err();
        assert_eq!(err, SerializeError::TypeMismatch { expected: "array" });

        serializer.serialize(&mut count, Some("count")).unwrap();
        assert_eq!(count, 3);

        serializer.end_serialize_object().unwrap();
        serializer.end_read();
    }

    #[test]
    fn array_reads_use_a_cursor() {
        let source = b"[10, 20]";
        let mut serializer = JsonSerializer::new();
        serializer.begin_read(source).unwrap();

        let mut size = 0;
        serializer.begin_serialize_array(&mut size, None).unwrap();
        assert_eq!(size, 2);

        let mut values = [0_u32; 2];
        for value in &mut values {
            serializer.serialize(value, None).unwrap();
        }
        assert_eq!(values, [10, 20]);

        let mut extra = 0_u32;
        let err = serializer.serialize(&mut extra, None).unwrap_err();
        assert_eq!(err, SerializeError::ArrayOutOfBounds { index: 2, len: 2 });

        let err = serializer.serialize(&mut extra, Some("x")).unwrap_err();
        assert_eq!(err, SerializeError::IdOutsideObject("x".into()));

        serializer.end_serialize_array().unwrap();
        serializer.end_read();
    }

    #[test]
    fn parse_failure_does_not_open_a_session() {
        let mut serializer = JsonSerializer::new();
        let err = serializer.begin_read(b"{ \"a\": }").unwrap_err();

        assert!(matches!(err, SerializeError::Parse { line: 1, column: 8, .. }));
        assert_eq!(serializer.mode(), SerializationMode::None);
        assert!(serializer.last_error().starts_with("JSON parsing error, line 1, column 8"));
    }

    #[test]
    fn non_finite_floats_round_trip() {
        let json = write_json(|s| {
            s.begin_serialize_array(&mut 3, None).unwrap();
            s.serialize(&mut f64::NAN, None).unwrap();
            s.serialize(&mut f64::INFINITY, None).unwrap();
            s.serialize(&mut f32::NEG_INFINITY, None).unwrap();
            s.end_serialize_array().unwrap();
        });
        assert_eq!(json, "[\n\tNaN,\n\tInfinity,\n\t-Infinity\n]\n");

        let mut serializer = JsonSerializer::new();
        serializer.begin_read(json.as_bytes()).unwrap();
        let mut size = 0;
        serializer.begin_serialize_array(&mut size, None).unwrap();
        let (mut nan, mut inf, mut neg) = (0.0_f64, 0.0_f64, 0.0_f32);
        serializer.serialize(&mut nan, None).unwrap();
        serializer.serialize(&mut inf, None).unwrap();
        serializer.serialize(&mut neg, None).unwrap();
        serializer.end_serialize_array().unwrap();
        serializer.end_read();

        assert!(nan.is_nan());
        assert_eq!(inf, f64::INFINITY);
        assert_eq!(neg, f32::NEG_INFINITY);
    }
}
