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

//! A self-describing binary serializer.
//!
//! Every value is stored behind a size prefix, so a reader can skip any value without
//! knowing its type. The layout of the three block kinds is:
//!
//! ```text
//! scalar: [u32 size][size bytes]
//! array:  [u32 total size][u32 element count][elements...]
//! object: [u32 total size][u32 data size][members...][u32 index count][(u32 hash, u32 offset)...]
//! ```
//!
//! Total sizes include their own header. Index offsets are relative to the first
//! member byte. The index is the only way a reader locates a field, so members can be
//! read in any order and unknown members are skipped. Integers use the host byte order.

use ahash::{AHashMap, AHashSet};
use bytemuck::Pod;
use kestrel_core::{
    CodecConfig, FieldHash, SerializationMode, SerializeError, SerializeResult, Serializer,
    SessionState,
};

use crate::buffer::GrowBuffer;

const SIZE_FIELD: usize = std::mem::size_of::<u32>();
const INDEX_ENTRY: usize = 2 * SIZE_FIELD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Plain,
    Array,
    Object,
}

impl ScopeKind {
    fn name(self) -> &'static str {
        match self {
            ScopeKind::Plain => "root",
            ScopeKind::Array => "array",
            ScopeKind::Object => "object",
        }
    }
}

struct WriteFrame {
    kind: ScopeKind,
    buffer: GrowBuffer,
    declared_count: u32,
    written_count: u32,
    index: Vec<(FieldHash, u32)>,
    written_ids: AHashSet<FieldHash>,
}

impl WriteFrame {
    fn new(kind: ScopeKind, config: &CodecConfig) -> Self {
        Self {
            kind,
            buffer: GrowBuffer::new(config.initial_capacity, config.growth_slack),
            declared_count: 0,
            written_count: 0,
            index: Vec::new(),
            written_ids: AHashSet::new(),
        }
    }

    /// Validates `id` against the scope and records where the next value starts.
    fn claim(&mut self, id: Option<&str>) -> SerializeResult {
        match (self.kind, id) {
            (ScopeKind::Object, None) => Err(SerializeError::MissingId),
            (ScopeKind::Object, Some(id)) => {
                let hash = FieldHash::of(id);
                if !self.written_ids.insert(hash) {
                    log::warn!("Field \"{id}\" written twice in the same object, second write rejected.");
                    return Err(SerializeError::DuplicateField(id.to_string()));
                }
                // Object frames start with the two header fields.
                let offset = self.buffer.cursor() - 2 * SIZE_FIELD;
                self.index.push((hash, offset as u32));
                Ok(())
            }
            (_, Some(id)) => Err(SerializeError::IdOutsideObject(id.to_string())),
            (ScopeKind::Array, None) => {
                self.written_count += 1;
                Ok(())
            }
            (ScopeKind::Plain, None) => Ok(()),
        }
    }
}

struct ReadFrame {
    kind: ScopeKind,
    /// First byte of the member data (objects) or of the first element (arrays).
    data_start: usize,
    /// End of the readable region for values of this scope.
    limit: usize,
    /// Position right after the whole block.
    next: usize,
    cursor: usize,
    element_count: u32,
    elements_read: u32,
    index: AHashMap<FieldHash, u32>,
}

impl ReadFrame {
    fn root(len: usize) -> Self {
        Self {
            kind: ScopeKind::Plain,
            data_start: 0,
            limit: len,
            next: len,
            cursor: 0,
            element_count: 0,
            elements_read: 0,
            index: AHashMap::new(),
        }
    }

    /// Resolves `id` and moves the cursor onto the value it names.
    fn locate(&mut self, id: Option<&str>) -> SerializeResult {
        match (self.kind, id) {
            (ScopeKind::Object, None) => Err(SerializeError::MissingId),
            (ScopeKind::Object, Some(id)) => match self.index.get(&FieldHash::of(id)) {
                Some(&offset) => {
                    self.cursor = self.data_start + offset as usize;
                    Ok(())
                }
                None => Err(SerializeError::FieldNotFound(id.to_string())),
            },
            (_, Some(id)) => Err(SerializeError::IdOutsideObject(id.to_string())),
            (ScopeKind::Array, None) => {
                if self.elements_read >= self.element_count {
                    return Err(SerializeError::ArrayOutOfBounds {
                        index: self.elements_read as usize,
                        len: self.element_count as usize,
                    });
                }
                self.elements_read += 1;
                Ok(())
            }
            (ScopeKind::Plain, None) => Ok(()),
        }
    }
}

/// Reads the `u32` at `offset`, which must end before `limit`.
fn read_u32(data: &[u8], offset: usize, limit: usize) -> SerializeResult<u32> {
    let bytes = slice(data, offset, SIZE_FIELD, limit)?;
    Ok(bytemuck::pod_read_unaligned(bytes))
}

fn slice(data: &[u8], offset: usize, len: usize, limit: usize) -> SerializeResult<&[u8]> {
    let limit = limit.min(data.len());
    match offset.checked_add(len) {
        Some(end) if end <= limit => Ok(&data[offset..end]),
        _ => Err(SerializeError::Truncated {
            offset,
            needed: len,
            available: limit.saturating_sub(offset),
        }),
    }
}

fn check_size<T>(payload: &[u8]) -> SerializeResult {
    let expected = std::mem::size_of::<T>();
    if payload.len() != expected {
        return Err(SerializeError::SizeMismatch {
            expected,
            found: payload.len(),
        });
    }
    Ok(())
}

/// The binary [`Serializer`] backend.
///
/// Reads borrow the source buffer for `'de` and never copy it.
pub struct BinarySerializer<'de> {
    state: SessionState,
    config: CodecConfig,
    write_stack: Vec<WriteFrame>,
    read_data: &'de [u8],
    read_stack: Vec<ReadFrame>,
}

impl Default for BinarySerializer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'de> BinarySerializer<'de> {
    /// Creates a serializer with the default configuration.
    pub fn new() -> Self {
        Self::with_config(CodecConfig::default())
    }

    /// Creates a serializer with the given configuration.
    pub fn with_config(config: CodecConfig) -> Self {
        Self {
            state: SessionState::default(),
            config,
            write_stack: Vec::new(),
            read_data: &[],
            read_stack: Vec::new(),
        }
    }

    /// Returns the configuration of this serializer.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn top_write(&mut self) -> SerializeResult<&mut WriteFrame> {
        self.write_stack.last_mut().ok_or(SerializeError::NoOpenScope)
    }

    fn top_read(&mut self) -> SerializeResult<&mut ReadFrame> {
        self.read_stack.last_mut().ok_or(SerializeError::NoOpenScope)
    }

    fn write_block(&mut self, payload: &[u8], id: Option<&str>) -> SerializeResult {
        let frame = self.top_write()?;
        frame.claim(id)?;
        frame.buffer.write_pod(&(payload.len() as u32));
        frame.buffer.write(payload);
        Ok(())
    }

    /// Reads the next scalar block and returns its payload.
    fn read_block(&mut self, id: Option<&str>) -> SerializeResult<&'de [u8]> {
        let data = self.read_data;
        let frame = self.top_read()?;
        frame.locate(id)?;

        let size = read_u32(data, frame.cursor, frame.limit)? as usize;
        let payload = slice(data, frame.cursor + SIZE_FIELD, size, frame.limit)?;
        frame.cursor += SIZE_FIELD + size;
        Ok(payload)
    }

    fn serialize_pod<T: Pod>(&mut self, value: &mut T, id: Option<&str>) -> SerializeResult {
        let result = match self.state.mode() {
            SerializationMode::Write => self.write_block(bytemuck::bytes_of(&*value), id),
            SerializationMode::Read => self.read_block(id).and_then(|payload| {
                check_size::<T>(payload)?;
                *value = bytemuck::pod_read_unaligned(payload);
                Ok(())
            }),
            SerializationMode::None => Err(self.closed_session()),
        };
        self.state.record(result)
    }

    fn closed_session(&self) -> SerializeError {
        debug_assert!(false, "Serializer used outside of a session.");
        SerializeError::NoOpenScope
    }

    fn begin_write_scope(&mut self, kind: ScopeKind, count: u32, id: Option<&str>) -> SerializeResult {
        self.top_write()?.claim(id)?;
        let mut frame = WriteFrame::new(kind, &self.config);
        frame.declared_count = count;
        frame.buffer.skip(2 * SIZE_FIELD);
        self.write_stack.push(frame);
        Ok(())
    }

    fn end_write_scope(&mut self, kind: ScopeKind) -> SerializeResult {
        if self.write_stack.len() < 2 {
            return Err(SerializeError::NoOpenScope);
        }
        let found = self.top_write()?.kind;
        if found != kind {
            return Err(SerializeError::ScopeMismatch {
                expected: kind.name(),
                found: found.name(),
            });
        }
        let Some(mut frame) = self.write_stack.pop() else {
            return Err(SerializeError::NoOpenScope);
        };

        let second_field = match kind {
            ScopeKind::Object => {
                let data_size = frame.buffer.len() - 2 * SIZE_FIELD;
                frame.buffer.write_pod(&(frame.index.len() as u32));
                for (hash, offset) in &frame.index {
                    frame.buffer.write_pod(&hash.raw());
                    frame.buffer.write_pod(offset);
                }
                data_size as u32
            }
            _ => {
                if frame.written_count != frame.declared_count {
                    log::warn!(
                        "Array declared with {} elements but {} were written.",
                        frame.declared_count,
                        frame.written_count
                    );
                }
                frame.written_count
            }
        };
        let total_size = frame.buffer.len() as u32;
        frame.buffer.write_at(0, bytemuck::bytes_of(&total_size));
        frame.buffer.write_at(SIZE_FIELD, bytemuck::bytes_of(&second_field));

        let bytes = frame.buffer.into_bytes();
        self.top_write()?.buffer.write(&bytes);
        Ok(())
    }

    /// Opens the array or object block at the cursor of the current scope.
    fn begin_read_scope(&mut self, kind: ScopeKind, id: Option<&str>) -> SerializeResult<u32> {
        let data = self.read_data;
        let parent = self.top_read()?;
        parent.locate(id)?;

        let start = parent.cursor;
        let total_size = read_u32(data, start, parent.limit)? as usize;
        let header = slice(data, start, total_size.max(2 * SIZE_FIELD), parent.limit)?;
        let next = start + header.len();
        let second_field = read_u32(data, start + SIZE_FIELD, next)?;
        let data_start = start + 2 * SIZE_FIELD;

        let mut frame = ReadFrame {
            kind,
            data_start,
            limit: next,
            next,
            cursor: data_start,
            element_count: 0,
            elements_read: 0,
            index: AHashMap::new(),
        };

        match kind {
            ScopeKind::Object => {
                let data_end = data_start + second_field as usize;
                let index_count = read_u32(data, data_end, next)? as usize;
                let entries = slice(
                    data,
                    data_end + SIZE_FIELD,
                    index_count.saturating_mul(INDEX_ENTRY),
                    next,
                )?;
                frame.index.reserve(index_count);
                for entry in entries.chunks_exact(INDEX_ENTRY) {
                    let hash: u32 = bytemuck::pod_read_unaligned(&entry[..SIZE_FIELD]);
                    let offset: u32 = bytemuck::pod_read_unaligned(&entry[SIZE_FIELD..]);
                    frame.index.insert(FieldHash::from_raw(hash), offset);
                }
                frame.limit = data_end;
            }
            _ => {
                // Every element starts with at least a size field.
                let room = (next - data_start) / SIZE_FIELD;
                if second_field as usize > room {
                    return Err(SerializeError::Truncated {
                        offset: data_start,
                        needed: (second_field as usize).saturating_mul(SIZE_FIELD),
                        available: next - data_start,
                    });
                }
                frame.element_count = second_field;
            }
        }

        let count = frame.element_count;
        self.read_stack.push(frame);
        Ok(count)
    }

    fn end_read_scope(&mut self, kind: ScopeKind) -> SerializeResult {
        if self.read_stack.len() < 2 {
            return Err(SerializeError::NoOpenScope);
        }
        let found = self.top_read()?.kind;
        if found != kind {
            return Err(SerializeError::ScopeMismatch {
                expected: kind.name(),
                found: found.name(),
            });
        }
        let Some(frame) = self.read_stack.pop() else {
            return Err(SerializeError::NoOpenScope);
        };
        // The block is skipped as a unit, whatever was consumed from it.
        self.top_read()?.cursor = frame.next;
        Ok(())
    }
}

macro_rules! pod_operations {
    ($($method:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method(&mut self, value: &mut $ty, id: Option<&str>) -> SerializeResult {
                self.serialize_pod(value, id)
            }
        )*
    };
}

impl<'de> Serializer<'de> for BinarySerializer<'de> {
    fn mode(&self) -> SerializationMode {
        self.state.mode()
    }

    fn last_error(&self) -> &str {
        self.state.last_error()
    }

    fn begin_write(&mut self) {
        debug_assert!(self.write_stack.is_empty());
        self.state.begin(SerializationMode::Write);
        self.write_stack.clear();
        self.write_stack.push(WriteFrame::new(ScopeKind::Plain, &self.config));
    }

    fn end_write(&mut self) -> Vec<u8> {
        debug_assert_eq!(
            self.write_stack.len(),
            1,
            "Write session closed with open array or object scopes."
        );
        let root = self.write_stack.drain(..).next();
        self.state.end(SerializationMode::Write);
        root.map(|frame| frame.buffer.into_bytes()).unwrap_or_default()
    }

    fn begin_read(&mut self, data: &'de [u8]) -> SerializeResult {
        debug_assert!(self.read_stack.is_empty());
        self.state.begin(SerializationMode::Read);
        self.read_data = data;
        self.read_stack.clear();
        self.read_stack.push(ReadFrame::root(data.len()));
        Ok(())
    }

    fn end_read(&mut self) {
        debug_assert_eq!(
            self.read_stack.len(),
            1,
            "Read session closed with open array or object scopes."
        );
        self.read_stack.clear();
        self.read_data = &[];
        self.state.end(SerializationMode::Read);
    }

    fn serialize_bool(&mut self, value: &mut bool, id: Option<&str>) -> SerializeResult {
        let mut byte = u8::from(*value);
        self.serialize_pod(&mut byte, id)?;
        *value = byte != 0;
        Ok(())
    }

    pod_operations! {
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_f32: f32,
        serialize_f64: f64,
    }

    fn serialize_string(&mut self, value: &mut String, id: Option<&str>) -> SerializeResult {
        let result = match self.state.mode() {
            SerializationMode::Write => self.write_block(value.as_bytes(), id),
            SerializationMode::Read => self.read_block(id).and_then(|payload| {
                let text = std::str::from_utf8(payload)
                    .map_err(|_| SerializeError::TypeMismatch { expected: "string" })?;
                value.clear();
                value.push_str(text);
                Ok(())
            }),
            SerializationMode::None => Err(self.closed_session()),
        };
        self.state.record(result)
    }

    fn begin_serialize_array(&mut self, size: &mut u32, id: Option<&str>) -> SerializeResult {
        let result = match self.state.mode() {
            SerializationMode::Write => self.begin_write_scope(ScopeKind::Array, *size, id),
            SerializationMode::Read => self
                .begin_read_scope(ScopeKind::Array, id)
                .map(|count| *size = count),
            SerializationMode::None => Err(self.closed_session()),
        };
        self.state.record(result)
    }

    fn end_serialize_array(&mut self) -> SerializeResult {
        let result = match self.state.mode() {
            SerializationMode::Write => self.end_write_scope(ScopeKind::Array),
            SerializationMode::Read => self.end_read_scope(ScopeKind::Array),
            SerializationMode::None => Err(self.closed_session()),
        };
        self.state.record(result)
    }

    fn begin_serialize_object(&mut self, id: Option<&str>) -> SerializeResult {
        let result = match self.state.mode() {
            SerializationMode::Write => self.begin_write_scope(ScopeKind::Object, 0, id),
            SerializationMode::Read => self.begin_read_scope(ScopeKind::Object, id).map(|_| ()),
            SerializationMode::None => Err(self.closed_session()),
        };
        self.state.record(result)
    }

    fn end_serialize_object(&mut self) -> SerializeResult {
        let result = match self.state.mode() {
            SerializationMode::Write => self.end_write_scope(ScopeKind::Object),
            SerializationMode::Read => self.end_read_scope(ScopeKind::Object),
            SerializationMode::None => Err(self.closed_session()),
        };
        self.state.record(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::SerializerExt;

    fn write_with(f: impl FnOnce(&mut BinarySerializer<'_>)) -> Vec<u8> {
        let mut serializer = BinarySerializer::new();
        serializer.begin_write();
        f(&mut serializer);
        serializer.end_write()
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        bytemuck::pod_read_unaligned(&bytes[offset..offset + 4])
    }

    #[test]
    fn scalar_block_layout() {
        let bytes = write_with(|s| {
            s.serialize(&mut 0x0102_0304_u32, None).unwrap();
            s.serialize(&mut true, None).unwrap();
        });

        assert_eq!(bytes.len(), 8 + 5);
        assert_eq!(u32_at(&bytes, 0), 4);
        assert_eq!(u32_at(&bytes, 4), 0x0102_0304);
        assert_eq!(u32_at(&bytes, 8), 1);
        assert_eq!(bytes[12], 1);
    }

    #[test]
    fn object_block_layout() {
        let bytes = write_with(|s| {
            s.begin_serialize_object(None).unwrap();
            s.serialize(&mut 800_i32, Some("width")).unwrap();
            s.serialize(&mut 600_i32, Some("height")).unwrap();
            s.end_serialize_object().unwrap();
        });

        // header + two scalar blocks + index count + two entries
        assert_eq!(bytes.len(), 8 + 16 + 4 + 16);
        assert_eq!(u32_at(&bytes, 0) as usize, bytes.len());
        assert_eq!(u32_at(&bytes, 4), 16);
        assert_eq!(u32_at(&bytes, 24), 2);
        assert_eq!(u32_at(&bytes, 28), FieldHash::of("width").raw());
        assert_eq!(u32_at(&bytes, 32), 0);
        assert_eq!(u32_at(&bytes, 36), FieldHash::of("height").raw());
        assert_eq!(u32_at(&bytes, 40), 8);
    }

    #[test]
    fn array_block_layout() {
        let bytes = write_with(|s| {
            let mut size = 2;
            s.begin_serialize_array(&mut size, None).unwrap();
            s.serialize(&mut 1_u16, None).unwrap();
            s.serialize(&mut 2_u16, None).unwrap();
            s.end_serialize_array().unwrap();
        });

        assert_eq!(bytes.len(), 8 + 12);
        assert_eq!(u32_at(&bytes, 0), 20);
        assert_eq!(u32_at(&bytes, 4), 2);
    }

    #[test]
    fn size_mismatch_is_reported_and_skipped() {
        let bytes = write_with(|s| {
            s.serialize(&mut 7_u64, None).unwrap();
            s.serialize(&mut 9_u8, None).unwrap();
        });

        let mut serializer = BinarySerializer::new();
        serializer.begin_read(&bytes).unwrap();

        let mut narrow = 0_u32;
        let err = serializer.serialize(&mut narrow, None).unwrap_err();
        assert_eq!(err, SerializeError::SizeMismatch { expected: 4, found: 8 });
        assert_eq!(serializer.last_error(), "trying to read 4 bytes, but size is 8 bytes");

        let mut next = 0_u8;
        serializer.serialize(&mut next, None).unwrap();
        assert_eq!(next, 9);
        serializer.end_read();
    }

    #[test]
    fn ids_are_checked_against_the_scope() {
        let mut serializer = BinarySerializer::new();
        serializer.begin_write();

        let err = serializer.serialize(&mut 1_i32, Some("x")).unwrap_err();
        assert_eq!(err, SerializeError::IdOutsideObject("x".into()));

        serializer.begin_serialize_object(None).unwrap();
        let err = serializer.serialize(&mut 1_i32, None).unwrap_err();
        assert_eq!(err, SerializeError::MissingId);
        serializer.end_serialize_object().unwrap();

        let err = serializer.end_serialize_object().unwrap_err();
        assert_eq!(err, SerializeError::NoOpenScope);
        serializer.end_write();
    }

    #[test]
    fn mismatched_end_is_an_error() {
        let mut serializer = BinarySerializer::new();
        serializer.begin_write();
        serializer.begin_serialize_object(None).unwrap();

        let err = serializer.end_serialize_array().unwrap_err();
        assert_eq!(
            err,
            SerializeError::ScopeMismatch {
                expected: "array",
                found: "object"
            }
        );

        serializer.end_serialize_object().unwrap();
        serializer.end_write();
    }

    #[test]
    fn corrupted_index_is_truncated_not_a_panic() {
        let mut bytes = write_with(|s| {
            s.begin_serialize_object(None).unwrap();
            s.serialize(&mut 5_i32, Some("a")).unwrap();
            s.end_serialize_object().unwrap();
        });
        // Claim a huge index.
        let index_count_at = 8 + 8;
        bytes[index_count_at..index_count_at + 4].copy_from_slice(&u32::MAX.to_ne_bytes());

        let mut serializer = BinarySerializer::new();
        serializer.begin_read(&bytes).unwrap();
        let err = serializer.begin_serialize_object(None).unwrap_err();
        assert!(matches!(err, SerializeError::Truncated { .. }));
        serializer.end_read();
    }

    #[test]
    fn array_count_larger_than_its_block_is_truncated() {
        let mut bytes = write_with(|s| {
            let mut size = 2;
            s.begin_serialize_array(&mut size, None).unwrap();
            s.serialize(&mut 1_u8, None).unwrap();
            s.serialize(&mut 2_u8, None).unwrap();
            s.end_serialize_array().unwrap();
        });
        // Two 5-byte elements leave room for at most two size fields.
        bytes[4..8].copy_from_slice(&3_u32.to_ne_bytes());

        let mut serializer = BinarySerializer::new();
        serializer.begin_read(&bytes).unwrap();
        let mut size = 0;
        let err = serializer.begin_serialize_array(&mut size, None).unwrap_err();
        assert_eq!(
            err,
            SerializeError::Truncated {
                offset: 8,
                needed: 12,
                available: 10
            }
        );
        assert_eq!(size, 0);
        serializer.end_read();
    }
}
