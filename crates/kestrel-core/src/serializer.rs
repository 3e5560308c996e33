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

//! Defines the abstract contract shared by every serializer backend.
//!
//! The core of this module is the [`Serializer`] trait. A caller opens a session with
//! [`Serializer::begin_write`] or [`Serializer::begin_read`], then issues scalar, array
//! and object calls in the same order for both directions, then closes the session.
//! Because reading and writing share one call sequence, a traversal written once
//! against this trait works with every backend and in both directions.

use crate::error::{SerializeError, SerializeResult};
use crate::reflect::ScalarKind;

/// The direction of the session currently open on a serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SerializationMode {
    /// No session is open.
    #[default]
    None,
    /// A read session is open: calls fill the caller's values from stored data.
    Read,
    /// A write session is open: calls record the caller's values.
    Write,
}

/// The contract implemented by every serializer backend.
///
/// Every operation takes the value by mutable reference: a write session reads from it,
/// a read session stores into it. `id` names the value inside an object scope and must
/// be `None` everywhere else.
///
/// `'de` is the lifetime of the source buffer handed to [`Serializer::begin_read`].
pub trait Serializer<'de> {
    /// Returns the direction of the open session.
    fn mode(&self) -> SerializationMode;

    /// Returns `true` while a read session is open.
    fn is_reading(&self) -> bool {
        self.mode() == SerializationMode::Read
    }

    /// Returns `true` while a write session is open.
    fn is_writing(&self) -> bool {
        self.mode() == SerializationMode::Write
    }

    /// Returns the message of the most recent failure in this session, or `""`.
    fn last_error(&self) -> &str;

    /// Opens a write session.
    fn begin_write(&mut self);

    /// Closes the write session and hands the finished document to the caller.
    fn end_write(&mut self) -> Vec<u8>;

    /// Opens a read session over `data`.
    ///
    /// # Errors
    /// Returns a `Parse` error if a text backend cannot parse `data`. The session is
    /// not opened in that case.
    fn begin_read(&mut self, data: &'de [u8]) -> SerializeResult;

    /// Closes the read session and releases everything built for it.
    fn end_read(&mut self);

    /// Serializes a `bool`.
    fn serialize_bool(&mut self, value: &mut bool, id: Option<&str>) -> SerializeResult;
    /// Serializes an `i8`.
    fn serialize_i8(&mut self, value: &mut i8, id: Option<&str>) -> SerializeResult;
    /// Serializes an `i16`.
    fn serialize_i16(&mut self, value: &mut i16, id: Option<&str>) -> SerializeResult;
    /// Serializes an `i32`.
    fn serialize_i32(&mut self, value: &mut i32, id: Option<&str>) -> SerializeResult;
    /// Serializes an `i64`.
    fn serialize_i64(&mut self, value: &mut i64, id: Option<&str>) -> SerializeResult;
    /// Serializes a `u8`.
    fn serialize_u8(&mut self, value: &mut u8, id: Option<&str>) -> SerializeResult;
    /// Serializes a `u16`.
    fn serialize_u16(&mut self, value: &mut u16, id: Option<&str>) -> SerializeResult;
    /// Serializes a `u32`.
    fn serialize_u32(&mut self, value: &mut u32, id: Option<&str>) -> SerializeResult;
    /// Serializes a `u64`.
    fn serialize_u64(&mut self, value: &mut u64, id: Option<&str>) -> SerializeResult;
    /// Serializes an `f32`.
    fn serialize_f32(&mut self, value: &mut f32, id: Option<&str>) -> SerializeResult;
    /// Serializes an `f64`.
    fn serialize_f64(&mut self, value: &mut f64, id: Option<&str>) -> SerializeResult;
    /// Serializes a `String`.
    fn serialize_string(&mut self, value: &mut String, id: Option<&str>) -> SerializeResult;

    /// Opens an array scope.
    ///
    /// When writing, `size` is the number of elements the caller is about to write.
    /// When reading, `size` receives the stored element count. Elements are positional
    /// and never carry an id.
    fn begin_serialize_array(&mut self, size: &mut u32, id: Option<&str>) -> SerializeResult;

    /// Closes the innermost array scope.
    fn end_serialize_array(&mut self) -> SerializeResult;

    /// Opens an object scope. Every value inside it must carry an id.
    fn begin_serialize_object(&mut self, id: Option<&str>) -> SerializeResult;

    /// Closes the innermost object scope.
    fn end_serialize_object(&mut self) -> SerializeResult;
}

/// Mode and last-error bookkeeping shared by the backends.
#[derive(Debug, Default)]
pub struct SessionState {
    mode: SerializationMode,
    last_error: String,
}

impl SessionState {
    /// Returns the direction of the open session.
    pub fn mode(&self) -> SerializationMode {
        self.mode
    }

    /// Returns the last recorded error message.
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    /// Opens a session in `mode`. Sessions never nest.
    pub fn begin(&mut self, mode: SerializationMode) {
        debug_assert_eq!(
            self.mode,
            SerializationMode::None,
            "Serializer is in the middle of another serialization session."
        );
        log::trace!("Opening {mode:?} session.");
        self.mode = mode;
        self.last_error.clear();
    }

    /// Closes the session opened with `mode`.
    pub fn end(&mut self, mode: SerializationMode) {
        debug_assert_eq!(self.mode, mode, "Closing a session that is not open.");
        log::trace!("Closing {mode:?} session.");
        self.mode = SerializationMode::None;
    }

    /// Records `err` as the last error and returns it.
    pub fn fail<T>(&mut self, err: SerializeError) -> SerializeResult<T> {
        log::debug!("Serialization error: {err}");
        self.last_error = err.to_string();
        Err(err)
    }

    /// Records the error of `result`, if any, and passes it through.
    pub fn record<T>(&mut self, result: SerializeResult<T>) -> SerializeResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => self.fail(err),
        }
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        debug_assert!(
            self.mode == SerializationMode::None || std::thread::panicking(),
            "Serializer destroyed during a serialization session."
        );
    }
}

/// A scalar type with a dedicated [`Serializer`] operation.
pub trait Scalar {
    /// The reflected kind of the scalar.
    const KIND: ScalarKind;

    /// Calls the serializer operation matching `Self`.
    fn serialize_with<'de, S>(&mut self, serializer: &mut S, id: Option<&str>) -> SerializeResult
    where
        S: Serializer<'de> + ?Sized;
}

macro_rules! impl_scalar {
    ($($ty:ty => $method:ident, $kind:ident;)*) => {
        $(
            impl Scalar for $ty {
                const KIND: ScalarKind = ScalarKind::$kind;

                fn serialize_with<'de, S>(
                    &mut self,
                    serializer: &mut S,
                    id: Option<&str>,
                ) -> SerializeResult
                where
                    S: Serializer<'de> + ?Sized,
                {
                    serializer.$method(self, id)
                }
            }
        )*
    };
}

impl_scalar! {
    bool => serialize_bool, Bool;
    i8 => serialize_i8, I8;
    i16 => serialize_i16, I16;
    i32 => serialize_i32, I32;
    i64 => serialize_i64, I64;
    u8 => serialize_u8, U8;
    u16 => serialize_u16, U16;
    u32 => serialize_u32, U32;
    u64 => serialize_u64, U64;
    f32 => serialize_f32, F32;
    f64 => serialize_f64, F64;
    String => serialize_string, String;
}

/// Generic helpers available on every [`Serializer`], including trait objects.
pub trait SerializerExt<'de>: Serializer<'de> {
    /// Serializes any [`Scalar`] through its dedicated operation.
    fn serialize<T: Scalar>(&mut self, value: &mut T, id: Option<&str>) -> SerializeResult {
        value.serialize_with(self, id)
    }
}

impl<'de, S: Serializer<'de> + ?Sized> SerializerExt<'de> for S {}
