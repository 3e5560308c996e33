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

//! Defines the hierarchy of error types reported by serializers.
//!
//! Every data-dependent failure is recoverable: the operation that hit it returns
//! an `Err`, the serializer records the message as its last error, and the rest of
//! the session stays usable. Broken begin/end pairing is asserted instead, since it
//! is a bug in the calling code rather than a property of the data.

use thiserror::Error;

/// Coarse classification of a [`SerializeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The calling code used the serializer incorrectly (e.g. an id outside an object).
    Usage,
    /// The source bytes or text are malformed.
    Format,
    /// The data is well formed but does not match what the reader asked for.
    SchemaMismatch,
}

/// The reason a JSON document failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ParseErrorKind {
    /// An object or array element was not followed by `,` or its closing bracket.
    #[error("expected either a comma or a closing '}}' or ']' to close an object or array")]
    ExpectedCommaOrClosingBracket,
    /// The colon separating an object member name from its value was missing.
    #[error("colon separating name/value pair was missing")]
    ExpectedColon,
    /// An object member name did not start with a quote.
    #[error("expected string to begin with '\"'")]
    ExpectedOpeningQuote,
    /// A backslash escape inside a string is not valid.
    #[error("invalid escaped sequence in string")]
    InvalidStringEscapeSequence,
    /// A number literal is malformed.
    #[error("invalid number format")]
    InvalidNumberFormat,
    /// The input does not start a valid value at this position.
    #[error("invalid value")]
    InvalidValue,
    /// The input ended before the current object, array, or string was complete.
    #[error("reached end of buffer before object/array was complete")]
    PrematureEndOfBuffer,
    /// A string contains a raw control character or invalid UTF-8.
    #[error("string was malformed")]
    InvalidString,
    /// Non-whitespace characters follow the root value.
    #[error("unexpected trailing characters after the root value")]
    UnexpectedTrailingCharacters,
    /// Arrays and objects are nested deeper than the configured limit.
    #[error("arrays and objects are nested too deeply")]
    NestingTooDeep,
}

/// An error reported by a serializer operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializeError {
    /// The JSON source text could not be parsed.
    #[error("JSON parsing error, line {line}, column {column}: {kind}")]
    Parse {
        /// 1-based line of the offending character.
        line: usize,
        /// 1-based column of the offending character.
        column: usize,
        /// Why parsing stopped.
        kind: ParseErrorKind,
    },
    /// A block extends past the end of its enclosing block.
    #[error("truncated data: {needed} bytes needed at offset {offset}, only {available} available")]
    Truncated {
        /// Absolute offset of the read.
        offset: usize,
        /// Number of bytes the read required.
        needed: usize,
        /// Number of bytes left in the enclosing block.
        available: usize,
    },
    /// A stored scalar block does not have the size of the requested type.
    #[error("trying to read {expected} bytes, but size is {found} bytes")]
    SizeMismatch {
        /// Size of the type the caller asked for.
        expected: usize,
        /// Size prefix found in the data.
        found: usize,
    },
    /// The requested field id is not present in the current object.
    #[error("can't find field with id \"{0}\"")]
    FieldNotFound(String),
    /// The stored value is not of the kind the caller asked for.
    #[error("current value is not a {expected} type")]
    TypeMismatch {
        /// The kind the caller asked for.
        expected: &'static str,
    },
    /// A stored number does not fit the requested integer type.
    #[error("number `{text}` is out of range for {target}")]
    NumberOutOfRange {
        /// The stored number, as text.
        text: String,
        /// The requested type.
        target: &'static str,
    },
    /// A field id was given while the current scope is not an object.
    #[error("cannot serialize field \"{0}\" outside of an object scope")]
    IdOutsideObject(String),
    /// A value was serialized inside an object without an id.
    #[error("values inside an object scope need a field id")]
    MissingId,
    /// The same field id was written twice in one object.
    #[error("field id \"{0}\" written twice in the same object")]
    DuplicateField(String),
    /// More elements were read from an array than it holds.
    #[error("array element {index} is out of bounds, the array holds {len} elements")]
    ArrayOutOfBounds {
        /// Index of the element the caller tried to read.
        index: usize,
        /// Number of stored elements.
        len: usize,
    },
    /// A second root value was written in a document that holds exactly one.
    #[error("can't write the root value twice")]
    RootWrittenTwice,
    /// An end call was made with no matching open scope.
    #[error("no array or object scope is open")]
    NoOpenScope,
    /// An end call does not match the kind of the innermost open scope.
    #[error("expected to close {expected} scope, but the open scope is {found}")]
    ScopeMismatch {
        /// Kind of scope the end call closes.
        expected: &'static str,
        /// Kind of the innermost open scope.
        found: &'static str,
    },
    /// An enum value or name has no matching variant.
    #[error("unknown value `{value}` for enum {enum_name}")]
    UnknownEnumValue {
        /// Reflected name of the enum.
        enum_name: &'static str,
        /// The stored value or name.
        value: String,
    },
    /// A fixed-size array was stored with a different element count.
    #[error("fixed-size array holds {expected} elements, but {found} are stored")]
    FixedArrayLength {
        /// Length of the array in memory.
        expected: usize,
        /// Element count found in the data.
        found: usize,
    },
}

impl SerializeError {
    /// Classifies the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SerializeError::Parse { .. }
            | SerializeError::Truncated { .. }
            | SerializeError::SizeMismatch { .. } => ErrorCategory::Format,
            SerializeError::FieldNotFound(_)
            | SerializeError::TypeMismatch { .. }
            | SerializeError::NumberOutOfRange { .. }
            | SerializeError::UnknownEnumValue { .. }
            | SerializeError::FixedArrayLength { .. } => ErrorCategory::SchemaMismatch,
            SerializeError::IdOutsideObject(_)
            | SerializeError::MissingId
            | SerializeError::DuplicateField(_)
            | SerializeError::ArrayOutOfBounds { .. }
            | SerializeError::RootWrittenTwice
            | SerializeError::NoOpenScope
            | SerializeError::ScopeMismatch { .. } => ErrorCategory::Usage,
        }
    }

    /// Returns `true` when the error means the requested field is simply absent.
    pub fn is_missing_field(&self) -> bool {
        matches!(self, SerializeError::FieldNotFound(_))
    }
}

/// A specialized `Result` for serializer operations.
pub type SerializeResult<T = ()> = Result<T, SerializeError>;
