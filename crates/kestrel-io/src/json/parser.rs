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

//! A JSON parser that builds nodes into a [`JsonArena`].
//!
//! With JSON5 extensions enabled the parser also accepts comments, trailing commas,
//! single-quoted strings, unquoted keys, a leading `+`, hexadecimal integers, a leading
//! or trailing decimal point, and `NaN`/`Infinity`.
//!
//! Arrays and objects nest at most `max_depth` levels deep.

use kestrel_core::{ParseErrorKind, SerializeError, SerializeResult};

use super::value::{JsonArena, JsonValue, NodeId};

/// Parses `source` into `arena` and returns the root node.
pub fn parse(
    source: &[u8],
    arena: &mut JsonArena,
    allow_json5: bool,
    max_depth: usize,
) -> SerializeResult<NodeId> {
    let mut parser = Parser {
        source,
        pos: 0,
        json5: allow_json5,
        depth: 0,
        max_depth,
        arena,
    };
    let root = parser.parse_value()?;
    parser.skip_whitespace()?;
    if parser.pos < source.len() {
        return Err(parser.error(ParseErrorKind::UnexpectedTrailingCharacters));
    }
    Ok(root)
}

struct Parser<'a> {
    source: &'a [u8],
    pos: usize,
    json5: bool,
    /// Arrays and objects currently open.
    depth: usize,
    max_depth: usize,
    arena: &'a mut JsonArena,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn error(&self, kind: ParseErrorKind) -> SerializeError {
        let consumed = &self.source[..self.pos.min(self.source.len())];
        let line_start = consumed
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |newline| newline + 1);
        let line = 1 + consumed.iter().filter(|&&b| b == b'\n').count();
        // Count characters, not UTF-8 continuation bytes.
        let column = 1 + consumed[line_start..]
            .iter()
            .filter(|&&b| (b & 0xC0) != 0x80)
            .count();
        SerializeError::Parse { line, column, kind }
    }

    fn skip_whitespace(&mut self) -> SerializeResult {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\n' | b'\r') => self.pos += 1,
                Some(b'/') if self.json5 => self.skip_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn skip_comment(&mut self) -> SerializeResult {
        match self.peek_at(1) {
            Some(b'/') => {
                while !matches!(self.bump(), None | Some(b'\n')) {}
                Ok(())
            }
            Some(b'*') => {
                self.pos += 2;
                loop {
                    match self.bump() {
                        None => return Err(self.error(ParseErrorKind::PrematureEndOfBuffer)),
                        Some(b'*') if self.peek() == Some(b'/') => {
                            self.pos += 1;
                            return Ok(());
                        }
                        Some(_) => {}
                    }
                }
            }
            _ => Err(self.error(ParseErrorKind::InvalidValue)),
        }
    }

    fn parse_value(&mut self) -> SerializeResult<NodeId> {
        self.skip_whitespace()?;
        let value = match self.peek() {
            None => return Err(self.error(ParseErrorKind::PrematureEndOfBuffer)),
            Some(open @ (b'{' | b'[')) => {
                if self.depth >= self.max_depth {
                    return Err(self.error(ParseErrorKind::NestingTooDeep));
                }
                self.depth += 1;
                let node = if open == b'{' {
                    self.parse_object()
                } else {
                    self.parse_array()
                };
                self.depth -= 1;
                return node;
            }
            Some(b'"') => JsonValue::String(self.parse_string()?),
            Some(b'\'') if self.json5 => JsonValue::String(self.parse_string()?),
            Some(b't') => self.parse_literal("true", JsonValue::Bool(true))?,
            Some(b'f') => self.parse_literal("false", JsonValue::Bool(false))?,
            Some(b'n') => self.parse_literal("null", JsonValue::Null)?,
            Some(b'-' | b'0'..=b'9') => JsonValue::Number(self.parse_number()?),
            Some(b'+' | b'.' | b'N' | b'I') if self.json5 => JsonValue::Number(self.parse_number()?),
            Some(_) => return Err(self.error(ParseErrorKind::InvalidValue)),
        };
        Ok(self.arena.alloc(value))
    }

    fn parse_literal(&mut self, literal: &str, value: JsonValue) -> SerializeResult<JsonValue> {
        if self.source[self.pos..].starts_with(literal.as_bytes()) {
            self.pos += literal.len();
            Ok(value)
        } else {
            Err(self.error(ParseErrorKind::InvalidValue))
        }
    }

    fn parse_object(&mut self) -> SerializeResult<NodeId> {
        self.pos += 1;
        let mut members = Vec::new();

        self.skip_whitespace()?;
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(self.arena.alloc(JsonValue::Object(members)));
        }

        loop {
            self.skip_whitespace()?;
            let name = self.parse_key()?;

            self.skip_whitespace()?;
            match self.peek() {
                Some(b':') => self.pos += 1,
                None => return Err(self.error(ParseErrorKind::PrematureEndOfBuffer)),
                Some(_) => return Err(self.error(ParseErrorKind::ExpectedColon)),
            }

            let value = self.parse_value()?;
            members.push((name, value));

            self.skip_whitespace()?;
            match self.bump() {
                Some(b',') => {
                    self.skip_whitespace()?;
                    if self.json5 && self.peek() == Some(b'}') {
                        self.pos += 1;
                        break;
                    }
                }
                Some(b'}') => break,
                None => return Err(self.error(ParseErrorKind::PrematureEndOfBuffer)),
                Some(_) => {
                    self.pos -= 1;
                    return Err(self.error(ParseErrorKind::ExpectedCommaOrClosingBracket));
                }
            }
        }

        Ok(self.arena.alloc(JsonValue::Object(members)))
    }

    fn parse_key(&mut self) -> SerializeResult<String> {
        match self.peek() {
            Some(b'"') => self.parse_string(),
            Some(b'\'') if self.json5 => self.parse_string(),
            Some(b) if self.json5 && (b.is_ascii_alphabetic() || b == b'_' || b == b'$') => {
                let start = self.pos;
                while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
                {
                    self.pos += 1;
                }
                Ok(String::from_utf8_lossy(&self.source[start..self.pos]).into_owned())
            }
            None => Err(self.error(ParseErrorKind::PrematureEndOfBuffer)),
            Some(_) => Err(self.error(ParseErrorKind::ExpectedOpeningQuote)),
        }
    }

    fn parse_array(&mut self) -> SerializeResult<NodeId> {
        self.pos += 1;
        let mut elements = Vec::new();

        self.skip_whitespace()?;
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(self.arena.alloc(JsonValue::Array(elements)));
        }

        loop {
            elements.push(self.parse_value()?);

            self.skip_whitespace()?;
            match self.bump() {
                Some(b',') => {
                    self.skip_whitespace()?;
                    if self.json5 && self.peek() == Some(b']') {
                        self.pos += 1;
                        break;
                    }
                }
                Some(b']') => break,
                None => return Err(self.error(ParseErrorKind::PrematureEndOfBuffer)),
                Some(_) => {
                    self.pos -= 1;
                    return Err(self.error(ParseErrorKind::ExpectedCommaOrClosingBracket));
                }
            }
        }

        Ok(self.arena.alloc(JsonValue::Array(elements)))
    }

    fn parse_string(&mut self) -> SerializeResult<String> {
        let Some(quote) = self.bump() else {
            return Err(self.error(ParseErrorKind::PrematureEndOfBuffer));
        };
        let mut bytes = Vec::new();

        loop {
            match self.bump() {
                None => return Err(self.error(ParseErrorKind::PrematureEndOfBuffer)),
                Some(b) if b == quote => break,
                Some(b'\\') => self.parse_escape(&mut bytes)?,
                Some(b) if b < 0x20 => {
                    self.pos -= 1;
                    return Err(self.error(ParseErrorKind::InvalidString));
                }
                Some(b) => bytes.push(b),
            }
        }

        String::from_utf8(bytes).map_err(|_| self.error(ParseErrorKind::InvalidString))
    }

    fn parse_escape(&mut self, out: &mut Vec<u8>) -> SerializeResult {
        let escaped = match self.bump() {
            None => return Err(self.error(ParseErrorKind::PrematureEndOfBuffer)),
            Some(b'"') => '"',
            Some(b'\\') => '\\',
            Some(b'/') => '/',
            Some(b'b') => '\u{8}',
            Some(b'f') => '\u{c}',
            Some(b'n') => '\n',
            Some(b'r') => '\r',
            Some(b't') => '\t',
            Some(b'u') => self.parse_unicode_escape()?,
            Some(b'\'') if self.json5 => '\'',
            Some(b'0') if self.json5 => '\0',
            Some(b'v') if self.json5 => '\u{b}',
            // Line continuation.
            Some(b'\n') if self.json5 => return Ok(()),
            Some(_) => {
                self.pos -= 1;
                return Err(self.error(ParseErrorKind::InvalidStringEscapeSequence));
            }
        };
        let mut utf8 = [0; 4];
        out.extend_from_slice(escaped.encode_utf8(&mut utf8).as_bytes());
        Ok(())
    }

    fn parse_unicode_escape(&mut self) -> SerializeResult<char> {
        let high = self.parse_hex4()?;
        let code = if (0xD800..0xDC00).contains(&high) {
            if self.bump() != Some(b'\\') || self.bump() != Some(b'u') {
                return Err(self.error(ParseErrorKind::InvalidStringEscapeSequence));
            }
            let low = self.parse_hex4()?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(self.error(ParseErrorKind::InvalidStringEscapeSequence));
            }
            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
        } else {
            high
        };
        char::from_u32(code).ok_or_else(|| self.error(ParseErrorKind::InvalidStringEscapeSequence))
    }

    fn parse_hex4(&mut self) -> SerializeResult<u32> {
        let mut code = 0;
        for _ in 0..4 {
            let digit = self
                .bump()
                .and_then(|b| char::from(b).to_digit(16))
                .ok_or_else(|| self.error(ParseErrorKind::InvalidStringEscapeSequence))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    /// Parses a number and returns its text, normalized so it never starts with `+`
    /// or `.` and never ends with `.`.
    fn parse_number(&mut self) -> SerializeResult<String> {
        let mut text = String::new();

        match self.peek() {
            Some(b'-') => {
                text.push('-');
                self.pos += 1;
            }
            Some(b'+') if self.json5 => self.pos += 1,
            _ => {}
        }

        if self.json5 {
            for word in ["Infinity", "NaN"] {
                if self.source[self.pos..].starts_with(word.as_bytes()) {
                    self.pos += word.len();
                    if word == "NaN" {
                        // NaN carries no sign.
                        return Ok(word.to_string());
                    }
                    text.push_str(word);
                    return Ok(text);
                }
            }

            if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X')) {
                self.pos += 2;
                text.push_str("0x");
                let digits = self.take_while(|b| b.is_ascii_hexdigit());
                if digits.is_empty() {
                    return Err(self.error(ParseErrorKind::InvalidNumberFormat));
                }
                text.push_str(&digits);
                return Ok(text);
            }
        }

        let integer_start = self.pos;
        let integer = self.take_while(|b| b.is_ascii_digit());
        if integer.is_empty() {
            if !(self.json5 && self.peek() == Some(b'.')) {
                return Err(self.error(ParseErrorKind::InvalidNumberFormat));
            }
            text.push('0');
        } else if integer.len() > 1 && integer.starts_with('0') {
            self.pos = integer_start + 1;
            return Err(self.error(ParseErrorKind::InvalidNumberFormat));
        }
        text.push_str(&integer);

        if self.peek() == Some(b'.') {
            self.pos += 1;
            let fraction = self.take_while(|b| b.is_ascii_digit());
            if fraction.is_empty() {
                if !self.json5 || integer.is_empty() {
                    return Err(self.error(ParseErrorKind::InvalidNumberFormat));
                }
            } else {
                text.push('.');
                text.push_str(&fraction);
            }
        }

        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            text.push('e');
            if let Some(sign @ (b'+' | b'-')) = self.peek() {
                self.pos += 1;
                if sign == b'-' {
                    text.push('-');
                }
            }
            let exponent = self.take_while(|b| b.is_ascii_digit());
            if exponent.is_empty() {
                return Err(self.error(ParseErrorKind::InvalidNumberFormat));
            }
            text.push_str(&exponent);
        }

        Ok(text)
    }

    fn take_while(&mut self, accept: impl Fn(u8) -> bool) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if accept(b)) {
            self.pos += 1;
        }
        // Only ASCII digits are ever accepted.
        String::from_utf8_lossy(&self.source[start..self.pos]).into_owned()
    }
}
