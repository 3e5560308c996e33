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

//! A growable byte buffer with an explicit write cursor.

use bytemuck::Pod;

/// A byte buffer that doubles its capacity, plus a fixed slack, when a write overflows.
///
/// The buffer keeps two positions: the `cursor`, where the next write lands, and the
/// high-water mark `len`, the logical length of the content. Moving the cursor back to
/// patch a header never shortens the content.
#[derive(Debug, Clone)]
pub struct GrowBuffer {
    bytes: Vec<u8>,
    cursor: usize,
    max_cursor: usize,
    growth_slack: usize,
}

impl GrowBuffer {
    /// Creates an empty buffer with `initial_capacity` bytes reserved.
    pub fn new(initial_capacity: usize, growth_slack: usize) -> Self {
        Self {
            bytes: vec![0; initial_capacity],
            cursor: 0,
            max_cursor: 0,
            growth_slack,
        }
    }

    /// Returns the logical length of the content.
    pub fn len(&self) -> usize {
        self.max_cursor
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.max_cursor == 0
    }

    /// Returns the number of bytes currently allocated.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the position of the next write.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Writes `data` at the cursor and advances it.
    pub fn write(&mut self, data: &[u8]) {
        let end = self.cursor + data.len();
        self.grow_to(end);
        self.bytes[self.cursor..end].copy_from_slice(data);
        self.advance_to(end);
    }

    /// Writes the in-memory bytes of `value` at the cursor and advances it.
    pub fn write_pod<T: Pod>(&mut self, value: &T) {
        self.write(bytemuck::bytes_of(value));
    }

    /// Advances the cursor by `count` zeroed bytes, to be patched later.
    pub fn skip(&mut self, count: usize) {
        let end = self.cursor + count;
        self.grow_to(end);
        self.bytes[self.cursor..end].fill(0);
        self.advance_to(end);
    }

    /// Overwrites content at `offset` without moving the cursor.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) {
        debug_assert!(
            offset + data.len() <= self.max_cursor,
            "Patch outside of the buffer content."
        );
        let saved = self.cursor;
        self.cursor = offset;
        self.write(data);
        self.cursor = saved;
    }

    /// Returns the content.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.max_cursor]
    }

    /// Consumes the buffer and returns its content.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.bytes.truncate(self.max_cursor);
        self.bytes
    }

    fn advance_to(&mut self, end: usize) {
        self.cursor = end;
        self.max_cursor = self.max_cursor.max(end);
    }

    fn grow_to(&mut self, required: usize) {
        let mut capacity = self.bytes.len();
        if required <= capacity {
            return;
        }
        while capacity < required {
            capacity = capacity
                .saturating_mul(2)
                .saturating_add(self.growth_slack)
                .max(1);
        }
        self.bytes.resize(capacity, 0);
    }
}
