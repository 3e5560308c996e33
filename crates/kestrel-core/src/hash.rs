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

//! Stable 32-bit hashing of field ids.
//!
//! The hash is persisted in binary object indices, so it must never depend on the
//! process, the platform, or a random seed.

use std::fmt;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// The fixed-width key a field id is stored under.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldHash(u32);

impl FieldHash {
    /// Hashes a field id with 32-bit FNV-1a. The empty id hashes to `0`.
    pub const fn of(id: &str) -> Self {
        let bytes = id.as_bytes();
        if bytes.is_empty() {
            return Self(0);
        }

        let mut hash = FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Wraps a hash read back from storage.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw hash value.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FieldHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldHash({:#010x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_fnv1a_vectors() {
        assert_eq!(FieldHash::of("a").raw(), 0xe40c_292c);
        assert_eq!(FieldHash::of("foobar").raw(), 0xbf9c_f968);
    }

    #[test]
    fn empty_id_hashes_to_zero() {
        assert_eq!(FieldHash::of("").raw(), 0);
    }

    #[test]
    fn distinct_ids_distinct_hashes() {
        assert_ne!(FieldHash::of("width"), FieldHash::of("height"));
        assert_eq!(FieldHash::of("width"), FieldHash::from_raw(FieldHash::of("width").raw()));
    }
}
