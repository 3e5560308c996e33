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

//! Option flags that tune how reflected values are traversed.

use std::ops::{BitOr, BitOrAssign};

/// Flags accepted by the reflected-type traversal functions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct SerializationFlags(u32);

impl SerializationFlags {
    /// No flag set.
    pub const EMPTY: Self = Self(0);
    /// Skip members whose field is absent from the source instead of failing.
    pub const IGNORE_MISSING_KEYS: Self = Self(1 << 0);
    /// Store enums as their variant name rather than their discriminant.
    pub const ENUM_BY_NAME: Self = Self(1 << 1);
    /// Keep the current value when a stored enum name or value is unknown.
    pub const ENUM_IGNORE_UNKNOWN_VALUES: Self = Self(1 << 2);

    /// Returns `true` if every flag set in `other` is also set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SerializationFlags {
    type Output = Self;

    fn bitor(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOrAssign for SerializationFlags {
    fn bitor_assign(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

/// The flags used when the caller does not pass any.
pub const DEFAULT_SERIALIZATION_FLAGS: SerializationFlags = SerializationFlags::IGNORE_MISSING_KEYS;
