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

//! Tunables shared by the serializer backends.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the serializer backends.
///
/// Every field has a default, so a configuration file only needs to list the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Capacity, in bytes, reserved up front by each binary buffer.
    pub initial_capacity: usize,
    /// Fixed number of bytes added on top of each capacity doubling.
    pub growth_slack: usize,
    /// Indentation unit of the pretty JSON writer.
    pub json_indent: String,
    /// Line terminator of the pretty JSON writer.
    pub json_newline: String,
    /// Accept JSON5 extensions (comments, trailing commas, ...) when parsing.
    pub allow_json5: bool,
    /// Deepest array and object nesting the JSON parser accepts.
    pub json_max_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 0,
            growth_slack: 8,
            json_indent: "\t".to_string(),
            json_newline: "\n".to_string(),
            allow_json5: true,
            json_max_depth: 512,
        }
    }
}

impl CodecConfig {
    /// Load the configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load the configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read codec config '{}'", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid codec config '{}'", path.display()))
    }

    /// Save the configuration to a JSON file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}
