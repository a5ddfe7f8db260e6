// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Schema loader.
//!
//! Reads the phase/direction organized protocol description into an
//! in-memory document tree. Declaration order is semantic (it determines
//! emission order), so the JSON maps must preserve insertion order
//! (`serde_json` with the `preserve_order` feature).

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::ast::ConnectionState;
use crate::CompileError;

/// One direction of one phase: message name to `[kind, payload]` pairs,
/// in declaration order.
#[derive(Debug, Deserialize)]
pub struct DirectionSchema {
    pub types: Map<String, Value>,
}

/// Both directions of one phase.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSchema {
    pub to_client: DirectionSchema,
    pub to_server: DirectionSchema,
}

/// The full protocol document. Unknown top-level keys (shared native type
/// tables) are ignored.
#[derive(Debug, Deserialize)]
pub struct Root {
    pub handshaking: StateSchema,
    pub status: StateSchema,
    pub login: StateSchema,
    pub play: StateSchema,
}

impl Root {
    pub fn state(&self, state: ConnectionState) -> &StateSchema {
        match state {
            ConnectionState::Handshaking => &self.handshaking,
            ConnectionState::Status => &self.status,
            ConnectionState::Login => &self.login,
            ConnectionState::Play => &self.play,
        }
    }
}

/// Parse a schema document from a string.
pub fn parse_str(input: &str) -> Result<Root, CompileError> {
    serde_json::from_str(input).map_err(|err| CompileError::MalformedSchema(err.to_string()))
}

/// Parse a schema document from a file.
pub fn parse_file(path: &Path) -> Result<Root, CompileError> {
    let content = fs::read_to_string(path).map_err(|err| {
        CompileError::MalformedSchema(format!("could not read {}: {err}", path.display()))
    })?;
    parse_str(&content)
}
