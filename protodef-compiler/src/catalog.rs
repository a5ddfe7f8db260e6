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

//! Packet catalog.
//!
//! Organizes resolved records into packets grouped by protocol phase and
//! direction, and extracts the numeric-id mapping table embedded in each
//! direction's `packet` pseudo-message.

use std::collections::HashSet;

use serde_json::Value;

use crate::ast::{
    ConnectionState, Direction, DispatchEntry, Namespace, Packet, PacketShape, Protocol,
    RecordRegistry, StateNamespaces,
};
use crate::parser::{DirectionSchema, Root};
use crate::resolver::Resolver;
use crate::{ident, overrides, CompileError};

/// Resolve the whole document, phases and directions in fixed order,
/// messages in declaration order.
pub fn build_protocol(root: &Root) -> Result<Protocol, CompileError> {
    let mut states = Vec::with_capacity(ConnectionState::ALL.len());
    for state in ConnectionState::ALL {
        let schema = root.state(state);
        states.push(StateNamespaces {
            state,
            to_server: build_namespace(&schema.to_server, state, Direction::ClientToServer)?,
            to_client: build_namespace(&schema.to_client, state, Direction::ServerToClient)?,
        });
    }
    Ok(Protocol { states })
}

/// Normalize a message name for one direction: strip the `packet_`
/// prefix, append `_request`/`_response` unless the name already carries
/// one of those suffixes, and rename the play-phase `ping` message so it
/// cannot collide with the status-phase message of the same name.
fn normalize_message_name(state: ConnectionState, direction: Direction, raw: &str) -> String {
    let name = raw.strip_prefix("packet_").unwrap_or(raw);
    if name == "packet" || name.ends_with("_request") || name.ends_with("_response") {
        return name.to_owned();
    }
    let name = format!("{name}{}", direction.name_suffix());
    if state == ConnectionState::Play && name == "ping_response" {
        return format!("play_{name}");
    }
    name
}

/// Build one (state, direction) namespace.
pub fn build_namespace(
    schema: &DirectionSchema,
    state: ConnectionState,
    direction: Direction,
) -> Result<Namespace, CompileError> {
    let mut records = RecordRegistry::default();
    let mut packets = Vec::with_capacity(schema.types.len());
    let mut dispatch = Vec::new();

    for (raw_name, value) in &schema.types {
        let name = normalize_message_name(state, direction, raw_name);

        // The `packet` pseudo-message only carries the id mapping table;
        // it is never emitted as a decodable type.
        if name == "packet" {
            dispatch = parse_dispatch(value, state, direction)?;
            continue;
        }

        let pascal = ident::to_pascal(&name);

        if let Some(entry) = overrides::lookup(&name) {
            packets.push(Packet { name: pascal, shape: PacketShape::Override(entry) });
            continue;
        }
        if overrides::is_unsupported_packet(&name) {
            eprintln!("skipping `{pascal}`: unsupported packet");
            packets.push(Packet { name: pascal, shape: PacketShape::Unsupported });
            continue;
        }

        if value.get(0).and_then(Value::as_str) != Some("container") {
            return Err(CompileError::MalformedSchema(format!(
                "message `{raw_name}` in {state} {direction} is not a container"
            )));
        }

        match Resolver::new(&mut records).resolve_root(&pascal, &value[1]) {
            Ok(id) => packets.push(Packet { name: pascal, shape: PacketShape::Derived(id) }),
            Err(err) if err.downgrades_packet() => {
                eprintln!("skipping `{pascal}`: {err}");
                packets.push(Packet { name: pascal, shape: PacketShape::Unsupported });
            }
            Err(err) => return Err(err),
        }
    }

    Ok(Namespace { state, direction, records, packets, dispatch })
}

/// Extract the id mapping table from the `packet` pseudo-message: its
/// `name` field's type embeds a `mappings` object from hexadecimal id
/// literals to bare message names.
fn parse_dispatch(
    value: &Value,
    state: ConnectionState,
    direction: Direction,
) -> Result<Vec<DispatchEntry>, CompileError> {
    let fields = value.get(1).and_then(Value::as_array).ok_or_else(|| {
        CompileError::MalformedSchema(format!(
            "packet pseudo-message in {state} {direction} is not a container"
        ))
    })?;
    let name_field = fields.iter().find(|field| field["name"] == "name").ok_or_else(|| {
        CompileError::MalformedSchema(format!(
            "packet pseudo-message in {state} {direction} has no `name` field"
        ))
    })?;
    let mappings = name_field["type"][1]["mappings"].as_object().ok_or_else(|| {
        CompileError::MalformedSchema(format!(
            "packet pseudo-message in {state} {direction} has no `mappings` table"
        ))
    })?;

    let mut entries = Vec::with_capacity(mappings.len());
    let mut seen = HashSet::with_capacity(mappings.len());
    for (id, target) in mappings {
        let digits = id.strip_prefix("0x").unwrap_or(id);
        let id = u16::from_str_radix(digits, 16).map_err(|_| {
            CompileError::MalformedSchema(format!(
                "packet id `{id}` in {state} {direction} is not a hexadecimal literal"
            ))
        })?;
        if !seen.insert(id) {
            return Err(CompileError::MalformedSchema(format!(
                "duplicate packet id {id:#x} in {state} {direction}"
            )));
        }
        let target = target.as_str().ok_or_else(|| {
            CompileError::MalformedSchema(format!(
                "packet id {id:#x} in {state} {direction} does not map to a name"
            ))
        })?;
        let packet = ident::to_pascal(&normalize_message_name(state, direction, target));
        entries.push(DispatchEntry { id, packet });
    }
    Ok(entries)
}
