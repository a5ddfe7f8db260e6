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

//! Override registry.
//!
//! A small, name-keyed set of exceptions to generic derivation: packets
//! whose wire shape cannot be expressed by the schema's container model
//! get a hand-written record and decoder, and recognized-but-unsupported
//! schema constructs are declared here so the resolver can degrade the
//! owning packet instead of failing the run.

use proc_macro2::TokenStream;
use quote::quote;

/// A hand-authored record + decoder pair, spliced into the emitted source
/// verbatim in place of a generically derived struct and decode routine.
#[derive(Debug)]
pub struct Override {
    /// Normalized snake-case message name this entry replaces.
    pub name: &'static str,
    /// Capitalized type name referenced by the packet sum type.
    pub type_name: &'static str,
    /// Name of the hand-written decode routine.
    pub decode_fn: &'static str,
    /// Whether the hand-written record borrows from the input buffer.
    pub borrows: bool,
    /// Declarations emitted into the owning state module.
    pub decl: fn() -> TokenStream,
}

/// Consulted by the packet catalog before generic resolution.
pub fn lookup(name: &str) -> Option<&'static Override> {
    OVERRIDES.iter().find(|entry| entry.name == name)
}

/// Schema constructs the resolver recognizes but deliberately does not
/// implement. Resolution of a field with one of these degrades the owning
/// packet to an unimplemented stub.
pub fn is_unsupported_construct(name: &str) -> bool {
    const UNSUPPORTED: [&str; 4] = ["entityMetadata", "chunkBlockEntity", "command_node", "tags"];
    UNSUPPORTED.contains(&name)
}

/// Packets that are known not to be derivable even though their schema
/// parses; they are registered as stubs without attempting resolution.
pub fn is_unsupported_packet(name: &str) -> bool {
    const UNSUPPORTED: [&str; 1] = ["map_response"];
    UNSUPPORTED.contains(&name)
}

static OVERRIDES: [Override; 1] = [Override {
    name: "use_entity_request",
    type_name: "UseEntityRequest",
    decode_fn: "packet_use_entity_request",
    borrows: false,
    decl: use_entity_decl,
}];

/// The entity-interaction packet is a varint discriminant followed by a
/// payload whose shape depends on the discriminant value; the generic
/// resolver has no representation for that, so it is modeled as a tagged
/// union here.
fn use_entity_decl() -> TokenStream {
    quote! {
        #[derive(Debug, Clone, PartialEq)]
        pub struct Coords {
            pub x: f32,
            pub y: f32,
            pub z: f32,
        }

        #[derive(Debug, Clone, PartialEq)]
        pub enum UseEntityKind {
            Interact,
            Attack,
            InteractAt(Coords),
        }

        #[derive(Debug, Clone, PartialEq)]
        pub struct UseEntityRequest {
            pub entity_id: i32,
            pub kind: UseEntityKind,
            pub sneaking: bool,
        }

        pub fn packet_use_entity_request(buf: &mut &[u8]) -> Result<UseEntityRequest, DecodeError> {
            let entity_id = read_varint(buf)?;
            let kind = read_varint(buf)?;
            let kind = match kind {
                0 => {
                    // The interact form carries a sub-target hand that the
                    // consumer has no use for.
                    let _ = read_varint(buf)?;
                    UseEntityKind::Interact
                }
                1 => UseEntityKind::Attack,
                2 => {
                    let x = f32::decode(buf)?;
                    let y = f32::decode(buf)?;
                    let z = f32::decode(buf)?;
                    let _ = read_varint(buf)?;
                    UseEntityKind::InteractAt(Coords { x, y, z })
                }
                value => {
                    return Err(DecodeError::UnknownDiscriminant {
                        packet: "UseEntityRequest",
                        value,
                    })
                }
            };
            let sneaking = bool::decode(buf)?;
            Ok(UseEntityRequest { entity_id, kind, sneaking })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_keyed_by_message_name() {
        let entry = lookup("use_entity_request").unwrap();
        assert_eq!(entry.type_name, "UseEntityRequest");
        assert!(!entry.borrows);
        assert!(lookup("set_protocol_request").is_none());
    }

    #[test]
    fn denylists() {
        assert!(is_unsupported_construct("entityMetadata"));
        assert!(is_unsupported_construct("tags"));
        assert!(!is_unsupported_construct("varint"));
        assert!(is_unsupported_packet("map_response"));
        assert!(!is_unsupported_packet("map_request"));
    }

    #[test]
    fn use_entity_decl_is_a_tagged_union() {
        let decl = use_entity_decl().to_string();
        assert!(decl.contains("enum UseEntityKind"));
        assert!(decl.contains("InteractAt"));
        assert!(decl.contains("UnknownDiscriminant"));
    }
}
