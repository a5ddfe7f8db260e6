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

//! Rust code emitter.
//!
//! Turns the resolved protocol into a single formatted source file: one
//! module per connection phase holding record declarations and decode
//! routines for both directions, a `Packet` sum type over every
//! implemented packet, and a `(state, direction, id)` dispatch function.
//!
//! Records that borrow from the input buffer carry a `'p` lifetime; all
//! other declarations stay fully owned.

use std::collections::HashSet;

use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};

use crate::ast::{
    PacketShape, PrimitiveKind, Protocol, Record, RecordRegistry, StateNamespaces, TypeExpr,
};
use crate::{ident, CompileError};

mod preamble;

/// Emit the full generated file for a resolved protocol.
pub fn generate(protocol: &Protocol) -> Result<String, CompileError> {
    validate_dispatch(protocol)?;

    // Packet names become sum type variants, so they must be unique
    // across every phase and direction.
    let mut variant_names: HashSet<&str> = HashSet::new();
    for ns in protocol.namespaces() {
        for packet in ns.packets.iter().filter(|packet| packet.is_valid()) {
            if !variant_names.insert(&packet.name) {
                return Err(CompileError::NameCollision(packet.name.clone()));
            }
        }
    }

    let preamble = preamble::emit();
    let modules = protocol
        .states
        .iter()
        .map(state_module)
        .collect::<Result<Vec<_>, CompileError>>()?;
    let sum_type = packet_enum(protocol);
    let dispatch = dispatch_fn(protocol);

    let code = quote! {
        #preamble
        #(#modules)*
        #sum_type
        #dispatch
    };
    let syntax_tree = syn::parse2(code).expect("Could not parse generated code");
    Ok(prettyplease::unparse(&syntax_tree))
}

/// Every id in every mapping table must route to an implemented packet.
fn validate_dispatch(protocol: &Protocol) -> Result<(), CompileError> {
    for ns in protocol.namespaces() {
        for entry in &ns.dispatch {
            let implemented =
                ns.packets.iter().any(|packet| packet.name == entry.packet && packet.is_valid());
            if !implemented {
                return Err(CompileError::DispatchToUnimplemented {
                    state: ns.state,
                    direction: ns.direction,
                    id: entry.id,
                    packet: entry.packet.clone(),
                });
            }
        }
    }
    Ok(())
}

/// One `pub mod <state>` holding the records of both directions plus any
/// hand-authored override declarations used by this phase.
fn state_module(state_ns: &StateNamespaces) -> Result<TokenStream, CompileError> {
    let mut type_names: HashSet<&str> = HashSet::new();
    let mut spliced: HashSet<&str> = HashSet::new();
    let mut items: Vec<TokenStream> = Vec::new();

    for ns in state_ns.directions() {
        for record in ns.records.iter() {
            if !type_names.insert(&record.name) {
                return Err(CompileError::NameCollision(record.name.clone()));
            }
            items.push(record_decl(&ns.records, record));
        }
        for packet in &ns.packets {
            if let PacketShape::Override(entry) = &packet.shape {
                if spliced.insert(entry.name) {
                    if !type_names.insert(entry.type_name) {
                        return Err(CompileError::NameCollision(entry.type_name.to_owned()));
                    }
                    items.push((entry.decl)());
                }
            }
        }
    }

    let mod_ident = format_ident!("{}", state_ns.state.module_name());
    Ok(quote! {
        pub mod #mod_ident {
            use super::*;

            #(#items)*
        }
    })
}

/// Struct declaration plus decode routine for one record.
fn record_decl(registry: &RecordRegistry, record: &Record) -> TokenStream {
    let name = format_ident!("{}", record.name);
    let fn_name = format_ident!("{}", ident::to_snake(&record.name));
    let lifetime = record.borrows.then(|| quote!(<'p>));
    let buf_ty = if record.borrows { quote!(&mut &'p [u8]) } else { quote!(&mut &[u8]) };
    // Zero-field records never touch the cursor.
    let buf_param = if record.fields.is_empty() {
        format_ident!("_buf")
    } else {
        format_ident!("buf")
    };

    let field_names: Vec<_> =
        record.fields.iter().map(|field| format_ident!("{}", field.name)).collect();
    let field_types: Vec<_> =
        record.fields.iter().map(|field| rust_type(registry, &field.ty)).collect();
    let field_values: Vec<_> =
        record.fields.iter().map(|field| decode_expr(registry, &field.ty, 0)).collect();

    quote! {
        #[derive(Debug, Clone, PartialEq)]
        pub struct #name #lifetime {
            #(pub #field_names: #field_types,)*
        }

        pub fn #fn_name #lifetime (#buf_param: #buf_ty) -> Result<#name #lifetime, DecodeError> {
            #(let #field_names = #field_values;)*
            Ok(#name { #(#field_names,)* })
        }
    }
}

fn rust_type(registry: &RecordRegistry, ty: &TypeExpr) -> TokenStream {
    match ty {
        TypeExpr::Primitive(kind) => primitive_type(*kind),
        TypeExpr::Array { element, .. } => {
            let element = rust_type(registry, element);
            quote!(Vec<#element>)
        }
        TypeExpr::Option(inner) => {
            let inner = rust_type(registry, inner);
            quote!(Option<#inner>)
        }
        TypeExpr::Record(id) => {
            let record = registry.get(*id);
            let name = format_ident!("{}", record.name);
            if record.borrows {
                quote!(#name<'p>)
            } else {
                quote!(#name)
            }
        }
    }
}

fn primitive_type(kind: PrimitiveKind) -> TokenStream {
    use PrimitiveKind::*;
    match kind {
        U8 => quote!(u8),
        U16 => quote!(u16),
        U32 => quote!(u32),
        U64 => quote!(u64),
        Uuid => quote!(u128),
        I8 => quote!(i8),
        I16 => quote!(i16),
        I32 | VarInt => quote!(i32),
        I64 | VarLong => quote!(i64),
        F32 => quote!(f32),
        F64 => quote!(f64),
        Bool => quote!(bool),
        String => quote!(&'p str),
        Buffer | RestBuffer => quote!(&'p [u8]),
    }
}

/// Expression decoding one value of the given type from `buf`. `depth`
/// keeps the loop temporaries of nested arrays distinct.
fn decode_expr(registry: &RecordRegistry, ty: &TypeExpr, depth: usize) -> TokenStream {
    match ty {
        TypeExpr::Primitive(kind) => primitive_decode(*kind),
        TypeExpr::Array { element, count } => {
            let count_var = depth_ident("array_count", depth);
            let elements_var = depth_ident("array_elements", depth);
            let count = decode_expr(registry, count, depth);
            let element = decode_expr(registry, element, depth + 1);
            quote! {
                {
                    let #count_var = #count;
                    let mut #elements_var =
                        Vec::with_capacity(cautious_capacity(#count_var as usize));
                    for _ in 0..#count_var {
                        #elements_var.push(#element);
                    }
                    #elements_var
                }
            }
        }
        TypeExpr::Option(inner) => {
            let inner = decode_expr(registry, inner, depth);
            quote! {
                if bool::decode(buf)? { Some(#inner) } else { None }
            }
        }
        TypeExpr::Record(id) => {
            let fn_name = format_ident!("{}", ident::to_snake(&registry.get(*id).name));
            quote!(#fn_name(buf)?)
        }
    }
}

fn primitive_decode(kind: PrimitiveKind) -> TokenStream {
    use PrimitiveKind::*;
    match kind {
        U8 => quote!(u8::decode(buf)?),
        U16 => quote!(u16::decode(buf)?),
        U32 => quote!(u32::decode(buf)?),
        U64 => quote!(u64::decode(buf)?),
        Uuid => quote!(u128::decode(buf)?),
        I8 => quote!(i8::decode(buf)?),
        I16 => quote!(i16::decode(buf)?),
        I32 => quote!(i32::decode(buf)?),
        I64 => quote!(i64::decode(buf)?),
        F32 => quote!(f32::decode(buf)?),
        F64 => quote!(f64::decode(buf)?),
        Bool => quote!(bool::decode(buf)?),
        VarInt => quote!(read_varint(buf)?),
        VarLong => quote!(read_varlong(buf)?),
        String => quote!(<&str>::decode(buf)?),
        Buffer => quote!(<&[u8]>::decode(buf)?),
        RestBuffer => quote!(read_rest_buffer(buf)?),
    }
}

fn depth_ident(base: &str, depth: usize) -> proc_macro2::Ident {
    if depth == 0 {
        format_ident!("{base}")
    } else {
        format_ident!("{base}_{depth}")
    }
}

/// Sum type over every implemented packet of every namespace.
fn packet_enum(protocol: &Protocol) -> TokenStream {
    let mut variants: Vec<TokenStream> = Vec::new();
    for state in &protocol.states {
        let mod_ident = format_ident!("{}", state.state.module_name());
        for ns in state.directions() {
            for packet in &ns.packets {
                let (type_name, borrows) = match &packet.shape {
                    PacketShape::Derived(id) => (packet.name.as_str(), ns.records.get(*id).borrows),
                    PacketShape::Override(entry) => (entry.type_name, entry.borrows),
                    PacketShape::Unsupported => continue,
                };
                let variant = format_ident!("{}", packet.name);
                let ty = format_ident!("{}", type_name);
                let lifetime = borrows.then(|| quote!(<'p>));
                variants.push(quote!(#variant(#mod_ident::#ty #lifetime),));
            }
        }
    }

    let lifetime = protocol_borrows(protocol).then(|| quote!(<'p>));
    quote! {
        #[derive(Debug, Clone, PartialEq)]
        pub enum Packet #lifetime {
            #(#variants)*
        }
    }
}

/// Decode a packet body by numeric id within one phase and direction.
fn dispatch_fn(protocol: &Protocol) -> TokenStream {
    let mut arms: Vec<TokenStream> = Vec::new();
    for state in &protocol.states {
        let mod_ident = format_ident!("{}", state.state.module_name());
        let state_variant = format_ident!("{}", state.state.variant_name());
        for ns in state.directions() {
            let direction_variant = format_ident!("{}", ns.direction.variant_name());
            for entry in &ns.dispatch {
                let packet = ns
                    .packets
                    .iter()
                    .find(|packet| packet.name == entry.packet)
                    .expect("dispatch entries are validated before emission");
                let decode_fn = match &packet.shape {
                    PacketShape::Derived(_) => {
                        format_ident!("{}", ident::to_snake(&packet.name))
                    }
                    PacketShape::Override(override_entry) => {
                        format_ident!("{}", override_entry.decode_fn)
                    }
                    PacketShape::Unsupported => {
                        unreachable!("dispatch entries are validated before emission")
                    }
                };
                let variant = format_ident!("{}", packet.name);
                let id = syn::LitInt::new(&format!("{:#04x}", entry.id), Span::call_site());
                arms.push(quote! {
                    (ConnectionState::#state_variant, PacketDirection::#direction_variant, #id) => {
                        Ok(Packet::#variant(#mod_ident::#decode_fn(buf)?))
                    }
                });
            }
        }
    }

    let body = quote! {
        match (state, direction, id) {
            #(#arms)*
            _ => Err(DecodeError::UnknownPacketId { id }),
        }
    };

    if protocol_borrows(protocol) {
        quote! {
            pub fn decode_packet<'p>(
                state: ConnectionState,
                direction: PacketDirection,
                id: u32,
                buf: &mut &'p [u8],
            ) -> Result<Packet<'p>, DecodeError> {
                #body
            }
        }
    } else {
        quote! {
            pub fn decode_packet(
                state: ConnectionState,
                direction: PacketDirection,
                id: u32,
                buf: &mut &[u8],
            ) -> Result<Packet, DecodeError> {
                #body
            }
        }
    }
}

/// True when any implemented packet holds a zero-copy slice.
fn protocol_borrows(protocol: &Protocol) -> bool {
    protocol.namespaces().any(|ns| {
        ns.packets.iter().any(|packet| match &packet.shape {
            PacketShape::Derived(id) => ns.records.get(*id).borrows,
            PacketShape::Override(entry) => entry.borrows,
            PacketShape::Unsupported => false,
        })
    })
}

#[cfg(test)]
mod tests {
    use crate::{compile, CompileError};
    use serde_json::{json, Value};

    /// Build a full schema document with one populated namespace.
    fn compile_single(state: &str, direction: &str, types: Value) -> Result<String, CompileError> {
        let mut root = empty_root();
        root[state][direction]["types"] = types;
        compile(&root.to_string())
    }

    fn empty_root() -> Value {
        json!({
            "handshaking": { "toClient": { "types": {} }, "toServer": { "types": {} } },
            "status": { "toClient": { "types": {} }, "toServer": { "types": {} } },
            "login": { "toClient": { "types": {} }, "toServer": { "types": {} } },
            "play": { "toClient": { "types": {} }, "toServer": { "types": {} } }
        })
    }

    #[test]
    fn borrowing_packet_gets_a_lifetime() {
        let out = compile_single(
            "handshaking",
            "toServer",
            json!({
                "packet_set_protocol": ["container", [
                    { "name": "protocolVersion", "type": "varint" },
                    { "name": "serverHost", "type": "string" },
                    { "name": "serverPort", "type": "u16" },
                    { "name": "nextState", "type": "varint" }
                ]],
                "packet": ["container", [
                    { "name": "name", "type": ["mapper",
                        { "type": "varint", "mappings": { "0x00": "set_protocol" } }] }
                ]]
            }),
        )
        .unwrap();

        assert!(out.contains("pub struct SetProtocolRequest<'p>"));
        assert!(out.contains("pub server_host: &'p str,"));
        assert!(out.contains("pub fn set_protocol_request<'p>"));
        assert!(out.contains("read_varint(buf)?"));
        assert!(out.contains("SetProtocolRequest(handshaking::SetProtocolRequest<'p>)"));
    }

    #[test]
    fn owned_packet_has_no_lifetime() {
        let out = compile_single(
            "play",
            "toServer",
            json!({
                "packet_keep_alive": ["container", [
                    { "name": "keepAliveId", "type": "i64" }
                ]]
            }),
        )
        .unwrap();

        assert!(out.contains("pub struct KeepAliveRequest {"));
        assert!(out.contains("pub fn keep_alive_request(buf: &mut &[u8])"));
        // Nothing in this document borrows, so the sum type is owned too.
        assert!(out.contains("pub enum Packet {"));
        assert!(out.contains("pub fn decode_packet("));
    }

    #[test]
    fn arrays_and_options_decode_inline() {
        let out = compile_single(
            "play",
            "toClient",
            json!({
                "packet_tab_complete": ["container", [
                    { "name": "matches", "type": ["array", {
                        "countType": "varint",
                        "type": ["container", [
                            { "name": "text", "type": "string" },
                            { "name": "tooltip", "type": ["option", "string"] }
                        ]]
                    }] }
                ]]
            }),
        )
        .unwrap();

        assert!(out.contains("pub struct TabCompleteResponse_Matches<'p>"));
        assert!(out.contains("pub matches: Vec<TabCompleteResponse_Matches<'p>>,"));
        assert!(out.contains("cautious_capacity(array_count as usize)"));
        assert!(out.contains("if bool::decode(buf)? {"));
        assert!(out.contains("tab_complete_response_matches(buf)?"));
    }

    #[test]
    fn dispatch_matches_on_state_direction_and_id() {
        let out = compile_single(
            "status",
            "toClient",
            json!({
                "packet_server_info": ["container", [
                    { "name": "response", "type": "string" }
                ]],
                "packet": ["container", [
                    { "name": "name", "type": ["mapper",
                        { "type": "varint", "mappings": { "0x00": "server_info" } }] }
                ]]
            }),
        )
        .unwrap();

        assert!(out.contains("(ConnectionState::Status, PacketDirection::ServerToClient, 0x00)"));
        assert!(out.contains("Packet::ServerInfoResponse(status::server_info_response(buf)?)"));
        assert!(out.contains("Err(DecodeError::UnknownPacketId { id })"));
    }

    #[test]
    fn dispatch_to_degraded_packet_is_fatal() {
        let err = compile_single(
            "play",
            "toClient",
            json!({
                "packet_entity_metadata": ["container", [
                    { "name": "metadata", "type": "entityMetadata" }
                ]],
                "packet": ["container", [
                    { "name": "name", "type": ["mapper",
                        { "type": "varint", "mappings": { "0x52": "entity_metadata" } }] }
                ]]
            }),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            CompileError::DispatchToUnimplemented { id: 0x52, ref packet, .. }
                if packet == "EntityMetadataResponse"
        ));
    }

    #[test]
    fn dispatch_to_missing_packet_is_fatal() {
        let err = compile_single(
            "login",
            "toServer",
            json!({
                "packet": ["container", [
                    { "name": "name", "type": ["mapper",
                        { "type": "varint", "mappings": { "0x00": "login_start" } }] }
                ]]
            }),
        )
        .unwrap_err();

        assert!(matches!(err, CompileError::DispatchToUnimplemented { id: 0x00, .. }));
    }

    #[test]
    fn cross_namespace_packet_name_clash_is_fatal() {
        let mut root = empty_root();
        let message = json!({
            "packet_disconnect": ["container", [{ "name": "reason", "type": "string" }]]
        });
        root["login"]["toClient"]["types"] = message.clone();
        root["play"]["toClient"]["types"] = message;

        let err = compile(&root.to_string()).unwrap_err();
        assert_eq!(err, CompileError::NameCollision("DisconnectResponse".to_owned()));
    }

    #[test]
    fn override_declarations_are_spliced_into_the_state_module() {
        let out = compile_single(
            "play",
            "toServer",
            json!({
                "packet_use_entity": ["container", [
                    { "name": "target", "type": "varint" },
                    { "name": "mouse", "type": ["switch", {}] }
                ]],
                "packet": ["container", [
                    { "name": "name", "type": ["mapper",
                        { "type": "varint", "mappings": { "0x0d": "use_entity" } }] }
                ]]
            }),
        )
        .unwrap();

        assert!(out.contains("pub enum UseEntityKind"));
        assert!(out.contains("pub fn packet_use_entity_request"));
        assert!(out.contains("UseEntityRequest(play::UseEntityRequest)"));
        assert!(out.contains("Packet::UseEntityRequest(play::packet_use_entity_request(buf)?)"));
    }

    #[test]
    fn empty_document_still_emits_the_dispatch_surface() {
        let out = compile(&empty_root().to_string()).unwrap();
        assert!(out.contains("pub enum Packet {}"));
        assert!(out.contains("pub fn decode_packet("));
        assert!(out.contains("Err(DecodeError::UnknownPacketId { id })"));
    }
}
