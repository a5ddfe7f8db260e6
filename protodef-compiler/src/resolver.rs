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

//! Type resolver.
//!
//! Recursively turns schema type expressions into IR types. Nested
//! container expressions are hoisted into named top-level records,
//! registered bottom-up in the namespace's record registry.

use serde_json::Value;

use crate::ast::{Field, PrimitiveKind, RecordId, RecordRegistry, TypeExpr};
use crate::{ident, overrides, CompileError};

pub struct Resolver<'a> {
    records: &'a mut RecordRegistry,
}

impl<'a> Resolver<'a> {
    pub fn new(records: &'a mut RecordRegistry) -> Resolver<'a> {
        Resolver { records }
    }

    /// Resolve a packet root container. Root records keep the packet's own
    /// name unmodified.
    pub fn resolve_root(
        &mut self,
        packet_name: &str,
        fields: &Value,
    ) -> Result<RecordId, CompileError> {
        self.resolve_container(packet_name, &mut Vec::new(), fields)
    }

    /// Resolve an arbitrary type expression. `field_path` is the chain of
    /// canonicalized field names leading to this expression inside the
    /// packet, used to synthesize hoisted record names.
    pub fn resolve_type(
        &mut self,
        packet_name: &str,
        field_path: &mut Vec<String>,
        expr: &Value,
    ) -> Result<TypeExpr, CompileError> {
        match expr {
            Value::String(name) => self.resolve_primitive(packet_name, name),
            Value::Array(parts) => {
                let kind = parts.first().and_then(Value::as_str).ok_or_else(|| {
                    CompileError::MalformedSchema(format!(
                        "tagged type expression without a kind in `{packet_name}`"
                    ))
                })?;
                let payload = parts.get(1).unwrap_or(&Value::Null);
                match kind {
                    "container" => {
                        let id = self.resolve_container(packet_name, field_path, payload)?;
                        Ok(TypeExpr::Record(id))
                    }
                    "array" => self.resolve_array(packet_name, field_path, payload),
                    "option" => {
                        let inner = self.resolve_type(packet_name, field_path, payload)?;
                        Ok(TypeExpr::Option(Box::new(inner)))
                    }
                    "buffer" => self.resolve_buffer(packet_name, payload),
                    name => Err(CompileError::UnsupportedConstruct {
                        name: name.to_owned(),
                        packet: packet_name.to_owned(),
                    }),
                }
            }
            _ => Err(CompileError::MalformedSchema(format!(
                "type expression in `{packet_name}` is neither a string nor a tagged pair"
            ))),
        }
    }

    fn resolve_primitive(
        &self,
        packet_name: &str,
        name: &str,
    ) -> Result<TypeExpr, CompileError> {
        if overrides::is_unsupported_construct(name) {
            return Err(CompileError::UnsupportedConstruct {
                name: name.to_owned(),
                packet: packet_name.to_owned(),
            });
        }
        PrimitiveKind::from_name(name).map(TypeExpr::Primitive).ok_or_else(|| {
            CompileError::UnknownPrimitive {
                name: name.to_owned(),
                packet: packet_name.to_owned(),
            }
        })
    }

    /// Only varint-counted buffers are representable; fixed-count buffers
    /// are recognized but degrade the owning packet.
    fn resolve_buffer(
        &self,
        packet_name: &str,
        payload: &Value,
    ) -> Result<TypeExpr, CompileError> {
        match payload["countType"].as_str() {
            Some("varint") => Ok(TypeExpr::Primitive(PrimitiveKind::Buffer)),
            _ => Err(CompileError::UnsupportedConstruct {
                name: "buffer".to_owned(),
                packet: packet_name.to_owned(),
            }),
        }
    }

    fn resolve_array(
        &mut self,
        packet_name: &str,
        field_path: &mut Vec<String>,
        payload: &Value,
    ) -> Result<TypeExpr, CompileError> {
        let count = self.resolve_type(packet_name, field_path, &payload["countType"])?;
        match count {
            TypeExpr::Primitive(kind) if kind.is_integer() => (),
            _ => {
                return Err(CompileError::MalformedSchema(format!(
                    "array count type in `{packet_name}` is not an integer primitive"
                )))
            }
        }
        let element = self.resolve_type(packet_name, field_path, &payload["type"])?;
        Ok(TypeExpr::Array { element: Box::new(element), count: Box::new(count) })
    }

    fn resolve_container(
        &mut self,
        packet_name: &str,
        field_path: &mut Vec<String>,
        fields_json: &Value,
    ) -> Result<RecordId, CompileError> {
        let items = fields_json.as_array().ok_or_else(|| {
            CompileError::MalformedSchema(format!(
                "container payload in `{packet_name}` is not a field list"
            ))
        })?;

        let mut fields: Vec<Field> = Vec::with_capacity(items.len());
        for item in items {
            let raw_name = item["name"].as_str().ok_or_else(|| {
                // Anonymous fields only occur inside constructs that are
                // already unsupported; degrade rather than abort.
                CompileError::UnsupportedConstruct {
                    name: "anonymous field".to_owned(),
                    packet: packet_name.to_owned(),
                }
            })?;
            let name = ident::field_name(raw_name);
            if fields.iter().any(|field| field.name == name) {
                return Err(CompileError::MalformedSchema(format!(
                    "duplicate field `{name}` in `{packet_name}`"
                )));
            }

            field_path.push(name.clone());
            let ty = self.resolve_type(packet_name, field_path, &item["type"]);
            field_path.pop();

            fields.push(Field { name, ty: ty? });
        }

        let name = ident::hoisted_record_name(packet_name, field_path);
        self.records.register(name, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(packet: &str, fields: Value) -> Result<(RecordRegistry, RecordId), CompileError> {
        let mut records = RecordRegistry::default();
        let id = Resolver::new(&mut records).resolve_root(packet, &fields)?;
        Ok((records, id))
    }

    #[test]
    fn varint_array_counted_by_varint() {
        // {"name":"Count","type":["array",{"type":"varint","countType":"varint"}]}
        let (records, id) = resolve(
            "Foo",
            json!([{ "name": "Count", "type": ["array", { "type": "varint", "countType": "varint" }] }]),
        )
        .unwrap();

        let record = records.get(id);
        assert_eq!(record.name, "Foo");
        assert_eq!(record.fields.len(), 1);
        assert_eq!(record.fields[0].name, "count");
        assert_eq!(
            record.fields[0].ty,
            TypeExpr::Array {
                element: Box::new(TypeExpr::Primitive(PrimitiveKind::VarInt)),
                count: Box::new(TypeExpr::Primitive(PrimitiveKind::VarInt)),
            }
        );
        assert!(!record.borrows);
    }

    #[test]
    fn unknown_primitive_fails_resolution() {
        let err = resolve("Foo", json!([{ "name": "x", "type": "quaternion" }])).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownPrimitive {
                name: "quaternion".to_owned(),
                packet: "Foo".to_owned()
            }
        );
        assert!(err.downgrades_packet());
    }

    #[test]
    fn denylisted_construct_is_unsupported() {
        let err = resolve("Foo", json!([{ "name": "meta", "type": "entityMetadata" }]))
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::UnsupportedConstruct {
                name: "entityMetadata".to_owned(),
                packet: "Foo".to_owned()
            }
        );
        assert!(err.downgrades_packet());
    }

    #[test]
    fn unknown_tagged_kind_is_unsupported() {
        let err = resolve(
            "Foo",
            json!([{ "name": "flags", "type": ["bitfield", [{ "name": "a", "size": 4 }]] }]),
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedConstruct { .. }));
    }

    #[test]
    fn nested_containers_are_hoisted_with_path_names() {
        let (records, id) = resolve(
            "Outer",
            json!([{
                "name": "inner",
                "type": ["container", [
                    { "name": "leaf", "type": ["container", [
                        { "name": "value", "type": "i32" }
                    ]] }
                ]]
            }]),
        )
        .unwrap();

        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        // Registered bottom-up: deepest container first, packet root last.
        assert_eq!(names, ["Outer_Inner_Leaf", "Outer_Inner", "Outer"]);
        assert_eq!(records.get(id).name, "Outer");
    }

    #[test]
    fn option_nests_and_borrows_propagate() {
        let (records, id) = resolve(
            "Foo",
            json!([{ "name": "motd", "type": ["option", "string"] }]),
        )
        .unwrap();
        let record = records.get(id);
        assert_eq!(
            record.fields[0].ty,
            TypeExpr::Option(Box::new(TypeExpr::Primitive(PrimitiveKind::String)))
        );
        assert!(record.borrows);
    }

    #[test]
    fn varint_counted_buffer_resolves_fixed_buffer_degrades() {
        let (records, id) = resolve(
            "Foo",
            json!([{ "name": "data", "type": ["buffer", { "countType": "varint" }] }]),
        )
        .unwrap();
        assert_eq!(
            records.get(id).fields[0].ty,
            TypeExpr::Primitive(PrimitiveKind::Buffer)
        );

        let err =
            resolve("Foo", json!([{ "name": "data", "type": ["buffer", { "count": 16 }] }]))
                .unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedConstruct { .. }));
    }

    #[test]
    fn non_integer_array_count_is_malformed() {
        let err = resolve(
            "Foo",
            json!([{ "name": "xs", "type": ["array", { "type": "u8", "countType": "string" }] }]),
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::MalformedSchema(_)));
        assert!(!err.downgrades_packet());
    }

    #[test]
    fn reserved_field_names_are_escaped() {
        let (records, id) = resolve(
            "Foo",
            json!([
                { "name": "type", "type": "varint" },
                { "name": "match", "type": "bool" },
                { "name": "Count", "type": "u8" }
            ]),
        )
        .unwrap();
        let names: Vec<&str> =
            records.get(id).fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["type_", "match_", "count"]);
    }

    #[test]
    fn synthesized_name_collision_is_fatal() {
        let mut records = RecordRegistry::default();
        Resolver::new(&mut records)
            .resolve_root("Foo_Bar", &json!([]))
            .unwrap();
        // A packet `Foo` with a nested container field `bar` synthesizes
        // `Foo_Bar`, which is already taken.
        let err = Resolver::new(&mut records)
            .resolve_root(
                "Foo",
                &json!([{ "name": "bar", "type": ["container", []] }]),
            )
            .unwrap_err();
        assert_eq!(err, CompileError::NameCollision("Foo_Bar".to_owned()));
        assert!(!err.downgrades_packet());
    }
}
