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

//! Intermediate representation for resolved schema types.

use std::collections::HashSet;
use std::fmt;

use crate::overrides::Override;
use crate::CompileError;

/// Wire primitives recognized by the type resolver.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum PrimitiveKind {
    U8,
    U16,
    U32,
    U64,
    /// 128-bit unique identifier.
    Uuid,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
    /// Variable-length 32-bit integer.
    VarInt,
    /// Variable-length 64-bit integer.
    VarLong,
    /// Length-prefixed utf-8 string, decoded as a borrowed slice.
    String,
    /// Varint-length-prefixed opaque byte buffer, decoded as a borrowed slice.
    Buffer,
    /// Every remaining byte of the message, decoded as a borrowed slice.
    RestBuffer,
}

impl PrimitiveKind {
    /// Map a schema type string to a primitive kind.
    pub fn from_name(name: &str) -> Option<PrimitiveKind> {
        use PrimitiveKind::*;
        let kind = match name {
            "u8" => U8,
            "u16" => U16,
            "u32" => U32,
            "u64" => U64,
            "UUID" => Uuid,
            "i8" => I8,
            "i16" => I16,
            "i32" => I32,
            "i64" => I64,
            "f32" => F32,
            "f64" => F64,
            "bool" => Bool,
            "varint" => VarInt,
            "varlong" => VarLong,
            "string" => String,
            "restBuffer" => RestBuffer,
            _ => return None,
        };
        Some(kind)
    }

    /// Valid as an array count type.
    pub fn is_integer(self) -> bool {
        use PrimitiveKind::*;
        matches!(self, U8 | U16 | U32 | U64 | I8 | I16 | I32 | I64 | VarInt | VarLong)
    }

    /// Decoded representation references the original input buffer.
    pub fn borrows_input(self) -> bool {
        use PrimitiveKind::*;
        matches!(self, String | Buffer | RestBuffer)
    }
}

/// Index of a record inside its namespace's [`RecordRegistry`].
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct RecordId(pub usize);

/// A resolved schema type expression.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Primitive(PrimitiveKind),
    Array {
        element: Box<TypeExpr>,
        count: Box<TypeExpr>,
    },
    Option(Box<TypeExpr>),
    Record(RecordId),
}

/// A named, typed record member.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Canonicalized field name (snake case, reserved words escaped).
    pub name: String,
    pub ty: TypeExpr,
}

/// A fixed-shape aggregate, either a packet root or a hoisted nested
/// container.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub fields: Vec<Field>,
    /// Ownership analysis result: some field transitively carries a
    /// zero-copy slice into the input buffer.
    pub borrows: bool,
}

/// Append-only record store, one per (state, direction) namespace.
///
/// Records are registered during resolution, nested containers first, and
/// are never mutated afterwards.
#[derive(Debug, Default)]
pub struct RecordRegistry {
    records: Vec<Record>,
    names: HashSet<String>,
}

impl RecordRegistry {
    /// Register a new record, computing its ownership flag.
    ///
    /// Record fields may only reference records already present in this
    /// registry; the resolver guarantees this by registering bottom-up.
    pub fn register(&mut self, name: String, fields: Vec<Field>) -> Result<RecordId, CompileError> {
        if !self.names.insert(name.clone()) {
            return Err(CompileError::NameCollision(name));
        }
        let borrows = fields.iter().any(|field| self.type_borrows(&field.ty));
        let id = RecordId(self.records.len());
        self.records.push(Record { name, fields, borrows });
        Ok(id)
    }

    pub fn get(&self, id: RecordId) -> &Record {
        &self.records[id.0]
    }

    /// Records in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Ownership analysis for an arbitrary type expression: true iff some
    /// transitively reachable field is a string, opaque buffer or trailing
    /// rest buffer. Array count types are integers and never contribute.
    pub fn type_borrows(&self, ty: &TypeExpr) -> bool {
        match ty {
            TypeExpr::Primitive(kind) => kind.borrows_input(),
            TypeExpr::Array { element, .. } => self.type_borrows(element),
            TypeExpr::Option(inner) => self.type_borrows(inner),
            TypeExpr::Record(id) => self.get(*id).borrows,
        }
    }
}

/// How a packet's shape was obtained.
#[derive(Debug)]
pub enum PacketShape {
    /// Generically derived from a schema container expression.
    Derived(RecordId),
    /// Hand-authored record and decoder from the override registry.
    Override(&'static Override),
    /// The schema used a construct the resolver does not implement; the
    /// packet is registered so dispatch construction can detect ids that
    /// still route to it.
    Unsupported,
}

/// A top-level message type inside one namespace.
#[derive(Debug)]
pub struct Packet {
    /// Capitalized packet name, unique across the whole protocol.
    pub name: String,
    pub shape: PacketShape,
}

impl Packet {
    pub fn is_valid(&self) -> bool {
        !matches!(self.shape, PacketShape::Unsupported)
    }
}

/// Protocol phase of a connection.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum ConnectionState {
    Handshaking,
    Status,
    Login,
    Play,
}

impl ConnectionState {
    pub const ALL: [ConnectionState; 4] = [
        ConnectionState::Handshaking,
        ConnectionState::Status,
        ConnectionState::Login,
        ConnectionState::Play,
    ];

    /// Emitted module name.
    pub fn module_name(self) -> &'static str {
        match self {
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Status => "status",
            ConnectionState::Login => "login",
            ConnectionState::Play => "play",
        }
    }

    /// Variant name of the runtime `ConnectionState` enum.
    pub fn variant_name(self) -> &'static str {
        match self {
            ConnectionState::Handshaking => "Handshaking",
            ConnectionState::Status => "Status",
            ConnectionState::Login => "Login",
            ConnectionState::Play => "Play",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.module_name())
    }
}

/// Originating endpoint of a message.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

impl Direction {
    /// Suffix appended to bare message names in this direction.
    pub fn name_suffix(self) -> &'static str {
        match self {
            Direction::ClientToServer => "_request",
            Direction::ServerToClient => "_response",
        }
    }

    /// Variant name of the runtime `PacketDirection` enum.
    pub fn variant_name(self) -> &'static str {
        match self {
            Direction::ClientToServer => "ClientToServer",
            Direction::ServerToClient => "ServerToClient",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::ClientToServer => "toServer",
            Direction::ServerToClient => "toClient",
        };
        f.write_str(name)
    }
}

/// One entry of the numeric-id mapping table embedded in a direction's
/// schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEntry {
    pub id: u16,
    /// Capitalized packet name the id routes to.
    pub packet: String,
}

/// Everything resolved for one (state, direction) pair. Names are unique
/// within a namespace, not globally.
#[derive(Debug)]
pub struct Namespace {
    pub state: ConnectionState,
    pub direction: Direction,
    pub records: RecordRegistry,
    pub packets: Vec<Packet>,
    pub dispatch: Vec<DispatchEntry>,
}

/// Both namespaces of one protocol phase.
#[derive(Debug)]
pub struct StateNamespaces {
    pub state: ConnectionState,
    pub to_server: Namespace,
    pub to_client: Namespace,
}

impl StateNamespaces {
    pub fn directions(&self) -> [&Namespace; 2] {
        [&self.to_server, &self.to_client]
    }
}

/// The fully resolved protocol, in schema declaration order.
#[derive(Debug)]
pub struct Protocol {
    pub states: Vec<StateNamespaces>,
}

impl Protocol {
    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.states.iter().flat_map(|state| state.directions())
    }
}
