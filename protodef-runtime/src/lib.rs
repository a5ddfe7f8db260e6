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

//! Helper definitions used by the generated packet decoders.
//!
//! Generated code reads from a `&mut &'p [u8]` cursor and returns values
//! that may borrow from the original input slice (strings and byte
//! buffers are zero-copy).

use std::str;

/// Maximum encoded length of a varint, in bytes.
pub const MAX_VARINT_LEN: usize = 5;
/// Maximum encoded length of a varlong, in bytes.
pub const MAX_VARLONG_LEN: usize = 10;

/// Capacity limit applied when pre-sizing vectors from a wire-supplied
/// element count. The count itself is still honored while decoding; this
/// only bounds the up-front allocation so a hostile count cannot reserve
/// gigabytes before the input runs out.
const CAUTIOUS_CAPACITY_LIMIT: usize = 4096;

/// Type of decoding errors surfaced by generated decoders.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("input truncated: wanted {wanted} bytes, {got} remain")]
    Truncated { wanted: usize, got: usize },
    #[error("variable-length integer longer than {limit} bytes")]
    VarIntTooLong { limit: usize },
    #[error("length prefix {0} is not a valid length")]
    InvalidLength(i64),
    #[error("string field is not valid utf-8")]
    InvalidUtf8,
    #[error("unknown packet id {id:#x}")]
    UnknownPacketId { id: u32 },
    #[error("unknown discriminant {value} in {packet}")]
    UnknownDiscriminant { packet: &'static str, value: i32 },
}

/// Protocol phase a connection is in.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum ConnectionState {
    Handshaking,
    Status,
    Login,
    Play,
}

/// Originating endpoint of a packet.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum PacketDirection {
    ClientToServer,
    ServerToClient,
}

/// Split `size` bytes off the front of the cursor.
pub fn read_exact<'p>(buf: &mut &'p [u8], size: usize) -> Result<&'p [u8], DecodeError> {
    if buf.len() < size {
        return Err(DecodeError::Truncated { wanted: size, got: buf.len() });
    }
    let (head, tail) = buf.split_at(size);
    *buf = tail;
    Ok(head)
}

/// Clamp a wire-supplied element count before passing it to
/// `Vec::with_capacity`.
pub fn cautious_capacity(count: usize) -> usize {
    count.min(CAUTIOUS_CAPACITY_LIMIT)
}

/// Wire scalars and zero-copy values decodable with no extra arguments.
///
/// Multi-byte integers are big-endian on the wire.
pub trait Decode<'p>: Sized {
    fn decode(buf: &mut &'p [u8]) -> Result<Self, DecodeError>;
}

macro_rules! impl_decode_for_numbers {
    ($($number:ident)*) => {
        $(
            impl<'p> Decode<'p> for $number {
                fn decode(buf: &mut &'p [u8]) -> Result<Self, DecodeError> {
                    let bytes = read_exact(buf, std::mem::size_of::<$number>())?;
                    Ok($number::from_be_bytes(bytes.try_into().unwrap()))
                }
            }
        )*
    };
}

impl_decode_for_numbers!(u8 u16 u32 u64 u128 i8 i16 i32 i64 f32 f64);

impl<'p> Decode<'p> for bool {
    fn decode(buf: &mut &'p [u8]) -> Result<Self, DecodeError> {
        let value = u8::decode(buf)?;
        Ok(value != 0)
    }
}

/// Length-prefixed utf-8 string, borrowed from the input.
impl<'p> Decode<'p> for &'p str {
    fn decode(buf: &mut &'p [u8]) -> Result<Self, DecodeError> {
        let bytes: &[u8] = Decode::decode(buf)?;
        str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
    }
}

/// Varint-length-prefixed opaque buffer, borrowed from the input.
impl<'p> Decode<'p> for &'p [u8] {
    fn decode(buf: &mut &'p [u8]) -> Result<Self, DecodeError> {
        let size = read_varint(buf)?;
        let size = usize::try_from(size).map_err(|_| DecodeError::InvalidLength(size as i64))?;
        read_exact(buf, size)
    }
}

/// Decode a variable-length 32-bit integer, least significant group first,
/// seven payload bits per byte. Encodings longer than [`MAX_VARINT_LEN`]
/// bytes are rejected.
pub fn read_varint(buf: &mut &[u8]) -> Result<i32, DecodeError> {
    let mut result = 0u32;
    let mut bytes_read = 0usize;
    loop {
        let byte = u8::decode(buf)?;
        result |= ((byte & 0x7f) as u32) << (7 * bytes_read as u32);
        bytes_read += 1;

        if byte & 0x80 == 0 {
            break;
        }
        if bytes_read >= MAX_VARINT_LEN {
            return Err(DecodeError::VarIntTooLong { limit: MAX_VARINT_LEN });
        }
    }
    Ok(result as i32)
}

/// Decode a variable-length 64-bit integer. Encodings longer than
/// [`MAX_VARLONG_LEN`] bytes are rejected.
pub fn read_varlong(buf: &mut &[u8]) -> Result<i64, DecodeError> {
    let mut result = 0u64;
    let mut bytes_read = 0usize;
    loop {
        let byte = u8::decode(buf)?;
        result |= ((byte & 0x7f) as u64) << (7 * bytes_read as u64);
        bytes_read += 1;

        if byte & 0x80 == 0 {
            break;
        }
        if bytes_read >= MAX_VARLONG_LEN {
            return Err(DecodeError::VarIntTooLong { limit: MAX_VARLONG_LEN });
        }
    }
    Ok(result as i64)
}

/// Take every remaining byte of the message.
pub fn read_rest_buffer<'p>(buf: &mut &'p [u8]) -> Result<&'p [u8], DecodeError> {
    let rest = *buf;
    *buf = &[];
    Ok(rest)
}
