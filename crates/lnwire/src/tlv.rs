//! TLV streams
//!
//! A stream is a sequence of `(type, length, value)` records whose type and
//! length are BigSize varints and whose types are strictly increasing. Records
//! with an unknown even type must be understood by the reader, so decoding
//! aborts on them; unknown odd types are skipped.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

/// Record type
pub type Type = u64;

/// Set of record types seen while decoding
pub type TypeSet = BTreeSet<Type>;

/// TLV error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Input ended inside a record
    #[error("Unexpected end of TLV stream")]
    UnexpectedEof,
    /// BigSize value not in its shortest form
    #[error("Non-canonical BigSize encoding")]
    NonCanonical,
    /// Types must strictly increase
    #[error("TLV type `{current}` not greater than previous type `{previous}`")]
    Unordered {
        /// Type of the preceding record
        previous: Type,
        /// Offending type
        current: Type,
    },
    /// Value has the wrong length for its type
    #[error("Invalid length `{length}` for record type `{ty}`")]
    InvalidLength {
        /// Record type
        ty: Type,
        /// Encoded length
        length: usize,
    },
    /// Truncated integer with a leading zero byte
    #[error("Truncated integer for record type `{0}` is not minimally encoded")]
    NonMinimalInteger(Type),
    /// Unknown even type
    #[error("Unknown required type `{0}`")]
    UnknownRequiredType(Type),
}

/// Read a BigSize varint from the front of `input`, advancing it
pub fn read_big_size(input: &mut &[u8]) -> Result<u64, Error> {
    let (&first, rest) = input.split_first().ok_or(Error::UnexpectedEof)?;
    *input = rest;

    let (width, min) = match first {
        0xfd => (2, 0xfd),
        0xfe => (4, 0x1_0000),
        0xff => (8, 0x1_0000_0000),
        small => return Ok(small as u64),
    };

    if input.len() < width {
        return Err(Error::UnexpectedEof);
    }
    let (bytes, rest) = input.split_at(width);
    *input = rest;

    let value = bytes
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | *byte as u64);

    if value < min {
        return Err(Error::NonCanonical);
    }

    Ok(value)
}

/// Append `value` as a BigSize varint
pub fn write_big_size(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => out.push(value as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u16).to_be_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(value as u32).to_be_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&value.to_be_bytes());
        }
    }
}

/// Decode a truncated unsigned integer of at most `max_len` bytes
fn read_truncated(ty: Type, value: &[u8], max_len: usize) -> Result<u64, Error> {
    if value.len() > max_len {
        return Err(Error::InvalidLength {
            ty,
            length: value.len(),
        });
    }
    if value.first() == Some(&0) {
        return Err(Error::NonMinimalInteger(ty));
    }

    Ok(value
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | *byte as u64))
}

/// Decode a truncated `u64` (`tu64`)
pub fn read_tu64(ty: Type, value: &[u8]) -> Result<u64, Error> {
    read_truncated(ty, value, 8)
}

/// Decode a truncated `u32` (`tu32`)
pub fn read_tu32(ty: Type, value: &[u8]) -> Result<u32, Error> {
    read_truncated(ty, value, 4).map(|v| v as u32)
}

/// Decode a fixed width big-endian `u64`
pub fn read_u64(ty: Type, value: &[u8]) -> Result<u64, Error> {
    let bytes: [u8; 8] = value.try_into().map_err(|_| Error::InvalidLength {
        ty,
        length: value.len(),
    })?;
    Ok(u64::from_be_bytes(bytes))
}

fn truncated_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    bytes[skip..].to_vec()
}

/// A decoded stream holding the value of every known record
#[derive(Debug, Clone, Default)]
pub struct Stream<'a> {
    records: BTreeMap<Type, &'a [u8]>,
}

impl<'a> Stream<'a> {
    /// Decode `bytes`, keeping values for the types listed in `known`.
    pub fn decode(bytes: &'a [u8], known: &[Type]) -> Result<Self, Error> {
        let (stream, result) = Self::decode_partial(bytes, known);
        result.map(|()| stream)
    }

    /// Decode `bytes`, returning the records read before any failure together
    /// with the failure itself.
    ///
    /// Callers that must inspect the known records even when an unknown even
    /// type aborts decoding use this instead of [`Stream::decode`].
    pub fn decode_partial(mut bytes: &'a [u8], known: &[Type]) -> (Self, Result<(), Error>) {
        let mut stream = Self::default();
        let mut previous: Option<Type> = None;

        while !bytes.is_empty() {
            let ty = match read_big_size(&mut bytes) {
                Ok(ty) => ty,
                Err(e) => return (stream, Err(e)),
            };
            if let Some(previous) = previous {
                if ty <= previous {
                    return (
                        stream,
                        Err(Error::Unordered {
                            previous,
                            current: ty,
                        }),
                    );
                }
            }
            previous = Some(ty);

            let length = match read_big_size(&mut bytes).map(usize::try_from) {
                Ok(Ok(length)) if length <= bytes.len() => length,
                Ok(_) => return (stream, Err(Error::UnexpectedEof)),
                Err(e) => return (stream, Err(e)),
            };
            let (value, rest) = bytes.split_at(length);
            bytes = rest;

            if known.contains(&ty) {
                stream.records.insert(ty, value);
            } else if ty % 2 == 0 {
                return (stream, Err(Error::UnknownRequiredType(ty)));
            }
        }

        (stream, Ok(()))
    }

    /// Types of the known records present
    pub fn parsed_types(&self) -> TypeSet {
        self.records.keys().copied().collect()
    }

    /// Value of record `ty`, if present
    pub fn get(&self, ty: Type) -> Option<&'a [u8]> {
        self.records.get(&ty).copied()
    }
}

/// Builds a TLV stream, enforcing increasing types
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
    last: Option<Type>,
}

impl Writer {
    /// Create new [`Writer`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw record
    pub fn put(&mut self, ty: Type, value: &[u8]) -> Result<&mut Self, Error> {
        if let Some(previous) = self.last {
            if ty <= previous {
                return Err(Error::Unordered {
                    previous,
                    current: ty,
                });
            }
        }
        self.last = Some(ty);

        write_big_size(&mut self.buf, ty);
        write_big_size(&mut self.buf, value.len() as u64);
        self.buf.extend_from_slice(value);

        Ok(self)
    }

    /// Append a truncated integer record
    pub fn put_truncated(&mut self, ty: Type, value: u64) -> Result<&mut Self, Error> {
        self.put(ty, &truncated_bytes(value))
    }

    /// Append a fixed width `u64` record
    pub fn put_u64(&mut self, ty: Type, value: u64) -> Result<&mut Self, Error> {
        self.put(ty, &value.to_be_bytes())
    }

    /// Encoded stream
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
