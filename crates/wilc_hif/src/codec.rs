//! Wire encoding of [`ConfigObject`]s.
//!
//! Every object is `id: le16, kind: u8, len: le16` followed by `len` value bytes. Fixed kinds must carry
//! exactly their width. A query, the body of a `GET` request, is only `id: le16, kind: u8` per object.

use crate::{
    error::CodecError,
    wid::{ConfigObject, Wid, WidKind, WidValue},
};
use alloc::vec::Vec;
use scroll::{Pread, Pwrite, LE};

pub const OBJECT_HEADER_LEN: usize = 5;
pub const QUERY_LEN: usize = 3;

fn too_small(_: scroll::Error) -> CodecError {
    CodecError::BufferTooSmall
}

/// Bytes needed to encode `objects`.
pub fn encoded_len(objects: &[ConfigObject]) -> usize {
    objects.iter().map(|x| OBJECT_HEADER_LEN + x.value.len()).sum()
}

/// Encode `objects` into `dst`, returning bytes written.
pub fn encode_into(objects: &[ConfigObject], dst: &mut [u8]) -> Result<usize, CodecError> {
    let offset = &mut 0;
    for object in objects {
        let len = object.value.len();
        let wire_len = u16::try_from(len).map_err(|_| CodecError::MalformedLength {
            len,
            remaining: u16::MAX.into(),
        })?;
        dst.gwrite_with(object.id.0, offset, LE).map_err(too_small)?;
        dst.gwrite(object.value.kind() as u8, offset)
            .map_err(too_small)?;
        dst.gwrite_with(wire_len, offset, LE).map_err(too_small)?;
        match &object.value {
            WidValue::Bool(x) => dst.gwrite(u8::from(*x), offset),
            WidValue::Char(x) => dst.gwrite(*x, offset),
            WidValue::Short(x) => dst.gwrite_with(*x, offset, LE),
            WidValue::Int(x) => dst.gwrite_with(*x, offset, LE),
            WidValue::Str(x) | WidValue::Bin(x) => dst.gwrite(x.as_slice(), offset),
        }
        .map_err(too_small)?;
    }
    log::trace!("encoded {} objects into {offset} bytes", objects.len());
    Ok(*offset)
}

pub fn encode(objects: &[ConfigObject]) -> Result<Vec<u8>, CodecError> {
    let mut out = alloc::vec![0; encoded_len(objects)];
    let len = encode_into(objects, &mut out)?;
    out.truncate(len);
    Ok(out)
}

fn need(from: &[u8], offset: usize, len: usize) -> Result<(), CodecError> {
    let remaining = from.len().saturating_sub(offset);
    if len > remaining {
        return Err(CodecError::MalformedLength { len, remaining });
    }
    Ok(())
}

/// Decode one object at `offset`, advancing it.
pub fn decode_one(from: &[u8], offset: &mut usize) -> Result<ConfigObject, CodecError> {
    need(from, *offset, OBJECT_HEADER_LEN)?;
    let id: u16 = from.gread_with(offset, LE).map_err(too_small)?;
    let kind = WidKind::try_from(from.gread::<u8>(offset).map_err(too_small)?)?;
    let len = from.gread_with::<u16>(offset, LE).map_err(too_small)? as usize;
    need(from, *offset, len)?;

    match kind.width() {
        Some(expected) if expected != len => {
            return Err(CodecError::WidthMismatch { id, len, expected });
        }
        _ => {}
    }
    let value = match kind {
        WidKind::Bool => WidValue::Bool(from.gread::<u8>(offset).map_err(too_small)? != 0),
        WidKind::Char => WidValue::Char(from.gread(offset).map_err(too_small)?),
        WidKind::Short => WidValue::Short(from.gread_with(offset, LE).map_err(too_small)?),
        WidKind::Int => WidValue::Int(from.gread_with(offset, LE).map_err(too_small)?),
        WidKind::Str | WidKind::Bin => {
            let bytes: &[u8] = from.gread_with(offset, len).map_err(too_small)?;
            if kind == WidKind::Str {
                WidValue::Str(bytes.into())
            } else {
                WidValue::Bin(bytes.into())
            }
        }
    };
    Ok(ConfigObject::new(Wid(id), value))
}

/// Decode every object in `from`.
pub fn decode(from: &[u8]) -> Result<Vec<ConfigObject>, CodecError> {
    let offset = &mut 0;
    let mut out = Vec::new();
    while *offset < from.len() {
        out.push(decode_one(from, offset)?);
    }
    Ok(out)
}

pub fn query_len(objects: &[ConfigObject]) -> usize {
    objects.len() * QUERY_LEN
}

/// Encode the ids and kinds of `objects` as a query.
pub fn encode_query_into(objects: &[ConfigObject], dst: &mut [u8]) -> Result<usize, CodecError> {
    let offset = &mut 0;
    for object in objects {
        dst.gwrite_with(object.id.0, offset, LE).map_err(too_small)?;
        dst.gwrite(object.value.kind() as u8, offset)
            .map_err(too_small)?;
    }
    Ok(*offset)
}

/// Decode a query into `(id, kind)` pairs.
pub fn decode_query(from: &[u8]) -> Result<Vec<(Wid, WidKind)>, CodecError> {
    let offset = &mut 0;
    let mut out = Vec::with_capacity(from.len() / QUERY_LEN);
    while *offset < from.len() {
        need(from, *offset, QUERY_LEN)?;
        let id: u16 = from.gread_with(offset, LE).map_err(too_small)?;
        let kind = WidKind::try_from(from.gread::<u8>(offset).map_err(too_small)?)?;
        out.push((Wid(id), kind));
    }
    Ok(out)
}
