//! Decodes one message body into a [`FieldTree`], given the [`MessageSchema`]
//! the header decoder resolved.
//!
//! Design Note ("Schema-driven decoding"): `decode_field` dispatches on the
//! [`DataType`] tagged sum rather than walking a type hierarchy; arrays and
//! nested messages recurse through the same entry point.

use crate::db::{DataType, Database, FieldDefinition, MessageSchema};
use crate::field::{FieldContainer, FieldTree, FieldValue};
use crate::header::CommonHeader;
use crate::{Error, Result};
use std::sync::Arc;

/// Which wire representation to decode a body from. Binary is byte-offset
/// driven; the two ASCII variants are comma-token driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Binary,
    Ascii,
}

#[derive(Debug, Default)]
pub struct MessageDecoder;

impl MessageDecoder {
    pub fn new() -> Self {
        MessageDecoder
    }

    pub fn decode(
        &self,
        db: &Database,
        header: &CommonHeader,
        body: &[u8],
        encoding: BodyEncoding,
    ) -> Result<FieldTree> {
        let definition = db
            .get(header.message_id)
            .ok_or_else(|| Error::missing_id(header.message_id))?;
        let schema = definition
            .schema_for_version(header.schema_version)
            .ok_or_else(|| Error::missing_id(header.message_id))?;

        match encoding {
            BodyEncoding::Binary => {
                let mut cursor = Cursor::new(body);
                decode_binary_schema(db, schema, &mut cursor)
            }
            BodyEncoding::Ascii => {
                let text = std::str::from_utf8(body)
                    .map_err(|e| Error::malformed(format!("body is not valid utf-8: {e}")))?;
                let mut tokens = split_ascii_tokens(text).into_iter();
                decode_ascii_schema(db, schema, &mut tokens)
            }
        }
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(Error::malformed("body ended before schema was satisfied"));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

fn decode_binary_schema(db: &Database, schema: &MessageSchema, cursor: &mut Cursor) -> Result<FieldTree> {
    let mut fields = Vec::with_capacity(schema.len());
    for def in schema {
        let value = decode_binary_field(db, def, cursor)?;
        fields.push(FieldContainer::new(Arc::new(def.clone()), value));
    }
    Ok(FieldTree::new(fields))
}

fn decode_binary_field(db: &Database, def: &FieldDefinition, cursor: &mut Cursor) -> Result<FieldValue> {
    match def.data_type {
        DataType::Bool => Ok(FieldValue::Bool(cursor.take(1)?[0] != 0)),
        DataType::Char => Ok(FieldValue::Char(cursor.take(1)?[0] as i8)),
        DataType::U8 => Ok(FieldValue::U8(cursor.take(1)?[0])),
        DataType::I8 => Ok(FieldValue::I8(cursor.take(1)?[0] as i8)),
        DataType::U16 => Ok(FieldValue::U16(u16::from_le_bytes(cursor.take(2)?.try_into().unwrap()))),
        DataType::I16 => Ok(FieldValue::I16(i16::from_le_bytes(cursor.take(2)?.try_into().unwrap()))),
        DataType::U32 => Ok(FieldValue::U32(u32::from_le_bytes(cursor.take(4)?.try_into().unwrap()))),
        DataType::I32 => Ok(FieldValue::I32(i32::from_le_bytes(cursor.take(4)?.try_into().unwrap()))),
        DataType::U64 => Ok(FieldValue::U64(u64::from_le_bytes(cursor.take(8)?.try_into().unwrap()))),
        DataType::I64 => Ok(FieldValue::I64(i64::from_le_bytes(cursor.take(8)?.try_into().unwrap()))),
        DataType::Float => Ok(FieldValue::Float(f32::from_le_bytes(cursor.take(4)?.try_into().unwrap()))),
        DataType::Double => Ok(FieldValue::Double(f64::from_le_bytes(cursor.take(8)?.try_into().unwrap()))),
        DataType::Enum => {
            let raw = i32::from_le_bytes(cursor.take(4)?.try_into().unwrap());
            let name = def
                .enum_id
                .as_deref()
                .and_then(|id| db.get_enum(id))
                .and_then(|e| e.name_of(raw))
                .map(str::to_string);
            Ok(FieldValue::Enum(raw, name))
        }
        DataType::StringT => {
            let len = def.array_length.map(|n| n as usize).unwrap_or(cursor.remaining());
            let raw = cursor.take(len)?;
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            let s = String::from_utf8_lossy(&raw[..end]).into_owned();
            Ok(FieldValue::StringT(s))
        }
        DataType::FixedArray => {
            let count = def.array_length.ok_or_else(|| {
                Error::malformed(format!("{}: FIXED_ARRAY without arrayLength", def.name))
            })? as usize;
            let element = def.element.as_deref().ok_or_else(|| {
                Error::malformed(format!("{}: FIXED_ARRAY without element type", def.name))
            })?;
            decode_array(db, element, cursor, count)
        }
        DataType::VarArray => {
            let count = u32::from_le_bytes(cursor.take(4)?.try_into().unwrap()) as usize;
            let max = def.array_length.unwrap_or(u32::MAX) as usize;
            if count > max {
                return Err(Error::malformed(format!(
                    "{}: VAR_ARRAY count {count} exceeds declared maximum {max}",
                    def.name
                )));
            }
            let element = def.element.as_deref().ok_or_else(|| {
                Error::malformed(format!("{}: VAR_ARRAY without element type", def.name))
            })?;
            decode_array(db, element, cursor, count)
        }
        DataType::Nested => {
            let nested_id = def.nested_message_id.ok_or_else(|| {
                Error::malformed(format!("{}: NESTED without nestedMessageId", def.name))
            })?;
            let nested_def = db.get(nested_id).ok_or(Error::missing_id(nested_id))?;
            let nested_schema = nested_def
                .schema_for_version(0)
                .ok_or(Error::missing_id(nested_id))?;
            let tree = decode_binary_schema(db, nested_schema, cursor)?;
            Ok(FieldValue::Nested(Box::new(tree)))
        }
    }
}

fn decode_array(db: &Database, element: &FieldDefinition, cursor: &mut Cursor, count: usize) -> Result<FieldValue> {
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        let value = decode_binary_field(db, element, cursor)?;
        items.push(FieldContainer::new(Arc::new(element.clone()), value));
    }
    Ok(FieldValue::Sequence(items))
}

/// Splits a comma-separated ASCII body into tokens, respecting bracketed
/// sub-arrays (`a,b,[c,d,e],f`) which nested/array fields consume whole.
fn split_ascii_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            ',' if depth == 0 => {
                tokens.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    tokens.push(&text[start..]);
    tokens
}

fn decode_ascii_schema<'a>(
    db: &Database,
    schema: &MessageSchema,
    tokens: &mut impl Iterator<Item = &'a str>,
) -> Result<FieldTree> {
    let mut fields = Vec::with_capacity(schema.len());
    for def in schema {
        let value = decode_ascii_field(db, def, tokens)?;
        fields.push(FieldContainer::new(Arc::new(def.clone()), value));
    }
    Ok(FieldTree::new(fields))
}

fn next_token<'a>(def: &FieldDefinition, tokens: &mut impl Iterator<Item = &'a str>) -> Result<&'a str> {
    tokens
        .next()
        .map(str::trim)
        .ok_or_else(|| Error::malformed(format!("{}: ran out of comma-separated tokens", def.name)))
}

fn decode_ascii_field<'a>(
    db: &Database,
    def: &FieldDefinition,
    tokens: &mut impl Iterator<Item = &'a str>,
) -> Result<FieldValue> {
    let parse_err = |def: &FieldDefinition, tok: &str| {
        Error::malformed(format!("{}: could not parse {tok:?}", def.name))
    };

    match def.data_type {
        DataType::Bool => {
            let tok = next_token(def, tokens)?;
            Ok(FieldValue::Bool(tok.eq_ignore_ascii_case("true") || tok == "1"))
        }
        DataType::Char => {
            let tok = next_token(def, tokens)?;
            Ok(FieldValue::Char(tok.parse().map_err(|_| parse_err(def, tok))?))
        }
        DataType::U8 => {
            let tok = next_token(def, tokens)?;
            Ok(FieldValue::U8(tok.parse().map_err(|_| parse_err(def, tok))?))
        }
        DataType::I8 => {
            let tok = next_token(def, tokens)?;
            Ok(FieldValue::I8(tok.parse().map_err(|_| parse_err(def, tok))?))
        }
        DataType::U16 => {
            let tok = next_token(def, tokens)?;
            Ok(FieldValue::U16(tok.parse().map_err(|_| parse_err(def, tok))?))
        }
        DataType::I16 => {
            let tok = next_token(def, tokens)?;
            Ok(FieldValue::I16(tok.parse().map_err(|_| parse_err(def, tok))?))
        }
        DataType::U32 => {
            let tok = next_token(def, tokens)?;
            Ok(FieldValue::U32(tok.parse().map_err(|_| parse_err(def, tok))?))
        }
        DataType::I32 => {
            let tok = next_token(def, tokens)?;
            Ok(FieldValue::I32(tok.parse().map_err(|_| parse_err(def, tok))?))
        }
        DataType::U64 => {
            let tok = next_token(def, tokens)?;
            Ok(FieldValue::U64(tok.parse().map_err(|_| parse_err(def, tok))?))
        }
        DataType::I64 => {
            let tok = next_token(def, tokens)?;
            Ok(FieldValue::I64(tok.parse().map_err(|_| parse_err(def, tok))?))
        }
        DataType::Float => {
            let tok = next_token(def, tokens)?;
            Ok(FieldValue::Float(tok.parse().map_err(|_| parse_err(def, tok))?))
        }
        DataType::Double => {
            let tok = next_token(def, tokens)?;
            Ok(FieldValue::Double(tok.parse().map_err(|_| parse_err(def, tok))?))
        }
        DataType::Enum => {
            let tok = next_token(def, tokens)?;
            let enum_def = def.enum_id.as_deref().and_then(|id| db.get_enum(id));
            if let Ok(raw) = tok.parse::<i32>() {
                let name = enum_def.and_then(|e| e.name_of(raw)).map(str::to_string);
                Ok(FieldValue::Enum(raw, name))
            } else {
                let raw = enum_def
                    .and_then(|e| e.value_of(tok))
                    .ok_or_else(|| parse_err(def, tok))?;
                Ok(FieldValue::Enum(raw, Some(tok.to_string())))
            }
        }
        DataType::StringT => {
            let tok = next_token(def, tokens)?;
            Ok(FieldValue::StringT(tok.trim_matches('"').to_string()))
        }
        DataType::FixedArray | DataType::VarArray => {
            let tok = next_token(def, tokens)?;
            let inner = tok.trim().trim_start_matches('[').trim_end_matches(']');
            let element = def.element.as_deref().ok_or_else(|| {
                Error::malformed(format!("{}: array field without element type", def.name))
            })?;
            let max = def.array_length.unwrap_or(u32::MAX) as usize;
            let mut inner_tokens = split_ascii_tokens(inner).into_iter();
            let mut items = Vec::new();
            while let Some(t) = inner_tokens.clone().next() {
                if t.is_empty() {
                    break;
                }
                if items.len() >= max {
                    return Err(Error::malformed(format!(
                        "{}: array count exceeds declared maximum {max}",
                        def.name
                    )));
                }
                let value = decode_ascii_field(db, element, &mut inner_tokens)?;
                items.push(FieldContainer::new(Arc::new(element.clone()), value));
            }
            Ok(FieldValue::Sequence(items))
        }
        DataType::Nested => {
            let nested_id = def.nested_message_id.ok_or_else(|| {
                Error::malformed(format!("{}: NESTED without nestedMessageId", def.name))
            })?;
            let nested_def = db.get(nested_id).ok_or(Error::missing_id(nested_id))?;
            let nested_schema = nested_def
                .schema_for_version(0)
                .ok_or(Error::missing_id(nested_id))?;
            let tree = decode_ascii_schema(db, nested_schema, tokens)?;
            Ok(FieldValue::Nested(Box::new(tree)))
        }
    }
}
