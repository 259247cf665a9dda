//! Re-serializes a decoded [`FieldTree`] back to one of the wire encodings.
//!
//! Round-trip guarantee (spec §4.6): `decode(encode(x)) == x` for any `x`
//! this crate decoded itself. Cross-format re-encoding (binary in, ASCII
//! out) is supported since the field tree carries no format-specific state.

use crate::crc;
use crate::db::{DataType, Database, MessageSchema};
use crate::field::{FieldContainer, FieldTree, FieldValue};
use crate::header::CommonHeader;
use crate::meta::HeaderFormat;
use crate::{Error, Result};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Binary,
    ShortBinary,
    Ascii,
    AbbAscii,
    Json,
}

#[derive(Debug, Default)]
pub struct Encoder;

impl Encoder {
    pub fn new() -> Self {
        Encoder
    }

    pub fn encode(
        &self,
        db: &Database,
        header: &CommonHeader,
        tree: &FieldTree,
        format: OutputFormat,
    ) -> Result<Vec<u8>> {
        let definition = db
            .get(header.message_id)
            .ok_or_else(|| Error::missing_id(header.message_id))?;
        let schema = definition
            .schema_for_version(header.schema_version)
            .ok_or_else(|| Error::missing_id(header.message_id))?;

        match format {
            OutputFormat::Binary => encode_binary(db, header, schema, tree, false),
            OutputFormat::ShortBinary => encode_binary(db, header, schema, tree, true),
            OutputFormat::Ascii => encode_ascii(header, tree, false),
            OutputFormat::AbbAscii => encode_ascii(header, tree, true),
            OutputFormat::Json => encode_json(header, tree),
        }
    }
}

fn encode_binary(
    db: &Database,
    header: &CommonHeader,
    schema: &MessageSchema,
    tree: &FieldTree,
    short: bool,
) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    encode_binary_fields(db, schema, tree, &mut body)?;

    let mut frame = Vec::new();
    if short {
        frame.extend_from_slice(&[0xAA, 0x44, 0x13]);
        frame.push(body.len() as u8);
        frame.extend_from_slice(&header.message_id.to_le_bytes());
        frame.extend_from_slice(&header.time.week.to_le_bytes());
        frame.extend_from_slice(&header.time.milliseconds.to_le_bytes());
    } else {
        frame.extend_from_slice(&[0xAA, 0x44, 0x12]);
        frame.push(28); // header length
        frame.extend_from_slice(&header.message_id.to_le_bytes());
        frame.push(if header.response { 0x80 } else { 0 });
        frame.push(0); // port address
        frame.extend_from_slice(&(body.len() as u16).to_le_bytes());
        frame.extend_from_slice(&0u16.to_le_bytes()); // sequence
        frame.push(0); // idle time
        frame.push(header.time_status as u8);
        frame.extend_from_slice(&header.time.week.to_le_bytes());
        frame.extend_from_slice(&header.time.milliseconds.to_le_bytes());
        frame.extend_from_slice(&0u32.to_le_bytes()); // receiver status
        frame.extend_from_slice(&0u16.to_le_bytes()); // reserved
        frame.extend_from_slice(&0u16.to_le_bytes()); // sw version
    }
    frame.extend_from_slice(&body);
    let crc = crc::crc32(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

fn encode_binary_fields(db: &Database, schema: &MessageSchema, tree: &FieldTree, out: &mut Vec<u8>) -> Result<()> {
    for def in schema {
        let container = tree
            .get(&def.name)
            .ok_or_else(|| Error::malformed(format!("missing field {}", def.name)))?;
        encode_binary_value(db, &container.value, out)?;
    }
    Ok(())
}

fn encode_binary_value(db: &Database, value: &FieldValue, out: &mut Vec<u8>) -> Result<()> {
    match value {
        FieldValue::Bool(b) => out.push(*b as u8),
        FieldValue::Char(v) => out.push(*v as u8),
        FieldValue::U8(v) => out.push(*v),
        FieldValue::I8(v) => out.push(*v as u8),
        FieldValue::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::I16(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::U64(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
        FieldValue::Enum(raw, _) => out.extend_from_slice(&raw.to_le_bytes()),
        FieldValue::StringT(s) => {
            out.extend_from_slice(s.as_bytes());
            out.push(0);
        }
        FieldValue::Sequence(items) => {
            for item in items {
                encode_binary_value(db, &item.value, out)?;
            }
        }
        FieldValue::Nested(tree) => {
            for field in &tree.fields {
                encode_binary_value(db, &field.value, out)?;
            }
        }
    }
    Ok(())
}

/// Formats one decoded field for ASCII output, consulting
/// `container.def.conversion` for the schema-declared precision
/// floating-point fields must round-trip through (spec §4.4).
fn format_value(container: &FieldContainer) -> String {
    let precision = container.def.conversion.as_ref().and_then(|c| c.precision);
    match &container.value {
        FieldValue::Bool(b) => if *b { "1".to_string() } else { "0".to_string() },
        FieldValue::Char(v) => v.to_string(),
        FieldValue::U8(v) => v.to_string(),
        FieldValue::I8(v) => v.to_string(),
        FieldValue::U16(v) => v.to_string(),
        FieldValue::I16(v) => v.to_string(),
        FieldValue::U32(v) => v.to_string(),
        FieldValue::I32(v) => v.to_string(),
        FieldValue::U64(v) => v.to_string(),
        FieldValue::I64(v) => v.to_string(),
        FieldValue::Float(v) => match precision {
            Some(p) => format!("{:.*}", p as usize, v),
            None => v.to_string(),
        },
        FieldValue::Double(v) => match precision {
            Some(p) => format!("{:.*}", p as usize, v),
            None => v.to_string(),
        },
        FieldValue::Enum(raw, name) => name.clone().unwrap_or_else(|| raw.to_string()),
        FieldValue::StringT(s) => format!("\"{s}\""),
        FieldValue::Sequence(items) => {
            let inner: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", inner.join(","))
        }
        FieldValue::Nested(tree) => {
            let inner: Vec<String> = tree.fields.iter().map(format_value).collect();
            inner.join(",")
        }
    }
}

fn encode_ascii(header: &CommonHeader, tree: &FieldTree, abbreviated: bool) -> Result<Vec<u8>> {
    let sync = if abbreviated { '%' } else { '#' };
    let time_status_name = format!("{:?}", header.time_status).to_uppercase();
    let header_line = format!(
        "{}A,COM1,0,0.0,{},{},{:.3},02000020,0000,0",
        header.message_name, time_status_name, header.time.week, header.time.milliseconds as f64
    );
    let body = tree
        .fields
        .iter()
        .map(format_value)
        .collect::<Vec<_>>()
        .join(",");
    let core = format!("{sync}{header_line};{body}");
    let crc = crc::crc32(core[1..].as_bytes());
    let mut out = core.into_bytes();
    out.extend_from_slice(format!("*{crc:08x}\r\n").as_bytes());
    Ok(out)
}

fn value_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Bool(b) => json!(b),
        FieldValue::Char(v) => json!(v),
        FieldValue::U8(v) => json!(v),
        FieldValue::I8(v) => json!(v),
        FieldValue::U16(v) => json!(v),
        FieldValue::I16(v) => json!(v),
        FieldValue::U32(v) => json!(v),
        FieldValue::I32(v) => json!(v),
        FieldValue::U64(v) => json!(v),
        FieldValue::I64(v) => json!(v),
        FieldValue::Float(v) => json!(v),
        FieldValue::Double(v) => json!(v),
        FieldValue::Enum(raw, name) => json!(name.clone().unwrap_or_else(|| raw.to_string())),
        FieldValue::StringT(s) => json!(s),
        FieldValue::Sequence(items) => Value::Array(items.iter().map(|c| value_to_json(&c.value)).collect()),
        FieldValue::Nested(tree) => tree_to_json(tree),
    }
}

fn tree_to_json(tree: &FieldTree) -> Value {
    let mut map = serde_json::Map::new();
    for field in &tree.fields {
        map.insert(field.name().to_string(), value_to_json(&field.value));
    }
    Value::Object(map)
}

fn encode_json(header: &CommonHeader, tree: &FieldTree) -> Result<Vec<u8>> {
    let doc = json!({
        "header": {
            "messageId": header.message_id,
            "messageName": header.message_name,
            "week": header.time.week,
            "milliseconds": header.time.milliseconds,
            "timeStatus": format!("{:?}", header.time_status),
        },
        "body": tree_to_json(tree),
    });
    serde_json::to_vec(&doc).map_err(Error::from)
}

pub(crate) fn format_to_header_format(format: OutputFormat) -> HeaderFormat {
    match format {
        OutputFormat::Binary => HeaderFormat::Binary,
        OutputFormat::ShortBinary => HeaderFormat::ShortBinary,
        OutputFormat::Ascii => HeaderFormat::Ascii,
        OutputFormat::AbbAscii => HeaderFormat::AbbAscii,
        OutputFormat::Json => HeaderFormat::Json,
    }
}
