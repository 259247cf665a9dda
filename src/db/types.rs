use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The closed set of scalar and structural data types a field can declare.
/// A tagged sum rather than a runtime type hierarchy (Design Note:
/// "Schema-driven decoding ... a tagged sum over the finite data-type set").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Bool,
    Char,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    Float,
    Double,
    Enum,
    FixedArray,
    VarArray,
    Nested,
    StringT,
}

impl DataType {
    /// Fixed wire width in bytes for binary decoding, when the type has one
    /// independent of any array/nested structure.
    pub fn fixed_width(self) -> Option<usize> {
        use DataType::*;
        match self {
            Bool | Char | U8 | I8 => Some(1),
            U16 | I16 => Some(2),
            U32 | I32 | Float | Enum => Some(4),
            U64 | I64 | Double => Some(8),
            FixedArray | VarArray | Nested | StringT => None,
        }
    }
}

/// Parsed ASCII formatting hint, e.g. `%13.8lf` -> `{ spec: 'f', width: Some(13), precision: Some(8) }`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversion {
    pub spec: char,
    pub width: Option<u32>,
    pub precision: Option<u32>,
}

impl Conversion {
    /// Parses a printf-style conversion string as used by the NovAtel
    /// message database (`%d`, `%4.1f`, `%13.8lf`, `%s`, ...).
    pub fn parse(s: &str) -> Option<Conversion> {
        let s = s.strip_prefix('%')?;
        let spec_char = s.chars().last()?;
        let body = &s[..s.len() - spec_char.len_utf8()];
        // strip length modifiers such as "l", "ll", "h"
        let body = body.trim_end_matches(['l', 'h']);
        let (width_str, precision_str) = match body.split_once('.') {
            Some((w, p)) => (w, Some(p)),
            None => (body, None),
        };
        let width = width_str.parse::<u32>().ok();
        let precision = precision_str.and_then(|p| p.parse::<u32>().ok());
        Some(Conversion {
            spec: spec_char,
            width,
            precision,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub data_type: DataType,
    pub conversion: Option<Conversion>,
    pub description: Option<String>,
    /// Declared maximum length for `FixedArray`/`VarArray` fields.
    pub array_length: Option<u32>,
    /// For `Enum` fields, the name of the referenced [`EnumDefinition`].
    pub enum_id: Option<String>,
    /// For `Nested` fields, the numeric id of the referenced message.
    pub nested_message_id: Option<u16>,
    /// For `FixedArray`/`VarArray` fields, the definition of one element.
    pub element: Option<Box<FieldDefinition>>,
}

pub type MessageSchema = Vec<FieldDefinition>;

#[derive(Debug, Clone)]
pub struct MessageDefinition {
    pub id: u16,
    pub name: String,
    pub crc: u32,
    pub schemas: BTreeMap<u16, MessageSchema>,
}

impl MessageDefinition {
    /// The schema for the highest version number not exceeding `version`,
    /// falling back to the latest known schema. NovAtel receivers only ever
    /// increase message versions, so "latest we know that's <= requested"
    /// is the correct compatibility rule.
    pub fn schema_for_version(&self, version: u16) -> Option<&MessageSchema> {
        self.schemas
            .range(..=version)
            .next_back()
            .map(|(_, schema)| schema)
            .or_else(|| self.schemas.values().next_back())
    }
}

#[derive(Debug, Clone)]
pub struct EnumDefinition {
    pub name: String,
    pub entries: Vec<(String, i32)>,
}

impl EnumDefinition {
    pub fn value_of(&self, name: &str) -> Option<i32> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn name_of(&self, value: i32) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }
}

// --- on-disk document shapes, deserialized then lowered into the types above ---

#[derive(Debug, Deserialize)]
pub(crate) struct DatabaseDocument {
    #[serde(default)]
    pub messages: Vec<MessageDefinitionDoc>,
    #[serde(default)]
    pub enums: Vec<EnumDefinitionDoc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageDefinitionDoc {
    pub name: String,
    #[serde(rename = "messageId")]
    pub message_id: u16,
    #[serde(rename = "latestMessageCrc")]
    pub latest_message_crc: u32,
    pub fields: BTreeMap<String, Vec<FieldDefinitionDoc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FieldDefinitionDoc {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(rename = "arrayLength", default)]
    pub array_length: Option<u32>,
    #[serde(rename = "conversionString", default)]
    pub conversion_string: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "enumId", default)]
    pub enum_id: Option<String>,
    #[serde(rename = "nestedMessageId", default)]
    pub nested_message_id: Option<u16>,
    #[serde(default)]
    pub element: Option<Box<FieldDefinitionDoc>>,
}

impl From<FieldDefinitionDoc> for FieldDefinition {
    fn from(doc: FieldDefinitionDoc) -> Self {
        FieldDefinition {
            name: doc.name,
            data_type: doc.data_type,
            conversion: doc.conversion_string.as_deref().and_then(Conversion::parse),
            description: doc.description,
            array_length: doc.array_length,
            enum_id: doc.enum_id,
            nested_message_id: doc.nested_message_id,
            element: doc.element.map(|e| Box::new(FieldDefinition::from(*e))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnumDefinitionDoc {
    pub name: String,
    pub entries: Vec<EnumEntryDoc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnumEntryDoc {
    pub name: String,
    pub value: i32,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_plain_int_conversion() {
        let c = Conversion::parse("%d").unwrap();
        assert_eq!(c.spec, 'd');
        assert_eq!(c.width, None);
        assert_eq!(c.precision, None);
    }

    #[test]
    fn parses_width_precision_with_length_modifier() {
        let c = Conversion::parse("%13.8lf").unwrap();
        assert_eq!(c.spec, 'f');
        assert_eq!(c.width, Some(13));
        assert_eq!(c.precision, Some(8));
    }

    #[test]
    fn schema_for_version_falls_back_to_latest() {
        let mut schemas = BTreeMap::new();
        schemas.insert(1u16, vec![]);
        schemas.insert(3u16, vec![]);
        let def = MessageDefinition {
            id: 42,
            name: "BESTPOS".into(),
            crc: 0,
            schemas,
        };
        assert!(def.schema_for_version(2).is_some());
        assert!(def.schema_for_version(99).is_some());
    }
}
