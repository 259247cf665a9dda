//! The runtime field tree a decoded message body is represented as.

use crate::db::FieldDefinition;
use std::sync::Arc;

/// A tagged union over every value a field can hold. A decoded message owns
/// its field tree exclusively; the tree is a DAG rooted at one
/// [`FieldTree`] whose leaves are scalars (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Char(i8),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Float(f32),
    Double(f64),
    /// Integer value plus the resolved symbolic name, when the enum id was
    /// known at decode time.
    Enum(i32, Option<String>),
    StringT(String),
    Nested(Box<FieldTree>),
    Sequence(Vec<FieldContainer>),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FieldValue::Bool(b) => Some(b as i64),
            FieldValue::Char(v) | FieldValue::I8(v) => Some(v as i64),
            FieldValue::U8(v) => Some(v as i64),
            FieldValue::U16(v) => Some(v as i64),
            FieldValue::U32(v) => Some(v as i64),
            FieldValue::U64(v) => Some(v as i64),
            FieldValue::I16(v) => Some(v as i64),
            FieldValue::I32(v) => Some(v as i64),
            FieldValue::I64(v) => Some(v),
            FieldValue::Enum(v, _) => Some(v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::Float(v) => Some(v as f64),
            FieldValue::Double(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::StringT(s) => Some(s.as_str()),
            FieldValue::Enum(_, Some(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[FieldContainer]> {
        match self {
            FieldValue::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&FieldTree> {
        match self {
            FieldValue::Nested(tree) => Some(tree),
            _ => None,
        }
    }
}

/// One decoded field: its value plus a back-reference to the
/// [`FieldDefinition`] it was decoded from.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldContainer {
    pub def: Arc<FieldDefinition>,
    pub value: FieldValue,
}

impl FieldContainer {
    pub fn new(def: Arc<FieldDefinition>, value: FieldValue) -> Self {
        FieldContainer { def, value }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }
}

/// The ordered list of top-level fields decoded for one message body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTree {
    pub fields: Vec<FieldContainer>,
}

impl FieldTree {
    pub fn new(fields: Vec<FieldContainer>) -> Self {
        FieldTree { fields }
    }

    pub fn get(&self, name: &str) -> Option<&FieldContainer> {
        self.fields.iter().find(|f| f.name() == name)
    }
}
