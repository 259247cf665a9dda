//! The message database: a JSON-backed schema document loaded once and
//! treated as read-only for the lifetime of the process. The document
//! itself is an external collaborator (spec §1); this module owns only the
//! parsing and the in-memory arena the decoders query against.

mod types;
pub use types::{Conversion, DataType, EnumDefinition, FieldDefinition, MessageDefinition, MessageSchema};

use crate::{Error, Result};
use std::collections::HashMap;
use std::io::Read;
use types::DatabaseDocument;

/// Message and enum definitions, interned by id/name in a flat arena.
///
/// Design Note ("Cyclic references"): nested-message fields refer to other
/// definitions by numeric id (`FieldDefinition::nested_message_id`), never
/// by direct ownership, so a pathological schema where message A nests B and
/// B nests A cannot create a reference cycle in memory — resolving a nested
/// field is always a `HashMap` lookup through [`Database::get`].
#[derive(Debug, Default)]
pub struct Database {
    by_id: HashMap<u16, MessageDefinition>,
    id_by_name: HashMap<String, u16>,
    enums: HashMap<String, EnumDefinition>,
}

impl Database {
    /// Parses a message database document from `reader`. Load failure is
    /// all-or-nothing: a malformed definition anywhere aborts the whole
    /// load rather than yielding a partially usable database.
    pub fn load<R: Read>(reader: R) -> Result<Database> {
        let doc: DatabaseDocument = serde_json::from_reader(reader)
            .map_err(|e| Error::malformed(format!("message database: {e}")))?;

        let mut by_id = HashMap::with_capacity(doc.messages.len());
        let mut id_by_name = HashMap::with_capacity(doc.messages.len());
        for message in doc.messages {
            let id = message.message_id;
            let name = message.name.clone();
            let schemas = message
                .fields
                .into_iter()
                .map(|(version, fields)| {
                    let version: u16 = version
                        .parse()
                        .map_err(|_| Error::malformed(format!("bad schema version {version:?}")))?;
                    let fields = fields.into_iter().map(FieldDefinition::from).collect();
                    Ok((version, fields))
                })
                .collect::<Result<_>>()?;

            by_id.insert(
                id,
                MessageDefinition {
                    id,
                    name: name.clone(),
                    crc: message.latest_message_crc,
                    schemas,
                },
            );
            id_by_name.insert(name, id);
        }

        let mut enums = HashMap::with_capacity(doc.enums.len());
        for e in doc.enums {
            enums.insert(
                e.name.clone(),
                EnumDefinition {
                    name: e.name,
                    entries: e.entries.into_iter().map(|en| (en.name, en.value)).collect(),
                },
            );
        }

        Ok(Database {
            by_id,
            id_by_name,
            enums,
        })
    }

    pub fn get(&self, id: u16) -> Option<&MessageDefinition> {
        self.by_id.get(&id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&MessageDefinition> {
        self.id_by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn id_for_name(&self, name: &str) -> Option<u16> {
        self.id_by_name.get(name).copied()
    }

    pub fn get_enum(&self, name: &str) -> Option<&EnumDefinition> {
        self.enums.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &str = r#"
    {
        "messages": [
            {
                "name": "BESTPOS",
                "messageId": 42,
                "latestMessageCrc": 12345,
                "fields": {
                    "1": [
                        { "name": "sol_status", "type": "ENUM", "enumId": "SOLUTION_STATUS" },
                        { "name": "lat", "type": "DOUBLE", "conversionString": "%12.8lf" }
                    ]
                }
            }
        ],
        "enums": [
            {
                "name": "SOLUTION_STATUS",
                "entries": [
                    { "name": "SOL_COMPUTED", "value": 0 },
                    { "name": "INSUFFICIENT_OBS", "value": 1 }
                ]
            }
        ]
    }
    "#;

    #[test]
    fn loads_messages_and_enums() {
        let db = Database::load(SAMPLE.as_bytes()).unwrap();
        assert_eq!(db.len(), 1);
        let bestpos = db.get(42).unwrap();
        assert_eq!(bestpos.name, "BESTPOS");
        assert_eq!(db.id_for_name("BESTPOS"), Some(42));

        let sol_status = db.get_enum("SOLUTION_STATUS").unwrap();
        assert_eq!(sol_status.value_of("INSUFFICIENT_OBS"), Some(1));
        assert_eq!(sol_status.name_of(0), Some("SOL_COMPUTED"));
    }

    #[test]
    fn rejects_malformed_document() {
        assert!(Database::load("not json".as_bytes()).is_err());
    }

    #[test]
    fn schema_lookup_by_version() {
        let db = Database::load(SAMPLE.as_bytes()).unwrap();
        let bestpos = db.get(42).unwrap();
        let schema = bestpos.schema_for_version(1).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema[0].name, "sol_status");
    }
}
