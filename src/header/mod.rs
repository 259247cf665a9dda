//! Resolves a framed message's id/name pair against the [`Database`] and
//! produces the header facts the decoder and encoder both key off.

use crate::db::Database;
use crate::meta::{GpsTime, HeaderFormat, MeasurementSource, MetaData, TimeStatus};
use crate::{Error, Result};

/// Everything downstream decoding needs about one message's header, after
/// cross-resolving the framer's raw [`MetaData`] against the database.
#[derive(Debug, Clone)]
pub struct CommonHeader {
    pub message_id: u16,
    pub message_name: String,
    pub format: HeaderFormat,
    pub time: GpsTime,
    pub time_status: TimeStatus,
    pub source: MeasurementSource,
    pub response: bool,
    pub header_length: usize,
    pub frame_length: usize,
    /// The schema version to decode the body against. NovAtel wire headers
    /// don't carry an explicit version field, so this is always the latest
    /// schema known to the database (`MessageDefinition::schema_for_version`
    /// resolves `0` to "latest").
    pub schema_version: u16,
}

#[derive(Debug, Default)]
pub struct HeaderDecoder;

impl HeaderDecoder {
    pub fn new() -> Self {
        HeaderDecoder
    }

    /// Cross-resolves `meta` (as produced by the framer) against `db`,
    /// filling in whichever of id/name the wire format didn't carry.
    ///
    /// NMEA and opaque JSON frames have no database entry by design (spec
    /// §4.3 Non-goals exclude NMEA sentence parsing); those formats resolve
    /// with `message_id = 0` and the sentence/format-derived name left as-is,
    /// never `MissingDefinition`.
    pub fn decode(&self, db: &Database, meta: &MetaData) -> Result<CommonHeader> {
        if matches!(meta.format, HeaderFormat::Nmea | HeaderFormat::Json) {
            return Ok(CommonHeader {
                message_id: meta.message_id,
                message_name: meta.message_name.clone(),
                format: meta.format,
                time: meta.time,
                time_status: meta.time_status,
                source: meta.source,
                response: meta.response,
                header_length: meta.header_length,
                frame_length: meta.frame_length,
                schema_version: 0,
            });
        }

        let (message_id, message_name) = if !meta.message_name.is_empty() {
            let id = db
                .id_for_name(&meta.message_name)
                .ok_or_else(|| Error::missing_name(meta.message_name.clone()))?;
            (id, meta.message_name.clone())
        } else {
            let def = db
                .get(meta.message_id)
                .ok_or_else(|| Error::missing_id(meta.message_id))?;
            (meta.message_id, def.name.clone())
        };

        Ok(CommonHeader {
            message_id,
            message_name,
            format: meta.format,
            time: meta.time,
            time_status: meta.time_status,
            source: meta.source,
            response: meta.response,
            header_length: meta.header_length,
            frame_length: meta.frame_length,
            schema_version: 0,
        })
    }
}
