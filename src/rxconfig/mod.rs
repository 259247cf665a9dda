//! RXCONFIG-family "configuration echo" messages wrap another complete
//! message (its own header, body, and CRC) as their payload. This handler
//! extracts that inner frame and re-decodes it, so callers never need a
//! special case for the outer message beyond calling [`RxConfigHandler::unwrap`].

use crate::crc;
use crate::db::Database;
use crate::decode::{BodyEncoding, MessageDecoder};
use crate::field::FieldTree;
use crate::header::{CommonHeader, HeaderDecoder};
use crate::meta::HeaderFormat;
use crate::{Error, Result};

/// The inner message an RXCONFIG-style echo carries, plus whether its own
/// CRC validated. Spec §4.6: inner CRC mismatches surface here while the
/// outer decode remains `SUCCESS`.
#[derive(Debug, Clone)]
pub struct InnerMessage {
    pub header: CommonHeader,
    pub tree: FieldTree,
    pub crc_valid: bool,
}

#[derive(Debug, Default)]
pub struct RxConfigHandler {
    header_decoder: HeaderDecoder,
    message_decoder: MessageDecoder,
}

impl RxConfigHandler {
    pub fn new() -> Self {
        RxConfigHandler {
            header_decoder: HeaderDecoder::new(),
            message_decoder: MessageDecoder::new(),
        }
    }

    /// Unwraps the inner frame carried in `outer_body`, re-decoding it
    /// against `db`. `outer_body` is the already-framed RXCONFIG body: a
    /// complete binary or ASCII frame (sync through CRC) embedded verbatim.
    pub fn unwrap(&self, db: &Database, outer_body: &[u8]) -> Result<InnerMessage> {
        let (inner_frame, format) = locate_inner_frame(outer_body)?;

        match format {
            HeaderFormat::Binary | HeaderFormat::ShortBinary => self.unwrap_binary(db, inner_frame, format),
            HeaderFormat::Ascii | HeaderFormat::AbbAscii => self.unwrap_ascii(db, inner_frame, format),
            _ => Err(Error::unsupported("rxconfig inner frame is neither binary nor ascii")),
        }
    }

    fn unwrap_binary(&self, db: &Database, frame: &[u8], format: HeaderFormat) -> Result<InnerMessage> {
        let header_length = if format == HeaderFormat::ShortBinary { 12 } else { 28 };
        if frame.len() < header_length + 4 {
            return Err(Error::malformed("rxconfig inner binary frame too short"));
        }
        let body_length = frame.len() - header_length - 4;
        let body = &frame[header_length..header_length + body_length];

        let crc_stored = u32::from_le_bytes(frame[frame.len() - 4..].try_into().unwrap());
        let crc_valid = crc::crc32(&frame[..frame.len() - 4]) == crc_stored;

        let message_id = u16::from_le_bytes([frame[4], frame[5]]);
        let mut meta = crate::meta::MetaData::new(frame.len(), header_length)?;
        meta.message_id = message_id;
        meta.format = format;
        if format == HeaderFormat::Binary {
            meta.time_status =
                crate::meta::TimeStatus::try_from(u32::from(frame[13])).unwrap_or_default();
            meta.time.week = u16::from_le_bytes([frame[14], frame[15]]);
            meta.time.milliseconds = u32::from_le_bytes(frame[16..20].try_into().unwrap());
        }

        let header = self.header_decoder.decode(db, &meta)?;
        let tree = if crc_valid {
            self.message_decoder.decode(db, &header, body, BodyEncoding::Binary)?
        } else {
            return Ok(InnerMessage {
                header,
                tree: FieldTree::default(),
                crc_valid: false,
            });
        };
        Ok(InnerMessage {
            header,
            tree,
            crc_valid,
        })
    }

    fn unwrap_ascii(&self, db: &Database, frame: &[u8], format: HeaderFormat) -> Result<InnerMessage> {
        let text = std::str::from_utf8(frame)
            .map_err(|e| Error::malformed(format!("rxconfig inner ascii frame is not utf-8: {e}")))?;
        let semi = text
            .find(';')
            .ok_or_else(|| Error::malformed("rxconfig inner ascii frame missing ';'"))?;
        let star = text[semi..]
            .find('*')
            .map(|p| semi + p)
            .ok_or_else(|| Error::malformed("rxconfig inner ascii frame missing '*'"))?;

        let crc_stored = u32::from_str_radix(text[star + 1..star + 9].trim(), 16).ok();
        let crc_valid = crc_stored == Some(crc::crc32(text[1..star].as_bytes()));

        let header_str = &text[1..semi];
        let name_and_format = header_str.split(',').next().unwrap_or("");
        let message_name = if format == HeaderFormat::Ascii {
            name_and_format.strip_suffix('A').unwrap_or(name_and_format).to_string()
        } else {
            name_and_format.to_string()
        };

        let mut meta = crate::meta::MetaData::new(frame.len(), semi + 1)?;
        meta.format = format;
        meta.message_name = message_name;

        let header = self.header_decoder.decode(db, &meta)?;
        if !crc_valid {
            return Ok(InnerMessage {
                header,
                tree: FieldTree::default(),
                crc_valid: false,
            });
        }
        let body = text[semi + 1..star].as_bytes();
        let tree = self.message_decoder.decode(db, &header, body, BodyEncoding::Ascii)?;
        Ok(InnerMessage {
            header,
            tree,
            crc_valid: true,
        })
    }
}

/// Finds the inner frame's sync byte and classifies its format, mirroring
/// the framer's own sync dispatch (spec §4.1) but operating on an
/// already-extracted outer body rather than a live ring buffer.
fn locate_inner_frame(body: &[u8]) -> Result<(&[u8], HeaderFormat)> {
    let start = body
        .iter()
        .position(|&b| b == 0xAA || b == b'#' || b == b'%')
        .ok_or_else(|| Error::malformed("rxconfig body has no embedded frame sync"))?;
    let inner = &body[start..];
    match inner[0] {
        0xAA if inner.len() >= 3 && inner[1] == 0x44 && inner[2] == 0x12 => Ok((inner, HeaderFormat::Binary)),
        0xAA if inner.len() >= 3 && inner[1] == 0x44 && inner[2] == 0x13 => Ok((inner, HeaderFormat::ShortBinary)),
        b'#' => Ok((inner, HeaderFormat::Ascii)),
        b'%' => Ok((inner, HeaderFormat::AbbAscii)),
        _ => Err(Error::malformed("rxconfig body carries an unrecognized inner sync")),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::Database;

    const SAMPLE: &str = r#"
    {
        "messages": [
            { "name": "RXCONFIG", "messageId": 128, "latestMessageCrc": 1, "fields": { "1": [] } },
            { "name": "LOG", "messageId": 1, "latestMessageCrc": 1, "fields": {
                "1": [ { "name": "port", "type": "U32" } ]
            } }
        ],
        "enums": []
    }
    "#;

    fn build_ascii_inner(name: &str, body: &str) -> Vec<u8> {
        let header = format!("{name}A,COM1,0,0.0,FINESTEERING,2200,0.000,02000020,0000,0");
        let mut core = format!("#{header};{body}");
        let crc = crc::crc32(core[1..].as_bytes());
        core.push_str(&format!("*{crc:08x}\r\n"));
        core.into_bytes()
    }

    #[test]
    fn unwraps_inner_ascii_log_command() {
        let db = Database::load(SAMPLE.as_bytes()).unwrap();
        let inner = build_ascii_inner("LOG", "42");
        let mut outer_body = vec![0u8; 4];
        outer_body.extend_from_slice(&inner);

        let handler = RxConfigHandler::new();
        let result = handler.unwrap(&db, &outer_body).unwrap();
        assert!(result.crc_valid);
        assert_eq!(result.header.message_name, "LOG");
        assert_eq!(result.header.format, HeaderFormat::Ascii);
        assert_eq!(result.tree.get("port").unwrap().value.as_i64(), Some(42));
    }

    #[test]
    fn inner_crc_mismatch_surfaces_without_failing() {
        let db = Database::load(SAMPLE.as_bytes()).unwrap();
        let mut inner = build_ascii_inner("LOG", "42");
        let body_byte = inner.len() - 12;
        inner[body_byte] ^= 0x01;
        let handler = RxConfigHandler::new();
        let result = handler.unwrap(&db, &inner).unwrap();
        assert!(!result.crc_valid);
    }

    #[test]
    fn missing_sync_is_malformed() {
        let db = Database::load(SAMPLE.as_bytes()).unwrap();
        let handler = RxConfigHandler::new();
        assert!(handler.unwrap(&db, b"no frame here").is_err());
    }
}
