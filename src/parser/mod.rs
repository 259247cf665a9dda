//! Thin orchestrators: [`Parser`] pipes Framer -> Header Decoder -> Message
//! Decoder -> (optional RangeCmp expansion) -> (optional Filter) -> Encoder;
//! [`FileParser`] additionally owns a byte source and loops `Parser` until a
//! message passes the filter or the source is exhausted.

use crate::db::Database;
use crate::decode::{BodyEncoding, MessageDecoder};
use crate::encode::{Encoder, OutputFormat};
use crate::field::FieldTree;
use crate::framer::{Framer, FramerConfig, FramerStatus};
use crate::header::{CommonHeader, HeaderDecoder};
use crate::meta::{HeaderFormat, MetaData};
use crate::rangecmp::{RangeCmpVariant, RangeDecompressor};
use crate::rxconfig::RxConfigHandler;
use crate::filter::Filter;
use crate::{Error, Result};
use std::sync::Arc;

/// A fully decoded, re-encoded message and the metadata it carries.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    pub meta: MetaData,
    pub header: CommonHeader,
    pub tree: FieldTree,
    pub encoded: Vec<u8>,
}

/// Result of one attempt to pull a message out of the framer.
#[derive(Debug)]
pub enum ParseOutcome {
    /// A frame was decoded, re-encoded, and passed the filter (if any).
    Message(ParsedMessage),
    /// A frame was decoded but the filter rejected it; caller should keep
    /// pumping.
    Filtered(MetaData),
    /// Need more input before another frame can be extracted.
    Incomplete,
    /// Sync was lost; `bytes` is the skipped prefix (only populated when
    /// the framer is configured with `report_unknown_bytes`).
    Unknown(Vec<u8>),
    /// A frame's CRC didn't validate; framing already resynchronized past
    /// it.
    CrcMismatch,
}

const SCRATCH_CAPACITY: usize = 32 * 1024;

/// Maps a RANGECMP-family message name to its bit-packing variant.
fn rangecmp_variant(name: &str) -> Option<RangeCmpVariant> {
    match name {
        "RANGECMP" => Some(RangeCmpVariant::RangeCmp),
        "RANGECMP2" => Some(RangeCmpVariant::RangeCmp2),
        "RANGECMP4" => Some(RangeCmpVariant::RangeCmp4),
        "RANGECMP5" => Some(RangeCmpVariant::RangeCmp5),
        _ => None,
    }
}

pub struct Parser {
    db: Arc<Database>,
    framer: Framer,
    header_decoder: HeaderDecoder,
    message_decoder: MessageDecoder,
    rxconfig: RxConfigHandler,
    rangecmp: Option<RangeDecompressor>,
    filter: Option<Filter>,
    encoder: Encoder,
    output_format: OutputFormat,
    scratch: Vec<u8>,
}

impl Parser {
    pub fn new(db: Arc<Database>, framer_config: FramerConfig, output_format: OutputFormat) -> Self {
        Parser {
            db,
            framer: Framer::new(framer_config),
            header_decoder: HeaderDecoder::new(),
            message_decoder: MessageDecoder::new(),
            rxconfig: RxConfigHandler::new(),
            rangecmp: None,
            filter: None,
            encoder: Encoder::new(),
            output_format,
            scratch: vec![0u8; SCRATCH_CAPACITY],
        }
    }

    /// Enables RANGECMP/2/4/5 expansion into RANGE-shaped output.
    pub fn with_range_decompressor(mut self) -> Self {
        self.rangecmp = Some(RangeDecompressor::new());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Clears the RangeCmp reference table, as required on user request or
    /// after detecting a time discontinuity (spec §3).
    pub fn reset_range_decompressor(&mut self) {
        if let Some(rc) = &mut self.rangecmp {
            rc.reset();
        }
    }

    /// Feeds bytes into the framer's ring; returns the number accepted.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        self.framer.write(bytes)
    }

    /// Attempts to extract and fully process one frame. Never blocks:
    /// returns [`ParseOutcome::Incomplete`] if more input is required.
    pub fn read(&mut self) -> Result<ParseOutcome> {
        let mut out = std::mem::take(&mut self.scratch);
        let (status, meta, len) = self.framer.get_frame(&mut out);
        self.scratch = out;

        let outcome = match status {
            FramerStatus::Incomplete | FramerStatus::IncompleteMoreData => Ok(ParseOutcome::Incomplete),
            FramerStatus::BufferFull => Err(Error::malformed("framer output buffer too small")),
            FramerStatus::Unknown => Ok(ParseOutcome::Unknown(self.scratch[..len].to_vec())),
            FramerStatus::CrcMismatch => Ok(ParseOutcome::CrcMismatch),
            FramerStatus::Success => self.decode_frame(meta, &self.scratch[..len].to_vec()),
        };
        outcome
    }

    fn decode_frame(&mut self, meta: MetaData, frame: &[u8]) -> Result<ParseOutcome> {
        let header = self.header_decoder.decode(&self.db, &meta)?;

        if matches!(header.format, HeaderFormat::Nmea | HeaderFormat::Json) {
            // Non-database formats pass through as opaque bytes (spec's
            // Non-goal excludes NMEA sentence parsing; JSON input is
            // already self-describing).
            if let Some(filter) = &self.filter {
                if !filter.do_filtering(&meta) {
                    return Ok(ParseOutcome::Filtered(meta));
                }
            }
            return Ok(ParseOutcome::Message(ParsedMessage {
                meta,
                header,
                tree: FieldTree::default(),
                encoded: frame.to_vec(),
            }));
        }

        let body_encoding = match header.format {
            HeaderFormat::Binary | HeaderFormat::ShortBinary => BodyEncoding::Binary,
            _ => BodyEncoding::Ascii,
        };
        let header_length = header.header_length;
        let body = &frame[header_length..frame.len().saturating_sub(crc_suffix_len(header.format))];

        let (header, tree) = if header.message_name == "RXCONFIG" {
            let inner = self.rxconfig.unwrap(&self.db, body)?;
            (inner.header, inner.tree)
        } else if let Some(variant) = rangecmp_variant(&header.message_name) {
            let decompressor = self
                .rangecmp
                .as_mut()
                .ok_or_else(|| Error::unsupported(format!("{}: no RangeCmp decompressor configured", header.message_name)))?;
            let observations = decompressor.expand_body(variant, body)?;
            let range_def = self
                .db
                .get_by_name("RANGE")
                .and_then(|def| def.schema_for_version(0))
                .and_then(|schema| schema.first())
                .ok_or_else(|| Error::missing_name("RANGE"))?;
            let tree = RangeDecompressor::as_field_tree(&observations, range_def);
            let mut range_header = header;
            if let Some(id) = self.db.id_for_name("RANGE") {
                range_header.message_id = id;
            }
            range_header.message_name = "RANGE".to_string();
            (range_header, tree)
        } else {
            let tree = self.message_decoder.decode(&self.db, &header, body, body_encoding)?;
            (header, tree)
        };

        if let Some(filter) = &self.filter {
            if !filter.do_filtering(&meta) {
                return Ok(ParseOutcome::Filtered(meta));
            }
        }

        let encoded = self.encoder.encode(&self.db, &header, &tree, self.output_format)?;
        Ok(ParseOutcome::Message(ParsedMessage {
            meta,
            header,
            tree,
            encoded,
        }))
    }
}

fn crc_suffix_len(format: HeaderFormat) -> usize {
    match format {
        HeaderFormat::Binary | HeaderFormat::ShortBinary => 4,
        HeaderFormat::Ascii | HeaderFormat::AbbAscii => 11, // '*' + 8 hex digits + CRLF
        _ => 0,
    }
}

/// The byte-source contract (spec §6): `read(buf) -> (n_read, eof)`, no seek
/// required. Blanket-implemented for anything that's `std::io::Read`, the
/// way the teacher treats its transport socket without inventing a bespoke
/// trait for the synchronous path.
pub trait ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<(usize, bool)>;
}

impl<T: std::io::Read> ByteSource for T {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<(usize, bool)> {
        let n = std::io::Read::read(self, buf)?;
        Ok((n, n == 0))
    }
}

/// Owns a [`Parser`] plus a [`ByteSource`]. Each `read()` loops internally,
/// pulling more bytes and draining the framer, until a message passes the
/// filter or the source is exhausted.
pub struct FileParser<R> {
    parser: Parser,
    source: R,
    pull_buf: Vec<u8>,
    eof: bool,
}

impl<R: ByteSource> FileParser<R> {
    pub fn new(parser: Parser, source: R) -> Self {
        FileParser {
            parser,
            source,
            pull_buf: vec![0u8; SCRATCH_CAPACITY],
            eof: false,
        }
    }

    pub fn parser_mut(&mut self) -> &mut Parser {
        &mut self.parser
    }

    /// Returns the next message that passes the filter, surfacing
    /// transient per-message errors without aborting the stream (spec
    /// §4.8 failure policy) and terminating with `StreamEmpty` once the
    /// source is exhausted and no more frames can be produced.
    pub fn read(&mut self) -> Result<ParsedMessage> {
        loop {
            match self.parser.read() {
                Ok(ParseOutcome::Message(m)) => return Ok(m),
                Ok(ParseOutcome::Filtered(_)) => continue,
                Ok(ParseOutcome::Unknown(_)) | Ok(ParseOutcome::CrcMismatch) => continue,
                Ok(ParseOutcome::Incomplete) => {
                    if self.eof {
                        return Err(Error::StreamEmpty);
                    }
                    let (n, eof) = self
                        .source
                        .read(&mut self.pull_buf)
                        .map_err(Error::from)?;
                    if n > 0 {
                        self.parser.write(&self.pull_buf[..n]);
                    }
                    if eof {
                        self.eof = true;
                        if n == 0 {
                            return Err(Error::StreamEmpty);
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crc;
    use crate::meta::TimeStatus;
    use std::io::Cursor;

    const SAMPLE: &str = r#"
    {
        "messages": [
            {
                "name": "BESTPOS",
                "messageId": 42,
                "latestMessageCrc": 1,
                "fields": { "1": [ { "name": "lat", "type": "DOUBLE" } ] }
            }
        ],
        "enums": []
    }
    "#;

    fn build_binary_frame(message_id: u16, body: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&[0xAA, 0x44, 0x12]);
        frame.push(28);
        frame.extend_from_slice(&message_id.to_le_bytes());
        frame.push(0);
        frame.push(0);
        frame.extend_from_slice(&(body.len() as u16).to_le_bytes());
        frame.extend_from_slice(&0u16.to_le_bytes());
        frame.push(0);
        frame.push(TimeStatus::FineSteering as u8);
        frame.extend_from_slice(&2200u16.to_le_bytes());
        frame.extend_from_slice(&123456u32.to_le_bytes());
        frame.extend_from_slice(&0u32.to_le_bytes());
        frame.extend_from_slice(&0u16.to_le_bytes());
        frame.extend_from_slice(&0u16.to_le_bytes());
        frame.extend_from_slice(body);
        let crc = crc::crc32(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        frame
    }

    #[test]
    fn parser_decodes_and_reencodes_binary_frame() {
        let db = Arc::new(Database::load(SAMPLE.as_bytes()).unwrap());
        let mut body = Vec::new();
        body.extend_from_slice(&51.5f64.to_le_bytes());
        let frame = build_binary_frame(42, &body);

        let mut parser = Parser::new(db, FramerConfig::default(), OutputFormat::Ascii);
        parser.write(&frame);
        match parser.read().unwrap() {
            ParseOutcome::Message(m) => {
                assert_eq!(m.header.message_name, "BESTPOS");
                assert!(String::from_utf8_lossy(&m.encoded).starts_with('#'));
            }
            other => panic!("expected a message, got {other:?}"),
        }
    }

    #[test]
    fn file_parser_loops_until_stream_empty() {
        let db = Arc::new(Database::load(SAMPLE.as_bytes()).unwrap());
        let mut body = Vec::new();
        body.extend_from_slice(&1.0f64.to_le_bytes());
        let frame = build_binary_frame(42, &body);

        let parser = Parser::new(db, FramerConfig::default(), OutputFormat::Binary);
        let source = Cursor::new(frame.clone());
        let mut fp = FileParser::new(parser, source);

        let msg = fp.read().unwrap();
        assert_eq!(msg.header.message_name, "BESTPOS");
        assert!(matches!(fp.read(), Err(Error::StreamEmpty)));
    }

    #[test]
    fn filter_rejection_is_skipped_transparently() {
        use crate::filter::{FilterConfig, IdFormatSource};
        let db = Arc::new(Database::load(SAMPLE.as_bytes()).unwrap());
        let mut body = Vec::new();
        body.extend_from_slice(&1.0f64.to_le_bytes());
        let frame = build_binary_frame(42, &body);

        let config = FilterConfig::default().with_id_format_source([IdFormatSource {
            id: 999,
            format: HeaderFormat::Binary,
            source: Default::default(),
        }]);
        let parser = Parser::new(db, FramerConfig::default(), OutputFormat::Binary)
            .with_filter(Filter::new(config));
        let source = Cursor::new(frame);
        let mut fp = FileParser::new(parser, source);
        assert!(matches!(fp.read(), Err(Error::StreamEmpty)));
    }
}
