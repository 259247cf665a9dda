//! The synchronization state machine: scans a byte buffer for message
//! boundaries across the three-plus wire encodings and validates frame-level
//! integrity.
//!
//! Design Note ("Framer state"): rather than nested branches over byte
//! positions, each call to [`Framer::get_frame`] re-derives a [`Decision`]
//! from the ring's current contents from scratch. This makes framer
//! idempotence (spec §8 property 2 — chunking the input differently never
//! changes the status/metadata/span sequence) fall out for free: the
//! decision only ever depends on what bytes are buffered, never on how many
//! `write()` calls it took to get them there. `FramerState` is kept as a
//! label for observability, not as control flow.

use crate::buffer::{RingBuffer, DEFAULT_CAPACITY};
use crate::crc;
use crate::meta::{GpsTime, HeaderFormat, MeasurementSource, MetaData, TimeStatus};
use crate::sink::{Level, NullSink, Sink};

const OEM4_SYNC: [u8; 3] = [0xAA, 0x44, 0x12];
const SHORT_SYNC: [u8; 3] = [0xAA, 0x44, 0x13];
const OEM4_HEADER_LEN: usize = 28;
const SHORT_HEADER_LEN: usize = 12;

/// High-level label for where the framer currently sits. Purely descriptive;
/// `get_frame` recomputes the real decision from the ring every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramerState {
    #[default]
    Search,
    SyncFound1,
    SyncFound2,
    SyncFound3,
    Header,
    Body,
    Crc,
    Complete,
}

/// Outcome of one `get_frame` call (spec §4.1, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerStatus {
    Success,
    Incomplete,
    IncompleteMoreData,
    BufferFull,
    Unknown,
    CrcMismatch,
}

#[derive(Debug, Clone)]
pub struct FramerConfig {
    pub capacity: usize,
    pub frame_json: bool,
    pub payload_only: bool,
    pub report_unknown_bytes: bool,
}

impl Default for FramerConfig {
    fn default() -> Self {
        FramerConfig {
            capacity: DEFAULT_CAPACITY,
            frame_json: false,
            payload_only: false,
            report_unknown_bytes: false,
        }
    }
}

pub struct Framer {
    ring: RingBuffer,
    config: FramerConfig,
    sink: Box<dyn Sink>,
    state: FramerState,
}

impl Default for Framer {
    fn default() -> Self {
        Framer::new(FramerConfig::default())
    }
}

impl Framer {
    pub fn new(config: FramerConfig) -> Self {
        Framer::with_sink(config, Box::new(NullSink))
    }

    pub fn with_sink(config: FramerConfig, sink: Box<dyn Sink>) -> Self {
        let ring = RingBuffer::new(config.capacity);
        Framer {
            ring,
            config,
            sink,
            state: FramerState::Search,
        }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    /// Appends as much of `bytes` as the ring has room for.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let n = self.ring.write(bytes);
        if n < bytes.len() {
            self.sink.log(
                Level::Warn,
                "framer",
                &format!("ring buffer full, dropped {} of {} bytes", bytes.len() - n, bytes.len()),
            );
        }
        n
    }

    /// Drains all buffered bytes as-is (treated as "unknown") and resets
    /// framer state.
    pub fn flush(&mut self, out: &mut [u8]) -> usize {
        let drained = self.ring.drain_all();
        let n = drained.len().min(out.len());
        out[..n].copy_from_slice(&drained[..n]);
        self.state = FramerState::Search;
        n
    }

    /// Attempts to extract one complete message.
    pub fn get_frame(&mut self, out: &mut [u8]) -> (FramerStatus, MetaData, usize) {
        let decision = {
            let view = self.ring.contiguous_view();
            decide(view, &self.config, out.len())
        };

        match decision {
            Decision::Incomplete => {
                self.state = FramerState::Search;
                (FramerStatus::Incomplete, MetaData::default(), 0)
            }
            Decision::ConsumeOnly(n) => {
                self.ring.consume(n);
                self.state = FramerState::Search;
                (FramerStatus::Incomplete, MetaData::default(), 0)
            }
            Decision::BufferFull { needed } => (
                FramerStatus::BufferFull,
                MetaData {
                    frame_length: needed,
                    ..Default::default()
                },
                0,
            ),
            Decision::Unknown { span, consume } => {
                self.ring.consume(consume);
                self.state = FramerState::Search;
                let len = span.len();
                out[..len].copy_from_slice(&span);
                let meta = MetaData {
                    frame_length: len,
                    format: HeaderFormat::Unknown,
                    ..Default::default()
                };
                (FramerStatus::Unknown, meta, len)
            }
            Decision::CrcMismatch {
                span,
                consume,
                frame_len_claimed,
            } => {
                self.ring.consume(consume);
                self.state = FramerState::Search;
                self.sink
                    .log(Level::Warn, "framer", "crc mismatch, resynchronizing");
                let len = span.len();
                out[..len].copy_from_slice(&span);
                let meta = MetaData {
                    frame_length: frame_len_claimed,
                    format: HeaderFormat::Unknown,
                    ..Default::default()
                };
                (FramerStatus::CrcMismatch, meta, len)
            }
            Decision::Success {
                span,
                consume,
                meta,
                body_offset,
                body_length,
            } => {
                self.ring.consume(consume);
                self.state = FramerState::Complete;
                let payload = if self.config.payload_only {
                    &span[body_offset..body_offset + body_length]
                } else {
                    &span[..]
                };
                let len = payload.len();
                out[..len].copy_from_slice(payload);
                (FramerStatus::Success, meta, len)
            }
        }
    }
}

#[derive(Debug)]
enum Decision {
    Incomplete,
    ConsumeOnly(usize),
    BufferFull {
        needed: usize,
    },
    Unknown {
        span: Vec<u8>,
        consume: usize,
    },
    CrcMismatch {
        span: Vec<u8>,
        consume: usize,
        frame_len_claimed: usize,
    },
    Success {
        span: Vec<u8>,
        consume: usize,
        meta: MetaData,
        body_offset: usize,
        body_length: usize,
    },
}

fn find_sync(view: &[u8], config: &FramerConfig) -> Option<usize> {
    view.iter().position(|&b| {
        b == 0xAA || b == b'#' || b == b'%' || b == b'$' || (config.frame_json && b == b'{')
    })
}

fn garbage(len: usize, view: &[u8], config: &FramerConfig, out_capacity: usize) -> Decision {
    if config.report_unknown_bytes {
        if out_capacity < len {
            return Decision::BufferFull { needed: len };
        }
        Decision::Unknown {
            span: view[..len].to_vec(),
            consume: len,
        }
    } else {
        Decision::ConsumeOnly(len)
    }
}

fn decide(view: &[u8], config: &FramerConfig, out_capacity: usize) -> Decision {
    if view.is_empty() {
        return Decision::Incomplete;
    }
    match find_sync(view, config) {
        None => garbage(view.len(), view, config, out_capacity),
        Some(0) => dispatch(view, config, out_capacity),
        Some(offset) => garbage(offset, view, config, out_capacity),
    }
}

fn dispatch(view: &[u8], config: &FramerConfig, out_capacity: usize) -> Decision {
    match view[0] {
        0xAA => parse_binary_family(view, config, out_capacity),
        b'#' => parse_ascii(view, HeaderFormat::Ascii, out_capacity),
        b'%' => parse_ascii(view, HeaderFormat::AbbAscii, out_capacity),
        b'$' => parse_nmea(view, out_capacity),
        b'{' if config.frame_json => parse_json(view, out_capacity),
        _ => unreachable!("dispatch called on a non-sync byte"),
    }
}

fn parse_binary_family(view: &[u8], config: &FramerConfig, out_capacity: usize) -> Decision {
    if view.len() < 2 {
        return Decision::Incomplete;
    }
    if view[1] != 0x44 {
        return garbage(1, view, config, out_capacity);
    }
    if view.len() < 3 {
        return Decision::Incomplete;
    }
    match view[2] {
        0x12 => parse_binary_long(view, out_capacity),
        0x13 => parse_binary_short(view, out_capacity),
        _ => garbage(1, view, config, out_capacity),
    }
}

fn parse_binary_long(view: &[u8], out_capacity: usize) -> Decision {
    debug_assert_eq!(&view[..3], &OEM4_SYNC);
    if view.len() < 10 {
        return Decision::Incomplete;
    }
    let header_length = view[3] as usize;
    if header_length < OEM4_HEADER_LEN {
        // An implausibly short header can't be this wire format.
        return Decision::ConsumeOnly(1);
    }
    if view.len() < header_length {
        return Decision::Incomplete;
    }
    let body_length = u16::from_le_bytes([view[8], view[9]]) as usize;
    let total_len = header_length + body_length + 4;
    if view.len() < total_len {
        return Decision::Incomplete;
    }
    if out_capacity < total_len {
        return Decision::BufferFull { needed: total_len };
    }

    let crc_stored = u32::from_le_bytes([
        view[total_len - 4],
        view[total_len - 3],
        view[total_len - 2],
        view[total_len - 1],
    ]);
    let computed = crc::crc32(&view[..total_len - 4]);
    if computed != crc_stored {
        return Decision::CrcMismatch {
            span: view[..4].to_vec(),
            consume: 4,
            frame_len_claimed: total_len,
        };
    }

    let message_id = u16::from_le_bytes([view[4], view[5]]);
    let message_type = view[6];
    let response = message_type & 0x80 != 0;
    let source = MeasurementSource::try_from((message_type >> 5) & 0x3).unwrap_or_default();
    let time_status = TimeStatus::try_from(u32::from(view[13])).unwrap_or_default();
    let week = u16::from_le_bytes([view[14], view[15]]);
    let ms = u32::from_le_bytes([view[16], view[17], view[18], view[19]]);

    let meta = MetaData {
        frame_length: total_len,
        header_length,
        time: GpsTime::new(week, ms),
        time_status,
        message_id,
        message_name: String::new(),
        format: HeaderFormat::Binary,
        source,
        response,
    };

    Decision::Success {
        span: view[..total_len].to_vec(),
        consume: total_len,
        meta,
        body_offset: header_length,
        body_length,
    }
}

fn parse_binary_short(view: &[u8], out_capacity: usize) -> Decision {
    debug_assert_eq!(&view[..3], &SHORT_SYNC);
    if view.len() < 4 {
        return Decision::Incomplete;
    }
    let body_length = view[3] as usize;
    let total_len = SHORT_HEADER_LEN + body_length + 4;
    if view.len() < total_len {
        return Decision::Incomplete;
    }
    if out_capacity < total_len {
        return Decision::BufferFull { needed: total_len };
    }

    let crc_stored = u32::from_le_bytes([
        view[total_len - 4],
        view[total_len - 3],
        view[total_len - 2],
        view[total_len - 1],
    ]);
    let computed = crc::crc32(&view[..total_len - 4]);
    if computed != crc_stored {
        return Decision::CrcMismatch {
            span: view[..4].to_vec(),
            consume: 4,
            frame_len_claimed: total_len,
        };
    }

    let message_id = u16::from_le_bytes([view[4], view[5]]);
    let week = u16::from_le_bytes([view[6], view[7]]);
    let ms = u32::from_le_bytes([view[8], view[9], view[10], view[11]]);

    let meta = MetaData {
        frame_length: total_len,
        header_length: SHORT_HEADER_LEN,
        time: GpsTime::new(week, ms),
        message_id,
        format: HeaderFormat::ShortBinary,
        ..Default::default()
    };

    Decision::Success {
        span: view[..total_len].to_vec(),
        consume: total_len,
        meta,
        body_offset: SHORT_HEADER_LEN,
        body_length,
    }
}

fn ascii_time_status(s: &str) -> TimeStatus {
    match s {
        "UNKNOWN" => TimeStatus::Unknown,
        "APPROXIMATE" => TimeStatus::Approximate,
        "COARSEADJUSTING" => TimeStatus::CoarseAdjusting,
        "COARSE" => TimeStatus::Coarse,
        "COARSESTEERING" => TimeStatus::CoarseSteering,
        "FREEWHEELING" => TimeStatus::FreeWheeling,
        "FINEADJUSTING" => TimeStatus::FineAdjusting,
        "FINE" => TimeStatus::Fine,
        "FINEBACKUPSTEERING" => TimeStatus::FineBackupSteering,
        "FINESTEERING" => TimeStatus::FineSteering,
        "SATTIME" => TimeStatus::SatTime,
        _ => TimeStatus::Unknown,
    }
}

fn parse_ascii(view: &[u8], format: HeaderFormat, out_capacity: usize) -> Decision {
    if view.len() < 2 {
        return Decision::Incomplete;
    }
    let semi = match view.iter().position(|&b| b == b';') {
        Some(p) if p > 0 => p,
        _ => return Decision::Incomplete,
    };
    let star = match view[semi + 1..].iter().position(|&b| b == b'*') {
        Some(p) => semi + 1 + p,
        None => return Decision::Incomplete,
    };
    let total_len = star + 1 + 8 + 2;
    if view.len() < total_len {
        return Decision::Incomplete;
    }
    if view[total_len - 2] != b'\r' || view[total_len - 1] != b'\n' {
        return Decision::CrcMismatch {
            span: view[..1].to_vec(),
            consume: 1,
            frame_len_claimed: total_len,
        };
    }
    if out_capacity < total_len {
        return Decision::BufferFull { needed: total_len };
    }

    let crc_stored = std::str::from_utf8(&view[star + 1..star + 9])
        .ok()
        .and_then(|s| u32::from_str_radix(s, 16).ok());
    let computed = crc::crc32(&view[1..star]);
    if crc_stored != Some(computed) {
        return Decision::CrcMismatch {
            span: view[..1].to_vec(),
            consume: 1,
            frame_len_claimed: total_len,
        };
    }

    let header_str = std::str::from_utf8(&view[1..semi]).unwrap_or("");
    let mut tokens = header_str.split(',');
    let name_and_format = tokens.next().unwrap_or("");
    // Full ASCII logs append a trailing 'A' to the message name (`BESTPOSA`);
    // abbreviated ASCII logs use the bare name (`%BESTPOS`). Strip only that
    // single marker character, never a run of trailing letters, so names
    // that are themselves all-alphabetic (`VERSIONA` -> `VERSION`) survive.
    let message_name = match format {
        HeaderFormat::Ascii => name_and_format
            .strip_suffix('A')
            .unwrap_or(name_and_format)
            .to_string(),
        _ => name_and_format.to_string(),
    };
    let fields: Vec<&str> = tokens.collect();

    let mut meta = MetaData {
        frame_length: total_len,
        header_length: semi + 1,
        format,
        message_name,
        ..Default::default()
    };
    if fields.len() >= 6 {
        meta.time_status = ascii_time_status(fields[3]);
        if let Ok(week) = fields[4].trim().parse::<u16>() {
            meta.time.week = week;
        }
        if let Ok(ms) = fields[5].trim().parse::<f64>() {
            meta.time.milliseconds = ms as u32;
        }
    }

    Decision::Success {
        span: view[..total_len].to_vec(),
        consume: total_len,
        meta,
        body_offset: semi + 1,
        body_length: star - (semi + 1),
    }
}

fn parse_nmea(view: &[u8], out_capacity: usize) -> Decision {
    if view.len() < 2 {
        return Decision::Incomplete;
    }
    let star = match view.iter().position(|&b| b == b'*') {
        Some(p) if p > 0 => p,
        _ => return Decision::Incomplete,
    };
    let total_len = star + 1 + 2 + 2;
    if view.len() < total_len {
        return Decision::Incomplete;
    }
    if view[total_len - 2] != b'\r' || view[total_len - 1] != b'\n' {
        return Decision::CrcMismatch {
            span: view[..1].to_vec(),
            consume: 1,
            frame_len_claimed: total_len,
        };
    }
    if out_capacity < total_len {
        return Decision::BufferFull { needed: total_len };
    }

    let checksum_stored = std::str::from_utf8(&view[star + 1..star + 3])
        .ok()
        .and_then(|s| u8::from_str_radix(s, 16).ok());
    let computed = crc::nmea_checksum(&view[1..star]);
    if checksum_stored != Some(computed) {
        return Decision::CrcMismatch {
            span: view[..1].to_vec(),
            consume: 1,
            frame_len_claimed: total_len,
        };
    }

    let name_end = view[..star].iter().position(|&b| b == b',').unwrap_or(star);
    let message_name = std::str::from_utf8(&view[1..name_end])
        .unwrap_or("")
        .to_string();

    let meta = MetaData {
        frame_length: total_len,
        header_length: 0,
        format: HeaderFormat::Nmea,
        message_name,
        ..Default::default()
    };

    Decision::Success {
        span: view[..total_len].to_vec(),
        consume: total_len,
        meta,
        body_offset: 0,
        body_length: total_len,
    }
}

fn parse_json(view: &[u8], out_capacity: usize) -> Decision {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    for (i, &b) in view.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if b == b'\\' {
                escape = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let total_len = i + 1;
                    if out_capacity < total_len {
                        return Decision::BufferFull { needed: total_len };
                    }
                    let meta = MetaData {
                        frame_length: total_len,
                        header_length: 0,
                        format: HeaderFormat::Json,
                        ..Default::default()
                    };
                    return Decision::Success {
                        span: view[..total_len].to_vec(),
                        consume: total_len,
                        meta,
                        body_offset: 0,
                        body_length: total_len,
                    };
                }
            }
            _ => {}
        }
    }
    Decision::Incomplete
}

#[cfg(test)]
mod test {
    use super::*;

    fn build_binary_frame(message_id: u16, body: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&OEM4_SYNC);
        frame.push(OEM4_HEADER_LEN as u8);
        frame.extend_from_slice(&message_id.to_le_bytes());
        frame.push(0); // message type
        frame.push(0); // port address
        frame.extend_from_slice(&(body.len() as u16).to_le_bytes());
        frame.extend_from_slice(&0u16.to_le_bytes()); // sequence
        frame.push(0); // idle time
        frame.push(TimeStatus::FineSteering as u8);
        frame.extend_from_slice(&2200u16.to_le_bytes()); // week
        frame.extend_from_slice(&123456u32.to_le_bytes()); // ms
        frame.extend_from_slice(&0u32.to_le_bytes()); // receiver status
        frame.extend_from_slice(&0u16.to_le_bytes()); // reserved
        frame.extend_from_slice(&0u16.to_le_bytes()); // sw version
        assert_eq!(frame.len(), OEM4_HEADER_LEN);
        frame.extend_from_slice(body);
        let crc = crc::crc32(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        frame
    }

    fn build_ascii_frame(name: &str, body: &str) -> Vec<u8> {
        let header = format!(
            "{name}A,COM1,0,71.5,FINESTEERING,2200,123456.000,02000020,cdba,16809"
        );
        let mut core = format!("#{header};{body}");
        let crc = crc::crc32(core[1..].as_bytes());
        core.push_str(&format!("*{crc:08x}\r\n"));
        core.into_bytes()
    }

    #[test]
    fn binary_round_trip_success() {
        let frame = build_binary_frame(42, &[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut framer = Framer::default();
        framer.write(&frame);
        let mut out = vec![0u8; 256];
        let (status, meta, len) = framer.get_frame(&mut out);
        assert_eq!(status, FramerStatus::Success);
        assert_eq!(len, frame.len());
        assert_eq!(&out[..len], &frame[..]);
        assert_eq!(meta.message_id, 42);
        assert_eq!(meta.format, HeaderFormat::Binary);
        assert_eq!(meta.time.week, 2200);
    }

    #[test]
    fn byte_by_byte_writes_incomplete_until_complete() {
        let frame = build_binary_frame(42, &[1, 2, 3, 4]);
        let mut framer = Framer::default();
        let mut out = vec![0u8; 256];
        for i in 0..frame.len() - 1 {
            framer.write(&frame[i..i + 1]);
            let (status, _, _) = framer.get_frame(&mut out);
            assert_eq!(status, FramerStatus::Incomplete, "byte {i}");
        }
        framer.write(&frame[frame.len() - 1..]);
        let (status, _, len) = framer.get_frame(&mut out);
        assert_eq!(status, FramerStatus::Success);
        assert_eq!(len, frame.len());
    }

    #[test]
    fn idempotent_regardless_of_chunking() {
        let frame = build_binary_frame(42, &[9, 9, 9]);
        let mut out_whole = vec![0u8; 256];
        let mut framer_whole = Framer::default();
        framer_whole.write(&frame);
        let whole_result = framer_whole.get_frame(&mut out_whole);

        let mut out_chunked = vec![0u8; 256];
        let mut framer_chunked = Framer::default();
        for chunk in frame.chunks(3) {
            framer_chunked.write(chunk);
        }
        let chunked_result = framer_chunked.get_frame(&mut out_chunked);

        assert_eq!(whole_result.0, chunked_result.0);
        assert_eq!(whole_result.2, chunked_result.2);
        assert_eq!(out_whole[..whole_result.2], out_chunked[..chunked_result.2]);
    }

    #[test]
    fn resync_reports_garbage_prefix() {
        let frame = build_ascii_frame("VERSION", "1,COM1");
        let mut input = b"JUNK".to_vec();
        input.extend_from_slice(&frame);

        let mut config = FramerConfig::default();
        config.report_unknown_bytes = true;
        let mut framer = Framer::new(config);
        framer.write(&input);
        let mut out = vec![0u8; 256];

        let (status, _, len) = framer.get_frame(&mut out);
        assert_eq!(status, FramerStatus::Unknown);
        assert_eq!(&out[..len], b"JUNK");

        let (status, meta, len) = framer.get_frame(&mut out);
        assert_eq!(status, FramerStatus::Success);
        assert_eq!(len, frame.len());
        assert_eq!(meta.format, HeaderFormat::Ascii);
    }

    #[test]
    fn crc_mismatch_on_flipped_bit() {
        let mut frame = build_binary_frame(42, &[1, 2, 3, 4]);
        let body_start = OEM4_HEADER_LEN;
        frame[body_start] ^= 0x01;
        let mut framer = Framer::default();
        framer.write(&frame);
        let mut out = vec![0u8; 256];
        let (status, meta, _) = framer.get_frame(&mut out);
        assert_eq!(status, FramerStatus::CrcMismatch);
        assert_eq!(meta.format, HeaderFormat::Unknown);
    }

    #[test]
    fn buffer_full_is_retryable() {
        let frame = build_binary_frame(42, &[1; 16]);
        let mut framer = Framer::default();
        framer.write(&frame);
        let mut small = vec![0u8; 4];
        let (status, _, _) = framer.get_frame(&mut small);
        assert_eq!(status, FramerStatus::BufferFull);

        let mut big = vec![0u8; 256];
        let (status, _, len) = framer.get_frame(&mut big);
        assert_eq!(status, FramerStatus::Success);
        assert_eq!(len, frame.len());
    }

    #[test]
    fn ascii_header_parses_time_fields() {
        let frame = build_ascii_frame("BESTPOS", "SOL_COMPUTED,SINGLE");
        let mut framer = Framer::default();
        framer.write(&frame);
        let mut out = vec![0u8; 512];
        let (status, meta, _) = framer.get_frame(&mut out);
        assert_eq!(status, FramerStatus::Success);
        assert_eq!(meta.message_name, "BESTPOS");
        assert_eq!(meta.time.week, 2200);
        assert_eq!(meta.time_status, TimeStatus::FineSteering);
    }

    #[test]
    fn nmea_frame_is_recognized() {
        let sentence = b"GPGGA,123519,4807.038,N";
        let checksum = crc::nmea_checksum(sentence);
        let mut input = vec![b'$'];
        input.extend_from_slice(sentence);
        input.push(b'*');
        input.extend_from_slice(format!("{checksum:02X}").as_bytes());
        input.extend_from_slice(b"\r\n");

        let mut framer = Framer::default();
        framer.write(&input);
        let mut out = vec![0u8; 256];
        let (status, meta, len) = framer.get_frame(&mut out);
        assert_eq!(status, FramerStatus::Success);
        assert_eq!(meta.format, HeaderFormat::Nmea);
        assert_eq!(meta.message_name, "GPGGA");
        assert_eq!(len, input.len());
    }

    #[test]
    fn json_frame_requires_opt_in() {
        let input = br#"{"a": 1, "b": {"c": 2}}"#;
        let mut framer = Framer::default();
        framer.write(input);
        let mut out = vec![0u8; 256];
        let (status, _, _) = framer.get_frame(&mut out);
        assert_eq!(status, FramerStatus::Incomplete);

        let mut config = FramerConfig::default();
        config.frame_json = true;
        let mut framer = Framer::new(config);
        framer.write(input);
        let (status, meta, len) = framer.get_frame(&mut out);
        assert_eq!(status, FramerStatus::Success);
        assert_eq!(meta.format, HeaderFormat::Json);
        assert_eq!(len, input.len());
    }

    #[test]
    fn payload_only_strips_header_and_crc() {
        let body = [1u8, 2, 3, 4, 5];
        let frame = build_binary_frame(42, &body);
        let mut config = FramerConfig::default();
        config.payload_only = true;
        let mut framer = Framer::new(config);
        framer.write(&frame);
        let mut out = vec![0u8; 256];
        let (status, _, len) = framer.get_frame(&mut out);
        assert_eq!(status, FramerStatus::Success);
        assert_eq!(&out[..len], &body[..]);
    }
}
