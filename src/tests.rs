//! Cross-module integration tests exercising the scenarios and testable
//! properties that don't belong to any single subsystem: a full
//! framer -> header -> decode -> encode pipeline, RangeCmp equivalence
//! against a plain RANGE message, and filter completeness over a small
//! synthetic stream. Per-module unit tests live alongside their
//! implementation (`framer/mod.rs`, `decode/mod.rs`, etc.).

use crate::crc;
use crate::db::Database;
use crate::decode::{BodyEncoding, MessageDecoder};
use crate::encode::{Encoder, OutputFormat};
use crate::filter::{Filter, FilterConfig};
use crate::framer::{Framer, FramerConfig, FramerStatus};
use crate::header::HeaderDecoder;
use crate::meta::{GpsTime, HeaderFormat, MetaData, TimeStatus};
use crate::rangecmp::{RangeCmpVariant, RangeDecompressor};
use std::sync::Arc;

const DB_JSON: &str = r#"
{
    "messages": [
        {
            "name": "BESTPOS",
            "messageId": 42,
            "latestMessageCrc": 1,
            "fields": {
                "1": [
                    { "name": "sol_status", "type": "ENUM", "enumId": "SOLUTION_STATUS" },
                    { "name": "lat", "type": "DOUBLE", "conversionString": "%12.8lf" },
                    { "name": "lon", "type": "DOUBLE", "conversionString": "%12.8lf" }
                ]
            }
        },
        {
            "name": "VERSION",
            "messageId": 37,
            "latestMessageCrc": 1,
            "fields": { "1": [ { "name": "num_components", "type": "U32" } ] }
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

fn build_binary_frame(message_id: u16, time_status: TimeStatus, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&[0xAA, 0x44, 0x12]);
    frame.push(28);
    frame.extend_from_slice(&message_id.to_le_bytes());
    frame.push(0); // message type / response flag
    frame.push(0); // port address
    frame.extend_from_slice(&(body.len() as u16).to_le_bytes());
    frame.extend_from_slice(&0u16.to_le_bytes()); // sequence
    frame.push(0); // idle time
    frame.push(time_status as u8);
    frame.extend_from_slice(&2200u16.to_le_bytes()); // week
    frame.extend_from_slice(&123456u32.to_le_bytes()); // ms
    frame.extend_from_slice(&0u32.to_le_bytes()); // receiver status
    frame.extend_from_slice(&0u16.to_le_bytes()); // reserved
    frame.extend_from_slice(&0u16.to_le_bytes()); // sw version
    frame.extend_from_slice(body);
    let crc = crc::crc32(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// S1: a binary BESTPOS frame frames correctly and re-encodes to ASCII with
/// a recomputable CRC.
#[test]
fn s1_binary_bestpos_frames_and_reencodes_to_ascii() {
    let db = Database::load(DB_JSON.as_bytes()).unwrap();
    let mut body = Vec::new();
    body.extend_from_slice(&0i32.to_le_bytes());
    body.extend_from_slice(&51.5f64.to_le_bytes());
    body.extend_from_slice(&(-114.0f64).to_le_bytes());
    let frame = build_binary_frame(42, TimeStatus::FineSteering, &body);

    let mut framer = Framer::default();
    framer.write(&frame);
    let mut out = vec![0u8; 1024];
    let (status, meta, len) = framer.get_frame(&mut out);
    assert_eq!(status, FramerStatus::Success);
    assert_eq!(len, frame.len());

    let header = HeaderDecoder::new().decode(&db, &meta).unwrap();
    assert_eq!(header.message_name, "BESTPOS");
    assert_eq!(header.format, HeaderFormat::Binary);
    assert_eq!(meta.frame_length, frame.len());

    let tree = MessageDecoder::new()
        .decode(&db, &header, &out[28..len - 4], BodyEncoding::Binary)
        .unwrap();
    let encoded = Encoder::new()
        .encode(&db, &header, &tree, OutputFormat::Ascii)
        .unwrap();
    let text = String::from_utf8(encoded).unwrap();
    assert!(text.starts_with("#BESTPOSA,"));
    let star = text.find('*').unwrap();
    let crc_in_text = u32::from_str_radix(text[star + 1..star + 9].trim(), 16).unwrap();
    let recomputed = crc::crc32(text[1..star].as_bytes());
    assert_eq!(crc_in_text, recomputed);
    assert!(text.ends_with("\r\n"));
}

/// S2: garbage prefix then a valid ASCII frame yields UNKNOWN then SUCCESS.
#[test]
fn s2_garbage_then_valid_ascii_frame() {
    let header = "VERSIONA,COM1,0,0.0,FINESTEERING,2200,0.000,02000020,0000,0";
    let mut core = format!("#{header};1,0");
    let crc = crc::crc32(core[1..].as_bytes());
    core.push_str(&format!("*{crc:08x}\r\n"));
    let version_frame = core.into_bytes();

    let mut input = b"JUNK".to_vec();
    input.extend_from_slice(&version_frame);

    let mut config = FramerConfig::default();
    config.report_unknown_bytes = true;
    let mut framer = Framer::new(config);
    framer.write(&input);
    let mut out = vec![0u8; 512];

    let (status, _, len) = framer.get_frame(&mut out);
    assert_eq!(status, FramerStatus::Unknown);
    assert_eq!(&out[..len], b"JUNK");

    let (status, meta, len) = framer.get_frame(&mut out);
    assert_eq!(status, FramerStatus::Success);
    assert_eq!(len, version_frame.len());
    assert_eq!(meta.message_name, "VERSION");
}

/// S3: a RANGECMP-style frame with N observations expands to N channel
/// records whose pseudoranges match a paired "reference" decode.
#[test]
fn s3_rangecmp_expansion_matches_reference_observations() {
    let mut decompressor = RangeDecompressor::new();

    let expected_pseudoranges: Vec<f64> = (0..12).map(|i| 20_000_000.0 + i as f64 * 10.0).collect();
    let mut body = Vec::new();
    body.extend_from_slice(&12u32.to_le_bytes());
    for (i, &pr) in expected_pseudoranges.iter().enumerate() {
        let tracking = (i as u32) << 5; // distinct channel_number per observation
        body.extend(crate::rangecmp::encode_v1_record(i as u8 + 1, tracking, pr, 0.0));
    }

    let observations = decompressor
        .expand_body(RangeCmpVariant::RangeCmp, &body)
        .unwrap();

    assert_eq!(observations.len(), 12);
    for (obs, expected) in observations.iter().zip(expected_pseudoranges.iter()) {
        assert!((obs.pseudorange_m - expected).abs() < 0.0005);
    }
}

/// S5: of 10 messages spanning two weeks and four time statuses, a filter
/// requiring FINE/FINESTEERING within week 2200 passes only the matching
/// subset.
#[test]
fn s5_filter_completeness_over_synthetic_stream() {
    let samples = [
        (2200u16, 0u32, TimeStatus::FineSteering),
        (2200, 43_200_000, TimeStatus::Fine),
        (2200, 86_400_000, TimeStatus::FineSteering),
        (2200, 10_000, TimeStatus::Unknown),
        (2200, 20_000, TimeStatus::Approximate),
        (2201, 0, TimeStatus::FineSteering), // outside week
        (2201, 1, TimeStatus::Fine),         // outside week
        (2200, 30_000, TimeStatus::Coarse),
        (2200, 86_400_001, TimeStatus::Fine), // just past upper bound
        (2200, 50_000, TimeStatus::FineSteering),
    ];

    let config = FilterConfig::default()
        .with_time_statuses([TimeStatus::Fine, TimeStatus::FineSteering])
        .with_time_window(GpsTime::new(2200, 0), GpsTime::new(2200, 86_400_000), false);
    let filter = Filter::new(config);

    let expected_pass = [true, true, true, false, false, false, false, false, false, true];

    for ((week, ms, status), expect) in samples.iter().zip(expected_pass.iter()) {
        let meta = MetaData {
            time: GpsTime::new(*week, *ms),
            time_status: *status,
            ..Default::default()
        };
        assert_eq!(filter.do_filtering(&meta), *expect, "week={week} ms={ms} status={status:?}");
    }
}

/// S6: writing a legal frame byte-by-byte returns INCOMPLETE for every
/// prefix and SUCCESS only once the whole frame is buffered.
#[test]
fn s6_byte_by_byte_write_is_incomplete_until_whole_frame_buffered() {
    let frame = build_binary_frame(42, TimeStatus::FineSteering, &[1, 2, 3, 4, 5]);
    let mut framer = Framer::default();
    let mut out = vec![0u8; 256];
    for i in 0..frame.len() - 1 {
        framer.write(&frame[i..i + 1]);
        let (status, _, _) = framer.get_frame(&mut out);
        assert_eq!(status, FramerStatus::Incomplete, "byte offset {i}");
    }
    framer.write(&frame[frame.len() - 1..]);
    let (status, _, len) = framer.get_frame(&mut out);
    assert_eq!(status, FramerStatus::Success);
    assert_eq!(len, frame.len());
}

/// Property 4: flipping any single bit in the header or body yields
/// CRC_MISMATCH, never a silent decode of corrupted data. Excludes the sync
/// prefix (bytes 0-2) and the header/body length fields (bytes 3 and 8-9),
/// which determine how many bytes are framed in the first place rather than
/// being CRC-protected *content* — corrupting those can legitimately change
/// sync/`INCOMPLETE` behavior instead of a mismatch.
#[test]
fn property_single_bit_flip_is_always_detected() {
    let frame = build_binary_frame(42, TimeStatus::FineSteering, &[1, 2, 3, 4, 5, 6, 7, 8]);
    let flippable = (4..8).chain(10..frame.len() - 4);
    for byte_index in flippable {
        let mut corrupted = frame.clone();
        corrupted[byte_index] ^= 0x01;
        let mut framer = Framer::default();
        framer.write(&corrupted);
        let mut out = vec![0u8; 256];
        let (status, _, _) = framer.get_frame(&mut out);
        assert_eq!(status, FramerStatus::CrcMismatch, "flipped bit in byte {byte_index}");
    }
}

/// Property 2: writing the same bytes in one chunk or any byte-wise
/// partition yields identical (status, span) pairs.
#[test]
fn property_framer_idempotent_across_chunkings() {
    let frame = build_binary_frame(7, TimeStatus::Fine, &[0xDE, 0xAD, 0xBE, 0xEF]);

    let mut whole = Framer::default();
    whole.write(&frame);
    let mut out_whole = vec![0u8; 256];
    let whole_result = whole.get_frame(&mut out_whole);

    for chunk_size in [1usize, 2, 3, 7, 16] {
        let mut framer = Framer::default();
        for chunk in frame.chunks(chunk_size) {
            framer.write(chunk);
        }
        let mut out = vec![0u8; 256];
        let result = framer.get_frame(&mut out);
        assert_eq!(result.0, whole_result.0, "chunk size {chunk_size}");
        assert_eq!(result.2, whole_result.2, "chunk size {chunk_size}");
        assert_eq!(&out[..result.2], &out_whole[..whole_result.2], "chunk size {chunk_size}");
    }
}

/// Property 1 (round trip), extended across many synthetic BESTPOS
/// messages with varying field values.
#[test]
fn property_round_trip_many_messages_binary() {
    let db = Database::load(DB_JSON.as_bytes()).unwrap();
    for i in 0..100i64 {
        let lat = i as f64 * 0.001;
        let lon = -(i as f64) * 0.002;
        let mut body = Vec::new();
        body.extend_from_slice(&((i % 2) as i32).to_le_bytes());
        body.extend_from_slice(&lat.to_le_bytes());
        body.extend_from_slice(&lon.to_le_bytes());
        let frame = build_binary_frame(42, TimeStatus::FineSteering, &body);

        let mut framer = Framer::default();
        framer.write(&frame);
        let mut out = vec![0u8; 256];
        let (status, meta, len) = framer.get_frame(&mut out);
        assert_eq!(status, FramerStatus::Success);

        let header = HeaderDecoder::new().decode(&db, &meta).unwrap();
        let tree = MessageDecoder::new()
            .decode(&db, &header, &out[28..len - 4], BodyEncoding::Binary)
            .unwrap();
        let encoded = Encoder::new()
            .encode(&db, &header, &tree, OutputFormat::Binary)
            .unwrap();
        assert_eq!(encoded, frame, "message {i}");
    }
}

/// Arc<Database> is cheaply shared read-only across multiple decoder
/// instances, per spec §3/§5 ("the database ... may be shared read-only
/// across multiple decoder instances").
#[test]
fn database_is_shareable_across_decoders() {
    let db = Arc::new(Database::load(DB_JSON.as_bytes()).unwrap());
    let db_a = Arc::clone(&db);
    let db_b = Arc::clone(&db);
    assert_eq!(db_a.get(42).unwrap().name, "BESTPOS");
    assert_eq!(db_b.get(37).unwrap().name, "VERSION");
    assert_eq!(Arc::strong_count(&db), 3);
}
