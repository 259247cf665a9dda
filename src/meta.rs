//! Metadata produced by the framer and enriched by downstream decoders.

use crate::Error;
use num_enum::TryFromPrimitive;
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Confidence level of the receiver's clock at the time a message was
/// logged. Values and ordering follow the NovAtel OEM receiver's own
/// `GPS Reference Time Status` enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, Serialize_repr, Deserialize_repr)]
#[repr(u32)]
pub enum TimeStatus {
    Unknown = 20,
    Approximate = 60,
    CoarseAdjusting = 80,
    Coarse = 100,
    CoarseSteering = 120,
    FreeWheeling = 130,
    FineAdjusting = 140,
    Fine = 160,
    FineBackupSteering = 170,
    FineSteering = 180,
    SatTime = 200,
}

impl Default for TimeStatus {
    fn default() -> Self {
        TimeStatus::Unknown
    }
}

/// The wire encoding a frame was read from (or should be written to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HeaderFormat {
    Binary,
    ShortBinary,
    Ascii,
    AbbAscii,
    Nmea,
    Json,
    All,
    #[default]
    Unknown,
}

/// Dual-antenna receivers tag each measurement with the antenna path it
/// came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive)]
#[repr(u8)]
pub enum MeasurementSource {
    #[default]
    Primary = 0,
    Secondary = 1,
}

/// GNSS time of week, in NovAtel's (week, milliseconds-of-week) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpsTime {
    pub week: u16,
    pub milliseconds: u32,
}

impl GpsTime {
    pub fn new(week: u16, milliseconds: u32) -> Self {
        Self { week, milliseconds }
    }
}

/// Metadata describing one framed message, produced by the [`crate::Framer`]
/// and filled in further as header/body decoding proceeds.
#[derive(Debug, Clone, Default)]
pub struct MetaData {
    pub frame_length: usize,
    pub header_length: usize,
    pub time: GpsTime,
    pub time_status: TimeStatus,
    pub message_id: u16,
    pub message_name: String,
    pub format: HeaderFormat,
    pub source: MeasurementSource,
    pub response: bool,
}

impl MetaData {
    /// Constructs metadata, enforcing `header_length <= frame_length`.
    pub fn new(frame_length: usize, header_length: usize) -> crate::Result<Self> {
        if header_length > frame_length {
            return Err(Error::malformed(format!(
                "header_length {header_length} exceeds frame_length {frame_length}"
            )));
        }
        Ok(MetaData {
            frame_length,
            header_length,
            ..Default::default()
        })
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.message_name = name.into();
    }
}

/// Framed bytes plus offsets of the header and body within them.
#[derive(Debug, Clone)]
pub struct MessageData {
    pub bytes: Vec<u8>,
    pub header_offset: usize,
    pub header_length: usize,
    pub body_offset: usize,
    pub body_length: usize,
}

impl MessageData {
    /// Builds a [`MessageData`], enforcing the offset invariants from the
    /// spec: `header_offset + header_length == body_offset` and
    /// `body_offset + body_length <= bytes.len()`.
    pub fn new(
        bytes: Vec<u8>,
        header_offset: usize,
        header_length: usize,
        body_offset: usize,
        body_length: usize,
    ) -> crate::Result<Self> {
        if header_offset + header_length != body_offset {
            return Err(Error::malformed(
                "header_offset + header_length must equal body_offset",
            ));
        }
        if body_offset + body_length > bytes.len() {
            return Err(Error::malformed(
                "body_offset + body_length exceeds frame length",
            ));
        }
        Ok(MessageData {
            bytes,
            header_offset,
            header_length,
            body_offset,
            body_length,
        })
    }

    pub fn header(&self) -> &[u8] {
        &self.bytes[self.header_offset..self.header_offset + self.header_length]
    }

    pub fn body(&self) -> &[u8] {
        &self.bytes[self.body_offset..self.body_offset + self.body_length]
    }
}
