#![allow(clippy::upper_case_acronyms)]
#[macro_use]
extern crate arrayref;

pub type Result<T = ()> = std::result::Result<T, Error>;

mod crc;

mod error;
pub use error::Error;

pub mod sink;
pub use sink::Sink;

pub mod buffer;
pub use buffer::RingBuffer;

pub mod db;
pub use db::Database;

pub mod field;
pub use field::{FieldContainer, FieldTree, FieldValue};

pub mod meta;
pub use meta::{HeaderFormat, MeasurementSource, MessageData, MetaData, TimeStatus};

pub mod tracking;
pub use tracking::ChannelTrackingStatus;

pub mod framer;
pub use framer::{Framer, FramerConfig, FramerStatus};

pub mod header;
pub use header::{CommonHeader, HeaderDecoder};

pub mod decode;
pub use decode::MessageDecoder;

pub mod encode;
pub use encode::Encoder;

pub mod rangecmp;
pub use rangecmp::RangeDecompressor;

pub mod rxconfig;
pub use rxconfig::RxConfigHandler;

pub mod filter;
pub use filter::{Filter, FilterConfig};

pub mod parser;
pub use parser::{ByteSource, FileParser, Parser};

#[cfg(feature = "stream")]
pub mod stream;

#[cfg(test)]
mod tests;
