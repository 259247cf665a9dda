//! Decodes a byte stream of framed OEM messages and prints the re-encoded
//! ASCII form of each one. Not part of the core library (spec §1 excludes
//! "command-line examples" as external collaborators); this is a runnable
//! demonstration of `Parser`/`FileParser`, the way the teacher ships
//! `examples/client.rs` alongside its library.
//!
//! Usage: `decode_stream <database.json> <input-stream>`
//!
//! Exit codes (spec §6): 0 success, 1 initialization failure, 2 mid-stream
//! fatal error.

use oem_decode::encode::OutputFormat;
use oem_decode::framer::FramerConfig;
use oem_decode::parser::{FileParser, Parser};
use oem_decode::{Database, Error};
use std::fs::File;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let (db_path, input_path) = match (args.next(), args.next()) {
        (Some(db), Some(input)) => (db, input),
        _ => {
            eprintln!("usage: decode_stream <database.json> <input-stream>");
            return ExitCode::from(1);
        }
    };

    let db = match File::open(&db_path).map_err(Error::from).and_then(Database::load) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            eprintln!("failed to load message database {db_path}: {e}");
            return ExitCode::from(1);
        }
    };

    let input = match File::open(&input_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("failed to open input stream {input_path}: {e}");
            return ExitCode::from(1);
        }
    };

    let parser = Parser::new(db, FramerConfig::default(), OutputFormat::Ascii)
        .with_range_decompressor();
    let mut file_parser = FileParser::new(parser, input);

    loop {
        match file_parser.read() {
            Ok(msg) => {
                println!(
                    "{}\t{:?}\t{}",
                    msg.header.message_name,
                    msg.header.format,
                    String::from_utf8_lossy(&msg.encoded).trim_end()
                );
            }
            Err(Error::StreamEmpty) => return ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("mid-stream fatal error: {e}");
                return ExitCode::from(2);
            }
        }
    }
}
