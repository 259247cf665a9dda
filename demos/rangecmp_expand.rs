//! Expands a raw RANGECMP-family body (read whole from a file; RANGECMP
//! is a leading `u32` count followed by fixed-width packed records,
//! RANGECMP2/4/5 are a single bit-packed hierarchy with no leading count)
//! and prints each recovered observation. A runnable demonstration of
//! `RangeDecompressor`, excluded from the core per spec §1.
//!
//! Usage: `rangecmp_expand <rangecmp|rangecmp2|rangecmp4|rangecmp5> <body-file>`
//!
//! Exit codes (spec §6): 0 success, 1 initialization failure, 2 mid-stream
//! fatal error.

use oem_decode::rangecmp::{RangeCmpVariant, RangeDecompressor};
use std::fs;
use std::process::ExitCode;

fn parse_variant(s: &str) -> Option<RangeCmpVariant> {
    match s.to_ascii_lowercase().as_str() {
        "rangecmp" => Some(RangeCmpVariant::RangeCmp),
        "rangecmp2" => Some(RangeCmpVariant::RangeCmp2),
        "rangecmp4" => Some(RangeCmpVariant::RangeCmp4),
        "rangecmp5" => Some(RangeCmpVariant::RangeCmp5),
        _ => None,
    }
}

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let (variant_arg, body_path) = match (args.next(), args.next()) {
        (Some(v), Some(p)) => (v, p),
        _ => {
            eprintln!("usage: rangecmp_expand <rangecmp|rangecmp2|rangecmp4|rangecmp5> <body-file>");
            return ExitCode::from(1);
        }
    };

    let variant = match parse_variant(&variant_arg) {
        Some(v) => v,
        None => {
            eprintln!("unknown variant {variant_arg:?}");
            return ExitCode::from(1);
        }
    };

    let body = match fs::read(&body_path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("failed to read {body_path}: {e}");
            return ExitCode::from(1);
        }
    };

    let mut decompressor = RangeDecompressor::new();
    match decompressor.expand_body(variant, &body) {
        Ok(observations) => {
            for obs in observations.iter() {
                println!(
                    "prn={} psr={:.4}m (+-{:.3}m) adr={:.4}cyc (+-{:.3}cyc) cn0={:.1}dB-Hz lock={:.2}s",
                    obs.prn,
                    obs.pseudorange_m,
                    obs.psr_stddev_m,
                    obs.carrier_phase_cycles,
                    obs.adr_stddev_cycles,
                    obs.cn0_db_hz,
                    obs.locktime_s
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("failed to expand {variant_arg} body: {e}");
            ExitCode::from(2)
        }
    }
}
