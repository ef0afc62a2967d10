// src/ingest/record.rs
//! Output record and output file name formatting (Eastern time).

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Deserialize;
use std::fmt::Write as _;

pub const RECORD_TS_FORMAT: &str = "%m/%d/%Y %H:%M:%S";
pub const FILE_TS_FORMAT: &str = "%Y%m%d_%H%M%S";

/// How a raw feed line is rendered after the timestamp prefix.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LineFormat {
    /// `b'...'` bytes literal, compatible with earlier archives.
    #[default]
    BytesLiteral,
    /// Lossy UTF-8 text.
    Raw,
}

/// `<prefix>_<YYYYMMDD>_<HHMMSS>.<ext>`
pub fn output_file_name(prefix: &str, extension: &str, started: &DateTime<Tz>) -> String {
    format!("{prefix}_{}.{extension}", started.format(FILE_TS_FORMAT))
}

/// `MM/DD/YYYY HH:MM:SS: <line>\n`
pub fn format_record(at: &DateTime<Tz>, line: &[u8], format: LineFormat) -> String {
    let body = match format {
        LineFormat::BytesLiteral => bytes_literal(line),
        LineFormat::Raw => String::from_utf8_lossy(line).into_owned(),
    };
    format!("{}: {body}\n", at.format(RECORD_TS_FORMAT))
}

pub fn bytes_literal(line: &[u8]) -> String {
    let quote = if line.contains(&b'\'') && !line.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };

    let mut out = String::with_capacity(line.len() + 3);
    out.push('b');
    out.push(quote as char);
    for &b in line {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            _ if b == quote => {
                out.push('\\');
                out.push(quote as char);
            }
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
    }
    out.push(quote as char);
    out
}
