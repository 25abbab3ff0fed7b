/*
 * header.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Argano, a streaming NNTP client for binary newsgroups.
 *
 * Argano is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Argano is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Argano.  If not, see <http://www.gnu.org/licenses/>.
 */

//! yEnc control-line parsing: `=ybegin`, `=ypart`, `=yend`. Attributes are
//! space-separated `key=value` pairs, except `name`, which may contain spaces
//! and is always the final field of `=ybegin`.

use crate::protocol::nntp::{NntpError, Result};

/// Declarations from `=ybegin` (and `=ypart` for multi-part articles).
#[derive(Debug, Clone)]
pub struct YencHeaders {
    /// Nominal encoded line length.
    pub line: u16,
    /// Size of the (whole) decoded file in bytes.
    pub size: i64,
    /// File name; may contain spaces.
    pub name: String,
    pub part: Option<u16>,
    pub total: Option<u16>,
    /// First byte offset (1-based, inclusive) declared by `=ypart`.
    pub part_begin: Option<i64>,
    /// Last byte offset (inclusive) declared by `=ypart`.
    pub part_end: Option<i64>,
}

/// Declarations from `=yend`.
#[derive(Debug, Clone)]
pub struct YencTrailer {
    pub size: i64,
    /// CRC-32 of the whole file, when declared.
    pub crc32: Option<u32>,
    /// CRC-32 of this part, when declared. Preferred over `crc32` for checking.
    pub pcrc32: Option<u32>,
    pub part: Option<u16>,
}

fn malformed(what: &str, line: &str) -> NntpError {
    NntpError::YencMalformed(format!("{}: {:?}", what, line))
}

/// Split a control-line payload into its `key=value` attribute part and the
/// trailing `name=` part (which keeps spaces verbatim).
fn split_name(payload: &str) -> (&str, Option<&str>) {
    if let Some(rest) = payload.strip_prefix("name=") {
        return ("", Some(rest));
    }
    match payload.find(" name=") {
        Some(i) => (&payload[..i], Some(&payload[i + 6..])),
        None => (payload, None),
    }
}

fn attributes(payload: &str) -> impl Iterator<Item = (&str, &str)> {
    payload.split_whitespace().filter_map(|token| token.split_once('='))
}

fn parse_hex_u32(value: &str) -> Option<u32> {
    let digits = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")).unwrap_or(value);
    u32::from_str_radix(digits, 16).ok()
}

/// Parse a full `=ybegin` line.
pub fn parse_ybegin(line: &str) -> Result<YencHeaders> {
    let payload = line
        .strip_prefix("=ybegin ")
        .ok_or_else(|| malformed("not a =ybegin line", line))?;
    let (attrs, name) = split_name(payload);
    let mut line_len: Option<u16> = None;
    let mut size: Option<i64> = None;
    let mut part: Option<u16> = None;
    let mut total: Option<u16> = None;
    for (key, value) in attributes(attrs) {
        match key {
            "line" => line_len = value.parse().ok(),
            "size" => size = value.parse().ok(),
            "part" => part = value.parse().ok(),
            "total" => total = value.parse().ok(),
            _ => {}
        }
    }
    Ok(YencHeaders {
        line: line_len.ok_or_else(|| malformed("=ybegin missing line", line))?,
        size: size.ok_or_else(|| malformed("=ybegin missing size", line))?,
        name: name.ok_or_else(|| malformed("=ybegin missing name", line))?.to_string(),
        part,
        total,
        part_begin: None,
        part_end: None,
    })
}

/// Parse a full `=ypart` line into the headers' part range.
pub fn apply_ypart(headers: &mut YencHeaders, line: &str) -> Result<()> {
    let payload = line
        .strip_prefix("=ypart ")
        .ok_or_else(|| malformed("not a =ypart line", line))?;
    let mut begin: Option<i64> = None;
    let mut end: Option<i64> = None;
    for (key, value) in attributes(payload) {
        match key {
            "begin" => begin = value.parse().ok(),
            "end" => end = value.parse().ok(),
            _ => {}
        }
    }
    headers.part_begin = Some(begin.ok_or_else(|| malformed("=ypart missing begin", line))?);
    headers.part_end = Some(end.ok_or_else(|| malformed("=ypart missing end", line))?);
    Ok(())
}

/// Parse a full `=yend` line.
pub fn parse_yend(line: &str) -> Result<YencTrailer> {
    let payload = line
        .strip_prefix("=yend")
        .ok_or_else(|| malformed("not a =yend line", line))?
        .trim_start();
    let mut size: Option<i64> = None;
    let mut crc32: Option<u32> = None;
    let mut pcrc32: Option<u32> = None;
    let mut part: Option<u16> = None;
    for (key, value) in attributes(payload) {
        match key {
            "size" => size = value.parse().ok(),
            "crc32" => crc32 = parse_hex_u32(value),
            "pcrc32" => pcrc32 = parse_hex_u32(value),
            "part" => part = value.parse().ok(),
            _ => {}
        }
    }
    Ok(YencTrailer {
        size: size.ok_or_else(|| malformed("=yend missing size", line))?,
        crc32,
        pcrc32,
        part,
    })
}
