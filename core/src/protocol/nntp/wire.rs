/*
 * wire.rs
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

//! Line framing over the socket (RFC 3977 §3.1). Commands and responses are
//! CRLF-terminated; multi-line bodies end with a lone `.` and dot-stuff any
//! line starting with `.`. Raw (non-UTF-8) line reads exist because yEnc
//! encoded bytes overlap with invalid UTF-8 sequences; the framing is the
//! same, only the decoding differs.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::error::{NntpError, Result};

fn closed() -> NntpError {
    NntpError::Connection("connection closed".into())
}

/// Read one CRLF-terminated line as raw bytes into `buf` (terminator stripped).
/// A bare LF is tolerated. Fails when the peer closes before the terminator.
pub async fn read_raw_line<S>(stream: &mut S, buf: &mut Vec<u8>) -> Result<()>
where
    S: AsyncBufRead + Unpin,
{
    buf.clear();
    let n = stream.read_until(b'\n', buf).await?;
    if n == 0 {
        return Err(closed());
    }
    if buf.ends_with(b"\r\n") {
        buf.truncate(buf.len() - 2);
    } else if buf.ends_with(b"\n") {
        buf.truncate(buf.len() - 1);
    } else {
        // EOF in the middle of a line
        return Err(closed());
    }
    Ok(())
}

/// Read one CRLF-terminated line, decoded as UTF-8 (lossily, as status lines
/// are ASCII by protocol).
pub async fn read_line<S>(stream: &mut S, buf: &mut Vec<u8>) -> Result<String>
where
    S: AsyncBufRead + Unpin,
{
    read_raw_line(stream, buf).await?;
    Ok(String::from_utf8_lossy(buf).to_string())
}

/// Read data lines until the lone `.` terminator, applying dot-unstuffing
/// (a leading `..` becomes a single leading `.`).
pub async fn read_multiline<S>(stream: &mut S, buf: &mut Vec<u8>) -> Result<Vec<String>>
where
    S: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    loop {
        let line = read_line(stream, buf).await?;
        if line == "." {
            return Ok(lines);
        }
        if let Some(stripped) = line.strip_prefix("..") {
            lines.push(format!(".{}", stripped));
        } else {
            lines.push(line);
        }
    }
}

/// Write a command line: append CRLF and flush.
pub async fn write_line<S>(stream: &mut S, line: &str) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(line.as_bytes()).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await?;
    Ok(())
}

/// Write an article body for POST/IHAVE: each line dot-stuffed and
/// CRLF-terminated, followed by the `.` terminator line.
pub async fn write_multiline_body<S>(stream: &mut S, body: &str) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    for line in body.lines() {
        if line.starts_with('.') {
            stream.write_all(b".").await?;
        }
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
    }
    stream.write_all(b".\r\n").await?;
    stream.flush().await?;
    Ok(())
}
