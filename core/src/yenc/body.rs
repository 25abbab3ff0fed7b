/*
 * body.rs
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

//! Streaming yEnc body pipeline. Entered after `BODY` answered 222 with the
//! command lock transferred in; emits the parsed headers, then a byte stream
//! the consumer reads at its own pace while a worker drives the socket
//! through the incremental decoder. On clean completion the socket has been
//! drained through the article terminator and the lock is simply released;
//! on error, cancellation, or an abandoned stream the worker resets the
//! socket and schedules a reconnect before releasing, so the next command on
//! this connection blocks until the rebuild finishes.

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use crate::protocol::nntp::connection::{CommandGuard, ConnIo};
use crate::protocol::nntp::{wire, NntpError, Result};

use super::codec::{crc32, decode_incremental, DecoderState, EndMarker};
use super::header::{apply_ypart, parse_ybegin, parse_yend, YencHeaders};

const READ_CHUNK: usize = 128 * 1024;
const BODY_CHANNEL_CAPACITY: usize = 8;

/// The two events of a body fetch, in order: headers, then the byte stream.
pub enum YencEvent {
    Headers(YencHeaders),
    Body(YencBody),
}

/// Decoded byte stream. Dropping it before the end abandons the decode; the
/// connection resets itself in the background.
pub struct YencBody {
    rx: mpsc::Receiver<Result<Bytes>>,
}

impl YencBody {
    /// Next decoded chunk. `None` once the stream has completed cleanly;
    /// an `Err` chunk (CRC mismatch, connection loss) is the final item.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
        self.rx.recv().await
    }

    /// Drain the whole stream into one buffer.
    pub async fn read_to_end(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.rx.recv().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

/// Result of a body fetch: yields `Headers` then `Body`, exactly once each.
pub struct YencEventStream {
    headers: YencHeaders,
    emitted_headers: bool,
    body: Option<YencBody>,
}

impl YencEventStream {
    pub fn headers(&self) -> &YencHeaders {
        &self.headers
    }

    pub fn next_event(&mut self) -> Option<YencEvent> {
        if !self.emitted_headers {
            self.emitted_headers = true;
            return Some(YencEvent::Headers(self.headers.clone()));
        }
        self.body.take().map(YencEvent::Body)
    }

    /// The byte stream, if not already taken via `next_event`.
    pub fn take_body(&mut self) -> Option<YencBody> {
        self.emitted_headers = true;
        self.body.take()
    }
}

/// Parse the preamble and spawn the decode worker. The guard travels into the
/// worker, which owns the socket until the stream ends one way or the other.
pub(crate) async fn fetch_body(mut guard: CommandGuard) -> Result<YencEventStream> {
    let (headers, pending) = match read_preamble(&mut guard).await {
        Ok(v) => v,
        Err(e) => {
            guard.fail().await;
            return Err(e);
        }
    };
    let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
    tokio::spawn(decode_worker(guard, pending, tx));
    Ok(YencEventStream { headers, emitted_headers: false, body: Some(YencBody { rx }) })
}

/// Parse the preamble only. The body bytes are left unread, so the connection
/// is always scheduled for a reconnect before the lock is released.
pub(crate) async fn fetch_headers_only(mut guard: CommandGuard) -> Result<YencHeaders> {
    let result = read_preamble(&mut guard).await;
    guard.fail().await;
    result.map(|(headers, _)| headers)
}

/// Skip blank lines to `=ybegin`, parse it, and classify the following raw
/// line: a `=ypart` declaration, or the first chunk of encoded data (returned
/// with its CRLF restored so the decoder sees the original framing).
async fn read_preamble(guard: &mut CommandGuard) -> Result<(YencHeaders, Vec<u8>)> {
    let io = &mut *guard.io;
    let begin_line = loop {
        let line = wire::read_line(&mut io.stream, &mut io.line_buf).await?;
        if line.is_empty() {
            continue;
        }
        if line.starts_with("=ybegin ") {
            break line;
        }
        return Err(NntpError::YencMalformed(format!(
            "unexpected line before =ybegin: {:?}",
            line
        )));
    };
    let mut headers = parse_ybegin(&begin_line)?;
    // encoded bytes are not valid UTF-8, so from here reads are raw
    wire::read_raw_line(&mut io.stream, &mut io.line_buf).await?;
    if io.line_buf.starts_with(b"=ypart ") {
        let line = String::from_utf8_lossy(&io.line_buf).to_string();
        apply_ypart(&mut headers, &line)?;
        Ok((headers, Vec::new()))
    } else {
        let mut pending = io.line_buf.clone();
        pending.extend_from_slice(b"\r\n");
        Ok((headers, pending))
    }
}

enum Completion {
    /// Stream and terminator fully consumed; the socket is ready for the next command.
    Clean,
    /// Output is complete but the socket is not reusable.
    SocketDead,
}

async fn decode_worker(mut guard: CommandGuard, pending: Vec<u8>, tx: mpsc::Sender<Result<Bytes>>) {
    match run_decode(&mut guard, pending, &tx).await {
        Ok(Completion::Clean) => {}
        Ok(Completion::SocketDead) => guard.fail().await,
        Err(e) => {
            guard.fail().await;
            let _ = tx.send(Err(e)).await;
        }
    }
}

async fn run_decode(
    guard: &mut CommandGuard,
    mut pending: Vec<u8>,
    tx: &mpsc::Sender<Result<Bytes>>,
) -> Result<Completion> {
    let io = &mut *guard.io;
    let mut state = DecoderState::Crlf;
    let mut crc: u32 = 0;
    let mut read_buf = vec![0u8; READ_CHUNK];
    loop {
        let out = decode_incremental(&pending, state);
        state = out.state;
        if !out.data.is_empty() {
            crc = crc32(&out.data, crc);
            if tx.send(Ok(Bytes::from(out.data))).await.is_err() {
                return Err(NntpError::Connection("body stream abandoned by consumer".into()));
            }
        }
        match out.end {
            EndMarker::Article => return Ok(Completion::Clean),
            EndMarker::Control => {
                pending.drain(..out.bytes_consumed);
                return finish_control(io, pending, crc).await;
            }
            EndMarker::None => {
                pending.drain(..out.bytes_consumed);
                let n = io.stream.read(&mut read_buf).await?;
                if n == 0 {
                    if pending.is_empty() && state == DecoderState::Crlf {
                        // clean close at the trailer boundary: accepted, no CRC check
                        return Ok(Completion::SocketDead);
                    }
                    return Err(NntpError::Connection("connection closed mid-body".into()));
                }
                pending.extend_from_slice(&read_buf[..n]);
            }
        }
    }
}

/// Parse the `=yend` trailer out of the control-line remainder, check the CRC,
/// and drain the socket through the article terminator, which may lag the
/// trailer.
async fn finish_control(io: &mut ConnIo, mut rest: Vec<u8>, crc: u32) -> Result<Completion> {
    let line_end = loop {
        if let Some(pos) = find_crlf(&rest) {
            break pos;
        }
        let mut buf = [0u8; 4096];
        let n = io.stream.read(&mut buf).await?;
        if n == 0 {
            return Err(NntpError::Connection("connection closed in yEnc trailer".into()));
        }
        rest.extend_from_slice(&buf[..n]);
    };
    let line = String::from_utf8_lossy(&rest[..line_end]).to_string();
    if !line.starts_with("=yend") {
        return Err(NntpError::YencMalformed(format!("expected =yend, got: {:?}", line)));
    }
    let trailer = parse_yend(&line)?;
    if let Some(expected) = trailer.pcrc32.or(trailer.crc32) {
        if expected != crc {
            return Err(NntpError::CrcMismatch { expected, actual: crc });
        }
    }
    // The CRLF that closed the =yend line counts as the start of the sequence.
    let mut scanner = TerminatorScanner::after_crlf();
    if scanner.feed(&rest[line_end + 2..]) {
        return Ok(Completion::Clean);
    }
    loop {
        let mut buf = [0u8; 4096];
        let n = io.stream.read(&mut buf).await?;
        if n == 0 {
            // trailer parsed and checked; the server hung up before terminating
            return Ok(Completion::SocketDead);
        }
        if scanner.feed(&buf[..n]) {
            return Ok(Completion::Clean);
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

const TERMINATOR: &[u8] = b"\r\n.\r\n";

/// Byte-at-a-time matcher for the article terminator.
struct TerminatorScanner {
    matched: usize,
}

impl TerminatorScanner {
    fn after_crlf() -> Self {
        Self { matched: 2 }
    }

    fn feed(&mut self, bytes: &[u8]) -> bool {
        for &b in bytes {
            if b == TERMINATOR[self.matched] {
                self.matched += 1;
                if self.matched == TERMINATOR.len() {
                    return true;
                }
            } else if b == b'\r' {
                self.matched = 1;
            } else {
                self.matched = 0;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminator_directly_after_trailer() {
        let mut s = TerminatorScanner::after_crlf();
        assert!(s.feed(b".\r\n"));
    }

    #[test]
    fn terminator_after_lagging_lines() {
        let mut s = TerminatorScanner::after_crlf();
        assert!(!s.feed(b"some trailing garbage\r\nmore"));
        assert!(s.feed(b"\r\n.\r\n"));
    }

    #[test]
    fn terminator_with_false_start() {
        let mut s = TerminatorScanner::after_crlf();
        assert!(!s.feed(b".\r\r\n"));
        assert!(s.feed(b".\r\n"));
    }

    #[test]
    fn terminator_across_feeds() {
        let mut s = TerminatorScanner::after_crlf();
        assert!(!s.feed(b"."));
        assert!(!s.feed(b"\r"));
        assert!(s.feed(b"\n"));
    }

    #[test]
    fn crlf_search() {
        assert_eq!(find_crlf(b"=yend size=3\r\n."), Some(12));
        assert_eq!(find_crlf(b"=yend size=3"), None);
    }
}
