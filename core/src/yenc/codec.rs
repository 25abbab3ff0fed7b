/*
 * codec.rs
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

//! Incremental yEnc byte kernel. Plain bytes decode as `b - 42`, `=`-escaped
//! bytes as `b - 106`, CR/LF are framing and never data, and NNTP dot-stuffing
//! (leading `..`) is undone inline. The decoder is resumable at any chunk
//! boundary: every lookahead it needs is either encoded in `DecoderState` or
//! handled by leaving the ambiguous byte unconsumed (`bytes_consumed` short of
//! the chunk length), so the caller retains the tail and resubmits it.
//!
//! Two stop conditions surface as end markers: a line starting `=y` at line
//! start (`Control`, typically `=yend`; the line itself is left unconsumed so
//! the caller can parse it), and the article terminator `CRLF . CRLF`
//! (`Article`, consumed).

/// Where the decoder is relative to line structure. `Crlf` is the initial
/// state: the last thing seen was a line boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// At the start of a line.
    Crlf,
    /// Mid-line.
    Data,
    /// Saw `=` mid-line; the next byte decodes as escaped.
    Escape,
    /// Saw CR mid-line; LF expected.
    Cr,
    /// Saw `.` at line start; could be dot-stuffing or the terminator.
    CrlfDot,
    /// Saw `.` CR at line start; LF would complete the terminator.
    CrlfDotCr,
}

impl Default for DecoderState {
    fn default() -> Self {
        DecoderState::Crlf
    }
}

/// Why `decode_incremental` stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndMarker {
    /// Chunk exhausted (or an ambiguous final byte left unconsumed).
    None,
    /// Stopped at a `=y` control line; `bytes_consumed` points at its `=`.
    Control,
    /// Stopped past the NNTP article terminator, which was consumed.
    Article,
}

#[derive(Debug)]
pub struct DecodeOutput {
    pub data: Vec<u8>,
    pub bytes_consumed: usize,
    pub state: DecoderState,
    pub end: EndMarker,
}

/// Decode one chunk. `bytes_consumed <= chunk.len()`; on `EndMarker::None` the
/// caller appends fresh input to the unconsumed tail and calls again.
pub fn decode_incremental(chunk: &[u8], state: DecoderState) -> DecodeOutput {
    let mut data = Vec::with_capacity(chunk.len());
    let mut state = state;
    let mut i = 0;
    while i < chunk.len() {
        let b = chunk[i];
        let mut advance = true;
        match state {
            DecoderState::Crlf => match b {
                b'\r' => state = DecoderState::Cr,
                b'\n' => {}
                b'.' => state = DecoderState::CrlfDot,
                b'=' => {
                    if i + 1 >= chunk.len() {
                        // control line or escape? cannot tell without the next byte
                        return DecodeOutput { data, bytes_consumed: i, state, end: EndMarker::None };
                    }
                    if chunk[i + 1] == b'y' {
                        return DecodeOutput {
                            data,
                            bytes_consumed: i,
                            state,
                            end: EndMarker::Control,
                        };
                    }
                    state = DecoderState::Escape;
                }
                _ => {
                    data.push(b.wrapping_sub(42));
                    state = DecoderState::Data;
                }
            },
            DecoderState::CrlfDot => match b {
                b'.' => {
                    // stuffed dot dropped; the second is data
                    data.push(b'.'.wrapping_sub(42));
                    state = DecoderState::Data;
                }
                b'\r' => state = DecoderState::CrlfDotCr,
                b'\n' => {
                    // lone "." line with a bare LF: tolerate as the terminator
                    return DecodeOutput {
                        data,
                        bytes_consumed: i + 1,
                        state: DecoderState::Crlf,
                        end: EndMarker::Article,
                    };
                }
                _ => {
                    // unpaired leading dot; treat it as data
                    data.push(b'.'.wrapping_sub(42));
                    state = DecoderState::Data;
                    advance = false;
                }
            },
            DecoderState::CrlfDotCr => match b {
                b'\n' => {
                    return DecodeOutput {
                        data,
                        bytes_consumed: i + 1,
                        state: DecoderState::Crlf,
                        end: EndMarker::Article,
                    };
                }
                _ => {
                    data.push(b'.'.wrapping_sub(42));
                    state = DecoderState::Cr;
                    advance = false;
                }
            },
            DecoderState::Cr => match b {
                b'\n' => state = DecoderState::Crlf,
                b'\r' => {}
                _ => {
                    // stray CR; the byte belongs to the current line
                    state = DecoderState::Data;
                    advance = false;
                }
            },
            DecoderState::Data => match b {
                b'\r' => state = DecoderState::Cr,
                b'\n' => state = DecoderState::Crlf,
                b'=' => state = DecoderState::Escape,
                _ => data.push(b.wrapping_sub(42)),
            },
            DecoderState::Escape => {
                data.push(b.wrapping_sub(106));
                state = DecoderState::Data;
            }
        }
        if advance {
            i += 1;
        }
    }
    DecodeOutput { data, bytes_consumed: chunk.len(), state, end: EndMarker::None }
}

/// CRC-32 (IEEE) over `data`, continuing from `init`. `crc32(b, crc32(a, 0))`
/// equals `crc32(a ++ b, 0)`.
pub fn crc32(data: &[u8], init: u32) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(init);
    hasher.update(data);
    hasher.finalize()
}
