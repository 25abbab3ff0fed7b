/*
 * error.rs
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

//! NNTP client errors. `Connection` is the one retriable class: the pool
//! retries a failed block once on a different connection when the block failed
//! with it. Everything else propagates to the caller unchanged.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NntpError>;

#[derive(Debug, Error)]
pub enum NntpError {
    /// Socket closed unexpectedly, write failure, or missing welcome line.
    #[error("connection error: {0}")]
    Connection(String),

    /// Unexpected status code or a malformed response line.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// AUTHINFO USER/PASS rejected by the server.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// 430/423 on an article-family command.
    #[error("article not found: {0}")]
    ArticleNotFound(String),

    /// Missing `=ybegin`, missing mandatory fields, or unexpected preamble data.
    #[error("malformed yEnc data: {0}")]
    YencMalformed(String),

    /// Decoded bytes do not hash to the CRC the trailer declared.
    #[error("CRC mismatch: expected {expected:08x}, actual {actual:08x}")]
    CrcMismatch { expected: u32, actual: u32 },

    /// The pool was closed while the caller was waiting for a connection.
    #[error("connection pool is closed")]
    PoolClosed,
}

impl NntpError {
    /// True for the class of failures the pool is allowed to retry.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, NntpError::Connection(_))
    }
}

impl From<io::Error> for NntpError {
    fn from(e: io::Error) -> Self {
        NntpError::Connection(e.to_string())
    }
}
