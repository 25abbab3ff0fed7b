/*
 * connection.rs
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

//! One NNTP connection: a socket behind a command lock. The lock is held for
//! the whole of a command exchange (write through every read), so commands
//! appear on the wire in lock-acquisition order and never interleave. A
//! detected connection failure schedules a background reconnect task that
//! rebuilds the socket in place and replays AUTHINFO from stored credentials;
//! every command entry point awaits the pending task before touching the
//! socket, so callers never see a half-open stream.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

use crate::net::NntpStream;

use super::error::{NntpError, Result};
use super::response::{parse_response_line, Response};
use super::wire;

/// Socket plus scratch buffer, guarded by the command lock.
pub(crate) struct ConnIo {
    pub(crate) stream: BufReader<NntpStream>,
    pub(crate) line_buf: Vec<u8>,
}

struct ConnShared {
    host: String,
    port: u16,
    use_tls: bool,
    /// Set only after a successful AUTHINFO exchange; cleared on explicit close.
    credentials: StdMutex<Option<(String, String)>>,
    /// Pending reconnect. Commands take and await this before writing.
    reconnect: StdMutex<Option<JoinHandle<Result<ConnIo>>>>,
}

/// Command lock ownership, handed to the yEnc pipeline by `command_raw` so it
/// keeps exclusive use of the socket across the whole body stream. Dropping
/// the guard releases the lock; `fail` first resets the socket in the
/// background so the connection is rebuilt before its next command.
pub(crate) struct CommandGuard {
    pub(crate) io: OwnedMutexGuard<ConnIo>,
    shared: Arc<ConnShared>,
}

impl CommandGuard {
    pub(crate) async fn fail(&mut self) {
        let _ = self.io.stream.get_mut().shutdown().await;
        schedule_reconnect(&self.shared);
    }
}

async fn open_io(host: &str, port: u16, use_tls: bool) -> Result<(ConnIo, Response)> {
    let stream = NntpStream::connect(host, port, use_tls).await?;
    let mut io = ConnIo {
        stream: BufReader::with_capacity(64 * 1024, stream),
        line_buf: Vec::with_capacity(4096),
    };
    let line = wire::read_line(&mut io.stream, &mut io.line_buf).await?;
    let welcome = parse_response_line(&line)?;
    Ok((io, welcome))
}

async fn authinfo_exchange(io: &mut ConnIo, user: &str, pass: &str) -> Result<()> {
    wire::write_line(&mut io.stream, &format!("AUTHINFO USER {}", user)).await?;
    let line = wire::read_line(&mut io.stream, &mut io.line_buf).await?;
    let status = parse_response_line(&line)?;
    match status.code {
        // some servers authenticate on the username alone
        281 => return Ok(()),
        381 => {}
        _ => {
            return Err(NntpError::AuthenticationFailed(format!(
                "AUTHINFO USER rejected: {} {}",
                status.code, status.message
            )))
        }
    }
    wire::write_line(&mut io.stream, &format!("AUTHINFO PASS {}", pass)).await?;
    let line = wire::read_line(&mut io.stream, &mut io.line_buf).await?;
    let status = parse_response_line(&line)?;
    if status.code == 281 {
        Ok(())
    } else {
        Err(NntpError::AuthenticationFailed(format!(
            "AUTHINFO PASS rejected: {} {}",
            status.code, status.message
        )))
    }
}

/// Open a fresh socket, consume the welcome, replay stored credentials.
async fn rebuild(shared: Arc<ConnShared>) -> Result<ConnIo> {
    let (mut io, welcome) = open_io(&shared.host, shared.port, shared.use_tls).await?;
    if welcome.code != 200 && welcome.code != 201 {
        return Err(NntpError::Connection(format!(
            "unexpected welcome on reconnect: {} {}",
            welcome.code, welcome.message
        )));
    }
    let credentials = shared.credentials.lock().unwrap().clone();
    if let Some((user, pass)) = credentials {
        authinfo_exchange(&mut io, &user, &pass).await?;
    }
    log::debug!("reconnected to {}:{}", shared.host, shared.port);
    Ok(io)
}

fn schedule_reconnect(shared: &Arc<ConnShared>) {
    let mut slot = shared.reconnect.lock().unwrap();
    if slot.is_some() {
        return;
    }
    log::debug!("scheduling reconnect to {}:{}", shared.host, shared.port);
    let shared = Arc::clone(shared);
    *slot = Some(tokio::spawn(rebuild(shared)));
}

/// A framed NNTP connection. Not usable concurrently: every operation
/// serialises on the command lock. Share it through the pool instead.
pub struct NntpConnection {
    io: Arc<Mutex<ConnIo>>,
    shared: Arc<ConnShared>,
    welcome: Response,
    posting_allowed: bool,
}

impl NntpConnection {
    /// Open the socket and read the welcome line. 200/201 are accepted
    /// (posting allowed/prohibited); anything else closes the socket.
    pub async fn connect(host: &str, port: u16, use_tls: bool) -> Result<Self> {
        let (mut io, welcome) = open_io(host, port, use_tls).await?;
        if welcome.code != 200 && welcome.code != 201 {
            let _ = io.stream.get_mut().shutdown().await;
            return Err(NntpError::Protocol(format!(
                "unexpected welcome: {} {}",
                welcome.code, welcome.message
            )));
        }
        log::debug!("connected to {}:{} ({})", host, port, welcome.code);
        Ok(Self {
            posting_allowed: welcome.code == 200,
            io: Arc::new(Mutex::new(io)),
            shared: Arc::new(ConnShared {
                host: host.to_string(),
                port,
                use_tls,
                credentials: StdMutex::new(None),
                reconnect: StdMutex::new(None),
            }),
            welcome,
        })
    }

    pub fn welcome(&self) -> &Response {
        &self.welcome
    }

    pub fn posting_allowed(&self) -> bool {
        self.posting_allowed
    }

    /// Await the pending reconnect, if any, installing the fresh socket.
    pub async fn ensure_connected(&self) -> Result<()> {
        let mut io = self.io.lock().await;
        self.ensure_io(&mut io).await
    }

    async fn ensure_io(&self, io: &mut ConnIo) -> Result<()> {
        let pending = self.shared.reconnect.lock().unwrap().take();
        if let Some(handle) = pending {
            match handle.await {
                Ok(Ok(new_io)) => *io = new_io,
                Ok(Err(e)) => {
                    // leave a fresh attempt behind so the connection can heal
                    schedule_reconnect(&self.shared);
                    return Err(e);
                }
                Err(e) => {
                    schedule_reconnect(&self.shared);
                    return Err(NntpError::Connection(format!("reconnect task failed: {}", e)));
                }
            }
        }
        Ok(())
    }

    /// Mark this connection for rebuilding before its next command.
    pub fn schedule_reconnect(&self) {
        schedule_reconnect(&self.shared);
    }

    async fn fail_io(&self, io: &mut ConnIo) {
        let _ = io.stream.get_mut().shutdown().await;
        schedule_reconnect(&self.shared);
    }

    async fn try_exchange(&self, io: &mut ConnIo, cmd: &str) -> Result<Response> {
        log::trace!("C: {}", cmd);
        wire::write_line(&mut io.stream, cmd).await?;
        let line = wire::read_line(&mut io.stream, &mut io.line_buf).await?;
        let response = parse_response_line(&line)?;
        log::trace!("S: {} {}", response.code, response.message);
        Ok(response)
    }

    async fn exchange(&self, io: &mut ConnIo, cmd: &str) -> Result<Response> {
        match self.try_exchange(io, cmd).await {
            Err(e) if e.is_connection_error() => {
                self.fail_io(io).await;
                Err(e)
            }
            r => r,
        }
    }

    /// Single-line command: write, read the status line.
    pub async fn command(&self, cmd: &str) -> Result<Response> {
        let mut io = self.io.lock().await;
        self.ensure_io(&mut io).await?;
        self.exchange(&mut io, cmd).await
    }

    /// Multi-line command: a 1xx/2xx status is followed by a dot-terminated
    /// body, which is read and unstuffed; any other status returns no lines.
    pub async fn command_multiline(&self, cmd: &str) -> Result<(Response, Vec<String>)> {
        let mut guard = self.io.lock().await;
        let io = &mut *guard;
        self.ensure_io(io).await?;
        let response = self.exchange(io, cmd).await?;
        if !response.is_multiline_success() {
            return Ok((response, Vec::new()));
        }
        match wire::read_multiline(&mut io.stream, &mut io.line_buf).await {
            Ok(lines) => Ok((response, lines)),
            Err(e) => {
                if e.is_connection_error() {
                    self.fail_io(io).await;
                }
                Err(e)
            }
        }
    }

    /// Raw command: write, read the status line, and transfer the command lock
    /// to the caller, who owns the byte channel until the guard drops.
    pub(crate) async fn command_raw(&self, cmd: &str) -> Result<(Response, CommandGuard)> {
        let io = Arc::clone(&self.io).lock_owned().await;
        let mut guard = CommandGuard { io, shared: Arc::clone(&self.shared) };
        self.ensure_io(&mut guard.io).await?;
        match self.try_exchange(&mut guard.io, cmd).await {
            Ok(response) => Ok((response, guard)),
            Err(e) => {
                if e.is_connection_error() {
                    guard.fail().await;
                }
                Err(e)
            }
        }
    }

    /// AUTHINFO USER/PASS (RFC 4643). On success the credentials are stored
    /// for replay by future reconnects.
    pub async fn authinfo(&self, user: &str, pass: &str) -> Result<()> {
        let mut io = self.io.lock().await;
        self.ensure_io(&mut io).await?;
        match authinfo_exchange(&mut io, user, pass).await {
            Ok(()) => {
                *self.shared.credentials.lock().unwrap() =
                    Some((user.to_string(), pass.to_string()));
                Ok(())
            }
            Err(e) => {
                if e.is_connection_error() {
                    self.fail_io(&mut io).await;
                }
                Err(e)
            }
        }
    }

    /// Two-phase POST/IHAVE: send `cmd`, require `expect_continue` (340/335),
    /// write the dot-stuffed article and terminator, read the final status.
    pub async fn command_with_body(
        &self,
        cmd: &str,
        expect_continue: u16,
        body: &str,
    ) -> Result<Response> {
        let mut guard = self.io.lock().await;
        let io = &mut *guard;
        self.ensure_io(io).await?;
        let initial = self.exchange(io, cmd).await?;
        if initial.code != expect_continue {
            return Err(NntpError::Protocol(format!(
                "{} not accepted: {} {}",
                cmd, initial.code, initial.message
            )));
        }
        let sent = async {
            wire::write_multiline_body(&mut io.stream, body).await?;
            let line = wire::read_line(&mut io.stream, &mut io.line_buf).await?;
            parse_response_line(&line)
        }
        .await;
        match sent {
            Err(e) if e.is_connection_error() => {
                self.fail_io(io).await;
                Err(e)
            }
            r => r,
        }
    }

    /// Abort any pending reconnect and forget stored credentials.
    pub(crate) fn abort(&self) {
        if let Some(handle) = self.shared.reconnect.lock().unwrap().take() {
            handle.abort();
        }
        *self.shared.credentials.lock().unwrap() = None;
    }

    /// Explicit close: abort reconnects, drop credentials, shut the socket down.
    pub async fn close(&self) {
        self.abort();
        let mut io = self.io.lock().await;
        let _ = io.stream.get_mut().shutdown().await;
    }
}
