/*
 * mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Scripted in-process NNTP server for integration tests: accepts any number
 * of connections, greets each with 200, and answers every command line
 * through the supplied responder. POST/IHAVE data phases are handled by
 * consuming lines up to the lone "." before sending the final status.
 */

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

pub struct MockServer {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
}

impl MockServer {
    /// Number of connections accepted so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Start a mock server; `respond` maps one command line to the raw reply
/// bytes. An empty reply closes the connection.
pub async fn spawn_mock<F>(respond: F) -> MockServer
where
    F: Fn(&str) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);
    let respond = Arc::new(respond);
    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return,
            };
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve_connection(stream, Arc::clone(&respond)));
        }
    });
    MockServer { addr, connections }
}

async fn serve_connection<F>(stream: TcpStream, respond: Arc<F>)
where
    F: Fn(&str) -> Vec<u8> + Send + Sync + 'static,
{
    let mut stream = BufReader::new(stream);
    if stream.get_mut().write_all(b"200 mock server ready\r\n").await.is_err() {
        return;
    }
    let mut line = String::new();
    loop {
        line.clear();
        match stream.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let cmd = line.trim_end().to_string();
        if cmd == "QUIT" {
            let _ = stream.get_mut().write_all(b"205 bye\r\n").await;
            return;
        }
        let reply = respond(&cmd);
        if reply.is_empty() {
            return;
        }
        if stream.get_mut().write_all(&reply).await.is_err() {
            return;
        }
        // two-phase commands: consume the article data, then acknowledge
        let final_status: Option<&[u8]> = if reply.starts_with(b"340") {
            Some(b"240 article received\r\n")
        } else if reply.starts_with(b"335") {
            Some(b"235 article transferred\r\n")
        } else {
            None
        };
        if let Some(status) = final_status {
            loop {
                line.clear();
                match stream.read_line(&mut line).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                }
                if line.trim_end() == "." {
                    break;
                }
            }
            if stream.get_mut().write_all(status).await.is_err() {
                return;
            }
        }
    }
}

/// Test-side yEnc encoder: +42 with escaping and NNTP dot-stuffing, one line
/// per `line_len` encoded characters.
#[allow(dead_code)]
pub fn yenc_encode(data: &[u8], line_len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut col = 0;
    let mut line_start = true;
    for &b in data {
        let e = b.wrapping_add(42);
        if matches!(e, 0x00 | b'\r' | b'\n' | b'=') {
            out.push(b'=');
            out.push(e.wrapping_add(64));
            col += 2;
        } else {
            if line_start && e == b'.' {
                out.push(b'.');
            }
            out.push(e);
            col += 1;
        }
        line_start = false;
        if col >= line_len {
            out.extend_from_slice(b"\r\n");
            col = 0;
            line_start = true;
        }
    }
    if col > 0 {
        out.extend_from_slice(b"\r\n");
    }
    out
}
