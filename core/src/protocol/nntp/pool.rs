/*
 * pool.rs
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

//! Bounded connection pool with priority-based fair queuing. Waiters are
//! served highest priority first, FIFO within a priority. Idle connections
//! get a DATE probe every keepalive interval; after the idle grace period the
//! pool sleeps (closes its sockets) and wakes transparently on the next use.
//! A command block failing with a connection error is retried once on a
//! (possibly different) connection; every other error propagates.
//!
//! Connections return to the pool through a lease guard, so every exit path,
//! cancellation included, either hands the connection to exactly one waiter
//! or parks it in the idle set.

use std::collections::{BinaryHeap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};

use crate::config::ServerConfig;
use crate::yenc::YencHeaders;

use super::client::{ArticleRef, NntpClient};
use super::error::{NntpError, Result};
use super::response::{ArticleResponse, GroupResponse, OverviewEntry, StatResponse};

/// A queued acquisition request. Higher priority first; FIFO within a
/// priority via the enqueue sequence number.
struct Waiter {
    priority: i32,
    sequence: u64,
    tx: oneshot::Sender<ClientLease>,
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for Waiter {}

impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Waiter {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // max-heap: higher priority wins, then lower sequence
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct PoolState {
    idle: VecDeque<Arc<NntpClient>>,
    waiters: BinaryHeap<Waiter>,
    waiter_sequence: u64,
    leased: usize,
    closed: bool,
    sleeping: bool,
    keepalive: Option<JoinHandle<()>>,
}

struct PoolShared {
    config: ServerConfig,
    state: StdMutex<PoolState>,
    started: Instant,
    last_activity_ms: AtomicI64,
}

impl PoolShared {
    fn now_ms(&self) -> i64 {
        self.started.elapsed().as_millis() as i64
    }

    fn touch(&self) {
        self.last_activity_ms.store(self.now_ms(), Ordering::Release);
    }

    fn last_activity(&self) -> i64 {
        self.last_activity_ms.load(Ordering::Acquire)
    }
}

/// Exclusive loan of a pooled client. Dropping the lease returns the
/// connection to the pool; the return runs synchronously and cannot be
/// interrupted by cancellation.
pub struct ClientLease {
    client: Option<Arc<NntpClient>>,
    pool: Arc<PoolShared>,
}

impl ClientLease {
    fn new(client: Arc<NntpClient>, pool: Arc<PoolShared>) -> Self {
        Self { client: Some(client), pool }
    }

    pub fn client(&self) -> &Arc<NntpClient> {
        self.client.as_ref().expect("lease already consumed")
    }

    fn into_client(mut self) -> Arc<NntpClient> {
        self.client.take().expect("lease already consumed")
    }
}

impl Drop for ClientLease {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            release(&self.pool, client);
        }
    }
}

/// Return a connection: complete exactly one live waiter with it, or park it.
/// Cancelled waiters encountered along the way are discarded.
fn dispatch(pool: &Arc<PoolShared>, state: &mut PoolState, client: Arc<NntpClient>) {
    let mut client = client;
    loop {
        match state.waiters.pop() {
            Some(waiter) => {
                state.leased += 1;
                match waiter.tx.send(ClientLease::new(client, Arc::clone(pool))) {
                    Ok(()) => return,
                    Err(lease) => {
                        state.leased -= 1;
                        client = lease.into_client();
                    }
                }
            }
            None => {
                state.idle.push_back(client);
                return;
            }
        }
    }
}

fn release(pool: &Arc<PoolShared>, client: Arc<NntpClient>) {
    let mut state = pool.state.lock().unwrap();
    state.leased = state.leased.saturating_sub(1);
    if state.closed {
        drop(state);
        client.connection().abort();
        return;
    }
    dispatch(pool, &mut state, client);
}

/// Transition to sleeping: drain and close idle connections, stop keepalive.
/// `abort_keepalive` is false when called from the keepalive task itself,
/// which exits on its own.
async fn sleep_pool(shared: &Arc<PoolShared>, abort_keepalive: bool) {
    let (drained, keepalive) = {
        let mut state = shared.state.lock().unwrap();
        if state.closed || state.sleeping {
            return;
        }
        state.sleeping = true;
        let drained: Vec<_> = state.idle.drain(..).collect();
        (drained, state.keepalive.take())
    };
    if abort_keepalive {
        if let Some(handle) = keepalive {
            handle.abort();
        }
    }
    log::debug!("pool sleeping; closing {} idle connections", drained.len());
    for client in drained {
        client.close().await;
    }
}

async fn keepalive_loop(shared: Arc<PoolShared>) {
    let interval_ms = shared.config.keepalive_interval_ms.max(1) as u64;
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        {
            let state = shared.state.lock().unwrap();
            if state.closed {
                return;
            }
            if state.sleeping {
                continue;
            }
        }
        let grace = shared.config.idle_grace_period_ms;
        if grace > 0 && shared.now_ms() - shared.last_activity() > grace {
            log::debug!("idle grace period exceeded; pool going to sleep");
            sleep_pool(&shared, false).await;
            return;
        }
        // Drain the idle set and probe each connection. Probed connections
        // are held as leases so an abort mid-probe still returns them.
        let leases: Vec<ClientLease> = {
            let mut state = shared.state.lock().unwrap();
            let n = state.idle.len();
            state.leased += n;
            state
                .idle
                .drain(..)
                .map(|c| ClientLease::new(c, Arc::clone(&shared)))
                .collect()
        };
        for lease in leases {
            if let Err(e) = lease.client().date().await {
                if e.is_connection_error() {
                    log::warn!("keepalive probe failed: {}", e);
                    lease.client().schedule_reconnect();
                } else {
                    log::warn!("keepalive probe got unexpected response: {}", e);
                }
            }
        }
    }
}

/// Bounded pool of NNTP connections, safe for concurrent use from many tasks.
pub struct NntpPool {
    shared: Arc<PoolShared>,
}

impl NntpPool {
    /// Build `max_connections` connections concurrently and start keepalive.
    pub async fn connect(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let max_connections = config.max_connections;
        let pool = Self {
            shared: Arc::new(PoolShared {
                config,
                state: StdMutex::new(PoolState {
                    idle: VecDeque::new(),
                    waiters: BinaryHeap::new(),
                    waiter_sequence: 0,
                    leased: 0,
                    closed: false,
                    sleeping: false,
                    keepalive: None,
                }),
                started: Instant::now(),
                last_activity_ms: AtomicI64::new(0),
            }),
        };
        let clients = pool.build_connections(max_connections).await?;
        {
            let mut state = pool.shared.state.lock().unwrap();
            state.idle.extend(clients);
        }
        pool.shared.touch();
        pool.start_keepalive();
        Ok(pool)
    }

    async fn build_connections(&self, n: u32) -> Result<Vec<Arc<NntpClient>>> {
        let mut set = JoinSet::new();
        for _ in 0..n {
            let config = self.shared.config.clone();
            set.spawn(async move { NntpClient::connect(&config).await });
        }
        let mut clients = Vec::with_capacity(n as usize);
        let mut error = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(client)) => clients.push(Arc::new(client)),
                Ok(Err(e)) => error = Some(e),
                Err(e) => {
                    error = Some(NntpError::Connection(format!("connect task failed: {}", e)))
                }
            }
        }
        if let Some(e) = error {
            for client in clients {
                client.close().await;
            }
            return Err(e);
        }
        Ok(clients)
    }

    fn start_keepalive(&self) {
        if self.shared.config.keepalive_interval_ms <= 0 {
            return;
        }
        let handle = tokio::spawn(keepalive_loop(Arc::clone(&self.shared)));
        let mut state = self.shared.state.lock().unwrap();
        if state.keepalive.is_none() && !state.closed && !state.sleeping {
            state.keepalive = Some(handle);
        } else {
            handle.abort();
        }
    }

    /// Lease a connection: take the oldest idle one, or join the wait queue.
    async fn acquire(&self, priority: i32) -> Result<ClientLease> {
        let rx = {
            let mut state = self.shared.state.lock().unwrap();
            if state.closed {
                return Err(NntpError::PoolClosed);
            }
            if let Some(client) = state.idle.pop_front() {
                state.leased += 1;
                return Ok(ClientLease::new(client, Arc::clone(&self.shared)));
            }
            let (tx, rx) = oneshot::channel();
            let sequence = state.waiter_sequence;
            state.waiter_sequence += 1;
            state.waiters.push(Waiter { priority, sequence, tx });
            rx
        };
        // Cancellation drops the receiver; dispatch skips the dead waiter, and
        // a lease already in flight returns to the pool through its Drop.
        rx.await.map_err(|_| NntpError::PoolClosed)
    }

    /// Run `block` with a leased connection at the given priority. A
    /// connection-level failure schedules a reconnect, releases the
    /// connection, and retries once on a freshly acquired (possibly
    /// different) connection; other errors propagate immediately.
    pub async fn with_client<T, F, Fut>(&self, priority: i32, block: F) -> Result<T>
    where
        F: Fn(Arc<NntpClient>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.shared.touch();
        if self.shared.state.lock().unwrap().sleeping {
            self.wake().await?;
        }
        let lease = self.acquire(priority).await?;
        match block(Arc::clone(lease.client())).await {
            Err(e) if e.is_connection_error() => {
                log::debug!("pooled command failed ({}); retrying once", e);
                lease.client().schedule_reconnect();
                drop(lease);
                let lease = self.acquire(priority).await?;
                lease.client().ensure_connected().await?;
                block(Arc::clone(lease.client())).await
            }
            r => r,
        }
    }

    /// Close idle connections and stop probing until the next use. Idempotent;
    /// leased connections are unaffected and park as stale idle on return.
    pub async fn sleep(&self) {
        sleep_pool(&self.shared, true).await;
    }

    /// Leave the sleeping state: discard stale idle connections, rebuild a
    /// full complement, restart keepalive. Idempotent; a no-op while awake.
    pub async fn wake(&self) -> Result<()> {
        let stale = {
            let mut state = self.shared.state.lock().unwrap();
            if state.closed {
                return Err(NntpError::PoolClosed);
            }
            if !state.sleeping {
                return Ok(());
            }
            state.sleeping = false;
            state.idle.drain(..).collect::<Vec<_>>()
        };
        for client in stale {
            client.close().await;
        }
        let missing = {
            let state = self.shared.state.lock().unwrap();
            (self.shared.config.max_connections as usize).saturating_sub(state.leased)
        };
        let clients = match self.build_connections(missing as u32).await {
            Ok(clients) => clients,
            Err(e) => {
                // back to sleep so the next use retries the rebuild
                self.shared.state.lock().unwrap().sleeping = true;
                return Err(e);
            }
        };
        {
            let mut state = self.shared.state.lock().unwrap();
            if state.closed {
                drop(state);
                for client in clients {
                    client.connection().abort();
                }
                return Err(NntpError::PoolClosed);
            }
            for client in clients {
                dispatch(&self.shared, &mut state, client);
            }
        }
        self.shared.touch();
        self.start_keepalive();
        log::debug!("pool awake");
        Ok(())
    }

    /// Shut the pool down: fail queued waiters, close idle connections.
    /// Leased connections are closed as they come back.
    pub async fn close(&self) {
        let (keepalive, idle, waiters) = {
            let mut state = self.shared.state.lock().unwrap();
            if state.closed {
                return;
            }
            state.closed = true;
            (
                state.keepalive.take(),
                state.idle.drain(..).collect::<Vec<_>>(),
                std::mem::take(&mut state.waiters),
            )
        };
        if let Some(handle) = keepalive {
            handle.abort();
        }
        // dropping the waiters' senders fails their acquisitions with PoolClosed
        drop(waiters);
        for client in idle {
            client.close().await;
        }
        log::debug!("pool closed");
    }

    pub fn is_sleeping(&self) -> bool {
        self.shared.state.lock().unwrap().sleeping
    }

    pub fn idle_connections(&self) -> usize {
        self.shared.state.lock().unwrap().idle.len()
    }

    // ── typed delegates ───────────────────────────────────────────────

    pub async fn group(&self, priority: i32, name: &str) -> Result<GroupResponse> {
        let name = name.to_string();
        self.with_client(priority, move |client| {
            let name = name.clone();
            async move { client.group(&name).await }
        })
        .await
    }

    pub async fn stat(&self, priority: i32, article: ArticleRef<'_>) -> Result<StatResponse> {
        self.with_client(priority, move |client| async move { client.stat(article).await })
            .await
    }

    pub async fn article(&self, priority: i32, article: ArticleRef<'_>) -> Result<ArticleResponse> {
        self.with_client(priority, move |client| async move { client.article(article).await })
            .await
    }

    pub async fn head(&self, priority: i32, article: ArticleRef<'_>) -> Result<ArticleResponse> {
        self.with_client(priority, move |client| async move { client.head(article).await })
            .await
    }

    pub async fn over(&self, priority: i32, low: i64, high: i64) -> Result<Vec<OverviewEntry>> {
        self.with_client(priority, move |client| async move { client.over(low, high).await })
            .await
    }

    /// Fetch and fully decode a yEnc body. The lease is held for the whole
    /// stream; for incremental consumption use `with_client` with
    /// `client.body_yenc` directly.
    pub async fn download_body(
        &self,
        priority: i32,
        article: ArticleRef<'_>,
    ) -> Result<(YencHeaders, Vec<u8>)> {
        self.with_client(priority, move |client| async move {
            let mut stream = client.body_yenc(article).await?;
            let headers = stream.headers().clone();
            let body = stream
                .take_body()
                .ok_or_else(|| NntpError::Protocol("body stream already consumed".into()))?;
            let data = body.read_to_end().await?;
            Ok((headers, data))
        })
        .await
    }
}
