/*
 * pool_integration.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Pool behavior against a scripted in-process NNTP server: priority and FIFO
 * service order, cancelled waiters, connection-error retry, sleep/wake
 * (including the keepalive-driven automatic sleep), close semantics, and
 * connection conservation.
 */

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use argano_core::{ArticleRef, NntpError, NntpPool, ServerConfig, StatResponse};
use common::{spawn_mock, MockServer};
use tokio::sync::Notify;
use tokio::time::sleep;

fn respond_basic(cmd: &str) -> Vec<u8> {
    if cmd.starts_with("STAT") {
        b"223 1 <m@h> article exists\r\n".to_vec()
    } else if cmd == "DATE" {
        b"111 20260801120000\r\n".to_vec()
    } else {
        b"500 what?\r\n".to_vec()
    }
}

fn pool_config(server: &MockServer, max_connections: u32) -> ServerConfig {
    let mut config = ServerConfig::new(server.host(), server.port());
    config
        .set_max_connections(max_connections)
        .set_keepalive_interval_ms(0)
        .set_idle_grace_period_ms(0);
    config
}

#[tokio::test]
async fn waiters_are_served_by_priority() {
    let server = spawn_mock(respond_basic).await;
    let pool = Arc::new(NntpPool::connect(pool_config(&server, 1)).await.unwrap());

    let hold = Arc::new(Notify::new());
    let holder = {
        let pool = Arc::clone(&pool);
        let hold = Arc::clone(&hold);
        tokio::spawn(async move {
            pool.with_client(0, move |_client| {
                let hold = Arc::clone(&hold);
                async move {
                    hold.notified().await;
                    Ok::<(), NntpError>(())
                }
            })
            .await
            .unwrap();
        })
    };
    sleep(Duration::from_millis(50)).await;

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut tasks = Vec::new();
    for priority in [1, 5, 10] {
        let pool = Arc::clone(&pool);
        let order = Arc::clone(&order);
        tasks.push(tokio::spawn(async move {
            pool.with_client(priority, move |_client| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(priority);
                    Ok::<(), NntpError>(())
                }
            })
            .await
            .unwrap();
        }));
        // make enqueue order deterministic
        sleep(Duration::from_millis(20)).await;
    }

    hold.notify_one();
    holder.await.unwrap();
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![10, 5, 1]);
}

#[tokio::test]
async fn equal_priorities_are_fifo() {
    let server = spawn_mock(respond_basic).await;
    let pool = Arc::new(NntpPool::connect(pool_config(&server, 1)).await.unwrap());

    let hold = Arc::new(Notify::new());
    let holder = {
        let pool = Arc::clone(&pool);
        let hold = Arc::clone(&hold);
        tokio::spawn(async move {
            pool.with_client(0, move |_client| {
                let hold = Arc::clone(&hold);
                async move {
                    hold.notified().await;
                    Ok::<(), NntpError>(())
                }
            })
            .await
            .unwrap();
        })
    };
    sleep(Duration::from_millis(50)).await;

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut tasks = Vec::new();
    for tag in [1, 2, 3] {
        let pool = Arc::clone(&pool);
        let order = Arc::clone(&order);
        tasks.push(tokio::spawn(async move {
            pool.with_client(5, move |_client| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(tag);
                    Ok::<(), NntpError>(())
                }
            })
            .await
            .unwrap();
        }));
        sleep(Duration::from_millis(20)).await;
    }

    hold.notify_one();
    holder.await.unwrap();
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn cancelled_waiter_does_not_wedge_the_pool() {
    let server = spawn_mock(respond_basic).await;
    let pool = Arc::new(NntpPool::connect(pool_config(&server, 1)).await.unwrap());

    let hold = Arc::new(Notify::new());
    let holder = {
        let pool = Arc::clone(&pool);
        let hold = Arc::clone(&hold);
        tokio::spawn(async move {
            pool.with_client(0, move |_client| {
                let hold = Arc::clone(&hold);
                async move {
                    hold.notified().await;
                    Ok::<(), NntpError>(())
                }
            })
            .await
            .unwrap();
        })
    };
    sleep(Duration::from_millis(50)).await;

    let waiter = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move {
            pool.with_client(5, |_client| async move { Ok::<(), NntpError>(()) }).await
        })
    };
    sleep(Duration::from_millis(50)).await;
    waiter.abort();
    let _ = waiter.await;

    hold.notify_one();
    holder.await.unwrap();

    let stat = pool.stat(0, ArticleRef::Number(1)).await.unwrap();
    assert!(matches!(stat, StatResponse::Found { .. }));
    assert_eq!(pool.idle_connections(), 1);
}

#[tokio::test]
async fn connection_errors_are_retried_once() {
    let server = spawn_mock(respond_basic).await;
    let pool = NntpPool::connect(pool_config(&server, 1)).await.unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));
    let result = {
        let attempts = Arc::clone(&attempts);
        pool.with_client(0, move |client| {
            let attempts = Arc::clone(&attempts);
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(NntpError::Connection("injected failure".into()));
                }
                client.stat(ArticleRef::Number(1)).await
            }
        })
        .await
    };
    assert!(matches!(result.unwrap(), StatResponse::Found { .. }));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    // the failed attempt forced a fresh handshake
    assert_eq!(server.connection_count(), 2);
}

#[tokio::test]
async fn non_connection_errors_propagate_without_retry() {
    let server = spawn_mock(respond_basic).await;
    let pool = NntpPool::connect(pool_config(&server, 1)).await.unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));
    let result: Result<(), NntpError> = {
        let attempts = Arc::clone(&attempts);
        pool.with_client(0, move |_client| {
            let attempts = Arc::clone(&attempts);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(NntpError::Protocol("application failure".into()))
            }
        })
        .await
    };
    assert!(matches!(result, Err(NntpError::Protocol(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pool_sleeps_after_idle_grace_and_wakes_on_use() {
    let server = spawn_mock(respond_basic).await;
    let mut config = pool_config(&server, 1);
    config.set_keepalive_interval_ms(200).set_idle_grace_period_ms(500);
    let pool = NntpPool::connect(config).await.unwrap();
    assert_eq!(server.connection_count(), 1);

    sleep(Duration::from_millis(1500)).await;
    assert!(pool.is_sleeping());
    assert_eq!(pool.idle_connections(), 0);

    // auto-wake: the next use rebuilds a fresh connection transparently
    let stat = pool.stat(0, ArticleRef::Number(1)).await.unwrap();
    assert!(matches!(stat, StatResponse::Found { .. }));
    assert!(!pool.is_sleeping());
    assert_eq!(server.connection_count(), 2);
}

#[tokio::test]
async fn sleep_and_wake_are_idempotent() {
    let server = spawn_mock(respond_basic).await;
    let pool = NntpPool::connect(pool_config(&server, 2)).await.unwrap();
    assert_eq!(pool.idle_connections(), 2);

    pool.sleep().await;
    pool.sleep().await;
    assert!(pool.is_sleeping());
    assert_eq!(pool.idle_connections(), 0);

    pool.wake().await.unwrap();
    pool.wake().await.unwrap();
    assert!(!pool.is_sleeping());
    assert_eq!(pool.idle_connections(), 2);

    let stat = pool.stat(0, ArticleRef::Number(1)).await.unwrap();
    assert!(matches!(stat, StatResponse::Found { .. }));
    // quiescent again: every connection is back in the idle set
    assert_eq!(pool.idle_connections(), 2);
}

#[tokio::test]
async fn closed_pool_fails_callers_and_waiters() {
    let server = spawn_mock(respond_basic).await;
    let pool = Arc::new(NntpPool::connect(pool_config(&server, 1)).await.unwrap());

    let hold = Arc::new(Notify::new());
    let holder = {
        let pool = Arc::clone(&pool);
        let hold = Arc::clone(&hold);
        tokio::spawn(async move {
            pool.with_client(0, move |_client| {
                let hold = Arc::clone(&hold);
                async move {
                    hold.notified().await;
                    Ok::<(), NntpError>(())
                }
            })
            .await
        })
    };
    sleep(Duration::from_millis(50)).await;

    let waiter = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move {
            pool.with_client(5, |_client| async move { Ok::<(), NntpError>(()) }).await
        })
    };
    sleep(Duration::from_millis(50)).await;

    pool.close().await;
    let waited = waiter.await.unwrap();
    assert!(matches!(waited, Err(NntpError::PoolClosed)));

    hold.notify_one();
    // the holder itself completes; its connection is closed on return
    holder.await.unwrap().unwrap();

    let after = pool.stat(0, ArticleRef::Number(1)).await;
    assert!(matches!(after, Err(NntpError::PoolClosed)));
    assert_eq!(pool.idle_connections(), 0);
}
