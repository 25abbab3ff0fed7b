/*
 * nntp_integration.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * End-to-end client tests against a scripted in-process NNTP server: status
 * and group parsing, dot-unstuffing, AUTHINFO, the streaming yEnc pipeline
 * (including CRC checking and the post-failure reconnect), and two-phase POST.
 */

mod common;

use argano_core::yenc::codec::crc32;
use argano_core::{ArticleRef, NntpClient, NntpError, ServerConfig, StatResponse, YencEvent};
use common::{spawn_mock, yenc_encode, MockServer};

fn config_for(server: &MockServer) -> ServerConfig {
    ServerConfig::new(server.host(), server.port())
}

#[tokio::test]
async fn group_parses_counts_and_water_marks() {
    let server = spawn_mock(|cmd| match cmd {
        "GROUP test.group" => b"211 5 1 5 test.group\r\n".to_vec(),
        _ => b"500 what?\r\n".to_vec(),
    })
    .await;

    let client = NntpClient::connect(&config_for(&server)).await.unwrap();
    let group = client.group("test.group").await.unwrap();
    assert_eq!(group.code, 211);
    assert_eq!(group.count, 5);
    assert_eq!(group.low, 1);
    assert_eq!(group.high, 5);
    assert_eq!(group.name, "test.group");
}

#[tokio::test]
async fn article_body_is_dot_unstuffed() {
    let server = spawn_mock(|cmd| match cmd {
        "ARTICLE 1" => {
            b"220 1 <m@h> article follows\r\nSubject: T\r\n\r\nLine one\r\n..dot\r\n.\r\n".to_vec()
        }
        _ => b"500 what?\r\n".to_vec(),
    })
    .await;

    let client = NntpClient::connect(&config_for(&server)).await.unwrap();
    let article = client.article(ArticleRef::Number(1)).await.unwrap();
    assert_eq!(article.article_number, 1);
    assert_eq!(article.message_id, "<m@h>");
    assert_eq!(article.lines, vec!["Subject: T", "", "Line one", ".dot"]);
}

#[tokio::test]
async fn article_not_found_is_an_error() {
    let server = spawn_mock(|cmd| match cmd {
        "ARTICLE 42" => b"430 no such article\r\n".to_vec(),
        _ => b"500 what?\r\n".to_vec(),
    })
    .await;

    let client = NntpClient::connect(&config_for(&server)).await.unwrap();
    match client.article(ArticleRef::Number(42)).await {
        Err(NntpError::ArticleNotFound(_)) => {}
        other => panic!("expected ArticleNotFound, got {:?}", other.map(|a| a.code)),
    }
}

#[tokio::test]
async fn stat_not_found_is_data_not_an_error() {
    let server = spawn_mock(|cmd| match cmd {
        "STAT 1" => b"223 1 <m@h> article exists\r\n".to_vec(),
        "STAT 999" => b"430 no such article\r\n".to_vec(),
        _ => b"500 what?\r\n".to_vec(),
    })
    .await;

    let client = NntpClient::connect(&config_for(&server)).await.unwrap();
    match client.stat(ArticleRef::Number(1)).await.unwrap() {
        StatResponse::Found { number, message_id } => {
            assert_eq!(number, 1);
            assert_eq!(message_id, "<m@h>");
        }
        other => panic!("expected Found, got {:?}", other),
    }
    match client.stat(ArticleRef::Number(999)).await.unwrap() {
        StatResponse::NotFound { code, .. } => assert_eq!(code, 430),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn authinfo_user_pass_handshake() {
    let server = spawn_mock(|cmd| {
        if cmd == "AUTHINFO USER alice" {
            b"381 password required\r\n".to_vec()
        } else if cmd == "AUTHINFO PASS secret" {
            b"281 authenticated\r\n".to_vec()
        } else if cmd == "STAT 1" {
            b"223 1 <m@h>\r\n".to_vec()
        } else {
            b"500 what?\r\n".to_vec()
        }
    })
    .await;

    let mut config = config_for(&server);
    config.set_credentials("alice", "secret");
    let client = NntpClient::connect(&config).await.unwrap();
    assert!(client.stat(ArticleRef::Number(1)).await.unwrap().is_found());
}

#[tokio::test]
async fn authinfo_rejection_fails_authentication() {
    let server = spawn_mock(|cmd| {
        if cmd.starts_with("AUTHINFO USER") {
            b"381 password required\r\n".to_vec()
        } else if cmd.starts_with("AUTHINFO PASS") {
            b"482 bad credentials\r\n".to_vec()
        } else {
            b"500 what?\r\n".to_vec()
        }
    })
    .await;

    let mut config = config_for(&server);
    config.set_credentials("alice", "wrong");
    match NntpClient::connect(&config).await {
        Err(NntpError::AuthenticationFailed(_)) => {}
        other => panic!("expected AuthenticationFailed, got {:?}", other.is_ok()),
    }
}

/// 46 ASCII bytes whose yEnc encoding needs no escapes: headers event, the
/// full decoded stream, and a clean socket handed back for the next command.
#[tokio::test]
async fn yenc_single_part_body_streams_and_leaves_socket_clean() {
    let payload: &[u8] = b"The quick brown fox jumps over the lazy dog 12";
    assert_eq!(payload.len(), 46);
    let crc = crc32(payload, 0);
    let mut reply = b"222 0 <single@part> body follows\r\n".to_vec();
    reply.extend_from_slice(b"=ybegin line=128 size=46 name=test.txt\r\n");
    reply.extend_from_slice(&yenc_encode(payload, 128));
    reply.extend_from_slice(format!("=yend size=46 crc32={:08x}\r\n", crc).as_bytes());
    reply.extend_from_slice(b".\r\n");

    let server = spawn_mock(move |cmd| match cmd {
        "BODY <single@part>" => reply.clone(),
        "STAT 1" => b"223 1 <m@h>\r\n".to_vec(),
        _ => b"500 what?\r\n".to_vec(),
    })
    .await;

    let client = NntpClient::connect(&config_for(&server)).await.unwrap();
    let mut stream = client.body_yenc(ArticleRef::MessageId("<single@part>")).await.unwrap();

    let headers = match stream.next_event() {
        Some(YencEvent::Headers(h)) => h,
        _ => panic!("expected headers event first"),
    };
    assert_eq!(headers.name, "test.txt");
    assert_eq!(headers.size, 46);
    assert_eq!(headers.line, 128);

    let body = match stream.next_event() {
        Some(YencEvent::Body(b)) => b,
        _ => panic!("expected body event second"),
    };
    let decoded = body.read_to_end().await.unwrap();
    assert_eq!(decoded, payload);
    assert!(stream.next_event().is_none());

    // the decode drained the terminator: the same socket serves the next command
    assert!(client.stat(ArticleRef::Number(1)).await.unwrap().is_found());
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn yenc_crc_mismatch_fails_and_reconnects() {
    let payload: &[u8] = b"The quick brown fox jumps over the lazy dog 12";
    let actual = crc32(payload, 0);
    let mut reply = b"222 0 <bad@crc> body follows\r\n".to_vec();
    reply.extend_from_slice(b"=ybegin line=128 size=46 name=test.txt\r\n");
    reply.extend_from_slice(&yenc_encode(payload, 128));
    reply.extend_from_slice(b"=yend size=46 crc32=deadbeef\r\n.\r\n");

    let server = spawn_mock(move |cmd| match cmd {
        "BODY <bad@crc>" => reply.clone(),
        "STAT 1" => b"223 1 <m@h>\r\n".to_vec(),
        _ => b"500 what?\r\n".to_vec(),
    })
    .await;

    let client = NntpClient::connect(&config_for(&server)).await.unwrap();
    let mut stream = client.body_yenc(ArticleRef::MessageId("<bad@crc>")).await.unwrap();
    let body = stream.take_body().unwrap();
    match body.read_to_end().await {
        Err(NntpError::CrcMismatch { expected, actual: got }) => {
            assert_eq!(expected, 0xdeadbeef);
            assert_eq!(got, actual);
        }
        other => panic!("expected CrcMismatch, got {:?}", other.map(|d| d.len())),
    }

    // the connection rebuilt itself in the background
    assert!(client.stat(ArticleRef::Number(1)).await.unwrap().is_found());
    assert_eq!(server.connection_count(), 2);
}

#[tokio::test]
async fn yenc_headers_only_costs_a_reconnect() {
    let payload: &[u8] = b"The quick brown fox jumps over the lazy dog 12";
    let crc = crc32(payload, 0);
    let mut reply = b"222 0 <peek@hdr> body follows\r\n".to_vec();
    reply.extend_from_slice(b"=ybegin part=1 total=2 line=128 size=92 name=big file.bin\r\n");
    reply.extend_from_slice(b"=ypart begin=1 end=46\r\n");
    reply.extend_from_slice(&yenc_encode(payload, 128));
    reply.extend_from_slice(format!("=yend size=46 part=1 pcrc32={:08x}\r\n", crc).as_bytes());
    reply.extend_from_slice(b".\r\n");

    let server = spawn_mock(move |cmd| match cmd {
        "BODY <peek@hdr>" => reply.clone(),
        "STAT 1" => b"223 1 <m@h>\r\n".to_vec(),
        _ => b"500 what?\r\n".to_vec(),
    })
    .await;

    let client = NntpClient::connect(&config_for(&server)).await.unwrap();
    let headers = client.body_yenc_headers(ArticleRef::MessageId("<peek@hdr>")).await.unwrap();
    assert_eq!(headers.name, "big file.bin");
    assert_eq!(headers.part, Some(1));
    assert_eq!(headers.part_begin, Some(1));
    assert_eq!(headers.part_end, Some(46));

    assert!(client.stat(ArticleRef::Number(1)).await.unwrap().is_found());
    assert_eq!(server.connection_count(), 2);
}

#[tokio::test]
async fn yenc_part_crc_is_checked_for_multipart() {
    let payload: &[u8] = b"The quick brown fox jumps over the lazy dog 12";
    let crc = crc32(payload, 0);
    let mut reply = b"222 0 <part@2> body follows\r\n".to_vec();
    reply.extend_from_slice(b"=ybegin part=2 total=2 line=128 size=92 name=big.bin\r\n");
    reply.extend_from_slice(b"=ypart begin=47 end=92\r\n");
    reply.extend_from_slice(&yenc_encode(payload, 128));
    reply.extend_from_slice(format!("=yend size=46 part=2 pcrc32={:08x}\r\n", crc).as_bytes());
    reply.extend_from_slice(b".\r\n");

    let server = spawn_mock(move |cmd| match cmd {
        "BODY <part@2>" => reply.clone(),
        _ => b"500 what?\r\n".to_vec(),
    })
    .await;

    let client = NntpClient::connect(&config_for(&server)).await.unwrap();
    let mut stream = client.body_yenc(ArticleRef::MessageId("<part@2>")).await.unwrap();
    assert_eq!(stream.headers().part_begin, Some(47));
    let decoded = stream.take_body().unwrap().read_to_end().await.unwrap();
    assert_eq!(decoded, payload);
}

#[tokio::test]
async fn post_is_two_phase_with_dot_stuffing() {
    let server = spawn_mock(|cmd| match cmd {
        "POST" => b"340 send article\r\n".to_vec(),
        _ => b"500 what?\r\n".to_vec(),
    })
    .await;

    let client = NntpClient::connect(&config_for(&server)).await.unwrap();
    client
        .post("From: a@b\r\nNewsgroups: misc.test\r\nSubject: t\r\n\r\n.leading dot\r\nbody\r\n")
        .await
        .unwrap();
}

#[tokio::test]
async fn capabilities_and_date() {
    let server = spawn_mock(|cmd| match cmd {
        "CAPABILITIES" => b"101 capabilities follow\r\nVERSION 2\r\nREADER\r\n.\r\n".to_vec(),
        "DATE" => b"111 20260801120000\r\n".to_vec(),
        _ => b"500 what?\r\n".to_vec(),
    })
    .await;

    let client = NntpClient::connect(&config_for(&server)).await.unwrap();
    let caps = client.capabilities().await.unwrap();
    assert_eq!(caps, vec!["VERSION 2", "READER"]);
    let date = client.date().await.unwrap();
    assert_eq!(date.format("%Y%m%d%H%M%S").to_string(), "20260801120000");
}
