//! Feed session against a local WebSocket server

#![cfg(feature = "native")]

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::accept_async;
use tungstenite::protocol::Message;

use steemx::source_ws::{ConnectionState, FeedOptions, FeedSession, FeedSnapshot};

const WAIT: Duration = Duration::from_secs(10);

fn block(height: u64) -> Message {
    Message::Text(
        json!({
            "block": {
                "height": height,
                "accounts": ["alice"],
                "opCount": 2,
                "opTypes": ["vote", "transfer"],
                "ts": "2024-05-01T12:00:00",
                "opCounts": {"vote": 1, "transfer": 1}
            }
        })
        .to_string(),
    )
}

async fn listen() -> (TcpListener, FeedOptions) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut opts = FeedOptions::new(format!("ws://{addr}"));
    opts.reconnect_delay = Duration::from_millis(200);
    opts.drain_delay = Duration::from_millis(50);
    (listener, opts)
}

fn numbers(s: &FeedSnapshot) -> Vec<u64> {
    s.blocks.iter().map(|b| b.number).collect()
}

#[tokio::test]
async fn blocks_are_deduplicated_and_newest_first() {
    let (listener, opts) = listen().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        for n in [5, 3, 5, 4] {
            ws.send(block(n)).await.unwrap();
        }
        ws.send(Message::Text("not json".into())).await.unwrap();
        ws.send(Message::Text(
            json!({"props": {"head_block_number": 5, "current_witness": "w"}}).to_string(),
        ))
        .await
        .unwrap();
        // hold the connection open until the client goes away
        while let Some(Ok(_)) = ws.next().await {}
    });

    let session = FeedSession::start(opts);
    let mut rx = session.subscribe();
    let snap = timeout(
        WAIT,
        rx.wait_for(|s| s.blocks.len() == 3 && s.properties.is_some()),
    )
    .await
    .expect("feed filled in time")
    .unwrap()
    .clone();

    assert_eq!(numbers(&snap), vec![5, 4, 3]);
    assert!(snap.is_connected());
    assert_eq!(snap.properties.unwrap().head_block_number, 5);
    assert_eq!(snap.blocks[0].operation_type_counts["vote"], 1);

    session.shutdown().await;
    timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn dropped_connection_is_reestablished_after_the_delay() {
    let (listener, opts) = listen().await;
    let delay = opts.reconnect_delay;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(block(1)).await.unwrap();
        // give the drain window time to pass before hanging up
        tokio::time::sleep(Duration::from_millis(200)).await;
        // taken before the close frame leaves, so the client's wait starts later
        let hung_up = Instant::now();
        ws.close(None).await.unwrap();
        drop(ws);

        let (stream, _) = listener.accept().await.unwrap();
        let gap = hung_up.elapsed();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(block(2)).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
        gap
    });

    let session = FeedSession::start(opts);
    let mut rx = session.subscribe();

    let dropped = |s: &FeedSnapshot| s.state == ConnectionState::Disconnected && s.attempts == 1;
    timeout(WAIT, rx.wait_for(dropped))
        .await
        .expect("disconnect observed")
        .unwrap();

    let snap = timeout(WAIT, rx.wait_for(|s| s.blocks.len() == 2))
        .await
        .expect("second connection delivered")
        .unwrap()
        .clone();
    assert_eq!(numbers(&snap), vec![2, 1]);
    assert_eq!(snap.attempts, 2);
    assert_eq!(snap.state, ConnectionState::Connected);

    session.shutdown().await;
    let gap = timeout(WAIT, server).await.unwrap().unwrap();
    assert!(
        gap >= delay,
        "reconnected after {gap:?}, expected at least {delay:?}"
    );
}

#[tokio::test]
async fn shutdown_closes_the_socket() {
    let (listener, opts) = listen().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        // returns once the client side is gone
        while let Some(Ok(_)) = ws.next().await {}
    });

    let session = FeedSession::start(opts);
    let mut rx = session.subscribe();
    timeout(WAIT, rx.wait_for(FeedSnapshot::is_connected))
        .await
        .expect("connected")
        .unwrap();

    session.shutdown().await;
    timeout(WAIT, server)
        .await
        .expect("server saw the socket close")
        .unwrap();
}
