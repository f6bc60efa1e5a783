//! Live socket sessions against a gateway bound on a loopback port.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use listpulse_core::protocol::ServerMsg;
use listpulse_core::MetricField;
use listpulse_gateway::app_state::AppState;
use listpulse_gateway::router::build_router;

use common::{app, listing};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

/// Next protocol message; control frames are skipped.
async fn next_msg(ws: &mut Client) -> ServerMsg {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("no frame within 2s")
            .expect("socket ended")
            .unwrap();
        match frame {
            Message::Text(t) => return serde_json::from_str(&t).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn send(ws: &mut Client, text: &str) {
    ws.send(Message::Text(text.to_string())).await.unwrap();
}

fn error_code(msg: &ServerMsg) -> &str {
    match msg {
        ServerMsg::Error { code, .. } => code,
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn subscribe_gets_snapshot_then_live_updates() {
    let (state, store) = app().await;
    let id = listing(&store, "sofa").await;
    let addr = serve(state.clone()).await;
    let mut ws = connect(addr).await;

    assert_eq!(next_msg(&mut ws).await, ServerMsg::Ping);

    send(&mut ws, &format!(r#"{{"type":"subscribe","listingId":"{id}"}}"#)).await;
    match next_msg(&mut ws).await {
        ServerMsg::MetricsUpdate { listing_id, metrics } => {
            assert_eq!(listing_id, id);
            assert_eq!((metrics.views, metrics.shares, metrics.clicks), (0, 0, 0));
        }
        other => panic!("expected snapshot, got {other:?}"),
    }

    state.service().record(id, MetricField::Views).await.unwrap();
    state.service().record(id, MetricField::Clicks).await.unwrap();
    let mut seen = Vec::new();
    for _ in 0..2 {
        match next_msg(&mut ws).await {
            ServerMsg::MetricsUpdate { metrics, .. } => seen.push((metrics.views, metrics.clicks)),
            other => panic!("expected update, got {other:?}"),
        }
    }
    assert_eq!(seen, vec![(1, 0), (1, 1)]);

    send(&mut ws, &format!(r#"{{"type":"unsubscribe","listingId":{id}}}"#)).await;
    assert_eq!(next_msg(&mut ws).await, ServerMsg::Unsubscribed { listing_id: id });
    assert_eq!(state.service().registry().subscriber_count(id), 0);
}

#[tokio::test]
async fn malformed_frame_is_answered_and_connection_stays_open() {
    let (state, store) = app().await;
    let id = listing(&store, "desk").await;
    let addr = serve(state.clone()).await;
    let mut ws = connect(addr).await;
    assert_eq!(next_msg(&mut ws).await, ServerMsg::Ping);

    send(&mut ws, "{nope").await;
    assert_eq!(error_code(&next_msg(&mut ws).await), "MALFORMED_MESSAGE");
    send(&mut ws, r#"{"type":"shout","listingId":1}"#).await;
    assert_eq!(error_code(&next_msg(&mut ws).await), "MALFORMED_MESSAGE");
    assert_eq!(state.obs().malformed_messages.get(&[]), 2);

    send(&mut ws, &format!(r#"{{"type":"subscribe","listingId":{id}}}"#)).await;
    assert!(matches!(next_msg(&mut ws).await, ServerMsg::MetricsUpdate { .. }));
}

#[tokio::test]
async fn unknown_listing_is_refused_without_registering() {
    let (state, _store) = app().await;
    let addr = serve(state.clone()).await;
    let mut ws = connect(addr).await;
    assert_eq!(next_msg(&mut ws).await, ServerMsg::Ping);

    send(&mut ws, r#"{"type":"subscribe","listingId":9999}"#).await;
    assert_eq!(error_code(&next_msg(&mut ws).await), "NOT_FOUND");
    assert_eq!(state.service().registry().subscriber_count(9999), 0);
}

#[tokio::test]
async fn closing_the_socket_purges_the_registry() {
    let (state, store) = app().await;
    let a = listing(&store, "rug").await;
    let b = listing(&store, "vase").await;
    let addr = serve(state.clone()).await;
    let mut ws = connect(addr).await;
    assert_eq!(next_msg(&mut ws).await, ServerMsg::Ping);

    for id in [a, b] {
        send(&mut ws, &format!(r#"{{"type":"subscribe","listingId":{id}}}"#)).await;
        assert!(matches!(next_msg(&mut ws).await, ServerMsg::MetricsUpdate { .. }));
    }
    let svc = state.service();
    assert_eq!(svc.registry().subscriber_count(a), 1);
    assert_eq!(svc.registry().subscriber_count(b), 1);
    assert_eq!(state.obs().ws_sessions_active.get(&[]), 1);

    ws.close(None).await.unwrap();

    let purged = async {
        while svc.registry().subscriber_count(a) + svc.registry().subscriber_count(b) > 0
            || state.obs().ws_sessions_active.get(&[]) != 0
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(2), purged)
        .await
        .expect("connection still registered after close");
}
