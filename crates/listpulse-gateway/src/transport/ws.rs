//! WebSocket handler.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS
//! - Feed socket frames to the session state machine and execute its effects
//! - Lifecycle: ping/pong, idle timeout, eviction by the broadcaster
//! - Purge the connection from the registry on every exit path

use std::collections::VecDeque;

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, State},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use listpulse_core::error::Result;
use listpulse_core::protocol::ServerMsg;

use crate::app_state::AppState;
use crate::realtime::Subscriber;
use crate::transport::codec::{decode, Inbound};
use crate::transport::session::{Effect, Event, Session};

pub async fn ws_upgrade(State(app): State<AppState>, ws: WebSocketUpgrade) -> Response {
    app.obs().ws_upgrades.inc(&[]);
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = run_session(app, socket).await {
            warn!(error = %e, "ws session ended with error");
        }
    })
}

async fn run_session(app: AppState, socket: WebSocket) -> Result<()> {
    let service = app.service();
    let conn_id = service.registry().next_conn_id();

    let gw = &app.cfg().server;
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(gw.outbound_queue);
    let sub = Subscriber::new(conn_id, out_tx);
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut session = Session::new(conn_id);
    app.obs().ws_sessions_active.inc(&[]);
    info!(conn_id, "client connected");

    let ping_every = Duration::from_millis(gw.ping_interval_ms);
    let idle_timeout = Duration::from_millis(gw.idle_timeout_ms);
    let mut ping_tick = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_activity = Instant::now();

    let mut open = apply(&app, &sub, &mut session, Event::Open).await;

    while open {
        tokio::select! {
            // outbound writer
            maybe_out = out_rx.recv() => {
                let Some(m) = maybe_out else { break; };
                if let Err(e) = ws_tx.send(m).await {
                    open = apply(&app, &sub, &mut session, Event::Error(e.to_string())).await;
                }
            }

            // inbound reader
            incoming = ws_rx.next() => {
                let event = match incoming {
                    None => Event::Close,
                    Some(Err(e)) => Event::Error(e.to_string()),
                    Some(Ok(msg)) => {
                        last_activity = Instant::now();
                        match decode(msg) {
                            Inbound::Event(ev) => ev,
                            Inbound::Ping(payload) => {
                                let _ = sub.tx.try_send(Message::Pong(payload));
                                continue;
                            }
                            Inbound::Pong => continue,
                        }
                    }
                };
                open = apply(&app, &sub, &mut session, event).await;
            }

            _ = ping_tick.tick() => {
                let _ = sub.tx.try_send(Message::Ping(Vec::new()));
            }

            _ = sub.evicted() => {
                enqueue(&sub, &ServerMsg::Error {
                    code: "EVICTED".into(),
                    msg: "subscriber could not keep up".into(),
                });
                open = apply(&app, &sub, &mut session, Event::Error("evicted".into())).await;
            }

            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                if last_activity.elapsed() >= idle_timeout {
                    enqueue(&sub, &ServerMsg::Error { code: "TIMEOUT".into(), msg: "idle timeout".into() });
                    open = apply(&app, &sub, &mut session, Event::Close).await;
                }
            }
        }
    }

    // the state machine may not have seen a close if the writer side vanished
    service.disconnect(conn_id);
    app.obs().ws_sessions_active.dec(&[]);

    while let Ok(m) = out_rx.try_recv() {
        if ws_tx.send(m).await.is_err() {
            break;
        }
    }
    let _ = ws_tx.close().await;
    info!(conn_id, "client disconnected");
    Ok(())
}

/// Run one event through the state machine and perform its effects.
/// Returns `false` once the session asked to close.
async fn apply(app: &AppState, sub: &Subscriber, session: &mut Session, event: Event) -> bool {
    let conn_id = sub.conn_id;
    let mut pending: VecDeque<Effect> = session.handle(event).into();
    let mut open = true;

    while let Some(effect) = pending.pop_front() {
        match effect {
            Effect::Send(msg) => enqueue(sub, &msg),
            Effect::Subscribe(listing_id) => {
                if let Err(error) = app.service().subscribe(listing_id, sub.clone()).await {
                    warn!(conn_id, listing_id, error = %error, "subscribe rejected");
                    pending.extend(session.handle(Event::Rejected { listing_id, error }));
                }
            }
            Effect::Unsubscribe(listing_id) => {
                app.service().unsubscribe(conn_id, listing_id);
            }
            Effect::UnsubscribeAll => {
                app.service().disconnect(conn_id);
            }
            Effect::Malformed(reason) => {
                app.obs().malformed_messages.inc(&[]);
                warn!(conn_id, %reason, "malformed client message ignored");
            }
            Effect::Close => open = false,
        }
    }
    open
}

// Replies share the queue with broadcasts; never await on our own queue.
fn enqueue(sub: &Subscriber, msg: &ServerMsg) {
    match msg.to_json() {
        Ok(text) => {
            if sub.tx.try_send(Message::Text(text)).is_err() {
                debug!(conn_id = sub.conn_id, "outbound queue full, reply dropped");
            }
        }
        Err(e) => warn!(conn_id = sub.conn_id, error = %e, "reply encode failed"),
    }
}
