//! Socket frame -> session event.
//!
//! Text frames go to the state machine untouched (decoding happens there once).
//! Binary frames are not part of the protocol; the session answers them as malformed.
//! Ping/Pong are surfaced for lifecycle management.

use axum::extract::ws::Message;

use crate::transport::session::Event;

#[derive(Debug)]
pub enum Inbound {
    Event(Event),
    Ping(Vec<u8>),
    Pong,
}

pub fn decode(msg: Message) -> Inbound {
    match msg {
        Message::Text(s) => Inbound::Event(Event::Text(s)),
        Message::Binary(b) => Inbound::Event(Event::Binary(b.len())),
        Message::Ping(v) => Inbound::Ping(v),
        Message::Pong(_) => Inbound::Pong,
        Message::Close(_) => Inbound::Event(Event::Close),
    }
}
