//! Per-connection state machine.
//!
//! `Connecting -> Open -> Closed`. Each event yields the effects the transport
//! must perform; the machine itself never touches a socket, the registry or the
//! store, so it can be driven directly in tests.

use std::collections::BTreeSet;

use listpulse_core::error::PulseError;
use listpulse_core::protocol::{decode_client, ClientMsg, ServerMsg};
use listpulse_core::ListingId;

use crate::realtime::ConnId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug)]
pub enum Event {
    Open,
    Text(String),
    /// Binary frames carry no protocol message.
    Binary(usize),
    /// The registry refused a subscribe this session asked for.
    Rejected { listing_id: ListingId, error: PulseError },
    Close,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send(ServerMsg),
    Subscribe(ListingId),
    Unsubscribe(ListingId),
    UnsubscribeAll,
    /// A frame could not be decoded; carries the reason for logging.
    Malformed(String),
    Close,
}

#[derive(Debug)]
pub struct Session {
    conn_id: ConnId,
    phase: Phase,
    subscriptions: BTreeSet<ListingId>,
}

impl Session {
    pub fn new(conn_id: ConnId) -> Self {
        Self {
            conn_id,
            phase: Phase::Connecting,
            subscriptions: BTreeSet::new(),
        }
    }

    pub fn conn_id(&self) -> ConnId {
        self.conn_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn subscriptions(&self) -> impl Iterator<Item = ListingId> + '_ {
        self.subscriptions.iter().copied()
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match (self.phase, event) {
            (Phase::Closed, _) => Vec::new(),

            (Phase::Connecting, Event::Open) => {
                self.phase = Phase::Open;
                vec![Effect::Send(ServerMsg::Ping)]
            }
            // nothing to subscribe to before the socket is open
            (Phase::Connecting, Event::Text(_) | Event::Binary(_) | Event::Rejected { .. }) => Vec::new(),
            (Phase::Open, Event::Open) => Vec::new(),

            (Phase::Open, Event::Text(text)) => self.on_text(&text),
            (Phase::Open, Event::Binary(len)) => {
                let e = PulseError::MalformedMessage(format!("unexpected binary frame ({len} bytes)"));
                vec![Effect::Malformed(e.to_string()), Effect::Send(ServerMsg::error(&e))]
            }

            (Phase::Open, Event::Rejected { listing_id, error }) => {
                self.subscriptions.remove(&listing_id);
                vec![Effect::Send(ServerMsg::error(&error))]
            }

            (_, Event::Close | Event::Error(_)) => {
                self.phase = Phase::Closed;
                self.subscriptions.clear();
                vec![Effect::UnsubscribeAll, Effect::Close]
            }
        }
    }

    fn on_text(&mut self, text: &str) -> Vec<Effect> {
        match decode_client(text) {
            Ok(ClientMsg::Subscribe { listing_id }) => {
                self.subscriptions.insert(listing_id);
                vec![Effect::Subscribe(listing_id)]
            }
            Ok(ClientMsg::Unsubscribe { listing_id }) => {
                self.subscriptions.remove(&listing_id);
                vec![
                    Effect::Unsubscribe(listing_id),
                    Effect::Send(ServerMsg::Unsubscribed { listing_id }),
                ]
            }
            Err(e) => vec![Effect::Malformed(e.to_string()), Effect::Send(ServerMsg::error(&e))],
        }
    }
}
