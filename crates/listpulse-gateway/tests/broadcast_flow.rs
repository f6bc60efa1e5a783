//! Subscribe / mutate / broadcast scenarios against an in-memory store.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;

use listpulse_core::protocol::ServerMsg;
use listpulse_core::{ListingMetrics, MetricField, PulseError};

use common::{app, drain, listing, subscriber};

fn metrics_of(msgs: &[ServerMsg]) -> Vec<ListingMetrics> {
    msgs.iter()
        .map(|m| match m {
            ServerMsg::MetricsUpdate { metrics, .. } => metrics.clone(),
            other => panic!("expected metrics_update, got {other:?}"),
        })
        .collect()
}

#[tokio::test]
async fn subscribe_yields_current_snapshot_without_prior_mutations() {
    let (app, store) = app().await;
    let id = listing(&store, "kettle").await;
    let (sub, mut rx) = subscriber(&app, 16);

    app.service().subscribe(id, sub).await.unwrap();

    let got = metrics_of(&drain(&mut rx));
    assert_eq!(got.len(), 1);
    assert_eq!((got[0].views, got[0].shares, got[0].clicks), (0, 0, 0));
    assert_eq!(got[0].listing_id, id);
}

#[tokio::test]
async fn three_views_and_a_share_arrive_in_order() {
    let (app, store) = app().await;
    let id = listing(&store, "guitar").await;
    let (sub, mut rx) = subscriber(&app, 16);
    let svc = app.service();

    svc.subscribe(id, sub).await.unwrap();
    drain(&mut rx);

    for _ in 0..3 {
        svc.record(id, MetricField::Views).await.unwrap();
    }
    let last = svc.record(id, MetricField::Shares).await.unwrap();
    assert_eq!((last.views, last.shares, last.clicks), (3, 1, 0));

    let got = metrics_of(&drain(&mut rx));
    let seen: Vec<(u64, u64, u64)> = got.iter().map(|m| (m.views, m.shares, m.clicks)).collect();
    assert_eq!(seen, vec![(1, 0, 0), (2, 0, 0), (3, 0, 0), (3, 1, 0)]);
    assert_eq!(got.last(), Some(&last));
}

#[tokio::test]
async fn concurrent_mutations_are_neither_lost_nor_reordered() {
    let (app, store) = app().await;
    let id = listing(&store, "tent").await;
    let (sub, mut rx) = subscriber(&app, 256);
    let svc = app.service();
    svc.subscribe(id, sub).await.unwrap();
    drain(&mut rx);

    let mut handles = Vec::new();
    for _ in 0..40 {
        let svc = Arc::clone(&svc);
        handles.push(tokio::spawn(async move {
            svc.record(id, MetricField::Views).await.unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(svc.snapshot(id).await.unwrap().views, 40);

    let views: Vec<u64> = metrics_of(&drain(&mut rx)).iter().map(|m| m.views).collect();
    assert_eq!(views, (1..=40).collect::<Vec<_>>());
}

#[tokio::test]
async fn listings_are_isolated() {
    let (app, store) = app().await;
    let one = listing(&store, "one").await;
    let two = listing(&store, "two").await;
    let (sub1, mut rx1) = subscriber(&app, 16);
    let (sub2, mut rx2) = subscriber(&app, 16);
    let svc = app.service();

    svc.subscribe(one, sub1).await.unwrap();
    svc.subscribe(two, sub2).await.unwrap();
    drain(&mut rx1);
    drain(&mut rx2);

    svc.record(one, MetricField::Clicks).await.unwrap();
    svc.record(one, MetricField::Views).await.unwrap();

    assert_eq!(drain(&mut rx1).len(), 2);
    assert!(drain(&mut rx2).is_empty());
}

#[tokio::test]
async fn closed_subscriber_is_pruned_in_the_broadcast_that_finds_it() {
    let (app, store) = app().await;
    let id = listing(&store, "lamp").await;
    let (gone, rx_gone) = subscriber(&app, 16);
    let (live, mut rx_live) = subscriber(&app, 16);
    let svc = app.service();

    svc.subscribe(id, gone.clone()).await.unwrap();
    svc.subscribe(id, live).await.unwrap();
    drop(rx_gone);
    drain(&mut rx_live);

    // the caller never sees the delivery failure
    let m = svc.record(id, MetricField::Views).await.unwrap();
    assert_eq!(m.views, 1);
    assert!(!svc.registry().is_subscribed(gone.conn_id, id));
    assert_eq!(svc.registry().subscriber_count(id), 1);
    assert_eq!(drain(&mut rx_live).len(), 1);

    svc.record(id, MetricField::Views).await.unwrap();
    assert_eq!(drain(&mut rx_live).len(), 1);
    assert_eq!(app.obs().subscribers_pruned.get(&[]), 1);
}

#[tokio::test]
async fn subscribe_to_unknown_listing_registers_nothing() {
    let (app, _store) = app().await;
    let (sub, mut rx) = subscriber(&app, 16);
    let conn = sub.conn_id;

    let err = app.service().subscribe(404, sub).await.unwrap_err();
    assert!(matches!(err, PulseError::NotFound(_)));
    assert!(app.service().registry().listings_of(conn).is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn disconnect_purges_every_subscription() {
    let (app, store) = app().await;
    let a = listing(&store, "a").await;
    let b = listing(&store, "b").await;
    let (sub, mut rx) = subscriber(&app, 16);
    let conn = sub.conn_id;
    let svc = app.service();

    svc.subscribe(a, sub.clone()).await.unwrap();
    svc.subscribe(b, sub).await.unwrap();
    assert_eq!(svc.disconnect(conn), 2);
    assert_eq!(svc.disconnect(conn), 0);
    drain(&mut rx);

    svc.record(a, MetricField::Views).await.unwrap();
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn explicit_broadcast_pushes_current_state() {
    let (app, store) = app().await;
    let id = listing(&store, "sofa").await;
    let svc = app.service();

    // nobody listening: nothing to do
    assert_eq!(svc.broadcast(id).await.unwrap().delivered, 0);

    let (sub, mut rx) = subscriber(&app, 16);
    svc.subscribe(id, sub).await.unwrap();
    drain(&mut rx);

    let report = svc.broadcast(id).await.unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(metrics_of(&drain(&mut rx))[0].views, 0);
}

#[tokio::test]
async fn store_failure_surfaces_and_skips_broadcast() {
    let (app, store) = app().await;
    let id = listing(&store, "vase").await;
    let (sub, mut rx) = subscriber(&app, 16);
    let svc = app.service();
    svc.subscribe(id, sub).await.unwrap();
    drain(&mut rx);

    store.pool().close().await;

    let err = svc.record(id, MetricField::Views).await.unwrap_err();
    assert!(matches!(err, PulseError::StoreFailure(_)), "{err}");
    assert!(drain(&mut rx).is_empty());
    assert_eq!(app.obs().store_errors.get(&[]), 1);
}
