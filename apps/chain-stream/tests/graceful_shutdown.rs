//! Graceful Shutdown Integration Tests
//!
//! Every client must see a contiguous run of heights ending at the last
//! published block, followed by `UNAVAILABLE`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use futures::future::join_all;
use tonic::Code;

use common::{Harness, drain, next, price_batch};

const CLIENTS: usize = 50;
const LAST_HEIGHT: u64 = 60;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fifty_clients_see_every_block_then_unavailable() {
    let harness = Harness::start().await;

    let mut streams = Vec::with_capacity(CLIENTS);
    for _ in 0..CLIENTS {
        streams.push(harness.open(&[], &[]).await.unwrap());
    }
    harness.wait_for_subscribers(CLIENTS).await;

    let readers: Vec<_> = streams
        .into_iter()
        .map(|mut stream| tokio::spawn(async move { drain(&mut stream).await }))
        .collect();

    harness.submit_all((1..=LAST_HEIGHT).map(price_batch));
    harness.shutdown().await;

    for result in join_all(readers).await {
        let (responses, status) = result.unwrap();
        let heights: Vec<u64> = responses.iter().map(|r| r.block_height).collect();

        assert_eq!(heights, (1..=LAST_HEIGHT).collect::<Vec<_>>());
        assert_eq!(status.unwrap().code(), Code::Unavailable);
    }

    assert_eq!(harness.publisher.latest_height(), LAST_HEIGHT);
    assert!(harness.bus.is_closed());
}

#[tokio::test]
async fn test_queued_batches_are_published_before_shutdown() {
    let harness = Harness::start().await;
    let mut stream = harness.subscribe(&[], &[]).await;

    harness.submit_all((1..=10).map(price_batch));
    harness.publisher.stop().await;

    assert_eq!(harness.publisher.latest_height(), 10);
    assert!(harness.publisher.submit(price_batch(11)).is_err());

    harness.server.stop().await;

    let (responses, status) = drain(&mut stream).await;
    assert_eq!(responses.len(), 10);
    assert_eq!(responses.last().unwrap().block_height, 10);
    assert_eq!(status.unwrap().code(), Code::Unavailable);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let harness = Harness::start().await;
    let mut stream = harness.subscribe(&[], &[]).await;

    harness.submit_all([price_batch(1)]);
    assert_eq!(next(&mut stream).await.unwrap().unwrap().block_height, 1);

    harness.shutdown().await;
    harness.shutdown().await;

    let status = next(&mut stream).await.unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
    assert!(harness.bus.subscribe().is_err());
}
