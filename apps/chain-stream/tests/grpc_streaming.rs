//! gRPC Streaming Integration Tests
//!
//! Tests the full data flow from batch submission to gRPC client reception.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::time::Duration;

use tokio::time::timeout;
use tonic::Code;
use tonic_types::StatusExt;

use chain_stream::RawEventBatch;
use common::{
    Harness, MARKET_X, MARKET_Y, SUBACCOUNT_A, SUBACCOUNT_A_B64, SUBACCOUNT_B, SUBACCOUNT_B_B64,
    broken_batch, drain, next, positions_event, price_batch, price_event,
};

fn mixed_batch(height: u64) -> RawEventBatch {
    RawEventBatch::new(
        height,
        vec![
            positions_event(MARKET_X, &[SUBACCOUNT_A_B64, SUBACCOUNT_B_B64]),
            positions_event(MARKET_Y, &[SUBACCOUNT_A_B64]),
            price_event(height),
        ],
    )
}

// =============================================================================
// Delivery
// =============================================================================

#[tokio::test]
async fn test_blocks_arrive_in_height_order() {
    let harness = Harness::start().await;
    let mut stream = harness.subscribe(&[], &[]).await;

    harness.submit_all((1..=5).map(price_batch));

    for height in 1..=5 {
        let response = next(&mut stream).await.unwrap().unwrap();
        assert_eq!(response.block_height, height);
        assert_eq!(response.oracle_prices.len(), 1);
        assert_eq!(response.oracle_prices[0].symbol, "INJ");
        assert_eq!(response.oracle_prices[0].price, format!("{height}.5"));
    }

    harness.shutdown().await;
}

#[tokio::test]
async fn test_empty_blocks_are_still_delivered() {
    let harness = Harness::start().await;
    let mut stream = harness.subscribe(&[MARKET_X], &[]).await;

    harness.submit_all([
        RawEventBatch::new(1, Vec::new()),
        RawEventBatch::new(2, vec![positions_event(MARKET_Y, &[SUBACCOUNT_A_B64])]),
    ]);

    let first = next(&mut stream).await.unwrap().unwrap();
    let second = next(&mut stream).await.unwrap().unwrap();

    assert_eq!(first.block_height, 1);
    assert_eq!(second.block_height, 2);
    assert!(second.positions.is_empty());

    harness.shutdown().await;
}

// =============================================================================
// Filtering
// =============================================================================

#[tokio::test]
async fn test_market_filter_selects_positions() {
    let harness = Harness::start().await;
    let mut market_x = harness.subscribe(&[MARKET_X], &[]).await;
    let mut everything = harness.subscribe(&["*"], &["*"]).await;

    harness.submit_all([mixed_batch(7)]);

    let filtered = next(&mut market_x).await.unwrap().unwrap();
    assert_eq!(filtered.block_height, 7);
    assert_eq!(filtered.positions.len(), 2);
    assert!(filtered.positions.iter().all(|p| p.market_id == MARKET_X));
    assert_eq!(filtered.oracle_prices.len(), 1);

    let all = next(&mut everything).await.unwrap().unwrap();
    assert_eq!(all.positions.len(), 3);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_market_filter_ignores_hex_case() {
    let harness = Harness::start().await;
    let upper = MARKET_X.to_uppercase();
    let mut stream = harness.subscribe(&[upper.as_str()], &[]).await;

    harness.submit_all([mixed_batch(5)]);

    let response = next(&mut stream).await.unwrap().unwrap();
    assert_eq!(response.positions.len(), 2);
    assert!(response.positions.iter().all(|p| p.market_id == MARKET_X));

    harness.shutdown().await;
}

#[tokio::test]
async fn test_subaccount_filter_applies_across_markets() {
    let harness = Harness::start().await;
    let mut stream = harness.subscribe(&[], &[SUBACCOUNT_A]).await;

    harness.submit_all([mixed_batch(3)]);

    let response = next(&mut stream).await.unwrap().unwrap();
    assert_eq!(response.positions.len(), 2);
    assert!(
        response
            .positions
            .iter()
            .all(|p| p.subaccount_id == SUBACCOUNT_A)
    );

    harness.shutdown().await;
}

#[tokio::test]
async fn test_both_filters_intersect() {
    let harness = Harness::start().await;
    let mut stream = harness.subscribe(&[MARKET_X], &[SUBACCOUNT_B]).await;

    harness.submit_all([mixed_batch(4)]);

    let response = next(&mut stream).await.unwrap().unwrap();
    assert_eq!(response.positions.len(), 1);
    assert_eq!(response.positions[0].market_id, MARKET_X);
    assert_eq!(response.positions[0].subaccount_id, SUBACCOUNT_B);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_invalid_subaccount_is_rejected() {
    let harness = Harness::start().await;

    let status = harness.open(&[], &["not-a-subaccount"]).await.unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    let details = status.get_error_details();
    let bad_request = details.bad_request().unwrap();
    assert_eq!(bad_request.field_violations[0].field, "subaccount_ids");
    assert_eq!(harness.bus.subscriber_count(), 0);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_empty_market_id_is_rejected() {
    let harness = Harness::start().await;

    let status = harness.open(&[""], &[]).await.unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);

    harness.shutdown().await;
}

// =============================================================================
// Termination
// =============================================================================

#[tokio::test]
async fn test_decode_failure_ends_streams_with_internal() {
    let harness = Harness::start().await;
    let mut stream = harness.subscribe(&[], &[]).await;

    harness.submit_all([price_batch(1), broken_batch(2)]);

    let (responses, status) = drain(&mut stream).await;
    let heights: Vec<u64> = responses.iter().map(|r| r.block_height).collect();
    assert_eq!(heights, [1]);

    let status = status.unwrap();
    assert_eq!(status.code(), Code::Internal);
    assert!(status.message().starts_with("block 2:"));

    harness.server.stop().await;
}

#[tokio::test]
async fn test_late_subscriber_sees_terminal_error() {
    let harness = Harness::start().await;
    harness.submit_all([broken_batch(1)]);
    harness.publisher.stop().await;

    let mut stream = harness.open(&[], &[]).await.unwrap();
    let (responses, status) = drain(&mut stream).await;

    assert!(responses.is_empty());
    assert_eq!(status.unwrap().code(), Code::Internal);

    harness.server.stop().await;
}

#[tokio::test]
async fn test_client_disconnect_releases_subscription() {
    let harness = Harness::start().await;
    let stream = harness.subscribe(&[], &[]).await;
    assert_eq!(harness.bus.subscriber_count(), 1);

    drop(stream);

    timeout(Duration::from_secs(2), async {
        while harness.bus.subscriber_count() > 0 || harness.server.active_streams() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    harness.shutdown().await;
}
