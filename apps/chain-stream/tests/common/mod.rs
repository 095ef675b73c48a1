//! Shared fixtures for the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tonic::Streaming;
use tonic::transport::Channel;

use chain_stream::application::ports::FeedBus;
use chain_stream::{
    BusConfig, ChainStreamServer, ChainStreamServerConfig, EventAttribute, EventPublisher,
    EventTopic, RawEvent, RawEventBatch, SubscriptionBus,
    proto::{StreamRequest, StreamResponse, chain_stream_service_client::ChainStreamServiceClient},
};

/// `0x1111…11`, encoded as the chain emits it.
pub const SUBACCOUNT_A_B64: &str = "ERERERERERERERERERERERERERERERERERERERERERE=";
/// `0x2222…22`, encoded as the chain emits it.
pub const SUBACCOUNT_B_B64: &str = "IiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiIiI=";

pub const SUBACCOUNT_A: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
pub const SUBACCOUNT_B: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";

pub const MARKET_X: &str = "0x17ef48032cb24375ba7c2e39f384e56433bcab20cbee9a7357e4cba2eb00abe6";
pub const MARKET_Y: &str = "0x0611780ba69656949525013d947713300f56c37b6175e02f26bffa495c3208fe";

/// Publisher, bus and a gRPC server on a loopback port.
pub struct Harness {
    pub bus: Arc<SubscriptionBus>,
    pub publisher: Arc<EventPublisher>,
    pub server: Arc<ChainStreamServer>,
    pub addr: SocketAddr,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with(BusConfig::default(), 100).await
    }

    pub async fn start_with(bus_config: BusConfig, buffer_capacity: usize) -> Self {
        let bus = Arc::new(SubscriptionBus::new(bus_config));
        let publisher = Arc::new(
            EventPublisher::new(Arc::clone(&bus) as Arc<dyn FeedBus>)
                .with_buffer_capacity(buffer_capacity),
        );
        let server = Arc::new(ChainStreamServer::new(
            ChainStreamServerConfig::default(),
            Arc::clone(&bus),
        ));
        let addr = server.serve("127.0.0.1:0".parse().unwrap()).await.unwrap();
        publisher.run().unwrap();

        Self {
            bus,
            publisher,
            server,
            addr,
        }
    }

    pub async fn client(&self) -> ChainStreamServiceClient<Channel> {
        ChainStreamServiceClient::connect(format!("http://{}", self.addr))
            .await
            .unwrap()
    }

    /// Open a stream and wait until its subscription is registered.
    pub async fn subscribe(
        &self,
        market_ids: &[&str],
        subaccount_ids: &[&str],
    ) -> Streaming<StreamResponse> {
        let expected = self.bus.subscriber_count() + 1;
        let stream = self.open(market_ids, subaccount_ids).await.unwrap();
        self.wait_for_subscribers(expected).await;
        stream
    }

    pub async fn open(
        &self,
        market_ids: &[&str],
        subaccount_ids: &[&str],
    ) -> Result<Streaming<StreamResponse>, tonic::Status> {
        let request = StreamRequest {
            market_ids: market_ids.iter().map(ToString::to_string).collect(),
            subaccount_ids: subaccount_ids.iter().map(ToString::to_string).collect(),
        };
        Ok(self.client().await.stream(request).await?.into_inner())
    }

    pub async fn wait_for_subscribers(&self, count: usize) {
        timeout(Duration::from_secs(5), async {
            while self.bus.subscriber_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscriptions were not registered in time");
    }

    pub fn submit_all(&self, batches: impl IntoIterator<Item = RawEventBatch>) {
        for batch in batches {
            self.publisher.submit(batch).unwrap();
        }
    }

    pub async fn shutdown(&self) {
        self.publisher.stop().await;
        self.server.stop().await;
    }
}

/// Next message, failing the test if none arrives within two seconds.
pub async fn next(
    stream: &mut Streaming<StreamResponse>,
) -> Result<Option<StreamResponse>, tonic::Status> {
    timeout(Duration::from_secs(2), stream.message())
        .await
        .expect("timed out waiting for stream message")
}

/// Read until the stream ends, returning the responses and the final status.
pub async fn drain(
    stream: &mut Streaming<StreamResponse>,
) -> (Vec<StreamResponse>, Option<tonic::Status>) {
    let mut responses = Vec::new();
    loop {
        match next(stream).await {
            Ok(Some(response)) => responses.push(response),
            Ok(None) => return (responses, None),
            Err(status) => return (responses, Some(status)),
        }
    }
}

fn event(topic: EventTopic, attributes: &[(&str, String)]) -> RawEvent {
    RawEvent::new(
        topic.tag(),
        attributes
            .iter()
            .map(|(key, value)| EventAttribute::new(*key, value.clone()))
            .collect(),
    )
}

/// A provider price event carrying the height in its price.
pub fn price_event(height: u64) -> RawEvent {
    event(
        EventTopic::ProviderPrice,
        &[
            ("symbol", "\"INJ\"".to_string()),
            ("price", format!("\"{height}.5\"")),
        ],
    )
}

/// A position snapshot for each subaccount in `market_id`.
pub fn positions_event(market_id: &str, subaccounts_b64: &[&str]) -> RawEvent {
    let positions: Vec<String> = subaccounts_b64
        .iter()
        .map(|subaccount| {
            format!(
                r#"{{"position":{{"isLong":true,"quantity":"1.5","entry_price":"25.5","margin":"10.0","cumulative_funding_entry":"0.0"}},"subaccount_id":"{subaccount}"}}"#
            )
        })
        .collect();
    event(
        EventTopic::BatchDerivativePosition,
        &[
            ("market_id", format!("\"{market_id}\"")),
            ("positions", format!("[{}]", positions.join(","))),
        ],
    )
}

pub fn price_batch(height: u64) -> RawEventBatch {
    RawEventBatch::new(height, vec![price_event(height)])
}

/// A batch the decoder rejects.
pub fn broken_batch(height: u64) -> RawEventBatch {
    RawEventBatch::new(
        height,
        vec![RawEvent::new("injective.exchange.v1beta1.WrongType", vec![])],
    )
}
