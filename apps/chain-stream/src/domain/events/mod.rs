//! Raw Block Events
//!
//! Input types for the stream pipeline: the tagged, attribute-bearing events
//! the state machine emits while executing one block, and the topic
//! vocabulary the decoder understands.
//!
//! Attribute values are opaque strings. Most hold a JSON document (strings
//! arrive JSON-quoted, nested records as JSON arrays or objects).

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Raw Events
// =============================================================================

/// One attribute of a raw event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
    /// Attribute name.
    pub key: String,
    /// Opaque attribute payload.
    pub value: String,
    /// Whether the attribute is indexed by the node.
    #[serde(default)]
    pub index: bool,
}

impl EventAttribute {
    /// Create an indexed attribute.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            index: true,
        }
    }
}

/// A single tagged event emitted during block execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Fully qualified type tag, e.g. `injective.exchange.v1beta1.EventNewSpotOrders`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Ordered attributes.
    #[serde(default)]
    pub attributes: Vec<EventAttribute>,
}

impl RawEvent {
    /// Create an event with the given tag and attributes.
    #[must_use]
    pub fn new(kind: impl Into<String>, attributes: Vec<EventAttribute>) -> Self {
        Self {
            kind: kind.into(),
            attributes,
        }
    }

    /// Value of the first attribute named `key`.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.as_str())
    }
}

/// Everything the state machine emits for one block.
///
/// Consumed exactly once by the publisher and dropped after processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEventBatch {
    /// Block height.
    pub height: u64,
    /// Events in emission order.
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

impl RawEventBatch {
    /// Create a batch for `height`.
    #[must_use]
    pub const fn new(height: u64, events: Vec<RawEvent>) -> Self {
        Self { height, events }
    }
}

// =============================================================================
// Topics
// =============================================================================

/// Event tags understood by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    /// Batched subaccount balance changes.
    SubaccountDeposit,
    /// Newly booked spot limit orders.
    SpotOrders,
    /// Newly booked derivative limit orders.
    DerivativeOrders,
    /// A cancelled spot order.
    CancelSpotOrder,
    /// A cancelled derivative order (limit or market).
    CancelDerivativeOrder,
    /// Spot trade executions.
    BatchSpotExecution,
    /// Derivative trade executions.
    BatchDerivativeExecution,
    /// Derivative position snapshots.
    BatchDerivativePosition,
    /// Pyth oracle prices.
    PythPrices,
    /// Band IBC oracle prices.
    BandIbcPrices,
    /// Price set by a registered price provider.
    ProviderPrice,
    /// Price set by a price feeder.
    PriceFeedPrice,
}

impl EventTopic {
    /// Every topic, in dispatch order.
    pub const ALL: [Self; 12] = [
        Self::SubaccountDeposit,
        Self::SpotOrders,
        Self::DerivativeOrders,
        Self::CancelSpotOrder,
        Self::CancelDerivativeOrder,
        Self::BatchSpotExecution,
        Self::BatchDerivativeExecution,
        Self::BatchDerivativePosition,
        Self::PythPrices,
        Self::BandIbcPrices,
        Self::ProviderPrice,
        Self::PriceFeedPrice,
    ];

    /// Wire type tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::SubaccountDeposit => "injective.exchange.v1beta1.EventBatchDepositUpdate",
            Self::SpotOrders => "injective.exchange.v1beta1.EventNewSpotOrders",
            Self::DerivativeOrders => "injective.exchange.v1beta1.EventNewDerivativeOrders",
            Self::CancelSpotOrder => "injective.exchange.v1beta1.EventCancelSpotOrder",
            Self::CancelDerivativeOrder => "injective.exchange.v1beta1.EventCancelDerivativeOrder",
            Self::BatchSpotExecution => "injective.exchange.v1beta1.EventBatchSpotExecution",
            Self::BatchDerivativeExecution => {
                "injective.exchange.v1beta1.EventBatchDerivativeExecution"
            }
            Self::BatchDerivativePosition => {
                "injective.exchange.v1beta1.EventBatchDerivativePosition"
            }
            Self::PythPrices => "injective.oracle.v1beta1.EventSetPythPrices",
            Self::BandIbcPrices => "injective.oracle.v1beta1.SetBandIBCPriceEvent",
            Self::ProviderPrice => "injective.oracle.v1beta1.SetProviderPriceEvent",
            Self::PriceFeedPrice => "injective.oracle.v1beta1.SetPriceFeedPriceEvent",
        }
    }

    /// Look up a topic by wire tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|topic| topic.tag() == tag)
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SubaccountDeposit => "subaccount_deposit",
            Self::SpotOrders => "spot_orders",
            Self::DerivativeOrders => "derivative_orders",
            Self::CancelSpotOrder => "cancel_spot_order",
            Self::CancelDerivativeOrder => "cancel_derivative_order",
            Self::BatchSpotExecution => "batch_spot_execution",
            Self::BatchDerivativeExecution => "batch_derivative_execution",
            Self::BatchDerivativePosition => "batch_derivative_position",
            Self::PythPrices => "pyth_prices",
            Self::BandIbcPrices => "band_ibc_prices",
            Self::ProviderPrice => "provider_price",
            Self::PriceFeedPrice => "price_feed_price",
        }
    }
}

impl fmt::Display for EventTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_tags_round_trip() {
        for topic in EventTopic::ALL {
            assert_eq!(EventTopic::from_tag(topic.tag()), Some(topic));
        }
    }

    #[test]
    fn unknown_tag_has_no_topic() {
        assert_eq!(EventTopic::from_tag("some_unexpected_topic"), None);
        assert_eq!(EventTopic::from_tag(""), None);
    }

    #[test]
    fn attribute_lookup_returns_first_match() {
        let event = RawEvent::new(
            EventTopic::SpotOrders.tag(),
            vec![
                EventAttribute::new("market_id", "\"0xabc\""),
                EventAttribute::new("market_id", "\"0xdef\""),
            ],
        );
        assert_eq!(event.attribute("market_id"), Some("\"0xabc\""));
        assert_eq!(event.attribute("buy_orders"), None);
    }

    #[test]
    fn batch_deserializes_from_node_json() {
        let json = r#"{
            "height": 42,
            "events": [
                {
                    "type": "injective.oracle.v1beta1.SetProviderPriceEvent",
                    "attributes": [
                        {"key": "symbol", "value": "\"mietek\"", "index": true},
                        {"key": "price", "value": "\"0.5\""}
                    ]
                }
            ]
        }"#;

        let batch: RawEventBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.height, 42);
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].kind, EventTopic::ProviderPrice.tag());
        assert!(batch.events[0].attributes[0].index);
        assert!(!batch.events[0].attributes[1].index);
    }

    #[test]
    fn batch_without_events_is_empty() {
        let batch: RawEventBatch = serde_json::from_str(r#"{"height": 7}"#).unwrap();
        assert!(batch.events.is_empty());
    }
}
