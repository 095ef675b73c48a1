//! Subscription Types
//!
//! A subscription is one connected client: an ID and the two allow-lists it
//! filters blocks by. Empty lists or lists containing `"*"` match everything.
//!
//! Subaccount filters are validated and canonicalized on construction, so the
//! filter can be compared directly against the keys of a [`BlockResponse`].
//!
//! [`BlockResponse`]: crate::domain::block::BlockResponse

use uuid::Uuid;

use crate::domain::filter::WILDCARD;
use crate::domain::records::SubaccountId;

/// Unique identifier of one subscription.
pub type SubscriptionId = Uuid;

/// Create a fresh subscription ID.
#[must_use]
pub fn new_subscription_id() -> SubscriptionId {
    Uuid::new_v4()
}

/// Subscription request validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// A market ID filter entry is empty.
    #[error("market id filter entries must not be empty")]
    EmptyMarketId,

    /// A subaccount ID filter entry is neither `*` nor a 32-byte hex ID.
    #[error("invalid subaccount id {value:?}: {reason}")]
    InvalidSubaccountId {
        /// The rejected entry.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl SubscriptionError {
    /// Request field the error refers to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyMarketId => "market_ids",
            Self::InvalidSubaccountId { .. } => "subaccount_ids",
        }
    }
}

/// Validated per-client filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamFilter {
    market_ids: Vec<String>,
    subaccount_ids: Vec<String>,
}

impl StreamFilter {
    /// Validate and canonicalize client-supplied filter lists.
    ///
    /// # Errors
    ///
    /// Returns an error for empty market IDs or malformed subaccount IDs.
    pub fn new(
        market_ids: Vec<String>,
        subaccount_ids: Vec<String>,
    ) -> Result<Self, SubscriptionError> {
        if market_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(SubscriptionError::EmptyMarketId);
        }
        let market_ids = market_ids.into_iter().map(canonical_market_id).collect();

        let subaccount_ids = subaccount_ids
            .into_iter()
            .map(|value| {
                if value == WILDCARD {
                    return Ok(value);
                }
                SubaccountId::from_hex(value.trim())
                    .map(|id| id.to_string())
                    .map_err(|e| SubscriptionError::InvalidSubaccountId {
                        reason: e.to_string(),
                        value,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            market_ids,
            subaccount_ids,
        })
    }

    /// Filter matching everything.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            market_ids: Vec::new(),
            subaccount_ids: Vec::new(),
        }
    }

    /// Market ID allow-list.
    #[must_use]
    pub fn market_ids(&self) -> &[String] {
        &self.market_ids
    }

    /// Canonical subaccount ID allow-list.
    #[must_use]
    pub fn subaccount_ids(&self) -> &[String] {
        &self.subaccount_ids
    }

    /// Whether the subaccount dimension admits `id`.
    #[must_use]
    pub fn matches_subaccount(&self, id: &SubaccountId) -> bool {
        if self.subaccount_ids.is_empty() || self.subaccount_ids.iter().any(|s| s == WILDCARD) {
            return true;
        }
        let canonical = id.to_string();
        self.subaccount_ids.iter().any(|s| *s == canonical)
    }
}

/// Market IDs are `0x`-hex on chain and compared as lowercase. Anything else
/// is kept verbatim.
fn canonical_market_id(value: String) -> String {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"));
    match digits {
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()) => {
            format!("0x{}", digits.to_ascii_lowercase())
        }
        _ => value,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SUBACCOUNT: &str = "0xeb8cf88b739fe12e303e31fb88fc37751e17cf3d000000000000000000000001";

    #[test]
    fn subaccounts_are_canonicalized() {
        let filter =
            StreamFilter::new(vec![], vec![SUBACCOUNT.to_uppercase().replace("0X", "0x")])
                .unwrap();
        assert_eq!(filter.subaccount_ids(), [SUBACCOUNT]);
    }

    #[test]
    fn hex_market_ids_are_lowercased() {
        let market = "0x17ef48032cb24375ba7c2e39f384e56433bcab20cbee9a7357e4cba2eb00abe6";
        let filter = StreamFilter::new(
            vec![
                market.to_uppercase().replace("0X", "0x"),
                market.to_uppercase(),
                "INJ/USDT".into(),
            ],
            vec![],
        )
        .unwrap();
        assert_eq!(filter.market_ids(), [market, market, "INJ/USDT"]);
    }

    #[test]
    fn wildcard_is_kept() {
        let filter = StreamFilter::new(vec!["*".into()], vec!["*".into()]).unwrap();
        assert_eq!(filter.market_ids(), ["*"]);
        assert_eq!(filter.subaccount_ids(), ["*"]);
    }

    #[test]
    fn malformed_subaccount_is_rejected() {
        let err = StreamFilter::new(vec![], vec!["0x1234".into()]).unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidSubaccountId { ref value, .. } if value == "0x1234"));
        assert_eq!(err.field(), "subaccount_ids");
    }

    #[test]
    fn empty_market_is_rejected() {
        let err = StreamFilter::new(vec!["0xabc".into(), " ".into()], vec![]).unwrap_err();
        assert_eq!(err, SubscriptionError::EmptyMarketId);
        assert_eq!(err.field(), "market_ids");
    }

    #[test]
    fn matches_subaccount_honours_wildcards() {
        let id = SubaccountId::from_hex(SUBACCOUNT).unwrap();
        let other = SubaccountId::from_slice(&[1]).unwrap();

        assert!(StreamFilter::all().matches_subaccount(&id));

        let filter = StreamFilter::new(vec![], vec![SUBACCOUNT.into()]).unwrap();
        assert!(filter.matches_subaccount(&id));
        assert!(!filter.matches_subaccount(&other));

        let filter = StreamFilter::new(vec![], vec![SUBACCOUNT.into(), "*".into()]).unwrap();
        assert!(filter.matches_subaccount(&other));
    }

    #[test]
    fn subscription_ids_are_unique() {
        assert_ne!(new_subscription_id(), new_subscription_id());
    }
}
