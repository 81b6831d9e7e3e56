//! Copy-trade product (catalog entry a purchase is made against).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catalog entry offered for purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyTradeProduct {
    #[serde(rename = "_id")]
    pub id: String,

    pub trade_title: String,

    #[serde(default)]
    pub trade_description: String,

    /// Minimum investment in USD
    pub trade_min: Decimal,

    /// Maximum investment in USD
    pub trade_max: Decimal,

    /// Lower bound of the advertised ROI band, in percent
    #[serde(default)]
    pub trade_roi_min: Decimal,

    /// Upper bound of the advertised ROI band, in percent
    #[serde(default)]
    pub trade_roi_max: Decimal,

    /// Risk tier label ("low", "medium", "high")
    #[serde(default)]
    pub trade_risk: String,

    /// Duration in days
    #[serde(default)]
    pub trade_duration: u32,

    #[serde(rename = "isRecommended", default)]
    pub is_recommended: bool,

    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(rename = "updatedAt", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CopyTradeProduct {
    /// Whether an amount lies inside the product's investment bounds (inclusive).
    pub fn accepts(&self, amount: Decimal) -> bool {
        amount >= self.trade_min && amount <= self.trade_max
    }

    /// Short label used in listings.
    pub fn label(&self) -> String {
        if self.trade_risk.is_empty() {
            self.trade_title.clone()
        } else {
            format!("{} ({} risk)", self.trade_title, self.trade_risk)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decode_catalog_entry() {
        let raw = r#"{
            "_id": "opt1",
            "trade_title": "ETH Swing",
            "trade_description": "Mid-term swings",
            "trade_min": 1000,
            "trade_max": 50000,
            "trade_roi_min": 5,
            "trade_roi_max": 12.5,
            "trade_risk": "medium",
            "trade_duration": 30,
            "isRecommended": true,
            "user": "6897a73e63d62b4a2878ab4c",
            "__v": 0,
            "createdAt": "2024-02-01T00:00:00.000Z",
            "updatedAt": "2024-02-01T00:00:00.000Z"
        }"#;
        let product: CopyTradeProduct = serde_json::from_str(raw).unwrap();

        assert_eq!(product.trade_min, dec!(1000));
        assert_eq!(product.trade_max, dec!(50000));
        assert!(product.is_recommended);
        assert_eq!(product.label(), "ETH Swing (medium risk)");
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let product: CopyTradeProduct = serde_json::from_str(
            r#"{"_id": "o", "trade_title": "T", "trade_min": 1000, "trade_max": 50000}"#,
        )
        .unwrap();

        assert!(product.accepts(dec!(1000)));
        assert!(product.accepts(dec!(50000)));
        assert!(!product.accepts(dec!(999.99)));
        assert!(!product.accepts(dec!(50000.01)));
    }
}
