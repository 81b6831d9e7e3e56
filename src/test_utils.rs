//! Shared fixtures for unit tests.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use crate::models::{CopyTradeProduct, Purchase, PurchaseOwner, TradeStatus};

pub const USER_ID: &str = "u1";

/// A purchase owned by [`USER_ID`] against product `opt1`.
pub fn purchase(id: &str, status: TradeStatus, initial_investment: Decimal) -> Purchase {
    let created = Utc
        .with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);

    Purchase {
        id: id.to_string(),
        user: PurchaseOwner::Id(USER_ID.to_string()),
        user_details: None,
        product_id: Some("opt1".to_string()),
        trade_title: "BTC Momentum".to_string(),
        trade_risk: Some("low".to_string()),
        trade_min: Some(Decimal::from(1000)),
        trade_max: Some(Decimal::from(50000)),
        trade_roi_min: Some(Decimal::from(5)),
        trade_roi_max: Some(Decimal::from(15)),
        trade_duration: Some(30),
        initial_investment,
        trade_current_value: None,
        trade_profit_loss: None,
        trade_status: status,
        trade_start_date: None,
        trade_end_date: None,
        trade_approval_date: None,
        created_at: created,
        updated_at: created,
    }
}

pub fn product(id: &str, min: Decimal, max: Decimal) -> CopyTradeProduct {
    CopyTradeProduct {
        id: id.to_string(),
        trade_title: format!("Product {}", id),
        trade_description: format!("Copy trades for {}", id),
        trade_min: min,
        trade_max: max,
        trade_roi_min: Decimal::from(5),
        trade_roi_max: Decimal::from(15),
        trade_risk: "low".to_string(),
        trade_duration: 30,
        is_recommended: false,
        created_at: None,
        updated_at: None,
    }
}
