//! Request and response types for the admin REST API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{CopyTradeProduct, Purchase, TradeStatus};

/// Envelope every endpoint responds with.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

/// Body of a non-2xx response, when it is JSON at all.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message
            .filter(|m| !m.is_empty())
            .or(self.error.filter(|e| !e.is_empty()))
    }
}

/// Filters for the purchase list. Owned by whoever renders the list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TradeStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl PurchaseFilter {
    pub fn matches(&self, purchase: &Purchase) -> bool {
        self.status.map_or(true, |s| purchase.trade_status == s)
            && self
                .user_id
                .as_deref()
                .map_or(true, |u| purchase.owner_id() == u)
    }
}

/// Body of `POST /copytrade-purchases/admin`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePurchaseRequest {
    pub user_id: String,
    pub copytrade_option_id: String,
    #[serde(rename = "initial_investment", with = "rust_decimal::serde::float")]
    pub initial_investment: Decimal,
    pub auto_approve: bool,
}

/// Body of `PUT /copytrade-purchases/{id}` when driving a status transition.
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdateRequest {
    pub trade_status: TradeStatus,
}

/// Token holding deducted from a user's portfolio on approval.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deduction {
    pub token_name: String,
    pub token_amount: Decimal,
    pub usd_value: Decimal,
}

/// Result of a status update.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub purchase: Purchase,
    pub deductions: Vec<Deduction>,
    pub new_account_balance: Option<Decimal>,
    pub message: Option<String>,
}

/// `data` of a status update: approvals wrap the purchase together with
/// the deductions, plain updates return the purchase itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum StatusUpdateData {
    Approval {
        purchase: Purchase,
        #[serde(default)]
        deductions: Vec<Deduction>,
        #[serde(rename = "newAccountBalance", default)]
        new_account_balance: Option<Decimal>,
    },
    Plain(Purchase),
}

impl StatusUpdateData {
    pub(crate) fn into_change(self, message: Option<String>) -> StatusChange {
        match self {
            StatusUpdateData::Approval {
                purchase,
                deductions,
                new_account_balance,
            } => StatusChange {
                purchase,
                deductions,
                new_account_balance,
                message,
            },
            StatusUpdateData::Plain(purchase) => StatusChange {
                purchase,
                deductions: Vec::new(),
                new_account_balance: None,
                message,
            },
        }
    }
}

/// Result of an admin purchase creation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationOutcome {
    pub purchase: Purchase,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub deductions: Vec<Deduction>,
    #[serde(default)]
    pub new_account_balance: Option<Decimal>,
    #[serde(skip)]
    pub message: Option<String>,
}

/// Body of `POST /copytrading-options`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRequest {
    pub trade_title: String,
    pub trade_description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub trade_min: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub trade_max: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub trade_roi_min: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub trade_roi_max: Decimal,
    pub trade_risk: String,
    pub trade_duration: u32,
    #[serde(rename = "isRecommended")]
    pub is_recommended: bool,
}

impl From<&CopyTradeProduct> for ProductRequest {
    fn from(product: &CopyTradeProduct) -> Self {
        Self {
            trade_title: product.trade_title.clone(),
            trade_description: product.trade_description.clone(),
            trade_min: product.trade_min,
            trade_max: product.trade_max,
            trade_roi_min: product.trade_roi_min,
            trade_roi_max: product.trade_roi_max,
            trade_risk: product.trade_risk.clone(),
            trade_duration: product.trade_duration,
            is_recommended: product.is_recommended,
        }
    }
}

/// Body of `PUT /copytrading-options/{id}`. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_description: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub trade_min: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub trade_max: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub trade_roi_min: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub trade_roi_max: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_risk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_duration: Option<u32>,
    #[serde(rename = "isRecommended", skip_serializing_if = "Option::is_none")]
    pub is_recommended: Option<bool>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ProductUpdate::default()
    }

    /// The product as it would look after this update.
    pub fn merged(&self, current: &CopyTradeProduct) -> ProductRequest {
        let mut merged = ProductRequest::from(current);
        if let Some(title) = &self.trade_title {
            merged.trade_title = title.clone();
        }
        if let Some(description) = &self.trade_description {
            merged.trade_description = description.clone();
        }
        if let Some(risk) = &self.trade_risk {
            merged.trade_risk = risk.clone();
        }
        merged.trade_min = self.trade_min.unwrap_or(merged.trade_min);
        merged.trade_max = self.trade_max.unwrap_or(merged.trade_max);
        merged.trade_roi_min = self.trade_roi_min.unwrap_or(merged.trade_roi_min);
        merged.trade_roi_max = self.trade_roi_max.unwrap_or(merged.trade_roi_max);
        merged.trade_duration = self.trade_duration.unwrap_or(merged.trade_duration);
        merged.is_recommended = self.is_recommended.unwrap_or(merged.is_recommended);
        merged
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    pub token: String,
}
