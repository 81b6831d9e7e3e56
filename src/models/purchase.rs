//! Copy-trade purchase model: one user's investment into one product.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl TradeStatus {
    pub const ALL: [TradeStatus; 4] = [
        TradeStatus::Pending,
        TradeStatus::Active,
        TradeStatus::Completed,
        TradeStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "pending",
            TradeStatus::Active => "active",
            TradeStatus::Completed => "completed",
            TradeStatus::Cancelled => "cancelled",
        }
    }

    /// No admin transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeStatus::Completed | TradeStatus::Cancelled)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TradeStatus::Pending),
            "active" => Ok(TradeStatus::Active),
            "completed" => Ok(TradeStatus::Completed),
            "cancelled" => Ok(TradeStatus::Cancelled),
            other => {
                let expected: Vec<&str> = TradeStatus::ALL.iter().map(|s| s.as_str()).collect();
                Err(format!(
                    "unknown trade status: {} (expected one of {})",
                    other,
                    expected.join(", ")
                ))
            }
        }
    }
}

/// Owning user as returned by the backend: either a bare id or a populated summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PurchaseOwner {
    Id(String),
    Summary {
        #[serde(rename = "_id")]
        id: String,
        #[serde(default)]
        email: String,
    },
}

impl PurchaseOwner {
    pub fn id(&self) -> &str {
        match self {
            PurchaseOwner::Id(id) => id,
            PurchaseOwner::Summary { id, .. } => id,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            PurchaseOwner::Id(_) => None,
            PurchaseOwner::Summary { email, .. } if !email.is_empty() => Some(email.as_str()),
            PurchaseOwner::Summary { .. } => None,
        }
    }
}

/// Denormalized user details attached to a purchase for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Copy-trade purchase record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    #[serde(rename = "_id")]
    pub id: String,

    pub user: PurchaseOwner,

    #[serde(rename = "userDetails", default, skip_serializing_if = "Option::is_none")]
    pub user_details: Option<UserDetails>,

    /// Product id this purchase was made against
    #[serde(rename = "copytradeOption", default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,

    #[serde(default)]
    pub trade_title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_risk: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_min: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_max: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_roi_min: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_roi_max: Option<Decimal>,

    /// Trade duration in days
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_duration: Option<u32>,

    /// USD amount fixed at creation
    pub initial_investment: Decimal,

    #[serde(default)]
    pub trade_current_value: Option<Decimal>,

    #[serde(default)]
    pub trade_profit_loss: Option<Decimal>,

    pub trade_status: TradeStatus,

    #[serde(default)]
    pub trade_start_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub trade_end_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub trade_approval_date: Option<DateTime<Utc>>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Purchase {
    pub fn owner_id(&self) -> &str {
        self.user.id()
    }

    /// Best label for the owning user: username, then email, then raw id.
    pub fn owner_label(&self) -> String {
        if let Some(details) = &self.user_details {
            if !details.username.is_empty() {
                return details.username.clone();
            }
            if !details.email.is_empty() {
                return details.email.clone();
            }
        }
        self.user
            .email()
            .map(str::to_string)
            .unwrap_or_else(|| self.user.id().to_string())
    }

    /// Profit/loss as a percentage of the initial investment.
    pub fn profit_loss_pct(&self) -> Option<Decimal> {
        if self.initial_investment.is_zero() {
            return None;
        }
        self.trade_profit_loss
            .map(|pnl| pnl / self.initial_investment * Decimal::ONE_HUNDRED)
    }
}
