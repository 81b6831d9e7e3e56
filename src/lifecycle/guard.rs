//! Client-side guards run before a request is issued.
//!
//! These only save round-trips for input that is obviously invalid. The
//! backend re-checks everything and remains the authority.

use rust_decimal::Decimal;

use crate::api::{CreatePurchaseRequest, ProductRequest, ProductUpdate};
use crate::error::{AdminError, Result};
use crate::models::{CopyTradeProduct, Purchase};

use super::state_machine::{transition, AdminAction};

/// Form state for creating a purchase on behalf of a user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurchaseDraft {
    pub user_id: String,
    pub product_id: Option<String>,
    pub initial_investment: Decimal,
    pub auto_approve: bool,
}

impl PurchaseDraft {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Select a product. The investment defaults to the product minimum.
    pub fn select_product(&mut self, product: &CopyTradeProduct) {
        self.product_id = Some(product.id.clone());
        self.initial_investment = product.trade_min;
    }

    pub fn with_investment(mut self, amount: Decimal) -> Self {
        self.initial_investment = amount;
        self
    }

    pub fn with_auto_approve(mut self, auto_approve: bool) -> Self {
        self.auto_approve = auto_approve;
        self
    }

    /// Validate against the already-fetched catalog and build the request.
    ///
    /// Checks run in a fixed order and the first failure wins.
    pub fn validate(&self, catalog: &[CopyTradeProduct]) -> Result<CreatePurchaseRequest> {
        let user_id = self.user_id.trim();
        if user_id.is_empty() {
            return Err(AdminError::Validation("User ID is required".to_string()));
        }

        let product_id = match self.product_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => {
                return Err(AdminError::Validation(
                    "Please select a copytrade option".to_string(),
                ))
            }
        };

        let product = catalog.iter().find(|p| p.id == product_id).ok_or_else(|| {
            AdminError::Validation("Please select a valid copytrade option".to_string())
        })?;

        let amount = self.initial_investment;
        if !product.accepts(amount) {
            let message = if amount < product.trade_min {
                format!("Minimum investment is ${}", product.trade_min)
            } else {
                format!("Maximum investment is ${}", product.trade_max)
            };
            return Err(AdminError::Validation(message));
        }
        if amount <= Decimal::ZERO {
            return Err(AdminError::Validation(
                "Investment amount must be greater than 0".to_string(),
            ));
        }

        Ok(CreatePurchaseRequest {
            user_id: user_id.to_string(),
            copytrade_option_id: product.id.clone(),
            initial_investment: amount,
            auto_approve: self.auto_approve,
        })
    }
}

/// Risk tiers a product may carry.
pub const RISK_LEVELS: [&str; 3] = ["low", "medium", "high"];

/// Check a complete product definition. The first failure wins.
pub fn check_product(product: &ProductRequest) -> Result<()> {
    let fail = |message: &str| Err(AdminError::Validation(message.to_string()));

    if product.trade_title.trim().is_empty() {
        return fail("Trade title is required");
    }
    if product.trade_description.trim().is_empty() {
        return fail("Trade description is required");
    }
    if !RISK_LEVELS.contains(&product.trade_risk.as_str()) {
        return fail("Trade risk must be one of low, medium, high");
    }
    if product.trade_min < Decimal::ZERO {
        return fail("Trade min cannot be negative");
    }
    if product.trade_max < product.trade_min {
        return fail("Trade max must be at least the trade min");
    }
    if product.trade_roi_min < Decimal::ZERO {
        return fail("Trade ROI min cannot be negative");
    }
    if product.trade_roi_max < product.trade_roi_min {
        return fail("Trade ROI max must be at least the ROI min");
    }
    if product.trade_duration < 1 {
        return fail("Trade duration must be at least 1 day");
    }
    Ok(())
}

/// Check a partial update against the product it will be applied to, so
/// that a lone `--max` below the stored min is caught too.
pub fn check_product_update(current: &CopyTradeProduct, update: &ProductUpdate) -> Result<()> {
    if update.is_empty() {
        return Err(AdminError::Validation("Nothing to update".to_string()));
    }
    check_product(&update.merged(current))
}

/// Refuse an action the purchase's current status does not allow.
pub fn ensure_allowed(purchase: &Purchase, action: AdminAction) -> Result<()> {
    transition(purchase.trade_status, action)
        .map(|_| ())
        .map_err(|e| AdminError::Validation(e.to_string()))
}
