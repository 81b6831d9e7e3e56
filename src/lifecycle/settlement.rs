//! Balance effects each transition requires of the backend, and the
//! end-of-trade settlement it reports back.
//!
//! Nothing here computes a final value. When a trade ends without a tracked
//! `trade_current_value`, the backend resolves the final ROI from the
//! product's band and risk tier; the client only reads the result.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::{CreatePurchaseRequest, CreationOutcome};
use crate::models::{Purchase, TradeStatus};

use super::state_machine::{initial_status, AdminAction};

/// Change to a user's account balance (USD-equivalent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceEffect {
    None,
    Debit(Decimal),
    /// Credited as USDT.
    Credit(Decimal),
}

impl BalanceEffect {
    /// Required effect of an action on an existing purchase.
    ///
    /// `final_value` is the value the backend reported when ending a trade;
    /// without it an end-trade effect is unknown and `None` is returned.
    pub fn of_action(
        action: AdminAction,
        purchase: &Purchase,
        final_value: Option<Decimal>,
    ) -> Option<BalanceEffect> {
        match action {
            AdminAction::Approve => Some(BalanceEffect::Debit(purchase.initial_investment)),
            AdminAction::Reject | AdminAction::Delete => Some(BalanceEffect::None),
            AdminAction::EndTrade => final_value.map(BalanceEffect::Credit),
        }
    }

    /// Required effect of creating a purchase. An auto-approved purchase
    /// carries exactly the approval deduction.
    pub fn of_creation(initial_investment: Decimal, auto_approve: bool) -> BalanceEffect {
        match initial_status(auto_approve) {
            TradeStatus::Active => BalanceEffect::Debit(initial_investment),
            _ => BalanceEffect::None,
        }
    }

    /// Balance after this effect.
    pub fn apply_to(&self, balance: Decimal) -> Decimal {
        match *self {
            BalanceEffect::None => balance,
            BalanceEffect::Debit(amount) => balance - amount,
            BalanceEffect::Credit(amount) => balance + amount,
        }
    }

    /// Signed change to the balance.
    pub fn delta(&self) -> Decimal {
        self.apply_to(Decimal::ZERO)
    }
}

/// Where a settled trade's final value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalValueSource {
    /// The continuously tracked `trade_current_value`.
    Tracked(Decimal),
    /// Resolved by the backend from the product's ROI band and risk tier.
    BackendResolved,
}

impl FinalValueSource {
    pub fn for_purchase(purchase: &Purchase) -> Self {
        match purchase.trade_current_value {
            Some(value) => FinalValueSource::Tracked(value),
            None => FinalValueSource::BackendResolved,
        }
    }
}

/// What the backend returns after ending an active trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub purchase: Purchase,

    /// Final USD-equivalent value credited to the user
    #[serde(default)]
    pub final_value: Option<Decimal>,

    /// Final ROI in percent
    #[serde(rename = "finalROI", default)]
    pub final_roi: Option<Decimal>,

    /// User's account balance after the credit
    #[serde(default)]
    pub new_account_balance: Option<Decimal>,

    #[serde(skip)]
    pub message: Option<String>,
}

impl Settlement {
    /// Credit the user received, per the backend's report.
    pub fn balance_effect(&self) -> Option<BalanceEffect> {
        BalanceEffect::of_action(AdminAction::EndTrade, &self.purchase, self.final_value)
    }

    /// Parts of the settlement contract the returned record does not honour.
    pub fn contract_violations(&self) -> Vec<&'static str> {
        let mut violations = Vec::new();
        if self.purchase.trade_status != TradeStatus::Completed {
            violations.push("purchase is not marked completed");
        }
        if self.purchase.trade_end_date.is_none() {
            violations.push("trade_end_date is not set");
        }
        if self.final_value.is_none() {
            violations.push("final value was not reported");
        }
        if self.final_roi.is_none() {
            violations.push("final ROI was not reported");
        }
        if self.new_account_balance.is_none() {
            violations.push("new account balance was not reported");
        }
        violations
    }
}

impl CreationOutcome {
    /// Parts of the creation contract the response does not honour for
    /// `request`: the initial status, the amount and, when the purchase was
    /// auto-approved, the reported balance after the deduction.
    pub fn contract_violations(&self, request: &CreatePurchaseRequest) -> Vec<&'static str> {
        let mut violations = Vec::new();
        if self.purchase.trade_status != initial_status(request.auto_approve) {
            violations.push(if request.auto_approve {
                "auto-approved purchase is not active"
            } else {
                "new purchase is not pending"
            });
        }
        if self.purchase.initial_investment != request.initial_investment {
            violations.push("initial investment differs from the request");
        }
        let effect = BalanceEffect::of_creation(request.initial_investment, request.auto_approve);
        if effect != BalanceEffect::None && self.new_account_balance.is_none() {
            violations.push("new account balance was not reported");
        }
        violations
    }
}
