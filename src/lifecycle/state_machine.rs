//! Purchase lifecycle: which admin actions are valid from which status.
//!
//! ```text
//! (create) ──> pending ──approve──> active ──end trade──> completed
//!                 │
//!                 └──reject──> cancelled
//! ```
//!
//! Delete is orthogonal to status and allowed from any state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Purchase, TradeStatus};

/// Action an admin can take on an existing purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    Approve,
    Reject,
    EndTrade,
    Delete,
}

impl AdminAction {
    pub const ALL: [AdminAction; 4] = [
        AdminAction::Approve,
        AdminAction::Reject,
        AdminAction::EndTrade,
        AdminAction::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAction::Approve => "approve",
            AdminAction::Reject => "reject",
            AdminAction::EndTrade => "end_trade",
            AdminAction::Delete => "delete",
        }
    }

    /// Message shown when the request fails without a usable backend message.
    pub fn failure_message(&self) -> &'static str {
        match self {
            AdminAction::Approve => "Failed to approve purchase",
            AdminAction::Reject => "Failed to reject purchase",
            AdminAction::EndTrade => "Failed to end trade",
            AdminAction::Delete => "Failed to delete purchase",
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            AdminAction::Approve => "Purchase approved successfully",
            AdminAction::Reject => "Purchase rejected successfully",
            AdminAction::EndTrade => "Trade ended successfully",
            AdminAction::Delete => "Purchase deleted successfully",
        }
    }
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of applying an action to a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Successor {
    Status(TradeStatus),
    /// The record is removed entirely.
    Removed,
}

/// An action that is not valid from the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub action: AdminAction,
    pub from: TradeStatus,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            AdminAction::Approve => write!(
                f,
                "Only pending purchases can be approved (current status: {})",
                self.from
            ),
            AdminAction::Reject => write!(
                f,
                "Only pending purchases can be rejected (current status: {})",
                self.from
            ),
            AdminAction::EndTrade => write!(
                f,
                "Only active trades can be ended (current status: {})",
                self.from
            ),
            AdminAction::Delete => write!(f, "Purchase cannot be deleted"),
        }
    }
}

impl std::error::Error for TransitionError {}

/// Transition table. `None` means the action is not valid from `from`.
pub fn successor(from: TradeStatus, action: AdminAction) -> Option<Successor> {
    use AdminAction::*;
    use TradeStatus::*;

    match (from, action) {
        (_, Delete) => Some(Successor::Removed),
        (Pending, Approve) => Some(Successor::Status(Active)),
        (Pending, Reject) => Some(Successor::Status(Cancelled)),
        (Active, EndTrade) => Some(Successor::Status(Completed)),
        _ => None,
    }
}

/// Apply an action to a status.
pub fn transition(from: TradeStatus, action: AdminAction) -> Result<Successor, TransitionError> {
    successor(from, action).ok_or(TransitionError { action, from })
}

/// Actions offered for a purchase in the given status. Anything not listed
/// here is hidden from the operator.
pub fn available_actions(status: TradeStatus) -> Vec<AdminAction> {
    AdminAction::ALL
        .into_iter()
        .filter(|action| successor(status, *action).is_some())
        .collect()
}

/// Status a new purchase is born in. Auto-approval is the approve
/// transition applied to a fresh pending purchase.
pub fn initial_status(auto_approve: bool) -> TradeStatus {
    if !auto_approve {
        return TradeStatus::Pending;
    }
    match successor(TradeStatus::Pending, AdminAction::Approve) {
        Some(Successor::Status(status)) => status,
        _ => TradeStatus::Pending,
    }
}

impl Purchase {
    /// Apply a confirmed status transition to this record, stamping the
    /// lifecycle dates the backend sets for it. Returns the new status.
    ///
    /// Only call this after the backend has reported success.
    pub fn apply_confirmed(
        &mut self,
        action: AdminAction,
        at: DateTime<Utc>,
    ) -> Result<Successor, TransitionError> {
        let next = transition(self.trade_status, action)?;

        if let Successor::Status(status) = next {
            match action {
                AdminAction::Approve => {
                    self.trade_approval_date.get_or_insert(at);
                    self.trade_start_date.get_or_insert(at);
                }
                AdminAction::EndTrade => {
                    self.trade_end_date.get_or_insert(at);
                }
                AdminAction::Reject | AdminAction::Delete => {}
            }
            self.trade_status = status;
            self.updated_at = at;
        }

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::purchase as fixture;
    use rust_decimal_macros::dec;

    fn purchase(status: TradeStatus) -> Purchase {
        fixture("p1", status, dec!(2000))
    }

    #[test]
    fn test_transition_table() {
        use AdminAction::*;
        use TradeStatus::*;

        assert_eq!(transition(Pending, Approve), Ok(Successor::Status(Active)));
        assert_eq!(transition(Pending, Reject), Ok(Successor::Status(Cancelled)));
        assert_eq!(transition(Active, EndTrade), Ok(Successor::Status(Completed)));

        for from in [Active, Completed, Cancelled] {
            assert!(transition(from, Approve).is_err());
            assert!(transition(from, Reject).is_err());
        }
        for from in [Pending, Completed, Cancelled] {
            assert!(transition(from, EndTrade).is_err());
        }
        for from in TradeStatus::ALL {
            assert_eq!(transition(from, Delete), Ok(Successor::Removed));
        }
    }

    #[test]
    fn test_terminal_states_only_allow_delete() {
        for status in [TradeStatus::Completed, TradeStatus::Cancelled] {
            assert!(status.is_terminal());
            assert_eq!(available_actions(status), vec![AdminAction::Delete]);
        }
        assert_eq!(
            available_actions(TradeStatus::Pending),
            vec![AdminAction::Approve, AdminAction::Reject, AdminAction::Delete]
        );
        assert_eq!(
            available_actions(TradeStatus::Active),
            vec![AdminAction::EndTrade, AdminAction::Delete]
        );
    }

    #[test]
    fn test_every_successor_is_a_known_status() {
        for from in TradeStatus::ALL {
            for action in AdminAction::ALL {
                if let Some(Successor::Status(next)) = successor(from, action) {
                    assert!(TradeStatus::ALL.contains(&next));
                }
            }
        }
    }

    #[test]
    fn test_initial_status_follows_approval() {
        assert_eq!(initial_status(false), TradeStatus::Pending);
        assert_eq!(initial_status(true), TradeStatus::Active);
    }

    #[test]
    fn test_apply_confirmed_approve_stamps_dates() {
        let mut p = purchase(TradeStatus::Pending);
        let at = Utc::now();

        let next = p.apply_confirmed(AdminAction::Approve, at).unwrap();

        assert_eq!(next, Successor::Status(TradeStatus::Active));
        assert_eq!(p.trade_status, TradeStatus::Active);
        assert_eq!(p.trade_approval_date, Some(at));
        assert_eq!(p.trade_start_date, Some(at));
        assert!(p.trade_end_date.is_none());
    }

    #[test]
    fn test_apply_confirmed_reject_leaves_dates() {
        let mut p = purchase(TradeStatus::Pending);
        p.apply_confirmed(AdminAction::Reject, Utc::now()).unwrap();

        assert_eq!(p.trade_status, TradeStatus::Cancelled);
        assert!(p.trade_approval_date.is_none());
        assert!(p.trade_start_date.is_none());
    }

    #[test]
    fn test_apply_confirmed_end_trade() {
        let mut p = purchase(TradeStatus::Active);
        let at = Utc::now();
        p.apply_confirmed(AdminAction::EndTrade, at).unwrap();

        assert_eq!(p.trade_status, TradeStatus::Completed);
        assert_eq!(p.trade_end_date, Some(at));
    }

    #[test]
    fn test_rejected_transition_leaves_record_untouched() {
        let mut p = purchase(TradeStatus::Active);
        let before = p.clone();

        let err = p.apply_confirmed(AdminAction::Approve, Utc::now()).unwrap_err();

        assert_eq!(err.from, TradeStatus::Active);
        assert_eq!(
            err.to_string(),
            "Only pending purchases can be approved (current status: active)"
        );
        assert_eq!(p, before);
    }
}
