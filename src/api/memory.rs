//! In-memory backend used by tests.
//!
//! Plays the system of record: enforces the lifecycle server-side, applies
//! balance effects, and counts every request it receives so tests can prove
//! that client-side guards never reached it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::error::{AdminError, Result};
use crate::lifecycle::{initial_status, transition, AdminAction, BalanceEffect, Settlement, Successor};
use crate::models::{CopyTradeProduct, Purchase, PurchaseOwner, TradeStatus};

use super::types::*;
use super::PurchaseApi;

#[derive(Default)]
struct State {
    products: Vec<CopyTradeProduct>,
    purchases: Vec<Purchase>,
    balances: HashMap<String, Decimal>,
    next_id: u64,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    requests: AtomicUsize,
    fail_next: Mutex<Option<AdminError>>,
}

impl MemoryBackend {
    pub fn new(products: Vec<CopyTradeProduct>) -> Self {
        let backend = Self::default();
        backend.state().products = products;
        backend
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_balance(&self, user_id: &str, balance: Decimal) {
        self.state().balances.insert(user_id.to_string(), balance);
    }

    pub fn balance(&self, user_id: &str) -> Decimal {
        self.state()
            .balances
            .get(user_id)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn insert(&self, purchase: Purchase) {
        self.state().purchases.push(purchase);
    }

    pub fn stored_product(&self, id: &str) -> Option<CopyTradeProduct> {
        self.state().products.iter().find(|p| p.id == id).cloned()
    }

    pub fn stored(&self, id: &str) -> Option<Purchase> {
        self.state().purchases.iter().find(|p| p.id == id).cloned()
    }

    /// Number of requests received so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Make the next request fail with `error` before touching state.
    pub fn fail_next(&self, error: AdminError) {
        *self.fail_next.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
    }

    fn receive(&self) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match self.fail_next.lock().unwrap_or_else(|e| e.into_inner()).take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn not_found() -> AdminError {
        AdminError::backend(Some(404), "Copytrade purchase not found")
    }

    fn option_not_found() -> AdminError {
        AdminError::backend(Some(404), "Copytrade option not found")
    }

    fn debit(state: &mut State, user_id: &str, effect: BalanceEffect) -> Result<Option<Decimal>> {
        let balance = state.balances.get(user_id).copied().unwrap_or(Decimal::ZERO);
        let next = effect.apply_to(balance);
        if next < Decimal::ZERO {
            return Err(AdminError::backend(
                Some(400),
                "Insufficient balance to approve this purchase",
            ));
        }
        state.balances.insert(user_id.to_string(), next);
        Ok(Some(next))
    }
}

#[async_trait]
impl PurchaseApi for MemoryBackend {
    async fn list_purchases(&self, filter: &PurchaseFilter) -> Result<Vec<Purchase>> {
        self.receive()?;
        Ok(self
            .state()
            .purchases
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn get_purchase(&self, id: &str) -> Result<Purchase> {
        self.receive()?;
        self.stored(id).ok_or_else(Self::not_found)
    }

    async fn list_products(&self) -> Result<Vec<CopyTradeProduct>> {
        self.receive()?;
        Ok(self.state().products.clone())
    }

    async fn get_product(&self, id: &str) -> Result<CopyTradeProduct> {
        self.receive()?;
        self.stored_product(id).ok_or_else(Self::option_not_found)
    }

    async fn create_product(&self, product: &ProductRequest) -> Result<CopyTradeProduct> {
        self.receive()?;
        let mut state = self.state();

        state.next_id += 1;
        let now = Utc::now();
        let created = CopyTradeProduct {
            id: format!("option-{}", state.next_id),
            trade_title: product.trade_title.clone(),
            trade_description: product.trade_description.clone(),
            trade_min: product.trade_min,
            trade_max: product.trade_max,
            trade_roi_min: product.trade_roi_min,
            trade_roi_max: product.trade_roi_max,
            trade_risk: product.trade_risk.clone(),
            trade_duration: product.trade_duration,
            is_recommended: product.is_recommended,
            created_at: Some(now),
            updated_at: Some(now),
        };
        state.products.push(created.clone());
        Ok(created)
    }

    async fn update_product(&self, id: &str, update: &ProductUpdate) -> Result<CopyTradeProduct> {
        self.receive()?;
        let mut state = self.state();

        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(Self::option_not_found)?;
        let merged = update.merged(product);
        product.trade_title = merged.trade_title;
        product.trade_description = merged.trade_description;
        product.trade_min = merged.trade_min;
        product.trade_max = merged.trade_max;
        product.trade_roi_min = merged.trade_roi_min;
        product.trade_roi_max = merged.trade_roi_max;
        product.trade_risk = merged.trade_risk;
        product.trade_duration = merged.trade_duration;
        product.is_recommended = merged.is_recommended;
        product.updated_at = Some(Utc::now());
        Ok(product.clone())
    }

    async fn delete_product(&self, id: &str) -> Result<Option<String>> {
        self.receive()?;
        let mut state = self.state();

        let before = state.products.len();
        state.products.retain(|p| p.id != id);
        if state.products.len() == before {
            return Err(Self::option_not_found());
        }
        Ok(Some("Copytrade option deleted".to_string()))
    }

    async fn create_purchase(&self, request: &CreatePurchaseRequest) -> Result<CreationOutcome> {
        self.receive()?;
        let mut state = self.state();

        let product = state
            .products
            .iter()
            .find(|p| p.id == request.copytrade_option_id)
            .cloned()
            .ok_or_else(Self::option_not_found)?;
        if !product.accepts(request.initial_investment) {
            return Err(AdminError::backend(
                Some(400),
                "Investment is outside the option's limits",
            ));
        }

        let effect = BalanceEffect::of_creation(request.initial_investment, request.auto_approve);
        let new_account_balance = match effect {
            BalanceEffect::None => None,
            _ => Self::debit(&mut state, &request.user_id, effect)?,
        };

        state.next_id += 1;
        let now = Utc::now();
        let status = initial_status(request.auto_approve);
        let active = status == TradeStatus::Active;
        let purchase = Purchase {
            id: format!("purchase-{}", state.next_id),
            user: PurchaseOwner::Id(request.user_id.clone()),
            user_details: None,
            product_id: Some(product.id.clone()),
            trade_title: product.trade_title.clone(),
            trade_risk: Some(product.trade_risk.clone()),
            trade_min: Some(product.trade_min),
            trade_max: Some(product.trade_max),
            trade_roi_min: Some(product.trade_roi_min),
            trade_roi_max: Some(product.trade_roi_max),
            trade_duration: Some(product.trade_duration),
            initial_investment: request.initial_investment,
            trade_current_value: active.then_some(request.initial_investment),
            trade_profit_loss: active.then_some(Decimal::ZERO),
            trade_status: status,
            trade_start_date: active.then_some(now),
            trade_end_date: None,
            trade_approval_date: active.then_some(now),
            created_at: now,
            updated_at: now,
        };
        state.purchases.push(purchase.clone());

        Ok(CreationOutcome {
            purchase,
            note: None,
            deductions: Vec::new(),
            new_account_balance,
            message: Some("Copytrade purchase created".to_string()),
        })
    }

    async fn update_status(&self, id: &str, status: TradeStatus) -> Result<StatusChange> {
        self.receive()?;
        let mut state = self.state();

        let index = state
            .purchases
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(Self::not_found)?;
        let current = state.purchases[index].clone();

        let action = match status {
            TradeStatus::Active => AdminAction::Approve,
            TradeStatus::Cancelled => AdminAction::Reject,
            other => {
                return Err(AdminError::backend(
                    Some(400),
                    format!("Status cannot be set to {} directly", other),
                ))
            }
        };
        transition(current.trade_status, action)
            .map_err(|e| AdminError::backend(Some(400), e.to_string()))?;

        let new_account_balance = match BalanceEffect::of_action(action, &current, None) {
            Some(BalanceEffect::None) | None => None,
            Some(effect) => Self::debit(&mut state, current.owner_id(), effect)?,
        };

        let purchase = &mut state.purchases[index];
        purchase
            .apply_confirmed(action, Utc::now())
            .map_err(|e| AdminError::backend(Some(400), e.to_string()))?;
        if action == AdminAction::Approve {
            purchase.trade_current_value = Some(purchase.initial_investment);
        }

        Ok(StatusChange {
            purchase: purchase.clone(),
            deductions: Vec::new(),
            new_account_balance,
            message: None,
        })
    }

    async fn end_purchase(&self, id: &str) -> Result<Settlement> {
        self.receive()?;
        let mut state = self.state();

        let index = state
            .purchases
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(Self::not_found)?;
        let current = state.purchases[index].clone();

        transition(current.trade_status, AdminAction::EndTrade)
            .map_err(|e| AdminError::backend(Some(400), e.to_string()))?;

        // Final-ROI resolution is not modelled; only tracked values settle here.
        let final_value = current.trade_current_value.ok_or_else(|| {
            AdminError::backend(Some(422), "No tracked value to settle this trade")
        })?;

        let balance = state
            .balances
            .get(current.owner_id())
            .copied()
            .unwrap_or(Decimal::ZERO);
        let new_balance = BalanceEffect::Credit(final_value).apply_to(balance);
        state
            .balances
            .insert(current.owner_id().to_string(), new_balance);

        let purchase = &mut state.purchases[index];
        purchase
            .apply_confirmed(AdminAction::EndTrade, Utc::now())
            .map_err(|e| AdminError::backend(Some(400), e.to_string()))?;
        purchase.trade_profit_loss = Some(final_value - purchase.initial_investment);

        let final_roi = if purchase.initial_investment.is_zero() {
            None
        } else {
            Some((final_value - purchase.initial_investment) / purchase.initial_investment
                * Decimal::ONE_HUNDRED)
        };

        Ok(Settlement {
            purchase: purchase.clone(),
            final_value: Some(final_value),
            final_roi,
            new_account_balance: Some(new_balance),
            message: Some("Trade ended".to_string()),
        })
    }

    async fn delete_purchase(&self, id: &str) -> Result<Option<String>> {
        self.receive()?;
        let mut state = self.state();

        let index = state
            .purchases
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(Self::not_found)?;
        match transition(state.purchases[index].trade_status, AdminAction::Delete) {
            Ok(Successor::Removed) => {
                state.purchases.remove(index);
                Ok(Some("Copytrade purchase deleted".to_string()))
            }
            _ => Err(AdminError::backend(Some(400), "Purchase cannot be deleted")),
        }
    }
}
