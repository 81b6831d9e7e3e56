//! Purchase coordinator: drives admin actions against the backend and keeps
//! the locally fetched purchase list and product catalog in step with
//! confirmed results.
//!
//! Each action is a single round trip. The local list is only patched after
//! the backend reports success; on any failure it is left as it was.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::{
    CreationOutcome, ProductRequest, ProductUpdate, PurchaseApi, PurchaseFilter, StatusChange,
};
use crate::error::{AdminError, Result};
use crate::models::{CopyTradeProduct, Purchase, TradeStatus};

use super::guard::{check_product, check_product_update, ensure_allowed, PurchaseDraft};
use super::settlement::Settlement;
use super::state_machine::AdminAction;

/// Something a request can be in flight for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Busy {
    CreatePurchase,
    Purchase(String),
    CreateProduct,
    Product(String),
}

impl fmt::Display for Busy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Busy::CreatePurchase => write!(f, "purchase creation"),
            Busy::Purchase(id) => write!(f, "purchase {}", id),
            Busy::CreateProduct => write!(f, "copytrade option creation"),
            Busy::Product(id) => write!(f, "copytrade option {}", id),
        }
    }
}

/// Marks a target as busy until dropped.
struct InFlight {
    set: Arc<Mutex<HashSet<Busy>>>,
    key: Busy,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.key);
    }
}

/// Coordinates purchase lifecycle actions for one admin session.
pub struct PurchaseCoordinator<A> {
    api: A,

    // List state owned by the caller's view
    filter: Arc<RwLock<PurchaseFilter>>,
    purchases: Arc<RwLock<Vec<Purchase>>>,
    catalog: Arc<RwLock<Vec<CopyTradeProduct>>>,

    // Targets with a request in flight
    in_flight: Arc<Mutex<HashSet<Busy>>>,
}

impl<A: PurchaseApi> PurchaseCoordinator<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            filter: Arc::new(RwLock::new(PurchaseFilter::default())),
            purchases: Arc::new(RwLock::new(Vec::new())),
            catalog: Arc::new(RwLock::new(Vec::new())),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Replace the list filter. Takes effect on the next refresh.
    pub async fn set_filter(&self, filter: PurchaseFilter) {
        *self.filter.write().await = filter;
    }

    pub async fn filter(&self) -> PurchaseFilter {
        self.filter.read().await.clone()
    }

    /// Current local snapshot of the purchase list.
    pub async fn purchases(&self) -> Vec<Purchase> {
        self.purchases.read().await.clone()
    }

    #[cfg(test)]
    pub async fn catalog(&self) -> Vec<CopyTradeProduct> {
        self.catalog.read().await.clone()
    }

    #[cfg(test)]
    pub(crate) fn is_busy(&self, key: &Busy) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }

    fn begin(&self, key: Busy) -> Result<InFlight> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if set.contains(&key) {
            return Err(AdminError::InFlight(key.to_string()));
        }
        set.insert(key.clone());
        Ok(InFlight {
            set: Arc::clone(&self.in_flight),
            key,
        })
    }

    /// Fetch the list for the current filter. On failure the previous list
    /// is kept.
    pub async fn refresh(&self) -> Result<Vec<Purchase>> {
        let filter = self.filter().await;
        let fetched = self.api.list_purchases(&filter).await?;

        debug!(count = fetched.len(), filter = ?filter, "Purchase list refreshed");
        *self.purchases.write().await = fetched.clone();
        Ok(fetched)
    }

    /// Fetch the product catalog used to validate new purchases.
    pub async fn load_catalog(&self) -> Result<Vec<CopyTradeProduct>> {
        let products = self.api.list_products().await?;
        *self.catalog.write().await = products.clone();
        Ok(products)
    }

    /// Local record if present, otherwise a single fetch from the backend.
    pub async fn find(&self, id: &str) -> Result<Purchase> {
        if let Some(found) = self.purchases.read().await.iter().find(|p| p.id == id) {
            return Ok(found.clone());
        }
        self.api.get_purchase(id).await
    }

    /// Replace (or drop) the local record for `id` after a confirmed change.
    async fn patch_local(&self, id: &str, updated: Option<Purchase>) {
        let filter = self.filter().await;
        let mut purchases = self.purchases.write().await;

        match updated {
            Some(record) if filter.matches(&record) => {
                if let Some(slot) = purchases.iter_mut().find(|p| p.id == id) {
                    *slot = record;
                }
            }
            _ => purchases.retain(|p| p.id != id),
        }
    }

    /// Guard, mark busy, and look up the target of an action.
    async fn prepare(&self, id: &str, action: AdminAction) -> Result<(Purchase, InFlight)> {
        let guard = self.begin(Busy::Purchase(id.to_string()))?;
        let purchase = self.find(id).await?;
        ensure_allowed(&purchase, action)?;
        Ok((purchase, guard))
    }

    /// Drive a `pending` purchase to `active` or `cancelled`.
    async fn set_status(&self, id: &str, action: AdminAction) -> Result<StatusChange> {
        let target = match action {
            AdminAction::Approve => TradeStatus::Active,
            AdminAction::Reject => TradeStatus::Cancelled,
            AdminAction::EndTrade | AdminAction::Delete => {
                return Err(AdminError::Validation(format!(
                    "{} is not a status update",
                    action
                )))
            }
        };

        let (mut local, _busy) = self.prepare(id, action).await?;

        let change = match self.api.update_status(id, target).await {
            Ok(change) => change,
            Err(e) => {
                warn!(purchase_id = %id, action = %action, error = %e, "Transition rejected");
                return Err(e);
            }
        };

        if change.purchase.trade_status == target {
            self.patch_local(id, Some(change.purchase.clone())).await;
        } else {
            // Backend confirmed but echoed a stale record; apply the transition ourselves.
            warn!(
                purchase_id = %id,
                returned = %change.purchase.trade_status,
                "Confirmed update returned an unexpected status"
            );
            local
                .apply_confirmed(action, Utc::now())
                .map_err(|e| AdminError::Validation(e.to_string()))?;
            self.patch_local(id, Some(local)).await;
        }

        info!(
            purchase_id = %id,
            action = %action,
            new_balance = ?change.new_account_balance,
            "Purchase status updated"
        );
        Ok(change)
    }

    /// Approve a pending purchase. The backend deducts the investment from
    /// the user's balance and stamps the approval and start dates.
    pub async fn approve(&self, id: &str) -> Result<StatusChange> {
        self.set_status(id, AdminAction::Approve).await
    }

    /// Reject a pending purchase. No funds move.
    pub async fn reject(&self, id: &str) -> Result<StatusChange> {
        self.set_status(id, AdminAction::Reject).await
    }

    /// End an active trade and return the backend's settlement.
    pub async fn end_trade(&self, id: &str) -> Result<Settlement> {
        let (_, _busy) = self.prepare(id, AdminAction::EndTrade).await?;

        let settlement = match self.api.end_purchase(id).await {
            Ok(settlement) => settlement,
            Err(e) => {
                warn!(purchase_id = %id, error = %e, "End trade rejected");
                return Err(e);
            }
        };

        let violations = settlement.contract_violations();
        if !violations.is_empty() {
            warn!(purchase_id = %id, ?violations, "Settlement response is incomplete");
        }

        self.patch_local(id, Some(settlement.purchase.clone())).await;

        info!(
            purchase_id = %id,
            final_value = ?settlement.final_value,
            new_balance = ?settlement.new_account_balance,
            "Trade ended"
        );
        Ok(settlement)
    }

    /// Delete a purchase in any status. This is pure record removal: nothing
    /// is refunded or settled.
    pub async fn delete(&self, id: &str) -> Result<Option<String>> {
        let (_, _busy) = self.prepare(id, AdminAction::Delete).await?;

        let message = match self.api.delete_purchase(id).await {
            Ok(message) => message,
            Err(e) => {
                warn!(purchase_id = %id, error = %e, "Delete rejected");
                return Err(e);
            }
        };

        self.patch_local(id, None).await;
        info!(purchase_id = %id, "Purchase deleted");
        Ok(message)
    }

    /// Create a purchase on behalf of a user.
    ///
    /// With `auto_approve` the purchase is born active and the approval
    /// deduction is applied as part of creation. The local list is not
    /// patched; callers refresh it once this succeeds.
    pub async fn create(&self, draft: &PurchaseDraft) -> Result<CreationOutcome> {
        let _busy = self.begin(Busy::CreatePurchase)?;

        if self.catalog.read().await.is_empty() {
            self.load_catalog().await?;
        }

        let request = {
            let catalog = self.catalog.read().await;
            draft.validate(&catalog)?
        };

        let outcome = match self.api.create_purchase(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(user_id = %request.user_id, error = %e, "Create purchase rejected");
                return Err(e);
            }
        };

        let violations = outcome.contract_violations(&request);
        if !violations.is_empty() {
            warn!(
                purchase_id = %outcome.purchase.id,
                ?violations,
                "Creation response disagrees with the request"
            );
        }

        info!(
            purchase_id = %outcome.purchase.id,
            user_id = %request.user_id,
            status = %outcome.purchase.trade_status,
            auto_approve = request.auto_approve,
            "Purchase created"
        );
        Ok(outcome)
    }

    /// Add a product to the catalog.
    pub async fn create_product(&self, product: &ProductRequest) -> Result<CopyTradeProduct> {
        check_product(product)?;
        let _busy = self.begin(Busy::CreateProduct)?;

        let created = match self.api.create_product(product).await {
            Ok(created) => created,
            Err(e) => {
                warn!(title = %product.trade_title, error = %e, "Create option rejected");
                return Err(e);
            }
        };

        self.catalog.write().await.push(created.clone());
        info!(product_id = %created.id, title = %created.trade_title, "Copytrade option created");
        Ok(created)
    }

    /// Change some fields of a product. The result is checked as a whole
    /// before anything is sent.
    pub async fn update_product(
        &self,
        id: &str,
        update: &ProductUpdate,
    ) -> Result<CopyTradeProduct> {
        let _busy = self.begin(Busy::Product(id.to_string()))?;

        let current = self.find_product(id).await?;
        check_product_update(&current, update)?;

        let updated = match self.api.update_product(id, update).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(product_id = %id, error = %e, "Update option rejected");
                return Err(e);
            }
        };

        let mut catalog = self.catalog.write().await;
        match catalog.iter_mut().find(|p| p.id == id) {
            Some(slot) => *slot = updated.clone(),
            None => catalog.push(updated.clone()),
        }
        info!(product_id = %id, "Copytrade option updated");
        Ok(updated)
    }

    /// Remove a product from the catalog. Existing purchases keep their
    /// own copy of its terms.
    pub async fn delete_product(&self, id: &str) -> Result<Option<String>> {
        let _busy = self.begin(Busy::Product(id.to_string()))?;

        let message = match self.api.delete_product(id).await {
            Ok(message) => message,
            Err(e) => {
                warn!(product_id = %id, error = %e, "Delete option rejected");
                return Err(e);
            }
        };

        self.catalog.write().await.retain(|p| p.id != id);
        info!(product_id = %id, "Copytrade option deleted");
        Ok(message)
    }

    /// Catalog entry if loaded, otherwise a single fetch from the backend.
    pub async fn find_product(&self, id: &str) -> Result<CopyTradeProduct> {
        if let Some(found) = self.catalog.read().await.iter().find(|p| p.id == id) {
            return Ok(found.clone());
        }
        self.api.get_product(id).await
    }
}
