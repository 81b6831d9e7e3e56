//! Admin REST API: the purchase and product endpoints behind a trait, and
//! the HTTP client.

mod admin_client;
#[cfg(test)]
pub(crate) mod memory;
mod types;

use async_trait::async_trait;

use crate::error::Result;
use crate::lifecycle::Settlement;
use crate::models::{CopyTradeProduct, Purchase, TradeStatus};

pub use admin_client::AdminClient;
pub use types::*;

/// Purchase and product endpoints the lifecycle coordinator drives.
///
/// Every call is a single request/response round trip. Implementations
/// report `success: false` and non-2xx responses as [`AdminError::Backend`].
///
/// [`AdminError::Backend`]: crate::error::AdminError::Backend
#[async_trait]
pub trait PurchaseApi: Send + Sync {
    /// `GET /copytrade-purchases?status=&userId=`
    async fn list_purchases(&self, filter: &PurchaseFilter) -> Result<Vec<Purchase>>;

    /// `GET /copytrade-purchases/{id}`
    async fn get_purchase(&self, id: &str) -> Result<Purchase>;

    /// `GET /copytrading-options`
    async fn list_products(&self) -> Result<Vec<CopyTradeProduct>>;

    /// `GET /copytrading-options/{id}`
    async fn get_product(&self, id: &str) -> Result<CopyTradeProduct>;

    /// `POST /copytrading-options`
    async fn create_product(&self, product: &ProductRequest) -> Result<CopyTradeProduct>;

    /// `PUT /copytrading-options/{id}` with the fields to change
    async fn update_product(&self, id: &str, update: &ProductUpdate) -> Result<CopyTradeProduct>;

    /// `DELETE /copytrading-options/{id}`. Returns the backend's message.
    async fn delete_product(&self, id: &str) -> Result<Option<String>>;

    /// `POST /copytrade-purchases/admin`
    async fn create_purchase(&self, request: &CreatePurchaseRequest) -> Result<CreationOutcome>;

    /// `PUT /copytrade-purchases/{id}` with `{ trade_status }`
    async fn update_status(&self, id: &str, status: TradeStatus) -> Result<StatusChange>;

    /// `POST /copytrade-purchases/{id}/end`
    async fn end_purchase(&self, id: &str) -> Result<Settlement>;

    /// `DELETE /copytrade-purchases/{id}`. Returns the backend's message.
    async fn delete_purchase(&self, id: &str) -> Result<Option<String>>;
}
