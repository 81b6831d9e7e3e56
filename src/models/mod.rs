//! Data models for copy-trade purchases and the product catalog.

mod product;
mod purchase;

pub use product::CopyTradeProduct;
pub use purchase::{Purchase, PurchaseOwner, TradeStatus, UserDetails};
