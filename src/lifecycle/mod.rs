//! Purchase lifecycle: the transition table, balance effects, client-side
//! guards, and the coordinator that drives admin actions.

mod coordinator;
mod guard;
mod settlement;
mod state_machine;

pub use coordinator::PurchaseCoordinator;
pub use guard::{ensure_allowed, PurchaseDraft};
pub use settlement::{BalanceEffect, FinalValueSource, Settlement};
pub use state_machine::{
    available_actions, initial_status, successor, transition, AdminAction, Successor,
    TransitionError,
};
