//! Escrow Orchestrator (§4.3): accepts create/modify requests, enforces
//! invariants against `escrow-core`'s state-machine rules, resolves
//! agents through `escrow-chain`, and hands off to `escrow-store` for
//! the durable commit that seeds the next `NextAction` (§2 component D).
//!
//! This crate performs no background work of its own — `escrow-reconciler`
//! and `escrow-dispatcher` are the two long-lived loops (§5); everything
//! here is a request/response operation invoked from `escrow-api` or
//! `escrow-cli`.

pub mod agent_resolution;
pub mod caller;
pub mod create_payment;
pub mod create_purchase;
pub mod deps;
pub mod earnings;
pub mod error_recovery;
pub mod refund_result;
pub mod store_error;
pub mod time_window;
pub mod validation;

pub use caller::{CallerContext, Role};
pub use create_payment::{create_payment, CreatePaymentInput};
pub use create_purchase::{create_purchase, CreatePurchaseInput};
pub use deps::OrchestratorDeps;
pub use earnings::{aggregate_payment_income, aggregate_purchase_spending, EarningsQuery, IncomeReport, SpendingReport};
pub use error_recovery::{payment_error_state_recovery, purchase_error_state_recovery};
pub use refund_result::{authorize_payment_refund, cancel_purchase_refund_request, request_purchase_refund, submit_payment_result};
