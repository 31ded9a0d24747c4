//! The Chain Reconciler (§4.4): the only writer of `OnChainState`. Polls
//! every active `PaymentSource`'s smart contract address, folds observed
//! transactions into the matching `Payment`/`Purchase` row, and advances
//! its own batch cursors once the fold is durably saved.

pub mod config;
pub mod lifecycle;
pub mod reconcile;
pub mod stats;

pub use config::ReconcilerConfig;
pub use lifecycle::{Reconciler, ReconcilerLifecycle};
pub use reconcile::CycleOutcome;
pub use stats::{ReconcilerStats, SourceCursors};
