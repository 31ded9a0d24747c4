//! External collaborator contracts: the Cardano node / chain-index
//! adapter and the wallet signer (§1, §6). Both are treated as black
//! boxes the orchestrator, reconciler, dispatcher, and registry crates
//! depend on through a trait object — this crate owns only the contract
//! and, for tests, an in-memory double of each.

pub mod adapter;
pub mod error;
pub mod mock;
pub mod signer;

pub use adapter::{AssetHolder, ChainAction, ChainAdapter, ObservedTransaction, SubmittedTransaction};
pub use error::ChainError;
pub use mock::{MockChainAdapter, MockSigner};
pub use signer::{SignedPayload, Signer};
