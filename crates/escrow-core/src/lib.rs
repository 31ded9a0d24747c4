//! Escrow Orchestrator — core domain types, error kinds, state-machine
//! transition tables, and the blockchain-identifier codec.
//!
//! This crate performs no I/O: no database, no HTTP, no chain RPC. It is
//! the shared vocabulary consumed by `escrow-store`, `escrow-orchestrator`,
//! `escrow-reconciler`, `escrow-dispatcher`, `escrow-registry`, and
//! `escrow-api`.

pub mod agent_metadata;
pub mod error;
pub mod identifier;
pub mod model;
pub mod money;
pub mod state;
pub mod time;

pub use agent_metadata::AgentMetadata;
pub use error::{ErrorKind, OrchestratorError};
pub use identifier::{decode_blockchain_identifier, verify_blockchain_identifier};
pub use money::{Lovelace, Unit, UnitAmount, UnitValue};
pub use state::{ErrorType, OnChainState, PaymentNextAction, PurchaseNextAction, RegistrationState};

pub type Result<T> = std::result::Result<T, OrchestratorError>;
