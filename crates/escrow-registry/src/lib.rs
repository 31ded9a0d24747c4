//! Registration Lifecycle (§4.7): drives `RegistryRequest` through
//! `RegistrationRequested → {RegistrationConfirmed, RegistrationFailed}`
//! and `RegistrationConfirmed → DeregistrationRequested →
//! DeregistrationConfirmed` by minting/burning the agent's identifying
//! NFT via `ChainAdapter`.

pub mod asset_name;
pub mod create;
pub mod deregister;
pub mod dispatch;
pub mod lifecycle;
pub mod metadata;

pub use asset_name::asset_name_hex;
pub use create::{create_registry_request, CreateRegistryRequestInput};
pub use deregister::request_deregistration;
pub use dispatch::{dispatch_one_registry_request, RegistryAttempts, MAX_RETRY_COUNT};
pub use lifecycle::{RegistryDispatcher, RegistryDispatcherConfig, RegistryLifecycle};
pub use metadata::build_agent_metadata;
