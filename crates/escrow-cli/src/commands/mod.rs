//! One module per command group, mirroring `escrow-api::routes`' split
//! of the `/monitoring/*` surface (§6) into per-loop resources.

pub mod env;
pub mod monitor;
pub mod payment;
