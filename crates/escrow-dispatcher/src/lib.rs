//! The Action Dispatcher (§4.5): the only writer of `NextAction` away
//! from a `*Requested` variant. Claims leased payments/purchases,
//! submits their action via `ChainAdapter`, and classifies failures into
//! retry-with-backoff or `WaitingForManualAction`.

pub mod attempts;
pub mod backoff;
pub mod dispatch;
pub mod lifecycle;

pub use attempts::AttemptTracker;
pub use dispatch::{dispatch_one_payment, dispatch_one_purchase, MAX_RETRY_COUNT};
pub use lifecycle::{Dispatcher, DispatcherConfig, DispatcherLifecycle};
