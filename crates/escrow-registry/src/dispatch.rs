//! Registration-lifecycle dispatch (§4.7): mints confirm
//! `RegistrationRequested`, burns confirm `DeregistrationRequested`,
//! following the same claim/submit/classify shape as `escrow-dispatcher`.

use crate::asset_name::asset_name_hex;
use crate::metadata::build_agent_metadata;
use escrow_chain::{ChainAction, ChainAdapter, ChainError};
use escrow_core::state::RegistrationState;
use escrow_core::time::Clock;
use escrow_store::Store;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Same bound as `escrow-dispatcher::MAX_RETRY_COUNT` (§4.5's retry rule,
/// applied here by analogy since §4.7 reuses the dispatcher pattern).
pub const MAX_RETRY_COUNT: u32 = 5;

/// In-process attempt counter; see `escrow-dispatcher::AttemptTracker` —
/// `RegistryRequest` carries no error/retry columns of its own (§3), so
/// there is nowhere durable to put this.
#[derive(Default)]
pub struct RegistryAttempts {
    counts: Mutex<HashMap<Uuid, u32>>,
}

impl RegistryAttempts {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_failure(&self, id: Uuid) -> u32 {
        let mut counts = self.counts.lock().unwrap();
        let entry = counts.entry(id).or_insert(0);
        *entry += 1;
        *entry
    }

    fn clear(&self, id: Uuid) {
        self.counts.lock().unwrap().remove(&id);
    }
}

/// One dispatch attempt. Returns `true` if a row was claimed (regardless
/// of submit outcome), `false` if the queue was empty.
pub async fn dispatch_one_registry_request(
    store: &Arc<dyn Store>,
    chain: &Arc<dyn ChainAdapter>,
    clock: &Arc<dyn Clock>,
    attempts: &RegistryAttempts,
    lease_duration_ms: i64,
) -> bool {
    let now = clock.now_ms();
    let Ok(Some(mut request)) = store.claim_registry_request_for_dispatch(lease_duration_ms, now).await else {
        return false;
    };

    let Ok(Some(source)) = store.get_payment_source_by_id(request.payment_source_id).await else {
        request.state = RegistrationState::RegistrationFailed;
        let _ = store.save_registry_request(&request).await;
        return true;
    };

    match request.state {
        RegistrationState::RegistrationRequested => {
            let asset_name = asset_name_hex(request.id);
            let metadata = serde_json::to_value(build_agent_metadata(&request)).unwrap_or(serde_json::Value::Null);
            let action = ChainAction::MintRegistrationNft {
                registry_request_id: request.id,
                metadata,
            };
            match chain.submit_action(source.network, action).await {
                Ok(_submitted) => {
                    attempts.clear(request.id);
                    let policy_id = source.policy_id.clone().unwrap_or_default();
                    request.agent_identifier = Some(format!("{policy_id}{asset_name}"));
                    request.state = RegistrationState::RegistrationConfirmed;
                    request.next_action_last_changed_at = now.max(request.next_action_last_changed_at);
                    request.updated_at = now.max(request.updated_at);
                }
                Err(err) => fail_or_retry(&mut request, &err, attempts, RegistrationState::RegistrationFailed, now),
            }
        }
        RegistrationState::DeregistrationRequested => {
            let agent_identifier = request.agent_identifier.clone().unwrap_or_default();
            let action = ChainAction::BurnRegistrationNft {
                registry_request_id: request.id,
                agent_identifier,
            };
            match chain.submit_action(source.network, action).await {
                Ok(_submitted) => {
                    attempts.clear(request.id);
                    request.state = RegistrationState::DeregistrationConfirmed;
                    request.next_action_last_changed_at = now.max(request.next_action_last_changed_at);
                    request.updated_at = now.max(request.updated_at);
                }
                // §4.7 names no "DeregistrationFailed" state; a persistent
                // burn failure just keeps retrying under its existing
                // state, logged for operator visibility.
                Err(err) => {
                    let attempt = attempts.record_failure(request.id);
                    tracing::warn!(registry_request_id = %request.id, %err, attempt, "burn submission failed, will retry");
                    request.next_action_last_changed_at = now.max(request.next_action_last_changed_at);
                }
            }
        }
        other => {
            tracing::warn!(registry_request_id = %request.id, state = ?other, "claimed registry request in a non-dispatchable state");
        }
    }

    let _ = store.save_registry_request(&request).await;
    true
}

fn fail_or_retry(
    request: &mut escrow_core::model::RegistryRequest,
    err: &ChainError,
    attempts: &RegistryAttempts,
    failure_state: RegistrationState,
    now: escrow_core::time::TimestampMs,
) {
    let error_type = err.to_error_type();
    let attempt = attempts.record_failure(request.id);
    if error_type.is_transient() && attempt < MAX_RETRY_COUNT {
        tracing::warn!(registry_request_id = %request.id, %err, attempt, "mint submission failed, will retry");
    } else {
        request.state = failure_state;
        attempts.clear(request.id);
    }
    request.next_action_last_changed_at = now.max(request.next_action_last_changed_at);
}
