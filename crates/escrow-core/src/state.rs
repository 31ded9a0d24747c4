//! State-machine shapes shared by payments, purchases, and registrations.
//!
//! Spec reference: §4.2 State Machines. Two orthogonal axes per escrow:
//! `OnChainState` (authoritative, set only by the Chain Reconciler) and
//! `NextAction` (authoritative, set only by the Orchestrator/Dispatcher).
//! `RegistrationState` (§4.7) reuses the same shape for agent registry NFTs.

use serde::{Deserialize, Serialize};

// ============================================================================
// OnChainState (§4.2)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum OnChainState {
    FundsLocked,
    ResultSubmitted,
    RefundRequested,
    Disputed,
    Withdrawn,
    RefundWithdrawn,
    DisputedWithdrawn,
    FundsOrDatumInvalid,
}

impl OnChainState {
    /// Terminal states per §3: "logically terminated when they reach a
    /// terminal OnChainState ... with NextAction=None."
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OnChainState::Withdrawn
                | OnChainState::RefundWithdrawn
                | OnChainState::DisputedWithdrawn
                | OnChainState::FundsOrDatumInvalid
        )
    }

    /// The legal transition table of §4.2. `from = None` models the
    /// "no on-chain state observed yet" starting point (`null → FundsLocked`).
    ///
    /// Any transition not covered here is illegal: the Reconciler records
    /// the observation but flags the entity (`UnexpectedTransition`) instead
    /// of storing it as a state change (§8 State-machine legality
    /// invariant).
    pub fn transition_allowed(from: Option<OnChainState>, to: OnChainState) -> bool {
        use OnChainState::*;
        match (from, to) {
            (None, FundsLocked) => true,
            (Some(FundsLocked), ResultSubmitted)
            | (Some(FundsLocked), RefundRequested)
            | (Some(FundsLocked), Disputed)
            | (Some(FundsLocked), Withdrawn)
            | (Some(FundsLocked), RefundWithdrawn)
            | (Some(FundsLocked), FundsOrDatumInvalid) => true,
            (Some(ResultSubmitted), RefundRequested)
            | (Some(ResultSubmitted), Disputed)
            | (Some(ResultSubmitted), Withdrawn) => true,
            (Some(RefundRequested), FundsLocked)
            | (Some(RefundRequested), Disputed)
            | (Some(RefundRequested), RefundWithdrawn) => true,
            (Some(Disputed), DisputedWithdrawn) => true,
            _ => false,
        }
    }
}

// ============================================================================
// NextAction (§4.2)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PaymentNextAction {
    WaitingForExternalAction,
    AuthorizeRefundRequested,
    SubmitResultRequested,
    WaitingForManualAction,
    None,
}

impl PaymentNextAction {
    /// `true` for the `*Requested` variants the Dispatcher drains (§4.5).
    pub fn is_requested(self) -> bool {
        matches!(
            self,
            PaymentNextAction::AuthorizeRefundRequested | PaymentNextAction::SubmitResultRequested
        )
    }

    /// Dispatcher success transition: `*Requested → WaitingForExternalAction`.
    pub fn after_submit_success(self) -> Self {
        if self.is_requested() {
            PaymentNextAction::WaitingForExternalAction
        } else {
            self
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentNextAction::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PurchaseNextAction {
    WaitingForExternalAction,
    SetRefundRequestedRequested,
    UnSetRefundRequestedRequested,
    WaitingForManualAction,
    None,
}

impl PurchaseNextAction {
    pub fn is_requested(self) -> bool {
        matches!(
            self,
            PurchaseNextAction::SetRefundRequestedRequested
                | PurchaseNextAction::UnSetRefundRequestedRequested
        )
    }

    pub fn after_submit_success(self) -> Self {
        if self.is_requested() {
            PurchaseNextAction::WaitingForExternalAction
        } else {
            self
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PurchaseNextAction::None)
    }
}

/// Failure classification for a submit attempt (§4.5). Transient kinds
/// retry with backoff; persistent kinds move straight to
/// `WaitingForManualAction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorType {
    NetworkError,
    ValidationError,
    InsufficientFunds,
    Unknown,
    /// Recorded by the Reconciler (not the Dispatcher) when an observed
    /// on-chain transition is not in `OnChainState::transition_allowed`'s
    /// table (§4.2, §8).
    UnexpectedTransition,
}

impl ErrorType {
    /// NetworkError is the only kind the spec treats as transient in
    /// §4.5; everything else moves straight to `WaitingForManualAction`.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorType::NetworkError)
    }
}

// ============================================================================
// RegistrationState (§4.7) — same state-machine shape, applied to the
// agent registry NFT lifecycle.
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RegistrationState {
    RegistrationRequested,
    RegistrationConfirmed,
    RegistrationFailed,
    DeregistrationRequested,
    DeregistrationConfirmed,
}

impl RegistrationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RegistrationState::RegistrationFailed | RegistrationState::DeregistrationConfirmed
        )
    }

    /// Legal registration transitions per §4.7:
    /// `RegistrationRequested → {RegistrationConfirmed, RegistrationFailed}`,
    /// `RegistrationConfirmed → DeregistrationRequested →
    /// DeregistrationConfirmed`.
    pub fn transition_allowed(from: RegistrationState, to: RegistrationState) -> bool {
        use RegistrationState::*;
        matches!(
            (from, to),
            (RegistrationRequested, RegistrationConfirmed)
                | (RegistrationRequested, RegistrationFailed)
                | (RegistrationConfirmed, DeregistrationRequested)
                | (DeregistrationRequested, DeregistrationConfirmed)
        )
    }

    /// "Deletion from the local store is permitted only in
    /// `RegistrationFailed` or `DeregistrationConfirmed`" (§4.7).
    pub fn deletable(self) -> bool {
        self.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funds_locked_is_the_only_entry_point() {
        assert!(OnChainState::transition_allowed(None, OnChainState::FundsLocked));
        assert!(!OnChainState::transition_allowed(None, OnChainState::Withdrawn));
    }

    #[test]
    fn terminal_states_accept_no_further_transition() {
        for terminal in [
            OnChainState::Withdrawn,
            OnChainState::RefundWithdrawn,
            OnChainState::DisputedWithdrawn,
            OnChainState::FundsOrDatumInvalid,
        ] {
            assert!(terminal.is_terminal());
            assert!(!OnChainState::transition_allowed(
                Some(terminal),
                OnChainState::FundsLocked
            ));
        }
    }

    #[test]
    fn refund_requested_can_cancel_back_to_funds_locked() {
        assert!(OnChainState::transition_allowed(
            Some(OnChainState::RefundRequested),
            OnChainState::FundsLocked
        ));
    }

    #[test]
    fn dispatcher_success_clears_requested_variants() {
        assert_eq!(
            PaymentNextAction::AuthorizeRefundRequested.after_submit_success(),
            PaymentNextAction::WaitingForExternalAction
        );
        assert_eq!(
            PaymentNextAction::WaitingForManualAction.after_submit_success(),
            PaymentNextAction::WaitingForManualAction
        );
    }

    #[test]
    fn registration_lifecycle_matches_spec_shape() {
        use RegistrationState::*;
        assert!(RegistrationState::transition_allowed(
            RegistrationRequested,
            RegistrationConfirmed
        ));
        assert!(RegistrationState::transition_allowed(
            RegistrationConfirmed,
            DeregistrationRequested
        ));
        assert!(!RegistrationState::transition_allowed(
            RegistrationRequested,
            DeregistrationConfirmed
        ));
        assert!(RegistrationFailed.deletable());
        assert!(!RegistrationConfirmed.deletable());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    const ALL_STATES: [OnChainState; 8] = [
        OnChainState::FundsLocked,
        OnChainState::ResultSubmitted,
        OnChainState::RefundRequested,
        OnChainState::Disputed,
        OnChainState::Withdrawn,
        OnChainState::RefundWithdrawn,
        OnChainState::DisputedWithdrawn,
        OnChainState::FundsOrDatumInvalid,
    ];

    fn any_state() -> impl Strategy<Value = OnChainState> {
        (0usize..ALL_STATES.len()).prop_map(|i| ALL_STATES[i])
    }

    proptest! {
        /// §8 State-machine legality: terminal states never accept a
        /// further transition to anything, for any pair the table might
        /// be asked about.
        #[test]
        fn terminal_states_reject_every_outgoing_transition(from in any_state(), to in any_state()) {
            if from.is_terminal() {
                prop_assert!(!OnChainState::transition_allowed(Some(from), to));
            }
        }

        /// The table has no self-loops: no state is its own successor.
        #[test]
        fn no_state_transitions_to_itself(from in any_state()) {
            prop_assert!(!OnChainState::transition_allowed(Some(from), from));
        }
    }
}
