//! Transition guards: pure predicates deciding whether a requested move is
//! legal from the current state. A `false` answer means the caller's request
//! is rejected and nothing is mutated.

use crate::domain::workflow::{WorkflowState, WorkflowType};

/// Initial send of a cheque-family instrument.
pub fn can_convey_cheque(state: WorkflowState) -> bool {
    matches!(state, WorkflowState::Unsent)
}

/// Cancellation of an unsent or conveyed cheque/invoice/voucher.
pub fn can_cancel_cheque(state: WorkflowState) -> bool {
    matches!(state, WorkflowState::Unsent | WorkflowState::Conveyed)
}

/// Deposit (or payment, for invoices) on the recipient's side.
pub fn can_deposit_cheque(state: WorkflowState) -> bool {
    matches!(state, WorkflowState::Conveyed)
}

/// Clearing on the sender's side, observed from a cheque receipt. A cheque
/// marked expired locally may still clear if the recipient deposited it in
/// time.
pub fn can_accept_cheque(state: WorkflowState) -> bool {
    matches!(state, WorkflowState::Expired | WorkflowState::Conveyed)
}

/// Final settlement of a cleared cheque-family instrument.
pub fn can_finish_cheque(state: WorkflowState) -> bool {
    matches!(state, WorkflowState::Accepted)
}

/// Expiry of the validity window. Outgoing instruments can expire before
/// being sent; incoming ones only once conveyed.
pub fn can_expire_cheque(workflow_type: WorkflowType, state: WorkflowState) -> bool {
    match workflow_type {
        WorkflowType::OutgoingCheque
        | WorkflowType::OutgoingInvoice
        | WorkflowType::OutgoingVoucher => {
            matches!(state, WorkflowState::Unsent | WorkflowState::Conveyed)
        }
        WorkflowType::IncomingCheque
        | WorkflowType::IncomingInvoice
        | WorkflowType::IncomingVoucher => matches!(state, WorkflowState::Conveyed),
        _ => false,
    }
}

/// Abort of a transfer the notary has not acknowledged.
pub fn can_abort_transfer(state: WorkflowState) -> bool {
    matches!(state, WorkflowState::Initiated)
}

/// Recipient-side acceptance of a conveyed incoming transfer.
pub fn can_accept_transfer(state: WorkflowState) -> bool {
    matches!(state, WorkflowState::Conveyed)
}

/// Notary acknowledgement of a transfer.
///
/// Acknowledgement and conveyance arrive via independent channels and can
/// race; the guard tolerates a workflow that has already advanced to
/// Conveyed, and the append in that case must not regress the state.
pub fn can_acknowledge_transfer(state: WorkflowState) -> bool {
    matches!(state, WorkflowState::Initiated | WorkflowState::Conveyed)
}

/// Conveyance of an internal transfer back to its originating workflow.
/// Conveyed is tolerated so a replayed pending receipt is a no-op success.
pub fn can_convey_internal_transfer(state: WorkflowState) -> bool {
    matches!(
        state,
        WorkflowState::Initiated | WorkflowState::Acknowledged | WorkflowState::Conveyed
    )
}

/// Clearing observed from a transfer receipt on the sender's side.
pub fn can_clear_transfer(workflow_type: WorkflowType, state: WorkflowState) -> bool {
    match workflow_type {
        WorkflowType::OutgoingTransfer => matches!(state, WorkflowState::Acknowledged),
        WorkflowType::InternalTransfer => matches!(state, WorkflowState::Conveyed),
        _ => false,
    }
}

/// Final settlement of an accepted transfer.
pub fn can_complete_transfer(state: WorkflowState) -> bool {
    matches!(state, WorkflowState::Accepted)
}

/// Sending cash. Purses track few states; anything short of expiry may be
/// (re-)conveyed.
pub fn can_convey_cash(state: WorkflowState) -> bool {
    !matches!(state, WorkflowState::Expired)
}
