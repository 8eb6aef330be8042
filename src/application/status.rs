//! End-to-end status extraction for notary-mediated operations.
//!
//! Three layers apply: the reply message's own success flag, whether the
//! message type fundamentally carries a transaction, and if so the nested
//! transaction's success flag. Ambiguity is reported as indeterminate, never
//! coerced to success or failure.

use crate::domain::message::ProtocolMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Success,
    Failure,
    /// The reply was present but the transaction-level outcome could not be
    /// extracted. Callers must re-sync before concluding true failure.
    Indeterminate,
}

impl OperationStatus {
    /// Only a conclusive success advances workflow state.
    pub fn advances_state(self) -> bool {
        matches!(self, OperationStatus::Success)
    }
}

/// Evaluates whether a notary-mediated operation succeeded end-to-end.
/// An absent reply means the request never completed.
pub fn reply_status(reply: Option<&ProtocolMessage>) -> OperationStatus {
    let Some(reply) = reply else {
        return OperationStatus::Failure;
    };

    if !reply.success {
        return OperationStatus::Failure;
    }

    if !reply.message_type.carries_transaction() {
        return OperationStatus::Success;
    }

    match reply
        .ledger
        .as_ref()
        .and_then(|ledger| ledger.transaction.as_ref())
    {
        Some(transaction) if transaction.success => OperationStatus::Success,
        Some(_) => OperationStatus::Failure,
        None => OperationStatus::Indeterminate,
    }
}
