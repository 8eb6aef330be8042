use crate::domain::identifier::{AccountId, NotaryId, NymId};
use crate::domain::instrument::{Cheque, Transfer};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Protocol message families exchanged with the notary.
///
/// Only a fixed allow-list of these fundamentally carries a nested
/// ledger/transaction payload; the rest succeed or fail at the message layer
/// alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    NotarizeTransaction,
    ProcessInbox,
    SendNymMessage,
    RegisterAccount,
}

impl MessageType {
    /// Whether replies of this type embed a transaction whose own success
    /// flag decides the end-to-end outcome.
    pub fn carries_transaction(self) -> bool {
        matches!(
            self,
            MessageType::NotarizeTransaction | MessageType::ProcessInbox
        )
    }
}

/// The transaction nested inside a transaction-carrying reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub success: bool,
}

/// The ledger payload embedded in a transaction-carrying message.
///
/// `transaction` is `None` when the payload could not be decoded; status
/// extraction reports that as indeterminate rather than guessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerPayload {
    pub transaction: Option<TransactionEntry>,
}

/// A pre-validated request or reply exchanged with the notary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    pub message_type: MessageType,
    pub success: bool,
    pub sender_nym: Option<NymId>,
    pub recipient_nym: Option<NymId>,
    pub account: Option<AccountId>,
    pub notary: Option<NotaryId>,
    pub time: DateTime<Utc>,
    pub ledger: Option<LedgerPayload>,
}

impl ProtocolMessage {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// The receipt flavours observed during inbox processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptKind {
    Pending,
    TransferReceipt,
    ChequeReceipt,
    AcceptPending,
}

/// A transaction receipt with an embedded reference instrument.
///
/// Receipts drive the clearing events for which there is no direct reply to
/// the original request; the embedded item is decoded on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub kind: ReceiptKind,
    pub notary: NotaryId,
    pub real_account: AccountId,
    pub purported_account: AccountId,
    pub time: DateTime<Utc>,
    reference: Vec<u8>,
}

impl TransactionReceipt {
    pub fn for_cheque(
        kind: ReceiptKind,
        real_account: AccountId,
        purported_account: AccountId,
        time: DateTime<Utc>,
        cheque: &Cheque,
    ) -> Result<Self> {
        Ok(Self {
            kind,
            notary: cheque.notary.clone(),
            real_account,
            purported_account,
            time,
            reference: cheque.serialize()?,
        })
    }

    pub fn for_transfer(
        kind: ReceiptKind,
        real_account: AccountId,
        purported_account: AccountId,
        time: DateTime<Utc>,
        transfer: &Transfer,
    ) -> Result<Self> {
        Ok(Self {
            kind,
            notary: transfer.notary.clone(),
            real_account,
            purported_account,
            time,
            reference: transfer.serialize()?,
        })
    }

    /// Decodes the embedded reference item as a cheque.
    pub fn cheque(&self) -> Result<Cheque> {
        Ok(serde_json::from_slice(&self.reference)?)
    }

    /// Decodes the embedded reference item as a transfer.
    pub fn transfer(&self) -> Result<Transfer> {
        Ok(serde_json::from_slice(&self.reference)?)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identifier::{SourceId, UnitId};
    use rust_decimal_macros::dec;

    #[test]
    fn test_transaction_allow_list() {
        assert!(MessageType::NotarizeTransaction.carries_transaction());
        assert!(MessageType::ProcessInbox.carries_transaction());
        assert!(!MessageType::SendNymMessage.carries_transaction());
        assert!(!MessageType::RegisterAccount.carries_transaction());
    }

    #[test]
    fn test_receipt_round_trips_embedded_transfer() {
        let transfer = Transfer {
            id: SourceId::from("transfer-1"),
            unit: UnitId::from("usd"),
            notary: NotaryId::from("notary-1"),
            source_account: AccountId::from("acct-1"),
            destination_account: AccountId::from("acct-2"),
            sender_nym: NymId::from("alice"),
            recipient_nym: Some(NymId::from("bob")),
            amount: dec!(7.0),
            memo: String::new(),
            revision: 1,
        };
        let receipt = TransactionReceipt::for_transfer(
            ReceiptKind::Pending,
            AccountId::from("acct-2"),
            AccountId::from("acct-2"),
            Utc::now(),
            &transfer,
        )
        .unwrap();

        assert_eq!(receipt.transfer().unwrap(), transfer);
    }
}
