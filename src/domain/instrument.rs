use crate::domain::identifier::{AccountId, NotaryId, NymId, SourceId, UnitId};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The concrete flavour of a cheque object, derived from its fields rather
/// than carried as a separate tag on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChequeKind {
    Cheque,
    Invoice,
    Voucher,
    Cancellation,
}

/// A cheque-family instrument (plain cheque, invoice, or voucher).
///
/// Invoices are cheques with a negative amount; vouchers carry a remitter.
/// The engine receives these pre-validated — signature checks happen in the
/// transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cheque {
    pub id: SourceId,
    pub unit: UnitId,
    pub notary: NotaryId,
    pub source_account: AccountId,
    pub sender_nym: NymId,
    pub recipient_nym: Option<NymId>,
    pub remitter_nym: Option<NymId>,
    pub amount: Decimal,
    pub memo: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub revision: u32,
}

impl Cheque {
    /// Classifies the instrument by sign and remitter field.
    pub fn kind(&self) -> ChequeKind {
        if self.remitter_nym.is_some() {
            ChequeKind::Voucher
        } else if self.amount < Decimal::ZERO {
            ChequeKind::Invoice
        } else if self.amount == Decimal::ZERO {
            ChequeKind::Cancellation
        } else {
            ChequeKind::Cheque
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// An account-to-account transfer item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: SourceId,
    pub unit: UnitId,
    pub notary: NotaryId,
    pub source_account: AccountId,
    pub destination_account: AccountId,
    pub sender_nym: NymId,
    pub recipient_nym: Option<NymId>,
    pub amount: Decimal,
    pub memo: String,
    pub revision: u32,
}

impl Transfer {
    /// A transfer between two accounts of the same nym.
    pub fn is_internal(&self) -> bool {
        self.recipient_nym.as_ref() == Some(&self.sender_nym)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// A serialized cash purse. The whole purse is the source item; individual
/// tokens are opaque to the workflow engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purse {
    pub id: SourceId,
    pub unit: UnitId,
    pub notary: NotaryId,
    pub sender_nym: NymId,
    pub recipient_nym: Option<NymId>,
    pub value: Decimal,
    pub revision: u32,
}

impl Purse {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
