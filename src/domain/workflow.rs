use crate::domain::identifier::{AccountId, NotaryId, NymId, SourceId, UnitId, WorkflowId};
use crate::error::{Result, WorkflowError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The lifecycle family a workflow tracks, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    OutgoingCheque,
    IncomingCheque,
    OutgoingInvoice,
    IncomingInvoice,
    OutgoingVoucher,
    IncomingVoucher,
    OutgoingTransfer,
    IncomingTransfer,
    InternalTransfer,
    OutgoingCash,
    IncomingCash,
}

/// Outgoing cheque-family workflows (the sender's side).
pub const OUTGOING_CHEQUE_TYPES: &[WorkflowType] = &[
    WorkflowType::OutgoingCheque,
    WorkflowType::OutgoingInvoice,
    WorkflowType::OutgoingVoucher,
];

/// Incoming cheque-family workflows (the recipient's side).
pub const INCOMING_CHEQUE_TYPES: &[WorkflowType] = &[
    WorkflowType::IncomingCheque,
    WorkflowType::IncomingInvoice,
    WorkflowType::IncomingVoucher,
];

/// All cheque-family workflows.
pub const CHEQUE_TYPES: &[WorkflowType] = &[
    WorkflowType::OutgoingCheque,
    WorkflowType::IncomingCheque,
    WorkflowType::OutgoingInvoice,
    WorkflowType::IncomingInvoice,
    WorkflowType::OutgoingVoucher,
    WorkflowType::IncomingVoucher,
];

/// Transfer workflows originated by the owner.
pub const SENDER_TRANSFER_TYPES: &[WorkflowType] = &[
    WorkflowType::OutgoingTransfer,
    WorkflowType::InternalTransfer,
];

impl WorkflowType {
    /// The schema versions stamped into every record of this type.
    pub const fn versions(self) -> VersionSet {
        match self {
            WorkflowType::OutgoingCheque
            | WorkflowType::IncomingCheque
            | WorkflowType::OutgoingInvoice
            | WorkflowType::IncomingInvoice
            | WorkflowType::OutgoingVoucher
            | WorkflowType::IncomingVoucher => VersionSet {
                workflow: 1,
                source: 1,
                event: 1,
            },
            WorkflowType::OutgoingTransfer
            | WorkflowType::IncomingTransfer
            | WorkflowType::InternalTransfer => VersionSet {
                workflow: 2,
                source: 1,
                event: 2,
            },
            WorkflowType::OutgoingCash | WorkflowType::IncomingCash => VersionSet {
                workflow: 3,
                source: 1,
                event: 3,
            },
        }
    }

    pub const fn is_cheque_like(self) -> bool {
        matches!(
            self,
            WorkflowType::OutgoingCheque
                | WorkflowType::IncomingCheque
                | WorkflowType::OutgoingInvoice
                | WorkflowType::IncomingInvoice
                | WorkflowType::OutgoingVoucher
                | WorkflowType::IncomingVoucher
        )
    }

    pub const fn is_transfer(self) -> bool {
        matches!(
            self,
            WorkflowType::OutgoingTransfer
                | WorkflowType::IncomingTransfer
                | WorkflowType::InternalTransfer
        )
    }

    pub const fn is_cash(self) -> bool {
        matches!(self, WorkflowType::OutgoingCash | WorkflowType::IncomingCash)
    }

    /// States reachable by this workflow family. The store rejects records
    /// outside this set.
    pub fn permits_state(self, state: WorkflowState) -> bool {
        match self {
            t if t.is_cheque_like() => matches!(
                state,
                WorkflowState::Unsent
                    | WorkflowState::Conveyed
                    | WorkflowState::Cancelled
                    | WorkflowState::Accepted
                    | WorkflowState::Completed
                    | WorkflowState::Expired
            ),
            t if t.is_transfer() => matches!(
                state,
                WorkflowState::Initiated
                    | WorkflowState::Acknowledged
                    | WorkflowState::Conveyed
                    | WorkflowState::Accepted
                    | WorkflowState::Completed
                    | WorkflowState::Aborted
            ),
            _ => matches!(
                state,
                WorkflowState::Unsent | WorkflowState::Conveyed | WorkflowState::Expired
            ),
        }
    }
}

/// Current position in the per-type state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Unsent,
    Conveyed,
    Cancelled,
    Accepted,
    Completed,
    Expired,
    Initiated,
    Acknowledged,
    Aborted,
}

/// The kind of lifecycle occurrence an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Create,
    Convey,
    Cancel,
    Accept,
    Complete,
    Abort,
    Acknowledge,
    Expire,
}

/// How the occurrence reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMethod {
    None,
    Notary,
}

/// Schema versions for the workflow record, its source entries, and its
/// events. Static per workflow type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSet {
    pub workflow: u32,
    pub source: u32,
    pub event: u32,
}

/// One immutable lifecycle occurrence. Never mutated after being appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub version: u32,
    pub event_type: EventType,
    /// Serialized protocol message blobs (request and/or reply), or a
    /// serialized receipt, or empty for locally-originated occurrences.
    pub items: Vec<Vec<u8>>,
    pub method: TransportMethod,
    pub endpoint: String,
    pub time: DateTime<Utc>,
    pub success: bool,
    pub nym: Option<NymId>,
}

/// A snapshot of the source instrument the workflow tracks.
///
/// Exactly one entry per workflow today; the list form is reserved for
/// multi-instrument workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub id: SourceId,
    pub revision: u32,
    pub item: Vec<u8>,
}

/// The state-tracking aggregate for one instrument's journey between
/// parties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub workflow_type: WorkflowType,
    pub state: WorkflowState,
    pub versions: VersionSet,
    pub source: Vec<SourceEntry>,
    pub events: Vec<Event>,
    pub parties: Vec<NymId>,
    pub accounts: Vec<AccountId>,
    pub units: Vec<UnitId>,
    pub notary: NotaryId,
}

impl Workflow {
    /// Builds a fresh workflow around one source instrument. The id is
    /// random, the version set comes from the static per-type table, and no
    /// events are attached yet.
    pub fn create(
        workflow_type: WorkflowType,
        initial_state: WorkflowState,
        source_id: SourceId,
        revision: u32,
        item: Vec<u8>,
        unit: UnitId,
        notary: NotaryId,
    ) -> Self {
        Self {
            id: WorkflowId::random(),
            workflow_type,
            state: initial_state,
            versions: workflow_type.versions(),
            source: vec![SourceEntry {
                id: source_id,
                revision,
                item,
            }],
            events: Vec::new(),
            parties: Vec::new(),
            accounts: Vec::new(),
            units: vec![unit],
            notary,
        }
    }

    pub fn source_id(&self) -> Option<&SourceId> {
        self.source.first().map(|entry| &entry.id)
    }

    /// Records a counterparty. First mention wins; never overwritten or
    /// duplicated.
    pub fn record_party(&mut self, nym: &NymId) {
        if !self.parties.contains(nym) {
            self.parties.push(nym.clone());
        }
    }

    /// Appends an account id on first occurrence, preserving insertion
    /// order (source account first, destination second for transfers).
    pub fn record_account(&mut self, account: &AccountId) {
        if !self.accounts.contains(account) {
            self.accounts.push(account.clone());
        }
    }

    /// Schema validation run by the store before accepting a record.
    pub fn validate(&self) -> Result<()> {
        let expected = self.workflow_type.versions();
        if self.versions != expected {
            return Err(WorkflowError::Validation(format!(
                "version set {:?} does not match type {:?}",
                self.versions, self.workflow_type
            )));
        }
        if self.source.len() != 1 {
            return Err(WorkflowError::Validation(format!(
                "expected exactly one source entry, found {}",
                self.source.len()
            )));
        }
        if !self.workflow_type.permits_state(self.state) {
            return Err(WorkflowError::Validation(format!(
                "state {:?} not reachable for type {:?}",
                self.state, self.workflow_type
            )));
        }
        for event in &self.events {
            if event.version != expected.event {
                return Err(WorkflowError::Validation(format!(
                    "event version {} does not match type {:?}",
                    event.version, self.workflow_type
                )));
            }
        }
        Ok(())
    }
}
