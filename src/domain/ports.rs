use crate::domain::identifier::{AccountId, ContactId, NymId, SourceId, WorkflowId};
use crate::domain::workflow::{Workflow, WorkflowState, WorkflowType};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Durable persistence for workflow records, keyed by owner and workflow id
/// with secondary lookup by source instrument and by account.
///
/// `store` is an atomic upsert and must run [`Workflow::validate`] before
/// accepting a record.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn store(&self, owner: &NymId, workflow: &Workflow) -> Result<()>;
    async fn load(&self, owner: &NymId, id: &WorkflowId) -> Result<Option<Workflow>>;
    async fn lookup_by_source(&self, owner: &NymId, source: &SourceId)
    -> Result<Option<WorkflowId>>;
    async fn list_by_state(
        &self,
        owner: &NymId,
        workflow_type: WorkflowType,
        state: WorkflowState,
    ) -> Result<Vec<WorkflowId>>;
    async fn list_by_account(&self, owner: &NymId, account: &AccountId)
    -> Result<Vec<WorkflowId>>;
}

/// Resolves a counterparty nym to an address-book contact. `None` signals an
/// unknown counterparty.
#[async_trait]
pub trait ContactResolver: Send + Sync {
    async fn contact_for_nym(&self, nym: &NymId) -> Result<Option<ContactId>>;
}

/// Which activity box a payment event lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityBox {
    Incoming,
    Outgoing,
}

/// Records payment events into the activity feed.
#[async_trait]
pub trait ActivityRecorder: Send + Sync {
    async fn record_payment_event(
        &self,
        owner: &NymId,
        contact: &ContactId,
        box_kind: ActivityBox,
        source: &SourceId,
        workflow: &WorkflowId,
        time: DateTime<Utc>,
    ) -> Result<()>;
}

/// Structured push record for external RPC consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountEvent {
    pub owner: NymId,
    pub contact: Option<ContactId>,
    pub workflow: WorkflowId,
    pub workflow_type: WorkflowType,
    pub account: AccountId,
    pub amount: Decimal,
    pub pending_amount: Decimal,
    pub time: DateTime<Utc>,
    pub memo: String,
}

/// Side-channel notification to downstream consumers: a pub/sub channel of
/// touched account ids, and a push channel of structured account events.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish_account_update(&self, account: &AccountId) -> Result<()>;
    async fn push_account_event(&self, event: AccountEvent) -> Result<()>;
}

pub type WorkflowStoreBox = Box<dyn WorkflowStore>;
pub type ContactResolverBox = Box<dyn ContactResolver>;
pub type ActivityRecorderBox = Box<dyn ActivityRecorder>;
pub type NotificationPublisherBox = Box<dyn NotificationPublisher>;
