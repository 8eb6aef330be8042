use crate::domain::identifier::{AccountId, ContactId, NymId, SourceId, WorkflowId};
use crate::domain::ports::{
    AccountEvent, ActivityBox, ActivityRecorder, ContactResolver, NotificationPublisher,
    WorkflowStore,
};
use crate::domain::workflow::{Workflow, WorkflowState, WorkflowType};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};

#[derive(Default)]
struct StoreInner {
    workflows: HashMap<(NymId, WorkflowId), Workflow>,
    by_source: HashMap<(NymId, SourceId), WorkflowId>,
}

/// A thread-safe in-memory workflow store.
///
/// Keeps the primary records and the source-instrument index behind one
/// `RwLock` so an upsert updates both atomically. Ideal for tests and the
/// simulation driver; the RocksDB adapter covers persistence.
#[derive(Default, Clone)]
pub struct InMemoryWorkflowStore {
    inner: Arc<RwLock<StoreInner>>,
    latency: Option<Duration>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artificial delay to every load and store, for exercising
    /// lock-contention behaviour in tests.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            inner: Arc::default(),
            latency: Some(latency),
        }
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn store(&self, owner: &NymId, workflow: &Workflow) -> Result<()> {
        workflow.validate()?;
        self.simulate_latency().await;

        let mut inner = self.inner.write().await;
        for entry in &workflow.source {
            inner
                .by_source
                .insert((owner.clone(), entry.id.clone()), workflow.id);
        }
        inner
            .workflows
            .insert((owner.clone(), workflow.id), workflow.clone());
        Ok(())
    }

    async fn load(&self, owner: &NymId, id: &WorkflowId) -> Result<Option<Workflow>> {
        self.simulate_latency().await;
        let inner = self.inner.read().await;
        Ok(inner.workflows.get(&(owner.clone(), *id)).cloned())
    }

    async fn lookup_by_source(
        &self,
        owner: &NymId,
        source: &SourceId,
    ) -> Result<Option<WorkflowId>> {
        let inner = self.inner.read().await;
        Ok(inner.by_source.get(&(owner.clone(), source.clone())).copied())
    }

    async fn list_by_state(
        &self,
        owner: &NymId,
        workflow_type: WorkflowType,
        state: WorkflowState,
    ) -> Result<Vec<WorkflowId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .workflows
            .iter()
            .filter(|((o, _), workflow)| {
                o == owner && workflow.workflow_type == workflow_type && workflow.state == state
            })
            .map(|((_, id), _)| *id)
            .collect())
    }

    async fn list_by_account(
        &self,
        owner: &NymId,
        account: &AccountId,
    ) -> Result<Vec<WorkflowId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .workflows
            .iter()
            .filter(|((o, _), workflow)| o == owner && workflow.accounts.contains(account))
            .map(|((_, id), _)| *id)
            .collect())
    }
}

/// In-memory nym-to-contact mapping.
#[derive(Default, Clone)]
pub struct InMemoryContactResolver {
    contacts: Arc<RwLock<HashMap<NymId, ContactId>>>,
}

impl InMemoryContactResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, nym: NymId, contact: ContactId) {
        self.contacts.write().await.insert(nym, contact);
    }
}

#[async_trait]
impl ContactResolver for InMemoryContactResolver {
    async fn contact_for_nym(&self, nym: &NymId) -> Result<Option<ContactId>> {
        Ok(self.contacts.read().await.get(nym).cloned())
    }
}

/// One recorded activity-feed entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub owner: NymId,
    pub contact: ContactId,
    pub box_kind: ActivityBox,
    pub source: SourceId,
    pub workflow: WorkflowId,
    pub time: DateTime<Utc>,
}

/// Captures activity-feed entries for inspection in tests and demos.
#[derive(Default, Clone)]
pub struct InMemoryActivityRecorder {
    entries: Arc<RwLock<Vec<ActivityEntry>>>,
}

impl InMemoryActivityRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl ActivityRecorder for InMemoryActivityRecorder {
    async fn record_payment_event(
        &self,
        owner: &NymId,
        contact: &ContactId,
        box_kind: ActivityBox,
        source: &SourceId,
        workflow: &WorkflowId,
        time: DateTime<Utc>,
    ) -> Result<()> {
        self.entries.write().await.push(ActivityEntry {
            owner: owner.clone(),
            contact: contact.clone(),
            box_kind,
            source: source.clone(),
            workflow: *workflow,
            time,
        });
        Ok(())
    }
}

/// Publishes account updates on a broadcast channel and captures structured
/// account events for inspection.
#[derive(Clone)]
pub struct InMemoryNotificationPublisher {
    updates: Arc<RwLock<Vec<AccountId>>>,
    events: Arc<RwLock<Vec<AccountEvent>>>,
    channel: broadcast::Sender<String>,
}

impl Default for InMemoryNotificationPublisher {
    fn default() -> Self {
        let (channel, _) = broadcast::channel(64);
        Self {
            updates: Arc::default(),
            events: Arc::default(),
            channel,
        }
    }
}

impl InMemoryNotificationPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live subscription to the account-update channel.
    pub fn subscribe_account_updates(&self) -> broadcast::Receiver<String> {
        self.channel.subscribe()
    }

    pub async fn account_updates(&self) -> Vec<AccountId> {
        self.updates.read().await.clone()
    }

    pub async fn account_events(&self) -> Vec<AccountEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl NotificationPublisher for InMemoryNotificationPublisher {
    async fn publish_account_update(&self, account: &AccountId) -> Result<()> {
        self.updates.write().await.push(account.clone());
        // Nobody listening is fine; the capture above is the durable record.
        let _ = self.channel.send(account.to_string());
        Ok(())
    }

    async fn push_account_event(&self, event: AccountEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}
