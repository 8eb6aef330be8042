use crate::application::locator;
use crate::application::locks::LockRegistry;
use crate::domain::identifier::{AccountId, ContactId, NymId, SourceId, WorkflowId};
use crate::domain::ports::{
    ActivityRecorderBox, ContactResolverBox, NotificationPublisherBox, WorkflowStoreBox,
};
use crate::domain::workflow::{Workflow, WorkflowState, WorkflowType};
use crate::error::{Result, WorkflowError};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error};

/// The payment workflow engine.
///
/// Owns the collaborator ports and the per-workflow lock registry. Every
/// lifecycle operation follows the same template: validate the domain
/// object, locate or create the workflow, acquire its lock, run the
/// transition guard, append the event, then emit side notifications.
pub struct WorkflowEngine {
    pub(crate) store: WorkflowStoreBox,
    pub(crate) contacts: ContactResolverBox,
    pub(crate) activity: ActivityRecorderBox,
    pub(crate) notifications: NotificationPublisherBox,
    pub(crate) locks: LockRegistry,
}

impl WorkflowEngine {
    pub fn new(
        store: WorkflowStoreBox,
        contacts: ContactResolverBox,
        activity: ActivityRecorderBox,
        notifications: NotificationPublisherBox,
    ) -> Self {
        Self {
            store,
            contacts,
            activity,
            notifications,
            locks: LockRegistry::new(),
        }
    }

    pub async fn load_workflow(&self, owner: &NymId, id: &WorkflowId) -> Result<Option<Workflow>> {
        locator::by_id(&self.store, owner, id, &[]).await
    }

    pub async fn load_workflow_by_source(
        &self,
        owner: &NymId,
        source: &SourceId,
        accepted: &[WorkflowType],
    ) -> Result<Option<Workflow>> {
        locator::by_source(&self.store, owner, source, accepted).await
    }

    pub async fn list(
        &self,
        owner: &NymId,
        workflow_type: WorkflowType,
        state: WorkflowState,
    ) -> Result<Vec<WorkflowId>> {
        self.store.list_by_state(owner, workflow_type, state).await
    }

    pub async fn workflows_by_account(
        &self,
        owner: &NymId,
        account: &AccountId,
    ) -> Result<Vec<WorkflowId>> {
        self.store.list_by_account(owner, account).await
    }

    /// Locates an existing workflow by source instrument, takes its
    /// exclusive lock, and reloads a fresh snapshot under that lock. The
    /// reload is what makes guard-check + append atomic: a snapshot taken
    /// before the lock could have been advanced by a concurrent caller.
    pub(crate) async fn checkout(
        &self,
        owner: &NymId,
        source: &SourceId,
        accepted: &[WorkflowType],
    ) -> Result<(OwnedMutexGuard<()>, Workflow)> {
        let Some(found) = locator::by_source(&self.store, owner, source, accepted).await? else {
            return Err(WorkflowError::NotFound(format!("source {source}")));
        };

        let guard = self.locks.lock_for(&found.id).lock_owned().await;

        let Some(workflow) = locator::by_id(&self.store, owner, &found.id, accepted).await? else {
            return Err(WorkflowError::NotFound(format!("workflow {}", found.id)));
        };

        Ok((guard, workflow))
    }

    /// Writes the workflow through the store. The engine trusts its own
    /// serialization, so a validation or storage failure here means the
    /// persisted data model is already suspect and is surfaced as fatal.
    pub(crate) async fn persist(&self, owner: &NymId, workflow: &Workflow) -> Result<()> {
        if let Err(e) = workflow.validate() {
            error!(workflow = %workflow.id, %e, "workflow failed schema validation");
            return Err(e);
        }

        if let Err(e) = self.store.store(owner, workflow).await {
            error!(workflow = %workflow.id, %e, "workflow persistence failed");
            return Err(e);
        }

        Ok(())
    }

    /// Resolves a counterparty contact, failing closed when unknown.
    pub(crate) async fn require_contact(&self, nym: &NymId) -> Result<ContactId> {
        self.contacts
            .contact_for_nym(nym)
            .await?
            .ok_or_else(|| WorkflowError::UnknownContact(nym.clone()))
    }
}

/// Turns a guard verdict into the caller-facing rejection. Guard rejections
/// are the expected outcome of double-processing, so they log at debug.
pub(crate) fn ensure(allowed: bool, operation: &'static str, workflow: &Workflow) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        debug!(
            workflow = %workflow.id,
            state = ?workflow.state,
            operation,
            "transition rejected"
        );
        Err(WorkflowError::IllegalTransition {
            operation,
            workflow_type: workflow.workflow_type,
            state: workflow.state,
        })
    }
}
