//! The event appender: the only code that advances workflow state. Callers
//! hold the per-workflow lock and have already passed the transition guard.

use crate::application::engine::WorkflowEngine;
use crate::application::status::{OperationStatus, reply_status};
use crate::domain::identifier::{AccountId, NymId};
use crate::domain::message::{ProtocolMessage, TransactionReceipt};
use crate::domain::workflow::{Event, EventType, TransportMethod, Workflow, WorkflowState};
use crate::error::Result;
use chrono::{DateTime, Utc};

impl WorkflowEngine {
    /// Appends an event driven by a request/reply exchange with the notary.
    ///
    /// The new state is applied only when the reply indicates conclusive
    /// success; otherwise the event is still recorded (success = false) so
    /// reconciliation can replay the exchange. Returns the extracted status
    /// so callers can distinguish indeterminate replies.
    pub(crate) async fn add_message_event(
        &self,
        owner: &NymId,
        workflow: &mut Workflow,
        event_type: EventType,
        new_state: WorkflowState,
        request: &ProtocolMessage,
        reply: Option<&ProtocolMessage>,
        account: Option<&AccountId>,
        counterparty: Option<&NymId>,
    ) -> Result<OperationStatus> {
        let status = reply_status(reply);

        if status.advances_state() {
            workflow.state = new_state;
            if let Some(account) = account {
                workflow.record_account(account);
            }
        }

        let mut items = vec![request.serialize()?];
        if let Some(reply) = reply {
            items.push(reply.serialize()?);
        }

        let event = Event {
            version: workflow.versions.event,
            event_type,
            items,
            method: TransportMethod::Notary,
            endpoint: workflow.notary.to_string(),
            time: reply.map_or(request.time, |reply| reply.time),
            success: status.advances_state(),
            nym: counterparty.cloned(),
        };

        self.finish_event(owner, workflow, event, counterparty, account)
            .await?;

        Ok(status)
    }

    /// Appends an event driven by a transaction receipt observed during
    /// inbox processing. There is no reply to the original request here; the
    /// receipt itself proves the occurrence, so the event always succeeds.
    pub(crate) async fn add_receipt_event(
        &self,
        owner: &NymId,
        workflow: &mut Workflow,
        event_type: EventType,
        new_state: WorkflowState,
        receipt: &TransactionReceipt,
        time: DateTime<Utc>,
        account: Option<&AccountId>,
        counterparty: Option<&NymId>,
    ) -> Result<()> {
        workflow.state = new_state;
        if let Some(account) = account {
            workflow.record_account(account);
        }

        let event = Event {
            version: workflow.versions.event,
            event_type,
            items: vec![receipt.serialize()?],
            method: TransportMethod::Notary,
            endpoint: receipt.notary.to_string(),
            time,
            success: true,
            nym: counterparty.cloned(),
        };

        self.finish_event(owner, workflow, event, counterparty, account)
            .await
    }

    /// Appends a locally-originated event (expiry) with no message blobs.
    pub(crate) async fn add_local_event(
        &self,
        owner: &NymId,
        workflow: &mut Workflow,
        event_type: EventType,
        new_state: WorkflowState,
        time: DateTime<Utc>,
        account: Option<&AccountId>,
    ) -> Result<()> {
        workflow.state = new_state;
        if let Some(account) = account {
            workflow.record_account(account);
        }

        let event = Event {
            version: workflow.versions.event,
            event_type,
            items: Vec::new(),
            method: TransportMethod::None,
            endpoint: String::new(),
            time,
            success: true,
            nym: None,
        };

        self.finish_event(owner, workflow, event, None, account).await
    }

    async fn finish_event(
        &self,
        owner: &NymId,
        workflow: &mut Workflow,
        event: Event,
        counterparty: Option<&NymId>,
        account: Option<&AccountId>,
    ) -> Result<()> {
        workflow.events.push(event);
        if let Some(nym) = counterparty {
            workflow.record_party(nym);
        }

        self.persist(owner, workflow).await?;

        if let Some(account) = account {
            self.notifications.publish_account_update(account).await?;
        }

        Ok(())
    }

    /// Shared tail of every origination: persist the fresh workflow and
    /// publish the account-update notification when an account is involved.
    pub(crate) async fn persist_new(
        &self,
        owner: &NymId,
        workflow: &Workflow,
        account: Option<&AccountId>,
    ) -> Result<()> {
        self.persist(owner, workflow).await?;

        if let Some(account) = account {
            self.notifications.publish_account_update(account).await?;
        }

        Ok(())
    }
}

/// Builds the Create event attached to a freshly-originated workflow.
pub(crate) fn create_event(
    workflow: &Workflow,
    items: Vec<Vec<u8>>,
    method: TransportMethod,
    time: DateTime<Utc>,
    success: bool,
    nym: Option<NymId>,
) -> Event {
    let endpoint = match method {
        TransportMethod::None => String::new(),
        TransportMethod::Notary => workflow.notary.to_string(),
    };

    Event {
        version: workflow.versions.event,
        event_type: EventType::Create,
        items,
        method,
        endpoint,
        time,
        success,
        nym,
    }
}
