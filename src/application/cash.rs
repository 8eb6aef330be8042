//! Lifecycle operations for cash purses. The whole serialized purse is the
//! source item, and cash workflows track a deliberately small state machine:
//! there is no cancel or expire path for cash.

use crate::application::appender::create_event;
use crate::application::engine::{WorkflowEngine, ensure};
use crate::application::locator;
use crate::domain::identifier::{NymId, WorkflowId};
use crate::domain::instrument::Purse;
use crate::domain::message::ProtocolMessage;
use crate::domain::ports::ActivityBox;
use crate::domain::transition;
use crate::domain::workflow::{
    Event, EventType, TransportMethod, Workflow, WorkflowState, WorkflowType,
};
use crate::error::Result;
use chrono::Utc;
use tracing::debug;

impl WorkflowEngine {
    /// Originates the sender-side workflow for a freshly withdrawn purse.
    /// Idempotent per purse.
    pub async fn allocate_cash(&self, owner: &NymId, purse: &Purse) -> Result<WorkflowId> {
        let creation = self.locks.lock_for_source(&purse.id);
        let _guard = creation.lock().await;

        if let Some(existing) =
            locator::by_source(&self.store, owner, &purse.id, &[WorkflowType::OutgoingCash])
                .await?
        {
            debug!(source = %purse.id, workflow = %existing.id, "purse already has a workflow");
            return Ok(existing.id);
        }

        let mut workflow = Workflow::create(
            WorkflowType::OutgoingCash,
            WorkflowState::Unsent,
            purse.id.clone(),
            purse.revision,
            purse.serialize()?,
            purse.unit.clone(),
            purse.notary.clone(),
        );
        if let Some(recipient) = &purse.recipient_nym {
            workflow.record_party(recipient);
        }
        let event = create_event(
            &workflow,
            Vec::new(),
            TransportMethod::None,
            Utc::now(),
            true,
            purse.recipient_nym.clone(),
        );
        workflow.events.push(event);

        self.persist_new(owner, &workflow, None).await?;

        Ok(workflow.id)
    }

    /// Conveys a purse to its recipient. Cash may be re-conveyed from any
    /// state short of expiry (a failed send leaves the purse spendable).
    pub async fn send_cash(
        &self,
        owner: &NymId,
        purse: &Purse,
        request: &ProtocolMessage,
        reply: Option<&ProtocolMessage>,
    ) -> Result<WorkflowId> {
        let (_guard, mut workflow) = self
            .checkout(owner, &purse.id, &[WorkflowType::OutgoingCash])
            .await?;
        ensure(
            transition::can_convey_cash(workflow.state),
            "convey cash",
            &workflow,
        )?;

        let status = self
            .add_message_event(
                owner,
                &mut workflow,
                EventType::Convey,
                WorkflowState::Conveyed,
                request,
                reply,
                None,
                purse.recipient_nym.as_ref(),
            )
            .await?;

        if status.advances_state()
            && let Some(recipient) = &purse.recipient_nym
            && let Some(contact) = self.contacts.contact_for_nym(recipient).await?
        {
            self.activity
                .record_payment_event(
                    owner,
                    &contact,
                    ActivityBox::Outgoing,
                    &purse.id,
                    &workflow.id,
                    request.time,
                )
                .await?;
        }

        Ok(workflow.id)
    }

    /// Records a purse conveyed to this nym. Idempotent per purse.
    pub async fn receive_cash(
        &self,
        owner: &NymId,
        purse: &Purse,
        message: &ProtocolMessage,
    ) -> Result<WorkflowId> {
        let counterparty = message
            .sender_nym
            .clone()
            .unwrap_or_else(|| purse.sender_nym.clone());

        let creation = self.locks.lock_for_source(&purse.id);
        let _guard = creation.lock().await;

        if let Some(existing) =
            locator::by_source(&self.store, owner, &purse.id, &[WorkflowType::IncomingCash])
                .await?
        {
            debug!(source = %purse.id, workflow = %existing.id, "purse already received");
            return Ok(existing.id);
        }

        let mut workflow = Workflow::create(
            WorkflowType::IncomingCash,
            WorkflowState::Conveyed,
            purse.id.clone(),
            purse.revision,
            purse.serialize()?,
            purse.unit.clone(),
            purse.notary.clone(),
        );
        workflow.record_party(&counterparty);

        let event = Event {
            version: workflow.versions.event,
            event_type: EventType::Convey,
            items: vec![message.serialize()?],
            method: TransportMethod::Notary,
            endpoint: workflow.notary.to_string(),
            time: message.time,
            success: true,
            nym: Some(counterparty.clone()),
        };
        workflow.events.push(event);

        self.persist_new(owner, &workflow, None).await?;

        if let Some(contact) = self.contacts.contact_for_nym(&counterparty).await? {
            self.activity
                .record_payment_event(
                    owner,
                    &contact,
                    ActivityBox::Incoming,
                    &purse.id,
                    &workflow.id,
                    message.time,
                )
                .await?;
        } else {
            debug!(nym = %counterparty, "no contact for purse sender, skipping activity");
        }

        Ok(workflow.id)
    }
}
