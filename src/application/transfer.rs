//! Lifecycle operations for account-to-account transfers.
//!
//! Outgoing, incoming, and internal transfers share one state machine but
//! diverge on who originates the workflow: an internal transfer's pending
//! receipt must land on the workflow created by [`WorkflowEngine::create_transfer`],
//! while a genuine incoming transfer is originated directly in Conveyed
//! state, since the recipient never initiated one.

use crate::application::appender::create_event;
use crate::application::engine::{WorkflowEngine, ensure};
use crate::application::locator;
use crate::application::status::reply_status;
use crate::domain::identifier::{NotaryId, NymId, WorkflowId};
use crate::domain::instrument::Transfer;
use crate::domain::message::{ProtocolMessage, ReceiptKind, TransactionReceipt};
use crate::domain::ports::{AccountEvent, ActivityBox};
use crate::domain::transition;
use crate::domain::workflow::{
    Event, EventType, SENDER_TRANSFER_TYPES, TransportMethod, Workflow, WorkflowState,
    WorkflowType,
};
use crate::error::{Result, WorkflowError};
use tracing::{debug, warn};

fn check_receipt(receipt: &TransactionReceipt, expected: ReceiptKind, operation: &str) -> Result<()> {
    if receipt.kind != expected {
        warn!(kind = ?receipt.kind, operation, "unexpected receipt kind");
        return Err(WorkflowError::WrongInstrument(format!(
            "{operation} expects a {expected:?} receipt, found {:?}",
            receipt.kind
        )));
    }
    Ok(())
}

fn check_notary(receipt: &TransactionReceipt, notary: &NotaryId) -> Result<()> {
    if receipt.notary != *notary {
        warn!(found = %receipt.notary, expected = %notary, "receipt notary mismatch");
        return Err(WorkflowError::WrongInstrument(
            "receipt was issued by a different notary".to_string(),
        ));
    }
    Ok(())
}

impl WorkflowEngine {
    /// Originates a transfer workflow in Initiated state. A transfer whose
    /// recipient is the owner itself becomes an internal transfer between
    /// two of the owner's accounts. Idempotent per source instrument.
    pub async fn create_transfer(
        &self,
        owner: &NymId,
        transfer: &Transfer,
        request: &ProtocolMessage,
        reply: Option<&ProtocolMessage>,
    ) -> Result<WorkflowId> {
        if transfer.sender_nym != *owner {
            warn!(source = %transfer.id, "transfer sender does not match owner");
            return Err(WorkflowError::WrongInstrument(
                "transfer was not initiated by this nym".to_string(),
            ));
        }

        let internal = transfer.is_internal();
        let counterparty = transfer
            .recipient_nym
            .as_ref()
            .filter(|recipient| !internal && **recipient != *owner);

        let contact = match counterparty {
            Some(recipient) => Some(self.require_contact(recipient).await?),
            None => None,
        };

        let creation = self.locks.lock_for_source(&transfer.id);
        let _guard = creation.lock().await;

        if let Some(existing) =
            locator::by_source(&self.store, owner, &transfer.id, SENDER_TRANSFER_TYPES).await?
        {
            debug!(source = %transfer.id, workflow = %existing.id, "transfer already has a workflow");
            return Ok(existing.id);
        }

        let workflow_type = if internal {
            WorkflowType::InternalTransfer
        } else {
            WorkflowType::OutgoingTransfer
        };

        let mut workflow = Workflow::create(
            workflow_type,
            WorkflowState::Initiated,
            transfer.id.clone(),
            transfer.revision,
            transfer.serialize()?,
            transfer.unit.clone(),
            transfer.notary.clone(),
        );
        workflow.record_account(&transfer.source_account);
        workflow.record_account(&transfer.destination_account);
        if let Some(recipient) = counterparty {
            workflow.record_party(recipient);
        }

        let success = reply_status(reply).advances_state();
        let mut items = vec![request.serialize()?];
        if let Some(reply) = reply {
            items.push(reply.serialize()?);
        }
        let time = reply.map_or(request.time, |reply| reply.time);
        let event = create_event(
            &workflow,
            items,
            TransportMethod::Notary,
            time,
            success,
            counterparty.cloned(),
        );
        workflow.events.push(event);

        self.persist_new(owner, &workflow, Some(&transfer.source_account))
            .await?;

        if let Some(contact) = &contact {
            self.activity
                .record_payment_event(
                    owner,
                    contact,
                    ActivityBox::Outgoing,
                    &transfer.id,
                    &workflow.id,
                    time,
                )
                .await?;
        }

        self.notifications
            .push_account_event(AccountEvent {
                owner: owner.clone(),
                contact,
                workflow: workflow.id,
                workflow_type,
                account: transfer.source_account.clone(),
                amount: -transfer.amount,
                pending_amount: -transfer.amount,
                time,
                memo: transfer.memo.clone(),
            })
            .await?;

        Ok(workflow.id)
    }

    /// Records the notary's acknowledgement of an initiated transfer.
    ///
    /// Acknowledgement and conveyance travel on independent channels; when
    /// conveyance won the race the event is appended without regressing the
    /// state back to Acknowledged.
    pub async fn acknowledge_transfer(
        &self,
        owner: &NymId,
        transfer: &Transfer,
        request: &ProtocolMessage,
        reply: Option<&ProtocolMessage>,
    ) -> Result<WorkflowId> {
        let (_guard, mut workflow) = self
            .checkout(owner, &transfer.id, SENDER_TRANSFER_TYPES)
            .await?;
        ensure(
            transition::can_acknowledge_transfer(workflow.state),
            "acknowledge transfer",
            &workflow,
        )?;

        let new_state = if workflow.state == WorkflowState::Conveyed {
            WorkflowState::Conveyed
        } else {
            WorkflowState::Acknowledged
        };

        let counterparty = transfer
            .recipient_nym
            .as_ref()
            .filter(|recipient| **recipient != *owner);

        self.add_message_event(
            owner,
            &mut workflow,
            EventType::Acknowledge,
            new_state,
            request,
            reply,
            Some(&transfer.source_account),
            counterparty,
        )
        .await?;

        Ok(workflow.id)
    }

    /// Processes a pending-transfer receipt. For an internal transfer this
    /// conveys the existing workflow; for a genuine incoming transfer it
    /// originates the recipient-side workflow directly in Conveyed state.
    pub async fn convey_transfer(
        &self,
        owner: &NymId,
        notary: &NotaryId,
        receipt: &TransactionReceipt,
    ) -> Result<WorkflowId> {
        check_receipt(receipt, ReceiptKind::Pending, "convey transfer")?;
        check_notary(receipt, notary)?;
        let transfer = receipt.transfer()?;

        if transfer.is_internal() {
            self.convey_internal_transfer(owner, &transfer, receipt).await
        } else {
            self.convey_incoming_transfer(owner, &transfer, receipt).await
        }
    }

    async fn convey_internal_transfer(
        &self,
        owner: &NymId,
        transfer: &Transfer,
        receipt: &TransactionReceipt,
    ) -> Result<WorkflowId> {
        let (_guard, mut workflow) = self
            .checkout(owner, &transfer.id, &[WorkflowType::InternalTransfer])
            .await?;
        ensure(
            transition::can_convey_internal_transfer(workflow.state),
            "convey transfer",
            &workflow,
        )?;

        // A replayed pending receipt after conveyance is a no-op success.
        if workflow.state == WorkflowState::Conveyed {
            debug!(workflow = %workflow.id, "internal transfer already conveyed");
            return Ok(workflow.id);
        }

        self.add_receipt_event(
            owner,
            &mut workflow,
            EventType::Convey,
            WorkflowState::Conveyed,
            receipt,
            receipt.time,
            Some(&transfer.destination_account),
            None,
        )
        .await?;

        Ok(workflow.id)
    }

    async fn convey_incoming_transfer(
        &self,
        owner: &NymId,
        transfer: &Transfer,
        receipt: &TransactionReceipt,
    ) -> Result<WorkflowId> {
        let creation = self.locks.lock_for_source(&transfer.id);
        let _guard = creation.lock().await;

        if let Some(existing) = locator::by_source(
            &self.store,
            owner,
            &transfer.id,
            &[WorkflowType::IncomingTransfer],
        )
        .await?
        {
            debug!(source = %transfer.id, workflow = %existing.id, "transfer already conveyed");
            return Ok(existing.id);
        }

        let mut workflow = Workflow::create(
            WorkflowType::IncomingTransfer,
            WorkflowState::Conveyed,
            transfer.id.clone(),
            transfer.revision,
            transfer.serialize()?,
            transfer.unit.clone(),
            transfer.notary.clone(),
        );
        workflow.record_party(&transfer.sender_nym);
        workflow.record_account(&receipt.real_account);

        let event = Event {
            version: workflow.versions.event,
            event_type: EventType::Convey,
            items: vec![receipt.serialize()?],
            method: TransportMethod::Notary,
            endpoint: receipt.notary.to_string(),
            time: receipt.time,
            success: true,
            nym: Some(transfer.sender_nym.clone()),
        };
        workflow.events.push(event);

        self.persist_new(owner, &workflow, Some(&receipt.real_account))
            .await?;

        let contact = self.contacts.contact_for_nym(&transfer.sender_nym).await?;
        if let Some(contact) = &contact {
            self.activity
                .record_payment_event(
                    owner,
                    contact,
                    ActivityBox::Incoming,
                    &transfer.id,
                    &workflow.id,
                    receipt.time,
                )
                .await?;
        } else {
            debug!(nym = %transfer.sender_nym, "no contact for transfer sender, skipping activity");
        }

        self.notifications
            .push_account_event(AccountEvent {
                owner: owner.clone(),
                contact,
                workflow: workflow.id,
                workflow_type: WorkflowType::IncomingTransfer,
                account: receipt.real_account.clone(),
                amount: transfer.amount,
                pending_amount: transfer.amount,
                time: receipt.time,
                memo: transfer.memo.clone(),
            })
            .await?;

        Ok(workflow.id)
    }

    /// Recipient-side acceptance of a conveyed incoming transfer.
    pub async fn accept_transfer(
        &self,
        owner: &NymId,
        receipt: &TransactionReceipt,
        request: &ProtocolMessage,
        reply: Option<&ProtocolMessage>,
    ) -> Result<WorkflowId> {
        check_receipt(receipt, ReceiptKind::Pending, "accept transfer")?;
        let transfer = receipt.transfer()?;

        let (_guard, mut workflow) = self
            .checkout(owner, &transfer.id, &[WorkflowType::IncomingTransfer])
            .await?;
        ensure(
            transition::can_accept_transfer(workflow.state),
            "accept transfer",
            &workflow,
        )?;

        self.add_message_event(
            owner,
            &mut workflow,
            EventType::Accept,
            WorkflowState::Accepted,
            request,
            reply,
            Some(&receipt.real_account),
            Some(&transfer.sender_nym),
        )
        .await?;

        Ok(workflow.id)
    }

    /// Sender-side clearing observed from a transfer receipt in the inbox.
    pub async fn clear_transfer(
        &self,
        owner: &NymId,
        notary: &NotaryId,
        receipt: &TransactionReceipt,
    ) -> Result<WorkflowId> {
        check_receipt(receipt, ReceiptKind::TransferReceipt, "clear transfer")?;
        check_notary(receipt, notary)?;
        let transfer = receipt.transfer()?;

        let (_guard, mut workflow) = self
            .checkout(owner, &transfer.id, SENDER_TRANSFER_TYPES)
            .await?;
        ensure(
            transition::can_clear_transfer(workflow.workflow_type, workflow.state),
            "clear transfer",
            &workflow,
        )?;

        let counterparty = transfer
            .recipient_nym
            .as_ref()
            .filter(|recipient| **recipient != *owner);

        self.add_receipt_event(
            owner,
            &mut workflow,
            EventType::Accept,
            WorkflowState::Accepted,
            receipt,
            receipt.time,
            Some(&transfer.source_account),
            counterparty,
        )
        .await?;

        Ok(workflow.id)
    }

    /// Final settlement once the accept-pending receipt is processed.
    pub async fn complete_transfer(
        &self,
        owner: &NymId,
        notary: &NotaryId,
        receipt: &TransactionReceipt,
    ) -> Result<WorkflowId> {
        check_receipt(receipt, ReceiptKind::AcceptPending, "complete transfer")?;
        check_notary(receipt, notary)?;
        let transfer = receipt.transfer()?;

        let (_guard, mut workflow) = self.checkout(owner, &transfer.id, &[]).await?;
        ensure(
            workflow.workflow_type.is_transfer()
                && transition::can_complete_transfer(workflow.state),
            "complete transfer",
            &workflow,
        )?;

        let account = if workflow.workflow_type == WorkflowType::IncomingTransfer {
            receipt.real_account.clone()
        } else {
            transfer.source_account.clone()
        };

        self.add_receipt_event(
            owner,
            &mut workflow,
            EventType::Complete,
            WorkflowState::Completed,
            receipt,
            receipt.time,
            Some(&account),
            None,
        )
        .await?;

        Ok(workflow.id)
    }

    /// Aborts a transfer the notary never acknowledged.
    pub async fn abort_transfer(
        &self,
        owner: &NymId,
        transfer: &Transfer,
        request: &ProtocolMessage,
        reply: Option<&ProtocolMessage>,
    ) -> Result<WorkflowId> {
        let (_guard, mut workflow) = self
            .checkout(owner, &transfer.id, SENDER_TRANSFER_TYPES)
            .await?;
        ensure(
            transition::can_abort_transfer(workflow.state),
            "abort transfer",
            &workflow,
        )?;

        self.add_message_event(
            owner,
            &mut workflow,
            EventType::Abort,
            WorkflowState::Aborted,
            request,
            reply,
            Some(&transfer.source_account),
            None,
        )
        .await?;

        Ok(workflow.id)
    }
}
