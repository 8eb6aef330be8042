//! Lifecycle operations for the cheque family. Invoices and vouchers are
//! cheque objects distinguished by sign and remitter, so they share all of
//! the machinery here behind kind-checked entry points.

use crate::application::appender::create_event;
use crate::application::engine::{WorkflowEngine, ensure};
use crate::application::locator;
use crate::domain::identifier::{AccountId, NymId, WorkflowId};
use crate::domain::instrument::{Cheque, ChequeKind};
use crate::domain::message::{ProtocolMessage, ReceiptKind, TransactionReceipt};
use crate::domain::ports::{AccountEvent, ActivityBox};
use crate::domain::transition;
use crate::domain::workflow::{
    CHEQUE_TYPES, Event, EventType, INCOMING_CHEQUE_TYPES, OUTGOING_CHEQUE_TYPES, TransportMethod,
    Workflow, WorkflowState, WorkflowType,
};
use crate::error::{Result, WorkflowError};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, warn};

fn outgoing_type(kind: ChequeKind) -> WorkflowType {
    match kind {
        ChequeKind::Invoice => WorkflowType::OutgoingInvoice,
        ChequeKind::Voucher => WorkflowType::OutgoingVoucher,
        _ => WorkflowType::OutgoingCheque,
    }
}

fn incoming_type(kind: ChequeKind) -> WorkflowType {
    match kind {
        ChequeKind::Invoice => WorkflowType::IncomingInvoice,
        ChequeKind::Voucher => WorkflowType::IncomingVoucher,
        _ => WorkflowType::IncomingCheque,
    }
}

fn check_kind(cheque: &Cheque, expected: ChequeKind, operation: &str) -> Result<()> {
    let kind = cheque.kind();
    if kind != expected {
        warn!(source = %cheque.id, ?kind, operation, "instrument is not a {expected:?}");
        return Err(WorkflowError::WrongInstrument(format!(
            "{operation} expects a {expected:?}, found {kind:?}"
        )));
    }
    Ok(())
}

impl WorkflowEngine {
    /// Originates the sender-side workflow for a freshly written cheque.
    /// Rejects anything that is not a plain cheque; fails closed when the
    /// named recipient has no known contact. Idempotent: a second call for
    /// the same cheque returns the existing workflow id.
    pub async fn write_cheque(&self, owner: &NymId, cheque: &Cheque) -> Result<WorkflowId> {
        check_kind(cheque, ChequeKind::Cheque, "write cheque")?;
        self.originate_outgoing_cheque(owner, cheque).await
    }

    /// Originates the sender-side workflow for an invoice (a
    /// negative-amount cheque requesting payment).
    pub async fn write_invoice(&self, owner: &NymId, cheque: &Cheque) -> Result<WorkflowId> {
        check_kind(cheque, ChequeKind::Invoice, "write invoice")?;
        self.originate_outgoing_cheque(owner, cheque).await
    }

    /// Originates the sender-side workflow for a notary-issued voucher.
    pub async fn create_voucher(&self, owner: &NymId, cheque: &Cheque) -> Result<WorkflowId> {
        check_kind(cheque, ChequeKind::Voucher, "create voucher")?;
        self.originate_outgoing_cheque(owner, cheque).await
    }

    async fn originate_outgoing_cheque(&self, owner: &NymId, cheque: &Cheque) -> Result<WorkflowId> {
        if cheque.sender_nym != *owner {
            warn!(source = %cheque.id, "cheque sender does not match owner");
            return Err(WorkflowError::WrongInstrument(
                "cheque was not written by this nym".to_string(),
            ));
        }

        let contact = match &cheque.recipient_nym {
            Some(recipient) => Some(self.require_contact(recipient).await?),
            None => None,
        };

        let creation = self.locks.lock_for_source(&cheque.id);
        let _guard = creation.lock().await;

        if let Some(existing) =
            locator::by_source(&self.store, owner, &cheque.id, OUTGOING_CHEQUE_TYPES).await?
        {
            debug!(source = %cheque.id, workflow = %existing.id, "cheque already has a workflow");
            return Ok(existing.id);
        }

        let now = Utc::now();
        let mut workflow = Workflow::create(
            outgoing_type(cheque.kind()),
            WorkflowState::Unsent,
            cheque.id.clone(),
            cheque.revision,
            cheque.serialize()?,
            cheque.unit.clone(),
            cheque.notary.clone(),
        );
        workflow.record_account(&cheque.source_account);
        if let Some(recipient) = &cheque.recipient_nym {
            workflow.record_party(recipient);
        }
        let event = create_event(
            &workflow,
            Vec::new(),
            TransportMethod::None,
            now,
            true,
            cheque.recipient_nym.clone(),
        );
        workflow.events.push(event);

        self.persist_new(owner, &workflow, Some(&cheque.source_account))
            .await?;

        if let Some(contact) = &contact {
            self.activity
                .record_payment_event(owner, contact, ActivityBox::Outgoing, &cheque.id, &workflow.id, now)
                .await?;
        }

        self.notifications
            .push_account_event(AccountEvent {
                owner: owner.clone(),
                contact,
                workflow: workflow.id,
                workflow_type: workflow.workflow_type,
                account: cheque.source_account.clone(),
                amount: -cheque.amount,
                pending_amount: -cheque.amount,
                time: now,
                memo: cheque.memo.clone(),
            })
            .await?;

        Ok(workflow.id)
    }

    /// Conveys an unsent cheque-family instrument to its recipient.
    pub async fn send_cheque(
        &self,
        owner: &NymId,
        cheque: &Cheque,
        request: &ProtocolMessage,
        reply: Option<&ProtocolMessage>,
    ) -> Result<WorkflowId> {
        let (_guard, mut workflow) =
            self.checkout(owner, &cheque.id, OUTGOING_CHEQUE_TYPES).await?;
        ensure(
            transition::can_convey_cheque(workflow.state),
            "convey cheque",
            &workflow,
        )?;

        self.add_message_event(
            owner,
            &mut workflow,
            EventType::Convey,
            WorkflowState::Conveyed,
            request,
            reply,
            Some(&cheque.source_account),
            cheque.recipient_nym.as_ref(),
        )
        .await?;

        Ok(workflow.id)
    }

    /// Cancels a cheque-family instrument that has not been settled.
    pub async fn cancel_cheque(
        &self,
        owner: &NymId,
        cheque: &Cheque,
        request: &ProtocolMessage,
        reply: Option<&ProtocolMessage>,
    ) -> Result<WorkflowId> {
        let (_guard, mut workflow) =
            self.checkout(owner, &cheque.id, OUTGOING_CHEQUE_TYPES).await?;
        ensure(
            transition::can_cancel_cheque(workflow.state),
            "cancel cheque",
            &workflow,
        )?;

        self.add_message_event(
            owner,
            &mut workflow,
            EventType::Cancel,
            WorkflowState::Cancelled,
            request,
            reply,
            Some(&cheque.source_account),
            None,
        )
        .await?;

        Ok(workflow.id)
    }

    /// Records a cheque conveyed to this nym through the notary.
    pub async fn receive_cheque(
        &self,
        owner: &NymId,
        cheque: &Cheque,
        message: &ProtocolMessage,
    ) -> Result<WorkflowId> {
        check_kind(cheque, ChequeKind::Cheque, "receive cheque")?;
        self.receive_cheque_like(owner, cheque, Some(message)).await
    }

    /// Records an invoice conveyed to this nym through the notary.
    pub async fn receive_invoice(
        &self,
        owner: &NymId,
        cheque: &Cheque,
        message: &ProtocolMessage,
    ) -> Result<WorkflowId> {
        check_kind(cheque, ChequeKind::Invoice, "receive invoice")?;
        self.receive_cheque_like(owner, cheque, Some(message)).await
    }

    /// Records a voucher conveyed to this nym through the notary.
    pub async fn receive_voucher(
        &self,
        owner: &NymId,
        cheque: &Cheque,
        message: &ProtocolMessage,
    ) -> Result<WorkflowId> {
        check_kind(cheque, ChequeKind::Voucher, "receive voucher")?;
        self.receive_cheque_like(owner, cheque, Some(message)).await
    }

    /// Imports a cheque received out of band (no conveying message).
    pub async fn import_cheque(&self, owner: &NymId, cheque: &Cheque) -> Result<WorkflowId> {
        check_kind(cheque, ChequeKind::Cheque, "import cheque")?;
        self.receive_cheque_like(owner, cheque, None).await
    }

    /// Imports an invoice received out of band.
    pub async fn import_invoice(&self, owner: &NymId, cheque: &Cheque) -> Result<WorkflowId> {
        check_kind(cheque, ChequeKind::Invoice, "import invoice")?;
        self.receive_cheque_like(owner, cheque, None).await
    }

    /// Imports a voucher received out of band.
    pub async fn import_voucher(&self, owner: &NymId, cheque: &Cheque) -> Result<WorkflowId> {
        check_kind(cheque, ChequeKind::Voucher, "import voucher")?;
        self.receive_cheque_like(owner, cheque, None).await
    }

    async fn receive_cheque_like(
        &self,
        owner: &NymId,
        cheque: &Cheque,
        message: Option<&ProtocolMessage>,
    ) -> Result<WorkflowId> {
        let counterparty = message
            .and_then(|message| message.sender_nym.clone())
            .unwrap_or_else(|| cheque.sender_nym.clone());

        let creation = self.locks.lock_for_source(&cheque.id);
        let _guard = creation.lock().await;

        if let Some(existing) =
            locator::by_source(&self.store, owner, &cheque.id, INCOMING_CHEQUE_TYPES).await?
        {
            debug!(source = %cheque.id, workflow = %existing.id, "instrument already received");
            return Ok(existing.id);
        }

        let mut workflow = Workflow::create(
            incoming_type(cheque.kind()),
            WorkflowState::Conveyed,
            cheque.id.clone(),
            cheque.revision,
            cheque.serialize()?,
            cheque.unit.clone(),
            cheque.notary.clone(),
        );
        workflow.record_party(&counterparty);

        // A conveying message means a Convey event carrying its blob; an
        // out-of-band import gets a bare Create event.
        let event = match message {
            Some(message) => Event {
                version: workflow.versions.event,
                event_type: EventType::Convey,
                items: vec![message.serialize()?],
                method: TransportMethod::Notary,
                endpoint: workflow.notary.to_string(),
                time: message.time,
                success: true,
                nym: Some(counterparty.clone()),
            },
            None => create_event(
                &workflow,
                Vec::new(),
                TransportMethod::None,
                Utc::now(),
                true,
                Some(counterparty.clone()),
            ),
        };
        let time = event.time;
        workflow.events.push(event);

        self.persist_new(owner, &workflow, None).await?;

        if let Some(contact) = self.contacts.contact_for_nym(&counterparty).await? {
            self.activity
                .record_payment_event(owner, &contact, ActivityBox::Incoming, &cheque.id, &workflow.id, time)
                .await?;
        } else {
            debug!(nym = %counterparty, "no contact for instrument sender, skipping activity");
        }

        Ok(workflow.id)
    }

    /// Deposits (or, for invoices, pays) a conveyed incoming instrument
    /// into the given account.
    pub async fn deposit_cheque(
        &self,
        owner: &NymId,
        account: &AccountId,
        cheque: &Cheque,
        request: &ProtocolMessage,
        reply: Option<&ProtocolMessage>,
    ) -> Result<WorkflowId> {
        let (_guard, mut workflow) =
            self.checkout(owner, &cheque.id, INCOMING_CHEQUE_TYPES).await?;
        ensure(
            transition::can_deposit_cheque(workflow.state),
            "deposit cheque",
            &workflow,
        )?;

        let status = self
            .add_message_event(
                owner,
                &mut workflow,
                EventType::Accept,
                WorkflowState::Completed,
                request,
                reply,
                Some(account),
                Some(&cheque.sender_nym),
            )
            .await?;

        if status.advances_state() {
            let contact = self.contacts.contact_for_nym(&cheque.sender_nym).await?;
            self.notifications
                .push_account_event(AccountEvent {
                    owner: owner.clone(),
                    contact,
                    workflow: workflow.id,
                    workflow_type: workflow.workflow_type,
                    account: account.clone(),
                    amount: cheque.amount,
                    pending_amount: Decimal::ZERO,
                    time: Utc::now(),
                    memo: cheque.memo.clone(),
                })
                .await?;
        }

        Ok(workflow.id)
    }

    /// Marks the sender-side workflow accepted after the recipient's
    /// deposit cleared, driven by the cheque receipt from the sender's
    /// inbox. Publishes an account event debiting the sender.
    pub async fn clear_cheque(
        &self,
        recipient: &NymId,
        receipt: &TransactionReceipt,
    ) -> Result<WorkflowId> {
        if recipient.as_str().is_empty() {
            return Err(WorkflowError::WrongInstrument(
                "clearing a cheque requires the recipient nym".to_string(),
            ));
        }
        if receipt.kind != ReceiptKind::ChequeReceipt {
            warn!(kind = ?receipt.kind, "clear cheque expects a cheque receipt");
            return Err(WorkflowError::WrongInstrument(
                "not a cheque receipt".to_string(),
            ));
        }

        let cheque = receipt.cheque()?;
        let owner = cheque.sender_nym.clone();

        let (_guard, mut workflow) = self
            .checkout(&owner, &cheque.id, OUTGOING_CHEQUE_TYPES)
            .await?;
        ensure(
            transition::can_accept_cheque(workflow.state),
            "accept cheque",
            &workflow,
        )?;

        self.add_receipt_event(
            &owner,
            &mut workflow,
            EventType::Accept,
            WorkflowState::Accepted,
            receipt,
            receipt.time,
            Some(&cheque.source_account),
            Some(recipient),
        )
        .await?;

        // The guard admits each clearing exactly once, so the activity
        // entry below cannot be recorded twice for one workflow.
        let contact = self.contacts.contact_for_nym(recipient).await?;
        if let Some(contact) = &contact {
            self.activity
                .record_payment_event(
                    &owner,
                    contact,
                    ActivityBox::Outgoing,
                    &cheque.id,
                    &workflow.id,
                    receipt.time,
                )
                .await?;
        }

        self.notifications
            .push_account_event(AccountEvent {
                owner: owner.clone(),
                contact,
                workflow: workflow.id,
                workflow_type: workflow.workflow_type,
                account: cheque.source_account.clone(),
                amount: -cheque.amount,
                pending_amount: Decimal::ZERO,
                time: receipt.time,
                memo: cheque.memo.clone(),
            })
            .await?;

        Ok(workflow.id)
    }

    /// Final settlement of a cleared cheque-family instrument on the
    /// sender's side.
    pub async fn finish_cheque(
        &self,
        owner: &NymId,
        cheque: &Cheque,
        request: &ProtocolMessage,
        reply: Option<&ProtocolMessage>,
    ) -> Result<WorkflowId> {
        let (_guard, mut workflow) =
            self.checkout(owner, &cheque.id, OUTGOING_CHEQUE_TYPES).await?;
        ensure(
            transition::can_finish_cheque(workflow.state),
            "finish cheque",
            &workflow,
        )?;

        self.add_message_event(
            owner,
            &mut workflow,
            EventType::Complete,
            WorkflowState::Completed,
            request,
            reply,
            Some(&cheque.source_account),
            None,
        )
        .await?;

        Ok(workflow.id)
    }

    /// Marks an instrument expired once its validity window has passed.
    pub async fn expire_cheque(&self, owner: &NymId, cheque: &Cheque) -> Result<WorkflowId> {
        let (_guard, mut workflow) = self.checkout(owner, &cheque.id, CHEQUE_TYPES).await?;
        ensure(
            transition::can_expire_cheque(workflow.workflow_type, workflow.state),
            "expire cheque",
            &workflow,
        )?;

        let account = if cheque.sender_nym == *owner {
            Some(&cheque.source_account)
        } else {
            None
        };

        self.add_local_event(
            owner,
            &mut workflow,
            EventType::Expire,
            WorkflowState::Expired,
            cheque.valid_to,
            account,
        )
        .await?;

        Ok(workflow.id)
    }
}
