#![allow(dead_code)]

use chrono::{Duration, Utc};
use payflow::application::engine::WorkflowEngine;
use payflow::domain::identifier::{AccountId, ContactId, NotaryId, NymId, SourceId, UnitId};
use payflow::domain::instrument::{Cheque, Purse, Transfer};
use payflow::domain::message::{
    LedgerPayload, MessageType, ProtocolMessage, TransactionEntry,
};
use payflow::domain::ports::WorkflowStoreBox;
use payflow::infrastructure::in_memory::{
    InMemoryActivityRecorder, InMemoryContactResolver, InMemoryNotificationPublisher,
    InMemoryWorkflowStore,
};
use rust_decimal::Decimal;

/// An engine wired to in-memory collaborators, with handles kept for
/// inspecting side effects.
pub struct Harness {
    pub engine: WorkflowEngine,
    pub contacts: InMemoryContactResolver,
    pub activity: InMemoryActivityRecorder,
    pub notifications: InMemoryNotificationPublisher,
}

pub fn harness() -> Harness {
    harness_with_store(Box::new(InMemoryWorkflowStore::new()))
}

pub fn harness_with_store(store: WorkflowStoreBox) -> Harness {
    let contacts = InMemoryContactResolver::new();
    let activity = InMemoryActivityRecorder::new();
    let notifications = InMemoryNotificationPublisher::new();
    let engine = WorkflowEngine::new(
        store,
        Box::new(contacts.clone()),
        Box::new(activity.clone()),
        Box::new(notifications.clone()),
    );
    Harness {
        engine,
        contacts,
        activity,
        notifications,
    }
}

impl Harness {
    pub async fn register_contact(&self, nym: &str) {
        self.contacts
            .register(NymId::from(nym), ContactId::new(format!("contact-{nym}")))
            .await;
    }
}

pub fn cheque(id: &str, sender: &str, recipient: Option<&str>, account: &str, amount: Decimal) -> Cheque {
    let now = Utc::now();
    Cheque {
        id: SourceId::from(id),
        unit: UnitId::from("unit-1"),
        notary: NotaryId::from("notary-1"),
        source_account: AccountId::from(account),
        sender_nym: NymId::from(sender),
        recipient_nym: recipient.map(NymId::from),
        remitter_nym: None,
        amount,
        memo: "memo".to_string(),
        valid_from: now,
        valid_to: now + Duration::days(30),
        revision: 1,
    }
}

pub fn transfer(
    id: &str,
    sender: &str,
    recipient: Option<&str>,
    source: &str,
    destination: &str,
    amount: Decimal,
) -> Transfer {
    Transfer {
        id: SourceId::from(id),
        unit: UnitId::from("unit-1"),
        notary: NotaryId::from("notary-1"),
        source_account: AccountId::from(source),
        destination_account: AccountId::from(destination),
        sender_nym: NymId::from(sender),
        recipient_nym: recipient.map(NymId::from),
        amount,
        memo: "memo".to_string(),
        revision: 1,
    }
}

pub fn purse(id: &str, sender: &str, recipient: Option<&str>, value: Decimal) -> Purse {
    Purse {
        id: SourceId::from(id),
        unit: UnitId::from("unit-1"),
        notary: NotaryId::from("notary-1"),
        sender_nym: NymId::from(sender),
        recipient_nym: recipient.map(NymId::from),
        value,
        revision: 1,
    }
}

pub fn request() -> ProtocolMessage {
    ProtocolMessage {
        message_type: MessageType::NotarizeTransaction,
        success: true,
        sender_nym: None,
        recipient_nym: None,
        account: None,
        notary: Some(NotaryId::from("notary-1")),
        time: Utc::now(),
        ledger: None,
    }
}

pub fn success_reply() -> ProtocolMessage {
    ProtocolMessage {
        ledger: Some(LedgerPayload {
            transaction: Some(TransactionEntry { success: true }),
        }),
        ..request()
    }
}

pub fn failure_reply() -> ProtocolMessage {
    ProtocolMessage {
        success: false,
        ..request()
    }
}

/// Message-level success with an unreadable transaction payload.
pub fn indeterminate_reply() -> ProtocolMessage {
    ProtocolMessage {
        ledger: Some(LedgerPayload { transaction: None }),
        ..request()
    }
}

pub fn conveying_message(sender: &str) -> ProtocolMessage {
    ProtocolMessage {
        message_type: MessageType::SendNymMessage,
        sender_nym: Some(NymId::from(sender)),
        ..request()
    }
}
