mod common;

use chrono::Utc;
use common::{harness, request, success_reply, transfer};
use payflow::domain::identifier::{NotaryId, NymId};
use payflow::domain::message::{ReceiptKind, TransactionReceipt};
use payflow::domain::workflow::{EventType, WorkflowState, WorkflowType};
use payflow::error::WorkflowError;
use rust_decimal_macros::dec;

fn notary() -> NotaryId {
    NotaryId::from("notary-1")
}

fn pending(transfer: &payflow::domain::instrument::Transfer) -> TransactionReceipt {
    TransactionReceipt::for_transfer(
        ReceiptKind::Pending,
        transfer.destination_account.clone(),
        transfer.destination_account.clone(),
        Utc::now(),
        transfer,
    )
    .unwrap()
}

fn transfer_receipt(transfer: &payflow::domain::instrument::Transfer) -> TransactionReceipt {
    TransactionReceipt::for_transfer(
        ReceiptKind::TransferReceipt,
        transfer.source_account.clone(),
        transfer.source_account.clone(),
        Utc::now(),
        transfer,
    )
    .unwrap()
}

fn accept_pending(transfer: &payflow::domain::instrument::Transfer) -> TransactionReceipt {
    TransactionReceipt::for_transfer(
        ReceiptKind::AcceptPending,
        transfer.source_account.clone(),
        transfer.source_account.clone(),
        Utc::now(),
        transfer,
    )
    .unwrap()
}

#[tokio::test]
async fn test_create_transfer_is_idempotent() {
    let h = harness();
    h.register_contact("bob").await;
    let alice = NymId::from("alice");
    let transfer = transfer("transfer-1", "alice", Some("bob"), "acct-1", "acct-2", dec!(50.0));

    let first = h
        .engine
        .create_transfer(&alice, &transfer, &request(), Some(&success_reply()))
        .await
        .unwrap();
    let second = h
        .engine
        .create_transfer(&alice, &transfer, &request(), Some(&success_reply()))
        .await
        .unwrap();
    assert_eq!(first, second);

    let workflow = h.engine.load_workflow(&alice, &first).await.unwrap().unwrap();
    assert_eq!(workflow.workflow_type, WorkflowType::OutgoingTransfer);
    assert_eq!(workflow.state, WorkflowState::Initiated);
    assert_eq!(workflow.events.len(), 1);
}

#[tokio::test]
async fn test_outgoing_transfer_full_path() {
    let h = harness();
    h.register_contact("bob").await;
    let alice = NymId::from("alice");
    let transfer = transfer("transfer-1", "alice", Some("bob"), "acct-1", "acct-2", dec!(50.0));

    let id = h
        .engine
        .create_transfer(&alice, &transfer, &request(), Some(&success_reply()))
        .await
        .unwrap();

    h.engine
        .acknowledge_transfer(&alice, &transfer, &request(), Some(&success_reply()))
        .await
        .unwrap();
    let workflow = h.engine.load_workflow(&alice, &id).await.unwrap().unwrap();
    assert_eq!(workflow.state, WorkflowState::Acknowledged);

    h.engine
        .clear_transfer(&alice, &notary(), &transfer_receipt(&transfer))
        .await
        .unwrap();
    let workflow = h.engine.load_workflow(&alice, &id).await.unwrap().unwrap();
    assert_eq!(workflow.state, WorkflowState::Accepted);

    h.engine
        .complete_transfer(&alice, &notary(), &accept_pending(&transfer))
        .await
        .unwrap();
    let workflow = h.engine.load_workflow(&alice, &id).await.unwrap().unwrap();
    assert_eq!(workflow.state, WorkflowState::Completed);
    assert_eq!(workflow.events.len(), 4);

    // Source account first, destination second.
    assert_eq!(workflow.accounts.len(), 2);
    assert_eq!(workflow.accounts[0].as_str(), "acct-1");
    assert_eq!(workflow.accounts[1].as_str(), "acct-2");
}

#[tokio::test]
async fn test_incoming_transfer_created_by_conveyance() {
    let h = harness();
    let bob = NymId::from("bob");
    let transfer = transfer("transfer-1", "alice", Some("bob"), "acct-1", "acct-2", dec!(50.0));

    let first = h
        .engine
        .convey_transfer(&bob, &notary(), &pending(&transfer))
        .await
        .unwrap();
    // Replayed receipts resolve to the same workflow.
    let second = h
        .engine
        .convey_transfer(&bob, &notary(), &pending(&transfer))
        .await
        .unwrap();
    assert_eq!(first, second);

    let workflow = h.engine.load_workflow(&bob, &first).await.unwrap().unwrap();
    assert_eq!(workflow.workflow_type, WorkflowType::IncomingTransfer);
    assert_eq!(workflow.state, WorkflowState::Conveyed);
    assert_eq!(workflow.events.len(), 1);
    assert_eq!(workflow.parties, vec![NymId::from("alice")]);

    h.engine
        .accept_transfer(&bob, &pending(&transfer), &request(), Some(&success_reply()))
        .await
        .unwrap();
    let workflow = h.engine.load_workflow(&bob, &first).await.unwrap().unwrap();
    assert_eq!(workflow.state, WorkflowState::Accepted);

    h.engine
        .complete_transfer(&bob, &notary(), &accept_pending(&transfer))
        .await
        .unwrap();
    let workflow = h.engine.load_workflow(&bob, &first).await.unwrap().unwrap();
    assert_eq!(workflow.state, WorkflowState::Completed);
}

#[tokio::test]
async fn test_internal_transfer_ordering_independence() {
    // Acknowledge-then-convey and convey-then-acknowledge must converge.
    for ack_first in [true, false] {
        let h = harness();
        let alice = NymId::from("alice");
        let transfer = transfer(
            "transfer-1",
            "alice",
            Some("alice"),
            "acct-1",
            "acct-2",
            dec!(50.0),
        );

        let id = h
            .engine
            .create_transfer(&alice, &transfer, &request(), Some(&success_reply()))
            .await
            .unwrap();
        let workflow = h.engine.load_workflow(&alice, &id).await.unwrap().unwrap();
        assert_eq!(workflow.workflow_type, WorkflowType::InternalTransfer);
        assert_eq!(workflow.state, WorkflowState::Initiated);

        if ack_first {
            h.engine
                .acknowledge_transfer(&alice, &transfer, &request(), Some(&success_reply()))
                .await
                .unwrap();
            h.engine
                .convey_transfer(&alice, &notary(), &pending(&transfer))
                .await
                .unwrap();
        } else {
            h.engine
                .convey_transfer(&alice, &notary(), &pending(&transfer))
                .await
                .unwrap();
            h.engine
                .acknowledge_transfer(&alice, &transfer, &request(), Some(&success_reply()))
                .await
                .unwrap();
        }

        let workflow = h.engine.load_workflow(&alice, &id).await.unwrap().unwrap();
        assert_eq!(workflow.state, WorkflowState::Conveyed, "ack_first={ack_first}");
        assert_eq!(workflow.events.len(), 3, "ack_first={ack_first}");
    }
}

#[tokio::test]
async fn test_acknowledge_after_convey_does_not_regress_state() {
    let h = harness();
    let alice = NymId::from("alice");
    let transfer = transfer(
        "transfer-1",
        "alice",
        Some("alice"),
        "acct-1",
        "acct-2",
        dec!(50.0),
    );

    let id = h
        .engine
        .create_transfer(&alice, &transfer, &request(), Some(&success_reply()))
        .await
        .unwrap();
    h.engine
        .convey_transfer(&alice, &notary(), &pending(&transfer))
        .await
        .unwrap();

    // The late acknowledgement still succeeds and appends its event.
    h.engine
        .acknowledge_transfer(&alice, &transfer, &request(), Some(&success_reply()))
        .await
        .unwrap();

    let workflow = h.engine.load_workflow(&alice, &id).await.unwrap().unwrap();
    assert_eq!(workflow.state, WorkflowState::Conveyed);
    assert_eq!(workflow.events.len(), 3);
    assert_eq!(workflow.events[2].event_type, EventType::Acknowledge);
    assert!(workflow.events[2].success);
}

#[tokio::test]
async fn test_replayed_internal_pending_receipt_is_noop() {
    let h = harness();
    let alice = NymId::from("alice");
    let transfer = transfer(
        "transfer-1",
        "alice",
        Some("alice"),
        "acct-1",
        "acct-2",
        dec!(50.0),
    );

    let id = h
        .engine
        .create_transfer(&alice, &transfer, &request(), Some(&success_reply()))
        .await
        .unwrap();
    h.engine
        .convey_transfer(&alice, &notary(), &pending(&transfer))
        .await
        .unwrap();

    let replayed = h
        .engine
        .convey_transfer(&alice, &notary(), &pending(&transfer))
        .await
        .unwrap();
    assert_eq!(replayed, id);

    let workflow = h.engine.load_workflow(&alice, &id).await.unwrap().unwrap();
    assert_eq!(workflow.events.len(), 2);
}

#[tokio::test]
async fn test_convey_internal_requires_existing_workflow() {
    let h = harness();
    let alice = NymId::from("alice");
    let transfer = transfer(
        "transfer-1",
        "alice",
        Some("alice"),
        "acct-1",
        "acct-2",
        dec!(50.0),
    );

    assert!(matches!(
        h.engine
            .convey_transfer(&alice, &notary(), &pending(&transfer))
            .await,
        Err(WorkflowError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_clear_transfer_guards_by_type() {
    let h = harness();
    h.register_contact("bob").await;
    let alice = NymId::from("alice");

    // Outgoing transfers clear only once acknowledged.
    let outgoing = transfer("transfer-1", "alice", Some("bob"), "acct-1", "acct-2", dec!(10.0));
    h.engine
        .create_transfer(&alice, &outgoing, &request(), Some(&success_reply()))
        .await
        .unwrap();
    assert!(matches!(
        h.engine
            .clear_transfer(&alice, &notary(), &transfer_receipt(&outgoing))
            .await,
        Err(WorkflowError::IllegalTransition { .. })
    ));

    // Internal transfers clear only once conveyed.
    let internal = transfer(
        "transfer-2",
        "alice",
        Some("alice"),
        "acct-1",
        "acct-2",
        dec!(10.0),
    );
    let id = h
        .engine
        .create_transfer(&alice, &internal, &request(), Some(&success_reply()))
        .await
        .unwrap();
    h.engine
        .acknowledge_transfer(&alice, &internal, &request(), Some(&success_reply()))
        .await
        .unwrap();
    assert!(matches!(
        h.engine
            .clear_transfer(&alice, &notary(), &transfer_receipt(&internal))
            .await,
        Err(WorkflowError::IllegalTransition { .. })
    ));

    h.engine
        .convey_transfer(&alice, &notary(), &pending(&internal))
        .await
        .unwrap();
    h.engine
        .clear_transfer(&alice, &notary(), &transfer_receipt(&internal))
        .await
        .unwrap();
    let workflow = h.engine.load_workflow(&alice, &id).await.unwrap().unwrap();
    assert_eq!(workflow.state, WorkflowState::Accepted);
}

#[tokio::test]
async fn test_abort_only_from_initiated() {
    let h = harness();
    h.register_contact("bob").await;
    let alice = NymId::from("alice");
    let transfer = transfer("transfer-1", "alice", Some("bob"), "acct-1", "acct-2", dec!(10.0));

    let id = h
        .engine
        .create_transfer(&alice, &transfer, &request(), Some(&success_reply()))
        .await
        .unwrap();
    h.engine
        .abort_transfer(&alice, &transfer, &request(), Some(&success_reply()))
        .await
        .unwrap();
    let workflow = h.engine.load_workflow(&alice, &id).await.unwrap().unwrap();
    assert_eq!(workflow.state, WorkflowState::Aborted);

    // Once acknowledged, a transfer can no longer be aborted.
    let other = common::transfer("transfer-2", "alice", Some("bob"), "acct-1", "acct-2", dec!(10.0));
    h.engine
        .create_transfer(&alice, &other, &request(), Some(&success_reply()))
        .await
        .unwrap();
    h.engine
        .acknowledge_transfer(&alice, &other, &request(), Some(&success_reply()))
        .await
        .unwrap();
    assert!(matches!(
        h.engine
            .abort_transfer(&alice, &other, &request(), Some(&success_reply()))
            .await,
        Err(WorkflowError::IllegalTransition { .. })
    ));
}

#[tokio::test]
async fn test_receipt_notary_mismatch_is_rejected() {
    let h = harness();
    let alice = NymId::from("alice");
    let transfer = transfer(
        "transfer-1",
        "alice",
        Some("alice"),
        "acct-1",
        "acct-2",
        dec!(10.0),
    );
    h.engine
        .create_transfer(&alice, &transfer, &request(), Some(&success_reply()))
        .await
        .unwrap();

    assert!(matches!(
        h.engine
            .convey_transfer(&alice, &NotaryId::from("notary-2"), &pending(&transfer))
            .await,
        Err(WorkflowError::WrongInstrument(_))
    ));
}

#[tokio::test]
async fn test_list_queries() {
    let h = harness();
    h.register_contact("bob").await;
    let alice = NymId::from("alice");
    let transfer = transfer("transfer-1", "alice", Some("bob"), "acct-1", "acct-2", dec!(10.0));

    let id = h
        .engine
        .create_transfer(&alice, &transfer, &request(), Some(&success_reply()))
        .await
        .unwrap();

    let initiated = h
        .engine
        .list(&alice, WorkflowType::OutgoingTransfer, WorkflowState::Initiated)
        .await
        .unwrap();
    assert_eq!(initiated, vec![id]);

    let by_account = h
        .engine
        .workflows_by_account(&alice, &payflow::domain::identifier::AccountId::from("acct-1"))
        .await
        .unwrap();
    assert_eq!(by_account, vec![id]);
}
